use std::time::Duration;

use chrono::Utc;
use evauth_handler::types::{
    AuthorizationStatus, ConnectorType, IdToken, ProvidedToken, Reservation,
    ReservationCheckStatus, ReservationEndReason, ReservationResult, ReservationScope,
    SessionEvent, TokenHandlingResult,
};

use crate::harness::{event::Event, harness::AuthHarness};

fn in_an_hour(reservation_id: i32, id_token: &str, scope: ReservationScope) -> Reservation {
    Reservation::new(
        reservation_id,
        id_token,
        scope,
        Utc::now() + chrono::Duration::hours(1),
    )
}

fn ended(h: &AuthHarness) -> Vec<Event> {
    h.bus_rx
        .history()
        .into_iter()
        .filter(|ev| matches!(ev, Event::ReservationCancelled { .. }))
        .collect()
}

pub fn reserved_evse_only_serves_its_holder() -> anyhow::Result<()> {
    let h = AuthHarness::new(2)?;
    h.accept("R");
    h.accept("B");
    assert_eq!(
        h.handler
            .handle_reservation(in_an_hour(7, "R", ReservationScope::Evse(1))),
        ReservationResult::Accepted
    );
    h.handler.handle_permanent_fault_raised(2, 1);
    h.plug_in(1);

    assert_eq!(
        h.handler
            .on_token(ProvidedToken::rfid("B").with_connectors(vec![1, 2])),
        TokenHandlingResult::NoConnectorAvailable
    );
    assert_eq!(
        h.handler.on_token(ProvidedToken::rfid("r")),
        TokenHandlingResult::UsedToStartTransaction
    );

    assert_eq!(
        h.bus_rx.wait_for(Duration::ZERO, |ev| matches!(ev, Event::NotifyEvse { .. }))?,
        Event::NotifyEvse {
            evse_id: 1,
            id_token: IdToken::from("r"),
            status: AuthorizationStatus::Accepted,
            reservation_id: Some(7),
        }
    );
    assert_eq!(
        ended(&h),
        vec![Event::ReservationCancelled {
            evse_id: Some(1),
            reservation_id: Some(7),
            reason: ReservationEndReason::UsedToStartCharging,
            send_reservation_update: true,
        }]
    );
    assert!(h.handler.handle_cancel_reservation(7).is_none());
    Ok(())
}

pub fn reservation_held_through_parent() -> anyhow::Result<()> {
    let h = AuthHarness::new(1)?;
    h.accept_with_parent("CARD", "fleet");
    h.handler.handle_reservation(
        in_an_hour(1, "OWNER", ReservationScope::Evse(1)).with_parent("FLEET"),
    );
    h.plug_in(1);

    assert_eq!(
        h.handler.on_token(ProvidedToken::rfid("CARD")),
        TokenHandlingResult::UsedToStartTransaction
    );
    Ok(())
}

pub fn expiry_must_be_in_the_future() -> anyhow::Result<()> {
    let h = AuthHarness::new(1)?;
    let past = Reservation::new(
        1,
        "R",
        ReservationScope::Evse(1),
        Utc::now() - chrono::Duration::seconds(1),
    );
    assert_eq!(h.handler.handle_reservation(past), ReservationResult::Rejected);
    assert_eq!(
        h.handler
            .handle_reservation(in_an_hour(2, "R", ReservationScope::Evse(5))),
        ReservationResult::Rejected
    );
    Ok(())
}

pub fn reservation_expires() -> anyhow::Result<()> {
    let h = AuthHarness::new(1)?;
    h.accept("B");
    let reservation = Reservation::new(
        3,
        "R",
        ReservationScope::Evse(1),
        Utc::now() + chrono::Duration::milliseconds(500),
    );
    assert_eq!(h.handler.handle_reservation(reservation), ReservationResult::Accepted);

    let ev = h.bus_rx.wait_for(Duration::from_secs(3), |ev| {
        matches!(ev, Event::ReservationCancelled { .. })
    })?;
    assert_eq!(
        ev,
        Event::ReservationCancelled {
            evse_id: Some(1),
            reservation_id: Some(3),
            reason: ReservationEndReason::Expired,
            send_reservation_update: true,
        }
    );

    h.plug_in(1);
    assert_eq!(
        h.handler.on_token(ProvidedToken::rfid("B")),
        TokenHandlingResult::UsedToStartTransaction
    );
    Ok(())
}

pub fn cancelled_reservation_reports_its_scope() -> anyhow::Result<()> {
    let h = AuthHarness::new(1)?;
    h.accept("B");
    h.handler
        .handle_reservation(in_an_hour(4, "R", ReservationScope::Evse(1)));

    assert_eq!(
        h.handler.handle_cancel_reservation(4),
        Some(ReservationScope::Evse(1))
    );
    assert_eq!(h.handler.handle_cancel_reservation(4), None);
    assert_eq!(
        ended(&h),
        vec![Event::ReservationCancelled {
            evse_id: Some(1),
            reservation_id: Some(4),
            reason: ReservationEndReason::Cancelled,
            send_reservation_update: false,
        }]
    );

    h.plug_in(1);
    assert_eq!(
        h.handler.on_token(ProvidedToken::rfid("B")),
        TokenHandlingResult::UsedToStartTransaction
    );
    Ok(())
}

pub fn same_id_replaces_reservation() -> anyhow::Result<()> {
    let h = AuthHarness::new(2)?;
    h.handler
        .handle_reservation(in_an_hour(5, "R", ReservationScope::Evse(1)));
    h.handler
        .handle_reservation(in_an_hour(5, "R", ReservationScope::Evse(2)));

    assert_eq!(
        h.handler.handle_cancel_reservation(5),
        Some(ReservationScope::Evse(2))
    );
    assert!(ended(&h).len() == 1);
    Ok(())
}

pub fn global_reservation_holds_back_last_connector() -> anyhow::Result<()> {
    let h = AuthHarness::new(2)?;
    h.accept("R");
    h.accept("A");
    h.accept("B");
    h.handler.handle_reservation(in_an_hour(
        6,
        "R",
        ReservationScope::Global(ConnectorType::Type2),
    ));
    h.plug_in(1);
    h.plug_in(2);

    // one of two Type 2 sockets may go to someone else
    assert_eq!(
        h.handler.on_token(ProvidedToken::rfid("A")),
        TokenHandlingResult::UsedToStartTransaction
    );
    assert_eq!(h.bus_rx.reserved_evses(), vec![2]);
    assert_eq!(
        h.handler.on_token(ProvidedToken::rfid("B")),
        TokenHandlingResult::NoConnectorAvailable
    );
    assert_eq!(
        h.handler.on_token(ProvidedToken::rfid("R")),
        TokenHandlingResult::UsedToStartTransaction
    );
    // evse 2 went to the holder, there is nothing left to release
    assert_eq!(
        ended(&h),
        vec![Event::ReservationCancelled {
            evse_id: Some(2),
            reservation_id: Some(6),
            reason: ReservationEndReason::UsedToStartCharging,
            send_reservation_update: true,
        }]
    );
    Ok(())
}

pub fn freed_evse_releases_the_global_hold() -> anyhow::Result<()> {
    let h = AuthHarness::new(2)?;
    h.accept("A");
    h.handler.handle_reservation(in_an_hour(
        8,
        "R",
        ReservationScope::Global(ConnectorType::Type2),
    ));
    assert!(h.bus_rx.history().contains(&Event::Reserved {
        evse_id: None,
        reservation_id: Some(8),
    }));
    assert!(h.bus_rx.reserved_evses().is_empty());

    h.start_charging(1, "A")?;
    assert_eq!(h.bus_rx.reserved_evses(), vec![2]);

    h.handler
        .handle_session_event(1, SessionEvent::TransactionFinished);

    assert_eq!(
        ended(&h),
        vec![Event::ReservationCancelled {
            evse_id: Some(2),
            reservation_id: None,
            reason: ReservationEndReason::GlobalReservationRequirementDropped,
            send_reservation_update: false,
        }]
    );
    assert_eq!(h.bus_rx.reserved_evses(), vec![2]);
    Ok(())
}

pub fn reservation_exists_tells_holder_group_and_stranger_apart() -> anyhow::Result<()> {
    let h = AuthHarness::new(3)?;
    h.handler.handle_reservation(
        in_an_hour(1, "OWNER", ReservationScope::Evse(1)).with_parent("FLEET"),
    );
    h.handler.handle_reservation(in_an_hour(
        2,
        "GLOBAL",
        ReservationScope::Global(ConnectorType::Type2),
    ));
    assert!(h.bus_rx.history().contains(&Event::Reserved {
        evse_id: Some(1),
        reservation_id: Some(1),
    }));

    let owner = IdToken::from("owner");
    let stranger = IdToken::from("STRANGER");
    let fleet = IdToken::from("FLEET");
    let other_group = IdToken::from("OTHER");
    let check = |id_token: &IdToken, evse_id: Option<usize>, group: Option<&IdToken>| {
        h.handler.handle_reservation_exists(id_token, evse_id, group)
    };

    assert_eq!(check(&owner, Some(1), None), ReservationCheckStatus::ReservedForToken);
    assert_eq!(check(&stranger, Some(1), Some(&fleet)), ReservationCheckStatus::ReservedForToken);
    assert_eq!(
        check(&stranger, Some(1), None),
        ReservationCheckStatus::ReservedForOtherTokenAndHasParentToken
    );
    assert_eq!(
        check(&stranger, Some(1), Some(&other_group)),
        ReservationCheckStatus::ReservedForOtherToken
    );
    // evse 2 and 3 share the one global reservation, neither is held back
    assert_eq!(check(&stranger, Some(2), None), ReservationCheckStatus::NotReserved);

    // without an evse only global reservations count
    assert_eq!(
        check(&IdToken::from("global"), None, None),
        ReservationCheckStatus::ReservedForToken
    );
    assert_eq!(check(&owner, None, None), ReservationCheckStatus::NotReserved);
    Ok(())
}
