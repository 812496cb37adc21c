use evauth_handler::types::{
    Connector, ConnectorType, IdToken, ProvidedToken, SessionEvent, TokenHandlingResult,
};

use crate::harness::harness::{join, AuthHarness};

pub fn faulted_evse_is_skipped() -> anyhow::Result<()> {
    let h = AuthHarness::new(2)?;
    h.accept("A");
    h.plug_in(1);
    h.plug_in(2);
    h.handler.handle_permanent_fault_raised(1, 1);

    assert_eq!(
        h.handler.on_token(ProvidedToken::rfid("A")),
        TokenHandlingResult::UsedToStartTransaction
    );
    assert_eq!(h.bus_rx.notified_evses(), vec![(2, IdToken::from("A"))]);
    Ok(())
}

pub fn evse_with_a_healthy_connector_stays_usable() -> anyhow::Result<()> {
    let h = AuthHarness::new(0)?;
    h.handler.init_evse(
        1,
        vec![
            Connector::new(1, ConnectorType::Type2),
            Connector::new(2, ConnectorType::Ccs2),
        ],
    );
    h.accept("A");
    h.plug_in(1);
    h.handler.handle_permanent_fault_raised(1, 2);

    assert_eq!(
        h.handler.on_token(ProvidedToken::rfid("A")),
        TokenHandlingResult::UsedToStartTransaction
    );
    Ok(())
}

pub fn waiter_without_candidates_gives_up() -> anyhow::Result<()> {
    let h = AuthHarness::new(1)?;
    h.accept("A");

    let waiter = h.present_and_park(ProvidedToken::rfid("A"))?;
    h.handler.handle_permanent_fault_raised(1, 1);

    assert_eq!(join(waiter)?, TokenHandlingResult::NoConnectorAvailable);
    Ok(())
}

pub fn waiter_keeps_healthy_candidate() -> anyhow::Result<()> {
    let h = AuthHarness::new(2)?;
    h.accept("A");

    let waiter = h.present_and_park(ProvidedToken::rfid("A"))?;
    h.handler.handle_permanent_fault_raised(1, 1);
    h.plug_in(1);
    h.plug_in(2);

    assert_eq!(join(waiter)?, TokenHandlingResult::UsedToStartTransaction);
    assert_eq!(h.bus_rx.notified_evses(), vec![(2, IdToken::from("A"))]);
    Ok(())
}

pub fn cleared_fault_makes_evse_usable() -> anyhow::Result<()> {
    let h = AuthHarness::new(1)?;
    h.accept("A");
    h.plug_in(1);
    h.handler.handle_permanent_fault_raised(1, 1);
    assert_eq!(
        h.handler.on_token(ProvidedToken::rfid("A")),
        TokenHandlingResult::NoConnectorAvailable
    );

    h.handler.handle_permanent_fault_cleared(1, 1);
    assert_eq!(
        h.handler.on_token(ProvidedToken::rfid("A")),
        TokenHandlingResult::UsedToStartTransaction
    );
    Ok(())
}

pub fn faults_can_be_ignored() -> anyhow::Result<()> {
    let h = AuthHarness::with_configs(1, vec![("IgnoreConnectorFaults", "true")])?;
    h.accept("A");
    h.plug_in(1);
    h.handler.handle_permanent_fault_raised(1, 1);

    assert_eq!(
        h.handler.on_token(ProvidedToken::rfid("A")),
        TokenHandlingResult::UsedToStartTransaction
    );
    Ok(())
}

pub fn disabled_evse_is_never_a_candidate() -> anyhow::Result<()> {
    let h = AuthHarness::new(1)?;
    h.accept("A");
    h.plug_in(1);
    h.handler.handle_session_event(1, SessionEvent::Disabled);

    assert_eq!(
        h.handler.on_token(ProvidedToken::rfid("A")),
        TokenHandlingResult::NoConnectorAvailable
    );

    h.handler.handle_session_event(1, SessionEvent::Enabled);
    assert_eq!(
        h.handler.on_token(ProvidedToken::rfid("A")),
        TokenHandlingResult::UsedToStartTransaction
    );
    Ok(())
}

pub fn deauthorized_evse_is_free_again() -> anyhow::Result<()> {
    let h = AuthHarness::new(1)?;
    h.accept("A");
    h.accept("B");
    h.plug_in(1);
    assert_eq!(
        h.handler.on_token(ProvidedToken::rfid("A")),
        TokenHandlingResult::UsedToStartTransaction
    );

    h.handler.handle_session_event(1, SessionEvent::Deauthorized);
    h.plug_in(1);

    assert_eq!(
        h.handler.on_token(ProvidedToken::rfid("B")),
        TokenHandlingResult::UsedToStartTransaction
    );
    Ok(())
}
