use std::{collections::BTreeSet, thread, time::Duration};

use evauth_handler::types::{IdToken, ProvidedToken, TokenHandlingResult, TokenValidationStatus};

use crate::harness::{
    event::Event,
    harness::{join, AuthHarness},
};

pub fn duplicate_presentation_is_suppressed() -> anyhow::Result<()> {
    let h = AuthHarness::new(1)?;
    h.accept("A");
    h.plug_in(1);
    h.validations.set_delay(Duration::from_millis(300));

    let first = h.present(ProvidedToken::rfid("A"));
    thread::sleep(Duration::from_millis(50));
    let second = h.present(ProvidedToken::rfid("a"));

    let mut results = vec![join(first)?, join(second)?];
    results.sort_by_key(|r| r.to_string());
    assert_eq!(
        results,
        vec![
            TokenHandlingResult::AlreadyInProcess,
            TokenHandlingResult::UsedToStartTransaction
        ]
    );
    assert_eq!(h.bus_rx.count(|ev| matches!(ev, Event::Validated(_))), 1);
    assert_eq!(h.bus_rx.notified_evses().len(), 1);
    assert_eq!(
        h.bus_rx
            .statuses("A")
            .iter()
            .filter(|s| **s == TokenValidationStatus::UsedToStart)
            .count(),
        1
    );
    Ok(())
}

pub fn waiters_are_served_in_arrival_order() -> anyhow::Result<()> {
    let h = AuthHarness::new(1)?;
    h.accept("FIRST");
    h.accept("SECOND");

    let first = h.present_and_park(ProvidedToken::rfid("FIRST"))?;
    let second = h.present_and_park(ProvidedToken::rfid("SECOND"))?;
    h.plug_in(1);

    assert_eq!(join(first)?, TokenHandlingResult::UsedToStartTransaction);
    assert_eq!(join(second)?, TokenHandlingResult::Timeout);
    assert_eq!(h.bus_rx.notified_evses(), vec![(1, IdToken::from("FIRST"))]);
    Ok(())
}

pub fn one_authorization_per_evse() -> anyhow::Result<()> {
    let h = AuthHarness::new(3)?;
    for evse_id in 1..=3 {
        h.plug_in(evse_id);
    }
    let tokens: Vec<String> = (0..10).map(|i| format!("TOKEN_{}", i)).collect();
    for token in &tokens {
        h.accept(token);
    }

    let handles: Vec<_> = tokens
        .iter()
        .map(|token| h.present(ProvidedToken::rfid(token.as_str())))
        .collect();
    let mut started = 0;
    for handle in handles {
        match join(handle)? {
            TokenHandlingResult::UsedToStartTransaction => started += 1,
            other => assert_eq!(other, TokenHandlingResult::NoConnectorAvailable),
        }
    }

    assert_eq!(started, 3);
    let notified = h.bus_rx.notified_evses();
    let evses: BTreeSet<usize> = notified.iter().map(|(evse_id, _)| *evse_id).collect();
    assert_eq!(notified.len(), 3);
    assert_eq!(evses, BTreeSet::from([1, 2, 3]));
    Ok(())
}

pub fn slow_validation_does_not_block_events() -> anyhow::Result<()> {
    let h = AuthHarness::new(2)?;
    h.accept("SLOW");
    h.accept("FAST");
    h.validations.set_delay(Duration::from_millis(800));
    h.plug_in(2);

    let slow = h.present(ProvidedToken::rfid("SLOW").with_connectors(vec![1]));
    thread::sleep(Duration::from_millis(100));

    // session events go through while SLOW is still being validated
    h.plug_in(1);
    h.validations.set_delay(Duration::ZERO);
    let fast = h.handler.on_token(ProvidedToken::rfid("FAST").with_connectors(vec![2]));

    assert_eq!(fast, TokenHandlingResult::UsedToStartTransaction);
    assert_eq!(join(slow)?, TokenHandlingResult::UsedToStartTransaction);
    assert_eq!(
        h.bus_rx.notified_evses(),
        vec![(2, IdToken::from("FAST")), (1, IdToken::from("SLOW"))]
    );
    Ok(())
}
