use std::collections::BTreeSet;

use super::{
    auth::TokenRef, connector::ConnectorTable, reservation::ReservationTable,
    transaction::TransactionRegistry,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Selection {
    Immediate(usize),
    WaitForPlugin(BTreeSet<usize>),
    NoneAvailable,
}

/// Plug-in driven selection: an EVSE with the EV already connected wins
/// (lowest id first), otherwise the token waits for a plug-in on any of the
/// remaining eligible EVSEs.
pub(crate) fn select_evse(
    candidates: &BTreeSet<usize>,
    holder: TokenRef<'_>,
    connectors: &ConnectorTable,
    reservations: &ReservationTable,
    registry: &TransactionRegistry,
) -> Selection {
    let mut plugged = BTreeSet::new();
    let mut unplugged = BTreeSet::new();

    for &evse_id in candidates {
        let Some(state) = connectors.get(evse_id) else {
            continue;
        };
        if !state.is_available() {
            log::debug!("evse#{} is faulted or disabled", evse_id);
            continue;
        }
        if !registry.is_free(evse_id) {
            log::debug!("evse#{} is busy", evse_id);
            continue;
        }
        if !reservations.is_evse_usable(evse_id, holder, connectors, registry) {
            log::debug!("evse#{} is reserved", evse_id);
            continue;
        }
        if state.plugged {
            plugged.insert(evse_id);
        } else {
            unplugged.insert(evse_id);
        }
    }

    if let Some(&evse_id) = plugged.first() {
        Selection::Immediate(evse_id)
    } else if !unplugged.is_empty() {
        Selection::WaitForPlugin(unplugged)
    } else {
        Selection::NoneAvailable
    }
}
