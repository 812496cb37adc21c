use std::{collections::BTreeSet, time::Instant};

use evauth_core::types::{IdToken, ProvidedToken, TokenHandlingResult, ValidationOutcome};
use flume::Sender;

use crate::handler::core::AuthCore;

use super::auth::TokenRef;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum RequestState {
    /// The validation backends are being asked, outside the lock.
    Validating,
    Waiting {
        candidates: BTreeSet<usize>,
        deadline: Instant,
        /// Arrival order among waiters.
        ticket: u64,
    },
    Resolved(TokenHandlingResult),
}

/// One in-flight `on_token` call, keyed by its token in the core.
#[derive(Debug)]
pub(crate) struct PendingRequest {
    pub token: ProvidedToken,
    pub outcome: Option<ValidationOutcome>,
    pub created_at: Instant,
    pub state: RequestState,
    waker: Sender<TokenHandlingResult>,
}

impl PendingRequest {
    pub fn new(token: ProvidedToken, waker: Sender<TokenHandlingResult>, now: Instant) -> Self {
        Self {
            token,
            outcome: None,
            created_at: now,
            state: RequestState::Validating,
            waker,
        }
    }

    pub fn result(&self) -> Option<TokenHandlingResult> {
        match self.state {
            RequestState::Resolved(result) => Some(result),
            _ => None,
        }
    }

    /// Whether a withdraw naming `evse_id` applies to this request.
    pub fn references(&self, evse_id: usize) -> bool {
        match &self.state {
            RequestState::Validating => self
                .token
                .connectors
                .as_ref()
                .map_or(true, |evses| evses.is_empty() || evses.contains(&evse_id)),
            RequestState::Waiting { candidates, .. } => candidates.contains(&evse_id),
            RequestState::Resolved(_) => false,
        }
    }

    /// Settles the request and wakes its caller. Only the first resolution
    /// counts.
    pub fn resolve(&mut self, result: TokenHandlingResult) -> bool {
        if let RequestState::Resolved(_) = self.state {
            return false;
        }
        self.state = RequestState::Resolved(result);
        if self.waker.try_send(result).is_err() {
            log::trace!("{} has no waiter left", self.token.id_token.redacted());
        }
        true
    }
}

impl AuthCore {
    /// Called by a waiter whose deadline passed. A resolution that raced the
    /// deadline wins over the timeout.
    pub(crate) fn expire_request_helper(&mut self, id_token: &IdToken) -> TokenHandlingResult {
        let Some(request) = self.requests.get_mut(id_token) else {
            return TokenHandlingResult::Timeout;
        };
        if request.resolve(TokenHandlingResult::Timeout) {
            log::info!("{} timed out waiting for a plug-in", id_token.redacted());
        }
        request.result().unwrap_or(TokenHandlingResult::Timeout)
    }

    /// Hands a freshly plugged EVSE to the longest waiting request that may
    /// use it.
    pub(crate) fn grant_waiter(&mut self, evse_id: usize, now: Instant) {
        let ready = self
            .connectors
            .get(evse_id)
            .is_some_and(|state| state.is_available())
            && self.registry.is_free(evse_id);
        if !ready {
            return;
        }

        let chosen = self
            .requests
            .iter()
            .filter_map(|(id_token, request)| match &request.state {
                RequestState::Waiting {
                    candidates,
                    deadline,
                    ticket,
                } if candidates.contains(&evse_id)
                    && *deadline > now
                    && self.reservations.is_evse_usable(
                        evse_id,
                        TokenRef::of(&request.token),
                        &self.connectors,
                        &self.registry,
                    ) =>
                {
                    Some((*ticket, id_token.clone()))
                }
                _ => None,
            })
            .min();
        let Some((_, id_token)) = chosen else {
            log::debug!("no request waiting for evse#{}", evse_id);
            return;
        };
        let Some((token, outcome)) = self
            .requests
            .get(&id_token)
            .map(|request| (request.token.clone(), request.outcome.clone()))
        else {
            return;
        };

        let outcome = outcome.unwrap_or_else(ValidationOutcome::accepted);
        if self.grant_evse(evse_id, &token, &outcome, now) {
            if let Some(request) = self.requests.get_mut(&id_token) {
                request.resolve(TokenHandlingResult::UsedToStartTransaction);
            }
        }
    }

    /// Takes an EVSE that can no longer serve anyone out of every waiting
    /// request. A request left without candidates gives up.
    pub(crate) fn drop_candidate(&mut self, evse_id: usize) {
        for request in self.requests.values_mut() {
            if let RequestState::Waiting { candidates, .. } = &mut request.state {
                if candidates.remove(&evse_id) && candidates.is_empty() {
                    log::info!(
                        "{} lost its last candidate evse#{}",
                        request.token.id_token.redacted(),
                        evse_id
                    );
                    request.resolve(TokenHandlingResult::NoConnectorAvailable);
                }
            }
        }
    }
}
