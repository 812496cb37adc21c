use evauth_core::types::{
    IdToken, TokenHandlingResult, WithdrawAuthorizationRequest, WithdrawAuthorizationResult,
};

use crate::{drivers::timers::TimerId, handler::core::AuthCore};

impl AuthCore {
    /// Withdraws waiting requests and granted authorizations that match the
    /// request. With neither an EVSE nor a token given, everything matches.
    /// Running transactions are never touched.
    pub(crate) fn withdraw_authorization_helper(
        &mut self,
        request: &WithdrawAuthorizationRequest,
    ) -> WithdrawAuthorizationResult {
        if let Some(evse_id) = request.evse_id {
            if !self.connectors.contains(evse_id) {
                return WithdrawAuthorizationResult::EvseNotFound;
            }
        }
        let matches_token = |id_token: &IdToken| {
            request
                .id_token
                .as_ref()
                .map_or(true, |wanted| wanted == id_token)
        };
        let mut found = false;

        for (id_token, pending) in self.requests.iter_mut() {
            if !matches_token(id_token) {
                continue;
            }
            if request
                .evse_id
                .is_some_and(|evse_id| !pending.references(evse_id))
            {
                continue;
            }
            if pending.resolve(TokenHandlingResult::Withdrawn) {
                log::info!("withdrew pending {}", id_token.redacted());
                found = true;
            }
        }

        let granted: Vec<usize> = self
            .registry
            .granted_evses()
            .filter(|(evse_id, token)| {
                request.evse_id.map_or(true, |wanted| wanted == *evse_id)
                    && matches_token(&token.id_token)
            })
            .map(|(evse_id, _)| evse_id)
            .collect();
        for evse_id in granted {
            if self.registry.clear_granted(evse_id).is_some() {
                log::info!("withdrew authorization on evse#{}", evse_id);
                self.remove_timeout(TimerId::Authorization(evse_id));
                self.withdraw_evse_authorization(evse_id);
                found = true;
            }
        }

        if found {
            WithdrawAuthorizationResult::Accepted
        } else {
            WithdrawAuthorizationResult::AuthorizationNotFound
        }
    }
}
