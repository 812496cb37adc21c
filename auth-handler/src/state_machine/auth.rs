use std::{collections::BTreeSet, time::Instant};

use chrono::{DateTime, Utc};
use evauth_core::types::{
    AuthorizationStatus, AuthorizationType, IdToken, ProvidedToken, Reservation,
    SelectionAlgorithm, StopTransactionReason, StopTransactionRequest, TokenHandlingResult,
    ValidationOutcome,
};
use flume::Sender;

use crate::handler::core::AuthCore;

use super::{
    connector::ConnectorTable,
    request::{PendingRequest, RequestState},
    selection::{select_evse, Selection},
};

/// Borrowed identity of a presented token: its id and parent id.
#[derive(Clone, Copy, Debug)]
pub(crate) struct TokenRef<'a> {
    pub id_token: &'a IdToken,
    pub parent_id_token: Option<&'a IdToken>,
}

impl<'a> TokenRef<'a> {
    pub fn new(id_token: &'a IdToken, parent_id_token: Option<&'a IdToken>) -> Self {
        Self {
            id_token,
            parent_id_token,
        }
    }

    pub fn of(token: &'a ProvidedToken) -> Self {
        Self::new(&token.id_token, token.parent_id_token.as_ref())
    }

    /// Any of our id/parent equals any of the other id/parent.
    pub fn is_related(&self, id_token: &IdToken, parent_id_token: Option<&IdToken>) -> bool {
        let ours = [Some(self.id_token), self.parent_id_token];
        let theirs = [Some(id_token), parent_id_token];
        ours.iter()
            .flatten()
            .any(|a| theirs.iter().flatten().any(|b| a == b))
    }

    pub fn holds(&self, reservation: &Reservation) -> bool {
        reservation.is_held_by(self.id_token, self.parent_id_token)
    }
}

pub(crate) enum TokenAdmission {
    Admitted { master_pass: bool },
    AlreadyInProcess,
}

#[derive(Debug, PartialEq)]
pub(crate) enum TokenDecision {
    Done(TokenHandlingResult),
    /// Parked until a plug-in, a withdraw or the deadline.
    Wait(Instant),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Validation {
    Accepted(ValidationOutcome),
    /// Carries the last answer, if there was any, for the rejection notice.
    Rejected(Option<ValidationOutcome>),
}

/// Last accepted and unexpired outcome wins. Without one, the last answer
/// explains the rejection; an accepted but expired answer reads as expired.
pub(crate) fn select_outcome(outcomes: Vec<ValidationOutcome>, now: DateTime<Utc>) -> Validation {
    if let Some(outcome) = outcomes.iter().rev().find(|o| o.is_valid(Some(now))) {
        return Validation::Accepted(outcome.clone());
    }
    Validation::Rejected(outcomes.into_iter().last().map(|mut outcome| {
        if outcome.authorization_status == AuthorizationStatus::Accepted {
            outcome.authorization_status = AuthorizationStatus::Expired;
        }
        outcome
    }))
}

/// EVSEs a validated token may be used on. An empty list counts as no
/// restriction; when two restrictions do not overlap the wider one is used.
pub(crate) fn referenced_evses(
    token_evses: Option<&[usize]>,
    validated_evses: Option<&[usize]>,
    connectors: &ConnectorTable,
) -> BTreeSet<usize> {
    let to_set = |evses: &[usize]| evses.iter().copied().collect::<BTreeSet<_>>();
    let token_evses = token_evses.filter(|e| !e.is_empty()).map(to_set);
    let validated_evses = validated_evses.filter(|e| !e.is_empty()).map(to_set);

    let referenced = match (token_evses, validated_evses) {
        (Some(token_evses), Some(validated_evses)) => {
            let common: BTreeSet<usize> = token_evses
                .intersection(&validated_evses)
                .copied()
                .collect();
            if !common.is_empty() {
                common
            } else if validated_evses.len() > token_evses.len() {
                validated_evses
            } else {
                token_evses
            }
        }
        (Some(evses), None) | (None, Some(evses)) => evses,
        (None, None) => return connectors.evse_ids().collect(),
    };
    referenced
        .into_iter()
        .filter(|evse_id| connectors.contains(*evse_id))
        .collect()
}

impl AuthCore {
    pub(crate) fn begin_token_helper(
        &mut self,
        token: &ProvidedToken,
        waker: Sender<TokenHandlingResult>,
        now: Instant,
    ) -> TokenAdmission {
        if self.requests.contains_key(&token.id_token) {
            log::info!("{} is already in process", token.id_token.redacted());
            return TokenAdmission::AlreadyInProcess;
        }
        if let Some(evse_id) = self.registry.granted_evse(&token.id_token) {
            log::info!(
                "{} is already authorized on evse#{}",
                token.id_token.redacted(),
                evse_id
            );
            return TokenAdmission::AlreadyInProcess;
        }
        self.requests.insert(
            token.id_token.clone(),
            PendingRequest::new(token.clone(), waker, now),
        );
        TokenAdmission::Admitted {
            master_pass: self.configs.is_master_pass(&token.id_token),
        }
    }

    /// Commits a validated token against the live station state.
    pub(crate) fn decide_token_helper(
        &mut self,
        token: &ProvidedToken,
        outcome: &ValidationOutcome,
        now: Instant,
    ) -> TokenDecision {
        if let Some(result) = self
            .requests
            .get(&token.id_token)
            .and_then(|request| request.result())
        {
            return TokenDecision::Done(result);
        }

        let holder = TokenRef::of(token);
        let candidates = referenced_evses(
            token.connectors.as_deref(),
            outcome.evse_ids.as_deref(),
            &self.connectors,
        );
        log::debug!(
            "{} references evses {:?}",
            token.id_token.redacted(),
            candidates
        );

        let selection = match self.configs.selection_algorithm.value {
            SelectionAlgorithm::PlugEvents => select_evse(
                &candidates,
                holder,
                &self.connectors,
                &self.reservations,
                &self.registry,
            ),
        };
        // With authorization prioritized, stopping only happens when nothing
        // could be started instead.
        let stop_allowed = !self
            .configs
            .prioritize_authorization_over_stopping_transaction
            .value
            || selection == Selection::NoneAvailable;

        if self
            .configs
            .is_master_pass_parent(token.parent_id_token.as_ref())
        {
            if stop_allowed {
                return self.master_pass_stop(token, &candidates);
            }
            log::info!(
                "master pass {} does not stop while an evse is available",
                token.id_token.redacted()
            );
            return self.settle(&token.id_token, TokenHandlingResult::Rejected);
        }

        let by_own_id = token.authorization_type == AuthorizationType::Rfid;
        if let Some(evse_id) = self.registry.stop_candidate(&candidates, holder, by_own_id) {
            if stop_allowed {
                log::info!("{} stops transaction on evse#{}", token.id_token.redacted(), evse_id);
                self.stop_transaction(
                    evse_id,
                    StopTransactionRequest::new(
                        StopTransactionReason::Local,
                        Some(token.id_token.clone()),
                    ),
                );
                return self.settle(&token.id_token, TokenHandlingResult::UsedToStopTransaction);
            }
        }

        match selection {
            Selection::Immediate(evse_id) => {
                let result = if self.grant_evse(evse_id, token, outcome, now) {
                    TokenHandlingResult::UsedToStartTransaction
                } else {
                    TokenHandlingResult::NoConnectorAvailable
                };
                self.settle(&token.id_token, result)
            }
            Selection::WaitForPlugin(evses) => {
                let deadline = self.configs.connection_deadline(now);
                let ticket = self.next_ticket;
                self.next_ticket += 1;
                log::info!(
                    "{} waits for a plug-in on evses {:?}",
                    token.id_token.redacted(),
                    evses
                );
                match self.requests.get_mut(&token.id_token) {
                    Some(request) => {
                        request.token = token.clone();
                        request.outcome = Some(outcome.clone());
                        request.state = RequestState::Waiting {
                            candidates: evses,
                            deadline,
                            ticket,
                        };
                        TokenDecision::Wait(deadline)
                    }
                    None => TokenDecision::Done(TokenHandlingResult::Withdrawn),
                }
            }
            Selection::NoneAvailable => {
                log::info!("no connector available for {}", token.id_token.redacted());
                self.settle(&token.id_token, TokenHandlingResult::NoConnectorAvailable)
            }
        }
    }

    /// A token whose parent is the master pass group stops every running
    /// transaction it references and never starts one.
    fn master_pass_stop(&mut self, token: &ProvidedToken, candidates: &BTreeSet<usize>) -> TokenDecision {
        let active = self.registry.active_among(candidates);
        if active.is_empty() {
            log::info!(
                "master pass {} has no transaction to stop",
                token.id_token.redacted()
            );
            return self.settle(&token.id_token, TokenHandlingResult::Rejected);
        }
        for evse_id in active {
            log::info!("master pass stops transaction on evse#{}", evse_id);
            self.stop_transaction(
                evse_id,
                StopTransactionRequest::new(
                    StopTransactionReason::MasterPass,
                    Some(token.id_token.clone()),
                ),
            );
        }
        self.settle(&token.id_token, TokenHandlingResult::UsedToStopTransaction)
    }

    /// Tells the EVSEs the token named why it was turned away.
    pub(crate) fn reject_token_helper(&mut self, token: &ProvidedToken, outcome: &ValidationOutcome) {
        let evses: Vec<usize> = token
            .connectors
            .iter()
            .flatten()
            .copied()
            .filter(|evse_id| self.connectors.contains(*evse_id))
            .collect();
        for evse_id in evses {
            log::debug!(
                "evse#{} rejects {}: {:?}",
                evse_id,
                token.id_token.redacted(),
                outcome.authorization_status
            );
            self.notify_evse(evse_id, token.clone(), outcome.clone());
        }
    }

    fn settle(&mut self, id_token: &IdToken, result: TokenHandlingResult) -> TokenDecision {
        if let Some(request) = self.requests.get_mut(id_token) {
            request.resolve(result);
        }
        TokenDecision::Done(result)
    }

    pub(crate) fn finish_token_helper(&mut self, id_token: &IdToken, result: TokenHandlingResult) {
        if let Some(request) = self.requests.remove(id_token) {
            log::info!(
                "{} handled as {} after {:?}",
                id_token.redacted(),
                result,
                request.created_at.elapsed()
            );
        }
    }
}
