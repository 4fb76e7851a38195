//! Stateright model for verifying the `virtd` auth gate.
//!
//! This module implements a formal verification model that explores all
//! possible interleavings of `Open`, auth completion, and request delivery
//! across multiple concurrent client sessions. The model verifies that:
//!
//! 1. **Safety**: write-requiring procedures cannot complete before the
//!    auth gate clears, nor on a session opened read-only.
//! 2. **Temporal ordering**: auth completion precedes any write effect.
//! 3. **Out-of-order resilience**: reordered delivery cannot bypass either
//!    gate.
//!
//! # Example
//!
//! ```
//! use virtd_verification::session_model::SessionModel;
//! use stateright::Checker;
//!
//! let model = SessionModel::default();
//! let checker = model.checker().spawn_bfs().join();
//! assert!(checker.is_done());
//! ```
//!
//! # Model configuration
//!
//! The model is parameterized by:
//! - `num_clients`: number of concurrent client sessions (default: 2)
//! - `max_queue_depth`: maximum messages queued per client (default: 2)
//! - `sasl_required`: whether sessions start with the gate shut
//!
//! Conservative defaults keep the state space tractable while still
//! exploring the interleavings the safety properties depend on.

pub mod actions;
pub mod properties;
pub mod state;

use stateright::{Model, Property};

use self::{
    actions::{apply_action, Action},
    properties::{
        auth_precedes_write_effect,
        can_complete_write_operation,
        can_deliver_out_of_order,
        can_reject_not_open,
        can_reject_pre_auth,
        can_reject_readonly_write,
        no_write_effect_on_readonly_session,
    },
    state::{RequestKind, SystemState},
};

/// Configuration for the auth-gate verification model.
///
/// Use [`SessionModel::default()`] for conservative defaults suitable for
/// automated testing, or construct a custom configuration for exploratory
/// verification.
#[derive(Clone, Debug)]
pub struct SessionModel {
    /// Number of concurrent client sessions to model.
    pub num_clients: usize,
    /// Maximum number of messages that can be queued per client.
    pub max_queue_depth: usize,
    /// Whether modelled sessions start with the auth gate shut.
    pub sasl_required: bool,
}

impl Default for SessionModel {
    fn default() -> Self {
        Self {
            num_clients: 2,
            max_queue_depth: 2,
            sasl_required: true,
        }
    }
}

impl SessionModel {
    /// Creates a new model with the given number of clients.
    ///
    /// Values below one are saturated to one to keep the model valid.
    #[must_use]
    pub fn with_clients(num_clients: usize) -> Self {
        Self {
            num_clients: num_clients.max(1),
            ..Default::default()
        }
    }

    /// Creates a minimal model for quick verification (single client).
    #[must_use]
    pub const fn minimal() -> Self {
        Self {
            num_clients: 1,
            max_queue_depth: 2,
            sasl_required: true,
        }
    }

    fn push_open_action(state: &SystemState, actions: &mut Vec<Action>, client: usize) {
        if state.sessions[client].opened {
            return;
        }
        actions.push(Action::Open { client, readonly: false });
        actions.push(Action::Open { client, readonly: true });
    }

    fn push_complete_auth_action(state: &SystemState, actions: &mut Vec<Action>, client: usize) {
        if !state.sessions[client].auth_cleared {
            actions.push(Action::CompleteAuth { client });
        }
    }

    fn push_send_request_actions(&self, state: &SystemState, actions: &mut Vec<Action>, client: usize) {
        if state.queues[client].len() >= self.max_queue_depth {
            return;
        }
        actions.extend(RequestKind::all().iter().copied().map(|kind| Action::SendRequest { client, kind }));
    }

    fn push_deliver_actions(state: &SystemState, actions: &mut Vec<Action>, client: usize) {
        for queue_index in 0..state.queues[client].len() {
            actions.push(Action::DeliverRequest { client, queue_index });
        }
    }
}

impl Model for SessionModel {
    type State = SystemState;
    type Action = Action;

    fn init_states(&self) -> Vec<Self::State> {
        vec![SystemState::new(self.num_clients, self.sasl_required)]
    }

    fn actions(&self, state: &Self::State, actions: &mut Vec<Self::Action>) {
        for client in 0..self.num_clients {
            Self::push_open_action(state, actions, client);
            Self::push_complete_auth_action(state, actions, client);
            self.push_send_request_actions(state, actions, client);
            Self::push_deliver_actions(state, actions, client);
        }
    }

    fn next_state(&self, state: &Self::State, action: Self::Action) -> Option<Self::State> {
        Some(apply_action(state, action))
    }

    fn properties(&self) -> Vec<Property<Self>> {
        vec![
            // Safety properties
            auth_precedes_write_effect(),
            no_write_effect_on_readonly_session(),
            // Reachability properties
            can_reject_pre_auth(),
            can_reject_not_open(),
            can_reject_readonly_write(),
            can_complete_write_operation(),
            can_deliver_out_of_order(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use stateright::{Checker, HasDiscoveries};

    use super::*;
    use crate::session_model::properties::{
        CAN_COMPLETE_WRITE_OPERATION_NAME,
        CAN_DELIVER_OUT_OF_ORDER_NAME,
        CAN_REJECT_NOT_OPEN_NAME,
        CAN_REJECT_PRE_AUTH_NAME,
        CAN_REJECT_READONLY_WRITE_NAME,
    };

    const TARGET_MAX_DEPTH: usize = 7;
    const TARGET_STATE_COUNT: usize = 2000;

    fn verify_bounded(model: SessionModel) -> impl stateright::Checker<SessionModel> {
        let reachability = reachability_property_names();
        model
            .checker()
            .target_max_depth(TARGET_MAX_DEPTH)
            .target_state_count(TARGET_STATE_COUNT)
            .finish_when(HasDiscoveries::AllOf(reachability))
            .spawn_bfs()
            .join()
    }

    fn reachability_property_names() -> BTreeSet<&'static str> {
        [
            CAN_REJECT_PRE_AUTH_NAME,
            CAN_REJECT_NOT_OPEN_NAME,
            CAN_REJECT_READONLY_WRITE_NAME,
            CAN_COMPLETE_WRITE_OPERATION_NAME,
            CAN_DELIVER_OUT_OF_ORDER_NAME,
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn default_model_has_reasonable_config() {
        let model = SessionModel::default();
        assert_eq!(model.num_clients, 2);
        assert_eq!(model.max_queue_depth, 2);
        assert!(model.sasl_required);
    }

    #[test]
    fn with_clients_saturates_zero_to_one() {
        let model = SessionModel::with_clients(0);
        assert_eq!(model.num_clients, 1);
    }

    #[test]
    fn with_clients_honours_requested_count() {
        let model = SessionModel::with_clients(3);
        assert_eq!(model.num_clients, 3);
    }

    #[test]
    fn minimal_model_is_single_client() {
        let model = SessionModel::minimal();
        assert_eq!(model.num_clients, 1);
    }

    #[test]
    fn actions_include_open_and_complete_auth_before_either_happens() {
        let model = SessionModel::minimal();
        let state = SystemState::new(model.num_clients, model.sasl_required);
        let mut actions = Vec::new();
        model.actions(&state, &mut actions);
        assert!(actions.contains(&Action::Open { client: 0, readonly: false }));
        assert!(actions.contains(&Action::Open { client: 0, readonly: true }));
        assert!(actions.contains(&Action::CompleteAuth { client: 0 }));
    }

    #[test]
    fn actions_omit_complete_auth_once_cleared() {
        let model = SessionModel::minimal();
        let mut state = SystemState::new(model.num_clients, model.sasl_required);
        state.sessions[0].auth_cleared = true;
        let mut actions = Vec::new();
        model.actions(&state, &mut actions);
        assert!(!actions.contains(&Action::CompleteAuth { client: 0 }));
    }

    #[test]
    fn send_request_actions_stop_at_queue_depth() {
        let model = SessionModel { num_clients: 1, max_queue_depth: 1, sasl_required: false };
        let mut state = SystemState::new(1, false);
        state.queues[0].push(RequestKind::ReadQuery);
        let mut actions = Vec::new();
        model.actions(&state, &mut actions);
        assert!(!actions.iter().any(|a| matches!(a, Action::SendRequest { .. })));
    }

    const MIN_STATE_COUNT: usize = 10;

    #[test]
    fn minimal_model_verifies_successfully() {
        let checker = verify_bounded(SessionModel::minimal());
        assert!(checker.unique_state_count() >= MIN_STATE_COUNT);
    }

    #[test]
    fn two_client_model_explores_multiple_states() {
        let checker = verify_bounded(SessionModel::with_clients(2));
        assert!(
            checker.unique_state_count() >= MIN_STATE_COUNT,
            "expected >= {MIN_STATE_COUNT} states, got {}",
            checker.unique_state_count()
        );
    }

    #[test]
    fn properties_includes_safety_and_reachability() {
        let model = SessionModel::default();
        let props = model.properties();
        assert!(props.len() >= 7);
        assert!(props.iter().any(|p| p.name.contains("auth completion")));
        assert!(props.iter().any(|p| p.name.contains("read-only")));
        assert!(props.iter().any(|p| p.name.contains("reject")));
    }
}
