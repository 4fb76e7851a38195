//! Actions the model can take, and the pure transition function applying
//! one to a [`SystemState`].

use super::state::{Effect, RequestKind, SystemState};

/// One step the model can take. `CompleteAuth` abstracts a successful SASL
/// negotiation; this model does not simulate mechanism bytes, only the
/// state-machine transition `apply_outcome` performs on success.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    /// `Open` succeeds with the given readonly flag.
    Open { client: usize, readonly: bool },
    /// SASL negotiation completes and the gate clears.
    CompleteAuth { client: usize },
    /// A client enqueues a request.
    SendRequest { client: usize, kind: RequestKind },
    /// The server dequeues and dispatches one pending request. Indexing by
    /// position (rather than always the front) lets the model explore
    /// out-of-order delivery across clients.
    DeliverRequest { client: usize, queue_index: usize },
}

impl Action {
    #[must_use]
    pub const fn client(self) -> usize {
        match self {
            Self::Open { client, .. }
            | Self::CompleteAuth { client }
            | Self::SendRequest { client, .. }
            | Self::DeliverRequest { client, .. } => client,
        }
    }
}

/// Whether `action` has a sensible precondition against `state` — mirrors
/// the guard checks `Stateright`'s `actions()` callback applies before ever
/// generating an action, so `next_state` never has to reject one.
#[must_use]
pub fn is_valid_action(state: &SystemState, action: Action) -> bool {
    let client = action.client();
    if client >= state.num_clients() {
        return false;
    }
    match action {
        Action::Open { client, .. } => !state.sessions[client].opened,
        Action::CompleteAuth { client } => !state.sessions[client].auth_cleared,
        Action::SendRequest { .. } => true,
        Action::DeliverRequest { client, queue_index } => queue_index < state.queues[client].len(),
    }
}

/// Apply `action` to `state`, returning the resulting state. Pure: never
/// mutates `state` in place.
#[must_use]
pub fn apply_action(state: &SystemState, action: Action) -> SystemState {
    let mut next = state.clone();
    match action {
        Action::Open { client, readonly } => apply_open(&mut next, client, readonly),
        Action::CompleteAuth { client } => apply_complete_auth(&mut next, client),
        Action::SendRequest { client, kind } => apply_send_request(&mut next, client, kind),
        Action::DeliverRequest { client, queue_index } => apply_deliver_request(&mut next, client, queue_index),
    }
    next
}

fn apply_open(state: &mut SystemState, client: usize, readonly: bool) {
    let session = &mut state.sessions[client];
    session.opened = true;
    session.readonly = readonly;
    state.effects.push(Effect::Opened { client, readonly });
}

fn apply_complete_auth(state: &mut SystemState, client: usize) {
    state.sessions[client].auth_cleared = true;
    state.effects.push(Effect::AuthCompleted { client });
}

fn apply_send_request(state: &mut SystemState, client: usize, kind: RequestKind) {
    state.queues[client].push(kind);
}

fn apply_deliver_request(state: &mut SystemState, client: usize, queue_index: usize) {
    let kind = state.queues[client].remove(queue_index);
    let session = &state.sessions[client];

    let effect = if !session.auth_cleared && !kind.allowed_pre_auth() {
        Effect::RejectedPreAuth { client, kind }
    } else if kind.requires_open_connection() && !session.opened {
        Effect::RejectedNotOpen { client, kind }
    } else if kind.requires_write() && session.readonly {
        Effect::RejectedReadonly { client, kind }
    } else if kind.requires_write() {
        Effect::WriteEffectCompleted { client }
    } else {
        Effect::ReadEffectCompleted { client }
    };
    state.effects.push(effect);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session_model::state::ModelSession;

    #[test]
    fn open_records_readonly_flag_and_marks_opened() {
        let state = SystemState::new(1, false);
        let next = apply_action(&state, Action::Open { client: 0, readonly: true });
        assert!(next.sessions[0].opened);
        assert!(next.sessions[0].readonly);
        assert_eq!(next.effects, vec![Effect::Opened { client: 0, readonly: true }]);
    }

    #[test]
    fn complete_auth_clears_the_gate() {
        let state = SystemState::new(1, true);
        assert!(!state.sessions[0].auth_cleared);
        let next = apply_action(&state, Action::CompleteAuth { client: 0 });
        assert!(next.sessions[0].auth_cleared);
    }

    #[test]
    fn bootstrap_request_admitted_before_auth_clears() {
        let mut state = SystemState::new(1, true);
        state.queues[0].push(RequestKind::AuthBootstrap);
        let next = apply_action(&state, Action::DeliverRequest { client: 0, queue_index: 0 });
        assert_eq!(next.effects, vec![Effect::ReadEffectCompleted { client: 0 }]);
    }

    #[test]
    fn gated_request_rejected_before_auth_clears() {
        let mut state = SystemState::new(1, true);
        state.queues[0].push(RequestKind::ReadQuery);
        let next = apply_action(&state, Action::DeliverRequest { client: 0, queue_index: 0 });
        assert_eq!(
            next.effects,
            vec![Effect::RejectedPreAuth { client: 0, kind: RequestKind::ReadQuery }]
        );
    }

    #[test]
    fn read_query_rejected_without_open_connection() {
        let mut state = SystemState::new(1, false);
        state.queues[0].push(RequestKind::ReadQuery);
        let next = apply_action(&state, Action::DeliverRequest { client: 0, queue_index: 0 });
        assert_eq!(
            next.effects,
            vec![Effect::RejectedNotOpen { client: 0, kind: RequestKind::ReadQuery }]
        );
    }

    #[test]
    fn write_rejected_on_readonly_session() {
        let mut state = SystemState::new(1, false);
        state.sessions[0] = ModelSession { opened: true, readonly: true, auth_cleared: true };
        state.queues[0].push(RequestKind::WriteOperation);
        let next = apply_action(&state, Action::DeliverRequest { client: 0, queue_index: 0 });
        assert_eq!(
            next.effects,
            vec![Effect::RejectedReadonly { client: 0, kind: RequestKind::WriteOperation }]
        );
    }

    #[test]
    fn write_completes_once_open_and_cleared_and_not_readonly() {
        let mut state = SystemState::new(1, false);
        state.sessions[0] = ModelSession { opened: true, readonly: false, auth_cleared: true };
        state.queues[0].push(RequestKind::WriteOperation);
        let next = apply_action(&state, Action::DeliverRequest { client: 0, queue_index: 0 });
        assert_eq!(next.effects, vec![Effect::WriteEffectCompleted { client: 0 }]);
    }

    #[test]
    fn out_of_order_delivery_picks_the_given_index() {
        let mut state = SystemState::new(1, false);
        state.sessions[0] = ModelSession { opened: true, readonly: false, auth_cleared: true };
        state.queues[0].push(RequestKind::ReadQuery);
        state.queues[0].push(RequestKind::WriteOperation);
        let next = apply_action(&state, Action::DeliverRequest { client: 0, queue_index: 1 });
        assert_eq!(next.queues[0], vec![RequestKind::ReadQuery]);
        assert_eq!(next.effects, vec![Effect::WriteEffectCompleted { client: 0 }]);
    }

    #[test]
    fn is_valid_action_rejects_reopen() {
        let mut state = SystemState::new(1, false);
        state.sessions[0].opened = true;
        assert!(!is_valid_action(&state, Action::Open { client: 0, readonly: false }));
    }

    #[test]
    fn is_valid_action_rejects_out_of_range_delivery() {
        let state = SystemState::new(1, false);
        assert!(!is_valid_action(&state, Action::DeliverRequest { client: 0, queue_index: 0 }));
    }
}
