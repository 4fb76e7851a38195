//! Safety and reachability property definitions for the auth-gate model.
//!
//! Safety properties ("always") must hold in every reachable state.
//! Reachability properties ("sometimes") must be reached on at least one
//! path the checker explores; their absence from the report means the model
//! or its action set is too narrow to exercise the case, not that the case
//! is safe.

use stateright::Property;

use super::{
    state::{Effect, SystemState},
    SessionModel,
};

fn has_prior_auth_completion(state: &SystemState, client: usize, before: usize) -> bool {
    state.effects[..before]
        .iter()
        .any(|e| matches!(e, Effect::AuthCompleted { client: c } if *c == client))
}

fn ever_completed_auth(state: &SystemState, client: usize) -> bool {
    state.effects.iter().any(|e| matches!(e, Effect::AuthCompleted { client: c } if *c == client))
}

fn most_recent_open_readonly(state: &SystemState, client: usize, before: usize) -> Option<bool> {
    state.effects[..before].iter().rev().find_map(|e| match *e {
        Effect::Opened { client: c, readonly } if c == client => Some(readonly),
        _ => None,
    })
}

fn auth_precedes_write_effects(state: &SystemState) -> bool {
    state.effects.iter().enumerate().all(|(idx, effect)| {
        let Effect::WriteEffectCompleted { client } = effect else {
            return true;
        };
        !ever_completed_auth(state, *client) || has_prior_auth_completion(state, *client, idx)
    })
}

fn no_write_completes_on_readonly_session(state: &SystemState) -> bool {
    state.effects.iter().enumerate().all(|(idx, effect)| {
        let Effect::WriteEffectCompleted { client } = effect else {
            return true;
        };
        most_recent_open_readonly(state, *client, idx) == Some(false)
    })
}

/// Safety property: auth completion precedes every write effect.
///
/// A client whose session never needed SASL (it started with the gate
/// already clear) is exempt — there is no `AuthCompleted` event to precede
/// anything.
#[must_use]
pub fn auth_precedes_write_effect() -> Property<SessionModel> {
    Property::always("auth completion precedes every write effect", |_model, state: &SystemState| {
        auth_precedes_write_effects(state)
    })
}

/// Safety property: no write effect completes on a session that opened
/// read-only.
#[must_use]
pub fn no_write_effect_on_readonly_session() -> Property<SessionModel> {
    Property::always("no write effect completes on a read-only session", |_model, state: &SystemState| {
        no_write_completes_on_readonly_session(state)
    })
}

fn state_has_effect(state: &SystemState, predicate: fn(&Effect) -> bool) -> bool {
    state.effects.iter().any(predicate)
}

const fn is_rejected_pre_auth(effect: &Effect) -> bool {
    matches!(effect, Effect::RejectedPreAuth { .. })
}

const fn is_rejected_not_open(effect: &Effect) -> bool {
    matches!(effect, Effect::RejectedNotOpen { .. })
}

const fn is_rejected_readonly(effect: &Effect) -> bool {
    matches!(effect, Effect::RejectedReadonly { .. })
}

const fn is_write_effect_completed(effect: &Effect) -> bool {
    matches!(effect, Effect::WriteEffectCompleted { .. })
}

/// Reachability property name: reject a gated request before auth clears.
pub const CAN_REJECT_PRE_AUTH_NAME: &str = "can reject a gated request before auth clears";
/// Reachability property name: reject a request with no open connection.
pub const CAN_REJECT_NOT_OPEN_NAME: &str = "can reject a request with no open connection";
/// Reachability property name: reject a write on a read-only session.
pub const CAN_REJECT_READONLY_WRITE_NAME: &str = "can reject a write on a read-only session";
/// Reachability property name: complete a write operation.
pub const CAN_COMPLETE_WRITE_OPERATION_NAME: &str = "can complete a write operation";
/// Reachability property name: deliver requests out of send order.
pub const CAN_DELIVER_OUT_OF_ORDER_NAME: &str = "can deliver requests out of send order";

/// Reachability property: the model can reach a state where a gated
/// request was rejected before auth cleared.
#[must_use]
pub fn can_reject_pre_auth() -> Property<SessionModel> {
    Property::sometimes(CAN_REJECT_PRE_AUTH_NAME, |_model, state: &SystemState| {
        state_has_effect(state, is_rejected_pre_auth)
    })
}

/// Reachability property: the model can reach a state where a request was
/// rejected for lacking an open connection.
#[must_use]
pub fn can_reject_not_open() -> Property<SessionModel> {
    Property::sometimes(CAN_REJECT_NOT_OPEN_NAME, |_model, state: &SystemState| {
        state_has_effect(state, is_rejected_not_open)
    })
}

/// Reachability property: the model can reach a state where a write was
/// rejected for a read-only session.
#[must_use]
pub fn can_reject_readonly_write() -> Property<SessionModel> {
    Property::sometimes(CAN_REJECT_READONLY_WRITE_NAME, |_model, state: &SystemState| {
        state_has_effect(state, is_rejected_readonly)
    })
}

/// Reachability property: the model can reach a state where a write
/// operation completed.
#[must_use]
pub fn can_complete_write_operation() -> Property<SessionModel> {
    Property::sometimes(CAN_COMPLETE_WRITE_OPERATION_NAME, |_model, state: &SystemState| {
        state_has_effect(state, is_write_effect_completed)
    })
}

/// Reachability property: the model can reach a state where a client has
/// more than one request queued, i.e. delivery order can diverge from send
/// order.
#[must_use]
pub fn can_deliver_out_of_order() -> Property<SessionModel> {
    Property::sometimes(CAN_DELIVER_OUT_OF_ORDER_NAME, |_model, state: &SystemState| {
        state.queues.iter().any(|q| q.len() > 1)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session_model::actions::{apply_action, Action};
    use crate::session_model::state::RequestKind;

    #[test]
    fn auth_precedes_write_effect_property_is_named() {
        let prop = auth_precedes_write_effect();
        assert!(prop.name.contains("auth completion"));
    }

    #[test]
    fn auth_precedes_write_effects_holds_on_well_formed_history() {
        let mut state = SystemState::new(1, true);
        state = apply_action(&state, Action::CompleteAuth { client: 0 });
        state = apply_action(&state, Action::Open { client: 0, readonly: false });
        state.queues[0].push(RequestKind::WriteOperation);
        state = apply_action(&state, Action::DeliverRequest { client: 0, queue_index: 0 });
        assert!(auth_precedes_write_effects(&state));
    }

    #[test]
    fn auth_precedes_write_effects_flags_a_hand_built_violation() {
        let mut state = SystemState::new(1, true);
        state.effects.push(Effect::WriteEffectCompleted { client: 0 });
        assert!(!auth_precedes_write_effects(&state));
    }

    #[test]
    fn auth_precedes_write_effects_exempts_a_session_that_never_required_auth() {
        let mut state = SystemState::new(1, false);
        state.effects.push(Effect::WriteEffectCompleted { client: 0 });
        assert!(auth_precedes_write_effects(&state));
    }

    #[test]
    fn no_write_completes_on_readonly_session_flags_a_hand_built_violation() {
        let mut state = SystemState::new(1, false);
        state.effects.push(Effect::Opened { client: 0, readonly: true });
        state.effects.push(Effect::WriteEffectCompleted { client: 0 });
        assert!(!no_write_completes_on_readonly_session(&state));
    }

    #[test]
    fn no_write_completes_on_readonly_session_passes_for_a_writable_session() {
        let mut state = SystemState::new(1, false);
        state.effects.push(Effect::Opened { client: 0, readonly: false });
        state.effects.push(Effect::WriteEffectCompleted { client: 0 });
        assert!(no_write_completes_on_readonly_session(&state));
    }
}
