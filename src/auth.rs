//! The auth gate: handlers for `AuthList`/`AuthSaslInit`/`AuthSaslStart`/
//! `AuthSaslStep`, the only procedures admitted while a session is not yet
//! [`AuthState::Clear`](crate::session::AuthState::Clear).

use thiserror::Error;

use crate::sasl::{SaslError, StepOutcome};
use crate::session::{AuthState, ClientSession, ServerContext};

/// Reply to one SASL negotiation round. `data` preserves the
/// present-vs-absent distinction the underlying mechanism produced: `None`
/// means the mechanism sent nothing this round, not that it sent a
/// zero-length message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaslStepReply {
    /// Data to send back to the client, if the mechanism produced any.
    pub data: Option<Vec<u8>>,
    /// Whether negotiation has finished.
    pub complete: bool,
}

/// Raised by the auth procedures when the session is not in a state that
/// accepts the request.
#[derive(Debug, Error)]
pub enum AuthError {
    /// A SASL procedure was called while no negotiation was active, or while
    /// one already was (`AuthSaslInit` called twice).
    #[error("authentication state machine violation")]
    WrongState,
    /// The mechanism negotiation itself failed.
    #[error(transparent)]
    Sasl(#[from] SaslError),
}

/// `AuthList`: the mechanisms this server offers. Not gated by auth state —
/// it is one of the procedures admitted pre-auth.
#[must_use]
pub fn auth_list(ctx: &ServerContext) -> Vec<String> {
    ctx.sasl_engine.mechanisms().iter().map(|&m| m.to_owned()).collect()
}

/// `AuthSaslInit`: move the session into mechanism-selection state.
///
/// # Errors
/// Returns [`AuthError::WrongState`] if a negotiation is already underway.
pub fn auth_sasl_init(ctx: &ServerContext, session: &mut ClientSession) -> Result<Vec<String>, AuthError> {
    match session.auth {
        AuthState::AwaitingMechanism => {}
        AuthState::Clear | AuthState::Negotiating(_) => return Err(AuthError::WrongState),
    }
    Ok(auth_list(ctx))
}

/// `AuthSaslStart`: choose a mechanism and feed it the client's initial
/// response. `data` is `None` when the client sent no initial response at
/// all — distinct from an empty one.
///
/// # Errors
/// Returns [`AuthError::WrongState`] if mechanism selection was not pending,
/// or [`AuthError::Sasl`] if the mechanism name is unknown or negotiation
/// fails outright.
pub fn auth_sasl_start(
    ctx: &ServerContext,
    session: &mut ClientSession,
    mechanism: &str,
    data: Option<&[u8]>,
) -> Result<SaslStepReply, AuthError> {
    if !matches!(session.auth, AuthState::AwaitingMechanism) {
        return Err(AuthError::WrongState);
    }
    let mut sasl_session = ctx.sasl_engine.new_session(mechanism)?;
    let outcome = sasl_session.start(data)?;
    Ok(apply_outcome(session, sasl_session, outcome))
}

/// `AuthSaslStep`: continue a negotiation already in progress.
///
/// # Errors
/// Returns [`AuthError::WrongState`] if no negotiation is in progress, or
/// [`AuthError::Sasl`] if the mechanism rejects this round.
pub fn auth_sasl_step(session: &mut ClientSession, data: Option<&[u8]>) -> Result<SaslStepReply, AuthError> {
    let AuthState::Negotiating(mut sasl_session) = std::mem::replace(&mut session.auth, AuthState::AwaitingMechanism)
    else {
        return Err(AuthError::WrongState);
    };
    let outcome = sasl_session.step(data)?;
    Ok(apply_outcome(session, sasl_session, outcome))
}

fn apply_outcome(
    session: &mut ClientSession,
    sasl_session: Box<dyn crate::sasl::SaslSession>,
    outcome: StepOutcome,
) -> SaslStepReply {
    match outcome {
        StepOutcome::Continue { server_out } => {
            session.auth = AuthState::Negotiating(sasl_session);
            SaslStepReply {
                data: server_out,
                complete: false,
            }
        }
        StepOutcome::Complete { server_out, authzid: _ } => {
            session.auth = AuthState::Clear;
            SaslStepReply {
                data: server_out,
                complete: true,
            }
        }
    }
}
