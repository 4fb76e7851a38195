//! SASL negotiation: the challenge/response sub-state-machine driven by the
//! `AuthSaslInit`/`AuthSaslStart`/`AuthSaslStep` procedures.
//!
//! The distinction between "no data" (`None`) and "empty data" (`Some(vec![])`)
//! is load-bearing for real SASL mechanisms and is preserved end to end: a
//! step callback returning `None` means the mechanism has nothing to send,
//! not that it sent a zero-length message.

use thiserror::Error;

/// Outcome of feeding one round of client data into a mechanism.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// Negotiation needs another round; `server_out` is this round's
    /// response to send back.
    Continue {
        /// Data to send to the client, if the mechanism produced any.
        server_out: Option<Vec<u8>>,
    },
    /// Negotiation has completed successfully.
    Complete {
        /// Final data to send to the client, if the mechanism produced any.
        server_out: Option<Vec<u8>>,
        /// The authenticated principal name.
        authzid: String,
    },
}

/// Negotiation failed outright (bad credentials, protocol violation, or the
/// mechanism name is unknown).
#[derive(Debug, Error)]
pub enum SaslError {
    /// No mechanism by this name is registered.
    #[error("unknown SASL mechanism {0:?}")]
    UnknownMechanism(String),
    /// The mechanism rejected the client's data.
    #[error("SASL negotiation failed: {0}")]
    Rejected(String),
    /// A step was attempted on a session that already finished or never
    /// started.
    #[error("SASL session is not in a state that accepts this step")]
    BadState,
}

/// One in-flight SASL negotiation. Mechanisms are free to hold whatever
/// internal state they need between `start`/`step` calls.
pub trait SaslSession: Send {
    /// First round: begin negotiation with the client's initial response, if
    /// any.
    fn start(&mut self, client_in: Option<&[u8]>) -> Result<StepOutcome, SaslError>;
    /// A subsequent round.
    fn step(&mut self, client_in: Option<&[u8]>) -> Result<StepOutcome, SaslError>;
}

/// Names the mechanisms this engine can negotiate and starts sessions for
/// them. The in-tree engine only implements `PLAIN`; a production deployment
/// swaps this for a binding to a real SASL library without changing callers.
pub trait SaslEngine: Send + Sync {
    /// Mechanism names offered to clients, in preference order.
    fn mechanisms(&self) -> &[&str];
    /// Start a new session for `mechanism`.
    ///
    /// # Errors
    /// Returns [`SaslError::UnknownMechanism`] if `mechanism` is not one of
    /// [`mechanisms`](Self::mechanisms).
    fn new_session(&self, mechanism: &str) -> Result<Box<dyn SaslSession>, SaslError>;
}

/// Minimal engine offering only the `PLAIN` mechanism, checked against a
/// fixed in-memory credential table. Adequate for development and the test
/// suite; not suitable as a production authentication backend.
pub struct PlainEngine {
    credentials: Vec<(String, String)>,
}

impl PlainEngine {
    /// Build an engine that accepts exactly the given `(username, password)`
    /// pairs.
    #[must_use]
    pub fn new(credentials: Vec<(String, String)>) -> Self {
        Self { credentials }
    }

    fn check(&self, authzid: &str, password: &str) -> bool {
        self.credentials
            .iter()
            .any(|(user, pass)| user == authzid && pass == password)
    }
}

impl SaslEngine for PlainEngine {
    fn mechanisms(&self) -> &[&str] {
        &["PLAIN"]
    }

    fn new_session(&self, mechanism: &str) -> Result<Box<dyn SaslSession>, SaslError> {
        if mechanism != "PLAIN" {
            return Err(SaslError::UnknownMechanism(mechanism.to_owned()));
        }
        Ok(Box::new(PlainSession {
            credentials: self.credentials.clone(),
        }))
    }
}

struct PlainSession {
    credentials: Vec<(String, String)>,
}

impl PlainSession {
    fn check(&self, authzid: &str, password: &str) -> bool {
        self.credentials
            .iter()
            .any(|(user, pass)| user == authzid && pass == password)
    }
}

impl SaslSession for PlainSession {
    fn start(&mut self, client_in: Option<&[u8]>) -> Result<StepOutcome, SaslError> {
        // RFC 4616: authzid NUL authcid NUL passwd, all in one message.
        let data = client_in.ok_or_else(|| SaslError::Rejected("PLAIN requires an initial response".to_owned()))?;
        let mut fields = data.split(|&b| b == 0);
        let _authzid = fields.next().unwrap_or(&[]);
        let authcid = fields.next().ok_or_else(|| SaslError::Rejected("malformed PLAIN message".to_owned()))?;
        let password = fields.next().ok_or_else(|| SaslError::Rejected("malformed PLAIN message".to_owned()))?;
        let authcid = String::from_utf8_lossy(authcid).into_owned();
        let password = String::from_utf8_lossy(password).into_owned();
        if self.check(&authcid, &password) {
            Ok(StepOutcome::Complete {
                server_out: None,
                authzid: authcid,
            })
        } else {
            Err(SaslError::Rejected("invalid credentials".to_owned()))
        }
    }

    fn step(&mut self, _client_in: Option<&[u8]>) -> Result<StepOutcome, SaslError> {
        Err(SaslError::BadState)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain_message(authzid: &str, authcid: &str, password: &str) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(authzid.as_bytes());
        out.push(0);
        out.extend_from_slice(authcid.as_bytes());
        out.push(0);
        out.extend_from_slice(password.as_bytes());
        out
    }

    #[test]
    fn correct_credentials_complete_in_one_round() {
        let engine = PlainEngine::new(vec![("alice".to_owned(), "secret".to_owned())]);
        let mut session = engine.new_session("PLAIN").unwrap();
        let msg = plain_message("", "alice", "secret");
        let outcome = session.start(Some(&msg)).unwrap();
        match outcome {
            StepOutcome::Complete { authzid, server_out } => {
                assert_eq!(authzid, "alice");
                assert_eq!(server_out, None);
            }
            StepOutcome::Continue { .. } => panic!("expected completion"),
        }
    }

    #[test]
    fn wrong_password_is_rejected() {
        let engine = PlainEngine::new(vec![("alice".to_owned(), "secret".to_owned())]);
        let mut session = engine.new_session("PLAIN").unwrap();
        let msg = plain_message("", "alice", "wrong");
        assert!(session.start(Some(&msg)).is_err());
    }

    #[test]
    fn missing_initial_response_is_rejected() {
        let engine = PlainEngine::new(vec![("alice".to_owned(), "secret".to_owned())]);
        let mut session = engine.new_session("PLAIN").unwrap();
        assert!(session.start(None).is_err());
    }

    #[test]
    fn unknown_mechanism_is_rejected() {
        let engine = PlainEngine::new(Vec::new());
        assert!(matches!(engine.new_session("GSSAPI"), Err(SaslError::UnknownMechanism(_))));
    }
}
