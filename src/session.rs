//! Per-connection state: the server-wide context shared across clients, and
//! the session state private to one connection.

use std::net::SocketAddr;
use std::sync::Arc;

use crate::driver::{ConnId, DriverFacade};
use crate::sasl::{SaslEngine, SaslSession};

/// Shared, read-only (after startup) state every connection's task borrows.
pub struct ServerContext {
    /// The hypervisor binding every session's `Open` resolves against.
    pub driver: Arc<dyn DriverFacade>,
    /// The SASL engine used to negotiate authentication.
    pub sasl_engine: Arc<dyn SaslEngine>,
    /// Whether a connection must complete SASL before any other procedure is
    /// admitted.
    pub sasl_required: bool,
    /// Whether every session on this listener is forced read-only regardless
    /// of the flags `Open` was called with.
    pub force_readonly: bool,
}

impl ServerContext {
    /// Build a new shared context. `force_readonly` defaults to `false`; set
    /// it via the public field when a listener must reject writes outright.
    #[must_use]
    pub fn new(driver: Arc<dyn DriverFacade>, sasl_engine: Arc<dyn SaslEngine>, sasl_required: bool) -> Self {
        Self {
            driver,
            sasl_engine,
            sasl_required,
            force_readonly: false,
        }
    }
}

/// Where a connection's auth gate currently stands.
pub enum AuthState {
    /// No SASL negotiation outstanding — either it was never required, or a
    /// prior negotiation already completed. Every procedure is admitted.
    Clear,
    /// `AuthSaslInit` has listed mechanisms but `AuthSaslStart` has not yet
    /// chosen one.
    AwaitingMechanism,
    /// `AuthSaslStart` has chosen a mechanism and negotiation is ongoing.
    Negotiating(Box<dyn SaslSession>),
}

/// State private to one client connection, owned by its connection task.
pub struct ClientSession {
    /// The connection's remote address, for logging.
    pub peer: SocketAddr,
    /// The driver connection handle once `Open` has succeeded.
    pub conn: Option<ConnId>,
    /// Whether this session opened its driver connection read-only.
    pub readonly: bool,
    /// Current auth-gate state.
    pub auth: AuthState,
}

impl ClientSession {
    /// Build a fresh session for a newly accepted connection.
    #[must_use]
    pub fn new(peer: SocketAddr, sasl_required: bool) -> Self {
        Self {
            peer,
            conn: None,
            readonly: false,
            auth: if sasl_required { AuthState::AwaitingMechanism } else { AuthState::Clear },
        }
    }

    /// Whether `proc` may run given the current auth state.
    #[must_use]
    pub fn admits(&self, proc: crate::procedure::Procedure) -> bool {
        match self.auth {
            AuthState::Clear => true,
            AuthState::AwaitingMechanism | AuthState::Negotiating(_) => proc.allowed_pre_auth(),
        }
    }
}
