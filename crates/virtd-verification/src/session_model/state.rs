//! State shape for the auth-gate model: sessions, requests, and effects.

/// Stand-in for [`virtd::procedure::Procedure`], collapsed to the three
/// combinations of `allowed_pre_auth`/`requires_write` that the gate
/// actually distinguishes between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    /// Mirrors `Procedure::AuthList`/`AuthSaslInit`/`AuthSaslStart`/
    /// `AuthSaslStep`: admitted regardless of auth state, needs no open
    /// connection, never writes.
    AuthBootstrap,
    /// Mirrors a post-auth read-only procedure such as `DomainGetInfo`:
    /// requires the gate clear and a connection open, never writes.
    ReadQuery,
    /// Mirrors a post-auth write procedure such as `DomainDestroy`:
    /// requires the gate clear, a connection open, and the session not
    /// read-only.
    WriteOperation,
}

impl RequestKind {
    /// All request kinds the model generates actions for.
    pub const fn all() -> [Self; 3] {
        [Self::AuthBootstrap, Self::ReadQuery, Self::WriteOperation]
    }

    /// Mirrors `Procedure::allowed_pre_auth`.
    #[must_use]
    pub const fn allowed_pre_auth(self) -> bool {
        matches!(self, Self::AuthBootstrap)
    }

    /// Mirrors `Procedure::requires_write`.
    #[must_use]
    pub const fn requires_write(self) -> bool {
        matches!(self, Self::WriteOperation)
    }

    /// Mirrors the `open_conn` check every non-bootstrap handler makes.
    #[must_use]
    pub const fn requires_open_connection(self) -> bool {
        !matches!(self, Self::AuthBootstrap)
    }
}

/// One client's modelled session state. Mirrors
/// `virtd::session::ClientSession`, minus the boxed live SASL session
/// (`AuthState::Negotiating` carries no state this model's properties
/// depend on, so it collapses into a plain `auth_cleared: bool`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModelSession {
    /// Whether `Open` has been called on this connection yet.
    pub opened: bool,
    /// Whether the connection was opened read-only.
    pub readonly: bool,
    /// Whether the auth gate has cleared (`AuthState::Clear`).
    pub auth_cleared: bool,
}

impl ModelSession {
    /// A fresh session, as `ClientSession::new` builds one: auth starts
    /// clear unless SASL is required.
    #[must_use]
    pub const fn new(sasl_required: bool) -> Self {
        Self {
            opened: false,
            readonly: false,
            auth_cleared: !sasl_required,
        }
    }
}

/// One observable effect of a request being delivered. Mirrors the
/// `HandlerError` variants and successful dispatch outcomes a real
/// connection task would produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Effect {
    /// SASL negotiation completed; the gate cleared for this client.
    AuthCompleted { client: usize },
    /// `Open` succeeded with the given readonly flag.
    Opened { client: usize, readonly: bool },
    /// Rejected: the gate has not cleared and this request isn't admitted
    /// pre-auth.
    RejectedPreAuth { client: usize, kind: RequestKind },
    /// Rejected: no connection is open for this session.
    RejectedNotOpen { client: usize, kind: RequestKind },
    /// Rejected: the session is read-only and this request writes.
    RejectedReadonly { client: usize, kind: RequestKind },
    /// A read-only request completed.
    ReadEffectCompleted { client: usize },
    /// A write request completed.
    WriteEffectCompleted { client: usize },
}

impl Effect {
    /// The client this effect concerns.
    #[must_use]
    pub const fn client(self) -> usize {
        match self {
            Self::AuthCompleted { client }
            | Self::Opened { client, .. }
            | Self::RejectedPreAuth { client, .. }
            | Self::RejectedNotOpen { client, .. }
            | Self::RejectedReadonly { client, .. }
            | Self::ReadEffectCompleted { client }
            | Self::WriteEffectCompleted { client } => client,
        }
    }
}

/// The full modelled system: one [`ModelSession`] and one request queue per
/// client, plus the ordered history of effects produced so far.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SystemState {
    pub sessions: Vec<ModelSession>,
    pub queues: Vec<Vec<RequestKind>>,
    pub effects: Vec<Effect>,
}

impl SystemState {
    #[must_use]
    pub fn new(num_clients: usize, sasl_required: bool) -> Self {
        Self {
            sessions: (0..num_clients).map(|_| ModelSession::new(sasl_required)).collect(),
            queues: vec![Vec::new(); num_clients],
            effects: Vec::new(),
        }
    }

    #[must_use]
    pub fn num_clients(&self) -> usize {
        self.sessions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(true, false)]
    #[case(false, true)]
    fn fresh_session_auth_cleared_matches_sasl_required(#[case] sasl_required: bool, #[case] expect_cleared: bool) {
        let session = ModelSession::new(sasl_required);
        assert_eq!(session.auth_cleared, expect_cleared);
        assert!(!session.opened);
        assert!(!session.readonly);
    }

    #[rstest]
    #[case(RequestKind::AuthBootstrap, true, false, false)]
    #[case(RequestKind::ReadQuery, false, false, true)]
    #[case(RequestKind::WriteOperation, false, true, true)]
    fn request_kind_gating_flags(
        #[case] kind: RequestKind,
        #[case] allowed_pre_auth: bool,
        #[case] requires_write: bool,
        #[case] requires_open: bool,
    ) {
        assert_eq!(kind.allowed_pre_auth(), allowed_pre_auth);
        assert_eq!(kind.requires_write(), requires_write);
        assert_eq!(kind.requires_open_connection(), requires_open);
    }

    #[test]
    fn system_state_starts_with_empty_queues_and_effects() {
        let state = SystemState::new(2, true);
        assert_eq!(state.num_clients(), 2);
        assert!(state.queues.iter().all(Vec::is_empty));
        assert!(state.effects.is_empty());
    }
}
