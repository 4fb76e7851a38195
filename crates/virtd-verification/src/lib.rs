//! Formal verification specifications for the `virtd` auth gate.
//!
//! This crate models [`ClientSession::admits`](../../virtd/session/struct.ClientSession.html)
//! and the readonly/write gate checked by procedure handlers as a
//! [`stateright`] state machine, and exhaustively checks the model for
//! violations of the safety properties a production dispatcher must
//! maintain: no write effect ever completes for a session whose auth gate
//! has not cleared, and none ever completes for a session that opened its
//! connection read-only.
//!
//! The model abstracts the real procedure catalogue down to the three
//! gating classes that matter for these properties
//! ([`session_model::state::RequestKind`]) rather than enumerating every
//! procedure number, and abstracts SASL negotiation itself down to a single
//! `CompleteAuth` transition, since the properties below don't depend on
//! mechanism internals.
//!
//! Run the exhaustive check with `cargo test -p virtd-verification`; see
//! [`session_model`] for the model and its test harness.

pub mod session_model;
