//! Procedure handlers: one function per [`crate::procedure::Procedure`],
//! each decoding its own argument body and encoding its own reply body.
//! [`crate::dispatch`] is the only caller; handlers never touch the wire
//! header or the frame layer.

pub mod connection;
pub mod domain_inspect;
pub mod domain_lifecycle;
pub mod domain_lookup;
pub mod migrate;
pub mod network;
pub mod scheduler;

use thiserror::Error;

use crate::driver::DriverError;
use crate::error::ErrorRecord;
use crate::session::{ClientSession, ServerContext};
use crate::wire::WireError;

/// Everything a handler can fail with. [`crate::dispatch_loop`] converts
/// this into a wire [`ErrorRecord`] uniformly.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// The argument body failed to decode.
    #[error(transparent)]
    Wire(#[from] WireError),
    /// The driver facade reported a structured failure.
    #[error(transparent)]
    Driver(#[from] DriverError),
    /// The procedure requires an open driver connection and none exists.
    #[error("connection is not open")]
    NotOpen,
    /// `Open` was called on a session that already has one.
    #[error("connection already open")]
    AlreadyOpen,
    /// The resolved object does not exist.
    #[error("object not found")]
    NotFound,
    /// The procedure mutates state but the connection is read-only.
    #[error("read-only connection")]
    ReadOnly,
}

impl HandlerError {
    /// Resolve this failure into a wire error record.
    ///
    /// `NotFound` carries no structured detail of its own — a lookup just
    /// returned `None` — so it consults the driver's last-error slot for the
    /// session's connection before falling back to the generic synthetic
    /// message, mirroring how every other driver failure is reported.
    pub(crate) async fn into_record(self, ctx: &ServerContext, session: &ClientSession) -> ErrorRecord {
        match self {
            Self::Wire(e) => ErrorRecord::internal(e.to_string()),
            Self::Driver(e) => ErrorRecord::from_driver(e),
            Self::NotOpen => ErrorRecord::internal(Self::NotOpen.to_string()),
            Self::AlreadyOpen => ErrorRecord::internal(Self::AlreadyOpen.to_string()),
            Self::ReadOnly => ErrorRecord::read_only_connection(),
            Self::NotFound => match ctx.driver.get_last_error(session.conn).await {
                Some(e) => ErrorRecord::from_driver(e),
                None => ErrorRecord::fallback(),
            },
        }
    }
}

/// Resolve the open driver connection for `session`, or fail.
pub(crate) fn open_conn(session: &ClientSession) -> Result<crate::driver::ConnId, HandlerError> {
    session.conn.ok_or(HandlerError::NotOpen)
}

/// Reject a write-style procedure on a read-only connection.
pub(crate) fn require_writable(session: &ClientSession) -> Result<(), HandlerError> {
    if session.readonly {
        Err(HandlerError::ReadOnly)
    } else {
        Ok(())
    }
}

