//! Message header: the fixed shape every frame begins with, and the four
//! equality checks every inbound frame must pass before a handler runs.

use crate::wire::{Reader, WireError, Writer};

/// Expected program identifier. A frame whose `prog` differs is rejected
/// regardless of `vers`.
pub const PROGRAM: u32 = 0x2000_8086;
/// The single protocol version this dispatcher speaks. Multiple
/// simultaneously supported major versions are explicitly out of scope.
pub const PROTOCOL_VERSION: u32 = 1;

/// Which way a message flows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Client to server.
    Call,
    /// Server to client.
    Reply,
}

impl Direction {
    const fn to_wire(self) -> u32 {
        match self {
            Self::Call => 0,
            Self::Reply => 1,
        }
    }

    const fn from_wire(value: u32) -> Option<Self> {
        match value {
            0 => Some(Self::Call),
            1 => Some(Self::Reply),
            _ => None,
        }
    }
}

/// Whether a message carries a successful result or an error body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Body is the procedure's result record.
    Ok,
    /// Body is a wire error record.
    Error,
}

impl Status {
    const fn to_wire(self) -> u32 {
        match self {
            Self::Ok => 0,
            Self::Error => 1,
        }
    }

    const fn from_wire(value: u32) -> Option<Self> {
        match value {
            0 => Some(Self::Ok),
            1 => Some(Self::Error),
            _ => None,
        }
    }
}

/// The fixed header every frame begins with, mirrored byte-for-byte between
/// request and reply so a client can always correlate the two.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageHeader {
    /// Program identifier; must equal [`PROGRAM`] on inbound frames.
    pub prog: u32,
    /// Protocol version; must equal [`PROTOCOL_VERSION`] on inbound frames.
    pub vers: u32,
    /// Procedure number, interpreted by [`crate::procedure::Procedure`].
    pub proc: u32,
    /// Call or reply.
    pub direction: Direction,
    /// Ok or error.
    pub status: Status,
    /// Client-assigned correlation id, echoed verbatim into the reply.
    pub serial: u32,
}

/// Raised when a header's raw `direction`/`status` word has no matching enum
/// variant. Distinct from the four semantic equality checks in
/// [`validate_inbound`] because it happens during decode, before there is a
/// header to validate.
#[derive(Debug, thiserror::Error)]
pub enum HeaderDecodeError {
    /// The buffer did not contain a complete header.
    #[error(transparent)]
    Wire(#[from] WireError),
    /// `direction` was neither `CALL` (0) nor `REPLY` (1).
    #[error("invalid direction word {0}")]
    InvalidDirection(u32),
    /// `status` was neither `OK` (0) nor `ERROR` (1).
    #[error("invalid status word {0}")]
    InvalidStatus(u32),
}

impl MessageHeader {
    /// Size in bytes of the encoded header.
    pub const WIRE_SIZE: usize = 4 * 6;

    /// Decode a header from the front of `reader`.
    pub fn decode(reader: &mut Reader<'_>) -> Result<Self, HeaderDecodeError> {
        let prog = reader.read_u32()?;
        let vers = reader.read_u32()?;
        let proc = reader.read_u32()?;
        let direction_word = reader.read_u32()?;
        let status_word = reader.read_u32()?;
        let serial = reader.read_u32()?;
        let direction =
            Direction::from_wire(direction_word).ok_or(HeaderDecodeError::InvalidDirection(direction_word))?;
        let status = Status::from_wire(status_word).ok_or(HeaderDecodeError::InvalidStatus(status_word))?;
        Ok(Self {
            prog,
            vers,
            proc,
            direction,
            status,
            serial,
        })
    }

    /// Encode the header.
    pub fn encode(&self, writer: &mut Writer) {
        writer.write_u32(self.prog);
        writer.write_u32(self.vers);
        writer.write_u32(self.proc);
        writer.write_u32(self.direction.to_wire());
        writer.write_u32(self.status.to_wire());
        writer.write_u32(self.serial);
    }

    /// Build the reply header mirroring this request's correlation fields.
    #[must_use]
    pub const fn reply(&self, status: Status) -> Self {
        Self {
            prog: self.prog,
            vers: self.vers,
            proc: self.proc,
            direction: Direction::Reply,
            status,
            serial: self.serial,
        }
    }

    /// Canonical fallback header used when no inbound header is available to
    /// mirror (e.g. the frame didn't even decode far enough to read one).
    #[must_use]
    pub const fn fallback() -> Self {
        Self {
            prog: PROGRAM,
            vers: PROTOCOL_VERSION,
            proc: crate::procedure::Procedure::Open as u32,
            direction: Direction::Reply,
            status: Status::Error,
            serial: 1,
        }
    }
}

/// Reason an inbound header failed the four equality checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum HeaderValidationError {
    /// `prog` did not match [`PROGRAM`].
    #[error("program mismatch")]
    ProgramMismatch,
    /// `vers` did not match [`PROTOCOL_VERSION`].
    #[error("version mismatch")]
    VersionMismatch,
    /// `direction` was not `CALL`.
    #[error("expected a call, not a reply")]
    NotACall,
    /// `status` was not `OK`.
    #[error("expected status ok on an inbound call")]
    StatusNotOk,
}

/// Enforce the four equality checks every inbound frame must pass.
pub fn validate_inbound(header: &MessageHeader) -> Result<(), HeaderValidationError> {
    if header.prog != PROGRAM {
        return Err(HeaderValidationError::ProgramMismatch);
    }
    if header.vers != PROTOCOL_VERSION {
        return Err(HeaderValidationError::VersionMismatch);
    }
    if header.direction != Direction::Call {
        return Err(HeaderValidationError::NotACall);
    }
    if header.status != Status::Ok {
        return Err(HeaderValidationError::StatusNotOk);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> MessageHeader {
        MessageHeader {
            prog: PROGRAM,
            vers: PROTOCOL_VERSION,
            proc: 5,
            direction: Direction::Call,
            status: Status::Ok,
            serial: 42,
        }
    }

    #[test]
    fn decode_then_encode_is_byte_identical() {
        let header = sample();
        let mut w = Writer::new();
        header.encode(&mut w);
        let bytes = w.into_bytes();
        let mut r = Reader::new(&bytes);
        let decoded = MessageHeader::decode(&mut r).unwrap();
        assert_eq!(decoded, header);
        let mut w2 = Writer::new();
        decoded.encode(&mut w2);
        assert_eq!(w2.into_bytes(), bytes);
    }

    #[test]
    fn valid_header_passes() {
        assert!(validate_inbound(&sample()).is_ok());
    }

    #[test]
    fn version_mismatch_is_rejected() {
        let mut header = sample();
        header.vers += 1;
        assert_eq!(
            validate_inbound(&header),
            Err(HeaderValidationError::VersionMismatch)
        );
    }

    #[test]
    fn reply_direction_is_rejected_as_inbound() {
        let mut header = sample();
        header.direction = Direction::Reply;
        assert_eq!(validate_inbound(&header), Err(HeaderValidationError::NotACall));
    }

    #[test]
    fn reply_mirrors_correlation_fields() {
        let header = sample();
        let reply = header.reply(Status::Error);
        assert_eq!(reply.prog, header.prog);
        assert_eq!(reply.vers, header.vers);
        assert_eq!(reply.proc, header.proc);
        assert_eq!(reply.serial, header.serial);
        assert_eq!(reply.direction, Direction::Reply);
        assert_eq!(reply.status, Status::Error);
    }
}
