//! Error synthesis: turn a driver failure, a decode failure, or a dispatch
//! refusal into the one wire-level error record every failed reply carries.

use crate::driver::DriverError;
use crate::wire::{Reader, WireError, Writer};

/// Text substituted when a handler reports failure but the driver facade has
/// no structured record to explain why.
pub const FALLBACK_MESSAGE: &str = "library function returned error but did not set virterror";

/// The wire-level error record carried in the body of any reply whose header
/// [`crate::header::Status`] is `Error`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorRecord {
    /// Numeric error code.
    pub code: i32,
    /// Originating subsystem/domain code.
    pub domain: i32,
    /// Severity level.
    pub level: i32,
    /// Human-readable message; never empty — see [`FALLBACK_MESSAGE`].
    pub message: String,
    /// First free-form string slot.
    pub str1: Option<String>,
    /// Second free-form string slot.
    pub str2: Option<String>,
    /// Third free-form string slot.
    pub str3: Option<String>,
    /// First free-form integer slot.
    pub int1: i32,
    /// Second free-form integer slot.
    pub int2: i32,
}

impl ErrorRecord {
    /// Generic internal error with no further structure, used for decode and
    /// dispatch-level failures that have no driver-side counterpart.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            code: 1,
            domain: 0,
            level: 2,
            message: message.into(),
            str1: None,
            str2: None,
            str3: None,
            int1: 0,
            int2: 0,
        }
    }

    /// The fixed record used when authentication is required but absent.
    #[must_use]
    pub fn authentication_required() -> Self {
        Self::internal("authentication required")
    }

    /// The fixed record used when a write operation is attempted on a
    /// read-only connection.
    #[must_use]
    pub fn read_only_connection() -> Self {
        Self::internal("read-only connection")
    }

    /// Project a driver-level error into the wire record, preserving its
    /// structured fields verbatim.
    #[must_use]
    pub fn from_driver(err: DriverError) -> Self {
        Self {
            code: err.code,
            domain: err.domain,
            level: err.level,
            message: err.message,
            str1: err.str1,
            str2: err.str2,
            str3: err.str3,
            int1: err.int1,
            int2: err.int2,
        }
    }

    /// Build the fallback record for a handler that reported failure without
    /// the driver facade recording a last-error.
    #[must_use]
    pub fn fallback() -> Self {
        Self::internal(FALLBACK_MESSAGE)
    }

    const STR_MAX: usize = crate::wire::caps::STRING_MAX;

    /// Decode an error record body.
    pub fn decode(reader: &mut Reader<'_>) -> Result<Self, WireError> {
        Ok(Self {
            code: reader.read_i32()?,
            domain: reader.read_i32()?,
            level: reader.read_i32()?,
            message: reader.read_string("error.message", Self::STR_MAX)?,
            str1: reader.read_option(|r| r.read_string("error.str1", Self::STR_MAX))?,
            str2: reader.read_option(|r| r.read_string("error.str2", Self::STR_MAX))?,
            str3: reader.read_option(|r| r.read_string("error.str3", Self::STR_MAX))?,
            int1: reader.read_i32()?,
            int2: reader.read_i32()?,
        })
    }

    /// Encode an error record body.
    pub fn encode(&self, writer: &mut Writer) {
        writer.write_i32(self.code);
        writer.write_i32(self.domain);
        writer.write_i32(self.level);
        writer.write_string(&self.message);
        writer.write_option(self.str1.as_ref(), |w, v| w.write_string(v));
        writer.write_option(self.str2.as_ref(), |w, v| w.write_string(v));
        writer.write_option(self.str3.as_ref(), |w, v| w.write_string(v));
        writer.write_i32(self.int1);
        writer.write_i32(self.int2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_full_record() {
        let record = ErrorRecord {
            code: 9,
            domain: 1,
            level: 2,
            message: "no such domain".to_owned(),
            str1: Some("vm1".to_owned()),
            str2: None,
            str3: None,
            int1: 0,
            int2: 0,
        };
        let mut w = Writer::new();
        record.encode(&mut w);
        let bytes = w.into_bytes();
        let mut r = Reader::new(&bytes);
        assert_eq!(ErrorRecord::decode(&mut r).unwrap(), record);
    }

    #[test]
    fn fallback_uses_the_canonical_message() {
        assert_eq!(ErrorRecord::fallback().message, FALLBACK_MESSAGE);
    }
}
