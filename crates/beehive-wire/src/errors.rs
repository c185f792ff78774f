//! Errors raised while reading or writing a framed message (§6.1).

/// Failure modes that map directly onto §6.1's wire-level response codes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WireError {
    /// A frame's trailing CRC didn't match the running checksum — wire
    /// code 1 (`messageTransmissionError`); the session drops the frame
    /// and keeps going rather than tearing down the connection.
    #[error("frame CRC mismatch: expected {expected:#06x}, computed {computed:#06x}")]
    TransmissionError {
        /// CRC read off the wire.
        expected: u16,
        /// CRC the reader actually accumulated.
        computed: u16,
    },

    /// The buffer ran out of bytes before a field could be fully read.
    #[error("frame ended early while reading {field}")]
    UnexpectedEof {
        /// Name of the field being read when the buffer ran dry.
        field: &'static str,
    },

    /// A length-prefixed field exceeded §6.1's length caps (255 bytes for
    /// u8-prefixed strings, 32 767 for u16-prefixed payloads).
    #[error("{field} length {len} exceeds cap {cap}")]
    LengthExceeded {
        /// Name of the offending field.
        field: &'static str,
        /// Declared length.
        len: usize,
        /// The cap it violated.
        cap: usize,
    },

    /// A string field was not valid UTF-8.
    #[error("{field} is not valid UTF-8")]
    InvalidUtf8 {
        /// Name of the offending field.
        field: &'static str,
    },

    /// A UUID field's text form did not parse.
    #[error("{field} is not a valid UUID")]
    InvalidUuid {
        /// Name of the offending field.
        field: &'static str,
    },

    /// A tag byte did not map to any known auth opener or operation.
    #[error("unknown tag byte {0:#04x}")]
    UnknownTag(u8),
}
