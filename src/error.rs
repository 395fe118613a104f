use core::fmt;

/// Errors the packet lexer can raise while framing a byte stream.
///
/// These never propagate past the lexer: §7 makes resynchronization the
/// lexer's job, so callers only ever see the accepted packets it emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParserError {
    InvalidChecksum { expect: u16, got: u16 },
    InvalidField { packet: &'static str, field: &'static str },
    InvalidPacketLen { packet: &'static str, expect: usize, got: usize },
    OverLength { got: usize, max: usize },
}

impl fmt::Display for ParserError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParserError::InvalidChecksum { expect, got } => write!(
                f,
                "invalid checksum, expected 0x{expect:04x}, got 0x{got:04x}"
            ),
            ParserError::InvalidField { packet, field } => {
                write!(f, "invalid field {field} of packet {packet}")
            },
            ParserError::InvalidPacketLen { packet, expect, got } => write!(
                f,
                "invalid packet ({packet}) length, expected {expect}, got {got}"
            ),
            ParserError::OverLength { got, max } => {
                write!(f, "packet too long ({got} bytes, max {max})")
            },
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ParserError {}

/// Per-message decode anomalies (§7). A handler logs these and returns
/// whatever subset of the message it could still make sense of; it never
/// bubbles a `DecodeError` back to the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    ShortPayload { packet: &'static str, need: usize, got: usize },
    UnknownVersion { packet: &'static str, version: u8 },
    UnknownTag { tag: &'static str },
    OutOfRange { packet: &'static str, field: &'static str },
    InconsistentEpoch { packet: &'static str, reason: &'static str },
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::ShortPayload { packet, need, got } => write!(
                f,
                "{packet}: short payload, need >= {need} bytes, got {got}"
            ),
            DecodeError::UnknownVersion { packet, version } => {
                write!(f, "{packet}: unknown version {version}")
            },
            DecodeError::UnknownTag { tag } => write!(f, "no handler registered for {tag}"),
            DecodeError::OutOfRange { packet, field } => {
                write!(f, "{packet}: field {field} out of range")
            },
            DecodeError::InconsistentEpoch { packet, reason } => {
                write!(f, "{packet}: inconsistent epoch ({reason})")
            },
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for DecodeError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateTimeError {
    InvalidDate,
    InvalidTime,
    InvalidNanoseconds,
    /// Century could not be disambiguated from the available scratch state.
    CenturyAmbiguous,
}

impl fmt::Display for DateTimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DateTimeError::InvalidDate => f.write_str("invalid date"),
            DateTimeError::InvalidTime => f.write_str("invalid time"),
            DateTimeError::InvalidNanoseconds => f.write_str("invalid nanoseconds"),
            DateTimeError::CenturyAmbiguous => f.write_str("century could not be disambiguated"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for DateTimeError {}
