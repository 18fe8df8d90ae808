//! Error types for HART frame encoding and decoding

use thiserror::Error;

/// Errors raised while building a frame, before any bytes are produced
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EncodeError {
    /// Address field does not fit the selected frame format
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// Payload exceeds the one-byte byte count
    #[error("payload too large: {len} bytes (max {max})")]
    PayloadTooLarge { len: usize, max: usize },

    /// Preamble count outside the range a master may send
    #[error("invalid preamble count: {count} (expected {min}..={max})")]
    InvalidPreambleCount { count: u8, min: u8, max: u8 },
}

/// Errors raised while parsing a received byte sequence
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// No 0xFF preamble before the delimiter
    #[error("missing preamble")]
    MissingPreamble,

    /// Delimiter byte is not one of the known start characters
    #[error("malformed delimiter: 0x{0:02X}")]
    MalformedDelimiter(u8),

    /// Sequence ends before the frame is complete
    #[error("truncated frame: need {needed} more bytes")]
    Truncated { needed: usize },

    /// Received checksum disagrees with the computed one
    #[error("checksum mismatch: expected 0x{expected:02X}, got 0x{actual:02X}")]
    ChecksumMismatch { expected: u8, actual: u8 },

    /// Bytes left over after the checksum
    #[error("{0} trailing bytes after checksum")]
    TrailingBytes(usize),
}

/// Errors raised while interpreting the data of a response
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReplyError {
    /// Response payload shorter than the two status bytes
    #[error("response is missing status bytes")]
    MissingStatus,

    /// Command data shorter than the command's layout
    #[error("command {command}: expected {expected} data bytes, got {actual}")]
    ShortData {
        command: u8,
        expected: usize,
        actual: usize,
    },
}
