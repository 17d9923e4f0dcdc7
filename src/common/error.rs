//! Error types for raw-file parsing
//!
//! Clean termination (end of stream, unknown frame marker, truncated frame)
//! is not an error; see [`crate::reader::StopReason`]. Everything here
//! aborts the parse without a usable dataset.

use thiserror::Error;

use crate::config::ConfigError;
use crate::reader::decoder::{DecodeError, PingClock};

/// Errors that abort a parse
#[derive(Error, Debug)]
pub enum ParseError {
    /// I/O error outside of frame decoding (opening the file, reading a header)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Parameter table could not be loaded or is malformed
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Sample block could not be decoded
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    /// A header field expected constant across pings changed mid-file
    #[error("Header value {field} is not constant for each ping ({distinct} distinct values)")]
    Inconsistent { field: &'static str, distinct: usize },

    /// Time subfields do not form a calendar time
    #[error("Ping {ping} has an invalid time: {clock}")]
    InvalidPingTime { ping: usize, clock: String },

    /// Read attempted after an earlier error aborted the reader
    #[error("Reader failed at ping {ping}")]
    ReaderFailed { ping: usize },
}

impl ParseError {
    /// Create a configuration-inconsistency error
    pub fn inconsistent(field: &'static str, distinct: usize) -> Self {
        Self::Inconsistent { field, distinct }
    }

    /// Create an invalid ping time error
    pub fn invalid_ping_time(ping: usize, clock: &PingClock) -> Self {
        Self::InvalidPingTime {
            ping,
            clock: clock.to_string(),
        }
    }

    /// Name of the offending field for configuration-inconsistency errors
    pub fn inconsistent_field(&self) -> Option<&'static str> {
        match self {
            Self::Inconsistent { field, .. } => Some(*field),
            _ => None,
        }
    }
}

/// Result type alias using ParseError
pub type ParseResult<T> = Result<T, ParseError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inconsistent_error() {
        let err = ParseError::inconsistent("serial_number", 2);
        let msg = err.to_string();
        assert!(msg.contains("serial_number"));
        assert!(msg.contains("not constant"));
        assert_eq!(err.inconsistent_field(), Some("serial_number"));
    }

    #[test]
    fn test_invalid_ping_time_error() {
        let clock = PingClock {
            year: 2021,
            month: 13,
            day: 1,
            hour: 0,
            minute: 0,
            second: 0,
            hundredths: 0,
        };
        let err = ParseError::invalid_ping_time(7, &clock);
        let msg = err.to_string();
        assert!(msg.contains("Ping 7"));
        assert!(msg.contains("2021-13-01"));
        assert_eq!(err.inconsistent_field(), None);
    }

    #[test]
    fn test_reader_failed_error() {
        let err = ParseError::ReaderFailed { ping: 3 };
        assert_eq!(err.to_string(), "Reader failed at ping 3");
        assert_eq!(err.inconsistent_field(), None);
    }

    #[test]
    fn test_io_error_from() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: ParseError = io_err.into();
        assert!(err.to_string().contains("I/O error"));
    }

    #[test]
    fn test_decode_error_from() {
        let err: ParseError = DecodeError::ChannelCount {
            header: 4,
            configured: 2,
        }
        .into();
        assert!(err.to_string().starts_with("Decode error"));
    }
}
