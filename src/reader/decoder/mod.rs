//! Decoder module for AZFP raw data
//!
//! Converts the binary ping records of an AZFP `.01A` file into
//! [`PingHeader`]s and per-channel [`ChannelCounts`].

pub mod common;
pub mod header;
pub mod samples;

pub use common::constants::{FILE_TYPE, FREQUENCY_SLOT_WIDTH, HEADER_SIZE};
pub use common::{ChannelCounts, DecodeError, PingClock, PingHeader, SampleEncoding};
pub use header::{FrameKind, HeaderDecoder};
pub use samples::SampleDecoder;
