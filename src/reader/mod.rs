//! Reader module for AZFP raw files
//!
//! This module provides:
//! - Frame decoders (decoder)
//! - Raw file naming helpers (files)
//! - The stream driver that walks a file ping by ping
//!
//! The driver is a small state machine:
//!
//! ```text
//! Start ──► Reading(n) ──► Reading(n + 1) ──► ...
//!               │
//!               ├──► Stopped(EndOfStream | UnrecognizedFrame | Truncated)
//!               └──► Failed(n)
//! ```
//!
//! None of the stop reasons is an error; pings decoded before the stop are
//! kept. `Failed` is entered on any error and is terminal: no further I/O
//! happens and every later read reports [`ParseError::ReaderFailed`].
//! Finalization ([`RawFileReader::parse`]) consumes the reader and only
//! runs after it reached `Stopped`.

pub mod decoder;
pub mod files;

pub use decoder::{ChannelCounts, DecodeError, FrameKind, PingClock, PingHeader};
pub use files::{is_raw_file, raw_file_hour, RAW_FILE_EXTENSION};

use std::fs::File;
use std::io::{BufReader, ErrorKind, Read};
use std::path::Path;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::calibration::{AncillaryValues, Calibrator};
use crate::common::{ParseError, ParseResult};
use crate::config::InstrumentParameters;
use crate::dataset::{time, UnpackedDataBuilder, UnpackedDataset};
use decoder::{HeaderDecoder, SampleDecoder, HEADER_SIZE};

/// Why the reader stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum StopReason {
    /// No bytes left where the next header would start
    EndOfStream,
    /// A header did not start with the frame marker
    UnrecognizedFrame {
        marker: u16,
        /// Whether more bytes followed the rejected block
        trailing_data: bool,
    },
    /// Stream ended inside the header or payload of `ping`
    Truncated { ping: usize },
}

impl StopReason {
    /// True only for a clean end of stream
    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, Self::EndOfStream)
    }
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EndOfStream => write!(f, "end of stream"),
            Self::UnrecognizedFrame {
                marker,
                trailing_data,
            } => write!(
                f,
                "unrecognized frame marker {} ({})",
                marker,
                if *trailing_data {
                    "more data follows"
                } else {
                    "at end of stream"
                }
            ),
            Self::Truncated { ping } => write!(f, "truncated at ping {}", ping),
        }
    }
}

/// Reader state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderState {
    /// Nothing read yet
    Start,
    /// `ping_num` pings decoded so far
    Reading { ping_num: usize },
    Stopped(StopReason),
    /// An error aborted the read of ping `ping`
    Failed { ping: usize },
}

/// One decoded and calibrated ping
#[derive(Debug, Clone)]
pub struct DecodedPing {
    pub header: PingHeader,
    pub counts: Vec<ChannelCounts>,
    pub ancillary: AncillaryValues,
}

/// Outcome of one reader step
#[derive(Debug)]
pub enum ReadEvent {
    Ping(Box<DecodedPing>),
    Stopped(StopReason),
}

/// Names shown in the status line
#[derive(Debug, Clone, Default)]
pub struct SourceInfo {
    /// Raw file name without directories
    pub file_name: String,
    /// Name of the paired parameter file
    pub config_name: String,
}

impl SourceInfo {
    pub fn new(file_name: impl Into<String>, config_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            config_name: config_name.into(),
        }
    }
}

/// Status emitted once, after the first ping decoded
#[derive(Debug, Clone)]
pub struct FirstPingStatus<'a> {
    pub file_name: &'a str,
    pub config_name: &'a str,
    /// `None` if the first ping's time subfields are invalid
    pub first_ping_time: Option<NaiveDateTime>,
}

impl std::fmt::Display for FirstPingStatus<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "parsing file {} with {}, time of first ping: ",
            self.file_name, self.config_name
        )?;
        match self.first_ping_time {
            Some(t) => write!(f, "{}", t.format("%Y-%b-%d %H:%M:%S")),
            None => write!(f, "invalid"),
        }
    }
}

/// Receiver of the first-ping status line
pub trait StatusSink {
    fn first_ping(&mut self, status: &FirstPingStatus<'_>);
}

impl<F> StatusSink for F
where
    F: FnMut(&FirstPingStatus<'_>),
{
    fn first_ping(&mut self, status: &FirstPingStatus<'_>) {
        self(status)
    }
}

/// Logs the status line through `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingStatusSink;

impl StatusSink for TracingStatusSink {
    fn first_ping(&mut self, status: &FirstPingStatus<'_>) {
        info!("{}", status);
    }
}

/// Sequential reader over one raw file
pub struct RawFileReader<R, S = TracingStatusSink> {
    reader: R,
    source: SourceInfo,
    header_decoder: HeaderDecoder,
    sample_decoder: SampleDecoder,
    calibrator: Calibrator,
    state: ReaderState,
    sink: S,
}

impl<R: Read> RawFileReader<R, TracingStatusSink> {
    /// Create a reader that logs its status line
    pub fn new(reader: R, params: &InstrumentParameters, source: SourceInfo) -> Self {
        Self::with_sink(reader, params, source, TracingStatusSink)
    }
}

impl<R: Read, S: StatusSink> RawFileReader<R, S> {
    /// Create a reader with a custom status sink
    pub fn with_sink(
        reader: R,
        params: &InstrumentParameters,
        source: SourceInfo,
        sink: S,
    ) -> Self {
        Self {
            reader,
            source,
            header_decoder: HeaderDecoder::new(params.channel_count()),
            sample_decoder: SampleDecoder::new(params),
            calibrator: Calibrator::new(params),
            state: ReaderState::Start,
            sink,
        }
    }

    pub fn state(&self) -> ReaderState {
        self.state
    }

    /// Decode the next ping
    ///
    /// Once stopped, keeps returning the same [`ReadEvent::Stopped`]. After
    /// an error the reader is failed and returns
    /// [`ParseError::ReaderFailed`] without touching the stream.
    pub fn read_next(&mut self) -> ParseResult<ReadEvent> {
        let ping_num = match self.state {
            ReaderState::Start => 0,
            ReaderState::Reading { ping_num } => ping_num,
            ReaderState::Stopped(reason) => return Ok(ReadEvent::Stopped(reason)),
            ReaderState::Failed { ping } => return Err(ParseError::ReaderFailed { ping }),
        };

        let result = self.advance(ping_num);
        if result.is_err() {
            self.state = ReaderState::Failed { ping: ping_num };
        }
        result
    }

    fn advance(&mut self, ping_num: usize) -> ParseResult<ReadEvent> {
        let mut block = [0u8; HEADER_SIZE];
        let n = read_block(&mut self.reader, &mut block)?;
        if n == 0 {
            debug!(pings = ping_num, "End of stream");
            return Ok(self.stop(StopReason::EndOfStream));
        }

        if let FrameKind::Unknown(marker) = self.header_decoder.classify(&block[..n]) {
            // One more byte tells a trailing fragment from garbage mid-file
            let mut probe = [0u8; 1];
            let trailing_data = read_block(&mut self.reader, &mut probe)? > 0;
            if trailing_data {
                error!(marker, ping = ping_num, "Unknown file type");
            } else {
                warn!(marker, ping = ping_num, "Unknown frame marker at end of stream");
            }
            return Ok(self.stop(StopReason::UnrecognizedFrame {
                marker,
                trailing_data,
            }));
        }

        if n < HEADER_SIZE {
            warn!(ping = ping_num, bytes = n, "Truncated header");
            return Ok(self.stop(StopReason::Truncated { ping: ping_num }));
        }

        let header = self.header_decoder.decode(&block);
        let counts = match self.sample_decoder.decode(&mut self.reader, &header) {
            Ok(counts) => counts,
            Err(e) if e.is_truncation() => {
                warn!(ping = ping_num, "Truncated sample block");
                return Ok(self.stop(StopReason::Truncated { ping: ping_num }));
            }
            Err(e) => return Err(e.into()),
        };

        if ping_num == 0 {
            let status = FirstPingStatus {
                file_name: &self.source.file_name,
                config_name: &self.source.config_name,
                first_ping_time: time::ping_time(&header.clock),
            };
            self.sink.first_ping(&status);
        }

        let ancillary = self.calibrator.apply(&header);
        debug!(
            ping = ping_num,
            profile = header.profile_number,
            channels = counts.len(),
            "Decoded ping"
        );

        self.state = ReaderState::Reading {
            ping_num: ping_num + 1,
        };
        Ok(ReadEvent::Ping(Box::new(DecodedPing {
            header,
            counts,
            ancillary,
        })))
    }

    /// Read to the end and finalize the dataset
    pub fn parse(mut self) -> ParseResult<UnpackedDataset> {
        let mut builder = UnpackedDataBuilder::default();
        loop {
            match self.read_next()? {
                ReadEvent::Ping(ping) => builder.push(*ping),
                ReadEvent::Stopped(reason) => {
                    debug!(pings = builder.len(), %reason, "Reader stopped");
                    return builder.finish(reason);
                }
            }
        }
    }

    fn stop(&mut self, reason: StopReason) -> ReadEvent {
        self.state = ReaderState::Stopped(reason);
        ReadEvent::Stopped(reason)
    }
}

/// Parse a raw file from disk
///
/// `config_name` only labels the status line.
pub fn parse_file<P: AsRef<Path>>(
    path: P,
    params: &InstrumentParameters,
    config_name: &str,
) -> ParseResult<UnpackedDataset> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    RawFileReader::new(
        BufReader::new(file),
        params,
        SourceInfo::new(file_name, config_name),
    )
    .parse()
}

/// Fill `buf` as far as the stream allows, returning the bytes read
fn read_block<R: Read>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
