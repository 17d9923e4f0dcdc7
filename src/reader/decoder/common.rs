//! Common types for decoder module

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Frame constants (Big Endian throughout)
pub mod constants {
    /// Fixed header block size in bytes
    pub const HEADER_SIZE: usize = 124;

    /// Manufacturer frame marker, first field of every header
    pub const FILE_TYPE: u16 = 64770;

    /// Slots reserved for every frequency dependent field, independent of
    /// how many channels the instrument actually has. Unused slots hold
    /// undefined padding.
    pub const FREQUENCY_SLOT_WIDTH: usize = 4;

    /// Tilt-X, Tilt-Y, Battery, Pressure, Temperature
    pub const ANCILLARY_SLOTS: usize = 5;

    /// AD channels 6 and 7
    pub const AD_SLOTS: usize = 2;

    pub const ANCILLARY_TILT_X: usize = 0;
    pub const ANCILLARY_TILT_Y: usize = 1;
    pub const ANCILLARY_BATTERY: usize = 2;
    pub const ANCILLARY_PRESSURE: usize = 3;
    pub const ANCILLARY_TEMPERATURE: usize = 4;

    pub const AD_TX_BATTERY: usize = 0;
}

/// Decoder errors
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Header announces {header} channels but only {configured} are configured")]
    ChannelCount { header: usize, configured: usize },
}

impl DecodeError {
    /// True when the stream ended inside a frame
    pub fn is_truncation(&self) -> bool {
        matches!(self, Self::Io(e) if e.kind() == std::io::ErrorKind::UnexpectedEof)
    }
}

/// Time of a ping as stored in the header
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PingClock {
    pub year: u16,
    pub month: u16,
    pub day: u16,
    pub hour: u16,
    pub minute: u16,
    pub second: u16,
    pub hundredths: u16,
}

impl std::fmt::Display for PingClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02} {:02}:{:02}:{:02}.{:02}",
            self.year, self.month, self.day, self.hour, self.minute, self.second, self.hundredths
        )
    }
}

/// Sample encoding of one channel, selected by the header `data_type` flag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleEncoding {
    /// `num_bins` u16 counts
    Raw,
    /// `num_bins` u32 linear sums followed by `num_bins` u8 overflow counts
    Averaged,
}

impl SampleEncoding {
    pub fn from_flag(flag: u8) -> Self {
        if flag == 0 {
            Self::Raw
        } else {
            Self::Averaged
        }
    }
}

/// Decoded header of one ping
///
/// Frequency dependent vectors hold only the meaningful slots, i.e. one
/// entry per configured channel.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PingHeader {
    /// Frame marker, always [`constants::FILE_TYPE`] for a decoded header
    pub profile_flag: u16,
    pub profile_number: u16,
    pub serial_number: u16,
    pub ping_status: u16,
    pub burst_interval: u32,
    pub clock: PingClock,
    pub dig_rate: Vec<u16>,
    pub lockout_index: Vec<u16>,
    pub num_bins: Vec<u16>,
    pub range_samples_per_bin: Vec<u16>,
    pub ping_per_profile: u16,
    /// Non-zero when pings are averaged in time
    pub avg_pings: u16,
    pub num_acq_pings: u16,
    /// Ping period in seconds
    pub ping_period: u16,
    pub first_ping: u16,
    pub last_ping: u16,
    pub data_type: Vec<u8>,
    pub data_error: u16,
    pub phase: u8,
    pub overrun: u8,
    pub num_chan: u8,
    pub gain: Vec<u8>,
    pub spare_chan: u8,
    /// Pulse length in microseconds
    pub pulse_length: Vec<u16>,
    pub board_num: Vec<u16>,
    /// Frequency in kHz
    pub frequency: Vec<u16>,
    pub sensor_flag: u16,
    pub ancillary: [u16; constants::ANCILLARY_SLOTS],
    pub ad: [u16; constants::AD_SLOTS],
}

impl PingHeader {
    /// Encoding of `channel`, Raw when the channel is not described
    pub fn encoding(&self, channel: usize) -> SampleEncoding {
        self.data_type
            .get(channel)
            .map(|&flag| SampleEncoding::from_flag(flag))
            .unwrap_or(SampleEncoding::Raw)
    }

    /// Whether pings are averaged in time
    pub fn is_time_averaged(&self) -> bool {
        self.avg_pings != 0
    }
}

/// Samples of one channel for one ping
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "encoding", content = "values", rename_all = "snake_case")]
pub enum ChannelCounts {
    /// Counts exactly as stored
    Raw(Vec<u16>),
    /// Log-compressed average of the overflow-corrected linear sums
    Averaged(Vec<f64>),
}

impl ChannelCounts {
    pub fn len(&self) -> usize {
        match self {
            Self::Raw(v) => v.len(),
            Self::Averaged(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Values widened to f64
    pub fn to_f64(&self) -> Vec<f64> {
        match self {
            Self::Raw(v) => v.iter().map(|&x| x as f64).collect(),
            Self::Averaged(v) => v.clone(),
        }
    }
}
