//! Header decoder for AZFP raw files
//!
//! Every ping starts with a fixed 124-byte big-endian header. Frequency
//! dependent fields always occupy [`FREQUENCY_SLOT_WIDTH`] slots; only the
//! first `channel_count` slots are kept.
//!
//! ```text
//! offset  field                       type
//!      0  profile_flag (marker)       u16
//!      2  profile_number              u16
//!      4  serial_number               u16
//!      6  ping_status                 u16
//!      8  burst_interval              u32
//!     12  year..hundredths            7 x u16
//!     26  dig_rate                    4 x u16
//!     34  lockout_index               4 x u16
//!     42  num_bins                    4 x u16
//!     50  range_samples_per_bin       4 x u16
//!     58  ping_per_profile            u16
//!     60  avg_pings                   u16
//!     62  num_acq_pings               u16
//!     64  ping_period                 u16
//!     66  first_ping, last_ping       2 x u16
//!     70  data_type                   4 x u8
//!     74  data_error                  u16
//!     76  phase, overrun, num_chan    3 x u8
//!     79  gain                        4 x u8
//!     83  spare_chan                  u8
//!     84  pulse_length                4 x u16
//!     92  board_num                   4 x u16
//!    100  frequency                   4 x u16
//!    108  sensor_flag                 u16
//!    110  ancillary                   5 x u16
//!    120  ad                          2 x u16
//!    124
//! ```

use super::common::constants::{
    AD_SLOTS, ANCILLARY_SLOTS, FILE_TYPE, FREQUENCY_SLOT_WIDTH, HEADER_SIZE,
};
use super::common::{PingClock, PingHeader};

/// Result of looking at the frame marker of a header block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// Marker matches [`FILE_TYPE`]
    Ping,
    /// Anything else, carries the marker that was found
    Unknown(u16),
}

/// Sequential big-endian field reader over one header block
struct FieldReader<'a> {
    data: &'a [u8; HEADER_SIZE],
    offset: usize,
}

impl<'a> FieldReader<'a> {
    fn new(data: &'a [u8; HEADER_SIZE]) -> Self {
        Self { data, offset: 0 }
    }

    #[inline]
    fn u8(&mut self) -> u8 {
        let value = self.data[self.offset];
        self.offset += 1;
        value
    }

    #[inline]
    fn u16(&mut self) -> u16 {
        let value = u16::from_be_bytes([self.data[self.offset], self.data[self.offset + 1]]);
        self.offset += 2;
        value
    }

    #[inline]
    fn u32(&mut self) -> u32 {
        let o = self.offset;
        let value = u32::from_be_bytes([
            self.data[o],
            self.data[o + 1],
            self.data[o + 2],
            self.data[o + 3],
        ]);
        self.offset += 4;
        value
    }

    /// Consume a full frequency frame of u16, keep the first `keep` slots
    fn frequency_u16(&mut self, keep: usize) -> Vec<u16> {
        let slots: Vec<u16> = (0..FREQUENCY_SLOT_WIDTH).map(|_| self.u16()).collect();
        slots[..keep].to_vec()
    }

    /// Consume a full frequency frame of u8, keep the first `keep` slots
    fn frequency_u8(&mut self, keep: usize) -> Vec<u8> {
        let slots: Vec<u8> = (0..FREQUENCY_SLOT_WIDTH).map(|_| self.u8()).collect();
        slots[..keep].to_vec()
    }

    fn consumed(&self) -> usize {
        self.offset
    }
}

/// Header decoder for a fixed channel count
#[derive(Debug, Clone)]
pub struct HeaderDecoder {
    channel_count: usize,
}

impl HeaderDecoder {
    /// Create a decoder keeping `channel_count` slots of every frequency field
    pub fn new(channel_count: usize) -> Self {
        Self {
            channel_count: channel_count.min(FREQUENCY_SLOT_WIDTH),
        }
    }

    pub fn channel_count(&self) -> usize {
        self.channel_count
    }

    /// Read the frame marker from the first two bytes
    ///
    /// Blocks shorter than the marker itself are reported with whatever
    /// byte is present, zero padded.
    pub fn classify(&self, block: &[u8]) -> FrameKind {
        let marker = match block {
            [hi, lo, ..] => u16::from_be_bytes([*hi, *lo]),
            [hi] => u16::from_be_bytes([*hi, 0]),
            [] => 0,
        };
        if marker == FILE_TYPE {
            FrameKind::Ping
        } else {
            FrameKind::Unknown(marker)
        }
    }

    /// Decode one header block
    ///
    /// The marker is not checked here, see [`classify`](Self::classify).
    pub fn decode(&self, block: &[u8; HEADER_SIZE]) -> PingHeader {
        let n = self.channel_count;
        let mut r = FieldReader::new(block);

        let profile_flag = r.u16();
        let profile_number = r.u16();
        let serial_number = r.u16();
        let ping_status = r.u16();
        let burst_interval = r.u32();
        let clock = PingClock {
            year: r.u16(),
            month: r.u16(),
            day: r.u16(),
            hour: r.u16(),
            minute: r.u16(),
            second: r.u16(),
            hundredths: r.u16(),
        };
        let dig_rate = r.frequency_u16(n);
        let lockout_index = r.frequency_u16(n);
        let num_bins = r.frequency_u16(n);
        let range_samples_per_bin = r.frequency_u16(n);
        let ping_per_profile = r.u16();
        let avg_pings = r.u16();
        let num_acq_pings = r.u16();
        let ping_period = r.u16();
        let first_ping = r.u16();
        let last_ping = r.u16();
        let data_type = r.frequency_u8(n);
        let data_error = r.u16();
        let phase = r.u8();
        let overrun = r.u8();
        let num_chan = r.u8();
        let gain = r.frequency_u8(n);
        let spare_chan = r.u8();
        let pulse_length = r.frequency_u16(n);
        let board_num = r.frequency_u16(n);
        let frequency = r.frequency_u16(n);
        let sensor_flag = r.u16();

        let mut ancillary = [0u16; ANCILLARY_SLOTS];
        for slot in ancillary.iter_mut() {
            *slot = r.u16();
        }
        let mut ad = [0u16; AD_SLOTS];
        for slot in ad.iter_mut() {
            *slot = r.u16();
        }

        debug_assert_eq!(r.consumed(), HEADER_SIZE, "header layout out of sync");

        PingHeader {
            profile_flag,
            profile_number,
            serial_number,
            ping_status,
            burst_interval,
            clock,
            dig_rate,
            lockout_index,
            num_bins,
            range_samples_per_bin,
            ping_per_profile,
            avg_pings,
            num_acq_pings,
            ping_period,
            first_ping,
            last_ping,
            data_type,
            data_error,
            phase,
            overrun,
            num_chan,
            gain,
            spare_chan,
            pulse_length,
            board_num,
            frequency,
            sensor_flag,
            ancillary,
            ad,
        }
    }
}
