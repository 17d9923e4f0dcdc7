//! Unpacked dataset
//!
//! Parsing is two-phase. While the reader walks the file, every ping is
//! appended to an [`UnpackedDataBuilder`]. Once the reader has stopped the
//! builder is consumed: configuration fields are reduced to single values
//! and ping times are assembled, producing an immutable [`UnpackedDataset`].

pub mod reduce;
pub mod time;

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::calibration::AncillaryValues;
use crate::common::ParseResult;
use crate::reader::decoder::common::constants::{AD_SLOTS, ANCILLARY_SLOTS};
use crate::reader::decoder::{ChannelCounts, PingClock, PingHeader};
use crate::reader::{DecodedPing, StopReason};

use reduce::collapse;

/// Header fields that must not change within a file
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfileConfig {
    pub profile_flag: u16,
    pub serial_number: u16,
    pub burst_interval: u32,
    pub ping_per_profile: u16,
    pub avg_pings: u16,
    pub ping_period: u16,
    pub phase: u8,
    pub num_chan: u8,
    pub spare_chan: u8,

    pub dig_rate: Vec<u16>,
    pub lockout_index: Vec<u16>,
    pub num_bins: Vec<u16>,
    pub range_samples_per_bin: Vec<u16>,
    pub data_type: Vec<u8>,
    pub gain: Vec<u8>,
    pub pulse_length: Vec<u16>,
    pub board_num: Vec<u16>,
    /// Frequency per channel in kHz
    pub frequency: Vec<f64>,
}

/// Finalized content of one raw file
///
/// Per-ping vectors are parallel and indexed by ping number.
#[derive(Debug, Clone, Serialize)]
pub struct UnpackedDataset {
    /// How the reader stopped
    pub termination: StopReason,
    /// Reduced configuration, `None` when no ping was decoded
    pub config: Option<ProfileConfig>,

    pub profile_number: Vec<u16>,
    pub ping_status: Vec<u16>,
    pub clock: Vec<PingClock>,
    pub num_acq_pings: Vec<u16>,
    pub first_ping: Vec<u16>,
    pub last_ping: Vec<u16>,
    pub data_error: Vec<u16>,
    pub overrun: Vec<u8>,
    pub sensor_flag: Vec<u16>,
    pub ancillary: Vec<[u16; ANCILLARY_SLOTS]>,
    pub ad: Vec<[u16; AD_SLOTS]>,
    /// Samples per ping, one entry per channel
    pub counts: Vec<Vec<ChannelCounts>>,

    pub temperature: Vec<f64>,
    pub tilt_x: Vec<f64>,
    pub tilt_y: Vec<f64>,
    pub cos_tilt_mag: Vec<f64>,
    pub battery_main: Vec<f64>,
    pub battery_tx: Vec<f64>,

    pub ping_time: Vec<NaiveDateTime>,
}

impl UnpackedDataset {
    /// Number of decoded pings
    pub fn len(&self) -> usize {
        self.profile_number.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Ping times as milliseconds since the Unix epoch
    pub fn ping_time_millis(&self) -> Vec<i64> {
        self.ping_time
            .iter()
            .map(|t| t.and_utc().timestamp_millis())
            .collect()
    }
}

/// Minimum and maximum of the finite values, `None` if there are none
///
/// Calibrated columns are all NaN when their coefficients are invalid.
pub fn finite_range(values: &[f64]) -> Option<(f64, f64)> {
    values
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .fold(None, |range, v| match range {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
}

/// Per-ping accumulator used while the reader runs
#[derive(Debug, Default)]
pub(crate) struct UnpackedDataBuilder {
    profile_flag: Vec<u16>,
    serial_number: Vec<u16>,
    burst_interval: Vec<u32>,
    ping_per_profile: Vec<u16>,
    avg_pings: Vec<u16>,
    ping_period: Vec<u16>,
    phase: Vec<u8>,
    num_chan: Vec<u8>,
    spare_chan: Vec<u8>,
    dig_rate: Vec<Vec<u16>>,
    lockout_index: Vec<Vec<u16>>,
    num_bins: Vec<Vec<u16>>,
    range_samples_per_bin: Vec<Vec<u16>>,
    data_type: Vec<Vec<u8>>,
    gain: Vec<Vec<u8>>,
    pulse_length: Vec<Vec<u16>>,
    board_num: Vec<Vec<u16>>,
    frequency: Vec<Vec<u16>>,

    profile_number: Vec<u16>,
    ping_status: Vec<u16>,
    clock: Vec<PingClock>,
    num_acq_pings: Vec<u16>,
    first_ping: Vec<u16>,
    last_ping: Vec<u16>,
    data_error: Vec<u16>,
    overrun: Vec<u8>,
    sensor_flag: Vec<u16>,
    ancillary: Vec<[u16; ANCILLARY_SLOTS]>,
    ad: Vec<[u16; AD_SLOTS]>,
    counts: Vec<Vec<ChannelCounts>>,
    calibrated: Vec<AncillaryValues>,
}

impl UnpackedDataBuilder {
    pub fn len(&self) -> usize {
        self.profile_number.len()
    }

    pub fn push(&mut self, ping: DecodedPing) {
        let DecodedPing {
            header,
            counts,
            ancillary,
        } = ping;
        let PingHeader {
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
            ancillary: ancillary_counts,
            ad,
        } = header;

        self.profile_flag.push(profile_flag);
        self.serial_number.push(serial_number);
        self.burst_interval.push(burst_interval);
        self.ping_per_profile.push(ping_per_profile);
        self.avg_pings.push(avg_pings);
        self.ping_period.push(ping_period);
        self.phase.push(phase);
        self.num_chan.push(num_chan);
        self.spare_chan.push(spare_chan);
        self.dig_rate.push(dig_rate);
        self.lockout_index.push(lockout_index);
        self.num_bins.push(num_bins);
        self.range_samples_per_bin.push(range_samples_per_bin);
        self.data_type.push(data_type);
        self.gain.push(gain);
        self.pulse_length.push(pulse_length);
        self.board_num.push(board_num);
        self.frequency.push(frequency);

        self.profile_number.push(profile_number);
        self.ping_status.push(ping_status);
        self.clock.push(clock);
        self.num_acq_pings.push(num_acq_pings);
        self.first_ping.push(first_ping);
        self.last_ping.push(last_ping);
        self.data_error.push(data_error);
        self.overrun.push(overrun);
        self.sensor_flag.push(sensor_flag);
        self.ancillary.push(ancillary_counts);
        self.ad.push(ad);
        self.counts.push(counts);
        self.calibrated.push(ancillary);
    }

    /// Reduce configuration fields and assemble ping times
    pub fn finish(self, termination: StopReason) -> ParseResult<UnpackedDataset> {
        let config = self.reduce_config()?;
        let ping_time = time::assemble(&self.clock)?;

        let column = |f: fn(&AncillaryValues) -> f64| -> Vec<f64> {
            self.calibrated.iter().map(f).collect()
        };
        let temperature = column(|v| v.temperature);
        let tilt_x = column(|v| v.tilt_x);
        let tilt_y = column(|v| v.tilt_y);
        let cos_tilt_mag = column(|v| v.cos_tilt_mag);
        let battery_main = column(|v| v.battery_main);
        let battery_tx = column(|v| v.battery_tx);

        Ok(UnpackedDataset {
            termination,
            config,
            profile_number: self.profile_number,
            ping_status: self.ping_status,
            clock: self.clock,
            num_acq_pings: self.num_acq_pings,
            first_ping: self.first_ping,
            last_ping: self.last_ping,
            data_error: self.data_error,
            overrun: self.overrun,
            sensor_flag: self.sensor_flag,
            ancillary: self.ancillary,
            ad: self.ad,
            counts: self.counts,
            temperature,
            tilt_x,
            tilt_y,
            cos_tilt_mag,
            battery_main,
            battery_tx,
            ping_time,
        })
    }

    /// Collapse every configuration column, `None` without pings
    fn reduce_config(&self) -> ParseResult<Option<ProfileConfig>> {
        if self.len() == 0 {
            return Ok(None);
        }

        // Frequency shaped fields first, then scalars
        let dig_rate = collapse("dig_rate", &self.dig_rate)?;
        let lockout_index = collapse("lockout_index", &self.lockout_index)?;
        let num_bins = collapse("num_bins", &self.num_bins)?;
        let range_samples_per_bin =
            collapse("range_samples_per_bin", &self.range_samples_per_bin)?;
        let data_type = collapse("data_type", &self.data_type)?;
        let gain = collapse("gain", &self.gain)?;
        let pulse_length = collapse("pulse_length", &self.pulse_length)?;
        let board_num = collapse("board_num", &self.board_num)?;
        let frequency = collapse("frequency", &self.frequency)?;

        let profile_flag = collapse("profile_flag", &self.profile_flag)?;
        let serial_number = collapse("serial_number", &self.serial_number)?;
        let burst_interval = collapse("burst_interval", &self.burst_interval)?;
        let ping_per_profile = collapse("ping_per_profile", &self.ping_per_profile)?;
        let avg_pings = collapse("avg_pings", &self.avg_pings)?;
        let ping_period = collapse("ping_period", &self.ping_period)?;
        let phase = collapse("phase", &self.phase)?;
        let num_chan = collapse("num_chan", &self.num_chan)?;
        let spare_chan = collapse("spare_chan", &self.spare_chan)?;

        Ok(Some(ProfileConfig {
            profile_flag: profile_flag.unwrap_or_default(),
            serial_number: serial_number.unwrap_or_default(),
            burst_interval: burst_interval.unwrap_or_default(),
            ping_per_profile: ping_per_profile.unwrap_or_default(),
            avg_pings: avg_pings.unwrap_or_default(),
            ping_period: ping_period.unwrap_or_default(),
            phase: phase.unwrap_or_default(),
            num_chan: num_chan.unwrap_or_default(),
            spare_chan: spare_chan.unwrap_or_default(),
            dig_rate: dig_rate.unwrap_or_default(),
            lockout_index: lockout_index.unwrap_or_default(),
            num_bins: num_bins.unwrap_or_default(),
            range_samples_per_bin: range_samples_per_bin.unwrap_or_default(),
            data_type: data_type.unwrap_or_default(),
            gain: gain.unwrap_or_default(),
            pulse_length: pulse_length.unwrap_or_default(),
            board_num: board_num.unwrap_or_default(),
            frequency: frequency
                .unwrap_or_default()
                .into_iter()
                .map(f64::from)
                .collect(),
        }))
    }
}
