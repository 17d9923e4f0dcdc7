//! Sample block decoder
//!
//! The payload following each header holds one block per channel. The
//! header `data_type` flag picks the layout of that block:
//!
//! - Raw: `num_bins` x u16 counts, returned unchanged
//! - Averaged: `num_bins` x u32 linear sums, then `num_bins` x u8 overflow
//!   counts. The true sum is `sum + overflow * 2^32`; it is averaged and
//!   log-compressed with the channel's detector slope `DS`.

use std::io::Read;

use super::common::{ChannelCounts, DecodeError, PingHeader, SampleEncoding};
use crate::config::InstrumentParameters;

mod constants {
    /// Weight of one overflow count
    pub const OVERFLOW_SCALE: f64 = 4_294_967_296.0;
    /// Offset subtracted from log10 of the averaged magnitude
    pub const LOG_OFFSET: f64 = 2.5;
    /// Scale of the compressed counts, before the detector slope
    pub const LOG_SCALE: f64 = 8.0 * 65535.0;
}

/// Decoder for the per-channel payload of a ping
#[derive(Debug, Clone)]
pub struct SampleDecoder {
    /// Detector slope per channel
    ds: Vec<f64>,
}

impl SampleDecoder {
    pub fn new(params: &InstrumentParameters) -> Self {
        Self {
            ds: params.channels.ds.clone(),
        }
    }

    /// Read the sample block that follows `header`
    ///
    /// Returns one entry per channel announced by the header.
    pub fn decode<R: Read>(
        &self,
        reader: &mut R,
        header: &PingHeader,
    ) -> Result<Vec<ChannelCounts>, DecodeError> {
        let n_chan = header.num_chan as usize;
        let configured = header.num_bins.len().min(self.ds.len());
        if n_chan > configured {
            return Err(DecodeError::ChannelCount {
                header: n_chan,
                configured,
            });
        }

        let mut channels = Vec::with_capacity(n_chan);
        for ch in 0..n_chan {
            let num_bins = header.num_bins[ch] as usize;
            let counts = match header.encoding(ch) {
                SampleEncoding::Raw => ChannelCounts::Raw(read_raw(reader, num_bins)?),
                SampleEncoding::Averaged => {
                    let divisor = averaging_divisor(header, ch);
                    let values = read_averaged(reader, num_bins)?
                        .into_iter()
                        .map(|(sum, overflow)| {
                            compress_average(sum, overflow, divisor, self.ds[ch])
                        })
                        .collect();
                    ChannelCounts::Averaged(values)
                }
            };
            channels.push(counts);
        }
        Ok(channels)
    }
}

/// Number of samples folded into each averaged bin of `channel`
pub fn averaging_divisor(header: &PingHeader, channel: usize) -> f64 {
    let per_bin = header.range_samples_per_bin[channel] as f64;
    if header.is_time_averaged() {
        header.ping_per_profile as f64 * per_bin
    } else {
        per_bin
    }
}

/// Convert one overflow-corrected linear sum to compressed counts
///
/// Non-finite results (zero magnitude, zero divisor) become 0.
pub fn compress_average(sum: u32, overflow: u8, divisor: f64, ds: f64) -> f64 {
    let magnitude = sum as f64 + overflow as f64 * constants::OVERFLOW_SCALE;
    let value = ((magnitude / divisor).log10() - constants::LOG_OFFSET) * constants::LOG_SCALE * ds;
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

fn read_raw<R: Read>(reader: &mut R, num_bins: usize) -> Result<Vec<u16>, DecodeError> {
    let mut buf = vec![0u8; num_bins * 2];
    reader.read_exact(&mut buf)?;
    Ok(buf
        .chunks_exact(2)
        .map(|c| u16::from_be_bytes([c[0], c[1]]))
        .collect())
}

/// Read the sums, then the overflow bytes, and pair them up
fn read_averaged<R: Read>(reader: &mut R, num_bins: usize) -> Result<Vec<(u32, u8)>, DecodeError> {
    let mut sums = vec![0u8; num_bins * 4];
    reader.read_exact(&mut sums)?;
    let mut overflow = vec![0u8; num_bins];
    reader.read_exact(&mut overflow)?;

    Ok(sums
        .chunks_exact(4)
        .map(|c| u32::from_be_bytes([c[0], c[1], c[2], c[3]]))
        .zip(overflow)
        .collect())
}
