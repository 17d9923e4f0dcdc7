//! Instrument parameter table for AZFP raw-file decoding
//!
//! The manufacturer ships these constants in an XML file next to the raw
//! data. Converting that XML is left to an external loader; this module
//! only describes the resulting table and how to read it from:
//! - TOML files (default)
//! - JSON files (`.json` extension)
//!
//! # Example
//! ```ignore
//! let params = InstrumentParameters::load("17041823.toml")?;
//! let ds = params.channels.ds[0];
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::reader::decoder::FREQUENCY_SLOT_WIDTH;

/// Absolute tolerance below which a coefficient counts as zero
pub const COEFFICIENT_ZERO_TOLERANCE: f64 = 1e-8;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read parameter file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("num_freq must be between 1 and {max}, got {actual}")]
    InvalidChannelCount { actual: u32, max: usize },

    #[error("Per-channel parameter {field} has {actual} values, expected {expected}")]
    ChannelLength {
        field: &'static str,
        expected: usize,
        actual: usize,
    },
}

/// Instrument constants needed by the decoder
///
/// Immutable for the lifetime of a parse. All per-channel vectors have
/// exactly `num_freq` entries once [`validate`](Self::validate) passed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentParameters {
    /// Number of frequency channels (1-4)
    pub num_freq: u32,
    pub serial_number: u32,
    /// Burst interval in seconds
    pub burst_interval: u32,
    pub pings_per_burst: u32,
    pub average_burst_pings: u32,
    /// Pressure/temperature sensor availability
    #[serde(default)]
    pub sensors_flag: u32,

    /// Thermistor coefficients
    #[serde(default)]
    pub temperature: TemperatureCoefficients,
    #[serde(default)]
    pub tilt_x: TiltCoefficients,
    #[serde(default)]
    pub tilt_y: TiltCoefficients,

    /// Frequency dependent parameters
    pub channels: ChannelParameters,
}

/// Thermistor calibration: `ka kb kc` for the divider, `A B C` for Steinhart-Hart
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TemperatureCoefficients {
    pub ka: f64,
    pub kb: f64,
    pub kc: f64,
    #[serde(rename = "A")]
    pub a: f64,
    #[serde(rename = "B")]
    pub b: f64,
    #[serde(rename = "C")]
    pub c: f64,
}

impl TemperatureCoefficients {
    /// False when `ka`, `kb` and `kc` are all zero
    pub fn is_valid(&self) -> bool {
        !all_zero(&[self.ka, self.kb, self.kc])
    }
}

/// Cubic tilt polynomial `a + bN + cN^2 + dN^3`
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TiltCoefficients {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
}

impl TiltCoefficients {
    /// False when `a`, `b` and `c` are all zero
    pub fn is_valid(&self) -> bool {
        !all_zero(&[self.a, self.b, self.c])
    }
}

fn all_zero(values: &[f64]) -> bool {
    values
        .iter()
        .all(|v| v.abs() <= COEFFICIENT_ZERO_TOLERANCE)
}

/// Per-channel parameters, indexed `0..num_freq`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChannelParameters {
    pub range_samples: Vec<f64>,
    pub range_averaging_samples: Vec<f64>,
    pub dig_rate: Vec<f64>,
    pub lockout_index: Vec<f64>,
    pub gain: Vec<f64>,
    pub pulse_length: Vec<f64>,
    /// Detector slope, scales the averaged log transform
    #[serde(rename = "DS")]
    pub ds: Vec<f64>,
    #[serde(rename = "EL")]
    pub el: Vec<f64>,
    #[serde(rename = "TVR")]
    pub tvr: Vec<f64>,
    #[serde(rename = "VTX")]
    pub vtx: Vec<f64>,
    #[serde(rename = "BP")]
    pub bp: Vec<f64>,
}

impl ChannelParameters {
    fn fields(&self) -> [(&'static str, &Vec<f64>); 11] {
        [
            ("range_samples", &self.range_samples),
            ("range_averaging_samples", &self.range_averaging_samples),
            ("dig_rate", &self.dig_rate),
            ("lockout_index", &self.lockout_index),
            ("gain", &self.gain),
            ("pulse_length", &self.pulse_length),
            ("DS", &self.ds),
            ("EL", &self.el),
            ("TVR", &self.tvr),
            ("VTX", &self.vtx),
            ("BP", &self.bp),
        ]
    }
}

impl InstrumentParameters {
    /// Load parameters from a file, JSON if the extension says so, TOML otherwise
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let is_json = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        if is_json {
            Self::from_json(&content)
        } else {
            Self::from_toml(&content)
        }
    }

    /// Parse parameters from a TOML string
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let params: Self = toml::from_str(content)?;
        params.validate()?;
        Ok(params)
    }

    /// Parse parameters from a JSON string
    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        let params: Self = serde_json::from_str(content)?;
        params.validate()?;
        Ok(params)
    }

    /// Check the channel count and every per-channel vector length
    pub fn validate(&self) -> Result<(), ConfigError> {
        let n = self.num_freq as usize;
        if n == 0 || n > FREQUENCY_SLOT_WIDTH {
            return Err(ConfigError::InvalidChannelCount {
                actual: self.num_freq,
                max: FREQUENCY_SLOT_WIDTH,
            });
        }

        for (field, values) in self.channels.fields() {
            if values.len() != n {
                return Err(ConfigError::ChannelLength {
                    field,
                    expected: n,
                    actual: values.len(),
                });
            }
        }
        Ok(())
    }

    /// Number of channels as an index bound
    pub fn channel_count(&self) -> usize {
        self.num_freq as usize
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    /// Single-channel table with working temperature and tilt coefficients
    pub fn single_channel() -> InstrumentParameters {
        with_channels(1)
    }

    pub fn with_channels(n: usize) -> InstrumentParameters {
        InstrumentParameters {
            num_freq: n as u32,
            serial_number: 55076,
            burst_interval: 3600,
            pings_per_burst: 60,
            average_burst_pings: 1,
            sensors_flag: 1,
            temperature: TemperatureCoefficients {
                ka: 464.5,
                kb: 3000.0,
                kc: 4.45,
                a: 0.001_125_3,
                b: 0.000_234_7,
                c: 8.5e-8,
            },
            tilt_x: TiltCoefficients {
                a: -21.0,
                b: 7.8e-4,
                c: 0.0,
                d: 0.0,
            },
            tilt_y: TiltCoefficients {
                a: -22.5,
                b: 7.7e-4,
                c: 0.0,
                d: 0.0,
            },
            channels: ChannelParameters {
                range_samples: vec![1000.0; n],
                range_averaging_samples: vec![10.0; n],
                dig_rate: vec![20000.0; n],
                lockout_index: vec![0.0; n],
                gain: vec![1.0; n],
                pulse_length: vec![300.0; n],
                ds: vec![0.0122; n],
                el: vec![150.0; n],
                tvr: vec![170.0; n],
                vtx: vec![140.0; n],
                bp: vec![0.01; n],
            },
        }
    }
}
