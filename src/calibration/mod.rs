//! Ancillary sensor calibration
//!
//! Converts the raw ancillary and AD counts carried in every ping header
//! into physical values. All functions are pure; a coefficient set that is
//! flagged invalid produces NaN instead of an error.

use serde::{Deserialize, Serialize};

use crate::config::{InstrumentParameters, TemperatureCoefficients, TiltCoefficients};
use crate::reader::decoder::common::constants::{
    AD_TX_BATTERY, ANCILLARY_BATTERY, ANCILLARY_TEMPERATURE, ANCILLARY_TILT_X, ANCILLARY_TILT_Y,
};
use crate::reader::decoder::PingHeader;

mod constants {
    /// Full-scale ADC reference voltage
    pub const ADC_REFERENCE_VOLTS: f64 = 2.5;
    pub const ADC_FULL_SCALE: f64 = 65535.0;
    pub const KELVIN_OFFSET: f64 = 273.0;

    /// Counts to volts through the 86.6k / 475k battery divider
    pub const BATTERY_SCALE: f64 = (2.5 / 65536.0) * (86.6 + 475.0) / 86.6;
}

pub use constants::BATTERY_SCALE;

/// Tilt sensor axis
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TiltAxis {
    X,
    Y,
}

impl TiltAxis {
    fn ancillary_slot(self) -> usize {
        match self {
            Self::X => ANCILLARY_TILT_X,
            Self::Y => ANCILLARY_TILT_Y,
        }
    }
}

/// Battery pack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatteryKind {
    /// Main pack, ancillary slot 2
    Main,
    /// Transmit pack, AD channel 0
    Tx,
}

/// Which coefficient sets are usable, decided once per parse
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalibrationFlags {
    pub temperature: bool,
    pub tilt_x: bool,
    pub tilt_y: bool,
}

impl CalibrationFlags {
    pub fn from_params(params: &InstrumentParameters) -> Self {
        Self {
            temperature: params.temperature.is_valid(),
            tilt_x: params.tilt_x.is_valid(),
            tilt_y: params.tilt_y.is_valid(),
        }
    }
}

/// Calibrated ancillary values of one ping
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AncillaryValues {
    /// Degrees Celsius
    pub temperature: f64,
    /// Degrees
    pub tilt_x: f64,
    /// Degrees
    pub tilt_y: f64,
    pub cos_tilt_mag: f64,
    /// Volts
    pub battery_main: f64,
    /// Volts
    pub battery_tx: f64,
}

/// Thermistor counts to degrees Celsius
pub fn temperature(counts: u16, coeffs: &TemperatureCoefficients, is_valid: bool) -> f64 {
    if !is_valid {
        return f64::NAN;
    }

    let v_in = constants::ADC_REFERENCE_VOLTS * (counts as f64 / constants::ADC_FULL_SCALE);
    let r = (coeffs.ka + coeffs.kb * v_in) / (coeffs.kc - v_in);
    let ln_r = r.ln();
    1.0 / (coeffs.a + coeffs.b * ln_r + coeffs.c * ln_r.powi(3)) - constants::KELVIN_OFFSET
}

/// Tilt sensor counts to degrees
pub fn tilt(counts: u16, coeffs: &TiltCoefficients, is_valid: bool) -> f64 {
    if !is_valid {
        return f64::NAN;
    }

    let n = counts as f64;
    coeffs.a + coeffs.b * n + coeffs.c * n.powi(2) + coeffs.d * n.powi(3)
}

/// Cosine of the combined tilt angle, NaN if either axis is NaN
pub fn cos_tilt_magnitude(tilt_x: f64, tilt_y: f64) -> f64 {
    (tilt_x.powi(2) + tilt_y.powi(2)).sqrt().to_radians().cos()
}

/// Battery counts to volts
pub fn battery_voltage(counts: u16) -> f64 {
    counts as f64 * constants::BATTERY_SCALE
}

/// Applies the instrument's coefficients to ping headers
#[derive(Debug, Clone)]
pub struct Calibrator {
    temperature: TemperatureCoefficients,
    tilt_x: TiltCoefficients,
    tilt_y: TiltCoefficients,
    flags: CalibrationFlags,
}

impl Calibrator {
    pub fn new(params: &InstrumentParameters) -> Self {
        Self {
            temperature: params.temperature,
            tilt_x: params.tilt_x,
            tilt_y: params.tilt_y,
            flags: CalibrationFlags::from_params(params),
        }
    }

    pub fn flags(&self) -> CalibrationFlags {
        self.flags
    }

    pub fn temperature(&self, header: &PingHeader) -> f64 {
        temperature(
            header.ancillary[ANCILLARY_TEMPERATURE],
            &self.temperature,
            self.flags.temperature,
        )
    }

    pub fn tilt(&self, header: &PingHeader, axis: TiltAxis) -> f64 {
        let (coeffs, is_valid) = match axis {
            TiltAxis::X => (&self.tilt_x, self.flags.tilt_x),
            TiltAxis::Y => (&self.tilt_y, self.flags.tilt_y),
        };
        tilt(header.ancillary[axis.ancillary_slot()], coeffs, is_valid)
    }

    pub fn battery(&self, header: &PingHeader, kind: BatteryKind) -> f64 {
        let counts = match kind {
            BatteryKind::Main => header.ancillary[ANCILLARY_BATTERY],
            BatteryKind::Tx => header.ad[AD_TX_BATTERY],
        };
        battery_voltage(counts)
    }

    /// All calibrated values of one ping
    pub fn apply(&self, header: &PingHeader) -> AncillaryValues {
        let tilt_x = self.tilt(header, TiltAxis::X);
        let tilt_y = self.tilt(header, TiltAxis::Y);
        AncillaryValues {
            temperature: self.temperature(header),
            tilt_x,
            tilt_y,
            cos_tilt_mag: cos_tilt_magnitude(tilt_x, tilt_y),
            battery_main: self.battery(header, BatteryKind::Main),
            battery_tx: self.battery(header, BatteryKind::Tx),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::fixtures;

    fn header_with(ancillary: [u16; 5], ad: [u16; 2]) -> PingHeader {
        PingHeader {
            ancillary,
            ad,
            ..Default::default()
        }
    }

    #[test]
    fn test_temperature_formula() {
        // counts = 0 gives v_in = 0 and R = ka / kc = e, so ln(R) = 1
        let coeffs = TemperatureCoefficients {
            ka: std::f64::consts::E,
            kb: 5.0,
            kc: 1.0,
            a: 0.001,
            b: 0.002,
            c: 0.001,
        };
        let t = temperature(0, &coeffs, true);
        assert!((t - (250.0 - 273.0)).abs() < 1e-9);
    }

    #[test]
    fn test_temperature_plausible_with_instrument_coefficients() {
        let params = fixtures::single_channel();
        let t = temperature(30000, &params.temperature, true);
        assert!(t.is_finite());
    }

    #[test]
    fn test_temperature_invalid_is_nan() {
        let coeffs = TemperatureCoefficients {
            ka: 0.0,
            kb: 0.0,
            kc: 0.0,
            a: 1.0,
            b: 1.0,
            c: 1.0,
        };
        let flags_valid = coeffs.is_valid();
        assert!(!flags_valid);
        for counts in [0u16, 1, 12345, 65535] {
            assert!(temperature(counts, &coeffs, flags_valid).is_nan());
        }
    }

    #[test]
    fn test_tilt_cubic() {
        let coeffs = TiltCoefficients {
            a: 1.0,
            b: 2.0,
            c: 3.0,
            d: 4.0,
        };
        assert_eq!(tilt(2, &coeffs, true), 49.0);
        assert!(tilt(2, &coeffs, false).is_nan());
    }

    #[test]
    fn test_cos_tilt_magnitude() {
        let expected = (5.0f64 * std::f64::consts::PI / 180.0).cos();
        assert!((cos_tilt_magnitude(3.0, 4.0) - expected).abs() < 1e-12);
        assert_eq!(cos_tilt_magnitude(0.0, 0.0), 1.0);
        assert!(cos_tilt_magnitude(f64::NAN, 1.0).is_nan());
    }

    #[test]
    fn test_battery_scale() {
        assert_eq!(battery_voltage(0), 0.0);
        let expected = 65535.0 * (2.5 / 65536.0) * (86.6 + 475.0) / 86.6;
        assert!((battery_voltage(65535) - expected).abs() < 1e-12);
    }

    #[test]
    fn test_calibrator_reads_correct_slots() {
        let params = fixtures::single_channel();
        let calibrator = Calibrator::new(&params);
        let header = header_with([1000, 2000, 30000, 0, 25000], [40000, 0]);

        let values = calibrator.apply(&header);
        assert_eq!(values.tilt_x, tilt(1000, &params.tilt_x, true));
        assert_eq!(values.tilt_y, tilt(2000, &params.tilt_y, true));
        assert_eq!(values.temperature, temperature(25000, &params.temperature, true));
        assert_eq!(values.battery_main, battery_voltage(30000));
        assert_eq!(values.battery_tx, battery_voltage(40000));
        assert_eq!(
            values.cos_tilt_mag,
            cos_tilt_magnitude(values.tilt_x, values.tilt_y)
        );
    }

    #[test]
    fn test_invalid_tilt_propagates_nan() {
        let mut params = fixtures::single_channel();
        params.tilt_y = TiltCoefficients::default();
        let calibrator = Calibrator::new(&params);
        assert_eq!(
            calibrator.flags(),
            CalibrationFlags {
                temperature: true,
                tilt_x: true,
                tilt_y: false,
            }
        );

        let values = calibrator.apply(&header_with([100, 100, 100, 0, 100], [100, 0]));
        assert!(values.tilt_x.is_finite());
        assert!(values.tilt_y.is_nan());
        assert!(values.cos_tilt_mag.is_nan());
        assert!(values.battery_main.is_finite());
    }
}
