//! AZFP-RS: Decoder for AZFP echosounder raw files
//!
//! This crate turns the binary `.01A` files written by an AZFP into an
//! unpacked dataset: per-ping header fields, per-channel sample counts and
//! calibrated ancillary measurements (temperature, tilt, battery).
//!
//! ```no_run
//! use azfp_rs::config::InstrumentParameters;
//! use azfp_rs::reader::parse_file;
//!
//! # fn main() -> anyhow::Result<()> {
//! let params = InstrumentParameters::load("17082117.toml")?;
//! let dataset = parse_file("17082117.01A", &params, "17082117.toml")?;
//! println!("{} pings, stopped on {}", dataset.len(), dataset.termination);
//! # Ok(())
//! # }
//! ```

pub mod calibration;
pub mod common;
pub mod config;
pub mod dataset;
pub mod reader;
