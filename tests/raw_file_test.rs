//! E2E tests for AZFP raw files (write synthetic frames → parse → verify)
//!
//! Frames are assembled byte by byte here, independent of the crate's own
//! test fixtures, so the on-disk layout is checked from the outside.

use std::io::{Cursor, Write};

use azfp_rs::calibration::BATTERY_SCALE;
use azfp_rs::common::ParseError;
use azfp_rs::config::InstrumentParameters;
use azfp_rs::reader::decoder::samples::compress_average;
use azfp_rs::reader::decoder::FILE_TYPE;
use azfp_rs::reader::{
    parse_file, ChannelCounts, FirstPingStatus, RawFileReader, SourceInfo, StopReason,
};
use rand::prelude::*;
use rand::rngs::StdRng;

const PARAMS_TOML: &str = r#"
num_freq = 2
serial_number = 55076
burst_interval = 3600
pings_per_burst = 60
average_burst_pings = 1

[temperature]
ka = 464.5
kb = 3000.0
kc = 4.45
A = 0.0011253
B = 0.0002347
C = 8.5e-8

[tilt_x]
a = -21.0
b = 0.00078
c = 0.0
d = 0.0

[tilt_y]
a = -22.5
b = 0.00077
c = 0.0
d = 0.0

[channels]
range_samples = [1000.0, 1000.0]
range_averaging_samples = [10.0, 10.0]
dig_rate = [20000.0, 20000.0]
lockout_index = [0.0, 0.0]
gain = [1.0, 1.0]
pulse_length = [300.0, 300.0]
DS = [0.0122, 0.0126]
EL = [150.0, 151.0]
TVR = [170.0, 171.0]
VTX = [140.0, 141.0]
BP = [0.01, 0.01]
"#;

fn params() -> InstrumentParameters {
    InstrumentParameters::from_toml(PARAMS_TOML).expect("valid parameters")
}

/// Header fields the tests vary; everything else is written as zero
#[derive(Debug, Clone)]
struct Frame {
    profile_flag: u16,
    profile_number: u16,
    serial_number: u16,
    second: u16,
    hundredths: u16,
    num_bins: [u16; 4],
    range_samples_per_bin: [u16; 4],
    ping_per_profile: u16,
    avg_pings: u16,
    data_type: [u8; 4],
    num_chan: u8,
    frequency: [u16; 4],
    ancillary: [u16; 5],
    ad: [u16; 2],
}

impl Frame {
    fn new(num_chan: u8, num_bins: [u16; 4]) -> Self {
        Self {
            profile_flag: FILE_TYPE,
            profile_number: 0,
            serial_number: 55076,
            second: 0,
            hundredths: 0,
            num_bins,
            range_samples_per_bin: [1; 4],
            ping_per_profile: 1,
            avg_pings: 0,
            data_type: [0; 4],
            num_chan,
            frequency: [125, 455, 769, 0],
            ancillary: [0; 5],
            ad: [0; 2],
        }
    }

    fn write_header(&self, out: &mut Vec<u8>) {
        let mut put = |v: u16| out.extend_from_slice(&v.to_be_bytes());
        put(self.profile_flag);
        put(self.profile_number);
        put(self.serial_number);
        put(0); // ping_status
        put(0); // burst_interval, high word
        put(3600); // burst_interval, low word
        for v in [2017, 8, 21, 17, 30, self.second, self.hundredths] {
            put(v);
        }
        for _ in 0..4 {
            put(20000); // dig_rate
        }
        for _ in 0..4 {
            put(0); // lockout_index
        }
        for v in self.num_bins {
            put(v);
        }
        for v in self.range_samples_per_bin {
            put(v);
        }
        for v in [self.ping_per_profile, self.avg_pings, 1, 1, 1, 1] {
            put(v);
        }

        out.extend_from_slice(&self.data_type);
        out.extend_from_slice(&0u16.to_be_bytes()); // data_error
        out.extend_from_slice(&[1, 0, self.num_chan]); // phase, overrun, num_chan
        out.extend_from_slice(&[1, 1, 1, 1]); // gain
        out.push(0); // spare_chan

        let mut put = |v: u16| out.extend_from_slice(&v.to_be_bytes());
        for _ in 0..4 {
            put(300); // pulse_length
        }
        for v in [0, 1, 2, 3] {
            put(v); // board_num
        }
        for v in self.frequency {
            put(v);
        }
        put(1); // sensor_flag
        for v in self.ancillary {
            put(v);
        }
        for v in self.ad {
            put(v);
        }
    }
}

fn push_raw(out: &mut Vec<u8>, counts: &[u16]) {
    for c in counts {
        out.extend_from_slice(&c.to_be_bytes());
    }
}

fn push_averaged(out: &mut Vec<u8>, sums: &[u32], overflow: &[u8]) {
    for s in sums {
        out.extend_from_slice(&s.to_be_bytes());
    }
    out.extend_from_slice(overflow);
}

fn parse_bytes(bytes: Vec<u8>) -> Result<azfp_rs::dataset::UnpackedDataset, ParseError> {
    RawFileReader::new(Cursor::new(bytes), &params(), SourceInfo::new("test.01A", "test.toml"))
        .parse()
}

#[test]
fn test_two_raw_pings() {
    let mut bytes = Vec::new();
    for (i, counts) in [[1u16, 2, 3], [4, 5, 6]].iter().enumerate() {
        let mut frame = Frame::new(1, [3, 0, 0, 0]);
        frame.profile_number = i as u16;
        frame.second = i as u16;
        frame.write_header(&mut bytes);
        push_raw(&mut bytes, counts);
    }
    assert_eq!(bytes.len(), 2 * (124 + 6));

    let dataset = parse_bytes(bytes).unwrap();
    assert_eq!(dataset.termination, StopReason::EndOfStream);
    assert_eq!(dataset.len(), 2);
    assert_eq!(
        dataset.counts,
        vec![
            vec![ChannelCounts::Raw(vec![1, 2, 3])],
            vec![ChannelCounts::Raw(vec![4, 5, 6])],
        ]
    );

    let config = dataset.config.as_ref().unwrap();
    assert_eq!(config.serial_number, 55076);
    assert_eq!(config.num_bins, vec![3, 0]);
    assert_eq!(config.frequency, vec![125.0, 455.0]);
    assert_eq!(dataset.sensor_flag, vec![1, 1]);
    assert_eq!(dataset.ping_time[1].to_string(), "2017-08-21 17:30:01");
}

#[test]
fn test_short_non_frame_file() {
    let dataset = parse_bytes(vec![0x12, 0x34]).unwrap();
    assert!(dataset.is_empty());
    assert!(dataset.config.is_none());
    assert_eq!(
        dataset.termination,
        StopReason::UnrecognizedFrame {
            marker: 0x1234,
            trailing_data: false
        }
    );
}

#[test]
fn test_seeded_random_two_channel_file() {
    let mut rng = StdRng::seed_from_u64(0xA2F9);
    let params = params();

    let num_pings = rng.gen_range(5..20usize);
    let bins0: u16 = rng.gen_range(1..50);
    let bins1: u16 = rng.gen_range(1..50);
    let rspb1: u16 = rng.gen_range(1..8);
    let ppp: u16 = rng.gen_range(1..10);

    let mut bytes = Vec::new();
    let mut expected_counts = Vec::new();
    let mut expected_battery = Vec::new();

    for ping in 0..num_pings {
        let mut frame = Frame::new(2, [bins0, bins1, 0, 0]);
        frame.profile_number = ping as u16;
        frame.second = (ping % 60) as u16;
        frame.hundredths = rng.gen_range(0..100);
        frame.data_type = [0, 1, 0, 0];
        frame.range_samples_per_bin = [1, rspb1, 1, 1];
        frame.ping_per_profile = ppp;
        frame.avg_pings = 1;
        frame.ancillary = [rng.gen(), rng.gen(), rng.gen(), rng.gen(), rng.gen()];
        frame.ad = [rng.gen(), rng.gen()];
        frame.write_header(&mut bytes);

        let raw: Vec<u16> = (0..bins0).map(|_| rng.gen()).collect();
        let sums: Vec<u32> = (0..bins1).map(|_| rng.gen()).collect();
        let overflow: Vec<u8> = (0..bins1).map(|_| rng.gen_range(0..2)).collect();
        push_raw(&mut bytes, &raw);
        push_averaged(&mut bytes, &sums, &overflow);

        let divisor = ppp as f64 * rspb1 as f64;
        let averaged: Vec<f64> = sums
            .iter()
            .zip(&overflow)
            .map(|(&s, &o)| compress_average(s, o, divisor, params.channels.ds[1]))
            .collect();
        expected_counts.push(vec![
            ChannelCounts::Raw(raw),
            ChannelCounts::Averaged(averaged),
        ]);
        expected_battery.push((
            frame.ancillary[2] as f64 * BATTERY_SCALE,
            frame.ad[0] as f64 * BATTERY_SCALE,
        ));
    }

    let dataset = RawFileReader::new(
        Cursor::new(bytes),
        &params,
        SourceInfo::new("17082117.01A", "17082117.toml"),
    )
    .parse()
    .unwrap();

    assert_eq!(dataset.termination, StopReason::EndOfStream);
    assert_eq!(dataset.len(), num_pings);
    assert_eq!(dataset.counts, expected_counts);
    assert_eq!(dataset.config.as_ref().unwrap().data_type, vec![0, 1]);

    for (i, (main, tx)) in expected_battery.iter().enumerate() {
        assert!((dataset.battery_main[i] - main).abs() < 1e-12, "ping {}", i);
        assert!((dataset.battery_tx[i] - tx).abs() < 1e-12, "ping {}", i);
        assert!(dataset.temperature[i].is_finite(), "ping {}", i);
        assert!(dataset.cos_tilt_mag[i] <= 1.0, "ping {}", i);
    }

    // Hundredths never reach a whole second on their own
    for (i, t) in dataset.ping_time.iter().enumerate() {
        assert_eq!(t.and_utc().timestamp() % 60, (i % 60) as i64);
    }
}

#[test]
fn test_zero_sum_averaged_bins_are_zero() {
    let mut frame = Frame::new(1, [4, 0, 0, 0]);
    frame.data_type = [1, 0, 0, 0];
    let mut bytes = Vec::new();
    frame.write_header(&mut bytes);
    push_averaged(&mut bytes, &[0, 0, 0, 0], &[0, 0, 0, 0]);

    let dataset = parse_bytes(bytes).unwrap();
    assert_eq!(
        dataset.counts[0],
        vec![ChannelCounts::Averaged(vec![0.0; 4])]
    );
}

#[test]
fn test_truncated_last_ping_is_dropped() {
    let mut bytes = Vec::new();
    for _ in 0..3 {
        Frame::new(1, [8, 0, 0, 0]).write_header(&mut bytes);
        push_raw(&mut bytes, &[7; 8]);
    }
    bytes.truncate(bytes.len() - 5);

    let dataset = parse_bytes(bytes).unwrap();
    assert_eq!(dataset.len(), 2);
    assert_eq!(dataset.termination, StopReason::Truncated { ping: 2 });
}

#[test]
fn test_bin_count_change_aborts_parse() {
    let mut bytes = Vec::new();
    let first = Frame::new(1, [2, 0, 0, 0]);
    let mut second = first.clone();
    second.num_bins = [3, 0, 0, 0];

    first.write_header(&mut bytes);
    push_raw(&mut bytes, &[1, 2]);
    second.write_header(&mut bytes);
    push_raw(&mut bytes, &[1, 2, 3]);

    let err = parse_bytes(bytes).unwrap_err();
    assert_eq!(err.inconsistent_field(), Some("num_bins"));
}

#[test]
fn test_status_sink_called_once() {
    let mut bytes = Vec::new();
    for _ in 0..4 {
        Frame::new(1, [1, 0, 0, 0]).write_header(&mut bytes);
        push_raw(&mut bytes, &[0]);
    }

    let mut calls = 0;
    let mut first_time = None;
    let dataset = RawFileReader::with_sink(
        Cursor::new(bytes),
        &params(),
        SourceInfo::new("17082117.01A", "17082117.toml"),
        |status: &FirstPingStatus<'_>| {
            calls += 1;
            first_time = status.first_ping_time;
        },
    )
    .parse()
    .unwrap();

    assert_eq!(dataset.len(), 4);
    assert_eq!(calls, 1);
    assert_eq!(first_time, dataset.ping_time.first().copied());
}

#[test]
fn test_parse_file_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let raw_path = dir.path().join("17082117.01A");
    let params_path = dir.path().join("17082117.toml");

    let mut bytes = Vec::new();
    Frame::new(1, [2, 0, 0, 0]).write_header(&mut bytes);
    push_raw(&mut bytes, &[10, 20]);
    std::fs::File::create(&raw_path)
        .unwrap()
        .write_all(&bytes)
        .unwrap();
    std::fs::write(&params_path, PARAMS_TOML).unwrap();

    let params = InstrumentParameters::load(&params_path).unwrap();
    let dataset = parse_file(&raw_path, &params, "17082117.toml").unwrap();
    assert_eq!(dataset.counts, vec![vec![ChannelCounts::Raw(vec![10, 20])]]);
    assert_eq!(dataset.ping_time_millis().len(), 1);
}

#[test]
fn test_missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = parse_file(dir.path().join("absent.01A"), &params(), "x.toml").unwrap_err();
    assert!(matches!(err, ParseError::Io(_)));
}
