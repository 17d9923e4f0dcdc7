//! Ping time assembly
//!
//! The hundredths field is folded into the seconds and the sum is
//! truncated to whole seconds before the timestamp is built, so any
//! sub-second part is dropped. Existing datasets were produced this way and
//! the behavior is kept for compatibility.

use chrono::{NaiveDate, NaiveDateTime};

use crate::common::{ParseError, ParseResult};
use crate::reader::decoder::PingClock;

/// Whole seconds after folding in the hundredths
pub fn whole_seconds(clock: &PingClock) -> u32 {
    (clock.second as f64 + clock.hundredths as f64 / 100.0) as u32
}

/// Timestamp of one ping, `None` if the subfields are not a calendar time
pub fn ping_time(clock: &PingClock) -> Option<NaiveDateTime> {
    NaiveDate::from_ymd_opt(clock.year as i32, clock.month as u32, clock.day as u32)?
        .and_hms_milli_opt(
            clock.hour as u32,
            clock.minute as u32,
            whole_seconds(clock),
            0,
        )
}

/// Timestamps of every ping, in ping order
pub fn assemble(clocks: &[PingClock]) -> ParseResult<Vec<NaiveDateTime>> {
    clocks
        .iter()
        .enumerate()
        .map(|(ping, clock)| {
            ping_time(clock).ok_or_else(|| ParseError::invalid_ping_time(ping, clock))
        })
        .collect()
}
