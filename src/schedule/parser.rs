//! Reads the hourly status table of the outage-data JSON and turns it into
//! contiguous outage intervals.
//!
//! Expected shape:
//! `{ "fact": { "data": { "<epochSeconds>": { "GPV<group>": { "<slot>": "<yes|no|maybe>" } } } } }`
//!
//! Slot `k` (1..=24) covers the half-hour-shifted hour starting at
//! `(k-1):30`. A run still open after slot 24 ends at synthetic slot 25,
//! which renders as `24:00`.

use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;
use tracing::debug;

pub const SLOTS_PER_DAY: u8 = 24;
/// Synthetic end slot for a run that lasts until midnight.
pub const END_OF_DAY_SLOT: u8 = 25;

#[derive(Error, Debug)]
pub enum ScheduleError {
    #[error("Schedule JSON could not be parsed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Schedule has no fact.data section")]
    MissingFact,
    #[error("Schedule has no entry for day {0}")]
    MissingDay(i64),
    #[error("Schedule day has no group {0}")]
    MissingGroup(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotStatus {
    Yes,
    No,
    Maybe,
}

impl SlotStatus {
    /// Unknown or absent tokens count as "yes" (power on).
    pub fn from_token(token: Option<&str>) -> Self {
        match token {
            Some("no") => SlotStatus::No,
            Some("maybe") => SlotStatus::Maybe,
            _ => SlotStatus::Yes,
        }
    }

    pub fn is_outage(self) -> bool {
        matches!(self, SlotStatus::No | SlotStatus::Maybe)
    }
}

/// Half-open slot range `[start_slot, end_slot)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutageInterval {
    pub start_slot: u8,
    pub end_slot: u8,
}

impl OutageInterval {
    pub fn duration_hours(&self) -> f64 {
        f64::from(self.end_slot.saturating_sub(self.start_slot))
    }

    pub fn start_clock(&self) -> String {
        slot_clock(self.start_slot)
    }

    pub fn end_clock(&self) -> String {
        slot_clock(self.end_slot)
    }
}

impl fmt::Display for OutageInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} - {} ({})",
            self.start_clock(),
            self.end_clock(),
            format_hours(self.duration_hours())
        )
    }
}

/// Slot `k` starts at `(k-1):30`; slot 25 is midnight.
pub fn slot_clock(slot: u8) -> String {
    if slot >= END_OF_DAY_SLOT {
        "24:00".to_string()
    } else {
        format!("{:02}:30", slot.saturating_sub(1))
    }
}

/// `~3 год` for whole hours, `~1.5 год` otherwise.
pub fn format_hours(hours: f64) -> String {
    if hours.fract() == 0.0 {
        format!("~{} год", hours as i64)
    } else {
        format!("~{hours:.1} год")
    }
}

/// Group key as it appears in the data, e.g. `GPV3.1`.
pub fn group_key(group: &str) -> String {
    format!("GPV{group}")
}

pub fn parse_schedule(bytes: &[u8]) -> Result<Value, ScheduleError> {
    Ok(serde_json::from_slice(bytes)?)
}

/// The raw slot map for one group on one day.
pub fn day_slots<'a>(
    schedule: &'a Value,
    group: &str,
    day_key: i64,
) -> Result<&'a Map<String, Value>, ScheduleError> {
    let days = schedule
        .get("fact")
        .and_then(|fact| fact.get("data"))
        .and_then(Value::as_object)
        .ok_or(ScheduleError::MissingFact)?;
    let day = days
        .get(&day_key.to_string())
        .and_then(Value::as_object)
        .ok_or(ScheduleError::MissingDay(day_key))?;
    let key = group_key(group);
    day.get(&key)
        .and_then(Value::as_object)
        .ok_or(ScheduleError::MissingGroup(key))
}

pub fn slot_table(slots: &Map<String, Value>) -> [SlotStatus; SLOTS_PER_DAY as usize] {
    let mut table = [SlotStatus::Yes; SLOTS_PER_DAY as usize];
    for (index, status) in table.iter_mut().enumerate() {
        let slot = index + 1;
        *status = SlotStatus::from_token(slots.get(&slot.to_string()).and_then(Value::as_str));
    }
    table
}

/// Run-length encodes the outage slots of a day.
pub fn extract_intervals(table: &[SlotStatus]) -> Vec<OutageInterval> {
    let mut intervals = Vec::new();
    let mut open: Option<u8> = None;

    for (index, status) in table.iter().take(SLOTS_PER_DAY as usize).enumerate() {
        let slot = index as u8 + 1;
        match (status.is_outage(), open) {
            (true, None) => open = Some(slot),
            (false, Some(start_slot)) => {
                intervals.push(OutageInterval {
                    start_slot,
                    end_slot: slot,
                });
                open = None;
            }
            _ => {}
        }
    }

    if let Some(start_slot) = open {
        intervals.push(OutageInterval {
            start_slot,
            end_slot: END_OF_DAY_SLOT,
        });
    }
    intervals
}

/// Intervals for one group on one day. Malformed or missing data yields an
/// empty list.
pub fn intervals_for_day(schedule: &Value, group: &str, day_key: i64) -> Vec<OutageInterval> {
    match day_slots(schedule, group, day_key) {
        Ok(slots) => extract_intervals(&slot_table(slots)),
        Err(e) => {
            debug!(group = %group, day_key = day_key, error = %e, "No schedule rows for day.");
            Vec::new()
        }
    }
}
