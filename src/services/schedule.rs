//! Time-of-day windows for shifts and attendance types.
//!
//! A window is `[start, end)`: the start minute is inside, the end minute is
//! not. A window whose end is before its start wraps past midnight. When
//! windows overlap the first one in configured order wins; a time covered by
//! no window resolves to `None`.

use std::str::FromStr;

use chrono::{NaiveDateTime, NaiveTime, Timelike};
use thiserror::Error;

use crate::model::attendance::{AttendanceType, ShiftType};

pub const DEFAULT_SHIFT_WINDOWS: &str = "morning@06:00-14:00;evening@14:00-22:00";
pub const DEFAULT_ATTENDANCE_TYPE_WINDOWS: &str =
    "time_in@06:00-08:00;time_out@12:00-14:00;time_in@14:00-16:00;time_out@20:00-22:00";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("window entry '{0}' must look like label@HH:MM-HH:MM")]
    MalformedEntry(String),

    #[error("unknown window label '{0}'")]
    UnknownLabel(String),

    #[error("invalid time of day '{0}'")]
    InvalidTime(String),

    #[error("window '{0}' starts and ends at the same time")]
    EmptyWindow(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow<L> {
    pub start: NaiveTime,
    pub end: NaiveTime,
    pub label: L,
}

impl<L> TimeWindow<L> {
    pub fn contains(&self, t: NaiveTime) -> bool {
        if self.start < self.end {
            self.start <= t && t < self.end
        } else {
            t >= self.start || t < self.end
        }
    }
}

/// Ordered `(start, end, label)` triples.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowTable<L> {
    windows: Vec<TimeWindow<L>>,
}

impl<L: Copy> WindowTable<L> {
    pub fn new(windows: Vec<TimeWindow<L>>) -> Self {
        Self { windows }
    }

    pub fn windows(&self) -> &[TimeWindow<L>] {
        &self.windows
    }

    pub fn resolve(&self, t: NaiveTime) -> Option<L> {
        self.windows.iter().find(|w| w.contains(t)).map(|w| w.label)
    }
}

fn parse_time(raw: &str) -> Result<NaiveTime, ScheduleError> {
    NaiveTime::parse_from_str(raw.trim(), "%H:%M")
        .map_err(|_| ScheduleError::InvalidTime(raw.trim().to_string()))
}

impl<L: FromStr + Copy> FromStr for WindowTable<L> {
    type Err = ScheduleError;

    /// Parses `label@HH:MM-HH:MM` entries separated by `;`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut windows = Vec::new();

        for entry in s.split(';').map(str::trim).filter(|e| !e.is_empty()) {
            let (label, range) = entry
                .split_once('@')
                .ok_or_else(|| ScheduleError::MalformedEntry(entry.to_string()))?;
            let (start, end) = range
                .split_once('-')
                .ok_or_else(|| ScheduleError::MalformedEntry(entry.to_string()))?;

            let label = L::from_str(label.trim())
                .map_err(|_| ScheduleError::UnknownLabel(label.trim().to_string()))?;
            let start = parse_time(start)?;
            let end = parse_time(end)?;
            if start == end {
                return Err(ScheduleError::EmptyWindow(entry.to_string()));
            }

            windows.push(TimeWindow { start, end, label });
        }

        Ok(Self { windows })
    }
}

/// Maps "now" to the current shift and attendance type. Pure lookups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleResolver {
    shifts: WindowTable<ShiftType>,
    attendance_types: WindowTable<AttendanceType>,
}

impl ScheduleResolver {
    pub fn new(
        shifts: WindowTable<ShiftType>,
        attendance_types: WindowTable<AttendanceType>,
    ) -> Self {
        Self {
            shifts,
            attendance_types,
        }
    }

    pub fn current_shift(&self, now: NaiveDateTime) -> Option<ShiftType> {
        self.shifts.resolve(minute_of(now))
    }

    pub fn current_attendance_type(&self, now: NaiveDateTime) -> Option<AttendanceType> {
        self.attendance_types.resolve(minute_of(now))
    }
}

// Windows are configured to the minute; seconds never move a boundary.
fn minute_of(now: NaiveDateTime) -> NaiveTime {
    let t = now.time();
    t.with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(t)
}
