//! Dashboard state and the sensor event reducer.

use std::collections::{BTreeSet, VecDeque};
use std::fmt;

use chrono::{DateTime, Local, TimeZone};
use shared::domain::{SensorEvent, PEDAL_ACCELERATOR, PEDAL_IDLE};

use crate::alerts::AlertId;

pub const HISTORY_CAPACITY: usize = 50;
pub const HISTORY_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
pub const INVALID_DATE: &str = "Invalid Date";

/// Largest absolute millisecond offset a calendar date may have.
const MAX_TIMESTAMP_MILLIS: f64 = 8.64e15;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub time: String,
    pub pedal: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DashboardState {
    pub pedal: i64,
    pub angle: f64,
    /// Oldest first.
    pub history: VecDeque<HistoryEntry>,
    pub active_alerts: BTreeSet<AlertId>,
}

impl Default for DashboardState {
    fn default() -> Self {
        Self {
            pedal: PEDAL_IDLE,
            angle: 0.0,
            history: VecDeque::with_capacity(HISTORY_CAPACITY),
            active_alerts: BTreeSet::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reduction {
    /// Exact retransmission of the previous event.
    Suppressed,
    Applied {
        raised_alert: Option<AlertId>,
        recorded_history: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct DuplicateTracker {
    last_pedal: i64,
    last_angle: Option<f64>,
    last_timestamp: Option<f64>,
}

impl Default for DuplicateTracker {
    fn default() -> Self {
        Self {
            last_pedal: PEDAL_IDLE,
            last_angle: None,
            last_timestamp: None,
        }
    }
}

/// Owns [`DashboardState`] together with the retransmission tracker and the
/// alert id sequence. All mutation goes through [`Dashboard::apply`] and
/// [`Dashboard::expire_alert`].
pub struct Dashboard {
    state: DashboardState,
    tracker: DuplicateTracker,
    next_alert_id: u64,
    format_time: fn(f64) -> String,
}

impl Default for Dashboard {
    fn default() -> Self {
        Self::new()
    }
}

impl Dashboard {
    pub fn new() -> Self {
        Self::with_time_format(format_local_timestamp)
    }

    pub fn with_time_format(format_time: fn(f64) -> String) -> Self {
        Self {
            state: DashboardState::default(),
            tracker: DuplicateTracker::default(),
            next_alert_id: 1,
            format_time,
        }
    }

    pub fn state(&self) -> &DashboardState {
        &self.state
    }

    pub fn into_state(self) -> DashboardState {
        self.state
    }

    pub fn apply(&mut self, event: &SensorEvent) -> Reduction {
        let angle_changed = self.tracker.last_angle != Some(event.angle);
        self.state.angle = event.angle;
        self.tracker.last_angle = Some(event.angle);

        if event.pedal == PEDAL_IDLE {
            self.tracker.last_pedal = PEDAL_IDLE;
        }

        // Releases are always shown, even when retransmitted.
        if event.pedal != PEDAL_IDLE
            && event.pedal == self.tracker.last_pedal
            && !angle_changed
            && self.tracker.last_timestamp == Some(event.timestamp)
        {
            return Reduction::Suppressed;
        }

        self.state.pedal = event.pedal;

        let raised_alert = if event.sudden_acceleration && event.pedal == PEDAL_ACCELERATOR {
            let id = AlertId(self.next_alert_id);
            self.next_alert_id += 1;
            self.state.active_alerts.insert(id);
            Some(id)
        } else {
            None
        };

        let recorded_history = event.pedal != PEDAL_IDLE;
        if recorded_history {
            self.state.history.push_back(HistoryEntry {
                time: (self.format_time)(event.timestamp),
                pedal: event.pedal,
            });
            while self.state.history.len() > HISTORY_CAPACITY {
                self.state.history.pop_front();
            }
        }

        self.tracker.last_pedal = event.pedal;
        self.tracker.last_timestamp = Some(event.timestamp);

        Reduction::Applied {
            raised_alert,
            recorded_history,
        }
    }

    pub fn expire_alert(&mut self, id: AlertId) -> bool {
        self.state.active_alerts.remove(&id)
    }

    pub fn clear_alerts(&mut self) -> usize {
        let cleared = self.state.active_alerts.len();
        self.state.active_alerts.clear();
        cleared
    }
}

pub fn format_local_timestamp(timestamp: f64) -> String {
    format_timestamp(timestamp, &Local)
}

/// Formats unix seconds in `tz`; non-representable instants yield `Invalid Date`.
pub fn format_timestamp<Tz>(timestamp: f64, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    let millis = (timestamp * 1000.0).trunc();
    if !millis.is_finite() || millis.abs() > MAX_TIMESTAMP_MILLIS {
        return INVALID_DATE.to_string();
    }
    match DateTime::from_timestamp_millis(millis as i64) {
        Some(instant) => instant
            .with_timezone(tz)
            .format(HISTORY_TIME_FORMAT)
            .to_string(),
        None => INVALID_DATE.to_string(),
    }
}

#[cfg(test)]
#[path = "tests/state_tests.rs"]
mod tests;
