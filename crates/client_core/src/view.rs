//! Pure projection of [`DashboardState`] into what the dashboard renders.

use std::collections::VecDeque;

use shared::domain::{PedalState, MAX_SENSOR_ANGLE, PEDAL_ACCELERATOR, PEDAL_IDLE};

use crate::state::{DashboardState, HistoryEntry};

pub const HISTORY_DISPLAY_ROWS: usize = 10;

/// Maps the sensor's [0, 20] degree range onto a [-90, 90] needle rotation.
/// Out-of-range input is not clamped.
pub fn angle_to_rotation(angle: f64) -> f64 {
    -90.0 + (angle / MAX_SENSOR_ANGLE) * 180.0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionStatus {
    #[default]
    Connecting,
    Connected,
    Disconnected,
}

impl ConnectionStatus {
    pub fn label(self) -> &'static str {
        match self {
            Self::Connecting => "Connecting",
            Self::Connected => "Connected",
            Self::Disconnected => "Disconnected",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PedalCard {
    Accelerator,
    Brake,
}

impl PedalCard {
    pub fn label(self) -> &'static str {
        match self {
            Self::Accelerator => "Accelerator",
            Self::Brake => "Brake",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryRow {
    pub time: String,
    pub pedal: i64,
    pub card: PedalCard,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DashboardView {
    pub connection: ConnectionStatus,
    pub pedal: i64,
    pub status: Option<PedalState>,
    pub active_card: Option<PedalCard>,
    pub angle: f64,
    pub needle_degrees: f64,
    pub alert_visible: bool,
    pub active_alert_count: usize,
    /// Newest first.
    pub history_rows: Vec<HistoryRow>,
}

impl Default for DashboardView {
    fn default() -> Self {
        Self::project(&DashboardState::default(), ConnectionStatus::default())
    }
}

impl DashboardView {
    pub fn project(state: &DashboardState, connection: ConnectionStatus) -> Self {
        let status = PedalState::from_raw(state.pedal);
        let active_card = match status {
            Some(PedalState::Accelerating) => Some(PedalCard::Accelerator),
            Some(PedalState::Braking) => Some(PedalCard::Brake),
            Some(PedalState::Idle) | None => None,
        };
        Self {
            connection,
            pedal: state.pedal,
            status,
            active_card,
            angle: state.angle,
            needle_degrees: angle_to_rotation(state.angle),
            alert_visible: !state.active_alerts.is_empty(),
            active_alert_count: state.active_alerts.len(),
            history_rows: history_rows(&state.history),
        }
    }

    pub fn status_text(&self) -> Option<&'static str> {
        self.status.map(PedalState::status_text)
    }
}

pub fn history_rows(history: &VecDeque<HistoryEntry>) -> Vec<HistoryRow> {
    let visible: Vec<&HistoryEntry> = history
        .iter()
        .filter(|entry| entry.pedal != PEDAL_IDLE)
        .collect();
    let start = visible.len().saturating_sub(HISTORY_DISPLAY_ROWS);
    visible[start..]
        .iter()
        .rev()
        .map(|entry| HistoryRow {
            time: entry.time.clone(),
            pedal: entry.pedal,
            card: if entry.pedal == PEDAL_ACCELERATOR {
                PedalCard::Accelerator
            } else {
                PedalCard::Brake
            },
        })
        .collect()
}

#[cfg(test)]
#[path = "tests/view_tests.rs"]
mod tests;
