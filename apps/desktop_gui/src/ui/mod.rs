//! UI layer for desktop GUI: app shell and the painted gauge.

pub mod app;
pub mod gauge;

pub use app::{DashboardApp, PersistedDashboardSettings, StartupConfig, SETTINGS_STORAGE_KEY};
