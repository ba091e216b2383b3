//! Client-side core of the pedal dashboard: feed subscription, event
//! reduction, alert timing and the render projection consumed by the apps.

pub mod alarm;
pub mod alerts;
pub mod config;
pub mod controller;
pub mod error;
pub mod state;
pub mod transport;
pub mod view;

pub use alarm::{AlarmDriver, AlertSound, SilentAlertSound, TerminalBell};
pub use alerts::{AlertId, AlertTimers, ALERT_DURATION};
pub use config::{load_settings, DashboardSettings};
pub use controller::DashboardController;
pub use error::{FeedError, PlaybackError};
pub use state::{Dashboard, DashboardState, HistoryEntry, Reduction, HISTORY_CAPACITY};
pub use transport::{FeedEvent, FeedSubscription, ReconnectPolicy};
pub use view::{
    angle_to_rotation, ConnectionStatus, DashboardView, HistoryRow, PedalCard,
    HISTORY_DISPLAY_ROWS,
};

use std::future::Future;

use tokio::sync::watch;

/// Opens the configured feed and returns a controller future ready to spawn,
/// plus the view receiver renderers observe.
pub fn start_dashboard<S>(
    settings: &DashboardSettings,
    sound: S,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<
    (
        impl Future<Output = DashboardState> + Send + 'static,
        watch::Receiver<DashboardView>,
    ),
    FeedError,
>
where
    S: AlertSound + 'static,
{
    let feed = FeedSubscription::open(&settings.server_url, settings.reconnect_policy())?;
    let (controller, view) = DashboardController::new(sound);
    Ok((controller.run(feed, shutdown), view))
}
