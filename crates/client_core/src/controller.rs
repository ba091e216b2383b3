//! The dashboard controller: single consumer of the sensor feed.

use std::{future::Future, time::Duration};

use tokio::sync::{mpsc, watch};
use tracing::{debug, info};

use crate::{
    alarm::{AlarmDriver, AlertSound},
    alerts::{AlertId, AlertTimers, ALERT_DURATION},
    state::{Dashboard, DashboardState, Reduction},
    transport::{FeedEvent, FeedSubscription},
    view::{ConnectionStatus, DashboardView},
};

/// Owns every piece of dashboard state for one subscription lifetime.
///
/// Feed events and alert expiries are serialized through one `select!` loop;
/// each accepted change republishes a [`DashboardView`] on a watch channel.
pub struct DashboardController<S: AlertSound> {
    dashboard: Dashboard,
    timers: AlertTimers,
    expired_rx: mpsc::UnboundedReceiver<AlertId>,
    alarm: AlarmDriver<S>,
    connection: ConnectionStatus,
    view_tx: watch::Sender<DashboardView>,
}

impl<S: AlertSound> DashboardController<S> {
    pub fn new(sound: S) -> (Self, watch::Receiver<DashboardView>) {
        Self::with_dashboard(Dashboard::new(), sound, ALERT_DURATION)
    }

    pub fn with_dashboard(
        dashboard: Dashboard,
        sound: S,
        alert_duration: Duration,
    ) -> (Self, watch::Receiver<DashboardView>) {
        let (timers, expired_rx) = AlertTimers::new(alert_duration);
        let connection = ConnectionStatus::Connecting;
        let (view_tx, view_rx) =
            watch::channel(DashboardView::project(dashboard.state(), connection));
        (
            Self {
                dashboard,
                timers,
                expired_rx,
                alarm: AlarmDriver::new(sound),
                connection,
                view_tx,
            },
            view_rx,
        )
    }

    pub fn state(&self) -> &DashboardState {
        self.dashboard.state()
    }

    /// Runs until `shutdown` resolves or the feed ends, then tears down.
    pub async fn run(
        mut self,
        mut feed: FeedSubscription,
        shutdown: impl Future<Output = ()>,
    ) -> DashboardState {
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!("dashboard shutdown requested");
                    break;
                }
                Some(id) = self.expired_rx.recv() => self.handle_alert_expired(id),
                event = feed.recv() => match event {
                    Some(event) => self.handle_feed_event(event),
                    None => {
                        info!("sensor feed ended");
                        break;
                    }
                },
            }
        }
        self.teardown();
        feed.close().await;
        self.dashboard.into_state()
    }

    pub fn handle_feed_event(&mut self, event: FeedEvent) {
        match event {
            FeedEvent::Connected { sid } => {
                info!(sid = sid.as_deref().unwrap_or("-"), "dashboard connected to sensor feed");
                self.connection = ConnectionStatus::Connected;
                self.publish();
            }
            FeedEvent::Disconnected { reason } => {
                info!(%reason, "dashboard lost sensor feed");
                self.connection = ConnectionStatus::Disconnected;
                self.publish();
            }
            FeedEvent::Sensor(event) => {
                debug!(
                    pedal = event.pedal,
                    angle = event.angle,
                    timestamp = event.timestamp,
                    sudden_acceleration = event.sudden_acceleration,
                    "sensor event received"
                );
                match self.dashboard.apply(&event) {
                    Reduction::Suppressed => {
                        debug!(timestamp = event.timestamp, "suppressed retransmitted sensor event");
                    }
                    Reduction::Applied { raised_alert, .. } => {
                        if let Some(id) = raised_alert {
                            self.timers.schedule(id);
                            info!(
                                alert = id.0,
                                pending_alerts = self.timers.pending(),
                                "sudden acceleration suspected"
                            );
                            self.alarm
                                .on_alerts_changed(self.dashboard.state().active_alerts.len());
                        }
                        self.publish();
                    }
                }
            }
        }
    }

    pub fn handle_alert_expired(&mut self, id: AlertId) {
        self.timers.complete(id);
        if self.dashboard.expire_alert(id) {
            debug!(alert = id.0, "alert expired");
            self.alarm
                .on_alerts_changed(self.dashboard.state().active_alerts.len());
            self.publish();
        }
    }

    fn teardown(&mut self) {
        let cancelled = self.timers.cancel_all();
        let cleared = self.dashboard.clear_alerts();
        self.alarm.silence();
        self.connection = ConnectionStatus::Disconnected;
        self.publish();
        info!(cancelled_timers = cancelled, cleared_alerts = cleared, "dashboard torn down");
    }

    fn publish(&self) {
        self.view_tx.send_replace(DashboardView::project(
            self.dashboard.state(),
            self.connection,
        ));
    }
}

#[cfg(test)]
#[path = "tests/controller_tests.rs"]
mod tests;
