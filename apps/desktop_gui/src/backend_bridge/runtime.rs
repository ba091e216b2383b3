//! Runtime bridge between UI command queue and backend event intake.
//!
//! The backend thread owns a tokio runtime and at most one dashboard session.
//! A session is the feed subscription, its controller task, and a forwarder
//! that relays every published view to the UI thread.

use std::thread;

use client_core::{start_dashboard, DashboardSettings, DashboardState, TerminalBell};
use crossbeam_channel::{Receiver, Sender};
use tokio::{sync::oneshot, task::JoinHandle};

use crate::backend_bridge::commands::BackendCommand;
use crate::controller::events::{UiError, UiErrorContext, UiEvent};

struct DashboardSession {
    shutdown: oneshot::Sender<()>,
    controller: JoinHandle<DashboardState>,
    forwarder: JoinHandle<()>,
}

impl DashboardSession {
    fn start(settings: &DashboardSettings, ui_tx: Sender<UiEvent>) -> Result<Self, String> {
        let (shutdown, shutdown_rx) = oneshot::channel::<()>();
        let (run, mut view) = start_dashboard(settings, TerminalBell::default(), async move {
            let _ = shutdown_rx.await;
        })
        .map_err(|err| err.to_string())?;

        let controller = tokio::spawn(run);
        let forwarder = tokio::spawn(async move {
            loop {
                let snapshot = view.borrow_and_update().clone();
                if ui_tx.try_send(UiEvent::ViewUpdated(snapshot)).is_err() {
                    tracing::warn!("ui event queue unavailable; dropping dashboard view");
                }
                if view.changed().await.is_err() {
                    break;
                }
            }
            let _ = ui_tx.try_send(UiEvent::SessionEnded);
        });

        Ok(Self {
            shutdown,
            controller,
            forwarder,
        })
    }

    async fn stop(self) {
        let _ = self.shutdown.send(());
        match self.controller.await {
            Ok(state) => tracing::info!(
                history_entries = state.history.len(),
                "dashboard session stopped"
            ),
            Err(err) => tracing::error!("dashboard controller task failed: {err}"),
        }
        let _ = self.forwarder.await;
    }
}

pub fn launch(cmd_rx: Receiver<BackendCommand>, ui_tx: Sender<UiEvent>, settings: DashboardSettings) {
    thread::spawn(move || {
        let _ = ui_tx.try_send(UiEvent::Info("Backend worker starting...".to_string()));
        let runtime = match tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
        {
            Ok(runtime) => runtime,
            Err(err) => {
                let _ = ui_tx.try_send(UiEvent::Error(UiError::from_message(
                    UiErrorContext::BackendStartup,
                    format!("backend worker startup failure: failed to build runtime: {err}"),
                )));
                tracing::error!("failed to build backend runtime: {err}");
                return;
            }
        };

        runtime.block_on(async move {
            let mut session: Option<DashboardSession> = None;
            let _ = ui_tx.try_send(UiEvent::Info("Backend worker ready".to_string()));

            while let Ok(cmd) = cmd_rx.recv() {
                match cmd {
                    BackendCommand::Connect { server_url } => {
                        if let Some(previous) = session.take() {
                            previous.stop().await;
                        }
                        let session_settings = DashboardSettings {
                            server_url: server_url.clone(),
                            ..settings.clone()
                        };
                        match DashboardSession::start(&session_settings, ui_tx.clone()) {
                            Ok(started) => {
                                tracing::info!(%server_url, "dashboard session started");
                                let _ = ui_tx.try_send(UiEvent::Info(format!(
                                    "Subscribing to {server_url}"
                                )));
                                session = Some(started);
                            }
                            Err(err) => {
                                let _ = ui_tx.try_send(UiEvent::Error(UiError::from_message(
                                    UiErrorContext::Connect,
                                    err,
                                )));
                            }
                        }
                    }
                    BackendCommand::Disconnect => {
                        if let Some(previous) = session.take() {
                            previous.stop().await;
                            let _ = ui_tx.try_send(UiEvent::Info("Disconnected".to_string()));
                        }
                    }
                }
            }

            if let Some(previous) = session.take() {
                previous.stop().await;
            }
        });
    });
}
