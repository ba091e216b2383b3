mod backend_bridge;
mod controller;
mod ui;

use clap::Parser;
use client_core::load_settings;
use crossbeam_channel::bounded;
use eframe::egui;
use tracing_subscriber::EnvFilter;

use crate::backend_bridge::commands::BackendCommand;
use crate::controller::events::UiEvent;
use crate::ui::{DashboardApp, PersistedDashboardSettings, StartupConfig, SETTINGS_STORAGE_KEY};

#[derive(Parser, Debug)]
#[command(about = "Live pedal sensor dashboard")]
struct Args {
    /// Sensor feed base URL, e.g. http://192.168.141.5:5000
    #[arg(long)]
    server_url: Option<String>,
    /// Wait for the Connect button instead of subscribing at startup.
    #[arg(long)]
    no_auto_connect: bool,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    let args = Args::parse();

    let mut settings = load_settings();
    let cli_url = args.server_url.clone();
    if let Some(url) = &cli_url {
        settings.server_url = url.clone();
    }
    let startup = StartupConfig {
        server_url: settings.server_url.clone(),
        auto_connect: !args.no_auto_connect,
    };

    let (cmd_tx, cmd_rx) = bounded::<BackendCommand>(64);
    let (ui_tx, ui_rx) = bounded::<UiEvent>(2048);
    backend_bridge::runtime::launch(cmd_rx, ui_tx, settings);

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title("Pedal State Monitor")
            .with_inner_size([720.0, 860.0])
            .with_min_inner_size([480.0, 640.0]),
        ..Default::default()
    };
    eframe::run_native(
        "Pedal State Monitor",
        options,
        Box::new(move |cc| {
            // An explicit --server-url beats the URL remembered from the last session.
            let persisted = if cli_url.is_some() {
                None
            } else {
                cc.storage.and_then(|storage| {
                    storage
                        .get_string(SETTINGS_STORAGE_KEY)
                        .and_then(|text| serde_json::from_str::<PersistedDashboardSettings>(&text).ok())
                })
            };
            Ok(Box::new(DashboardApp::new(cmd_tx, ui_rx, startup, persisted)))
        }),
    )
    .map_err(|err| anyhow::anyhow!("dashboard window failed: {err}"))
}
