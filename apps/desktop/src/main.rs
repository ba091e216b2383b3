use anyhow::Result;
use clap::Parser;
use client_core::{
    load_settings, start_dashboard, AlertSound, DashboardView, SilentAlertSound, TerminalBell,
};
use tracing_subscriber::EnvFilter;

/// Headless pedal monitor: subscribes to the sensor feed and prints one line
/// per dashboard change.
#[derive(Parser, Debug)]
struct Args {
    #[arg(long)]
    server_url: Option<String>,
    /// Stop after the first disconnect instead of retrying with backoff.
    #[arg(long)]
    no_reconnect: bool,
    /// Do not ring the terminal bell while an alert is showing.
    #[arg(long)]
    mute: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();

    let mut settings = load_settings();
    if let Some(url) = args.server_url {
        settings.server_url = url;
    }
    if args.no_reconnect {
        settings.reconnect = false;
    }
    tracing::info!(server_url = %settings.server_url, "starting pedal monitor");

    let sound: Box<dyn AlertSound> = if args.mute {
        Box::new(SilentAlertSound)
    } else {
        Box::new(TerminalBell::default())
    };
    let shutdown = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for ctrl-c: {err}");
        }
    };
    let (run, mut view) = start_dashboard(&settings, sound, shutdown)?;
    let controller = tokio::spawn(run);

    let printer = tokio::spawn(async move {
        let mut last_line = String::new();
        loop {
            let line = render_line(&view.borrow_and_update());
            if line != last_line {
                println!("{line}");
                last_line = line;
            }
            if view.changed().await.is_err() {
                break;
            }
        }
    });

    let state = controller.await?;
    let _ = printer.await;
    tracing::info!(
        history_entries = state.history.len(),
        last_pedal = state.pedal,
        "pedal monitor stopped"
    );
    Ok(())
}

fn render_line(view: &DashboardView) -> String {
    let mut line = format!(
        "[{}] pedal={} angle={:.1} needle={:.1}",
        view.connection.label(),
        view.pedal,
        view.angle,
        view.needle_degrees
    );
    if let Some(status) = view.status_text() {
        line.push_str(" | ");
        line.push_str(status);
    }
    if view.alert_visible {
        line.push_str(&format!(
            " | ALERT: sudden acceleration suspected ({} active)",
            view.active_alert_count
        ));
    }
    if let Some(latest) = view.history_rows.first() {
        line.push_str(&format!(" | last {} at {}", latest.card.label(), latest.time));
    }
    line
}

#[cfg(test)]
mod tests {
    use super::render_line;
    use client_core::{ConnectionStatus, DashboardState, DashboardView, HistoryEntry};

    #[test]
    fn idle_view_renders_idle_status() {
        let view = DashboardView::project(&DashboardState::default(), ConnectionStatus::Connecting);
        assert_eq!(
            render_line(&view),
            "[Connecting] pedal=-1 angle=0.0 needle=-90.0 | Current state: no pedal pressed"
        );
    }

    #[test]
    fn alert_and_latest_history_are_rendered() {
        let mut state = DashboardState::default();
        state.pedal = 1;
        state.angle = 10.0;
        state.history.push_back(HistoryEntry {
            time: "2024-03-01 08:00:00".to_string(),
            pedal: 1,
        });
        state.active_alerts.insert(client_core::AlertId(7));
        let line = render_line(&DashboardView::project(&state, ConnectionStatus::Connected));

        assert!(line.starts_with("[Connected] pedal=1 angle=10.0 needle=0.0"));
        assert!(line.contains("ALERT: sudden acceleration suspected (1 active)"));
        assert!(line.ends_with("last Accelerator at 2024-03-01 08:00:00"));
    }
}
