//! Command orchestration helpers from UI actions to backend command queue.

use crossbeam_channel::{Sender, TrySendError};

use crate::backend_bridge::commands::BackendCommand;

pub fn dispatch_backend_command(
    cmd_tx: &Sender<BackendCommand>,
    cmd: BackendCommand,
    status: &mut String,
) {
    let cmd_name = cmd.name();
    match cmd_tx.try_send(cmd) {
        Ok(()) => tracing::debug!(command = cmd_name, "queued ui->backend command"),
        Err(TrySendError::Full(_)) => {
            *status = "UI command queue is full; please retry".to_string();
            tracing::warn!(command = cmd_name, "ui->backend command queue is full");
        }
        Err(TrySendError::Disconnected(_)) => {
            *status =
                "Backend command processor disconnected (possible startup/runtime failure); restart the dashboard"
                    .to_string();
            tracing::error!(command = cmd_name, "ui->backend command queue disconnected");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::bounded;

    #[test]
    fn reports_full_and_disconnected_queues_in_status() {
        let (tx, rx) = bounded::<BackendCommand>(1);
        let mut status = String::new();

        dispatch_backend_command(&tx, BackendCommand::Disconnect, &mut status);
        assert!(status.is_empty());

        dispatch_backend_command(&tx, BackendCommand::Disconnect, &mut status);
        assert!(status.contains("queue is full"));

        drop(rx);
        dispatch_backend_command(
            &tx,
            BackendCommand::Connect {
                server_url: "http://127.0.0.1:5000".to_string(),
            },
            &mut status,
        );
        assert!(status.contains("disconnected"));
    }
}
