//! Command orchestration helpers from UI actions to the backend command queue.

use crossbeam_channel::{Sender, TrySendError};

use crate::backend_bridge::commands::BackendCommand;

fn command_name(cmd: &BackendCommand) -> &'static str {
    match cmd {
        BackendCommand::SignIn { .. } => "sign_in",
        BackendCommand::SignOut => "sign_out",
        BackendCommand::RefreshTasks => "refresh_tasks",
        BackendCommand::CreateTask { .. } => "create_task",
        BackendCommand::DeleteTask { .. } => "delete_task",
    }
}

pub fn dispatch_backend_command(
    cmd_tx: &Sender<BackendCommand>,
    cmd: BackendCommand,
    status: &mut String,
) {
    let cmd_name = command_name(&cmd);
    match cmd_tx.try_send(cmd) {
        Ok(()) => tracing::debug!(command = cmd_name, "queued ui->backend command"),
        Err(TrySendError::Full(_)) => {
            *status = "Command queue is full; please retry".to_string();
        }
        Err(TrySendError::Disconnected(_)) => {
            *status =
                "Backend command processor disconnected (possible startup/runtime failure); retry sign-in"
                    .to_string();
        }
    }
}

/// Queue a command from a call site with no status line to update, e.g.
/// overlay content closures. Failures are logged and dropped.
pub fn try_dispatch(cmd_tx: &Sender<BackendCommand>, cmd: BackendCommand) {
    let cmd_name = command_name(&cmd);
    if let Err(err) = cmd_tx.try_send(cmd) {
        tracing::warn!(command = cmd_name, "dropped ui->backend command: {err}");
    }
}
