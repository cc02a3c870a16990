//! `cartsync daemon`: foreground runtime and socket-level control.

use anyhow::{Context, Result};
use clap::Subcommand;

use cartsync_daemon::{not_running_payload, request_status, request_stop, start_blocking, DaemonError};

use super::home;

#[derive(Subcommand, Debug)]
pub enum DaemonCommand {
    /// Run the daemon in the foreground.
    Start,
    /// Request graceful daemon shutdown over the Unix socket.
    Stop,
    /// Query daemon status over the Unix socket.
    Status,
}

pub fn run(command: DaemonCommand) -> Result<()> {
    let home = home()?;

    match command {
        DaemonCommand::Start => {
            start_blocking(&home).context("daemon exited with error")?;
        }
        DaemonCommand::Stop => match request_stop(&home) {
            Ok(()) => println!("daemon stop requested"),
            Err(DaemonError::DaemonNotRunning { .. }) => {
                println!("daemon is not running");
            }
            Err(err) => return Err(err).context("failed to stop daemon"),
        },
        DaemonCommand::Status => {
            let payload = match request_status(&home) {
                Ok(status) => {
                    let mut payload = serde_json::json!({ "running": true });
                    payload["status"] =
                        serde_json::to_value(status).context("failed to encode status")?;
                    payload
                }
                Err(DaemonError::DaemonNotRunning { .. }) => not_running_payload(&home),
                Err(err) => return Err(err).context("failed to query daemon status"),
            };
            println!(
                "{}",
                serde_json::to_string_pretty(&payload)
                    .context("failed to render daemon status JSON")?
            );
        }
    }

    Ok(())
}
