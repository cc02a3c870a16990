//! `cartsync status`: readiness of both sides and any running sync.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use cartsync_core::ConnectionStatus;
use cartsync_daemon::{not_running_payload, request_status, DaemonError};

use super::home;

/// Arguments for `cartsync status`.
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl StatusArgs {
    pub fn run(self) -> Result<()> {
        let home = home()?;

        let status = match request_status(&home) {
            Ok(status) => status,
            Err(DaemonError::DaemonNotRunning { .. }) => {
                if self.json {
                    println!(
                        "{}",
                        serde_json::to_string_pretty(&not_running_payload(&home))
                            .context("failed to serialize status JSON")?
                    );
                } else {
                    println!(
                        "{} daemon is not running; start it with 'cartsync daemon start'",
                        "■".bright_black().bold()
                    );
                }
                return Ok(());
            }
            Err(err) => return Err(err).context("failed to query daemon status"),
        };

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&status).context("failed to serialize status JSON")?
            );
        } else {
            print_table(&status);
        }
        Ok(())
    }
}

#[derive(Tabled)]
struct StatusRow {
    #[tabled(rename = "")]
    indicator: String,
    #[tabled(rename = "component")]
    component: &'static str,
    #[tabled(rename = "state")]
    state: String,
}

fn print_table(status: &ConnectionStatus) {
    let rows = vec![
        inventory_row(status),
        StatusRow {
            indicator: indicator(status.has_counterpart_tab),
            component: "retailer tab",
            state: if status.has_counterpart_tab { "open" } else { "not open" }.to_string(),
        },
        StatusRow {
            indicator: indicator(status.counterpart_connected),
            component: "retailer login",
            state: if status.counterpart_connected {
                "logged in"
            } else {
                "not logged in"
            }
            .to_string(),
        },
        sync_row(status),
    ];

    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("cartsync v{}", env!("CARGO_PKG_VERSION"));
    println!("{table}");

    if !status.warehouse_connected && !status.network_error {
        println!("Run 'cartsync connect' to link your inventory account.");
    }
}

fn inventory_row(status: &ConnectionStatus) -> StatusRow {
    let (indicator, state) = if status.warehouse_connected {
        ("■".green().bold().to_string(), "connected")
    } else if status.network_error {
        ("■".yellow().bold().to_string(), "unreachable")
    } else {
        ("■".red().bold().to_string(), "not connected")
    };
    StatusRow {
        indicator,
        component: "inventory service",
        state: state.to_string(),
    }
}

fn sync_row(status: &ConnectionStatus) -> StatusRow {
    let state = match (&status.sync_progress, status.sync_in_progress) {
        (Some(progress), true) => progress.message.clone(),
        (None, true) => "starting".to_string(),
        (_, false) => "idle".to_string(),
    };
    StatusRow {
        indicator: if status.sync_in_progress {
            "■".cyan().bold().to_string()
        } else {
            "■".bright_black().bold().to_string()
        },
        component: "sync",
        state,
    }
}

fn indicator(good: bool) -> String {
    if good {
        "■".green().bold().to_string()
    } else {
        "■".red().bold().to_string()
    }
}
