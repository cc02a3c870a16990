//! cartsync: copy retailer purchase history into an inventory service.
//!
//! # Usage
//!
//! ```text
//! cartsync status [--json]
//! cartsync connect [--token <token>]
//! cartsync disconnect
//! cartsync sync [--start YYYY-MM-DD] [--end YYYY-MM-DD] [--quiet]
//! cartsync daemon start|stop|status
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{connect::ConnectArgs, daemon::DaemonCommand, status::StatusArgs, sync::SyncArgs};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "cartsync",
    version,
    about = "Sync retailer purchase history into your inventory service",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show inventory, retailer and sync readiness.
    Status(StatusArgs),

    /// Store an inventory service token.
    Connect(ConnectArgs),

    /// Forget the stored inventory service token.
    Disconnect,

    /// Copy orders in a date range into the inventory service.
    Sync(SyncArgs),

    /// Run or control the background daemon.
    Daemon {
        #[command(subcommand)]
        command: DaemonCommand,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Status(args) => args.run(),
        Commands::Connect(args) => args.run(),
        Commands::Disconnect => commands::connect::disconnect(),
        Commands::Sync(args) => args.run(),
        Commands::Daemon { command } => commands::daemon::run(command),
    }
}
