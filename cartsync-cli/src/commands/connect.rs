//! `cartsync connect` / `cartsync disconnect`: inventory credential lifecycle.

use std::io::Read;

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;

use cartsync_daemon::{request_connect, request_disconnect};

use super::home;

/// Arguments for `cartsync connect`.
#[derive(Args, Debug)]
pub struct ConnectArgs {
    /// Token issued by the inventory service. Read from stdin when omitted.
    #[arg(long)]
    pub token: Option<String>,
}

impl ConnectArgs {
    pub fn run(self) -> Result<()> {
        let home = home()?;
        let token = match self.token {
            Some(token) => token,
            None => {
                let mut buf = String::new();
                std::io::stdin()
                    .read_to_string(&mut buf)
                    .context("failed to read token from stdin")?;
                buf
            }
        };
        let token = token.trim();
        if token.is_empty() {
            bail!("no token given; pass --token or pipe it on stdin");
        }

        let status = request_connect(&home, token).context("failed to connect")?;
        if status.warehouse_connected {
            println!("{} connected to the inventory service", "✓".green().bold());
        } else if status.network_error {
            println!(
                "{} token stored, but the inventory service is unreachable right now",
                "!".yellow().bold()
            );
        } else {
            println!(
                "{} token stored, but the inventory service did not accept it",
                "✗".red().bold()
            );
        }
        Ok(())
    }
}

pub fn disconnect() -> Result<()> {
    let home = home()?;
    request_disconnect(&home).context("failed to disconnect")?;
    println!("disconnected from the inventory service");
    Ok(())
}
