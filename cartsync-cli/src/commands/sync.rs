//! `cartsync sync`: run a sync and follow its progress.

use std::thread;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Args;
use colored::Colorize;

use cartsync_core::dates::parse_iso;
use cartsync_core::{ProgressSnapshot, SyncOutcome, SyncReport};
use cartsync_daemon::{request_sync, subscribe_progress};

use super::home;

/// Arguments for `cartsync sync`.
#[derive(Args, Debug)]
pub struct SyncArgs {
    /// First order date to include (defaults to the trailing window).
    #[arg(long, value_parser = parse_iso)]
    pub start: Option<NaiveDate>,

    /// Last order date to include (defaults to today).
    #[arg(long, value_parser = parse_iso)]
    pub end: Option<NaiveDate>,

    /// Do not print live progress.
    #[arg(long)]
    pub quiet: bool,
}

impl SyncArgs {
    pub fn run(self) -> Result<()> {
        let home = home()?;

        let progress = if self.quiet {
            None
        } else {
            let stream = subscribe_progress(&home).context("failed to subscribe to progress")?;
            Some(thread::spawn(move || {
                for snapshot in this_run(stream) {
                    print_progress(&snapshot);
                }
            }))
        };

        let outcome = request_sync(&home, self.start.map(iso), self.end.map(iso))
            .context("sync failed")?;

        // The end-of-run marker is published before the reply, so the
        // follower thread finishes on its own.
        if let Some(handle) = progress {
            let _ = handle.join();
        }

        match outcome {
            SyncOutcome::Empty { .. } => println!("No orders found in that date range."),
            SyncOutcome::Completed(report) => print_report(&report),
        }
        Ok(())
    }
}

/// Snapshots of the next run. End markers seen before its first snapshot
/// belong to a run that finished while we were subscribing.
fn this_run<I, E>(stream: I) -> impl Iterator<Item = ProgressSnapshot>
where
    I: IntoIterator<Item = Result<Option<ProgressSnapshot>, E>>,
{
    stream
        .into_iter()
        .map_while(Result::ok)
        .skip_while(Option::is_none)
        .map_while(|snapshot| snapshot)
}

fn iso(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn print_progress(snapshot: &ProgressSnapshot) {
    match (snapshot.current, snapshot.total) {
        (Some(current), Some(total)) => {
            println!("  {} {}", format!("[{current}/{total}]").bright_black(), snapshot.message)
        }
        _ => println!("  {}", snapshot.message),
    }
}

fn print_report(report: &SyncReport) {
    println!(
        "{} {} imported, {} duplicates, {} skipped, {} errors",
        "✓".green().bold(),
        report.imported,
        report.duplicates,
        report.skipped,
        report.errors,
    );
    if report.fetch_failed > 0 {
        println!(
            "{} {} orders could not be read from the retailer and were skipped",
            "!".yellow().bold(),
            report.fetch_failed,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn follows_only_the_run_after_subscribing() {
        let stream: Vec<Result<Option<ProgressSnapshot>, ()>> = vec![
            Ok(None),
            Ok(Some(ProgressSnapshot::listing())),
            Ok(Some(ProgressSnapshot::fetching(1, 1))),
            Ok(Some(ProgressSnapshot::importing(1))),
            Ok(None),
            Ok(Some(ProgressSnapshot::listing())),
        ];
        let seen: Vec<ProgressSnapshot> = this_run(stream).collect();
        assert_eq!(
            seen,
            vec![
                ProgressSnapshot::listing(),
                ProgressSnapshot::fetching(1, 1),
                ProgressSnapshot::importing(1),
            ]
        );
    }

    #[test]
    fn stream_error_ends_following() {
        let stream = vec![Ok(Some(ProgressSnapshot::listing())), Err("closed"), Ok(None)];
        assert_eq!(this_run(stream).count(), 1);
    }
}
