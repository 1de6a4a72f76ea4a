//! Watch command - keep auto-sync profiles in sync until interrupted
//!
//! Provides the `syncvault watch` CLI command which:
//! 1. Starts the scheduler for every configured profile
//! 2. Watches the source trees of auto-sync profiles
//! 3. Prints a line for every finished run
//! 4. Shuts down gracefully on SIGINT/SIGTERM, cancelling runs in flight

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use syncvault_core::config::Config;
use syncvault_sync::engine::SyncEngine;
use syncvault_sync::logging::TracingLogSink;
use syncvault_sync::scheduler::{RunReport, SyncScheduler};
use tracing::{info, warn};

use crate::output::{format_duration, get_formatter, plural, OutputFormat, OutputFormatter};

#[derive(Debug, Args)]
pub struct WatchCommand {
    /// Sync every auto-sync profile once at startup
    #[arg(long)]
    pub initial: bool,

    /// Override the configured quiet period, in milliseconds
    #[arg(long, value_name = "MS")]
    pub quiet_period: Option<u64>,
}

impl WatchCommand {
    pub async fn execute(&self, config: &Config, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);

        let auto: Vec<String> = config
            .auto_sync_profiles()
            .map(|p| p.name().to_string())
            .collect();
        if auto.is_empty() {
            formatter.warn("No profiles have auto_sync enabled; nothing to watch");
            return Ok(());
        }

        let quiet_period =
            Duration::from_millis(self.quiet_period.unwrap_or(config.monitor.quiet_period_ms));
        let interval = match config.monitor.schedule_interval_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };

        let engine = Arc::new(SyncEngine::new(Arc::new(TracingLogSink::new())));
        let (mut scheduler, handle) =
            SyncScheduler::new(config.profiles.clone(), engine, quiet_period, interval);
        let mut reports = scheduler.reports();
        let scheduler_task = tokio::spawn(scheduler.run());

        formatter.success(&format!("Watching {}", plural(auto.len() as u64, "profile")));
        for name in &auto {
            formatter.info(name);
        }
        if self.initial {
            for name in &auto {
                handle.request_sync(name);
            }
        }

        let mut shutdown = tokio::spawn(shutdown_signal());

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    formatter.info("Shutting down, waiting for runs in flight");
                    handle.shutdown();
                    break;
                }
                report = reports.recv() => match report {
                    Some(report) => print_report(formatter.as_ref(), format, &report)?,
                    None => break,
                },
            }
        }
        shutdown.abort();

        let profiles = scheduler_task
            .await
            .context("Scheduler task failed")?;

        while let Ok(report) = reports.try_recv() {
            print_report(formatter.as_ref(), format, &report)?;
        }

        for profile in profiles.iter().filter(|p| p.auto_sync()) {
            info!(profile = %profile.name(), status = %profile.status(), "Final status");
        }
        formatter.success("Stopped watching");
        Ok(())
    }
}

fn print_report(
    formatter: &dyn OutputFormatter,
    format: OutputFormat,
    report: &RunReport,
) -> Result<()> {
    if format.is_json() {
        let json = serde_json::to_value(report).context("Failed to serialize run report")?;
        formatter.print_json(&json);
        return Ok(());
    }

    let result = &report.result;
    let line = format!(
        "[{}] {} ({}): {} copied, {} skipped in {}",
        chrono::Local::now().format("%H:%M:%S"),
        report.profile,
        report.trigger,
        result.files_processed,
        result.files_skipped,
        format_duration(result.duration_ms)
    );

    if !result.success {
        formatter.error(&format!(
            "{line} - {}",
            result.error.as_deref().unwrap_or("failed")
        ));
    } else if result.cancelled {
        formatter.warn(&format!("{line} - cancelled"));
    } else if result.files_failed > 0 {
        formatter.warn(&format!(
            "{line} - {} failed",
            plural(u64::from(result.files_failed), "file")
        ));
    } else {
        formatter.success(&line);
    }
    Ok(())
}

/// Waits for SIGTERM or SIGINT.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Cannot listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C)");
        }
        _ = terminate => {
            info!("Received SIGTERM");
        }
    }
}
