use std::path::Path;

use grassroots_core::clock::format_elapsed;
use grassroots_core::config::CaptureConfig;
use grassroots_core::models::OutboxEntry;
use grassroots_core::state::SyncState;
use serde::Serialize;

use crate::clock_file::{clock_path_for, load_clock};
use crate::commands::common::{format_relative_time, format_sync_timestamp, now_ms, open_outbox};
use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub clock: String,
    pub clock_running: bool,
    pub total: usize,
    pub pending: usize,
    pub delivered: usize,
    pub sync_state: &'static str,
    pub endpoint: Option<String>,
    /// Oldest pending entry, which blocks everything behind it
    pub head_entry: Option<i64>,
    pub head_attempts: u32,
    pub head_error: Option<String>,
    pub last_delivered_at: Option<i64>,
}

impl StatusReport {
    pub fn from_entries(
        elapsed_ms: u64,
        clock_running: bool,
        entries: &[OutboxEntry],
        endpoint: Option<&str>,
    ) -> Self {
        let pending = entries.iter().filter(|entry| entry.is_pending()).count();
        let head = entries.iter().find(|entry| entry.is_pending());
        // Without a configured endpoint nothing can ever be delivered.
        let online = endpoint.is_some();

        Self {
            clock: format_elapsed(elapsed_ms),
            clock_running,
            total: entries.len(),
            pending,
            delivered: entries.len() - pending,
            sync_state: SyncState::from_outbox(pending, online, false).label(),
            endpoint: endpoint.map(str::to_string),
            head_entry: head.map(|entry| entry.id.get()),
            head_attempts: head.map_or(0, |entry| entry.attempts),
            head_error: head.and_then(|entry| entry.last_error.clone()),
            last_delivered_at: entries.iter().filter_map(|entry| entry.delivered_at).max(),
        }
    }

    pub fn lines(&self, now_ms: i64) -> Vec<String> {
        let mut lines = vec![
            format!(
                "Clock:     {} ({})",
                self.clock,
                if self.clock_running { "running" } else { "paused" }
            ),
            format!(
                "Outbox:    {} events, {} pending, {} delivered",
                self.total, self.pending, self.delivered
            ),
            format!("Sync:      {}", self.sync_state),
            format!(
                "Endpoint:  {}",
                self.endpoint.as_deref().unwrap_or("(not configured)")
            ),
        ];
        if let Some(delivered_at) = self.last_delivered_at {
            lines.push(format!(
                "Last sync: {} ({})",
                format_relative_time(delivered_at, now_ms),
                format_sync_timestamp(delivered_at)
            ));
        }
        if let (Some(head), Some(error)) = (self.head_entry, self.head_error.as_deref()) {
            lines.push(format!(
                "Blocked:   entry {head} after {} attempts: {error}",
                self.head_attempts
            ));
        }
        lines
    }
}

pub async fn run_status(
    as_json: bool,
    config: &CaptureConfig,
    db_path: &Path,
) -> Result<(), CliError> {
    let clock = load_clock(&clock_path_for(db_path))?;
    let outbox = open_outbox(db_path).await?;
    let entries = outbox.list_all().await?;
    let report = StatusReport::from_entries(
        clock.elapsed_ms(),
        clock.is_running(),
        &entries,
        config.endpoint(),
    );

    if as_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    for line in report.lines(now_ms()) {
        println!("{line}");
    }
    Ok(())
}
