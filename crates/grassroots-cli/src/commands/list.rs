use std::path::Path;

use grassroots_core::models::{Fixture, OutboxEntry};

use crate::commands::common::{entry_to_list_item, format_entry_lines, open_outbox, EntryListItem};
use crate::error::CliError;

pub async fn run_list(
    limit: Option<usize>,
    pending_only: bool,
    as_json: bool,
    fixture: &Fixture,
    db_path: &Path,
) -> Result<(), CliError> {
    let outbox = open_outbox(db_path).await?;
    let entries = select_entries(outbox.list_all().await?, pending_only, limit);

    if as_json {
        let json_items = entries
            .iter()
            .map(|entry| entry_to_list_item(entry, fixture))
            .collect::<Vec<EntryListItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
        return Ok(());
    }

    if entries.is_empty() {
        println!("No events captured yet.");
        return Ok(());
    }

    for line in format_entry_lines(&entries, fixture) {
        println!("{line}");
    }
    Ok(())
}

/// Filter and keep the newest `limit` entries, still in capture order.
pub fn select_entries(
    entries: Vec<OutboxEntry>,
    pending_only: bool,
    limit: Option<usize>,
) -> Vec<OutboxEntry> {
    let mut entries = entries
        .into_iter()
        .filter(|entry| !pending_only || entry.is_pending())
        .collect::<Vec<_>>();
    if let Some(limit) = limit {
        let skip = entries.len().saturating_sub(limit);
        entries.drain(..skip);
    }
    entries
}
