use std::path::Path;

use grassroots_core::models::RetentionPolicy;

use crate::commands::common::open_outbox;
use crate::error::CliError;

pub async fn run_prune(policy: RetentionPolicy, db_path: &Path) -> Result<(), CliError> {
    if policy.keeps_everything() {
        println!("Retention keeps every delivered entry; nothing pruned.");
        println!("Pass --keep or --older-than-hours, or set \"retention\" in the config.");
        return Ok(());
    }

    let outbox = open_outbox(db_path).await?;
    let removed = outbox.prune_delivered(policy).await?;
    println!("Pruned {removed} delivered entries");
    Ok(())
}

/// Flags win over the configured policy.
pub const fn resolve_policy(
    keep: Option<usize>,
    older_than_hours: Option<u64>,
    configured: RetentionPolicy,
) -> RetentionPolicy {
    match (keep, older_than_hours) {
        (Some(count), _) => RetentionPolicy::KeepLatest { count },
        (None, Some(hours)) => RetentionPolicy::OlderThan {
            max_age_secs: hours.saturating_mul(3600),
        },
        (None, None) => configured,
    }
}
