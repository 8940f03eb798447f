use std::path::Path;

use grassroots_core::clock::format_elapsed;
use grassroots_core::models::{Fixture, PlayerId, TeamId};
use grassroots_core::{EventIntent, EventKind, EventRecordBuilder, OutboxEntry};

use crate::clock_file::{clock_path_for, load_clock};
use crate::commands::common::{open_outbox, player_label, resolve_notes, team_label};
use crate::error::CliError;

pub struct RecordArgs {
    pub kind: String,
    pub team: String,
    pub player: Option<String>,
    pub assist: Option<String>,
    pub sentiment: Option<i8>,
    pub notes: Option<String>,
    pub dictate: bool,
}

pub async fn run_record(args: RecordArgs, fixture: &Fixture, db_path: &Path) -> Result<(), CliError> {
    let kind = args.kind.parse::<EventKind>()?;
    let notes = resolve_notes(args.notes, args.dictate).await;

    let mut intent = EventIntent::new(kind, TeamId::new(args.team));
    intent.player_id = args.player.map(PlayerId::new);
    intent.assist_player_id = args.assist.map(PlayerId::new);
    intent.sentiment = args.sentiment;
    intent.notes = notes;

    let entry = capture(intent, fixture, db_path).await?;
    println!("{}", format_capture_confirmation(&entry, fixture));
    Ok(())
}

/// Stamp `intent` with the persisted match clock and append it to the outbox.
pub async fn capture(
    intent: EventIntent,
    fixture: &Fixture,
    db_path: &Path,
) -> Result<OutboxEntry, CliError> {
    let clock = load_clock(&clock_path_for(db_path))?;
    if !clock.is_running() {
        eprintln!(
            "Clock is paused; stamping event at {}",
            format_elapsed(clock.elapsed_ms())
        );
    }

    let record = EventRecordBuilder::new(fixture).build(intent, &clock)?;
    let outbox = open_outbox(db_path).await?;
    Ok(outbox.enqueue(record).await?)
}

pub fn format_capture_confirmation(entry: &OutboxEntry, fixture: &Fixture) -> String {
    let record = &entry.payload;
    format!(
        "Recorded {} for {} ({}) at {} (entry {})",
        record.kind().label(),
        team_label(fixture, record),
        player_label(fixture, record),
        format_elapsed(record.clock_ms()),
        entry.id
    )
}
