use std::env;
use std::path::{Path, PathBuf};

use chrono::Utc;
use grassroots_core::clock::format_elapsed;
use grassroots_core::config::{CaptureConfig, CONFIG_FILE_NAME};
use grassroots_core::delivery::HttpEventSink;
use grassroots_core::dictation::{DictationEvent, NotesDraft};
use grassroots_core::models::{EventRecord, Fixture, OutboxEntry};
use grassroots_core::services::Outbox;
use grassroots_core::util::normalize_text_option;
use serde::Serialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;

use crate::error::CliError;

const APP_DIR: &str = "grassroots";

#[derive(Debug, Serialize)]
pub struct EntryListItem {
    pub id: i64,
    pub state: String,
    pub clock: String,
    pub kind: String,
    pub team: String,
    pub player: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assist: Option<String>,
    /// Team the event counts for; differs from `team` for own goals
    pub credited_team: Option<String>,
    pub attempts: u32,
    pub last_error: Option<String>,
    pub created_at_iso: String,
    pub delivered_at_iso: Option<String>,
    pub payload: EventRecord,
}

pub fn resolve_db_path(cli_db_path: Option<PathBuf>) -> Result<PathBuf, CliError> {
    if let Some(path) = cli_db_path.or_else(|| env::var_os("GRASSROOTS_DB_PATH").map(PathBuf::from))
    {
        return Ok(path);
    }
    default_db_path()
}

pub fn default_db_path() -> Result<PathBuf, CliError> {
    dirs::data_dir()
        .map(|dir| dir.join(APP_DIR).join("grassroots.db"))
        .ok_or(CliError::NoPlatformDir("data"))
}

pub fn resolve_config_path(cli_config: Option<PathBuf>) -> Result<PathBuf, CliError> {
    if let Some(path) = cli_config.or_else(|| env::var_os("GRASSROOTS_CONFIG").map(PathBuf::from))
    {
        return Ok(path);
    }
    default_config_path()
}

pub fn default_config_path() -> Result<PathBuf, CliError> {
    dirs::config_dir()
        .map(|dir| dir.join(APP_DIR).join(CONFIG_FILE_NAME))
        .ok_or(CliError::NoPlatformDir("config"))
}

/// Load the config file and apply `GRASSROOTS_*` overrides.
pub fn load_config(path: &Path) -> Result<CaptureConfig, CliError> {
    let mut config = CaptureConfig::load_from_path(path)?;
    config.apply_env_overrides()?;
    Ok(config)
}

pub async fn open_outbox(db_path: &Path) -> Result<Outbox, CliError> {
    Ok(Outbox::open_path(db_path).await?)
}

pub fn http_sink(config: &CaptureConfig, config_path: &Path) -> Result<HttpEventSink, CliError> {
    let endpoint = config
        .endpoint()
        .ok_or_else(|| CliError::EndpointNotConfigured(config_path.display().to_string()))?;
    Ok(HttpEventSink::new(endpoint, config.request_timeout())?)
}

/// Turn each line from `reader` into a transcript of one dictation session.
pub fn spawn_line_dictation<R>(reader: R) -> mpsc::Receiver<DictationEvent>
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::channel(16);
    tokio::spawn(async move {
        if tx.send(DictationEvent::Started).await.is_err() {
            return;
        }
        let mut lines = reader.lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if tx.send(DictationEvent::Transcript(line)).await.is_err() {
                        return;
                    }
                }
                Ok(None) => break,
                Err(error) => {
                    tracing::warn!("Dictation input failed: {error}");
                    break;
                }
            }
        }
        let _ = tx.send(DictationEvent::Ended).await;
    });
    rx
}

/// Combine typed notes with dictated stdin lines when `dictate` is set.
pub async fn resolve_notes(notes: Option<String>, dictate: bool) -> Option<String> {
    if !dictate {
        return normalize_text_option(notes);
    }

    eprintln!("Dictate notes, one line per phrase. Finish with Ctrl-D.");
    let mut draft = NotesDraft::new(notes);
    let mut events = spawn_line_dictation(tokio::io::BufReader::new(tokio::io::stdin()));
    draft.collect(&mut events).await;
    draft.into_notes()
}

pub fn player_label(fixture: &Fixture, record: &EventRecord) -> String {
    fixture.team(record.team_id()).map_or_else(
        || record.player_id().to_string(),
        |team| team.player_name(record.player_id()),
    )
}

pub fn team_label(fixture: &Fixture, record: &EventRecord) -> String {
    fixture
        .team(record.team_id())
        .map_or_else(|| record.team_id().to_string(), |team| team.name.clone())
}

pub fn entry_to_list_item(entry: &OutboxEntry, fixture: &Fixture) -> EntryListItem {
    let record = &entry.payload;
    let assist = record.assist_player_id().map(|assist| {
        fixture
            .team(record.team_id())
            .map_or_else(|| assist.to_string(), |team| team.player_name(assist))
    });

    EntryListItem {
        id: entry.id.get(),
        state: entry.delivery_state.to_string(),
        clock: format_elapsed(record.clock_ms()),
        kind: record.kind().label().to_string(),
        team: team_label(fixture, record),
        player: player_label(fixture, record),
        assist,
        credited_team: fixture.credited_team(record).map(|team| team.name.clone()),
        attempts: entry.attempts,
        last_error: entry.last_error.clone(),
        created_at_iso: format_sync_timestamp(entry.created_at),
        delivered_at_iso: entry.delivered_at.map(format_sync_timestamp),
        payload: record.clone(),
    }
}

pub fn format_entry_lines(entries: &[OutboxEntry], fixture: &Fixture) -> Vec<String> {
    entries
        .iter()
        .map(|entry| {
            let record = &entry.payload;
            let mut line = format!(
                "{:>5}  {:<9}  {:>5}  {:<10}  {:<16}  {}",
                entry.id.get(),
                entry.delivery_state.as_str(),
                format_elapsed(record.clock_ms()),
                record.kind().label(),
                team_label(fixture, record),
                player_label(fixture, record),
            );
            if let Some(assist) = record.assist_player_id() {
                let name = fixture
                    .team(record.team_id())
                    .map_or_else(|| assist.to_string(), |team| team.player_name(assist));
                line.push_str(&format!(" (assist {name})"));
            }
            if let Some(sentiment) = record.sentiment() {
                line.push_str(&format!(" [{}]", sentiment.label()));
            }
            if let Some(notes) = record.notes() {
                line.push_str(&format!("  \"{}\"", preview(notes, 40)));
            }
            if entry.is_pending() && entry.attempts > 0 {
                line.push_str(&format!(
                    "  ({} failed attempts: {})",
                    entry.attempts,
                    entry.last_error.as_deref().unwrap_or("unknown error")
                ));
            }
            line
        })
        .collect()
}

pub fn preview(text: &str, max_chars: usize) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");

    if collapsed.chars().count() <= max_chars {
        collapsed
    } else {
        let take_len = max_chars.saturating_sub(3);
        let mut truncated = collapsed.chars().take(take_len).collect::<String>();
        truncated.push_str("...");
        truncated
    }
}

pub fn format_sync_timestamp(timestamp_ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(timestamp_ms).map_or_else(
        || timestamp_ms.to_string(),
        |date_time| date_time.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )
}

pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let diff = now_ms.saturating_sub(timestamp_ms);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else {
        format!("{}d ago", diff / day)
    }
}

pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}
