//! Clock state persisted between CLI invocations.
//!
//! Only the clock's state is stored; elapsed time is recomputed from the
//! wall clock every time the file is loaded.

use std::path::{Path, PathBuf};

use grassroots_core::clock::{ClockState, MatchClock, SystemClock};

use crate::error::CliError;

const CLOCK_FILE_NAME: &str = "clock.json";

/// The clock file lives next to the outbox so `--db-path` isolates both.
pub fn clock_path_for(db_path: &Path) -> PathBuf {
    db_path.with_file_name(CLOCK_FILE_NAME)
}

pub fn load_clock_state(path: &Path) -> Result<ClockState, CliError> {
    if !path.exists() {
        return Ok(ClockState::default());
    }

    let raw = std::fs::read_to_string(path)?;
    let state = serde_json::from_str::<ClockState>(&raw).map_err(|error| CliError::ClockState {
        path: path.display().to_string(),
        message: error.to_string(),
    })?;
    state.validate().map_err(|error| CliError::ClockState {
        path: path.display().to_string(),
        message: error.to_string(),
    })?;
    Ok(state)
}

/// Write via a temporary file and rename so a crash never leaves a torn file.
pub fn save_clock_state(path: &Path, state: ClockState) -> Result<(), CliError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let temp_path = path.with_extension("json.tmp");
    std::fs::write(&temp_path, serde_json::to_string_pretty(&state)?)?;
    std::fs::rename(&temp_path, path)?;
    Ok(())
}

pub fn load_clock(path: &Path) -> Result<MatchClock<SystemClock>, CliError> {
    let state = load_clock_state(path)?;
    Ok(MatchClock::from_state(state, SystemClock)?)
}

pub fn save_clock(path: &Path, clock: &MatchClock<SystemClock>) -> Result<(), CliError> {
    save_clock_state(path, clock.state())
}
