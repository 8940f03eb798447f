use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use grassroots_core::clock::{format_elapsed, spawn_ticker};
use tokio::sync::Mutex;

use crate::clock_file::{clock_path_for, load_clock, save_clock};
use crate::error::CliError;

const FOLLOW_REFRESH: Duration = Duration::from_millis(250);

pub fn run_clock_start(db_path: &Path) -> Result<(), CliError> {
    let path = clock_path_for(db_path);
    let mut clock = load_clock(&path)?;
    clock.start();
    save_clock(&path, &clock)?;
    println!("Clock running at {}", format_elapsed(clock.elapsed_ms()));
    Ok(())
}

pub fn run_clock_pause(db_path: &Path) -> Result<(), CliError> {
    let path = clock_path_for(db_path);
    let mut clock = load_clock(&path)?;
    clock.pause();
    save_clock(&path, &clock)?;
    println!("Clock paused at {}", format_elapsed(clock.elapsed_ms()));
    Ok(())
}

pub fn run_clock_reset(db_path: &Path) -> Result<(), CliError> {
    let path = clock_path_for(db_path);
    let mut clock = load_clock(&path)?;
    clock.reset();
    save_clock(&path, &clock)?;
    println!("Clock reset to {}", format_elapsed(0));
    Ok(())
}

pub async fn run_clock_show(follow: bool, db_path: &Path) -> Result<(), CliError> {
    let clock = load_clock(&clock_path_for(db_path))?;
    if !follow {
        println!("{}", clock_line(clock.elapsed_ms(), clock.is_running()));
        return Ok(());
    }

    let (mut display, ticker) = spawn_ticker(Arc::new(Mutex::new(clock)), FOLLOW_REFRESH);
    let mut stdout = io::stdout();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = display.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = display.borrow_and_update().clone();
                write!(stdout, "\r{}", clock_line(snapshot.elapsed_ms, snapshot.running))?;
                stdout.flush()?;
            }
        }
    }
    writeln!(stdout)?;
    ticker.abort();
    Ok(())
}

pub fn clock_line(elapsed_ms: u64, running: bool) -> String {
    let state = if running { "running" } else { "paused" };
    format!("{} ({state})", format_elapsed(elapsed_ms))
}
