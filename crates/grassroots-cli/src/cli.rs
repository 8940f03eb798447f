use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "grassroots")]
#[command(about = "Record match events offline and deliver them when back online")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to the local outbox database
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,

    /// Optional path to the capture config file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Control the match clock
    Clock {
        #[command(subcommand)]
        command: ClockCommands,
    },
    /// Record a match event at the current match time
    Record {
        /// Event kind, e.g. goal, key_pass, "free kick"
        kind: String,
        /// Team id the event belongs to
        #[arg(long, value_name = "ID")]
        team: String,
        /// Player id (anonymous when omitted)
        #[arg(long, value_name = "ID")]
        player: Option<String>,
        /// Assisting player id
        #[arg(long, value_name = "ID")]
        assist: Option<String>,
        /// Rating from -4 (terrible) to 4 (outstanding)
        #[arg(long, allow_negative_numbers = true, value_name = "N")]
        sentiment: Option<i8>,
        /// Free-text notes
        #[arg(long)]
        notes: Option<String>,
        /// Append dictated notes, one transcript per stdin line
        #[arg(long)]
        dictate: bool,
    },
    /// Record a goal through the scorer/assist/own-goal flow
    Goal {
        /// Team id the goal counts for
        #[arg(long, value_name = "ID")]
        team: String,
        /// Scorer id. For own goals, the opposing player who scored it.
        #[arg(long, value_name = "ID")]
        scorer: Option<String>,
        /// Assisting player id
        #[arg(long, value_name = "ID", conflicts_with = "own_goal")]
        assist: Option<String>,
        /// The goal was put into their own net by the opposing team
        #[arg(long)]
        own_goal: bool,
        /// Free-text notes
        #[arg(long)]
        notes: Option<String>,
        /// Append dictated notes, one transcript per stdin line
        #[arg(long)]
        dictate: bool,
    },
    /// List captured events in capture order
    List {
        /// Show only the most recent N entries
        #[arg(short, long)]
        limit: Option<usize>,
        /// Only entries still awaiting delivery
        #[arg(long)]
        pending: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Run a single delivery pass now
    Sync,
    /// Keep delivering in the foreground until interrupted
    Watch {
        /// Treat the endpoint as reachable instead of probing it
        #[arg(long)]
        assume_online: bool,
    },
    /// Show clock, outbox and delivery status
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete delivered entries. Pending entries are never removed.
    Prune {
        /// Keep only the newest N delivered entries
        #[arg(long, value_name = "N", conflicts_with = "older_than_hours")]
        keep: Option<usize>,
        /// Delete delivered entries acknowledged more than H hours ago
        #[arg(long, value_name = "H")]
        older_than_hours: Option<u64>,
    },
    /// Show the fixture and rosters being recorded
    Fixture,
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum ClockCommands {
    /// Start or resume the clock
    Start,
    /// Pause the clock
    Pause,
    /// Stop the clock and return it to 00:00
    Reset,
    /// Print the elapsed match time
    Show {
        /// Keep refreshing until interrupted
        #[arg(short, long)]
        follow: bool,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}
