//! Match event records

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::team::{PlayerId, TeamId};
use crate::error::Error;

/// Recognized match event types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Goal,
    Assist,
    KeyPass,
    Save,
    BallWon,
    Corner,
    FreeKick,
    Penalty,
    Foul,
    BallLost,
    /// Scored into the player's own team's net
    OwnGoal,
    BallOut,
}

/// Console grouping of event kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventCategory {
    Positive,
    Neutral,
    Negative,
}

impl EventKind {
    /// All kinds in console order.
    pub const ALL: [Self; 12] = [
        Self::Goal,
        Self::Assist,
        Self::KeyPass,
        Self::Save,
        Self::BallWon,
        Self::Corner,
        Self::FreeKick,
        Self::Penalty,
        Self::Foul,
        Self::BallLost,
        Self::OwnGoal,
        Self::BallOut,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Goal => "goal",
            Self::Assist => "assist",
            Self::KeyPass => "key_pass",
            Self::Save => "save",
            Self::BallWon => "ball_won",
            Self::Corner => "corner",
            Self::FreeKick => "free_kick",
            Self::Penalty => "penalty",
            Self::Foul => "foul",
            Self::BallLost => "ball_lost",
            Self::OwnGoal => "own_goal",
            Self::BallOut => "ball_out",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Goal => "Goal",
            Self::Assist => "Assist",
            Self::KeyPass => "Key Pass",
            Self::Save => "Save",
            Self::BallWon => "Ball Won",
            Self::Corner => "Corner",
            Self::FreeKick => "Free Kick",
            Self::Penalty => "Penalty",
            Self::Foul => "Foul",
            Self::BallLost => "Ball Lost",
            Self::OwnGoal => "Own Goal",
            Self::BallOut => "Ball Out",
        }
    }

    pub const fn category(self) -> EventCategory {
        match self {
            Self::Goal | Self::Assist | Self::KeyPass | Self::Save | Self::BallWon => {
                EventCategory::Positive
            }
            Self::Corner | Self::FreeKick | Self::Penalty => EventCategory::Neutral,
            Self::Foul | Self::BallLost | Self::OwnGoal | Self::BallOut => EventCategory::Negative,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| Error::validation(format!("unknown event kind '{}'", s.trim())))
    }
}

/// Operator's rating of an action, from -4 (terrible) to 4 (outstanding).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i8", into = "i8")]
pub struct Sentiment(i8);

impl Sentiment {
    pub const MIN: i8 = -4;
    pub const MAX: i8 = 4;

    pub fn new(value: i8) -> Result<Self, Error> {
        if (Self::MIN..=Self::MAX).contains(&value) {
            Ok(Self(value))
        } else {
            Err(Error::validation(format!(
                "sentiment {value} outside {}..={}",
                Self::MIN,
                Self::MAX
            )))
        }
    }

    pub const fn value(self) -> i8 {
        self.0
    }

    pub const fn label(self) -> &'static str {
        match self.0 {
            4 => "Outstanding",
            3 => "Excellent",
            2 => "Good",
            1 => "Solid",
            0 => "Neutral",
            -1 => "Below par",
            -2 => "Poor",
            -3 => "Bad",
            _ => "Terrible",
        }
    }
}

impl TryFrom<i8> for Sentiment {
    type Error = Error;

    fn try_from(value: i8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Sentiment> for i8 {
    fn from(value: Sentiment) -> Self {
        value.0
    }
}

/// Identity the ingestion endpoint deduplicates re-submissions on.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NaturalKey {
    pub match_id: String,
    pub team_id: TeamId,
    pub player_id: PlayerId,
    pub kind: EventKind,
    pub clock_ms: u64,
}

/// Fields are joined with `:`; `%` and `:` inside ids are percent-encoded so
/// distinct keys never render to the same string.
impl fmt::Display for NaturalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}:{}",
            escape_key_part(&self.match_id),
            escape_key_part(self.team_id.as_str()),
            escape_key_part(self.player_id.as_str()),
            self.kind,
            self.clock_ms
        )
    }
}

fn escape_key_part(part: &str) -> String {
    part.replace('%', "%25").replace(':', "%3A")
}

/// A captured match event.
///
/// Records are immutable: fields are read through accessors and a record can
/// only be produced by [`crate::builder::EventRecordBuilder`] or by loading a
/// persisted payload. Corrections are new records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    kind: EventKind,
    match_id: String,
    season_id: String,
    period_number: u32,
    clock_ms: u64,
    team_id: TeamId,
    player_id: PlayerId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    assist_player_id: Option<PlayerId>,
    #[serde(default)]
    sentiment: Option<Sentiment>,
    #[serde(default)]
    notes: Option<String>,
    created_at: i64,
}

impl EventRecord {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        kind: EventKind,
        match_id: String,
        season_id: String,
        period_number: u32,
        clock_ms: u64,
        team_id: TeamId,
        player_id: PlayerId,
        assist_player_id: Option<PlayerId>,
        sentiment: Option<Sentiment>,
        notes: Option<String>,
        created_at: i64,
    ) -> Self {
        Self {
            kind,
            match_id,
            season_id,
            period_number,
            clock_ms,
            team_id,
            player_id,
            assist_player_id,
            sentiment,
            notes,
            created_at,
        }
    }

    pub const fn kind(&self) -> EventKind {
        self.kind
    }

    pub fn match_id(&self) -> &str {
        &self.match_id
    }

    pub fn season_id(&self) -> &str {
        &self.season_id
    }

    pub const fn period_number(&self) -> u32 {
        self.period_number
    }

    /// Elapsed match time when the event was confirmed
    pub const fn clock_ms(&self) -> u64 {
        self.clock_ms
    }

    pub const fn team_id(&self) -> &TeamId {
        &self.team_id
    }

    pub const fn player_id(&self) -> &PlayerId {
        &self.player_id
    }

    pub const fn assist_player_id(&self) -> Option<&PlayerId> {
        self.assist_player_id.as_ref()
    }

    pub const fn sentiment(&self) -> Option<Sentiment> {
        self.sentiment
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    /// Wall-clock creation time (Unix ms)
    pub const fn created_at(&self) -> i64 {
        self.created_at
    }

    pub fn natural_key(&self) -> NaturalKey {
        NaturalKey {
            match_id: self.match_id.clone(),
            team_id: self.team_id.clone(),
            player_id: self.player_id.clone(),
            kind: self.kind,
            clock_ms: self.clock_ms,
        }
    }

    pub fn idempotency_key(&self) -> String {
        self.natural_key().to_string()
    }
}
