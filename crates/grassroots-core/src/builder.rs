//! Event record builder
//!
//! Turns an operator's intent into an immutable [`EventRecord`], stamping it
//! with the match clock's elapsed time. This is the only place event time is
//! read.

use crate::clock::{MatchClock, WallClock};
use crate::error::{Error, Result};
use crate::models::{EventKind, EventRecord, Fixture, PlayerId, Sentiment, TeamId};
use crate::util::normalize_text_option;

/// What the operator confirmed, before validation and time stamping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventIntent {
    pub kind: EventKind,
    pub team_id: TeamId,
    /// `None` records the anonymous player
    pub player_id: Option<PlayerId>,
    pub assist_player_id: Option<PlayerId>,
    pub sentiment: Option<i8>,
    pub notes: Option<String>,
}

impl EventIntent {
    pub const fn new(kind: EventKind, team_id: TeamId) -> Self {
        Self {
            kind,
            team_id,
            player_id: None,
            assist_player_id: None,
            sentiment: None,
            notes: None,
        }
    }

    #[must_use]
    pub fn with_player(mut self, player_id: PlayerId) -> Self {
        self.player_id = Some(player_id);
        self
    }

    #[must_use]
    pub fn with_assist(mut self, assist_player_id: PlayerId) -> Self {
        self.assist_player_id = Some(assist_player_id);
        self
    }

    #[must_use]
    pub const fn with_sentiment(mut self, sentiment: i8) -> Self {
        self.sentiment = Some(sentiment);
        self
    }

    #[must_use]
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

/// Builds records for one fixture.
#[derive(Debug, Clone, Copy)]
pub struct EventRecordBuilder<'a> {
    fixture: &'a Fixture,
}

impl<'a> EventRecordBuilder<'a> {
    pub const fn new(fixture: &'a Fixture) -> Self {
        Self { fixture }
    }

    /// Validate `intent` against the fixture and stamp it with the clock.
    ///
    /// Fails with [`Error::Validation`] before anything is persisted.
    pub fn build<W: WallClock>(
        &self,
        intent: EventIntent,
        clock: &MatchClock<W>,
    ) -> Result<EventRecord> {
        let team = self.fixture.team(&intent.team_id).ok_or_else(|| {
            Error::validation(format!(
                "team '{}' is not playing in match {}",
                intent.team_id, self.fixture.match_id
            ))
        })?;

        let player_id = intent.player_id.unwrap_or_else(PlayerId::anonymous);
        if !team.has_player(&player_id) {
            return Err(Error::validation(format!(
                "player '{player_id}' is not on the {} roster",
                team.name
            )));
        }

        if let Some(assist) = intent.assist_player_id.as_ref() {
            if intent.kind == EventKind::OwnGoal {
                return Err(Error::validation("own goals carry no assist"));
            }
            if !team.has_player(assist) {
                return Err(Error::validation(format!(
                    "assist '{assist}' is not on the {} roster",
                    team.name
                )));
            }
            if assist == &player_id && !assist.is_anonymous() {
                return Err(Error::validation(format!(
                    "player '{assist}' cannot assist their own goal"
                )));
            }
        }

        let sentiment = intent.sentiment.map(Sentiment::new).transpose()?;

        Ok(EventRecord::new(
            intent.kind,
            self.fixture.match_id.clone(),
            self.fixture.season_id.clone(),
            self.fixture.period_number,
            clock.elapsed_ms(),
            intent.team_id,
            player_id,
            intent.assist_player_id,
            sentiment,
            normalize_text_option(intent.notes),
            clock.wall_clock().now_ms(),
        ))
    }
}
