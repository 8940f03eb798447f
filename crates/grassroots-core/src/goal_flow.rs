//! Multi-step goal entry.
//!
//! The operator picks the team the goal counts for, then either a scorer and
//! assist or "own goal" and the opposing player who put it in their own net.
//! Each transition consumes the flow and returns the next state, so the
//! own-goal choice travels with the selection instead of living in shared
//! state.

use std::fmt;

use crate::builder::EventIntent;
use crate::error::{Error, Result};
use crate::models::{EventKind, Fixture, PlayerId, Team, TeamId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GoalStep {
    Team,
    /// Normal goal or own goal, for a team without a named roster
    GoalType,
    Scorer,
    Assist,
    /// Opposing player credited with the own goal
    OpponentScorer,
    Notes,
}

impl fmt::Display for GoalStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Team => "team",
            Self::GoalType => "goal type",
            Self::Scorer => "scorer",
            Self::Assist => "assist",
            Self::OpponentScorer => "opponent scorer",
            Self::Notes => "notes",
        };
        f.write_str(name)
    }
}

/// Choices made so far.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GoalSelection {
    /// Team the goal counts for
    pub team_id: Option<TeamId>,
    pub own_goal: bool,
    pub scorer: Option<PlayerId>,
    pub assist: Option<PlayerId>,
}

#[derive(Debug, Clone)]
pub struct GoalFlow<'f> {
    fixture: &'f Fixture,
    step: GoalStep,
    selection: GoalSelection,
    history: Vec<GoalStep>,
}

impl<'f> GoalFlow<'f> {
    pub const fn new(fixture: &'f Fixture) -> Self {
        Self {
            fixture,
            step: GoalStep::Team,
            selection: GoalSelection {
                team_id: None,
                own_goal: false,
                scorer: None,
                assist: None,
            },
            history: Vec::new(),
        }
    }

    pub const fn step(&self) -> GoalStep {
        self.step
    }

    pub const fn selection(&self) -> &GoalSelection {
        &self.selection
    }

    /// The team the goal counts for, once chosen.
    pub fn scoring_team(&self) -> Option<&'f Team> {
        let fixture = self.fixture;
        self.selection
            .team_id
            .as_ref()
            .and_then(|id| fixture.team(id))
    }

    /// The team that conceded, once the scoring team is chosen.
    pub fn conceding_team(&self) -> Option<&'f Team> {
        let fixture = self.fixture;
        self.selection
            .team_id
            .as_ref()
            .and_then(|id| fixture.opponent_of(id))
    }

    pub fn choose_team(mut self, team_id: TeamId) -> Result<Self> {
        self.expect_step(GoalStep::Team, "choose a team")?;
        let team = self.fixture.team(&team_id).ok_or_else(|| {
            Error::validation(format!(
                "team '{team_id}' is not playing in match {}",
                self.fixture.match_id
            ))
        })?;
        let next = if team.has_named_players() {
            GoalStep::Scorer
        } else {
            GoalStep::GoalType
        };
        self.selection.team_id = Some(team_id);
        Ok(self.advance(next))
    }

    /// Answer the goal-type question asked for teams without a roster.
    pub fn choose_goal_type(mut self, own_goal: bool) -> Result<Self> {
        self.expect_step(GoalStep::GoalType, "choose the goal type")?;
        if own_goal {
            self.selection.own_goal = true;
            Ok(self.advance(GoalStep::OpponentScorer))
        } else {
            self.selection.scorer = Some(PlayerId::anonymous());
            Ok(self.advance(GoalStep::Notes))
        }
    }

    pub fn choose_scorer(mut self, scorer: PlayerId) -> Result<Self> {
        self.expect_step(GoalStep::Scorer, "choose a scorer")?;
        let team = self.scoring_team_or_err()?;
        if !team.has_player(&scorer) {
            return Err(Error::validation(format!(
                "player '{scorer}' is not on the {} roster",
                team.name
            )));
        }
        self.selection.scorer = Some(scorer);
        Ok(self.advance(GoalStep::Assist))
    }

    /// Pick "own goal" from the scorer list.
    pub fn choose_own_goal(mut self) -> Result<Self> {
        self.expect_step(GoalStep::Scorer, "mark an own goal")?;
        self.selection.own_goal = true;
        Ok(self.advance(GoalStep::OpponentScorer))
    }

    /// Opposing player who put the ball in their own net. `None` records
    /// the anonymous player.
    pub fn choose_opponent_scorer(mut self, player: Option<PlayerId>) -> Result<Self> {
        self.expect_step(GoalStep::OpponentScorer, "choose the own-goal scorer")?;
        let conceding = self.conceding_team().ok_or_else(|| {
            Error::validation("the scoring team must be chosen before the own-goal scorer")
        })?;
        let player = player.unwrap_or_else(PlayerId::anonymous);
        if !conceding.has_player(&player) {
            return Err(Error::validation(format!(
                "player '{player}' is not on the {} roster",
                conceding.name
            )));
        }
        self.selection.scorer = Some(player);
        Ok(self.advance(GoalStep::Notes))
    }

    /// `None` means no assister.
    pub fn choose_assist(mut self, assist: Option<PlayerId>) -> Result<Self> {
        self.expect_step(GoalStep::Assist, "choose an assist")?;
        if let Some(assist) = assist.as_ref() {
            let team = self.scoring_team_or_err()?;
            if !team.has_player(assist) {
                return Err(Error::validation(format!(
                    "assist '{assist}' is not on the {} roster",
                    team.name
                )));
            }
            if self.selection.scorer.as_ref() == Some(assist) && !assist.is_anonymous() {
                return Err(Error::validation(format!(
                    "player '{assist}' cannot assist their own goal"
                )));
            }
        }
        self.selection.assist = assist;
        Ok(self.advance(GoalStep::Notes))
    }

    /// Return to the previous step, discarding the choice made there.
    #[must_use]
    pub fn back(mut self) -> Self {
        let Some(previous) = self.history.pop() else {
            return self;
        };
        match previous {
            GoalStep::Team => self.selection = GoalSelection::default(),
            GoalStep::GoalType | GoalStep::Scorer => {
                self.selection.own_goal = false;
                self.selection.scorer = None;
            }
            GoalStep::Assist => self.selection.assist = None,
            GoalStep::OpponentScorer => self.selection.scorer = None,
            GoalStep::Notes => {}
        }
        self.step = previous;
        self
    }

    /// Produce the event intent for the completed flow.
    ///
    /// Own goals are recorded against the conceding team with the opposing
    /// scorer and no assist; [`Fixture::credited_team`] maps them back.
    pub fn finish(self, notes: Option<String>) -> Result<EventIntent> {
        self.expect_step(GoalStep::Notes, "save the goal")?;
        let scoring = self.scoring_team_or_err()?;

        let intent = if self.selection.own_goal {
            let conceding = self.conceding_team().ok_or_else(|| {
                Error::validation(format!("team '{}' has no opponent", scoring.id))
            })?;
            EventIntent {
                kind: EventKind::OwnGoal,
                team_id: conceding.id.clone(),
                player_id: self.selection.scorer,
                assist_player_id: None,
                sentiment: None,
                notes,
            }
        } else {
            EventIntent {
                kind: EventKind::Goal,
                team_id: scoring.id.clone(),
                player_id: self.selection.scorer,
                assist_player_id: self.selection.assist,
                sentiment: None,
                notes,
            }
        };
        Ok(intent)
    }

    fn advance(mut self, next: GoalStep) -> Self {
        self.history.push(self.step);
        self.step = next;
        self
    }

    fn expect_step(&self, expected: GoalStep, action: &str) -> Result<()> {
        if self.step == expected {
            Ok(())
        } else {
            Err(Error::validation(format!(
                "cannot {action} at the {} step",
                self.step
            )))
        }
    }

    fn scoring_team_or_err(&self) -> Result<&'f Team> {
        self.scoring_team()
            .ok_or_else(|| Error::validation("no scoring team chosen"))
    }
}
