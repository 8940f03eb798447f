//! Teams, rosters and the fixture being recorded

use std::fmt;

use serde::{Deserialize, Serialize};

use super::event::{EventKind, EventRecord};
use crate::error::{Error, Result};

/// Team identifier as issued by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TeamId(String);

impl TeamId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TeamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Player identifier. [`PlayerId::ANONYMOUS`] stands in for an unknown player.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(String);

impl PlayerId {
    pub const ANONYMOUS: &'static str = "anon";

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn anonymous() -> Self {
        Self(Self::ANONYMOUS.to_string())
    }

    pub fn is_anonymous(&self) -> bool {
        self.0 == Self::ANONYMOUS
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub full_name: String,
}

impl Player {
    pub fn new(id: impl Into<String>, full_name: impl Into<String>) -> Self {
        Self {
            id: PlayerId::new(id),
            full_name: full_name.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub id: TeamId,
    pub name: String,
    /// Named players; the anonymous sentinel is always implied
    #[serde(default)]
    pub players: Vec<Player>,
}

impl Team {
    pub fn new(id: impl Into<String>, name: impl Into<String>, players: Vec<Player>) -> Self {
        Self {
            id: TeamId::new(id),
            name: name.into(),
            players,
        }
    }

    /// Whether `player` may be credited to this team.
    pub fn has_player(&self, player: &PlayerId) -> bool {
        player.is_anonymous() || self.players.iter().any(|p| &p.id == player)
    }

    pub fn player(&self, player: &PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| &p.id == player)
    }

    pub fn has_named_players(&self) -> bool {
        !self.players.is_empty()
    }

    /// Display name for a player on this team, falling back to the raw id.
    pub fn player_name(&self, player: &PlayerId) -> String {
        if player.is_anonymous() {
            return "Anonymous".to_string();
        }
        self.player(player)
            .map_or_else(|| player.to_string(), |p| p.full_name.clone())
    }
}

/// The match being recorded: identifiers plus both rosters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fixture {
    pub match_id: String,
    pub season_id: String,
    #[serde(default = "default_period")]
    pub period_number: u32,
    pub home: Team,
    pub away: Team,
}

const fn default_period() -> u32 {
    1
}

impl Fixture {
    pub const fn teams(&self) -> [&Team; 2] {
        [&self.home, &self.away]
    }

    pub fn team(&self, id: &TeamId) -> Option<&Team> {
        self.teams().into_iter().find(|team| &team.id == id)
    }

    pub fn opponent_of(&self, id: &TeamId) -> Option<&Team> {
        if &self.home.id == id {
            Some(&self.away)
        } else if &self.away.id == id {
            Some(&self.home)
        } else {
            None
        }
    }

    /// The team a scoring event counts for.
    ///
    /// Own goals are recorded against the player's own team, so the credit
    /// goes to the opponent. Every other kind credits the recorded team.
    pub fn credited_team(&self, record: &EventRecord) -> Option<&Team> {
        if record.kind() == EventKind::OwnGoal {
            self.opponent_of(record.team_id())
        } else {
            self.team(record.team_id())
        }
    }

    #[must_use]
    pub const fn with_period(mut self, period_number: u32) -> Self {
        self.period_number = period_number;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.match_id.trim().is_empty() {
            return Err(Error::Config("fixture match_id must not be empty".into()));
        }
        if self.season_id.trim().is_empty() {
            return Err(Error::Config("fixture season_id must not be empty".into()));
        }
        if self.period_number == 0 {
            return Err(Error::Config("fixture period_number starts at 1".into()));
        }
        if self.home.id == self.away.id {
            return Err(Error::Config(format!(
                "home and away teams share id '{}'",
                self.home.id
            )));
        }
        for team in self.teams() {
            if team.id.as_str().trim().is_empty() {
                return Err(Error::Config(format!("team '{}' has an empty id", team.name)));
            }
            if team.players.iter().any(|p| p.id.is_anonymous()) {
                return Err(Error::Config(format!(
                    "team '{}' lists the reserved player id '{}'",
                    team.name,
                    PlayerId::ANONYMOUS
                )));
            }
        }
        Ok(())
    }
}

impl Default for Fixture {
    fn default() -> Self {
        Self {
            match_id: "1".to_string(),
            season_id: "2025".to_string(),
            period_number: 1,
            home: Team::new(
                "1",
                "Old Wilsonians",
                vec![Player::new("1", "Zane"), Player::new("2", "Marco")],
            ),
            away: Team::new("2", "Unity", Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anonymous_player_is_on_every_roster() {
        let fixture = Fixture::default();
        assert!(fixture.home.has_player(&PlayerId::anonymous()));
        assert!(fixture.away.has_player(&PlayerId::anonymous()));
        assert!(fixture.home.has_player(&PlayerId::new("2")));
        assert!(!fixture.away.has_player(&PlayerId::new("2")));
    }

    #[test]
    fn opponent_lookup() {
        let fixture = Fixture::default();
        assert_eq!(fixture.opponent_of(&TeamId::new("1")).unwrap().name, "Unity");
        assert_eq!(
            fixture.opponent_of(&TeamId::new("2")).unwrap().name,
            "Old Wilsonians"
        );
        assert!(fixture.opponent_of(&TeamId::new("9")).is_none());
    }

    #[test]
    fn player_name_falls_back() {
        let team = Fixture::default().home;
        assert_eq!(team.player_name(&PlayerId::new("1")), "Zane");
        assert_eq!(team.player_name(&PlayerId::anonymous()), "Anonymous");
        assert_eq!(team.player_name(&PlayerId::new("77")), "77");
    }

    #[test]
    fn validate_rejects_duplicate_team_ids() {
        let mut fixture = Fixture::default();
        fixture.away.id = fixture.home.id.clone();
        assert!(fixture.validate().is_err());
    }

    #[test]
    fn validate_rejects_reserved_player_id() {
        let mut fixture = Fixture::default();
        fixture.away.players.push(Player::new("anon", "Somebody"));
        assert!(fixture.validate().is_err());
        assert!(Fixture::default().validate().is_ok());
    }
}
