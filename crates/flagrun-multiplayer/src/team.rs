//! Teams, rosters and score changes.

use bytes::{BufMut, BytesMut};
use flagrun_net::{DecodeError, WireRead, WireWrite};
use glam::Vec2;

use crate::ids::{EntityId, TeamId};

/// One team.
#[derive(Debug, Clone, PartialEq)]
pub struct Team {
    /// Id, also the index in join order.
    pub id: TeamId,
    /// Display name.
    pub name: String,
    /// Flags captured.
    pub score: i32,
    /// The team's capture region entity.
    pub capture_region: Option<EntityId>,
    /// Where members respawn. Server only.
    pub spawn: Vec2,
    /// Member player entities. Server only.
    pub roster: Vec<EntityId>,
}

/// What travels in a create-team message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeamRecord {
    /// Team id.
    pub id: TeamId,
    /// Display name.
    pub name: String,
    /// Current score.
    pub score: i32,
    /// Capture region entity.
    pub capture_region: Option<EntityId>,
}

impl TeamRecord {
    /// Append id, name, score and capture region.
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_i32(self.id.0);
        buf.put_string(&self.name);
        buf.put_i32(self.score);
        buf.put_i32(EntityId::to_wire(self.capture_region));
    }

    /// Read one record.
    pub fn decode(buf: &mut &[u8]) -> Result<Self, DecodeError> {
        Ok(Self {
            id: TeamId(buf.read_int()?),
            name: buf.read_string()?,
            score: buf.read_int()?,
            capture_region: EntityId::from_wire(buf.read_int()?),
        })
    }
}

impl Team {
    /// Wire view of this team.
    pub fn record(&self) -> TeamRecord {
        TeamRecord {
            id: self.id,
            name: self.name.clone(),
            score: self.score,
            capture_region: self.capture_region,
        }
    }
}

impl From<TeamRecord> for Team {
    fn from(record: TeamRecord) -> Self {
        Self {
            id: record.id,
            name: record.name,
            score: record.score,
            capture_region: record.capture_region,
            spawn: Vec2::ZERO,
            roster: Vec::new(),
        }
    }
}

/// All teams of a world, in id order.
#[derive(Debug, Default)]
pub struct Teams {
    teams: Vec<Team>,
    score_changes: Vec<(TeamId, i32)>,
}

impl Teams {
    /// No teams.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a new team with the next id.
    pub fn create(&mut self, name: impl Into<String>, spawn: Vec2) -> TeamId {
        let id = TeamId(self.teams.len() as i32);
        self.teams.push(Team {
            id,
            name: name.into(),
            score: 0,
            capture_region: None,
            spawn,
            roster: Vec::new(),
        });
        id
    }

    /// Add or replace a team received from the server.
    pub fn insert(&mut self, team: Team) {
        match self.teams.iter_mut().find(|existing| existing.id == team.id) {
            Some(existing) => *existing = team,
            None => self.teams.push(team),
        }
    }

    /// Team with `id`.
    pub fn get(&self, id: TeamId) -> Option<&Team> {
        self.teams.iter().find(|team| team.id == id)
    }

    /// Mutable team with `id`.
    pub fn get_mut(&mut self, id: TeamId) -> Option<&mut Team> {
        self.teams.iter_mut().find(|team| team.id == id)
    }

    /// Teams in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Team> {
        self.teams.iter()
    }

    /// Number of teams.
    pub fn len(&self) -> usize {
        self.teams.len()
    }

    /// Whether there are no teams.
    pub fn is_empty(&self) -> bool {
        self.teams.is_empty()
    }

    /// The team a joining player goes to: fewest members, earliest on ties.
    pub fn team_to_join(&self) -> Option<TeamId> {
        self.teams
            .iter()
            .min_by_key(|team| team.roster.len())
            .map(|team| team.id)
    }

    /// Add `player` to the roster of `team`.
    pub fn add_player(&mut self, team: TeamId, player: EntityId) -> bool {
        match self.get_mut(team) {
            Some(team) => {
                team.roster.push(player);
                true
            }
            None => false,
        }
    }

    /// Take `player` off whatever roster holds it.
    pub fn remove_player(&mut self, player: EntityId) {
        for team in &mut self.teams {
            team.roster.retain(|member| *member != player);
        }
    }

    /// Team whose roster holds `player`.
    pub fn team_of(&self, player: EntityId) -> Option<TeamId> {
        self.teams
            .iter()
            .find(|team| team.roster.contains(&player))
            .map(|team| team.id)
    }

    /// Change a score and remember the change for broadcast (server).
    pub fn set_score(&mut self, id: TeamId, score: i32) -> bool {
        let Some(team) = self.get_mut(id) else {
            return false;
        };
        team.score = score;
        self.score_changes.push((id, score));
        true
    }

    /// Apply a score received from the server.
    pub fn apply_score(&mut self, id: TeamId, score: i32) -> bool {
        match self.get_mut(id) {
            Some(team) => {
                team.score = score;
                true
            }
            None => false,
        }
    }

    /// Take score changes made since the last call.
    pub fn drain_score_changes(&mut self) -> Vec<(TeamId, i32)> {
        std::mem::take(&mut self.score_changes)
    }

    /// Wire records of every team.
    pub fn records(&self) -> Vec<TeamRecord> {
        self.teams.iter().map(Team::record).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_balances_with_first_team_on_ties() {
        let mut teams = Teams::new();
        let red = teams.create("Red", Vec2::ZERO);
        let blue = teams.create("Blue", Vec2::ZERO);

        assert_eq!(teams.team_to_join(), Some(red));
        teams.add_player(red, EntityId(1));
        assert_eq!(teams.team_to_join(), Some(blue));
        teams.add_player(blue, EntityId(2));
        assert_eq!(teams.team_to_join(), Some(red));

        teams.remove_player(EntityId(1));
        assert_eq!(teams.team_of(EntityId(1)), None);
        assert_eq!(teams.team_of(EntityId(2)), Some(blue));
        assert_eq!(teams.team_to_join(), Some(red));
    }

    #[test]
    fn test_no_teams_means_no_join() {
        assert_eq!(Teams::new().team_to_join(), None);
    }

    #[test]
    fn test_score_changes_are_recorded_on_set_only() {
        let mut teams = Teams::new();
        let red = teams.create("Red", Vec2::ZERO);

        assert!(teams.set_score(red, 2));
        assert!(teams.apply_score(red, 5));
        assert!(!teams.set_score(TeamId(9), 1));

        assert_eq!(teams.drain_score_changes(), vec![(red, 2)]);
        assert!(teams.drain_score_changes().is_empty());
        assert_eq!(teams.get(red).map(|team| team.score), Some(5));
    }

    #[test]
    fn test_record_layout() {
        let record = TeamRecord {
            id: TeamId(1),
            name: "Blue".into(),
            score: 3,
            capture_region: None,
        };
        let mut buf = BytesMut::new();
        record.encode(&mut buf);
        assert_eq!(&buf[..4], &[0, 0, 0, 1]);
        assert_eq!(&buf[buf.len() - 4..], &[0xff, 0xff, 0xff, 0xff]);

        let mut cursor: &[u8] = &buf;
        assert_eq!(TeamRecord::decode(&mut cursor).unwrap(), record);
    }
}
