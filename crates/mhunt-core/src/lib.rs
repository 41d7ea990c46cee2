//! Core domain model for Mission Hunter: tenants, missions and run modes.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

mod payload;

pub use payload::{CareerGoal, CareerGoalV1, MatchBreakdown, MissionRawData, MissionRawDataV1, PayloadError};

pub const CRATE_NAME: &str = "mhunt-core";

/// Number of postings requested from the search provider per user run.
pub const CANDIDATES_PER_SEARCH: usize = 5;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown {kind} value `{value}`")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

/// Cadence a hunt was triggered with. Drives the lookback window, prompt
/// variant and per-mission command quota.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    Daily,
    Weekly,
    Monthly,
}

impl RunMode {
    pub const ALL: [RunMode; 3] = [RunMode::Daily, RunMode::Weekly, RunMode::Monthly];

    pub fn as_str(&self) -> &'static str {
        match self {
            RunMode::Daily => "daily",
            RunMode::Weekly => "weekly",
            RunMode::Monthly => "monthly",
        }
    }

    /// Oldest acceptable posting age.
    pub fn lookback(&self) -> TimeDelta {
        match self {
            RunMode::Daily => TimeDelta::days(1),
            RunMode::Weekly => TimeDelta::days(3),
            RunMode::Monthly => TimeDelta::days(7),
        }
    }

    pub fn default_duration_hours(&self) -> f64 {
        match self {
            RunMode::Daily => 2.0,
            RunMode::Weekly | RunMode::Monthly => 10.0,
        }
    }

    pub fn max_commands(&self) -> i32 {
        match self {
            RunMode::Daily => 20,
            RunMode::Weekly => 100,
            RunMode::Monthly => 400,
        }
    }

    /// Six-field cron expression (seconds first), evaluated in UTC.
    pub fn default_cron(&self) -> &'static str {
        match self {
            RunMode::Daily => "0 0 */6 * * *",
            RunMode::Weekly => "0 0 8 * * Mon",
            RunMode::Monthly => "0 0 9 1 * *",
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunMode {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "daily" => Ok(RunMode::Daily),
            "weekly" => Ok(RunMode::Weekly),
            "monthly" => Ok(RunMode::Monthly),
            _ => Err(ParseEnumError {
                kind: "run mode",
                value: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    Active,
    Inactive,
}

impl UserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserStatus::Active => "active",
            UserStatus::Inactive => "inactive",
        }
    }
}

impl FromStr for UserStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(UserStatus::Active),
            "inactive" => Ok(UserStatus::Inactive),
            _ => Err(ParseEnumError {
                kind: "user status",
                value: s.to_string(),
            }),
        }
    }
}

/// Mission workflow state. Forward-only: pending -> developed -> active ->
/// completed, with rejected/archived reachable from any non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissionStatus {
    Pending,
    Developed,
    Active,
    Completed,
    Rejected,
    Archived,
}

impl MissionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MissionStatus::Pending => "pending",
            MissionStatus::Developed => "developed",
            MissionStatus::Active => "active",
            MissionStatus::Completed => "completed",
            MissionStatus::Rejected => "rejected",
            MissionStatus::Archived => "archived",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            MissionStatus::Completed | MissionStatus::Rejected | MissionStatus::Archived
        )
    }

    pub fn can_transition_to(&self, next: MissionStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        match next {
            MissionStatus::Rejected | MissionStatus::Archived => true,
            MissionStatus::Developed => *self == MissionStatus::Pending,
            MissionStatus::Active => *self == MissionStatus::Developed,
            MissionStatus::Completed => *self == MissionStatus::Active,
            MissionStatus::Pending => false,
        }
    }
}

impl FromStr for MissionStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(MissionStatus::Pending),
            "developed" => Ok(MissionStatus::Developed),
            "active" => Ok(MissionStatus::Active),
            "completed" => Ok(MissionStatus::Completed),
            "rejected" => Ok(MissionStatus::Rejected),
            "archived" => Ok(MissionStatus::Archived),
            _ => Err(ParseEnumError {
                kind: "mission status",
                value: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: Uuid,
    pub career_goal: CareerGoal,
}

/// Profile availability for a tenant as seen by the hunting core.
#[derive(Debug, Clone, PartialEq)]
pub enum ProfileState {
    Missing,
    /// A career goal row exists but did not decode against a known schema.
    Invalid(String),
    Ready(UserProfile),
}

/// One user row joined with its (optional) profile.
#[derive(Debug, Clone, PartialEq)]
pub struct TenantRecord {
    pub user_id: Uuid,
    pub email: String,
    pub status: UserStatus,
    pub profile: ProfileState,
}

impl TenantRecord {
    pub fn ready_profile(&self) -> Option<&UserProfile> {
        match &self.profile {
            ProfileState::Ready(profile) => Some(profile),
            _ => None,
        }
    }
}

/// Validated, normalized handoff from the response validator into persistence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissionDraft {
    pub title: String,
    pub description: String,
    pub source_url: String,
    pub platform: String,
    pub reward_amount: f64,
    pub estimated_duration_hours: f64,
    pub match_score: f64,
    pub analysis_notes: String,
    pub mission_type: RunMode,
    pub max_commands: i32,
    pub raw_data: MissionRawData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mission {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub description: String,
    pub source_url: String,
    pub platform: String,
    pub reward_amount: f64,
    pub estimated_duration_hours: f64,
    pub status: MissionStatus,
    pub mission_type: RunMode,
    pub match_score: f64,
    pub raw_data: MissionRawData,
    pub analysis_notes: String,
    pub max_commands: i32,
    pub created_at: DateTime<Utc>,
}

impl Mission {
    /// New `pending` mission owned by `user_id`.
    pub fn from_draft(user_id: Uuid, draft: MissionDraft, created_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            title: draft.title,
            description: draft.description,
            source_url: draft.source_url,
            platform: draft.platform,
            reward_amount: draft.reward_amount,
            estimated_duration_hours: draft.estimated_duration_hours,
            status: MissionStatus::Pending,
            mission_type: draft.mission_type,
            match_score: draft.match_score,
            raw_data: draft.raw_data,
            analysis_notes: draft.analysis_notes,
            max_commands: draft.max_commands,
            created_at,
        }
    }
}

/// Companion row created in the same transaction as its mission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissionThread {
    pub id: Uuid,
    pub mission_id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

impl MissionThread {
    const MAX_TITLE_CHARS: usize = 120;

    pub fn for_mission(mission: &Mission) -> Self {
        let title: String = mission.title.chars().take(Self::MAX_TITLE_CHARS).collect();
        Self {
            id: Uuid::new_v4(),
            mission_id: mission.id,
            user_id: mission.user_id,
            title,
            created_at: mission.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissionFilter {
    pub id: Uuid,
    pub user_id: Uuid,
    pub is_active: bool,
    pub match_count: i32,
    pub last_match_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_mode_policy_table() {
        assert_eq!(RunMode::Daily.lookback(), TimeDelta::days(1));
        assert_eq!(RunMode::Weekly.lookback(), TimeDelta::days(3));
        assert_eq!(RunMode::Monthly.lookback(), TimeDelta::days(7));

        assert_eq!(RunMode::Daily.max_commands(), 20);
        assert_eq!(RunMode::Weekly.max_commands(), 100);
        assert_eq!(RunMode::Monthly.max_commands(), 400);

        assert_eq!(RunMode::Daily.default_duration_hours(), 2.0);
        assert_eq!(RunMode::Weekly.default_duration_hours(), 10.0);
        assert_eq!(RunMode::Monthly.default_duration_hours(), 10.0);
    }

    #[test]
    fn run_mode_parses_case_insensitively() {
        assert_eq!("Weekly".parse::<RunMode>(), Ok(RunMode::Weekly));
        assert_eq!(" monthly ".parse::<RunMode>(), Ok(RunMode::Monthly));
        assert!("hourly".parse::<RunMode>().is_err());
    }

    #[test]
    fn mission_workflow_only_moves_forward() {
        use MissionStatus::*;
        assert!(Pending.can_transition_to(Developed));
        assert!(Developed.can_transition_to(Active));
        assert!(Active.can_transition_to(Completed));
        assert!(Pending.can_transition_to(Rejected));
        assert!(Active.can_transition_to(Archived));

        assert!(!Pending.can_transition_to(Active));
        assert!(!Developed.can_transition_to(Pending));
        assert!(!Completed.can_transition_to(Archived));
        assert!(!Rejected.can_transition_to(Developed));
    }

    #[test]
    fn thread_title_is_truncated() {
        let draft = MissionDraft {
            title: "x".repeat(300),
            description: String::new(),
            source_url: "https://site.com/job/1".into(),
            platform: "site".into(),
            reward_amount: 10.0,
            estimated_duration_hours: 2.0,
            match_score: 85.0,
            analysis_notes: String::new(),
            mission_type: RunMode::Daily,
            max_commands: 20,
            raw_data: MissionRawData::default(),
        };
        let mission = Mission::from_draft(Uuid::new_v4(), draft, Utc::now());
        let thread = MissionThread::for_mission(&mission);
        assert_eq!(mission.status, MissionStatus::Pending);
        assert_eq!(thread.mission_id, mission.id);
        assert_eq!(thread.title.chars().count(), 120);
    }
}
