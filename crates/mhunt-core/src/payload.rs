//! Versioned JSON payloads stored alongside users and missions.
//!
//! Both payloads carry a `"version"` tag. Decoding fails closed: an unknown
//! version or an unexpected field is an error, never a pass-through.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("{what} payload rejected: {source}")]
    Decode {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("{what} payload could not be encoded: {source}")]
    Encode {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// A user's declared career goal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "version")]
pub enum CareerGoal {
    #[serde(rename = "v1")]
    V1(CareerGoalV1),
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CareerGoalV1 {
    pub dream_role: String,
    #[serde(default)]
    pub desired_activities: Vec<String>,
    #[serde(default)]
    pub avoided_activities: Vec<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub min_hourly_rate: Option<f64>,
}

impl CareerGoal {
    pub fn decode(value: JsonValue) -> Result<Self, PayloadError> {
        serde_json::from_value(value).map_err(|source| PayloadError::Decode {
            what: "career goal",
            source,
        })
    }

    pub fn encode(&self) -> Result<JsonValue, PayloadError> {
        serde_json::to_value(self).map_err(|source| PayloadError::Encode {
            what: "career goal",
            source,
        })
    }

    pub fn dream_role(&self) -> &str {
        match self {
            CareerGoal::V1(goal) => goal.dream_role.trim(),
        }
    }

    pub fn avoided_activities(&self) -> &[String] {
        match self {
            CareerGoal::V1(goal) => &goal.avoided_activities,
        }
    }

    pub fn min_hourly_rate(&self) -> Option<f64> {
        match self {
            CareerGoal::V1(goal) => goal.min_hourly_rate,
        }
    }

    /// Desired activities followed by keywords, trimmed and deduplicated
    /// case-insensitively in first-seen order.
    pub fn skills(&self) -> Vec<String> {
        let CareerGoal::V1(goal) = self;
        let mut out: Vec<String> = Vec::new();
        for skill in goal.desired_activities.iter().chain(goal.keywords.iter()) {
            let skill = skill.trim();
            if skill.is_empty() {
                continue;
            }
            if !out.iter().any(|s| s.eq_ignore_ascii_case(skill)) {
                out.push(skill.to_string());
            }
        }
        out
    }

    /// Free text used to pick niche source buckets.
    pub fn role_and_skills_text(&self) -> String {
        let mut parts = vec![self.dream_role().to_string()];
        parts.extend(self.skills());
        parts.join(" ")
    }
}

/// AI-supplied extras kept with a mission for the downstream workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "version")]
pub enum MissionRawData {
    #[serde(rename = "v1")]
    V1(MissionRawDataV1),
}

impl Default for MissionRawData {
    fn default() -> Self {
        MissionRawData::V1(MissionRawDataV1::default())
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MissionRawDataV1 {
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub posted_at: Option<String>,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub reward_text: Option<String>,
    #[serde(default)]
    pub match_breakdown: Option<MatchBreakdown>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MatchBreakdown {
    #[serde(default)]
    pub skills_match: Option<f64>,
    #[serde(default)]
    pub rate_match: Option<f64>,
    #[serde(default)]
    pub freshness: Option<f64>,
    #[serde(default)]
    pub summary: Option<String>,
}

impl MissionRawData {
    pub fn decode(value: JsonValue) -> Result<Self, PayloadError> {
        serde_json::from_value(value).map_err(|source| PayloadError::Decode {
            what: "mission raw data",
            source,
        })
    }

    pub fn encode(&self) -> Result<JsonValue, PayloadError> {
        serde_json::to_value(self).map_err(|source| PayloadError::Encode {
            what: "mission raw data",
            source,
        })
    }
}
