//! Prompt assembly and the chat-completions search client.

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use mhunt_core::{RunMode, UserProfile, CANDIDATES_PER_SEARCH};
use mhunt_storage::{ProviderHttp, TransportError};
use serde_json::json;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

const GENERIC_INSTRUCTIONS: &str = "You are a freelance opportunity scout. \
Search the web for real, currently open freelance missions that match the \
candidate described by the user. Only report postings you actually found, \
each with a direct link to the posting page itself. Answer with a JSON array \
and nothing else.";

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("search did not finish within {0}s")]
    Timeout(u64),
    #[error("provider returned no message content")]
    EmptyResponse,
    #[error("no provider api key configured")]
    MissingApiKey,
}

/// System instructions per run mode, read once at startup.
#[derive(Debug, Clone)]
pub struct PromptSet {
    daily: String,
    weekly: String,
    monthly: String,
}

impl Default for PromptSet {
    fn default() -> Self {
        Self::generic()
    }
}

impl PromptSet {
    pub fn generic() -> Self {
        Self {
            daily: GENERIC_INSTRUCTIONS.to_string(),
            weekly: GENERIC_INSTRUCTIONS.to_string(),
            monthly: GENERIC_INSTRUCTIONS.to_string(),
        }
    }

    pub fn file_name(mode: RunMode) -> String {
        format!("hunt_{}.txt", mode.as_str())
    }

    /// Missing, unreadable or blank files fall back to generic instructions.
    pub fn load(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        let read = |mode: RunMode| {
            let path = dir.join(Self::file_name(mode));
            match std::fs::read_to_string(&path) {
                Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
                Ok(_) => {
                    warn!(path = %path.display(), "prompt file is empty; using generic instructions");
                    GENERIC_INSTRUCTIONS.to_string()
                }
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "prompt file unavailable; using generic instructions");
                    GENERIC_INSTRUCTIONS.to_string()
                }
            }
        };
        Self {
            daily: read(RunMode::Daily),
            weekly: read(RunMode::Weekly),
            monthly: read(RunMode::Monthly),
        }
    }

    pub fn for_mode(&self, mode: RunMode) -> &str {
        match mode {
            RunMode::Daily => &self.daily,
            RunMode::Weekly => &self.weekly,
            RunMode::Monthly => &self.monthly,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchWindow {
    pub now: DateTime<Utc>,
    pub oldest_allowed: DateTime<Utc>,
}

impl SearchWindow {
    pub fn for_mode(mode: RunMode, now: DateTime<Utc>) -> Self {
        Self {
            now,
            oldest_allowed: now - mode.lookback(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub user_id: Uuid,
    pub mode: RunMode,
    pub system_prompt: String,
    pub user_message: String,
}

/// Build the per-user instruction: profile, freshness window, sites to
/// emphasise, exclusion rules and the expected JSON shape.
pub fn build_user_message(profile: &UserProfile, window: &SearchWindow, sources: &[String]) -> String {
    let goal = &profile.career_goal;
    let role = goal.dream_role();
    let mut lines = vec![format!(
        "Candidate dream role: {}",
        if role.is_empty() { "freelancer" } else { role }
    )];

    let skills = goal.skills();
    if !skills.is_empty() {
        lines.push(format!("Skills and desired activities: {}", skills.join(", ")));
    }
    let avoided = goal.avoided_activities();
    if !avoided.is_empty() {
        lines.push(format!("Activities to avoid: {}", avoided.join(", ")));
    }
    if let Some(rate) = goal.min_hourly_rate() {
        lines.push(format!("Minimum hourly rate: {rate}"));
    }

    lines.push(String::new());
    lines.push(format!(
        "Current time: {}",
        window.now.to_rfc3339_opts(SecondsFormat::Secs, true)
    ));
    lines.push(format!(
        "Only include postings published after {}.",
        window.oldest_allowed.to_rfc3339_opts(SecondsFormat::Secs, true)
    ));

    if !sources.is_empty() {
        lines.push(String::new());
        lines.push("Prioritise these sites:".to_string());
        lines.extend(sources.iter().map(|site| format!("- {site}")));
    }

    lines.push(String::new());
    lines.push("Rules:".to_string());
    lines.push("- Every source_url must be the direct page of one posting, never a search results, login or signup page.".to_string());
    lines.push("- Exclude postings that are closed, expired or already filled.".to_string());
    lines.push("- Exclude postings that require the activities to avoid.".to_string());
    lines.push("- Exclude postings older than the date above.".to_string());
    lines.push(String::new());
    lines.push(format!(
        "Return exactly {CANDIDATES_PER_SEARCH} missions as a JSON array of objects with keys: \
         title, description, source_url, reward_amount, estimated_duration_hours, match_score (0-100), \
         analysis_notes, company, posted_at, skills, match_breakdown \
         (object with skills_match, rate_match, freshness, summary)."
    ));
    lines.join("\n")
}

/// The web-grounded search provider seam.
#[async_trait]
pub trait OpportunitySearch: Send + Sync {
    /// Raw assistant text for one user's search.
    async fn search(&self, request: &SearchRequest) -> Result<String, ProviderError>;
}

/// OpenAI-compatible `/chat/completions` client (Perplexity by default).
#[derive(Debug, Clone)]
pub struct ChatSearchClient {
    http: ProviderHttp,
    endpoint: String,
    model: String,
    api_key: Option<String>,
    temperature: f64,
}

impl ChatSearchClient {
    pub const DEFAULT_TEMPERATURE: f64 = 0.1;

    pub fn new(http: ProviderHttp, base_url: &str, model: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            http,
            endpoint: Self::endpoint_for(base_url),
            model: model.into(),
            api_key,
            temperature: Self::DEFAULT_TEMPERATURE,
        }
    }

    pub fn endpoint_for(base_url: &str) -> String {
        let base = base_url.trim_end_matches('/');
        if base.ends_with("/chat/completions") {
            base.to_string()
        } else {
            format!("{base}/chat/completions")
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn request_body(&self, request: &SearchRequest) -> serde_json::Value {
        json!({
            "model": self.model,
            "temperature": self.temperature,
            "messages": [
                { "role": "system", "content": request.system_prompt },
                { "role": "user", "content": request.user_message },
            ],
        })
    }

    pub fn extract_content(response: &serde_json::Value) -> Result<String, ProviderError> {
        response
            .pointer("/choices/0/message/content")
            .and_then(serde_json::Value::as_str)
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .map(str::to_string)
            .ok_or(ProviderError::EmptyResponse)
    }
}

#[async_trait]
impl OpportunitySearch for ChatSearchClient {
    async fn search(&self, request: &SearchRequest) -> Result<String, ProviderError> {
        let api_key = self.api_key.as_deref().ok_or(ProviderError::MissingApiKey)?;
        let body = self.request_body(request);
        debug!(user_id = %request.user_id, mode = %request.mode, model = %self.model, "calling search provider");
        let response = self.http.post_json(&self.endpoint, Some(api_key), &body).await?;
        Self::extract_content(&response)
    }
}
