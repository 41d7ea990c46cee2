//! Per-candidate URL checks and field normalization into `MissionDraft`s.

use chrono::{DateTime, Utc};
use mhunt_core::{MissionDraft, MissionRawData, MissionRawDataV1, RunMode};
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::parser::{Candidate, LooseNumber};

pub const DEFAULT_REWARD: f64 = 10.0;
pub const DEFAULT_MATCH_SCORE: f64 = 85.0;
pub const DEFAULT_PLATFORM: &str = "web";
pub const DEFAULT_TITLE: &str = "Untitled opportunity";
const MIN_URL_LEN: usize = 10;

/// Substrings that mark a search, login or signup page rather than a posting.
const NON_POSTING_MARKERS: [&str; 3] = ["login", "signup", "?q="];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("no url")]
    MissingUrl,
    #[error("url shorter than 10 characters")]
    TooShort,
    #[error("url is not http(s)")]
    NotHttp,
    #[error("url looks like a search or auth page (contains `{0}`)")]
    NotAPosting(&'static str),
}

#[derive(Debug, Clone, Default)]
pub struct ValidationOutcome {
    pub accepted: Vec<MissionDraft>,
    pub rejected: Vec<(Option<String>, Rejection)>,
}

/// Validates candidates for one run; `now` stamps generated notes.
#[derive(Debug, Clone, Copy)]
pub struct OpportunityValidator {
    mode: RunMode,
    now: DateTime<Utc>,
}

impl OpportunityValidator {
    pub fn new(mode: RunMode, now: DateTime<Utc>) -> Self {
        Self { mode, now }
    }

    pub fn check_url(candidate: &Candidate) -> Result<String, Rejection> {
        let url = candidate
            .source_url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .or_else(|| candidate.url.as_deref().map(str::trim).filter(|u| !u.is_empty()))
            .ok_or(Rejection::MissingUrl)?;

        if url.chars().count() < MIN_URL_LEN {
            return Err(Rejection::TooShort);
        }
        let lower = url.to_ascii_lowercase();
        if !(lower.starts_with("http://") || lower.starts_with("https://")) {
            return Err(Rejection::NotHttp);
        }
        if let Some(marker) = NON_POSTING_MARKERS.into_iter().find(|m| lower.contains(m)) {
            return Err(Rejection::NotAPosting(marker));
        }
        Ok(url.to_string())
    }

    /// First host label with any leading `www.` removed.
    pub fn platform_for(url: &str) -> String {
        Url::parse(url)
            .ok()
            .and_then(|parsed| parsed.host_str().map(str::to_ascii_lowercase))
            .and_then(|host| {
                let host = host.strip_prefix("www.").unwrap_or(&host);
                host.split('.')
                    .next()
                    .filter(|label| !label.is_empty())
                    .map(str::to_string)
            })
            .unwrap_or_else(|| DEFAULT_PLATFORM.to_string())
    }

    pub fn normalize_reward(value: Option<&LooseNumber>) -> f64 {
        value.and_then(LooseNumber::to_f64).unwrap_or(DEFAULT_REWARD)
    }

    pub fn validate(&self, candidate: Candidate) -> Result<MissionDraft, Rejection> {
        let source_url = Self::check_url(&candidate)?;
        let platform = Self::platform_for(&source_url);
        let reward_amount = Self::normalize_reward(candidate.reward_amount.as_ref());
        let estimated_duration_hours = candidate
            .estimated_duration_hours
            .as_ref()
            .and_then(LooseNumber::single_number)
            .filter(|h| *h > 0.0)
            .unwrap_or_else(|| self.mode.default_duration_hours());
        let match_score = candidate
            .match_score
            .as_ref()
            .and_then(LooseNumber::to_f64)
            .unwrap_or(DEFAULT_MATCH_SCORE);

        let title = non_blank(candidate.title).unwrap_or_else(|| DEFAULT_TITLE.to_string());
        let description = non_blank(candidate.description).unwrap_or_default();
        let analysis_notes = non_blank(candidate.analysis_notes).unwrap_or_else(|| {
            format!(
                "Found by the {} hunt on {}.",
                self.mode,
                self.now.format("%Y-%m-%d")
            )
        });

        let raw_data = MissionRawData::V1(MissionRawDataV1 {
            company: non_blank(candidate.company),
            posted_at: non_blank(candidate.posted_at),
            skills: candidate.skills.unwrap_or_default(),
            reward_text: candidate
                .reward_amount
                .as_ref()
                .and_then(LooseNumber::as_text)
                .map(str::to_string),
            match_breakdown: candidate.match_breakdown,
        });

        Ok(MissionDraft {
            title,
            description,
            source_url,
            platform,
            reward_amount,
            estimated_duration_hours,
            match_score,
            analysis_notes,
            mission_type: self.mode,
            max_commands: self.mode.max_commands(),
            raw_data,
        })
    }

    pub fn validate_all(&self, candidates: Vec<Candidate>) -> ValidationOutcome {
        let mut outcome = ValidationOutcome::default();
        for candidate in candidates {
            let url = candidate.source_url.clone().or_else(|| candidate.url.clone());
            match self.validate(candidate) {
                Ok(draft) => outcome.accepted.push(draft),
                Err(rejection) => {
                    debug!(url = url.as_deref().unwrap_or("<none>"), %rejection, "candidate rejected");
                    outcome.rejected.push((url, rejection));
                }
            }
        }
        outcome
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn validator(mode: RunMode) -> OpportunityValidator {
        let now = Utc.with_ymd_and_hms(2026, 3, 2, 8, 0, 0).single().expect("ts");
        OpportunityValidator::new(mode, now)
    }

    fn with_url(url: &str) -> Candidate {
        Candidate {
            title: Some("Build a dashboard".into()),
            source_url: Some(url.into()),
            ..Default::default()
        }
    }

    #[test]
    fn minimal_candidate_gets_defaults() {
        let draft = validator(RunMode::Daily)
            .validate(with_url("https://site.com/job/1"))
            .expect("accepted");

        assert_eq!(draft.platform, "site");
        assert_eq!(draft.reward_amount, 10.0);
        assert_eq!(draft.estimated_duration_hours, 2.0);
        assert_eq!(draft.match_score, 85.0);
        assert_eq!(draft.max_commands, 20);
        assert_eq!(draft.mission_type, RunMode::Daily);
        assert_eq!(draft.analysis_notes, "Found by the daily hunt on 2026-03-02.");
    }

    #[test]
    fn duration_default_and_quota_follow_mode() {
        let weekly = validator(RunMode::Weekly)
            .validate(with_url("https://site.com/job/1"))
            .expect("accepted");
        assert_eq!(weekly.estimated_duration_hours, 10.0);
        assert_eq!(weekly.max_commands, 100);

        let monthly = validator(RunMode::Monthly)
            .validate(with_url("https://site.com/job/1"))
            .expect("accepted");
        assert_eq!(monthly.estimated_duration_hours, 10.0);
        assert_eq!(monthly.max_commands, 400);
    }

    #[test]
    fn duration_ranges_fall_back_to_mode_default() {
        let with_duration = |value: LooseNumber| {
            let mut candidate = with_url("https://site.com/job/1");
            candidate.estimated_duration_hours = Some(value);
            candidate
        };

        let daily = validator(RunMode::Daily);
        let hours = |v: &OpportunityValidator, value: LooseNumber| {
            v.validate(with_duration(value)).expect("accepted").estimated_duration_hours
        };
        assert_eq!(hours(&daily, LooseNumber::Text("2-3 hours".into())), 2.0);
        assert_eq!(hours(&daily, LooseNumber::Text("3 hours".into())), 3.0);
        assert_eq!(hours(&daily, LooseNumber::Number(5.5)), 5.5);
        assert_eq!(hours(&validator(RunMode::Weekly), LooseNumber::Text("20 to 30h".into())), 10.0);
    }

    #[test]
    fn postings_with_mistyped_extras_are_accepted() {
        let raw = r#"[
            {"title": "React app", "source_url": "https://malt.fr/p/react-app", "skills": "react, node"},
            {"title": "API", "source_url": "https://malt.fr/p/api", "match_breakdown": {"skills_match": "high"}},
            {"title": "Shop", "source_url": "https://malt.fr/p/shop", "posted_at": 3}
        ]"#;
        let candidates = crate::parser::parse_candidates(raw);
        assert_eq!(candidates.len(), 3);

        let outcome = validator(RunMode::Daily).validate_all(candidates);
        assert_eq!(outcome.accepted.len(), 3);
        assert!(outcome.rejected.is_empty());
        let MissionRawData::V1(first) = &outcome.accepted[0].raw_data;
        assert_eq!(first.skills, vec!["react", "node"]);
    }

    #[test]
    fn search_and_auth_pages_are_rejected_whatever_else_is_valid() {
        for (url, marker) in [
            ("https://www.upwork.com/ab/account-security/login", "login"),
            ("https://malt.fr/signup/freelancer", "signup"),
            ("https://indeed.com/jobs?q=react", "?q="),
            ("https://example.com/LOGIN?next=/job/1", "login"),
        ] {
            let mut candidate = with_url(url);
            candidate.reward_amount = Some(LooseNumber::Number(500.0));
            candidate.match_score = Some(LooseNumber::Number(99.0));
            assert_eq!(
                validator(RunMode::Weekly).validate(candidate),
                Err(Rejection::NotAPosting(marker)),
                "{url}"
            );
        }
    }

    #[test]
    fn url_shape_checks() {
        let v = validator(RunMode::Daily);
        assert_eq!(v.validate(Candidate::default()), Err(Rejection::MissingUrl));
        assert_eq!(v.validate(with_url("   ")), Err(Rejection::MissingUrl));
        assert_eq!(v.validate(with_url("http://a")), Err(Rejection::TooShort));
        assert_eq!(v.validate(with_url("ftp://files.example.com/job")), Err(Rejection::NotHttp));
        assert_eq!(v.validate(with_url("www.example.com/job/1")), Err(Rejection::NotHttp));
    }

    #[test]
    fn url_falls_back_to_url_field() {
        let candidate = Candidate {
            url: Some("https://www.freelancer.com/projects/php/api-123".into()),
            ..Default::default()
        };
        let draft = validator(RunMode::Daily).validate(candidate).expect("accepted");
        assert_eq!(draft.source_url, "https://www.freelancer.com/projects/php/api-123");
        assert_eq!(draft.platform, "freelancer");
        assert_eq!(draft.title, DEFAULT_TITLE);
    }

    #[test]
    fn reward_normalization() {
        assert_eq!(OpportunityValidator::normalize_reward(None), 10.0);
        assert_eq!(
            OpportunityValidator::normalize_reward(Some(&LooseNumber::Number(750.0))),
            750.0
        );
        assert_eq!(
            OpportunityValidator::normalize_reward(Some(&LooseNumber::Text("€2 500".into()))),
            2500.0
        );
        assert_eq!(
            OpportunityValidator::normalize_reward(Some(&LooseNumber::Text("".into()))),
            10.0
        );
        assert_eq!(
            OpportunityValidator::normalize_reward(Some(&LooseNumber::Text("negotiable".into()))),
            10.0
        );
    }

    #[test]
    fn platform_defaults_when_host_is_unparseable() {
        assert_eq!(OpportunityValidator::platform_for("https://jobs.lever.co/acme/1"), "jobs");
        assert_eq!(OpportunityValidator::platform_for("https://WWW.Malt.fr/p/1"), "malt");
        assert_eq!(OpportunityValidator::platform_for("https://"), DEFAULT_PLATFORM);
    }

    #[test]
    fn raw_data_keeps_reward_text_and_extras() {
        let mut candidate = with_url("https://site.com/job/9");
        candidate.reward_amount = Some(LooseNumber::Text("$45/hr".into()));
        candidate.company = Some(" Acme ".into());
        candidate.skills = Some(vec!["react".into()]);

        let draft = validator(RunMode::Weekly).validate(candidate).expect("accepted");
        assert_eq!(draft.reward_amount, 45.0);
        let MissionRawData::V1(raw) = draft.raw_data;
        assert_eq!(raw.reward_text.as_deref(), Some("$45/hr"));
        assert_eq!(raw.company.as_deref(), Some("Acme"));
        assert_eq!(raw.skills, vec!["react"]);
    }

    #[test]
    fn validate_all_splits_batch() {
        let outcome = validator(RunMode::Daily).validate_all(vec![
            with_url("https://site.com/job/1"),
            with_url("https://site.com/login"),
            Candidate::default(),
        ]);
        assert_eq!(outcome.accepted.len(), 1);
        assert_eq!(outcome.rejected.len(), 2);
    }
}
