//! Extraction of candidate postings from free-form provider text.

use mhunt_core::MatchBreakdown;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value as JsonValue;
use tracing::{debug, warn};

/// A number the model may have emitted either as JSON number or as text
/// such as `"$1,200"` or `"3 hours"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LooseNumber {
    Number(f64),
    Text(String),
}

impl LooseNumber {
    /// Numbers pass through; text keeps only digits and dots before parsing.
    pub fn to_f64(&self) -> Option<f64> {
        match self {
            LooseNumber::Number(n) if n.is_finite() => Some(*n),
            LooseNumber::Number(_) => None,
            LooseNumber::Text(text) => {
                let cleaned: String = text
                    .chars()
                    .filter(|c| c.is_ascii_digit() || *c == '.')
                    .collect();
                if cleaned.is_empty() {
                    return None;
                }
                cleaned.parse::<f64>().ok().filter(|n| n.is_finite())
            }
        }
    }

    /// Like `to_f64`, but text holding several numbers (a range such as
    /// `"2-3 hours"`) yields `None` instead of gluing the digits together.
    pub fn single_number(&self) -> Option<f64> {
        let LooseNumber::Text(text) = self else {
            return self.to_f64();
        };
        let mut numbers = text
            .split(|c: char| !(c.is_ascii_digit() || c == '.'))
            .filter(|token| token.chars().any(|c| c.is_ascii_digit()));
        let first = numbers.next()?;
        if numbers.next().is_some() {
            return None;
        }
        first.parse::<f64>().ok().filter(|n| n.is_finite())
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            LooseNumber::Text(text) => Some(text),
            LooseNumber::Number(_) => None,
        }
    }
}

/// One posting as proposed by the provider. Extra keys are ignored and a
/// field with an unusable JSON type reads as absent.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Candidate {
    #[serde(default, deserialize_with = "lenient")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub source_url: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub url: Option<String>,
    #[serde(default, alias = "budget", alias = "reward", deserialize_with = "lenient")]
    pub reward_amount: Option<LooseNumber>,
    #[serde(default, deserialize_with = "lenient")]
    pub estimated_duration_hours: Option<LooseNumber>,
    #[serde(default, deserialize_with = "lenient")]
    pub match_score: Option<LooseNumber>,
    #[serde(default, deserialize_with = "lenient")]
    pub analysis_notes: Option<String>,
    #[serde(default, alias = "company_name", deserialize_with = "lenient")]
    pub company: Option<String>,
    #[serde(default, alias = "date_posted", alias = "published_at", deserialize_with = "lenient")]
    pub posted_at: Option<String>,
    #[serde(default, deserialize_with = "lenient_skills")]
    pub skills: Option<Vec<String>>,
    #[serde(default, deserialize_with = "lenient")]
    pub match_breakdown: Option<MatchBreakdown>,
}

fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = JsonValue::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

/// Accepts a list of strings or one comma-separated string.
fn lenient_skills<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    let split = |text: &str| -> Vec<String> {
        text.split(',')
            .map(str::trim)
            .filter(|skill| !skill.is_empty())
            .map(str::to_string)
            .collect()
    };
    Ok(match JsonValue::deserialize(deserializer)? {
        JsonValue::String(text) => Some(split(text.as_str())),
        JsonValue::Array(items) => Some(
            items
                .iter()
                .filter_map(JsonValue::as_str)
                .flat_map(split)
                .collect(),
        ),
        _ => None,
    })
}

fn strip_code_fences(raw: &str) -> String {
    raw.replace("```json", "")
        .replace("```JSON", "")
        .replace("```", "")
}

/// Return the slice between the first `[` and the last `]`, if any.
fn bracketed(text: &str) -> Option<&str> {
    let start = text.find('[')?;
    let end = text.rfind(']')?;
    if end < start {
        return None;
    }
    Some(&text[start..=end])
}

/// Parse provider output into candidates. Never fails: missing or invalid
/// JSON yields an empty list, and entries that are not objects are dropped.
pub fn parse_candidates(raw: &str) -> Vec<Candidate> {
    let text = strip_code_fences(raw);
    let Some(array_text) = bracketed(&text) else {
        warn!(chars = raw.len(), "no JSON array found in provider response");
        return Vec::new();
    };

    let items: Vec<JsonValue> = match serde_json::from_str(array_text) {
        Ok(items) => items,
        Err(err) => {
            warn!(error = %err, "provider response array is not valid JSON");
            return Vec::new();
        }
    };

    let total = items.len();
    let candidates: Vec<Candidate> = items
        .into_iter()
        .enumerate()
        .filter_map(|(index, item)| {
            if !item.is_object() {
                debug!(index, "dropping non-object candidate");
                return None;
            }
            match serde_json::from_value::<Candidate>(item) {
                Ok(candidate) => Some(candidate),
                Err(err) => {
                    debug!(index, error = %err, "dropping undecodable candidate");
                    None
                }
            }
        })
        .collect();

    if candidates.len() < total {
        warn!(
            kept = candidates.len(),
            dropped = total - candidates.len(),
            "some provider candidates did not decode"
        );
    }
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fenced_array_is_extracted() {
        let raw = "```json\n[{\"title\":\"X\",\"source_url\":\"https://site.com/job/1\"}]\n```";
        let parsed = parse_candidates(raw);
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].title.as_deref(), Some("X"));
        assert_eq!(parsed[0].source_url.as_deref(), Some("https://site.com/job/1"));
    }

    #[test]
    fn surrounding_prose_is_ignored() {
        let raw = "Here are the missions I found:\n[{\"title\":\"A\"},{\"title\":\"B\"}]\nGood luck [1]!";
        // The last `]` belongs to the trailing prose, which makes the slice invalid JSON.
        assert!(parse_candidates(raw).is_empty());

        let raw = "Here are the missions I found:\n[{\"title\":\"A\"},{\"title\":\"B\"}]\nGood luck!";
        assert_eq!(parse_candidates(raw).len(), 2);
    }

    #[test]
    fn text_without_array_yields_nothing() {
        for raw in ["", "No results today.", "{\"title\":\"X\"}", "] backwards ["] {
            assert!(parse_candidates(raw).is_empty(), "{raw:?}");
        }
    }

    #[test]
    fn malformed_json_yields_nothing() {
        assert!(parse_candidates("[{\"title\": \"X\",]").is_empty());
    }

    #[test]
    fn only_non_object_entries_are_dropped() {
        let raw = r#"[
            {"title": "ok", "url": "https://a.com/job/1", "budget": "$1,200", "extra": true},
            {"title": 42, "source_url": "https://a.com/job/2"},
            "just a string",
            7
        ]"#;
        let parsed = parse_candidates(raw);
        assert_eq!(parsed.len(), 2);
        assert_eq!(
            parsed[0].reward_amount,
            Some(LooseNumber::Text("$1,200".into()))
        );
        assert_eq!(parsed[1].title, None);
        assert_eq!(parsed[1].source_url.as_deref(), Some("https://a.com/job/2"));
    }

    #[test]
    fn mistyped_optional_fields_read_as_absent() {
        let raw = r#"[
            {"title": "React app", "source_url": "https://malt.fr/p/react-app", "skills": "react, node"},
            {"title": "API", "source_url": "https://malt.fr/p/api", "match_breakdown": {"skills_match": "high"}},
            {"title": "Shop", "source_url": "https://malt.fr/p/shop", "posted_at": 3, "match_score": true}
        ]"#;
        let parsed = parse_candidates(raw);
        assert_eq!(parsed.len(), 3);
        assert_eq!(parsed[0].skills, Some(vec!["react".to_string(), "node".to_string()]));
        assert_eq!(parsed[1].match_breakdown, None);
        assert_eq!(parsed[2].posted_at, None);
        assert_eq!(parsed[2].match_score, None);
        assert_eq!(parsed[2].title.as_deref(), Some("Shop"));
    }

    #[test]
    fn skills_list_keeps_only_text_items() {
        let parsed = parse_candidates(r#"[{"skills": ["rust", 3, "sql, go"]}]"#);
        assert_eq!(
            parsed[0].skills,
            Some(vec!["rust".to_string(), "sql".to_string(), "go".to_string()])
        );
    }

    #[test]
    fn loose_numbers_normalize() {
        assert_eq!(LooseNumber::Number(42.5).to_f64(), Some(42.5));
        assert_eq!(LooseNumber::Text("$1,200".into()).to_f64(), Some(1200.0));
        assert_eq!(LooseNumber::Text("35.50 EUR/h".into()).to_f64(), Some(35.5));
        assert_eq!(LooseNumber::Text("to be discussed".into()).to_f64(), None);
        assert_eq!(LooseNumber::Text("1.2.3".into()).to_f64(), None);
    }

    #[test]
    fn single_number_refuses_ranges() {
        assert_eq!(LooseNumber::Number(5.5).single_number(), Some(5.5));
        assert_eq!(LooseNumber::Text("3 hours".into()).single_number(), Some(3.0));
        assert_eq!(LooseNumber::Text("about 1.5h.".into()).single_number(), Some(1.5));
        assert_eq!(LooseNumber::Text("2-3 hours".into()).single_number(), None);
        assert_eq!(LooseNumber::Text("10 to 20".into()).single_number(), None);
        assert_eq!(LooseNumber::Text("a few".into()).single_number(), None);
    }
}
