//! Categorized job-site catalog loaded once at startup.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Bucket {
    Aggregators,
    GeneralRemote,
    TechDev,
    WritingContent,
    DesignCreative,
    MarketingSales,
}

impl Bucket {
    pub const ALWAYS_INCLUDED: [Bucket; 2] = [Bucket::Aggregators, Bucket::GeneralRemote];
    pub const NICHES: [Bucket; 4] = [
        Bucket::TechDev,
        Bucket::WritingContent,
        Bucket::DesignCreative,
        Bucket::MarketingSales,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            Bucket::Aggregators => "aggregators",
            Bucket::GeneralRemote => "general_remote",
            Bucket::TechDev => "tech_dev",
            Bucket::WritingContent => "writing_content",
            Bucket::DesignCreative => "design_creative",
            Bucket::MarketingSales => "marketing_sales",
        }
    }

    /// Lowercase substrings that pull a niche bucket into a selection.
    pub fn keywords(&self) -> &'static [&'static str] {
        match self {
            Bucket::Aggregators | Bucket::GeneralRemote => &[],
            Bucket::TechDev => &[
                "dev", "code", "react", "engineer", "software", "python", "javascript",
                "typescript", "backend", "frontend", "fullstack", "data", "web", "mobile", "rust",
            ],
            Bucket::WritingContent => &[
                "writ", "content", "copy", "editor", "blog", "translat", "redact", "journalis",
                "proofread",
            ],
            Bucket::DesignCreative => &[
                "design", "ux", "graphic", "figma", "illustrat", "video", "creative", "motion",
                "brand",
            ],
            Bucket::MarketingSales => &[
                "marketing", "sales", "seo", "growth", "advertis", "social media", "community",
                "lead gen", "ecommerce", "business develop",
            ],
        }
    }
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("reading catalog {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("parsing catalog: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Immutable bucket -> sites mapping. Buckets absent from the source file are empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceCatalog {
    buckets: BTreeMap<String, Vec<String>>,
}

impl SourceCatalog {
    pub fn from_json_str(text: &str) -> Result<Self, CatalogError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| CatalogError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    /// Load the catalog, substituting the built-in fallback on any failure.
    pub fn load_or_fallback(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match Self::load(path) {
            Ok(catalog) => {
                info!(path = %path.display(), sites = catalog.site_count(), "source catalog loaded");
                catalog
            }
            Err(err) => {
                warn!(error = %err, "source catalog unavailable; using built-in fallback");
                Self::fallback()
            }
        }
    }

    pub fn fallback() -> Self {
        let entries: [(Bucket, &[&str]); 6] = [
            (Bucket::Aggregators, &["indeed.com", "linkedin.com/jobs", "glassdoor.com"]),
            (Bucket::GeneralRemote, &["upwork.com", "malt.fr", "freelancer.com", "remoteok.com"]),
            (Bucket::TechDev, &["weworkremotely.com", "toptal.com", "gun.io"]),
            (Bucket::WritingContent, &["problogger.com/jobs", "contena.co"]),
            (Bucket::DesignCreative, &["dribbble.com/jobs", "behance.net/joblist"]),
            (Bucket::MarketingSales, &["marketinghire.com", "growthhackers.com/jobs"]),
        ];
        let buckets = entries
            .into_iter()
            .map(|(bucket, sites)| {
                (
                    bucket.key().to_string(),
                    sites.iter().map(|s| s.to_string()).collect(),
                )
            })
            .collect();
        Self { buckets }
    }

    pub fn sites(&self, bucket: Bucket) -> &[String] {
        self.buckets
            .get(bucket.key())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn site_count(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }
}
