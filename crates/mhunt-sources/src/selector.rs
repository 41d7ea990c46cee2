use rand::seq::SliceRandom;
use rand::Rng;

use crate::catalog::{Bucket, SourceCatalog};

pub const DEFAULT_SOURCE_CAP: usize = 10;

/// Picks the sites a user's search should emphasise.
#[derive(Debug, Clone)]
pub struct SourceSelector {
    catalog: SourceCatalog,
    cap: usize,
}

impl SourceSelector {
    pub fn new(catalog: SourceCatalog) -> Self {
        Self {
            catalog,
            cap: DEFAULT_SOURCE_CAP,
        }
    }

    pub fn with_cap(mut self, cap: usize) -> Self {
        self.cap = cap.max(1);
        self
    }

    pub fn catalog(&self) -> &SourceCatalog {
        &self.catalog
    }

    pub fn matching_niches(role_and_skills: &str) -> Vec<Bucket> {
        let haystack = role_and_skills.to_lowercase();
        Bucket::NICHES
            .into_iter()
            .filter(|bucket| bucket.keywords().iter().any(|kw| haystack.contains(kw)))
            .collect()
    }

    /// Always-included buckets followed by matching niches, deduplicated
    /// case-insensitively in first-seen order. Not shuffled or capped.
    pub fn candidates(&self, role_and_skills: &str) -> Vec<String> {
        let buckets = Bucket::ALWAYS_INCLUDED
            .into_iter()
            .chain(Self::matching_niches(role_and_skills));

        let mut out: Vec<String> = Vec::new();
        for bucket in buckets {
            for site in self.catalog.sites(bucket) {
                let site = site.trim();
                if site.is_empty() || out.iter().any(|s| s.eq_ignore_ascii_case(site)) {
                    continue;
                }
                out.push(site.to_string());
            }
        }
        out
    }

    pub fn select(&self, role_and_skills: &str) -> Vec<String> {
        self.select_with_rng(role_and_skills, &mut rand::thread_rng())
    }

    pub fn select_with_rng<R: Rng + ?Sized>(&self, role_and_skills: &str, rng: &mut R) -> Vec<String> {
        let mut sites = self.candidates(role_and_skills);
        sites.shuffle(rng);
        sites.truncate(self.cap);
        sites
    }
}
