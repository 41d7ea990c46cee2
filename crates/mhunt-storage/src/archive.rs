//! Audit trail of raw provider replies, one file per distinct reply.
//!
//! Layout: `<root>/<mode>/<YYYY-mm-dd>/<user_id>/<HHMMSS>-<digest>.txt`, where
//! `digest` is the first 16 hex chars of the reply's sha256. A reply already
//! on disk for the same user, day and second is left untouched.

use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{DateTime, Utc};
use mhunt_core::RunMode;
use sha2::{Digest, Sha256};
use tokio::fs;
use uuid::Uuid;

const DIGEST_CHARS: usize = 16;

#[derive(Debug, Clone)]
pub struct ResponseArchive {
    root: PathBuf,
}

impl ResponseArchive {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn digest(body: &str) -> String {
        let mut digest = hex::encode(Sha256::digest(body.as_bytes()));
        digest.truncate(DIGEST_CHARS);
        digest
    }

    pub fn path_for(&self, captured_at: DateTime<Utc>, mode: RunMode, user_id: Uuid, body: &str) -> PathBuf {
        self.root
            .join(mode.as_str())
            .join(captured_at.format("%Y-%m-%d").to_string())
            .join(user_id.to_string())
            .join(format!("{}-{}.txt", captured_at.format("%H%M%S"), Self::digest(body)))
    }

    /// Write `body` unless the same reply is already archived; returns its path.
    pub async fn record(
        &self,
        captured_at: DateTime<Utc>,
        mode: RunMode,
        user_id: Uuid,
        body: &str,
    ) -> anyhow::Result<PathBuf> {
        let path = self.path_for(captured_at, mode, user_id, body);
        if fs::try_exists(&path).await.unwrap_or(false) {
            return Ok(path);
        }

        let dir = path.parent().unwrap_or(&self.root);
        fs::create_dir_all(dir)
            .await
            .with_context(|| format!("creating {}", dir.display()))?;

        // Readers never observe a half-written reply.
        let partial = path.with_extension("part");
        fs::write(&partial, body)
            .await
            .with_context(|| format!("writing {}", partial.display()))?;
        if let Err(err) = fs::rename(&partial, &path).await {
            let _ = fs::remove_file(&partial).await;
            return Err(err).with_context(|| format!("moving reply into {}", path.display()));
        }
        Ok(path)
    }
}
