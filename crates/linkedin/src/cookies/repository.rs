use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use super::cookie::CookieSet;
use crate::error::{LinkedinError, Result};

/// File-backed cache of session cookies, one JSON record per username.
#[derive(Debug, Clone)]
pub struct CookieRepository {
    dir: PathBuf,
}

impl CookieRepository {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn record_path(&self, username: &str) -> PathBuf {
        self.dir.join(format!("{username}.json"))
    }

    fn backup_path(&self, username: &str, at: DateTime<Utc>) -> PathBuf {
        self.dir.join(format!(
            "{username}-{}.json",
            at.format("%Y_%m_%d_%H_%M_%S")
        ))
    }

    /// Overwrite the record for `username`, creating the directory if needed.
    pub async fn save(&self, cookies: &CookieSet, username: &str) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.record_path(username);
        let content = serde_json::to_vec_pretty(cookies)?;
        tokio::fs::write(&path, content).await?;
        debug!(path = %path.display(), count = cookies.len(), "Saved cookies");
        Ok(())
    }

    /// Cached cookies for `username`, validated against the current time.
    pub async fn get(&self, username: &str) -> Result<Option<CookieSet>> {
        self.get_at(username, Utc::now()).await
    }

    /// Like [`get`](Self::get) with an explicit clock.
    ///
    /// Returns `Ok(None)` when no usable record exists and
    /// [`LinkedinError::SessionExpired`] when the record's session cookie is
    /// missing, empty, has no expiry or has already expired.
    pub async fn get_at(&self, username: &str, now: DateTime<Utc>) -> Result<Option<CookieSet>> {
        let Some(cookies) = self.load_raw(username).await? else {
            return Ok(None);
        };

        if !cookies.is_fresh_at(now) {
            debug!(username, "Cached session is stale");
            return Err(LinkedinError::SessionExpired);
        }

        Ok(Some(cookies))
    }

    /// Load a record without checking freshness.
    ///
    /// Unreadable or corrupted records are logged and reported as absent.
    pub async fn load_raw(&self, username: &str) -> Result<Option<CookieSet>> {
        let path = self.record_path(username);
        let content = match tokio::fs::read(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Ignoring unreadable cookie record");
                return Ok(None);
            }
        };

        match serde_json::from_slice::<CookieSet>(&content) {
            Ok(cookies) => Ok(Some(cookies)),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Ignoring corrupted cookie record");
                Ok(None)
            }
        }
    }

    /// Write `cookies` to a timestamped backup record, returning its path.
    pub async fn backup(
        &self,
        cookies: &CookieSet,
        username: &str,
        at: DateTime<Utc>,
    ) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.backup_path(username, at);
        tokio::fs::write(&path, serde_json::to_vec_pretty(cookies)?)
            .await?;
        debug!(path = %path.display(), "Backed up cookies");
        Ok(path)
    }
}
