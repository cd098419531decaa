//! "My Documents" files and folders

use super::http::{Envelope, PortalApi, ensure_success, read_json};
use crate::clock::{Clock, TokioClock};
use crate::error::Result;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Entries requested per listing page.
pub const PAGE_SIZE: usize = 100;

/// A file or folder as returned by the files API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub id: u64,
    #[serde(default)]
    pub title: String,
}

/// Everything stored directly in "My Documents".
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Contents {
    #[serde(default)]
    pub files: Vec<Entry>,
    #[serde(default)]
    pub folders: Vec<Entry>,
}

/// Retry and pacing of destructive calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub backoff: Duration,
    /// Pause after each file removed by [`FilesApi::purge_files`].
    pub purge_pause: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff: Duration::from_secs(1),
            purge_pause: Duration::from_millis(500),
        }
    }
}

pub struct FilesApi<C: Clock = TokioClock> {
    api: PortalApi,
    clock: C,
    policy: RetryPolicy,
}

impl FilesApi {
    #[must_use]
    pub fn new(api: PortalApi) -> Self {
        Self::with_clock(api, TokioClock)
    }
}

impl<C: Clock> FilesApi<C> {
    #[must_use]
    pub fn with_clock(api: PortalApi, clock: C) -> Self {
        Self {
            api,
            clock,
            policy: RetryPolicy::default(),
        }
    }

    #[must_use]
    pub const fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// List all of "My Documents", one page of [`PAGE_SIZE`] at a time
    ///
    /// # Errors
    ///
    /// Returns an error on any non-2xx page.
    pub async fn list_my_documents(&self) -> Result<Contents> {
        let mut all = Contents::default();
        let mut start_index = 0;

        loop {
            let response = self
                .api
                .get("files/@my")
                .query(&[("startIndex", start_index), ("count", PAGE_SIZE)])
                .send()
                .await?;
            let page: Envelope<Contents> =
                read_json(response, "Failed to fetch content of My Documents").await?;

            let page_files = page.response.files.len();
            all.files.extend(page.response.files);
            all.folders.extend(page.response.folders);

            if page_files < PAGE_SIZE {
                break;
            }
            start_index += PAGE_SIZE;
        }

        debug!(
            "My Documents: {} file(s), {} folder(s)",
            all.files.len(),
            all.folders.len()
        );
        Ok(all)
    }

    /// Create an empty `{name}.{extension}` in "My Documents"
    ///
    /// # Errors
    ///
    /// Returns an error if the API rejects the request.
    pub async fn create_file(&self, name: &str, extension: &str) -> Result<Entry> {
        let response = self
            .api
            .post("files/@my/file")
            .json(&json!({ "title": format!("{name}.{extension}") }))
            .send()
            .await?;
        let created: Envelope<Entry> = read_json(response, "Failed to create file").await?;

        info!("File created: {} ({})", created.response.title, created.response.id);
        Ok(created.response)
    }

    /// Delete a file immediately, retrying on failure
    ///
    /// # Errors
    ///
    /// Returns the last error once every attempt has failed.
    pub async fn delete_file(&self, id: u64) -> Result<()> {
        let mut attempt = 1;
        loop {
            match self.delete_file_once(id).await {
                Ok(()) => {
                    debug!("File {} deleted", id);
                    return Ok(());
                }
                Err(e) if attempt < self.policy.attempts => {
                    warn!("Attempt {}: failed to delete file {}: {}", attempt, id, e);
                    attempt += 1;
                    self.clock.sleep(self.policy.backoff).await;
                }
                Err(e) => {
                    warn!("Attempt {}: failed to delete file {}: {}", attempt, id, e);
                    return Err(e);
                }
            }
        }
    }

    async fn delete_file_once(&self, id: u64) -> Result<()> {
        let response = self
            .api
            .delete(&format!("files/file/{id}"))
            .json(&json!({ "Immediately": true }))
            .send()
            .await?;
        ensure_success(response, "Failed to delete file").await?;
        Ok(())
    }

    /// Delete a folder immediately
    ///
    /// # Errors
    ///
    /// Returns an error if the API rejects the request.
    pub async fn delete_folder(&self, id: u64) -> Result<()> {
        let response = self
            .api
            .delete(&format!("files/folder/{id}"))
            .json(&json!({ "Immediately": true }))
            .send()
            .await?;
        ensure_success(response, "Failed to delete folder").await?;
        debug!("Folder {} deleted", id);
        Ok(())
    }

    /// Delete every file in "My Documents"
    ///
    /// Individual failures are logged and skipped. Returns how many
    /// files were removed.
    ///
    /// # Errors
    ///
    /// Returns an error only if the listing fails.
    pub async fn purge_files(&self) -> Result<usize> {
        let contents = self.list_my_documents().await?;
        debug!("Deleting {} file(s)", contents.files.len());

        let mut deleted = 0;
        for file in &contents.files {
            match self.delete_file(file.id).await {
                Ok(()) => {
                    deleted += 1;
                    self.clock.sleep(self.policy.purge_pause).await;
                }
                Err(e) => warn!("Giving up on file {}: {}", file.id, e),
            }
        }
        Ok(deleted)
    }

    /// Delete every folder in "My Documents"
    ///
    /// # Errors
    ///
    /// Returns an error only if the listing fails.
    pub async fn purge_folders(&self) -> Result<usize> {
        let contents = self.list_my_documents().await?;
        debug!("Deleting {} folder(s)", contents.folders.len());

        let mut deleted = 0;
        for folder in &contents.folders {
            match self.delete_folder(folder.id).await {
                Ok(()) => deleted += 1,
                Err(e) => warn!("Failed to delete folder {}: {}", folder.id, e),
            }
        }
        Ok(deleted)
    }
}
