use crate::config::UploadConfig;
use anyhow::{Context, Result};
use chrono::Utc;
use std::path::PathBuf;
use tracing::{debug, instrument};
use uuid::Uuid;

/// Filesystem store for uploaded recipe images
pub struct UploadStore {
    dir: PathBuf,
    url_prefix: String,
}

impl UploadStore {
    /// Create a new upload store for the configured directory
    pub fn new(config: &UploadConfig) -> Self {
        Self {
            dir: config.dir.clone(),
            url_prefix: config.url_prefix.trim_end_matches('/').to_string(),
        }
    }

    /// Directory uploaded files are written to
    pub fn dir(&self) -> &PathBuf {
        &self.dir
    }

    /// URL prefix the directory is served under
    pub fn url_prefix(&self) -> &str {
        &self.url_prefix
    }

    /// Store one uploaded file and return the URL path it is served under.
    ///
    /// The stored name is `<timestamp_millis>-<sanitized original name>`; the
    /// timestamp guards against collisions between successive uploads. The
    /// client-supplied name is never trusted as a path.
    #[instrument(skip(self, data), fields(size_bytes = data.len()))]
    pub async fn store(&self, original_name: Option<&str>, data: &[u8]) -> Result<String> {
        // Idempotent, created on first use
        tokio::fs::create_dir_all(&self.dir)
            .await
            .context("Failed to create upload directory")?;

        let stored_name = format!(
            "{}-{}",
            Utc::now().timestamp_millis(),
            stored_file_name(original_name)
        );

        let path = self.dir.join(&stored_name);
        tokio::fs::write(&path, data)
            .await
            .with_context(|| format!("Failed to write upload {}", path.display()))?;

        debug!(path = %path.display(), "Upload written");

        metrics::counter!("uploads.stored").increment(1);

        Ok(format!("{}/{}", self.url_prefix, stored_name))
    }
}

/// Reduce a client-supplied filename to a safe single path component.
///
/// Only the final component is kept, disallowed characters become `_`, and a
/// name that sanitizes away entirely is replaced by a generated identifier
/// carrying the original extension.
fn stored_file_name(original: Option<&str>) -> String {
    let original = original.unwrap_or_default();
    let last = original
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default();

    let sanitized: String = last
        .chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' | '.' => c,
            _ => '_',
        })
        .collect();
    // Leading dots would produce hidden files
    let sanitized = sanitized.trim_start_matches(['.', '_']);

    if !sanitized.is_empty() {
        sanitized.to_string()
    } else {
        // Nothing usable survived; keep only a sanitized extension if any
        let ext: String = last
            .rsplit('.')
            .next()
            .unwrap_or_default()
            .chars()
            .filter(char::is_ascii_alphanumeric)
            .collect();

        if ext.is_empty() {
            Uuid::new_v4().simple().to_string()
        } else {
            format!("{}.{}", Uuid::new_v4().simple(), ext)
        }
    }
}
