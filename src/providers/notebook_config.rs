//! Notebook Config Client
//!
//! The list of runnable notebooks lives in a remote JSON document. It is
//! fetched on demand and kept for `config_ttl`; lookups inside the TTL never
//! touch the network. Failed fetches are not cached.
//!
//! Config shape (only `type == "notebook"` items are considered):
//! ```json
//! [{"type": "notebook", "id": "ndvi", "file": "https://.../ndvi.ipynb",
//!   "inputSpec": {"cog_url": "string", "bbox": "bbox"}}]
//! ```

use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use crate::models::config::ServiceConfig;
use crate::models::errors::{AppError, AppResult, ErrorCode};
use crate::models::types::NotebookEntry;
use crate::utils::cache::{CacheStats, TtlCache};

pub struct NotebookConfigClient {
    client: reqwest::Client,
    config_url: String,
    template_dir: PathBuf,
    cache: TtlCache<Arc<Vec<NotebookEntry>>>,
}

impl NotebookConfigClient {
    pub fn new(client: reqwest::Client, config: &ServiceConfig) -> Self {
        Self {
            client,
            config_url: config.notebook_config_url.clone(),
            template_dir: config.notebook_template_dir.clone(),
            cache: TtlCache::new("notebook_config", config.config_ttl),
        }
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn cleanup_cache(&self) -> usize {
        self.cache.cleanup_expired()
    }

    /// All notebook entries, from cache when fresh
    pub async fn list_notebooks(&self) -> AppResult<Arc<Vec<NotebookEntry>>> {
        if let Some(entries) = self.cache.get(&self.config_url) {
            return Ok(entries);
        }

        let entries = Arc::new(self.fetch_config().await?);
        self.cache.set(&self.config_url, entries.clone());
        Ok(entries)
    }

    /// Look up one notebook by id
    pub async fn get_notebook_config(&self, notebook_id: &str) -> AppResult<NotebookEntry> {
        let entries = self.list_notebooks().await?;
        entries
            .iter()
            .find(|nb| nb.is_notebook() && nb.id.as_deref() == Some(notebook_id))
            .cloned()
            .ok_or_else(|| AppError::notebook_not_found(notebook_id))
    }

    async fn fetch_config(&self) -> AppResult<Vec<NotebookEntry>> {
        info!("🔍 Fetching notebook config from {}", self.config_url);

        let response = self
            .client
            .get(&self.config_url)
            .send()
            .await
            .map_err(|e| fetch_error(ErrorCode::ConfigFetchFailed, &self.config_url, e))?;

        if !response.status().is_success() {
            return Err(AppError::config_fetch_failed(format!(
                "Notebook config returned HTTP {}",
                response.status()
            )));
        }

        let raw: Value = response
            .json()
            .await
            .map_err(|e| AppError::new(ErrorCode::ConfigInvalid, format!("Notebook config is not JSON: {}", e)))?;

        let entries = parse_config(raw)?;
        info!("📊 Notebook config: {} entries", entries.len());
        Ok(entries)
    }

    /// Load the notebook document an entry points at
    pub async fn fetch_notebook(&self, entry: &NotebookEntry) -> AppResult<Value> {
        let file = entry.file.as_deref().ok_or_else(|| {
            AppError::new(
                ErrorCode::ConfigInvalid,
                format!("Notebook '{}' has no file", entry.id.as_deref().unwrap_or("?")),
            )
        })?;

        if file.starts_with("http://") || file.starts_with("https://") {
            self.fetch_remote_notebook(file).await
        } else {
            let path = resolve_local(&self.template_dir, file);
            read_local_notebook(&path).await
        }
    }

    async fn fetch_remote_notebook(&self, url: &str) -> AppResult<Value> {
        info!("📥 Fetching notebook {}", url);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| fetch_error(ErrorCode::NotebookFetchFailed, url, e))?;

        if !response.status().is_success() {
            return Err(AppError::notebook_fetch_failed(format!(
                "{} returned HTTP {}",
                url,
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::notebook_invalid(format!("{} is not a notebook: {}", url, e)))
    }
}

/// Keep object items, skip anything that is not a well-formed entry
pub fn parse_config(raw: Value) -> AppResult<Vec<NotebookEntry>> {
    let items = match raw {
        Value::Array(items) => items,
        _ => {
            return Err(AppError::new(
                ErrorCode::ConfigInvalid,
                "Notebook config must be a JSON array",
            ))
        }
    };

    Ok(items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<NotebookEntry>(item) {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("⚠️ Skipping malformed config item: {}", e);
                None
            }
        })
        .collect())
}

fn resolve_local(template_dir: &Path, file: &str) -> PathBuf {
    let path = Path::new(file);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        template_dir.join(path)
    }
}

/// Read and parse an `.ipynb` from disk
pub async fn read_local_notebook(path: &Path) -> AppResult<Value> {
    let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
        AppError::with_source(
            ErrorCode::NotebookFetchFailed,
            format!("Cannot read notebook {}", path.display()),
            e,
        )
    })?;
    serde_json::from_str(&raw)
        .map_err(|e| AppError::notebook_invalid(format!("{} is not a notebook: {}", path.display(), e)))
}

fn fetch_error(code: ErrorCode, url: &str, err: reqwest::Error) -> AppError {
    if err.is_timeout() {
        AppError::new(ErrorCode::ExternalTimeout, format!("Timed out fetching {}", url))
    } else {
        AppError::new(code, format!("Failed to fetch {}: {}", url, err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_config_skips_malformed() {
        let raw = json!([
            {"type": "notebook", "id": "a", "file": "a.ipynb"},
            "not an object",
            {"type": "dataset", "id": "b"}
        ]);
        let entries = parse_config(raw).unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries[0].is_notebook());
        assert!(!entries[1].is_notebook());
    }

    #[test]
    fn test_parse_config_rejects_object() {
        let err = parse_config(json!({"notebooks": []})).unwrap_err();
        assert_eq!(err.code, ErrorCode::ConfigInvalid);
    }

    #[test]
    fn test_resolve_local() {
        let dir = Path::new("/srv/templates");
        assert_eq!(resolve_local(dir, "ndvi.ipynb"), PathBuf::from("/srv/templates/ndvi.ipynb"));
        assert_eq!(resolve_local(dir, "/abs/x.ipynb"), PathBuf::from("/abs/x.ipynb"));
    }
}
