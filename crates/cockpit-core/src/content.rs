//! Read-only access to the content repository (agent markdown and JSON
//! configuration) over plain HTTP GET.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use tokio::sync::RwLock;

use crate::config::ContentConfig;
use crate::error::{CockpitError, Result};

const SERVICE: &str = "content store";

/// A fetched document and when it was fetched.
#[derive(Debug, Clone, PartialEq)]
pub struct Fetched {
    pub body: String,
    pub fetched_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct CacheEntry {
    doc: Fetched,
    stored: Instant,
}

#[derive(Debug, Clone)]
pub struct ContentStore {
    http: reqwest::Client,
    base_url: String,
    cache_ttl: Duration,
    cache: Arc<RwLock<HashMap<String, CacheEntry>>>,
}

impl ContentStore {
    pub fn new(config: &ContentConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()?;
        Ok(Self {
            http,
            base_url: config.raw_base_url(),
            cache_ttl: Duration::from_secs(config.agent_cache_ttl_secs),
            cache: Arc::new(RwLock::new(HashMap::new())),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn url_for(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// GET `path`. `Ok(None)` on 404; any other non-2xx or transport
    /// failure is `UpstreamUnavailable`.
    pub async fn fetch_text(&self, path: &str) -> Result<Option<Fetched>> {
        let url = self.url_for(path);
        tracing::debug!(%url, "fetching content");

        let response = self.http.get(&url).send().await.map_err(|e| {
            CockpitError::UpstreamUnavailable {
                service: SERVICE,
                status: None,
                detail: format!("GET {url}: {e}"),
            }
        })?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(CockpitError::UpstreamUnavailable {
                service: SERVICE,
                status: Some(status.as_u16()),
                detail: format!("GET {url} returned {status}"),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| CockpitError::UpstreamUnavailable {
                service: SERVICE,
                status: Some(status.as_u16()),
                detail: format!("reading {url}: {e}"),
            })?;
        Ok(Some(Fetched {
            body,
            fetched_at: Utc::now(),
        }))
    }

    pub async fn fetch_json<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>> {
        match self.fetch_text(path).await? {
            Some(doc) => Ok(Some(serde_json::from_str(&doc.body)?)),
            None => Ok(None),
        }
    }

    /// Like [`fetch_text`](Self::fetch_text) but reuses a copy younger than
    /// the configured TTL. Misses (404) are never cached.
    pub async fn fetch_text_cached(&self, path: &str) -> Result<Option<Fetched>> {
        if self.cache_ttl.is_zero() {
            return self.fetch_text(path).await;
        }

        if let Some(entry) = self.cache.read().await.get(path) {
            if entry.stored.elapsed() < self.cache_ttl {
                tracing::debug!(path, "content cache hit");
                return Ok(Some(entry.doc.clone()));
            }
        }

        let fetched = self.fetch_text(path).await?;
        let mut cache = self.cache.write().await;
        match &fetched {
            Some(doc) => {
                cache.insert(
                    path.to_string(),
                    CacheEntry {
                        doc: doc.clone(),
                        stored: Instant::now(),
                    },
                );
            }
            None => {
                cache.remove(path);
            }
        }
        Ok(fetched)
    }
}
