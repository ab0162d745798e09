use reqwest;
use serde::de::DeserializeOwned;
use std::path::Path;

use crate::error::{Error, Result};
use crate::export;
use crate::freshness::{ClientCache, Freshness};
use crate::types::{DrawRecord, MinRecord, Resource, VersionInfo};
use crate::validate;

pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug)]
pub enum SyncOutcome {
    UpToDate {
        latest_draw_no: u32,
    },
    Refreshed {
        previous: Option<u32>,
        version: VersionInfo,
        all_min: Vec<MinRecord>,
        all_full: Vec<DrawRecord>,
    },
}

impl ApiClient {
    /// `base_url` is the versioned prefix, e.g. `https://host/api/v1`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    pub fn url(&self, resource: Resource) -> String {
        format!("{}/{}", self.base_url, resource.file_name())
    }

    async fn fetch<T: DeserializeOwned>(&self, resource: Resource) -> Result<T> {
        let response = self
            .client
            .get(self.url(resource))
            .send()
            .await?
            .error_for_status()?;
        let body: T = response.json().await?;
        Ok(body)
    }

    pub async fn fetch_version(&self) -> Result<VersionInfo> {
        self.fetch(Resource::Version).await
    }

    pub async fn fetch_latest(&self) -> Result<DrawRecord> {
        self.fetch(Resource::Latest).await
    }

    pub async fn fetch_all_min(&self) -> Result<Vec<MinRecord>> {
        self.fetch(Resource::AllMin).await
    }

    pub async fn fetch_all_full(&self) -> Result<Vec<DrawRecord>> {
        self.fetch(Resource::AllFull).await
    }

    /// One small request: is the cached state behind the published one?
    pub async fn check(&self, cached: Option<u32>) -> Result<(VersionInfo, Freshness)> {
        let version = self.fetch_version().await?;
        let freshness = Freshness::evaluate(cached, &version);
        tracing::info!(
            cached = ?cached,
            remote = version.latest_draw_no,
            stale = freshness.is_stale(),
            "checked published version"
        );
        Ok((version, freshness))
    }

    /// Re-fetches both histories when stale and records the new head in the
    /// cache file. The cache is only written after the downloaded histories
    /// agree with the version document.
    pub async fn sync(&self, cache_path: &Path) -> Result<SyncOutcome> {
        let mut cache = ClientCache::load(cache_path)?;
        let (version, freshness) = self.check(cache.latest_draw_no).await?;

        let Freshness::Stale { cached, .. } = freshness else {
            return Ok(SyncOutcome::UpToDate {
                latest_draw_no: version.latest_draw_no,
            });
        };

        println!("📥 New draws published, fetching full history...");
        let all_min = self.fetch_all_min().await?;
        let all_full = self.fetch_all_full().await?;

        let mut violations = validate::validate_parts(None, &all_min, &all_full, &version);
        let version = if violations.is_empty() {
            version
        } else {
            // Histories are replaced before version.json, so a publish that
            // landed mid-download leaves them ahead of the version we read.
            let current = self.fetch_version().await?;
            if current != version {
                tracing::info!(
                    before = version.latest_draw_no,
                    after = current.latest_draw_no,
                    "version changed during download, revalidating"
                );
                violations = validate::validate_parts(None, &all_min, &all_full, &current);
            }
            current
        };
        if !violations.is_empty() {
            for violation in &violations {
                tracing::warn!(%violation, "downloaded history is inconsistent");
            }
            return Err(Error::Validation(violations));
        }

        cache.record(&version, export::local_now().to_rfc3339());
        cache.save(cache_path)?;
        println!(
            "✓ Synced {} draws (latest: 第{}回 {})",
            all_full.len(),
            version.latest_draw_no,
            version.latest_date
        );

        Ok(SyncOutcome::Refreshed {
            previous: cached,
            version,
            all_min,
            all_full,
        })
    }
}
