//! Client-side change detection.
//!
//! A client keeps the `latest_draw_no` it last synced. Comparing it against a
//! freshly fetched `version.json` tells whether the full histories must be
//! downloaded again. There is no incremental endpoint: stale means re-fetch
//! both histories in full.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use crate::error::{Error, Result};
use crate::types::VersionInfo;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    Fresh,
    Stale { cached: Option<u32>, remote: u32 },
}

impl Freshness {
    pub fn evaluate(cached: Option<u32>, remote: &VersionInfo) -> Self {
        match cached {
            Some(cached) if remote.latest_draw_no <= cached => {
                if remote.latest_draw_no < cached {
                    tracing::warn!(
                        cached,
                        remote = remote.latest_draw_no,
                        "published draw number went backwards; keeping cached data"
                    );
                }
                Freshness::Fresh
            }
            cached => Freshness::Stale {
                cached,
                remote: remote.latest_draw_no,
            },
        }
    }

    pub fn is_stale(&self) -> bool {
        matches!(self, Freshness::Stale { .. })
    }
}

/// What the client remembers between runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientCache {
    pub latest_draw_no: Option<u32>,
    pub version: Option<String>,
    pub total_records: Option<usize>,
    pub synced_at: Option<String>,
}

impl ClientCache {
    /// A missing cache file means nothing has been synced yet.
    pub fn load(path: &Path) -> Result<Self> {
        match fs::read(path) {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|source| Error::Json {
                path: path.to_path_buf(),
                source,
            }),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(ClientCache::default()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(self)?)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }

    pub fn freshness(&self, remote: &VersionInfo) -> Freshness {
        Freshness::evaluate(self.latest_draw_no, remote)
    }

    pub fn record(&mut self, version: &VersionInfo, synced_at: String) {
        self.latest_draw_no = Some(version.latest_draw_no);
        self.version = Some(version.version.clone());
        self.total_records = Some(version.total_records);
        self.synced_at = Some(synced_at);
    }
}
