//! Derives the four published views from one ordered archive state.
//!
//! Every view is computed from the same slice in a single pass, so
//! `latest.json`, `version.json` and both histories can never disagree about
//! the head of the log.

use chrono::{DateTime, FixedOffset, Local, SecondsFormat};
use rusqlite::Connection;

use crate::database;
use crate::error::{Error, Result};
use crate::types::{DrawRecord, MinRecord, VersionInfo};
use crate::utils;

/// Version of the JSON shape, independent of the data it carries.
pub const SCHEMA_VERSION: &str = "1.0.0";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub latest: DrawRecord,
    pub all_min: Vec<MinRecord>,
    pub all_full: Vec<DrawRecord>,
    pub version: VersionInfo,
}

impl Snapshot {
    pub fn build(draws: &[DrawRecord], now: DateTime<FixedOffset>) -> Result<Self> {
        let mut all_full = draws.to_vec();
        all_full.sort_by_key(|draw| draw.draw_no);

        let latest = all_full.last().cloned().ok_or(Error::EmptyArchive)?;
        let all_min = all_full.iter().map(MinRecord::from).collect::<Vec<_>>();

        let version = VersionInfo {
            version: utils::version_token(&latest.date, latest.draw_no),
            schema: SCHEMA_VERSION.to_string(),
            last_update: now.to_rfc3339_opts(SecondsFormat::Secs, false),
            latest_draw_no: latest.draw_no,
            latest_date: latest.date.clone(),
            total_records: all_full.len(),
        };

        Ok(Snapshot {
            latest,
            all_min,
            all_full,
            version,
        })
    }

    pub fn from_database(conn: &Connection, now: DateTime<FixedOffset>) -> Result<Self> {
        let draws = database::get_all_draws(conn)?;
        Self::build(&draws, now)
    }
}

/// Export timestamp in the operator's local offset.
pub fn local_now() -> DateTime<FixedOffset> {
    Local::now().fixed_offset()
}
