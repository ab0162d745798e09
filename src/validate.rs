//! Consistency checks over the published views.
//!
//! Checks never stop at the first problem; every violation found is returned
//! so an operator sees the whole picture from one run.

use chrono::DateTime;
use serde::de::DeserializeOwned;
use std::fmt;
use std::fs;
use std::path::Path;

use crate::error::{Error, Result};
use crate::export::Snapshot;
use crate::types::{DrawRecord, MinRecord, Resource, VersionInfo};
use crate::utils;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViolationCode {
    EmptyHistory,
    DigitOutOfRange,
    BadWinningNumber,
    DigitMismatch,
    DateFormat,
    DateOrder,
    DrawSequence,
    LengthMismatch,
    KeyMismatch,
    LatestMismatch,
    VersionMismatch,
    EmptyVersionToken,
    BadTimestamp,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub code: ViolationCode,
    pub message: String,
}

impl Violation {
    fn new(code: ViolationCode, message: impl Into<String>) -> Self {
        Violation {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.code, self.message)
    }
}

pub fn validate_snapshot(snapshot: &Snapshot) -> Vec<Violation> {
    validate_parts(
        Some(&snapshot.latest),
        &snapshot.all_min,
        &snapshot.all_full,
        &snapshot.version,
    )
}

/// Validates histories against a version document. `latest` is optional so
/// that clients which only downloaded the histories can reuse the checks.
pub fn validate_parts(
    latest: Option<&DrawRecord>,
    all_min: &[MinRecord],
    all_full: &[DrawRecord],
    version: &VersionInfo,
) -> Vec<Violation> {
    use ViolationCode::*;

    let mut violations = Vec::new();

    for record in all_full {
        check_record(record, &mut violations);
    }

    if let Some((index, record)) = all_full
        .iter()
        .enumerate()
        .find(|(index, record)| record.draw_no as usize != index + 1)
    {
        violations.push(Violation::new(
            DrawSequence,
            format!(
                "position {} holds draw {}, expected draw {}",
                index,
                record.draw_no,
                index + 1
            ),
        ));
    }

    if let Some(pair) = all_full.windows(2).find(|pair| pair[1].date < pair[0].date) {
        violations.push(Violation::new(
            DateOrder,
            format!(
                "draw {} ({}) is dated before draw {} ({})",
                pair[1].draw_no, pair[1].date, pair[0].draw_no, pair[0].date
            ),
        ));
    }

    if all_min.len() != all_full.len() {
        violations.push(Violation::new(
            LengthMismatch,
            format!(
                "all_min has {} records, all_full has {}",
                all_min.len(),
                all_full.len()
            ),
        ));
    }
    for (min, full) in all_min.iter().zip(all_full) {
        if *min != MinRecord::from(full) {
            violations.push(Violation::new(
                KeyMismatch,
                format!(
                    "all_min draw {} differs from all_full draw {}",
                    min.draw_no, full.draw_no
                ),
            ));
        }
    }

    if version.total_records != all_full.len() || version.total_records != all_min.len() {
        violations.push(Violation::new(
            LengthMismatch,
            format!(
                "version.total_records is {}, histories hold {} (min) and {} (full)",
                version.total_records,
                all_min.len(),
                all_full.len()
            ),
        ));
    }

    if version.version.trim().is_empty() {
        violations.push(Violation::new(EmptyVersionToken, "version token is empty"));
    }
    if DateTime::parse_from_rfc3339(&version.last_update).is_err() {
        violations.push(Violation::new(
            BadTimestamp,
            format!("last_update {:?} is not RFC 3339", version.last_update),
        ));
    }

    let Some(last) = all_full.last() else {
        violations.push(Violation::new(EmptyHistory, "all_full is empty"));
        return violations;
    };

    if version.latest_draw_no != last.draw_no || version.latest_date != last.date {
        violations.push(Violation::new(
            VersionMismatch,
            format!(
                "version points at draw {} ({}), history ends at draw {} ({})",
                version.latest_draw_no, version.latest_date, last.draw_no, last.date
            ),
        ));
    }

    if let Some(latest) = latest {
        if latest != last {
            violations.push(Violation::new(
                LatestMismatch,
                format!(
                    "latest is draw {}, history ends at draw {}",
                    latest.draw_no, last.draw_no
                ),
            ));
        }
        if latest.draw_no != version.latest_draw_no {
            violations.push(Violation::new(
                VersionMismatch,
                format!(
                    "latest is draw {}, version.latest_draw_no is {}",
                    latest.draw_no, version.latest_draw_no
                ),
            ));
        }
    }

    violations
}

fn check_record(record: &DrawRecord, violations: &mut Vec<Violation>) {
    use ViolationCode::*;

    let draw_no = record.draw_no;
    if record.digits.iter().any(|d| *d > 9) {
        violations.push(Violation::new(
            DigitOutOfRange,
            format!("draw {draw_no}: digits {:?}", record.digits),
        ));
    }
    if utils::digits_from_winning_number(&record.winning_number).is_none() {
        violations.push(Violation::new(
            BadWinningNumber,
            format!(
                "draw {draw_no}: winning number {:?} is not four digits",
                record.winning_number
            ),
        ));
    } else if utils::winning_number_from_digits(&record.digits) != record.winning_number {
        violations.push(Violation::new(
            DigitMismatch,
            format!(
                "draw {draw_no}: digits {:?} do not spell {}",
                record.digits, record.winning_number
            ),
        ));
    }
    if !utils::is_iso_date(&record.date) {
        violations.push(Violation::new(
            DateFormat,
            format!("draw {draw_no}: date {:?}", record.date),
        ));
    }
}

fn read_resource<T: DeserializeOwned>(dir: &Path, resource: Resource) -> Result<T> {
    let path = dir.join(resource.file_name());
    let bytes = fs::read(&path)?;
    serde_json::from_slice(&bytes).map_err(|source| Error::Json { path, source })
}

/// Parses the four published files in `dir`.
pub fn load_snapshot(dir: &Path) -> Result<Snapshot> {
    Ok(Snapshot {
        latest: read_resource(dir, Resource::Latest)?,
        all_min: read_resource(dir, Resource::AllMin)?,
        all_full: read_resource(dir, Resource::AllFull)?,
        version: read_resource(dir, Resource::Version)?,
    })
}

pub fn load_version(dir: &Path) -> Result<VersionInfo> {
    read_resource(dir, Resource::Version)
}

pub fn validate_dir(dir: &Path) -> Result<Vec<Violation>> {
    let snapshot = load_snapshot(dir)?;
    Ok(validate_snapshot(&snapshot))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::tests::draw;
    use crate::export::Snapshot;
    use chrono::DateTime;
    use pretty_assertions::assert_eq;

    fn snapshot() -> Snapshot {
        let draws = vec![
            draw(1, "2025-12-03", "0427"),
            draw(2, "2025-12-04", "9051"),
            draw(3, "2025-12-05", "1234"),
        ];
        Snapshot::build(
            &draws,
            DateTime::parse_from_rfc3339("2025-12-05T20:15:00+09:00").unwrap(),
        )
        .unwrap()
    }

    fn codes(violations: &[Violation]) -> Vec<ViolationCode> {
        violations.iter().map(|v| v.code).collect()
    }

    #[test]
    fn built_snapshot_is_clean() {
        assert_eq!(validate_snapshot(&snapshot()), vec![]);
    }

    #[test]
    fn digit_mismatch_is_reported() {
        let mut snapshot = snapshot();
        snapshot.all_full[0].winning_number = "0428".to_string();
        assert_eq!(
            codes(&validate_snapshot(&snapshot)),
            vec![ViolationCode::DigitMismatch]
        );
    }

    #[test]
    fn digit_out_of_range_is_reported() {
        let mut snapshot = snapshot();
        snapshot.all_full[1].digits = [9, 0, 5, 11];
        snapshot.all_min[1].digits = [9, 0, 5, 11];
        let found = codes(&validate_snapshot(&snapshot));
        assert!(found.contains(&ViolationCode::DigitOutOfRange), "{found:?}");
    }

    #[test]
    fn backdated_draw_is_reported() {
        let mut snapshot = snapshot();
        for (index, date) in [(0, "2025-12-04"), (1, "2025-12-03")] {
            snapshot.all_full[index].date = date.to_string();
            snapshot.all_min[index].date = date.to_string();
        }
        assert_eq!(
            codes(&validate_snapshot(&snapshot)),
            vec![ViolationCode::DateOrder]
        );
    }

    #[test]
    fn malformed_date_is_reported() {
        let mut snapshot = snapshot();
        snapshot.all_full[0].date = "2025-12-00".to_string();
        snapshot.all_min[0].date = "2025-12-00".to_string();
        assert_eq!(
            codes(&validate_snapshot(&snapshot)),
            vec![ViolationCode::DateFormat]
        );

        snapshot.all_full[0].date = "2025/12/03".to_string();
        snapshot.all_min[0].date = "2025/12/03".to_string();
        let found = codes(&validate_snapshot(&snapshot));
        assert!(found.contains(&ViolationCode::DateFormat), "{found:?}");
    }

    #[test]
    fn non_numeric_winning_number_is_reported() {
        let mut snapshot = snapshot();
        snapshot.all_full[0].winning_number = "12a4".to_string();
        assert_eq!(
            codes(&validate_snapshot(&snapshot)),
            vec![ViolationCode::BadWinningNumber]
        );
    }

    #[test]
    fn gap_in_sequence_is_reported() {
        let mut snapshot = snapshot();
        snapshot.all_full.remove(1);
        snapshot.all_min.remove(1);
        snapshot.version.total_records = 2;
        assert_eq!(
            codes(&validate_snapshot(&snapshot)),
            vec![ViolationCode::DrawSequence]
        );
    }

    #[test]
    fn version_drift_is_reported() {
        let mut snapshot = snapshot();
        snapshot.version.latest_draw_no = 2;
        snapshot.version.total_records = 4;
        let found = codes(&validate_snapshot(&snapshot));
        assert_eq!(
            found,
            vec![
                ViolationCode::LengthMismatch,
                ViolationCode::VersionMismatch,
                ViolationCode::VersionMismatch
            ]
        );
    }

    #[test]
    fn stale_latest_is_reported() {
        let mut snapshot = snapshot();
        snapshot.latest = snapshot.all_full[1].clone();
        let found = codes(&validate_snapshot(&snapshot));
        assert_eq!(
            found,
            vec![ViolationCode::LatestMismatch, ViolationCode::VersionMismatch]
        );
    }

    #[test]
    fn histories_must_share_keys() {
        let mut snapshot = snapshot();
        snapshot.all_min[2].date = "2025-12-06".to_string();
        assert_eq!(
            codes(&validate_snapshot(&snapshot)),
            vec![ViolationCode::KeyMismatch]
        );

        snapshot.all_min.pop();
        let found = codes(&validate_snapshot(&snapshot));
        assert_eq!(
            found,
            vec![ViolationCode::LengthMismatch, ViolationCode::LengthMismatch]
        );
    }

    #[test]
    fn empty_history_and_bad_metadata() {
        let mut snapshot = snapshot();
        snapshot.version.version = String::new();
        snapshot.version.last_update = "yesterday".to_string();
        let found = codes(&validate_parts(None, &[], &[], &snapshot.version));
        assert_eq!(
            found,
            vec![
                ViolationCode::LengthMismatch,
                ViolationCode::EmptyVersionToken,
                ViolationCode::BadTimestamp,
                ViolationCode::EmptyHistory
            ]
        );
    }

    #[test]
    fn malformed_file_names_the_path() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("version.json"), b"{\"version\": ").unwrap();
        let err = load_version(dir.path()).unwrap_err();
        match err {
            Error::Json { path, .. } => assert!(path.ends_with("version.json")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(load_snapshot(dir.path()), Err(Error::Io(_))));
    }
}
