//! The serialized update: ingest → export → validate → publish → git.

use rusqlite::Connection;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

use crate::database::{self, AppendSummary};
use crate::error::{Error, Result};
use crate::export::{self, Snapshot};
use crate::git;
use crate::lock::UpdateLock;
use crate::publish::{self, PublishOptions, PublishReport};
use crate::types::{DrawRecord, RawDraw};
use crate::validate;

#[derive(Debug, Clone)]
pub struct UpdateOptions {
    pub input_dir: PathBuf,
    pub database_path: PathBuf,
    pub out_dir: PathBuf,
    pub publish: PublishOptions,
    pub commit: bool,
    pub push: bool,
}

#[derive(Debug)]
pub struct UpdateSummary {
    pub ingest: AppendSummary,
    /// `None` when the archive did not change and the published files already
    /// describe it.
    pub published: Option<PublishReport>,
    pub commit: Option<String>,
}

/// Parses one generator file: a single raw row or an array of them.
pub fn parse_raw_draws(path: &Path, raw_json: &str) -> Result<Vec<DrawRecord>> {
    let value: Value = serde_json::from_str(raw_json).map_err(|source| Error::Json {
        path: path.to_path_buf(),
        source,
    })?;
    let rows: Vec<RawDraw> = match value {
        Value::Array(_) => serde_json::from_value(value),
        _ => serde_json::from_value(value).map(|row| vec![row]),
    }
    .map_err(|source| Error::Json {
        path: path.to_path_buf(),
        source,
    })?;

    rows.iter().map(RawDraw::normalize).collect()
}

/// Reads every `*.json` file in `dir`, in file-name order.
pub fn read_raw_dir(dir: &Path) -> Result<Vec<DrawRecord>> {
    let mut paths = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().and_then(|s| s.to_str()) == Some("json") {
            paths.push(path);
        }
    }
    paths.sort();

    let mut draws = Vec::new();
    for path in paths {
        let raw_json = fs::read_to_string(&path)?;
        let parsed = parse_raw_draws(&path, &raw_json)?;
        tracing::info!(file = %path.display(), draws = parsed.len(), "read generator output");
        draws.extend(parsed);
    }
    Ok(draws)
}

pub fn ingest_dir(conn: &mut Connection, dir: &Path) -> Result<AppendSummary> {
    let draws = read_raw_dir(dir)?;
    let summary = database::append_draws(conn, &draws)?;
    tracing::info!(
        appended = summary.appended,
        filled = summary.filled,
        unchanged = summary.unchanged,
        "ingested draws"
    );
    Ok(summary)
}

/// Seeds the archive from a published `numbers4_all_full.json`.
pub fn import_file(conn: &mut Connection, path: &Path) -> Result<usize> {
    let bytes = fs::read(path)?;
    let records: Vec<DrawRecord> = serde_json::from_slice(&bytes).map_err(|source| Error::Json {
        path: path.to_path_buf(),
        source,
    })?;
    let imported = database::import_published(conn, &records)?;
    tracing::info!(file = %path.display(), imported, "imported published history");
    Ok(imported)
}

pub fn export_to(conn: &Connection, out_dir: &Path, options: &PublishOptions) -> Result<PublishReport> {
    let snapshot = Snapshot::from_database(conn, export::local_now())?;
    publish::publish(&snapshot, out_dir, options)
}

/// True when `out_dir` already publishes exactly the archive's head.
fn already_published(conn: &Connection, out_dir: &Path) -> Result<bool> {
    if !out_dir.join("version.json").exists() {
        return Ok(false);
    }
    let version = match validate::load_version(out_dir) {
        Ok(version) => version,
        Err(e) => {
            tracing::warn!(error = %e, "existing version.json unreadable; republishing");
            return Ok(false);
        }
    };
    Ok(Some(version.latest_draw_no) == database::max_draw_no(conn)?
        && version.total_records == database::count_draws(conn)?)
}

pub fn run_update(options: &UpdateOptions) -> Result<UpdateSummary> {
    let _lock = UpdateLock::acquire(&options.database_path.with_extension("lock"))?;

    let mut conn = database::open_database(&options.database_path)?;
    let ingest = ingest_dir(&mut conn, &options.input_dir)?;

    if !ingest.changed() && already_published(&conn, &options.out_dir)? {
        tracing::info!("archive unchanged and already published; nothing to do");
        return Ok(UpdateSummary {
            ingest,
            published: None,
            commit: None,
        });
    }

    let report = export_to(&conn, &options.out_dir, &options.publish)?;

    let commit = if options.commit || options.push {
        let hash = git::commit_published(&report)?;
        if options.push {
            let repo = git::repo_root(&fs::canonicalize(&options.out_dir)?)?;
            git::push(&repo)?;
        }
        hash
    } else {
        None
    };

    Ok(UpdateSummary {
        ingest,
        published: Some(report),
        commit,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn write_json(path: &Path, value: Value) {
        fs::write(path, serde_json::to_vec_pretty(&value).unwrap()).unwrap();
    }

    fn options(root: &Path) -> UpdateOptions {
        UpdateOptions {
            input_dir: root.join("incoming"),
            database_path: root.join("data").join("numbers4.db"),
            out_dir: root.join("api").join("v1"),
            publish: PublishOptions::default(),
            commit: false,
            push: false,
        }
    }

    #[test]
    fn parses_single_row_and_arrays() {
        let path = Path::new("row.json");
        let single = parse_raw_draws(
            path,
            r#"{"draw": "第1回", "date": "1994/10/07", "winning_number": "8929"}"#,
        )
        .unwrap();
        assert_eq!(single.len(), 1);
        assert_eq!(single[0].digits, [8, 9, 2, 9]);

        let many = parse_raw_draws(
            path,
            r#"[{"draw": 1, "date": "1994-10-07", "winning_number": "8929"},
                {"draw": 2, "date": "1994-10-14", "winning_number": "0123"}]"#,
        )
        .unwrap();
        assert_eq!(many.len(), 2);

        assert!(matches!(
            parse_raw_draws(path, "[{"),
            Err(Error::Json { .. })
        ));
    }

    #[test]
    fn update_publishes_then_appends() {
        let root = tempfile::tempdir().unwrap();
        let options = options(root.path());
        fs::create_dir_all(&options.input_dir).unwrap();

        write_json(
            &options.input_dir.join("0001.json"),
            json!([
                {"回号": "第1回", "抽せん日": "1994/10/07", "当せん番号": "8929",
                 "straight_payout": "1,018,100円", "box_payout": "42,400円"},
                {"回号": "第2回", "抽せん日": "1994/10/14", "当せん番号": "0123"}
            ]),
        );

        let first = run_update(&options).unwrap();
        assert_eq!(first.ingest.appended, 2);
        let report = first.published.expect("first run publishes");
        assert_eq!(report.latest_draw_no, 2);
        assert_eq!(validate::validate_dir(&options.out_dir).unwrap(), vec![]);

        // Same input again: nothing changes and nothing is rewritten.
        let second = run_update(&options).unwrap();
        assert!(second.published.is_none());

        write_json(
            &options.input_dir.join("0002.json"),
            json!({"回号": "第3回", "抽せん日": "1994/10/21", "当せん番号": "4567"}),
        );
        let third = run_update(&options).unwrap();
        assert_eq!(third.ingest.appended, 1);

        let snapshot = validate::load_snapshot(&options.out_dir).unwrap();
        assert_eq!(snapshot.version.total_records, 3);
        assert_eq!(snapshot.latest.winning_number, "4567");
        assert_eq!(snapshot.all_full[0].prize.straight, Some(1_018_100));
        assert_eq!(snapshot.all_full[1].prize.straight, None);
        assert!(!options.database_path.with_extension("lock").exists());
    }

    #[test]
    fn gap_in_input_publishes_nothing() {
        let root = tempfile::tempdir().unwrap();
        let options = options(root.path());
        fs::create_dir_all(&options.input_dir).unwrap();
        write_json(
            &options.input_dir.join("rows.json"),
            json!({"draw": 2, "date": "1994-10-14", "winning_number": "0123"}),
        );

        let err = run_update(&options).unwrap_err();
        assert!(matches!(err, Error::DrawGap { expected: 1, found: 2 }));
        assert!(!options.out_dir.join("version.json").exists());
    }

    #[test]
    fn backdated_draw_is_refused_and_later_updates_recover() {
        let root = tempfile::tempdir().unwrap();
        let options = options(root.path());
        fs::create_dir_all(&options.input_dir).unwrap();
        let rows = options.input_dir.join("rows.json");
        write_json(
            &rows,
            json!([
                {"draw": 1, "date": "2025-12-05", "winning_number": "8929"},
                {"draw": 2, "date": "2025-12-01", "winning_number": "0123"}
            ]),
        );

        let err = run_update(&options).unwrap_err();
        assert!(matches!(err, Error::DateRegression { draw_no: 2, .. }), "{err}");
        let conn = database::open_database(&options.database_path).unwrap();
        assert_eq!(database::count_draws(&conn).unwrap(), 0);
        drop(conn);

        write_json(
            &rows,
            json!([
                {"draw": 1, "date": "2025-12-05", "winning_number": "8929"},
                {"draw": 2, "date": "2025-12-08", "winning_number": "0123"}
            ]),
        );
        let summary = run_update(&options).unwrap();
        assert_eq!(summary.ingest.appended, 2);
        assert_eq!(validate::validate_dir(&options.out_dir).unwrap(), vec![]);
    }

    #[test]
    fn concurrent_update_is_refused() {
        let root = tempfile::tempdir().unwrap();
        let options = options(root.path());
        fs::create_dir_all(&options.input_dir).unwrap();

        let _held = UpdateLock::acquire(&options.database_path.with_extension("lock")).unwrap();
        assert!(matches!(
            run_update(&options),
            Err(Error::AlreadyLocked { .. })
        ));
    }

    #[test]
    fn import_then_export_round_trips_published_history() {
        let root = tempfile::tempdir().unwrap();
        let source = root.path().join("numbers4_all_full.json");
        write_json(
            &source,
            json!([
                {"draw_no": 1, "date": "1994-10-07", "digits": [8, 9, 2, 9], "winning_number": "8929",
                 "prize": {"straight": 1018100, "box": 42400, "set_straight": 530000, "set_box": 21200}},
                {"draw_no": 2, "date": "1994-10-14", "digits": [0, 1, 2, 3], "winning_number": "0123",
                 "prize": {"straight": null, "box": null, "set_straight": null, "set_box": null}}
            ]),
        );

        let mut conn = database::open_database(&root.path().join("numbers4.db")).unwrap();
        assert_eq!(import_file(&mut conn, &source).unwrap(), 2);

        let out = root.path().join("out");
        let report = export_to(&conn, &out, &PublishOptions { compact: true }).unwrap();
        assert_eq!(report.files.len(), 4);

        let published: Vec<DrawRecord> =
            serde_json::from_slice(&fs::read(out.join("numbers4_all_full.json")).unwrap()).unwrap();
        let original: Vec<DrawRecord> =
            serde_json::from_slice(&fs::read(&source).unwrap()).unwrap();
        assert_eq!(published, original);
    }
}
