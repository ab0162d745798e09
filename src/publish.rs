use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::export::Snapshot;
use crate::types::Resource;
use crate::validate;

#[derive(Debug, Clone, Copy, Default)]
pub struct PublishOptions {
    /// Write the two histories without whitespace.
    pub compact: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedFile {
    pub resource: Resource,
    pub path: PathBuf,
    pub bytes: u64,
}

#[derive(Debug, Clone)]
pub struct PublishReport {
    pub version: String,
    pub latest_draw_no: u32,
    pub latest_date: String,
    pub files: Vec<PublishedFile>,
}

pub fn render(snapshot: &Snapshot, resource: Resource, options: &PublishOptions) -> Result<Vec<u8>> {
    let compact = options.compact && resource.is_history();
    let bytes = match (resource, compact) {
        (Resource::Latest, _) => serde_json::to_vec_pretty(&snapshot.latest)?,
        (Resource::Version, _) => serde_json::to_vec_pretty(&snapshot.version)?,
        (Resource::AllMin, false) => serde_json::to_vec_pretty(&snapshot.all_min)?,
        (Resource::AllMin, true) => serde_json::to_vec(&snapshot.all_min)?,
        (Resource::AllFull, false) => serde_json::to_vec_pretty(&snapshot.all_full)?,
        (Resource::AllFull, true) => serde_json::to_vec(&snapshot.all_full)?,
    };
    Ok(bytes)
}

fn write_synced(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut file = File::create(path)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    Ok(())
}

/// Writes the snapshot into `dir`, replacing the previous files.
///
/// All four files are staged first; they are then renamed into place with
/// `version.json` last, so a reader that sees a new version always finds
/// histories at least as new. Snapshots with violations are refused.
pub fn publish(snapshot: &Snapshot, dir: &Path, options: &PublishOptions) -> Result<PublishReport> {
    let violations = validate::validate_snapshot(snapshot);
    if !violations.is_empty() {
        for violation in &violations {
            tracing::error!(%violation, "refusing to publish");
        }
        return Err(Error::Validation(violations));
    }

    fs::create_dir_all(dir)?;
    let staging = dir.join(format!(".staging-{}", std::process::id()));
    if staging.exists() {
        fs::remove_dir_all(&staging)?;
    }
    fs::create_dir(&staging)?;

    let result = stage_and_swap(snapshot, dir, &staging, options);
    if let Err(e) = fs::remove_dir_all(&staging) {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(path = %staging.display(), error = %e, "failed to remove staging directory");
        }
    }
    let files = result?;

    tracing::info!(
        version = %snapshot.version.version,
        latest_draw_no = snapshot.version.latest_draw_no,
        total_records = snapshot.version.total_records,
        dir = %dir.display(),
        "published snapshot"
    );

    Ok(PublishReport {
        version: snapshot.version.version.clone(),
        latest_draw_no: snapshot.version.latest_draw_no,
        latest_date: snapshot.version.latest_date.clone(),
        files,
    })
}

fn stage_and_swap(
    snapshot: &Snapshot,
    dir: &Path,
    staging: &Path,
    options: &PublishOptions,
) -> Result<Vec<PublishedFile>> {
    let mut staged = Vec::with_capacity(Resource::ALL.len());
    for resource in Resource::ALL {
        let bytes = render(snapshot, resource, options)?;
        let path = staging.join(resource.file_name());
        write_synced(&path, &bytes)?;
        staged.push((resource, path, bytes.len() as u64));
    }

    let mut files = Vec::with_capacity(staged.len());
    for (resource, staged_path, bytes) in staged {
        let target = dir.join(resource.file_name());
        fs::rename(&staged_path, &target)?;
        tracing::debug!(file = %target.display(), bytes, "replaced");
        files.push(PublishedFile {
            resource,
            path: target,
            bytes,
        });
    }
    Ok(files)
}
