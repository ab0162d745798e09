use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::{Error, Result};
use crate::publish::PublishReport;

fn run_git(repo: &Path, args: &[&str]) -> Result<String> {
    let output = Command::new("git").args(args).current_dir(repo).output()?;
    if !output.status.success() {
        return Err(Error::Git {
            command: args.join(" "),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

pub fn commit_message(report: &PublishReport) -> String {
    format!(
        "Update Numbers4 data: draw {} ({})",
        report.latest_draw_no, report.latest_date
    )
}

/// Top level of the work tree containing `dir`.
pub fn repo_root(dir: &Path) -> Result<PathBuf> {
    run_git(dir, &["rev-parse", "--show-toplevel"]).map(PathBuf::from)
}

/// Stages the published files and commits them.
///
/// Returns the short hash of the new commit, or `None` when the files were
/// already committed as they are.
pub fn commit_published(report: &PublishReport) -> Result<Option<String>> {
    let Some(first) = report.files.first() else {
        return Ok(None);
    };
    let first = fs::canonicalize(&first.path)?;
    let repo = repo_root(first.parent().unwrap_or(Path::new("/")))?;

    let mut add = vec!["add".to_string(), "--".to_string()];
    for file in &report.files {
        add.push(fs::canonicalize(&file.path)?.display().to_string());
    }
    let add_args: Vec<&str> = add.iter().map(String::as_str).collect();
    run_git(&repo, &add_args)?;

    let staged = Command::new("git")
        .args(["diff", "--cached", "--quiet"])
        .current_dir(&repo)
        .status()?;
    // Exit code 0 means nothing is staged.
    if staged.success() {
        tracing::info!("published files unchanged; nothing to commit");
        return Ok(None);
    }

    run_git(&repo, &["commit", "-m", &commit_message(report)])?;
    let hash = run_git(&repo, &["rev-parse", "--short", "HEAD"])?;
    tracing::info!(commit = %hash, "committed published files");
    Ok(Some(hash))
}

pub fn push(repo: &Path) -> Result<()> {
    run_git(repo, &["push"])?;
    tracing::info!(repo = %repo.display(), "pushed");
    Ok(())
}
