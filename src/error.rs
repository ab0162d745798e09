use std::path::PathBuf;

use crate::validate::Violation;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid draw row ({context}): {reason}")]
    InvalidDraw { context: String, reason: String },

    #[error("draw sequence gap: expected draw {expected}, got {found}")]
    DrawGap { expected: u32, found: u32 },

    #[error("draw {draw_no} is dated {date}, before draw {previous_no} ({previous_date})")]
    DateRegression {
        draw_no: u32,
        date: String,
        previous_no: u32,
        previous_date: String,
    },

    #[error("draw {draw_no} is already published with different values")]
    ImmutableDraw { draw_no: u32 },

    #[error("archive is empty; nothing to export")]
    EmptyArchive,

    #[error("snapshot failed validation with {} violation(s)", .0.len())]
    Validation(Vec<Violation>),

    #[error("update already running (lock {path} held by pid {pid} since {started_at})")]
    AlreadyLocked {
        path: PathBuf,
        pid: u32,
        started_at: String,
    },

    #[error("git {command} failed: {stderr}")]
    Git { command: String, stderr: String },

    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    pub fn invalid_draw(context: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::InvalidDraw {
            context: context.into(),
            reason: reason.into(),
        }
    }
}
