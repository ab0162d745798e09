pub mod api;
pub mod config;
pub mod database;
pub mod error;
pub mod export;
pub mod freshness;
pub mod git;
pub mod lock;
pub mod pipeline;
pub mod publish;
pub mod server;
pub mod types;
pub mod utils;
pub mod validate;

pub use api::{ApiClient, SyncOutcome};
pub use error::{Error, Result};
pub use export::{SCHEMA_VERSION, Snapshot};
pub use freshness::{ClientCache, Freshness};
pub use publish::{PublishOptions, PublishReport, publish};
pub use types::*;
pub use validate::{Violation, ViolationCode, validate_snapshot};
