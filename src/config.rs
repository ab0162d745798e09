use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub database_path: PathBuf,
    pub api_dir: PathBuf,
    pub bind_addr: SocketAddr,
    pub base_url: String,
    pub cache_path: PathBuf,
    pub cache_max_age: u64,
    pub compact: bool,
}

pub fn load() -> Result<Config> {
    from_lookup(|key| env::var(key).ok())
}

pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Config> {
    let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

    Ok(Config {
        database_path: PathBuf::from(var("NUMBERS4_DB_PATH", "data/numbers4.db")),
        api_dir: PathBuf::from(var("NUMBERS4_API_DIR", "api/v1")),
        bind_addr: parse("NUMBERS4_BIND_ADDR", &var("NUMBERS4_BIND_ADDR", "0.0.0.0:8080"))?,
        base_url: var("NUMBERS4_BASE_URL", "http://127.0.0.1:8080/api/v1"),
        cache_path: PathBuf::from(var("NUMBERS4_CACHE_PATH", "data/client_cache.json")),
        cache_max_age: parse("NUMBERS4_CACHE_MAX_AGE", &var("NUMBERS4_CACHE_MAX_AGE", "300"))?,
        compact: parse_bool("NUMBERS4_COMPACT", &var("NUMBERS4_COMPACT", "false"))?,
    })
}

fn parse<T>(key: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| Error::Config(format!("{key}={value:?}: {e}")))
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(Error::Config(format!("{key}={value:?}: expected a boolean"))),
    }
}
