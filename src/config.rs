//! Startup configuration
//!
//! All global knobs (database location, fingerprint algorithm) are resolved
//! once at startup into a plain record that is passed around explicitly.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Result, TmsuError};
use crate::fingerprint::Algorithm;

const DB_ENV_VAR: &str = "TMSU_DB";
const ALGORITHM_ENV_VAR: &str = "TMSU_FINGERPRINT_ALGORITHM";
const ALGORITHM_CONFIG_KEY: &str = "fingerprintAlgorithm";

#[derive(Debug, Clone)]
pub struct Config {
    /// Path of the SQLite database file.
    pub db_path: PathBuf,
    /// Content fingerprint algorithm, consistent within one database.
    pub fingerprint_algorithm: Algorithm,
}

impl Config {
    /// Resolve the configuration from the environment.
    ///
    /// The database path is the first of: the explicit override, the
    /// `TMSU_DB` environment variable, a `.tmsu/db` found walking up from
    /// the working directory, and `$HOME/.tmsu/default.db`.
    pub fn resolve(db_override: Option<PathBuf>) -> Result<Config> {
        let db_path = match db_override {
            Some(path) => path,
            None => match env::var_os(DB_ENV_VAR) {
                Some(path) => PathBuf::from(path),
                None => match find_database_upwards()? {
                    Some(path) => path,
                    None => default_db_path().ok_or_else(|| {
                        TmsuError::NotFound("could not determine a database path: no home directory".to_string())
                    })?,
                },
            },
        };

        Ok(Config {
            db_path,
            fingerprint_algorithm: resolve_algorithm()?,
        })
    }

    /// The database path used by `init` when none is given explicitly:
    /// the environment override or the per-user default.
    pub fn default_for_init() -> Result<PathBuf> {
        match env::var_os(DB_ENV_VAR) {
            Some(path) => Ok(PathBuf::from(path)),
            None => default_db_path().ok_or_else(|| {
                TmsuError::NotFound("could not determine a database path: no home directory".to_string())
            }),
        }
    }
}

/// Look for `.tmsu/db` in the current directory and its ancestors.
fn find_database_upwards() -> Result<Option<PathBuf>> {
    let mut dir = env::current_dir()?;

    loop {
        let candidate = dir.join(".tmsu").join("db");
        tracing::debug!("looking for database at {}", candidate.display());
        if candidate.is_file() {
            return Ok(Some(candidate));
        }

        match dir.parent() {
            Some(parent) => dir = parent.to_path_buf(),
            None => return Ok(None),
        }
    }
}

/// `$HOME/.tmsu/default.db`, or None if the home directory is unknown.
fn default_db_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".tmsu").join("default.db"))
}

fn resolve_algorithm() -> Result<Algorithm> {
    if let Some(value) = env::var_os(ALGORITHM_ENV_VAR) {
        let value = value.to_string_lossy();
        return value.parse();
    }

    if let Some(home) = dirs::home_dir() {
        let config_path = home.join(".tmsu").join("config");
        if let Some(value) = read_config_key(&config_path, ALGORITHM_CONFIG_KEY)? {
            return value.parse();
        }
    }

    Ok(Algorithm::default())
}

/// Read a `key=value` entry from a plain config file. Blank lines and
/// lines starting with '#' are skipped. Missing file means no entry.
fn read_config_key(path: &Path, key: &str) -> Result<Option<String>> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((k, v)) = line.split_once('=') {
            if k.trim() == key {
                return Ok(Some(v.trim().to_string()));
            }
        }
    }

    Ok(None)
}
