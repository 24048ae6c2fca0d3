//! init

use std::path::PathBuf;

use crate::commands::Args;
use crate::config::Config;
use crate::error::Result;
use crate::storage::Store;

/// Create a fresh database. With no argument the environment override or
/// the per-user default location is used.
pub fn run_init(args: &Args) -> Result<Vec<String>> {
    let db_path = match args.positional.first() {
        Some(path) => PathBuf::from(path),
        None => Config::default_for_init()?,
    };

    Store::create_at(&db_path)?;
    Ok(vec![format!("created database at {}", db_path.display())])
}
