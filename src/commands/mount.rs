//! mount

use std::path::Path;

use crate::config::Config;
use crate::error::Result;
use crate::storage::Store;
use crate::vfs;

/// Mount the virtual filesystem. Blocks until the filesystem is unmounted.
pub fn run_mount(config: &Config, mountpoint: &str) -> Result<Vec<String>> {
    let store = Store::open(&config.db_path)?;
    vfs::mount(store, Path::new(mountpoint))?;
    Ok(Vec::new())
}
