//! repair

use std::path::PathBuf;

use crate::commands::Args;
use crate::config::Config;
use crate::error::Result;
use crate::repair::{self, RepairOptions};
use crate::storage::Store;

pub fn run_repair(config: &Config, args: &Args) -> Result<Vec<String>> {
    let mut store = Store::open(&config.db_path)?;
    let mut tx = store.begin()?;

    let options = RepairOptions {
        root: args.positional.first().map(PathBuf::from),
        search_paths: args.values_of("path").into_iter().map(PathBuf::from).collect(),
        pretend: args.has_flag("pretend"),
    };

    let report = repair::repair(&mut tx, config.fingerprint_algorithm, &options)?;
    tx.commit()?;

    let mut lines = report.actions;
    for error in &report.errors {
        lines.push(format!("error: {}", error));
    }
    lines.push(format!(
        "checked {}: {} unchanged, {} modified, {} moved, {} missing kept, {} removed",
        report.checked,
        report.unchanged,
        report.modified,
        report.moved,
        report.missing_kept,
        report.missing_removed
    ));

    Ok(lines)
}
