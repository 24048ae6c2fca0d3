//! imply

use crate::commands::tag::{existing_tag, load_or_create_tag};
use crate::commands::Args;
use crate::config::Config;
use crate::error::{Result, TmsuError};
use crate::implications;
use crate::storage::{self, Store};

/// List, add or remove tag implications. The implication graph may contain
/// cycles, so no cycle check is made on insertion; only direct
/// self-implication is refused.
pub fn run_imply(config: &Config, args: &Args) -> Result<Vec<String>> {
    let mut store = Store::open(&config.db_path)?;
    let mut tx = store.begin()?;

    if args.has_flag("list") || args.positional.is_empty() {
        let implications = storage::implication::implications(&mut tx)?;
        return Ok(implications
            .into_iter()
            .map(|i| format!("{} -> {}", i.implying_tag.name, i.implied_tag.name))
            .collect());
    }

    if args.positional.len() < 2 {
        return Err(TmsuError::Usage(
            "too few arguments: usage: imply [--delete] TAG IMPL...".to_string(),
        ));
    }

    let mut lines = Vec::new();
    let implying_name = &args.positional[0];
    let implied_names = &args.positional[1..];

    if args.has_flag("delete") {
        let implying = existing_tag(&mut tx, implying_name)?;
        let mut touched = vec![implying.id];

        for name in implied_names {
            let implied = existing_tag(&mut tx, name)?;
            storage::implication::delete_implication(&mut tx, implying.id, implied.id).map_err(
                |_| {
                    TmsuError::NotFound(format!(
                        "no such implication '{}' -> '{}'",
                        implying_name, name
                    ))
                },
            )?;
            touched.push(implied.id);
        }

        implications::refresh_affected_by(&mut tx, &touched)?;
    } else {
        let implying = load_or_create_tag(&mut tx, implying_name, &mut lines)?;
        let mut touched = vec![implying.id];

        for name in implied_names {
            if name == implying_name {
                return Err(TmsuError::InvalidName(format!(
                    "tag '{}' cannot imply itself",
                    name
                )));
            }

            let implied = load_or_create_tag(&mut tx, name, &mut lines)?;
            tracing::info!("adding implication '{}' -> '{}'", implying_name, name);
            storage::implication::add_implication(&mut tx, implying.id, implied.id)?;
            touched.push(implied.id);
        }

        implications::refresh_affected_by(&mut tx, &touched)?;
    }

    tx.commit()?;
    Ok(lines)
}
