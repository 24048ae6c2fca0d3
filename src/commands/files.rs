//! files / tags

use crate::config::Config;
use crate::error::{Result, TmsuError};
use crate::query::{self, Expression};
use crate::scoped_path::StoredPath;
use crate::storage::{self, Store};

/// List the files matching a query expression, one path per line.
/// A blank query lists every indexed file.
pub fn run_files(config: &Config, query_text: &str) -> Result<Vec<String>> {
    let mut store = Store::open(&config.db_path)?;
    let mut tx = store.begin()?;

    let files = match Expression::parse(query_text)? {
        None => storage::file::all_files(&mut tx)?,
        Some(expr) => {
            let ids = query::file_ids_matching(&mut tx, &expr)?;

            // An unknown tag contributes the empty set; when negation
            // turns that into "every file", return nothing instead
            let mut names = expr.tag_names();
            names.sort_unstable();
            names.dedup();
            let known = storage::tag::tags_by_names(&mut tx, &names)?;
            let matches_everything = !ids.is_empty()
                && ids.len() as u64 == storage::file::file_count(&mut tx)?;
            if known.len() < names.len() && matches_everything {
                Vec::new()
            } else {
                storage::file::files_by_ids(&mut tx, &ids)?
            }
        }
    };

    Ok(files
        .iter()
        .map(|f| f.to_path_buf().display().to_string())
        .collect())
}

/// With no paths, list every tag. With paths, list each file's effective
/// tags, implied ones marked.
pub fn run_tags(config: &Config, paths: &[String]) -> Result<Vec<String>> {
    let mut store = Store::open(&config.db_path)?;
    let mut tx = store.begin()?;

    if paths.is_empty() {
        let tags = storage::tag::all_tags(&mut tx)?;
        return Ok(tags.into_iter().map(|t| t.name).collect());
    }

    let mut lines = Vec::new();
    for path in paths {
        let stored = StoredPath::resolve(path)?;
        let display = stored.to_path_buf().display().to_string();

        let file = storage::file::file_by_path(&mut tx, &stored.dir, &stored.name)?
            .ok_or_else(|| TmsuError::NotFound(format!("{}: file not tagged", display)))?;

        lines.push(display);
        for (tag, implicit) in storage::filetag::effective_tags_of_file(&mut tx, file.id)? {
            if implicit {
                lines.push(format!("  {} (implied)", tag.name));
            } else {
                lines.push(format!("  {}", tag.name));
            }
        }
    }

    Ok(lines)
}
