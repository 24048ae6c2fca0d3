//! Command surface
//!
//! Commands arrive pre-parsed from the front-end as a sub-command name,
//! positional arguments and an option set. A registry maps names to
//! variants with a uniform execution contract returning lines of output;
//! every mutating command runs inside a single transaction, committed on
//! clean return and rolled back on error.

pub mod files;
pub mod imply;
pub mod init;
pub mod manage;
pub mod mount;
pub mod repair;
pub mod status;
pub mod tag;

use crate::config::Config;
use crate::error::{Result, TmsuError};

/// Pre-parsed arguments handed over by the front-end.
#[derive(Debug, Default, Clone)]
pub struct Args {
    pub positional: Vec<String>,
    pub flags: Vec<String>,
    pub values: Vec<(String, String)>,
}

impl Args {
    pub fn has_flag(&self, name: &str) -> bool {
        self.flags.iter().any(|f| f == name)
    }

    pub fn value(&self, name: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn values_of(&self, name: &str) -> Vec<&str> {
        self.values
            .iter()
            .filter(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
            .collect()
    }

    fn at_least(&self, count: usize, usage: &str) -> Result<()> {
        if self.positional.len() < count {
            return Err(TmsuError::Usage(format!("too few arguments: usage: {}", usage)));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Copy,
    Delete,
    Files,
    Imply,
    Init,
    Merge,
    Mount,
    Rename,
    Repair,
    Stats,
    Status,
    Tag,
    Tags,
    Untag,
    Untagged,
}

/// Sub-command names in dispatch order.
pub const REGISTRY: &[(&str, Command)] = &[
    ("copy", Command::Copy),
    ("delete", Command::Delete),
    ("files", Command::Files),
    ("imply", Command::Imply),
    ("init", Command::Init),
    ("merge", Command::Merge),
    ("mount", Command::Mount),
    ("rename", Command::Rename),
    ("repair", Command::Repair),
    ("stats", Command::Stats),
    ("status", Command::Status),
    ("tag", Command::Tag),
    ("tags", Command::Tags),
    ("untag", Command::Untag),
    ("untagged", Command::Untagged),
];

impl Command {
    pub fn from_name(name: &str) -> Option<Command> {
        REGISTRY
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, command)| *command)
    }

    /// Execute the command, returning the lines to present to the user.
    pub fn execute(&self, config: &Config, args: &Args) -> Result<Vec<String>> {
        match self {
            Command::Init => init::run_init(args),
            Command::Mount => {
                args.at_least(1, "mount MOUNTPOINT")?;
                mount::run_mount(config, &args.positional[0])
            }
            Command::Tag => {
                args.at_least(2, "tag FILE TAG...")?;
                tag::run_tag(config, &args.positional[0], &args.positional[1..])
            }
            Command::Untag => {
                if args.has_flag("all") {
                    args.at_least(1, "untag --all FILE")?;
                    tag::run_untag_all(config, &args.positional[0])
                } else {
                    args.at_least(2, "untag FILE TAG...")?;
                    tag::run_untag(config, &args.positional[0], &args.positional[1..])
                }
            }
            Command::Files => files::run_files(config, &args.positional.join(" ")),
            Command::Tags => files::run_tags(config, &args.positional),
            Command::Imply => imply::run_imply(config, args),
            Command::Rename => {
                args.at_least(2, "rename OLD NEW")?;
                manage::run_rename(config, &args.positional[0], &args.positional[1])
            }
            Command::Merge => {
                args.at_least(2, "merge TAG... DEST")?;
                manage::run_merge(config, args)
            }
            Command::Copy => {
                args.at_least(2, "copy TAG NEW")?;
                manage::run_copy(config, &args.positional[0], &args.positional[1])
            }
            Command::Delete => {
                args.at_least(1, "delete TAG...")?;
                manage::run_delete(config, &args.positional)
            }
            Command::Repair => repair::run_repair(config, args),
            Command::Status => status::run_status(config, &args.positional),
            Command::Untagged => {
                args.at_least(1, "untagged PATH...")?;
                status::run_untagged(config, &args.positional)
            }
            Command::Stats => status::run_stats(config),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_resolves_names() {
        assert_eq!(Command::from_name("tag"), Some(Command::Tag));
        assert_eq!(Command::from_name("repair"), Some(Command::Repair));
        assert_eq!(Command::from_name("bogus"), None);
    }

    #[test]
    fn args_lookups() {
        let args = Args {
            positional: vec!["a".into()],
            flags: vec!["pretend".into()],
            values: vec![
                ("path".into(), "/x".into()),
                ("path".into(), "/y".into()),
            ],
        };
        assert!(args.has_flag("pretend"));
        assert!(!args.has_flag("list"));
        assert_eq!(args.value("path"), Some("/x"));
        assert_eq!(args.values_of("path"), vec!["/x", "/y"]);
    }
}
