//! Core entities: files, tags, taggings and implications

use std::fmt;
use std::path::{Path, PathBuf};

use rusqlite::types::{FromSql, FromSqlResult, ToSqlOutput, ValueRef};
use rusqlite::ToSql;

use crate::error::{Result, TmsuError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TagId(pub i64);

impl fmt::Display for TagId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FileId(pub i64);

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromSql for TagId {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        i64::column_result(value).map(TagId)
    }
}

impl ToSql for TagId {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        self.0.to_sql()
    }
}

impl FromSql for FileId {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        i64::column_result(value).map(FileId)
    }
}

impl ToSql for FileId {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        self.0.to_sql()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Tag {
    pub id: TagId,
    pub name: String,
}

impl AsRef<str> for Tag {
    fn as_ref(&self) -> &str {
        &self.name
    }
}

/// An indexed file. `(dir, name)` is the externally visible identity;
/// `dir` is absolute and lexically cleaned, `name` the basename.
#[derive(Debug, Clone, PartialEq)]
pub struct File {
    pub id: FileId,
    pub dir: String,
    pub name: String,
    /// Hex digest of the content; empty for directories and unreadable files.
    pub fingerprint: String,
    /// Modification time in whole seconds since the Unix epoch.
    pub mod_time: i64,
    pub size: u64,
}

impl File {
    pub fn to_path_buf(&self) -> PathBuf {
        if self.name == "/" {
            PathBuf::from("/")
        } else {
            Path::new(&self.dir).join(&self.name)
        }
    }
}

/// An explicit tagging: the user associated the tag with the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileTag {
    pub file_id: FileId,
    pub tag_id: TagId,
}

/// A materialised implicit tagging, derived from the implication closure
/// over the file's explicit tags. `source_tag_id` is the explicit tag the
/// implied tag was first reached from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImplicitFileTag {
    pub file_id: FileId,
    pub tag_id: TagId,
    pub source_tag_id: TagId,
}

/// A directed implication rule: whenever the implying tag is on a file,
/// the implied tag is considered on it too.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Implication {
    pub implying_tag: Tag,
    pub implied_tag: Tag,
}

/// Characters that cannot appear anywhere in a tag name because the query
/// grammar reserves them.
const FORBIDDEN_CHARS: &[char] = &['(', ')', '<', '>', '=', ',', '-', '/'];

/// Keywords that cannot be used as tag names, in lowercase or uppercase.
const FORBIDDEN_KEYWORDS: &[&str] = &["and", "AND", "or", "OR", "not", "NOT"];

pub fn validate_tag_name(name: &str) -> Result<()> {
    let message = match name {
        "" => Some("tag names cannot be empty".to_string()),
        // Cannot be represented in the virtual filesystem
        "." | ".." => Some("tag names cannot be '.' or '..'".to_string()),
        n if FORBIDDEN_KEYWORDS.contains(&n) => {
            Some("tag names cannot be a logical operator: 'and', 'or' or 'not'".to_string())
        }
        n if n.trim() != n => {
            Some(format!("tag name '{}' has leading or trailing whitespace", n))
        }
        n => n
            .chars()
            .find(|c| FORBIDDEN_CHARS.contains(c))
            .map(|c| format!("tag names cannot contain '{}'", c)),
    };

    match message {
        Some(message) => Err(TmsuError::InvalidName(message)),
        None => Ok(()),
    }
}
