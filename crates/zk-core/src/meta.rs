//! Note metadata, full notes, and the whole-store index.
//!
//! Field names on disk (`Id`, `Title`, ...) match stores written by older
//! zk releases, which also wrote `null` for empty lists.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

/// Id of the root note. Always present, never anyone's subnote.
pub const ROOT_ID: u64 = 0;

/// Title (and body) of the root note created by `init`.
pub const ROOT_TITLE: &str = "Top Level";

/// Identity and graph position of one note.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct NoteMeta {
    pub id: u64,
    /// Cached first line of the body.
    pub title: String,
    /// Children in insertion order, no duplicates.
    #[serde(deserialize_with = "null_as_empty")]
    pub subnotes: Vec<u64>,
    /// Attached file names, no duplicates.
    #[serde(deserialize_with = "null_as_empty")]
    pub files: Vec<String>,
    /// Primary parent. Advisory only: `link` can list a note under other
    /// parents too, and orphan/traversal logic reads `subnotes` alone.
    pub parent: u64,
}

impl NoteMeta {
    pub fn has_subnote(&self, id: u64) -> bool {
        self.subnotes.contains(&id)
    }

    pub fn has_file(&self, name: &str) -> bool {
        self.files.iter().any(|f| f == name)
    }
}

/// Metadata plus the full body text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Note {
    pub meta: NoteMeta,
    pub body: String,
}

/// In-memory index: allocation counter and every note's metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct StoreIndex {
    #[serde(rename = "NextNoteId")]
    pub next_id: u64,
    #[serde(deserialize_with = "null_as_empty_map")]
    pub notes: BTreeMap<u64, NoteMeta>,
}

impl Default for StoreIndex {
    fn default() -> Self {
        Self {
            next_id: ROOT_ID + 1,
            notes: BTreeMap::new(),
        }
    }
}

/// Title of a body: its first line, or empty for an empty body.
pub fn title_of(body: &str) -> String {
    body.lines().next().unwrap_or("").to_string()
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

fn null_as_empty_map<'de, D>(deserializer: D) -> Result<BTreeMap<u64, NoteMeta>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<BTreeMap<u64, NoteMeta>>::deserialize(deserializer)?.unwrap_or_default())
}
