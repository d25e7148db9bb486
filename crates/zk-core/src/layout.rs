//! How notes map onto the store root.
//!
//! ```text
//! <root>/state                 whole-store index
//! <root>/aliases               alias map
//! <root>/<id>/metadata         one note's metadata
//! <root>/<id>/body             raw body text, first line is the title
//! <root>/<id>/files/<name>     attached files
//! ```

use std::path::{Path, PathBuf};

const STATE_FILENAME: &str = "state";
const ALIASES_FILENAME: &str = "aliases";
const METADATA_FILENAME: &str = "metadata";
const BODY_FILENAME: &str = "body";
const FILES_DIRNAME: &str = "files";

/// Path derivation for one store root. Does no validation of content.
#[derive(Debug, Clone)]
pub struct StoreLayout {
    root: PathBuf,
}

impl StoreLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn state_path(&self) -> PathBuf {
        self.root.join(STATE_FILENAME)
    }

    pub fn aliases_path(&self) -> PathBuf {
        self.root.join(ALIASES_FILENAME)
    }

    /// Note directories are named by the decimal id, so distinct ids never collide.
    pub fn note_dir(&self, id: u64) -> PathBuf {
        self.root.join(id.to_string())
    }

    pub fn metadata_path(&self, id: u64) -> PathBuf {
        self.note_dir(id).join(METADATA_FILENAME)
    }

    pub fn body_path(&self, id: u64) -> PathBuf {
        self.note_dir(id).join(BODY_FILENAME)
    }

    pub fn files_dir(&self, id: u64) -> PathBuf {
        self.note_dir(id).join(FILES_DIRNAME)
    }

    pub fn file_path(&self, id: u64, name: &str) -> PathBuf {
        self.files_dir(id).join(name)
    }

    /// Creates `<root>/<id>/` together with its empty `files/` subdirectory.
    pub fn create_note_dir(&self, id: u64) -> std::io::Result<()> {
        std::fs::create_dir_all(self.files_dir(id))
    }
}

/// Parses a root entry name as a note id. Only plain decimal names count.
pub fn parse_note_dir(name: &str) -> Option<u64> {
    if name.is_empty() || !name.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    name.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_are_per_id() {
        let l = StoreLayout::new("/notes");
        assert_eq!(l.state_path(), PathBuf::from("/notes/state"));
        assert_eq!(l.aliases_path(), PathBuf::from("/notes/aliases"));
        assert_eq!(l.metadata_path(12), PathBuf::from("/notes/12/metadata"));
        assert_eq!(l.body_path(12), PathBuf::from("/notes/12/body"));
        assert_eq!(l.file_path(1, "a.png"), PathBuf::from("/notes/1/files/a.png"));
        assert_ne!(l.note_dir(1), l.note_dir(11));
    }

    #[test]
    fn parse_note_dir_accepts_decimal_only() {
        assert_eq!(parse_note_dir("0"), Some(0));
        assert_eq!(parse_note_dir("42"), Some(42));
        assert_eq!(parse_note_dir("state"), None);
        assert_eq!(parse_note_dir("-1"), None);
        assert_eq!(parse_note_dir("+1"), None);
        assert_eq!(parse_note_dir(""), None);
    }

    #[test]
    fn create_note_dir_makes_files_subdir() {
        let dir = tempfile::tempdir().unwrap();
        let l = StoreLayout::new(dir.path());
        l.create_note_dir(3).unwrap();
        assert!(l.files_dir(3).is_dir());
        assert_eq!(std::fs::read_dir(l.files_dir(3)).unwrap().count(), 0);
    }
}
