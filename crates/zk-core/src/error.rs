//! Errors returned by the note store and the search engine.

use std::path::PathBuf;

/// Everything that can go wrong while opening, reading or mutating a store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("note {0} not found")]
    NoteNotFound(u64),
    #[error("no alias named `{0}`")]
    AliasNotFound(String),
    #[error("note {id} has no file named `{name}`")]
    FileNotFound { id: u64, name: String },
    #[error("store root already contains files: {0}")]
    AlreadyPopulated(PathBuf),
    #[error("a note with id {0} already exists")]
    DuplicateId(u64),
    #[error("the top-level note cannot be a subnote")]
    RootAsSubnote,
    #[error("corrupt record {path}: {source}")]
    CorruptRecord {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("cannot find source file {path}: {source}")]
    SourceNotFound {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot open source file {path}: {source}")]
    SourceUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("file named `{name}` already exists for note {id}")]
    NameConflict { id: u64, name: String },
    #[error("invalid file name `{0}`")]
    InvalidName(String),
    #[error("`{0}` is neither an alias nor a note id")]
    InvalidId(String),
    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid search pattern: {0}")]
    Pattern(#[from] regex::Error),
    #[error("cannot start search thread: {0}")]
    Thread(#[source] std::io::Error),
}

impl StoreError {
    /// True for the "not found" class: unknown note, alias or attached file.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            StoreError::NoteNotFound(_)
                | StoreError::AliasNotFound(_)
                | StoreError::FileNotFound { .. }
        )
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
