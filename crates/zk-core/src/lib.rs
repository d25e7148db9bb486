//! All note-store logic independent of how it is driven (CLI or otherwise).
//!
//! A store is a directory of numbered note directories plus an index record.
//! [`Store`] owns the in-memory index and keeps it in step with disk; the index
//! can always be rebuilt from the note directories (see [`recovery`]).

pub mod app_data;
pub mod codec;
pub mod config;
pub mod error;
pub mod layout;
pub mod meta;
pub mod recovery;
pub mod search;
pub mod store;

pub use app_data::{app_data_dir, default_store_root};
pub use config::{
    get_current_note, get_editor, get_store_root, load_config, set_current_note, set_store_root,
    Config, ConfigError,
};
pub use error::{StoreError, StoreResult};
pub use layout::StoreLayout;
pub use meta::{title_of, Note, NoteMeta, StoreIndex, ROOT_ID, ROOT_TITLE};
pub use recovery::derive;
pub use search::{Search, SearchFailure, SearchHit, SearchResult};
pub use store::{Aliases, Store};
