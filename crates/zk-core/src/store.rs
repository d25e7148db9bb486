//! The note store: owns the index, edits the note graph, writes changes back.
//!
//! All operations are synchronous and meant for one thread of control. Every
//! mutation rewrites the affected metadata records immediately; the index record
//! is rewritten on `create_note`, `flush` and `close`.

use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use crate::codec;
use crate::error::{StoreError, StoreResult};
use crate::layout::StoreLayout;
use crate::meta::{title_of, Note, NoteMeta, StoreIndex, ROOT_ID, ROOT_TITLE};
use crate::recovery;

/// Alias name to note id.
pub type Aliases = BTreeMap<String, u64>;

/// An open store rooted at one directory.
#[derive(Debug)]
pub struct Store {
    layout: StoreLayout,
    index: StoreIndex,
    aliases: Aliases,
}

impl Store {
    /// Initializes a new store at `root` and returns it opened.
    ///
    /// `root` may not exist yet, or must be an empty directory.
    pub fn init(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let layout = StoreLayout::new(root);
        match std::fs::read_dir(layout.root()) {
            Ok(mut entries) => {
                if entries.next().is_some() {
                    return Err(StoreError::AlreadyPopulated(layout.root().to_path_buf()));
                }
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(StoreError::io(layout.root(), e)),
        }
        std::fs::create_dir_all(layout.root()).map_err(|e| StoreError::io(layout.root(), e))?;

        let mut store = Self {
            layout,
            index: StoreIndex::default(),
            aliases: Aliases::new(),
        };
        store.make_note(ROOT_ID, ROOT_ID, &format!("{ROOT_TITLE}\n"))?;
        store.flush()?;
        log::info!("initialized store at {}", store.root().display());
        Ok(store)
    }

    /// Opens an initialized store.
    ///
    /// If the index record cannot be read or decoded, the index is rebuilt from
    /// the note directories instead. An unreadable alias record opens as empty.
    pub fn open(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let layout = StoreLayout::new(root);
        let index = match codec::read_record::<StoreIndex>(&layout.state_path()) {
            Ok(index) => index,
            Err(err) => {
                log::warn!("cannot load index, rebuilding from note directories: {err}");
                recovery::derive(&layout)?
            }
        };
        let aliases = match codec::read_record::<Aliases>(&layout.aliases_path()) {
            Ok(aliases) => aliases,
            Err(StoreError::Io { source, .. }) if source.kind() == ErrorKind::NotFound => {
                Aliases::new()
            }
            Err(err) => {
                log::warn!("ignoring alias record: {err}");
                Aliases::new()
            }
        };
        log::debug!(
            "opened store at {} with {} note(s)",
            layout.root().display(),
            index.notes.len()
        );
        Ok(Self {
            layout,
            index,
            aliases,
        })
    }

    /// Writes the index and alias records.
    pub fn flush(&self) -> StoreResult<()> {
        codec::write_record(&self.layout.state_path(), &self.index)?;
        codec::write_record(&self.layout.aliases_path(), &self.aliases)
    }

    /// Flushes and releases the store.
    pub fn close(self) -> StoreResult<()> {
        self.flush()
    }

    pub fn root(&self) -> &Path {
        self.layout.root()
    }

    /// The id the next created note will get.
    pub fn next_id(&self) -> u64 {
        self.index.next_id
    }

    /// Read-only view of every note's metadata, keyed by id.
    pub fn metadata_dump(&self) -> &BTreeMap<u64, NoteMeta> {
        &self.index.notes
    }

    /// Metadata from the index. No disk access.
    pub fn get_meta(&self, id: u64) -> StoreResult<NoteMeta> {
        self.meta(id).cloned()
    }

    fn meta(&self, id: u64) -> StoreResult<&NoteMeta> {
        self.index.notes.get(&id).ok_or(StoreError::NoteNotFound(id))
    }

    fn meta_mut(&mut self, id: u64) -> StoreResult<&mut NoteMeta> {
        self.index
            .notes
            .get_mut(&id)
            .ok_or(StoreError::NoteNotFound(id))
    }

    fn contains(&self, id: u64) -> bool {
        self.index.notes.contains_key(&id)
    }

    /// Reads a note from disk and brings the index back in line with it.
    ///
    /// Files found in the note's `files/` directory are added to the record and
    /// the title is re-derived from the body; the refreshed metadata is written
    /// back to disk and into the index. Invalid UTF-8 in the body is replaced
    /// with U+FFFD in the returned text; the body file itself is not rewritten.
    pub fn get_note(&mut self, id: u64) -> StoreResult<Note> {
        let mut meta = recovery::read_meta(&self.layout, id).map_err(|err| match err {
            StoreError::Io { source, .. } if source.kind() == ErrorKind::NotFound => {
                StoreError::NoteNotFound(id)
            }
            err => err,
        })?;
        let body_path = self.layout.body_path(id);
        let bytes = std::fs::read(&body_path).map_err(|e| StoreError::io(&body_path, e))?;
        // Bodies edited outside zk may not be UTF-8.
        let body = String::from_utf8_lossy(&bytes).into_owned();
        meta.title = title_of(&body);
        self.write_meta(&meta)?;
        self.index.notes.insert(id, meta.clone());
        Ok(Note { meta, body })
    }

    /// Creates a note under `parent` and returns its id.
    pub fn create_note(&mut self, parent: u64, body: &str) -> StoreResult<u64> {
        if !self.contains(parent) {
            return Err(StoreError::NoteNotFound(parent));
        }
        let id = self.index.next_id;
        self.make_note(id, parent, body)?;
        self.index.next_id += 1;
        codec::write_record(&self.layout.state_path(), &self.index)?;
        log::debug!("created note {id} under {parent}");
        Ok(id)
    }

    /// Lays out a note on disk and links it under `parent`. Does not write the index.
    fn make_note(&mut self, id: u64, parent: u64, body: &str) -> StoreResult<()> {
        if self.contains(id) {
            return Err(StoreError::DuplicateId(id));
        }
        let meta = NoteMeta {
            id,
            title: title_of(body),
            parent,
            ..NoteMeta::default()
        };
        self.layout
            .create_note_dir(id)
            .map_err(|e| StoreError::io(self.layout.note_dir(id), e))?;
        let body_path = self.layout.body_path(id);
        std::fs::write(&body_path, body).map_err(|e| StoreError::io(&body_path, e))?;
        self.write_meta(&meta)?;

        if id != ROOT_ID {
            let parent_meta = self.meta_mut(parent)?;
            parent_meta.subnotes.push(id);
            let parent_meta = parent_meta.clone();
            self.write_meta(&parent_meta)?;
        }
        self.index.notes.insert(id, meta);
        Ok(())
    }

    /// Replaces a note's body and re-derives its title. Files and subnotes are untouched.
    pub fn update_note(&mut self, id: u64, body: &str) -> StoreResult<()> {
        let mut meta = self.get_meta(id)?;
        meta.title = title_of(body);
        let body_path = self.layout.body_path(id);
        std::fs::write(&body_path, body).map_err(|e| StoreError::io(&body_path, e))?;
        self.write_meta(&meta)?;
        self.index.notes.insert(id, meta);
        log::debug!("updated note {id}");
        Ok(())
    }

    /// Lists `id` under `parent`. Idempotent.
    ///
    /// The child's own `parent` is left alone, so a note can sit under several parents.
    pub fn link_note(&mut self, parent: u64, id: u64) -> StoreResult<()> {
        if id == ROOT_ID {
            return Err(StoreError::RootAsSubnote);
        }
        if !self.contains(id) {
            return Err(StoreError::NoteNotFound(id));
        }
        let parent_meta = self.meta_mut(parent)?;
        if parent_meta.has_subnote(id) {
            return Ok(());
        }
        parent_meta.subnotes.push(id);
        let parent_meta = parent_meta.clone();
        self.write_meta(&parent_meta)?;
        log::debug!("linked note {id} under {parent}");
        Ok(())
    }

    /// Removes `id` from `parent`'s subnotes.
    ///
    /// If `parent` was the child's recorded parent, the child is re-parented to
    /// the root note. Unlinking a child that is not listed is a no-op.
    pub fn unlink_note(&mut self, parent: u64, id: u64) -> StoreResult<()> {
        let parent_meta = self.meta_mut(parent)?;
        parent_meta.subnotes.retain(|&sn| sn != id);
        let parent_meta = parent_meta.clone();

        if let Some(child) = self.index.notes.get_mut(&id) {
            if child.parent == parent && child.parent != ROOT_ID {
                child.parent = ROOT_ID;
                let child = child.clone();
                self.write_meta(&child)?;
            }
        }
        self.write_meta(&parent_meta)?;
        log::debug!("unlinked note {id} from {parent}");
        Ok(())
    }

    /// Copies the file at `source` into the note's files.
    ///
    /// The file is stored as `dest_name`, or under the source's base name when
    /// `dest_name` is empty.
    pub fn add_file(&mut self, id: u64, source: &Path, dest_name: &str) -> StoreResult<()> {
        let recorded = self.meta(id)?;
        std::fs::metadata(source).map_err(|e| StoreError::SourceNotFound {
            path: source.to_path_buf(),
            source: e,
        })?;
        let mut src = File::open(source).map_err(|e| StoreError::SourceUnreadable {
            path: source.to_path_buf(),
            source: e,
        })?;

        let name = if dest_name.is_empty() {
            source
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .ok_or_else(|| StoreError::InvalidName(source.display().to_string()))?
        } else {
            dest_name.to_string()
        };
        check_file_name(&name)?;
        if recorded.has_file(&name) {
            return Err(StoreError::NameConflict { id, name });
        }

        let dest_path = self.layout.file_path(id, &name);
        let mut dest = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&dest_path)
            .map_err(|e| match e.kind() {
                ErrorKind::AlreadyExists => StoreError::NameConflict {
                    id,
                    name: name.clone(),
                },
                _ => StoreError::io(&dest_path, e),
            })?;
        if let Err(e) = std::io::copy(&mut src, &mut dest) {
            drop(dest);
            if let Err(cleanup) = std::fs::remove_file(&dest_path) {
                log::warn!("cannot remove partial copy {}: {cleanup}", dest_path.display());
            }
            return Err(StoreError::io(&dest_path, e));
        }
        log::debug!("attached {name} to note {id}");

        self.get_note(id)?;
        Ok(())
    }

    /// Deletes an attached file from disk and from the note's record.
    pub fn remove_file(&mut self, id: u64, name: &str) -> StoreResult<()> {
        self.meta(id)?;
        check_file_name(name)?;
        let path = self.layout.file_path(id, name);
        std::fs::remove_file(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => StoreError::FileNotFound {
                id,
                name: name.to_string(),
            },
            _ => StoreError::io(&path, e),
        })?;

        let meta = self.meta_mut(id)?;
        meta.files.retain(|f| f != name);
        let meta = meta.clone();
        self.write_meta(&meta)?;
        log::debug!("removed {name} from note {id}");
        Ok(())
    }

    /// Path to an attached file, checked to exist.
    pub fn get_file_path(&self, id: u64, name: &str) -> StoreResult<PathBuf> {
        self.meta(id)?;
        check_file_name(name)?;
        let path = self.layout.file_path(id, name);
        match std::fs::metadata(&path) {
            Ok(_) => Ok(path),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StoreError::FileNotFound {
                id,
                name: name.to_string(),
            }),
            Err(e) => Err(StoreError::io(&path, e)),
        }
    }

    /// Opens an attached file for reading.
    pub fn open_file(&self, id: u64, name: &str) -> StoreResult<File> {
        let path = self.get_file_path(id, name)?;
        File::open(&path).map_err(|e| StoreError::io(&path, e))
    }

    /// Path to a note's body, for handing to an editor.
    ///
    /// Edits made through this path reach the index only on the next
    /// [`Store::get_note`] or [`Store::rescan`].
    pub fn get_body_path(&self, id: u64) -> StoreResult<PathBuf> {
        self.meta(id)?;
        Ok(self.layout.body_path(id))
    }

    /// Notes other than the root that no note lists as a subnote, in id order.
    pub fn get_orphans(&self) -> Vec<NoteMeta> {
        self.index
            .notes
            .values()
            .filter(|meta| meta.id != ROOT_ID)
            .filter(|meta| {
                !self
                    .index
                    .notes
                    .values()
                    .any(|candidate| candidate.has_subnote(meta.id))
            })
            .cloned()
            .collect()
    }

    /// Replaces the in-memory index with one derived from disk. Aliases are kept.
    pub fn rescan(&mut self) -> StoreResult<()> {
        self.index = recovery::derive(&self.layout)?;
        log::info!("rescanned {}: {} note(s)", self.root().display(), self.index.notes.len());
        Ok(())
    }

    /// Binds `name` to note `id`, replacing any earlier binding.
    pub fn add_alias(&mut self, id: u64, name: &str) -> StoreResult<()> {
        self.meta(id)?;
        self.aliases.insert(name.to_string(), id);
        self.write_aliases()
    }

    /// Removes an alias. Absent names are ignored.
    pub fn remove_alias(&mut self, name: &str) -> StoreResult<()> {
        if self.aliases.remove(name).is_some() {
            self.write_aliases()?;
        }
        Ok(())
    }

    pub fn aliases(&self) -> &Aliases {
        &self.aliases
    }

    /// Resolves an alias, or else a decimal note id.
    pub fn resolve(&self, name: &str) -> StoreResult<u64> {
        if let Some(&id) = self.aliases.get(name) {
            return Ok(id);
        }
        let id: u64 = name
            .trim()
            .parse()
            .map_err(|_| StoreError::InvalidId(name.to_string()))?;
        if !self.contains(id) {
            return Err(StoreError::NoteNotFound(id));
        }
        Ok(id)
    }

    fn write_meta(&self, meta: &NoteMeta) -> StoreResult<()> {
        codec::write_record(&self.layout.metadata_path(meta.id), meta)
    }

    fn write_aliases(&self) -> StoreResult<()> {
        codec::write_record(&self.layout.aliases_path(), &self.aliases)
    }

    pub(crate) fn layout(&self) -> &StoreLayout {
        &self.layout
    }
}

/// Attached files live directly in `files/`: one plain path component only.
fn check_file_name(name: &str) -> StoreResult<()> {
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        _ => Err(StoreError::InvalidName(name.to_string())),
    }
}
