//! Rebuilding the index from the note directories alone.
//!
//! Used when the `state` record is missing or corrupt, and by `rescan`.
//! Recovery is best-effort: a note whose metadata cannot be read is skipped,
//! and only a failure to list the root itself is an error.

use std::io::ErrorKind;

use walkdir::WalkDir;

use crate::codec;
use crate::error::{StoreError, StoreResult};
use crate::layout::{parse_note_dir, StoreLayout};
use crate::meta::{NoteMeta, StoreIndex, ROOT_ID};

/// Derives a fresh index by scanning `layout`'s root for numeric directories.
pub fn derive(layout: &StoreLayout) -> StoreResult<StoreIndex> {
    let mut index = StoreIndex::default();
    for entry in WalkDir::new(layout.root())
        .min_depth(1)
        .max_depth(1)
        .follow_links(false)
    {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) if err.depth() == 0 => {
                return Err(StoreError::io(layout.root(), std::io::Error::from(err)));
            }
            Err(err) => {
                log::warn!("skipping unreadable entry under {}: {err}", layout.root().display());
                continue;
            }
        };
        if !entry.file_type().is_dir() {
            continue;
        }
        let Some(id) = entry.file_name().to_str().and_then(parse_note_dir) else {
            continue;
        };
        // Unreadable notes still hold their id, so never allocate it again.
        let Some(next) = id.checked_add(1) else {
            log::warn!("skipping note directory {id}: no id can follow it");
            continue;
        };
        index.next_id = index.next_id.max(next);
        match read_meta(layout, id) {
            Ok(meta) => {
                index.notes.insert(id, meta);
            }
            Err(err) => log::warn!("skipping note {id} during recovery: {err}"),
        }
    }
    index.next_id = index.next_id.max(ROOT_ID + 1);
    log::debug!(
        "derived index for {}: {} note(s), next id {}",
        layout.root().display(),
        index.notes.len(),
        index.next_id
    );
    Ok(index)
}

/// Reads one note's metadata record and folds in files found on disk.
///
/// The directory name is authoritative for the id.
pub fn read_meta(layout: &StoreLayout, id: u64) -> StoreResult<NoteMeta> {
    let mut meta: NoteMeta = codec::read_record(&layout.metadata_path(id))?;
    if meta.id != id {
        log::warn!("note directory {id} records id {}; using {id}", meta.id);
        meta.id = id;
    }
    reconcile_files(&mut meta, &list_files(layout, id)?);
    Ok(meta)
}

/// Appends names present on disk but missing from `meta.files`.
///
/// One-directional: recorded names that vanished from disk are kept.
pub fn reconcile_files(meta: &mut NoteMeta, on_disk: &[String]) {
    for name in on_disk {
        if !meta.has_file(name) {
            meta.files.push(name.clone());
        }
    }
}

/// Lists a note's attached files, sorted by name. A missing directory lists empty.
pub fn list_files(layout: &StoreLayout, id: u64) -> StoreResult<Vec<String>> {
    let dir = layout.files_dir(id);
    let entries = match std::fs::read_dir(&dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(StoreError::io(&dir, e)),
    };
    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| StoreError::io(&dir, e))?;
        names.push(entry.file_name().to_string_lossy().into_owned());
    }
    names.sort();
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_note(layout: &StoreLayout, meta: &NoteMeta) {
        layout.create_note_dir(meta.id).unwrap();
        std::fs::write(layout.body_path(meta.id), format!("{}\n", meta.title)).unwrap();
        codec::write_record(&layout.metadata_path(meta.id), meta).unwrap();
    }

    #[test]
    fn derive_empty_root_starts_at_one() {
        let dir = tempfile::tempdir().unwrap();
        let index = derive(&StoreLayout::new(dir.path())).unwrap();
        assert!(index.notes.is_empty());
        assert_eq!(index.next_id, 1);
    }

    #[test]
    fn derive_skips_non_numeric_and_unreadable() {
        let dir = tempfile::tempdir().unwrap();
        let layout = StoreLayout::new(dir.path());
        write_note(
            &layout,
            &NoteMeta {
                id: 0,
                title: "Top Level".into(),
                subnotes: vec![4],
                ..NoteMeta::default()
            },
        );
        write_note(
            &layout,
            &NoteMeta {
                id: 4,
                title: "four".into(),
                ..NoteMeta::default()
            },
        );
        layout.create_note_dir(9).unwrap();
        std::fs::write(layout.metadata_path(9), "{not json").unwrap();
        std::fs::create_dir(dir.path().join("notes")).unwrap();
        std::fs::write(dir.path().join("17"), "a file, not a note").unwrap();

        let index = derive(&layout).unwrap();
        assert_eq!(index.notes.keys().copied().collect::<Vec<_>>(), vec![0, 4]);
        assert_eq!(index.next_id, 10);
        assert_eq!(index.notes[&0].subnotes, vec![4]);
    }

    #[test]
    fn derive_skips_largest_id_directory() {
        let dir = tempfile::tempdir().unwrap();
        let layout = StoreLayout::new(dir.path());
        layout.create_note_dir(u64::MAX).unwrap();
        codec::write_record(
            &layout.metadata_path(u64::MAX),
            &NoteMeta {
                id: u64::MAX,
                ..NoteMeta::default()
            },
        )
        .unwrap();

        let index = derive(&layout).unwrap();
        assert!(index.notes.is_empty());
        assert_eq!(index.next_id, 1);
    }

    #[test]
    fn derive_missing_root_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = derive(&StoreLayout::new(dir.path().join("nope"))).unwrap_err();
        assert!(matches!(err, StoreError::Io { .. }));
    }

    #[test]
    fn read_meta_appends_but_never_prunes_files() {
        let dir = tempfile::tempdir().unwrap();
        let layout = StoreLayout::new(dir.path());
        write_note(
            &layout,
            &NoteMeta {
                id: 2,
                files: vec!["gone.txt".into()],
                ..NoteMeta::default()
            },
        );
        std::fs::write(layout.file_path(2, "b.txt"), "b").unwrap();
        std::fs::write(layout.file_path(2, "a.txt"), "a").unwrap();

        let meta = read_meta(&layout, 2).unwrap();
        assert_eq!(meta.files, vec!["gone.txt", "a.txt", "b.txt"]);
    }

    #[test]
    fn read_meta_trusts_directory_id() {
        let dir = tempfile::tempdir().unwrap();
        let layout = StoreLayout::new(dir.path());
        layout.create_note_dir(6).unwrap();
        codec::write_record(
            &layout.metadata_path(6),
            &NoteMeta {
                id: 60,
                ..NoteMeta::default()
            },
        )
        .unwrap();
        assert_eq!(read_meta(&layout, 6).unwrap().id, 6);
    }
}
