//! Concurrent regex search over note bodies.
//!
//! One worker thread per note scans its body line by line and hands its matches
//! to a single relay thread through its own bounded channel. The relay forwards
//! one note's results at a time, so a note's matches arrive together and in line
//! order. Which note comes first depends on which worker checks in first.
//!
//! There is no cancellation. Dropping a [`Search`] early makes the relay and the
//! workers stop at their next send.

use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::sync::Arc;
use std::thread;

use regex::Regex;

use crate::error::{StoreError, StoreResult};
use crate::meta::NoteMeta;
use crate::store::Store;

/// Capacity of the stream handed to the caller.
const OUTPUT_CAPACITY: usize = 1024;
/// Capacity between one note's worker and the relay.
const NOTE_CAPACITY: usize = 64;

/// One matching line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub note: NoteMeta,
    /// 1-based line number within the body.
    pub line_number: usize,
    /// The line without its line terminator.
    pub line: String,
}

/// A note whose body could not be read. Other notes are still searched.
#[derive(Debug, thiserror::Error)]
#[error("cannot search note {}: {source}", .note.id)]
pub struct SearchFailure {
    pub note: NoteMeta,
    #[source]
    pub source: std::io::Error,
}

pub type SearchResult = Result<SearchHit, SearchFailure>;

/// Stream of search results. Ends once every dispatched worker has finished.
#[derive(Debug)]
pub struct Search {
    rx: Receiver<SearchResult>,
}

impl Iterator for Search {
    type Item = SearchResult;

    fn next(&mut self) -> Option<Self::Item> {
        self.rx.recv().ok()
    }
}

impl Store {
    /// Searches note bodies for `pattern`.
    ///
    /// An empty `scope` searches every note in the index; otherwise only the
    /// listed ids, in the given multiplicity, with unknown ids dropped.
    pub fn search(&self, pattern: &str, scope: &[u64]) -> StoreResult<Search> {
        let re = Arc::new(Regex::new(pattern)?);
        let targets: Vec<NoteMeta> = if scope.is_empty() {
            self.metadata_dump().values().cloned().collect()
        } else {
            scope
                .iter()
                .filter_map(|id| self.metadata_dump().get(id).cloned())
                .collect()
        };
        log::debug!("searching {} note(s) for `{pattern}`", targets.len());

        let (out_tx, out_rx) = mpsc::sync_channel(OUTPUT_CAPACITY);
        let (batch_tx, batch_rx) = mpsc::channel();
        let pending = targets.len();
        thread::Builder::new()
            .name("zk-search-relay".into())
            .spawn(move || relay(pending, batch_rx, out_tx))
            .map_err(StoreError::Thread)?;

        for note in targets {
            let body = self.layout().body_path(note.id);
            let re = Arc::clone(&re);
            let worker_note = note.clone();
            let worker_batch_tx = batch_tx.clone();
            let spawned = thread::Builder::new()
                .name(format!("zk-search-{}", note.id))
                .spawn(move || {
                    let (tx, rx) = mpsc::sync_channel(NOTE_CAPACITY);
                    if worker_batch_tx.send(rx).is_err() {
                        return;
                    }
                    scan_body(worker_note, body, &re, &tx);
                });
            if let Err(source) = spawned {
                log::warn!("cannot start search worker for note {}: {source}", note.id);
                let _ = batch_tx.send(failed_batch(note, source));
            }
        }
        drop(batch_tx);

        Ok(Search { rx: out_rx })
    }

    /// Searches `root` and everything below it. See [`Store::subtree`].
    pub fn tree_search(&self, pattern: &str, root: u64) -> StoreResult<Search> {
        let scope = self.subtree(root)?;
        self.search(pattern, &scope)
    }

    /// `root` followed by its subnotes, depth first.
    ///
    /// A note linked under two parents inside the subtree appears once per path,
    /// so it is searched once per path. A link back to a note already on the
    /// current path is not followed.
    pub fn subtree(&self, root: u64) -> StoreResult<Vec<u64>> {
        self.get_meta(root)?;
        let mut out = Vec::new();
        let mut path = Vec::new();
        self.collect_subtree(root, &mut path, &mut out);
        Ok(out)
    }

    fn collect_subtree(&self, id: u64, path: &mut Vec<u64>, out: &mut Vec<u64>) {
        let Some(meta) = self.metadata_dump().get(&id) else {
            return;
        };
        out.push(id);
        path.push(id);
        for &child in &meta.subnotes {
            if path.contains(&child) {
                log::warn!("link cycle: note {child} is an ancestor of {id}");
                continue;
            }
            self.collect_subtree(child, path, out);
        }
        path.pop();
    }
}

/// Forwards whole per-note batches until `pending` workers have reported.
fn relay(
    mut pending: usize,
    batches: Receiver<Receiver<SearchResult>>,
    out: SyncSender<SearchResult>,
) {
    while pending > 0 {
        let Ok(batch) = batches.recv() else {
            break;
        };
        for result in batch {
            if out.send(result).is_err() {
                return;
            }
        }
        pending -= 1;
    }
}

/// A finished batch holding only `source`, for a note that got no worker.
fn failed_batch(note: NoteMeta, source: std::io::Error) -> Receiver<SearchResult> {
    let (tx, rx) = mpsc::sync_channel(1);
    let _ = tx.send(Err(SearchFailure { note, source }));
    rx
}

fn scan_body(note: NoteMeta, body: PathBuf, re: &Regex, tx: &SyncSender<SearchResult>) {
    let file = match std::fs::File::open(&body) {
        Ok(file) => file,
        Err(source) => {
            let _ = tx.send(Err(SearchFailure { note, source }));
            return;
        }
    };
    let mut reader = BufReader::new(file);
    let mut buf = Vec::new();
    let mut line_number = 0;
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => break,
            Ok(_) => {
                line_number += 1;
                let text = String::from_utf8_lossy(&buf);
                let line = text.strip_suffix('\n').unwrap_or(&text);
                let line = line.strip_suffix('\r').unwrap_or(line);
                if re.is_match(line) {
                    let hit = SearchHit {
                        note: note.clone(),
                        line_number,
                        line: line.to_string(),
                    };
                    if tx.send(Ok(hit)).is_err() {
                        return;
                    }
                }
            }
            Err(source) => {
                let _ = tx.send(Err(SearchFailure { note, source }));
                return;
            }
        }
    }
}
