use std::collections::BTreeMap;

use tempfile::TempDir;
use zk_core::{SearchHit, Store, StoreError, ROOT_ID};

const GREP_BODY: &str = "Test note title xyzzy
This is the note. Not every line contains a match.
There are three lines which will match a regex that consists of an x, followed by some non-space chars, followed by a y, and this is not one.
But this line matches: x12y
And xFFFF*y matches too, as does the title.";

fn new_store() -> (TempDir, Store) {
    let dir = tempfile::tempdir().unwrap();
    let store = Store::init(dir.path().join("zk")).unwrap();
    (dir, store)
}

fn hits(search: zk_core::Search) -> Vec<SearchHit> {
    search.map(|r| r.unwrap()).collect()
}

#[test]
fn grep_finds_three_lines_in_one_note() {
    let (_dir, mut store) = new_store();
    let id = store.create_note(ROOT_ID, GREP_BODY).unwrap();

    let found = hits(store.search(r"x\S+y", &[]).unwrap());
    assert_eq!(found.len(), 3);
    assert!(found.iter().all(|h| h.note.id == id));
    assert_eq!(
        found.iter().map(|h| h.line_number).collect::<Vec<_>>(),
        vec![1, 4, 5]
    );
    assert_eq!(found[1].line, "But this line matches: x12y");
}

#[test]
fn invalid_pattern_fails_up_front() {
    let (_dir, store) = new_store();
    assert!(matches!(store.search("(unclosed", &[]), Err(StoreError::Pattern(_))));
}

#[test]
fn scope_restricts_and_drops_unknown_ids() {
    let (_dir, mut store) = new_store();
    let a = store.create_note(ROOT_ID, "alpha needle\n").unwrap();
    let _b = store.create_note(ROOT_ID, "beta needle\n").unwrap();

    let found = hits(store.search("needle", &[a, 404]).unwrap());
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].note.id, a);

    assert_eq!(hits(store.search("needle", &[404]).unwrap()).len(), 0);
}

#[test]
fn results_per_note_are_contiguous_and_ordered() {
    let (_dir, mut store) = new_store();
    let mut ids = Vec::new();
    for n in 0..12 {
        let body: String = (1..=20).map(|l| format!("note {n} hit {l}\n")).collect();
        ids.push(store.create_note(ROOT_ID, &body).unwrap());
    }

    let found = hits(store.search("hit", &[]).unwrap());
    assert_eq!(found.len(), 12 * 20);

    let mut seen = Vec::new();
    for hit in &found {
        if seen.last() != Some(&hit.note.id) {
            assert!(!seen.contains(&hit.note.id), "note {} interleaved", hit.note.id);
            seen.push(hit.note.id);
        }
    }
    let mut per_note: BTreeMap<u64, Vec<usize>> = BTreeMap::new();
    for hit in found {
        per_note.entry(hit.note.id).or_default().push(hit.line_number);
    }
    for lines in per_note.values() {
        assert_eq!(*lines, (1..=20).collect::<Vec<_>>());
    }
}

#[test]
fn unreadable_body_is_isolated() {
    let (dir, mut store) = new_store();
    let a = store.create_note(ROOT_ID, "needle a\n").unwrap();
    let b = store.create_note(ROOT_ID, "needle b\n").unwrap();
    std::fs::remove_file(dir.path().join("zk").join(b.to_string()).join("body")).unwrap();

    let results: Vec<_> = store.search("needle", &[]).unwrap().collect();
    assert_eq!(results.len(), 2);
    let failure = results.iter().find_map(|r| r.as_ref().err()).unwrap();
    assert_eq!(failure.note.id, b);
    let hit = results.iter().find_map(|r| r.as_ref().ok()).unwrap();
    assert_eq!(hit.note.id, a);
}

#[test]
fn empty_store_search_ends() {
    let (_dir, store) = new_store();
    assert!(hits(store.search("anything", &[]).unwrap()).is_empty());
}

#[test]
fn tree_search_covers_subtree_only() {
    let (_dir, mut store) = new_store();
    let a = store.create_note(ROOT_ID, "needle a\n").unwrap();
    let a1 = store.create_note(a, "needle a1\n").unwrap();
    let a11 = store.create_note(a1, "needle a11\n").unwrap();
    let b = store.create_note(ROOT_ID, "needle b\n").unwrap();

    assert_eq!(store.subtree(a).unwrap(), vec![a, a1, a11]);
    let mut found: Vec<u64> = hits(store.tree_search("needle", a).unwrap())
        .into_iter()
        .map(|h| h.note.id)
        .collect();
    found.sort();
    assert_eq!(found, vec![a, a1, a11]);
    assert!(!found.contains(&b));

    assert!(matches!(
        store.tree_search("needle", 99),
        Err(StoreError::NoteNotFound(99))
    ));
}

#[test]
fn tree_search_visits_multiply_linked_note_per_path() {
    let (_dir, mut store) = new_store();
    let a = store.create_note(ROOT_ID, "a\n").unwrap();
    let b = store.create_note(ROOT_ID, "b\n").unwrap();
    let shared = store.create_note(a, "needle shared\n").unwrap();
    store.link_note(b, shared).unwrap();

    assert_eq!(store.subtree(ROOT_ID).unwrap(), vec![ROOT_ID, a, shared, b, shared]);
    let found = hits(store.tree_search("needle", ROOT_ID).unwrap());
    assert_eq!(found.len(), 2);
    assert!(found.iter().all(|h| h.note.id == shared));
}

#[test]
fn tree_search_stops_at_link_cycles() {
    let (_dir, mut store) = new_store();
    let a = store.create_note(ROOT_ID, "a\n").unwrap();
    let b = store.create_note(a, "b\n").unwrap();
    store.link_note(b, a).unwrap();

    assert_eq!(store.subtree(a).unwrap(), vec![a, b]);
}
