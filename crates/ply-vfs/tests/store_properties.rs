//! Property tests for the virtual file store.

use ply_vfs::{FileLeaf, VirtualFileStore};
use proptest::prelude::*;

fn segment() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{0,6}(\\.[a-z]{1,3})?"
}

fn store_path() -> impl Strategy<Value = String> {
    prop::collection::vec(segment(), 1..5).prop_map(|segments| segments.join("/"))
}

fn populated_store() -> impl Strategy<Value = VirtualFileStore> {
    prop::collection::vec((store_path(), ".{0,20}", any::<bool>()), 0..20).prop_map(|entries| {
        let mut store = VirtualFileStore::new();
        for (path, content, modifiable) in entries {
            // Paths that clash with an existing file are skipped.
            let _ = store.create_file_with(&path, FileLeaf { content, modifiable });
        }
        store
    })
}

proptest! {
    #[test]
    fn created_file_exists_until_deleted(path in store_path(), content in ".{0,40}") {
        let mut store = VirtualFileStore::new();
        let _ = store.create_file(&path, content).unwrap();
        prop_assert!(store.exists(&path));
        store.delete(&path).unwrap();
        prop_assert!(!store.exists(&path));
    }

    #[test]
    fn created_folder_exists_until_deleted(path in store_path()) {
        let mut store = VirtualFileStore::new();
        let _ = store.create_folder(&path).unwrap();
        prop_assert!(store.exists(&path));
        store.delete(&path).unwrap();
        prop_assert!(!store.exists(&path));
    }

    #[test]
    fn flatten_round_trips(store in populated_store()) {
        let flat = store.flatten();
        let rebuilt = VirtualFileStore::from_flat(&flat).unwrap();
        prop_assert_eq!(rebuilt.flatten(), flat);
    }

    #[test]
    fn failed_relocate_never_changes_store(store in populated_store(), from in store_path(), to in store_path()) {
        let mut candidate = store.clone();
        if candidate.relocate(&from, &to).is_err() {
            prop_assert_eq!(candidate, store);
        } else {
            prop_assert!(!candidate.exists(&from));
            prop_assert!(candidate.exists(&to));
        }
    }
}
