//! Datastore contract tests
//!
//! Every scenario runs against both backends through `&dyn Datastore` and
//! must behave identically.

use haredb::{Datastore, Disk, HareError, Ram};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

/// Run `check` against a fresh Ram and a fresh Disk
fn for_each_backend(check: impl Fn(&dyn Datastore)) {
    let ram = Ram::new();
    check(&ram);

    let temp_dir = TempDir::new().unwrap();
    let disk = Disk::open_path(temp_dir.path()).unwrap();
    check(&disk);
}

// =============================================================================
// Contract Tests
// =============================================================================

#[test]
fn test_insert_then_read_roundtrip() {
    for_each_backend(|store| {
        store.create_table("t").unwrap();
        store.insert_rec("t", 1, b"hello").unwrap();
        store.insert_rec("t", 2, b"").unwrap();

        assert_eq!(store.read_rec("t", 1).unwrap(), b"hello".to_vec());
        assert_eq!(store.read_rec("t", 2).unwrap(), Vec::<u8>::new());
    });
}

#[test]
fn test_duplicate_insert_is_conflict() {
    for_each_backend(|store| {
        store.create_table("t").unwrap();
        store.insert_rec("t", 1, b"original").unwrap();

        let err = store.insert_rec("t", 1, b"other").unwrap_err();
        assert!(err.is_conflict());
        assert!(matches!(err, HareError::RecordExists { id: 1, .. }));
        assert_eq!(store.read_rec("t", 1).unwrap(), b"original".to_vec());
    });
}

#[test]
fn test_delete_then_reinsert() {
    for_each_backend(|store| {
        store.create_table("t").unwrap();
        store.insert_rec("t", 1, b"a").unwrap();
        store.insert_rec("t", 2, b"b").unwrap();

        store.delete_rec("t", 1).unwrap();

        let err = store.read_rec("t", 1).unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(store.ids("t").unwrap(), vec![2]);

        store.insert_rec("t", 1, b"again").unwrap();
        assert_eq!(store.read_rec("t", 1).unwrap(), b"again".to_vec());
        assert_eq!(store.ids("t").unwrap(), vec![1, 2]);
    });
}

#[test]
fn test_last_id_is_monotonic_floor() {
    for_each_backend(|store| {
        store.create_table("t").unwrap();
        for id in 1..=3 {
            store.insert_rec("t", id, b"x").unwrap();
        }
        store.delete_rec("t", 3).unwrap();

        let next = store.last_id("t").unwrap() + 1;
        store.insert_rec("t", next, b"y").unwrap();

        assert!(next > 3);
        assert_eq!(store.last_id("t").unwrap(), 4);
    });
}

#[test]
fn test_sized_update_keeps_neighbours() {
    for_each_backend(|store| {
        store.create_table("t").unwrap();
        for id in 1..=5 {
            store.insert_rec("t", id, format!("v{}", id).as_bytes()).unwrap();
        }

        store.update_rec("t", 3, b"much longer than before").unwrap();

        for id in [1, 2, 4, 5] {
            assert_eq!(
                store.read_rec("t", id).unwrap(),
                format!("v{}", id).into_bytes()
            );
        }
        assert_eq!(
            store.read_rec("t", 3).unwrap(),
            b"much longer than before".to_vec()
        );
    });
}

#[test]
fn test_missing_table_errors() {
    for_each_backend(|store| {
        assert!(!store.table_exists("ghost"));
        assert!(matches!(store.ids("ghost"), Err(HareError::TableNotFound(_))));
        assert!(matches!(store.last_id("ghost"), Err(HareError::TableNotFound(_))));
        assert!(matches!(
            store.insert_rec("ghost", 1, b"x"),
            Err(HareError::TableNotFound(_))
        ));
        assert!(matches!(
            store.read_rec("ghost", 1),
            Err(HareError::TableNotFound(_))
        ));
        assert!(matches!(
            store.update_rec("ghost", 1, b"x"),
            Err(HareError::TableNotFound(_))
        ));
        assert!(matches!(
            store.delete_rec("ghost", 1),
            Err(HareError::TableNotFound(_))
        ));
        assert!(matches!(
            store.remove_table("ghost"),
            Err(HareError::TableNotFound(_))
        ));
    });
}

#[test]
fn test_missing_record_errors() {
    for_each_backend(|store| {
        store.create_table("t").unwrap();

        for err in [
            store.read_rec("t", 9).unwrap_err(),
            store.update_rec("t", 9, b"x").unwrap_err(),
            store.delete_rec("t", 9).unwrap_err(),
        ] {
            assert!(matches!(err, HareError::RecordNotFound { id: 9, .. }));
        }
    });
}

#[test]
fn test_table_lifecycle() {
    for_each_backend(|store| {
        store.create_table("b").unwrap();
        store.create_table("a").unwrap();
        assert!(matches!(
            store.create_table("a"),
            Err(HareError::TableExists(_))
        ));
        assert_eq!(store.table_names(), vec!["a", "b"]);

        store.remove_table("a").unwrap();
        assert_eq!(store.table_names(), vec!["b"]);

        // A removed name can be created again, empty
        store.create_table("a").unwrap();
        assert!(store.ids("a").unwrap().is_empty());
    });
}

#[test]
fn test_close_behaves_as_empty() {
    for_each_backend(|store| {
        store.create_table("t").unwrap();
        store.insert_rec("t", 1, b"x").unwrap();

        store.close().unwrap();

        assert!(store.table_names().is_empty());
        assert!(matches!(store.read_rec("t", 1), Err(HareError::TableNotFound(_))));
        store.close().unwrap();
    });
}
