//! Integration tests for loading library snapshot files.

use std::fs;

use collection_library_rs::prelude::*;
use tempfile::tempdir;

const SNAPSHOT: &str = r#"{
    "entities": [
        {
            "id": 1,
            "kind": "series",
            "name": "Cowboy Bebop",
            "anime_type": "TV",
            "resolutions": ["1080p"],
            "tags": ["space", "noir"],
            "episode_count": 26,
            "air_date": "1998-04-03",
            "added_at": "2025-01-01T00:00:00Z"
        },
        {
            "id": 2,
            "kind": "group",
            "name": "Gundam",
            "added_at": "2025-01-02T00:00:00Z"
        }
    ],
    "users": [
        {
            "id": 1,
            "username": "alice",
            "watch": {
                "1": { "watched_episodes": 26, "is_favorite": true }
            }
        }
    ]
}"#;

#[test]
fn test_load_snapshot_and_serve_providers() {
    let dir = tempdir().expect("failed to create temp dir");
    let path = dir.path().join("library.json");
    fs::write(&path, SNAPSHOT).expect("failed to write snapshot");

    let snapshot = LibrarySnapshot::load(&path).expect("failed to load snapshot");
    assert_eq!(snapshot.entities.len(), 2);
    assert_eq!(snapshot.users.len(), 1);

    let library = InMemoryLibrary::from_snapshot(snapshot);
    assert_eq!(
        library.entity_ids(EntityKind::Series).unwrap(),
        vec![EntityId(1)]
    );

    let bebop = library.entity(EntityId(1)).unwrap().unwrap();
    assert_eq!(bebop.anime_type, Some(AnimeType::TV));
    assert!(bebop.tags.contains("noir"));

    let alice = library.user(UserId(1)).unwrap().unwrap();
    let record = alice.record(EntityId(1)).unwrap();
    assert_eq!(record.watched_episodes, 26);
    assert!(record.is_favorite);
}

#[test]
fn test_load_missing_snapshot_is_io_error() {
    let dir = tempdir().expect("failed to create temp dir");
    let err = LibrarySnapshot::load(&dir.path().join("nope.json")).unwrap_err();
    assert!(matches!(err, ProviderError::Io { .. }));
}

#[test]
fn test_load_invalid_snapshot_is_json_error() {
    let dir = tempdir().expect("failed to create temp dir");
    let path = dir.path().join("library.json");
    fs::write(&path, "{ not json").expect("failed to write snapshot");

    let err = LibrarySnapshot::load(&path).unwrap_err();
    assert!(matches!(err, ProviderError::Json(_)));
}
