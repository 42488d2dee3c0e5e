use folio_core::StoreConfig;
use folio_store::{MemStorage, NewMessage, NewProject, Storage};

#[test]
fn snapshot_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data").join("folio.json");

    {
        let mut store = MemStorage::open(&path).unwrap();
        store
            .create_project(NewProject {
                title: "Folio".into(),
                description: "Portfolio engine".into(),
                tech_stack: "Rust, wasm".into(),
                featured: true,
                ..Default::default()
            })
            .unwrap();
        store
            .create_message(NewMessage {
                name: "Ada".into(),
                email: "ada@example.com".into(),
                subject: "Hello".into(),
                message: "Great work".into(),
            })
            .unwrap();
        store.mark_message_read(1).unwrap();
    }
    assert!(path.exists());

    let mut reopened = MemStorage::open(&path).unwrap();
    assert_eq!(reopened.projects().len(), 1);
    assert_eq!(reopened.projects()[0].title, "Folio");
    assert!(reopened.message(1).unwrap().read);

    // Counters continue from the file rather than restarting.
    let next = reopened
        .create_project(NewProject {
            title: "Second".into(),
            description: "d".into(),
            tech_stack: "t".into(),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(next.id, 2);
}

#[test]
fn snapshot_is_camel_case_json() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("folio.json");
    let mut store = MemStorage::open(&path).unwrap();
    store.seed_sample_data().unwrap();

    let raw = std::fs::read_to_string(&path).unwrap();
    let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(json["projects"].as_array().unwrap().len(), 2);
    assert_eq!(json["projects"][0]["techStack"], "JavaScript, HTML, CSS");
    assert_eq!(json["nextIds"]["project"], 3);
}

#[test]
fn corrupt_snapshot_is_a_storage_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("folio.json");
    std::fs::write(&path, "{ not json").unwrap();
    let err = MemStorage::open(&path).unwrap_err();
    assert!(err.to_string().starts_with("storage error"));
}

#[test]
fn config_seeds_only_an_empty_store() {
    let dir = tempfile::tempdir().unwrap();
    let config = StoreConfig {
        data_file: Some(dir.path().join("folio.json")),
        seed_sample_data: true,
    };

    let mut store = MemStorage::from_config(&config).unwrap();
    assert_eq!(store.projects().len(), 2);
    store.delete_project(1).unwrap();
    drop(store);

    let store = MemStorage::from_config(&config).unwrap();
    let titles: Vec<_> = store.projects().into_iter().map(|p| p.title).collect();
    assert_eq!(titles, vec!["MaestraMind"]);
}

#[test]
fn failed_snapshot_write_leaves_store_unchanged() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("folio.json");
    let mut store = MemStorage::open(&path).unwrap();
    let kept = store
        .create_project(NewProject {
            title: "Kept".into(),
            description: "Written before the disk went bad".into(),
            tech_stack: "Rust".into(),
            ..Default::default()
        })
        .unwrap();

    // A directory where the temp file goes makes every write fail.
    let blocker = dir.path().join("folio.json.tmp");
    std::fs::create_dir(&blocker).unwrap();

    let err = store
        .create_project(NewProject {
            title: "Lost".into(),
            description: "Never persisted".into(),
            tech_stack: "Rust".into(),
            ..Default::default()
        })
        .unwrap_err();
    assert!(matches!(err, folio_core::FolioError::Io(_)), "unexpected error: {err}");
    assert!(store
        .update_project(
            kept.id,
            folio_store::ProjectPatch {
                title: Some("Renamed".into()),
                ..Default::default()
            },
        )
        .is_err());
    assert!(store.delete_project(kept.id).is_err());

    let titles: Vec<_> = store.projects().into_iter().map(|p| p.title).collect();
    assert_eq!(titles, vec!["Kept"]);
    assert_eq!(store.stats().projects, 1);

    // Once the disk recovers, the failed insert has not used up an id.
    std::fs::remove_dir(&blocker).unwrap();
    let next = store
        .create_project(NewProject {
            title: "Next".into(),
            description: "After recovery".into(),
            tech_stack: "Rust".into(),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(next.id, kept.id + 1);

    let reopened = MemStorage::open(&path).unwrap();
    let titles: Vec<_> = reopened.projects().into_iter().map(|p| p.title).collect();
    assert_eq!(titles, vec!["Kept", "Next"]);
}
