use cinescape::config::StorageConfig;
use cinescape::prelude::*;
use std::sync::Arc;

fn config_at(path: &std::path::Path) -> RoomConfig {
    RoomConfig {
        storage: StorageConfig {
            path: Some(path.to_path_buf()),
        },
        ..RoomConfig::default()
    }
}

#[test]
fn challenges_and_progress_survive_a_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("room.json");

    let (id, level_id) = {
        let engine = RoomEngine::new(config_at(&path)).unwrap();
        let solve = create_challenge(&engine, "solvePuzzle", 3, None)
            .unwrap()
            .unwrap();
        let in_level = create_challenge(&engine, "solvePuzzleLevel", 2, Some("hall".to_owned()))
            .unwrap()
            .unwrap();
        let level = engine.create_level("hall");
        level.add_puzzle("clock").solve();
        level.add_puzzle("mirror").solve();
        assert!(in_level.completed());
        (solve.id(), in_level.id())
    };

    let engine = RoomEngine::new(config_at(&path)).unwrap();
    let restored = Challenge::all_instances(&engine).unwrap();

    assert_eq!(
        restored.iter().map(Challenge::id).collect::<Vec<_>>(),
        vec![id, level_id]
    );
    assert_eq!(restored[0].progress(), 2);
    assert!(restored[1].completed());

    let next = create_challenge(&engine, "completeLevel", 1, None)
        .unwrap()
        .unwrap();
    assert_eq!(next.id(), level_id + 1);
}

#[test]
fn under_seconds_attempts_restart_on_restore() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("room.json");

    let id = {
        let engine = RoomEngine::new(config_at(&path)).unwrap();
        let challenge = create_challenge(&engine, "completeUnderSeconds", 30, None)
            .unwrap()
            .unwrap();
        challenge.set_progress(12);
        challenge.id()
    };

    let engine = RoomEngine::new(config_at(&path)).unwrap();
    let restored = restore_challenge(&engine, id).unwrap().unwrap();

    assert_eq!(restored.progress(), 0);
    assert!(restored.completed());
}

#[test]
fn logged_in_user_is_resumed_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("room.json");
    {
        let engine = RoomEngine::new(config_at(&path)).unwrap();
        User::new("rui@mail.pt", "Rui Sousa")
            .register(engine.storage())
            .unwrap();
        assert!(engine.login("rui@mail.pt").unwrap());
    }

    let storage: Arc<dyn Storage> = Arc::new(FileStorage::open(&path).unwrap());
    let engine = RoomEngine::with_storage(RoomConfig::default(), storage).unwrap();

    assert_eq!(engine.active_user().nick(), "Rui");
    assert_eq!(User::all(engine.storage()).unwrap(), vec!["rui@mail.pt"]);
}

#[test]
fn corrupt_records_surface_as_errors() {
    let engine = RoomEngine::in_memory();
    engine
        .storage()
        .set("challenge:4", "{not json".to_owned())
        .unwrap();

    assert!(matches!(
        restore_challenge(&engine, 4_u64),
        Err(cinescape::Error::Serialization(_))
    ));
}
