use cinescape::prelude::*;
use cinescape::Error;
use std::sync::{Arc, Mutex};

fn events(challenge: &Challenge) -> Arc<Mutex<Vec<String>>> {
    let log = Arc::new(Mutex::new(Vec::new()));
    for event in [
        ChallengeEvent::Progress,
        ChallengeEvent::Increase,
        ChallengeEvent::Decrease,
        ChallengeEvent::Complete,
        ChallengeEvent::Uncomplete,
    ] {
        let sink = Arc::clone(&log);
        challenge.add_listener(
            event,
            Callback::new(move |snapshot: &ChallengeSnapshot| {
                sink.lock().unwrap().push(snapshot.event.clone())
            }),
            Scope::Instance,
        );
    }
    log
}

fn count(log: &Arc<Mutex<Vec<String>>>, event: ChallengeEvent) -> usize {
    log.lock()
        .unwrap()
        .iter()
        .filter(|name| name.as_str() == event.as_str())
        .count()
}

#[test]
fn three_solves_complete_a_solve_puzzle_challenge() {
    let engine = RoomEngine::in_memory();
    let challenge = create_challenge(&engine, "solvePuzzle", 3, None)
        .unwrap()
        .unwrap();
    let log = events(&challenge);
    let level = engine.create_level("cinema");

    for id in ["poster", "ticket", "reel"] {
        level.add_puzzle(id).solve();
    }

    assert_eq!(challenge.progress(), 3);
    assert!(challenge.completed());
    assert_eq!(count(&log, ChallengeEvent::Complete), 1);
    assert_eq!(count(&log, ChallengeEvent::Increase), 3);
}

#[test]
fn jumping_past_the_goal_completes() {
    let engine = RoomEngine::in_memory();
    let challenge = create_challenge(&engine, "solvePuzzle", 5, None)
        .unwrap()
        .unwrap();
    let log = events(&challenge);

    challenge.set_progress(10);

    assert!(challenge.completed());
    assert_eq!(count(&log, ChallengeEvent::Complete), 1);
}

#[test]
fn complete_and_uncomplete_are_idempotent() {
    let engine = RoomEngine::in_memory();
    let challenge = create_challenge(&engine, "completeLevel", 2, None)
        .unwrap()
        .unwrap();
    let log = events(&challenge);

    assert!(!challenge.uncomplete());
    assert!(challenge.complete());
    assert!(!challenge.complete());
    assert_eq!(challenge.progress(), 2);
    assert!(challenge.uncomplete());
    assert!(!challenge.uncomplete());
    assert_eq!(challenge.progress(), 0);

    assert_eq!(count(&log, ChallengeEvent::Complete), 1);
    assert_eq!(count(&log, ChallengeEvent::Uncomplete), 1);
}

#[test]
fn completed_levels_feed_complete_level_challenges() {
    let engine = RoomEngine::in_memory();
    let challenge = create_challenge(&engine, "completeLevel", 2, None)
        .unwrap()
        .unwrap();

    for name in ["lobby", "projection"] {
        let level = engine.create_level(name);
        level.add_puzzle("door").solve();
        assert!(level.completed());
    }

    assert!(challenge.completed());
}

#[test]
fn restore_reproduces_the_stored_challenge() {
    let engine = RoomEngine::in_memory();
    let original = create_challenge(&engine, "solvePuzzleLevel", 4, Some("cinema".to_owned()))
        .unwrap()
        .unwrap();
    original.set_progress(2);

    let by_id = restore_challenge(&engine, original.id()).unwrap().unwrap();
    let by_key = restore_challenge(&engine, original.key()).unwrap().unwrap();

    for restored in [&by_id, &by_key] {
        assert_eq!(restored.id(), original.id());
        assert_eq!(restored.goal(), 4);
        assert_eq!(
            restored.kind(),
            &ChallengeKind::SolvePuzzleLevel {
                level: "cinema".to_owned()
            }
        );
        assert_eq!(restored.progress(), 2);
        assert_eq!(restored.record(), original.record());
    }
    assert_eq!(Challenge::all(&engine).unwrap(), vec![original.id()]);
}

#[test]
fn restoring_keeps_removed_challenges_off_the_list() {
    let engine = RoomEngine::in_memory();
    let challenge = create_challenge(&engine, "solvePuzzle", 1, None)
        .unwrap()
        .unwrap();
    challenge.remove().unwrap();

    let restored = restore_challenge(&engine, challenge.id()).unwrap().unwrap();

    assert!(restored.removed());
    assert!(Challenge::all(&engine).unwrap().is_empty());
    assert!(Challenge::all_instances(&engine).unwrap().is_empty());
}

#[test]
fn unknown_lookups_and_types_yield_none() {
    let engine = RoomEngine::in_memory();

    assert!(restore_challenge(&engine, 99_u64).unwrap().is_none());
    assert!(restore_challenge(&engine, "challenge:99").unwrap().is_none());
    assert!(create_challenge(&engine, "escapeFaster", 1, None)
        .unwrap()
        .is_none());
    assert!(Challenge::all(&engine).unwrap().is_empty());
}

#[test]
fn solve_puzzle_level_requires_a_level() {
    let engine = RoomEngine::in_memory();

    let err = create_challenge(&engine, "solvePuzzleLevel", 2, None).unwrap_err();

    assert!(matches!(err, Error::MissingLevel));
    assert!(Challenge::all(&engine).unwrap().is_empty());
}

#[test]
fn ids_are_never_reused() {
    let engine = RoomEngine::in_memory();
    let first = create_challenge(&engine, "solvePuzzle", 1, None)
        .unwrap()
        .unwrap();
    first.remove().unwrap();
    let second = create_challenge(&engine, "solvePuzzle", 1, None)
        .unwrap()
        .unwrap();

    assert!(second.id() > first.id());
}

#[test]
fn progress_belongs_to_the_logged_in_user() {
    let engine = RoomEngine::in_memory();
    let challenge = create_challenge(&engine, "solvePuzzle", 3, None)
        .unwrap()
        .unwrap();
    challenge.set_progress(2);
    User::new("ana@mail.pt", "Ana")
        .register(engine.storage())
        .unwrap();

    engine.login("ana@mail.pt").unwrap();
    assert_eq!(challenge.progress(), 0);
    challenge.increase_progress(1);

    engine.logout().unwrap();
    assert_eq!(challenge.progress(), 2);
    engine.login("ana@mail.pt").unwrap();
    assert_eq!(challenge.progress(), 1);
}

#[test]
fn class_listeners_see_every_challenge() {
    let engine = RoomEngine::in_memory();
    let completed = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&completed);
    engine.challenge_class().add_listener(
        ChallengeEvent::Complete,
        Callback::new(move |snapshot: &ChallengeSnapshot| {
            sink.lock().unwrap().push(snapshot.record.id)
        }),
    );
    let one = create_challenge(&engine, "solvePuzzle", 1, None)
        .unwrap()
        .unwrap();
    let two = create_challenge(&engine, "solvePuzzle", 2, None)
        .unwrap()
        .unwrap();

    let level = engine.create_level("hall");
    level.add_puzzle("a").solve();
    level.add_puzzle("b").solve();

    assert_eq!(*completed.lock().unwrap(), vec![one.id(), two.id()]);
}

#[test]
fn restoring_a_live_challenge_counts_each_solve_once() {
    let engine = RoomEngine::in_memory();
    let original = create_challenge(&engine, "solvePuzzle", 3, None)
        .unwrap()
        .unwrap();
    let restored = restore_challenge(&engine, original.id()).unwrap().unwrap();
    let listed = Challenge::all_instances(&engine).unwrap();
    assert_eq!(listed.len(), 1);

    engine.create_level("hall").add_puzzle("clock").solve();

    assert_eq!(original.progress(), 1);
    assert_eq!(restored.progress(), 1);
    assert_eq!(engine.puzzle_class().listener_count(PuzzleEvent::Solve), 1);

    drop((original, restored, listed));
    assert_eq!(engine.puzzle_class().listener_count(PuzzleEvent::Solve), 0);

    let revived = restore_challenge(&engine, 0_u64).unwrap().unwrap();
    engine.create_level("attic").add_puzzle("chest").solve();
    assert_eq!(revived.progress(), 2);
}
