use anyhow::Result;
use cinescape::prelude::*;
use colored::Colorize;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Load the configuration: optional TOML file, then CINESCAPE_* variables.
    let path = std::env::args().nth(1).map(PathBuf::from);
    let mut config = RoomConfig::load(path.as_deref())?;
    // The demo should not take ten minutes.
    config.timer.speed_ms = config.timer.speed_ms.min(200);

    // 2. Initialize structured logging.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    // 3. Create the RoomEngine instance.
    let engine = RoomEngine::new(config)?;

    // 4. Listen to every entity kind at class scope.
    spawn_class_listeners(&engine);

    // 5. Register challenges, then play a level against the clock.
    let challenges = register_challenges(&engine)?;
    play_level(&engine).await;

    // 6. Report.
    for challenge in challenges {
        let status = if challenge.completed() {
            "done".green()
        } else {
            "open".yellow()
        };
        println!(
            "  #{:<3} [{}] {} ({}/{})",
            challenge.id(),
            status,
            challenge.readable(),
            challenge.progress(),
            challenge.goal()
        );
    }

    Ok(())
}

fn spawn_class_listeners(engine: &RoomEngine) {
    engine.puzzle_class().add_listener(
        PuzzleEvent::Solve,
        Callback::new(|puzzle: &PuzzleSnapshot| info!("[PUZZLE] => solved {:?}", puzzle.id)),
    );
    engine.level_class().add_listener(
        LevelEvent::Complete,
        Callback::new(|level: &LevelSnapshot| info!("[LEVEL] => completed {:?}", level.name)),
    );
    engine.challenge_class().add_listener(
        ChallengeEvent::Complete,
        Callback::new(|challenge: &ChallengeSnapshot| {
            println!(
                "{} challenge #{} complete",
                "<--".green().bold(),
                challenge.record.id
            )
        }),
    );
}

fn register_challenges(engine: &RoomEngine) -> Result<Vec<Challenge>> {
    let mut challenges = Vec::new();
    let requests = [
        ("solvePuzzle", 3, None),
        ("solvePuzzleLevel", 2, Some("projection room".to_owned())),
        ("completeLevel", 1, None),
        ("completeUnderSeconds", 8, None),
    ];
    for (kind, goal, level) in requests {
        if let Some(challenge) = create_challenge(engine, kind, goal, level)? {
            info!("[CHALLENGE] => registered #{}: {}", challenge.id(), challenge.readable());
            challenges.push(challenge);
        }
    }
    Ok(challenges)
}

async fn play_level(engine: &RoomEngine) {
    let level = engine.create_level("projection room");
    let puzzles = ["reel", "lens", "ticket"].map(|id| level.add_puzzle(id));

    let timer = engine.create_timer(10, false, None);
    for (moment, puzzle) in [(2, 0), (4, 1), (6, 2)] {
        let puzzle = puzzles[puzzle].clone();
        timer.add_breakpoint_once(
            moment,
            Callback::new(move |snapshot: &TimerSnapshot| {
                info!("[TIMER] => t={} solving {}", snapshot.time, puzzle.id());
                puzzle.solve();
            }),
        );
    }
    timer.add_listener(
        TimerEvent::Stop,
        Callback::new(|snapshot: &TimerSnapshot| {
            info!("[TIMER] => stopped at t={}", snapshot.time)
        }),
        Scope::Instance,
    );
    level.add_listener(
        LevelEvent::Complete,
        {
            let timer = timer.clone();
            Callback::new(move |_: &LevelSnapshot| {
                timer.pause();
            })
        },
        Scope::Instance,
    );

    timer.start();
    while timer.running() {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    println!(
        "{} level {:?} finished at t={} ({} puzzles solved)",
        "-->".cyan().bold(),
        level.name(),
        timer.time(),
        level.puzzles_solved()
    );
}
