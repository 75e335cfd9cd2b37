use anyhow::Result;
use cinescape::prelude::*;
use cinescape::{ENGINE_NAME, VERSION as LIB_VERSION};
use colored::Colorize;
use rustyline::highlight::Highlighter;
use rustyline::Editor;
use rustyline_derive::{Completer, Helper, Hinter, Validator};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::env;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

const SHELL_VERSION: &str = env!("CARGO_PKG_VERSION");

/// A custom helper struct for rustyline that enables syntax highlighting.
#[derive(Completer, Helper, Hinter, Validator)]
struct CommandHighlighter;

impl Highlighter for CommandHighlighter {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        if let Some((command, rest)) = line.split_once(' ') {
            Cow::Owned(format!("{} {}", command.yellow().bold(), rest.yellow()))
        } else {
            Cow::Owned(line.yellow().bold().to_string())
        }
    }

    fn highlight_char(&self, _line: &str, _pos: usize, _forced: bool) -> bool {
        true
    }
}

fn print_banner() {
    if env::var("QUIET_MODE").is_ok() {
        return;
    }
    const LOGO_TEXT: &str = include_str!("../logo.log");
    println!("{}", LOGO_TEXT.cyan());

    let version_string = format!(
        "          Shell   v{:<8} Library   v{:<8}",
        SHELL_VERSION, LIB_VERSION
    );
    let rule = "-".repeat(79);
    println!("{}", rule.dimmed());
    println!("{}", version_string);
    println!(
        "{}",
        "\n    Distributed under the MIT OR Apache-2.0 license. Use at your own risk.\n".dimmed()
    );
    println!("{}", rule.dimmed());
}

/// Prints timer steps while `watching` is set, and every challenge completion.
fn spawn_event_listeners(engine: &RoomEngine, watching: Arc<AtomicBool>) {
    engine.timer_class().add_listener(
        TimerEvent::Step,
        Callback::new(move |snapshot: &TimerSnapshot| {
            if watching.load(Ordering::Relaxed) {
                println!(
                    "<-- [STEP] t={} ({} left)",
                    snapshot.time, snapshot.remaining_time
                );
            }
        }),
    );
    engine.timer_class().add_listener(
        TimerEvent::Stop,
        Callback::new(|snapshot: &TimerSnapshot| {
            println!("\n<-- [TIMER] stopped at t={}\n>> ", snapshot.time)
        }),
    );
    for event in [ChallengeEvent::Complete, ChallengeEvent::Uncomplete] {
        engine.challenge_class().add_listener(
            event,
            Callback::new(|snapshot: &ChallengeSnapshot| {
                println!(
                    "\n<-- [CHALLENGE #{}] {} ({}/{})\n>> ",
                    snapshot.record.id, snapshot.event, snapshot.progress, snapshot.record.goal
                )
            }),
        );
    }
}

/// Everything the shell keeps alive between commands.
struct Session {
    engine: RoomEngine,
    level: Level,
    timer: Timer,
    challenges: BTreeMap<u64, Challenge>,
}

impl Session {
    fn new(engine: RoomEngine) -> Result<Self> {
        let challenges = Challenge::all_instances(&engine)?
            .into_iter()
            .map(|challenge| (challenge.id(), challenge))
            .collect();
        Ok(Self {
            level: engine.create_level("lobby"),
            timer: engine.level_timer(),
            challenges,
            engine,
        })
    }

    fn timer(&self, args: &[&str]) {
        match args.first().copied() {
            Some("start") => {
                if !self.timer.start() {
                    println!("--> Timer is already running.");
                }
            }
            Some("pause") => {
                if !self.timer.pause() {
                    println!("--> Timer is already paused.");
                }
            }
            Some("stop") => self.timer.stop(),
            Some("reset") => self.timer.reset(),
            Some("status") | None => println!(
                "--> t={} / {} ({})",
                self.timer.time(),
                self.timer.stop_time(),
                if self.timer.running() { "running" } else { "paused" }
            ),
            Some(other) => println!("Unknown 'timer' command '{}'. Try 'help'.", other),
        }
    }

    fn challenge(&mut self, args: &[&str]) -> Result<()> {
        match args.first().copied() {
            Some("add") => {
                let (Some(kind), Some(goal)) = (args.get(1), args.get(2)) else {
                    println!("Usage: challenge add <TYPE> <GOAL> [LEVEL]");
                    return Ok(());
                };
                let Ok(goal) = goal.parse::<i64>() else {
                    println!("Error: '{}' is not a valid goal.", goal);
                    return Ok(());
                };
                let level = (args.len() > 3).then(|| args[3..].join(" "));
                match create_challenge(&self.engine, kind, goal, level) {
                    Ok(Some(challenge)) => {
                        println!("--> Added challenge #{}: {}", challenge.id(), challenge.readable());
                        self.challenges.insert(challenge.id(), challenge);
                    }
                    Ok(None) => println!(
                        "Error: unknown challenge type '{}'. Known: {}",
                        kind,
                        ChallengeKind::DISCRIMINANTS.join(", ")
                    ),
                    Err(err) => println!("Error: {}", err),
                }
            }
            Some("list") | None => {
                println!("Registered challenges:");
                for challenge in self.challenges.values().filter(|c| !c.removed()) {
                    let mark = if challenge.completed() { "x".green() } else { " ".normal() };
                    println!(
                        "  [{}] #{:<3} {} ({}/{})",
                        mark,
                        challenge.id(),
                        challenge.readable(),
                        challenge.progress(),
                        challenge.goal()
                    );
                }
            }
            Some(command @ ("remove" | "restore" | "complete" | "uncomplete")) => {
                let Some(id) = args.get(1).and_then(|id| id.parse::<u64>().ok()) else {
                    println!("Usage: challenge {} <ID>", command);
                    return Ok(());
                };
                if command == "restore" {
                    match restore_challenge(&self.engine, id)? {
                        Some(challenge) => {
                            challenge.add()?;
                            self.challenges.insert(id, challenge);
                            println!("--> Restored challenge #{}.", id);
                        }
                        None => println!("Error: no stored challenge #{}.", id),
                    }
                    return Ok(());
                }
                let Some(challenge) = self.challenges.get(&id) else {
                    println!("Error: unknown challenge #{}. Use 'challenge list'.", id);
                    return Ok(());
                };
                match command {
                    "remove" => {
                        challenge.remove()?;
                        println!("--> Challenge #{} removed.", id);
                    }
                    "complete" => {
                        challenge.complete();
                    }
                    _ => {
                        challenge.uncomplete();
                    }
                }
            }
            Some(other) => println!("Unknown 'challenge' command '{}'. Try 'help'.", other),
        }
        Ok(())
    }

    fn puzzle(&self, args: &[&str]) {
        let (Some(action), Some(id)) = (args.first().copied(), args.get(1)) else {
            println!("Usage: puzzle <solve|unsolve|miss> <ID>");
            return;
        };
        let puzzle = self
            .level
            .puzzle(id)
            .unwrap_or_else(|| self.level.add_puzzle(*id));
        let changed = match action {
            "solve" => puzzle.solve(),
            "unsolve" => puzzle.unsolve(),
            "miss" => puzzle.miss(),
            other => {
                println!("Unknown 'puzzle' command '{}'. Try 'help'.", other);
                return;
            }
        };
        if !changed {
            println!("--> Nothing to do for puzzle '{}'.", id);
        }
    }

    fn level(&self) {
        println!(
            "--> Level '{}': {}/{} puzzles solved{}",
            self.level.name(),
            self.level.puzzles_solved(),
            self.level.puzzles().len(),
            if self.level.completed() { ", complete" } else { "" }
        );
        for puzzle in self.level.puzzles() {
            println!("  {} {}", if puzzle.solved() { "x" } else { "-" }, puzzle.id());
        }
    }

    fn users(&self, command: &str, args: &[&str]) -> Result<()> {
        match command {
            "login" => {
                let Some(email) = args.first() else {
                    println!("Usage: login <EMAIL>");
                    return Ok(());
                };
                if self.engine.login(email)? {
                    println!("--> Welcome back, {}.", self.engine.active_user().nick());
                } else {
                    println!("Error: '{}' is not registered.", email);
                }
            }
            "register" => {
                let Some(email) = args.first() else {
                    println!("Usage: register <EMAIL> <NAME...>");
                    return Ok(());
                };
                if User::exists(self.engine.storage(), email) {
                    println!("Error: '{}' is already registered.", email);
                    return Ok(());
                }
                User::new(*email, args[1..].join(" ")).register(self.engine.storage())?;
                self.engine.login(email)?;
                println!("--> Registered and logged in as {}.", email);
            }
            _ => {
                self.engine.logout()?;
                println!("--> Logged out.");
            }
        }
        Ok(())
    }
}

fn print_help() {
    println!("Available commands:");
    println!("  timer <start|pause|stop|reset|status>     - Controls the level timer.");
    println!("  challenge add <TYPE> <GOAL> [LEVEL]       - Registers a challenge.");
    println!("  challenge list                            - Shows challenges and progress.");
    println!("  challenge <remove|restore> <ID>           - Unregisters or restores a challenge.");
    println!("  challenge <complete|uncomplete> <ID>      - Forces a challenge's state.");
    println!("  puzzle <solve|unsolve|miss> <ID>          - Plays a puzzle of the current level.");
    println!("  level                                     - Shows the current level.");
    println!("  register <EMAIL> <NAME...>                - Creates a profile and logs in.");
    println!("  login <EMAIL> | logout                    - Switches profile.");
    println!("  watch <on|off>                            - Prints every timer step.");
    println!("  exit                                      - Quits the shell.");
}

#[tokio::main]
async fn main() -> Result<()> {
    print_banner();

    let path = env::args().nth(1).map(PathBuf::from);
    let config = RoomConfig::load(path.as_deref())?;
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let engine = RoomEngine::new(config)?;
    let watching = Arc::new(AtomicBool::new(false));
    spawn_event_listeners(&engine, watching.clone());

    let mut session = Session::new(engine)?;
    info!(
        "{} ready as {}",
        ENGINE_NAME.cyan(),
        session.engine.active_user().email
    );

    let mut rl = Editor::new()?;
    rl.set_helper(Some(CommandHighlighter));

    println!("{} is running. Type 'help' for commands or 'exit' to quit.", ENGINE_NAME.cyan());

    loop {
        let prompt = format!("{}", ">> ".cyan().bold());
        match rl.readline(&prompt) {
            Ok(line) => {
                rl.add_history_entry(line.as_str())?;
                let args = line.split_whitespace().collect::<Vec<_>>();
                let Some((command, rest)) = args.split_first() else {
                    continue;
                };
                let outcome = match *command {
                    "timer" => {
                        session.timer(rest);
                        Ok(())
                    }
                    "challenge" => session.challenge(rest),
                    "puzzle" => {
                        session.puzzle(rest);
                        Ok(())
                    }
                    "level" => {
                        session.level();
                        Ok(())
                    }
                    "login" | "register" | "logout" => session.users(command, rest),
                    "watch" => {
                        let on = rest.first() != Some(&"off");
                        watching.store(on, Ordering::Relaxed);
                        println!("--> {} watching timer steps.", if on { "Started" } else { "Stopped" });
                        Ok(())
                    }
                    "help" => {
                        print_help();
                        Ok(())
                    }
                    "exit" => break,
                    _ => {
                        println!("Unknown command: '{}'. Type 'help'.", line.trim());
                        Ok(())
                    }
                };
                if let Err(err) = outcome {
                    println!("Error: {}", err);
                }
            }
            Err(_) => {
                println!("Exiting cineshell...");
                break;
            }
        }
    }

    Ok(())
}
