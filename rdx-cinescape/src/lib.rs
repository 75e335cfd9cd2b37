//! # Cinescape
//!
//! The event-driven entity model behind a browser-style escape-room game.
//!
//! Cinescape provides the pieces a game UI hangs its logic on: entities that
//! fire named events, a timer that counts up to a stop time, and persisted
//! challenges that track a player's progress across sessions.
//!
//! ## Core Concepts
//!
//! - **Event sources**: Timers, puzzles, levels and challenges all implement
//!   [`EventSource`](components::listener::EventSource). Listeners can be
//!   registered per instance, per class (shared by every entity of a kind) or as
//!   the single `on<event>` handler.
//! - **Breakpoints**: Callbacks keyed by a positive integer moment, fired when a
//!   timer tick lands on that moment.
//! - **Timer**: Advances by `step` every `speed` on the tokio runtime and stops
//!   itself at `stop_time`.
//! - **Challenges**: Listen to puzzle, level or timer events, count progress
//!   for the logged-in user and fire `complete` when their goal is reached.
//! - **RoomEngine**: The explicit context holding the configuration, the
//!   storage backend, the active user and the class-scoped listener hubs.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use cinescape::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     // 1. Load the configuration and build the engine.
//!     let engine = RoomEngine::new(RoomConfig::load(None)?)?;
//!
//!     // 2. Register a challenge; it starts counting right away.
//!     let challenge = create_challenge(&engine, "solvePuzzle", 2, None)?
//!         .expect("solvePuzzle is a known challenge type");
//!     challenge.add_listener(
//!         ChallengeEvent::Complete,
//!         Callback::new(|snapshot: &ChallengeSnapshot| {
//!             println!("challenge #{} complete!", snapshot.record.id)
//!         }),
//!         Scope::Instance,
//!     );
//!
//!     // 3. Build a level and play it.
//!     let level = engine.create_level("projection room");
//!     level.add_puzzle("reel").solve();
//!     level.add_puzzle("lens").solve();
//!
//!     Ok(())
//! }
//! ```

pub const ENGINE_NAME: &str = "Cinescape";
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod challenge;
pub mod common;
pub mod components;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod puzzle;
pub mod storage;
pub mod timer;
pub mod user;

pub use error::{Error, Result};

/// A prelude module for easy importing of the most common Cinescape types.
pub mod prelude {
    pub use crate::challenge::{
        create_challenge, restore_challenge, Challenge, ChallengeKind, ChallengeRecord, ChallengeRef,
    };
    pub use crate::common::{BreakpointId, Callback, ListenerId, Scope};
    pub use crate::components::breakpoint::BreakpointHub;
    pub use crate::components::listener::{EventHub, EventSource};
    pub use crate::config::RoomConfig;
    pub use crate::engine::RoomEngine;
    pub use crate::events::{
        ChallengeEvent, ChallengeSnapshot, LevelEvent, LevelSnapshot, PuzzleEvent,
        PuzzleSnapshot, TimerEvent, TimerSnapshot,
    };
    pub use crate::puzzle::{Level, Puzzle};
    pub use crate::storage::{FileStorage, MemoryStorage, Storage};
    pub use crate::timer::Timer;
    pub use crate::user::User;
}
