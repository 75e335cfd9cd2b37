//! Defines the public event names and payloads of every event source.
//!
//! Listeners are keyed by plain strings, so any name can be dispatched. The
//! enums below name the events the crate itself fires; they convert to the
//! string key through `AsRef<str>`.

use crate::challenge::ChallengeRecord;
use crate::timer::Timer;
use serde::Serialize;

macro_rules! event_names {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $key:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $key),+
                }
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                self.as_str()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

event_names! {
    /// Lifecycle and per-step events of a [`Timer`].
    TimerEvent {
        Start => "start",
        Pause => "pause",
        Stop => "stop",
        Step => "step",
        Reset => "reset",
    }
}

event_names! {
    /// Events fired by a [`Challenge`](crate::challenge::Challenge) as its progress moves.
    ChallengeEvent {
        Progress => "progress",
        Increase => "increase",
        Decrease => "decrease",
        Complete => "complete",
        Uncomplete => "uncomplete",
    }
}

event_names! {
    /// Events fired by a [`Puzzle`](crate::puzzle::Puzzle).
    PuzzleEvent {
        Solve => "solve",
        Unsolve => "unsolve",
        Miss => "miss",
    }
}

event_names! {
    /// Events fired by a [`Level`](crate::puzzle::Level).
    LevelEvent {
        Change => "change",
        Complete => "complete",
    }
}

/// The state of a timer at the moment one of its events fired.
#[derive(Debug, Clone)]
pub struct TimerSnapshot {
    /// The event being dispatched (`"breakpoint"` for breakpoint callbacks).
    pub event: String,
    pub time: i64,
    pub remaining_time: i64,
    pub stop_time: i64,
    pub paused: bool,
    pub running: bool,
    /// A handle to the timer that fired the event.
    pub target: Timer,
}

/// The state of a challenge at the moment one of its events fired.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChallengeSnapshot {
    pub event: String,
    #[serde(flatten)]
    pub record: ChallengeRecord,
    pub progress: i64,
    pub old_progress: i64,
    pub completed: bool,
}

/// The state of a puzzle when it was solved, unsolved or missed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PuzzleSnapshot {
    pub event: String,
    pub id: String,
    pub solved: bool,
    /// The level the puzzle is played in, if any.
    pub level: Option<String>,
}

/// The state of a level when it changed or was completed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LevelSnapshot {
    pub event: String,
    pub name: String,
    pub completed: bool,
    pub puzzles: usize,
    pub puzzles_solved: usize,
}
