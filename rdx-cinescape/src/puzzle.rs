//! Puzzles and the levels that group them.
//!
//! These are the event sources challenges listen to. Rendering and the actual
//! puzzle mechanics live with the UI; here a puzzle is only its solved state.

use crate::common::{lock, Callback, Scope};
use crate::components::listener::{Emitter, EventHub, EventSource};
use crate::events::{LevelEvent, LevelSnapshot, PuzzleEvent, PuzzleSnapshot};
use std::fmt;
use std::sync::{Arc, Mutex, Weak};
use tracing::{debug, info};

struct PuzzleInner {
    id: String,
    level: Option<String>,
    solved: Mutex<bool>,
    emitter: Emitter<PuzzleSnapshot>,
}

/// A single puzzle. Clones share state and listeners.
#[derive(Clone)]
pub struct Puzzle {
    inner: Arc<PuzzleInner>,
}

impl Puzzle {
    pub fn new(
        class: Arc<EventHub<PuzzleSnapshot>>,
        id: impl Into<String>,
        level: Option<String>,
    ) -> Self {
        Self {
            inner: Arc::new(PuzzleInner {
                id: id.into(),
                level,
                solved: Mutex::new(false),
                emitter: Emitter::new(class),
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    /// The level this puzzle is played in.
    pub fn level(&self) -> Option<&str> {
        self.inner.level.as_deref()
    }

    pub fn solved(&self) -> bool {
        *lock(&self.inner.solved)
    }

    /// Solves the puzzle and fires `solve`. Returns `false` if it already was.
    pub fn solve(&self) -> bool {
        if !self.swap_solved(true) {
            return false;
        }
        debug!(puzzle = %self.id(), "puzzle solved");
        self.dispatch_event(PuzzleEvent::Solve, None);
        true
    }

    /// Unsolves the puzzle and fires `unsolve`. Returns `false` if it was not solved.
    pub fn unsolve(&self) -> bool {
        if !self.swap_solved(false) {
            return false;
        }
        self.dispatch_event(PuzzleEvent::Unsolve, None);
        true
    }

    /// Records a wrong answer. Ignored once the puzzle is solved.
    pub fn miss(&self) -> bool {
        if self.solved() {
            return false;
        }
        self.dispatch_event(PuzzleEvent::Miss, None);
        true
    }

    pub fn set_solved(&self, solved: bool) {
        if solved {
            self.solve();
        } else {
            self.unsolve();
        }
    }

    fn swap_solved(&self, solved: bool) -> bool {
        let mut current = lock(&self.inner.solved);
        if *current == solved {
            return false;
        }
        *current = solved;
        true
    }
}

impl EventSource for Puzzle {
    type Payload = PuzzleSnapshot;

    fn emitter(&self) -> &Emitter<PuzzleSnapshot> {
        &self.inner.emitter
    }

    fn objectify(&self, event: &str) -> PuzzleSnapshot {
        PuzzleSnapshot {
            event: event.to_owned(),
            id: self.inner.id.clone(),
            solved: self.solved(),
            level: self.inner.level.clone(),
        }
    }
}

impl fmt::Debug for Puzzle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Puzzle")
            .field("id", &self.inner.id)
            .field("level", &self.inner.level)
            .field("solved", &self.solved())
            .finish()
    }
}

struct LevelInner {
    name: String,
    completed: Mutex<bool>,
    puzzles: Mutex<Vec<Puzzle>>,
    puzzle_class: Arc<EventHub<PuzzleSnapshot>>,
    emitter: Emitter<LevelSnapshot>,
}

/// A room of the escape game. It completes once every one of its puzzles is solved.
#[derive(Clone)]
pub struct Level {
    inner: Arc<LevelInner>,
}

impl Level {
    pub fn new(
        class: Arc<EventHub<LevelSnapshot>>,
        puzzle_class: Arc<EventHub<PuzzleSnapshot>>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            inner: Arc::new(LevelInner {
                name: name.into(),
                completed: Mutex::new(false),
                puzzles: Mutex::new(Vec::new()),
                puzzle_class,
                emitter: Emitter::new(class),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn completed(&self) -> bool {
        *lock(&self.inner.completed)
    }

    /// Creates a puzzle played in this level.
    pub fn add_puzzle(&self, id: impl Into<String>) -> Puzzle {
        let puzzle = Puzzle::new(
            Arc::clone(&self.inner.puzzle_class),
            id,
            Some(self.inner.name.clone()),
        );
        let weak = Arc::downgrade(&self.inner);
        let on_change = Callback::new(move |_: &PuzzleSnapshot| {
            if let Some(level) = Level::upgrade(&weak) {
                level.puzzle_changed();
            }
        });
        puzzle.add_listener(PuzzleEvent::Solve, on_change.clone(), Scope::Instance);
        puzzle.add_listener(PuzzleEvent::Unsolve, on_change, Scope::Instance);
        lock(&self.inner.puzzles).push(puzzle.clone());
        puzzle
    }

    fn upgrade(weak: &Weak<LevelInner>) -> Option<Self> {
        weak.upgrade().map(|inner| Self { inner })
    }

    pub fn puzzles(&self) -> Vec<Puzzle> {
        lock(&self.inner.puzzles).clone()
    }

    pub fn puzzle(&self, id: &str) -> Option<Puzzle> {
        lock(&self.inner.puzzles)
            .iter()
            .find(|puzzle| puzzle.id() == id)
            .cloned()
    }

    pub fn puzzles_solved(&self) -> usize {
        self.puzzles().iter().filter(|puzzle| puzzle.solved()).count()
    }

    pub fn puzzles_unsolved(&self) -> usize {
        self.puzzles().len() - self.puzzles_solved()
    }

    /// Marks the level complete, firing `complete` then `change`.
    /// Returns `false` if it already was.
    pub fn complete(&self) -> bool {
        {
            let mut completed = lock(&self.inner.completed);
            if *completed {
                return false;
            }
            *completed = true;
        }
        info!(level = %self.name(), "level complete");
        self.dispatch_event(LevelEvent::Complete, None);
        self.dispatch_event(LevelEvent::Change, None);
        true
    }

    /// Reopens a completed level. Returns `false` if it was not complete.
    pub fn reopen(&self) -> bool {
        {
            let mut completed = lock(&self.inner.completed);
            if !*completed {
                return false;
            }
            *completed = false;
        }
        self.dispatch_event(LevelEvent::Change, None);
        true
    }

    fn puzzle_changed(&self) {
        let puzzles = self.puzzles();
        if !puzzles.is_empty() && puzzles.iter().all(Puzzle::solved) {
            self.complete();
        } else {
            self.dispatch_event(LevelEvent::Change, None);
        }
    }
}

impl EventSource for Level {
    type Payload = LevelSnapshot;

    fn emitter(&self) -> &Emitter<LevelSnapshot> {
        &self.inner.emitter
    }

    fn objectify(&self, event: &str) -> LevelSnapshot {
        let puzzles = self.puzzles();
        LevelSnapshot {
            event: event.to_owned(),
            name: self.inner.name.clone(),
            completed: self.completed(),
            puzzles: puzzles.len(),
            puzzles_solved: puzzles.iter().filter(|puzzle| puzzle.solved()).count(),
        }
    }
}

impl fmt::Debug for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Level")
            .field("name", &self.inner.name)
            .field("completed", &self.completed())
            .field("puzzles", &self.puzzles())
            .finish()
    }
}
