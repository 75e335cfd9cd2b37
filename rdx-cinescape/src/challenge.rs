//! Persisted progress trackers bound to puzzle, level or timer events.
//!
//! A [`Challenge`] listens to one event on one class of entities. Every time
//! that event fires (and the kind's predicate accepts it) the challenge adds one
//! to its progress, saves itself and fires its own `progress` / `increase` /
//! `decrease` / `complete` / `uncomplete` events.
//!
//! Progress is stored per user, in the active profile of the [`RoomEngine`].
//! The challenge record itself (kind, id, goal) is stored under
//! `challenge:<id>`, and the ids of registered challenges under `challenges`.

use crate::common::{lock, make_key, Callback, ListenerId};
use crate::components::listener::{Emitter, EventSource};
use crate::engine::RoomEngine;
use crate::error::{Error, Result};
use crate::events::{
    ChallengeEvent, ChallengeSnapshot, LevelEvent, LevelSnapshot, PuzzleEvent, PuzzleSnapshot,
    TimerEvent, TimerSnapshot,
};
use crate::storage::{StorageExt, CHALLENGES_KEY};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Mutex, Weak};
use tracing::{debug, info, warn};

/// Which challenge this is, and what it listens to.
///
/// The serialized form is the `type` discriminant plus any kind-specific
/// fields, e.g. `{"type": "solvePuzzleLevel", "level": "cinema"}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ChallengeKind {
    /// Solve `goal` puzzles, anywhere.
    #[serde(rename = "solvePuzzle")]
    SolvePuzzle,
    /// Complete `goal` levels.
    #[serde(rename = "completeLevel")]
    CompleteLevel,
    /// Solve `goal` puzzles in one particular level.
    #[serde(rename = "solvePuzzleLevel")]
    SolvePuzzleLevel { level: String },
    /// Finish before the timer counts `goal` seconds. Progress counts timer
    /// steps, so the challenge is completed while progress stays *below* goal.
    #[serde(rename = "completeUnderSeconds")]
    CompleteUnderSeconds,
}

/// The entity class a challenge kind listens to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Puzzle,
    Level,
    Timer,
}

impl ChallengeKind {
    pub const DISCRIMINANTS: [&'static str; 4] = [
        "solvePuzzle",
        "completeLevel",
        "solvePuzzleLevel",
        "completeUnderSeconds",
    ];

    /// Builds a kind from its discriminant. `level` is only used, and then
    /// required, by `solvePuzzleLevel`.
    pub fn parse(discriminant: &str, level: Option<String>) -> Result<Self> {
        match discriminant {
            "solvePuzzle" => Ok(Self::SolvePuzzle),
            "completeLevel" => Ok(Self::CompleteLevel),
            "solvePuzzleLevel" => match level.filter(|level| !level.trim().is_empty()) {
                Some(level) => Ok(Self::SolvePuzzleLevel { level }),
                None => Err(Error::MissingLevel),
            },
            "completeUnderSeconds" => Ok(Self::CompleteUnderSeconds),
            other => Err(Error::UnknownChallengeType(other.to_owned())),
        }
    }

    pub fn discriminant(&self) -> &'static str {
        match self {
            Self::SolvePuzzle => "solvePuzzle",
            Self::CompleteLevel => "completeLevel",
            Self::SolvePuzzleLevel { .. } => "solvePuzzleLevel",
            Self::CompleteUnderSeconds => "completeUnderSeconds",
        }
    }

    pub fn source(&self) -> Source {
        match self {
            Self::SolvePuzzle | Self::SolvePuzzleLevel { .. } => Source::Puzzle,
            Self::CompleteLevel => Source::Level,
            Self::CompleteUnderSeconds => Source::Timer,
        }
    }

    /// The event name listened to on the source.
    pub fn source_event(&self) -> &'static str {
        match self.source() {
            Source::Puzzle => PuzzleEvent::Solve.as_str(),
            Source::Level => LevelEvent::Complete.as_str(),
            Source::Timer => TimerEvent::Step.as_str(),
        }
    }

    /// Whether a solved puzzle counts towards this challenge.
    pub fn accepts_puzzle(&self, puzzle: &PuzzleSnapshot) -> bool {
        match self {
            Self::SolvePuzzleLevel { level } => puzzle.level.as_deref() == Some(level.as_str()),
            _ => true,
        }
    }

    pub fn is_completed(&self, progress: i64, goal: i64) -> bool {
        match self {
            Self::CompleteUnderSeconds => progress < goal,
            _ => progress >= goal,
        }
    }

    /// The progress `complete()` jumps to.
    fn completing_progress(&self, goal: i64) -> i64 {
        match self {
            Self::CompleteUnderSeconds => 0,
            _ => goal,
        }
    }

    /// The progress `uncomplete()` jumps to.
    fn failing_progress(&self, goal: i64) -> i64 {
        match self {
            Self::CompleteUnderSeconds => goal,
            _ => 0,
        }
    }

    /// A sentence describing the challenge for the player.
    pub fn describe(&self, goal: i64) -> String {
        match self {
            Self::SolvePuzzle => format!("Solve {goal} puzzle(s)"),
            Self::CompleteLevel => format!("Complete {goal} level(s)"),
            Self::SolvePuzzleLevel { level } => format!("Solve {goal} puzzle(s) in {level}"),
            Self::CompleteUnderSeconds => format!("Complete the level in under {goal} seconds"),
        }
    }
}

/// The persisted form of a challenge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChallengeRecord {
    #[serde(flatten)]
    pub kind: ChallengeKind,
    pub id: u64,
    pub key: String,
    pub goal: i64,
}

/// Looks a stored challenge up by id or by storage key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChallengeRef {
    Id(u64),
    Key(String),
}

impl From<u64> for ChallengeRef {
    fn from(id: u64) -> Self {
        Self::Id(id)
    }
}

impl From<&str> for ChallengeRef {
    fn from(key: &str) -> Self {
        Self::Key(key.to_owned())
    }
}

impl From<String> for ChallengeRef {
    fn from(key: String) -> Self {
        Self::Key(key)
    }
}

/// The listener a challenge installed on its source's class hub.
#[derive(Debug, Clone, Copy)]
enum Binding {
    Puzzle(ListenerId),
    Level(ListenerId),
    Timer(ListenerId),
}

impl Binding {
    fn release(self, engine: &RoomEngine) -> bool {
        match self {
            Self::Puzzle(id) => engine.puzzle_class().remove_listener_id(id),
            Self::Level(id) => engine.level_class().remove_listener_id(id),
            Self::Timer(id) => engine.timer_class().remove_listener_id(id),
        }
    }
}

#[derive(Debug, Default)]
struct ChallengeState {
    old_progress: i64,
    removed: bool,
}

pub(crate) struct ChallengeInner {
    engine: RoomEngine,
    id: u64,
    goal: i64,
    kind: ChallengeKind,
    state: Mutex<ChallengeState>,
    binding: Mutex<Option<Binding>>,
    emitter: Emitter<ChallengeSnapshot>,
}

impl Drop for ChallengeInner {
    fn drop(&mut self) {
        let binding = self
            .binding
            .get_mut()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(binding) = binding {
            binding.release(&self.engine);
        }
        let mut live = lock(self.engine.live_challenges());
        if live.get(&self.id).is_some_and(|weak| weak.strong_count() == 0) {
            live.remove(&self.id);
        }
    }
}

/// A progress tracker that completes when its goal is reached.
///
/// `Challenge` is a handle; clones share state. An engine holds at most one
/// live instance per id: restoring an id that is still alive returns that
/// instance. The listener it installs on its source holds a weak reference and
/// is removed when the last handle is dropped, or earlier by
/// [`unbind`](Self::unbind).
#[derive(Clone)]
pub struct Challenge {
    inner: Arc<ChallengeInner>,
}

impl Challenge {
    /// Creates, binds and saves a new challenge with a fresh id.
    pub fn new(engine: &RoomEngine, kind: ChallengeKind, goal: i64) -> Result<Self> {
        if let ChallengeKind::SolvePuzzleLevel { level } = &kind {
            if level.trim().is_empty() {
                return Err(Error::MissingLevel);
            }
        }
        let id = engine.next_challenge_id()?;
        let challenge = Self::assemble(engine, kind, goal, id, false);
        challenge.save()?;
        info!(id, kind = challenge.kind().discriminant(), goal, "challenge created");
        Ok(challenge)
    }

    fn assemble(engine: &RoomEngine, kind: ChallengeKind, goal: i64, id: u64, removed: bool) -> Self {
        let challenge = Self {
            inner: Arc::new(ChallengeInner {
                engine: engine.clone(),
                id,
                goal,
                kind,
                state: Mutex::new(ChallengeState {
                    old_progress: engine.progress(id),
                    removed,
                }),
                binding: Mutex::new(None),
                emitter: Emitter::new(Arc::clone(engine.challenge_class())),
            }),
        };
        if challenge.inner.kind == ChallengeKind::CompleteUnderSeconds {
            // every run of the level is a fresh attempt
            engine.write_progress(id, 0);
            lock(&challenge.inner.state).old_progress = 0;
        }
        challenge.bind();
        lock(engine.live_challenges()).insert(id, Arc::downgrade(&challenge.inner));
        challenge
    }

    /// The instance of `id` still alive in this engine, if any.
    fn live(engine: &RoomEngine, id: u64) -> Option<Self> {
        let inner = lock(engine.live_challenges())
            .get(&id)
            .and_then(Weak::upgrade)?;
        Some(Self { inner })
    }

    /// Restores a saved challenge with its original id, `None` if nothing is stored.
    ///
    /// If the challenge is still alive in this engine, that instance is returned
    /// so a source event is never counted twice.
    pub fn restore(engine: &RoomEngine, reference: impl Into<ChallengeRef>) -> Result<Option<Self>> {
        let key = match reference.into() {
            ChallengeRef::Id(id) => Self::key_for(id),
            ChallengeRef::Key(key) => key,
        };
        let Some(record) = engine.storage().read_json::<ChallengeRecord>(&key)? else {
            return Ok(None);
        };
        if let Some(challenge) = Self::live(engine, record.id) {
            return Ok(Some(challenge));
        }
        let removed = !Self::all(engine)?.contains(&record.id);
        let challenge = Self::assemble(engine, record.kind, record.goal, record.id, removed);
        challenge.save()?;
        debug!(id = record.id, "challenge restored");
        Ok(Some(challenge))
    }

    /// The ids of every registered challenge.
    pub fn all(engine: &RoomEngine) -> Result<Vec<u64>> {
        Ok(engine.storage().read_json(CHALLENGES_KEY)?.unwrap_or_default())
    }

    /// Restores every registered challenge, skipping ids with no stored record.
    pub fn all_instances(engine: &RoomEngine) -> Result<Vec<Self>> {
        let mut challenges = Vec::new();
        for id in Self::all(engine)? {
            match Self::restore(engine, id)? {
                Some(challenge) => challenges.push(challenge),
                None => warn!(id, "registered challenge has no stored record"),
            }
        }
        Ok(challenges)
    }

    pub fn key_for(id: u64) -> String {
        make_key("Challenge", id)
    }

    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn key(&self) -> String {
        Self::key_for(self.inner.id)
    }

    pub fn goal(&self) -> i64 {
        self.inner.goal
    }

    pub fn kind(&self) -> &ChallengeKind {
        &self.inner.kind
    }

    pub fn engine(&self) -> &RoomEngine {
        &self.inner.engine
    }

    /// The active user's progress. Never negative.
    pub fn progress(&self) -> i64 {
        self.inner.engine.progress(self.inner.id)
    }

    /// The progress right before the last change.
    pub fn old_progress(&self) -> i64 {
        lock(&self.inner.state).old_progress
    }

    /// How much the last change added (negative when it subtracted).
    pub fn increase(&self) -> i64 {
        self.progress() - self.old_progress()
    }

    pub fn decrease(&self) -> i64 {
        -self.increase()
    }

    pub fn remaining(&self) -> i64 {
        self.inner.goal - self.progress()
    }

    pub fn completed(&self) -> bool {
        self.inner.kind.is_completed(self.progress(), self.inner.goal)
    }

    /// Sets the progress, clamped at zero, saves, and fires the event cascade.
    ///
    /// `progress` fires first, then `increase` or `decrease`. `complete` and
    /// `uncomplete` fire only when the value crosses the completion line, so
    /// jumping straight past the goal still completes exactly once.
    pub fn set_progress(&self, value: i64) {
        let value = value.max(0);
        let previous = self.progress();
        if value == previous {
            return;
        }
        let was_completed = self.completed();
        lock(&self.inner.state).old_progress = previous;
        self.inner.engine.write_progress(self.inner.id, value);
        if let Err(err) = self.save() {
            warn!(id = self.inner.id, %err, "failed to save challenge progress");
        }
        debug!(id = self.inner.id, from = previous, to = value, "challenge progress");

        self.dispatch_event(ChallengeEvent::Progress, None);
        if value > previous {
            self.dispatch_event(ChallengeEvent::Increase, None);
        } else {
            self.dispatch_event(ChallengeEvent::Decrease, None);
        }

        let completed = self.completed();
        if completed && !was_completed {
            info!(id = self.inner.id, "challenge complete");
            self.dispatch_event(ChallengeEvent::Complete, None);
        } else if was_completed && !completed {
            info!(id = self.inner.id, "challenge no longer complete");
            self.dispatch_event(ChallengeEvent::Uncomplete, None);
        }
    }

    pub fn increase_progress(&self, value: i64) {
        self.set_progress(self.progress().saturating_add(value));
    }

    pub fn decrease_progress(&self, value: i64) {
        self.set_progress(self.progress().saturating_sub(value));
    }

    /// Forces completion. Returns `false` if the challenge already is complete.
    pub fn complete(&self) -> bool {
        if self.completed() {
            return false;
        }
        self.set_progress(self.inner.kind.completing_progress(self.inner.goal));
        true
    }

    /// Undoes completion. Returns `false` if the challenge is not complete.
    pub fn uncomplete(&self) -> bool {
        if !self.completed() {
            return false;
        }
        self.set_progress(self.inner.kind.failing_progress(self.inner.goal));
        true
    }

    pub fn set_completed(&self, completed: bool) {
        if completed == self.completed() {
            return;
        }
        if completed {
            self.complete();
        } else {
            self.uncomplete();
        }
    }

    /// A sentence describing the challenge for the player.
    pub fn readable(&self) -> String {
        self.inner.kind.describe(self.inner.goal)
    }

    pub fn record(&self) -> ChallengeRecord {
        ChallengeRecord {
            kind: self.inner.kind.clone(),
            id: self.inner.id,
            key: self.key(),
            goal: self.inner.goal,
        }
    }

    /// `true` once the challenge was taken off the registered list.
    pub fn removed(&self) -> bool {
        lock(&self.inner.state).removed
    }

    /// Puts the challenge back on the registered list.
    pub fn add(&self) -> Result<()> {
        let mut all = Self::all(&self.inner.engine)?;
        if !all.contains(&self.inner.id) {
            all.push(self.inner.id);
            self.inner.engine.storage().write_json(CHALLENGES_KEY, &all)?;
        }
        lock(&self.inner.state).removed = false;
        Ok(())
    }

    /// Takes the challenge off the registered list. Its record and the users'
    /// progress are kept.
    pub fn remove(&self) -> Result<()> {
        let all: Vec<u64> = Self::all(&self.inner.engine)?
            .into_iter()
            .filter(|id| *id != self.inner.id)
            .collect();
        self.inner.engine.storage().write_json(CHALLENGES_KEY, &all)?;
        lock(&self.inner.state).removed = true;
        debug!(id = self.inner.id, "challenge removed");
        Ok(())
    }

    /// Writes the record and the active profile, registering the challenge
    /// unless it was removed.
    pub fn save(&self) -> Result<()> {
        if !self.removed() {
            self.add()?;
        }
        self.inner
            .engine
            .storage()
            .write_json(&self.key(), &self.record())?;
        self.inner.engine.save_user()
    }

    fn bind(&self) {
        let weak = Arc::downgrade(&self.inner);
        let event = self.inner.kind.source_event();
        let engine = &self.inner.engine;
        let binding = match self.inner.kind.source() {
            Source::Puzzle => Binding::Puzzle(engine.puzzle_class().add_listener(
                event,
                Callback::new(move |puzzle: &PuzzleSnapshot| {
                    if let Some(challenge) = Self::upgrade(&weak) {
                        if challenge.inner.kind.accepts_puzzle(puzzle) {
                            challenge.increase_progress(1);
                        }
                    }
                }),
            )),
            Source::Level => Binding::Level(engine.level_class().add_listener(
                event,
                Callback::new(move |_: &LevelSnapshot| {
                    if let Some(challenge) = Self::upgrade(&weak) {
                        challenge.increase_progress(1);
                    }
                }),
            )),
            Source::Timer => Binding::Timer(engine.timer_class().add_listener(
                event,
                Callback::new(move |_: &TimerSnapshot| {
                    if let Some(challenge) = Self::upgrade(&weak) {
                        challenge.increase_progress(1);
                    }
                }),
            )),
        };
        *lock(&self.inner.binding) = Some(binding);
    }

    /// Stops listening to the source. Returns `false` if it was not bound.
    pub fn unbind(&self) -> bool {
        let binding = lock(&self.inner.binding).take();
        binding.is_some_and(|binding| binding.release(&self.inner.engine))
    }

    fn upgrade(weak: &Weak<ChallengeInner>) -> Option<Self> {
        weak.upgrade().map(|inner| Self { inner })
    }
}

impl EventSource for Challenge {
    type Payload = ChallengeSnapshot;

    fn emitter(&self) -> &Emitter<ChallengeSnapshot> {
        &self.inner.emitter
    }

    fn objectify(&self, event: &str) -> ChallengeSnapshot {
        ChallengeSnapshot {
            event: event.to_owned(),
            record: self.record(),
            progress: self.progress(),
            old_progress: self.old_progress(),
            completed: self.completed(),
        }
    }
}

impl fmt::Debug for Challenge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Challenge")
            .field("id", &self.inner.id)
            .field("kind", &self.inner.kind)
            .field("goal", &self.inner.goal)
            .field("progress", &self.progress())
            .finish()
    }
}

/// Creates a challenge from its discriminant.
///
/// Returns `Ok(None)` for an unrecognized discriminant and
/// [`Error::MissingLevel`] when `solvePuzzleLevel` is given no level.
pub fn create_challenge(
    engine: &RoomEngine,
    discriminant: &str,
    goal: i64,
    level: Option<String>,
) -> Result<Option<Challenge>> {
    let kind = match ChallengeKind::parse(discriminant, level) {
        Ok(kind) => kind,
        Err(Error::UnknownChallengeType(other)) => {
            debug!(discriminant = %other, "unknown challenge type");
            return Ok(None);
        }
        Err(err) => return Err(err),
    };
    Challenge::new(engine, kind, goal).map(Some)
}

/// Restores a challenge by id or storage key.
pub fn restore_challenge(
    engine: &RoomEngine,
    reference: impl Into<ChallengeRef>,
) -> Result<Option<Challenge>> {
    Challenge::restore(engine, reference)
}
