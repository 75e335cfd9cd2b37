//! The shared context that every entity of one game session hangs off.

use crate::challenge::ChallengeInner;
use crate::common::lock;
use crate::config::RoomConfig;
use crate::components::listener::EventHub;
use crate::error::Result;
use crate::events::{ChallengeSnapshot, LevelSnapshot, PuzzleSnapshot, TimerSnapshot};
use crate::puzzle::Level;
use crate::storage::{FileStorage, MemoryStorage, Storage, StorageExt, CHALLENGE_COUNTER_KEY, CURRENT_USER_KEY};
use crate::timer::Timer;
use crate::user::User;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};
use tracing::{debug, info};

/// The process-wide state of the escape room.
///
/// This struct is the central point of control. It holds the configuration,
/// the storage backend, the logged-in profile and the class-scoped listener hubs
/// of every entity kind. The `RoomEngine` is designed to be cloned and shared;
/// tests build a fresh one instead of relying on globals.
#[derive(Clone)]
pub struct RoomEngine {
    config: Arc<RoomConfig>,
    storage: Arc<dyn Storage>,
    user: Arc<Mutex<User>>,
    timer_class: Arc<EventHub<TimerSnapshot>>,
    puzzle_class: Arc<EventHub<PuzzleSnapshot>>,
    level_class: Arc<EventHub<LevelSnapshot>>,
    challenge_class: Arc<EventHub<ChallengeSnapshot>>,
    /// At most one live instance per challenge id.
    live_challenges: Arc<Mutex<HashMap<u64, Weak<ChallengeInner>>>>,
}

impl RoomEngine {
    /// Creates an engine, opening the storage named by the configuration.
    pub fn new(config: RoomConfig) -> Result<Self> {
        let storage: Arc<dyn Storage> = match &config.storage.path {
            Some(path) => Arc::new(FileStorage::open(path)?),
            None => Arc::new(MemoryStorage::new()),
        };
        Self::with_storage(config, storage)
    }

    /// Creates an engine on top of an existing store, resuming the logged-in user.
    pub fn with_storage(config: RoomConfig, storage: Arc<dyn Storage>) -> Result<Self> {
        let user = match User::current(storage.as_ref()) {
            Some(email) => User::load(storage.as_ref(), &email)?,
            None => None,
        };
        let user = match user {
            Some(user) => user,
            None => User::load(storage.as_ref(), crate::user::GUEST_EMAIL)?.unwrap_or_else(User::guest),
        };
        info!(user = %user.email, "room engine ready");
        Ok(Self {
            config: Arc::new(config),
            storage,
            user: Arc::new(Mutex::new(user)),
            timer_class: Arc::new(EventHub::new()),
            puzzle_class: Arc::new(EventHub::new()),
            level_class: Arc::new(EventHub::new()),
            challenge_class: Arc::new(EventHub::new()),
            live_challenges: Arc::default(),
        })
    }

    /// An engine with default configuration and in-memory storage.
    pub fn in_memory() -> Self {
        Self {
            config: Arc::new(RoomConfig::default()),
            storage: Arc::new(MemoryStorage::new()),
            user: Arc::new(Mutex::new(User::guest())),
            timer_class: Arc::new(EventHub::new()),
            puzzle_class: Arc::new(EventHub::new()),
            level_class: Arc::new(EventHub::new()),
            challenge_class: Arc::new(EventHub::new()),
            live_challenges: Arc::default(),
        }
    }

    pub fn config(&self) -> &RoomConfig {
        &self.config
    }

    pub fn storage(&self) -> &dyn Storage {
        self.storage.as_ref()
    }

    /// Listeners shared by every timer of this engine.
    pub fn timer_class(&self) -> &Arc<EventHub<TimerSnapshot>> {
        &self.timer_class
    }

    /// Listeners shared by every puzzle of this engine.
    pub fn puzzle_class(&self) -> &Arc<EventHub<PuzzleSnapshot>> {
        &self.puzzle_class
    }

    /// Listeners shared by every level of this engine.
    pub fn level_class(&self) -> &Arc<EventHub<LevelSnapshot>> {
        &self.level_class
    }

    /// Listeners shared by every challenge of this engine.
    pub fn challenge_class(&self) -> &Arc<EventHub<ChallengeSnapshot>> {
        &self.challenge_class
    }

    pub(crate) fn live_challenges(&self) -> &Mutex<HashMap<u64, Weak<ChallengeInner>>> {
        &self.live_challenges
    }

    /// Creates a timer with the configured cadence, in this engine's timer class.
    pub fn create_timer(&self, stop_time: i64, autostart: bool, step: Option<i64>) -> Timer {
        let settings = &self.config.timer;
        let timer = Timer::with_class(
            Arc::clone(&self.timer_class),
            stop_time,
            false,
            Some(step.unwrap_or(settings.step)),
            settings.speed(),
        );
        if autostart {
            timer.start();
        }
        timer
    }

    /// Creates a level timer from the configuration alone.
    pub fn level_timer(&self) -> Timer {
        let settings = &self.config.timer;
        self.create_timer(settings.stop_time, settings.autostart, None)
    }

    pub fn create_level(&self, name: impl Into<String>) -> Level {
        Level::new(Arc::clone(&self.level_class), Arc::clone(&self.puzzle_class), name)
    }

    /// A copy of the active profile.
    pub fn active_user(&self) -> User {
        lock(&self.user).clone()
    }

    /// Switches to a registered profile. Returns `false` for an unknown email.
    pub fn login(&self, email: &str) -> Result<bool> {
        let Some(user) = User::load(self.storage(), email)? else {
            return Ok(false);
        };
        self.storage.set(CURRENT_USER_KEY, email.to_owned())?;
        *lock(&self.user) = user;
        info!(user = email, "logged in");
        Ok(true)
    }

    /// Returns to the guest profile.
    pub fn logout(&self) -> Result<()> {
        self.storage.remove(CURRENT_USER_KEY)?;
        let guest = User::load(self.storage(), crate::user::GUEST_EMAIL)?.unwrap_or_else(User::guest);
        *lock(&self.user) = guest;
        debug!("logged out");
        Ok(())
    }

    /// The active profile's progress on `challenge`.
    pub fn progress(&self, challenge: u64) -> i64 {
        lock(&self.user).progress(challenge)
    }

    pub(crate) fn write_progress(&self, challenge: u64, value: i64) {
        lock(&self.user).set_progress(challenge, value);
    }

    /// Persists the active profile.
    pub fn save_user(&self) -> Result<()> {
        let user = self.active_user();
        user.save(self.storage())
    }

    /// Hands out the next challenge id, continuing from the persisted counter.
    ///
    /// An unreadable counter is an error: restarting from zero would hand out
    /// ids whose records already exist.
    pub fn next_challenge_id(&self) -> Result<u64> {
        let id = self
            .storage
            .read_json::<u64>(CHALLENGE_COUNTER_KEY)?
            .unwrap_or(0);
        self.storage.write_json(CHALLENGE_COUNTER_KEY, &(id + 1))?;
        Ok(id)
    }
}
