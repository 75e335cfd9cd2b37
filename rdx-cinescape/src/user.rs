//! Player profiles and their persisted challenge progress.

use crate::common::make_key;
use crate::error::Result;
use crate::storage::{Storage, StorageExt, CURRENT_USER_KEY, USERS_KEY};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The profile used while nobody is logged in.
pub const GUEST_EMAIL: &str = "guest";

/// A registered player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub email: String,
    pub name: String,
    #[serde(default)]
    pub borndate: Option<NaiveDate>,
    #[serde(default)]
    pub admin: bool,
    /// Progress per challenge id.
    #[serde(default)]
    pub challenges: BTreeMap<u64, i64>,
}

impl User {
    pub fn new(email: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            name: name.into().trim().to_owned(),
            borndate: None,
            admin: false,
            challenges: BTreeMap::new(),
        }
    }

    pub fn guest() -> Self {
        Self::new(GUEST_EMAIL, "Guest")
    }

    pub fn key(&self) -> String {
        Self::key_for(&self.email)
    }

    pub fn key_for(email: &str) -> String {
        make_key("User", email)
    }

    /// The first word of the name.
    pub fn nick(&self) -> &str {
        self.name.split_whitespace().next().unwrap_or_default()
    }

    pub fn is_guest(&self) -> bool {
        self.email == GUEST_EMAIL
    }

    pub fn progress(&self, challenge: u64) -> i64 {
        self.challenges.get(&challenge).copied().unwrap_or(0)
    }

    pub fn set_progress(&mut self, challenge: u64, value: i64) {
        self.challenges.insert(challenge, value);
    }

    /// Loads a profile, `None` when `email` was never saved.
    pub fn load(storage: &dyn Storage, email: &str) -> Result<Option<Self>> {
        storage.read_json(&Self::key_for(email))
    }

    pub fn save(&self, storage: &dyn Storage) -> Result<()> {
        storage.write_json(&self.key(), self)
    }

    pub fn exists(storage: &dyn Storage, email: &str) -> bool {
        storage.get(&Self::key_for(email)).is_some()
    }

    /// Saves the profile and adds it to the registered users list.
    pub fn register(&self, storage: &dyn Storage) -> Result<()> {
        self.save(storage)?;
        let mut all = Self::all(storage)?;
        if !all.contains(&self.email) {
            all.push(self.email.clone());
            storage.write_json(USERS_KEY, &all)?;
        }
        Ok(())
    }

    /// The emails of every registered user.
    pub fn all(storage: &dyn Storage) -> Result<Vec<String>> {
        Ok(storage.read_json(USERS_KEY)?.unwrap_or_default())
    }

    /// Deletes the profile and unregisters it.
    pub fn remove(storage: &dyn Storage, email: &str) -> Result<()> {
        storage.remove(&Self::key_for(email))?;
        let all: Vec<String> = Self::all(storage)?
            .into_iter()
            .filter(|other| other != email)
            .collect();
        storage.write_json(USERS_KEY, &all)
    }

    /// The email stored as logged in, if any.
    pub fn current(storage: &dyn Storage) -> Option<String> {
        storage.get(CURRENT_USER_KEY)
    }
}
