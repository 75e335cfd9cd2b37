//! Contains common, primitive types shared by every event source.
//!
//! This module defines the listener handle types, the registration [`Scope`]
//! and the [`Callback`] wrapper that all hubs store. Using distinct types
//! improves type safety and code clarity.

use slotmap::new_key_type;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

new_key_type! {
    /// Uniquely and safely identifies a registered listener within a hub.
    ///
    /// This key is returned whenever a callback is registered for a named event.
    /// It is guaranteed to be unique within its hub and will not be reused,
    /// preventing stale ID bugs.
    pub struct ListenerId;

    /// Identifies a callback registered at a breakpoint moment.
    pub struct BreakpointId;
}

/// Where a listener is registered on an event source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    /// Fires only for events dispatched by this particular instance.
    Instance,
    /// Shared by every instance of the same kind.
    Class,
    /// The single-slot `on<event>` handler. Registering replaces the previous one.
    Handler,
}

/// A cloneable, shareable listener callback.
///
/// Two `Callback`s are the *same* listener when they are clones of one another;
/// removing a listener removes every registration of that callback. Wrapping the
/// same closure twice with [`Callback::new`] produces two distinct listeners.
pub struct Callback<P>(Arc<dyn Fn(&P) + Send + Sync>);

impl<P> Callback<P> {
    /// Wraps a closure into a listener.
    pub fn new(f: impl Fn(&P) + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    /// Invokes the callback with the event payload.
    pub fn call(&self, payload: &P) {
        (self.0)(payload)
    }

    /// Returns `true` if both handles point at the same listener.
    pub fn same(&self, other: &Self) -> bool {
        std::ptr::eq(
            Arc::as_ptr(&self.0) as *const (),
            Arc::as_ptr(&other.0) as *const (),
        )
    }
}

impl<P> Clone for Callback<P> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<P> fmt::Debug for Callback<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Callback")
            .field(&(Arc::as_ptr(&self.0) as *const ()))
            .finish()
    }
}

/// Locks a mutex, recovering the data if a listener panicked while holding it.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Builds a storage key of the form `<kind>:<identifier>`.
pub fn make_key(kind: &str, identifier: impl fmt::Display) -> String {
    format!("{}:{}", kind.to_lowercase(), identifier)
}
