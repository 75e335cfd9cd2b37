//! Named-event publish/subscribe: hubs, emitters and the `EventSource` trait.
//!
//! An [`EventHub`] is one scope's table of listeners. An [`Emitter`] combines the
//! three scopes an entity dispatches to: its own instance hub, the class hub it
//! shares with every other instance of its kind, and the single-slot handlers.

use crate::common::{lock, Callback, ListenerId, Scope};
use crate::components::table::CallbackTable;
use std::sync::{Arc, Mutex};
use tracing::trace;

/// An ordered table of listeners keyed by event name.
///
/// Listeners for one event run in registration order. A callback may be
/// registered several times; removing it removes every occurrence.
pub struct EventHub<P> {
    table: Mutex<CallbackTable<String, ListenerId, P>>,
}

impl<P> Default for EventHub<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> EventHub<P> {
    pub fn new() -> Self {
        Self {
            table: Mutex::new(CallbackTable::new()),
        }
    }

    /// Appends `callback` to the listeners of `event`.
    pub fn add_listener(&self, event: impl AsRef<str>, callback: Callback<P>) -> ListenerId {
        lock(&self.table).insert(event.as_ref().to_owned(), callback, false)
    }

    /// Registers a listener that unregisters itself before its first run.
    pub fn add_listener_once(&self, event: impl AsRef<str>, callback: Callback<P>) -> ListenerId {
        lock(&self.table).insert(event.as_ref().to_owned(), callback, true)
    }

    /// Removes every registration of `callback` for `event`.
    pub fn remove_listener(&self, event: impl AsRef<str>, callback: &Callback<P>) -> bool {
        lock(&self.table).remove(&event.as_ref().to_owned(), callback)
    }

    /// Removes the single registration identified by `id`.
    pub fn remove_listener_id(&self, id: ListenerId) -> bool {
        lock(&self.table).remove_id(id)
    }

    /// Replaces every listener of `event` with `callback`.
    pub fn replace_listener(&self, event: impl AsRef<str>, callback: Callback<P>) -> ListenerId {
        let event = event.as_ref().to_owned();
        let mut table = lock(&self.table);
        table.clear(&event);
        table.insert(event, callback, false)
    }

    pub fn clear(&self, event: impl AsRef<str>) {
        lock(&self.table).clear(&event.as_ref().to_owned());
    }

    pub fn remove_all_listeners(&self) {
        lock(&self.table).clear_all();
    }

    pub fn listener_count(&self, event: impl AsRef<str>) -> usize {
        lock(&self.table).len(&event.as_ref().to_owned())
    }

    /// Runs the listeners of `event` with `payload`.
    ///
    /// The list is captured before the first callback runs, so listeners may
    /// register, remove or dispatch again without deadlocking. A panicking
    /// listener propagates and the rest of the list is skipped.
    pub fn dispatch(&self, event: &str, payload: &P) {
        let callbacks = lock(&self.table).take_snapshot(&event.to_owned());
        for callback in callbacks {
            callback.call(payload);
        }
    }
}

/// The dispatch target owned by every event-emitting entity.
pub struct Emitter<P> {
    instance: EventHub<P>,
    class: Arc<EventHub<P>>,
    handlers: EventHub<P>,
}

impl<P> Emitter<P> {
    /// Creates an emitter whose class-scoped listeners live in `class`.
    pub fn new(class: Arc<EventHub<P>>) -> Self {
        Self {
            instance: EventHub::new(),
            class,
            handlers: EventHub::new(),
        }
    }

    /// Creates an emitter with a class hub nobody else shares.
    pub fn detached() -> Self {
        Self::new(Arc::new(EventHub::new()))
    }

    pub fn hub(&self, scope: Scope) -> &EventHub<P> {
        match scope {
            Scope::Instance => &self.instance,
            Scope::Class => self.class.as_ref(),
            Scope::Handler => &self.handlers,
        }
    }

    pub fn class_hub(&self) -> &Arc<EventHub<P>> {
        &self.class
    }

    pub fn add_listener(&self, event: &str, callback: Callback<P>, scope: Scope) -> ListenerId {
        match scope {
            Scope::Handler => self.handlers.replace_listener(event, callback),
            _ => self.hub(scope).add_listener(event, callback),
        }
    }

    pub fn add_listener_once(&self, event: &str, callback: Callback<P>, scope: Scope) -> ListenerId {
        match scope {
            Scope::Handler => {
                self.handlers.clear(event);
                self.handlers.add_listener_once(event, callback)
            }
            _ => self.hub(scope).add_listener_once(event, callback),
        }
    }

    /// Dispatches to instance listeners, then class listeners, then the handler.
    pub fn dispatch(&self, event: &str, payload: &P) {
        trace!(event = %event, "dispatching");
        self.instance.dispatch(event, payload);
        self.class.dispatch(event, payload);
        self.handlers.dispatch(event, payload);
    }
}

/// The event-model capability shared by timers, challenges, puzzles and levels.
///
/// Implementors only expose their [`Emitter`] and a way to describe themselves;
/// registration and dispatch come for free.
pub trait EventSource {
    /// The structured data every listener of this source receives.
    type Payload;

    fn emitter(&self) -> &Emitter<Self::Payload>;

    /// The canonical representation of the entity, used when an event is
    /// dispatched without an explicit payload.
    fn objectify(&self, event: &str) -> Self::Payload;

    fn add_listener(
        &self,
        event: impl AsRef<str>,
        callback: Callback<Self::Payload>,
        scope: Scope,
    ) -> ListenerId {
        self.emitter().add_listener(event.as_ref(), callback, scope)
    }

    fn add_listener_once(
        &self,
        event: impl AsRef<str>,
        callback: Callback<Self::Payload>,
        scope: Scope,
    ) -> ListenerId {
        self.emitter()
            .add_listener_once(event.as_ref(), callback, scope)
    }

    fn remove_listener(
        &self,
        event: impl AsRef<str>,
        callback: &Callback<Self::Payload>,
        scope: Scope,
    ) -> bool {
        self.emitter().hub(scope).remove_listener(event, callback)
    }

    /// Installs (or, with `None`, clears) the single `on<event>` handler.
    fn set_handler(&self, event: impl AsRef<str>, handler: Option<Callback<Self::Payload>>) {
        match handler {
            Some(handler) => {
                self.emitter()
                    .add_listener(event.as_ref(), handler, Scope::Handler);
            }
            None => self.emitter().hub(Scope::Handler).clear(event),
        }
    }

    fn remove_all_listeners(&self, scope: Scope) {
        self.emitter().hub(scope).remove_all_listeners();
    }

    /// Fires `event`, substituting [`objectify`](Self::objectify) when no payload is given.
    fn dispatch_event(&self, event: impl AsRef<str>, payload: Option<Self::Payload>) {
        let event = event.as_ref();
        let payload = payload.unwrap_or_else(|| self.objectify(event));
        self.emitter().dispatch(event, &payload);
    }
}
