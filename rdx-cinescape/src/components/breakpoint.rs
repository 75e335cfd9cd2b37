//! Dispatch keyed by integer moments on a time axis.
//!
//! Breakpoints are independent from named events: a [`Timer`](crate::timer::Timer)
//! owns one hub of each and fires the breakpoint for every moment it lands on.

use crate::common::{lock, BreakpointId, Callback};
use crate::components::table::CallbackTable;
use std::sync::Mutex;
use tracing::trace;

/// A table of callbacks keyed by positive integer moments.
///
/// Moment `0` and negative moments are rejected: they are never stored and
/// never dispatched.
pub struct BreakpointHub<P> {
    table: Mutex<CallbackTable<u64, BreakpointId, P>>,
}

impl<P> Default for BreakpointHub<P> {
    fn default() -> Self {
        Self::new()
    }
}

fn valid_moment(moment: i64) -> Option<u64> {
    u64::try_from(moment).ok().filter(|moment| *moment > 0)
}

impl<P> BreakpointHub<P> {
    pub fn new() -> Self {
        Self {
            table: Mutex::new(CallbackTable::new()),
        }
    }

    /// Appends `callback` at `moment`. Returns `false` for an invalid moment.
    pub fn add_breakpoint(&self, moment: i64, callback: Callback<P>) -> bool {
        self.insert(moment, callback, false).is_some()
    }

    /// Like [`add_breakpoint`](Self::add_breakpoint), but the callback unregisters
    /// itself before its first run.
    pub fn add_breakpoint_once(&self, moment: i64, callback: Callback<P>) -> bool {
        self.insert(moment, callback, true).is_some()
    }

    fn insert(&self, moment: i64, callback: Callback<P>, once: bool) -> Option<BreakpointId> {
        let moment = valid_moment(moment)?;
        Some(lock(&self.table).insert(moment, callback, once))
    }

    /// Removes every registration of `callback` at `moment`.
    ///
    /// Returns `false` when nothing is registered at `moment`.
    pub fn remove_breakpoint(&self, moment: i64, callback: &Callback<P>) -> bool {
        let Some(moment) = valid_moment(moment) else {
            return false;
        };
        let mut table = lock(&self.table);
        if !table.contains_key(&moment) {
            return false;
        }
        table.remove(&moment, callback);
        true
    }

    pub fn remove_all_breakpoints(&self) {
        lock(&self.table).clear_all();
    }

    pub fn breakpoint_count(&self, moment: i64) -> usize {
        valid_moment(moment).map_or(0, |moment| lock(&self.table).len(&moment))
    }

    /// Runs every callback registered at `moment`, in registration order.
    pub fn dispatch_breakpoint(&self, moment: i64, payload: &P) {
        let Some(moment) = valid_moment(moment) else {
            return;
        };
        let callbacks = lock(&self.table).take_snapshot(&moment);
        if !callbacks.is_empty() {
            trace!(moment, listeners = callbacks.len(), "breakpoint reached");
        }
        for callback in callbacks {
            callback.call(payload);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counting(hits: &Arc<AtomicUsize>) -> Callback<()> {
        let hits = Arc::clone(hits);
        Callback::new(move |_: &()| {
            hits.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn rejects_zero_and_negative_moments() {
        let hub = BreakpointHub::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let cb = counting(&hits);

        assert!(!hub.add_breakpoint(0, cb.clone()));
        assert!(!hub.add_breakpoint(-3, cb.clone()));
        for moment in [-3, 0, 3] {
            hub.dispatch_breakpoint(moment, &());
        }

        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn fires_only_at_its_moment() {
        let hub = BreakpointHub::new();
        let hits = Arc::new(AtomicUsize::new(0));
        assert!(hub.add_breakpoint(5, counting(&hits)));

        hub.dispatch_breakpoint(4, &());
        hub.dispatch_breakpoint(5, &());
        hub.dispatch_breakpoint(5, &());

        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn once_breakpoint_runs_a_single_time() {
        let hub = BreakpointHub::new();
        let hits = Arc::new(AtomicUsize::new(0));
        assert!(hub.add_breakpoint_once(2, counting(&hits)));

        hub.dispatch_breakpoint(2, &());
        hub.dispatch_breakpoint(2, &());

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(hub.breakpoint_count(2), 0);
    }

    #[test]
    fn removal_reports_unknown_moments() {
        let hub = BreakpointHub::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let cb = counting(&hits);
        hub.add_breakpoint(7, cb.clone());
        hub.add_breakpoint(7, cb.clone());

        assert!(!hub.remove_breakpoint(8, &cb));
        assert!(hub.remove_breakpoint(7, &cb));
        hub.dispatch_breakpoint(7, &());

        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }
}
