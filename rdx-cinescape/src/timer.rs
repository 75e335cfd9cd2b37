//! A count-up timer driven by a self-rescheduling tokio task.
//!
//! The timer advances `time` by `step` every `speed`, fires a `step` event and
//! the breakpoint for the moment it landed on, and stops itself when `time`
//! reaches `stop_time`.

use crate::common::{lock, Callback};
use crate::components::breakpoint::BreakpointHub;
use crate::components::listener::{Emitter, EventHub, EventSource};
use crate::events::{TimerEvent, TimerSnapshot};
use std::fmt;
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

/// The lowest value `time` can take.
pub const MIN_TIME: i64 = 0;
/// The lowest value `stop_time` can take.
pub const MIN_STOP_TIME: i64 = MIN_TIME + 1;
pub const DEFAULT_STEP: i64 = 1;
pub const DEFAULT_SPEED: Duration = Duration::from_millis(1000);

/// The event name breakpoint callbacks receive in their snapshot.
pub const BREAKPOINT_EVENT: &str = "breakpoint";

#[derive(Debug, Clone, Copy)]
struct TimerState {
    time: i64,
    stop_time: i64,
    step: i64,
    speed: Duration,
    paused: bool,
    /// Bumped by every explicit `stop()`. A tick that started under an older
    /// generation must not fire anything.
    generation: u64,
}

/// The outcome of the locked half of a tick.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Tick {
    time: i64,
    generation: u64,
}

struct TimerInner {
    state: Mutex<TimerState>,
    emitter: Emitter<TimerSnapshot>,
    breakpoints: BreakpointHub<TimerSnapshot>,
    runner: Mutex<Option<JoinHandle<()>>>,
}

/// A countdown/count-up state machine.
///
/// `Timer` is a cheap handle: clones share the same state, listeners and tick
/// task. The tick task only holds a weak reference, so it ends on its own once
/// every handle is dropped.
///
/// Starting a timer schedules its ticks on the ambient tokio runtime.
#[derive(Clone)]
pub struct Timer {
    inner: Arc<TimerInner>,
}

impl Timer {
    /// Creates a timer with its own, unshared class hub.
    pub fn new(stop_time: i64, autostart: bool, step: Option<i64>) -> Self {
        Self::with_class(Arc::new(EventHub::new()), stop_time, autostart, step, DEFAULT_SPEED)
    }

    /// Creates a timer whose class-scoped listeners live in `class`.
    pub fn with_class(
        class: Arc<EventHub<TimerSnapshot>>,
        stop_time: i64,
        autostart: bool,
        step: Option<i64>,
        speed: Duration,
    ) -> Self {
        let timer = Self {
            inner: Arc::new(TimerInner {
                state: Mutex::new(TimerState {
                    time: MIN_TIME,
                    stop_time: stop_time.max(MIN_STOP_TIME),
                    step: step.unwrap_or(DEFAULT_STEP),
                    speed,
                    paused: true,
                    generation: 0,
                }),
                emitter: Emitter::new(class),
                breakpoints: BreakpointHub::new(),
                runner: Mutex::new(None),
            }),
        };
        if autostart {
            timer.start();
        }
        timer
    }

    fn state(&self) -> TimerState {
        *lock(&self.inner.state)
    }

    pub fn min_time(&self) -> i64 {
        MIN_TIME
    }

    pub fn min_stop_time(&self) -> i64 {
        MIN_STOP_TIME
    }

    /// The current time in seconds.
    pub fn time(&self) -> i64 {
        self.state().time
    }

    /// Sets the time, clamped into `[0, stop_time]`.
    pub fn set_time(&self, value: i64) {
        let mut state = lock(&self.inner.state);
        state.time = value.clamp(MIN_TIME, state.stop_time);
    }

    pub fn stop_time(&self) -> i64 {
        self.state().stop_time
    }

    /// Sets the terminal time, never below [`MIN_STOP_TIME`]. The current time
    /// is pulled down if it would end up past the new stop time.
    pub fn set_stop_time(&self, value: i64) {
        let mut state = lock(&self.inner.state);
        state.stop_time = value.max(MIN_STOP_TIME);
        state.time = state.time.min(state.stop_time);
    }

    pub fn step(&self) -> i64 {
        self.state().step
    }

    pub fn set_step(&self, step: i64) {
        lock(&self.inner.state).step = step;
    }

    /// How long the timer waits between ticks.
    pub fn speed(&self) -> Duration {
        self.state().speed
    }

    pub fn set_speed(&self, speed: Duration) {
        lock(&self.inner.state).speed = speed;
    }

    pub fn paused(&self) -> bool {
        self.state().paused
    }

    /// Flips the paused flag without firing any event.
    pub fn set_paused(&self, paused: bool) {
        lock(&self.inner.state).paused = paused;
    }

    pub fn running(&self) -> bool {
        !self.paused()
    }

    pub fn remaining_time(&self) -> i64 {
        let state = self.state();
        state.stop_time - state.time
    }

    /// Moves the time forward by `amount`, or by `step` when `None`.
    /// A negative amount moves it backwards. The result is clamped.
    pub fn increment(&self, amount: Option<i64>) {
        let mut state = lock(&self.inner.state);
        let amount = amount.unwrap_or(state.step);
        state.time = state
            .time
            .saturating_add(amount)
            .clamp(MIN_TIME, state.stop_time);
    }

    /// Moves the time backwards by `amount`, or by `step` when `None`.
    pub fn decrement(&self, amount: Option<i64>) {
        let amount = amount.unwrap_or_else(|| self.step());
        self.increment(Some(amount.saturating_neg()));
    }

    /// Starts the timer. Returns `false` if it is already running.
    pub fn start(&self) -> bool {
        if self.running() {
            return false;
        }
        self.dispatch_event(TimerEvent::Start, None);
        self.set_paused(false);
        self.ensure_runner();
        debug!(time = self.time(), stop_time = self.stop_time(), "timer started");
        true
    }

    /// Pauses the timer. Ticks keep their cadence but do nothing while paused.
    /// Returns `false` if it is already paused.
    pub fn pause(&self) -> bool {
        if self.paused() {
            return false;
        }
        self.dispatch_event(TimerEvent::Pause, None);
        self.set_paused(true);
        debug!(time = self.time(), "timer paused");
        true
    }

    /// Rewinds the time to [`MIN_TIME`] without touching the paused state.
    pub fn reset(&self) {
        self.set_time(MIN_TIME);
        self.dispatch_event(TimerEvent::Reset, None);
        debug!("timer reset");
    }

    /// Resets and pauses the timer, fires `stop` and cancels the tick task.
    ///
    /// The state changes happen under one lock before any event fires, so a
    /// tick already running on another thread can neither advance the time nor
    /// fire anything afterwards. `reset`, `pause` (if it was running) and `stop`
    /// then fire in that order.
    pub fn stop(&self) {
        if let Some(runner) = lock(&self.inner.runner).take() {
            runner.abort();
        }
        let was_running = {
            let mut state = lock(&self.inner.state);
            state.generation += 1;
            state.time = MIN_TIME;
            !std::mem::replace(&mut state.paused, true)
        };
        self.dispatch_event(TimerEvent::Reset, None);
        if was_running {
            self.dispatch_event(TimerEvent::Pause, None);
        }
        self.dispatch_event(TimerEvent::Stop, None);
        debug!("timer stopped");
    }

    /// The breakpoints fired whenever a tick lands on their moment.
    pub fn breakpoints(&self) -> &BreakpointHub<TimerSnapshot> {
        &self.inner.breakpoints
    }

    pub fn add_breakpoint(&self, moment: i64, callback: Callback<TimerSnapshot>) -> bool {
        self.inner.breakpoints.add_breakpoint(moment, callback)
    }

    pub fn add_breakpoint_once(&self, moment: i64, callback: Callback<TimerSnapshot>) -> bool {
        self.inner.breakpoints.add_breakpoint_once(moment, callback)
    }

    pub fn remove_breakpoint(&self, moment: i64, callback: &Callback<TimerSnapshot>) -> bool {
        self.inner.breakpoints.remove_breakpoint(moment, callback)
    }

    /// `true` while a tick task is scheduled for this timer.
    pub fn is_scheduled(&self) -> bool {
        lock(&self.inner.runner)
            .as_ref()
            .is_some_and(|runner| !runner.is_finished())
    }

    fn ensure_runner(&self) {
        let mut runner = lock(&self.inner.runner);
        if runner.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return;
        }
        match Handle::try_current() {
            Ok(handle) => {
                *runner = Some(handle.spawn(Self::run(Arc::downgrade(&self.inner))));
            }
            Err(_) => warn!("no tokio runtime available, timer ticks will not be scheduled"),
        }
    }

    async fn run(weak: Weak<TimerInner>) {
        loop {
            let Some(speed) = weak.upgrade().map(|inner| lock(&inner.state).speed) else {
                break;
            };
            tokio::time::sleep(speed).await;
            let Some(inner) = weak.upgrade() else {
                break;
            };
            let timer = Timer { inner };
            if !timer.run_tick() {
                break;
            }
        }
    }

    /// Runs one scheduled tick. Returns `false` once this tick chain should end,
    /// either because the timer expired or because it was stopped meanwhile.
    pub(crate) fn run_tick(&self) -> bool {
        match self.advance() {
            Some(tick) => self.finish_tick(tick),
            None => true,
        }
    }

    /// Checks `paused` and advances `time` under one lock.
    pub(crate) fn advance(&self) -> Option<Tick> {
        let mut state = lock(&self.inner.state);
        if state.paused {
            return None;
        }
        state.time = state
            .time
            .saturating_add(state.step)
            .clamp(MIN_TIME, state.stop_time);
        Some(Tick {
            time: state.time,
            generation: state.generation,
        })
    }

    /// Whether a tick may still fire: not stopped since it began, not paused.
    fn is_current(&self, tick: Tick) -> bool {
        let state = lock(&self.inner.state);
        state.generation == tick.generation && !state.paused
    }

    /// A chain keeps going unless `stop()` ran since its tick began.
    fn keeps_chain(&self, tick: Tick) -> bool {
        lock(&self.inner.state).generation == tick.generation
    }

    /// Fires the breakpoint and `step` of an advanced tick, then expires the
    /// timer if the tick landed on `stop_time`.
    pub(crate) fn finish_tick(&self, tick: Tick) -> bool {
        if !self.is_current(tick) {
            return self.keeps_chain(tick);
        }
        trace!(time = tick.time, "timer tick");
        self.inner
            .breakpoints
            .dispatch_breakpoint(tick.time, &self.objectify(BREAKPOINT_EVENT));
        if !self.is_current(tick) {
            return self.keeps_chain(tick);
        }
        self.dispatch_event(TimerEvent::Step, None);
        if !self.is_current(tick) || tick.time != self.stop_time() {
            return self.keeps_chain(tick);
        }
        self.expire();
        false
    }

    /// Natural end of the countdown: the time stays at `stop_time`.
    ///
    /// The chain's handle is released before any listener runs, so a listener
    /// that restarts the timer gets a fresh tick task.
    fn expire(&self) {
        lock(&self.inner.runner).take();
        self.pause();
        self.dispatch_event(TimerEvent::Stop, None);
        info!(stop_time = self.stop_time(), "timer expired");
    }
}

impl EventSource for Timer {
    type Payload = TimerSnapshot;

    fn emitter(&self) -> &Emitter<TimerSnapshot> {
        &self.inner.emitter
    }

    fn objectify(&self, event: &str) -> TimerSnapshot {
        let state = self.state();
        TimerSnapshot {
            event: event.to_owned(),
            time: state.time,
            remaining_time: state.stop_time - state.time,
            stop_time: state.stop_time,
            paused: state.paused,
            running: !state.paused,
            target: self.clone(),
        }
    }
}

impl fmt::Debug for Timer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state();
        f.debug_struct("Timer")
            .field("time", &state.time)
            .field("stop_time", &state.stop_time)
            .field("step", &state.step)
            .field("speed", &state.speed)
            .field("paused", &state.paused)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Scope;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter(timer: &Timer, event: TimerEvent) -> Arc<AtomicUsize> {
        let hits = Arc::new(AtomicUsize::new(0));
        let count = Arc::clone(&hits);
        timer.add_listener(
            event,
            Callback::new(move |_: &TimerSnapshot| {
                count.fetch_add(1, Ordering::SeqCst);
            }),
            Scope::Instance,
        );
        hits
    }

    #[test]
    fn time_is_clamped_into_range() {
        let timer = Timer::new(10, false, None);
        for value in -20..=30 {
            timer.set_time(value);
            assert_eq!(timer.time(), value.clamp(0, 10));
        }
    }

    #[test]
    fn stop_time_has_a_floor_and_pulls_time_down() {
        let timer = Timer::new(0, false, None);
        assert_eq!(timer.stop_time(), MIN_STOP_TIME);

        timer.set_stop_time(20);
        timer.set_time(15);
        timer.set_stop_time(8);
        assert_eq!(timer.time(), 8);
        assert_eq!(timer.remaining_time(), 0);
    }

    #[test]
    fn increment_defaults_to_step() {
        let timer = Timer::new(100, false, Some(5));
        timer.increment(None);
        assert_eq!(timer.time(), 5);
        timer.increment(Some(-2));
        assert_eq!(timer.time(), 3);
        timer.decrement(None);
        assert_eq!(timer.time(), 0);
        timer.decrement(Some(-200));
        assert_eq!(timer.time(), 100);
    }

    #[test]
    fn start_and_pause_are_idempotent() {
        let timer = Timer::new(10, false, None);
        let starts = counter(&timer, TimerEvent::Start);
        let pauses = counter(&timer, TimerEvent::Pause);

        assert!(timer.paused());
        assert!(!timer.pause());
        assert!(timer.start());
        assert!(!timer.start());
        assert!(timer.running());
        assert!(timer.pause());

        assert_eq!(starts.load(Ordering::SeqCst), 1);
        assert_eq!(pauses.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn stop_resets_pauses_and_fires_in_order() {
        let timer = Timer::new(10, false, None);
        let log = Arc::new(Mutex::new(Vec::new()));
        for event in [TimerEvent::Reset, TimerEvent::Pause, TimerEvent::Stop] {
            let log = Arc::clone(&log);
            timer.add_listener(
                event,
                Callback::new(move |snapshot: &TimerSnapshot| {
                    lock(&log).push(snapshot.event.clone())
                }),
                Scope::Instance,
            );
        }
        timer.start();
        timer.set_time(4);

        timer.stop();

        assert_eq!(timer.time(), 0);
        assert!(timer.paused());
        assert_eq!(*lock(&log), vec!["reset", "pause", "stop"]);
    }

    #[test]
    fn paused_ticks_do_nothing() {
        let timer = Timer::new(10, false, None);
        let steps = counter(&timer, TimerEvent::Step);

        assert!(timer.run_tick());
        assert_eq!(timer.time(), 0);
        assert_eq!(steps.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn ticks_fire_breakpoints_then_step() {
        let timer = Timer::new(10, false, Some(2));
        let log = Arc::new(Mutex::new(Vec::new()));
        let at_four = Arc::clone(&log);
        timer.add_breakpoint(
            4,
            Callback::new(move |snapshot: &TimerSnapshot| {
                lock(&at_four).push(format!("{}@{}", snapshot.event, snapshot.time))
            }),
        );
        let steps = Arc::clone(&log);
        timer.add_listener(
            TimerEvent::Step,
            Callback::new(move |snapshot: &TimerSnapshot| {
                lock(&steps).push(format!("{}@{}", snapshot.event, snapshot.time))
            }),
            Scope::Instance,
        );
        timer.start();

        timer.run_tick();
        timer.run_tick();

        assert_eq!(
            *lock(&log),
            vec!["step@2", "breakpoint@4", "step@4"]
        );
    }

    #[test]
    fn reaching_stop_time_expires_once() {
        let timer = Timer::new(3, false, None);
        let stops = counter(&timer, TimerEvent::Stop);
        timer.start();

        assert!(timer.run_tick());
        assert!(timer.run_tick());
        assert!(!timer.run_tick());
        assert!(timer.run_tick());

        assert_eq!(timer.time(), 3);
        assert!(timer.paused());
        assert_eq!(stops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn stop_during_a_tick_discards_it() {
        let timer = Timer::new(10, false, None);
        let steps = counter(&timer, TimerEvent::Step);
        timer.start();

        let tick = timer.advance().unwrap();
        timer.stop();

        assert!(!timer.finish_tick(tick));
        assert_eq!(timer.time(), 0);
        assert!(timer.paused());
        assert_eq!(steps.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn pausing_during_a_tick_keeps_the_chain() {
        let timer = Timer::new(10, false, None);
        let steps = counter(&timer, TimerEvent::Step);
        timer.start();

        let tick = timer.advance().unwrap();
        timer.pause();

        assert!(timer.finish_tick(tick));
        assert_eq!(timer.time(), 1);
        assert_eq!(steps.load(Ordering::SeqCst), 0);
        assert!(timer.advance().is_none());
    }
}
