use cinescape::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::sleep;

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

#[tokio::test(start_paused = true)]
async fn autostarted_timer_expires_at_stop_time() {
    let timer = Timer::new(10, true, Some(1));
    let stops = counter(&timer, TimerEvent::Stop);
    let steps = counter(&timer, TimerEvent::Step);
    assert!(timer.running());

    sleep(Duration::from_millis(10_500)).await;

    assert_eq!(timer.time(), 10);
    assert!(timer.paused());
    assert_eq!(steps.load(Ordering::SeqCst), 10);
    assert_eq!(stops.load(Ordering::SeqCst), 1);
    assert!(!timer.is_scheduled());

    sleep(Duration::from_secs(5)).await;
    assert_eq!(stops.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn pausing_gates_the_ticks() {
    let timer = Timer::new(60, false, None);
    timer.start();

    sleep(Duration::from_millis(3_500)).await;
    assert_eq!(timer.time(), 3);

    timer.pause();
    sleep(Duration::from_secs(5)).await;
    assert_eq!(timer.time(), 3);
    assert!(timer.is_scheduled());

    timer.start();
    sleep(Duration::from_secs(2)).await;
    assert_eq!(timer.time(), 5);
}

#[tokio::test(start_paused = true)]
async fn stop_cancels_the_tick_task() {
    let timer = Timer::new(60, false, None);
    let steps = counter(&timer, TimerEvent::Step);
    timer.start();
    sleep(Duration::from_millis(2_500)).await;

    timer.stop();
    assert_eq!(timer.time(), 0);
    sleep(Duration::from_millis(50)).await;
    assert!(!timer.is_scheduled());

    sleep(Duration::from_secs(5)).await;
    assert_eq!(steps.load(Ordering::SeqCst), 2);

    timer.start();
    assert!(timer.is_scheduled());
    sleep(Duration::from_millis(1_500)).await;
    assert_eq!(timer.time(), 1);
}

#[tokio::test(start_paused = true)]
async fn breakpoints_fire_on_the_moments_ticks_land_on() {
    let engine = RoomEngine::in_memory();
    let timer = engine.create_timer(6, false, Some(2));
    let hits = Arc::new(Mutex::new(Vec::new()));

    for moment in [2, 3, 4] {
        let sink = Arc::clone(&hits);
        assert!(timer.add_breakpoint(
            moment,
            Callback::new(move |snapshot: &TimerSnapshot| sink.lock().unwrap().push(snapshot.time)),
        ));
    }
    let never = Callback::new(|_: &TimerSnapshot| panic!("invalid moment dispatched"));
    assert!(!timer.add_breakpoint(0, never.clone()));
    assert!(!timer.add_breakpoint(-3, never));

    timer.start();
    sleep(Duration::from_millis(3_500)).await;

    assert_eq!(*hits.lock().unwrap(), vec![2, 4]);
    assert_eq!(timer.time(), 6);
    assert!(timer.paused());
}

#[tokio::test(start_paused = true)]
async fn class_listeners_hear_every_engine_timer() {
    let engine = RoomEngine::in_memory();
    let steps = Arc::new(AtomicUsize::new(0));
    let count = Arc::clone(&steps);
    engine.timer_class().add_listener(
        TimerEvent::Step,
        Callback::new(move |_: &TimerSnapshot| {
            count.fetch_add(1, Ordering::SeqCst);
        }),
    );

    let first = engine.create_timer(2, true, None);
    let second = engine.create_timer(3, true, None);
    sleep(Duration::from_millis(4_500)).await;

    assert_eq!(first.time(), 2);
    assert_eq!(second.time(), 3);
    assert_eq!(steps.load(Ordering::SeqCst), 5);
}

#[tokio::test(start_paused = true)]
async fn dropped_timer_ends_its_task() {
    let timer = Timer::new(60, true, None);
    let steps = counter(&timer, TimerEvent::Step);
    sleep(Duration::from_millis(1_500)).await;

    drop(timer);
    sleep(Duration::from_secs(5)).await;

    assert_eq!(steps.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn stop_listener_can_restart_an_expired_timer() {
    let timer = Timer::new(3, true, None);
    let steps = counter(&timer, TimerEvent::Step);
    let stops = counter(&timer, TimerEvent::Stop);
    let restart = timer.clone();
    timer.add_listener_once(
        TimerEvent::Stop,
        Callback::new(move |_: &TimerSnapshot| {
            restart.set_time(0);
            restart.start();
        }),
        Scope::Instance,
    );

    sleep(Duration::from_millis(3_500)).await;
    assert_eq!(steps.load(Ordering::SeqCst), 3);
    assert!(timer.running());
    assert!(timer.is_scheduled());

    sleep(Duration::from_secs(5)).await;
    assert_eq!(steps.load(Ordering::SeqCst), 6);
    assert_eq!(timer.time(), 3);
    assert!(timer.paused());
    assert_eq!(stops.load(Ordering::SeqCst), 2);
}
