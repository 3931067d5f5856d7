use super::*;
use std::sync::atomic::{AtomicUsize, Ordering};

fn started_event() -> WorkerEvent {
    WorkerEvent::Started {
        stage_type: "image-resize".into(),
        concurrency: 1,
    }
}

#[test]
fn registered_listener_receives_emitted_event() {
    let bus = WorkerEventBus::new();
    let seen = Arc::new(AtomicUsize::new(0));
    let seen_clone = Arc::clone(&seen);
    bus.on(move |_event| {
        seen_clone.fetch_add(1, Ordering::SeqCst);
    });

    bus.emit(started_event());
    bus.emit(started_event());

    assert_eq!(seen.load(Ordering::SeqCst), 2);
}

#[test]
fn off_stops_further_delivery() {
    let bus = WorkerEventBus::new();
    let seen = Arc::new(AtomicUsize::new(0));
    let seen_clone = Arc::clone(&seen);
    let id = bus.on(move |_event| {
        seen_clone.fetch_add(1, Ordering::SeqCst);
    });

    bus.emit(started_event());
    bus.off(id);
    bus.emit(started_event());

    assert_eq!(seen.load(Ordering::SeqCst), 1);
}

#[test]
fn off_twice_is_a_no_op() {
    let bus = WorkerEventBus::new();
    let id = bus.on(|_event| {});
    bus.off(id);
    bus.off(id);
}

#[test]
fn once_listener_fires_only_a_single_time() {
    let bus = WorkerEventBus::new();
    let seen = Arc::new(AtomicUsize::new(0));
    let seen_clone = Arc::clone(&seen);
    bus.once(move |_event| {
        seen_clone.fetch_add(1, Ordering::SeqCst);
    });

    bus.emit(started_event());
    bus.emit(started_event());
    bus.emit(started_event());

    assert_eq!(seen.load(Ordering::SeqCst), 1);
}

#[test]
fn remove_all_listeners_clears_the_registry() {
    let bus = WorkerEventBus::new();
    let seen = Arc::new(AtomicUsize::new(0));
    let seen_clone = Arc::clone(&seen);
    bus.on(move |_event| {
        seen_clone.fetch_add(1, Ordering::SeqCst);
    });

    bus.remove_all_listeners();
    bus.emit(started_event());

    assert_eq!(seen.load(Ordering::SeqCst), 0);
}

#[test]
fn panicking_listener_does_not_stop_other_listeners_or_propagate() {
    let bus = WorkerEventBus::new();
    let seen = Arc::new(AtomicUsize::new(0));
    let seen_clone = Arc::clone(&seen);

    bus.on(|_event| panic!("listener bug"));
    bus.on(move |_event| {
        seen_clone.fetch_add(1, Ordering::SeqCst);
    });

    bus.emit(started_event());

    assert_eq!(seen.load(Ordering::SeqCst), 1);
}
