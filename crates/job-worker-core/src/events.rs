//! Typed event bus (§4.5): the Worker's observation surface for lifecycle,
//! per-task, and breaker events.
//!
//! The source language's `EventEmitter` (`on`/`off`/`once`/
//! `removeAllListeners`) is replaced with a synchronous listener registry
//! guarded by a `std::sync::Mutex` plus a `WorkerEvent` enum (§9, "Event
//! emitter" design note) — callers register plain closures rather than
//! matching on string event names. Listener panics are caught so a faulty
//! listener cannot take down the pull loop.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::ids::TaskId;

/// Every event the Worker can emit over its lifetime (§4.5).
#[derive(Debug, Clone)]
pub enum WorkerEvent {
    Started {
        stage_type: String,
        concurrency: usize,
    },
    Stopping {
        stage_type: String,
        running_tasks: usize,
    },
    Stopped {
        stage_type: String,
    },
    TaskStarted {
        task_id: TaskId,
        stage_type: String,
    },
    TaskCompleted {
        task_id: TaskId,
        stage_type: String,
        duration: Duration,
    },
    TaskFailed {
        task_id: TaskId,
        stage_type: String,
        error: String,
    },
    Error {
        location: &'static str,
        error: String,
        stage_type: String,
    },
    CircuitBreakerOpened {
        breaker: &'static str,
        stage_type: String,
    },
    CircuitBreakerClosed {
        breaker: &'static str,
        stage_type: String,
    },
    QueueEmpty {
        stage_type: String,
        consecutive_empty_polls: u64,
    },
}

/// A registered listener callback.
pub type EventListener = Arc<dyn Fn(&WorkerEvent) + Send + Sync>;

/// Handle returned by [`WorkerEventBus::on`], usable with
/// [`WorkerEventBus::off`] to deregister a single listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

struct Registration {
    id: ListenerId,
    listener: EventListener,
    once: bool,
}

/// Synchronous, in-process fan-out of [`WorkerEvent`]s to registered
/// listeners. Dispatch happens inline on the Worker's task — from the
/// Worker's perspective listener invocation is synchronous (§4.5) — so
/// listeners must be cheap; anything expensive should hand off to its own
/// task.
#[derive(Default)]
pub struct WorkerEventBus {
    listeners: Mutex<Vec<Registration>>,
    next_id: AtomicU64,
}

impl WorkerEventBus {
    pub fn new() -> Self {
        Self {
            listeners: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a listener that fires on every subsequent event.
    pub fn on<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&WorkerEvent) + Send + Sync + 'static,
    {
        self.register(Arc::new(listener), false)
    }

    /// Register a listener that fires at most once, then deregisters itself.
    pub fn once<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&WorkerEvent) + Send + Sync + 'static,
    {
        self.register(Arc::new(listener), true)
    }

    fn register(&self, listener: EventListener, once: bool) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut listeners = self.listeners.lock().unwrap_or_else(|e| e.into_inner());
        listeners.push(Registration { id, listener, once });
        id
    }

    /// Deregister a single listener by id. A second `off` with the same id
    /// is a no-op.
    pub fn off(&self, id: ListenerId) {
        let mut listeners = self.listeners.lock().unwrap_or_else(|e| e.into_inner());
        listeners.retain(|r| r.id != id);
    }

    /// Deregister every listener.
    pub fn remove_all_listeners(&self) {
        let mut listeners = self.listeners.lock().unwrap_or_else(|e| e.into_inner());
        listeners.clear();
    }

    /// Fan the event out to every registered listener. A listener that
    /// panics is caught and logged via `tracing`, never propagated into the
    /// caller (which is always the pull loop or a task future). Listeners
    /// are invoked after the registry lock is released, so a listener that
    /// calls back into `on`/`off` cannot deadlock.
    pub fn emit(&self, event: WorkerEvent) {
        let snapshot: Vec<(ListenerId, EventListener, bool)> = {
            let listeners = self.listeners.lock().unwrap_or_else(|e| e.into_inner());
            listeners
                .iter()
                .map(|r| (r.id, Arc::clone(&r.listener), r.once))
                .collect()
        };

        let mut fired_once = Vec::new();
        for (id, listener, once) in snapshot {
            let result = catch_unwind(AssertUnwindSafe(|| listener(&event)));
            if let Err(panic) = result {
                let message = panic_message(&panic);
                tracing::error!(listener_panic = %message, "worker event listener panicked");
            }
            if once {
                fired_once.push(id);
            }
        }

        if !fired_once.is_empty() {
            let mut listeners = self.listeners.lock().unwrap_or_else(|e| e.into_inner());
            listeners.retain(|r| !fired_once.contains(&r.id));
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
#[path = "events_tests.rs"]
mod tests;
