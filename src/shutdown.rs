//! Coordinated teardown of dependent services at host exit.
//!
//! The agent's downstream services (reporters, buffers) hold resources that
//! should be released when the host process exits. The coordinator collects
//! their teardown callbacks during startup; the host registers exactly one
//! termination hook (see [`ShutdownCoordinator::termination_hook`]) and
//! guarantees it runs on normal exit.
//!
//! Teardown is synchronous, best-effort and bounded: the process is already
//! exiting, so failures are logged and never re-raised, and callbacks left
//! over once the budget is exhausted are skipped.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

struct TeardownTask {
    name: String,
    run: Box<dyn FnOnce() + Send>,
}

/// Collects dependent-service teardown callbacks and runs them exactly once
/// at host termination.
#[derive(Default)]
pub struct ShutdownCoordinator {
    tasks: Mutex<Vec<TeardownTask>>,
    engaged: AtomicBool,
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        ShutdownCoordinator::default()
    }

    /// Register a dependent service's teardown routine.
    ///
    /// Registration happens before normal operation begins; callbacks run in
    /// registration order. Registering after the coordinator has engaged is a
    /// logged no-op (the callback will never run).
    pub fn register(&self, name: impl Into<String>, teardown: impl FnOnce() + Send + 'static) {
        let name = name.into();
        if self.engaged.load(Ordering::SeqCst) {
            tracing::warn!(task = %name, "shutdown already engaged; teardown registration dropped");
            return;
        }
        let mut tasks = match self.tasks.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        tasks.push(TeardownTask { name, run: Box::new(teardown) });
    }

    /// Run all registered teardown callbacks, once, within `budget`.
    ///
    /// Subsequent calls are logged no-ops. A panicking callback is caught and
    /// logged; remaining callbacks still run while budget is left.
    pub fn engage(&self, budget: Duration) {
        if self.engaged.swap(true, Ordering::SeqCst) {
            tracing::warn!("shutdown already engaged; ignoring repeated termination signal");
            return;
        }

        let tasks = {
            let mut guard = match self.tasks.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            std::mem::take(&mut *guard)
        };

        let total = tasks.len();
        let deadline = Instant::now() + budget;
        for (done, task) in tasks.into_iter().enumerate() {
            if Instant::now() >= deadline {
                tracing::warn!(
                    skipped = total - done,
                    "shutdown budget exhausted; skipping remaining teardown tasks"
                );
                break;
            }
            tracing::debug!(task = %task.name, "running teardown");
            if catch_unwind(AssertUnwindSafe(task.run)).is_err() {
                tracing::error!(task = %task.name, "teardown failed during shutdown");
            }
        }
    }

    pub fn is_engaged(&self) -> bool {
        self.engaged.load(Ordering::SeqCst)
    }

    /// The single termination callback to hand to the host.
    ///
    /// The host must guarantee it runs on normal process exit (not guaranteed
    /// on forced kill).
    pub fn termination_hook(self: &Arc<Self>, budget: Duration) -> impl FnOnce() + Send + 'static {
        let coordinator = Arc::clone(self);
        move || coordinator.engage(budget)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn teardown_runs_in_registration_order() {
        let coordinator = ShutdownCoordinator::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for name in ["reporter", "buffer", "sampler"] {
            let order = Arc::clone(&order);
            coordinator.register(name, move || order.lock().unwrap().push(name));
        }
        coordinator.engage(Duration::from_secs(5));

        assert_eq!(*order.lock().unwrap(), vec!["reporter", "buffer", "sampler"]);
        assert!(coordinator.is_engaged());
    }

    #[test]
    fn engage_runs_exactly_once() {
        let coordinator = ShutdownCoordinator::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        coordinator.register("reporter", move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        coordinator.engage(Duration::from_secs(5));
        coordinator.engage(Duration::from_secs(5));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn panicking_teardown_does_not_stop_the_rest() {
        let coordinator = ShutdownCoordinator::new();
        let ran = Arc::new(AtomicBool::new(false));
        coordinator.register("broken", || panic!("teardown bug"));
        let flag = Arc::clone(&ran);
        coordinator.register("healthy", move || flag.store(true, Ordering::SeqCst));

        coordinator.engage(Duration::from_secs(5));
        assert!(ran.load(Ordering::SeqCst));
    }

    #[test]
    fn exhausted_budget_skips_remaining_tasks() {
        let coordinator = ShutdownCoordinator::new();
        let ran = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&ran);
        coordinator.register("never-runs", move || flag.store(true, Ordering::SeqCst));

        coordinator.engage(Duration::ZERO);
        assert!(!ran.load(Ordering::SeqCst));
        assert!(coordinator.is_engaged());
    }

    #[test]
    fn registration_after_engage_is_dropped() {
        let coordinator = ShutdownCoordinator::new();
        coordinator.register("reporter", || {});
        coordinator.engage(Duration::from_secs(5));

        let ran = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&ran);
        coordinator.register("late", move || flag.store(true, Ordering::SeqCst));
        coordinator.engage(Duration::from_secs(5));
        assert!(!ran.load(Ordering::SeqCst));
    }

    #[test]
    fn termination_hook_engages_the_coordinator() {
        let coordinator = Arc::new(ShutdownCoordinator::new());
        let ran = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&ran);
        coordinator.register("reporter", move || flag.store(true, Ordering::SeqCst));

        let hook = coordinator.termination_hook(Duration::from_secs(5));
        hook();
        assert!(ran.load(Ordering::SeqCst));
        assert!(coordinator.is_engaged());
    }
}
