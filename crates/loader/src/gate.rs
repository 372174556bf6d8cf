//! Start/stop/shutdown coordination between controller threads and the worker.
//!
//! The gate is a `{ active, running }` pair behind one mutex plus one condition
//! variable. Controllers flip the flags; the worker sleeps until
//! `active || !running` holds. `running` only ever goes from `true` to `false`.
//!
//! ```text
//!   controller                     worker
//!   ──────────                     ──────
//!   start() ─ active=true ─notify─▶ wait_for_work() -> Render
//!                                   pass, pace(interval) ...
//!   stop()  ─ active=false ─notify─▶ wait_for_work() blocks
//!   shutdown() ─ running=false ─▶   wait_for_work() -> Exit
//! ```

use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct GateState {
    active: bool,
    running: bool,
}

/// What the worker should do after waking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    Render,
    Exit,
}

#[derive(Debug)]
pub struct Gate {
    state: Mutex<GateState>,
    signal: Condvar,
}

impl Gate {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(GateState {
                active: false,
                running: true,
            }),
            signal: Condvar::new(),
        }
    }

    // Two bools cannot be left half-written by a panicking holder.
    fn lock(&self) -> MutexGuard<'_, GateState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Marks loading as active and wakes the worker. Idempotent.
    pub fn start(&self) {
        self.lock().active = true;
        self.signal.notify_all();
    }

    /// Marks loading as inactive and wakes the worker. Idempotent.
    pub fn stop(&self) {
        self.lock().active = false;
        self.signal.notify_all();
    }

    /// Sets the active flag to `active` in one critical section.
    pub fn set_active(&self, active: bool) {
        if active {
            self.start();
        } else {
            self.stop();
        }
    }

    /// Requests termination. The worker exits even while loading is active.
    pub fn shutdown(&self) {
        self.lock().running = false;
        self.signal.notify_all();
    }

    pub fn is_active(&self) -> bool {
        self.lock().active
    }

    pub fn is_running(&self) -> bool {
        self.lock().running
    }

    /// Blocks until there is something to draw or the gate shut down.
    ///
    /// `running` is checked before `active`, so shutdown wins over an
    /// outstanding start.
    pub fn wait_for_work(&self) -> Directive {
        let guard = self.lock();
        let guard = self
            .signal
            .wait_while(guard, |state| state.running && !state.active)
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if guard.running {
            Directive::Render
        } else {
            Directive::Exit
        }
    }

    /// Sleeps for up to `interval` between frames.
    ///
    /// Returns early when loading stops or the gate shuts down, so frame pacing
    /// never delays either transition.
    pub fn pace(&self, interval: Duration) -> Directive {
        let deadline = Instant::now() + interval;
        let mut guard = self.lock();
        while guard.running && guard.active {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            let (next, _) = self
                .signal
                .wait_timeout(guard, deadline - now)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            guard = next;
        }
        if guard.running {
            Directive::Render
        } else {
            Directive::Exit
        }
    }
}

impl Default for Gate {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    use crossbeam_channel::bounded;

    #[test]
    fn start_and_stop_are_idempotent() {
        let gate = Gate::new();
        assert!(!gate.is_active());
        gate.start();
        gate.start();
        assert!(gate.is_active());
        gate.stop();
        gate.stop();
        assert!(!gate.is_active());
        assert!(gate.is_running());
    }

    #[test]
    fn waiter_wakes_on_start() {
        let gate = Arc::new(Gate::new());
        let (tx, rx) = bounded(1);
        let waiter = {
            let gate = Arc::clone(&gate);
            thread::spawn(move || {
                tx.send(gate.wait_for_work()).unwrap();
            })
        };

        assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());
        gate.start();
        let directive = rx.recv_timeout(Duration::from_secs(1)).expect("woken");
        assert_eq!(directive, Directive::Render);
        waiter.join().unwrap();
    }

    #[test]
    fn shutdown_wins_over_active() {
        let gate = Gate::new();
        gate.start();
        gate.shutdown();
        assert_eq!(gate.wait_for_work(), Directive::Exit);
        assert_eq!(gate.pace(Duration::from_secs(5)), Directive::Exit);
        assert!(gate.is_active());
        assert!(!gate.is_running());
    }

    #[test]
    fn shutdown_releases_idle_waiter() {
        let gate = Arc::new(Gate::new());
        let (tx, rx) = bounded(1);
        let waiter = {
            let gate = Arc::clone(&gate);
            thread::spawn(move || {
                tx.send(gate.wait_for_work()).unwrap();
            })
        };
        gate.shutdown();
        let directive = rx.recv_timeout(Duration::from_secs(1)).expect("released");
        assert_eq!(directive, Directive::Exit);
        waiter.join().unwrap();
    }

    #[test]
    fn pace_returns_early_on_stop() {
        let gate = Arc::new(Gate::new());
        gate.start();
        let pacer = {
            let gate = Arc::clone(&gate);
            thread::spawn(move || {
                let started = Instant::now();
                let directive = gate.pace(Duration::from_secs(10));
                (directive, started.elapsed())
            })
        };
        thread::sleep(Duration::from_millis(20));
        gate.stop();
        let (directive, elapsed) = pacer.join().unwrap();
        assert_eq!(directive, Directive::Render);
        assert!(elapsed < Duration::from_secs(5));
    }

    #[test]
    fn pace_waits_for_interval_while_active() {
        let gate = Gate::new();
        gate.start();
        let started = Instant::now();
        assert_eq!(gate.pace(Duration::from_millis(30)), Directive::Render);
        assert!(started.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn last_writer_wins_under_contention() {
        let gate = Arc::new(Gate::new());
        let handles: Vec<_> = (0..8)
            .map(|index| {
                let gate = Arc::clone(&gate);
                thread::spawn(move || {
                    for _ in 0..200 {
                        gate.set_active(index % 2 == 0);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        gate.stop();
        assert!(!gate.is_active());
        assert!(gate.is_running());
    }
}
