//! Single-slot coalescing debouncer
//!
//! Accepted changes are pushed into one pending slot; a newer push simply replaces the
//! older one. A dedicated settle thread notices that the slot is filled, waits out one
//! quiet period, then hands whatever is in the slot at that moment to the dispatcher.
//!
//! The quiet period runs on a fixed timer from the moment a pending change is noticed.
//! Pushes during the window do not restart it, so a steady stream of changes produces
//! roughly one dispatch per quiet period instead of being postponed forever.
//!
//! Dispatches happen on the settle thread itself, so they never overlap: the next
//! window can only open after the current command has returned.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::dispatcher::Dispatcher;
use crate::error::Result;
use crate::events::ChangeEvent;

pub const DEFAULT_QUIET_DURATION: Duration = Duration::from_secs(1);

/// Something the settle loop can hand a coalesced change to.
pub trait Dispatch: Send + 'static {
    fn dispatch(&mut self, event: ChangeEvent);
}

impl<F> Dispatch for F
where
    F: FnMut(ChangeEvent) + Send + 'static,
{
    fn dispatch(&mut self, event: ChangeEvent) {
        self(event)
    }
}

impl Dispatch for Dispatcher {
    fn dispatch(&mut self, event: ChangeEvent) {
        self.run(&event);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettleState {
    /// Nothing pending; waiting for a push.
    Idle,
    /// A change is pending and the quiet timer is running.
    Settling,
    /// The dispatcher is running for the latest change.
    Dispatching,
    /// The loop has observed a stop request and exited.
    Stopped,
}

#[derive(Debug)]
struct Slot {
    pending: Option<ChangeEvent>,
    available: bool,
    stopping: bool,
    state: SettleState,
}

#[derive(Debug)]
struct Shared {
    slot: Mutex<Slot>,
    wake: Condvar,
    quiet: Duration,
}

impl Shared {
    fn push(&self, event: ChangeEvent) {
        let mut slot = self.slot.lock();
        slot.pending = Some(event);
        slot.available = true;
        self.wake.notify_all();
    }

    fn stop(&self) {
        let mut slot = self.slot.lock();
        slot.stopping = true;
        self.wake.notify_all();
    }

    /// Block until there is a change worth dispatching, or `None` once a stop is seen.
    fn next_settled(&self) -> Option<ChangeEvent> {
        let mut slot = self.slot.lock();

        loop {
            if !slot.available && !slot.stopping {
                self.wake.wait_for(&mut slot, self.quiet);
                if !slot.available && !slot.stopping {
                    continue;
                }
            }

            if !slot.stopping {
                slot.state = SettleState::Settling;
                // Pushes wake us here too; only a stop cuts the window short.
                match Instant::now().checked_add(self.quiet) {
                    Some(deadline) => {
                        while !slot.stopping
                            && !self.wake.wait_until(&mut slot, deadline).timed_out()
                        {}
                    }
                    // Window too long to express as an instant: it lasts until a stop.
                    None => {
                        while !slot.stopping
                            && !self.wake.wait_for(&mut slot, self.quiet).timed_out()
                        {}
                    }
                }
            }

            if slot.stopping {
                slot.state = SettleState::Stopped;
                return None;
            }

            slot.available = false;
            match slot.pending.take() {
                Some(event) => {
                    slot.state = SettleState::Dispatching;
                    return Some(event);
                }
                None => slot.state = SettleState::Idle,
            }
        }
    }

    fn finish_dispatch(&self) {
        let mut slot = self.slot.lock();
        if slot.state == SettleState::Dispatching {
            slot.state = SettleState::Idle;
        }
    }
}

/// Cloneable, thread-safe handle for feeding changes into a [`Debouncer`].
#[derive(Debug, Clone)]
pub struct Pusher {
    shared: Arc<Shared>,
}

impl Pusher {
    pub fn push(&self, event: ChangeEvent) {
        self.shared.push(event);
    }
}

pub struct Debouncer<D: Dispatch> {
    shared: Arc<Shared>,
    dispatcher: Option<D>,
    handle: Option<JoinHandle<()>>,
}

impl<D: Dispatch> Debouncer<D> {
    pub fn new(quiet: Duration, dispatcher: D) -> Self {
        Self {
            shared: Arc::new(Shared {
                slot: Mutex::new(Slot {
                    pending: None,
                    available: false,
                    stopping: false,
                    state: SettleState::Idle,
                }),
                wake: Condvar::new(),
                quiet,
            }),
            dispatcher: Some(dispatcher),
            handle: None,
        }
    }

    /// Spawn the settle loop. Calling this more than once has no further effect.
    pub fn start(&mut self) -> Result<()> {
        let Some(mut dispatcher) = self.dispatcher.take() else {
            tracing::warn!("debouncer already started");
            return Ok(());
        };

        let shared = Arc::clone(&self.shared);
        let handle = thread::Builder::new()
            .name("autorun-settle".to_string())
            .spawn(move || {
                tracing::debug!(quiet_ms = shared.quiet.as_millis() as u64, "settle loop started");

                while let Some(event) = shared.next_settled() {
                    let path = event.path.display().to_string();
                    let result =
                        panic::catch_unwind(AssertUnwindSafe(|| dispatcher.dispatch(event)));
                    if result.is_err() {
                        tracing::error!(path = %path, "dispatch panicked; continuing to watch");
                    }
                    shared.finish_dispatch();
                }

                tracing::debug!("settle loop stopped");
            })?;

        self.handle = Some(handle);
        Ok(())
    }

    /// Replace the pending change. Never waits on the settle loop.
    pub fn push(&self, event: ChangeEvent) {
        self.shared.push(event);
    }

    pub fn pusher(&self) -> Pusher {
        Pusher {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Ask the settle loop to exit. Returns immediately; a running command is left to finish.
    pub fn stop(&self) {
        self.shared.stop();
    }

    /// Wait for the settle loop to exit. Only returns after [`stop`](Self::stop) has been called.
    pub fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!("settle loop panicked");
            }
        }
    }

    pub fn state(&self) -> SettleState {
        self.shared.slot.lock().state
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }
}

impl<D: Dispatch> Drop for Debouncer<D> {
    fn drop(&mut self) {
        self.stop();
        self.join();
    }
}
