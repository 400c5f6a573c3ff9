// PlastiWatch V2 - Shared Event Log Handle
//
// Tasks append through one lock so the write cursor and the swap latch are
// updated atomically, the threaded equivalent of masking interrupts around
// the append.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError};

use crate::clock::WallClock;
use crate::events::{Event16Kind, SimpleEvent};
use crate::storage::EventLogStorage;

use super::{EventLog, SwapRequestSink};

pub struct SharedEventLog<S, C, N> {
    inner: Arc<Mutex<EventLog<S, C, N>>>,
}

impl<S, C, N> Clone for SharedEventLog<S, C, N> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S, C, N> SharedEventLog<S, C, N>
where
    S: EventLogStorage,
    C: WallClock,
    N: SwapRequestSink,
{
    pub fn new(log: EventLog<S, C, N>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(log)),
        }
    }

    /// Exclusive access to the log.
    ///
    /// A task that panicked while holding the lock leaves the log usable: every
    /// operation keeps the engine consistent between words.
    pub fn lock(&self) -> MutexGuard<'_, EventLog<S, C, N>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn write_simple(&self, event: SimpleEvent) {
        self.lock().write_simple(event);
    }

    pub fn write_event16(&self, kind: Event16Kind, data: u16) {
        self.lock().write_event16(kind, data);
    }

    /// Append without waiting, for the panic hook.
    ///
    /// If the panicking thread already holds the lock the record is dropped
    /// instead of deadlocking. Returns whether the record was handed to the log.
    pub fn try_write_simple(&self, event: SimpleEvent) -> bool {
        let mut guard = match self.inner.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => return false,
        };
        guard.write_simple(event);
        true
    }
}
