use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Notify;

/// Exclusive refresh permit combining an `AtomicBool` and a `Notify`
///
/// The flag is what refreshers race on: a compare-and-swap either hands out the
/// permit or tells the caller somebody else is already refreshing. The `Notify`
/// only serves callers that must wait for the permit instead of giving up.
///
/// The permit is returned by dropping the [`GateGuard`], which also happens when
/// the refresher panics or its future is dropped mid-lookup.
#[derive(Debug, Default)]
pub(super) struct RefreshGate {
    busy: AtomicBool,
    released: Notify,
}

impl RefreshGate {
    /// Take the permit if nobody holds it, without waiting
    pub fn try_acquire(&self) -> Option<GateGuard<'_>> {
        self.busy
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .ok()
            .map(|_| GateGuard { gate: self })
    }

    /// Wait until the permit is free, then take it
    pub async fn acquire(&self) -> GateGuard<'_> {
        loop {
            // Register before checking the flag so a release in between is not missed
            let released = self.released.notified();
            if let Some(guard) = self.try_acquire() {
                return guard;
            }
            released.await;
        }
    }

    #[cfg(test)]
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Relaxed)
    }
}

#[derive(Debug)]
pub(super) struct GateGuard<'a> {
    gate: &'a RefreshGate,
}

impl Drop for GateGuard<'_> {
    fn drop(&mut self) {
        self.gate.busy.store(false, Ordering::Release);
        self.gate.released.notify_waiters();
    }
}
