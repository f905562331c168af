//! Command queue and the acquire/release window.

use crate::backend::Backend;
use gravwell_core::{Event, EventStatus, KernelId, MemId, Result};
use std::sync::Arc;

/// In-order command queue of a compute context.
#[derive(Debug, Clone)]
pub struct CommandQueue {
    backend: Arc<dyn Backend>,
}

impl CommandQueue {
    pub(crate) fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }

    /// Enqueue a host-to-device copy of `data` into `mem`.
    pub fn write(&self, mem: MemId, data: &[u8], wait: &[Event]) -> Result<Event> {
        self.backend.enqueue_write(mem, data, wait)
    }

    /// Enqueue an acquire of `mems` and return the guard for the access window.
    ///
    /// The window closes with [`Acquired::release`]. If the guard is dropped
    /// without it, drop waits for the acquire and, only if the acquire
    /// succeeded, enqueues the release and waits for it.
    pub fn acquire(&self, mems: &[MemId], wait: &[Event]) -> Result<Acquired<'_>> {
        let event = self.backend.enqueue_acquire(mems, wait)?;
        Ok(Acquired {
            queue: self,
            mems: mems.to_vec(),
            event,
            released: false,
        })
    }

    /// Enqueue `kernel` over `global` work items.
    pub fn dispatch(&self, kernel: KernelId, global: usize, wait: &[Event]) -> Result<Event> {
        self.backend.enqueue_dispatch(kernel, global, wait)
    }

    /// Submit everything enqueued so far without waiting.
    pub fn flush(&self) -> Result<()> {
        self.backend.flush()
    }

    /// Block until every enqueued command has completed.
    pub fn finish(&self) -> Result<()> {
        self.backend.finish()
    }

    /// Block until `events` complete. Fails with the code of the first
    /// failed command among them.
    pub fn wait(&self, events: &[Event]) -> Result<()> {
        self.backend.wait(events)
    }

    /// Current execution status of `event`.
    pub fn status(&self, event: Event) -> Result<EventStatus> {
        self.backend.event_status(event)
    }
}

/// Compute ownership of a set of shared views.
#[must_use = "dropping the guard releases the buffers immediately"]
#[derive(Debug)]
pub struct Acquired<'q> {
    queue: &'q CommandQueue,
    mems: Vec<MemId>,
    event: Event,
    released: bool,
}

impl Acquired<'_> {
    /// Event of the acquire command.
    pub fn event(&self) -> Event {
        self.event
    }

    /// Enqueue the matching release after `wait`.
    pub fn release(mut self, wait: &[Event]) -> Result<Event> {
        let release = self.queue.backend.enqueue_release(&self.mems, wait)?;
        self.released = true;
        Ok(release)
    }
}

impl Drop for Acquired<'_> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        // A failed acquire never opened a window, so there is nothing to give back.
        if let Err(e) = self
            .queue
            .flush()
            .and_then(|()| self.queue.wait(&[self.event]))
        {
            tracing::warn!(
                acquire = %self.event,
                error = %e,
                "acquire did not complete, leaving ownership as is"
            );
            return;
        }
        tracing::warn!(
            acquire = %self.event,
            views = self.mems.len(),
            "releasing shared buffers after a failed frame"
        );
        let recovered = self
            .queue
            .backend
            .enqueue_release(&self.mems, &[])
            .and_then(|release| {
                self.queue.flush()?;
                self.queue.wait(&[release])
            });
        if let Err(e) = recovered {
            tracing::error!(error = %e, "release after failure did not complete");
        }
    }
}
