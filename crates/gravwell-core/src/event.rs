//! Synchronization events.
//!
//! Every asynchronous step of a frame yields an [`Event`]. Later steps name the
//! events they depend on in a wait list; the queue guarantees a command does not
//! start before everything in its wait list has completed.

use std::fmt;

/// Which step produced an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Host-to-device transfer of the auxiliary vector.
    Transfer,
    /// Shared buffers handed from graphics to compute.
    Acquire,
    /// Kernel dispatch.
    Exec,
    /// Shared buffers handed back to graphics.
    Release,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EventKind::Transfer => "transfer",
            EventKind::Acquire => "acquire",
            EventKind::Exec => "exec",
            EventKind::Release => "release",
        };
        f.write_str(name)
    }
}

/// Execution state of an event's command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum EventStatus {
    Queued,
    Submitted,
    Complete,
}

/// Handle to one enqueued command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Event {
    id: u64,
    kind: EventKind,
}

impl Event {
    pub fn new(id: u64, kind: EventKind) -> Self {
        Self { id, kind }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.kind, self.id)
    }
}

/// The named events of one payload.
///
/// `transfer` is produced once at load time (upload policy only) and consulted
/// by every dispatch. The other three describe the current frame and are
/// cleared by [`FrameEvents::begin_frame`].
#[derive(Debug, Clone, Default)]
pub struct FrameEvents {
    pub transfer: Option<Event>,
    pub acquire: Option<Event>,
    pub exec: Option<Event>,
    pub release: Option<Event>,
}

impl FrameEvents {
    /// Forget the previous frame's events; keep the load-time transfer.
    pub fn begin_frame(&mut self) {
        self.acquire = None;
        self.exec = None;
        self.release = None;
    }

    /// Wait list for a dispatch: the acquire plus any pending transfer.
    pub fn dispatch_wait_list(&self) -> Vec<Event> {
        self.transfer.iter().chain(self.acquire.iter()).copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_begin_frame_keeps_transfer() {
        let mut events = FrameEvents {
            transfer: Some(Event::new(1, EventKind::Transfer)),
            acquire: Some(Event::new(2, EventKind::Acquire)),
            exec: Some(Event::new(3, EventKind::Exec)),
            release: Some(Event::new(4, EventKind::Release)),
        };
        events.begin_frame();
        assert!(events.acquire.is_none() && events.exec.is_none() && events.release.is_none());
        assert_eq!(events.transfer.map(|e| e.id()), Some(1));
    }

    #[test]
    fn test_dispatch_wait_list_orders_transfer_first() {
        let events = FrameEvents {
            transfer: Some(Event::new(7, EventKind::Transfer)),
            acquire: Some(Event::new(9, EventKind::Acquire)),
            ..Default::default()
        };
        let ids: Vec<u64> = events.dispatch_wait_list().iter().map(Event::id).collect();
        assert_eq!(ids, vec![7, 9]);
    }
}
