//! A bounded FIFO [`rt_protocol::EventSink`]: drop-oldest for non-terminal deltas, never-drop for
//! `TaskStarted`/`TaskComplete`/`TurnAborted`/`Error`.
//!
//! A plain `Mutex<VecDeque<_>>` rather than an mpsc channel, since
//! [`rt_protocol::EventSink::emit`] is a synchronous, non-blocking push.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use rt_protocol::{Event, EventSink};
use tracing::warn;

/// A bounded, drop-oldest-except-terminal FIFO buffer of [`Event`]s.
pub struct BoundedEventSink {
    capacity: usize,
    queue: Mutex<VecDeque<Event>>,
    dropped: AtomicU64,
}

impl BoundedEventSink {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            queue: Mutex::new(VecDeque::with_capacity(capacity.max(1))),
            dropped: AtomicU64::new(0),
        }
    }

    /// Pop the next buffered event, if any, in producer order.
    pub fn try_recv(&self) -> Option<Event> {
        self.queue.lock().unwrap().pop_front()
    }

    /// Drain every currently-buffered event, in producer order.
    pub fn drain(&self) -> Vec<Event> {
        self.queue.lock().unwrap().drain(..).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.lock().unwrap().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total number of non-terminal events dropped under backpressure since
    /// creation.
    #[must_use]
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl EventSink for BoundedEventSink {
    fn emit(&self, event: Event) {
        let mut queue = self.queue.lock().unwrap();
        if queue.len() >= self.capacity {
            if let Some(idx) = queue.iter().position(|e| !e.msg.is_never_drop()) {
                queue.remove(idx);
                self.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(submission_id = %event.id, "event sink at capacity, dropped oldest non-terminal event");
            } else if !event.msg.is_never_drop() {
                // Every buffered event is a must-keep terminal event; drop
                // the incoming non-terminal one rather than grow unbounded.
                self.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(submission_id = %event.id, "event sink saturated with terminal events, dropped incoming delta");
                return;
            }
            // else: both the buffer and the incoming event are never-drop —
            // grow past capacity rather than lose a terminal event.
        }
        queue.push_back(event);
    }
}
