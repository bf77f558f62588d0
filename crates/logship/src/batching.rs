//! 📦 Batching: the two-rule bouncer standing between us and `PutLogEvents`.
//!
//! CloudWatch takes at most 10,000 events or 1 MiB per call, whichever you hit first,
//! and it wants them in chronological order. A [`Batch`] tracks both budgets as events
//! are appended and knows when it has to be shipped before the next one fits.
//!
//! 🧠 Knowledge graph:
//! - [`Batch::must_flush_before`]: the decision the accumulator asks before every push.
//! - [`Batch::take_sorted`]: empties the batch and returns its events sorted by timestamp.
//! - A lone event bigger than the byte budget still gets a batch of its own. We don't
//!   wait for the universe to make room. The universe is not making room.

use crate::common::WireEvent;

/// 📏 CloudWatch's request size cap: 1 MiB of messages plus per-event overhead.
pub const MAX_BATCH_BYTES: usize = 1_048_576;

/// 🔢 CloudWatch's event count cap per request.
pub const MAX_BATCH_COUNT: usize = 10_000;

/// 🚦 Intake queue capacity: ⌈1.25 × MAX_BATCH_COUNT⌉, so a full batch plus a burst
/// can sit in the queue while the previous batch is on the wire.
pub const INTAKE_QUEUE_CAPACITY: usize = MAX_BATCH_COUNT + MAX_BATCH_COUNT.div_ceil(4);

/// 📦 The pending batch. Owned by exactly one accumulator task, never shared.
#[derive(Debug, Default)]
pub struct Batch {
    events: Vec<WireEvent>,
    size_bytes: usize,
}

impl Batch {
    pub fn new() -> Self {
        Self::default()
    }

    /// 🤔 Would appending `event` break a budget? Only a non-empty batch ever says yes.
    pub fn must_flush_before(&self, event: &WireEvent) -> bool {
        !self.events.is_empty()
            && (self.size_bytes + event.size_estimate() > MAX_BATCH_BYTES
                || self.events.len() >= MAX_BATCH_COUNT)
    }

    pub fn push(&mut self, event: WireEvent) {
        self.size_bytes += event.size_estimate();
        self.events.push(event);
    }

    /// 🗑️ Hand over every event, oldest first, and reset to empty.
    /// The sort is stable, so same-millisecond events keep their arrival order.
    pub fn take_sorted(&mut self) -> Vec<WireEvent> {
        let mut the_events = std::mem::take(&mut self.events);
        self.size_bytes = 0;
        the_events.sort_by_key(|event| event.timestamp_millis);
        the_events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// 📏 Sum of `size_estimate()` over the pending events.
    pub fn size_bytes(&self) -> usize {
        self.size_bytes
    }
}
