//! 🎬 *[an intake queue fills with log entries. somewhere, a sink waits.]*
//! *[the clock on the wall reads 2:47am.]*
//!
//! 📦 The BatchWorker: drains entries, turns each into a wire event, and packs them into
//! batches that CloudWatch will actually accept. When the next event won't fit, the
//! pending batch ships first. When the queue closes, whatever's left ships too.
//!
//! ⚠️ A batch the sink refuses is logged and dropped. The worker keeps going; the object
//! keeps going; nobody retries. It is the most emotionally stable part of this codebase.

use std::sync::Arc;

use async_channel::Receiver;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::Worker;
use crate::backends::{LogSink, SinkBackend};
use crate::batching::Batch;
use crate::common::{LogDestination, LogEntry, WireEvent};
use crate::progress::ProgressCounter;

#[derive(Debug)]
pub(crate) struct BatchWorker {
    rx: Receiver<LogEntry>,
    sink: Arc<SinkBackend>,
    destination: LogDestination,
    progress: ProgressCounter,
}

impl BatchWorker {
    /// 🏗️ Hand it a receiver (the firehose), a sink (the drain), and a counter to bump.
    pub(crate) fn new(
        rx: Receiver<LogEntry>,
        sink: Arc<SinkBackend>,
        destination: LogDestination,
        progress: ProgressCounter,
    ) -> Self {
        Self {
            rx,
            sink,
            destination,
            progress,
        }
    }

    /// 🚀 Sort, send, count. On failure: warn, drop, move on.
    async fn flush(&self, batch: &mut Batch) {
        if batch.is_empty() {
            return;
        }
        let the_bytes = batch.size_bytes();
        let the_events = batch.take_sorted();
        let the_count = the_events.len() as u64;

        match self.sink.submit(&self.destination, the_events).await {
            Ok(()) => {
                debug!(
                    "📡 flushed {} events ({} bytes) to {}",
                    the_count, the_bytes, self.destination
                );
                self.progress.add(the_count);
            }
            Err(err) => {
                warn!(
                    "⚠️ dropping a batch of {} events for {}: {:#}",
                    the_count, self.destination, err
                );
            }
        }
    }
}

impl Worker for BatchWorker {
    fn start(self) -> JoinHandle<anyhow::Result<()>> {
        tokio::spawn(async move {
            debug!("📥 BatchWorker started draining the intake queue for {}", self.destination);
            let mut the_batch = Batch::new();

            // -- recv errors only once the queue is empty AND every sender is gone
            while let Ok(entry) = self.rx.recv().await {
                let the_event = match WireEvent::from_entry(&entry) {
                    Ok(event) => event,
                    Err(err) => {
                        warn!("⚠️ skipping an entry that would not serialize: {:#}", err);
                        continue;
                    }
                };
                if the_batch.must_flush_before(&the_event) {
                    self.flush(&mut the_batch).await;
                }
                the_batch.push(the_event);
            }

            debug!("🏁 BatchWorker: intake closed, flushing the last {} events", the_batch.len());
            self.flush(&mut the_batch).await;
            Ok(())
        })
    }
}
