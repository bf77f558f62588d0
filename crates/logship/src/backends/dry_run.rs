//! 🧪 Dry-run sink: does everything except actually sending anything.
//!
//! Useful for pointing logship at a bucket to see how many entries would ship, how
//! many batches that takes, and whether the parser chokes on anything, without
//! creating log groups or paying for ingestion.

use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::Result;
use async_trait::async_trait;
use tracing::debug;

use super::LogSink;
use crate::common::{LogDestination, WireEvent};

/// 🧮 Counts batches and events, keeps nothing else.
#[derive(Debug, Default)]
pub(crate) struct DryRunSink {
    batches: AtomicU64,
    events: AtomicU64,
}

impl DryRunSink {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn batches(&self) -> u64 {
        self.batches.load(Ordering::Relaxed)
    }

    pub(crate) fn events(&self) -> u64 {
        self.events.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl LogSink for DryRunSink {
    async fn submit(&self, destination: &LogDestination, events: Vec<WireEvent>) -> Result<()> {
        let the_bytes: usize = events.iter().map(WireEvent::size_estimate).sum();
        debug!(
            "🧪 dry run: would send {} events ({} bytes) to {}",
            events.len(),
            the_bytes,
            destination
        );
        self.batches.fetch_add(1, Ordering::Relaxed);
        self.events.fetch_add(events.len() as u64, Ordering::Relaxed);
        Ok(())
    }
}
