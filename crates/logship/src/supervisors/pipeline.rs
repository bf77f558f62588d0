//! 🚰 The object pipeline: one S3 object, start to finish.
//!
//! ```text
//!   store.fetch ──▶ InflateWorker ──conduit──▶ parse_stream ──intake──▶ BatchWorker ──▶ sink
//!    (async)          (tokio task)              (blocking pool)          (tokio task)
//! ```
//!
//! The parser is the only stage the pipeline awaits directly. When it returns, for any
//! reason, it drops both its conduit reader and its intake sender. That one drop is what
//! lets the inflater stop (its next write fails) and lets the batch worker finish (the
//! queue closes once drained). No stage can be left waiting on a partner that is gone.
//!
//! 💀 Only a failed fetch (or a panicked task) fails the object. A bad line, a corrupt
//! gzip, a rejected batch: logged, and whatever was already queued still ships.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::workers::{BatchWorker, InflateWorker, Worker};
use crate::backends::{ObjectStore, ObjectStoreBackend, SinkBackend};
use crate::batching::INTAKE_QUEUE_CAPACITY;
use crate::common::{LogDestination, ObjectRef};
use crate::conduit::conduit;
use crate::fields::FieldSelection;
use crate::progress::ProgressCounter;
use crate::records::parse_stream;

/// 🎯 Something that can take one object all the way through and say how many entries shipped.
///
/// The supervisor only knows this trait, which is how its tests get to count heads
/// without any S3 in the room.
#[async_trait]
pub(crate) trait ObjectProcessor: Send + Sync {
    async fn process(&self, object: &ObjectRef) -> Result<u64>;
}

/// 🚰 Shared by every object in a run. Cloning the `Arc`s is the whole per-object setup cost.
#[derive(Debug)]
pub(crate) struct ObjectPipeline {
    store: Arc<ObjectStoreBackend>,
    sink: Arc<SinkBackend>,
    selection: Arc<FieldSelection>,
    destination: LogDestination,
}

impl ObjectPipeline {
    pub(crate) fn new(
        store: Arc<ObjectStoreBackend>,
        sink: Arc<SinkBackend>,
        selection: FieldSelection,
        destination: LogDestination,
    ) -> Self {
        Self {
            store,
            sink,
            selection: Arc::new(selection),
            destination,
        }
    }
}

#[async_trait]
impl ObjectProcessor for ObjectPipeline {
    async fn process(&self, object: &ObjectRef) -> Result<u64> {
        info!("🚀 processing {}", object);
        let the_body = self
            .store
            .fetch(object)
            .await
            .with_context(|| format!("failed to get object {}", object))?;

        let (writer, reader) = conduit();
        let the_inflater = InflateWorker::new(object.clone(), the_body, writer).start();

        let (tx, rx) = async_channel::bounded(INTAKE_QUEUE_CAPACITY);
        let the_progress = ProgressCounter::new();
        let the_batcher = BatchWorker::new(
            rx,
            Arc::clone(&self.sink),
            self.destination.clone(),
            the_progress.clone(),
        )
        .start();

        // -- reader and tx move in here and drop when parsing ends, which unblocks both workers
        let the_selection = Arc::clone(&self.selection);
        let the_parse_result = tokio::task::spawn_blocking(move || parse_stream(reader, &the_selection, &tx))
            .await
            .context("💀 the parser thread panicked")?;
        match the_parse_result {
            Ok(handed_off) => debug!("🧾 parsed {} entries from {}", handed_off, object),
            Err(err) => warn!("⚠️ stopped parsing {} early, flushing what we have: {:#}", object, err),
        }

        the_batcher
            .await
            .context("💀 the batch worker panicked")?
            .with_context(|| format!("batch worker for {} failed", object))?;

        // -- by now the inflater has either finished or noticed the parser left
        if let Err(err) = the_inflater.await.context("💀 the inflate worker panicked")? {
            debug!("🫁 inflater for {} ended early: {:#}", object, err);
        }

        let the_shipped = the_progress.value();
        info!("✅ processed {} log entries from {}", the_shipped, object);
        Ok(the_shipped)
    }
}
