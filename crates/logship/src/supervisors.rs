//! 🎬 *[camera pans across a bucket with ten thousand gzip files in it]*
//! 🎬 "In a world where access logs pile up endlessly..."
//! 🎬 "One supervisor dared to ship them all. But only ten at a time."
//! 🎬 *[record scratch]* 🦆
//!
//! 📦 The Supervisor fans a list of objects out over a fixed number of permits, one
//! pipeline per object, and waits for every last one before saying anything.
//!
//! 🧠 Knowledge graph:
//! - Admission: a permit is acquired BEFORE the task is spawned, and lives inside the
//!   task until its pipeline returns. At most `concurrency` objects are ever in flight.
//! - Results flow back through a `JoinSet` that is drained to the end. The first error
//!   seen wins; later ones get a `warn!` and nothing else.
//!
//! ⚠️ Workers are the supervisor's private little minions. They stay private.

mod workers;
pub(crate) mod pipeline;

use std::sync::Arc;

use anyhow::{Context, Result, anyhow, bail};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::common::ObjectRef;
use crate::progress::{RunProgress, RunSummary};
use pipeline::ObjectProcessor;

/// 📦 The Supervisor: because even async tasks need someone hovering over them
/// asking "is it done yet?" every 5 milliseconds.
pub(crate) struct Supervisor {
    processor: Arc<dyn ObjectProcessor>,
    concurrency: usize,
    progress: RunProgress,
}

impl Supervisor {
    pub(crate) fn new(processor: Arc<dyn ObjectProcessor>, concurrency: usize, progress: RunProgress) -> Self {
        Self {
            processor,
            concurrency,
            progress,
        }
    }

    /// 🧵 Unleash the pipelines. Returns a summary in the order the objects were given,
    /// or the first error any of them hit, once all of them are done.
    pub(crate) async fn run(&self, objects: Vec<ObjectRef>) -> Result<RunSummary> {
        if self.concurrency == 0 {
            bail!("💀 concurrency must be at least 1, otherwise nothing ever gets a permit");
        }
        if objects.is_empty() {
            info!("🤷 no objects to process");
            return Ok(RunSummary::default());
        }

        info!(
            "🚀 processing {} objects, at most {} at a time",
            objects.len(),
            self.concurrency
        );
        let the_permits = Arc::new(Semaphore::new(self.concurrency));
        let mut the_tasks = JoinSet::new();

        for (index, object) in objects.into_iter().enumerate() {
            // -- waits right here while every permit is out
            let the_permit = Arc::clone(&the_permits)
                .acquire_owned()
                .await
                .context("💀 the admission semaphore closed underneath us")?;
            let the_processor = Arc::clone(&self.processor);
            the_tasks.spawn(async move {
                let the_result = the_processor.process(&object).await;
                drop(the_permit);
                (index, object, the_result)
            });
        }

        let mut first_error: Option<anyhow::Error> = None;
        let mut finished: Vec<(usize, ObjectRef, u64)> = Vec::new();

        while let Some(joined) = the_tasks.join_next().await {
            let the_error = match joined {
                Ok((index, object, Ok(entries))) => {
                    debug!("✅ {} done: {} entries", object, entries);
                    self.progress.object_finished(&object, entries);
                    finished.push((index, object, entries));
                    continue;
                }
                Ok((_, object, Err(err))) => {
                    self.progress.object_failed(&object.to_string());
                    err.context(format!("error processing logs for {}", object))
                }
                Err(join_err) => {
                    self.progress.object_failed("a panicked object");
                    anyhow!(join_err).context("💀 an object task panicked")
                }
            };

            if first_error.is_none() {
                first_error = Some(the_error);
            } else {
                warn!("⚠️ another object failed after the first error: {:#}", the_error);
            }
        }
        self.progress.finish();

        if let Some(err) = first_error {
            return Err(err);
        }

        finished.sort_by_key(|(index, _, _)| *index);
        Ok(RunSummary {
            objects: finished
                .into_iter()
                .map(|(_, object, entries)| (object, entries))
                .collect(),
        })
    }
}
