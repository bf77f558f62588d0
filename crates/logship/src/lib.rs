//! 🚚 logship: ALB access logs out of S3, into CloudWatch Logs.
//!
//! Each gzip object is streamed, decompressed, parsed, trimmed to the columns you
//! asked for, and shipped in batches CloudWatch will accept. Many objects at once, but
//! never more than `runtime.concurrency`.

pub mod app_config;
mod backends;
pub mod batching;
pub mod common;
mod conduit;
pub mod fields;
pub mod progress;
pub mod records;
mod supervisors;
pub mod triggers;

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use crate::app_config::AppConfig;
use crate::backends::{
    CloudWatchSink, DryRunSink, ObjectStore, ObjectStoreBackend, S3ObjectStore, SinkBackend,
};
use crate::common::{LogDestination, ObjectRef};
use crate::fields::FieldSelection;
use crate::supervisors::Supervisor;
use crate::supervisors::pipeline::ObjectPipeline;

pub use crate::progress::{RunProgress, RunSummary};
pub use crate::triggers::{S3ObjectCreatedEvent, Trigger, parse_s3_url};

/// 🚀 The whole show: resolve fields, wire up AWS, bootstrap the destination, find the
/// objects, fan out, report.
///
/// 💀 Fails before touching any object on a bad field selection, a failed log
/// group/stream bootstrap, a malformed URL, or a failed listing. After that, fails
/// only if some object could not be fetched, and only once every object is done.
pub async fn run(app_config: AppConfig, trigger: Trigger) -> Result<RunSummary> {
    let the_selection = FieldSelection::resolve(&app_config.fields).context("💀 invalid field selection")?;
    let the_destination = app_config.destination();
    let the_aws_config = backends::load_aws_config(app_config.region.as_deref()).await;

    let the_sink = if app_config.dry_run {
        info!("🧪 dry run: nothing will be sent to {}", the_destination);
        SinkBackend::DryRun(DryRunSink::new())
    } else {
        SinkBackend::CloudWatch(CloudWatchSink::new(&the_aws_config, &the_destination).await?)
    };
    let the_store = ObjectStoreBackend::S3(S3ObjectStore::new(&the_aws_config));

    let the_objects = resolve_objects(&the_store, trigger).await?;
    let the_progress = RunProgress::new(the_objects.len() as u64);
    let the_sink = Arc::new(the_sink);

    let the_summary = ship(
        Arc::new(the_store),
        Arc::clone(&the_sink),
        the_selection,
        the_destination,
        app_config.runtime.concurrency,
        the_objects,
        the_progress,
    )
    .await?;

    if let SinkBackend::DryRun(dry_run) = the_sink.as_ref() {
        info!(
            "🧪 dry run complete: {} events in {} batches would have been sent",
            dry_run.events(),
            dry_run.batches()
        );
    }
    Ok(the_summary)
}

/// 🔍 Turn a trigger into the concrete list of objects to process.
async fn resolve_objects(store: &ObjectStoreBackend, trigger: Trigger) -> Result<Vec<ObjectRef>> {
    match trigger {
        Trigger::Url(url) => {
            let (bucket, prefix) = parse_s3_url(&url).with_context(|| format!("💀 bad S3 URL '{}'", url))?;
            let the_objects = store
                .list(&bucket, &prefix)
                .await
                .context("failed to list objects")?;
            info!("📜 found {} objects under {}", the_objects.len(), url);
            Ok(the_objects)
        }
        Trigger::Event(event) => Ok(event.objects()),
    }
}

/// 🧵 Fan the objects out over one shared pipeline.
async fn ship(
    store: Arc<ObjectStoreBackend>,
    sink: Arc<SinkBackend>,
    selection: FieldSelection,
    destination: LogDestination,
    concurrency: usize,
    objects: Vec<ObjectRef>,
    progress: RunProgress,
) -> Result<RunSummary> {
    let the_pipeline = Arc::new(ObjectPipeline::new(store, sink, selection, destination));
    Supervisor::new(the_pipeline, concurrency, progress)
        .run(objects)
        .await
}
