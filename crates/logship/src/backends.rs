//! 🔌 Backends: where the real I/O happens.
//!
//! 🚰 Object stores pour the gzip, log sinks slurp up the batches.
//! And in between, we panic! (kidding, we use anyhow)
//!
//! 🎭 This module is the casting agency. Need bytes out of S3? A sink that writes to
//! CloudWatch? A sink that just counts and nods, for dry runs? We've got a backend
//! for that. Tests get in-memory understudies that never touch the network.
//!
//! 🦆 The duck is here because every file must have one. This is law. Do not question the duck.

use anyhow::Result;
use async_trait::async_trait;
use tokio::io::AsyncRead;

use crate::common::{LogDestination, ObjectRef, WireEvent};

pub(crate) mod cloudwatch;
pub(crate) mod dry_run;
#[cfg(test)]
pub(crate) mod in_mem;
pub(crate) mod s3;

pub(crate) use cloudwatch::CloudWatchSink;
pub(crate) use dry_run::DryRunSink;
pub(crate) use s3::S3ObjectStore;

// 🧠 Boxed because every store hands back a different concrete reader type and the
// pipeline doesn't care which. One vtable hop per read; the network laughs at that cost.
pub(crate) type ObjectBody = Box<dyn AsyncRead + Send + Unpin>;

// ===== Object Store Trait and Backend Enum =====

/// 🪣 Somewhere objects live.
///
/// # Contract
/// - `fetch` opens a streaming reader over one object's raw (still compressed) bytes.
///   Dropping the reader releases the underlying connection.
/// - `list` returns every object under `prefix`, all pages of it. Pagination is the
///   implementor's problem, not the caller's.
#[async_trait]
pub(crate) trait ObjectStore: std::fmt::Debug + Send + Sync {
    async fn fetch(&self, object: &ObjectRef) -> Result<ObjectBody>;
    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<ObjectRef>>;
}

/// 🎭 The many faces of an object store, dispatched by enum so the pipeline never
/// needs to know whether it is talking to AWS or to a `HashMap` in a test.
#[derive(Debug)]
pub(crate) enum ObjectStoreBackend {
    S3(S3ObjectStore),
    #[cfg(test)]
    InMemory(in_mem::InMemoryObjectStore),
}

#[async_trait]
impl ObjectStore for ObjectStoreBackend {
    async fn fetch(&self, object: &ObjectRef) -> Result<ObjectBody> {
        match self {
            ObjectStoreBackend::S3(store) => store.fetch(object).await,
            #[cfg(test)]
            ObjectStoreBackend::InMemory(store) => store.fetch(object).await,
        }
    }

    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<ObjectRef>> {
        match self {
            ObjectStoreBackend::S3(store) => store.list(bucket, prefix).await,
            #[cfg(test)]
            ObjectStoreBackend::InMemory(store) => store.list(bucket, prefix).await,
        }
    }
}

// ===== Log Sink Trait and Backend Enum =====

/// 🕳️ Where batches go to be remembered (or at least stored).
///
/// # Contract
/// - `submit` receives one batch, already sorted oldest-first and already within the
///   size and count budgets, and delivers it in one call.
/// - No retries. An `Err` means this batch is gone; the caller decides how sad to be.
/// - `&self`, not `&mut self`: one sink is shared by every object pipeline in flight.
#[async_trait]
pub(crate) trait LogSink: std::fmt::Debug + Send + Sync {
    async fn submit(&self, destination: &LogDestination, events: Vec<WireEvent>) -> Result<()>;
}

/// 🎭 The many faces of a sink. Mirrors `ObjectStoreBackend` on the other end of the pipe.
#[derive(Debug)]
pub(crate) enum SinkBackend {
    CloudWatch(CloudWatchSink),
    DryRun(DryRunSink),
    #[cfg(test)]
    InMemory(in_mem::InMemorySink),
}

#[async_trait]
impl LogSink for SinkBackend {
    async fn submit(&self, destination: &LogDestination, events: Vec<WireEvent>) -> Result<()> {
        match self {
            SinkBackend::CloudWatch(sink) => sink.submit(destination, events).await,
            SinkBackend::DryRun(sink) => sink.submit(destination, events).await,
            #[cfg(test)]
            SinkBackend::InMemory(sink) => sink.submit(destination, events).await,
        }
    }
}

/// 🔧 Load AWS config from the environment (env vars, profile, IMDS, hope), with an
/// optional region override from our own config.
pub(crate) async fn load_aws_config(region: Option<&str>) -> aws_config::SdkConfig {
    let mut the_loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
    if let Some(region) = region {
        the_loader = the_loader.region(aws_config::Region::new(region.to_string()));
    }
    the_loader.load().await
}
