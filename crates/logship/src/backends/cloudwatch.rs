//! 📡 CloudWatch Logs sink: the last stop for every access-log line.
//!
//! Construction does the one-time bootstrap: make sure the log group exists, then make
//! sure the stream exists inside it, creating either if missing. After that, every
//! `submit` is exactly one `PutLogEvents` call. No buffering here, no retries, no
//! sequence tokens (CloudWatch stopped requiring those, bless them).
//!
//! 🧠 Knowledge graph: batching and sorting happen upstream in the batch worker. By the
//! time a batch gets here it already fits the 1 MiB / 10,000 event limits and is in
//! chronological order. This sink just translates and sends.

use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_sdk_cloudwatchlogs::Client;
use aws_sdk_cloudwatchlogs::types::InputLogEvent;
use tracing::{debug, info, warn};

use super::LogSink;
use crate::common::{LogDestination, WireEvent};

/// 📡 Pure I/O. Holds a client, knows how to call `PutLogEvents`, that's the whole job.
#[derive(Debug, Clone)]
pub(crate) struct CloudWatchSink {
    client: Client,
}

impl CloudWatchSink {
    /// 🚀 Build the client and bootstrap the destination.
    ///
    /// ⚠️ Creating a group or stream that already exists (say, two invocations racing
    /// each other) counts as success. Idempotent or bust.
    pub(crate) async fn new(sdk_config: &aws_config::SdkConfig, destination: &LogDestination) -> Result<Self> {
        let client = Client::new(sdk_config);
        ensure_log_group_exists(&client, &destination.log_group_name)
            .await
            .context("💀 error creating log group and stream")?;
        ensure_log_stream_exists(&client, &destination.log_group_name, &destination.log_stream_name)
            .await
            .context("💀 error creating log group and stream")?;
        Ok(Self { client })
    }
}

async fn ensure_log_group_exists(client: &Client, log_group_name: &str) -> Result<()> {
    let the_response = client
        .describe_log_groups()
        .log_group_name_prefix(log_group_name)
        .send()
        .await
        .with_context(|| format!("failed to describe log groups named '{}'", log_group_name))?;

    // -- the exact name sorts first among everything sharing its prefix, so page one has it if anyone does
    let already_there = the_response
        .log_groups()
        .iter()
        .any(|group| group.log_group_name() == Some(log_group_name));
    if already_there {
        debug!("✅ log group {} already exists", log_group_name);
        return Ok(());
    }

    info!("🏗️ creating log group {}", log_group_name);
    match client.create_log_group().log_group_name(log_group_name).send().await {
        Ok(_) => Ok(()),
        Err(err)
            if err
                .as_service_error()
                .is_some_and(|e| e.is_resource_already_exists_exception()) =>
        {
            Ok(())
        }
        Err(err) => Err(err).with_context(|| format!("failed to create log group '{}'", log_group_name)),
    }
}

async fn ensure_log_stream_exists(client: &Client, log_group_name: &str, log_stream_name: &str) -> Result<()> {
    let the_response = client
        .describe_log_streams()
        .log_group_name(log_group_name)
        .log_stream_name_prefix(log_stream_name)
        .send()
        .await
        .with_context(|| format!("failed to describe log streams in '{}'", log_group_name))?;

    let already_there = the_response
        .log_streams()
        .iter()
        .any(|stream| stream.log_stream_name() == Some(log_stream_name));
    if already_there {
        debug!("✅ log stream {} already exists in {}", log_stream_name, log_group_name);
        return Ok(());
    }

    info!("🏗️ creating log stream {} in log group {}", log_stream_name, log_group_name);
    match client
        .create_log_stream()
        .log_group_name(log_group_name)
        .log_stream_name(log_stream_name)
        .send()
        .await
    {
        Ok(_) => Ok(()),
        Err(err)
            if err
                .as_service_error()
                .is_some_and(|e| e.is_resource_already_exists_exception()) =>
        {
            Ok(())
        }
        Err(err) => Err(err).with_context(|| {
            format!(
                "failed to create log stream '{}' in '{}'",
                log_stream_name, log_group_name
            )
        }),
    }
}

#[async_trait]
impl LogSink for CloudWatchSink {
    /// 📡 One batch in, one `PutLogEvents` out. Rejected events are logged, not retried.
    async fn submit(&self, destination: &LogDestination, events: Vec<WireEvent>) -> Result<()> {
        let the_event_count = events.len();
        let the_log_events = events
            .into_iter()
            .map(|event| {
                InputLogEvent::builder()
                    .message(event.message)
                    .timestamp(event.timestamp_millis)
                    .build()
            })
            .collect::<Result<Vec<_>, _>>()
            .context("💀 failed to build CloudWatch log events")?;

        let the_response = self
            .client
            .put_log_events()
            .log_group_name(&destination.log_group_name)
            .log_stream_name(&destination.log_stream_name)
            .set_log_events(Some(the_log_events))
            .send()
            .await
            .with_context(|| {
                format!(
                    "💀 PutLogEvents to {} failed for a batch of {} events",
                    destination, the_event_count
                )
            })?;

        if let Some(rejected) = the_response.rejected_log_events_info() {
            warn!(
                "⚠️ CloudWatch accepted the batch to {} but rejected some events: {:?}",
                destination, rejected
            );
        }
        Ok(())
    }
}
