//! # Previously, on logship...
//!
//! 🎬 The logs were trapped. Stranded in a bucket that doesn't exist, waiting for a
//! CloudWatch that will never answer. Someone had to pretend. Someone had to be brave.
//!
//! That someone was this module.
//!
//! `in_mem` provides an in-memory [`ObjectStore`] and [`LogSink`] for tests. The store
//! is a `HashMap` wearing an S3 costume. The sink collects every batch behind an
//! `Arc<Mutex<..>>` so tests can inspect what arrived, and can be told to fail its first
//! few submissions to see who panics (nobody should).
//!
//! ⚠️ Test-only. It isn't even compiled otherwise, so deploying it would take effort.

use std::collections::HashMap;
use std::io::Cursor;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{Result, bail};
use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{LogSink, ObjectBody, ObjectStore};
use crate::common::{LogDestination, ObjectRef, WireEvent};

/// 🪣 A bucket-shaped `HashMap`. Keys are full `ObjectRef`s, values are raw object bytes.
#[derive(Debug, Default)]
pub(crate) struct InMemoryObjectStore {
    objects: HashMap<ObjectRef, Vec<u8>>,
}

impl InMemoryObjectStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// 📦 Drop an object into the pretend bucket. Builder style, because tests read better that way.
    pub(crate) fn with_object(mut self, bucket: &str, key: &str, bytes: Vec<u8>) -> Self {
        self.objects.insert(ObjectRef::new(bucket, key), bytes);
        self
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn fetch(&self, object: &ObjectRef) -> Result<ObjectBody> {
        match self.objects.get(object) {
            Some(bytes) => Ok(Box::new(Cursor::new(bytes.clone()))),
            // -- same vibe as the real thing, without the XML
            None => bail!("NoSuchKey: {} is not in the in-memory store", object),
        }
    }

    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<ObjectRef>> {
        let mut the_objects: Vec<ObjectRef> = self
            .objects
            .keys()
            .filter(|object| object.bucket == bucket && object.key.starts_with(prefix))
            .cloned()
            .collect();
        // -- S3 lists lexicographically, so do we
        the_objects.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(the_objects)
    }
}

/// 🕳️ Remembers every batch it is handed, in submission order.
#[derive(Debug, Clone, Default)]
pub(crate) struct InMemorySink {
    batches: Arc<Mutex<Vec<Vec<WireEvent>>>>,
    failures_remaining: Arc<AtomicUsize>,
}

impl InMemorySink {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// 💀 A sink whose first `count` submissions fail. Failed batches are not recorded.
    pub(crate) fn failing_first(count: usize) -> Self {
        let the_sink = Self::default();
        the_sink.failures_remaining.store(count, Ordering::SeqCst);
        the_sink
    }

    /// 🔍 Snapshot of everything received so far.
    pub(crate) async fn batches(&self) -> Vec<Vec<WireEvent>> {
        self.batches.lock().await.clone()
    }
}

#[async_trait]
impl LogSink for InMemorySink {
    async fn submit(&self, _destination: &LogDestination, events: Vec<WireEvent>) -> Result<()> {
        let should_fail = self
            .failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if should_fail {
            bail!("💀 in-memory sink was told to fail this batch of {} events", events.len());
        }
        self.batches.lock().await.push(events);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    fn a_destination() -> LogDestination {
        LogDestination {
            log_group_name: "g".to_string(),
            log_stream_name: "s".to_string(),
        }
    }

    #[tokio::test]
    async fn the_one_where_the_pretend_bucket_lists_and_fetches() {
        let the_store = InMemoryObjectStore::new()
            .with_object("logs", "alb/b.gz", b"bee".to_vec())
            .with_object("logs", "alb/a.gz", b"ay".to_vec())
            .with_object("logs", "other/c.gz", b"sea".to_vec())
            .with_object("elsewhere", "alb/d.gz", b"dee".to_vec());

        let the_listing = the_store.list("logs", "alb/").await.expect("💀 listing should work");
        let the_keys: Vec<&str> = the_listing.iter().map(|o| o.key.as_str()).collect();
        assert_eq!(the_keys, vec!["alb/a.gz", "alb/b.gz"]);

        let mut the_body = the_store
            .fetch(&ObjectRef::new("logs", "alb/b.gz"))
            .await
            .expect("💀 fetch should work");
        let mut the_bytes = Vec::new();
        the_body.read_to_end(&mut the_bytes).await.expect("💀 read should work");
        assert_eq!(the_bytes, b"bee");
    }

    #[tokio::test]
    async fn the_one_where_the_key_does_not_exist() {
        let the_store = InMemoryObjectStore::new();
        let the_err = match the_store.fetch(&ObjectRef::new("logs", "nope.gz")).await {
            Ok(_) => panic!("💀 a missing key should not fetch"),
            Err(err) => err,
        };
        assert!(the_err.to_string().contains("NoSuchKey"));
    }

    #[tokio::test]
    async fn the_one_where_the_sink_fails_exactly_as_often_as_told() {
        let the_sink = InMemorySink::failing_first(1);
        let an_event = WireEvent {
            message: "{}".to_string(),
            timestamp_millis: 0,
        };

        assert!(the_sink.submit(&a_destination(), vec![an_event.clone()]).await.is_err());
        assert!(the_sink.submit(&a_destination(), vec![an_event]).await.is_ok());
        assert_eq!(the_sink.batches().await.len(), 1);
    }
}
