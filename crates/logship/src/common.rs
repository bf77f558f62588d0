//! 📦 Common data structures: the building blocks of logship.
//!
//! 🎬 COLD OPEN: INT. S3 BUCKET, 3:47 AM
//!
//! A gzip file lands. Nobody notices. Then another. Then eleven thousand more.
//! Somewhere a load balancer is writing down every request anyone ever made, in a
//! format last updated when a "cloud" was still a weather thing. Each line becomes a
//! [`LogEntry`], each entry becomes a [`WireEvent`], and each wire event rides a
//! batch into CloudWatch, where it will be read by exactly nobody until the outage.
//!
//! 🦆
//!
//! These structs don't ask questions. They carry the data. They are the postal
//! workers of this codebase. Please tip your postal workers.

use std::collections::BTreeMap;
use std::fmt;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 📏 CloudWatch charges 26 bytes of overhead per event on top of the UTF-8 message.
/// Their docs, not our vibes.
pub const EVENT_OVERHEAD_BYTES: usize = 26;

/// 🪣 One object in the store. Bucket plus key, nothing more, nothing less.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectRef {
    pub bucket: String,
    pub key: String,
}

impl ObjectRef {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s3://{}/{}", self.bucket, self.key)
    }
}

/// 📡 Where batches land: one CloudWatch log group, one stream inside it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogDestination {
    pub log_group_name: String,
    pub log_stream_name: String,
}

impl fmt::Display for LogDestination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.log_group_name, self.log_stream_name)
    }
}

/// 🎯 One parsed access-log line, after projection.
///
/// `fields` only holds the selected columns. A `BTreeMap` keeps the keys sorted, so the
/// serialized payload is canonical: same entry in, same bytes out, every time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub fields: BTreeMap<String, String>,
    pub timestamp: DateTime<Utc>,
}

/// ✉️ A `LogEntry` dressed for the trip: JSON message, millis timestamp, size estimate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireEvent {
    pub message: String,
    pub timestamp_millis: i64,
}

impl WireEvent {
    /// 🔄 Serialize the entry's field map to one compact JSON object.
    pub fn from_entry(entry: &LogEntry) -> Result<Self> {
        let message = serde_json::to_string(&entry.fields)
            .context("💀 error marshaling log entry to JSON. A map of strings refused to become a string.")?;
        Ok(Self {
            message,
            timestamp_millis: entry.timestamp.timestamp_millis(),
        })
    }

    /// 📏 What this event costs against the batch byte budget: message bytes + 26.
    pub fn size_estimate(&self) -> usize {
        self.message.len() + EVENT_OVERHEAD_BYTES
    }
}
