//! 🔔 Triggers: how a run finds out what to ship.
//!
//! Two doorbells:
//! - A URL like `s3://bucket/prefix`. We list everything under the prefix and ship it all.
//! - An S3 "object created" notification. The objects are named right there in the
//!   payload, so no listing needed.

use anyhow::{Result, bail};
use serde::Deserialize;

use crate::common::ObjectRef;

const S3_SCHEME: &str = "s3://";

/// 🎯 What kicked off this run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    /// 📜 List then fan out.
    Url(String),
    /// 📬 Fan out over exactly the objects in the notification.
    Event(S3ObjectCreatedEvent),
}

/// ✂️ Split `s3://bucket/prefix` into `(bucket, prefix)`.
///
/// The prefix may be empty (`s3://bucket/` means "the whole bucket"), but the slash
/// after the bucket name is not optional.
pub fn parse_s3_url(url: &str) -> Result<(String, String)> {
    let Some(the_rest) = url.strip_prefix(S3_SCHEME) else {
        bail!("invalid S3 URL, missing 's3://' prefix");
    };
    let Some(the_slash) = memchr::memchr(b'/', the_rest.as_bytes()) else {
        bail!("invalid S3 URL, no '/' found after bucket name");
    };
    Ok((
        the_rest[..the_slash].to_string(),
        the_rest[the_slash + 1..].to_string(),
    ))
}

/// 📬 The bits of an S3 event notification we care about. Everything else in the
/// payload (and there is a lot of everything else) is ignored.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct S3ObjectCreatedEvent {
    #[serde(rename = "Records", default)]
    pub records: Vec<S3EventRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct S3EventRecord {
    pub s3: S3Entity,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct S3Entity {
    pub bucket: S3Bucket,
    pub object: S3Object,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct S3Bucket {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct S3Object {
    pub key: String,
}

impl S3ObjectCreatedEvent {
    /// 🎯 One `ObjectRef` per record, in payload order. Keys are used exactly as given.
    pub fn objects(&self) -> Vec<ObjectRef> {
        self.records
            .iter()
            .map(|record| ObjectRef::new(&record.s3.bucket.name, &record.s3.object.key))
            .collect()
    }
}
