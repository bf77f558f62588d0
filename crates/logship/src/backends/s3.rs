//! 🪣📡 S3 Object Store: streaming gzip out of the cloud, one object at a time.
//!
//! Transport: `GetObject` → `ByteStream::into_async_read()` → whoever wants an `AsyncRead`.
//! Listing: `ListObjectsV2` through the SDK paginator, so continuation tokens are the
//! SDK's bookkeeping and not ours.
//!
//! 🦆 The duck has no clearance for AWS. It watches from the edge of the VPC.

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::debug;

use super::{ObjectBody, ObjectStore};
use crate::common::ObjectRef;

/// 🪣 Thin wrapper around the S3 client. Cloning the client is cheap, so is this.
#[derive(Debug, Clone)]
pub(crate) struct S3ObjectStore {
    client: aws_sdk_s3::Client,
}

impl S3ObjectStore {
    pub(crate) fn new(sdk_config: &aws_config::SdkConfig) -> Self {
        Self {
            client: aws_sdk_s3::Client::new(sdk_config),
        }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    /// 🚀 GetObject, then hand back the body as a streaming reader.
    ///
    /// 💀 Fails if the bucket or key is wrong, credentials are missing, or S3 is having
    /// the kind of day we all have sometimes.
    async fn fetch(&self, object: &ObjectRef) -> Result<ObjectBody> {
        let the_response = self
            .client
            .get_object()
            .bucket(&object.bucket)
            .key(&object.key)
            .send()
            .await
            .with_context(|| {
                format!(
                    "💀 GetObject for {} came back empty-handed. Check: bucket name, key path, region, IAM permissions.",
                    object
                )
            })?;

        debug!(
            "🪣 opened {} ({} bytes on the wire)",
            object,
            the_response.content_length().unwrap_or(0)
        );

        // 🔗 Box it: `into_async_read()` returns an opaque type, struct fields can't hold `impl Trait`.
        Ok(Box::new(the_response.body.into_async_read()))
    }

    /// 📜 Every key under `prefix`, every page, in the order S3 returns them (lexicographic).
    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<ObjectRef>> {
        let mut the_pages = self
            .client
            .list_objects_v2()
            .bucket(bucket)
            .prefix(prefix)
            .into_paginator()
            .send();

        let mut objects = Vec::new();
        while let Some(page) = the_pages.next().await {
            let page = page.with_context(|| {
                format!("💀 failed to list objects under s3://{}/{}", bucket, prefix)
            })?;
            for item in page.contents() {
                if let Some(key) = item.key() {
                    objects.push(ObjectRef::new(bucket, key));
                }
            }
        }

        debug!("📜 listed {} objects under s3://{}/{}", objects.len(), bucket, prefix);
        Ok(objects)
    }
}
