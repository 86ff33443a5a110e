//! Blob storage backends for build logs

use async_trait::async_trait;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::ObjectCannedAcl;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Error returned by a blob store
#[derive(Debug, Error)]
#[error("blob store error: {0}")]
pub struct BlobError(pub String);

/// Canned access policy applied to an uploaded object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Private,
    PublicRead,
}

/// A single object upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutObject {
    pub key: String,
    pub body: Vec<u8>,
    pub content_type: String,
    pub visibility: Visibility,
}

/// Trait for durable blob storage
///
/// A put is atomic: readers see either the previous object or the full new
/// body.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Uploads an object, replacing any previous object under the same key
    async fn put_object(&self, object: PutObject) -> Result<(), BlobError>;
}

/// S3 implementation of BlobStore
pub struct S3BlobStore {
    client: aws_sdk_s3::Client,
    bucket: String,
}

impl S3BlobStore {
    /// Creates a store for the given bucket using an existing S3 client
    pub fn new(client: aws_sdk_s3::Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    /// Creates a store for the given bucket with credentials and region
    /// resolved from the environment
    pub async fn from_env(bucket: impl Into<String>) -> Self {
        let config = aws_config::load_from_env().await;
        Self::new(aws_sdk_s3::Client::new(&config), bucket)
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

fn canned_acl(visibility: Visibility) -> ObjectCannedAcl {
    match visibility {
        Visibility::Private => ObjectCannedAcl::Private,
        Visibility::PublicRead => ObjectCannedAcl::PublicRead,
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn put_object(&self, object: PutObject) -> Result<(), BlobError> {
        let acl = canned_acl(object.visibility);
        let length = object.body.len() as i64;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&object.key)
            .acl(acl)
            .content_type(&object.content_type)
            .content_length(length)
            .body(ByteStream::from(object.body))
            .send()
            .await
            .map_err(|e| BlobError(format!("{}", DisplayErrorContext(&e))))?;

        tracing::debug!("Uploaded s3://{}/{} ({} bytes)", self.bucket, object.key, length);
        Ok(())
    }
}

/// In-process implementation of BlobStore
///
/// Keeps every put in memory. Used in tests.
#[derive(Debug, Default, Clone)]
pub struct MemoryBlobStore {
    puts: Arc<Mutex<Vec<PutObject>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All puts received so far, oldest first
    pub fn puts(&self) -> Vec<PutObject> {
        self.puts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put_object(&self, object: PutObject) -> Result<(), BlobError> {
        self.puts
            .lock()
            .map_err(|_| BlobError("memory store poisoned".to_string()))?
            .push(object);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_visibility_maps_to_canned_acl() {
        assert_eq!(canned_acl(Visibility::Private), ObjectCannedAcl::Private);
        assert_eq!(canned_acl(Visibility::PublicRead), ObjectCannedAcl::PublicRead);
    }

    #[tokio::test]
    async fn test_memory_store_keeps_puts_in_order() {
        let store = MemoryBlobStore::new();
        for body in [b"first".to_vec(), b"second".to_vec()] {
            store
                .put_object(PutObject {
                    key: "logs/a.txt".to_string(),
                    body,
                    content_type: "text/plain".to_string(),
                    visibility: Visibility::Private,
                })
                .await
                .unwrap();
        }

        let bodies: Vec<Vec<u8>> = store.puts().into_iter().map(|put| put.body).collect();
        assert_eq!(bodies, vec![b"first".to_vec(), b"second".to_vec()]);
    }
}
