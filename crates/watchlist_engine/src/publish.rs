use std::path::PathBuf;

use aws_sdk_s3::config::Region;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::ObjectCannedAcl;
use thiserror::Error;

use crate::persist::{AtomicFileWriter, PersistError};

pub const DEFAULT_BUCKET: &str = "show-data-lake";
pub const DEFAULT_REGION: &str = "us-east-1";

const JSON_CONTENT_TYPE: &str = "application/json";

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("object storage rejected {key}: {message}")]
    Backend { key: String, message: String },
    #[error("local publish failed: {0}")]
    Persist(#[from] PersistError),
}

/// Durable destination for serialized harvest documents.
#[async_trait::async_trait]
pub trait Publisher: Send + Sync {
    /// Stores `body` under `key`, requesting public read access where the
    /// backend supports it.
    async fn store(&self, key: &str, body: Vec<u8>) -> Result<(), PublishError>;
}

/// S3 bucket target. The client and bucket are shared read-only for the
/// life of the process.
#[derive(Debug, Clone)]
pub struct S3Publisher {
    client: aws_sdk_s3::Client,
    bucket: String,
}

impl S3Publisher {
    pub fn new(client: aws_sdk_s3::Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    /// Resolves credentials through the default AWS provider chain.
    pub async fn connect(bucket: impl Into<String>, region: impl Into<String>) -> Self {
        let sdk_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new(region.into()))
            .load()
            .await;
        Self::new(aws_sdk_s3::Client::new(&sdk_config), bucket)
    }
}

#[async_trait::async_trait]
impl Publisher for S3Publisher {
    async fn store(&self, key: &str, body: Vec<u8>) -> Result<(), PublishError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(JSON_CONTENT_TYPE)
            .acl(ObjectCannedAcl::PublicRead)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|err| PublishError::Backend {
                key: key.to_string(),
                message: DisplayErrorContext(&err).to_string(),
            })?;
        Ok(())
    }
}

/// Writes documents into a local directory. Access control does not apply.
#[derive(Debug, Clone)]
pub struct DirectoryPublisher {
    writer: AtomicFileWriter,
}

impl DirectoryPublisher {
    pub fn new(dir: PathBuf) -> Self {
        Self {
            writer: AtomicFileWriter::new(dir),
        }
    }
}

#[async_trait::async_trait]
impl Publisher for DirectoryPublisher {
    async fn store(&self, key: &str, body: Vec<u8>) -> Result<(), PublishError> {
        let writer = self.writer.clone();
        let key = key.to_string();
        tokio::task::spawn_blocking(move || writer.write(&key, &body))
            .await
            .map_err(|err| PersistError::Io(std::io::Error::other(err)))??;
        Ok(())
    }
}
