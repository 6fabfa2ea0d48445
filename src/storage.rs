use async_trait::async_trait;
use aws_sdk_s3 as s3;
use chrono::{DateTime, Utc};
use s3::{presigning::PresigningConfig, primitives::ByteStream};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Bucket
///
/// Library files live in one of two buckets: the public one serves free content
/// through stable URLs, the private one is only reachable through signed URLs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bucket {
    Public,
    Private,
}

/// StorageError
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    #[error("invalid signing window: {0}")]
    InvalidExpiry(String),
    #[error("presign failed: {0}")]
    Presign(String),
    #[error("upload failed: {0}")]
    Upload(String),
}

/// StorageService
///
/// Contract for the object storage backend. The real S3 client and the in-memory
/// mock are interchangeable behind `Arc<dyn StorageService>`.
#[async_trait]
pub trait StorageService: Send + Sync {
    /// Creates both buckets if missing. Only called in `Env::Local` (MinIO).
    async fn ensure_buckets_exist(&self);

    /// Stores `bytes` under `path` in the given bucket.
    async fn upload_object(
        &self,
        bucket: Bucket,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StorageError>;

    /// Stable URL of an object in the public bucket.
    fn get_public_url(&self, path: &str) -> String;

    /// Time-limited GET URL for an object in the private bucket. Every call yields
    /// a fresh signature.
    async fn create_signed_url(&self, path: &str, ttl: Duration) -> Result<String, StorageError>;
}

/// S3StorageClient
///
/// `StorageService` over the AWS SDK. Works against MinIO locally and the hosted
/// backend's S3 gateway in production; both need path-style addressing.
#[derive(Clone)]
pub struct S3StorageClient {
    client: s3::Client,
    endpoint: String,
    public_bucket: String,
    private_bucket: String,
}

impl S3StorageClient {
    pub async fn new(
        endpoint: &str,
        region: &str,
        access_key: &str,
        secret_key: &str,
        public_bucket: &str,
        private_bucket: &str,
    ) -> Self {
        let credentials =
            s3::config::Credentials::new(access_key, secret_key, None, None, "static");

        let config = s3::Config::builder()
            .credentials_provider(credentials)
            .endpoint_url(endpoint)
            .region(s3::config::Region::new(region.to_string()))
            .behavior_version_latest()
            .force_path_style(true)
            .build();

        Self {
            client: s3::Client::from_conf(config),
            endpoint: endpoint.trim_end_matches('/').to_string(),
            public_bucket: public_bucket.to_string(),
            private_bucket: private_bucket.to_string(),
        }
    }

    fn bucket_name(&self, bucket: Bucket) -> &str {
        match bucket {
            Bucket::Public => &self.public_bucket,
            Bucket::Private => &self.private_bucket,
        }
    }
}

#[async_trait]
impl StorageService for S3StorageClient {
    async fn ensure_buckets_exist(&self) {
        for bucket in [&self.public_bucket, &self.private_bucket] {
            // CreateBucket on an existing bucket fails harmlessly.
            if let Err(e) = self.client.create_bucket().bucket(bucket).send().await {
                tracing::debug!(bucket = %bucket, error = %e, "create_bucket skipped");
            }
        }
    }

    async fn upload_object(
        &self,
        bucket: Bucket,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StorageError> {
        self.client
            .put_object()
            .bucket(self.bucket_name(bucket))
            .key(sanitize_key(path))
            .content_type(content_type)
            .body(ByteStream::from(bytes))
            .send()
            .await
            .map_err(|e| StorageError::Upload(e.to_string()))?;
        Ok(())
    }

    fn get_public_url(&self, path: &str) -> String {
        format!(
            "{}/{}/{}",
            self.endpoint,
            self.public_bucket,
            sanitize_key(path)
        )
    }

    async fn create_signed_url(&self, path: &str, ttl: Duration) -> Result<String, StorageError> {
        let presigning = PresigningConfig::expires_in(ttl)
            .map_err(|e| StorageError::InvalidExpiry(e.to_string()))?;

        let presigned_req = self
            .client
            .get_object()
            .bucket(&self.private_bucket)
            .key(sanitize_key(path))
            .presigned(presigning)
            .await
            .map_err(|e| StorageError::Presign(e.to_string()))?;

        Ok(presigned_req.uri().to_string())
    }
}

/// sanitize_key
///
/// Drops empty, `.` and `..` segments so a key can never climb out of its prefix.
pub fn sanitize_key(key: &str) -> String {
    key.split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".." && *segment != ".")
        .collect::<Vec<_>>()
        .join("/")
}

/// object_path
///
/// Key under which an uploaded library file is stored: `{slug}/{millis}-{name}`.
/// The file name is reduced to its last path component with anything outside
/// `[A-Za-z0-9._-]` replaced by `_`.
pub fn object_path(slug: &str, filename: &str, now: DateTime<Utc>) -> String {
    let base = filename.rsplit(['/', '\\']).next().unwrap_or(filename);
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    let name = if cleaned.is_empty() { "file" } else { cleaned };

    sanitize_key(&format!("{}/{}-{}", slug, now.timestamp_millis(), name))
}

/// MockStorageService
///
/// In-memory `StorageService` for tests. Signed URLs embed the object key and a
/// random token; `should_fail` makes every fallible call error.
#[derive(Clone, Default)]
pub struct MockStorageService {
    pub should_fail: bool,
}

impl MockStorageService {
    pub fn new() -> Self {
        Self { should_fail: false }
    }

    pub fn new_failing() -> Self {
        Self { should_fail: true }
    }
}

#[async_trait]
impl StorageService for MockStorageService {
    async fn ensure_buckets_exist(&self) {}

    async fn upload_object(
        &self,
        _bucket: Bucket,
        _path: &str,
        _bytes: Vec<u8>,
        _content_type: &str,
    ) -> Result<(), StorageError> {
        if self.should_fail {
            return Err(StorageError::Upload("mock upload failure".to_string()));
        }
        Ok(())
    }

    fn get_public_url(&self, path: &str) -> String {
        format!("http://localhost:9000/mock-public/{}", sanitize_key(path))
    }

    async fn create_signed_url(&self, path: &str, ttl: Duration) -> Result<String, StorageError> {
        if self.should_fail {
            return Err(StorageError::Presign("mock signing failure".to_string()));
        }

        Ok(format!(
            "http://localhost:9000/mock-private/{}?token={}&expires_in={}",
            sanitize_key(path),
            Uuid::new_v4().simple(),
            ttl.as_secs()
        ))
    }
}

/// StorageState
pub type StorageState = Arc<dyn StorageService>;
