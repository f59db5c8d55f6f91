use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{error, info, warn};
use std::sync::Arc;
use thiserror::Error;

/// Logical namespace for uploaded ad media inside the bucket.
const KEY_PREFIX: &str = "ads";

#[derive(Debug, Error)]
pub enum MediaStoreError {
    #[error("{0}")]
    Other(String),
}

/// Write-only blob storage seam. Media is uploaded once at ad creation and
/// served to clients straight from the CDN, so there is no read path here.
#[async_trait]
pub trait MediaStore: Send + Sync {
    async fn put(&self, key: &str, content_type: &str, bytes: &[u8]) -> Result<(), MediaStoreError>;
    /// Public URL clients will use for the stored object.
    fn public_url(&self, key: &str) -> String;
}

/// `ads/YYYYMMDD_HHMMSS_<name>`: the timestamp prefix keeps repeated uploads
/// of the same file name from colliding.
pub fn object_key(file_name: &str, now: DateTime<Utc>) -> String {
    format!("{}/{}_{}", KEY_PREFIX, now.format("%Y%m%d_%H%M%S"), file_name)
}

// ---------------- S3 implementation (MinIO compatible) ----------------
pub struct S3MediaStore {
    bucket: String,
    client: aws_sdk_s3::Client,
    /// Storage account identifier baked into the public URL (the access key,
    /// per the CDN's addressing convention).
    account_id: String,
    cdn_base: String,
}

impl S3MediaStore {
    pub async fn new() -> anyhow::Result<Self> {
        use aws_credential_types::provider::SharedCredentialsProvider;
        use aws_credential_types::Credentials;

        let bucket = std::env::var("S3_BUCKET").unwrap_or_else(|_| "files".into());
        let endpoint = std::env::var("S3_ENDPOINT")
            .map_err(|_| anyhow::anyhow!("S3_ENDPOINT must be set (MinIO / S3 endpoint)"))?;
        let cdn_base = std::env::var("CDN_BASE_URL")
            .map_err(|_| anyhow::anyhow!("CDN_BASE_URL must be set (public media base URL)"))?;
        let region = std::env::var("S3_REGION").unwrap_or_else(|_| "us-east-1".into());
        let access = std::env::var("S3_ACCESS_KEY").unwrap_or_default();
        let secret = std::env::var("S3_SECRET_KEY").unwrap_or_default();

        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_sdk_s3::config::Region::new(region))
            .endpoint_url(endpoint);
        if !access.is_empty() && !secret.is_empty() {
            let creds = Credentials::new(access.clone(), secret, None, None, "static");
            loader = loader.credentials_provider(SharedCredentialsProvider::new(creds));
        }
        let conf = loader.load().await;
        // Path-style addressing: required for MinIO/local endpoints without wildcard DNS
        let s3_conf = aws_sdk_s3::config::Builder::from(&conf)
            .force_path_style(true)
            .build();
        let client = aws_sdk_s3::Client::from_conf(s3_conf);
        info!("Initialized S3/MinIO media client (path-style addressing enabled)");

        // Ensure the bucket exists before the first upload hits it
        if client.head_bucket().bucket(&bucket).send().await.is_err() {
            warn!("head_bucket failed for '{bucket}', attempting create");
            match client.create_bucket().bucket(&bucket).send().await {
                Ok(_) => info!("created bucket '{bucket}'"),
                Err(e) => {
                    error!("create_bucket failed for '{bucket}': {e:?}");
                    return Err(anyhow::anyhow!("failed to ensure bucket '{bucket}': {e}"));
                }
            }
        }

        Ok(Self {
            bucket,
            client,
            account_id: access,
            cdn_base: cdn_base.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl MediaStore for S3MediaStore {
    async fn put(&self, key: &str, content_type: &str, bytes: &[u8]) -> Result<(), MediaStoreError> {
        use aws_sdk_s3::primitives::ByteStream;
        let put = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(bytes.to_vec()))
            .content_type(content_type);
        if let Err(e) = put.send().await {
            error!("put_object failed key={key} bucket={} err={e:?}", self.bucket);
            return Err(MediaStoreError::Other(e.to_string()));
        }
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/projects/{}/bucket/{}", self.cdn_base, self.account_id, key)
    }
}

// Factory helper used in main; panic early if misconfigured
pub async fn build_media_store() -> Arc<dyn MediaStore> {
    match S3MediaStore::new().await {
        Ok(store) => Arc::new(store),
        Err(e) => panic!("Failed to initialize S3 media store: {e}"),
    }
}
