use async_trait::async_trait;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;
use sha2::{Digest, Sha256};
use tracing::instrument;

use gov_common::Endpoint;

use crate::error::AdapterError;

/// S3-protocol-compatible object storage adapter (works against AWS S3 or a
/// MinIO-style endpoint), following the monorepo's `common/s3` crate shape.
#[async_trait]
pub trait ObjectStorageAdapter: Send + Sync {
    async fn put(
        &self,
        key: &str,
        bytes: Vec<u8>,
        metadata: Option<Vec<(String, String)>>,
    ) -> Result<String, AdapterError>;

    async fn get(&self, key: &str) -> Result<Vec<u8>, AdapterError>;

    /// Bulk delete; any per-object failure is surfaced atomically as a
    /// single error rather than a partial map.
    async fn delete_prefix(&self, prefix: &str) -> Result<(), AdapterError>;
}

pub struct S3ObjectStorageAdapter {
    client: S3Client,
    bucket: String,
}

impl S3ObjectStorageAdapter {
    #[instrument(skip_all, fields(endpoint = %endpoint.id))]
    pub async fn connect(endpoint: &Endpoint) -> Result<Self, AdapterError> {
        let bucket = endpoint
            .coordinates
            .get("bucket")
            .and_then(|v| v.as_str())
            .ok_or_else(|| AdapterError::Protocol("endpoint missing bucket".to_string()))?
            .to_string();
        let region = endpoint
            .coordinates
            .get("region")
            .and_then(|v| v.as_str())
            .unwrap_or("us-east-1")
            .to_string();
        let endpoint_url = endpoint
            .coordinates
            .get("endpoint_url")
            .and_then(|v| v.as_str())
            .map(str::to_string);

        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new(region));
        if let (Some(access_key), Some(secret_key)) = (
            endpoint.credentials.get("access_key").and_then(|v| v.as_str()),
            endpoint.credentials.get("secret_key").and_then(|v| v.as_str()),
        ) {
            loader = loader.credentials_provider(Credentials::new(
                access_key,
                secret_key,
                None,
                None,
                "gov-connections",
            ));
        }
        let sdk_config = loader.load().await;

        let mut s3_config_builder = aws_sdk_s3::config::Builder::from(&sdk_config);
        if let Some(url) = endpoint_url {
            s3_config_builder = s3_config_builder.endpoint_url(url).force_path_style(true);
        }
        let client = S3Client::from_conf(s3_config_builder.build());

        let adapter = Self { client, bucket };
        adapter.ensure_bucket().await?;
        Ok(adapter)
    }

    async fn ensure_bucket(&self) -> Result<(), AdapterError> {
        match self.client.head_bucket().bucket(&self.bucket).send().await {
            Ok(_) => Ok(()),
            Err(_) => self
                .client
                .create_bucket()
                .bucket(&self.bucket)
                .send()
                .await
                .map(|_| ())
                .or_else(|e| {
                    // Another worker may have raced us to create it.
                    if e.to_string().contains("BucketAlreadyOwnedByYou") {
                        Ok(())
                    } else {
                        Err(AdapterError::Transport(e.to_string()))
                    }
                }),
        }
    }
}

#[async_trait]
impl ObjectStorageAdapter for S3ObjectStorageAdapter {
    async fn put(
        &self,
        key: &str,
        bytes: Vec<u8>,
        metadata: Option<Vec<(String, String)>>,
    ) -> Result<String, AdapterError> {
        let content_hash = format!("{:x}", Sha256::digest(&bytes));
        let mut request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(bytes))
            .metadata("content-hash", content_hash);
        for (k, v) in metadata.unwrap_or_default() {
            request = request.metadata(k, v);
        }
        request
            .send()
            .await
            .map_err(|e| AdapterError::Transport(e.to_string()))?;
        Ok(format!("s3://{}/{key}", self.bucket))
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, AdapterError> {
        let resp = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| AdapterError::Transport(e.to_string()))?;
        let bytes = resp
            .body
            .collect()
            .await
            .map_err(|e| AdapterError::Transport(e.to_string()))?;
        Ok(bytes.into_bytes().to_vec())
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<(), AdapterError> {
        let listed = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(prefix)
            .send()
            .await
            .map_err(|e| AdapterError::Transport(e.to_string()))?;

        let keys: Vec<_> = listed.contents().iter().filter_map(|o| o.key()).collect();
        if keys.is_empty() {
            return Ok(());
        }

        let objects = keys
            .iter()
            .map(|k| {
                aws_sdk_s3::types::ObjectIdentifier::builder()
                    .key(*k)
                    .build()
                    .map_err(|e| AdapterError::Protocol(e.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let delete = aws_sdk_s3::types::Delete::builder()
            .set_objects(Some(objects))
            .build()
            .map_err(|e| AdapterError::Protocol(e.to_string()))?;

        let result = self
            .client
            .delete_objects()
            .bucket(&self.bucket)
            .delete(delete)
            .send()
            .await
            .map_err(|e| AdapterError::Transport(e.to_string()))?;

        if !result.errors().is_empty() {
            let messages: Vec<String> = result
                .errors()
                .iter()
                .map(|e| format!("{}: {}", e.key().unwrap_or("?"), e.message().unwrap_or("?")))
                .collect();
            return Err(AdapterError::Protocol(format!(
                "delete_prefix had {} failure(s): {}",
                messages.len(),
                messages.join("; ")
            )));
        }
        Ok(())
    }
}
