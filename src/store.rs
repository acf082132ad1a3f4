// src/store.rs

use std::path::Path;

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_credential_types::Credentials;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::Client;

use crate::config::StoreSettings;
use crate::error::{Result, WorkerError};

/// Source-document store. The worker only ever checks the bucket and pulls
/// whole objects to scratch files; anything S3-shaped (MinIO in practice)
/// can sit behind this.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn bucket_exists(&self, bucket: &str) -> Result<bool>;

    /// Downloads `object` from `bucket` into `dest`, overwriting it.
    async fn fetch_object(&self, bucket: &str, object: &str, dest: &Path) -> Result<()>;
}

/// S3 client pointed at the configured MinIO endpoint: static credentials,
/// path-style addressing.
pub struct S3ObjectStore {
    client: Client,
}

impl S3ObjectStore {
    pub async fn connect(settings: &StoreSettings) -> Self {
        let credentials = Credentials::new(
            settings.access_key.clone(),
            settings.secret_key.clone(),
            None,
            None,
            "quizforge-static",
        );
        let shared = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new("us-east-1"))
            .endpoint_url(settings.endpoint_url())
            .credentials_provider(credentials)
            .load()
            .await;
        // MinIO serves buckets under the path, not as subdomains
        let config = aws_sdk_s3::config::Builder::from(&shared)
            .force_path_style(true)
            .build();
        S3ObjectStore {
            client: Client::from_conf(config),
        }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn bucket_exists(&self, bucket: &str) -> Result<bool> {
        match self.client.head_bucket().bucket(bucket).send().await {
            Ok(_) => Ok(true),
            Err(e) => {
                let service_error = e.into_service_error();
                if service_error.is_not_found() {
                    Ok(false)
                } else {
                    Err(WorkerError::StoreError(format!(
                        "Failed to check bucket '{}': {}",
                        bucket,
                        DisplayErrorContext(&service_error)
                    )))
                }
            }
        }
    }

    async fn fetch_object(&self, bucket: &str, object: &str, dest: &Path) -> Result<()> {
        let output = self
            .client
            .get_object()
            .bucket(bucket)
            .key(object)
            .send()
            .await
            .map_err(|e| {
                WorkerError::StoreError(format!(
                    "Failed to fetch object '{}' from bucket '{}': {}",
                    object,
                    bucket,
                    DisplayErrorContext(&e)
                ))
            })?;

        let bytes = output.body.collect().await.map_err(|e| {
            WorkerError::StoreError(format!(
                "Failed to read object '{}' body: {}",
                object, e
            ))
        })?;

        tokio::fs::write(dest, bytes.into_bytes()).await?;
        Ok(())
    }
}
