//! S3 backed object storage for event images
//!
//! Images are write-once blobs: uploaded on event creation or image-set
//! replacement and referenced by their public URL from the event row.

use crate::settings::ObjectStorageSettings;
use anyhow::{anyhow, Context, Result};
use aws_sdk_s3::config::Builder;
use aws_sdk_s3::types::ByteStream;
use aws_sdk_s3::Client;
use aws_sdk_s3::Credentials as AwsCred;
use aws_sdk_s3::Endpoint;
use bytes::Bytes;
use std::time::Duration;
use uuid::Uuid;

/// Upper bound for a single image upload
const UPLOAD_TIMEOUT: Duration = Duration::from_secs(10);

/// Upper bound for a single blob deletion
const DELETE_TIMEOUT: Duration = Duration::from_secs(10);

pub struct ObjectStorage {
    /// The s3 client
    client: Client,
    /// The configured bucket
    bucket: String,
    /// Public base under which keys resolve to URLs
    public_base_url: String,
}

impl ObjectStorage {
    pub async fn new(settings: &ObjectStorageSettings) -> Result<Self> {
        let credentials = AwsCred::new(
            settings.access_key.clone(),
            settings.secret_key.clone(),
            None,
            None,
            "sac-controller",
        );

        let conf = Builder::new()
            .endpoint_resolver(Endpoint::immutable(
                settings
                    .uri
                    .parse()
                    .context("Failed to parse object storage URI")?,
            ))
            .credentials_provider(credentials)
            .region(aws_sdk_s3::Region::new(""))
            .build();

        let client = Client::from_conf(conf);

        // check if the bucket exists
        client
            .head_bucket()
            .bucket(settings.bucket.clone())
            .send()
            .await
            .context("Cannot find configured object storage bucket")?;

        log::info!("Using S3 bucket: {}", settings.bucket);

        Ok(Self {
            client,
            bucket: settings.bucket.clone(),
            public_base_url: settings.public_base_url(),
        })
    }

    /// Create a broken placeholder S3 client for tests
    ///
    /// The resulting [`ObjectStorage`] will error on first access. This is a placeholder until we can mock the client
    /// or have a minio test deployment.
    pub fn broken() -> Self {
        let credentials = AwsCred::new("broken", "broken", None, None, "broken");

        let conf = Builder::new()
            .endpoint_resolver(Endpoint::immutable("http://localhost:1".parse().unwrap()))
            .credentials_provider(credentials)
            .region(aws_sdk_s3::Region::new(""))
            .build();

        let client = Client::from_conf(conf);

        Self {
            client,
            bucket: "broken".into(),
            public_base_url: "http://localhost:1/broken".into(),
        }
    }

    /// Generates a fresh storage key for an event image
    pub fn generate_image_key() -> String {
        format!("events/{}", Uuid::new_v4())
    }

    /// Put an image into S3 storage under the given key
    ///
    /// Returns the public URL of the uploaded object. Event images are small
    /// enough for a single `put_object` call, no multipart handling needed.
    pub async fn put(&self, key: &str, data: Bytes) -> Result<String> {
        let upload = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(data))
            .send();

        tokio::time::timeout(UPLOAD_TIMEOUT, upload)
            .await
            .map_err(|_| anyhow!("upload of {key} timed out"))?
            .with_context(|| format!("failed to upload {key}"))?;

        Ok(self.url_for(key))
    }

    /// Delete an object from S3 storage
    pub async fn delete(&self, key: String) -> Result<()> {
        let delete = self
            .client
            .delete_object()
            .bucket(&self.bucket)
            .key(&key)
            .send();

        tokio::time::timeout(DELETE_TIMEOUT, delete)
            .await
            .map_err(|_| anyhow!("deletion of {key} timed out"))?
            .with_context(|| format!("failed to delete {key}"))?;

        Ok(())
    }

    /// The public URL under which the object with `key` is reachable
    pub fn url_for(&self, key: &str) -> String {
        format!("{}/{}", self.public_base_url, key)
    }

    /// Extracts the storage key from a public URL of this storage
    ///
    /// Returns None for foreign URLs, those are left alone on image cleanup.
    pub fn key_for(&self, url: &str) -> Option<String> {
        url.strip_prefix(&self.public_base_url)
            .map(|rest| rest.trim_start_matches('/').to_owned())
            .filter(|key| !key.is_empty())
    }
}
