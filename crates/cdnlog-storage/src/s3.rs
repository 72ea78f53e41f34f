// S3-compatible store (AWS S3, COS, MinIO, ...)
//
// Speaks the multipart protocol directly so parts, tags and abort are explicit.

use crate::{object_path, ArchiveStore, CompletedPart, MultipartUpload, ObjectPresence};
use async_trait::async_trait;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::error::{DisplayErrorContext, SdkError};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, StorageClass};
use aws_sdk_s3::Client;
use bytes::Bytes;
use cdnlog_config::CloudCredentials;
use cdnlog_core::{PipelineError, Result};
use tracing::debug;

/// Connection settings for an S3-compatible bucket
#[derive(Debug, Clone, Default)]
pub struct S3StoreOptions {
    pub bucket: String,
    pub region: String,
    pub endpoint: Option<String>,
    pub force_path_style: bool,
    pub storage_class: Option<String>,
    /// Static credentials; the default provider chain is used when absent
    pub credentials: Option<CloudCredentials>,
}

#[derive(Clone)]
pub struct S3Store {
    client: Client,
    bucket: String,
    storage_class: Option<StorageClass>,
}

impl S3Store {
    pub async fn connect(options: S3StoreOptions) -> anyhow::Result<Self> {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new(options.region.clone()));

        if let Some(creds) = &options.credentials {
            loader = loader.credentials_provider(Credentials::new(
                creds.secret_id.clone(),
                creds.secret_key.clone(),
                creds.token.clone(),
                None,
                "cdnlog",
            ));
        }

        let sdk_config = loader.load().await;
        let mut builder =
            aws_sdk_s3::config::Builder::from(&sdk_config).force_path_style(options.force_path_style);
        if let Some(endpoint) = &options.endpoint {
            builder = builder.endpoint_url(endpoint);
        }

        Ok(Self::from_client(
            Client::from_conf(builder.build()),
            options.bucket,
            options.storage_class.as_deref(),
        ))
    }

    pub fn from_client(client: Client, bucket: impl Into<String>, storage_class: Option<&str>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            storage_class: storage_class.map(StorageClass::from),
        }
    }
}

fn sdk_message<E, R>(err: &SdkError<E, R>) -> String
where
    E: std::error::Error + 'static,
    R: std::fmt::Debug,
{
    format!("{}", DisplayErrorContext(err))
}

#[async_trait]
impl ArchiveStore for S3Store {
    fn name(&self) -> &'static str {
        "s3"
    }

    async fn presence(&self, key: &str) -> ObjectPresence {
        let result = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(object_path(key))
            .send()
            .await;

        match result {
            Ok(_) => ObjectPresence::Present,
            Err(SdkError::ServiceError(service)) if service.err().is_not_found() => {
                ObjectPresence::Absent
            }
            // HEAD responses carry no body, so some stores surface 404 unmodeled
            Err(err) if err.raw_response().map(|r| r.status().as_u16()) == Some(404) => {
                ObjectPresence::Absent
            }
            Err(err) => ObjectPresence::Unavailable(sdk_message(&err)),
        }
    }

    async fn create_multipart(&self, key: &str) -> Result<Box<dyn MultipartUpload>> {
        let path = object_path(key).to_string();
        let output = self
            .client
            .create_multipart_upload()
            .bucket(&self.bucket)
            .key(&path)
            .set_storage_class(self.storage_class.clone())
            .send()
            .await
            .map_err(|e| {
                PipelineError::store_unavailable(format!(
                    "CreateMultipartUpload {} failed: {}",
                    path,
                    sdk_message(&e)
                ))
            })?;

        let upload_id = output
            .upload_id()
            .ok_or_else(|| {
                PipelineError::store_unavailable(format!(
                    "CreateMultipartUpload {} returned no upload id",
                    path
                ))
            })?
            .to_string();

        debug!(bucket = %self.bucket, key = %path, upload_id = %upload_id, "Created multipart upload");
        Ok(Box::new(S3Upload {
            client: self.client.clone(),
            bucket: self.bucket.clone(),
            key: path,
            upload_id,
        }))
    }
}

struct S3Upload {
    client: Client,
    bucket: String,
    key: String,
    upload_id: String,
}

#[async_trait]
impl MultipartUpload for S3Upload {
    fn upload_id(&self) -> &str {
        &self.upload_id
    }

    async fn upload_part(&mut self, part_number: u32, data: Bytes) -> Result<CompletedPart> {
        let output = self
            .client
            .upload_part()
            .bucket(&self.bucket)
            .key(&self.key)
            .upload_id(&self.upload_id)
            .part_number(part_number as i32)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| {
                PipelineError::store_unavailable(format!(
                    "UploadPart {} of {} failed: {}",
                    part_number,
                    self.key,
                    sdk_message(&e)
                ))
            })?;

        let tag = output.e_tag().unwrap_or_default().to_string();
        Ok(CompletedPart { part_number, tag })
    }

    async fn complete(self: Box<Self>, parts: Vec<CompletedPart>) -> Result<()> {
        let parts = parts
            .into_iter()
            .map(|part| {
                aws_sdk_s3::types::CompletedPart::builder()
                    .part_number(part.part_number as i32)
                    .e_tag(part.tag)
                    .build()
            })
            .collect::<Vec<_>>();

        self.client
            .complete_multipart_upload()
            .bucket(&self.bucket)
            .key(&self.key)
            .upload_id(&self.upload_id)
            .multipart_upload(
                CompletedMultipartUpload::builder()
                    .set_parts(Some(parts))
                    .build(),
            )
            .send()
            .await
            .map_err(|e| {
                PipelineError::store_unavailable(format!(
                    "CompleteMultipartUpload {} failed: {}",
                    self.key,
                    sdk_message(&e)
                ))
            })?;
        Ok(())
    }

    async fn abort(self: Box<Self>) -> Result<()> {
        self.client
            .abort_multipart_upload()
            .bucket(&self.bucket)
            .key(&self.key)
            .upload_id(&self.upload_id)
            .send()
            .await
            .map_err(|e| {
                PipelineError::store_unavailable(format!(
                    "AbortMultipartUpload {} failed: {}",
                    self.key,
                    sdk_message(&e)
                ))
            })?;
        Ok(())
    }
}
