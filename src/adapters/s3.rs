//! S3-compatible object store adapter (MinIO in the default deployment).

use crate::config::AppConfig;
use crate::error::{Error, Result};
use crate::ports::storage::ObjectStorePort;
use async_trait::async_trait;
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart, Delete, ObjectIdentifier};
use aws_sdk_s3::Client;
use std::path::Path;
use tokio::io::AsyncReadExt;

/// Part size for multipart uploads (50 MiB).
const PART_SIZE: u64 = 50 * 1024 * 1024;

/// Hard object-store limit on keys per batch delete.
const DELETE_BATCH_SIZE: usize = 1000;

#[derive(Clone)]
pub struct S3ObjectStore {
    client: Client,
    bucket: String,
}

impl S3ObjectStore {
    pub fn from_config(cfg: &AppConfig) -> Self {
        let credentials = Credentials::new(
            cfg.s3_access_key.clone(),
            cfg.s3_secret_key.clone(),
            None,
            None,
            "static",
        );
        let s3_config = aws_sdk_s3::config::Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .endpoint_url(&cfg.s3_endpoint)
            .region(Region::new(cfg.s3_region.clone()))
            .credentials_provider(credentials)
            // MinIO serves buckets by path, not virtual host
            .force_path_style(true)
            .build();

        Self {
            client: Client::from_conf(s3_config),
            bucket: cfg.s3_bucket.clone(),
        }
    }

    async fn abort_upload(&self, key: &str, upload_id: &str) {
        let result = self
            .client
            .abort_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(upload_id)
            .send()
            .await;
        if let Err(e) = result {
            tracing::warn!(key, error = %e, "failed to abort multipart upload");
        }
    }

    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        let mut continuation: Option<String> = None;

        loop {
            let mut request = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(prefix);
            if let Some(token) = &continuation {
                request = request.continuation_token(token);
            }
            let response = request
                .send()
                .await
                .map_err(|e| Error::Storage(e.to_string()))?;

            keys.extend(
                response
                    .contents()
                    .iter()
                    .filter_map(|object| object.key().map(str::to_string)),
            );

            if response.is_truncated() == Some(true) {
                continuation = response.next_continuation_token().map(str::to_string);
            } else {
                break;
            }
        }

        Ok(keys)
    }
}

fn content_type_for(key: &str) -> &'static str {
    match key.rsplit('.').next() {
        Some("mp4") => "video/mp4",
        Some("vtt") => "text/vtt",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        _ => "application/octet-stream",
    }
}

#[async_trait]
impl ObjectStorePort for S3ObjectStore {
    async fn exists(&self, key: &str) -> Result<bool> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(e) => {
                let service_error = e.into_service_error();
                if service_error.is_not_found() {
                    Ok(false)
                } else {
                    Err(Error::Storage(service_error.to_string()))
                }
            }
        }
    }

    async fn upload(&self, local_path: &Path, key: &str) -> Result<()> {
        let mut file = tokio::fs::File::open(local_path).await?;
        let total_size = file.metadata().await?.len();

        let created = self
            .client
            .create_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type_for(key))
            .send()
            .await
            .map_err(|e| Error::Storage(e.to_string()))?;
        let upload_id = created
            .upload_id()
            .ok_or_else(|| Error::UploadFailure {
                key: key.to_string(),
                reason: "response missing upload id".to_string(),
            })?
            .to_string();

        let part_count = (total_size.div_ceil(PART_SIZE)).max(1);
        let mut completed_parts = Vec::with_capacity(part_count as usize);
        let mut uploaded: u64 = 0;

        for part_number in 1..=part_count as i32 {
            let chunk_size = PART_SIZE.min(total_size - uploaded) as usize;
            let mut chunk = vec![0u8; chunk_size];
            if chunk_size > 0 {
                if let Err(e) = file.read_exact(&mut chunk).await {
                    self.abort_upload(key, &upload_id).await;
                    return Err(e.into());
                }
            }
            uploaded += chunk_size as u64;

            let part = match self
                .client
                .upload_part()
                .bucket(&self.bucket)
                .key(key)
                .upload_id(&upload_id)
                .part_number(part_number)
                .body(ByteStream::from(chunk))
                .send()
                .await
            {
                Ok(part) => part,
                Err(e) => {
                    self.abort_upload(key, &upload_id).await;
                    return Err(Error::Storage(e.to_string()));
                }
            };

            let Some(etag) = part.e_tag() else {
                self.abort_upload(key, &upload_id).await;
                return Err(Error::UploadFailure {
                    key: key.to_string(),
                    reason: format!("part {} missing etag", part_number),
                });
            };
            completed_parts.push(
                CompletedPart::builder()
                    .part_number(part_number)
                    .e_tag(etag)
                    .build(),
            );

            tracing::debug!(key, part = part_number, uploaded, total_size, "uploaded part");
        }

        let completed = self
            .client
            .complete_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(&upload_id)
            .multipart_upload(
                CompletedMultipartUpload::builder()
                    .set_parts(Some(completed_parts))
                    .build(),
            )
            .send()
            .await
            .map_err(|e| Error::Storage(e.to_string()))?;

        // A "successful" completion without both markers is still a failure.
        if completed.key().is_none() || completed.e_tag().is_none() {
            return Err(Error::UploadFailure {
                key: key.to_string(),
                reason: "completed upload missing key or etag".to_string(),
            });
        }

        tracing::info!(key, total_size, "uploaded");
        Ok(())
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<()> {
        let keys = self.list_keys(prefix).await?;
        if keys.is_empty() {
            tracing::debug!(prefix, "no objects under prefix");
            return Ok(());
        }
        tracing::info!(prefix, count = keys.len(), "deleting objects under prefix");

        for batch in keys.chunks(DELETE_BATCH_SIZE) {
            let objects = batch
                .iter()
                .map(|key| {
                    ObjectIdentifier::builder()
                        .key(key)
                        .build()
                        .map_err(|e| Error::Storage(e.to_string()))
                })
                .collect::<Result<Vec<_>>>()?;
            let delete = Delete::builder()
                .set_objects(Some(objects))
                .build()
                .map_err(|e| Error::Storage(e.to_string()))?;

            let response = self
                .client
                .delete_objects()
                .bucket(&self.bucket)
                .delete(delete)
                .send()
                .await
                .map_err(|e| Error::Storage(e.to_string()))?;

            // Partial failures are cleanup debt, not ingestion failures.
            for err in response.errors() {
                tracing::warn!(
                    key = err.key().unwrap_or("?"),
                    code = err.code().unwrap_or("?"),
                    "object delete failed"
                );
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_type_by_extension() {
        assert_eq!(content_type_for("vod/abc/_720p.mp4"), "video/mp4");
        assert_eq!(content_type_for("vod/abc/forced-en.vtt"), "text/vtt");
        assert_eq!(content_type_for("covers/abc/cover.jpg"), "image/jpeg");
        assert_eq!(content_type_for("vod/abc/blob"), "application/octet-stream");
    }
}
