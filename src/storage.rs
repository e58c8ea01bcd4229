use anyhow::Context;
use aws_config::{defaults, BehaviorVersion};
use aws_credential_types::Credentials;
use aws_sdk_s3::{
    config::{Builder as S3ConfigBuilder, Region},
    presigning::PresigningConfig,
    Client,
};
use aws_smithy_types::byte_stream::ByteStream;
use axum::async_trait;
use bytes::Bytes;
use uuid::Uuid;

use crate::config::StorageConfig;

#[async_trait]
pub trait StorageClient: Send + Sync {
    async fn put_object(&self, key: &str, body: Bytes, content_type: &str) -> anyhow::Result<()>;
    async fn delete_object(&self, key: &str) -> anyhow::Result<()>;
    /// Short-lived GET url; `download_name` sets the attachment filename.
    async fn presign_get(
        &self,
        key: &str,
        seconds: u64,
        download_name: Option<&str>,
    ) -> anyhow::Result<String>;
}

#[derive(Clone)]
pub struct Storage {
    client: Client,
    bucket: String,
}

impl Storage {
    pub async fn new(cfg: &StorageConfig, region: &str) -> anyhow::Result<Self> {
        let shared = defaults(BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .credentials_provider(Credentials::new(
                &cfg.access_key,
                &cfg.secret_key,
                None,
                None,
                "static",
            ))
            .endpoint_url(&cfg.endpoint)
            .load()
            .await;

        let conf = S3ConfigBuilder::from(&shared)
            .endpoint_url(&cfg.endpoint)
            .force_path_style(true)
            .build();

        Ok(Self {
            client: Client::from_conf(conf),
            bucket: cfg.bucket.clone(),
        })
    }
}

#[async_trait]
impl StorageClient for Storage {
    async fn put_object(&self, key: &str, body: Bytes, content_type: &str) -> anyhow::Result<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(body))
            .content_type(content_type)
            .send()
            .await
            .context("s3 put_object")?;
        Ok(())
    }

    async fn delete_object(&self, key: &str) -> anyhow::Result<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .context("s3 delete_object")?;
        Ok(())
    }

    async fn presign_get(
        &self,
        key: &str,
        seconds: u64,
        download_name: Option<&str>,
    ) -> anyhow::Result<String> {
        let mut req = self.client.get_object().bucket(&self.bucket).key(key);
        if let Some(name) = download_name {
            req = req.response_content_disposition(content_disposition(name));
        }
        let presigned = req
            .presigned(PresigningConfig::expires_in(
                std::time::Duration::from_secs(seconds),
            )?)
            .await
            .context("s3 presign_get")?;
        Ok(presigned.uri().to_string())
    }
}

/// A file received from a multipart upload.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub original_name: String,
    pub content_type: String,
    pub body: Bytes,
}

impl UploadedFile {
    pub fn size(&self) -> i64 {
        self.body.len() as i64
    }

    /// Lowercased extension of the original file name, if any.
    pub fn extension(&self) -> Option<String> {
        self.original_name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
    }
}

pub fn object_key(prefix: &str, file: &UploadedFile) -> String {
    let id = Uuid::new_v4();
    match file.extension() {
        Some(ext) => format!("{}/{}.{}", prefix, id, ext),
        None => format!("{}/{}", prefix, id),
    }
}

fn content_disposition(filename: &str) -> String {
    let safe: String = filename
        .chars()
        .map(|c| if c == '"' || c.is_control() { '_' } else { c })
        .collect();
    format!("attachment; filename=\"{}\"", safe)
}

/// Best-effort removal; failures are logged and skipped.
pub async fn delete_many(storage: &dyn StorageClient, keys: &[String]) -> usize {
    let mut removed = 0;
    for key in keys {
        match storage.delete_object(key).await {
            Ok(()) => removed += 1,
            Err(e) => tracing::warn!(error = %e, %key, "failed to delete stored object"),
        }
    }
    removed
}

#[cfg(test)]
mod storage_tests {
    use super::*;

    fn file(name: &str) -> UploadedFile {
        UploadedFile {
            original_name: name.into(),
            content_type: "application/pdf".into(),
            body: Bytes::from_static(b"%PDF"),
        }
    }

    #[test]
    fn extension_is_lowercased_and_sanitized() {
        assert_eq!(file("Contract.PDF").extension().as_deref(), Some("pdf"));
        assert_eq!(file("archive.tar.gz").extension().as_deref(), Some("gz"));
        assert_eq!(file("README").extension(), None);
        assert_eq!(file("weird.p/df").extension(), None);
    }

    #[test]
    fn object_keys_are_unique_under_prefix() {
        let f = file("nda.pdf");
        let a = object_key("documents", &f);
        let b = object_key("documents", &f);
        assert!(a.starts_with("documents/") && a.ends_with(".pdf"));
        assert_ne!(a, b);
    }

    #[test]
    fn content_disposition_escapes_quotes() {
        assert_eq!(
            content_disposition("a\"b.pdf"),
            "attachment; filename=\"a_b.pdf\""
        );
    }
}
