use anyhow::Context;
use aws_config::{defaults, BehaviorVersion};
use aws_credential_types::Credentials;
use aws_sdk_s3::{
    config::{Builder as S3ConfigBuilder, Region},
    Client,
};
use async_trait::async_trait;
use aws_smithy_types::byte_stream::ByteStream;
use bytes::Bytes;

use crate::config::StorageConfig;

#[async_trait]
pub trait StorageClient: Send + Sync {
    async fn put_object(&self, key: &str, body: Bytes, content_type: &str) -> anyhow::Result<()>;
    async fn delete_object(&self, key: &str) -> anyhow::Result<()>;
    /// Durable URL an uploaded object is reachable at.
    fn public_url(&self, key: &str) -> String;
}

#[derive(Clone)]
pub struct Storage {
    client: Client,
    bucket: String,
    public_base: String,
}

impl Storage {
    pub async fn new(cfg: &StorageConfig) -> anyhow::Result<Self> {
        let shared = defaults(BehaviorVersion::latest())
            .region(Region::new(cfg.region.clone()))
            .credentials_provider(Credentials::new(
                cfg.access_key.clone(),
                cfg.secret_key.clone(),
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
            public_base: cfg.public_url.trim_end_matches('/').to_string(),
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

    fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.public_base, key)
    }
}

/// Maps a durable image URL back to the object key it was stored under:
/// last path segment, extension stripped, re-rooted under `books/`.
/// URLs outside `public_base` are not ours and yield `None`.
pub fn object_key_from_url(url: &str, public_base: &str) -> Option<String> {
    let base = public_base.trim_end_matches('/');
    if base.is_empty() || !url.starts_with(base) {
        return None;
    }
    let segment = url.rsplit('/').next()?;
    let stem = segment.split('.').next().unwrap_or("");
    if stem.is_empty() {
        return None;
    }
    Some(format!("books/{stem}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://cdn.example.com/bookworm";

    #[test]
    fn derives_key_from_managed_url() {
        let url = format!("{BASE}/books/3d9f6f2c-2c1d-4a7e-9d5a-64c9f0d1b2aa");
        assert_eq!(
            object_key_from_url(&url, BASE).as_deref(),
            Some("books/3d9f6f2c-2c1d-4a7e-9d5a-64c9f0d1b2aa")
        );
    }

    #[test]
    fn strips_a_file_extension_when_present() {
        let url = format!("{BASE}/books/qhuruuejhe.png");
        assert_eq!(
            object_key_from_url(&url, BASE).as_deref(),
            Some("books/qhuruuejhe")
        );
    }

    #[test]
    fn ignores_foreign_urls() {
        assert_eq!(
            object_key_from_url("https://api.dicebear.com/7.x/avataaars/svg?seed=ann", BASE),
            None
        );
        assert_eq!(object_key_from_url("", BASE), None);
    }

    #[test]
    fn tolerates_trailing_slash_on_the_base() {
        let url = format!("{BASE}/books/abc");
        let with_slash = format!("{BASE}/");
        assert_eq!(
            object_key_from_url(&url, &with_slash).as_deref(),
            Some("books/abc")
        );
    }
}
