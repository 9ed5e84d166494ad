use anyhow::Context;
use aws_config::{defaults, BehaviorVersion};
use aws_credential_types::Credentials;
use aws_sdk_s3::{
    config::{Builder as S3ConfigBuilder, Region},
    Client,
};
use aws_smithy_types::byte_stream::ByteStream;
use async_trait::async_trait;
use bytes::Bytes;

use crate::config::StorageConfig;

/// Object storage for item images.
#[async_trait]
pub trait StorageClient: Send + Sync {
    async fn put_object(&self, key: &str, body: Bytes, content_type: &str) -> anyhow::Result<()>;
    async fn delete_object(&self, key: &str) -> anyhow::Result<()>;
    /// URL clients use to fetch the object.
    fn public_url(&self, key: &str) -> String;
    /// Reverse of `public_url`; `None` for URLs this store did not hand out.
    fn key_from_url(&self, url: &str) -> Option<String>;
}

#[derive(Clone)]
pub struct Storage {
    client: Client,
    bucket: String,
    base_url: String,
}

impl Storage {
    pub async fn new(cfg: &StorageConfig) -> anyhow::Result<Self> {
        let shared = defaults(BehaviorVersion::latest())
            .region(Region::new(cfg.region.clone()))
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
            base_url: format!("{}/{}", cfg.endpoint.trim_end_matches('/'), cfg.bucket),
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
        format!("{}/{}", self.base_url, key)
    }

    fn key_from_url(&self, url: &str) -> Option<String> {
        url.strip_prefix(&self.base_url)
            .and_then(|rest| rest.strip_prefix('/'))
            .filter(|k| !k.is_empty())
            .map(str::to_string)
    }
}

#[cfg(test)]
pub(crate) mod fake {
    use std::collections::BTreeSet;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use bytes::Bytes;

    use super::StorageClient;

    const BASE_URL: &str = "https://fake.local/";

    /// In-process object store. Remembers which keys it holds and, when given
    /// a capacity, refuses writes once that many objects are stored.
    #[derive(Default)]
    pub struct FakeStorage {
        objects: Mutex<BTreeSet<String>>,
        capacity: Option<usize>,
    }

    impl FakeStorage {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_capacity(capacity: usize) -> Self {
            Self {
                capacity: Some(capacity),
                ..Self::default()
            }
        }

        pub fn keys(&self) -> Vec<String> {
            self.objects.lock().unwrap().iter().cloned().collect()
        }
    }

    #[async_trait]
    impl StorageClient for FakeStorage {
        async fn put_object(&self, key: &str, _body: Bytes, _ct: &str) -> anyhow::Result<()> {
            let mut objects = self.objects.lock().unwrap();
            if self.capacity.is_some_and(|cap| objects.len() >= cap) {
                anyhow::bail!("bucket full");
            }
            objects.insert(key.to_string());
            Ok(())
        }

        async fn delete_object(&self, key: &str) -> anyhow::Result<()> {
            self.objects.lock().unwrap().remove(key);
            Ok(())
        }

        fn public_url(&self, key: &str) -> String {
            format!("{BASE_URL}{key}")
        }

        fn key_from_url(&self, url: &str) -> Option<String> {
            url.strip_prefix(BASE_URL).map(str::to_string)
        }
    }
}
