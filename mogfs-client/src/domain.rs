//! Domain-scoped operations

use mogfs_core::{DomainName, FileHandle, Key, KeyList};
use mogfs_net::{commands, fields, Idempotency, Params};

use crate::{Client, KeyHandle, Result};

/// A namespace on the tracker
#[derive(Clone)]
pub struct DomainHandle {
    client: Client,
    name: DomainName,
}

impl DomainHandle {
    pub(crate) fn new(client: Client, name: DomainName) -> Self {
        DomainHandle { client, name }
    }

    pub fn name(&self) -> &DomainName {
        &self.name
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Handle for `key` inside this domain
    pub fn key(&self, key: &str) -> Result<KeyHandle> {
        Ok(KeyHandle::new(self.clone(), Key::new(key)?))
    }

    pub async fn create(&self) -> Result<()> {
        self.client
            .request(commands::CREATE_DOMAIN, &self.params(), Idempotency::NonIdempotent)
            .await
            .map(drop)
    }

    pub async fn delete(&self) -> Result<()> {
        self.client
            .request(commands::DELETE_DOMAIN, &self.params(), Idempotency::NonIdempotent)
            .await
            .map(drop)
    }

    /// Whether the tracker lists this domain
    pub async fn exists(&self) -> Result<bool> {
        let domains = self.client.get_domains().await?;
        Ok(domains.iter().any(|d| d.name == self.name.as_str()))
    }

    pub async fn create_class(&self, class: &str, mindevcount: u32) -> Result<()> {
        let params = self
            .params()
            .with(fields::CLASS, class)
            .with(fields::MINDEVCOUNT, mindevcount);
        self.client
            .request(commands::CREATE_CLASS, &params, Idempotency::NonIdempotent)
            .await
            .map(drop)
    }

    pub async fn update_class(&self, class: &str, mindevcount: u32) -> Result<()> {
        let params = self
            .params()
            .with(fields::CLASS, class)
            .with(fields::MINDEVCOUNT, mindevcount);
        self.client
            .request(commands::UPDATE_CLASS, &params, Idempotency::NonIdempotent)
            .await
            .map(drop)
    }

    pub async fn delete_class(&self, class: &str) -> Result<()> {
        let params = self.params().with(fields::CLASS, class);
        self.client
            .request(commands::DELETE_CLASS, &params, Idempotency::NonIdempotent)
            .await
            .map(drop)
    }

    /// Ask the tracker where to write a new version of `key`
    pub async fn create_open(&self, class: Option<&str>, key: &Key) -> Result<FileHandle> {
        let params = self
            .params()
            .with_opt(fields::CLASS, class)
            .with(fields::KEY, key);
        let reply = self
            .client
            .request(commands::CREATE_OPEN, &params, Idempotency::NonIdempotent)
            .await?;
        Ok(FileHandle::from_fields(&reply)?)
    }

    /// Finalize an upload, making `key` point at the bytes behind `handle`
    pub async fn create_close(&self, handle: &FileHandle, size: u64, key: &Key) -> Result<()> {
        let params = self
            .params()
            .with(fields::FID, handle.fid)
            .with(fields::DEVID, handle.devid)
            .with(fields::PATH, &handle.path)
            .with(fields::SIZE, size)
            .with(fields::KEY, key);
        self.client
            .request(commands::CREATE_CLOSE, &params, Idempotency::NonIdempotent)
            .await
            .map(drop)
    }

    /// One page of keys, optionally filtered by prefix and starting after a
    /// cursor returned by a previous page
    pub async fn list_keys(
        &self,
        prefix: Option<&str>,
        after: Option<&str>,
        limit: Option<u32>,
    ) -> Result<KeyList> {
        let params = self
            .params()
            .with_opt(fields::PREFIX, prefix.filter(|p| !p.is_empty()))
            .with_opt(fields::AFTER, after.filter(|a| !a.is_empty()))
            .with_opt(fields::LIMIT, limit);
        let reply = self
            .client
            .request(commands::LIST_KEYS, &params, Idempotency::Idempotent)
            .await?;
        Ok(KeyList::from_fields(&reply)?)
    }

    pub(crate) fn params(&self) -> Params {
        Params::new().with(fields::DOMAIN, &self.name)
    }
}

impl std::fmt::Debug for DomainHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DomainHandle").field("name", &self.name).finish()
    }
}
