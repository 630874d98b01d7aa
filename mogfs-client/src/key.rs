//! Key-scoped operations: the store workflow and the read path

use std::path::Path;

use bytes::Bytes;
use http_body_util::BodyExt;
use hyper::body::Incoming;
use hyper::Response;
use mogfs_core::{paths_from_fields, FileInfo, Key, StoredObject};
use mogfs_net::{commands, fields, Idempotency, Params};
use rand::seq::SliceRandom;
use tokio::io::AsyncRead;
use tracing::{debug, warn};

use crate::{ClientError, DomainHandle, Result};

/// A key inside a domain
#[derive(Clone, Debug)]
pub struct KeyHandle {
    domain: DomainHandle,
    key: Key,
    class: Option<String>,
}

impl KeyHandle {
    pub(crate) fn new(domain: DomainHandle, key: Key) -> Self {
        KeyHandle {
            domain,
            key,
            class: None,
        }
    }

    /// Store new versions of this key under `class`
    pub fn with_class(mut self, class: impl Into<String>) -> Self {
        self.class = Some(class.into());
        self
    }

    pub fn key(&self) -> &Key {
        &self.key
    }

    pub fn domain(&self) -> &DomainHandle {
        &self.domain
    }

    /// Upload everything `reader` yields and register it under this key.
    ///
    /// Runs `create_open`, an HTTP PUT to the path the tracker picked, then
    /// `create_close` with the number of bytes actually sent. If the PUT
    /// fails the tracker is never told, and the key keeps whatever it
    /// pointed at before.
    pub async fn store<R>(&self, reader: R, content_type: &str) -> Result<StoredObject>
    where
        R: AsyncRead + Send + 'static,
    {
        let handle = self
            .domain
            .create_open(self.class.as_deref(), &self.key)
            .await?;
        debug!(key = %self.key, fid = handle.fid, path = %handle.path, "opened file for write");

        let size = match self
            .domain
            .client()
            .storage()
            .put(&handle.path, content_type, reader)
            .await
        {
            Ok(size) => size,
            Err(e) => {
                warn!(key = %self.key, fid = handle.fid, error = %e, "upload failed, not closing");
                return Err(e);
            }
        };

        self.domain.create_close(&handle, size, &self.key).await?;
        debug!(key = %self.key, fid = handle.fid, size, "stored");

        Ok(StoredObject {
            fid: handle.fid,
            devid: handle.devid,
            path: handle.path,
            size,
        })
    }

    pub async fn store_bytes(&self, data: impl Into<Bytes>, content_type: &str) -> Result<StoredObject> {
        self.store(std::io::Cursor::new(data.into()), content_type).await
    }

    pub async fn store_file(&self, path: impl AsRef<Path>, content_type: &str) -> Result<StoredObject> {
        let file = tokio::fs::File::open(path).await?;
        self.store(file, content_type).await
    }

    /// Every replica URL the tracker knows for this key
    pub async fn paths(&self) -> Result<Vec<String>> {
        self.get_paths(false).await
    }

    /// Like [`paths`](Self::paths), but the tracker skips checking that
    /// each replica is actually readable
    pub async fn paths_noverify(&self) -> Result<Vec<String>> {
        self.get_paths(true).await
    }

    async fn get_paths(&self, noverify: bool) -> Result<Vec<String>> {
        let params = self
            .params()
            .with_opt(fields::NOVERIFY, noverify.then_some(1));
        let reply = self
            .domain
            .client()
            .request(commands::GET_PATHS, &params, Idempotency::Idempotent)
            .await?;
        Ok(paths_from_fields(&reply)?)
    }

    /// One replica URL, picked uniformly at random
    pub async fn path(&self) -> Result<String> {
        let paths = self.paths().await?;
        paths
            .choose(&mut rand::thread_rng())
            .cloned()
            .ok_or_else(|| ClientError::NoPaths(self.key.to_string()))
    }

    /// GET one replica and return the response with its body unread
    pub async fn stream(&self) -> Result<Response<Incoming>> {
        let path = self.path().await?;
        self.domain.client().storage().get(&path).await
    }

    /// GET one replica and collect its body
    pub async fn fetch(&self) -> Result<Bytes> {
        let path = self.path().await?;
        let response = self.domain.client().storage().get(&path).await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::HttpStatus {
                status: status.as_u16(),
                path,
            });
        }

        let body = response
            .into_body()
            .collect()
            .await
            .map_err(|e| ClientError::Http(e.to_string()))?;
        Ok(body.to_bytes())
    }

    pub async fn file_info(&self) -> Result<FileInfo> {
        let reply = self
            .domain
            .client()
            .request(commands::FILE_INFO, &self.params(), Idempotency::Idempotent)
            .await?;
        Ok(FileInfo::from_fields(&reply)?)
    }

    pub async fn delete(&self) -> Result<()> {
        self.domain
            .client()
            .request(commands::DELETE, &self.params(), Idempotency::NonIdempotent)
            .await
            .map(drop)
    }

    /// Rename this key, returning a handle for the new name
    pub async fn rename(&self, to: &str) -> Result<KeyHandle> {
        let to = Key::new(to)?;
        let params = self
            .domain
            .params()
            .with(fields::FROM_KEY, &self.key)
            .with(fields::TO_KEY, &to);
        self.domain
            .client()
            .request(commands::RENAME, &params, Idempotency::NonIdempotent)
            .await?;

        Ok(KeyHandle {
            domain: self.domain.clone(),
            key: to,
            class: self.class.clone(),
        })
    }

    fn params(&self) -> Params {
        self.domain.params().with(fields::KEY, &self.key)
    }
}
