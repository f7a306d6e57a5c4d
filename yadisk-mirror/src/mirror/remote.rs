//! The seam between the reconciliation engine and the cloud backend.
//!
//! Every operation reports failure through [`StoreError`]; "not found" on a
//! listing is an expected answer and travels as [`Listing::NotFound`] instead.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;
use yadisk_core::{DeleteStatus, FolderStatus, ResourceType, YadiskClient, YadiskError};

use super::fingerprint::Fingerprint;
use super::paths::{RemotePath, normalize_remote_root, remote_join};
use super::transfer::{TransferClient, TransferError};

const LIST_PAGE_SIZE: u32 = 1000;
const LIST_FIELDS: &[&str] = &[
    "_embedded.items.name",
    "_embedded.items.type",
    "_embedded.items.md5",
    "_embedded.total",
];

/// File name to reported fingerprint for one remote directory. Files the
/// backend reports without a hash map to `None`.
pub type RemoteListing = HashMap<String, Option<Fingerprint>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectoryStatus {
    Created,
    AlreadyExists,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Listing {
    Found(RemoteListing),
    NotFound,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("api error: {0}")]
    Api(#[from] YadiskError),
    #[error("transfer error: {0}")]
    Transfer(#[from] TransferError),
    #[error("{path}: {reason}")]
    Rejected { path: String, reason: String },
    #[error("concurrency limiter is closed")]
    ConcurrencyClosed,
}

#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Idempotent; both variants of [`DirectoryStatus`] mean the folder exists.
    async fn ensure_directory(&self, path: &RemotePath) -> Result<DirectoryStatus, StoreError>;

    /// Files directly inside `path`; subdirectories are left out.
    async fn list_files(&self, path: &RemotePath) -> Result<Listing, StoreError>;

    /// Replaces whatever lives at `path` with the bytes of `local`.
    async fn upload(&self, local: &Path, path: &RemotePath) -> Result<(), StoreError>;

    /// Removing an absent file succeeds.
    async fn delete(&self, path: &RemotePath) -> Result<(), StoreError>;
}

/// [`RemoteStore`] backed by the Yandex Disk REST API.
pub struct YadiskStore {
    client: YadiskClient,
    transfer: TransferClient,
    remote_root: String,
    permanent_delete: bool,
}

impl YadiskStore {
    pub fn new(client: YadiskClient, remote_root: &str) -> Self {
        Self {
            client,
            transfer: TransferClient::new(),
            remote_root: normalize_remote_root(remote_root),
            permanent_delete: false,
        }
    }

    pub fn with_permanent_delete(mut self, permanent: bool) -> Self {
        self.permanent_delete = permanent;
        self
    }

    fn full_path(&self, path: &RemotePath) -> String {
        remote_join(&self.remote_root, path, None)
    }
}

#[async_trait]
impl RemoteStore for YadiskStore {
    async fn ensure_directory(&self, path: &RemotePath) -> Result<DirectoryStatus, StoreError> {
        let full = self.full_path(path);
        let status = match self.client.create_folder(&full).await? {
            FolderStatus::Created => DirectoryStatus::Created,
            FolderStatus::AlreadyExists => DirectoryStatus::AlreadyExists,
        };
        debug!(path = %full, ?status, "ensured remote directory");
        Ok(status)
    }

    async fn list_files(&self, path: &RemotePath) -> Result<Listing, StoreError> {
        let full = self.full_path(path);
        let items = match self
            .client
            .list_directory_all(&full, LIST_PAGE_SIZE, Some(LIST_FIELDS))
            .await
        {
            Ok(items) => items,
            Err(err) if err.is_not_found() => return Ok(Listing::NotFound),
            Err(err) => return Err(err.into()),
        };

        let files = items
            .into_iter()
            .filter(|item| item.resource_type == ResourceType::File)
            .map(|item| (item.name, item.md5.as_deref().map(Fingerprint::from_hex)))
            .collect();
        Ok(Listing::Found(files))
    }

    async fn upload(&self, local: &Path, path: &RemotePath) -> Result<(), StoreError> {
        let full = self.full_path(path);
        let link = self.client.get_upload_link(&full, true).await?;
        self.transfer
            .upload_from_path(link.href.as_str(), local)
            .await?;
        Ok(())
    }

    async fn delete(&self, path: &RemotePath) -> Result<(), StoreError> {
        let full = self.full_path(path);
        match self
            .client
            .delete_resource(&full, self.permanent_delete)
            .await
        {
            Ok(DeleteStatus::Deleted) => Ok(()),
            Ok(DeleteStatus::Accepted(link)) => {
                debug!(path = %full, operation = %link.href, "remote delete continues asynchronously");
                Ok(())
            }
            Err(err) if err.is_not_found() => {
                debug!(path = %full, "remote file already absent");
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }
}
