use std::collections::{HashSet, VecDeque};
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures_util::StreamExt;
use futures_util::future::join_all;
use futures_util::stream::FuturesUnordered;
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

use super::fingerprint::{Fingerprint, FingerprintError, fingerprint_file};
use super::paths::{RemotePath, is_sync_eligible, relative_remote_path};
use super::queue::{OperationQueue, TransferOperation};
use super::remote::{DirectoryStatus, Listing, RemoteListing, RemoteStore, StoreError};

pub const DEFAULT_MAX_CONCURRENT_REQUESTS: usize = 55;
pub const DEFAULT_DIRECTORY_WORKERS: usize = 16;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("local root {} is unavailable: {source}", path.display())]
    RootUnavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("local root {} is not a directory", .0.display())]
    RootNotDirectory(PathBuf),
}

/// Which flavour of pass to run; the caller decides, the engine keeps no memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassMode {
    /// Create the remote directory skeleton only. Never uploads or deletes.
    Bootstrap,
    /// Create, upload changed files and delete remote files missing locally.
    Incremental,
}

#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    /// Shared cap on in-flight remote calls of every kind.
    pub max_concurrent_requests: usize,
    /// Directories reconciled at the same time.
    pub directory_workers: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_requests: DEFAULT_MAX_CONCURRENT_REQUESTS,
            directory_workers: DEFAULT_DIRECTORY_WORKERS,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassSummary {
    pub directories_created: usize,
    pub directories_existing: usize,
    pub uploaded: usize,
    pub deleted: usize,
    pub unchanged: usize,
    pub skipped_unreadable: usize,
    pub failed: usize,
}

impl PassSummary {
    fn merge(&mut self, other: &PassSummary) {
        self.directories_created += other.directories_created;
        self.directories_existing += other.directories_existing;
        self.uploaded += other.uploaded;
        self.deleted += other.deleted;
        self.unchanged += other.unchanged;
        self.skipped_unreadable += other.skipped_unreadable;
        self.failed += other.failed;
    }

    pub fn has_changes(&self) -> bool {
        self.directories_created > 0 || self.uploaded > 0 || self.deleted > 0
    }
}

#[derive(Debug)]
struct DirectoryTask {
    local: PathBuf,
    remote: RemotePath,
}

#[derive(Debug, Default)]
struct DirectoryReport {
    summary: PassSummary,
    uploads: Vec<TransferOperation>,
    children: Vec<DirectoryTask>,
}

#[derive(Debug, Default)]
struct LocalDirectory {
    /// Regular files that pass the eligibility filter.
    files: Vec<(String, PathBuf)>,
    subdirs: Vec<PathBuf>,
    /// Every entry name, eligible or not; remote files missing here get deleted.
    names: HashSet<String>,
}

type FingerprintFn = fn(&Path) -> Result<Fingerprint, FingerprintError>;

pub struct ReconciliationEngine {
    store: Arc<dyn RemoteStore>,
    limiter: Arc<Semaphore>,
    directory_workers: usize,
    fingerprint: FingerprintFn,
}

impl ReconciliationEngine {
    pub fn new(store: Arc<dyn RemoteStore>, config: EngineConfig) -> Self {
        Self {
            store,
            limiter: Arc::new(Semaphore::new(config.max_concurrent_requests.max(1))),
            directory_workers: config.directory_workers.max(1),
            fingerprint: fingerprint_file,
        }
    }

    #[cfg(test)]
    fn with_fingerprint(mut self, fingerprint: FingerprintFn) -> Self {
        self.fingerprint = fingerprint;
        self
    }

    /// Runs one full pass over `local_root`.
    ///
    /// Only an unreachable root is an error; everything that fails inside the
    /// pass is logged, counted in the summary and left for the next pass.
    pub async fn run(&self, local_root: &Path, mode: PassMode) -> Result<PassSummary, EngineError> {
        let root = resolve_root(local_root).await?;
        info!(root = %root.display(), ?mode, "reconciliation pass started");

        let mut summary = PassSummary::default();
        let mut uploads = OperationQueue::default();
        let mut pending = VecDeque::from([DirectoryTask {
            local: root.clone(),
            remote: RemotePath::root(),
        }]);
        let mut in_flight = FuturesUnordered::new();

        // Children are queued only once their parent's task has finished, so a
        // remote folder always exists before anything below it is touched.
        loop {
            while in_flight.len() < self.directory_workers {
                let Some(task) = pending.pop_front() else {
                    break;
                };
                in_flight.push(self.reconcile_directory(&root, task, mode));
            }
            let Some(report) = in_flight.next().await else {
                break;
            };
            summary.merge(&report.summary);
            uploads.extend(report.uploads);
            pending.extend(report.children);
        }

        if !uploads.is_empty() {
            debug!(count = uploads.len(), "draining queued uploads");
        }
        let results = join_all(uploads.drain().map(|op| self.execute(op))).await;
        for ok in results {
            if ok {
                summary.uploaded += 1;
            } else {
                summary.failed += 1;
            }
        }

        if !summary.has_changes() && summary.failed == 0 && summary.skipped_unreadable == 0 {
            info!(
                ?mode,
                unchanged = summary.unchanged,
                "reconciliation pass finished, nothing to do"
            );
            return Ok(summary);
        }
        info!(
            ?mode,
            created = summary.directories_created,
            uploaded = summary.uploaded,
            deleted = summary.deleted,
            unchanged = summary.unchanged,
            skipped = summary.skipped_unreadable,
            failed = summary.failed,
            "reconciliation pass finished"
        );
        Ok(summary)
    }

    async fn reconcile_directory(
        &self,
        root: &Path,
        task: DirectoryTask,
        mode: PassMode,
    ) -> DirectoryReport {
        let mut report = DirectoryReport::default();

        match self.limited(self.store.ensure_directory(&task.remote)).await {
            Ok(DirectoryStatus::Created) => {
                info!(path = %task.remote, "created remote directory");
                report.summary.directories_created += 1;
            }
            Ok(DirectoryStatus::AlreadyExists) => {
                debug!(path = %task.remote, "remote directory already exists");
                report.summary.directories_existing += 1;
            }
            Err(err) => {
                error!(path = %task.remote, error = %err, "failed to create remote directory, skipping subtree");
                report.summary.failed += 1;
                return report;
            }
        }

        let local = match read_local_directory(&task.local).await {
            Ok(local) => local,
            Err(err) => {
                error!(dir = %task.local.display(), error = %err, "failed to read local directory");
                report.summary.failed += 1;
                return report;
            }
        };

        for subdir in &local.subdirs {
            match relative_remote_path(root, subdir) {
                Ok(remote) if is_sync_eligible(remote.as_str()) => {
                    report.children.push(DirectoryTask {
                        local: subdir.clone(),
                        remote,
                    });
                }
                Ok(remote) => debug!(path = %remote, "skipping excluded directory"),
                Err(err) => warn!(error = %err, "skipping directory"),
            }
        }

        if mode == PassMode::Incremental {
            self.diff_directory(&task, &local, &mut report).await;
        }
        report
    }

    async fn diff_directory(
        &self,
        task: &DirectoryTask,
        local: &LocalDirectory,
        report: &mut DirectoryReport,
    ) {
        let remote_files = match self.limited(self.store.list_files(&task.remote)).await {
            Ok(Listing::Found(files)) => files,
            Ok(Listing::NotFound) => {
                debug!(path = %task.remote, "remote directory not found, treating as empty");
                RemoteListing::new()
            }
            Err(err) => {
                warn!(path = %task.remote, error = %err, "failed to list remote directory, skipping its files this pass");
                report.summary.failed += 1;
                return;
            }
        };

        for (name, path) in &local.files {
            let remote = task.remote.join(name);
            let local_hash = match fingerprint_blocking(self.fingerprint, path.clone()).await {
                Ok(fp) => fp,
                Err(err) => {
                    warn!(file = %remote, error = %err, "cannot fingerprint local file, skipping this pass");
                    report.summary.skipped_unreadable += 1;
                    continue;
                }
            };
            let remote_hash = remote_files.get(name).cloned().flatten();
            if remote_hash.as_ref() == Some(&local_hash) {
                debug!(file = %remote, "already in sync");
                report.summary.unchanged += 1;
                continue;
            }
            info!(
                file = %remote,
                local_hash = %local_hash,
                remote_hash = remote_hash.as_ref().map(Fingerprint::as_str).unwrap_or("-"),
                "queued upload"
            );
            report.uploads.push(TransferOperation::Upload {
                local: path.clone(),
                remote,
            });
        }

        let deletes = remote_files
            .keys()
            .filter(|name| !local.names.contains(name.as_str()))
            .map(|name| TransferOperation::Delete {
                remote: task.remote.join(name),
            });
        for ok in join_all(deletes.map(|op| self.execute(op))).await {
            if ok {
                report.summary.deleted += 1;
            } else {
                report.summary.failed += 1;
            }
        }
    }

    async fn execute(&self, op: TransferOperation) -> bool {
        let result = match &op {
            TransferOperation::Upload { local, remote } => {
                self.limited(self.store.upload(local, remote)).await
            }
            TransferOperation::Delete { remote } => self.limited(self.store.delete(remote)).await,
        };
        match (&op, result) {
            (TransferOperation::Upload { remote, .. }, Ok(())) => {
                info!(file = %remote, "uploaded");
                true
            }
            (TransferOperation::Delete { remote }, Ok(())) => {
                info!(file = %remote, "deleted remote file missing locally");
                true
            }
            (op, Err(err)) => {
                error!(file = %op.remote(), ?op, error = %err, "remote operation failed");
                false
            }
        }
    }

    /// Holds one limiter permit for the whole remote call.
    async fn limited<T>(
        &self,
        call: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, StoreError> {
        let _permit = self
            .limiter
            .acquire()
            .await
            .map_err(|_| StoreError::ConcurrencyClosed)?;
        call.await
    }
}

async fn resolve_root(local_root: &Path) -> Result<PathBuf, EngineError> {
    let root = tokio::fs::canonicalize(local_root)
        .await
        .map_err(|source| EngineError::RootUnavailable {
            path: local_root.to_path_buf(),
            source,
        })?;
    let meta = tokio::fs::metadata(&root)
        .await
        .map_err(|source| EngineError::RootUnavailable {
            path: root.clone(),
            source,
        })?;
    if !meta.is_dir() {
        return Err(EngineError::RootNotDirectory(root));
    }
    Ok(root)
}

async fn read_local_directory(dir: &Path) -> io::Result<LocalDirectory> {
    let mut out = LocalDirectory::default();
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
            warn!(path = %path.display(), "skipping entry with non UTF-8 name");
            continue;
        };
        out.names.insert(name.clone());

        let file_type = match entry.file_type().await {
            Ok(file_type) => file_type,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "cannot stat entry, skipping");
                continue;
            }
        };
        if file_type.is_dir() {
            out.subdirs.push(path);
            continue;
        }
        // Symlinked files are mirrored by content; symlinked directories are not followed.
        let is_file = file_type.is_file()
            || (file_type.is_symlink()
                && tokio::fs::metadata(&path)
                    .await
                    .map(|meta| meta.is_file())
                    .unwrap_or(false));
        if is_file && is_sync_eligible(&name) {
            out.files.push((name, path));
        }
    }
    Ok(out)
}

async fn fingerprint_blocking(
    fingerprint: FingerprintFn,
    path: PathBuf,
) -> Result<Fingerprint, FingerprintError> {
    let fallback = path.clone();
    tokio::task::spawn_blocking(move || fingerprint(&path))
        .await
        .unwrap_or_else(|err| {
            Err(FingerprintError {
                path: fallback,
                source: io::Error::other(err),
            })
        })
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
