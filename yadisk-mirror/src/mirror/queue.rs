use std::collections::VecDeque;
use std::path::PathBuf;

use super::paths::RemotePath;

/// One unit of remote work produced by a directory diff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferOperation {
    Upload { local: PathBuf, remote: RemotePath },
    Delete { remote: RemotePath },
}

impl TransferOperation {
    pub fn remote(&self) -> &RemotePath {
        match self {
            TransferOperation::Upload { remote, .. } | TransferOperation::Delete { remote } => {
                remote
            }
        }
    }
}

/// FIFO of operations collected during a pass and drained at its end.
#[derive(Debug, Default)]
pub struct OperationQueue {
    inner: VecDeque<TransferOperation>,
}

impl OperationQueue {
    pub fn extend(&mut self, ops: impl IntoIterator<Item = TransferOperation>) {
        self.inner.extend(ops);
    }

    pub fn drain(&mut self) -> impl Iterator<Item = TransferOperation> + '_ {
        self.inner.drain(..)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}
