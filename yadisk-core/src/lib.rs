mod client;

pub use client::{
    DeleteStatus, DiskInfo, ERROR_PARENT_MISSING, FolderStatus, Resource,
    ResourceList, ResourceType, TransferLink, YadiskClient, YadiskError,
};
