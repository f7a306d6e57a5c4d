pub mod engine;
pub mod fingerprint;
pub mod paths;
pub mod queue;
pub mod remote;
pub mod transfer;

pub use engine::{EngineConfig, EngineError, PassMode, PassSummary, ReconciliationEngine};
pub use remote::{DirectoryStatus, Listing, RemoteListing, RemoteStore, StoreError, YadiskStore};
