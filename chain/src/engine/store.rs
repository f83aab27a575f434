//! Persistence extension point.
//!
//! The reference implementation keeps everything in memory; [`NoopBlockStore`]
//! is what [`crate::engine::Chain`] uses by default. A durable backend can be
//! substituted as long as replaying its blocks reproduces identical header
//! and account state — the chain engine never reads back through this trait,
//! it only writes.

use crate::types::Block;

/// Error returned by a [`BlockStore`] implementation.
#[derive(Debug)]
pub struct StoreError(pub String);

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "storage error: {}", self.0)
    }
}

impl std::error::Error for StoreError {}

/// Durable persistence hook invoked once per accepted block.
pub trait BlockStore: Send + Sync {
    /// Persists `block`. Called after the block has already been applied
    /// to in-memory chain state.
    fn put(&self, block: &Block) -> Result<(), StoreError>;
}

/// No-op store: the reference persistence backend is in-memory only.
#[derive(Debug, Default)]
pub struct NoopBlockStore;

impl BlockStore for NoopBlockStore {
    fn put(&self, _block: &Block) -> Result<(), StoreError> {
        Ok(())
    }
}
