//! Chain validation, application, and indexing.

pub mod chain;
pub mod error;
pub mod state;
pub mod store;

pub use chain::Chain;
pub use error::{ChainError, TxError, WireError};
pub use store::{BlockStore, NoopBlockStore, StoreError};
