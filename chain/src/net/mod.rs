//! Wire message types and the peer transport built on top of them.

pub mod message;
pub mod transport;

pub use message::{BlocksResponse, GetBlocksRequest, Message, Payload, Status};
