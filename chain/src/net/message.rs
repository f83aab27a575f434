//! The wire envelope and the six message kinds carried over it.

use crate::codec::{CodecError, Decode, Encode};
use crate::types::block::decode_blocks;
use crate::types::{Block, Transaction};

const MSG_TRANSACTION: u8 = 0x01;
const MSG_BLOCK: u8 = 0x02;
const MSG_GET_BLOCKS: u8 = 0x03;
const MSG_STATUS: u8 = 0x04;
const MSG_GET_STATUS: u8 = 0x05;
const MSG_BLOCKS: u8 = 0x06;

/// Self-delimiting wire envelope: a one-byte type tag plus a
/// length-prefixed payload. A stream between peers is a back-to-back
/// sequence of these; the length prefix inside `data` is the only framing
/// needed, there is no outer delimiter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub kind: u8,
    pub data: Vec<u8>,
}

impl Encode for Message {
    fn encode(&self, out: &mut Vec<u8>) {
        self.kind.encode(out);
        self.data.encode(out);
    }
}

impl Decode for Message {
    fn decode(input: &[u8]) -> Result<(Self, &[u8]), CodecError> {
        let (kind, rest) = u8::decode(input)?;
        let (data, rest) = Vec::<u8>::decode(rest)?;
        Ok((Message { kind, data }, rest))
    }
}

impl Message {
    pub fn transaction(tx: &Transaction) -> Self {
        Message {
            kind: MSG_TRANSACTION,
            data: tx.to_canonical_bytes(),
        }
    }

    pub fn block(block: &Block) -> Self {
        Message {
            kind: MSG_BLOCK,
            data: block.to_canonical_bytes(),
        }
    }

    pub fn get_blocks(req: &GetBlocksRequest) -> Self {
        Message {
            kind: MSG_GET_BLOCKS,
            data: req.to_canonical_bytes(),
        }
    }

    pub fn status(status: &Status) -> Self {
        Message {
            kind: MSG_STATUS,
            data: status.to_canonical_bytes(),
        }
    }

    pub fn get_status() -> Self {
        Message {
            kind: MSG_GET_STATUS,
            data: Vec::new(),
        }
    }

    pub fn blocks(blocks: &BlocksResponse) -> Self {
        Message {
            kind: MSG_BLOCKS,
            data: blocks.to_canonical_bytes(),
        }
    }

    /// Decodes `data` according to `kind`, returning a typed payload.
    pub fn decode_payload(&self) -> Result<Payload, CodecError> {
        match self.kind {
            MSG_TRANSACTION => {
                let (tx, rest) = Transaction::decode(&self.data)?;
                require_empty(rest)?;
                Ok(Payload::Transaction(tx))
            }
            MSG_BLOCK => {
                let (block, rest) = Block::decode(&self.data)?;
                require_empty(rest)?;
                Ok(Payload::Block(block))
            }
            MSG_GET_BLOCKS => {
                let (req, rest) = GetBlocksRequest::decode(&self.data)?;
                require_empty(rest)?;
                Ok(Payload::GetBlocks(req))
            }
            MSG_STATUS => {
                let (status, rest) = Status::decode(&self.data)?;
                require_empty(rest)?;
                Ok(Payload::Status(status))
            }
            MSG_GET_STATUS => {
                require_empty(&self.data)?;
                Ok(Payload::GetStatus)
            }
            MSG_BLOCKS => {
                let (resp, rest) = BlocksResponse::decode(&self.data)?;
                require_empty(rest)?;
                Ok(Payload::Blocks(resp))
            }
            other => Err(CodecError::BadTag(other)),
        }
    }
}

fn require_empty(rest: &[u8]) -> Result<(), CodecError> {
    if rest.is_empty() {
        Ok(())
    } else {
        Err(CodecError::TrailingBytes)
    }
}

/// A decoded message payload, dispatched on by the server's event loop.
#[derive(Debug, Clone)]
pub enum Payload {
    Transaction(Transaction),
    Block(Block),
    GetBlocks(GetBlocksRequest),
    Status(Status),
    GetStatus,
    Blocks(BlocksResponse),
}

/// `GetBlocks { from, to }`. `to == 0` means "up to the responder's tip".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GetBlocksRequest {
    pub from: u32,
    pub to: u32,
}

impl Encode for GetBlocksRequest {
    fn encode(&self, out: &mut Vec<u8>) {
        self.from.encode(out);
        self.to.encode(out);
    }
}

impl Decode for GetBlocksRequest {
    fn decode(input: &[u8]) -> Result<(Self, &[u8]), CodecError> {
        let (from, rest) = u32::decode(input)?;
        let (to, rest) = u32::decode(rest)?;
        Ok((GetBlocksRequest { from, to }, rest))
    }
}

/// `Status { id, version, current_height }`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    pub id: String,
    pub version: u32,
    pub current_height: u32,
}

impl Encode for Status {
    fn encode(&self, out: &mut Vec<u8>) {
        self.id.clone().into_bytes().encode(out);
        self.version.encode(out);
        self.current_height.encode(out);
    }
}

impl Decode for Status {
    fn decode(input: &[u8]) -> Result<(Self, &[u8]), CodecError> {
        let (id_bytes, rest) = Vec::<u8>::decode(input)?;
        let id = String::from_utf8(id_bytes).map_err(|_| CodecError::BadLength)?;
        let (version, rest) = u32::decode(rest)?;
        let (current_height, rest) = u32::decode(rest)?;
        Ok((
            Status {
                id,
                version,
                current_height,
            },
            rest,
        ))
    }
}

/// `Blocks { blocks }`: a contiguous range of blocks answering a
/// [`GetBlocksRequest`].
#[derive(Debug, Clone)]
pub struct BlocksResponse {
    pub blocks: Vec<Block>,
}

impl Encode for BlocksResponse {
    fn encode(&self, out: &mut Vec<u8>) {
        self.blocks.as_slice().encode(out);
    }
}

impl Decode for BlocksResponse {
    fn decode(input: &[u8]) -> Result<(Self, &[u8]), CodecError> {
        let (blocks, rest) = decode_blocks(input)?;
        Ok((BlocksResponse { blocks }, rest))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PrivateKey, TxInner};

    #[test]
    fn transaction_message_round_trips() {
        let key = PrivateKey::generate();
        let mut tx = Transaction::new(TxInner::None, vec![], key.public_key(), None, 0, 1);
        tx.sign(&key);

        let msg = Message::transaction(&tx);
        let bytes = msg.to_canonical_bytes();
        let (decoded, rest) = Message::decode(&bytes).unwrap();
        assert!(rest.is_empty());
        match decoded.decode_payload().unwrap() {
            Payload::Transaction(t) => assert_eq!(t.hash(), tx.hash()),
            other => panic!("unexpected payload: {other:?}"),
        }
    }

    #[test]
    fn get_blocks_to_zero_means_through_tip() {
        let req = GetBlocksRequest { from: 5, to: 0 };
        let bytes = req.to_canonical_bytes();
        let (decoded, _) = GetBlocksRequest::decode(&bytes).unwrap();
        assert_eq!(decoded.to, 0);
    }

    #[test]
    fn status_round_trips() {
        let status = Status {
            id: "node-1".to_string(),
            version: 1,
            current_height: 42,
        };
        let msg = Message::status(&status);
        let (decoded, _) = Message::decode(&msg.to_canonical_bytes()).unwrap();
        match decoded.decode_payload().unwrap() {
            Payload::Status(s) => assert_eq!(s, status),
            other => panic!("unexpected payload: {other:?}"),
        }
    }

    #[test]
    fn unknown_kind_is_bad_tag() {
        let msg = Message { kind: 0xff, data: vec![] };
        assert_eq!(
            msg.decode_payload().unwrap_err(),
            CodecError::BadTag(0xff)
        );
    }

    #[test]
    fn trailing_bytes_in_payload_are_rejected() {
        let mut data = Vec::new();
        0u32.encode(&mut data);
        0u32.encode(&mut data);
        data.push(0xff);
        let msg = Message { kind: MSG_GET_BLOCKS, data };
        assert_eq!(msg.decode_payload().unwrap_err(), CodecError::TrailingBytes);
    }
}
