//! In-memory chain state: header/block indices, account state, contract
//! state, and the NFT collection/mint indices.
//!
//! Everything here lives behind the single read/write lock owned by
//! [`crate::engine::Chain`]; nothing in this module does its own locking.

use std::collections::HashMap;

use crate::types::{Account, Address, Block, CollectionPayload, Header, Hash, MintPayload, Transaction};
use crate::vm::ContractStore;

/// All chain state mutated atomically by `add_block`.
#[derive(Default)]
pub struct ChainState {
    headers: Vec<Header>,
    blocks: Vec<Block>,
    block_by_hash: HashMap<Hash, u32>,
    tx_by_hash: HashMap<Hash, Transaction>,
    pub(crate) accounts: HashMap<Address, Account>,
    pub(crate) contracts: ContractStore,
    collections: HashMap<Hash, CollectionPayload>,
    mints: HashMap<Hash, MintPayload>,
}

impl ChainState {
    /// Appends a block to every index. Called only after validation and
    /// application have both succeeded.
    pub(crate) fn index_block(&mut self, block: Block) {
        let height = block.header.height;
        let hash = block.hash();
        self.headers.push(block.header.clone());
        for tx in &block.transactions {
            self.tx_by_hash.insert(tx.hash(), tx.clone());
        }
        self.blocks.push(block);
        self.block_by_hash.insert(hash, height);
    }

    pub fn height(&self) -> u32 {
        self.headers.last().map(|h| h.height).unwrap_or(0)
    }

    pub fn has_block(&self, height: u32) -> bool {
        self.headers.iter().any(|h| h.height == height)
    }

    pub fn get_header(&self, height: u32) -> Option<&Header> {
        self.headers.iter().find(|h| h.height == height)
    }

    pub fn get_block(&self, height: u32) -> Option<&Block> {
        self.blocks.iter().find(|b| b.header.height == height)
    }

    pub fn get_block_by_hash(&self, hash: &Hash) -> Option<&Block> {
        self.block_by_hash
            .get(hash)
            .and_then(|height| self.get_block(*height))
    }

    pub fn get_tx_by_hash(&self, hash: &Hash) -> Option<&Transaction> {
        self.tx_by_hash.get(hash)
    }

    pub fn balance(&self, address: &Address) -> Option<u64> {
        self.accounts.get(address).map(|a| a.balance)
    }

    /// Clones every map mutated while applying a block's transactions, for
    /// use as a scratch copy that can be discarded if application fails
    /// partway through — `add_block` must never let a later transaction's
    /// failure leave an earlier transaction's mutations committed.
    pub(crate) fn snapshot_mutable(&self) -> MutableSnapshot {
        MutableSnapshot {
            accounts: self.accounts.clone(),
            contracts: self.contracts.clone(),
            collections: self.collections.clone(),
            mints: self.mints.clone(),
        }
    }

    /// Overwrites the mutable maps with `snapshot`. Called only once every
    /// transaction in a block has applied successfully.
    pub(crate) fn commit_mutable(&mut self, snapshot: MutableSnapshot) {
        self.accounts = snapshot.accounts;
        self.contracts = snapshot.contracts;
        self.collections = snapshot.collections;
        self.mints = snapshot.mints;
    }
}

/// Scratch copy of the maps a block's transactions mutate, applied and
/// checked in isolation before being committed back into [`ChainState`].
pub(crate) struct MutableSnapshot {
    pub(crate) accounts: HashMap<Address, Account>,
    pub(crate) contracts: ContractStore,
    pub(crate) collections: HashMap<Hash, CollectionPayload>,
    pub(crate) mints: HashMap<Hash, MintPayload>,
}

impl MutableSnapshot {
    pub(crate) fn has_collection(&self, tx_hash: &Hash) -> bool {
        self.collections.contains_key(tx_hash)
    }

    pub(crate) fn record_collection(&mut self, tx_hash: Hash, payload: CollectionPayload) {
        self.collections.insert(tx_hash, payload);
    }

    pub(crate) fn record_mint(&mut self, tx_hash: Hash, payload: MintPayload) {
        self.mints.insert(tx_hash, payload);
    }
}
