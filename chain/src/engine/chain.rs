//! The chain engine: block validation, atomic application, and indexing.

use std::sync::RwLock;

use tracing::{error, warn};

use crate::types::{Account, Address, Block, Header, Hash, TxInner};
use crate::types::block::hash_transactions;
use crate::vm;

use super::error::{ChainError, TxError};
use super::state::{ChainState, MutableSnapshot};
use super::store::{BlockStore, NoopBlockStore};

/// The append-only chain: header/block index, account state, contract
/// state, and the NFT collection/mint indices, all behind one read/write
/// lock so that `add_block` is atomic to concurrent readers.
pub struct Chain<S: BlockStore = NoopBlockStore> {
    state: RwLock<ChainState>,
    store: S,
}

impl Chain<NoopBlockStore> {
    /// Constructs a chain containing only `genesis`, using the in-memory,
    /// no-op persistence backend. Genesis is indexed without validation.
    pub fn new_chain(genesis: Block) -> Self {
        Chain::with_store(genesis, NoopBlockStore)
    }
}

impl<S: BlockStore> Chain<S> {
    /// Constructs a chain containing only `genesis`, using `store` for
    /// persistence. Genesis is indexed without validation.
    pub fn with_store(genesis: Block, store: S) -> Self {
        let mut state = ChainState::default();
        state.index_block(genesis);
        Chain {
            state: RwLock::new(state),
            store,
        }
    }

    /// Current chain height (the height of the last accepted block).
    pub fn height(&self) -> u32 {
        self.state.read().expect("chain state lock poisoned").height()
    }

    pub fn has_block(&self, height: u32) -> bool {
        self.state
            .read()
            .expect("chain state lock poisoned")
            .has_block(height)
    }

    pub fn get_header(&self, height: u32) -> Option<Header> {
        self.state
            .read()
            .expect("chain state lock poisoned")
            .get_header(height)
            .cloned()
    }

    pub fn get_block(&self, height: u32) -> Option<Block> {
        self.state
            .read()
            .expect("chain state lock poisoned")
            .get_block(height)
            .cloned()
    }

    pub fn get_block_by_hash(&self, hash: &Hash) -> Option<Block> {
        self.state
            .read()
            .expect("chain state lock poisoned")
            .get_block_by_hash(hash)
            .cloned()
    }

    pub fn get_tx_by_hash(&self, hash: &Hash) -> Option<crate::types::Transaction> {
        self.state
            .read()
            .expect("chain state lock poisoned")
            .get_tx_by_hash(hash)
            .cloned()
    }

    pub fn balance(&self, address: &Address) -> Option<u64> {
        self.state.read().expect("chain state lock poisoned").balance(address)
    }

    /// Credits `address` with `amount`, creating the account if absent.
    ///
    /// This is a bootstrap hook for seeding genesis balances; it is not
    /// part of block application and bypasses the normal debit/credit
    /// invariants on purpose.
    pub fn seed_account(&self, address: Address, amount: u64) {
        let mut state = self.state.write().expect("chain state lock poisoned");
        let account = state.accounts.entry(address).or_insert_with(Account::new);
        account.balance += amount;
    }

    /// Validates, applies, and indexes `block`. On any failure the whole
    /// block is rejected and no partial state change is observable.
    pub fn add_block(&self, block: Block) -> Result<(), ChainError> {
        let mut state = self.state.write().expect("chain state lock poisoned");

        // 1. AlreadyKnown.
        if state.has_block(block.header.height) {
            return Err(ChainError::AlreadyKnown);
        }

        // 2. HeightTooHigh.
        if block.header.height != state.height() + 1 {
            return Err(ChainError::HeightTooHigh);
        }

        // 3. PrevMismatch.
        let prev_header = state
            .get_header(block.header.height - 1)
            .expect("height check above guarantees the predecessor exists")
            .clone();
        if prev_header.hash() != block.header.prev_block_hash {
            return Err(ChainError::PrevMismatch);
        }

        // 4. Block signature.
        if !block
            .validator
            .verify(&block.header.to_canonical_bytes(), &block.signature)
        {
            return Err(ChainError::BadSignature);
        }

        // 5. Per-transaction signatures.
        for tx in &block.transactions {
            if !tx.verify() {
                return Err(TxError::BadSignature.into());
            }
        }

        // 6. data_hash.
        if hash_transactions(&block.transactions) != block.header.data_hash {
            return Err(ChainError::BadDataHash);
        }

        // Apply against a scratch copy first: a failure partway through a
        // multi-tx block must not leave earlier transactions' mutations (or
        // this transaction's own VM store writes) committed to live state.
        let mut scratch = state.snapshot_mutable();
        apply_transactions(&mut scratch, &block)?;
        state.commit_mutable(scratch);

        state.index_block(block.clone());
        drop(state);

        if let Err(err) = self.store.put(&block) {
            warn!(error = %err, "block persistence hook failed; in-memory state already advanced");
        }

        Ok(())
    }
}

/// Runs the VM, NFT bookkeeping, and native transfers for every transaction
/// in `block`, in order, against `scratch`. `scratch` is a disposable copy
/// of chain state — on error the caller discards it instead of committing,
/// so a failure partway through the block leaves no partial mutation
/// observable in the live `ChainState`.
fn apply_transactions(scratch: &mut MutableSnapshot, block: &Block) -> Result<(), ChainError> {
    for tx in &block.transactions {
        let tx_hash = tx.hash();

        if !tx.data.is_empty() {
            vm::run(&tx.data, &mut scratch.contracts)?;
        }

        match &tx.inner {
            TxInner::None => {}
            TxInner::Collection(payload) => {
                scratch.record_collection(tx_hash, payload.clone());
            }
            TxInner::Mint(payload) => {
                if !scratch.has_collection(&payload.collection) {
                    error!(tx = %tx_hash, "mint references unknown collection");
                    return Err(TxError::UnknownCollection.into());
                }
                scratch.record_mint(tx_hash, payload.clone());
            }
        }

        if tx.value > 0 {
            let from = tx.from_address();
            let to = tx
                .to_address()
                .expect("non-zero value transaction without a recipient should not verify");
            transfer(scratch, &from, &to, tx.value)?;
        }
    }
    Ok(())
}

/// Debits `from` (must already exist and hold sufficient balance) and
/// credits `to` (auto-created if absent).
fn transfer(
    scratch: &mut MutableSnapshot,
    from: &Address,
    to: &Address,
    value: u64,
) -> Result<(), ChainError> {
    {
        let sender = scratch
            .accounts
            .get_mut(from)
            .ok_or(TxError::UnknownAccount)?;
        if sender.balance < value {
            return Err(TxError::InsufficientBalance.into());
        }
        sender.balance -= value;
    }
    let recipient = scratch.accounts.entry(*to).or_insert_with(Account::new);
    recipient.balance += value;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Block as BlockTy, PrivateKey, Transaction};

    fn mint_block(prev: &Header, key: &PrivateKey, txs: Vec<Transaction>, height: u32) -> BlockTy {
        let data_hash = hash_transactions(&txs);
        let header = Header {
            version: 1,
            data_hash,
            prev_block_hash: prev.hash(),
            timestamp: height as i64,
            height,
        };
        let signature = key.sign(&header.to_canonical_bytes());
        BlockTy::new(header, txs, key.public_key(), signature)
    }

    fn genesis(key: &PrivateKey) -> BlockTy {
        let header = Header {
            version: 1,
            data_hash: hash_transactions(&[]),
            prev_block_hash: Hash::ZERO,
            timestamp: 0,
            height: 0,
        };
        let signature = key.sign(&header.to_canonical_bytes());
        BlockTy::new(header, Vec::new(), key.public_key(), signature)
    }

    #[test]
    fn genesis_only_chain_has_height_zero() {
        let key = PrivateKey::generate();
        let chain = Chain::new_chain(genesis(&key));
        assert_eq!(chain.height(), 0);
    }

    #[test]
    fn append_valid_block_advances_height() {
        let key = PrivateKey::generate();
        let g = genesis(&key);
        let g_header = g.header.clone();
        let chain = Chain::new_chain(g);

        let block = mint_block(&g_header, &key, Vec::new(), 1);
        let hash = block.hash();
        chain.add_block(block).expect("valid block should be accepted");

        assert_eq!(chain.height(), 1);
        assert!(chain.get_block_by_hash(&hash).is_some());
    }

    #[test]
    fn reject_wrong_prev_hash() {
        let key = PrivateKey::generate();
        let g = genesis(&key);
        let chain = Chain::new_chain(g);

        let bogus_prev = Header {
            version: 1,
            data_hash: Hash::ZERO,
            prev_block_hash: Hash::ZERO,
            timestamp: 0,
            height: 0,
        };
        let block = mint_block(&bogus_prev, &key, Vec::new(), 1);
        let err = chain.add_block(block).unwrap_err();
        assert!(matches!(err, ChainError::PrevMismatch));
    }

    #[test]
    fn value_transfer_success() {
        let key = PrivateKey::generate();
        let g = genesis(&key);
        let g_header = g.header.clone();
        let chain = Chain::new_chain(g);

        let bob = PrivateKey::generate();
        let alice = PrivateKey::generate();
        chain.seed_account(Address::from_public_key(&bob.public_key()), 100);

        let mut tx = Transaction::new(
            TxInner::None,
            vec![],
            bob.public_key(),
            Some(alice.public_key()),
            100,
            1,
        );
        tx.sign(&bob);

        let block = mint_block(&g_header, &key, vec![tx], 1);
        chain.add_block(block).expect("transfer block should apply");

        assert_eq!(chain.balance(&Address::from_public_key(&bob.public_key())), Some(0));
        assert_eq!(
            chain.balance(&Address::from_public_key(&alice.public_key())),
            Some(100)
        );
    }

    #[test]
    fn value_transfer_insufficient_balance_rejects_block() {
        let key = PrivateKey::generate();
        let g = genesis(&key);
        let g_header = g.header.clone();
        let chain = Chain::new_chain(g);

        let bob = PrivateKey::generate();
        let alice = PrivateKey::generate();

        let mut tx = Transaction::new(
            TxInner::None,
            vec![],
            bob.public_key(),
            Some(alice.public_key()),
            50,
            1,
        );
        tx.sign(&bob);

        let block = mint_block(&g_header, &key, vec![tx], 1);
        let err = chain.add_block(block).unwrap_err();
        assert!(matches!(err, ChainError::Tx(TxError::UnknownAccount)));
        assert_eq!(chain.height(), 0);
    }

    #[test]
    fn later_tx_failure_does_not_commit_earlier_tx_in_same_block() {
        let key = PrivateKey::generate();
        let g = genesis(&key);
        let g_header = g.header.clone();
        let chain = Chain::new_chain(g);

        let bob = PrivateKey::generate();
        let alice = PrivateKey::generate();
        let carol = PrivateKey::generate();
        chain.seed_account(Address::from_public_key(&bob.public_key()), 100);

        // First tx: a valid transfer that would succeed on its own.
        let mut good_tx = Transaction::new(
            TxInner::None,
            vec![],
            bob.public_key(),
            Some(alice.public_key()),
            100,
            1,
        );
        good_tx.sign(&bob);

        // Second tx: carol has no account, so this must fail.
        let mut bad_tx = Transaction::new(
            TxInner::None,
            vec![],
            carol.public_key(),
            Some(alice.public_key()),
            1,
            1,
        );
        bad_tx.sign(&carol);

        let block = mint_block(&g_header, &key, vec![good_tx, bad_tx], 1);
        let err = chain.add_block(block).unwrap_err();
        assert!(matches!(err, ChainError::Tx(TxError::UnknownAccount)));

        // The whole block was rejected, so bob's earlier, individually-valid
        // transfer must not be observable either.
        assert_eq!(chain.height(), 0);
        assert_eq!(chain.balance(&Address::from_public_key(&bob.public_key())), Some(100));
        assert_eq!(chain.balance(&Address::from_public_key(&alice.public_key())), None);
    }

    #[test]
    fn mint_without_registered_collection_is_rejected() {
        use crate::types::MintPayload;

        let key = PrivateKey::generate();
        let g = genesis(&key);
        let g_header = g.header.clone();
        let chain = Chain::new_chain(g);

        let minter = PrivateKey::generate();
        let mut tx = Transaction::new(
            TxInner::Mint(MintPayload {
                collection: Hash::sha256(b"never-registered"),
                metadata: vec![],
            }),
            vec![],
            minter.public_key(),
            None,
            0,
            1,
        );
        tx.sign(&minter);

        let block = mint_block(&g_header, &key, vec![tx], 1);
        let err = chain.add_block(block).unwrap_err();
        assert!(matches!(err, ChainError::Tx(TxError::UnknownCollection)));
    }

    #[test]
    fn already_known_height_is_rejected() {
        let key = PrivateKey::generate();
        let g = genesis(&key);
        let g_header = g.header.clone();
        let chain = Chain::new_chain(g);

        let block = mint_block(&g_header, &key, Vec::new(), 1);
        chain.add_block(block.clone()).unwrap();
        let err = chain.add_block(block).unwrap_err();
        assert!(matches!(err, ChainError::AlreadyKnown));
    }
}
