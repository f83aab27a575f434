//! The single cooperative event loop: owns the chain, mempool, and peer
//! set, and multiplexes peer connects, inbound RPCs, locally submitted
//! transactions, and (if configured as a validator) the block-minting
//! timer.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch, Mutex as AsyncMutex, RwLock as AsyncRwLock};
use tracing::{debug, error, info, warn};

use crate::codec::Encode;
use crate::engine::{BlockStore, Chain, NoopBlockStore};
use crate::mempool::Mempool;
use crate::metrics::MetricsRegistry;
use crate::net::message::{BlocksResponse, GetBlocksRequest, Message, Payload, Status};
use crate::net::transport;
use crate::types::block::hash_transactions;
use crate::types::{Header, PrivateKey, Transaction};

/// Configuration the server is constructed with.
///
/// Loading this from a file, CLI, or environment is the process entry
/// point's job, not the server's.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub id: String,
    pub listen_addr: SocketAddr,
    pub seed_addrs: Vec<SocketAddr>,
    pub block_time: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            id: "node".to_string(),
            listen_addr: "0.0.0.0:3000".parse().expect("hard-coded address parses"),
            seed_addrs: Vec::new(),
            block_time: Duration::from_secs(5),
        }
    }
}

/// Lifecycle of a single peer connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerState {
    Connected,
    Negotiating,
    Synced,
    Syncing,
    Removed,
}

struct PeerHandle {
    write: AsyncMutex<OwnedWriteHalf>,
    state: AsyncMutex<PeerState>,
}

type PeerMap = Arc<AsyncRwLock<HashMap<SocketAddr, PeerHandle>>>;

enum RpcEvent {
    Message { from: SocketAddr, message: Message },
    Disconnected { from: SocketAddr },
}

/// Owns chain, mempool, peer set, and the validator loop.
pub struct Server<S: BlockStore = NoopBlockStore> {
    config: ServerConfig,
    chain: Arc<Chain<S>>,
    mempool: Arc<Mempool>,
    peers: PeerMap,
    validator_key: Option<PrivateKey>,
    local_tx_rx: AsyncMutex<Option<mpsc::UnboundedReceiver<Transaction>>>,
    metrics: Option<Arc<MetricsRegistry>>,
}

impl<S: BlockStore + 'static> Server<S> {
    /// Builds a new server and the sender half of its local-transaction
    /// channel, which an external submission endpoint holds and feeds.
    pub fn new(
        config: ServerConfig,
        chain: Arc<Chain<S>>,
        mempool: Arc<Mempool>,
        validator_key: Option<PrivateKey>,
    ) -> (Self, mpsc::UnboundedSender<Transaction>) {
        Self::with_metrics(config, chain, mempool, validator_key, None)
    }

    /// Like [`Server::new`], additionally recording node-level Prometheus
    /// metrics as the event loop runs.
    pub fn with_metrics(
        config: ServerConfig,
        chain: Arc<Chain<S>>,
        mempool: Arc<Mempool>,
        validator_key: Option<PrivateKey>,
        metrics: Option<Arc<MetricsRegistry>>,
    ) -> (Self, mpsc::UnboundedSender<Transaction>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let server = Server {
            config,
            chain,
            mempool,
            peers: Arc::new(AsyncRwLock::new(HashMap::new())),
            validator_key,
            local_tx_rx: AsyncMutex::new(Some(rx)),
            metrics,
        };
        (server, tx)
    }

    fn record_chain_and_mempool_metrics(&self) {
        if let Some(metrics) = &self.metrics {
            metrics.node.chain_height.set(self.chain.height() as i64);
            metrics.node.mempool_size.set(self.mempool.count() as i64);
        }
    }

    /// Runs the event loop until `shutdown` reports `true`. Exits cleanly:
    /// stops accepting new peers, closes peer streams, drains the inbound
    /// channel, then returns.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) -> std::io::Result<()> {
        let mut local_tx_rx = self
            .local_tx_rx
            .lock()
            .await
            .take()
            .expect("Server::run must be called at most once");

        let (new_peer_tx, mut new_peer_rx) = mpsc::unbounded_channel::<(TcpStream, SocketAddr)>();
        let (rpc_tx, mut rpc_rx) = mpsc::unbounded_channel::<RpcEvent>();

        let listener = transport::bind(self.config.listen_addr).await?;
        info!(addr = %self.config.listen_addr, "listening for peers");

        let accept_tx = new_peer_tx.clone();
        let mut accept_shutdown = shutdown.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = accept_shutdown.changed() => {
                        if *accept_shutdown.borrow() {
                            break;
                        }
                    }
                    accepted = listener.accept() => {
                        match accepted {
                            Ok((stream, addr)) => {
                                if accept_tx.send((stream, addr)).is_err() {
                                    break;
                                }
                            }
                            Err(err) => {
                                warn!(error = %err, "failed to accept inbound connection");
                            }
                        }
                    }
                }
            }
        });

        for seed in self.config.seed_addrs.clone() {
            let dial_tx = new_peer_tx.clone();
            tokio::spawn(async move {
                match transport::dial(seed).await {
                    Ok(stream) => {
                        let _ = dial_tx.send((stream, seed));
                    }
                    Err(err) => {
                        warn!(addr = %seed, error = %err, "failed to dial seed peer");
                    }
                }
            });
        }

        let mut validator_ticker = self
            .validator_key
            .is_some()
            .then(|| tokio::time::interval(self.config.block_time));

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
                Some((stream, addr)) = new_peer_rx.recv() => {
                    self.handle_new_peer(stream, addr, rpc_tx.clone()).await;
                }
                Some(tx) = local_tx_rx.recv() => {
                    self.handle_incoming_transaction(tx, None).await;
                }
                Some(event) = rpc_rx.recv() => {
                    self.handle_rpc_event(event).await;
                }
                _ = tick(&mut validator_ticker), if validator_ticker.is_some() => {
                    self.mint_block().await;
                }
            }
        }

        let mut peers = self.peers.write().await;
        for (_, peer) in peers.drain() {
            let _ = peer.write.lock().await.shutdown().await;
        }

        Ok(())
    }

    async fn handle_new_peer(
        &self,
        stream: TcpStream,
        addr: SocketAddr,
        rpc_tx: mpsc::UnboundedSender<RpcEvent>,
    ) {
        let (mut read_half, write_half) = stream.into_split();
        {
            let mut peers = self.peers.write().await;
            peers.insert(
                addr,
                PeerHandle {
                    write: AsyncMutex::new(write_half),
                    state: AsyncMutex::new(PeerState::Connected),
                },
            );
            if let Some(metrics) = &self.metrics {
                metrics.node.peer_count.set(peers.len() as i64);
            }
        }

        tokio::spawn(async move {
            loop {
                match transport::read_message(&mut read_half).await {
                    Ok(Some(message)) => {
                        if rpc_tx.send(RpcEvent::Message { from: addr, message }).is_err() {
                            break;
                        }
                    }
                    Ok(None) => {
                        let _ = rpc_tx.send(RpcEvent::Disconnected { from: addr });
                        break;
                    }
                    Err(err) => {
                        debug!(peer = %addr, error = %err, "peer frame decode error");
                        let _ = rpc_tx.send(RpcEvent::Disconnected { from: addr });
                        break;
                    }
                }
            }
        });

        self.set_peer_state(addr, PeerState::Negotiating).await;
        self.send_to(addr, &Message::get_status()).await;
    }

    async fn handle_rpc_event(&self, event: RpcEvent) {
        match event {
            RpcEvent::Disconnected { from } => {
                let mut peers = self.peers.write().await;
                peers.remove(&from);
                if let Some(metrics) = &self.metrics {
                    metrics.node.peer_count.set(peers.len() as i64);
                }
                debug!(peer = %from, "peer removed");
            }
            RpcEvent::Message { from, message } => {
                let payload = match message.decode_payload() {
                    Ok(payload) => payload,
                    Err(err) => {
                        warn!(peer = %from, error = %err, "malformed frame, dropping peer");
                        self.peers.write().await.remove(&from);
                        return;
                    }
                };

                match payload {
                    Payload::Transaction(tx) => {
                        self.handle_incoming_transaction(tx, Some(from)).await;
                    }
                    Payload::Block(block) => {
                        self.handle_incoming_block(block, from).await;
                    }
                    Payload::GetStatus => {
                        let status = Status {
                            id: self.config.id.clone(),
                            version: 1,
                            current_height: self.chain.height(),
                        };
                        self.send_to(from, &Message::status(&status)).await;
                    }
                    Payload::Status(status) => {
                        self.handle_status(from, status).await;
                    }
                    Payload::GetBlocks(request) => {
                        self.handle_get_blocks(from, request).await;
                    }
                    Payload::Blocks(response) => {
                        self.handle_blocks(response).await;
                    }
                }
            }
        }
    }

    async fn handle_incoming_transaction(&self, tx: Transaction, from: Option<SocketAddr>) {
        let hash = tx.hash();
        if self.mempool.contains(&hash) {
            return;
        }
        if !tx.verify() {
            debug!(tx = %hash, "dropping transaction with invalid signature");
            return;
        }
        let mut tx = tx;
        if tx.first_seen == 0 {
            tx.first_seen = now_unix_nanos();
        }
        self.mempool.add(tx.clone());
        if let Some(metrics) = &self.metrics {
            metrics.node.mempool_size.set(self.mempool.count() as i64);
        }
        self.broadcast_except(&Message::transaction(&tx), from).await;
    }

    async fn handle_incoming_block(&self, block: crate::types::Block, from: SocketAddr) {
        match self.chain.add_block(block.clone()) {
            Ok(()) => {
                self.record_chain_and_mempool_metrics();
                self.broadcast_except(&Message::block(&block), Some(from)).await;
            }
            Err(crate::engine::ChainError::AlreadyKnown) => {}
            Err(err) => {
                if let Some(metrics) = &self.metrics {
                    metrics.node.blocks_rejected.inc();
                }
                error!(error = %err, "rejected inbound block");
            }
        }
    }

    async fn handle_status(&self, from: SocketAddr, status: Status) {
        let local_height = self.chain.height();
        if status.current_height <= local_height {
            self.set_peer_state(from, PeerState::Synced).await;
            return;
        }

        self.set_peer_state(from, PeerState::Syncing).await;
        let chain = self.chain.clone();
        let peers = self.peers.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(3));
            loop {
                interval.tick().await;
                if chain.height() >= status.current_height {
                    break;
                }
                if !peers.read().await.contains_key(&from) {
                    break;
                }
                let request = GetBlocksRequest {
                    from: chain.height() + 1,
                    to: 0,
                };
                send_via(&peers, from, &Message::get_blocks(&request)).await;
            }
        });
    }

    async fn handle_get_blocks(&self, from: SocketAddr, request: GetBlocksRequest) {
        let to = if request.to == 0 {
            self.chain.height()
        } else {
            request.to
        };
        let blocks = (request.from..=to)
            .filter_map(|h| self.chain.get_block(h))
            .collect();
        self.send_to(from, &Message::blocks(&BlocksResponse { blocks })).await;
    }

    async fn handle_blocks(&self, response: BlocksResponse) {
        for block in response.blocks {
            match self.chain.add_block(block) {
                Ok(()) => {}
                Err(crate::engine::ChainError::AlreadyKnown) => {}
                Err(err) => {
                    if let Some(metrics) = &self.metrics {
                        metrics.node.blocks_rejected.inc();
                    }
                    error!(error = %err, "rejected block during sync");
                    break;
                }
            }
        }
        self.record_chain_and_mempool_metrics();
    }

    /// Builds, signs, and applies a new block from the current pending
    /// transactions, then clears the pending view and broadcasts it.
    async fn mint_block(&self) {
        let Some(key) = &self.validator_key else {
            return;
        };

        let head_height = self.chain.height();
        let Some(head_header) = self.chain.get_header(head_height) else {
            error!("validator tick with no head header; this should not happen");
            return;
        };

        let transactions = self.mempool.pending();
        let header = Header {
            version: 1,
            data_hash: hash_transactions(&transactions),
            prev_block_hash: head_header.hash(),
            timestamp: now_unix_nanos(),
            height: head_height + 1,
        };
        let signature = key.sign(&header.to_canonical_bytes());
        let block = crate::types::Block::new(header, transactions, key.public_key(), signature);

        match self.chain.add_block(block.clone()) {
            Ok(()) => {
                self.mempool.clear_pending();
                if let Some(metrics) = &self.metrics {
                    metrics.node.blocks_minted.inc();
                }
                self.record_chain_and_mempool_metrics();
                info!(height = block.header.height, "minted block");
                self.broadcast_except(&Message::block(&block), None).await;
            }
            Err(err) => {
                error!(error = %err, "failed to mint block");
            }
        }
    }

    async fn set_peer_state(&self, addr: SocketAddr, new_state: PeerState) {
        let peers = self.peers.read().await;
        if let Some(peer) = peers.get(&addr) {
            *peer.state.lock().await = new_state;
        }
    }

    async fn send_to(&self, addr: SocketAddr, message: &Message) {
        send_via(&self.peers, addr, message).await;
    }

    /// Sends `message` to every known peer, optionally skipping one address
    /// (the peer a gossiped item was received from).
    async fn broadcast_except(&self, message: &Message, except: Option<SocketAddr>) {
        let peers = self.peers.read().await;
        let bytes = message.to_canonical_bytes();
        for (addr, peer) in peers.iter() {
            if Some(*addr) == except {
                continue;
            }
            if let Err(err) = peer.write.lock().await.write_all(&bytes).await {
                warn!(peer = %addr, error = %err, "broadcast send failed");
            }
        }
    }
}

async fn send_via(peers: &PeerMap, addr: SocketAddr, message: &Message) {
    let peers = peers.read().await;
    if let Some(peer) = peers.get(&addr) {
        let bytes = message.to_canonical_bytes();
        if let Err(err) = peer.write.lock().await.write_all(&bytes).await {
            warn!(peer = %addr, error = %err, "send failed");
        }
    }
}

async fn tick(ticker: &mut Option<tokio::time::Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}

fn now_unix_nanos() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as i64)
        .unwrap_or(0)
}
