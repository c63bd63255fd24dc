//! The peer node: the transport-agnostic event loop, gossip broadcast,
//! handshake, chain synchronization, and the validator's block-sealing
//! timer.
//!
//! A [`Node`] owns the [`Chain`], the [`Mempool`], and a shared handle to
//! whatever [`Transport`] it was constructed with. All chain/mempool/KV
//! mutation happens on the single task that runs [`Node::run`]; the
//! validator timer and the broadcaster are the only other tasks that
//! touch node state, and they do so only by sending messages back into
//! that task's channels or by calling read-mostly, internally-synchronized
//! methods on `Chain`/`Mempool`.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::sync::mpsc;

use crate::config::NodeConfig;
use crate::consensus::{Chain, ChainError, ValidationError};
use crate::mempool::Mempool;
use crate::metrics::MetricsRegistry;
use crate::rpc::{Payload, RpcError, Status, SyncBlocksRequest};
use crate::storage::Storage;
use crate::transport::{PeerAddr, Transport, TransportError};
use crate::types::Block;

const BROADCAST_CHANNEL_CAPACITY: usize = 1024;

#[derive(Debug)]
pub enum NodeError {
    Transport(TransportError),
    Rpc(RpcError),
    Chain(ChainError),
}

impl std::fmt::Display for NodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeError::Transport(e) => write!(f, "transport error: {e}"),
            NodeError::Rpc(e) => write!(f, "rpc error: {e}"),
            NodeError::Chain(e) => write!(f, "chain error: {e}"),
        }
    }
}

impl std::error::Error for NodeError {}

impl From<TransportError> for NodeError {
    fn from(e: TransportError) -> Self {
        NodeError::Transport(e)
    }
}

impl From<RpcError> for NodeError {
    fn from(e: RpcError) -> Self {
        NodeError::Rpc(e)
    }
}

impl From<ChainError> for NodeError {
    fn from(e: ChainError) -> Self {
        NodeError::Chain(e)
    }
}

/// A peer node. Construct with [`Node::new`], then drive it with
/// [`Node::run`] on a multi-threaded Tokio runtime.
pub struct Node {
    id: String,
    config: NodeConfig,
    chain: Arc<Chain>,
    mempool: Arc<Mempool>,
    transport: Arc<dyn Transport>,
    metrics: Option<Arc<MetricsRegistry>>,
    broadcast_tx: mpsc::Sender<Vec<u8>>,
    broadcast_rx: parking_lot::Mutex<Option<mpsc::Receiver<Vec<u8>>>>,
    quit_tx: mpsc::Sender<()>,
    quit_rx: parking_lot::Mutex<Option<mpsc::Receiver<()>>>,
}

impl Node {
    /// Builds a node from `config`. The node is a validator iff
    /// `config.private_key.is_some()`.
    pub fn new(
        config: NodeConfig,
        transport: Arc<dyn Transport>,
        storage: Box<dyn Storage>,
        metrics: Option<Arc<MetricsRegistry>>,
    ) -> Arc<Self> {
        let (broadcast_tx, broadcast_rx) = mpsc::channel(BROADCAST_CHANNEL_CAPACITY);
        let (quit_tx, quit_rx) = mpsc::channel(1);
        let id = config.listen_addr.clone();
        let mempool_capacity = config.mempool_capacity;

        Arc::new(Node {
            id,
            config,
            chain: Arc::new(Chain::new(storage, metrics.clone())),
            mempool: Arc::new(Mempool::new(mempool_capacity)),
            transport,
            metrics,
            broadcast_tx,
            broadcast_rx: parking_lot::Mutex::new(Some(broadcast_rx)),
            quit_tx,
            quit_rx: parking_lot::Mutex::new(Some(quit_rx)),
        })
    }

    pub fn chain(&self) -> &Arc<Chain> {
        &self.chain
    }

    pub fn mempool(&self) -> &Arc<Mempool> {
        &self.mempool
    }

    pub fn is_validator(&self) -> bool {
        self.config.is_validator()
    }

    /// A sender that, when sent to, terminates [`Node::run`]'s main loop
    /// at the next iteration.
    pub fn quit_handle(&self) -> mpsc::Sender<()> {
        self.quit_tx.clone()
    }

    /// Starts the transport, the validator timer (if this node holds a
    /// private key), and the broadcaster task, dials every seed node, then
    /// runs the main event loop until a quit signal arrives or the inbound
    /// channel closes.
    pub async fn run(self: Arc<Self>) -> Result<(), NodeError> {
        self.transport.start().await?;

        let mut inbound = self
            .transport
            .take_inbound()
            .expect("Node::run must be called exactly once per transport");
        let mut added_peers = self
            .transport
            .take_added_peers()
            .expect("Node::run must be called exactly once per transport");
        let mut quit_rx = self
            .quit_rx
            .lock()
            .take()
            .expect("Node::run must be called exactly once");
        let broadcast_rx = self
            .broadcast_rx
            .lock()
            .take()
            .expect("Node::run must be called exactly once");

        tokio::spawn(broadcaster_loop(self.transport.clone(), broadcast_rx));

        if self.is_validator() {
            tokio::spawn(validator_loop(self.clone()));
        }

        for addr in self.config.seed_nodes.clone() {
            if let Err(e) = self.transport.connect(addr.clone()).await {
                tracing::warn!(server_id = %self.id, seed = %addr, error = %e, "failed to dial seed node");
            }
        }

        loop {
            tokio::select! {
                maybe_rpc = inbound.recv() => {
                    let Some(rpc) = maybe_rpc else {
                        tracing::info!(server_id = %self.id, "inbound channel closed, shutting down");
                        break;
                    };
                    match Payload::decode(&rpc.envelope) {
                        Ok(payload) => self.dispatch(rpc.from, payload).await,
                        Err(e) => tracing::warn!(server_id = %self.id, peer = %rpc.from, error = %e, "failed to decode RPC envelope"),
                    }
                }
                maybe_peer = added_peers.recv() => {
                    let Some(peer) = maybe_peer else { continue };
                    if let Err(e) = self.send_status_request(&peer.addr).await {
                        tracing::warn!(server_id = %self.id, peer = %peer.addr, error = %e, "failed to send status request");
                    }
                }
                _ = quit_rx.recv() => {
                    tracing::info!(server_id = %self.id, "quit signal received");
                    break;
                }
            }
        }

        Ok(())
    }

    async fn dispatch(&self, from: PeerAddr, payload: Payload) {
        match payload {
            Payload::Transaction(tx) => self.receive_transaction(from, tx).await,
            Payload::Block(block) => self.receive_block(from, block).await,
            Payload::StatusRequest => {
                if let Err(e) = self.send_status(&from).await {
                    tracing::warn!(server_id = %self.id, peer = %from, error = %e, "failed to reply with status");
                }
            }
            Payload::Status(status) => self.receive_status(from, status).await,
            Payload::SyncBlocksRequest(req) => self.receive_sync_request(from, req).await,
            Payload::MissingBlocks(blocks) => self.receive_missing_blocks(from, blocks).await,
        }
    }

    async fn receive_transaction(&self, from: PeerAddr, tx: crate::types::Transaction) {
        let hash = tx.hash();
        if self.mempool.contains(&hash) {
            return;
        }
        if !tx.verify() {
            tracing::warn!(server_id = %self.id, peer = %from, "dropping transaction with invalid signature");
            return;
        }

        let envelope = Payload::Transaction(tx.clone()).encode();
        let _ = self.broadcast_tx.send(envelope).await;

        self.mempool.add(tx);
        if let Some(metrics) = &self.metrics {
            metrics.chain.mempool_size.set(self.mempool.all_count() as i64);
        }
    }

    async fn receive_block(&self, from: PeerAddr, block: Block) {
        match self.chain.add_block(block.clone()) {
            Ok(()) => {
                if let Some(metrics) = &self.metrics {
                    metrics.chain.blocks_admitted_total.inc();
                }
                let envelope = Payload::Block(block).encode();
                let _ = self.broadcast_tx.send(envelope).await;
            }
            Err(ChainError::Validation(ValidationError::BlockAlreadyExists(height))) => {
                tracing::debug!(server_id = %self.id, peer = %from, height, "block already exists, ignoring");
            }
            Err(e) => {
                tracing::warn!(server_id = %self.id, peer = %from, error = %e, "rejected block");
                if let Some(metrics) = &self.metrics {
                    metrics.chain.blocks_rejected_total.inc();
                }
            }
        }
    }

    async fn send_status_request(&self, to: &PeerAddr) -> Result<(), NodeError> {
        let envelope = Payload::StatusRequest.encode();
        self.transport.send(to, envelope).await?;
        Ok(())
    }

    async fn send_status(&self, to: &PeerAddr) -> Result<(), NodeError> {
        let status = Status {
            id: self.id.clone(),
            version: 1,
            height: self.chain.height(),
        };
        let envelope = Payload::Status(status).encode();
        self.transport.send(to, envelope).await?;
        Ok(())
    }

    async fn receive_status(&self, from: PeerAddr, status: Status) {
        if status.height <= self.chain.height() {
            return;
        }
        let req = SyncBlocksRequest {
            from_height: self.chain.height(),
            to_height: 0,
        };
        let envelope = Payload::SyncBlocksRequest(req).encode();
        if let Err(e) = self.transport.send(&from, envelope).await {
            tracing::warn!(server_id = %self.id, peer = %from, error = %e, "failed to send sync blocks request");
        }
    }

    async fn receive_sync_request(&self, from: PeerAddr, req: SyncBlocksRequest) {
        let from_height = req.from_height.max(1);
        let to_height = if req.to_height != 0 { req.to_height } else { self.chain.height() };

        let mut blocks = Vec::new();
        for height in from_height..=to_height {
            match self.chain.get_block(height) {
                Some(block) => blocks.push(block),
                None => {
                    tracing::warn!(server_id = %self.id, peer = %from, height, "missing requested block height");
                    break;
                }
            }
        }

        let envelope = Payload::MissingBlocks(blocks).encode();
        if let Err(e) = self.transport.send(&from, envelope).await {
            tracing::warn!(server_id = %self.id, peer = %from, error = %e, "failed to send missing blocks");
        }
    }

    async fn receive_missing_blocks(&self, from: PeerAddr, blocks: Vec<Block>) {
        for block in blocks {
            let height = block.header.height;
            match self.chain.add_block(block) {
                Ok(()) => {
                    if let Some(metrics) = &self.metrics {
                        metrics.chain.blocks_admitted_total.inc();
                    }
                }
                Err(ChainError::Validation(ValidationError::BlockAlreadyExists(_))) => {}
                Err(e) => {
                    tracing::warn!(server_id = %self.id, peer = %from, height, error = %e, "failed to apply synced block");
                    break;
                }
            }
        }
    }

    /// Seals a new block from the validator's pending mempool view and
    /// applies it to the chain. Only meaningful on a validator node.
    async fn seal_block(&self) -> Result<(), NodeError> {
        let key = self
            .config
            .private_key
            .as_ref()
            .expect("seal_block is only ever called from the validator loop");

        let consensus = &self.config.consensus;
        let txs = self.mempool.take_pending(consensus.max_block_txs);
        if txs.is_empty() && !consensus.allow_empty_blocks {
            return Ok(());
        }

        let tip = self.chain.tip_header();
        let mut block = Block::new(tip.hash(), tip.height + 1, now_ns(), txs);
        block.sign(key);

        self.chain.add_block(block.clone())?;

        if let Some(metrics) = &self.metrics {
            metrics.chain.blocks_admitted_total.inc();
            metrics.chain.mempool_size.set(self.mempool.all_count() as i64);
        }

        let envelope = Payload::Block(block).encode();
        let _ = self.broadcast_tx.send(envelope).await;
        Ok(())
    }
}

async fn validator_loop(node: Arc<Node>) {
    let mut interval = tokio::time::interval(node.config.block_time);
    // The first tick fires immediately; consume it so the first real
    // block is sealed after one full `block_time`, matching the
    // original design's `time.Tick`-driven loop.
    interval.tick().await;
    loop {
        interval.tick().await;
        if let Err(e) = node.seal_block().await {
            tracing::warn!(server_id = %node.id, error = %e, "validator failed to seal block");
        }
    }
}

/// Drains broadcast requests and fans them out over the transport. Using
/// a bounded channel means a burst of inbound gossip back-pressures the
/// producer instead of spawning an unbounded number of broadcast tasks.
async fn broadcaster_loop(transport: Arc<dyn Transport>, mut rx: mpsc::Receiver<Vec<u8>>) {
    while let Some(bytes) = rx.recv().await {
        if let Err(e) = transport.broadcast(bytes).await {
            tracing::warn!(error = %e, "broadcast failed");
        }
    }
}

fn now_ns() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_nanos() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::PrivateKey;
    use crate::storage::NullStorage;
    use crate::transport::memory::{MemoryNetwork, MemoryTransport};
    use crate::types::{Transaction, TxInner};

    fn node(config: NodeConfig, transport: Arc<dyn Transport>) -> Arc<Node> {
        Node::new(config, transport, Box::new(NullStorage), None)
    }

    #[tokio::test]
    async fn status_request_is_answered_with_current_height() {
        let network = MemoryNetwork::new();
        let transport_a: Arc<dyn Transport> = Arc::new(MemoryTransport::new("a".into(), network.clone()));
        let node_a = node(NodeConfig { listen_addr: "a".into(), ..Default::default() }, transport_a.clone());

        let transport_b = MemoryTransport::new("b".into(), network.clone());
        let mut b_inbound = transport_b.take_inbound().unwrap();

        let handle = tokio::spawn(node_a.clone().run());

        transport_b.send(&"a".to_string(), Payload::StatusRequest.encode()).await.unwrap();
        let received = b_inbound.recv().await.unwrap();
        let payload = Payload::decode(&received.envelope).unwrap();
        match payload {
            Payload::Status(status) => assert_eq!(status.height, 0),
            other => panic!("expected Status, got {other:?}"),
        }

        node_a.quit_handle().send(()).await.unwrap();
        let _ = handle.await;
    }

    #[tokio::test]
    async fn valid_transaction_is_added_to_mempool_and_rebroadcast() {
        let network = MemoryNetwork::new();
        let transport_a: Arc<dyn Transport> = Arc::new(MemoryTransport::new("a".into(), network.clone()));
        let node_a = node(NodeConfig { listen_addr: "a".into(), ..Default::default() }, transport_a.clone());

        let transport_b = MemoryTransport::new("b".into(), network.clone());
        let mut b_inbound = transport_b.take_inbound().unwrap();

        let handle = tokio::spawn(node_a.clone().run());

        let from = PrivateKey::generate();
        let to = PrivateKey::generate();
        let mut tx = Transaction {
            data: Vec::new(),
            from: None,
            to: Some(to.public_key()),
            value: None,
            inner: TxInner::None,
            nonce: 7,
            signature: None,
        };
        tx.sign(&from);

        transport_b
            .send(&"a".to_string(), Payload::Transaction(tx.clone()).encode())
            .await
            .unwrap();

        let received = b_inbound.recv().await.unwrap();
        match Payload::decode(&received.envelope).unwrap() {
            Payload::Transaction(rebroadcast) => assert_eq!(rebroadcast.hash(), tx.hash()),
            other => panic!("expected rebroadcast Transaction, got {other:?}"),
        }

        node_a.quit_handle().send(()).await.unwrap();
        let _ = handle.await;
    }
}
