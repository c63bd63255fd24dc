//! In-process transport for tests: peers are routed through a shared
//! [`MemoryNetwork`] registry rather than real sockets.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;

use super::{InboundRpc, Peer, PeerAddr, Transport, TransportError};

const CHANNEL_CAPACITY: usize = 1024;

/// Shared routing table every [`MemoryTransport`] in a test registers
/// with, so that sending "over the wire" is just a channel send.
pub struct MemoryNetwork {
    peers: RwLock<HashMap<PeerAddr, mpsc::Sender<InboundRpc>>>,
}

impl MemoryNetwork {
    pub fn new() -> Arc<Self> {
        Arc::new(MemoryNetwork {
            peers: RwLock::new(HashMap::new()),
        })
    }

    fn register(&self, addr: PeerAddr, tx: mpsc::Sender<InboundRpc>) {
        self.peers.write().insert(addr, tx);
    }
}

pub struct MemoryTransport {
    addr: PeerAddr,
    network: Arc<MemoryNetwork>,
    inbound_rx: Mutex<Option<mpsc::Receiver<InboundRpc>>>,
    added_peers_tx: mpsc::Sender<Peer>,
    added_peers_rx: Mutex<Option<mpsc::Receiver<Peer>>>,
}

impl MemoryTransport {
    pub fn new(addr: PeerAddr, network: Arc<MemoryNetwork>) -> Self {
        let (inbound_tx, inbound_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (added_peers_tx, added_peers_rx) = mpsc::channel(CHANNEL_CAPACITY);
        network.register(addr.clone(), inbound_tx);
        MemoryTransport {
            addr,
            network,
            inbound_rx: Mutex::new(Some(inbound_rx)),
            added_peers_tx,
            added_peers_rx: Mutex::new(Some(added_peers_rx)),
        }
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    fn addr(&self) -> PeerAddr {
        self.addr.clone()
    }

    async fn start(&self) -> Result<(), TransportError> {
        Ok(())
    }

    async fn connect(&self, addr: PeerAddr) -> Result<(), TransportError> {
        self.added_peers_tx
            .send(Peer {
                addr,
                incoming: false,
            })
            .await
            .map_err(|e| TransportError::Io(e.to_string()))
    }

    fn take_inbound(&self) -> Option<mpsc::Receiver<InboundRpc>> {
        self.inbound_rx.lock().take()
    }

    fn take_added_peers(&self) -> Option<mpsc::Receiver<Peer>> {
        self.added_peers_rx.lock().take()
    }

    async fn send(&self, to: &PeerAddr, bytes: Vec<u8>) -> Result<(), TransportError> {
        let sender = {
            let peers = self.network.peers.read();
            peers.get(to).cloned()
        };
        let sender = sender.ok_or_else(|| TransportError::PeerNotFound(to.clone()))?;
        sender
            .send(InboundRpc {
                from: self.addr.clone(),
                envelope: bytes,
            })
            .await
            .map_err(|e| TransportError::Io(e.to_string()))
    }

    async fn broadcast(&self, bytes: Vec<u8>) -> Result<(), TransportError> {
        let targets: Vec<PeerAddr> = {
            let peers = self.network.peers.read();
            peers.keys().filter(|addr| **addr != self.addr).cloned().collect()
        };
        for addr in targets {
            self.send(&addr, bytes.clone()).await?;
        }
        Ok(())
    }
}
