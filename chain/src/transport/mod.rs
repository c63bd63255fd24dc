//! Transport-agnostic peer connectivity.
//!
//! The node only depends on this trait; [`memory::MemoryTransport`] backs
//! the test suite and [`tcp::TcpTransport`] is the real network
//! implementation. Both move raw RPC envelope bytes — encoding lives in
//! [`crate::rpc`].

pub mod memory;
pub mod tcp;

use async_trait::async_trait;
use tokio::sync::mpsc;

pub type PeerAddr = String;

/// An inbound RPC envelope plus the peer address it arrived from.
#[derive(Debug)]
pub struct InboundRpc {
    pub from: PeerAddr,
    pub envelope: Vec<u8>,
}

#[derive(Debug)]
pub struct Peer {
    pub addr: PeerAddr,
    pub incoming: bool,
}

#[async_trait]
pub trait Transport: Send + Sync {
    fn addr(&self) -> PeerAddr;

    /// Starts listening for inbound connections.
    async fn start(&self) -> Result<(), TransportError>;

    /// Dials `addr` and registers it as an outbound peer.
    async fn connect(&self, addr: PeerAddr) -> Result<(), TransportError>;

    /// Takes ownership of the inbound RPC receiver. Callable exactly once;
    /// subsequent calls return `None`.
    fn take_inbound(&self) -> Option<mpsc::Receiver<InboundRpc>>;

    /// Takes ownership of the added-peer receiver. Callable exactly once.
    fn take_added_peers(&self) -> Option<mpsc::Receiver<Peer>>;

    async fn send(&self, to: &PeerAddr, bytes: Vec<u8>) -> Result<(), TransportError>;

    async fn broadcast(&self, bytes: Vec<u8>) -> Result<(), TransportError>;
}

#[derive(Debug)]
pub enum TransportError {
    PeerNotFound(PeerAddr),
    Io(String),
    Bind(String),
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportError::PeerNotFound(addr) => write!(f, "no such peer: {addr}"),
            TransportError::Io(msg) => write!(f, "transport I/O error: {msg}"),
            TransportError::Bind(msg) => write!(f, "failed to bind listener: {msg}"),
        }
    }
}

impl std::error::Error for TransportError {}
