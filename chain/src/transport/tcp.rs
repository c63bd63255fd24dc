//! TCP transport: an accept loop plus one read/write task pair per peer.
//!
//! Every RPC envelope sent over the wire is prefixed with a 4-byte
//! big-endian length so a peer can tell where one envelope ends and the
//! next begins. The original design this replaces read fixed 1 KiB
//! chunks straight into the RPC channel with no framing at all, silently
//! truncating anything bigger than the read buffer.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::mpsc;

use super::{InboundRpc, Peer, PeerAddr, Transport, TransportError};

const CHANNEL_CAPACITY: usize = 1024;
/// Reads are still done in small chunks, as the original design called
/// for; length framing means a message spanning multiple reads is
/// reassembled rather than truncated.
const READ_CHUNK: usize = 1024;
const MAX_FRAME_LEN: u32 = 16 * 1024 * 1024;

/// State shared between the transport handle and its spawned accept/read
/// tasks. Held behind an `Arc` so `start()` can hand a clone to a
/// `'static` background task without requiring `Transport::start` to take
/// `self: Arc<Self>`.
struct Shared {
    inbound_tx: mpsc::Sender<InboundRpc>,
    added_peers_tx: mpsc::Sender<Peer>,
    peers: RwLock<HashMap<PeerAddr, mpsc::Sender<Vec<u8>>>>,
}

impl Shared {
    fn register(self: &Arc<Self>, addr: PeerAddr, stream: TcpStream, incoming: bool) {
        let (read_half, write_half) = stream.into_split();
        let (write_tx, write_rx) = mpsc::channel::<Vec<u8>>(CHANNEL_CAPACITY);
        self.peers.write().insert(addr.clone(), write_tx);

        tokio::spawn(write_loop(write_half, write_rx));
        tokio::spawn(read_loop(self.clone(), addr.clone(), read_half));

        let added_peers_tx = self.added_peers_tx.clone();
        tokio::spawn(async move {
            let _ = added_peers_tx.send(Peer { addr, incoming }).await;
        });
    }

    /// Drops a peer's write-half sender, matching the resource lifecycle
    /// rule that a read error retires the peer entry rather than leaving
    /// a stale sender broadcasts keep trying to write to.
    fn remove_peer(&self, addr: &PeerAddr) {
        self.peers.write().remove(addr);
    }
}

pub struct TcpTransport {
    addr: PeerAddr,
    shared: Arc<Shared>,
    inbound_rx: Mutex<Option<mpsc::Receiver<InboundRpc>>>,
    added_peers_rx: Mutex<Option<mpsc::Receiver<Peer>>>,
}

impl TcpTransport {
    pub fn new(addr: PeerAddr) -> Self {
        let (inbound_tx, inbound_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (added_peers_tx, added_peers_rx) = mpsc::channel(CHANNEL_CAPACITY);
        TcpTransport {
            addr,
            shared: Arc::new(Shared {
                inbound_tx,
                added_peers_tx,
                peers: RwLock::new(HashMap::new()),
            }),
            inbound_rx: Mutex::new(Some(inbound_rx)),
            added_peers_rx: Mutex::new(Some(added_peers_rx)),
        }
    }
}

async fn read_loop(shared: Arc<Shared>, peer_addr: PeerAddr, mut reader: OwnedReadHalf) {
    loop {
        match read_frame(&mut reader).await {
            Ok(Some(envelope)) => {
                let rpc = InboundRpc {
                    from: peer_addr.clone(),
                    envelope,
                };
                if shared.inbound_tx.send(rpc).await.is_err() {
                    break;
                }
            }
            Ok(None) => {
                tracing::debug!(peer = %peer_addr, "peer closed connection");
                break;
            }
            Err(e) => {
                tracing::warn!(peer = %peer_addr, error = %e, "read error, dropping peer");
                break;
            }
        }
    }
    shared.remove_peer(&peer_addr);
}

async fn write_loop(mut writer: OwnedWriteHalf, mut rx: mpsc::Receiver<Vec<u8>>) {
    while let Some(bytes) = rx.recv().await {
        if let Err(e) = write_frame(&mut writer, &bytes).await {
            tracing::warn!(error = %e, "write error, closing peer writer");
            return;
        }
    }
}

async fn write_frame(writer: &mut OwnedWriteHalf, bytes: &[u8]) -> std::io::Result<()> {
    let len = bytes.len() as u32;
    writer.write_all(&len.to_be_bytes()).await?;
    writer.write_all(bytes).await?;
    writer.flush().await
}

/// Reads one length-prefixed frame. Returns `Ok(None)` on a clean EOF
/// before any bytes of a new frame have arrived.
async fn read_frame(reader: &mut OwnedReadHalf) -> std::io::Result<Option<Vec<u8>>> {
    let mut len_buf = [0u8; 4];
    if !read_exact_or_eof(reader, &mut len_buf).await? {
        return Ok(None);
    }
    let len = u32::from_be_bytes(len_buf);
    if len > MAX_FRAME_LEN {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("frame length {len} exceeds maximum {MAX_FRAME_LEN}"),
        ));
    }

    let mut body = vec![0u8; len as usize];
    let mut filled = 0usize;
    while filled < body.len() {
        let to_read = (body.len() - filled).min(READ_CHUNK);
        let n = reader.read(&mut body[filled..filled + to_read]).await?;
        if n == 0 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "connection closed mid-frame",
            ));
        }
        filled += n;
    }
    Ok(Some(body))
}

/// Like `read_exact`, but returns `Ok(false)` instead of erroring when
/// EOF is hit before any byte of `buf` has been filled.
async fn read_exact_or_eof(reader: &mut OwnedReadHalf, buf: &mut [u8]) -> std::io::Result<bool> {
    let mut filled = 0usize;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            if filled == 0 {
                return Ok(false);
            }
            return Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "connection closed mid-frame-length",
            ));
        }
        filled += n;
    }
    Ok(true)
}

async fn accept_loop(listener: TcpListener, shared: Arc<Shared>) {
    loop {
        match listener.accept().await {
            Ok((stream, remote)) => {
                let peer_addr = remote.to_string();
                tracing::info!(peer = %peer_addr, "new incoming TCP connection");
                shared.register(peer_addr, stream, true);
            }
            Err(e) => {
                tracing::warn!(error = %e, "accept error");
            }
        }
    }
}

#[async_trait]
impl Transport for TcpTransport {
    fn addr(&self) -> PeerAddr {
        self.addr.clone()
    }

    async fn start(&self) -> Result<(), TransportError> {
        let listener = TcpListener::bind(&self.addr)
            .await
            .map_err(|e| TransportError::Bind(e.to_string()))?;
        tracing::info!(addr = %self.addr, "TCP transport listening");
        tokio::spawn(accept_loop(listener, self.shared.clone()));
        Ok(())
    }

    async fn connect(&self, addr: PeerAddr) -> Result<(), TransportError> {
        let stream = TcpStream::connect(&addr)
            .await
            .map_err(|e| TransportError::Io(e.to_string()))?;
        self.shared.register(addr, stream, false);
        Ok(())
    }

    fn take_inbound(&self) -> Option<mpsc::Receiver<InboundRpc>> {
        self.inbound_rx.lock().take()
    }

    fn take_added_peers(&self) -> Option<mpsc::Receiver<Peer>> {
        self.added_peers_rx.lock().take()
    }

    async fn send(&self, to: &PeerAddr, bytes: Vec<u8>) -> Result<(), TransportError> {
        let sender = self.shared.peers.read().get(to).cloned();
        let sender = sender.ok_or_else(|| TransportError::PeerNotFound(to.clone()))?;
        sender
            .send(bytes)
            .await
            .map_err(|e| TransportError::Io(e.to_string()))
    }

    async fn broadcast(&self, bytes: Vec<u8>) -> Result<(), TransportError> {
        let senders: Vec<_> = self.shared.peers.read().values().cloned().collect();
        for sender in senders {
            let _ = sender.send(bytes.clone()).await;
        }
        Ok(())
    }
}
