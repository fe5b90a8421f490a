//! TCP transport.
//!
//! Frames are a 4-byte big-endian length followed by the body, at most
//! [`MAX_FRAME`] bytes. The first frame each side sends is a hello holding
//! its own address. Inbound connections are keyed by the remote hello,
//! outbound ones by the address that was dialed.
//!
//! Every connection runs two tasks: a writer draining an unbounded queue and
//! a reader forwarding frames to the shared inbound channel. A connection is
//! gone once its reader stops; the reader removes it from the table (unless
//! it was already replaced or closed) and announces the disconnect.

use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context};
use bytes::Bytes;
use dashmap::DashMap;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc};

use crate::transport::{Dialer, Transport, TransportEvent};

/// Maximum frame body. Large enough for a `list` reply over a registry of
/// thousands of parameter-heavy peers.
pub const MAX_FRAME: usize = 64 * 1024 * 1024;

const HELLO_TIMEOUT: Duration = Duration::from_secs(5);
const EVENT_CAPACITY: usize = 256;

/// One frame received from a connected peer.
#[derive(Debug, Clone)]
pub struct Inbound {
    pub from: String,
    pub data: Bytes,
}

struct Connection {
    id: u64,
    tx: mpsc::UnboundedSender<Bytes>,
}

struct Shared {
    address: String,
    connections: DashMap<String, Connection>,
    next_id: AtomicU64,
    events: broadcast::Sender<TransportEvent>,
    inbound: mpsc::UnboundedSender<Inbound>,
}

#[derive(Clone)]
pub struct TcpTransport {
    shared: Arc<Shared>,
}

impl TcpTransport {
    /// Create a transport announcing itself as `address`. Frames from every
    /// connection arrive on the returned receiver.
    pub fn new(address: impl Into<String>) -> (Self, mpsc::UnboundedReceiver<Inbound>) {
        let (inbound, rx) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let shared = Arc::new(Shared {
            address: address.into(),
            connections: DashMap::new(),
            next_id: AtomicU64::new(1),
            events,
            inbound,
        });
        (Self { shared }, rx)
    }

    /// Accept connections on `listener` until `shutdown` fires.
    pub async fn serve(self, listener: TcpListener, mut shutdown: broadcast::Receiver<()>) {
        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    tracing::info!("transport listener shutting down");
                    return;
                }
                result = listener.accept() => {
                    let (stream, peer) = match result {
                        Ok(r) => r,
                        Err(e) => {
                            tracing::warn!(error = %e, "accept failed");
                            continue;
                        }
                    };
                    let this = self.clone();
                    tokio::spawn(async move {
                        if let Err(e) = this.accept(stream).await {
                            tracing::debug!(%peer, error = %e, "inbound handshake failed");
                        }
                    });
                }
            }
        }
    }

    async fn accept(&self, mut stream: TcpStream) -> anyhow::Result<()> {
        let hello = tokio::time::timeout(HELLO_TIMEOUT, read_frame(&mut stream))
            .await
            .context("hello timed out")??;
        let remote = String::from_utf8(hello.to_vec()).context("hello is not UTF-8")?;
        write_frame(&mut stream, self.shared.address.as_bytes()).await?;
        self.attach(remote, stream);
        Ok(())
    }

    async fn dial(&self, address: &str) -> anyhow::Result<()> {
        let mut stream = TcpStream::connect(address)
            .await
            .with_context(|| format!("connect to {address}"))?;
        write_frame(&mut stream, self.shared.address.as_bytes()).await?;
        let hello = tokio::time::timeout(HELLO_TIMEOUT, read_frame(&mut stream))
            .await
            .context("hello timed out")??;
        tracing::debug!(
            address,
            remote = %String::from_utf8_lossy(&hello),
            "outbound connection established"
        );
        self.attach(address.to_string(), stream);
        Ok(())
    }

    fn attach(&self, key: String, stream: TcpStream) {
        let _ = stream.set_nodelay(true);
        let (mut rd, mut wr) = stream.into_split();
        let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, mut rx) = mpsc::unbounded_channel::<Bytes>();

        if self
            .shared
            .connections
            .insert(key.clone(), Connection { id, tx })
            .is_some()
        {
            tracing::debug!(address = %key, "replaced existing connection");
        }
        tracing::info!(address = %key, "peer connected");
        let _ = self.shared.events.send(TransportEvent::Connected(key.clone()));

        tokio::spawn(async move {
            while let Some(data) = rx.recv().await {
                if let Err(e) = write_frame(&mut wr, &data).await {
                    tracing::debug!(error = %e, "write failed");
                    break;
                }
            }
        });

        let shared = Arc::clone(&self.shared);
        tokio::spawn(async move {
            loop {
                match read_frame(&mut rd).await {
                    Ok(data) => {
                        let _ = shared.inbound.send(Inbound {
                            from: key.clone(),
                            data,
                        });
                    }
                    Err(e) => {
                        tracing::trace!(address = %key, error = %e, "reader stopped");
                        break;
                    }
                }
            }
            if shared.connections.remove_if(&key, |_, c| c.id == id).is_some() {
                tracing::info!(address = %key, "peer disconnected");
                let _ = shared.events.send(TransportEvent::Disconnected(key));
            }
        });
    }

    /// Drop the connection to `address`. Returns false if there was none.
    pub fn close(&self, address: &str) -> bool {
        match self.shared.connections.remove(address) {
            Some(_) => {
                tracing::info!(address, "connection closed");
                let _ = self
                    .shared
                    .events
                    .send(TransportEvent::Disconnected(address.to_string()));
                true
            }
            None => false,
        }
    }

    /// Addresses of all established connections.
    pub fn peers(&self) -> Vec<String> {
        self.shared
            .connections
            .iter()
            .map(|e| e.key().clone())
            .collect()
    }
}

impl Transport for TcpTransport {
    fn address(&self) -> &str {
        &self.shared.address
    }

    fn is_connected(&self, address: &str) -> bool {
        self.shared.connections.contains_key(address)
    }

    fn num_peers(&self) -> usize {
        self.shared.connections.len()
    }

    fn send_to(&self, address: &str, data: Bytes) -> anyhow::Result<()> {
        // Checked here so an oversized frame fails the send, not the
        // connection's writer.
        if data.len() > MAX_FRAME {
            bail!("frame of {} bytes exceeds {MAX_FRAME}", data.len());
        }
        let conn = self
            .shared
            .connections
            .get(address)
            .ok_or_else(|| anyhow!("{address} is not connected"))?;
        conn.tx
            .send(data)
            .map_err(|_| anyhow!("connection to {address} is closing"))
    }

    fn subscribe(&self) -> broadcast::Receiver<TransportEvent> {
        self.shared.events.subscribe()
    }
}

impl Dialer for TcpTransport {
    async fn connect_to(&self, address: &str) -> anyhow::Result<()> {
        self.dial(address).await
    }
}

// ── Framing ───────────────────────────────────────────────────────────────────

async fn write_frame<W: AsyncWrite + Unpin>(w: &mut W, data: &[u8]) -> io::Result<()> {
    if data.len() > MAX_FRAME {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("frame of {} bytes exceeds {MAX_FRAME}", data.len()),
        ));
    }
    w.write_all(&(data.len() as u32).to_be_bytes()).await?;
    w.write_all(data).await?;
    w.flush().await
}

async fn read_frame<R: AsyncRead + Unpin>(r: &mut R) -> io::Result<Bytes> {
    let mut len_buf = [0u8; 4];
    r.read_exact(&mut len_buf).await?;
    let len = u32::from_be_bytes(len_buf) as usize;
    if len > MAX_FRAME {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("frame of {len} bytes exceeds {MAX_FRAME}"),
        ));
    }
    let mut buf = vec![0u8; len];
    r.read_exact(&mut buf).await?;
    Ok(Bytes::from(buf))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
