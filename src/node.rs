//! Mesh Node Daemon
//!
//! Ties the connectivity controller to TCP. A [`Node`] owns a listener, a
//! generated identity, and the shared controller; each accepted or dialed
//! connection runs one task that races a read loop against a write loop.
//!
//! All controller access goes through one lock, and every critical section
//! is synchronous and bounded. The per-link pending callback is a
//! non-blocking send onto a capacity-1 signal channel: wakeups coalesce,
//! and the writer drains everything owed on each wakeup. Updates are only
//! marked delivered after the frame is written, so an update on a torn-down
//! connection stays owed and is re-offered once the tree reroutes.

use crate::identity::NodeId;
use crate::propagation::{Connectivity, ConnectivityError};
use crate::wire::{FrameReader, FrameWriter, WireError};
use parking_lot::Mutex;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Errors related to daemon startup.
#[derive(Debug, Error)]
pub enum NodeError {
    #[error("failed to bind {addr}: {source}")]
    Bind { addr: String, source: io::Error },

    #[error("failed to dial {addr}: {source}")]
    Dial { addr: String, source: io::Error },
}

/// Errors that tear down a single connection.
#[derive(Debug, Error)]
enum ConnectionError {
    #[error(transparent)]
    Wire(#[from] WireError),

    #[error(transparent)]
    Link(#[from] ConnectivityError),
}

impl ConnectionError {
    /// A remote hanging up cleanly is expected churn, not a failure worth
    /// a warning.
    fn is_disconnect(&self) -> bool {
        matches!(
            self,
            ConnectionError::Wire(WireError::Io(e))
                if e.kind() == io::ErrorKind::UnexpectedEof
        )
    }
}

/// A running mesh node: listener plus shared connectivity controller.
pub struct Node {
    id: NodeId,
    listener: TcpListener,
    connectivity: Arc<Mutex<Connectivity>>,
}

impl Node {
    /// Bind the listener and create the node with a fresh random identity.
    pub async fn bind(addr: &str) -> Result<Self, NodeError> {
        let listener = TcpListener::bind(addr).await.map_err(|source| NodeError::Bind {
            addr: addr.to_string(),
            source,
        })?;

        let id = NodeId::generate();
        Ok(Self {
            connectivity: Arc::new(Mutex::new(Connectivity::new(id.clone()))),
            id,
            listener,
        })
    }

    /// This node's id.
    pub fn id(&self) -> &NodeId {
        &self.id
    }

    /// The bound listener address.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Dial a peer and hand the connection to its own task.
    pub async fn dial(&self, addr: &str) -> Result<(), NodeError> {
        let stream = TcpStream::connect(addr).await.map_err(|source| NodeError::Dial {
            addr: addr.to_string(),
            source,
        })?;

        debug!(addr = %addr, "dialed peer");
        spawn_connection(self.id.clone(), self.connectivity.clone(), stream);
        Ok(())
    }

    /// Accept connections until the listener fails.
    pub async fn run(self) {
        loop {
            match self.listener.accept().await {
                Ok((stream, peer_addr)) => {
                    debug!(%peer_addr, "accepted connection");
                    spawn_connection(self.id.clone(), self.connectivity.clone(), stream);
                }
                Err(e) => {
                    warn!(error = %e, "accept failed, listener stopping");
                    return;
                }
            }
        }
    }
}

fn spawn_connection(us: NodeId, connectivity: Arc<Mutex<Connectivity>>, stream: TcpStream) {
    tokio::spawn(async move {
        match handle_connection(us, connectivity, stream).await {
            Ok(()) => {}
            Err(e) if e.is_disconnect() => debug!("connection closed by peer"),
            Err(e) => warn!(error = %e, "connection failed"),
        }
    });
}

async fn handle_connection(
    us: NodeId,
    connectivity: Arc<Mutex<Connectivity>>,
    stream: TcpStream,
) -> Result<(), ConnectionError> {
    let (read_half, write_half) = stream.into_split();
    let mut reader = FrameReader::new(read_half);
    let mut writer = FrameWriter::new(write_half);

    // Handshake: each side sends its id first.
    writer.write_handshake(&us).await?;
    let them = reader.read_handshake().await?;

    let (signal_tx, signal_rx) = mpsc::channel::<()>(1);
    {
        let mut c = connectivity.lock();
        c.link(them.clone())?;
        c.set_pending_fn(
            &them,
            Box::new(move || {
                // Coalescing wakeup: a full slot means one is already due.
                let _ = signal_tx.try_send(());
            }),
        );
    }
    info!(peer = %them, "link established");

    // Race the two directions; the first to fail (or EOF) wins and the
    // losing future is dropped along with any in-flight write.
    let result = tokio::select! {
        r = read_loop(&connectivity, &them, &mut reader) => r,
        r = write_loop(&connectivity, &them, &mut writer, signal_rx) => r,
    };

    connectivity.lock().close(&them);
    info!(peer = %them, "link closed");
    result
}

async fn read_loop(
    connectivity: &Mutex<Connectivity>,
    them: &NodeId,
    reader: &mut FrameReader<OwnedReadHalf>,
) -> Result<(), ConnectionError> {
    loop {
        let updates = reader.read_updates().await?;

        let mut c = connectivity.lock();
        c.incoming(them, updates);
        debug!(peer = %them, state = ?c.dump(), "applied incoming updates");
    }
}

async fn write_loop(
    connectivity: &Mutex<Connectivity>,
    them: &NodeId,
    writer: &mut FrameWriter<OwnedWriteHalf>,
    mut signal_rx: mpsc::Receiver<()>,
) -> Result<(), ConnectionError> {
    loop {
        if signal_rx.recv().await.is_none() {
            // Sender dropped: the link is gone.
            return Ok(());
        }

        // Drain everything owed. Updates arriving after the snapshot
        // re-signal the channel, so nothing is lost to the race.
        loop {
            let updates = connectivity.lock().outgoing(them);
            if updates.is_empty() {
                break;
            }

            writer.write_updates(&updates).await?;
            connectivity.lock().delivered(them, &updates);
            debug!(peer = %them, count = updates.len(), "delivered updates");
        }
    }
}
