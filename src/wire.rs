//! Wire Format
//!
//! Framed little-endian binary codec for the connectivity protocol. Every
//! logical message ends with a one-byte trailer: both sides keep a counter
//! that starts at 1 and advances with zero-skipping after each message, and
//! the receiver verifies the trailer against its own counter. A mismatch
//! means the streams desynchronized and the connection is torn down.
//!
//! ## Messages
//!
//! | Message | Layout |
//! |---|---|
//! | Handshake (first from each side) | node id |
//! | Updates | `count:4` then `count` updates |
//!
//! One update is `node id`, `version:8`, `count:4`, then `count` node ids;
//! a node id is `len:2` followed by `len` raw bytes. All integers are
//! little-endian.

use crate::identity::NodeId;
use crate::propagation::Update;
use std::io;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader, BufWriter};

/// An update in the connectivity topic: the advertised state is the
/// advertising node's sorted link set.
pub type ConnectivityUpdate = Update<Vec<NodeId>>;

/// Errors related to framing and message decoding.
#[derive(Debug, Error)]
pub enum WireError {
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    #[error("framing counter mismatch: expected 0x{expected:02x}, got 0x{got:02x}")]
    TrailerMismatch { expected: u8, got: u8 },
}

/// Advance a framing counter, skipping zero: zeros are too common on the
/// wire and too easily misinterpreted.
fn step(counter: &mut u8) {
    let c = *counter as u16 + 1;
    *counter = (c + (c >> 8)) as u8;
}

fn put_node_id(buf: &mut Vec<u8>, id: &NodeId) {
    let bytes = id.as_bytes();
    debug_assert!(bytes.len() <= u16::MAX as usize);
    buf.extend_from_slice(&(bytes.len() as u16).to_le_bytes());
    buf.extend_from_slice(bytes);
}

fn put_updates(buf: &mut Vec<u8>, updates: &[ConnectivityUpdate]) {
    buf.extend_from_slice(&(updates.len() as u32).to_le_bytes());
    for u in updates {
        put_node_id(buf, &u.node);
        buf.extend_from_slice(&u.version.to_le_bytes());
        buf.extend_from_slice(&(u.state.len() as u32).to_le_bytes());
        for id in &u.state {
            put_node_id(buf, id);
        }
    }
}

/// Message writer for one connection. Buffers each message and flushes it
/// together with its trailer byte.
pub struct FrameWriter<W> {
    inner: BufWriter<W>,
    trailer: u8,
}

impl<W: AsyncWrite + Unpin> FrameWriter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            inner: BufWriter::new(writer),
            trailer: 1,
        }
    }

    /// Write the handshake message: our node id.
    pub async fn write_handshake(&mut self, id: &NodeId) -> Result<(), WireError> {
        let mut buf = Vec::new();
        put_node_id(&mut buf, id);
        self.end_message(buf).await
    }

    /// Write a connectivity-updates message.
    pub async fn write_updates(&mut self, updates: &[ConnectivityUpdate]) -> Result<(), WireError> {
        let mut buf = Vec::new();
        put_updates(&mut buf, updates);
        self.end_message(buf).await
    }

    async fn end_message(&mut self, mut buf: Vec<u8>) -> Result<(), WireError> {
        buf.push(self.trailer);
        step(&mut self.trailer);
        self.inner.write_all(&buf).await?;
        self.inner.flush().await?;
        Ok(())
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        self.inner.into_inner()
    }
}

/// Message reader for one connection, verifying the trailer of each
/// message against its own counter.
pub struct FrameReader<R> {
    inner: BufReader<R>,
    counter: u8,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            inner: BufReader::new(reader),
            counter: 1,
        }
    }

    /// Read the handshake message: the peer's node id.
    pub async fn read_handshake(&mut self) -> Result<NodeId, WireError> {
        let id = self.read_node_id().await?;
        self.end_message().await?;
        Ok(id)
    }

    /// Read a connectivity-updates message.
    pub async fn read_updates(&mut self) -> Result<Vec<ConnectivityUpdate>, WireError> {
        let count = self.inner.read_u32_le().await?;
        let mut updates = Vec::new();
        for _ in 0..count {
            let node = self.read_node_id().await?;
            let version = self.inner.read_u64_le().await?;
            let state_count = self.inner.read_u32_le().await?;
            let mut state = Vec::new();
            for _ in 0..state_count {
                state.push(self.read_node_id().await?);
            }
            updates.push(Update {
                node,
                version,
                state,
            });
        }
        self.end_message().await?;
        Ok(updates)
    }

    async fn read_node_id(&mut self) -> Result<NodeId, WireError> {
        let len = self.inner.read_u16_le().await? as usize;
        let mut bytes = vec![0u8; len];
        self.inner.read_exact(&mut bytes).await?;
        Ok(NodeId::from_bytes(&bytes))
    }

    async fn end_message(&mut self) -> Result<(), WireError> {
        let got = self.inner.read_u8().await?;
        if got != self.counter {
            return Err(WireError::TrailerMismatch {
                expected: self.counter,
                got,
            });
        }
        step(&mut self.counter);
        Ok(())
    }
}
