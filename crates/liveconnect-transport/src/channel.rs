//! NUL-framed duplex channel
//!
//! Each message is its ASCII body followed by a single `0x00`. The bridge listens on a
//! loopback port, accepts exactly one peer, and keeps that stream for the session.

use liveconnect_core::BridgeError;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};

const TERMINATOR: u8 = 0;

/// Errors raised by the framed channel
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("short write: expected {expected} bytes, wrote {written}")]
    ShortWrite { expected: usize, written: usize },

    #[error("stream closed mid-message after {0} bytes")]
    Truncated(usize),

    #[error("message body contains a NUL byte at offset {0}")]
    EmbeddedTerminator(usize),
}

impl From<TransportError> for BridgeError {
    fn from(err: TransportError) -> Self {
        BridgeError::Transport(err.to_string())
    }
}

/// Reads NUL-terminated messages
pub struct FrameReader<R> {
    inner: BufReader<R>,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            inner: BufReader::new(reader),
        }
    }

    /// Read one message body
    ///
    /// Returns `Ok(None)` when the peer closed the stream between messages. Partial
    /// reads are reassembled until the terminator arrives.
    pub async fn read_message(&mut self) -> Result<Option<Vec<u8>>, TransportError> {
        let mut frame = Vec::new();
        let read = self.inner.read_until(TERMINATOR, &mut frame).await?;
        if read == 0 {
            return Ok(None);
        }
        if frame.last() != Some(&TERMINATOR) {
            return Err(TransportError::Truncated(frame.len()));
        }
        frame.pop();
        tracing::trace!(bytes = frame.len(), "frame received");
        Ok(Some(frame))
    }
}

/// Writes NUL-terminated messages
pub struct FrameWriter<W> {
    inner: W,
}

impl<W: AsyncWrite + Unpin> FrameWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { inner: writer }
    }

    /// Write `body` plus the terminator, then flush
    ///
    /// The total byte count written must equal the frame length exactly.
    pub async fn write_message(&mut self, body: &[u8]) -> Result<(), TransportError> {
        if let Some(offset) = body.iter().position(|b| *b == TERMINATOR) {
            return Err(TransportError::EmbeddedTerminator(offset));
        }
        let mut frame = Vec::with_capacity(body.len() + 1);
        frame.extend_from_slice(body);
        frame.push(TERMINATOR);

        let mut written = 0;
        while written < frame.len() {
            let n = self.inner.write(&frame[written..]).await?;
            if n == 0 {
                break;
            }
            written += n;
        }
        if written != frame.len() {
            return Err(TransportError::ShortWrite {
                expected: frame.len(),
                written,
            });
        }
        self.inner.flush().await?;
        tracing::trace!(bytes = body.len(), "frame sent");
        Ok(())
    }

    /// Shut down the write direction
    pub async fn shutdown(&mut self) -> Result<(), TransportError> {
        self.inner.shutdown().await?;
        Ok(())
    }
}

/// Listening endpoint that hands out a single connection
pub struct TransportListener {
    listener: TcpListener,
}

impl TransportListener {
    /// Bind the listening endpoint (`127.0.0.1:50007` in the default configuration)
    pub async fn bind(address: &str) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(address).await?;
        tracing::debug!(address, "listening for counterpart");
        Ok(Self { listener })
    }

    pub fn local_addr(&self) -> Result<std::net::SocketAddr, TransportError> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept the one peer; the listener is consumed
    pub async fn accept(self) -> Result<TransportChannel<OwnedReadHalf, OwnedWriteHalf>, TransportError> {
        let (stream, peer) = self.listener.accept().await?;
        tracing::info!(%peer, "counterpart connected");
        Ok(TransportChannel::from_stream(stream))
    }
}

/// The active duplex stream
pub struct TransportChannel<R, W> {
    reader: FrameReader<R>,
    writer: FrameWriter<W>,
}

impl TransportChannel<OwnedReadHalf, OwnedWriteHalf> {
    /// Connect to a listening bridge (the counterpart's role)
    pub async fn connect(address: &str) -> Result<Self, TransportError> {
        let stream = TcpStream::connect(address).await?;
        Ok(Self::from_stream(stream))
    }

    fn from_stream(stream: TcpStream) -> Self {
        // Messages are small and latency-bound.
        let _ = stream.set_nodelay(true);
        let (read_half, write_half) = stream.into_split();
        Self::new(read_half, write_half)
    }
}

impl<R: AsyncRead + Unpin, W: AsyncWrite + Unpin> TransportChannel<R, W> {
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            reader: FrameReader::new(reader),
            writer: FrameWriter::new(writer),
        }
    }

    pub async fn read_message(&mut self) -> Result<Option<Vec<u8>>, TransportError> {
        self.reader.read_message().await
    }

    pub async fn write_message(&mut self, body: &[u8]) -> Result<(), TransportError> {
        self.writer.write_message(body).await
    }

    /// Separate the halves so reading and writing can run on different tasks
    pub fn into_split(self) -> (FrameReader<R>, FrameWriter<W>) {
        (self.reader, self.writer)
    }
}
