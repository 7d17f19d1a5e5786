//! Line-delimited JSON transport over a pair of byte streams.

use std::io;
use std::marker::PhantomData;

use bytes::{Buf, BytesMut};
use futures_util::{SinkExt, StreamExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio_util::codec::{Decoder, FramedRead, FramedWrite, LinesCodec};

use crate::ipc::message::{BroadcastMessage, WorkerMessage};

/// Longest accepted frame. Longer lines are skipped.
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum IpcError {
    #[error("IPC frame longer than {limit} bytes")]
    Oversized { limit: usize },
    #[error("IPC payload error: {0}")]
    Payload(#[from] serde_json::Error),
    #[error("IPC link closed")]
    Closed,
}

/// One newline-terminated chunk of the stream, newline removed.
#[derive(Debug, PartialEq)]
enum Frame {
    Line(BytesMut),
    Oversized,
}

/// Splits a byte stream on `\n` without interpreting the bytes.
///
/// Only I/O errors end the stream; content problems surface per frame so
/// one bad line never takes the link down.
#[derive(Debug)]
struct LineFrames {
    max_len: usize,
    /// Bytes already searched for a newline.
    scanned: usize,
    /// Inside an over-long line, dropping until its newline.
    discarding: bool,
}

impl LineFrames {
    fn new(max_len: usize) -> Self {
        Self {
            max_len,
            scanned: 0,
            discarding: false,
        }
    }
}

impl Decoder for LineFrames {
    type Item = Frame;
    type Error = io::Error;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Frame>, io::Error> {
        let newline = buf[self.scanned..]
            .iter()
            .position(|b| *b == b'\n')
            .map(|offset| self.scanned + offset);

        match newline {
            Some(at) => {
                self.scanned = 0;
                if self.discarding || at > self.max_len {
                    self.discarding = false;
                    buf.advance(at + 1);
                    return Ok(Some(Frame::Oversized));
                }
                let mut line = buf.split_to(at + 1);
                line.truncate(at);
                Ok(Some(Frame::Line(line)))
            }
            None if self.discarding || buf.len() > self.max_len => {
                self.discarding = true;
                self.scanned = 0;
                buf.clear();
                Ok(None)
            }
            None => {
                self.scanned = buf.len();
                Ok(None)
            }
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Frame>, io::Error> {
        if let Some(frame) = self.decode(buf)? {
            return Ok(Some(frame));
        }
        self.scanned = 0;
        if std::mem::take(&mut self.discarding) {
            return Ok(Some(Frame::Oversized));
        }
        if buf.is_empty() {
            return Ok(None);
        }
        Ok(Some(Frame::Line(buf.split())))
    }
}

/// Reads typed frames from one end of the link.
pub struct IpcReader<R, M> {
    frames: FramedRead<R, LineFrames>,
    _message: PhantomData<fn() -> M>,
}

impl<R, M> IpcReader<R, M>
where
    R: AsyncRead + Unpin,
    M: DeserializeOwned,
{
    pub fn new(reader: R) -> Self {
        Self {
            frames: FramedRead::new(reader, LineFrames::new(MAX_FRAME_LEN)),
            _message: PhantomData,
        }
    }

    /// Next frame; `None` once the peer closed the stream.
    ///
    /// A malformed frame yields `Some(Err(_))` and the reader stays usable.
    pub async fn recv(&mut self) -> Option<Result<M, IpcError>> {
        loop {
            let line = match self.frames.next().await? {
                Ok(Frame::Line(line)) => line,
                Ok(Frame::Oversized) => {
                    return Some(Err(IpcError::Oversized {
                        limit: MAX_FRAME_LEN,
                    }))
                }
                Err(e) => {
                    tracing::debug!(error = %e, "IPC stream failed");
                    return None;
                }
            };
            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            return Some(serde_json::from_slice(&line).map_err(IpcError::from));
        }
    }
}

/// Spawn a task that writes every queued message as one line.
///
/// The task ends when every sender is dropped or the stream fails.
pub fn spawn_writer<W, M>(writer: W) -> mpsc::UnboundedSender<M>
where
    W: AsyncWrite + Unpin + Send + 'static,
    M: Serialize + Send + 'static,
{
    let (tx, mut rx) = mpsc::unbounded_channel::<M>();
    tokio::spawn(async move {
        let mut frames = FramedWrite::new(writer, LinesCodec::new());
        while let Some(message) = rx.recv().await {
            let line = match serde_json::to_string(&message) {
                Ok(line) => line,
                Err(e) => {
                    tracing::error!(error = %e, "Failed to encode IPC frame");
                    continue;
                }
            };
            if let Err(e) = frames.send(line).await {
                tracing::debug!(error = %e, "IPC writer stopped");
                break;
            }
        }
    });
    tx
}

/// Handle a worker uses to publish broadcasts through the primary.
#[derive(Debug, Clone)]
pub struct Broadcaster {
    outbox: Option<mpsc::UnboundedSender<WorkerMessage>>,
}

impl Broadcaster {
    pub fn new(outbox: mpsc::UnboundedSender<WorkerMessage>) -> Self {
        Self {
            outbox: Some(outbox),
        }
    }

    /// A broadcaster with no primary behind it; every send fails.
    pub fn detached() -> Self {
        Self { outbox: None }
    }

    /// Ask the primary to deliver `message` to every live worker.
    pub fn broadcast(&self, message: BroadcastMessage) -> Result<(), IpcError> {
        let outbox = self.outbox.as_ref().ok_or(IpcError::Closed)?;
        outbox
            .send(WorkerMessage::Broadcast {
                payload: message.into_payload(),
            })
            .map_err(|_| IpcError::Closed)
    }
}
