//! 🚰 Conduit: a one-slot pipe between the async decompressor and the blocking parser.
//!
//! 🎬 *[two tasks stand on opposite sides of a very narrow bridge]*
//! *["After you," says the inflater. "No, after you," says the parser. Neither can cross
//! until the other steps off. This is called backpressure, and it is working as intended.]*
//!
//! The writer half lives in tokio-land and `await`s. The reader half is a plain
//! [`std::io::Read`] so the `csv` crate can chew on it from a blocking thread.
//! `async-channel` speaks both dialects, which is the whole trick.
//!
//! 🧠 Contract:
//! - The channel holds one chunk. A second `write` waits until the reader took the first.
//! - `fail(reason)` makes the reader's next read return an `io::Error` with that reason.
//!   Sticky: every read after that fails the same way.
//! - Writer dropped without failing: reader sees EOF once the last chunk is drained.
//! - Reader dropped: the writer's next `write` errors, so the producer can stop.

use std::io::{self, Read};

use anyhow::{Result, anyhow};
use async_channel::{Receiver, Sender};

/// 📦 What travels through the pipe: bytes, or the bad news.
#[derive(Debug)]
enum Frame {
    Bytes(Vec<u8>),
    Failed(String),
}

/// ✍️ The async end. Owned by whoever produces the bytes.
#[derive(Debug)]
pub(crate) struct ConduitWriter {
    tx: Sender<Frame>,
}

/// 📖 The blocking end. Hand it to anything that wants an `io::Read`.
#[derive(Debug)]
pub(crate) struct ConduitReader {
    rx: Receiver<Frame>,
    current: Vec<u8>,
    position: usize,
    failure: Option<String>,
}

/// 🔧 Build a fresh writer/reader pair.
pub(crate) fn conduit() -> (ConduitWriter, ConduitReader) {
    let (tx, rx) = async_channel::bounded(1);
    (
        ConduitWriter { tx },
        ConduitReader {
            rx,
            current: Vec::new(),
            position: 0,
            failure: None,
        },
    )
}

impl ConduitWriter {
    /// ✍️ Push a chunk. Waits while the previous chunk is still unread.
    /// Empty chunks are skipped; the reader would mistake them for EOF.
    pub(crate) async fn write(&self, chunk: Vec<u8>) -> Result<()> {
        if chunk.is_empty() {
            return Ok(());
        }
        self.tx
            .send(Frame::Bytes(chunk))
            .await
            .map_err(|_| anyhow!("💀 conduit reader hung up, nobody left to read the decompressed bytes"))
    }

    /// 💀 Tell the reader the stream went bad. Best effort: if the reader is already
    /// gone, there is nobody to tell, and that's fine.
    pub(crate) async fn fail(self, reason: String) {
        let _ = self.tx.send(Frame::Failed(reason)).await;
    }
}

impl Read for ConduitReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        loop {
            if let Some(reason) = &self.failure {
                return Err(io::Error::other(reason.clone()));
            }

            if self.position < self.current.len() {
                let the_remaining = &self.current[self.position..];
                let n = the_remaining.len().min(buf.len());
                buf[..n].copy_from_slice(&the_remaining[..n]);
                self.position += n;
                return Ok(n);
            }

            match self.rx.recv_blocking() {
                Ok(Frame::Bytes(chunk)) => {
                    self.current = chunk;
                    self.position = 0;
                }
                Ok(Frame::Failed(reason)) => {
                    self.failure = Some(reason);
                }
                // 🏁 writer dropped, channel drained: EOF
                Err(_) => return Ok(0),
            }
        }
    }
}
