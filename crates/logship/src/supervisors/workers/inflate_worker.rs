//! 🫁 InflateWorker: breathes compressed air in, breathes plain bytes out.
//!
//! Reads the object body in small chunks, feeds each into a multi-member gzip decoder,
//! and hands whatever came out to the conduit. The conduit holds one chunk, so the worker
//! naturally stalls whenever the parser falls behind. Nothing ever holds the whole object.
//!
//! 💀 Failure modes, and where they go:
//! - Body read fails, or the gzip is garbage: the reason goes down the conduit so the
//!   parser stops with an error instead of mistaking it for a clean end of file.
//! - The parser hung up (it hit a bad line, say): the next conduit write fails and we
//!   leave. The body and decoder drop with the task on every path.

use std::io::Write;

use anyhow::{Context, Result};
use flate2::write::MultiGzDecoder;
use tokio::io::AsyncReadExt;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use super::Worker;
use crate::backends::ObjectBody;
use crate::common::ObjectRef;
use crate::conduit::ConduitWriter;

// -- 8 KiB of compressed input per read
const READ_CHUNK_BYTES: usize = 8 * 1024;

pub(crate) struct InflateWorker {
    object: ObjectRef,
    body: ObjectBody,
    writer: ConduitWriter,
}

impl std::fmt::Debug for InflateWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // -- the body is a boxed trait object with no Debug to speak of
        f.debug_struct("InflateWorker")
            .field("object", &self.object)
            .field("writer", &self.writer)
            .finish()
    }
}

impl InflateWorker {
    pub(crate) fn new(object: ObjectRef, body: ObjectBody, writer: ConduitWriter) -> Self {
        Self { object, body, writer }
    }
}

impl Worker for InflateWorker {
    fn start(self) -> JoinHandle<Result<()>> {
        tokio::spawn(async move {
            let InflateWorker {
                object,
                mut body,
                writer,
            } = self;
            debug!("🫁 InflateWorker started on {}", object);

            match inflate_into(&mut body, &writer).await {
                Ok(the_bytes_out) => {
                    debug!("🏁 InflateWorker finished {}: {} decompressed bytes", object, the_bytes_out);
                    Ok(())
                }
                Err(err) => {
                    // -- tell the parser before we go, so it stops instead of seeing a tidy EOF
                    writer.fail(format!("{err:#}")).await;
                    Err(err).with_context(|| format!("decompression of {} stopped early", object))
                }
            }
        })
    }
}

/// 🔄 The actual loop. Returns how many decompressed bytes were handed over.
async fn inflate_into(body: &mut ObjectBody, writer: &ConduitWriter) -> Result<u64> {
    let mut the_decoder = MultiGzDecoder::new(Vec::new());
    let mut the_chunk = vec![0u8; READ_CHUNK_BYTES];
    let mut bytes_out: u64 = 0;

    loop {
        let n = body
            .read(&mut the_chunk)
            .await
            .context("💀 failed reading the compressed object body")?;
        if n == 0 {
            break;
        }
        the_decoder
            .write_all(&the_chunk[..n])
            .context("💀 gzip decompression failed")?;

        let the_plain = std::mem::take(the_decoder.get_mut());
        bytes_out += the_plain.len() as u64;
        trace!("🫁 inflated {} compressed bytes into {} plain bytes", n, the_plain.len());
        writer.write(the_plain).await?;
    }

    the_decoder
        .try_finish()
        .context("💀 gzip stream ended before the decoder was satisfied")?;
    let the_tail = std::mem::take(the_decoder.get_mut());
    bytes_out += the_tail.len() as u64;
    writer.write(the_tail).await?;

    Ok(bytes_out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conduit::conduit;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::io::{Cursor, Read};

    fn gzip(bytes: &[u8]) -> Vec<u8> {
        let mut the_encoder = GzEncoder::new(Vec::new(), Compression::default());
        the_encoder.write_all(bytes).expect("💀 writing to a Vec cannot fail");
        the_encoder.finish().expect("💀 finishing a Vec encoder cannot fail")
    }

    async fn drain(mut reader: crate::conduit::ConduitReader) -> std::io::Result<Vec<u8>> {
        tokio::task::spawn_blocking(move || {
            let mut out = Vec::new();
            reader.read_to_end(&mut out).map(|_| out)
        })
        .await
        .expect("💀 the blocking reader panicked")
    }

    #[tokio::test]
    async fn the_one_where_gzip_goes_in_and_plain_text_comes_out() {
        // -- bigger than one read chunk, so the loop actually loops
        let the_plain: Vec<u8> = (0..50_000u32).flat_map(|i| format!("line {i}\n").into_bytes()).collect();
        let (writer, reader) = conduit();
        let the_worker = InflateWorker::new(
            ObjectRef::new("logs", "a.gz"),
            Box::new(Cursor::new(gzip(&the_plain))),
            writer,
        );

        let the_handle = the_worker.start();
        let the_out = drain(reader).await.expect("💀 a clean stream should read clean");
        the_handle
            .await
            .expect("💀 worker panicked")
            .expect("💀 worker should succeed");
        assert_eq!(the_out, the_plain);
    }

    #[tokio::test]
    async fn the_one_where_two_gzip_members_are_one_happy_stream() {
        let mut the_body = gzip(b"first member\n");
        the_body.extend(gzip(b"second member\n"));
        let (writer, reader) = conduit();
        let the_handle = InflateWorker::new(ObjectRef::new("logs", "multi.gz"), Box::new(Cursor::new(the_body)), writer).start();

        let the_out = drain(reader).await.expect("💀 multi-member gzip is legal gzip");
        the_handle
            .await
            .expect("💀 worker panicked")
            .expect("💀 worker should succeed");
        assert_eq!(the_out, b"first member\nsecond member\n");
    }

    #[tokio::test]
    async fn the_one_where_garbage_is_not_gzip_and_the_reader_hears_about_it() {
        let (writer, reader) = conduit();
        let the_handle = InflateWorker::new(
            ObjectRef::new("logs", "bad.gz"),
            Box::new(Cursor::new(b"this was never gzip, not even a little".to_vec())),
            writer,
        )
        .start();

        assert!(drain(reader).await.is_err(), "the reader should see the failure, not EOF");
        assert!(the_handle.await.expect("💀 worker panicked").is_err());
    }

    #[tokio::test]
    async fn the_one_where_the_reader_leaves_early_and_the_worker_does_not_hang() {
        let the_plain: Vec<u8> = vec![b'x'; 1_000_000];
        let (writer, reader) = conduit();
        drop(reader);
        let the_handle = InflateWorker::new(ObjectRef::new("logs", "big.gz"), Box::new(Cursor::new(gzip(&the_plain))), writer).start();

        let the_result = tokio::time::timeout(std::time::Duration::from_secs(5), the_handle)
            .await
            .expect("💀 the worker should notice nobody is listening")
            .expect("💀 worker panicked");
        assert!(the_result.is_err());
    }
}
