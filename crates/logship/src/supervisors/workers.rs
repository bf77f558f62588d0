//! 🧵 Workers: the ones who actually do the work while the Supervisor takes all the
//! credit in the sprint retro.
//!
//! Two kinds per object pipeline:
//! - [`InflateWorker`]: pulls gzip off the wire and pushes plain bytes into the conduit.
//! - [`BatchWorker`]: drains parsed entries, packs them into batches, ships them.
//!
//! The parser between them is not a worker. It blocks, so it lives on the blocking pool
//! and the pipeline awaits it directly. 🦆

use anyhow::Result;
use tokio::task::JoinHandle;

mod batch_worker;
mod inflate_worker;

pub(crate) use batch_worker::BatchWorker;
pub(crate) use inflate_worker::InflateWorker;

/// 🏗️ A background worker, that does work. duh.
///
/// "What's the DEAL with lifetime annotations? You borrow something,
///  you give it back. It's not that hard, Jerry!" (Seinfeld, on Rust)
pub(crate) trait Worker {
    /// 🚀 Start the worker. Returns a JoinHandle because we trust
    /// but verify. Mostly verify.
    fn start(self) -> JoinHandle<Result<()>>;
}
