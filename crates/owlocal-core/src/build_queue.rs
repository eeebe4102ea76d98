//! Single-in-flight build queue with coalescing.
//!
//! The file-watch pipeline fires on every change; rebuilding once per event
//! would pile up. The queue runs at most one build at a time, keeps at most
//! one follow-up pending, and drops everything else: any number of requests
//! arriving during a build collapse into a single rebuild afterwards.
//!
//! The dispatch engine never calls this; builds are the watch pipeline's
//! job. It only assumes entry-point paths reflect latest-built output.

use std::future::Future;
use tokio::sync::mpsc;

pub struct BuildQueue {
    tx: mpsc::Sender<()>,
}

impl BuildQueue {
    /// Spawn the worker task. `build` runs once per accepted request.
    pub fn spawn<F, Fut>(build: F) -> Self
    where
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        // Capacity 1: one build in flight inside the worker, one pending in
        // the channel, everything beyond that coalesces.
        let (tx, mut rx) = mpsc::channel(1);
        tokio::spawn(async move {
            while rx.recv().await.is_some() {
                build().await;
            }
        });
        Self { tx }
    }

    /// Request a rebuild. Never blocks; a request arriving while one is
    /// already pending is coalesced into it.
    pub fn request(&self) {
        let _ = self.tx.try_send(());
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
