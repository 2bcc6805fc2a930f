//! Native execution boundary: a dedicated thread that owns the [`Engine`].
//!
//! The caller and the worker share nothing but two channels. Requests run to
//! completion in arrival order and are never cancelled; a caller that only
//! cares about its latest edit drops older responses with
//! [`WorkerHandle::is_stale`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, JoinHandle};

use ply_vfs::FlatFiles;
use tokio::sync::mpsc;

use crate::engine::Engine;
use crate::protocol::{BundleRequest, BundleResponse, Dialect};

const THREAD_NAME: &str = "ply-bundle-worker";

#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("Failed to start bundle worker: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("Bundle worker is no longer running")]
    Disconnected,

    #[error("Bundle worker panicked")]
    Panicked,
}

/// Caller side of a running worker.
#[derive(Debug)]
pub struct WorkerHandle {
    requests: mpsc::UnboundedSender<BundleRequest>,
    responses: mpsc::UnboundedReceiver<BundleResponse>,
    latest: AtomicU64,
    thread: Option<JoinHandle<()>>,
}

impl WorkerHandle {
    /// Starts a worker thread running `engine`.
    pub fn spawn(engine: Engine) -> Result<Self, WorkerError> {
        let (request_tx, request_rx) = mpsc::unbounded_channel();
        let (response_tx, response_rx) = mpsc::unbounded_channel();

        let thread = thread::Builder::new()
            .name(THREAD_NAME.to_string())
            .spawn(move || run(engine, request_rx, response_tx))?;

        Ok(Self {
            requests: request_tx,
            responses: response_rx,
            latest: AtomicU64::new(0),
            thread: Some(thread),
        })
    }

    /// Queues a snapshot and returns the id its response will carry.
    pub fn post(&self, dialect: Dialect, files: &FlatFiles) -> Result<u64, WorkerError> {
        let id = self.latest.fetch_add(1, Ordering::SeqCst) + 1;
        self.send(BundleRequest::new(dialect, files).with_id(id))?;
        Ok(id)
    }

    /// Queues a prepared request. Its id, if any, counts towards staleness.
    pub fn send(&self, request: BundleRequest) -> Result<(), WorkerError> {
        if let Some(id) = request.id {
            self.latest.fetch_max(id, Ordering::SeqCst);
        }
        self.requests
            .send(request)
            .map_err(|_| WorkerError::Disconnected)
    }

    /// Waits for the next response, in request order.
    pub async fn recv(&mut self) -> Result<BundleResponse, WorkerError> {
        self.responses.recv().await.ok_or(WorkerError::Disconnected)
    }

    /// True when a newer request has been posted since `response`'s.
    pub fn is_stale(&self, response: &BundleResponse) -> bool {
        response
            .id
            .is_some_and(|id| id < self.latest.load(Ordering::SeqCst))
    }

    /// Closes both channels and waits for the thread to exit. Responses not
    /// yet received are discarded.
    pub fn shutdown(mut self) -> Result<(), WorkerError> {
        let thread = self.thread.take();
        drop(self);
        match thread {
            Some(thread) => thread.join().map_err(|_| WorkerError::Panicked),
            None => Ok(()),
        }
    }
}

fn run(
    engine: Engine,
    mut requests: mpsc::UnboundedReceiver<BundleRequest>,
    responses: mpsc::UnboundedSender<BundleResponse>,
) {
    tracing::debug!("bundle worker started");
    while let Some(request) = requests.blocking_recv() {
        let response = engine.handle(request);
        if responses.send(response).is_err() {
            tracing::debug!("response receiver dropped");
            break;
        }
    }
    tracing::debug!("bundle worker stopped");
}
