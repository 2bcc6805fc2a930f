//! # ply-worker
//!
//! The boundary a playground talks to. A host posts a [`BundleRequest`]
//! holding the whole project snapshot and gets exactly one
//! [`BundleResponse`] back, either the bundle or a sanitized error.
//!
//! - Native hosts use [`WorkerHandle`], a dedicated thread fed through tokio
//!   channels.
//! - Browsers load the wasm build inside a Web Worker, install the real
//!   Svelte compiler with `setComponentCompiler` and call `bundle`.
//!
//! ```no_run
//! use ply_vfs::VirtualFileStore;
//! use ply_worker::{Dialect, Engine, WorkerHandle};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let mut store = VirtualFileStore::new();
//! let _ = store.create_file("package.json", r#"{ "main": "index.js" }"#)?;
//! let _ = store.create_file("index.js", "console.log('hi');")?;
//!
//! let mut worker = WorkerHandle::spawn(Engine::default())?;
//! let id = worker.post(Dialect::Script, &store.flatten())?;
//! let response = worker.recv().await?;
//! assert_eq!(response.id, Some(id));
//! # Ok(())
//! # }
//! ```

pub mod engine;
pub mod panic_capture;
pub mod protocol;

#[cfg(not(target_arch = "wasm32"))]
pub mod worker;

#[cfg(target_arch = "wasm32")]
pub mod wasm;

pub use engine::Engine;
pub use protocol::{BundleRequest, BundleResponse, Dialect, HostCompileOutput, SnapshotFile};

#[cfg(not(target_arch = "wasm32"))]
pub use worker::{WorkerError, WorkerHandle};
