//! The code-loader seam.
//!
//! The invoker never touches action code directly. It goes through the
//! [`CodeLoader`] trait, which exposes an explicit invalidate-then-run cycle
//! so every invocation executes freshly loaded code. [`script::ScriptCodeLoader`]
//! runs JavaScript entry points in a subprocess; [`StaticCodeLoader`] keeps an
//! in-process registry of native handlers for tests and embedders.
//!
//! [`script::ScriptCodeLoader`]: crate::script::ScriptCodeLoader

use crate::activation::Activation;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};
use thiserror::Error;

/// Why a load or execution failed. The invoker collapses every variant into
/// the fixed invalid-response result after logging the detail.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("entry point not found: {0}")]
    Missing(PathBuf),

    #[error("entry point has no main export: {0}")]
    NoMainExport(PathBuf),

    #[error("no JavaScript runtime found (tried bun, deno, node)")]
    NoRuntime,

    #[error("action execution failed: {0}")]
    Failed(String),
}

/// Loads and executes action entry points.
#[async_trait]
pub trait CodeLoader: Send + Sync {
    /// Discard any cached load for the entry point, so the next [`run`]
    /// observes edits made since the previous invocation.
    ///
    /// [`run`]: CodeLoader::run
    fn invalidate(&self, entry: &Path);

    /// Load the entry point and execute its main function with `params` as
    /// sole argument. `Ok(None)` models an absent return value.
    async fn run(
        &self,
        entry: &Path,
        params: Value,
        activation: &Activation,
    ) -> Result<Option<Value>, LoadError>;
}

// ---------------------------------------------------------------------------
// StaticCodeLoader: in-process handlers keyed by entry path
// ---------------------------------------------------------------------------

pub type Handler = Arc<dyn Fn(Value) -> Result<Option<Value>, LoadError> + Send + Sync>;

/// In-process loader backed by registered native handlers.
///
/// The registry plays the role of source on disk; `loaded` is the module
/// cache. A handler re-registered after being cached is only picked up once
/// `invalidate` drops the cached copy, which is exactly the reload contract
/// the invoker relies on.
#[derive(Default)]
pub struct StaticCodeLoader {
    registry: RwLock<HashMap<PathBuf, Handler>>,
    loaded: Mutex<HashMap<PathBuf, Handler>>,
}

impl StaticCodeLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the handler for an entry path.
    pub fn register<F>(&self, entry: impl Into<PathBuf>, handler: F)
    where
        F: Fn(Value) -> Result<Option<Value>, LoadError> + Send + Sync + 'static,
    {
        self.registry
            .write()
            .expect("registry lock poisoned")
            .insert(entry.into(), Arc::new(handler));
    }
}

#[async_trait]
impl CodeLoader for StaticCodeLoader {
    fn invalidate(&self, entry: &Path) {
        self.loaded
            .lock()
            .expect("loaded lock poisoned")
            .remove(entry);
    }

    async fn run(
        &self,
        entry: &Path,
        params: Value,
        _activation: &Activation,
    ) -> Result<Option<Value>, LoadError> {
        let handler = {
            let mut loaded = self.loaded.lock().expect("loaded lock poisoned");
            match loaded.get(entry) {
                Some(h) => h.clone(),
                None => {
                    let registry = self.registry.read().expect("registry lock poisoned");
                    let h = registry
                        .get(entry)
                        .cloned()
                        .ok_or_else(|| LoadError::Missing(entry.to_path_buf()))?;
                    loaded.insert(entry.to_path_buf(), h.clone());
                    h
                }
            }
        };
        handler(params)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
