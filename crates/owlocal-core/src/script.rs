//! Subprocess code loader for JavaScript action entry points.
//!
//! Actions are plain JS modules exporting `main`. Each invocation runs the
//! embedded shim in the best available runtime (bun > deno > node), feeding
//! the invocation context as JSON on stdin and reading the JSON result from
//! stdout. Running a fresh subprocess per invocation means a reload can never
//! race a concurrent read of the previous module version.
//!
//! The activation identity travels as `__OW_ACTIVATION_ID` /
//! `__OW_ACTION_NAME` in the child environment, so it is per-invocation by
//! construction.

use crate::activation::Activation;
use crate::loader::{CodeLoader, LoadError};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Mutex;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

const SHIM: &str = include_str!("shim.js");

/// Exit code the shim uses when the entry point has no main export.
const EXIT_NO_MAIN: i32 = 3;
/// Exit code the shim uses when the module itself failed to load.
const EXIT_LOAD_FAILED: i32 = 4;

/// The available JavaScript runtimes, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Runtime {
    Bun,
    Deno,
    Node,
}

impl Runtime {
    pub fn name(&self) -> &'static str {
        match self {
            Runtime::Bun => "bun",
            Runtime::Deno => "deno",
            Runtime::Node => "node",
        }
    }
}

/// Detect the best available JavaScript runtime.
pub fn detect_runtime() -> Option<Runtime> {
    if which::which("bun").is_ok() {
        return Some(Runtime::Bun);
    }
    if which::which("deno").is_ok() {
        return Some(Runtime::Deno);
    }
    if which::which("node").is_ok() {
        return Some(Runtime::Node);
    }
    None
}

fn build_command(runtime: Runtime) -> Command {
    match runtime {
        Runtime::Bun => {
            let mut cmd = Command::new("bun");
            cmd.args(["-e", SHIM]);
            cmd
        }
        Runtime::Deno => {
            let mut cmd = Command::new("deno");
            cmd.args(["eval", SHIM]);
            cmd
        }
        Runtime::Node => {
            let mut cmd = Command::new("node");
            cmd.args(["-e", SHIM]);
            cmd
        }
    }
}

// ---------------------------------------------------------------------------
// ScriptCodeLoader
// ---------------------------------------------------------------------------

/// Loads action entry points from disk and executes them via the shim.
///
/// Entry paths are canonicalized once and memoized; `invalidate` drops the
/// memo so a rebuilt or replaced file is re-resolved on the next run.
#[derive(Default)]
pub struct ScriptCodeLoader {
    resolved: Mutex<HashMap<PathBuf, PathBuf>>,
}

impl ScriptCodeLoader {
    pub fn new() -> Self {
        Self::default()
    }

    fn resolve_entry(&self, entry: &Path) -> Result<PathBuf, LoadError> {
        let mut resolved = self.resolved.lock().expect("resolved lock poisoned");
        if let Some(path) = resolved.get(entry) {
            return Ok(path.clone());
        }
        let path = entry
            .canonicalize()
            .map_err(|_| LoadError::Missing(entry.to_path_buf()))?;
        resolved.insert(entry.to_path_buf(), path.clone());
        Ok(path)
    }
}

#[async_trait]
impl CodeLoader for ScriptCodeLoader {
    fn invalidate(&self, entry: &Path) {
        self.resolved
            .lock()
            .expect("resolved lock poisoned")
            .remove(entry);
    }

    async fn run(
        &self,
        entry: &Path,
        params: Value,
        activation: &Activation,
    ) -> Result<Option<Value>, LoadError> {
        let path = self.resolve_entry(entry)?;
        let runtime = detect_runtime().ok_or(LoadError::NoRuntime)?;

        let mut cmd = build_command(runtime);
        cmd.env("OWLOCAL_ENTRY", &path)
            .env("__OW_ACTIVATION_ID", &activation.id)
            .env("__OW_ACTION_NAME", &activation.action_name)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = cmd
            .spawn()
            .map_err(|e| LoadError::Failed(format!("failed to spawn {}: {e}", runtime.name())))?;

        let input = serde_json::to_vec(&params)
            .map_err(|e| LoadError::Failed(format!("failed to encode params: {e}")))?;
        if let Some(stdin) = child.stdin.as_mut() {
            stdin
                .write_all(&input)
                .await
                .map_err(|e| LoadError::Failed(format!("failed to write stdin: {e}")))?;
        }
        drop(child.stdin.take());

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| LoadError::Failed(format!("wait failed: {e}")))?;

        match output.status.code() {
            Some(0) => {}
            Some(EXIT_NO_MAIN) => return Err(LoadError::NoMainExport(entry.to_path_buf())),
            Some(EXIT_LOAD_FAILED) => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                return Err(LoadError::Failed(format!(
                    "failed to load {}: {}",
                    entry.display(),
                    stderr.trim()
                )));
            }
            code => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                return Err(LoadError::Failed(format!(
                    "action exited with {:?}: {}",
                    code,
                    stderr.trim()
                )));
            }
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let trimmed = stdout.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }
        let value = serde_json::from_str(trimmed)
            .map_err(|e| LoadError::Failed(format!("action wrote invalid JSON: {e}")))?;
        Ok(Some(value))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
