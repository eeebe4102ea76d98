//! Per-call activation identity.
//!
//! The production platform exposes the current activation id and action name
//! as ambient per-activation state. Under a multi-threaded runtime that must
//! not be a process-wide mutable, so the identity is an explicit value
//! threaded through the call chain and exported to action subprocesses via
//! environment variables.

use uuid::Uuid;

/// One execution instance of an action.
#[derive(Debug, Clone)]
pub struct Activation {
    /// 32-hex activation id, unique per invocation.
    pub id: String,
    pub action_name: String,
}

impl Activation {
    pub fn new(action_name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().simple().to_string(),
            action_name: action_name.into(),
        }
    }
}
