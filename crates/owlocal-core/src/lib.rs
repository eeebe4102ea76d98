pub mod activation;
pub mod auth;
pub mod build_queue;
pub mod context;
pub mod error;
pub mod invocation;
pub mod invoke;
pub mod loader;
pub mod manifest;
pub mod script;
pub mod sequence;

pub use error::{OwlocalError, Result};
