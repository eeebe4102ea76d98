use owlocal_core::loader::CodeLoader;
use owlocal_core::manifest::Manifest;
use std::sync::Arc;

/// Route prefixes for the two ingress surfaces. Configurable, with the
/// production gateway's defaults.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Prefix for web-exposed invocation (no leading/trailing slash).
    pub web_prefix: String,
    /// Prefix for the non-web surface, which is always rejected.
    pub base_prefix: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            web_prefix: "api/v1/web".into(),
            base_prefix: "api/v1".into(),
        }
    }
}

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub manifest: Arc<Manifest>,
    pub loader: Arc<dyn CodeLoader>,
}

impl AppState {
    pub fn new(manifest: Arc<Manifest>, loader: Arc<dyn CodeLoader>) -> Self {
        Self { manifest, loader }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_prefixes_match_the_gateway() {
        let config = GatewayConfig::default();
        assert_eq!(config.web_prefix, "api/v1/web");
        assert_eq!(config.base_prefix, "api/v1");
    }
}
