//! Single-action invocation.
//!
//! Invocation order: auth gate, forced reload, execute, normalize. No error
//! escapes as `Err`; every failure becomes an [`InvocationResult`] here.

use crate::activation::Activation;
use crate::auth;
use crate::invocation::{ActionReturn, InvocationResult};
use crate::loader::CodeLoader;
use crate::manifest::Action;
use serde_json::Value;
use std::sync::Arc;

/// Invoke one action with the given parameters.
pub async fn invoke(
    action: &Action,
    params: &Value,
    loader: &Arc<dyn CodeLoader>,
) -> InvocationResult {
    if let Err(rejection) = auth::check(action, params) {
        return rejection;
    }

    let activation = Activation::new(action.name.clone());
    tracing::info!(
        activation = %activation.id,
        action = %action.name,
        "invoking action"
    );

    // Discard any previously cached module so edits since the last
    // invocation take effect.
    loader.invalidate(&action.function);

    match loader.run(&action.function, params.clone(), &activation).await {
        Ok(ret) => {
            let result: InvocationResult = ActionReturn::classify(ret).into();
            tracing::debug!(
                activation = %activation.id,
                status = result.status,
                "action completed"
            );
            result
        }
        Err(err) => {
            // Full detail for the operator; the client only ever sees the
            // fixed invalid-response message.
            tracing::error!(
                activation = %activation.id,
                action = %action.name,
                error = %err,
                "action invocation failed"
            );
            InvocationResult::invalid_response()
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::{LoadError, StaticCodeLoader};
    use crate::manifest::WebExposure;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn action(name: &str, entry: &str, requires_auth: bool) -> Action {
        Action {
            name: name.into(),
            function: entry.into(),
            inputs: serde_json::Map::new(),
            web: WebExposure::Web,
            requires_auth,
        }
    }

    fn loader() -> (Arc<StaticCodeLoader>, Arc<dyn CodeLoader>) {
        let concrete = Arc::new(StaticCodeLoader::new());
        let dynamic: Arc<dyn CodeLoader> = concrete.clone();
        (concrete, dynamic)
    }

    #[tokio::test]
    async fn successful_return_is_normalized() {
        let (registry, loader) = loader();
        registry.register("ok.js", |_| {
            Ok(Some(json!({ "statusCode": 200, "body": { "ok": true } })))
        });
        let result = invoke(&action("ok", "ok.js", false), &json!({}), &loader).await;
        assert_eq!(result.status, 200);
        assert_eq!(result.body, json!({ "ok": true }));
    }

    #[tokio::test]
    async fn auth_rejection_skips_execution() {
        static CALLS: AtomicUsize = AtomicUsize::new(0);
        let (registry, loader) = loader();
        registry.register("secured.js", |_| {
            CALLS.fetch_add(1, Ordering::SeqCst);
            Ok(None)
        });
        let result = invoke(&action("secured", "secured.js", true), &json!({}), &loader).await;
        assert_eq!(result.status, 401);
        assert_eq!(CALLS.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn execution_failure_maps_to_invalid_response() {
        let (registry, loader) = loader();
        registry.register("boom.js", |_| Err(LoadError::Failed("kaboom".into())));
        let result = invoke(&action("boom", "boom.js", false), &json!({}), &loader).await;
        assert_eq!(result.status, 400);
        assert_eq!(
            result.body,
            json!({ "error": "Response is not valid 'message/http'." })
        );
    }

    #[tokio::test]
    async fn missing_entry_maps_to_invalid_response() {
        let (_registry, loader) = loader();
        let result = invoke(&action("ghost", "ghost.js", false), &json!({}), &loader).await;
        assert_eq!(result.status, 400);
        assert_eq!(
            result.body,
            json!({ "error": "Response is not valid 'message/http'." })
        );
    }

    #[tokio::test]
    async fn absent_return_is_204() {
        let (registry, loader) = loader();
        registry.register("quiet.js", |_| Ok(None));
        let result = invoke(&action("quiet", "quiet.js", false), &json!({}), &loader).await;
        assert_eq!(result.status, 204);
        assert_eq!(result.body, json!(""));
    }

    #[tokio::test]
    async fn invalidate_runs_before_every_execution() {
        // Re-registering between calls simulates an edit; because the invoker
        // invalidates first, the second call must see the new handler even
        // though the first call populated the module cache.
        let (registry, loader) = loader();
        registry.register("edit.js", |_| Ok(Some(json!({ "body": "v1" }))));
        let act = action("edit", "edit.js", false);

        let first = invoke(&act, &json!({}), &loader).await;
        assert_eq!(first.body, json!("v1"));

        registry.register("edit.js", |_| Ok(Some(json!({ "body": "v2" }))));
        let second = invoke(&act, &json!({}), &loader).await;
        assert_eq!(second.body, json!("v2"));
    }

    #[tokio::test]
    async fn identical_context_yields_identical_result() {
        let (registry, loader) = loader();
        registry.register("pure.js", |params| {
            Ok(Some(json!({ "statusCode": 200, "body": params["n"] })))
        });
        let act = action("pure", "pure.js", false);
        let params = json!({ "n": 5 });
        let a = invoke(&act, &params, &loader).await;
        let b = invoke(&act, &params, &loader).await;
        assert_eq!(a, b);
    }
}
