//! Sequence execution with output-to-input threading.

use crate::invocation::InvocationResult;
use crate::invoke;
use crate::loader::CodeLoader;
use crate::manifest::{Package, Sequence};
use serde_json::{Map, Value};
use std::sync::Arc;

/// Run a sequence against its package. Each step after the first receives
/// the original context's headers and method, the step action's declared
/// defaults, and every field of the previous step's result merged on top.
/// The first step returning an error status is the sequence's final result.
pub async fn run(
    package: &Package,
    sequence: &Sequence,
    initial: &Value,
    loader: &Arc<dyn CodeLoader>,
) -> InvocationResult {
    // Empty component list: nothing to run, nothing to return.
    if sequence.components.is_empty() {
        return InvocationResult::no_content();
    }

    let mut previous: Option<InvocationResult> = None;

    for component in &sequence.components {
        let Some(action) = package.actions.get(component) else {
            tracing::warn!(
                sequence = %sequence.name,
                component = %component,
                "sequence component not found, aborting"
            );
            return InvocationResult::sequence_broken();
        };

        let params = match &previous {
            None => initial.clone(),
            Some(prev) => step_params(initial, &action.inputs, prev),
        };

        let result = invoke::invoke(action, &params, loader).await;
        if result.is_error() {
            return result;
        }
        previous = Some(result);
    }

    previous.unwrap_or_else(InvocationResult::no_content)
}

/// Parameters for step i>0: original headers/method, the action's own
/// defaults, then the previous result flattened on top.
fn step_params(
    initial: &Value,
    defaults: &Map<String, Value>,
    previous: &InvocationResult,
) -> Value {
    let mut params = Map::new();
    for field in ["__ow_headers", "__ow_method"] {
        if let Some(v) = initial.get(field) {
            params.insert(field.into(), v.clone());
        }
    }
    for (k, v) in defaults {
        params.insert(k.clone(), v.clone());
    }
    if let Value::Object(fields) = previous.to_params() {
        for (k, v) in fields {
            params.insert(k, v);
        }
    }
    Value::Object(params)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::{LoadError, StaticCodeLoader};
    use crate::manifest::{Action, WebExposure};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn action(name: &str) -> Action {
        Action {
            name: name.into(),
            function: format!("{name}.js").into(),
            inputs: serde_json::Map::new(),
            web: WebExposure::No,
            requires_auth: false,
        }
    }

    fn sequence(name: &str, components: &[&str]) -> Sequence {
        Sequence {
            name: name.into(),
            components: components.iter().map(|c| c.to_string()).collect(),
            web: WebExposure::Web,
        }
    }

    fn package(actions: Vec<Action>) -> Package {
        let mut package = Package::default();
        for a in actions {
            package.actions.insert(a.name.clone(), a);
        }
        package
    }

    fn loader() -> (Arc<StaticCodeLoader>, Arc<dyn CodeLoader>) {
        let concrete = Arc::new(StaticCodeLoader::new());
        let dynamic: Arc<dyn CodeLoader> = concrete.clone();
        (concrete, dynamic)
    }

    #[tokio::test]
    async fn results_thread_forward_between_steps() {
        static CAPTURED: Mutex<Option<Value>> = Mutex::new(None);
        let (registry, loader) = loader();
        registry.register("a.js", |_| {
            Ok(Some(json!({ "statusCode": 200, "note": "from-a" })))
        });
        registry.register("b.js", |params| {
            *CAPTURED.lock().unwrap() = Some(params);
            Ok(Some(json!({ "statusCode": 200, "body": "done" })))
        });

        let pkg = package(vec![action("a"), action("b")]);
        let seq = sequence("ab", &["a", "b"]);
        let initial = json!({ "__ow_method": "post", "__ow_headers": { "h": "1" }, "x": 9 });

        let result = run(&pkg, &seq, &initial, &loader).await;
        assert_eq!(result.status, 200);
        assert_eq!(result.body, json!("done"));

        let captured = CAPTURED.lock().unwrap().clone().unwrap();
        assert_eq!(captured["note"], json!("from-a"));
        assert_eq!(captured["statusCode"], json!(200));
        assert_eq!(captured["__ow_method"], json!("post"));
        assert_eq!(captured["__ow_headers"], json!({ "h": "1" }));
        // Plain initial params do not leak past the first step.
        assert!(captured.get("x").is_none());
    }

    #[tokio::test]
    async fn step_defaults_are_applied_below_previous_result() {
        static CAPTURED: Mutex<Option<Value>> = Mutex::new(None);
        let (registry, loader) = loader();
        registry.register("a.js", |_| {
            Ok(Some(json!({ "statusCode": 200, "shared": "from-a" })))
        });
        registry.register("b.js", |params| {
            *CAPTURED.lock().unwrap() = Some(params);
            Ok(None)
        });

        let mut b = action("b");
        b.inputs.insert("shared".into(), json!("from-defaults"));
        b.inputs.insert("own".into(), json!("default-kept"));
        let pkg = package(vec![action("a"), b]);
        let seq = sequence("ab", &["a", "b"]);

        run(&pkg, &seq, &json!({}), &loader).await;
        let captured = CAPTURED.lock().unwrap().clone().unwrap();
        assert_eq!(captured["shared"], json!("from-a"));
        assert_eq!(captured["own"], json!("default-kept"));
    }

    #[tokio::test]
    async fn error_status_short_circuits() {
        static AFTER: AtomicUsize = AtomicUsize::new(0);
        let (registry, loader) = loader();
        registry.register("a.js", |_| Ok(Some(json!({ "statusCode": 200 }))));
        registry.register("boom.js", |_| Err(LoadError::Failed("thrown".into())));
        registry.register("after.js", |_| {
            AFTER.fetch_add(1, Ordering::SeqCst);
            Ok(None)
        });

        let pkg = package(vec![action("a"), action("boom"), action("after")]);
        let seq = sequence("s", &["a", "boom", "after"]);
        let result = run(&pkg, &seq, &json!({}), &loader).await;

        assert_eq!(result.status, 400);
        assert_eq!(
            result.body,
            json!({ "error": "Response is not valid 'message/http'." })
        );
        assert_eq!(AFTER.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn missing_component_stops_the_sequence() {
        static AFTER: AtomicUsize = AtomicUsize::new(0);
        let (registry, loader) = loader();
        registry.register("a.js", |_| Ok(Some(json!({ "statusCode": 200 }))));
        registry.register("after.js", |_| {
            AFTER.fetch_add(1, Ordering::SeqCst);
            Ok(None)
        });

        let pkg = package(vec![action("a"), action("after")]);
        let seq = sequence("s", &["a", "ghost", "after"]);
        let result = run(&pkg, &seq, &json!({}), &loader).await;

        assert_eq!(result.status, 400);
        assert_eq!(
            result.body,
            json!({ "error": "Sequence component does not exist." })
        );
        assert_eq!(AFTER.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn empty_sequence_is_no_content() {
        let (_registry, loader) = loader();
        let pkg = package(vec![]);
        let seq = sequence("empty", &[]);
        let result = run(&pkg, &seq, &json!({}), &loader).await;
        assert_eq!(result.status, 204);
    }

    #[tokio::test]
    async fn single_step_receives_initial_context() {
        static CAPTURED: Mutex<Option<Value>> = Mutex::new(None);
        let (registry, loader) = loader();
        registry.register("a.js", |params| {
            *CAPTURED.lock().unwrap() = Some(params);
            Ok(Some(json!({ "statusCode": 200 })))
        });
        let pkg = package(vec![action("a")]);
        let seq = sequence("solo", &["a"]);
        let initial = json!({ "payload": "1,2" });

        run(&pkg, &seq, &initial, &loader).await;
        let captured = CAPTURED.lock().unwrap().clone().unwrap();
        assert_eq!(captured, initial);
    }
}
