//! Authentication gatekeeper for the require-auth annotation.

use crate::invocation::InvocationResult;
use crate::manifest::Action;
use serde_json::Value;

/// Headers required, in order, when an action demands authentication.
const REQUIRED_HEADERS: [&str; 2] = ["authorization", "x-gw-ims-org-id"];

/// Check the action's authentication annotation against the context's
/// headers. Passes unconditionally when the annotation is absent. Header
/// names are compared case-insensitively; the first missing required header
/// produces the 401 result naming it.
pub fn check(action: &Action, params: &Value) -> Result<(), InvocationResult> {
    if !action.requires_auth {
        return Ok(());
    }

    let present: Vec<String> = params
        .get("__ow_headers")
        .and_then(Value::as_object)
        .map(|headers| headers.keys().map(|k| k.to_lowercase()).collect())
        .unwrap_or_default();

    for required in REQUIRED_HEADERS {
        if !present.iter().any(|h| h == required) {
            let message = format!("cannot authorize request, reason: missing {required} header");
            return Err(InvocationResult::unauthorized(&message));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
