//! The two ingress surfaces.
//!
//! The web route resolves `{package}/{item}`, checks web exposure, builds the
//! invocation context, and dispatches to the invoker or the sequence
//! executor. The non-web route always rejects with 401, matching the
//! production platform's blanket refusal of direct non-web invocation.

use axum::body::Body;
use axum::extract::{Path, Request, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use serde_json::Value;

use owlocal_core::context::{self, IngressRequest};
use owlocal_core::invocation::InvocationResult;
use owlocal_core::manifest::Resolved;
use owlocal_core::{invoke, sequence};

use crate::state::AppState;

/// Request bodies larger than this are refused outright.
const BODY_LIMIT: usize = 10 * 1024 * 1024;

/// ANY /<web-prefix>/{package}/{item}
pub async fn web_invoke(
    State(app): State<AppState>,
    Path((package, item)): Path<(String, String)>,
    req: Request,
) -> Response {
    handle_web(app, package, item, String::new(), req).await
}

/// ANY /<web-prefix>/{package}/{item}/{*rest}
pub async fn web_invoke_rest(
    State(app): State<AppState>,
    Path((package, item, rest)): Path<(String, String, String)>,
    req: Request,
) -> Response {
    handle_web(app, package, item, format!("/{rest}"), req).await
}

/// ANY /<base-prefix>/{package}/{item}[/{*rest}]. Always 401, whether or
/// not the target exists.
pub async fn nonweb_reject() -> Response {
    to_http_response(InvocationResult::auth_required())
}

async fn handle_web(
    app: AppState,
    package: String,
    item: String,
    path_rest: String,
    req: Request,
) -> Response {
    let ingress = match snapshot_request(req, path_rest).await {
        Ok(ingress) => ingress,
        Err(response) => return response,
    };

    let result = match app.manifest.resolve(&package, &item) {
        Resolved::Action(action) if action.web.is_web_exposed() => {
            if action.web.is_raw() {
                tracing::warn!(
                    action = %action.name,
                    "raw web action handling is not implemented, continuing with normal handling"
                );
            }
            let params = context::synthesize(&ingress, &action.inputs);
            invoke::invoke(action, &params, &app.loader).await
        }
        Resolved::Sequence(seq) if seq.web.is_web_exposed() => {
            if seq.web.is_raw() {
                tracing::warn!(
                    sequence = %seq.name,
                    "raw web action handling is not implemented, continuing with normal handling"
                );
            }
            let Some(pkg) = app.manifest.packages.get(&package) else {
                return to_http_response(InvocationResult::not_found());
            };
            let params = context::synthesize(&ingress, &serde_json::Map::new());
            sequence::run(pkg, seq, &params, &app.loader).await
        }
        // Unknown items and items without web exposure are indistinguishable
        // to the caller.
        _ => {
            tracing::debug!(package = %package, item = %item, "no web-exposed target");
            InvocationResult::not_found()
        }
    };

    to_http_response(result)
}

/// Capture the request parts the parameter synthesizer needs.
async fn snapshot_request(req: Request, path_rest: String) -> Result<IngressRequest, Response> {
    let (parts, body) = req.into_parts();

    let is_json = parts
        .headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.contains("application/json"));

    let headers = parts
        .headers
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )
        })
        .collect();

    let bytes = axum::body::to_bytes(body, BODY_LIMIT).await.map_err(|e| {
        tracing::warn!(error = %e, "failed to read request body");
        (
            StatusCode::BAD_REQUEST,
            axum::Json(serde_json::json!({ "error": "failed to read request body" })),
        )
            .into_response()
    })?;

    Ok(IngressRequest {
        method: parts.method.as_str().to_string(),
        path: path_rest,
        query: parts.uri.query().unwrap_or("").to_string(),
        headers,
        body: String::from_utf8_lossy(&bytes).into_owned(),
        is_json,
    })
}

/// Write an invocation result back as an HTTP response. Object and array
/// bodies go out as JSON, strings as-is, null as empty.
fn to_http_response(result: InvocationResult) -> Response {
    let status = match StatusCode::from_u16(result.status) {
        Ok(s) => s,
        Err(_) => {
            tracing::warn!(status = result.status, "action returned invalid status code");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };

    let mut builder = Response::builder().status(status);
    let mut has_content_type = false;
    for (name, value) in &result.headers {
        if name.eq_ignore_ascii_case("content-type") {
            has_content_type = true;
        }
        let text = match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        builder = builder.header(name.as_str(), text);
    }

    let built = match result.body {
        Value::Null => builder.body(Body::empty()),
        Value::String(s) => {
            if !has_content_type && !s.is_empty() {
                builder = builder.header(header::CONTENT_TYPE, "text/plain; charset=utf-8");
            }
            builder.body(Body::from(s))
        }
        other => {
            if !has_content_type {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
            }
            builder.body(Body::from(serde_json::to_vec(&other).unwrap_or_default()))
        }
    };

    built.unwrap_or_else(|e| {
        tracing::error!(error = %e, "action returned unwritable headers");
        StatusCode::INTERNAL_SERVER_ERROR.into_response()
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
