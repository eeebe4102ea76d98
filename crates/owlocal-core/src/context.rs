//! Invocation context synthesis.
//!
//! Builds the parameter object an action receives from an inbound HTTP
//! request plus the action's declared defaults. Precedence, lowest to
//! highest: synthetic `__ow_*` fields < query string pairs < declared
//! defaults < parsed JSON body fields.

use serde_json::{Map, Value};

/// Header always forced to the loopback marker: the development caller is
/// always local, matching the production platform's handling.
pub const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";
pub const FORWARDED_FOR_VALUE: &str = "127.0.0.1";

/// Framework-neutral snapshot of an inbound HTTP request, built by the
/// ingress layer from the raw request parts.
#[derive(Debug, Clone, Default)]
pub struct IngressRequest {
    /// HTTP method, any case; lower-cased during synthesis.
    pub method: String,
    /// Path remainder after the package/item segments (empty or `/...`).
    pub path: String,
    /// Raw query string, without the leading `?`.
    pub query: String,
    /// Header name/value pairs as received.
    pub headers: Vec<(String, String)>,
    /// Raw request body.
    pub body: String,
    /// Whether the content type indicated JSON.
    pub is_json: bool,
}

/// Synthesize the invocation context. Values pass through opaquely; no
/// parameter-type validation happens here.
pub fn synthesize(req: &IngressRequest, defaults: &Map<String, Value>) -> Value {
    let mut params = Map::new();

    params.insert("__ow_method".into(), Value::from(req.method.to_lowercase()));
    params.insert("__ow_path".into(), Value::from(req.path.clone()));
    params.insert("__ow_query".into(), Value::from(req.query.clone()));
    params.insert("__ow_body".into(), Value::from(req.body.clone()));

    let mut headers = Map::new();
    for (name, value) in &req.headers {
        headers.insert(name.clone(), Value::from(value.clone()));
    }
    headers.insert(
        FORWARDED_FOR_HEADER.into(),
        Value::from(FORWARDED_FOR_VALUE),
    );
    params.insert("__ow_headers".into(), Value::Object(headers));

    for (key, value) in parse_query_pairs(&req.query) {
        params.insert(key, Value::from(value));
    }

    for (key, value) in defaults {
        params.insert(key.clone(), value.clone());
    }

    // JSON bodies merge last, highest precedence. Only object bodies merge;
    // anything else stays available through __ow_body.
    if req.is_json {
        if let Ok(Value::Object(fields)) = serde_json::from_str::<Value>(&req.body) {
            for (key, value) in fields {
                params.insert(key, value);
            }
        }
    }

    Value::Object(params)
}

fn parse_query_pairs(query: &str) -> Vec<(String, String)> {
    query
        .split('&')
        .filter(|kv| !kv.is_empty())
        .map(|kv| match kv.split_once('=') {
            Some((k, v)) => (k.to_string(), v.to_string()),
            None => (kv.to_string(), String::new()),
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
