//! Canonical invocation results and return-value normalization.
//!
//! Actions return loosely-shaped values: sometimes an object with
//! `statusCode`/`headers`/`body`, sometimes an explicit `error` field,
//! sometimes nothing at all. All of that is decoded in one place into the
//! [`ActionReturn`] tagged union and collapsed into an [`InvocationResult`],
//! so the rest of the engine never shape-sniffs.

use serde_json::{Map, Value};

/// Fixed client-facing error strings. These match the production gateway
/// verbatim and are load-bearing for fidelity tests.
pub const ERROR_INVALID_RESPONSE: &str = "Response is not valid 'message/http'.";
pub const ERROR_NOT_FOUND: &str = "The requested resource does not exist.";
pub const ERROR_SEQUENCE_COMPONENT: &str = "Sequence component does not exist.";
pub const ERROR_AUTH_REQUIRED: &str =
    "The resource requires authentication, which was not supplied with the request";

// ---------------------------------------------------------------------------
// InvocationResult
// ---------------------------------------------------------------------------

/// Canonical `{statusCode, headers, body}` shape every invocation reduces to,
/// plus any extra top-level fields a successful return carried (threaded
/// forward between sequence steps).
#[derive(Debug, Clone, PartialEq)]
pub struct InvocationResult {
    pub status: u16,
    pub headers: Map<String, Value>,
    pub body: Value,
    pub extra: Map<String, Value>,
}

impl InvocationResult {
    pub fn new(status: u16, body: Value) -> Self {
        Self {
            status,
            headers: Map::new(),
            body,
            extra: Map::new(),
        }
    }

    fn error_body(status: u16, message: &str) -> Self {
        Self::new(status, serde_json::json!({ "error": message }))
    }

    /// 204 with an empty body, for actions that return nothing.
    pub fn no_content() -> Self {
        Self::new(204, Value::String(String::new()))
    }

    /// 400 for a thrown, missing, or malformed action response.
    pub fn invalid_response() -> Self {
        Self::error_body(400, ERROR_INVALID_RESPONSE)
    }

    /// 404 for an unknown or non-web-exposed item.
    pub fn not_found() -> Self {
        Self::error_body(404, ERROR_NOT_FOUND)
    }

    /// 400 for a sequence referencing a missing component.
    pub fn sequence_broken() -> Self {
        Self::error_body(400, ERROR_SEQUENCE_COMPONENT)
    }

    /// 401 with the given reason message.
    pub fn unauthorized(message: &str) -> Self {
        Self::error_body(401, message)
    }

    /// 401 for the blanket non-web route rejection.
    pub fn auth_required() -> Self {
        Self::error_body(401, ERROR_AUTH_REQUIRED)
    }

    pub fn is_error(&self) -> bool {
        self.status >= 400
    }

    /// Flatten back into the object shape a following sequence step receives:
    /// `statusCode`, `body`, `headers` (when present), and all extra fields.
    pub fn to_params(&self) -> Value {
        let mut obj = Map::new();
        obj.insert("statusCode".into(), Value::from(self.status));
        if !self.headers.is_empty() {
            obj.insert("headers".into(), Value::Object(self.headers.clone()));
        }
        obj.insert("body".into(), self.body.clone());
        for (k, v) in &self.extra {
            obj.insert(k.clone(), v.clone());
        }
        Value::Object(obj)
    }
}

// ---------------------------------------------------------------------------
// ActionReturn: tagged decoding of loose action return values
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum ActionReturn {
    /// The action returned nothing.
    NoResult,
    /// The action returned an explicit `error` field; everything else in the
    /// return value is discarded.
    Error { status: u16, body: Value },
    /// An ordinary return value.
    Normal {
        status: u16,
        headers: Map<String, Value>,
        body: Value,
        extra: Map<String, Value>,
    },
}

const RESERVED_FIELDS: [&str; 3] = ["statusCode", "headers", "body"];

impl ActionReturn {
    /// Decode a raw return value. `None` models an absent return.
    pub fn classify(ret: Option<Value>) -> Self {
        let value = match ret {
            None | Some(Value::Null) => return Self::NoResult,
            Some(v) => v,
        };

        if let Some(error) = value.get("error") {
            // Explicit error returns short-circuit: only the error's own
            // status and body survive.
            let status = status_code(error.get("statusCode")).unwrap_or(400);
            let body = error.get("body").cloned().unwrap_or(Value::Null);
            return Self::Error { status, body };
        }

        let status = status_code(value.get("statusCode")).unwrap_or(200);
        let headers = value
            .get("headers")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();
        let body = match value.get("body") {
            Some(b) if !b.is_null() => b.clone(),
            _ => Value::String(String::new()),
        };

        // Non-error statuses keep the remaining top-level fields so sequence
        // steps can pass additional context forward. Error statuses and
        // non-object returns carry nothing extra.
        let mut extra = Map::new();
        if status < 400 {
            if let Value::Object(fields) = &value {
                for (k, v) in fields {
                    if !RESERVED_FIELDS.contains(&k.as_str()) {
                        extra.insert(k.clone(), v.clone());
                    }
                }
            }
        }

        Self::Normal {
            status,
            headers,
            body,
            extra,
        }
    }
}

impl From<ActionReturn> for InvocationResult {
    fn from(ret: ActionReturn) -> Self {
        match ret {
            ActionReturn::NoResult => Self::no_content(),
            ActionReturn::Error { status, body } => Self::new(status, body),
            ActionReturn::Normal {
                status,
                headers,
                body,
                extra,
            } => Self {
                status,
                headers,
                body,
                extra,
            },
        }
    }
}

/// Status codes may arrive as numbers or numeric strings.
fn status_code(value: Option<&Value>) -> Option<u16> {
    match value {
        Some(Value::Number(n)) => n.as_u64().and_then(|n| u16::try_from(n).ok()),
        Some(Value::String(s)) => s.parse().ok(),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
