use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};

/// A general purpose HTTP error type that can be converted into an `IntoResponse`.
#[derive(Debug)]
pub struct HTTPError {
    status: StatusCode,
    message: String,
    details: Option<Value>,
}

impl HTTPError {
    /// Creates a new HTTP error. `details` fields are merged next to `error` in the body.
    pub fn new(status: StatusCode, message: impl Into<String>, details: Option<Value>) -> Self {
        HTTPError {
            status,
            message: message.into(),
            details,
        }
    }

    fn body(&self) -> Value {
        let mut body = json!({ "error": self.message });
        if let (Some(Value::Object(extra)), Value::Object(map)) = (&self.details, &mut body) {
            for (key, value) in extra {
                map.insert(key.clone(), value.clone());
            }
        }
        body
    }
}

/// Converts our `HTTPError` into a JSON response.
impl IntoResponse for HTTPError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body())).into_response()
    }
}
