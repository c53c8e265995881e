//! Transport-neutral responses and error translation.

use serde::Serialize;
use serde_json::{Value, json};
use taskforge_application::CoordinatorError;
use taskforge_domain::DomainError;

pub const CREATED: u16 = 201;
pub const OK: u16 = 200;
pub const ACCEPTED: u16 = 202;
pub const NO_CONTENT: u16 = 204;
pub const BAD_REQUEST: u16 = 400;
pub const NOT_FOUND: u16 = 404;
pub const CONFLICT: u16 = 409;
pub const TOO_MANY_REQUESTS: u16 = 429;
pub const INTERNAL_SERVER_ERROR: u16 = 500;
pub const SERVICE_UNAVAILABLE: u16 = 503;

/// Status, headers and JSON body, ready for any HTTP framework to send.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl ApiResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn json(status: u16, body: &impl Serialize) -> Self {
        match serde_json::to_value(body) {
            Ok(value) => Self::new(status).with_body(value),
            Err(e) => Self::error(INTERNAL_SERVER_ERROR, e.to_string()),
        }
    }

    pub fn error(status: u16, message: impl Into<String>) -> Self {
        Self::new(status).with_body(json!({ "error": message.into() }))
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// First header with this name (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Which operation produced an error; a domain conflict maps to a
/// different status depending on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Read,
    Create,
    Update,
    Delete,
    Execute,
    Cancel,
}

fn validation_body(error: &DomainError) -> Value {
    let fields: Vec<Value> = error
        .field_errors()
        .iter()
        .map(|f| json!({ "field": f.field, "message": f.message }))
        .collect();
    json!({ "error": error.to_string(), "fieldErrors": fields })
}

/// Translate a coordinator error at the transport boundary.
pub fn error_response(operation: Operation, error: &CoordinatorError) -> ApiResponse {
    match error {
        CoordinatorError::Validation(domain) => {
            ApiResponse::new(BAD_REQUEST).with_body(validation_body(domain))
        }
        CoordinatorError::NotFound(_) => ApiResponse::error(NOT_FOUND, error.to_string()),
        CoordinatorError::Conflict(_) => {
            let status = match operation {
                Operation::Update | Operation::Delete => BAD_REQUEST,
                _ => CONFLICT,
            };
            ApiResponse::error(status, error.to_string())
        }
        CoordinatorError::RateLimitExceeded { retry_after, .. } => {
            ApiResponse::error(TOO_MANY_REQUESTS, error.to_string())
                .with_header("Retry-After", retry_after.as_secs().max(1).to_string())
        }
        CoordinatorError::QueueFull | CoordinatorError::ShuttingDown => {
            ApiResponse::error(SERVICE_UNAVAILABLE, error.to_string())
        }
        CoordinatorError::Repository(_) => {
            ApiResponse::error(INTERNAL_SERVER_ERROR, error.to_string())
        }
    }
}
