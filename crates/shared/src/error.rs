use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::query::Operation;

/// Failure reported by the store boundary. Never retried.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{operation} on '{table}' failed: {message}")]
pub struct GatewayError {
    pub table: String,
    pub operation: Operation,
    pub message: String,
}

impl GatewayError {
    pub fn new(table: impl Into<String>, operation: Operation, message: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            operation,
            message: message.into(),
        }
    }
}

/// Malformed input caught before any request leaves the process.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid {field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Out-of-range list state requests. These are clamped by the controller and only surface
/// as diagnostics.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum StateError {
    #[error("page {requested} is outside 1..={total_pages}")]
    PageOutOfRange { requested: usize, total_pages: usize },
}

/// Error body returned by the store's REST layer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreErrorBody {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub details: Option<String>,
    #[serde(default)]
    pub hint: Option<String>,
}

impl StoreErrorBody {
    pub fn describe(&self) -> Option<String> {
        let message = self.message.as_deref()?;
        let mut out = match self.code.as_deref() {
            Some(code) => format!("[{code}] {message}"),
            None => message.to_string(),
        };
        if let Some(details) = self.details.as_deref().filter(|d| !d.is_empty()) {
            out.push_str(" (");
            out.push_str(details);
            out.push(')');
        }
        Some(out)
    }
}
