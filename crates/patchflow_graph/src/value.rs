// SPDX-License-Identifier: MIT OR Apache-2.0
//! Values that flow through ports, controls and message channels.
//!
//! "Unset" is not a variant: an absent value is `Option::None` everywhere
//! a value is resolved, so an executor can never mistake it for a real
//! number or string.

use crate::port::PortType;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Opaque handle to an externally loaded media resource (asset id or URL)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MediaHandle(pub String);

impl MediaHandle {
    /// Create a handle from an asset id or URL
    pub fn new(handle: impl Into<String>) -> Self {
        Self(handle.into())
    }

    /// Get the handle as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MediaHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A value carried by a port, a control or a message channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// Number
    Number(f64),
    /// String
    String(String),
    /// Boolean, also the payload of a fired trigger
    Bool(bool),
    /// Shared list of values
    List(Arc<Vec<Value>>),
    /// Shared structured data
    Data(Arc<serde_json::Value>),
    /// Handle to a media resource
    Media(MediaHandle),
}

impl Value {
    /// Build a list value
    pub fn list(items: impl IntoIterator<Item = Value>) -> Self {
        Self::List(Arc::new(items.into_iter().collect()))
    }

    /// Build a structured data value
    pub fn data(data: serde_json::Value) -> Self {
        Self::Data(Arc::new(data))
    }

    /// Identity comparison.
    ///
    /// Primitives compare by value, lists and structured data by reference.
    /// Two separately built but structurally equal lists are *not* the same.
    pub fn same(&self, other: &Value) -> bool {
        match (self, other) {
            (Self::Number(a), Self::Number(b)) => a == b,
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::List(a), Self::List(b)) => Arc::ptr_eq(a, b),
            (Self::Data(a), Self::Data(b)) => Arc::ptr_eq(a, b),
            (Self::Media(a), Self::Media(b)) => a == b,
            _ => false,
        }
    }

    /// Get the port type this value naturally belongs to
    pub fn port_type(&self) -> PortType {
        match self {
            Self::Number(_) => PortType::Number,
            Self::String(_) => PortType::String,
            Self::Bool(_) => PortType::Bool,
            Self::List(_) | Self::Data(_) => PortType::Data,
            Self::Media(_) => PortType::Media,
        }
    }

    /// Numeric view; booleans count as 0/1
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    /// String view without conversion
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Boolean view without conversion
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// List view
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// Truthiness as used by triggers and gates
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Number(n) => *n != 0.0 && !n.is_nan(),
            Self::String(s) => !s.is_empty(),
            Self::Bool(b) => *b,
            Self::List(items) => !items.is_empty(),
            Self::Data(data) => !data.is_null(),
            Self::Media(_) => true,
        }
    }

    /// Render the value as text, the way string nodes see non-string inputs
    pub fn to_text(&self) -> String {
        match self {
            Self::String(s) => s.clone(),
            Self::Number(n) => n.to_string(),
            Self::Bool(b) => b.to_string(),
            Self::List(items) => items
                .iter()
                .map(Value::to_text)
                .collect::<Vec<_>>()
                .join(","),
            Self::Data(data) => data.to_string(),
            Self::Media(handle) => handle.0.clone(),
        }
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<MediaHandle> for Value {
    fn from(value: MediaHandle) -> Self {
        Self::Media(value)
    }
}
