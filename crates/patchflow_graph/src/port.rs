// SPDX-License-Identifier: MIT OR Apache-2.0
//! Port definitions for node inputs/outputs.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// Identifier of a port, unique among the ports of one node (e.g. `"result"`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PortId(pub String);

impl PortId {
    /// Create a port ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the ID as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PortId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for PortId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl Borrow<str> for PortId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PortId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Port direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PortDirection {
    /// Input port
    Input,
    /// Output port
    Output,
}

/// Data type that can flow through ports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PortType {
    /// Number value
    Number,
    /// String value
    String,
    /// Boolean value
    Bool,
    /// One-tick pulse
    Trigger,
    /// Structured data (lists, JSON)
    Data,
    /// Texture/media handle
    Media,
    /// Any type (for generic nodes)
    Any,
}

impl PortType {
    /// Whether values on this port auto-reset after the tick they fired in
    pub fn is_trigger(&self) -> bool {
        matches!(self, Self::Trigger)
    }

    /// Check if this type can connect to another type
    pub fn can_connect_to(&self, other: &PortType) -> bool {
        // Any type can connect to anything
        if matches!(self, Self::Any) || matches!(other, Self::Any) {
            return true;
        }

        if self == other {
            return true;
        }

        // Implicit conversions; anything scalar can be formatted as text
        matches!(
            (self, other),
            (Self::Number, Self::Bool)
                | (Self::Bool, Self::Number)
                | (Self::Trigger, Self::Bool)
                | (Self::Bool, Self::Trigger)
                | (Self::Number | Self::Bool, Self::String)
        )
    }
}

/// A port declared by a node definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Port {
    /// Port ID, stable across document versions
    pub id: PortId,
    /// Display name
    pub name: String,
    /// Port direction
    pub direction: PortDirection,
    /// Data type
    pub port_type: PortType,
}

impl Port {
    /// Create a new port
    pub fn new(
        id: impl Into<PortId>,
        name: impl Into<String>,
        port_type: PortType,
        direction: PortDirection,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            direction,
            port_type,
        }
    }

    /// Create a new input port named after its ID
    pub fn input(id: &str, port_type: PortType) -> Self {
        Self::new(id, id, port_type, PortDirection::Input)
    }

    /// Create a new output port named after its ID
    pub fn output(id: &str, port_type: PortType) -> Self {
        Self::new(id, id, port_type, PortDirection::Output)
    }

    /// Set the display name
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Check if a connection from this port to another is valid
    pub fn can_connect(&self, other: &Port) -> bool {
        if self.direction != PortDirection::Output || other.direction != PortDirection::Input {
            return false;
        }

        self.port_type.can_connect_to(&other.port_type)
    }
}
