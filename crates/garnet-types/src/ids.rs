//! Identifier newtypes.
//!
//! Attribute ids name released identity facts ("uid", "mail"); component ids
//! name nodes of the configured resolution graph (definitions and data
//! connectors). Both are ordered so that plans, logs and output maps are
//! deterministic.

use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

// ============================================================================
// AttributeId
// ============================================================================

/// Unique identifier for an identity attribute (e.g. `uid`, `mail`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttributeId(String);

impl AttributeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for AttributeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for AttributeId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for AttributeId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

// ============================================================================
// ComponentId
// ============================================================================

/// Unique identifier for a configured component of the resolution graph
/// (an attribute definition or a data connector).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ComponentId(String);

impl ComponentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ComponentId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ComponentId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attribute_id_display_and_from() {
        let id = AttributeId::from("uid");
        assert_eq!(id.to_string(), "uid");
        assert_eq!(id.as_str(), "uid");
        assert_eq!(id, AttributeId::new(String::from("uid")));
    }

    #[test]
    fn component_id_ordering_is_lexicographic() {
        let a = ComponentId::from("alpha");
        let b = ComponentId::from("beta");
        assert!(a < b);
    }

    #[test]
    fn ids_serialize_transparently() {
        let id = AttributeId::from("mail");
        let json = serde_json::to_string(&id).expect("serialize id");
        assert_eq!(json, "\"mail\"");
    }
}
