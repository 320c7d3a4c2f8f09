//! The attribute data model.
//!
//! An [`Attribute`] is a named, ordered sequence of typed values describing
//! one identity fact about a principal. The [`AttributeValue::Empty`] marker
//! distinguishes "resolved but empty" from an attribute that is absent
//! altogether; downstream consumers treat the two differently.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::AttributeId;

// ============================================================================
// AttributeValue
// ============================================================================

/// A single typed value of an identity attribute.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AttributeValue {
    /// A plain string value.
    String(String),
    /// A scoped value, rendered as `value@scope` (e.g. `alice@example.org`).
    Scoped {
        /// The local part of the value.
        value: String,
        /// The scope (typically a security or DNS domain).
        scope: String,
    },
    /// An opaque structured value carried as raw bytes.
    Opaque(Bytes),
    /// Explicit "resolved but empty" marker. Not the same as an absent
    /// attribute: the attribute id exists, it just carries no data.
    Empty,
}

impl AttributeValue {
    /// Creates a plain string value.
    pub fn string(value: impl Into<String>) -> Self {
        Self::String(value.into())
    }

    /// Creates a scoped value.
    pub fn scoped(value: impl Into<String>, scope: impl Into<String>) -> Self {
        Self::Scoped {
            value: value.into(),
            scope: scope.into(),
        }
    }

    /// The textual rendering used by string comparisons.
    ///
    /// `Opaque` and `Empty` values have no textual form and return `None`;
    /// string matchers treat them as non-matching.
    pub fn as_text(&self) -> Option<String> {
        match self {
            Self::String(s) => Some(s.clone()),
            Self::Scoped { value, scope } => Some(format!("{value}@{scope}")),
            Self::Opaque(_) | Self::Empty => None,
        }
    }

    /// The scope of a scoped value, `None` otherwise.
    pub fn scope(&self) -> Option<&str> {
        match self {
            Self::Scoped { scope, .. } => Some(scope),
            _ => None,
        }
    }

    /// Whether this is the explicit empty marker.
    pub fn is_empty_marker(&self) -> bool {
        matches!(self, Self::Empty)
    }
}

// ============================================================================
// Attribute
// ============================================================================

/// A named, multi-valued identity fact about a principal.
///
/// Values are ordered and duplicate-free; the first occurrence of a value
/// fixes its position. Attributes are mutated only by resolution and
/// filtering steps and are immutable once returned to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    /// The attribute's id.
    pub id: AttributeId,
    /// The ordered values.
    values: Vec<AttributeValue>,
}

impl Attribute {
    /// Creates an attribute with no values ("resolved but empty").
    pub fn empty(id: impl Into<AttributeId>) -> Self {
        Self {
            id: id.into(),
            values: Vec::new(),
        }
    }

    /// Creates an attribute from an ordered value sequence, dropping
    /// duplicates while preserving first positions.
    pub fn new(id: impl Into<AttributeId>, values: impl IntoIterator<Item = AttributeValue>) -> Self {
        let mut attribute = Self::empty(id);
        for value in values {
            attribute.push_value(value);
        }
        attribute
    }

    /// Convenience constructor for plain string values.
    pub fn of_strings<S: Into<String>>(
        id: impl Into<AttributeId>,
        values: impl IntoIterator<Item = S>,
    ) -> Self {
        Self::new(id, values.into_iter().map(|v| AttributeValue::String(v.into())))
    }

    /// The ordered values.
    pub fn values(&self) -> &[AttributeValue] {
        &self.values
    }

    /// Whether the attribute carries no values.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Number of values.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Appends a value unless it is already present.
    pub fn push_value(&mut self, value: AttributeValue) {
        if !self.values.contains(&value) {
            self.values.push(value);
        }
    }

    /// Unions another attribute's values into this one, preserving order.
    /// The other attribute's id is ignored.
    pub fn merge(&mut self, other: &Attribute) {
        for value in &other.values {
            self.push_value(value.clone());
        }
    }

    /// Replaces the value sequence with the given subset, preserving the
    /// original ordering of retained values.
    pub fn retain_values(&mut self, keep: impl Fn(&AttributeValue) -> bool) {
        self.values.retain(|v| keep(v));
    }
}

// ============================================================================
// Tests
// ============================================================================
