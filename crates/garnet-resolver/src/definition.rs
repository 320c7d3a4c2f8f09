//! Attribute definition boundary types.
//!
//! An [`AttributeDefinition`] computes one attribute from the values its
//! dependencies produced (other definitions and/or data connectors). The
//! resolver gathers those values into a [`ResolvedDependencies`] bundle in
//! declared dependency order before calling `compute`.

use std::fmt;

use garnet_types::{Attribute, AttributeId, AttributeValue, ComponentId};

use crate::context::ResolutionContext;
use crate::error::Result;

// ============================================================================
// ResolvedDependencies
// ============================================================================

/// The dependency attributes gathered for one component's execution.
///
/// Holds every attribute produced by the component's declared dependencies,
/// in declared order (connector dependencies contribute all their mapped
/// attributes, in id order).
#[derive(Debug, Clone, Default)]
pub struct ResolvedDependencies {
    attributes: Vec<Attribute>,
}

impl ResolvedDependencies {
    /// An empty bundle (for components without dependencies).
    pub fn empty() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, attribute: Attribute) {
        self.attributes.push(attribute);
    }

    /// All gathered attributes, in gathering order.
    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    /// The first gathered attribute with the given id.
    pub fn attribute(&self, id: &AttributeId) -> Option<&Attribute> {
        self.attributes.iter().find(|a| &a.id == id)
    }

    /// All values carried by attributes with the given id, in order.
    pub fn values_of<'a>(&'a self, id: &'a AttributeId) -> impl Iterator<Item = &'a AttributeValue> {
        self.attributes
            .iter()
            .filter(move |a| &a.id == id)
            .flat_map(|a| a.values().iter())
    }

    /// Textual values for the given id (non-textual values are skipped).
    pub fn text_values_of(&self, id: &AttributeId) -> Vec<String> {
        self.values_of(id).filter_map(AttributeValue::as_text).collect()
    }

    /// Whether any dependency attribute with the given id exists (even with
    /// zero values).
    pub fn contains(&self, id: &AttributeId) -> bool {
        self.attributes.iter().any(|a| &a.id == id)
    }
}

// ============================================================================
// AttributeDefinition
// ============================================================================

/// A configured component that computes/derives one attribute.
///
/// Definitions are immutable once initialized and shared read-only across
/// requests. The dependency set must be acyclic across the whole
/// definition+connector graph; the resolver enforces this at its own
/// `initialize()`.
pub trait AttributeDefinition: Send + Sync + fmt::Debug {
    /// The definition's id in the resolution graph.
    fn id(&self) -> &ComponentId;

    /// Ids of components this definition depends on.
    fn dependencies(&self) -> &[ComponentId] {
        &[]
    }

    /// Whether this definition exists only as an intermediate for other
    /// definitions and is excluded from the resolver's released output.
    fn dependency_only(&self) -> bool {
        false
    }

    /// Computes the attribute for this request.
    fn compute(&self, ctx: &ResolutionContext, deps: &ResolvedDependencies) -> Result<Attribute>;
}

// ============================================================================
// Tests
// ============================================================================
