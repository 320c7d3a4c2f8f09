//! Per-request resolution state.
//!
//! A [`ResolutionContext`] is owned exclusively by one request. It carries
//! the identity facts the components may consult (principal, requester,
//! issuer, authentication method) and the memoization tables that guarantee
//! each definition/connector executes at most once per request, however many
//! dependents reference it. Contexts are never shared across requests.

use std::collections::{BTreeMap, HashMap};

use garnet_types::{Attribute, AttributeId, ComponentId};

/// Per-request scratch state for attribute resolution.
#[derive(Debug, Clone)]
pub struct ResolutionContext {
    principal: String,
    requester: Option<String>,
    issuer: Option<String>,
    authn_method: Option<String>,
    resolved_definitions: HashMap<ComponentId, Attribute>,
    resolved_connectors: HashMap<ComponentId, BTreeMap<AttributeId, Attribute>>,
}

impl ResolutionContext {
    /// Creates a context for the given authenticated principal.
    pub fn new(principal: impl Into<String>) -> Self {
        Self {
            principal: principal.into(),
            requester: None,
            issuer: None,
            authn_method: None,
            resolved_definitions: HashMap::new(),
            resolved_connectors: HashMap::new(),
        }
    }

    /// Sets the requesting party (relying party) identity.
    pub fn with_requester(mut self, requester: impl Into<String>) -> Self {
        self.requester = Some(requester.into());
        self
    }

    /// Sets the asserting/issuer identity.
    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    /// Sets the authentication method used by the principal.
    pub fn with_authn_method(mut self, method: impl Into<String>) -> Self {
        self.authn_method = Some(method.into());
        self
    }

    /// The authenticated principal the attributes describe.
    pub fn principal(&self) -> &str {
        &self.principal
    }

    /// The requesting party, if known.
    pub fn requester(&self) -> Option<&str> {
        self.requester.as_deref()
    }

    /// The asserting party, if known.
    pub fn issuer(&self) -> Option<&str> {
        self.issuer.as_deref()
    }

    /// The authentication method, if known.
    pub fn authn_method(&self) -> Option<&str> {
        self.authn_method.as_deref()
    }

    /// The identity facts as template variables (`principal`, `requester`,
    /// `issuer`, `authn_method`; absent facts are omitted).
    pub fn facts(&self) -> BTreeMap<String, String> {
        let mut facts = BTreeMap::new();
        facts.insert("principal".to_string(), self.principal.clone());
        if let Some(requester) = &self.requester {
            facts.insert("requester".to_string(), requester.clone());
        }
        if let Some(issuer) = &self.issuer {
            facts.insert("issuer".to_string(), issuer.clone());
        }
        if let Some(method) = &self.authn_method {
            facts.insert("authn_method".to_string(), method.clone());
        }
        facts
    }

    /// Memoized result of an attribute definition, if it already ran.
    pub fn definition_result(&self, id: &ComponentId) -> Option<&Attribute> {
        self.resolved_definitions.get(id)
    }

    /// Memoized result of a data connector, if it already ran.
    pub fn connector_result(&self, id: &ComponentId) -> Option<&BTreeMap<AttributeId, Attribute>> {
        self.resolved_connectors.get(id)
    }

    pub(crate) fn record_definition(&mut self, id: ComponentId, attribute: Attribute) {
        self.resolved_definitions.insert(id, attribute);
    }

    pub(crate) fn record_connector(
        &mut self,
        id: ComponentId,
        attributes: BTreeMap<AttributeId, Attribute>,
    ) {
        self.resolved_connectors.insert(id, attributes);
    }
}

// ============================================================================
// Tests
// ============================================================================
