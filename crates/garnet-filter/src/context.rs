//! Per-request filtering context.

use std::collections::{BTreeMap, HashSet};

use garnet_types::{Attribute, AttributeId, AttributeValue};

/// Per-request state for one filtering pass.
///
/// Carries the resolved attribute map and the requester/issuer/principal
/// facts the gates compare against, and accumulates the permitted values as
/// policies are applied. Owned exclusively by one request; never shared.
#[derive(Debug, Clone)]
pub struct FilterContext {
    principal: String,
    requester: Option<String>,
    issuer: Option<String>,
    authn_method: Option<String>,
    attributes: BTreeMap<AttributeId, Attribute>,
    /// Values permitted so far, per attribute. Policies contributing to the
    /// same attribute are additive (set union).
    permitted: BTreeMap<AttributeId, HashSet<AttributeValue>>,
}

impl FilterContext {
    pub fn new(
        principal: impl Into<String>,
        attributes: BTreeMap<AttributeId, Attribute>,
    ) -> Self {
        Self {
            principal: principal.into(),
            requester: None,
            issuer: None,
            authn_method: None,
            attributes,
            permitted: BTreeMap::new(),
        }
    }

    /// Sets the requesting party.
    pub fn with_requester(mut self, requester: impl Into<String>) -> Self {
        self.requester = Some(requester.into());
        self
    }

    /// Sets the asserting/issuing party.
    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    /// Sets the authentication method of the current session.
    pub fn with_authn_method(mut self, method: impl Into<String>) -> Self {
        self.authn_method = Some(method.into());
        self
    }

    pub fn principal(&self) -> &str {
        &self.principal
    }

    pub fn requester(&self) -> Option<&str> {
        self.requester.as_deref()
    }

    pub fn issuer(&self) -> Option<&str> {
        self.issuer.as_deref()
    }

    pub fn authn_method(&self) -> Option<&str> {
        self.authn_method.as_deref()
    }

    /// The current attribute map (resolved values before filtering, the
    /// permitted subset after).
    pub fn attributes(&self) -> &BTreeMap<AttributeId, Attribute> {
        &self.attributes
    }

    /// Looks up one attribute by id.
    pub fn attribute(&self, id: &AttributeId) -> Option<&Attribute> {
        self.attributes.get(id)
    }

    /// Consumes the context, returning the attribute map.
    pub fn into_attributes(self) -> BTreeMap<AttributeId, Attribute> {
        self.attributes
    }

    /// Adds values to an attribute's permitted set.
    pub(crate) fn permit(
        &mut self,
        id: AttributeId,
        values: impl IntoIterator<Item = AttributeValue>,
    ) {
        self.permitted.entry(id).or_default().extend(values);
    }

    /// Replaces the attribute map with the permitted subset.
    ///
    /// Attributes with an empty permitted set — including every attribute no
    /// policy mentioned — are removed entirely, not retained as empty.
    /// Surviving attributes keep their values in original order.
    pub(crate) fn restrict_to_permitted(&mut self) {
        let permitted = std::mem::take(&mut self.permitted);
        let attributes = std::mem::take(&mut self.attributes);
        self.attributes = attributes
            .into_iter()
            .filter_map(|(id, mut attribute)| {
                let allowed = permitted.get(&id)?;
                attribute.retain_values(|value| allowed.contains(value));
                if attribute.is_empty() {
                    None
                } else {
                    Some((id, attribute))
                }
            })
            .collect();
    }
}
