//! The resolve-then-filter pipeline.

use std::collections::BTreeMap;

use garnet_filter::{AttributeFilteringEngine, FilterContext};
use garnet_resolver::{AttributeResolver, ResolutionContext};
use garnet_types::{Attribute, AttributeId};
use tracing::debug;

use crate::error::Result;

/// The facts a session layer knows about one release request.
#[derive(Debug, Clone)]
pub struct SubjectFacts {
    principal: String,
    requester: Option<String>,
    issuer: Option<String>,
    authn_method: Option<String>,
}

impl SubjectFacts {
    pub fn new(principal: impl Into<String>) -> Self {
        Self {
            principal: principal.into(),
            requester: None,
            issuer: None,
            authn_method: None,
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
}

/// Resolves a principal's attributes and filters them down to the subset the
/// requester may see.
///
/// Both components must be initialized before the pipeline is built; the
/// pipeline itself is stateless per request and can serve requests from
/// multiple threads behind an `Arc`.
#[derive(Debug)]
pub struct ReleasePipeline {
    resolver: AttributeResolver,
    engine: AttributeFilteringEngine,
}

impl ReleasePipeline {
    pub fn new(resolver: AttributeResolver, engine: AttributeFilteringEngine) -> Self {
        Self { resolver, engine }
    }

    /// Runs resolve-then-filter for one request.
    ///
    /// The returned map contains only attributes with at least one permitted
    /// value; a denied attribute is absent, never present-but-empty.
    pub fn release(&self, facts: &SubjectFacts) -> Result<BTreeMap<AttributeId, Attribute>> {
        let mut resolution = ResolutionContext::new(facts.principal.clone());
        if let Some(requester) = &facts.requester {
            resolution = resolution.with_requester(requester.clone());
        }
        if let Some(issuer) = &facts.issuer {
            resolution = resolution.with_issuer(issuer.clone());
        }
        if let Some(method) = &facts.authn_method {
            resolution = resolution.with_authn_method(method.clone());
        }

        let resolved = self.resolver.resolve(&mut resolution)?;
        debug!(
            principal = %facts.principal,
            resolved = resolved.len(),
            "resolution finished; filtering"
        );

        let mut filtering = FilterContext::new(facts.principal.clone(), resolved);
        if let Some(requester) = &facts.requester {
            filtering = filtering.with_requester(requester.clone());
        }
        if let Some(issuer) = &facts.issuer {
            filtering = filtering.with_issuer(issuer.clone());
        }
        if let Some(method) = &facts.authn_method {
            filtering = filtering.with_authn_method(method.clone());
        }

        self.engine.filter(&mut filtering)?;
        Ok(filtering.into_attributes())
    }
}
