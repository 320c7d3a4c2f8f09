//! Attribute filter policies.

use std::sync::Arc;

use garnet_types::{AttributeId, ComponentId, Lifecycle};

use crate::error::{FilterError, Result};
use crate::matcher::Matcher;

/// One rule of a policy: which values of one attribute may be released.
#[derive(Debug, Clone)]
pub struct AttributeRule {
    attribute_id: AttributeId,
    matcher: Arc<dyn Matcher>,
}

impl AttributeRule {
    pub fn new(attribute_id: impl Into<AttributeId>, matcher: Arc<dyn Matcher>) -> Self {
        Self {
            attribute_id: attribute_id.into(),
            matcher,
        }
    }

    pub fn attribute_id(&self) -> &AttributeId {
        &self.attribute_id
    }

    pub fn matcher(&self) -> &Arc<dyn Matcher> {
        &self.matcher
    }
}

/// A release policy: a requirement gate plus per-attribute selector rules.
///
/// The rules only run when the requirement gate yields `True` for the
/// request. An empty rule list is legal; a rule naming an empty attribute id
/// is a configuration error.
#[derive(Debug)]
pub struct AttributeFilterPolicy {
    id: ComponentId,
    requirement: Arc<dyn Matcher>,
    rules: Vec<AttributeRule>,
    lifecycle: Lifecycle,
}

impl AttributeFilterPolicy {
    pub fn new(id: impl Into<ComponentId>, requirement: Arc<dyn Matcher>) -> Self {
        let id = id.into();
        Self {
            lifecycle: Lifecycle::new(id.as_str()),
            id,
            requirement,
            rules: Vec::new(),
        }
    }

    /// Adds a selector rule for one attribute.
    pub fn with_rule(
        mut self,
        attribute_id: impl Into<AttributeId>,
        matcher: Arc<dyn Matcher>,
    ) -> Self {
        self.rules.push(AttributeRule::new(attribute_id, matcher));
        self
    }

    pub fn initialize(&mut self) -> Result<()> {
        self.lifecycle.ensure_unconfigured()?;
        for rule in &self.rules {
            if rule.attribute_id.as_str().is_empty() {
                return Err(FilterError::ComponentInitialization {
                    component: self.id.clone(),
                    reason: "rule attribute id must not be empty".to_string(),
                });
            }
        }
        self.lifecycle.mark_ready()?;
        Ok(())
    }

    pub fn destroy(&mut self) -> Result<()> {
        self.lifecycle.mark_destroyed()?;
        Ok(())
    }

    pub fn id(&self) -> &ComponentId {
        &self.id
    }

    pub fn requirement(&self) -> &Arc<dyn Matcher> {
        &self.requirement
    }

    pub fn rules(&self) -> &[AttributeRule] {
        &self.rules
    }

    pub(crate) fn ensure_ready(&self) -> Result<()> {
        self.lifecycle.ensure_ready()?;
        Ok(())
    }
}
