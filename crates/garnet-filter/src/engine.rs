//! The attribute filtering engine.

use garnet_types::Lifecycle;
use tracing::{debug, info};

use crate::context::FilterContext;
use crate::error::{FilterError, Result};
use crate::policy::AttributeFilterPolicy;

/// Applies the configured policies to a request's resolved attributes.
///
/// Policies are visited in configured order, which is stable for audit
/// purposes; the outcome is order-independent because contributions combine
/// by set union. Default-deny: an attribute no policy permits is removed
/// from the context entirely.
#[derive(Debug)]
pub struct AttributeFilteringEngine {
    policies: Vec<AttributeFilterPolicy>,
    lifecycle: Lifecycle,
}

impl Default for AttributeFilteringEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl AttributeFilteringEngine {
    pub fn new() -> Self {
        Self {
            policies: Vec::new(),
            lifecycle: Lifecycle::new("attribute-filtering-engine"),
        }
    }

    /// Adds an (already initialized) policy. Policies apply in the order
    /// they are added.
    pub fn with_policy(mut self, policy: AttributeFilterPolicy) -> Self {
        self.policies.push(policy);
        self
    }

    pub fn initialize(&mut self) -> Result<()> {
        self.lifecycle.ensure_unconfigured()?;
        for (index, policy) in self.policies.iter().enumerate() {
            policy.ensure_ready()?;
            if self.policies[..index].iter().any(|p| p.id() == policy.id()) {
                return Err(FilterError::ComponentInitialization {
                    component: policy.id().clone(),
                    reason: "duplicate policy id".to_string(),
                });
            }
        }
        self.lifecycle.mark_ready()?;
        info!(policies = self.policies.len(), "filtering engine initialized");
        Ok(())
    }

    pub fn destroy(&mut self) -> Result<()> {
        self.lifecycle.mark_destroyed()?;
        Ok(())
    }

    /// Filters the context's attribute map in place down to the permitted
    /// subset.
    ///
    /// A policy whose requirement gate yields `False` or `Fail` contributes
    /// nothing. A gate error aborts the pass and propagates; per-value
    /// selector errors are absorbed by the matchers themselves.
    pub fn filter(&self, ctx: &mut FilterContext) -> Result<()> {
        self.lifecycle.ensure_ready()?;
        for policy in &self.policies {
            let verdict = policy.requirement().gate(ctx)?;
            if !verdict.is_true() {
                debug!(policy = %policy.id(), ?verdict, "requirement not met; policy skipped");
                continue;
            }
            for rule in policy.rules() {
                let Some(attribute) = ctx.attribute(rule.attribute_id()) else {
                    continue;
                };
                let attribute = attribute.clone();
                let selected = rule.matcher().select(&attribute, ctx)?;
                debug!(
                    policy = %policy.id(),
                    attribute = %rule.attribute_id(),
                    selected = selected.len(),
                    "rule applied"
                );
                ctx.permit(rule.attribute_id().clone(), selected);
            }
        }
        ctx.restrict_to_permitted();
        info!(attributes = ctx.attributes().len(), "attribute filtering complete");
        Ok(())
    }
}
