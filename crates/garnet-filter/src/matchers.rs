//! Leaf matchers.
//!
//! Each leaf compares one fact: an attribute's values against a literal or
//! pattern, a value's scope, or a request fact (requester, issuer,
//! authentication method). [`PredicateMatcher`] takes injected closures for
//! decisions the built-in leaves cannot express.

use std::fmt;
use std::sync::Arc;

use garnet_types::{Attribute, AttributeId, AttributeValue, ComponentId, Lifecycle, Tristate};
use regex::Regex;
use tracing::warn;

use crate::context::FilterContext;
use crate::error::{FilterError, Result};
use crate::matcher::Matcher;

fn value_text_matches(value: &AttributeValue, expected: &str, case_insensitive: bool) -> bool {
    match value.as_text() {
        Some(text) if case_insensitive => text.eq_ignore_ascii_case(expected),
        Some(text) => text == expected,
        // Opaque and empty-marker values have no textual form.
        None => false,
    }
}

// ============================================================================
// AttributeValueMatcher
// ============================================================================

/// Matches values by string equality.
///
/// As a gate, checks whether the target attribute carries a matching value;
/// an absent target attribute is `Fail`.
#[derive(Debug)]
pub struct AttributeValueMatcher {
    id: ComponentId,
    /// Gate target: the attribute whose values decide the gate verdict.
    attribute_id: AttributeId,
    value: String,
    case_insensitive: bool,
    lifecycle: Lifecycle,
}

impl AttributeValueMatcher {
    pub fn new(
        id: impl Into<ComponentId>,
        attribute_id: impl Into<AttributeId>,
        value: impl Into<String>,
    ) -> Self {
        let id = id.into();
        Self {
            lifecycle: Lifecycle::new(id.as_str()),
            id,
            attribute_id: attribute_id.into(),
            value: value.into(),
            case_insensitive: false,
        }
    }

    /// Compares values case-insensitively (ASCII).
    pub fn case_insensitive(mut self) -> Self {
        self.case_insensitive = true;
        self
    }

    pub fn initialize(&mut self) -> Result<()> {
        self.lifecycle.ensure_unconfigured()?;
        if self.value.is_empty() {
            return Err(FilterError::ComponentInitialization {
                component: self.id.clone(),
                reason: "match value must not be empty".to_string(),
            });
        }
        self.lifecycle.mark_ready()?;
        Ok(())
    }

    pub fn destroy(&mut self) -> Result<()> {
        self.lifecycle.mark_destroyed()?;
        Ok(())
    }
}

impl Matcher for AttributeValueMatcher {
    fn id(&self) -> &ComponentId {
        &self.id
    }

    fn gate(&self, ctx: &FilterContext) -> Result<Tristate> {
        self.lifecycle.ensure_ready()?;
        let Some(attribute) = ctx.attribute(&self.attribute_id) else {
            return Ok(Tristate::Fail);
        };
        Ok(Tristate::from_bool(attribute.values().iter().any(|v| {
            value_text_matches(v, &self.value, self.case_insensitive)
        })))
    }

    fn select(&self, attribute: &Attribute, _ctx: &FilterContext) -> Result<Vec<AttributeValue>> {
        self.lifecycle.ensure_ready()?;
        Ok(attribute
            .values()
            .iter()
            .filter(|v| value_text_matches(v, &self.value, self.case_insensitive))
            .cloned()
            .collect())
    }
}

// ============================================================================
// AttributeValueRegexMatcher
// ============================================================================

/// Matches values against a regular expression.
///
/// The pattern is compiled at construction; an invalid pattern is a
/// configuration error before the matcher can ever become ready.
#[derive(Debug)]
pub struct AttributeValueRegexMatcher {
    id: ComponentId,
    attribute_id: AttributeId,
    pattern: Regex,
    lifecycle: Lifecycle,
}

impl AttributeValueRegexMatcher {
    pub fn new(
        id: impl Into<ComponentId>,
        attribute_id: impl Into<AttributeId>,
        pattern: &str,
    ) -> Result<Self> {
        let id = id.into();
        let pattern = Regex::new(pattern).map_err(|source| FilterError::InvalidPattern {
            component: id.clone(),
            source,
        })?;
        Ok(Self {
            lifecycle: Lifecycle::new(id.as_str()),
            id,
            attribute_id: attribute_id.into(),
            pattern,
        })
    }

    pub fn initialize(&mut self) -> Result<()> {
        self.lifecycle.ensure_unconfigured()?;
        self.lifecycle.mark_ready()?;
        Ok(())
    }

    pub fn destroy(&mut self) -> Result<()> {
        self.lifecycle.mark_destroyed()?;
        Ok(())
    }

    fn matches(&self, value: &AttributeValue) -> bool {
        value
            .as_text()
            .is_some_and(|text| self.pattern.is_match(&text))
    }
}

impl Matcher for AttributeValueRegexMatcher {
    fn id(&self) -> &ComponentId {
        &self.id
    }

    fn gate(&self, ctx: &FilterContext) -> Result<Tristate> {
        self.lifecycle.ensure_ready()?;
        let Some(attribute) = ctx.attribute(&self.attribute_id) else {
            return Ok(Tristate::Fail);
        };
        Ok(Tristate::from_bool(
            attribute.values().iter().any(|v| self.matches(v)),
        ))
    }

    fn select(&self, attribute: &Attribute, _ctx: &FilterContext) -> Result<Vec<AttributeValue>> {
        self.lifecycle.ensure_ready()?;
        Ok(attribute
            .values()
            .iter()
            .filter(|v| self.matches(v))
            .cloned()
            .collect())
    }
}

// ============================================================================
// AttributeScopeMatcher
// ============================================================================

#[derive(Debug)]
enum ScopeMatch {
    Exact(String),
    Pattern(Regex),
}

/// Matches scoped values by their scope, exactly or by pattern. Unscoped
/// values never match.
#[derive(Debug)]
pub struct AttributeScopeMatcher {
    id: ComponentId,
    attribute_id: AttributeId,
    scope: ScopeMatch,
    lifecycle: Lifecycle,
}

impl AttributeScopeMatcher {
    pub fn new(
        id: impl Into<ComponentId>,
        attribute_id: impl Into<AttributeId>,
        scope: impl Into<String>,
    ) -> Self {
        let id = id.into();
        Self {
            lifecycle: Lifecycle::new(id.as_str()),
            id,
            attribute_id: attribute_id.into(),
            scope: ScopeMatch::Exact(scope.into()),
        }
    }

    /// Pattern variant: the scope must match the whole regex.
    pub fn with_pattern(
        id: impl Into<ComponentId>,
        attribute_id: impl Into<AttributeId>,
        pattern: &str,
    ) -> Result<Self> {
        let id = id.into();
        let pattern = Regex::new(pattern).map_err(|source| FilterError::InvalidPattern {
            component: id.clone(),
            source,
        })?;
        Ok(Self {
            lifecycle: Lifecycle::new(id.as_str()),
            id,
            attribute_id: attribute_id.into(),
            scope: ScopeMatch::Pattern(pattern),
        })
    }

    pub fn initialize(&mut self) -> Result<()> {
        self.lifecycle.ensure_unconfigured()?;
        if let ScopeMatch::Exact(scope) = &self.scope {
            if scope.is_empty() {
                return Err(FilterError::ComponentInitialization {
                    component: self.id.clone(),
                    reason: "scope must not be empty".to_string(),
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

    fn matches(&self, value: &AttributeValue) -> bool {
        let Some(scope) = value.scope() else {
            return false;
        };
        match &self.scope {
            ScopeMatch::Exact(expected) => scope == expected,
            ScopeMatch::Pattern(pattern) => pattern.is_match(scope),
        }
    }
}

impl Matcher for AttributeScopeMatcher {
    fn id(&self) -> &ComponentId {
        &self.id
    }

    fn gate(&self, ctx: &FilterContext) -> Result<Tristate> {
        self.lifecycle.ensure_ready()?;
        let Some(attribute) = ctx.attribute(&self.attribute_id) else {
            return Ok(Tristate::Fail);
        };
        Ok(Tristate::from_bool(
            attribute.values().iter().any(|v| self.matches(v)),
        ))
    }

    fn select(&self, attribute: &Attribute, _ctx: &FilterContext) -> Result<Vec<AttributeValue>> {
        self.lifecycle.ensure_ready()?;
        Ok(attribute
            .values()
            .iter()
            .filter(|v| self.matches(v))
            .cloned()
            .collect())
    }
}

// ============================================================================
// Request-fact matchers
// ============================================================================

macro_rules! fact_matcher {
    ($(#[$doc:meta])* $name:ident, $accessor:ident) => {
        $(#[$doc])*
        #[derive(Debug)]
        pub struct $name {
            id: ComponentId,
            expected: String,
            lifecycle: Lifecycle,
        }

        impl $name {
            pub fn new(id: impl Into<ComponentId>, expected: impl Into<String>) -> Self {
                let id = id.into();
                Self {
                    lifecycle: Lifecycle::new(id.as_str()),
                    id,
                    expected: expected.into(),
                }
            }

            pub fn initialize(&mut self) -> Result<()> {
                self.lifecycle.ensure_unconfigured()?;
                if self.expected.is_empty() {
                    return Err(FilterError::ComponentInitialization {
                        component: self.id.clone(),
                        reason: "expected value must not be empty".to_string(),
                    });
                }
                self.lifecycle.mark_ready()?;
                Ok(())
            }

            pub fn destroy(&mut self) -> Result<()> {
                self.lifecycle.mark_destroyed()?;
                Ok(())
            }
        }

        impl Matcher for $name {
            fn id(&self) -> &ComponentId {
                &self.id
            }

            /// A missing fact is `Fail`, not `False`: the gate cannot decide.
            fn gate(&self, ctx: &FilterContext) -> Result<Tristate> {
                self.lifecycle.ensure_ready()?;
                match ctx.$accessor() {
                    Some(fact) => Ok(Tristate::from_bool(fact == self.expected)),
                    None => Ok(Tristate::Fail),
                }
            }
        }
    };
}

fact_matcher!(
    /// Gates on the requesting party's identifier.
    RequesterMatcher,
    requester
);
fact_matcher!(
    /// Gates on the asserting/issuing party's identifier.
    IssuerMatcher,
    issuer
);
fact_matcher!(
    /// Gates on the authentication method of the current session.
    AuthenticationMethodMatcher,
    authn_method
);

// ============================================================================
// PredicateMatcher
// ============================================================================

/// Gate decision closure. An `Err` propagates to the filtering caller.
pub type GatePredicate =
    dyn Fn(&FilterContext) -> std::result::Result<bool, String> + Send + Sync;

/// Per-value decision closure. An `Err` is logged and the value treated as
/// non-matching.
pub type ValuePredicate =
    dyn Fn(&AttributeValue, &FilterContext) -> std::result::Result<bool, String> + Send + Sync;

/// Matcher driven by injected closures, for decisions the declarative leaves
/// cannot express.
pub struct PredicateMatcher {
    id: ComponentId,
    gate: Option<Arc<GatePredicate>>,
    value: Option<Arc<ValuePredicate>>,
    lifecycle: Lifecycle,
}

impl fmt::Debug for PredicateMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PredicateMatcher")
            .field("id", &self.id)
            .field("gate", &self.gate.is_some())
            .field("value", &self.value.is_some())
            .finish()
    }
}

impl PredicateMatcher {
    pub fn new(id: impl Into<ComponentId>) -> Self {
        let id = id.into();
        Self {
            lifecycle: Lifecycle::new(id.as_str()),
            id,
            gate: None,
            value: None,
        }
    }

    /// Sets the gate predicate.
    pub fn with_gate<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&FilterContext) -> std::result::Result<bool, String> + Send + Sync + 'static,
    {
        self.gate = Some(Arc::new(predicate));
        self
    }

    /// Sets the per-value predicate.
    pub fn with_value_predicate<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&AttributeValue, &FilterContext) -> std::result::Result<bool, String>
            + Send
            + Sync
            + 'static,
    {
        self.value = Some(Arc::new(predicate));
        self
    }

    pub fn initialize(&mut self) -> Result<()> {
        self.lifecycle.ensure_unconfigured()?;
        if self.gate.is_none() && self.value.is_none() {
            return Err(FilterError::ComponentInitialization {
                component: self.id.clone(),
                reason: "at least one predicate is required".to_string(),
            });
        }
        self.lifecycle.mark_ready()?;
        Ok(())
    }

    pub fn destroy(&mut self) -> Result<()> {
        self.lifecycle.mark_destroyed()?;
        Ok(())
    }
}

impl Matcher for PredicateMatcher {
    fn id(&self) -> &ComponentId {
        &self.id
    }

    /// Without a gate predicate the matcher cannot decide and yields `Fail`.
    /// A predicate error propagates as [`FilterError::Evaluation`].
    fn gate(&self, ctx: &FilterContext) -> Result<Tristate> {
        self.lifecycle.ensure_ready()?;
        let Some(gate) = &self.gate else {
            return Ok(Tristate::Fail);
        };
        match gate(ctx) {
            Ok(verdict) => Ok(Tristate::from_bool(verdict)),
            Err(reason) => Err(FilterError::Evaluation {
                component: self.id.clone(),
                reason,
            }),
        }
    }

    /// A per-value predicate error is logged and the value treated as
    /// non-matching, so one bad value never aborts the filter pass.
    fn select(&self, attribute: &Attribute, ctx: &FilterContext) -> Result<Vec<AttributeValue>> {
        self.lifecycle.ensure_ready()?;
        let Some(predicate) = &self.value else {
            return if self.gate(ctx)?.is_true() {
                Ok(attribute.values().to_vec())
            } else {
                Ok(Vec::new())
            };
        };
        let mut selected = Vec::new();
        for value in attribute.values() {
            match predicate(value, ctx) {
                Ok(true) => selected.push(value.clone()),
                Ok(false) => {}
                Err(reason) => {
                    warn!(
                        matcher = %self.id,
                        attribute = %attribute.id,
                        %reason,
                        "value predicate failed; value treated as non-matching"
                    );
                }
            }
        }
        Ok(selected)
    }
}

// ============================================================================
// Tests
// ============================================================================
