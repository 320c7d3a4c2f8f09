//! The matcher abstraction.

use std::fmt;

use garnet_types::{Attribute, AttributeValue, ComponentId, Tristate};

use crate::context::FilterContext;
use crate::error::Result;

/// A release-decision component with two capabilities.
///
/// As a **gate**, a matcher judges the whole request context: may this
/// policy's rules run at all? As a **selector**, it judges individual
/// attribute values: which of these may be released?
///
/// Error contract: an error while evaluating as a gate propagates to the
/// caller. Selector implementations absorb per-value evaluation errors (log
/// and treat the value as non-matching) so one bad value never aborts the
/// filter pass. Missing context — an absent fact or gate target attribute —
/// is [`Tristate::Fail`], not an error.
pub trait Matcher: Send + Sync + fmt::Debug {
    /// The matcher's component id.
    fn id(&self) -> &ComponentId;

    /// Evaluates this matcher as a release gate over the request context.
    fn gate(&self, ctx: &FilterContext) -> Result<Tristate>;

    /// Selects the matching subset of the attribute's values, preserving the
    /// attribute's value order.
    ///
    /// The default adapts a gate-only matcher: a `True` gate selects every
    /// value, `False` and `Fail` select none.
    fn select(&self, attribute: &Attribute, ctx: &FilterContext) -> Result<Vec<AttributeValue>> {
        if self.gate(ctx)?.is_true() {
            Ok(attribute.values().to_vec())
        } else {
            Ok(Vec::new())
        }
    }
}
