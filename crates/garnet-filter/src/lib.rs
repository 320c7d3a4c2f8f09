//! # garnet-filter: Attribute release filtering
//!
//! Filtering decides which resolved attribute values may actually be
//! released to a requesting party:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 AttributeFilteringEngine                    │
//! │  ┌──────────────────┐    ┌───────────────────────────────┐  │
//! │  │ policy           │ ─► │ attribute rules               │  │
//! │  │ requirement gate │    │ (matcher in selector mode)    │  │
//! │  │ (Tristate)       │    │ permitted values accumulate   │  │
//! │  └──────────────────┘    └───────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! A [`Matcher`] has two capabilities: evaluated **as a gate** it yields a
//! [`garnet_types::Tristate`] verdict over the whole request; in **selector
//! mode** it picks the matching subset of one attribute's values. Composites
//! ([`AndMatcher`], [`OrMatcher`], [`NotMatcher`]) combine children with
//! fail-closed tristate logic.
//!
//! The engine applies each [`AttributeFilterPolicy`] in stable order: a
//! `True` requirement gate lets the policy's rules contribute permitted
//! values (additively across policies); `False` and `Fail` contribute
//! nothing. Attributes no policy permits are removed entirely.

mod context;
mod engine;
mod error;
mod logic;
mod matcher;
mod matchers;
mod policy;

pub use context::FilterContext;
pub use engine::AttributeFilteringEngine;
pub use error::{FilterError, Result};
pub use logic::{AndMatcher, NotMatcher, OrMatcher};
pub use matcher::Matcher;
pub use matchers::{
    AttributeScopeMatcher, AttributeValueMatcher, AttributeValueRegexMatcher,
    AuthenticationMethodMatcher, GatePredicate, IssuerMatcher, PredicateMatcher, RequesterMatcher,
    ValuePredicate,
};
pub use policy::{AttributeFilterPolicy, AttributeRule};
