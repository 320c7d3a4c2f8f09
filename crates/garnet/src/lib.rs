//! # Garnet: attribute resolution and release filtering
//!
//! Garnet is the decision core of an identity-provider backend. It answers
//! two questions for every release request:
//!
//! 1. **What is true about this principal?** — the resolver executes a
//!    dependency graph of attribute definitions and data connectors and
//!    produces the principal's attribute map.
//! 2. **What may this requester see?** — the filtering engine applies
//!    release policies with fail-closed tristate gates and per-value
//!    selectors, reducing the map to the permitted subset.
//!
//! ```text
//!  SubjectFacts ──► AttributeResolver ──► AttributeFilteringEngine ──► released
//!                   (definitions,          (policies, matchers)        attributes
//!                    connectors, cache)
//! ```
//!
//! [`ReleasePipeline`] chains the two steps. The component graph is
//! assembled and initialized by the embedding application (a configuration
//! loader, a test harness); once initialized it is immutable and safely
//! shared across request threads.
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use garnet::{
//!     Attribute, AttributeFilterPolicy, AttributeFilteringEngine, AttributeResolver,
//!     AttributeValueMatcher, ReleasePipeline, RequesterMatcher, StaticDataConnector,
//!     SimpleAttributeDefinition, SubjectFacts,
//! };
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut connector = StaticDataConnector::new("people")
//!     .with_attribute(Attribute::of_strings("uid", ["alice"]));
//! connector.initialize()?;
//!
//! let mut definition =
//!     SimpleAttributeDefinition::new("uid-def", "uid", "uid").with_dependency("people");
//! definition.initialize()?;
//!
//! let mut resolver = AttributeResolver::new()
//!     .with_connector(connector)
//!     .with_definition(definition);
//! resolver.initialize()?;
//!
//! let mut gate = RequesterMatcher::new("sp-gate", "https://sp.example.org");
//! gate.initialize()?;
//! let mut selector = AttributeValueMatcher::new("uid-sel", "uid", "alice");
//! selector.initialize()?;
//!
//! let mut policy = AttributeFilterPolicy::new("release-uid", Arc::new(gate))
//!     .with_rule("uid", Arc::new(selector));
//! policy.initialize()?;
//!
//! let mut engine = AttributeFilteringEngine::new().with_policy(policy);
//! engine.initialize()?;
//!
//! let pipeline = ReleasePipeline::new(resolver, engine);
//! let released = pipeline.release(
//!     &SubjectFacts::new("alice").with_requester("https://sp.example.org"),
//! )?;
//! assert_eq!(released.len(), 1);
//! # Ok(())
//! # }
//! ```

mod error;
mod pipeline;

pub use error::{GarnetError, Result};
pub use pipeline::{ReleasePipeline, SubjectFacts};

// Core data model.
pub use garnet_types::{
    Attribute, AttributeId, AttributeValue, ComponentId, Lifecycle, LifecycleError, Tristate,
};

// Resolution.
pub use garnet_resolver::{
    AttributeDefinition, AttributeResolver, CacheKey, ClientError, DataConnector,
    DirectoryConnector, ExecutableQuery, ExternalClient, KeyValueConnector,
    MappedAttributeDefinition, PrincipalNameDefinition, RawResult, RawValue, Record,
    RelationalConnector, ResolutionContext, ResolvedDependencies, ResolverError, ResultsCache,
    ScopedAttributeDefinition, SimpleAttributeDefinition, StaticDataConnector, Template,
    TemplateAttributeDefinition, TemplateError, Validator,
};

// Filtering.
pub use garnet_filter::{
    AndMatcher, AttributeFilterPolicy, AttributeFilteringEngine, AttributeRule,
    AttributeScopeMatcher, AttributeValueMatcher, AttributeValueRegexMatcher,
    AuthenticationMethodMatcher, FilterContext, FilterError, IssuerMatcher, Matcher, NotMatcher,
    OrMatcher, PredicateMatcher, RequesterMatcher,
};
