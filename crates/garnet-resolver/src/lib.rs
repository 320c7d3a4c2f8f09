//! # garnet-resolver: Dependency-graph attribute resolution
//!
//! Resolution executes a declared dependency graph of attribute-producing
//! components against a per-request [`ResolutionContext`]:
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                    AttributeResolver                       │
//! │  ┌──────────────┐      ┌───────────────┐   ┌────────────┐  │
//! │  │ definitions  │ ───► │ data          │ ─► │ results    │  │
//! │  │ (derive/map) │ deps │ connectors    │   │ cache      │  │
//! │  └──────────────┘      │ (external IO) │   │ (shared)   │  │
//! │                        └───────────────┘   └────────────┘  │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! - [`AttributeDefinition`]s compute one attribute each from dependency
//!   values and/or connector results.
//! - [`DataConnector`]s fetch raw data from external systems, optionally
//!   cached and health-checked; the `execute()` call is the only blocking
//!   step of a resolution.
//! - [`AttributeResolver`] validates the combined graph is acyclic at
//!   `initialize()` and walks it in topological order at `resolve()`,
//!   memoizing every node in the context so each component runs at most once
//!   per request.
//!
//! The configured graph is immutable after initialization and shared across
//! request threads without locking; the [`ResultsCache`] is the only shared
//! mutable state.

mod cache;
mod connector;
mod connectors;
mod context;
mod definition;
mod definitions;
mod error;
mod resolver;
mod template;

pub use cache::{CacheKey, ResultsCache};
pub use connector::{
    ClientError, DataConnector, ExecutableQuery, ExternalClient, RawResult, RawValue, Record,
    Validator,
};
pub use connectors::{
    DirectoryConnector, KeyValueConnector, RelationalConnector, StaticDataConnector,
};
pub use context::ResolutionContext;
pub use definition::{AttributeDefinition, ResolvedDependencies};
pub use definitions::{
    MappedAttributeDefinition, PrincipalNameDefinition, ScopedAttributeDefinition,
    SimpleAttributeDefinition, TemplateAttributeDefinition,
};
pub use error::{ResolverError, Result};
pub use resolver::AttributeResolver;
pub use template::{Template, TemplateError};
