//! Resolver error types.
//!
//! Configuration errors (cycles, duplicate ids, unknown references) are
//! fatal at `initialize()`; resolution errors abort the whole request unless
//! a failover connector absorbs them. Connector failures are never silently
//! downgraded to "no attribute".

use garnet_types::{ComponentId, LifecycleError};
use thiserror::Error;

use crate::connector::ClientError;
use crate::template::TemplateError;

/// Result type for resolver operations.
pub type Result<T> = std::result::Result<T, ResolverError>;

/// Error type for graph validation and attribute resolution.
#[derive(Debug, Error)]
pub enum ResolverError {
    /// The combined definition+connector graph contains a cycle.
    #[error("cyclic dependency: {}", format_cycle(.cycle))]
    CyclicDependency {
        /// The components forming the cycle, in edge order, first repeated last.
        cycle: Vec<ComponentId>,
    },

    /// A component failed to initialize (missing property, bad template,
    /// failed connectivity check with a strict validator, ...).
    #[error("component '{component}' failed to initialize: {reason}")]
    ComponentInitialization {
        component: ComponentId,
        reason: String,
    },

    /// Two components were registered under the same id.
    #[error("duplicate component id '{0}'")]
    DuplicateComponent(ComponentId),

    /// A component depends on (or fails over to) an id not present in the graph.
    #[error("component '{component}' references unknown component '{reference}'")]
    UnknownReference {
        component: ComponentId,
        reference: ComponentId,
    },

    /// A data connector's external fetch failed and no failover absorbed it.
    #[error("connector '{connector}' failed: {source}")]
    Connector {
        connector: ComponentId,
        source: ClientError,
    },

    /// A connector configured with `no_result_is_error` produced no values.
    #[error("connector '{connector}' returned no results")]
    NoResultIsError { connector: ComponentId },

    /// A template failed to render during resolution.
    #[error("component '{component}' template error: {source}")]
    Template {
        component: ComponentId,
        source: TemplateError,
    },

    /// Component used before initialization or after destruction.
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
}

fn format_cycle(cycle: &[ComponentId]) -> String {
    cycle
        .iter()
        .map(ComponentId::as_str)
        .collect::<Vec<_>>()
        .join(" -> ")
}
