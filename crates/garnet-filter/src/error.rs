//! Filtering error types.

use garnet_types::{ComponentId, LifecycleError};
use thiserror::Error;

/// Errors raised while configuring matchers/policies or filtering attributes.
#[derive(Debug, Error)]
pub enum FilterError {
    /// A composite matcher was initialized with no children.
    #[error("composite matcher '{0}' has no children")]
    EmptyComposite(ComponentId),

    /// A component failed to initialize (missing property, surplus child,
    /// duplicate policy id, ...).
    #[error("component '{component}' failed to initialize: {reason}")]
    ComponentInitialization {
        component: ComponentId,
        reason: String,
    },

    /// A matcher was constructed with a pattern that does not compile.
    #[error("matcher '{component}' has an invalid pattern: {source}")]
    InvalidPattern {
        component: ComponentId,
        #[source]
        source: regex::Error,
    },

    /// A matcher failed while evaluating as a release gate. Gate errors
    /// propagate to the caller; a silent `Fail` could mask misconfiguration
    /// an operator needs to see.
    #[error("matcher '{component}' evaluation failed: {reason}")]
    Evaluation {
        component: ComponentId,
        reason: String,
    },

    /// A component was used before `initialize()` or after `destroy()`.
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
}

/// Convenience alias used throughout the filtering crate.
pub type Result<T> = std::result::Result<T, FilterError>;
