//! Configured-component lifecycle.
//!
//! Every configured component (definition, connector, matcher, policy,
//! resolver, engine) moves through the same three-state machine:
//!
//! ```text
//! Unconfigured --initialize()--> Ready --destroy()--> Destroyed
//! ```
//!
//! Configuration is mutable only before `initialize()`; once `Ready`, a
//! component is immutable and may be shared across concurrently executing
//! requests without locking. Calls before initialization or after
//! destruction are caller programming errors and always surface as
//! [`LifecycleError`], never get swallowed.

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// ComponentState
// ============================================================================

/// The lifecycle state of a configured component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComponentState {
    /// Constructed and still configurable; not yet usable.
    Unconfigured,
    /// Initialized; immutable and usable any number of times.
    Ready,
    /// Destroyed; all further calls fail.
    Destroyed,
}

// ============================================================================
// LifecycleError
// ============================================================================

/// Lifecycle-misuse errors. These indicate a bug in the caller and are
/// always propagated.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LifecycleError {
    /// The component was used before `initialize()`.
    #[error("component '{component}' has not been initialized")]
    NotInitialized {
        /// Name/id of the offending component.
        component: String,
    },

    /// The component was used (or re-initialized) after `destroy()`.
    #[error("component '{component}' has been destroyed")]
    Destroyed {
        /// Name/id of the offending component.
        component: String,
    },

    /// `initialize()` was called on an already-initialized component.
    /// Reconfiguration after initialization is forbidden by design.
    #[error("component '{component}' is already initialized")]
    AlreadyInitialized {
        /// Name/id of the offending component.
        component: String,
    },
}

// ============================================================================
// Lifecycle
// ============================================================================

/// A lifecycle guard embedded in every configured component.
///
/// The guard carries the owning component's name so lifecycle errors name
/// the offender. The checked ordering contract for component entry points
/// is: capture any configured snapshot first, then `ensure_ready()` — which
/// checks not-initialized before destroyed.
#[derive(Debug, Clone)]
pub struct Lifecycle {
    component: String,
    state: ComponentState,
}

impl Lifecycle {
    /// Creates a guard in the `Unconfigured` state.
    pub fn new(component: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            state: ComponentState::Unconfigured,
        }
    }

    /// The current state.
    pub fn state(&self) -> ComponentState {
        self.state
    }

    /// The owning component's name.
    pub fn component(&self) -> &str {
        &self.component
    }

    /// Transitions `Unconfigured` → `Ready`.
    ///
    /// Errors if already initialized or destroyed; a destroyed component can
    /// never be revived.
    pub fn mark_ready(&mut self) -> Result<(), LifecycleError> {
        match self.state {
            ComponentState::Unconfigured => {
                self.state = ComponentState::Ready;
                Ok(())
            }
            ComponentState::Ready => Err(LifecycleError::AlreadyInitialized {
                component: self.component.clone(),
            }),
            ComponentState::Destroyed => Err(LifecycleError::Destroyed {
                component: self.component.clone(),
            }),
        }
    }

    /// Transitions to `Destroyed`. Destroying twice is an error.
    pub fn mark_destroyed(&mut self) -> Result<(), LifecycleError> {
        match self.state {
            ComponentState::Destroyed => Err(LifecycleError::Destroyed {
                component: self.component.clone(),
            }),
            _ => {
                self.state = ComponentState::Destroyed;
                Ok(())
            }
        }
    }

    /// Errors unless the component is `Ready`.
    ///
    /// The not-initialized check precedes the destroyed check; callers rely
    /// on this ordering being observable in tests.
    pub fn ensure_ready(&self) -> Result<(), LifecycleError> {
        match self.state {
            ComponentState::Unconfigured => Err(LifecycleError::NotInitialized {
                component: self.component.clone(),
            }),
            ComponentState::Destroyed => Err(LifecycleError::Destroyed {
                component: self.component.clone(),
            }),
            ComponentState::Ready => Ok(()),
        }
    }

    /// Errors unless the component is still configurable.
    pub fn ensure_unconfigured(&self) -> Result<(), LifecycleError> {
        match self.state {
            ComponentState::Unconfigured => Ok(()),
            ComponentState::Ready => Err(LifecycleError::AlreadyInitialized {
                component: self.component.clone(),
            }),
            ComponentState::Destroyed => Err(LifecycleError::Destroyed {
                component: self.component.clone(),
            }),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
