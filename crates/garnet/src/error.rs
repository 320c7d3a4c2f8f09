//! Top-level error type.

use thiserror::Error;

/// Any error the release pipeline can surface.
#[derive(Debug, Error)]
pub enum GarnetError {
    /// Attribute resolution failed.
    #[error(transparent)]
    Resolver(#[from] garnet_resolver::ResolverError),

    /// Attribute filtering failed.
    #[error(transparent)]
    Filter(#[from] garnet_filter::FilterError),
}

/// Convenience alias for pipeline results.
pub type Result<T> = std::result::Result<T, GarnetError>;
