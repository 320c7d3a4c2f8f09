//! # garnet-types: Core types for Garnet
//!
//! This crate contains shared types used across the Garnet decision core:
//! - Component identifiers ([`AttributeId`], [`ComponentId`])
//! - The attribute data model ([`Attribute`], [`AttributeValue`])
//! - Tristate gate logic ([`Tristate`])
//! - The configured-component lifecycle ([`Lifecycle`], [`ComponentState`],
//!   [`LifecycleError`])
//!
//! Everything here is request-agnostic: per-request state lives in the
//! resolution and filter contexts of the downstream crates.

mod attribute;
mod ids;
mod lifecycle;
mod tristate;

pub use attribute::{Attribute, AttributeValue};
pub use ids::{AttributeId, ComponentId};
pub use lifecycle::{ComponentState, Lifecycle, LifecycleError};
pub use tristate::Tristate;
