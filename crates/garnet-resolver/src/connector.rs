//! Data connector boundary types.
//!
//! A [`DataConnector`] fetches raw data from an external system. The
//! request-time flow is `build()` (pure, computes an [`ExecutableQuery`] and
//! its cache key) → `execute()` (the only blocking step) → `map_results()`
//! (converts raw records into attributes). The external system itself is
//! reached through an injected [`ExternalClient`], which also carries
//! cancellation/timeout behaviour — the resolver just propagates whatever
//! error the client raises.

use std::collections::BTreeMap;
use std::fmt;

use bytes::Bytes;
use garnet_types::{Attribute, AttributeId, ComponentId};
use thiserror::Error;
use tracing::warn;

use crate::cache::{CacheKey, ResultsCache};
use crate::context::ResolutionContext;
use crate::definition::ResolvedDependencies;
use crate::error::{ResolverError, Result};

// ============================================================================
// ClientError
// ============================================================================

/// Errors raised by an external client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// Could not reach the external system.
    #[error("connection failure: {0}")]
    Connection(String),

    /// The external system rejected or failed the query.
    #[error("query failure: {0}")]
    Query(String),

    /// The client's own deadline expired.
    #[error("timed out: {0}")]
    Timeout(String),
}

// ============================================================================
// Raw results
// ============================================================================

/// A single raw field value fetched from an external system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawValue {
    /// Textual value.
    Text(String),
    /// Binary value, carried opaquely.
    Binary(Bytes),
}

/// One raw record (row/entry) from an external system.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    fields: BTreeMap<String, Vec<RawValue>>,
}

impl Record {
    /// Creates an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a value under a field name (fields are multi-valued).
    pub fn with_field(mut self, name: impl Into<String>, value: RawValue) -> Self {
        self.fields.entry(name.into()).or_default().push(value);
        self
    }

    /// Convenience: adds a textual field value.
    pub fn with_text(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.with_field(name, RawValue::Text(value.into()))
    }

    /// The values of a field, empty if the field is absent.
    pub fn values(&self, name: &str) -> &[RawValue] {
        self.fields.get(name).map_or(&[], Vec::as_slice)
    }

    /// Iterates over `(field, values)` pairs in field-name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[RawValue])> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }
}

/// The raw outcome of executing a query: zero or more records.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawResult {
    /// The fetched records, in source order.
    pub records: Vec<Record>,
}

impl RawResult {
    /// A result with no records.
    pub fn empty() -> Self {
        Self::default()
    }

    /// A result from an iterator of records.
    pub fn from_records(records: impl IntoIterator<Item = Record>) -> Self {
        Self {
            records: records.into_iter().collect(),
        }
    }
}

// ============================================================================
// ExecutableQuery
// ============================================================================

/// A fully-built query, ready to execute.
///
/// Produced by [`DataConnector::build`], which must be pure with respect to
/// the context (no I/O). The `cache_key` identifies a reusable fetch result
/// and is computed from context facts and dependency values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutableQuery {
    /// Key identifying a reusable result of this query.
    pub cache_key: CacheKey,
    /// The rendered statement (SQL text, search filter, lookup key, ...).
    pub statement: String,
    /// Named parameters accompanying the statement.
    pub parameters: BTreeMap<String, String>,
}

impl ExecutableQuery {
    /// Creates a query whose cache key is the rendered statement itself.
    pub fn new(statement: impl Into<String>) -> Self {
        let statement = statement.into();
        Self {
            cache_key: CacheKey::new(statement.clone()),
            statement,
            parameters: BTreeMap::new(),
        }
    }

    /// Overrides the cache key.
    pub fn with_cache_key(mut self, key: impl Into<CacheKey>) -> Self {
        self.cache_key = key.into();
        self
    }

    /// Adds a named parameter.
    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }
}

// ============================================================================
// ExternalClient
// ============================================================================

/// A pluggable adapter to one external data source.
///
/// Implementations own connection handling, timeouts and cancellation;
/// `fetch` blocks until the result is available or the client gives up.
pub trait ExternalClient: Send + Sync + fmt::Debug {
    /// Executes the query against the external system.
    fn fetch(&self, query: &ExecutableQuery) -> std::result::Result<RawResult, ClientError>;

    /// Lightweight connectivity check (e.g. open/close a connection).
    fn probe(&self) -> std::result::Result<(), ClientError> {
        Ok(())
    }
}

// ============================================================================
// Validator
// ============================================================================

/// Connector connectivity validation policy.
///
/// Runs the client's `probe()` at connector initialization (and on demand).
/// `strict` validators abort initialization on failure; `lenient` ones only
/// log a warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Validator {
    throw_on_validate_error: bool,
}

impl Validator {
    /// Validation failure aborts connector initialization.
    pub fn strict() -> Self {
        Self {
            throw_on_validate_error: true,
        }
    }

    /// Validation failure is logged and otherwise ignored.
    pub fn lenient() -> Self {
        Self {
            throw_on_validate_error: false,
        }
    }

    /// Whether a failed check aborts initialization.
    pub fn is_strict(&self) -> bool {
        self.throw_on_validate_error
    }

    /// Probes the client, applying this validator's failure policy.
    pub fn check(&self, connector: &ComponentId, client: &dyn ExternalClient) -> Result<()> {
        match client.probe() {
            Ok(()) => Ok(()),
            Err(source) if self.throw_on_validate_error => {
                Err(ResolverError::ComponentInitialization {
                    component: connector.clone(),
                    reason: format!("connectivity check failed: {source}"),
                })
            }
            Err(source) => {
                warn!(connector = %connector, error = %source, "connectivity check failed");
                Ok(())
            }
        }
    }
}

// ============================================================================
// DataConnector
// ============================================================================

/// A configured component that fetches raw data from an external system.
///
/// Connectors are immutable once initialized and shared read-only across
/// requests. Per-request state lives in the [`ResolutionContext`]; results
/// may additionally be shared across requests through a [`ResultsCache`].
pub trait DataConnector: Send + Sync + fmt::Debug {
    /// The connector's id in the resolution graph.
    fn id(&self) -> &ComponentId;

    /// Ids of components this connector depends on.
    fn dependencies(&self) -> &[ComponentId] {
        &[]
    }

    /// Secondary connector tried once when this one fails.
    fn failover(&self) -> Option<&ComponentId> {
        None
    }

    /// Whether a result with zero values aborts the resolution.
    fn no_result_is_error(&self) -> bool {
        false
    }

    /// Cross-request memo of fetch results, if configured.
    fn cache(&self) -> Option<&ResultsCache> {
        None
    }

    /// Builds the query for this request. Pure: no I/O.
    fn build(&self, ctx: &ResolutionContext, deps: &ResolvedDependencies)
        -> Result<ExecutableQuery>;

    /// Performs the actual fetch. The only blocking step.
    fn execute(&self, query: &ExecutableQuery) -> Result<RawResult>;

    /// Converts raw records into attributes.
    ///
    /// Unconvertible values must still surface their attribute id with zero
    /// values ("present but empty"), distinct from the id being absent —
    /// downstream consumers treat the two differently.
    fn map_results(&self, raw: RawResult) -> Result<BTreeMap<AttributeId, Attribute>>;
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct UnreachableClient;

    impl ExternalClient for UnreachableClient {
        fn fetch(&self, _query: &ExecutableQuery) -> std::result::Result<RawResult, ClientError> {
            Err(ClientError::Connection("refused".to_string()))
        }

        fn probe(&self) -> std::result::Result<(), ClientError> {
            Err(ClientError::Connection("refused".to_string()))
        }
    }

    #[derive(Debug)]
    struct HealthyClient;

    impl ExternalClient for HealthyClient {
        fn fetch(&self, _query: &ExecutableQuery) -> std::result::Result<RawResult, ClientError> {
            Ok(RawResult::empty())
        }
    }

    #[test]
    fn strict_validator_aborts_on_probe_failure() {
        let connector = ComponentId::from("db");
        let err = Validator::strict()
            .check(&connector, &UnreachableClient)
            .expect_err("strict validator must abort");
        assert!(matches!(
            err,
            ResolverError::ComponentInitialization { .. }
        ));
    }

    #[test]
    fn lenient_validator_only_logs() {
        let connector = ComponentId::from("db");
        Validator::lenient()
            .check(&connector, &UnreachableClient)
            .expect("lenient validator must not abort");
    }

    #[test]
    fn healthy_probe_passes_both_policies() {
        let connector = ComponentId::from("db");
        Validator::strict()
            .check(&connector, &HealthyClient)
            .expect("healthy probe");
        Validator::lenient()
            .check(&connector, &HealthyClient)
            .expect("healthy probe");
    }

    #[test]
    fn query_defaults_cache_key_to_statement() {
        let query = ExecutableQuery::new("SELECT mail FROM users WHERE uid = :uid")
            .with_parameter("uid", "alice");
        assert_eq!(
            query.cache_key.as_str(),
            "SELECT mail FROM users WHERE uid = :uid"
        );
        assert_eq!(query.parameters.get("uid").map(String::as_str), Some("alice"));

        let keyed = ExecutableQuery::new("k").with_cache_key("other");
        assert_eq!(keyed.cache_key.as_str(), "other");
    }

    #[test]
    fn record_fields_are_multi_valued() {
        let record = Record::new()
            .with_text("mail", "alice@example.org")
            .with_text("mail", "alice@alumni.example.org");
        assert_eq!(record.values("mail").len(), 2);
        assert!(record.values("absent").is_empty());
    }
}
