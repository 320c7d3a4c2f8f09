//! Concrete data connectors.
//!
//! Four connector families cover the external source kinds the core talks
//! to: fixed configuration data, key/value stores, relational stores and
//! directories. The latter three reach their system through an injected
//! [`ExternalClient`]; queries are `${var}` templates over context facts and
//! dependency values, and the rendered text doubles as the cache key.

use std::collections::BTreeMap;
use std::sync::Arc;

use garnet_types::{Attribute, AttributeId, AttributeValue, ComponentId, Lifecycle};

use crate::cache::ResultsCache;
use crate::connector::{
    DataConnector, ExecutableQuery, ExternalClient, RawResult, RawValue, Validator,
};
use crate::context::ResolutionContext;
use crate::definition::ResolvedDependencies;
use crate::error::{ResolverError, Result};
use crate::template::Template;

/// Template variables for a connector build: context facts plus the first
/// textual value of each dependency attribute (facts win on name collision).
fn template_vars(
    ctx: &ResolutionContext,
    deps: &ResolvedDependencies,
) -> BTreeMap<String, String> {
    let mut vars = ctx.facts();
    for attribute in deps.attributes() {
        if let Some(text) = attribute.values().iter().find_map(AttributeValue::as_text) {
            vars.entry(attribute.id.to_string()).or_insert(text);
        }
    }
    vars
}

fn attribute_value(raw: &RawValue) -> AttributeValue {
    match raw {
        RawValue::Text(text) => AttributeValue::string(text.clone()),
        RawValue::Binary(bytes) => AttributeValue::Opaque(bytes.clone()),
    }
}

// ============================================================================
// StaticDataConnector
// ============================================================================

/// Serves a fixed attribute map configured at assembly time. Useful for
/// constant attributes and as a failover target.
#[derive(Debug)]
pub struct StaticDataConnector {
    id: ComponentId,
    attributes: BTreeMap<AttributeId, Attribute>,
    lifecycle: Lifecycle,
}

impl StaticDataConnector {
    pub fn new(id: impl Into<ComponentId>) -> Self {
        let id = id.into();
        Self {
            lifecycle: Lifecycle::new(id.as_str()),
            id,
            attributes: BTreeMap::new(),
        }
    }

    /// Adds a served attribute.
    pub fn with_attribute(mut self, attribute: Attribute) -> Self {
        self.attributes.insert(attribute.id.clone(), attribute);
        self
    }

    pub fn initialize(&mut self) -> Result<()> {
        self.lifecycle.mark_ready()?;
        Ok(())
    }

    pub fn destroy(&mut self) -> Result<()> {
        self.lifecycle.mark_destroyed()?;
        Ok(())
    }
}

impl DataConnector for StaticDataConnector {
    fn id(&self) -> &ComponentId {
        &self.id
    }

    fn build(
        &self,
        _ctx: &ResolutionContext,
        _deps: &ResolvedDependencies,
    ) -> Result<ExecutableQuery> {
        self.lifecycle.ensure_ready()?;
        Ok(ExecutableQuery::new(format!("static:{}", self.id)))
    }

    fn execute(&self, _query: &ExecutableQuery) -> Result<RawResult> {
        self.lifecycle.ensure_ready()?;
        Ok(RawResult::empty())
    }

    fn map_results(&self, _raw: RawResult) -> Result<BTreeMap<AttributeId, Attribute>> {
        self.lifecycle.ensure_ready()?;
        Ok(self.attributes.clone())
    }
}

// ============================================================================
// KeyValueConnector
// ============================================================================

/// Looks up a templated key in a key/value store; every fetched field value
/// becomes a value of one configured attribute.
#[derive(Debug)]
pub struct KeyValueConnector {
    id: ComponentId,
    client: Arc<dyn ExternalClient>,
    key_template: Template,
    attribute_id: AttributeId,
    dependencies: Vec<ComponentId>,
    failover: Option<ComponentId>,
    cache: Option<ResultsCache>,
    validator: Option<Validator>,
    no_result_is_error: bool,
    lifecycle: Lifecycle,
}

impl KeyValueConnector {
    pub fn new(
        id: impl Into<ComponentId>,
        client: Arc<dyn ExternalClient>,
        key_template: &str,
        attribute_id: impl Into<AttributeId>,
    ) -> Result<Self> {
        let id = id.into();
        let key_template =
            Template::parse(key_template).map_err(|source| ResolverError::Template {
                component: id.clone(),
                source,
            })?;
        Ok(Self {
            lifecycle: Lifecycle::new(id.as_str()),
            id,
            client,
            key_template,
            attribute_id: attribute_id.into(),
            dependencies: Vec::new(),
            failover: None,
            cache: None,
            validator: None,
            no_result_is_error: false,
        })
    }

    /// Declares a dependency on another component.
    pub fn with_dependency(mut self, id: impl Into<ComponentId>) -> Self {
        self.dependencies.push(id.into());
        self
    }

    /// Connector tried once when this one fails.
    pub fn with_failover(mut self, id: impl Into<ComponentId>) -> Self {
        self.failover = Some(id.into());
        self
    }

    /// Shares fetch results across requests.
    pub fn with_cache(mut self, cache: ResultsCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Connectivity check run at initialization.
    pub fn with_validator(mut self, validator: Validator) -> Self {
        self.validator = Some(validator);
        self
    }

    /// Escalates an empty result to a resolution error.
    pub fn no_result_is_error(mut self) -> Self {
        self.no_result_is_error = true;
        self
    }

    pub fn initialize(&mut self) -> Result<()> {
        if let Some(validator) = &self.validator {
            validator.check(&self.id, self.client.as_ref())?;
        }
        self.lifecycle.mark_ready()?;
        Ok(())
    }

    pub fn destroy(&mut self) -> Result<()> {
        self.lifecycle.mark_destroyed()?;
        Ok(())
    }
}

impl DataConnector for KeyValueConnector {
    fn id(&self) -> &ComponentId {
        &self.id
    }

    fn dependencies(&self) -> &[ComponentId] {
        &self.dependencies
    }

    fn failover(&self) -> Option<&ComponentId> {
        self.failover.as_ref()
    }

    fn no_result_is_error(&self) -> bool {
        self.no_result_is_error
    }

    fn cache(&self) -> Option<&ResultsCache> {
        self.cache.as_ref()
    }

    fn build(&self, ctx: &ResolutionContext, deps: &ResolvedDependencies) -> Result<ExecutableQuery> {
        self.lifecycle.ensure_ready()?;
        let key = self
            .key_template
            .render(&template_vars(ctx, deps))
            .map_err(|source| ResolverError::Template {
                component: self.id.clone(),
                source,
            })?;
        Ok(ExecutableQuery::new(key))
    }

    fn execute(&self, query: &ExecutableQuery) -> Result<RawResult> {
        self.lifecycle.ensure_ready()?;
        self.client
            .fetch(query)
            .map_err(|source| ResolverError::Connector {
                connector: self.id.clone(),
                source,
            })
    }

    fn map_results(&self, raw: RawResult) -> Result<BTreeMap<AttributeId, Attribute>> {
        self.lifecycle.ensure_ready()?;
        let mut attribute = Attribute::empty(self.attribute_id.clone());
        for record in &raw.records {
            for (_, values) in record.iter() {
                for raw_value in values {
                    attribute.push_value(attribute_value(raw_value));
                }
            }
        }
        let mut out = BTreeMap::new();
        out.insert(self.attribute_id.clone(), attribute);
        Ok(out)
    }
}

// ============================================================================
// RelationalConnector
// ============================================================================

/// Executes a templated query against a relational store and maps result
/// columns onto attributes.
#[derive(Debug)]
pub struct RelationalConnector {
    id: ComponentId,
    client: Arc<dyn ExternalClient>,
    query_template: Template,
    columns: BTreeMap<String, AttributeId>,
    dependencies: Vec<ComponentId>,
    failover: Option<ComponentId>,
    cache: Option<ResultsCache>,
    validator: Option<Validator>,
    no_result_is_error: bool,
    lifecycle: Lifecycle,
}

impl RelationalConnector {
    pub fn new(
        id: impl Into<ComponentId>,
        client: Arc<dyn ExternalClient>,
        query_template: &str,
    ) -> Result<Self> {
        let id = id.into();
        let query_template =
            Template::parse(query_template).map_err(|source| ResolverError::Template {
                component: id.clone(),
                source,
            })?;
        Ok(Self {
            lifecycle: Lifecycle::new(id.as_str()),
            id,
            client,
            query_template,
            columns: BTreeMap::new(),
            dependencies: Vec::new(),
            failover: None,
            cache: None,
            validator: None,
            no_result_is_error: false,
        })
    }

    /// Maps a result column onto an attribute id.
    pub fn with_column(
        mut self,
        column: impl Into<String>,
        attribute_id: impl Into<AttributeId>,
    ) -> Self {
        self.columns.insert(column.into(), attribute_id.into());
        self
    }

    /// Declares a dependency on another component.
    pub fn with_dependency(mut self, id: impl Into<ComponentId>) -> Self {
        self.dependencies.push(id.into());
        self
    }

    /// Connector tried once when this one fails.
    pub fn with_failover(mut self, id: impl Into<ComponentId>) -> Self {
        self.failover = Some(id.into());
        self
    }

    /// Shares fetch results across requests.
    pub fn with_cache(mut self, cache: ResultsCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Connectivity check run at initialization.
    pub fn with_validator(mut self, validator: Validator) -> Self {
        self.validator = Some(validator);
        self
    }

    /// Escalates an empty result to a resolution error.
    pub fn no_result_is_error(mut self) -> Self {
        self.no_result_is_error = true;
        self
    }

    pub fn initialize(&mut self) -> Result<()> {
        if self.columns.is_empty() {
            return Err(ResolverError::ComponentInitialization {
                component: self.id.clone(),
                reason: "relational connector requires at least one column mapping".to_string(),
            });
        }
        if let Some(validator) = &self.validator {
            validator.check(&self.id, self.client.as_ref())?;
        }
        self.lifecycle.mark_ready()?;
        Ok(())
    }

    pub fn destroy(&mut self) -> Result<()> {
        self.lifecycle.mark_destroyed()?;
        Ok(())
    }
}

impl DataConnector for RelationalConnector {
    fn id(&self) -> &ComponentId {
        &self.id
    }

    fn dependencies(&self) -> &[ComponentId] {
        &self.dependencies
    }

    fn failover(&self) -> Option<&ComponentId> {
        self.failover.as_ref()
    }

    fn no_result_is_error(&self) -> bool {
        self.no_result_is_error
    }

    fn cache(&self) -> Option<&ResultsCache> {
        self.cache.as_ref()
    }

    fn build(&self, ctx: &ResolutionContext, deps: &ResolvedDependencies) -> Result<ExecutableQuery> {
        self.lifecycle.ensure_ready()?;
        let vars = template_vars(ctx, deps);
        let statement = self
            .query_template
            .render(&vars)
            .map_err(|source| ResolverError::Template {
                component: self.id.clone(),
                source,
            })?;
        let mut query = ExecutableQuery::new(statement);
        for (name, value) in vars {
            query = query.with_parameter(name, value);
        }
        Ok(query)
    }

    fn execute(&self, query: &ExecutableQuery) -> Result<RawResult> {
        self.lifecycle.ensure_ready()?;
        self.client
            .fetch(query)
            .map_err(|source| ResolverError::Connector {
                connector: self.id.clone(),
                source,
            })
    }

    fn map_results(&self, raw: RawResult) -> Result<BTreeMap<AttributeId, Attribute>> {
        self.lifecycle.ensure_ready()?;
        // Every mapped attribute id appears in the output, even with zero
        // values: "present but empty" and "absent" are different downstream.
        let mut out: BTreeMap<AttributeId, Attribute> = self
            .columns
            .values()
            .map(|id| (id.clone(), Attribute::empty(id.clone())))
            .collect();
        for record in &raw.records {
            for (column, attribute_id) in &self.columns {
                if let Some(attribute) = out.get_mut(attribute_id) {
                    for raw_value in record.values(column) {
                        attribute.push_value(attribute_value(raw_value));
                    }
                }
            }
        }
        Ok(out)
    }
}

// ============================================================================
// DirectoryConnector
// ============================================================================

/// Runs a templated search filter against a directory and returns an
/// allow-listed set of entry attributes.
#[derive(Debug)]
pub struct DirectoryConnector {
    id: ComponentId,
    client: Arc<dyn ExternalClient>,
    filter_template: Template,
    returned: Vec<AttributeId>,
    dependencies: Vec<ComponentId>,
    failover: Option<ComponentId>,
    cache: Option<ResultsCache>,
    validator: Option<Validator>,
    no_result_is_error: bool,
    lifecycle: Lifecycle,
}

impl DirectoryConnector {
    pub fn new(
        id: impl Into<ComponentId>,
        client: Arc<dyn ExternalClient>,
        filter_template: &str,
    ) -> Result<Self> {
        let id = id.into();
        let filter_template =
            Template::parse(filter_template).map_err(|source| ResolverError::Template {
                component: id.clone(),
                source,
            })?;
        Ok(Self {
            lifecycle: Lifecycle::new(id.as_str()),
            id,
            client,
            filter_template,
            returned: Vec::new(),
            dependencies: Vec::new(),
            failover: None,
            cache: None,
            validator: None,
            no_result_is_error: false,
        })
    }

    /// Allow-lists a directory attribute to return.
    pub fn with_returned_attribute(mut self, id: impl Into<AttributeId>) -> Self {
        self.returned.push(id.into());
        self
    }

    /// Declares a dependency on another component.
    pub fn with_dependency(mut self, id: impl Into<ComponentId>) -> Self {
        self.dependencies.push(id.into());
        self
    }

    /// Connector tried once when this one fails.
    pub fn with_failover(mut self, id: impl Into<ComponentId>) -> Self {
        self.failover = Some(id.into());
        self
    }

    /// Shares fetch results across requests.
    pub fn with_cache(mut self, cache: ResultsCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Connectivity check run at initialization.
    pub fn with_validator(mut self, validator: Validator) -> Self {
        self.validator = Some(validator);
        self
    }

    /// Escalates an empty result to a resolution error.
    pub fn no_result_is_error(mut self) -> Self {
        self.no_result_is_error = true;
        self
    }

    pub fn initialize(&mut self) -> Result<()> {
        if self.returned.is_empty() {
            return Err(ResolverError::ComponentInitialization {
                component: self.id.clone(),
                reason: "directory connector requires at least one returned attribute".to_string(),
            });
        }
        if let Some(validator) = &self.validator {
            validator.check(&self.id, self.client.as_ref())?;
        }
        self.lifecycle.mark_ready()?;
        Ok(())
    }

    pub fn destroy(&mut self) -> Result<()> {
        self.lifecycle.mark_destroyed()?;
        Ok(())
    }
}

impl DataConnector for DirectoryConnector {
    fn id(&self) -> &ComponentId {
        &self.id
    }

    fn dependencies(&self) -> &[ComponentId] {
        &self.dependencies
    }

    fn failover(&self) -> Option<&ComponentId> {
        self.failover.as_ref()
    }

    fn no_result_is_error(&self) -> bool {
        self.no_result_is_error
    }

    fn cache(&self) -> Option<&ResultsCache> {
        self.cache.as_ref()
    }

    fn build(&self, ctx: &ResolutionContext, deps: &ResolvedDependencies) -> Result<ExecutableQuery> {
        self.lifecycle.ensure_ready()?;
        let filter = self
            .filter_template
            .render(&template_vars(ctx, deps))
            .map_err(|source| ResolverError::Template {
                component: self.id.clone(),
                source,
            })?;
        Ok(ExecutableQuery::new(filter))
    }

    fn execute(&self, query: &ExecutableQuery) -> Result<RawResult> {
        self.lifecycle.ensure_ready()?;
        self.client
            .fetch(query)
            .map_err(|source| ResolverError::Connector {
                connector: self.id.clone(),
                source,
            })
    }

    fn map_results(&self, raw: RawResult) -> Result<BTreeMap<AttributeId, Attribute>> {
        self.lifecycle.ensure_ready()?;
        let mut out: BTreeMap<AttributeId, Attribute> = self
            .returned
            .iter()
            .map(|id| (id.clone(), Attribute::empty(id.clone())))
            .collect();
        for record in &raw.records {
            for (field, values) in record.iter() {
                let id = AttributeId::from(field);
                // Fields outside the allow-list are ignored.
                if let Some(attribute) = out.get_mut(&id) {
                    for raw_value in values {
                        attribute.push_value(attribute_value(raw_value));
                    }
                }
            }
        }
        Ok(out)
    }
}

// ============================================================================
// Tests
// ============================================================================
