//! The attribute resolver.
//!
//! `initialize()` validates the combined definition+connector graph —
//! unique ids, known references, acyclicity — and fixes a deterministic
//! topological execution plan. `resolve()` walks that plan against one
//! request's [`ResolutionContext`], memoizing every node so a component
//! referenced by several dependents executes at most once per request.
//!
//! Nodes execute strictly in dependency order on the calling thread; the
//! only blocking step is a connector's `execute()`. Request-level
//! parallelism is the unit of concurrency: once `Ready`, a resolver is
//! shared read-only across threads, each with its own context.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use garnet_types::{Attribute, AttributeId, ComponentId, Lifecycle};
use tracing::{debug, info, warn};

use crate::connector::DataConnector;
use crate::context::ResolutionContext;
use crate::definition::{AttributeDefinition, ResolvedDependencies};
use crate::error::{ResolverError, Result};

// ============================================================================
// AttributeResolver
// ============================================================================

/// Executes a dependency graph of attribute definitions and data connectors.
#[derive(Debug)]
pub struct AttributeResolver {
    staged_definitions: Vec<Arc<dyn AttributeDefinition>>,
    staged_connectors: Vec<Arc<dyn DataConnector>>,
    definitions: BTreeMap<ComponentId, Arc<dyn AttributeDefinition>>,
    connectors: BTreeMap<ComponentId, Arc<dyn DataConnector>>,
    /// Topological execution order, dependencies first.
    plan: Vec<ComponentId>,
    lifecycle: Lifecycle,
}

impl Default for AttributeResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl AttributeResolver {
    pub fn new() -> Self {
        Self {
            staged_definitions: Vec::new(),
            staged_connectors: Vec::new(),
            definitions: BTreeMap::new(),
            connectors: BTreeMap::new(),
            plan: Vec::new(),
            lifecycle: Lifecycle::new("attribute-resolver"),
        }
    }

    /// Registers an (already initialized) attribute definition.
    pub fn with_definition(mut self, definition: impl AttributeDefinition + 'static) -> Self {
        self.staged_definitions.push(Arc::new(definition));
        self
    }

    /// Registers an (already initialized) data connector.
    pub fn with_connector(mut self, connector: impl DataConnector + 'static) -> Self {
        self.staged_connectors.push(Arc::new(connector));
        self
    }

    /// Validates the graph and fixes the execution plan.
    ///
    /// Fails on duplicate component ids, references to unknown components,
    /// self- or unknown failover references, and dependency cycles.
    pub fn initialize(&mut self) -> Result<()> {
        self.lifecycle.ensure_unconfigured()?;

        let mut dependencies: BTreeMap<ComponentId, Vec<ComponentId>> = BTreeMap::new();

        for definition in std::mem::take(&mut self.staged_definitions) {
            let id = definition.id().clone();
            if self.definitions.contains_key(&id) || self.connectors.contains_key(&id) {
                return Err(ResolverError::DuplicateComponent(id));
            }
            dependencies.insert(id.clone(), definition.dependencies().to_vec());
            self.definitions.insert(id, definition);
        }
        for connector in std::mem::take(&mut self.staged_connectors) {
            let id = connector.id().clone();
            if self.definitions.contains_key(&id) || self.connectors.contains_key(&id) {
                return Err(ResolverError::DuplicateComponent(id));
            }
            dependencies.insert(id.clone(), connector.dependencies().to_vec());
            self.connectors.insert(id, connector);
        }

        for (id, deps) in &dependencies {
            for dep in deps {
                if !dependencies.contains_key(dep) {
                    return Err(ResolverError::UnknownReference {
                        component: id.clone(),
                        reference: dep.clone(),
                    });
                }
            }
        }
        for (id, connector) in &self.connectors {
            if let Some(failover) = connector.failover() {
                if failover == id {
                    return Err(ResolverError::ComponentInitialization {
                        component: id.clone(),
                        reason: "failover must reference a different connector".to_string(),
                    });
                }
                if !self.connectors.contains_key(failover) {
                    return Err(ResolverError::UnknownReference {
                        component: id.clone(),
                        reference: failover.clone(),
                    });
                }
            }
        }

        self.plan = Self::topological_plan(&dependencies)?;
        self.lifecycle.mark_ready()?;
        info!(
            definitions = self.definitions.len(),
            connectors = self.connectors.len(),
            "attribute resolver initialized"
        );
        Ok(())
    }

    pub fn destroy(&mut self) -> Result<()> {
        self.lifecycle.mark_destroyed()?;
        Ok(())
    }

    /// Resolves every component of the plan against the context and returns
    /// the released attribute map (non-`dependency_only` definitions only;
    /// definitions producing the same attribute id have their values merged).
    pub fn resolve(&self, ctx: &mut ResolutionContext) -> Result<BTreeMap<AttributeId, Attribute>> {
        self.lifecycle.ensure_ready()?;

        for id in &self.plan {
            if let Some(connector) = self.connectors.get(id) {
                self.resolve_connector(connector, ctx)?;
            } else if let Some(definition) = self.definitions.get(id) {
                self.resolve_definition(definition, ctx)?;
            }
        }

        let mut released: BTreeMap<AttributeId, Attribute> = BTreeMap::new();
        for (id, definition) in &self.definitions {
            if definition.dependency_only() {
                continue;
            }
            if let Some(attribute) = ctx.definition_result(id) {
                match released.get_mut(&attribute.id) {
                    Some(existing) => existing.merge(attribute),
                    None => {
                        released.insert(attribute.id.clone(), attribute.clone());
                    }
                }
            }
        }
        info!(attributes = released.len(), "attribute resolution complete");
        Ok(released)
    }

    fn resolve_definition(
        &self,
        definition: &Arc<dyn AttributeDefinition>,
        ctx: &mut ResolutionContext,
    ) -> Result<()> {
        if ctx.definition_result(definition.id()).is_some() {
            return Ok(());
        }
        let deps = Self::gather(ctx, definition.dependencies());
        let attribute = definition.compute(ctx, &deps)?;
        debug!(definition = %definition.id(), values = attribute.len(), "definition resolved");
        ctx.record_definition(definition.id().clone(), attribute);
        Ok(())
    }

    fn resolve_connector(
        &self,
        connector: &Arc<dyn DataConnector>,
        ctx: &mut ResolutionContext,
    ) -> Result<()> {
        if ctx.connector_result(connector.id()).is_some() {
            return Ok(());
        }
        match self.execute_connector(connector.as_ref(), ctx) {
            Ok(attributes) => {
                ctx.record_connector(connector.id().clone(), attributes);
                Ok(())
            }
            Err(error) => {
                let Some(failover_id) = connector.failover() else {
                    return Err(error);
                };
                warn!(
                    connector = %connector.id(),
                    failover = %failover_id,
                    error = %error,
                    "connector failed; retrying against failover"
                );
                // Failover reference was validated at initialize().
                let Some(failover) = self.connectors.get(failover_id) else {
                    return Err(error);
                };
                let attributes = if let Some(memoized) = ctx.connector_result(failover_id) {
                    memoized.clone()
                } else {
                    let computed = self.execute_connector(failover.as_ref(), ctx)?;
                    ctx.record_connector(failover_id.clone(), computed.clone());
                    computed
                };
                ctx.record_connector(connector.id().clone(), attributes);
                Ok(())
            }
        }
    }

    /// Runs one connector: build → cache probe → execute → map → store.
    fn execute_connector(
        &self,
        connector: &dyn DataConnector,
        ctx: &ResolutionContext,
    ) -> Result<BTreeMap<AttributeId, Attribute>> {
        let deps = Self::gather(ctx, connector.dependencies());
        let query = connector.build(ctx, &deps)?;

        if let Some(cache) = connector.cache() {
            if let Some(hit) = cache.get(&query.cache_key) {
                debug!(connector = %connector.id(), key = %query.cache_key, "results cache hit");
                return Ok(hit);
            }
        }

        let raw = connector.execute(&query)?;
        let attributes = connector.map_results(raw)?;

        let has_values = attributes.values().any(|a| !a.is_empty());
        if !has_values && connector.no_result_is_error() {
            return Err(ResolverError::NoResultIsError {
                connector: connector.id().clone(),
            });
        }

        if let Some(cache) = connector.cache() {
            cache.put(query.cache_key.clone(), attributes.clone());
        }
        Ok(attributes)
    }

    /// Collects the memoized results of `dependencies`, in declared order.
    fn gather(ctx: &ResolutionContext, dependencies: &[ComponentId]) -> ResolvedDependencies {
        let mut deps = ResolvedDependencies::empty();
        for dep in dependencies {
            if let Some(attribute) = ctx.definition_result(dep) {
                deps.push(attribute.clone());
            } else if let Some(attributes) = ctx.connector_result(dep) {
                for attribute in attributes.values() {
                    deps.push(attribute.clone());
                }
            }
        }
        deps
    }

    /// Depth-first topological sort with visiting/visited marks; a back-edge
    /// to a "visiting" node signals a cycle. The outer iteration order (and
    /// therefore the tiebreak between independent nodes) is lexicographic,
    /// keeping the plan deterministic run-to-run.
    fn topological_plan(
        dependencies: &BTreeMap<ComponentId, Vec<ComponentId>>,
    ) -> Result<Vec<ComponentId>> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Visiting,
            Visited,
        }

        let mut marks: HashMap<ComponentId, Mark> = HashMap::new();
        let mut plan = Vec::with_capacity(dependencies.len());

        for start in dependencies.keys() {
            if marks.contains_key(start) {
                continue;
            }
            // Explicit stack of (node, next dependency index).
            let mut stack: Vec<(ComponentId, usize)> = vec![(start.clone(), 0)];
            marks.insert(start.clone(), Mark::Visiting);

            while let Some((id, next)) = stack.last().cloned() {
                let deps = &dependencies[&id];
                if next < deps.len() {
                    if let Some(frame) = stack.last_mut() {
                        frame.1 += 1;
                    }
                    let dep = &deps[next];
                    match marks.get(dep) {
                        Some(Mark::Visiting) => {
                            let pos = stack
                                .iter()
                                .position(|(n, _)| n == dep)
                                .unwrap_or_default();
                            let mut cycle: Vec<ComponentId> =
                                stack[pos..].iter().map(|(n, _)| n.clone()).collect();
                            cycle.push(dep.clone());
                            return Err(ResolverError::CyclicDependency { cycle });
                        }
                        Some(Mark::Visited) => {}
                        None => {
                            marks.insert(dep.clone(), Mark::Visiting);
                            stack.push((dep.clone(), 0));
                        }
                    }
                } else {
                    marks.insert(id.clone(), Mark::Visited);
                    plan.push(id.clone());
                    stack.pop();
                }
            }
        }
        Ok(plan)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::cache::ResultsCache;
    use crate::connector::{ClientError, ExecutableQuery, ExternalClient, RawResult, Record};
    use crate::connectors::{KeyValueConnector, StaticDataConnector};
    use crate::definitions::{PrincipalNameDefinition, SimpleAttributeDefinition};
    use garnet_types::AttributeValue;

    /// Client that counts fetches and serves canned records.
    #[derive(Debug)]
    struct CountingClient {
        calls: Arc<AtomicUsize>,
        records: Vec<Record>,
    }

    impl ExternalClient for CountingClient {
        fn fetch(&self, _query: &ExecutableQuery) -> std::result::Result<RawResult, ClientError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(RawResult::from_records(self.records.clone()))
        }
    }

    #[derive(Debug)]
    struct DeadClient;

    impl ExternalClient for DeadClient {
        fn fetch(&self, _query: &ExecutableQuery) -> std::result::Result<RawResult, ClientError> {
            Err(ClientError::Connection("refused".to_string()))
        }
    }

    fn counting_connector(
        id: &str,
        attribute: &str,
        values: &[&str],
    ) -> (KeyValueConnector, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let records = values
            .iter()
            .map(|v| Record::new().with_text("value", *v))
            .collect();
        let client = Arc::new(CountingClient {
            calls: Arc::clone(&calls),
            records,
        });
        let mut connector =
            KeyValueConnector::new(id, client, "lookup:${principal}", attribute)
                .expect("new connector");
        connector.initialize().expect("initialize connector");
        (connector, calls)
    }

    fn simple_definition(id: &str, attribute: &str, source: &str, dep: &str) -> SimpleAttributeDefinition {
        let mut definition = SimpleAttributeDefinition::new(id, attribute, source)
            .with_dependency(dep);
        definition.initialize().expect("initialize definition");
        definition
    }

    #[test]
    fn cycle_fails_initialize_and_names_the_cycle() {
        let mut def_a = SimpleAttributeDefinition::new("a", "a", "x").with_dependency("b");
        def_a.initialize().expect("initialize a");
        let mut def_b = SimpleAttributeDefinition::new("b", "b", "x").with_dependency("a");
        def_b.initialize().expect("initialize b");

        let mut resolver = AttributeResolver::new()
            .with_definition(def_a)
            .with_definition(def_b);
        let err = resolver.initialize().expect_err("cycle must be rejected");
        match err {
            ResolverError::CyclicDependency { cycle } => {
                assert!(cycle.len() >= 3, "cycle path includes the repeated node");
                assert_eq!(cycle.first(), cycle.last());
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn duplicate_component_id_is_rejected() {
        let mut def_a = PrincipalNameDefinition::new("dup", "a");
        def_a.initialize().expect("initialize");
        let mut def_b = PrincipalNameDefinition::new("dup", "b");
        def_b.initialize().expect("initialize");

        let mut resolver = AttributeResolver::new()
            .with_definition(def_a)
            .with_definition(def_b);
        assert!(matches!(
            resolver.initialize(),
            Err(ResolverError::DuplicateComponent(_))
        ));
    }

    #[test]
    fn unknown_dependency_is_rejected() {
        let mut resolver = AttributeResolver::new()
            .with_definition(simple_definition("uid-def", "uid", "value", "missing"));
        assert!(matches!(
            resolver.initialize(),
            Err(ResolverError::UnknownReference { .. })
        ));
    }

    #[test]
    fn resolve_before_initialize_is_a_lifecycle_error() {
        let resolver = AttributeResolver::new();
        let mut ctx = ResolutionContext::new("alice");
        assert!(matches!(
            resolver.resolve(&mut ctx),
            Err(ResolverError::Lifecycle(_))
        ));
    }

    #[test]
    fn shared_connector_executes_exactly_once_per_context() {
        let (connector, calls) = counting_connector("kv", "value", &["alice"]);
        let mut resolver = AttributeResolver::new()
            .with_connector(connector)
            .with_definition(simple_definition("uid-def", "uid", "value", "kv"))
            .with_definition(simple_definition("alias-def", "alias", "value", "kv"));
        resolver.initialize().expect("initialize resolver");

        let mut ctx = ResolutionContext::new("alice");
        let released = resolver.resolve(&mut ctx).expect("resolve");

        assert_eq!(calls.load(Ordering::SeqCst), 1, "one execute per context");
        assert_eq!(
            released
                .get(&AttributeId::from("uid"))
                .expect("uid released")
                .values(),
            &[AttributeValue::string("alice")]
        );
        assert!(released.contains_key(&AttributeId::from("alias")));

        // A fresh context executes again (memoization is per request).
        let mut ctx2 = ResolutionContext::new("alice");
        resolver.resolve(&mut ctx2).expect("resolve again");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn results_cache_spans_requests() {
        let calls = Arc::new(AtomicUsize::new(0));
        let client = Arc::new(CountingClient {
            calls: Arc::clone(&calls),
            records: vec![Record::new().with_text("value", "alice")],
        });
        let mut connector = KeyValueConnector::new("kv", client, "lookup:${principal}", "value")
            .expect("new connector")
            .with_cache(ResultsCache::new(8));
        connector.initialize().expect("initialize connector");

        let mut resolver = AttributeResolver::new()
            .with_connector(connector)
            .with_definition(simple_definition("uid-def", "uid", "value", "kv"));
        resolver.initialize().expect("initialize resolver");

        let mut ctx1 = ResolutionContext::new("alice");
        resolver.resolve(&mut ctx1).expect("first resolve");
        let mut ctx2 = ResolutionContext::new("alice");
        resolver.resolve(&mut ctx2).expect("second resolve");

        assert_eq!(
            calls.load(Ordering::SeqCst),
            1,
            "second request served from the results cache"
        );
    }

    #[test]
    fn failover_absorbs_the_primary_failure() {
        let mut primary = KeyValueConnector::new(
            "kv",
            Arc::new(DeadClient),
            "lookup:${principal}",
            "value",
        )
        .expect("new connector")
        .with_failover("backup");
        primary.initialize().expect("initialize primary");

        let mut backup = StaticDataConnector::new("backup")
            .with_attribute(Attribute::of_strings("value", ["bob"]));
        backup.initialize().expect("initialize backup");

        let mut resolver = AttributeResolver::new()
            .with_connector(primary)
            .with_connector(backup)
            .with_definition(simple_definition("uid-def", "uid", "value", "kv"));
        resolver.initialize().expect("initialize resolver");

        let mut ctx = ResolutionContext::new("alice");
        let released = resolver.resolve(&mut ctx).expect("resolve with failover");
        assert_eq!(
            released.get(&AttributeId::from("uid")).expect("uid").values(),
            &[AttributeValue::string("bob")]
        );
    }

    #[test]
    fn without_failover_the_connector_error_propagates() {
        let mut primary = KeyValueConnector::new(
            "kv",
            Arc::new(DeadClient),
            "lookup:${principal}",
            "value",
        )
        .expect("new connector");
        primary.initialize().expect("initialize primary");

        let mut resolver = AttributeResolver::new()
            .with_connector(primary)
            .with_definition(simple_definition("uid-def", "uid", "value", "kv"));
        resolver.initialize().expect("initialize resolver");

        let mut ctx = ResolutionContext::new("alice");
        let err = resolver.resolve(&mut ctx).expect_err("must propagate");
        assert!(matches!(err, ResolverError::Connector { .. }));
    }

    #[test]
    fn unknown_failover_reference_is_rejected_at_initialize() {
        let mut primary = KeyValueConnector::new(
            "kv",
            Arc::new(DeadClient),
            "lookup:${principal}",
            "value",
        )
        .expect("new connector")
        .with_failover("nonexistent");
        primary.initialize().expect("initialize primary");

        let mut resolver = AttributeResolver::new().with_connector(primary);
        assert!(matches!(
            resolver.initialize(),
            Err(ResolverError::UnknownReference { .. })
        ));
    }

    #[test]
    fn empty_result_is_success_unless_escalated() {
        let (connector, _calls) = counting_connector("kv", "value", &[]);
        let mut resolver = AttributeResolver::new()
            .with_connector(connector)
            .with_definition(simple_definition("uid-def", "uid", "value", "kv"));
        resolver.initialize().expect("initialize resolver");

        let mut ctx = ResolutionContext::new("alice");
        let released = resolver.resolve(&mut ctx).expect("empty is success");
        // uid resolves to present-but-empty, which is still released by the
        // resolver (filtering decides what leaves the system).
        assert!(released.get(&AttributeId::from("uid")).expect("uid").is_empty());
    }

    #[test]
    fn no_result_is_error_escalates_empty_results() {
        let calls = Arc::new(AtomicUsize::new(0));
        let client = Arc::new(CountingClient {
            calls,
            records: vec![],
        });
        let mut connector = KeyValueConnector::new("kv", client, "lookup:${principal}", "value")
            .expect("new connector")
            .no_result_is_error();
        connector.initialize().expect("initialize connector");

        let mut resolver = AttributeResolver::new()
            .with_connector(connector)
            .with_definition(simple_definition("uid-def", "uid", "value", "kv"));
        resolver.initialize().expect("initialize resolver");

        let mut ctx = ResolutionContext::new("alice");
        assert!(matches!(
            resolver.resolve(&mut ctx),
            Err(ResolverError::NoResultIsError { .. })
        ));
    }

    #[test]
    fn dependency_only_definitions_are_not_released() {
        let (connector, _calls) = counting_connector("kv", "value", &["alice"]);
        let mut intermediate = SimpleAttributeDefinition::new("raw-def", "raw", "value")
            .with_dependency("kv")
            .dependency_only();
        intermediate.initialize().expect("initialize intermediate");

        let mut resolver = AttributeResolver::new()
            .with_connector(connector)
            .with_definition(intermediate)
            .with_definition(simple_definition("uid-def", "uid", "raw", "raw-def"));
        resolver.initialize().expect("initialize resolver");

        let mut ctx = ResolutionContext::new("alice");
        let released = resolver.resolve(&mut ctx).expect("resolve");
        assert!(!released.contains_key(&AttributeId::from("raw")));
        assert_eq!(
            released.get(&AttributeId::from("uid")).expect("uid").values(),
            &[AttributeValue::string("alice")]
        );
    }

    #[test]
    fn definitions_with_one_attribute_id_merge_values() {
        let (left, _) = counting_connector("kv-left", "value", &["staff"]);
        let (right, _) = counting_connector("kv-right", "value", &["faculty"]);

        let mut resolver = AttributeResolver::new()
            .with_connector(left)
            .with_connector(right)
            .with_definition(simple_definition("aff-left", "affiliation", "value", "kv-left"))
            .with_definition(simple_definition("aff-right", "affiliation", "value", "kv-right"));
        resolver.initialize().expect("initialize resolver");

        let mut ctx = ResolutionContext::new("alice");
        let released = resolver.resolve(&mut ctx).expect("resolve");
        let affiliation = released
            .get(&AttributeId::from("affiliation"))
            .expect("affiliation");
        assert_eq!(
            affiliation.values(),
            &[
                AttributeValue::string("staff"),
                AttributeValue::string("faculty"),
            ]
        );
    }

    #[test]
    fn plan_orders_dependencies_before_dependents() {
        let (connector, _calls) = counting_connector("z-connector", "value", &["alice"]);
        let mut resolver = AttributeResolver::new()
            .with_definition(simple_definition("a-def", "uid", "value", "z-connector"))
            .with_connector(connector);
        resolver.initialize().expect("initialize resolver");

        let a_def = ComponentId::from("a-def");
        let z_conn = ComponentId::from("z-connector");
        let pos = |id: &ComponentId| resolver.plan.iter().position(|p| p == id).expect("in plan");
        assert!(pos(&z_conn) < pos(&a_def), "connector precedes its dependent");
    }
}
