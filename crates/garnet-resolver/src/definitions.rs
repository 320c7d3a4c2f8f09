//! Concrete attribute definitions.
//!
//! Each definition derives one attribute from dependency values and/or
//! context facts. All follow the same component shape: builder-style
//! configuration, `initialize()` validation, immutable thereafter.

use std::collections::BTreeMap;

use garnet_types::{Attribute, AttributeId, AttributeValue, ComponentId, Lifecycle};
use tracing::warn;

use crate::context::ResolutionContext;
use crate::definition::{AttributeDefinition, ResolvedDependencies};
use crate::error::{ResolverError, Result};
use crate::template::Template;

/// Context fact names usable in templates alongside dependency attribute ids.
const CONTEXT_FACTS: &[&str] = &["principal", "requester", "issuer", "authn_method"];

// ============================================================================
// SimpleAttributeDefinition
// ============================================================================

/// Re-keys a source attribute produced by a dependency under this
/// definition's attribute id, keeping values as-is.
#[derive(Debug)]
pub struct SimpleAttributeDefinition {
    id: ComponentId,
    attribute_id: AttributeId,
    source_attribute_id: AttributeId,
    dependencies: Vec<ComponentId>,
    dependency_only: bool,
    lifecycle: Lifecycle,
}

impl SimpleAttributeDefinition {
    pub fn new(
        id: impl Into<ComponentId>,
        attribute_id: impl Into<AttributeId>,
        source_attribute_id: impl Into<AttributeId>,
    ) -> Self {
        let id = id.into();
        Self {
            lifecycle: Lifecycle::new(id.as_str()),
            id,
            attribute_id: attribute_id.into(),
            source_attribute_id: source_attribute_id.into(),
            dependencies: Vec::new(),
            dependency_only: false,
        }
    }

    /// Declares a dependency on another component.
    pub fn with_dependency(mut self, id: impl Into<ComponentId>) -> Self {
        self.dependencies.push(id.into());
        self
    }

    /// Marks this definition as an intermediate excluded from released output.
    pub fn dependency_only(mut self) -> Self {
        self.dependency_only = true;
        self
    }

    pub fn initialize(&mut self) -> Result<()> {
        if self.dependencies.is_empty() {
            return Err(ResolverError::ComponentInitialization {
                component: self.id.clone(),
                reason: "simple definition requires at least one dependency".to_string(),
            });
        }
        self.lifecycle.mark_ready()?;
        Ok(())
    }

    pub fn destroy(&mut self) -> Result<()> {
        self.lifecycle.mark_destroyed()?;
        Ok(())
    }
}

impl AttributeDefinition for SimpleAttributeDefinition {
    fn id(&self) -> &ComponentId {
        &self.id
    }

    fn dependencies(&self) -> &[ComponentId] {
        &self.dependencies
    }

    fn dependency_only(&self) -> bool {
        self.dependency_only
    }

    fn compute(&self, _ctx: &ResolutionContext, deps: &ResolvedDependencies) -> Result<Attribute> {
        self.lifecycle.ensure_ready()?;
        let values = deps.values_of(&self.source_attribute_id).cloned();
        Ok(Attribute::new(self.attribute_id.clone(), values))
    }
}

// ============================================================================
// ScopedAttributeDefinition
// ============================================================================

/// Attaches a fixed scope to dependency values (`alice` → `alice@scope`).
/// Already-scoped values are re-scoped; non-textual values are skipped.
#[derive(Debug)]
pub struct ScopedAttributeDefinition {
    id: ComponentId,
    attribute_id: AttributeId,
    source_attribute_id: AttributeId,
    scope: String,
    dependencies: Vec<ComponentId>,
    dependency_only: bool,
    lifecycle: Lifecycle,
}

impl ScopedAttributeDefinition {
    pub fn new(
        id: impl Into<ComponentId>,
        attribute_id: impl Into<AttributeId>,
        source_attribute_id: impl Into<AttributeId>,
        scope: impl Into<String>,
    ) -> Self {
        let id = id.into();
        Self {
            lifecycle: Lifecycle::new(id.as_str()),
            id,
            attribute_id: attribute_id.into(),
            source_attribute_id: source_attribute_id.into(),
            scope: scope.into(),
            dependencies: Vec::new(),
            dependency_only: false,
        }
    }

    /// Declares a dependency on another component.
    pub fn with_dependency(mut self, id: impl Into<ComponentId>) -> Self {
        self.dependencies.push(id.into());
        self
    }

    /// Marks this definition as an intermediate excluded from released output.
    pub fn dependency_only(mut self) -> Self {
        self.dependency_only = true;
        self
    }

    pub fn initialize(&mut self) -> Result<()> {
        if self.scope.is_empty() {
            return Err(ResolverError::ComponentInitialization {
                component: self.id.clone(),
                reason: "scope must not be empty".to_string(),
            });
        }
        self.lifecycle.mark_ready()?;
        Ok(())
    }

    pub fn destroy(&mut self) -> Result<()> {
        self.lifecycle.mark_destroyed()?;
        Ok(())
    }
}

impl AttributeDefinition for ScopedAttributeDefinition {
    fn id(&self) -> &ComponentId {
        &self.id
    }

    fn dependencies(&self) -> &[ComponentId] {
        &self.dependencies
    }

    fn dependency_only(&self) -> bool {
        self.dependency_only
    }

    fn compute(&self, _ctx: &ResolutionContext, deps: &ResolvedDependencies) -> Result<Attribute> {
        self.lifecycle.ensure_ready()?;
        let mut attribute = Attribute::empty(self.attribute_id.clone());
        for value in deps.values_of(&self.source_attribute_id) {
            match value {
                AttributeValue::String(s) => {
                    attribute.push_value(AttributeValue::scoped(s.clone(), self.scope.clone()));
                }
                AttributeValue::Scoped { value, .. } => {
                    attribute.push_value(AttributeValue::scoped(value.clone(), self.scope.clone()));
                }
                AttributeValue::Opaque(_) | AttributeValue::Empty => {
                    warn!(definition = %self.id, "skipping non-textual value while scoping");
                }
            }
        }
        Ok(attribute)
    }
}

// ============================================================================
// TemplateAttributeDefinition
// ============================================================================

/// Renders a `${var}` template once per value row.
///
/// Template variables may name context facts (`principal`, `requester`,
/// `issuer`, `authn_method`) or one of the declared source attribute ids;
/// source attributes are combined row-wise (value `i` of every source feeds
/// row `i`). Sources with unequal value counts are truncated to the shortest.
#[derive(Debug)]
pub struct TemplateAttributeDefinition {
    id: ComponentId,
    attribute_id: AttributeId,
    template: Template,
    source_attribute_ids: Vec<AttributeId>,
    dependencies: Vec<ComponentId>,
    dependency_only: bool,
    lifecycle: Lifecycle,
}

impl TemplateAttributeDefinition {
    /// Creates the definition, parsing the template eagerly.
    pub fn new(
        id: impl Into<ComponentId>,
        attribute_id: impl Into<AttributeId>,
        template: &str,
    ) -> Result<Self> {
        let id = id.into();
        let template = Template::parse(template).map_err(|source| ResolverError::Template {
            component: id.clone(),
            source,
        })?;
        Ok(Self {
            lifecycle: Lifecycle::new(id.as_str()),
            id,
            attribute_id: attribute_id.into(),
            template,
            source_attribute_ids: Vec::new(),
            dependencies: Vec::new(),
            dependency_only: false,
        })
    }

    /// Declares a source attribute whose values feed template rows.
    pub fn with_source_attribute(mut self, id: impl Into<AttributeId>) -> Self {
        self.source_attribute_ids.push(id.into());
        self
    }

    /// Declares a dependency on another component.
    pub fn with_dependency(mut self, id: impl Into<ComponentId>) -> Self {
        self.dependencies.push(id.into());
        self
    }

    /// Marks this definition as an intermediate excluded from released output.
    pub fn dependency_only(mut self) -> Self {
        self.dependency_only = true;
        self
    }

    pub fn initialize(&mut self) -> Result<()> {
        for variable in self.template.variables() {
            let is_fact = CONTEXT_FACTS.contains(&variable);
            let is_source = self
                .source_attribute_ids
                .iter()
                .any(|id| id.as_str() == variable);
            if !is_fact && !is_source {
                return Err(ResolverError::ComponentInitialization {
                    component: self.id.clone(),
                    reason: format!(
                        "template variable '{variable}' is neither a context fact nor a declared source attribute"
                    ),
                });
            }
        }
        self.lifecycle.mark_ready()?;
        Ok(())
    }

    pub fn destroy(&mut self) -> Result<()> {
        self.lifecycle.mark_destroyed()?;
        Ok(())
    }

    fn render(&self, variables: &BTreeMap<String, String>) -> Result<String> {
        self.template
            .render(variables)
            .map_err(|source| ResolverError::Template {
                component: self.id.clone(),
                source,
            })
    }
}

impl AttributeDefinition for TemplateAttributeDefinition {
    fn id(&self) -> &ComponentId {
        &self.id
    }

    fn dependencies(&self) -> &[ComponentId] {
        &self.dependencies
    }

    fn dependency_only(&self) -> bool {
        self.dependency_only
    }

    fn compute(&self, ctx: &ResolutionContext, deps: &ResolvedDependencies) -> Result<Attribute> {
        self.lifecycle.ensure_ready()?;
        let facts = ctx.facts();
        let mut attribute = Attribute::empty(self.attribute_id.clone());

        if self.source_attribute_ids.is_empty() {
            attribute.push_value(AttributeValue::string(self.render(&facts)?));
            return Ok(attribute);
        }

        let columns: Vec<(String, Vec<String>)> = self
            .source_attribute_ids
            .iter()
            .map(|id| (id.to_string(), deps.text_values_of(id)))
            .collect();
        let rows = columns.iter().map(|(_, v)| v.len()).min().unwrap_or(0);
        if columns.iter().any(|(_, v)| v.len() != rows) {
            warn!(
                definition = %self.id,
                "unequal value counts across template sources; truncating to shortest"
            );
        }

        for row in 0..rows {
            let mut variables = facts.clone();
            for (name, values) in &columns {
                variables.insert(name.clone(), values[row].clone());
            }
            attribute.push_value(AttributeValue::string(self.render(&variables)?));
        }
        Ok(attribute)
    }
}

// ============================================================================
// MappedAttributeDefinition
// ============================================================================

/// Translates source values through a fixed table.
///
/// Unmapped values use the default if configured, pass through unchanged if
/// `pass_through` is set, and are otherwise dropped.
#[derive(Debug)]
pub struct MappedAttributeDefinition {
    id: ComponentId,
    attribute_id: AttributeId,
    source_attribute_id: AttributeId,
    map: BTreeMap<String, String>,
    default: Option<String>,
    pass_through: bool,
    dependencies: Vec<ComponentId>,
    dependency_only: bool,
    lifecycle: Lifecycle,
}

impl MappedAttributeDefinition {
    pub fn new(
        id: impl Into<ComponentId>,
        attribute_id: impl Into<AttributeId>,
        source_attribute_id: impl Into<AttributeId>,
    ) -> Self {
        let id = id.into();
        Self {
            lifecycle: Lifecycle::new(id.as_str()),
            id,
            attribute_id: attribute_id.into(),
            source_attribute_id: source_attribute_id.into(),
            map: BTreeMap::new(),
            default: None,
            pass_through: false,
            dependencies: Vec::new(),
            dependency_only: false,
        }
    }

    /// Adds a `from` → `to` translation.
    pub fn with_mapping(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.map.insert(from.into(), to.into());
        self
    }

    /// Value emitted for unmapped source values.
    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }

    /// Passes unmapped values through unchanged (instead of dropping them).
    pub fn pass_through(mut self) -> Self {
        self.pass_through = true;
        self
    }

    /// Declares a dependency on another component.
    pub fn with_dependency(mut self, id: impl Into<ComponentId>) -> Self {
        self.dependencies.push(id.into());
        self
    }

    /// Marks this definition as an intermediate excluded from released output.
    pub fn dependency_only(mut self) -> Self {
        self.dependency_only = true;
        self
    }

    pub fn initialize(&mut self) -> Result<()> {
        if self.map.is_empty() {
            return Err(ResolverError::ComponentInitialization {
                component: self.id.clone(),
                reason: "mapped definition requires at least one mapping".to_string(),
            });
        }
        self.lifecycle.mark_ready()?;
        Ok(())
    }

    pub fn destroy(&mut self) -> Result<()> {
        self.lifecycle.mark_destroyed()?;
        Ok(())
    }
}

impl AttributeDefinition for MappedAttributeDefinition {
    fn id(&self) -> &ComponentId {
        &self.id
    }

    fn dependencies(&self) -> &[ComponentId] {
        &self.dependencies
    }

    fn dependency_only(&self) -> bool {
        self.dependency_only
    }

    fn compute(&self, _ctx: &ResolutionContext, deps: &ResolvedDependencies) -> Result<Attribute> {
        self.lifecycle.ensure_ready()?;
        let mut attribute = Attribute::empty(self.attribute_id.clone());
        for value in deps.text_values_of(&self.source_attribute_id) {
            if let Some(mapped) = self.map.get(&value) {
                attribute.push_value(AttributeValue::string(mapped.clone()));
            } else if let Some(default) = &self.default {
                attribute.push_value(AttributeValue::string(default.clone()));
            } else if self.pass_through {
                attribute.push_value(AttributeValue::string(value));
            }
        }
        Ok(attribute)
    }
}

// ============================================================================
// PrincipalNameDefinition
// ============================================================================

/// Emits the authenticated principal's name as an attribute.
#[derive(Debug)]
pub struct PrincipalNameDefinition {
    id: ComponentId,
    attribute_id: AttributeId,
    dependency_only: bool,
    lifecycle: Lifecycle,
}

impl PrincipalNameDefinition {
    pub fn new(id: impl Into<ComponentId>, attribute_id: impl Into<AttributeId>) -> Self {
        let id = id.into();
        Self {
            lifecycle: Lifecycle::new(id.as_str()),
            id,
            attribute_id: attribute_id.into(),
            dependency_only: false,
        }
    }

    /// Marks this definition as an intermediate excluded from released output.
    pub fn dependency_only(mut self) -> Self {
        self.dependency_only = true;
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

impl AttributeDefinition for PrincipalNameDefinition {
    fn id(&self) -> &ComponentId {
        &self.id
    }

    fn dependency_only(&self) -> bool {
        self.dependency_only
    }

    fn compute(&self, ctx: &ResolutionContext, _deps: &ResolvedDependencies) -> Result<Attribute> {
        self.lifecycle.ensure_ready()?;
        Ok(Attribute::of_strings(
            self.attribute_id.clone(),
            [ctx.principal().to_string()],
        ))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn deps_with(attribute: Attribute) -> ResolvedDependencies {
        let mut deps = ResolvedDependencies::empty();
        deps.push(attribute);
        deps
    }

    #[test]
    fn simple_definition_rekeys_source_values() {
        let mut def = SimpleAttributeDefinition::new("uid-def", "uid", "sam_account")
            .with_dependency("directory");
        def.initialize().expect("initialize");

        let deps = deps_with(Attribute::of_strings("sam_account", ["alice"]));
        let attr = def
            .compute(&ResolutionContext::new("alice"), &deps)
            .expect("compute");
        assert_eq!(attr.id, AttributeId::from("uid"));
        assert_eq!(attr.values(), &[AttributeValue::string("alice")]);
    }

    #[test]
    fn simple_definition_requires_a_dependency() {
        let mut def = SimpleAttributeDefinition::new("uid-def", "uid", "sam_account");
        assert!(matches!(
            def.initialize(),
            Err(ResolverError::ComponentInitialization { .. })
        ));
    }

    #[test]
    fn uninitialized_definition_rejects_compute() {
        let def = PrincipalNameDefinition::new("principal-def", "principal_name");
        let err = def
            .compute(&ResolutionContext::new("alice"), &ResolvedDependencies::empty())
            .expect_err("not initialized");
        assert!(matches!(err, ResolverError::Lifecycle(_)));
    }

    #[test]
    fn scoped_definition_scopes_and_rescopes() {
        let mut def = ScopedAttributeDefinition::new("eppn-def", "eppn", "uid", "example.org")
            .with_dependency("uid-def");
        def.initialize().expect("initialize");

        let deps = deps_with(Attribute::new(
            "uid",
            [
                AttributeValue::string("alice"),
                AttributeValue::scoped("bob", "old.example.com"),
                AttributeValue::Empty,
            ],
        ));
        let attr = def
            .compute(&ResolutionContext::new("alice"), &deps)
            .expect("compute");
        assert_eq!(
            attr.values(),
            &[
                AttributeValue::scoped("alice", "example.org"),
                AttributeValue::scoped("bob", "example.org"),
            ]
        );
    }

    #[test]
    fn template_definition_zips_sources_row_wise() {
        let mut def = TemplateAttributeDefinition::new(
            "dn-def",
            "dn",
            "uid=${uid},ou=${ou},o=${requester}",
        )
        .expect("parse template")
        .with_source_attribute("uid")
        .with_source_attribute("ou")
        .with_dependency("directory");
        def.initialize().expect("initialize");

        let mut deps = ResolvedDependencies::empty();
        deps.push(Attribute::of_strings("uid", ["alice", "bob"]));
        deps.push(Attribute::of_strings("ou", ["people", "staff"]));

        let ctx = ResolutionContext::new("alice").with_requester("sp.example.org");
        let attr = def.compute(&ctx, &deps).expect("compute");
        assert_eq!(
            attr.values(),
            &[
                AttributeValue::string("uid=alice,ou=people,o=sp.example.org"),
                AttributeValue::string("uid=bob,ou=staff,o=sp.example.org"),
            ]
        );
    }

    #[test]
    fn template_definition_rejects_unknown_variables() {
        let mut def = TemplateAttributeDefinition::new("bad-def", "x", "${nonsense}")
            .expect("parse template");
        let err = def.initialize().expect_err("unknown variable");
        assert!(matches!(err, ResolverError::ComponentInitialization { .. }));
    }

    #[test]
    fn template_definition_without_sources_renders_once() {
        let mut def = TemplateAttributeDefinition::new("who-def", "who", "${principal}")
            .expect("parse template");
        def.initialize().expect("initialize");

        let attr = def
            .compute(&ResolutionContext::new("alice"), &ResolvedDependencies::empty())
            .expect("compute");
        assert_eq!(attr.values(), &[AttributeValue::string("alice")]);
    }

    #[test]
    fn mapped_definition_translates_defaults_and_drops() {
        let mut def = MappedAttributeDefinition::new("affiliation-def", "affiliation", "role")
            .with_mapping("ROLE_STAFF", "staff")
            .with_mapping("ROLE_FACULTY", "faculty")
            .with_dependency("directory");
        def.initialize().expect("initialize");

        let deps = deps_with(Attribute::of_strings(
            "role",
            ["ROLE_STAFF", "ROLE_UNKNOWN", "ROLE_FACULTY"],
        ));
        let attr = def
            .compute(&ResolutionContext::new("alice"), &deps)
            .expect("compute");
        assert_eq!(
            attr.values(),
            &[
                AttributeValue::string("staff"),
                AttributeValue::string("faculty"),
            ]
        );
    }

    #[test]
    fn mapped_definition_pass_through_keeps_unmapped() {
        let mut def = MappedAttributeDefinition::new("m", "out", "in")
            .with_mapping("a", "A")
            .pass_through();
        def.initialize().expect("initialize");

        let deps = deps_with(Attribute::of_strings("in", ["a", "b"]));
        let attr = def
            .compute(&ResolutionContext::new("alice"), &deps)
            .expect("compute");
        assert_eq!(
            attr.values(),
            &[AttributeValue::string("A"), AttributeValue::string("b")]
        );
    }

    #[test]
    fn principal_name_definition_reads_the_context() {
        let mut def = PrincipalNameDefinition::new("principal-def", "principal_name");
        def.initialize().expect("initialize");

        let attr = def
            .compute(&ResolutionContext::new("alice"), &ResolvedDependencies::empty())
            .expect("compute");
        assert_eq!(attr.values(), &[AttributeValue::string("alice")]);
    }
}
