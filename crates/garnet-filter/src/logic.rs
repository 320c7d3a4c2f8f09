//! Composite matchers: And, Or, Not.
//!
//! Composites hold their child list as an immutable snapshot fixed before
//! `initialize()`. Gate truth tables are normative:
//!
//! - AND short-circuits on the first `False` child, otherwise yields `Fail`
//!   if any child failed, otherwise `True`.
//! - OR short-circuits on the first `True` child, otherwise yields `Fail`
//!   if any child failed, otherwise `False`.
//! - NOT swaps `True`/`False` and fixes `Fail`.
//!
//! In selector mode AND intersects child selections, OR unions them and NOT
//! complements its child's selection; all three preserve the attribute's
//! value order.

use std::sync::Arc;

use garnet_types::{Attribute, AttributeValue, ComponentId, Lifecycle, Tristate};

use crate::context::FilterContext;
use crate::error::{FilterError, Result};
use crate::matcher::Matcher;

// ============================================================================
// AndMatcher
// ============================================================================

/// Matches when every child matches.
#[derive(Debug)]
pub struct AndMatcher {
    id: ComponentId,
    children: Vec<Arc<dyn Matcher>>,
    lifecycle: Lifecycle,
}

impl AndMatcher {
    pub fn new(id: impl Into<ComponentId>) -> Self {
        let id = id.into();
        Self {
            lifecycle: Lifecycle::new(id.as_str()),
            id,
            children: Vec::new(),
        }
    }

    /// Adds a child to the composite. Children are fixed at `initialize()`.
    pub fn with_child(mut self, child: Arc<dyn Matcher>) -> Self {
        self.children.push(child);
        self
    }

    pub fn initialize(&mut self) -> Result<()> {
        self.lifecycle.ensure_unconfigured()?;
        if self.children.is_empty() {
            return Err(FilterError::EmptyComposite(self.id.clone()));
        }
        self.lifecycle.mark_ready()?;
        Ok(())
    }

    pub fn destroy(&mut self) -> Result<()> {
        self.lifecycle.mark_destroyed()?;
        Ok(())
    }
}

impl Matcher for AndMatcher {
    fn id(&self) -> &ComponentId {
        &self.id
    }

    fn gate(&self, ctx: &FilterContext) -> Result<Tristate> {
        // Capture the child list before the guard check; a caller must never
        // observe a half-updated list.
        let children = self.children.as_slice();
        self.lifecycle.ensure_ready()?;
        let mut failed = false;
        for child in children {
            match child.gate(ctx)? {
                Tristate::False => return Ok(Tristate::False),
                Tristate::Fail => failed = true,
                Tristate::True => {}
            }
        }
        Ok(if failed { Tristate::Fail } else { Tristate::True })
    }

    fn select(&self, attribute: &Attribute, ctx: &FilterContext) -> Result<Vec<AttributeValue>> {
        let children = self.children.as_slice();
        self.lifecycle.ensure_ready()?;
        let mut selected = attribute.values().to_vec();
        for child in children {
            let child_selection = child.select(attribute, ctx)?;
            selected.retain(|value| child_selection.contains(value));
        }
        Ok(selected)
    }
}

// ============================================================================
// OrMatcher
// ============================================================================

/// Matches when any child matches.
#[derive(Debug)]
pub struct OrMatcher {
    id: ComponentId,
    children: Vec<Arc<dyn Matcher>>,
    lifecycle: Lifecycle,
}

impl OrMatcher {
    pub fn new(id: impl Into<ComponentId>) -> Self {
        let id = id.into();
        Self {
            lifecycle: Lifecycle::new(id.as_str()),
            id,
            children: Vec::new(),
        }
    }

    /// Adds a child to the composite. Children are fixed at `initialize()`.
    pub fn with_child(mut self, child: Arc<dyn Matcher>) -> Self {
        self.children.push(child);
        self
    }

    pub fn initialize(&mut self) -> Result<()> {
        self.lifecycle.ensure_unconfigured()?;
        if self.children.is_empty() {
            return Err(FilterError::EmptyComposite(self.id.clone()));
        }
        self.lifecycle.mark_ready()?;
        Ok(())
    }

    pub fn destroy(&mut self) -> Result<()> {
        self.lifecycle.mark_destroyed()?;
        Ok(())
    }
}

impl Matcher for OrMatcher {
    fn id(&self) -> &ComponentId {
        &self.id
    }

    fn gate(&self, ctx: &FilterContext) -> Result<Tristate> {
        let children = self.children.as_slice();
        self.lifecycle.ensure_ready()?;
        let mut failed = false;
        for child in children {
            match child.gate(ctx)? {
                Tristate::True => return Ok(Tristate::True),
                Tristate::Fail => failed = true,
                Tristate::False => {}
            }
        }
        Ok(if failed { Tristate::Fail } else { Tristate::False })
    }

    fn select(&self, attribute: &Attribute, ctx: &FilterContext) -> Result<Vec<AttributeValue>> {
        let children = self.children.as_slice();
        self.lifecycle.ensure_ready()?;
        let mut union: Vec<AttributeValue> = Vec::new();
        for child in children {
            for value in child.select(attribute, ctx)? {
                if !union.contains(&value) {
                    union.push(value);
                }
            }
        }
        Ok(attribute
            .values()
            .iter()
            .filter(|value| union.contains(value))
            .cloned()
            .collect())
    }
}

// ============================================================================
// NotMatcher
// ============================================================================

/// Inverts its single child: gate negation, selector complement.
#[derive(Debug)]
pub struct NotMatcher {
    id: ComponentId,
    children: Vec<Arc<dyn Matcher>>,
    lifecycle: Lifecycle,
}

impl NotMatcher {
    pub fn new(id: impl Into<ComponentId>) -> Self {
        let id = id.into();
        Self {
            lifecycle: Lifecycle::new(id.as_str()),
            id,
            children: Vec::new(),
        }
    }

    /// Sets the child to invert. Exactly one child is required.
    pub fn with_child(mut self, child: Arc<dyn Matcher>) -> Self {
        self.children.push(child);
        self
    }

    pub fn initialize(&mut self) -> Result<()> {
        self.lifecycle.ensure_unconfigured()?;
        if self.children.is_empty() {
            return Err(FilterError::EmptyComposite(self.id.clone()));
        }
        if self.children.len() > 1 {
            return Err(FilterError::ComponentInitialization {
                component: self.id.clone(),
                reason: format!("requires exactly one child, got {}", self.children.len()),
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

impl Matcher for NotMatcher {
    fn id(&self) -> &ComponentId {
        &self.id
    }

    /// `Fail` stays `Fail`: an undecidable child is still undecidable
    /// inverted, and must remain a non-match.
    fn gate(&self, ctx: &FilterContext) -> Result<Tristate> {
        let children = self.children.as_slice();
        self.lifecycle.ensure_ready()?;
        match children.first() {
            Some(child) => Ok(child.gate(ctx)?.negate()),
            None => Ok(Tristate::Fail),
        }
    }

    fn select(&self, attribute: &Attribute, ctx: &FilterContext) -> Result<Vec<AttributeValue>> {
        let children = self.children.as_slice();
        self.lifecycle.ensure_ready()?;
        let Some(child) = children.first() else {
            return Ok(Vec::new());
        };
        let child_selection = child.select(attribute, ctx)?;
        Ok(attribute
            .values()
            .iter()
            .filter(|value| !child_selection.contains(value))
            .cloned()
            .collect())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::BTreeMap;
    use std::collections::HashSet;
    use test_case::test_case;

    /// Gate stub with a fixed verdict; selects everything when `True`.
    #[derive(Debug)]
    struct FixedMatcher {
        id: ComponentId,
        verdict: Tristate,
    }

    impl FixedMatcher {
        fn new(verdict: Tristate) -> Arc<dyn Matcher> {
            Arc::new(Self {
                id: ComponentId::from("fixed"),
                verdict,
            })
        }
    }

    impl Matcher for FixedMatcher {
        fn id(&self) -> &ComponentId {
            &self.id
        }

        fn gate(&self, _ctx: &FilterContext) -> Result<Tristate> {
            Ok(self.verdict)
        }
    }

    /// Selector stub permitting a fixed allow-list of string values.
    #[derive(Debug)]
    struct AllowListMatcher {
        id: ComponentId,
        allowed: Vec<AttributeValue>,
    }

    impl AllowListMatcher {
        fn new(allowed: &[&str]) -> Arc<dyn Matcher> {
            Arc::new(Self {
                id: ComponentId::from("allow-list"),
                allowed: allowed.iter().map(|v| AttributeValue::string(*v)).collect(),
            })
        }
    }

    impl Matcher for AllowListMatcher {
        fn id(&self) -> &ComponentId {
            &self.id
        }

        fn gate(&self, _ctx: &FilterContext) -> Result<Tristate> {
            Ok(Tristate::True)
        }

        fn select(
            &self,
            attribute: &Attribute,
            _ctx: &FilterContext,
        ) -> Result<Vec<AttributeValue>> {
            Ok(attribute
                .values()
                .iter()
                .filter(|value| self.allowed.contains(value))
                .cloned()
                .collect())
        }
    }

    fn ctx() -> FilterContext {
        FilterContext::new("alice", BTreeMap::new())
    }

    fn and_of(verdicts: &[Tristate]) -> AndMatcher {
        let mut matcher = verdicts
            .iter()
            .fold(AndMatcher::new("and"), |m, v| m.with_child(FixedMatcher::new(*v)));
        matcher.initialize().expect("initialize and");
        matcher
    }

    fn or_of(verdicts: &[Tristate]) -> OrMatcher {
        let mut matcher = verdicts
            .iter()
            .fold(OrMatcher::new("or"), |m, v| m.with_child(FixedMatcher::new(*v)));
        matcher.initialize().expect("initialize or");
        matcher
    }

    #[test_case(&[Tristate::False, Tristate::Fail], Tristate::False; "short circuit beats fail")]
    #[test_case(&[Tristate::True, Tristate::Fail], Tristate::Fail; "fail taints true")]
    #[test_case(&[Tristate::True, Tristate::True], Tristate::True; "all true")]
    #[test_case(&[Tristate::Fail, Tristate::False], Tristate::False; "false wins regardless of order")]
    fn and_truth_table(verdicts: &[Tristate], expected: Tristate) {
        assert_eq!(and_of(verdicts).gate(&ctx()).expect("gate"), expected);
    }

    #[test_case(&[Tristate::True, Tristate::Fail], Tristate::True; "short circuit beats fail")]
    #[test_case(&[Tristate::False, Tristate::Fail], Tristate::Fail; "fail taints false")]
    #[test_case(&[Tristate::False, Tristate::False], Tristate::False; "all false")]
    #[test_case(&[Tristate::Fail, Tristate::True], Tristate::True; "true wins regardless of order")]
    fn or_truth_table(verdicts: &[Tristate], expected: Tristate) {
        assert_eq!(or_of(verdicts).gate(&ctx()).expect("gate"), expected);
    }

    #[test]
    fn truth_tables_exhaustive_over_pairs() {
        const ALL: [Tristate; 3] = [Tristate::True, Tristate::False, Tristate::Fail];
        for a in ALL {
            for b in ALL {
                let and = and_of(&[a, b]).gate(&ctx()).expect("and gate");
                let expected_and = if a == Tristate::False || b == Tristate::False {
                    Tristate::False
                } else if a == Tristate::Fail || b == Tristate::Fail {
                    Tristate::Fail
                } else {
                    Tristate::True
                };
                assert_eq!(and, expected_and, "And({a:?}, {b:?})");

                let or = or_of(&[a, b]).gate(&ctx()).expect("or gate");
                let expected_or = if a == Tristate::True || b == Tristate::True {
                    Tristate::True
                } else if a == Tristate::Fail || b == Tristate::Fail {
                    Tristate::Fail
                } else {
                    Tristate::False
                };
                assert_eq!(or, expected_or, "Or({a:?}, {b:?})");
            }
        }
    }

    #[test]
    fn not_swaps_true_false_and_fixes_fail() {
        for (input, expected) in [
            (Tristate::True, Tristate::False),
            (Tristate::False, Tristate::True),
            (Tristate::Fail, Tristate::Fail),
        ] {
            let mut matcher = NotMatcher::new("not").with_child(FixedMatcher::new(input));
            matcher.initialize().expect("initialize not");
            assert_eq!(matcher.gate(&ctx()).expect("gate"), expected);
        }
    }

    #[test]
    fn empty_composites_fail_initialize() {
        assert!(matches!(
            AndMatcher::new("and").initialize(),
            Err(FilterError::EmptyComposite(_))
        ));
        assert!(matches!(
            OrMatcher::new("or").initialize(),
            Err(FilterError::EmptyComposite(_))
        ));
        assert!(matches!(
            NotMatcher::new("not").initialize(),
            Err(FilterError::EmptyComposite(_))
        ));
    }

    #[test]
    fn not_rejects_a_second_child() {
        let mut matcher = NotMatcher::new("not")
            .with_child(FixedMatcher::new(Tristate::True))
            .with_child(FixedMatcher::new(Tristate::False));
        assert!(matches!(
            matcher.initialize(),
            Err(FilterError::ComponentInitialization { .. })
        ));
    }

    #[test]
    fn gate_before_initialize_is_a_lifecycle_error() {
        let matcher = AndMatcher::new("and").with_child(FixedMatcher::new(Tristate::True));
        assert!(matches!(
            matcher.gate(&ctx()),
            Err(FilterError::Lifecycle(_))
        ));
    }

    #[test]
    fn destroyed_composite_rejects_use() {
        let mut matcher = AndMatcher::new("and").with_child(FixedMatcher::new(Tristate::True));
        matcher.initialize().expect("initialize");
        matcher.destroy().expect("destroy");
        assert!(matches!(
            matcher.gate(&ctx()),
            Err(FilterError::Lifecycle(_))
        ));
    }

    #[test]
    fn and_selects_the_intersection_in_order() {
        let attribute = Attribute::of_strings("group", ["a", "b", "c", "d"]);
        let mut matcher = AndMatcher::new("and")
            .with_child(AllowListMatcher::new(&["a", "b", "c"]))
            .with_child(AllowListMatcher::new(&["b", "c", "d"]));
        matcher.initialize().expect("initialize");
        assert_eq!(
            matcher.select(&attribute, &ctx()).expect("select"),
            vec![AttributeValue::string("b"), AttributeValue::string("c")]
        );
    }

    #[test]
    fn or_selects_the_union_in_order() {
        let attribute = Attribute::of_strings("group", ["a", "b", "c", "d"]);
        let mut matcher = OrMatcher::new("or")
            .with_child(AllowListMatcher::new(&["d"]))
            .with_child(AllowListMatcher::new(&["a"]));
        matcher.initialize().expect("initialize");
        assert_eq!(
            matcher.select(&attribute, &ctx()).expect("select"),
            vec![AttributeValue::string("a"), AttributeValue::string("d")]
        );
    }

    #[test]
    fn not_selects_the_complement() {
        let attribute = Attribute::of_strings("group", ["a", "b", "c"]);
        let mut matcher = NotMatcher::new("not").with_child(AllowListMatcher::new(&["b"]));
        matcher.initialize().expect("initialize");
        assert_eq!(
            matcher.select(&attribute, &ctx()).expect("select"),
            vec![AttributeValue::string("a"), AttributeValue::string("c")]
        );
    }

    proptest! {
        /// And/Or selection equals set intersection/union of child results.
        #[test]
        fn composite_selection_is_set_algebra(
            values in proptest::collection::btree_set("[a-f]", 0..6),
            left in proptest::collection::btree_set("[a-f]", 0..6),
            right in proptest::collection::btree_set("[a-f]", 0..6),
        ) {
            let attribute = Attribute::of_strings("p", values.iter().cloned());
            let left_list: Vec<&str> = left.iter().map(String::as_str).collect();
            let right_list: Vec<&str> = right.iter().map(String::as_str).collect();

            let mut and = AndMatcher::new("and")
                .with_child(AllowListMatcher::new(&left_list))
                .with_child(AllowListMatcher::new(&right_list));
            and.initialize().expect("initialize and");
            let and_selected: HashSet<AttributeValue> =
                and.select(&attribute, &ctx()).expect("and select").into_iter().collect();
            let expected_and: HashSet<AttributeValue> = values
                .iter()
                .filter(|v| left.contains(*v) && right.contains(*v))
                .map(|v| AttributeValue::string(v.clone()))
                .collect();
            prop_assert_eq!(and_selected, expected_and);

            let mut or = OrMatcher::new("or")
                .with_child(AllowListMatcher::new(&left_list))
                .with_child(AllowListMatcher::new(&right_list));
            or.initialize().expect("initialize or");
            let or_selected: HashSet<AttributeValue> =
                or.select(&attribute, &ctx()).expect("or select").into_iter().collect();
            let expected_or: HashSet<AttributeValue> = values
                .iter()
                .filter(|v| left.contains(*v) || right.contains(*v))
                .map(|v| AttributeValue::string(v.clone()))
                .collect();
            prop_assert_eq!(or_selected, expected_or);
        }
    }
}
