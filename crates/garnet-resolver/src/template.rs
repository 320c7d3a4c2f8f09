//! `${name}` text templates.
//!
//! Used for connector cache keys, templated queries and template attribute
//! definitions. Templates are parsed once at component initialization and
//! rendered per request; an unknown variable at render time is an error, not
//! an empty substitution. This is intentionally simple — a full expression
//! language is out of scope for the decision core.

use std::collections::BTreeMap;

use thiserror::Error;

/// Template parse/render errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    /// A `${` without a matching `}`.
    #[error("unclosed variable reference in template '{template}'")]
    Unclosed { template: String },

    /// An empty `${}` reference.
    #[error("empty variable reference in template '{template}'")]
    EmptyVariable { template: String },

    /// A variable had no value at render time.
    #[error("no value for template variable '{name}'")]
    MissingVariable { name: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Variable(String),
}

/// A parsed `${name}` template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    source: String,
    segments: Vec<Segment>,
}

impl Template {
    /// Parses a template. Literal text passes through; `${name}` marks a
    /// variable substitution.
    pub fn parse(source: &str) -> Result<Self, TemplateError> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut rest = source;

        while let Some(start) = rest.find("${") {
            literal.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let Some(end) = after.find('}') else {
                return Err(TemplateError::Unclosed {
                    template: source.to_string(),
                });
            };
            let name = &after[..end];
            if name.is_empty() {
                return Err(TemplateError::EmptyVariable {
                    template: source.to_string(),
                });
            }
            if !literal.is_empty() {
                segments.push(Segment::Literal(std::mem::take(&mut literal)));
            }
            segments.push(Segment::Variable(name.to_string()));
            rest = &after[end + 1..];
        }
        literal.push_str(rest);
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self {
            source: source.to_string(),
            segments,
        })
    }

    /// The original template text.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// The variable names referenced by this template, in order of first use.
    pub fn variables(&self) -> Vec<&str> {
        let mut seen = Vec::new();
        for segment in &self.segments {
            if let Segment::Variable(name) = segment {
                if !seen.contains(&name.as_str()) {
                    seen.push(name.as_str());
                }
            }
        }
        seen
    }

    /// Renders the template against a variable map.
    pub fn render(&self, variables: &BTreeMap<String, String>) -> Result<String, TemplateError> {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Variable(name) => match variables.get(name) {
                    Some(value) => out.push_str(value),
                    None => {
                        return Err(TemplateError::MissingVariable { name: name.clone() });
                    }
                },
            }
        }
        Ok(out)
    }
}

// ============================================================================
// Tests
// ============================================================================
