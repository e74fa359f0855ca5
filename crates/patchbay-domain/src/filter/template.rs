//! Filter templates with context placeholders
//!
//! A template is filter text that may embed `${source.key}` placeholders.
//! Placeholder values come from named context sources; until every
//! referenced key is bound the template stays unresolved and the owning
//! dependency cannot match anything.

use std::collections::BTreeMap;
use std::fmt;

use crate::error::{Error, Result};
use crate::value_objects::PropertyValue;

use super::ast::{escape_literal, Filter};

/// One `${source.key}` reference inside a template
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Placeholder {
    /// Name of the context source
    pub source: String,
    /// Key within that source
    pub key: String,
}

impl fmt::Display for Placeholder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.source, self.key)
    }
}

/// Current values for context keys, keyed by `source` then `key`
#[derive(Debug, Clone, Default)]
pub struct ContextBindings(BTreeMap<String, BTreeMap<String, PropertyValue>>);

impl ContextBindings {
    /// Create an empty binding set
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `source.key` to a value
    pub fn set<S: Into<String>, K: Into<String>, V: Into<PropertyValue>>(
        &mut self,
        source: S,
        key: K,
        value: V,
    ) {
        self.0
            .entry(source.into())
            .or_default()
            .insert(key.into(), value.into());
    }

    /// Look up the value bound to `source.key`
    pub fn get(&self, source: &str, key: &str) -> Option<&PropertyValue> {
        self.0.get(source).and_then(|keys| keys.get(key))
    }
}

/// Outcome of resolving a template against context bindings
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// All placeholders bound; the concrete filter is ready for matching
    Concrete(Filter),
    /// At least one placeholder has no binding
    Unresolved(Vec<Placeholder>),
}

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Literal(String),
    Placeholder(Placeholder),
}

/// Parsed filter text with optional `${source.key}` placeholders
#[derive(Debug, Clone, PartialEq)]
pub struct FilterTemplate {
    raw: String,
    segments: Vec<Segment>,
}

impl FilterTemplate {
    /// Parse template text, validating placeholder syntax and the structural
    /// shape of the filter (placeholders stand in as dummy literals)
    pub fn parse<S: Into<String>>(raw: S) -> Result<Self> {
        let raw = raw.into();
        let segments = split_segments(&raw)?;

        // Structural validation: substitute a dummy literal for every
        // placeholder and require the result to parse.
        let mut probe = String::with_capacity(raw.len());
        for segment in &segments {
            match segment {
                Segment::Literal(text) => probe.push_str(text),
                Segment::Placeholder(_) => probe.push('0'),
            }
        }
        Filter::parse(&probe)
            .map_err(|_| Error::filter_syntax(&raw, "template does not form a valid filter"))?;

        Ok(Self { raw, segments })
    }

    /// The original template text
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Whether the template references any context keys
    pub fn has_placeholders(&self) -> bool {
        self.segments
            .iter()
            .any(|segment| matches!(segment, Segment::Placeholder(_)))
    }

    /// The distinct placeholders referenced, in order of first appearance
    pub fn placeholders(&self) -> Vec<Placeholder> {
        let mut seen = Vec::new();
        for segment in &self.segments {
            if let Segment::Placeholder(placeholder) = segment {
                if !seen.contains(placeholder) {
                    seen.push(placeholder.clone());
                }
            }
        }
        seen
    }

    /// Substitute bound context values and parse the concrete filter
    ///
    /// Values are escaped before substitution so context data can never
    /// change the structure of the filter.
    pub fn resolve(&self, bindings: &ContextBindings) -> Result<Resolution> {
        let mut missing = Vec::new();
        let mut concrete = String::with_capacity(self.raw.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => concrete.push_str(text),
                Segment::Placeholder(placeholder) => {
                    match bindings.get(&placeholder.source, &placeholder.key) {
                        Some(value) => {
                            concrete.push_str(&escape_literal(&value.to_string()));
                        }
                        None => {
                            if !missing.contains(placeholder) {
                                missing.push(placeholder.clone());
                            }
                        }
                    }
                }
            }
        }
        if !missing.is_empty() {
            return Ok(Resolution::Unresolved(missing));
        }
        Ok(Resolution::Concrete(Filter::parse(&concrete)?))
    }
}

impl fmt::Display for FilterTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

fn split_segments(raw: &str) -> Result<Vec<Segment>> {
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut rest = raw;
    while let Some(start) = rest.find("${") {
        literal.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = after.find('}').ok_or_else(|| {
            Error::filter_syntax(raw, "unterminated `${` placeholder".to_string())
        })?;
        let token = &after[..end];
        let (source, key) = token.split_once('.').ok_or_else(|| {
            Error::filter_syntax(
                raw,
                format!("placeholder `{}` must have the form source.key", token),
            )
        })?;
        if source.is_empty() || key.is_empty() {
            return Err(Error::filter_syntax(
                raw,
                format!("placeholder `{}` must have the form source.key", token),
            ));
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(std::mem::take(&mut literal)));
        }
        segments.push(Segment::Placeholder(Placeholder {
            source: source.to_string(),
            key: key.to_string(),
        }));
        rest = &after[end + 1..];
    }
    literal.push_str(rest);
    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }
    Ok(segments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value_objects::ServiceProperties;

    #[test]
    fn test_template_without_placeholders_resolves_immediately() {
        let template = FilterTemplate::parse("(id=2)").unwrap();
        assert!(!template.has_placeholders());
        match template.resolve(&ContextBindings::new()).unwrap() {
            Resolution::Concrete(filter) => {
                assert!(filter.matches(&ServiceProperties::new().with("id", 2i64)));
            }
            Resolution::Unresolved(_) => panic!("expected concrete resolution"),
        }
    }

    #[test]
    fn test_unbound_placeholder_reports_missing() {
        let template = FilterTemplate::parse("(id=${src.id})").unwrap();
        match template.resolve(&ContextBindings::new()).unwrap() {
            Resolution::Unresolved(missing) => {
                assert_eq!(missing.len(), 1);
                assert_eq!(missing[0].to_string(), "src.id");
            }
            Resolution::Concrete(_) => panic!("expected unresolved"),
        }
    }

    #[test]
    fn test_bound_placeholder_substitutes_value() {
        let template = FilterTemplate::parse("(id=${src.id})").unwrap();
        let mut bindings = ContextBindings::new();
        bindings.set("src", "id", 2i64);
        match template.resolve(&bindings).unwrap() {
            Resolution::Concrete(filter) => {
                assert!(filter.matches(&ServiceProperties::new().with("id", 2i64)));
                assert!(!filter.matches(&ServiceProperties::new().with("id", 3i64)));
            }
            Resolution::Unresolved(_) => panic!("expected concrete resolution"),
        }
    }

    #[test]
    fn test_substituted_values_are_escaped() {
        let template = FilterTemplate::parse("(name=${src.name})").unwrap();
        let mut bindings = ContextBindings::new();
        bindings.set("src", "name", "we(ird)*value");
        match template.resolve(&bindings).unwrap() {
            Resolution::Concrete(filter) => {
                assert!(filter.matches(&ServiceProperties::new().with("name", "we(ird)*value")));
            }
            Resolution::Unresolved(_) => panic!("expected concrete resolution"),
        }
    }

    #[test]
    fn test_malformed_placeholders_rejected() {
        assert!(FilterTemplate::parse("(id=${src.id)").is_err());
        assert!(FilterTemplate::parse("(id=${srcid})").is_err());
        assert!(FilterTemplate::parse("(id=${.id})").is_err());
    }

    #[test]
    fn test_structurally_invalid_template_rejected() {
        assert!(FilterTemplate::parse("(id=${src.id}").is_err());
    }
}
