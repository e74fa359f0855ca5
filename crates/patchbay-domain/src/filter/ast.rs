//! Filter expression AST and evaluation

use std::cmp::Ordering;
use std::fmt;

use crate::error::Result;
use crate::value_objects::{PropertyValue, ServiceProperties};

/// Comparison operator of a filter leaf
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    /// `=` exact, typed equality
    Equal,
    /// `~=` approximate equality (case and whitespace insensitive)
    Approx,
    /// `>=` ordering comparison
    GreaterEq,
    /// `<=` ordering comparison
    LessEq,
}

/// A parsed filter expression
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Conjunction of sub-filters
    And(Vec<Filter>),
    /// Disjunction of sub-filters
    Or(Vec<Filter>),
    /// Negation
    Not(Box<Filter>),
    /// `(attr=*)` - the attribute exists, whatever its value
    Present(String),
    /// `(attr<op>value)` leaf comparison
    Compare {
        /// Attribute name
        attribute: String,
        /// Comparison operator
        op: CompareOp,
        /// Literal to compare against, unescaped
        value: String,
    },
    /// `(attr=a*b)` substring match; `parts` are the literal fragments
    /// between wildcards, always two or more
    Wildcard {
        /// Attribute name
        attribute: String,
        /// Literal fragments; empty strings mark leading/trailing wildcards
        parts: Vec<String>,
    },
}

impl Filter {
    /// Parse filter text into an AST
    pub fn parse(text: &str) -> Result<Filter> {
        super::parser::parse(text)
    }

    /// Evaluate this filter against a property dictionary
    pub fn matches(&self, properties: &ServiceProperties) -> bool {
        match self {
            Filter::And(children) => children.iter().all(|child| child.matches(properties)),
            Filter::Or(children) => children.iter().any(|child| child.matches(properties)),
            Filter::Not(child) => !child.matches(properties),
            Filter::Present(attribute) => properties.get(attribute).is_some(),
            Filter::Compare {
                attribute,
                op,
                value,
            } => match properties.get(attribute) {
                Some(actual) => match op {
                    CompareOp::Equal => actual.matches_literal(value),
                    CompareOp::Approx => actual.approx_matches(value),
                    CompareOp::GreaterEq => matches!(
                        actual.order_against(value),
                        Some(Ordering::Greater | Ordering::Equal)
                    ),
                    CompareOp::LessEq => matches!(
                        actual.order_against(value),
                        Some(Ordering::Less | Ordering::Equal)
                    ),
                },
                None => false,
            },
            Filter::Wildcard { attribute, parts } => match properties.get(attribute) {
                Some(PropertyValue::Str(s)) => wildcard_match(parts, s),
                Some(PropertyValue::List(items)) => {
                    items.iter().any(|item| wildcard_match(parts, item))
                }
                _ => false,
            },
        }
    }
}

/// Substring match of `parts` (fragments between `*`) against `text`
fn wildcard_match(parts: &[String], text: &str) -> bool {
    debug_assert!(parts.len() >= 2);
    let first = &parts[0];
    if !text.starts_with(first.as_str()) {
        return false;
    }
    let mut remainder = &text[first.len()..];
    let last = parts.len() - 1;
    for part in &parts[1..last] {
        match remainder.find(part.as_str()) {
            Some(idx) => remainder = &remainder[idx + part.len()..],
            None => return false,
        }
    }
    let tail = &parts[last];
    remainder.len() >= tail.len() && remainder.ends_with(tail.as_str())
}

/// Escape filter metacharacters in a literal
pub(crate) fn escape_literal(literal: &str) -> String {
    let mut escaped = String::with_capacity(literal.len());
    for c in literal.chars() {
        if matches!(c, '(' | ')' | '*' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Filter::And(children) => {
                f.write_str("(&")?;
                for child in children {
                    write!(f, "{}", child)?;
                }
                f.write_str(")")
            }
            Filter::Or(children) => {
                f.write_str("(|")?;
                for child in children {
                    write!(f, "{}", child)?;
                }
                f.write_str(")")
            }
            Filter::Not(child) => write!(f, "(!{})", child),
            Filter::Present(attribute) => write!(f, "({}=*)", attribute),
            Filter::Compare {
                attribute,
                op,
                value,
            } => {
                let op_text = match op {
                    CompareOp::Equal => "=",
                    CompareOp::Approx => "~=",
                    CompareOp::GreaterEq => ">=",
                    CompareOp::LessEq => "<=",
                };
                write!(f, "({}{}{})", attribute, op_text, escape_literal(value))
            }
            Filter::Wildcard { attribute, parts } => {
                write!(f, "({}=", attribute)?;
                for (i, part) in parts.iter().enumerate() {
                    if i > 0 {
                        f.write_str("*")?;
                    }
                    f.write_str(&escape_literal(part))?;
                }
                f.write_str(")")
            }
        }
    }
}
