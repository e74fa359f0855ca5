//! Service property dictionaries
//!
//! Every provider registration and every component declaration carries a
//! property dictionary. Keys are unique; values are typed. Filters compare
//! against these values, so the comparison rules live here.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_RANKING, RANKING_PROPERTY};

/// A typed property value
///
/// Deserialization is untagged: booleans, integers, floats, strings, and
/// string lists map directly from their JSON/TOML forms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    /// Boolean value
    Bool(bool),
    /// Signed integer value
    Int(i64),
    /// Floating point value
    Float(f64),
    /// String value
    Str(String),
    /// List of strings
    List(Vec<String>),
}

impl PropertyValue {
    /// Equality against a filter literal, using the value's own type
    ///
    /// Integers and floats parse the literal numerically, booleans parse it
    /// as a boolean, lists match if any element equals the literal.
    pub fn matches_literal(&self, literal: &str) -> bool {
        match self {
            PropertyValue::Bool(b) => literal.trim().parse::<bool>() == Ok(*b),
            PropertyValue::Int(i) => literal.trim().parse::<i64>() == Ok(*i),
            PropertyValue::Float(f) => literal
                .trim()
                .parse::<f64>()
                .map(|parsed| parsed == *f)
                .unwrap_or(false),
            PropertyValue::Str(s) => s == literal,
            PropertyValue::List(items) => items.iter().any(|item| item == literal),
        }
    }

    /// Ordering against a filter literal for `>=` / `<=` comparisons
    ///
    /// Returns `None` when the value kind has no meaningful order against the
    /// literal (booleans, lists, unparsable numbers).
    pub fn order_against(&self, literal: &str) -> Option<Ordering> {
        match self {
            PropertyValue::Int(i) => literal
                .trim()
                .parse::<i64>()
                .ok()
                .map(|parsed| i.cmp(&parsed)),
            PropertyValue::Float(f) => literal
                .trim()
                .parse::<f64>()
                .ok()
                .and_then(|parsed| f.partial_cmp(&parsed)),
            PropertyValue::Str(s) => Some(s.as_str().cmp(literal)),
            PropertyValue::Bool(_) | PropertyValue::List(_) => None,
        }
    }

    /// Approximate equality: case-insensitive, whitespace ignored
    pub fn approx_matches(&self, literal: &str) -> bool {
        fn normalize(s: &str) -> String {
            s.chars()
                .filter(|c| !c.is_whitespace())
                .flat_map(char::to_lowercase)
                .collect()
        }
        match self {
            PropertyValue::List(items) => items
                .iter()
                .any(|item| normalize(item) == normalize(literal)),
            other => normalize(&other.to_string()) == normalize(literal),
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Bool(b) => write!(f, "{}", b),
            PropertyValue::Int(i) => write!(f, "{}", i),
            PropertyValue::Float(x) => write!(f, "{}", x),
            PropertyValue::Str(s) => write!(f, "{}", s),
            PropertyValue::List(items) => write!(f, "{}", items.join(",")),
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(s: &str) -> Self {
        PropertyValue::Str(s.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(s: String) -> Self {
        PropertyValue::Str(s)
    }
}

impl From<i64> for PropertyValue {
    fn from(i: i64) -> Self {
        PropertyValue::Int(i)
    }
}

impl From<f64> for PropertyValue {
    fn from(f: f64) -> Self {
        PropertyValue::Float(f)
    }
}

impl From<bool> for PropertyValue {
    fn from(b: bool) -> Self {
        PropertyValue::Bool(b)
    }
}

impl From<Vec<String>> for PropertyValue {
    fn from(items: Vec<String>) -> Self {
        PropertyValue::List(items)
    }
}

/// A property dictionary with unique keys and deterministic iteration order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceProperties(BTreeMap<String, PropertyValue>);

impl ServiceProperties {
    /// Create an empty property dictionary
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insertion
    pub fn with<K: Into<String>, V: Into<PropertyValue>>(mut self, key: K, value: V) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Insert a property, replacing any previous value for the key
    pub fn insert<K: Into<String>, V: Into<PropertyValue>>(&mut self, key: K, value: V) {
        self.0.insert(key.into(), value.into());
    }

    /// Remove a property, returning its previous value
    pub fn remove(&mut self, key: &str) -> Option<PropertyValue> {
        self.0.remove(key)
    }

    /// Look up a property value
    pub fn get(&self, key: &str) -> Option<&PropertyValue> {
        self.0.get(key)
    }

    /// Look up a string property
    pub fn get_str(&self, key: &str) -> Option<&str> {
        match self.0.get(key) {
            Some(PropertyValue::Str(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Look up an integer property
    pub fn get_int(&self, key: &str) -> Option<i64> {
        match self.0.get(key) {
            Some(PropertyValue::Int(i)) => Some(*i),
            _ => None,
        }
    }

    /// The provider ranking encoded in this dictionary
    pub fn ranking(&self) -> i64 {
        self.get_int(RANKING_PROPERTY).unwrap_or(DEFAULT_RANKING)
    }

    /// Iterate over key/value pairs in key order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &PropertyValue)> {
        self.0.iter()
    }

    /// Number of properties
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the dictionary is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, PropertyValue)> for ServiceProperties {
    fn from_iter<I: IntoIterator<Item = (String, PropertyValue)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matches_literal_typed() {
        assert!(PropertyValue::Int(42).matches_literal("42"));
        assert!(!PropertyValue::Int(42).matches_literal("43"));
        assert!(PropertyValue::Bool(true).matches_literal("true"));
        assert!(PropertyValue::Str("abc".into()).matches_literal("abc"));
        assert!(PropertyValue::List(vec!["a".into(), "b".into()]).matches_literal("b"));
    }

    #[test]
    fn test_order_against_numeric() {
        assert_eq!(
            PropertyValue::Int(5).order_against("3"),
            Some(Ordering::Greater)
        );
        assert_eq!(
            PropertyValue::Float(1.5).order_against("2.0"),
            Some(Ordering::Less)
        );
        assert_eq!(PropertyValue::Bool(true).order_against("true"), None);
    }

    #[test]
    fn test_approx_matches_ignores_case_and_whitespace() {
        assert!(PropertyValue::Str("Hello World".into()).approx_matches("helloworld"));
        assert!(PropertyValue::Str("Hello World".into()).approx_matches("HELLO WORLD"));
    }

    #[test]
    fn test_ranking_defaults_to_zero() {
        let props = ServiceProperties::new();
        assert_eq!(props.ranking(), 0);
        let ranked = ServiceProperties::new().with(RANKING_PROPERTY, 7i64);
        assert_eq!(ranked.ranking(), 7);
    }
}
