//! Dependency cardinality

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// How many providers a dependency binds, and whether it needs any at all
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Cardinality {
    /// `0..1` - at most one provider, satisfied even with none
    #[serde(rename = "0..1")]
    ZeroOrOne,
    /// `1..1` - exactly one provider required
    #[default]
    #[serde(rename = "1..1")]
    ExactlyOne,
    /// `0..n` - any number of providers, satisfied even with none
    #[serde(rename = "0..n")]
    ZeroOrMore,
    /// `1..n` - one or more providers required
    #[serde(rename = "1..n")]
    OneOrMore,
}

impl Cardinality {
    /// Whether the dependency binds more than one provider
    pub fn is_multiple(self) -> bool {
        matches!(self, Cardinality::ZeroOrMore | Cardinality::OneOrMore)
    }

    /// Whether satisfaction requires at least one selected provider
    pub fn requires_provider(self) -> bool {
        matches!(self, Cardinality::ExactlyOne | Cardinality::OneOrMore)
    }

    /// Upper bound on the selected set, `None` when unbounded
    pub fn limit(self) -> Option<usize> {
        match self {
            Cardinality::ZeroOrOne | Cardinality::ExactlyOne => Some(1),
            Cardinality::ZeroOrMore | Cardinality::OneOrMore => None,
        }
    }
}

impl fmt::Display for Cardinality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Cardinality::ZeroOrOne => "0..1",
            Cardinality::ExactlyOne => "1..1",
            Cardinality::ZeroOrMore => "0..n",
            Cardinality::OneOrMore => "1..n",
        };
        f.write_str(text)
    }
}

impl FromStr for Cardinality {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "0..1" => Ok(Cardinality::ZeroOrOne),
            "1..1" => Ok(Cardinality::ExactlyOne),
            "0..n" => Ok(Cardinality::ZeroOrMore),
            "1..n" => Ok(Cardinality::OneOrMore),
            other => Err(Error::declaration(format!(
                "invalid cardinality `{}`, expected 0..1, 1..1, 0..n, or 1..n",
                other
            ))),
        }
    }
}
