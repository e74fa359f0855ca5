//! Recursive-descent parser for filter expressions
//!
//! Grammar (LDAP-style):
//!
//! ```text
//! filter     = '(' filtercomp ')'
//! filtercomp = '&' filter+ | '|' filter+ | '!' filter | operation
//! operation  = attribute ( '=' | '~=' | '>=' | '<=' ) value
//! ```
//!
//! A value of exactly `*` is a presence test; unescaped `*` inside an `=`
//! value builds a substring match. `\` escapes the next character.

use crate::error::{Error, Result};

use super::ast::{CompareOp, Filter};

/// Parse filter text into an AST
pub fn parse(text: &str) -> Result<Filter> {
    let mut parser = Parser {
        text,
        chars: text.chars().collect(),
        pos: 0,
    };
    parser.skip_ws();
    let filter = parser.parse_filter()?;
    parser.skip_ws();
    if parser.pos != parser.chars.len() {
        return Err(parser.error("unexpected trailing characters"));
    }
    Ok(filter)
}

struct Parser<'a> {
    text: &'a str,
    chars: Vec<char>,
    pos: usize,
}

impl Parser<'_> {
    fn error(&self, message: &str) -> Error {
        Error::filter_syntax(self.text, format!("{} at position {}", message, self.pos))
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn expect(&mut self, expected: char) -> Result<()> {
        if self.peek() == Some(expected) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error(&format!("expected `{}`", expected)))
        }
    }

    fn skip_ws(&mut self) {
        while self.peek().map(char::is_whitespace) == Some(true) {
            self.pos += 1;
        }
    }

    fn parse_filter(&mut self) -> Result<Filter> {
        self.expect('(')?;
        self.skip_ws();
        let filter = match self.peek() {
            Some('&') => {
                self.pos += 1;
                Filter::And(self.parse_children()?)
            }
            Some('|') => {
                self.pos += 1;
                Filter::Or(self.parse_children()?)
            }
            Some('!') => {
                self.pos += 1;
                self.skip_ws();
                Filter::Not(Box::new(self.parse_filter()?))
            }
            Some(_) => self.parse_operation()?,
            None => return Err(self.error("unexpected end of filter")),
        };
        self.skip_ws();
        self.expect(')')?;
        Ok(filter)
    }

    fn parse_children(&mut self) -> Result<Vec<Filter>> {
        let mut children = Vec::new();
        self.skip_ws();
        while self.peek() == Some('(') {
            children.push(self.parse_filter()?);
            self.skip_ws();
        }
        if children.is_empty() {
            return Err(self.error("composite filter needs at least one operand"));
        }
        Ok(children)
    }

    fn parse_operation(&mut self) -> Result<Filter> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if matches!(c, '=' | '<' | '>' | '~' | '(' | ')') {
                break;
            }
            self.pos += 1;
        }
        let attribute: String = self.chars[start..self.pos].iter().collect();
        let attribute = attribute.trim().to_string();
        if attribute.is_empty() {
            return Err(self.error("missing attribute name"));
        }

        let op = match self.peek() {
            Some('=') => {
                self.pos += 1;
                CompareOp::Equal
            }
            Some('~') => {
                self.pos += 1;
                self.expect('=')?;
                CompareOp::Approx
            }
            Some('>') => {
                self.pos += 1;
                self.expect('=')?;
                CompareOp::GreaterEq
            }
            Some('<') => {
                self.pos += 1;
                self.expect('=')?;
                CompareOp::LessEq
            }
            _ => return Err(self.error("expected `=`, `~=`, `>=`, or `<=`")),
        };

        // Fragments between unescaped `*`; a single fragment is a plain value.
        let mut parts: Vec<String> = Vec::new();
        let mut current = String::new();
        loop {
            match self.peek() {
                None => return Err(self.error("unterminated filter value")),
                Some(')') => break,
                Some('(') => return Err(self.error("unescaped `(` in filter value")),
                Some('*') if op == CompareOp::Equal => {
                    self.pos += 1;
                    parts.push(std::mem::take(&mut current));
                }
                Some('*') => return Err(self.error("wildcards are only valid with `=`")),
                Some('\\') => {
                    self.pos += 1;
                    match self.peek() {
                        Some(c) => {
                            current.push(c);
                            self.pos += 1;
                        }
                        None => return Err(self.error("dangling escape")),
                    }
                }
                Some(c) => {
                    current.push(c);
                    self.pos += 1;
                }
            }
        }
        parts.push(current);

        if parts.len() == 1 {
            let value = parts.pop().unwrap_or_default();
            Ok(Filter::Compare {
                attribute,
                op,
                value,
            })
        } else if parts.len() == 2 && parts[0].is_empty() && parts[1].is_empty() {
            Ok(Filter::Present(attribute))
        } else {
            Ok(Filter::Wildcard { attribute, parts })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_operation() {
        let filter = parse("(id=42)").unwrap();
        assert_eq!(
            filter,
            Filter::Compare {
                attribute: "id".into(),
                op: CompareOp::Equal,
                value: "42".into(),
            }
        );
    }

    #[test]
    fn test_parse_presence() {
        assert_eq!(parse("(id=*)").unwrap(), Filter::Present("id".into()));
    }

    #[test]
    fn test_parse_nested_composite() {
        let filter = parse("(&(a=1)(|(b>=2)(!(c~=x))))").unwrap();
        match filter {
            Filter::And(children) => assert_eq!(children.len(), 2),
            other => panic!("expected And, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_escapes() {
        let filter = parse(r"(path=\(root\)\*)").unwrap();
        assert_eq!(
            filter,
            Filter::Compare {
                attribute: "path".into(),
                op: CompareOp::Equal,
                value: "(root)*".into(),
            }
        );
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(parse("(a=1").is_err());
        assert!(parse("a=1)").is_err());
        assert!(parse("(&)").is_err());
        assert!(parse("(=1)").is_err());
        assert!(parse("(a>1)").is_err());
        assert!(parse("(a=1)(b=2)").is_err());
        assert!(parse("(a>=1*)").is_err());
    }

    #[test]
    fn test_parse_tolerates_whitespace() {
        assert!(parse("  (&  (a=1) (b=2) )  ").is_ok());
    }
}
