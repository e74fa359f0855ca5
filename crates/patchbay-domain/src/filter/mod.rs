//! Filter expressions
//!
//! LDAP-style filter expressions select providers by their properties:
//! `(&(protocol=amqp)(!(region=eu))(patchbay.ranking>=5))`. Filters are
//! parsed once into an AST and evaluated against property dictionaries.
//! Templates additionally carry `${source.key}` placeholders resolved
//! against context sources before matching.

pub mod ast;
pub mod parser;
pub mod template;

pub use ast::{CompareOp, Filter};
pub use template::{ContextBindings, FilterTemplate, Placeholder, Resolution};
