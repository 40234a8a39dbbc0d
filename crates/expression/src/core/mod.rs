//! Core data types: values, comparison rules, tokens, the expression tree
//! and the XML document model

pub mod compare;
pub mod node;
pub mod token;
pub mod value;
pub mod xml;

pub use node::{ExpressionTree, Node, NodeId, NodeKind};
pub use token::{Span, Token, TokenKind};
pub use value::{
    DATE_FORMAT, EntityKind, EntityRef, NULL_STRING, Value, format_double, parse_double, parse_int,
    parse_iso_date,
};
pub use xml::XmlDocument;
