//! Token-driven tree builder
//!
//! The parser walks the token stream once, keeping an insertion cursor
//! (`current`), the most recently created node (`next`) and the bracket
//! depth. Brackets move the cursor down into the node they open and back up
//! to its parent when they close; the parent chain of the tree is the only
//! stack. Arity and argument types are not checked here, every function
//! validates its own arguments when it is applied.

use structr_log::debug;

use crate::core::{ExpressionTree, NodeId, NodeKind, TokenKind, Value};
use crate::error::{ExpressionError, ExpressionResult};
use crate::functions::FunctionRegistry;
use crate::lexer::Lexer;

/// Builds an [`ExpressionTree`] from expression text
pub struct Parser<'a> {
    registry: &'a FunctionRegistry,
    tree: ExpressionTree,
    current: Option<NodeId>,
    next: Option<NodeId>,
    level: i32,
    last_token: String,
    /// No operand since the last opening bracket or separator, so a `[`
    /// starts a list literal instead of indexing
    separated: bool,
}

impl<'a> Parser<'a> {
    /// Create a parser resolving function names against `registry`
    pub fn new(registry: &'a FunctionRegistry) -> Self {
        Self {
            registry,
            tree: ExpressionTree::new(),
            current: Some(ExpressionTree::ROOT),
            next: None,
            level: 0,
            last_token: String::new(),
            separated: true,
        }
    }

    /// Parse `expression` into a tree
    ///
    /// # Errors
    ///
    /// Unbalanced brackets, operands appearing where no bracket is open, and
    /// special forms with too many parameters.
    pub fn parse(mut self, expression: &str) -> ExpressionResult<ExpressionTree> {
        let normalized = expression.replace('\n', " ");
        let tokens = Lexer::new(&normalized).tokenize();

        for token in tokens {
            match token.kind {
                TokenKind::Eof => break,
                TokenKind::Eol => {}
                TokenKind::Number(number) => self.number(number)?,
                TokenKind::Word(word) => self.word(word)?,
                TokenKind::Char('(') => self.open_group()?,
                TokenKind::Char(')') => self.close_bracket(')')?,
                TokenKind::Char('[') => self.open_array()?,
                TokenKind::Char(']') => self.close_bracket(']')?,
                TokenKind::Char(';') => {
                    self.next = None;
                    self.last_token.push(';');
                    self.separated = true;
                }
                TokenKind::Char(',') => {
                    self.next = self.current;
                    self.last_token.push(',');
                    self.separated = true;
                }
                TokenKind::Char(c) => self.constant(c.to_string())?,
                TokenKind::Quoted { text, .. } => self.constant(text)?,
            }
        }

        if self.level > 0 {
            return Err(ExpressionError::parse_error(format!(
                "Invalid expression: mismatched closing bracket after {}",
                self.last_token
            )));
        }

        debug!(nodes = self.tree.len(), "Parsed expression");
        Ok(self.tree)
    }

    /// Cursor, or the parse error for an operand found outside any bracket
    fn cursor(&self, before: &str) -> ExpressionResult<NodeId> {
        self.current.ok_or_else(|| {
            ExpressionError::parse_error(format!(
                "Invalid expression: mismatched opening bracket before {before}"
            ))
        })
    }

    fn number(&mut self, number: f64) -> ExpressionResult<()> {
        let current = self.cursor("NUMBER")?;
        let node = self
            .tree
            .add(current, NodeKind::Constant(Value::Number(number)))?;
        self.next = Some(node);
        self.last_token.push_str("NUMBER");
        self.separated = false;
        Ok(())
    }

    fn word(&mut self, word: String) -> ExpressionResult<()> {
        let current = self.cursor(&word)?;
        let node = self.tree.add(current, self.resolve(&word))?;
        self.next = Some(node);
        self.last_token = word;
        self.separated = false;
        Ok(())
    }

    /// Reserved words first, then registered functions; anything else is a
    /// value lookup
    fn resolve(&self, word: &str) -> NodeKind {
        match word {
            "null" => NodeKind::Null,
            "true" => NodeKind::Constant(Value::Bool(true)),
            "false" => NodeKind::Constant(Value::Bool(false)),
            "cache" => NodeKind::Cache,
            "if" => NodeKind::If,
            "each" => NodeKind::Each,
            "filter" => NodeKind::Filter,
            "data" => NodeKind::Value(word.to_string()),
            _ => match self.registry.get(word) {
                Some(function) => NodeKind::Function(function.clone()),
                None => NodeKind::Value(word.to_string()),
            },
        }
    }

    fn constant(&mut self, text: String) -> ExpressionResult<()> {
        let current = self.cursor(&text)?;
        self.tree
            .add(current, NodeKind::Constant(Value::Text(text.clone())))?;
        self.last_token = text;
        self.separated = false;
        Ok(())
    }

    fn open_group(&mut self) -> ExpressionResult<()> {
        let at_top = matches!(self.current, None | Some(ExpressionTree::ROOT));
        if (at_top && self.next.is_none()) || self.current == self.next {
            let current = self.cursor("(")?;
            self.next = Some(self.tree.add(current, NodeKind::Group)?);
        }

        self.current = self.next;
        self.last_token.push('(');
        self.level += 1;
        self.separated = true;
        Ok(())
    }

    fn open_array(&mut self) -> ExpressionResult<()> {
        let current = self.cursor("[")?;
        let array = match self.tree.last_child(current) {
            Some(target) if !self.separated => self.tree.add_suffix(current, target),
            _ => self.tree.add(current, NodeKind::Array)?,
        };

        self.current = Some(array);
        self.next = Some(array);
        self.last_token.push('[');
        self.level += 1;
        self.separated = true;
        Ok(())
    }

    fn close_bracket(&mut self, bracket: char) -> ExpressionResult<()> {
        let Some(current) = self.current else {
            return Err(ExpressionError::parse_error(format!(
                "Invalid expression: mismatched opening bracket before {}",
                self.last_token
            )));
        };
        let Some(parent) = self.tree.parent(current) else {
            return Err(ExpressionError::parse_error(format!(
                "Invalid expression: mismatched closing bracket after {}",
                self.last_token
            )));
        };

        self.current = Some(parent);
        self.last_token.push(bracket);
        self.level -= 1;
        self.separated = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn parse(expression: &str) -> ExpressionResult<ExpressionTree> {
        Parser::new(&FunctionRegistry::new()).parse(expression)
    }

    fn describe(tree: &ExpressionTree, id: NodeId) -> String {
        let label = match tree.kind(id) {
            NodeKind::Root => "root".to_string(),
            NodeKind::Group => "group".to_string(),
            NodeKind::Array => "array".to_string(),
            NodeKind::Constant(value) => format!("'{value}'"),
            NodeKind::Value(path) => format!("${path}"),
            NodeKind::Function(function) => function.name().to_string(),
            NodeKind::If => "if".to_string(),
            NodeKind::Each => "each".to_string(),
            NodeKind::Filter => "filter".to_string(),
            NodeKind::Cache => "cache".to_string(),
            NodeKind::Null => "null".to_string(),
        };
        let mut out = label;
        let children: Vec<_> = tree.children(id).iter().map(|c| describe(tree, *c)).collect();
        if !children.is_empty() {
            out.push_str(&format!("({})", children.join(" ")));
        }
        for suffix in &tree.node(id).suffixes {
            out.push_str(&describe(tree, *suffix).replacen("array", "", 1));
        }
        out
    }

    fn shape(expression: &str) -> String {
        let tree = parse(expression).unwrap();
        describe(&tree, ExpressionTree::ROOT)
    }

    #[rstest]
    #[case("concat('a', 'b')", "root(concat('a' 'b'))")]
    #[case("upper(this.name)", "root(upper($this.name))")]
    #[case("if(true, 1, null)", "root(if('true' '1.0' null))")]
    #[case("(1, 2)", "root(group('1.0' '2.0'))")]
    #[case("merge(1, 2)[0]", "root(merge('1.0' '2.0')('0.0'))")]
    #[case("[1, 2]", "root(array('1.0' '2.0'))")]
    #[case("size([1])", "root(size(array('1.0')))")]
    #[case("data", "root($data)")]
    #[case("each(data.children, print(data.name))", "root(each($data.children print($data.name)))")]
    #[case("a; b", "root($a $b)")]
    fn test_tree_shape(#[case] expression: &str, #[case] expected: &str) {
        assert_eq!(shape(expression), expected);
    }

    #[test]
    fn test_special_forms_shadow_functions() {
        let tree = parse("if(true, 'a')").unwrap();
        let first = tree.children(ExpressionTree::ROOT)[0];
        assert!(matches!(tree.kind(first), NodeKind::If));
    }

    #[test]
    fn test_newlines_are_whitespace() {
        assert_eq!(shape("concat(\n'a',\n'b'\n)"), "root(concat('a' 'b'))");
    }

    #[rstest]
    #[case("concat('a'", "Invalid expression: mismatched closing bracket after a")]
    #[case("upper(lower('x')", "Invalid expression: mismatched closing bracket after x)")]
    #[case("merge(1)[0", "Invalid expression: mismatched closing bracket after merge(NUMBER)[NUMBER")]
    #[case("concat('a'))", "Invalid expression: mismatched closing bracket after a)")]
    #[case("upper('x', 'y'", "Invalid expression: mismatched closing bracket after y")]
    #[case("upper(this.name", "Invalid expression: mismatched closing bracket after this.name")]
    #[case("]", "Invalid expression: mismatched closing bracket after ")]
    fn test_bracket_errors(#[case] expression: &str, #[case] message: &str) {
        let err = parse(expression).unwrap_err();
        assert_eq!(err.status(), 422);
        assert_eq!(err.to_string(), message);
    }

    #[test]
    fn test_operand_without_open_bracket() {
        let err = parse("concat(1; (2))").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid expression: mismatched opening bracket before NUMBER"
        );
    }

    #[test]
    fn test_too_many_special_form_parameters() {
        let err = parse("each(a, b, c)").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid each() expression in builtin function: too many parameters."
        );
    }
}
