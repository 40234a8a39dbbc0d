//! Templates: free text with embedded `${...}` expressions
//!
//! `${expr}` is evaluated in template style, `${{expr}}` in script style.
//! Braces inside an expression nest, and quoted sections are skipped while
//! looking for the closing brace, so `${concat('}', this.name)}` is one
//! expression. Every part is parsed up front; rendering evaluates the
//! expressions in order against one context.

use std::fmt;

use structr_log::trace;

use crate::context::ActionContext;
use crate::core::{EntityRef, Value};
use crate::error::{ExpressionError, ExpressionResult};
use crate::eval::Evaluator;

/// A template part - either static text or an expression to evaluate
#[derive(Debug, Clone, PartialEq)]
pub enum TemplatePart {
    /// Text copied to the output as-is
    Static(String),
    /// An expression to be evaluated
    Expression {
        /// The expression content (without `${ }`)
        source: String,
        /// Written as `${{ }}`
        script: bool,
        /// Position of `$` in the template
        position: Position,
    },
}

/// Position in the template (line and column)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    /// Line number (1-based)
    pub line: usize,
    /// Column number (1-based)
    pub column: usize,
    /// Absolute byte offset (0-based)
    pub offset: usize,
}

impl Position {
    fn locate(source: &str, offset: usize) -> Self {
        let before = &source[..offset];
        let line = before.matches('\n').count() + 1;
        let line_start = before.rfind('\n').map_or(0, |i| i + 1);
        Self {
            line,
            column: before[line_start..].chars().count() + 1,
            offset,
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

/// Parsed template
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    parts: Vec<TemplatePart>,
}

impl Template {
    /// Split `source` into static text and expressions
    ///
    /// # Errors
    ///
    /// An opening `${` without its closing brace.
    pub fn parse(source: &str) -> ExpressionResult<Self> {
        let mut parts = Vec::new();
        let mut pos = 0;

        while let Some(found) = source[pos..].find("${") {
            let start = pos + found;
            if start > pos {
                parts.push(TemplatePart::Static(source[pos..start].to_string()));
            }

            let body = start + 2;
            let Some(end) = closing_brace(&source[body..]).map(|i| body + i) else {
                return Err(ExpressionError::parse_error(format!(
                    "Unclosed expression at {}",
                    Position::locate(source, start)
                )));
            };

            let inner = &source[body..end];
            let (source_text, script) = match inner.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
                Some(script) => (script, true),
                None => (inner, false),
            };
            parts.push(TemplatePart::Expression {
                source: source_text.to_string(),
                script,
                position: Position::locate(source, start),
            });
            pos = end + 1;
        }

        if pos < source.len() {
            parts.push(TemplatePart::Static(source[pos..].to_string()));
        }
        Ok(Self { parts })
    }

    pub fn parts(&self) -> &[TemplatePart] {
        &self.parts
    }

    /// Number of embedded expressions
    pub fn expression_count(&self) -> usize {
        self.parts
            .iter()
            .filter(|part| matches!(part, TemplatePart::Expression { .. }))
            .count()
    }

    /// Evaluate every expression and concatenate the results with the static
    /// text; null values render as nothing
    pub fn render(
        &self,
        eval: &Evaluator,
        ctx: &mut ActionContext,
        entity: Option<&EntityRef>,
    ) -> ExpressionResult<String> {
        let mut out = String::new();
        for part in &self.parts {
            match part {
                TemplatePart::Static(text) => out.push_str(text),
                TemplatePart::Expression {
                    source,
                    script,
                    position,
                } => {
                    trace!(expression = %source, %position, script, "Rendering expression");
                    let value = evaluate_in_style(eval, source, *script, ctx, entity)?;
                    out.push_str(&value.render());
                }
            }
        }
        Ok(out)
    }
}

/// Evaluate with the script flag set for the duration of the call
fn evaluate_in_style(
    eval: &Evaluator,
    source: &str,
    script: bool,
    ctx: &mut ActionContext,
    entity: Option<&EntityRef>,
) -> ExpressionResult<Value> {
    let previous = ctx.is_script();
    if script {
        ctx.set_script(true);
    }
    let result = eval.evaluate(source, ctx, entity);
    ctx.set_script(previous);
    result
}

/// Byte index of the brace closing an expression body
fn closing_brace(body: &str) -> Option<usize> {
    let mut depth = 1usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for (i, c) in body.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' => quote = Some(c),
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ActionContext;
    use crate::core::EntityRef;
    use crate::functions::test_support::fixture_engine;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[test]
    fn test_parse_parts() {
        let template = Template::parse("Hello ${this.name}, ${{ Structr.x }}!").unwrap();
        insta::assert_debug_snapshot!(template.parts(), @r#"
        [
            Static(
                "Hello ",
            ),
            Expression {
                source: "this.name",
                script: false,
                position: Position {
                    line: 1,
                    column: 7,
                    offset: 6,
                },
            },
            Static(
                ", ",
            ),
            Expression {
                source: " Structr.x ",
                script: true,
                position: Position {
                    line: 1,
                    column: 21,
                    offset: 20,
                },
            },
            Static(
                "!",
            ),
        ]
        "#);
        assert_eq!(template.expression_count(), 2);
    }

    #[rstest]
    #[case("${concat('}', 'x')}", "concat('}', 'x')")]
    #[case("${concat(\"a\\\"}\", 'x')}", "concat(\"a\\\"}\", 'x')")]
    #[case("${{ {nested} }}", " {nested} ")]
    fn test_closing_brace_skips_quotes_and_nesting(#[case] source: &str, #[case] expected: &str) {
        let template = Template::parse(source).unwrap();
        let TemplatePart::Expression { source, .. } = &template.parts()[0] else {
            panic!("expected an expression");
        };
        assert_eq!(source, expected);
    }

    #[test]
    fn test_unclosed_expression() {
        let err = Template::parse("line one\n  ${upper('x')").unwrap_err();
        assert_eq!(err.status(), 422);
        assert_eq!(err.to_string(), "Unclosed expression at line 2, column 3");
    }

    #[test]
    fn test_render_against_entity() {
        let (engine, _) = fixture_engine();
        let alice = EntityRef::node("u1", "User");
        let mut ctx = ActionContext::new();
        let text = engine
            .render("Hi ${this.name} (${this.missing}) ${upper(this.email)}", &mut ctx, Some(&alice))
            .unwrap();
        assert_eq!(text, "Hi Alice () ALICE@EXAMPLE.COM");
    }

    #[test]
    fn test_script_style_is_scoped() {
        let (engine, _) = fixture_engine();
        let mut ctx = ActionContext::new();
        let text = engine
            .render("${{store()}} | ${store()}", &mut ctx, None)
            .unwrap();
        assert!(text.starts_with("Usage: ${{Structr.store("));
        assert!(text.contains(" | Usage: ${store("));
        assert!(!ctx.is_script());
    }

    #[test]
    fn test_text_without_expressions() {
        let template = Template::parse("plain $ {text}").unwrap();
        assert_eq!(template.parts(), &[TemplatePart::Static("plain $ {text}".to_string())]);
    }
}
