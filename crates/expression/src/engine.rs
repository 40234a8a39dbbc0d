//! Expression engine facade
//!
//! [`ExpressionEngine`] bundles a frozen function registry, the service
//! handles and the engine configuration behind one evaluator. Engines are
//! `Send + Sync`; share one per application and create an
//! [`ActionContext`] per evaluation.

use std::sync::Arc;

use structr_log::{debug, trace};

use crate::config::EngineConfig;
use crate::context::ActionContext;
use crate::core::{EntityRef, ExpressionTree, Value};
use crate::error::ExpressionResult;
use crate::eval::Evaluator;
use crate::functions::{Function, FunctionRegistry};
use crate::parser::Parser;
use crate::services::Services;
use crate::template::Template;

/// Expression engine with parsing and evaluation capabilities
#[derive(Debug)]
pub struct ExpressionEngine {
    evaluator: Evaluator,
}

impl ExpressionEngine {
    /// Engine with every builtin, no services and the default configuration
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Create a builder for configuring an engine
    pub fn builder() -> ExpressionEngineBuilder {
        ExpressionEngineBuilder::default()
    }

    /// Evaluate an expression string in the given context
    pub fn evaluate(
        &self,
        expression: &str,
        ctx: &mut ActionContext,
        entity: Option<&EntityRef>,
    ) -> ExpressionResult<Value> {
        trace!(expression = expression, "Evaluating expression");
        let tree = self.parse(expression)?;
        let result = self.evaluator.eval_tree(&tree, ctx, entity)?;
        trace!(result = %result, "Expression evaluation completed");
        Ok(result)
    }

    /// Render a template, replacing every `${...}` with its rendered value
    pub fn render(
        &self,
        template: &str,
        ctx: &mut ActionContext,
        entity: Option<&EntityRef>,
    ) -> ExpressionResult<String> {
        let template = Template::parse(template)?;
        debug!(expressions = template.expression_count(), "Parsed template");
        template.render(&self.evaluator, ctx, entity)
    }

    /// Parse an expression string into a tree
    pub fn parse(&self, expression: &str) -> ExpressionResult<ExpressionTree> {
        Parser::new(self.evaluator.registry()).parse(expression)
    }

    pub fn evaluator(&self) -> &Evaluator {
        &self.evaluator
    }

    pub fn registry(&self) -> &FunctionRegistry {
        self.evaluator.registry()
    }

    pub fn services(&self) -> &Services {
        self.evaluator.services()
    }

    pub fn config(&self) -> &EngineConfig {
        self.evaluator.config()
    }

    /// Usage text of a registered function
    pub fn usage(&self, name: &str, script: bool) -> Option<&str> {
        self.registry().get(name).map(|function| function.usage(script))
    }
}

impl Default for ExpressionEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for [`ExpressionEngine`]
#[derive(Default)]
pub struct ExpressionEngineBuilder {
    registry: Option<FunctionRegistry>,
    functions: Vec<Arc<dyn Function>>,
    services: Option<Services>,
    config: Option<EngineConfig>,
}

impl ExpressionEngineBuilder {
    /// Start from this registry instead of the builtins
    #[must_use]
    pub fn registry(mut self, registry: FunctionRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Register an additional function, replacing a builtin of the same name
    #[must_use]
    pub fn function(mut self, function: Arc<dyn Function>) -> Self {
        self.functions.push(function);
        self
    }

    #[must_use]
    pub fn services(mut self, services: Services) -> Self {
        self.services = Some(services);
        self
    }

    #[must_use]
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn build(self) -> ExpressionEngine {
        let mut registry = self.registry.unwrap_or_default();
        for function in self.functions {
            registry.register(function);
        }
        let config = self.config.unwrap_or_default();
        debug!(
            functions = registry.len(),
            strict_arithmetic = config.strict_arithmetic,
            "Created expression engine"
        );

        ExpressionEngine {
            evaluator: Evaluator::new(
                Arc::new(registry),
                self.services.unwrap_or_default(),
                config,
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::functions::{Builtin, FunctionOutput};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_engine_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ExpressionEngine>();
    }

    #[test]
    fn test_custom_function() {
        let engine = ExpressionEngine::builder()
            .function(Arc::new(Builtin {
                name: "shout",
                apply: |args, _, _, _| {
                    Ok(match args.first() {
                        Some(arg) => Value::text(format!("{}!", arg.to_string().to_uppercase())).into(),
                        None => FunctionOutput::Usage,
                    })
                },
                usage: "Usage: ${shout(text)}",
                usage_script: None,
                description: "Upper-cases and exclaims",
            }))
            .build();
        let mut ctx = ActionContext::new();

        assert_eq!(engine.evaluate("shout('hey')", &mut ctx, None).unwrap(), Value::text("HEY!"));
        assert_eq!(engine.evaluate("shout()", &mut ctx, None).unwrap(), Value::text("Usage: ${shout(text)}"));
        assert_eq!(engine.usage("shout", true), Some("Usage: ${shout(text)}"));
    }

    #[test]
    fn test_empty_registry_treats_names_as_values() {
        let engine = ExpressionEngine::builder()
            .registry(FunctionRegistry::empty())
            .build();
        let mut ctx = ActionContext::builder()
            .store("upper", Value::text("stored"))
            .build();
        assert_eq!(engine.evaluate("upper", &mut ctx, None).unwrap(), Value::text("stored"));
        assert!(engine.usage("upper", false).is_none());
    }

    #[test]
    fn test_parse_errors_surface() {
        let engine = ExpressionEngine::new();
        let err = engine
            .evaluate("concat('a'", &mut ActionContext::new(), None)
            .unwrap_err();
        assert_eq!(err.code(), "EXPR:PARSE");
    }
}
