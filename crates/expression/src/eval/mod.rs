//! Tree evaluation
//!
//! The [`Evaluator`] owns everything that outlives a single evaluation: the
//! function registry, the service handles, the engine configuration, the
//! compiled regex cache, the `cache()` store and the per-entity locks used by
//! privileged writes. Per-evaluation state lives in the [`ActionContext`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use dashmap::DashMap;
use moka::sync::Cache;
use parking_lot::Mutex;
use regex::Regex;
use structr_log::trace;

use crate::config::EngineConfig;
use crate::context::ActionContext;
use crate::core::{EntityRef, ExpressionTree, NULL_STRING, NodeId, NodeKind, Value};
use crate::error::{ExpressionError, ExpressionResult};
use crate::functions::{Function, FunctionOutput, FunctionRegistry, as_collection, int_arg};
use crate::parser::Parser;
use crate::services::Services;
use crate::template::Template;

const IF_USAGE: &str = "Usage: ${if(condition, trueValue, falseValue)}. Example: ${if(empty(this.name), this.nickName, this.name)}";
const EACH_USAGE: &str = "Usage: ${each(collection, expression)}. Example: ${each(this.children, \"set(this, \"email\", lower(get(this.email))))\")}";
const FILTER_USAGE: &str = "Usage: ${filter(list, expression)}. Example: ${filter(this.children, gt(size(data.children), 0))}";
const CACHE_USAGE: &str = "Usage: ${cache(key, timeout, valueExpression)}. Example: ${cache('value', 60, GET('http://rate-limited-URL.com'))}";

/// Upper bound of entries kept by `cache()`
const CACHE_CAPACITY: u64 = 10_000;

/// Evaluator for expression trees
pub struct Evaluator {
    registry: Arc<FunctionRegistry>,
    services: Services,
    config: EngineConfig,
    /// Regex cache (pattern -> compiled Regex)
    regex_cache: Mutex<HashMap<String, Regex>>,
    /// `cache()` entries with their expiry deadline
    cache: Cache<String, (Value, Instant)>,
    entity_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl Evaluator {
    /// Create a new evaluator
    pub fn new(registry: Arc<FunctionRegistry>, services: Services, config: EngineConfig) -> Self {
        Self {
            registry,
            services,
            config,
            regex_cache: Mutex::new(HashMap::new()),
            cache: Cache::new(CACHE_CAPACITY),
            entity_locks: DashMap::new(),
        }
    }

    pub fn registry(&self) -> &FunctionRegistry {
        &self.registry
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Property of an entity as stored, `None` without a store
    pub fn property(&self, entity: &EntityRef, key: &str) -> Option<Value> {
        self.services.store()?.property(entity, key)
    }

    /// Compiled regex for `pattern`, cached for the lifetime of the engine
    pub fn regex(&self, pattern: &str) -> ExpressionResult<Regex> {
        let mut cache = self.regex_cache.lock();
        if let Some(regex) = cache.get(pattern) {
            return Ok(regex.clone());
        }

        let regex = Regex::new(pattern).map_err(|err| {
            ExpressionError::eval_error(format!("Invalid regular expression '{pattern}': {err}"))
        })?;
        cache.insert(pattern.to_string(), regex.clone());
        Ok(regex)
    }

    /// Lock serializing privileged writes to one entity
    pub fn entity_lock(&self, entity: &EntityRef) -> Arc<Mutex<()>> {
        self.entity_locks
            .entry(entity.id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Drop the lock entry for `entity` once no caller holds it
    pub fn release_entity_lock(&self, entity: &EntityRef) {
        self.entity_locks
            .remove_if(&entity.id, |_, lock| Arc::strong_count(lock) == 1);
    }

    /// Render free text containing `${...}` expressions
    pub fn render(
        &self,
        template: &str,
        ctx: &mut ActionContext,
        entity: Option<&EntityRef>,
    ) -> ExpressionResult<String> {
        Template::parse(template)?.render(self, ctx, entity)
    }

    /// Parse and evaluate one expression
    pub fn evaluate(
        &self,
        expression: &str,
        ctx: &mut ActionContext,
        entity: Option<&EntityRef>,
    ) -> ExpressionResult<Value> {
        let tree = Parser::new(&self.registry).parse(expression)?;
        self.eval_tree(&tree, ctx, entity)
    }

    /// Evaluate a parsed tree from its root
    pub fn eval_tree(
        &self,
        tree: &ExpressionTree,
        ctx: &mut ActionContext,
        entity: Option<&EntityRef>,
    ) -> ExpressionResult<Value> {
        self.eval_with_depth(tree, ExpressionTree::ROOT, ctx, entity, 0)
    }

    /// Apply `function`, substituting its usage text when it asks for it
    pub fn call_function(
        &self,
        function: &dyn Function,
        args: &[Value],
        ctx: &mut ActionContext,
        entity: Option<&EntityRef>,
    ) -> ExpressionResult<Value> {
        trace!(function = function.name(), args = args.len(), "Calling function");
        match function.apply(args, self, ctx, entity)? {
            FunctionOutput::Value(value) => Ok(value),
            FunctionOutput::Usage => Ok(Value::text(function.usage(ctx.is_script()))),
        }
    }

    fn eval_with_depth(
        &self,
        tree: &ExpressionTree,
        id: NodeId,
        ctx: &mut ActionContext,
        entity: Option<&EntityRef>,
        depth: usize,
    ) -> ExpressionResult<Value> {
        if depth > self.config.max_depth {
            return Err(ExpressionError::eval_error(format!(
                "Maximum evaluation depth ({}) exceeded",
                self.config.max_depth
            )));
        }
        let depth = depth + 1;

        let value = match tree.kind(id) {
            NodeKind::Root | NodeKind::Group => {
                let mut last = Value::Null;
                for child in tree.children(id) {
                    last = self.eval_with_depth(tree, *child, ctx, entity, depth)?;
                }
                last
            }
            NodeKind::Array => Value::List(self.eval_children(tree, id, ctx, entity, depth)?),
            NodeKind::Constant(value) => value.clone(),
            NodeKind::Null => Value::text(NULL_STRING),
            NodeKind::Value(path) => self.lookup(path, ctx, entity),
            NodeKind::Function(function) => {
                let args = self.eval_children(tree, id, ctx, entity, depth)?;
                self.call_function(function.as_ref(), &args, ctx, entity)?
            }
            NodeKind::If => self.eval_if(tree, id, ctx, entity, depth)?,
            NodeKind::Each => self.eval_each(tree, id, ctx, entity, depth)?,
            NodeKind::Filter => self.eval_filter(tree, id, ctx, entity, depth)?,
            NodeKind::Cache => self.eval_cache(tree, id, ctx, entity, depth)?,
        };

        let mut value = value;
        for suffix in &tree.node(id).suffixes {
            let mut index = Value::Null;
            for child in tree.children(*suffix) {
                index = self.eval_with_depth(tree, *child, ctx, entity, depth)?;
            }
            value = self.index(&value, &index);
        }
        Ok(value)
    }

    fn eval_children(
        &self,
        tree: &ExpressionTree,
        id: NodeId,
        ctx: &mut ActionContext,
        entity: Option<&EntityRef>,
        depth: usize,
    ) -> ExpressionResult<Vec<Value>> {
        tree.children(id)
            .iter()
            .map(|child| self.eval_with_depth(tree, *child, ctx, entity, depth))
            .collect()
    }

    fn eval_if(
        &self,
        tree: &ExpressionTree,
        id: NodeId,
        ctx: &mut ActionContext,
        entity: Option<&EntityRef>,
        depth: usize,
    ) -> ExpressionResult<Value> {
        let &[condition, then, ref rest @ ..] = tree.children(id) else {
            return Ok(Value::text(IF_USAGE));
        };

        if self.eval_with_depth(tree, condition, ctx, entity, depth)?.is_true() {
            self.eval_with_depth(tree, then, ctx, entity, depth)
        } else {
            match rest.first() {
                Some(otherwise) => self.eval_with_depth(tree, *otherwise, ctx, entity, depth),
                None => Ok(Value::Null),
            }
        }
    }

    /// Evaluate `body` once per element with `data` bound to it
    fn for_each_element(
        &self,
        tree: &ExpressionTree,
        id: NodeId,
        ctx: &mut ActionContext,
        entity: Option<&EntityRef>,
        depth: usize,
        mut visit: impl FnMut(Value, Value),
    ) -> ExpressionResult<()> {
        let &[collection, body] = tree.children(id) else {
            return Ok(());
        };
        let elements = as_collection(&self.eval_with_depth(tree, collection, ctx, entity, depth)?);

        for element in elements {
            let previous = ctx.bind_data(Some(element.clone()));
            let result = self.eval_with_depth(tree, body, ctx, entity, depth);
            ctx.bind_data(previous);
            visit(element, result?);
        }
        Ok(())
    }

    fn eval_each(
        &self,
        tree: &ExpressionTree,
        id: NodeId,
        ctx: &mut ActionContext,
        entity: Option<&EntityRef>,
        depth: usize,
    ) -> ExpressionResult<Value> {
        if tree.children(id).len() < 2 {
            return Ok(Value::text(EACH_USAGE));
        }
        self.for_each_element(tree, id, ctx, entity, depth, |_, _| {})?;
        Ok(Value::Null)
    }

    fn eval_filter(
        &self,
        tree: &ExpressionTree,
        id: NodeId,
        ctx: &mut ActionContext,
        entity: Option<&EntityRef>,
        depth: usize,
    ) -> ExpressionResult<Value> {
        if tree.children(id).len() < 2 {
            return Ok(Value::text(FILTER_USAGE));
        }
        let mut kept = Vec::new();
        self.for_each_element(tree, id, ctx, entity, depth, |element, keep| {
            if keep.is_true() {
                kept.push(element);
            }
        })?;
        Ok(Value::List(kept))
    }

    fn eval_cache(
        &self,
        tree: &ExpressionTree,
        id: NodeId,
        ctx: &mut ActionContext,
        entity: Option<&EntityRef>,
        depth: usize,
    ) -> ExpressionResult<Value> {
        let &[key, timeout, expression] = tree.children(id) else {
            return Ok(Value::text(CACHE_USAGE));
        };
        let key = self.eval_with_depth(tree, key, ctx, entity, depth)?.to_string();

        if let Some((value, deadline)) = self.cache.get(&key) {
            if deadline > Instant::now() {
                trace!(key = %key, "Cache hit");
                return Ok(value);
            }
        }

        let timeout = self.eval_with_depth(tree, timeout, ctx, entity, depth)?;
        let seconds = int_arg(&timeout).unwrap_or(0).max(0).unsigned_abs();
        let value = self.eval_with_depth(tree, expression, ctx, entity, depth)?;
        self.cache.insert(
            key,
            (value.clone(), Instant::now() + Duration::from_secs(seconds)),
        );
        Ok(value)
    }

    /// Resolve a dotted variable path
    fn lookup(&self, path: &str, ctx: &ActionContext, entity: Option<&EntityRef>) -> Value {
        let mut segments = path.split('.');
        let head = segments.next().unwrap_or_default();

        let mut value = match head {
            "this" => entity.cloned().map_or(Value::Null, Value::Entity),
            "me" => ctx
                .security()
                .principal()
                .cloned()
                .map_or(Value::Null, Value::Entity),
            "locale" => Value::text(ctx.locale()),
            "now" => Value::Date(Utc::now()),
            "data" => ctx.data().cloned().unwrap_or(Value::Null),
            key => match ctx.retrieve(key) {
                Some(stored) => stored.clone(),
                None => entity
                    .and_then(|entity| self.property(entity, key))
                    .unwrap_or(Value::Null),
            },
        };

        for segment in segments {
            if value.is_null() {
                break;
            }
            value = self.member(&value, segment);
        }
        value
    }

    fn member(&self, value: &Value, key: &str) -> Value {
        match value {
            Value::Entity(entity) => self.property(entity, key).unwrap_or(Value::Null),
            Value::Map(map) => map.get(key).cloned().unwrap_or(Value::Null),
            _ => Value::Null,
        }
    }

    /// `value[index]`; anything that does not resolve is null
    fn index(&self, value: &Value, index: &Value) -> Value {
        match value {
            Value::List(items) => int_arg(index)
                .and_then(|i| usize::try_from(i).ok())
                .and_then(|i| items.get(i))
                .cloned()
                .unwrap_or(Value::Null),
            Value::Map(_) | Value::Entity(_) => self.member(value, &index.to_string()),
            _ => Value::Null,
        }
    }
}

impl std::fmt::Debug for Evaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Evaluator")
            .field("registry", &self.registry)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::functions::test_support::{eval, fixture_engine};
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn evaluator() -> Evaluator {
        Evaluator::new(
            Arc::new(FunctionRegistry::new()),
            Services::new(),
            EngineConfig::default(),
        )
    }

    #[rstest]
    #[case("concat('a', 'b', 'c')", "abc")]
    #[case("add(1, 2, 3)", "6.0")]
    #[case("(1, 2, 3)", "3.0")]
    #[case("merge(1, 2, 3)[1]", "2.0")]
    #[case("merge(1, 2, 3)[7]", "null")]
    #[case("[1, 2][0]", "1.0")]
    #[case("if(true, 'yes', 'no')", "yes")]
    #[case("if('true', 'yes', 'no')", "yes")]
    #[case("if(false, 'yes', 'no')", "no")]
    #[case("if(false, 'yes')", "null")]
    #[case("null", "___NULL___")]
    #[case("", "null")]
    fn test_evaluate(#[case] expression: &str, #[case] expected: &str) {
        assert_eq!(eval(expression).to_string(), expected);
    }

    #[test]
    fn test_if_evaluates_selected_branch_only() {
        let mut ctx = ActionContext::new();
        let evaluator = evaluator();
        evaluator
            .evaluate("if(true, store('a', 1), store('b', 2))", &mut ctx, None)
            .unwrap();
        assert!(ctx.retrieve("a").is_some());
        assert!(ctx.retrieve("b").is_none());
    }

    #[test]
    fn test_if_without_branches_shows_usage() {
        assert_eq!(eval("if(true)"), Value::text(IF_USAGE));
    }

    #[test]
    fn test_each_binds_data() {
        let mut ctx = ActionContext::new();
        let result = evaluator()
            .evaluate("each(merge('a', 'b'), print(data))", &mut ctx, None)
            .unwrap();
        assert_eq!(result, Value::Null);
        assert_eq!(ctx.output(), "ab");
        assert!(ctx.data().is_none());
    }

    #[test]
    fn test_filter_keeps_matching_elements() {
        let (engine, _) = fixture_engine();
        let mut ctx = ActionContext::new();
        let value = engine
            .evaluate("extract(filter(find('User'), gt(data.age, 31)), 'name')", &mut ctx, None)
            .unwrap();
        assert_eq!(value.to_string(), "[Bob]");
    }

    #[test]
    fn test_cache_reuses_value_until_expiry() {
        let evaluator = evaluator();
        let mut ctx = ActionContext::new();

        let first = evaluator
            .evaluate("cache('k', 60, (inc_counter(1), get_counter(1)))", &mut ctx, None)
            .unwrap();
        let second = evaluator
            .evaluate("cache('k', 60, (inc_counter(1), get_counter(1)))", &mut ctx, None)
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(ctx.counter(1), 1);

        evaluator
            .evaluate("cache('expired', 0, inc_counter(1))", &mut ctx, None)
            .unwrap();
        evaluator
            .evaluate("cache('expired', 0, inc_counter(1))", &mut ctx, None)
            .unwrap();
        assert_eq!(ctx.counter(1), 3);
    }

    #[test]
    fn test_value_paths() {
        let (engine, _) = fixture_engine();
        let alice = EntityRef::node("u1", "User");
        let mut ctx = ActionContext::builder()
            .principal(EntityRef::node("u2", "User"))
            .locale("de_DE")
            .store("settings", Value::from_json(serde_json::json!({ "color": "red" })))
            .build();
        let mut run = |expression: &str| engine.evaluate(expression, &mut ctx, Some(&alice)).unwrap();

        assert_eq!(run("this.name"), Value::text("Alice"));
        assert_eq!(run("name"), Value::text("Alice"));
        assert_eq!(run("me.name"), Value::text("Bob"));
        assert_eq!(run("locale"), Value::text("de_DE"));
        assert_eq!(run("settings.color"), Value::text("red"));
        assert_eq!(run("this.missing.deeper"), Value::Null);
        assert_eq!(run("unknown"), Value::Null);
        assert!(matches!(run("now"), Value::Date(_)));
    }

    #[test]
    fn test_usage_follows_invocation_style() {
        let evaluator = evaluator();
        let mut ctx = ActionContext::builder().script(true).build();
        let value = evaluator.evaluate("retrieve()", &mut ctx, None).unwrap();
        assert!(value.to_string().starts_with("Usage: ${{Structr.retrieve("));
    }

    #[test]
    fn test_depth_limit() {
        let evaluator = Evaluator::new(
            Arc::new(FunctionRegistry::new()),
            Services::new(),
            EngineConfig::default().with_max_depth(3),
        );
        let mut ctx = ActionContext::new();
        assert!(evaluator.evaluate("upper('a')", &mut ctx, None).is_ok());

        let err = evaluator
            .evaluate("upper(lower(upper(lower('a'))))", &mut ctx, None)
            .unwrap_err();
        assert!(err.to_string().contains("Maximum evaluation depth (3) exceeded"));
    }

    #[test]
    fn test_regex_cache_and_errors() {
        let evaluator = evaluator();
        assert!(evaluator.regex("a+").unwrap().is_match("aaa"));
        assert!(evaluator.regex("a+").is_ok());
        assert_eq!(evaluator.regex_cache.lock().len(), 1);

        let err = evaluator.regex("(").unwrap_err();
        assert!(err.to_string().contains("Invalid regular expression '('"));
    }

    #[test]
    fn test_entity_lock_is_shared_per_id() {
        let evaluator = evaluator();
        let a = evaluator.entity_lock(&EntityRef::node("u1", "User"));
        let b = evaluator.entity_lock(&EntityRef::node("u1", "User"));
        let c = evaluator.entity_lock(&EntityRef::node("u2", "User"));
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
    }

    #[test]
    fn test_entity_lock_entries_are_pruned_after_release() {
        let evaluator = evaluator();
        let user = EntityRef::node("u1", "User");
        let first = evaluator.entity_lock(&user);
        let second = evaluator.entity_lock(&user);

        drop(first);
        evaluator.release_entity_lock(&user);
        assert_eq!(evaluator.entity_locks.len(), 1);

        drop(second);
        evaluator.release_entity_lock(&user);
        assert!(evaluator.entity_locks.is_empty());

        evaluator.release_entity_lock(&EntityRef::node("u2", "User"));
        assert!(evaluator.entity_locks.is_empty());
    }
}
