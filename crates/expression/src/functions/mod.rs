//! Builtin function library
//!
//! Every builtin receives its already evaluated arguments, the evaluator (for
//! services, configuration and nested rendering), the per-evaluation context
//! and the subject entity. A builtin either produces a value or asks for its
//! usage text, which the evaluator substitutes in the invocation style of the
//! context.
//!
//! Functions are registered by category; the registry keeps insertion order
//! for enumeration and resolves by exact name.

pub mod collection;
pub mod communication;
pub mod datetime;
pub mod entity;
pub mod io;
pub mod locale;
pub mod logic;
pub mod math;
pub mod permission;
pub mod relationship;
pub mod script;
pub mod string;
pub mod xml;

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::context::ActionContext;
use crate::core::{EntityRef, Value, parse_int};
use crate::error::ExpressionResult;
use crate::eval::Evaluator;

/// Result of a builtin
#[derive(Debug, Clone, PartialEq)]
pub enum FunctionOutput {
    Value(Value),
    /// The arguments did not fit; show the usage text instead
    Usage,
}

impl FunctionOutput {
    /// The empty string
    pub fn empty() -> Self {
        Self::Value(Value::empty())
    }
}

impl From<Value> for FunctionOutput {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

/// A function callable from expressions
pub trait Function: Send + Sync {
    fn name(&self) -> &str;

    fn apply(
        &self,
        args: &[Value],
        eval: &Evaluator,
        ctx: &mut ActionContext,
        entity: Option<&EntityRef>,
    ) -> ExpressionResult<FunctionOutput>;

    /// Help text, in script syntax when `script` is set
    fn usage(&self, script: bool) -> &str;

    /// One-line documentation
    fn short_description(&self) -> &str;
}

impl fmt::Debug for dyn Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Function({})", self.name())
    }
}

/// Type alias for the implementation of a builtin
pub type BuiltinFn = fn(
    &[Value],
    &Evaluator,
    &mut ActionContext,
    Option<&EntityRef>,
) -> ExpressionResult<FunctionOutput>;

/// A builtin described by a static table entry
#[derive(Debug, Clone, Copy)]
pub struct Builtin {
    pub name: &'static str,
    pub apply: BuiltinFn,
    pub usage: &'static str,
    /// Usage in script syntax, when it differs
    pub usage_script: Option<&'static str>,
    pub description: &'static str,
}

impl Function for Builtin {
    fn name(&self) -> &str {
        self.name
    }

    fn apply(
        &self,
        args: &[Value],
        eval: &Evaluator,
        ctx: &mut ActionContext,
        entity: Option<&EntityRef>,
    ) -> ExpressionResult<FunctionOutput> {
        (self.apply)(args, eval, ctx, entity)
    }

    fn usage(&self, script: bool) -> &str {
        match self.usage_script {
            Some(usage) if script => usage,
            _ => self.usage,
        }
    }

    fn short_description(&self) -> &str {
        self.description
    }
}

// ============================================================================
// Registry
// ============================================================================

/// Ordered mapping from function name to implementation
///
/// Built once and shared read-only between evaluations.
#[derive(Clone)]
pub struct FunctionRegistry {
    functions: IndexMap<String, Arc<dyn Function>>,
}

impl FunctionRegistry {
    /// Create a registry holding every builtin
    pub fn new() -> Self {
        let mut registry = Self::empty();

        registry.register_string_functions();
        registry.register_logic_functions();
        registry.register_math_functions();
        registry.register_collection_functions();
        registry.register_datetime_functions();
        registry.register_script_functions();
        registry.register_entity_functions();
        registry.register_relationship_functions();
        registry.register_permission_functions();
        registry.register_io_functions();
        registry.register_xml_functions();
        registry.register_communication_functions();
        registry.register_locale_functions();

        registry
    }

    /// Registry without any functions
    pub fn empty() -> Self {
        Self {
            functions: IndexMap::new(),
        }
    }

    /// Register a function, replacing any function of the same name
    pub fn register(&mut self, function: Arc<dyn Function>) {
        self.functions.insert(function.name().to_string(), function);
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Function>> {
        self.functions.get(name)
    }

    pub fn has_function(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Names in registration order
    pub fn function_names(&self) -> Vec<&str> {
        self.functions.keys().map(String::as_str).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Function>> {
        self.functions.values()
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    fn register_builtins(&mut self, builtins: &[Builtin]) {
        for builtin in builtins {
            self.register(Arc::new(*builtin));
        }
    }

    // Registration methods for each category

    fn register_string_functions(&mut self) {
        self.register_builtins(string::BUILTINS);
    }

    fn register_logic_functions(&mut self) {
        self.register_builtins(logic::BUILTINS);
    }

    fn register_math_functions(&mut self) {
        self.register_builtins(math::BUILTINS);
    }

    fn register_collection_functions(&mut self) {
        self.register_builtins(collection::BUILTINS);
    }

    fn register_datetime_functions(&mut self) {
        self.register_builtins(datetime::BUILTINS);
    }

    fn register_script_functions(&mut self) {
        self.register_builtins(script::BUILTINS);
    }

    fn register_entity_functions(&mut self) {
        self.register_builtins(entity::BUILTINS);
    }

    fn register_relationship_functions(&mut self) {
        self.register_builtins(relationship::BUILTINS);
    }

    fn register_permission_functions(&mut self) {
        self.register_builtins(permission::BUILTINS);
    }

    fn register_io_functions(&mut self) {
        self.register_builtins(io::BUILTINS);
    }

    fn register_xml_functions(&mut self) {
        self.register_builtins(xml::BUILTINS);
    }

    fn register_communication_functions(&mut self) {
        self.register_builtins(communication::BUILTINS);
    }

    fn register_locale_functions(&mut self) {
        self.register_builtins(locale::BUILTINS);
    }
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionRegistry")
            .field("functions", &self.functions.len())
            .finish()
    }
}

// ============================================================================
// Argument helpers
// ============================================================================

/// Exactly `len` arguments, none of them null
pub fn has_length(args: &[Value], len: usize) -> bool {
    args.len() == len && all_present(args)
}

/// At least `min` arguments, none of them null
pub fn has_min_length(args: &[Value], min: usize) -> bool {
    args.len() >= min && all_present(args)
}

/// Between `min` and `max` arguments inclusive, none of them null
pub fn has_length_between(args: &[Value], min: usize, max: usize) -> bool {
    (min..=max).contains(&args.len()) && all_present(args)
}

fn all_present(args: &[Value]) -> bool {
    args.iter().all(|arg| !arg.is_null())
}

/// Argument `index` as text, null or missing as the empty string
pub(crate) fn text_arg(args: &[Value], index: usize) -> String {
    args.get(index).map(Value::to_string).unwrap_or_default()
}

/// Integer argument: numbers are truncated, text must parse as an integer
pub(crate) fn int_arg(value: &Value) -> Option<i64> {
    match value {
        Value::Integer(i) => Some(*i),
        Value::Number(n) => Some(*n as i64),
        Value::Text(s) => parse_int(s).ok(),
        _ => None,
    }
}

/// Elements of a list argument, or the value itself
pub(crate) fn as_collection(value: &Value) -> Vec<Value> {
    match value {
        Value::List(items) => items.clone(),
        Value::Null => Vec::new(),
        other => vec![other.clone()],
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use crate::context::ActionContext;
    use crate::core::Value;
    use crate::engine::ExpressionEngine;
    use crate::services::{MemorySecurity, MemoryStore, Services};

    /// Two users following each other one way, a group and a page
    pub(crate) const FIXTURE: &str = r#"{
        "types": {
            "User": {
                "properties": {
                    "email": { "indexed": true },
                    "age": { "type": "Integer", "indexed": true },
                    "secret": { "readOnly": true }
                },
                "views": { "ui": ["name", "email"] }
            },
            "Group": {},
            "Page": {}
        },
        "relationshipTypes": [
            { "name": "FOLLOWS", "source": "User", "target": "User" },
            { "name": "MEMBER", "source": "User", "target": "Group" }
        ],
        "entities": [
            { "id": "u1", "type": "User", "properties": { "name": "Alice", "email": "alice@example.com", "age": 31 } },
            { "id": "u2", "type": "User", "properties": { "name": "Bob", "email": "bob@example.com", "age": 32 } },
            { "id": "g1", "type": "Group", "properties": { "name": "Admins" } },
            { "id": "p1", "type": "Page", "properties": { "name": "Home" } }
        ],
        "relationships": [
            { "type": "FOLLOWS", "source": "u1", "target": "u2" }
        ]
    }"#;

    /// Evaluate with a fresh in-memory engine and an anonymous context
    pub(crate) fn eval(expression: &str) -> Value {
        let mut ctx = ActionContext::new();
        ExpressionEngine::new()
            .evaluate(expression, &mut ctx, None)
            .unwrap()
    }

    /// Engine over a store loaded from [`FIXTURE`]
    pub(crate) fn fixture_engine() -> (ExpressionEngine, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::from_json(FIXTURE).unwrap());
        let services = Services::builder()
            .store(store.clone())
            .security(MemorySecurity::arc())
            .build();
        (ExpressionEngine::builder().services(services).build(), store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_arity_helpers_reject_null() {
        let args = vec![Value::text("a"), Value::Null];
        assert!(!has_length(&args, 2));
        assert!(!has_min_length(&args, 1));
        assert!(!has_length_between(&args, 1, 2));

        let args = vec![Value::text("a"), Value::text(crate::core::NULL_STRING)];
        assert!(has_length(&args, 2));
        assert!(has_length_between(&args, 1, 3));
        assert!(!has_length_between(&args, 3, 4));
    }

    #[test]
    fn test_registry_order_and_lookup() {
        let registry = FunctionRegistry::new();
        let names = registry.function_names();
        assert_eq!(names.first().copied(), Some("md5"));
        assert!(registry.has_function("enable_notifications"));
        assert!(registry.has_function("if"));
        assert!(!registry.has_function("each"));
        assert!(registry.len() >= 100);
    }

    #[test]
    fn test_usage_by_style() {
        let registry = FunctionRegistry::new();
        let store = registry.get("store").unwrap();
        assert!(store.usage(false).starts_with("Usage: ${store("));
        assert!(store.usage(true).starts_with("Usage: ${{Structr.store("));

        let upper = registry.get("upper").unwrap();
        assert_eq!(upper.usage(true), upper.usage(false));
    }

    #[test]
    fn test_custom_function_replaces_builtin() {
        let mut registry = FunctionRegistry::new();
        let before = registry.len();
        registry.register(Arc::new(Builtin {
            name: "upper",
            apply: |_, _, _, _| Ok(Value::text("custom").into()),
            usage: "custom",
            usage_script: None,
            description: "custom upper",
        }));
        assert_eq!(registry.len(), before);
        assert_eq!(registry.get("upper").unwrap().short_description(), "custom upper");
    }
}
