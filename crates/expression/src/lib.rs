//! # structr-expression
//!
//! Template and script expression engine for Structr.
//!
//! Expressions are embedded in free text as `${...}` (template style) or
//! `${{...}}` (script style). An expression is a sequence of function calls,
//! literals, variable paths and the special forms `if`, `each`, `filter` and
//! `cache`:
//!
//! - Function calls: `concat(this.firstName, ' ', this.lastName)`
//! - Grouping: `(set(this, 'a', 1), set(this, 'b', 2))` evaluates to the last value
//! - Indexing: `find('User')[0]`, `this.tags[2]`
//! - Variables: `this`, `me`, `locale`, `now`, `data` and the temporary store
//! - Literals: numbers, quoted strings, `true`, `false`, `null`
//!
//! Builtins that touch the outside world call the collaborators bundled in
//! [`Services`]: an entity store, permissions, configuration, mail,
//! geocoding, graph queries, process execution, localization and actions.
//! In-memory implementations of all of them live in [`services`].
//!
//! ## Quick Start
//!
//! ```rust
//! use structr_expression::{ActionContext, ExpressionEngine, Value};
//!
//! let engine = ExpressionEngine::new();
//! let mut ctx = ActionContext::new();
//!
//! let result = engine.evaluate("add(1, 2, 3)", &mut ctx, None).unwrap();
//! assert_eq!(result.to_string(), "6.0");
//!
//! let text = engine.render("${upper('hello')} world", &mut ctx, None).unwrap();
//! assert_eq!(text, "HELLO world");
//! ```
//!
//! ## Against an entity store
//!
//! ```rust
//! use std::sync::Arc;
//! use structr_expression::services::{MemorySecurity, MemoryStore};
//! use structr_expression::{ActionContext, EntityRef, ExpressionEngine, Services};
//!
//! let store = Arc::new(MemoryStore::new());
//! store.define_type("User", Vec::new());
//! let services = Services::builder()
//!     .store(store)
//!     .security(MemorySecurity::arc())
//!     .build();
//! let engine = ExpressionEngine::builder().services(services).build();
//! let mut ctx = ActionContext::new();
//!
//! let user = engine.evaluate("create('User', 'name', 'Alice')", &mut ctx, None).unwrap();
//! let user = user.as_entity().unwrap().clone();
//! let greeting = engine.render("Hi ${this.name}!", &mut ctx, Some(&user)).unwrap();
//! assert_eq!(greeting, "Hi Alice!");
//! ```

pub mod config;
pub mod context;
pub mod core;
pub mod engine;
pub mod error;
pub mod eval;
pub mod functions;
pub mod lexer;
pub mod parser;
pub mod services;
pub mod template;

// Re-exports
pub use config::EngineConfig;
pub use context::{ActionContext, ActionContextBuilder, ErrorToken, SecurityContext};
pub use core::{EntityKind, EntityRef, ExpressionTree, Value};
pub use engine::{ExpressionEngine, ExpressionEngineBuilder};
pub use error::{ExpressionError, ExpressionResult};
pub use eval::Evaluator;
pub use functions::{Builtin, Function, FunctionOutput, FunctionRegistry};
pub use services::Services;
pub use template::{Position, Template, TemplatePart};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        ActionContext, EngineConfig, EntityRef, ExpressionEngine, ExpressionError,
        ExpressionResult, Function, FunctionOutput, FunctionRegistry, Services, Template, Value,
    };
}
