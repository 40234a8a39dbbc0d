//! Raw graph query seam used by `cypher(...)`

use indexmap::IndexMap;

use crate::core::Value;
use crate::error::ExpressionResult;

pub trait GraphQuery: Send + Sync {
    /// Run a query with named parameters and return its rows
    fn execute(&self, query: &str, params: &IndexMap<String, Value>) -> ExpressionResult<Vec<Value>>;
}

/// Canned results keyed by query text
#[derive(Debug, Clone, Default)]
pub struct StaticGraphQuery {
    results: IndexMap<String, Vec<Value>>,
}

impl StaticGraphQuery {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, query: impl Into<String>, rows: Vec<Value>) -> Self {
        self.results.insert(query.into(), rows);
        self
    }
}

impl GraphQuery for StaticGraphQuery {
    fn execute(&self, query: &str, _params: &IndexMap<String, Value>) -> ExpressionResult<Vec<Value>> {
        Ok(self.results.get(query).cloned().unwrap_or_default())
    }
}
