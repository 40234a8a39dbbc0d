//! Entity store seam
//!
//! The engine never owns graph data. Property values, schema information and
//! relationships are all reached through an [`EntityStore`], shared via
//! `Arc<dyn EntityStore>`.

use indexmap::IndexMap;

use crate::context::SecurityContext;
use crate::core::{EntityRef, Value};
use crate::error::ExpressionResult;

/// Direction of a relationship as seen from one of its ends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Incoming,
    Outgoing,
}

/// A relationship together with both of its ends
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    pub entity: EntityRef,
    pub rel_type: String,
    pub source: EntityRef,
    pub target: EntityRef,
}

impl Relationship {
    /// Whether this relationship connects `from` to `to` in that direction
    pub fn connects(&self, from: &EntityRef, to: &EntityRef) -> bool {
        self.source.id == from.id && self.target.id == to.id
    }
}

/// Schema information about one property of a type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyInfo {
    pub json_name: String,
    pub declared_type: String,
    pub indexed: bool,
    pub read_only: bool,
}

impl PropertyInfo {
    pub fn new(json_name: impl Into<String>, declared_type: impl Into<String>) -> Self {
        Self {
            json_name: json_name.into(),
            declared_type: declared_type.into(),
            indexed: false,
            read_only: false,
        }
    }

    #[must_use]
    pub fn indexed(mut self) -> Self {
        self.indexed = true;
        self
    }

    #[must_use]
    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    /// Map returned by `property_info(type, key)`
    pub fn to_value(&self, declaring_type: &str) -> Value {
        let mut map = IndexMap::new();
        map.insert("jsonName".to_string(), Value::text(&self.json_name));
        map.insert("className".to_string(), Value::text(&self.declared_type));
        map.insert("declaringClass".to_string(), Value::text(declaring_type));
        map.insert("readOnly".to_string(), Value::Bool(self.read_only));
        map.insert("indexed".to_string(), Value::Bool(self.indexed));
        Value::Map(map)
    }
}

/// Search over the entities of one type, or all types when `type_name` is `None`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub type_name: Option<String>,
    /// Exact equality (`find`) versus case-insensitive substring match (`search`)
    pub exact: bool,
    pub filters: Vec<(String, Value)>,
}

impl Query {
    pub fn exact(type_name: Option<String>) -> Self {
        Self {
            type_name,
            exact: true,
            filters: Vec::new(),
        }
    }

    pub fn inexact(type_name: Option<String>) -> Self {
        Self {
            type_name,
            exact: false,
            filters: Vec::new(),
        }
    }

    #[must_use]
    pub fn and(mut self, key: impl Into<String>, value: Value) -> Self {
        self.filters.push((key.into(), value));
        self
    }
}

/// Graph-backed object store
pub trait EntityStore: Send + Sync {
    /// Whether a node type of this name exists
    fn type_exists(&self, type_name: &str) -> bool;

    /// Schema information for a property; `None` for unknown types or keys
    fn property_info(&self, type_name: &str, key: &str) -> Option<PropertyInfo>;

    fn create(
        &self,
        type_name: &str,
        properties: IndexMap<String, Value>,
    ) -> ExpressionResult<EntityRef>;

    /// Look up an entity by id
    fn get(&self, id: &str) -> Option<EntityRef>;

    /// Matching entities ordered by creation time, oldest first
    fn find(&self, query: &Query) -> ExpressionResult<Vec<EntityRef>>;

    fn delete(&self, entity: &EntityRef) -> ExpressionResult<()>;

    /// Property value; `None` when the key is unknown for the entity's type,
    /// `Some(Value::Null)` when it is known but unset
    fn property(&self, entity: &EntityRef, key: &str) -> Option<Value>;

    fn set_property(
        &self,
        security: &SecurityContext,
        entity: &EntityRef,
        key: &str,
        value: Value,
    ) -> ExpressionResult<()>;

    /// Property names of the entity's type in the given view
    fn property_keys(&self, entity: &EntityRef, view: &str) -> Vec<String>;

    /// Relationships attached to `entity` in the given direction
    fn relationships(&self, entity: &EntityRef, direction: Direction) -> Vec<Relationship>;

    /// Create a relationship; `None` when no relationship type of that name
    /// connects the two entity types
    fn create_relationship(
        &self,
        from: &EntityRef,
        to: &EntityRef,
        rel_type: &str,
    ) -> ExpressionResult<Option<EntityRef>>;

    /// Let the next write to a read-only property of `entity` through
    fn unlock_read_only_once(&self, entity: &EntityRef);
}
