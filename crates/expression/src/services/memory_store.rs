//! In-memory [`EntityStore`]
//!
//! Types are declared up front or loaded from a JSON [`Fixture`]. Every type
//! implicitly carries `id`, `type`, `name` and `createdDate`; keys written by
//! `create` or `set` that the schema does not know are declared on the fly as
//! unindexed text properties.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use indexmap::IndexMap;
use parking_lot::RwLock;
use serde::Deserialize;
use structr_log::{debug, trace};

use super::store::{Direction, EntityStore, PropertyInfo, Query, Relationship};
use crate::context::SecurityContext;
use crate::core::{EntityRef, Value, compare, value::parse_iso_date};
use crate::error::{ExpressionError, ExpressionResult};

/// Properties every type has without declaring them
const BUILTIN_PROPERTIES: &[(&str, &str, bool)] = &[
    ("id", "String", true),
    ("type", "String", true),
    ("name", "String", false),
    ("createdDate", "Date", true),
];

#[derive(Debug, Clone, Default)]
struct TypeSchema {
    properties: IndexMap<String, PropertyInfo>,
    views: IndexMap<String, Vec<String>>,
}

#[derive(Debug, Clone)]
struct RelationshipType {
    name: String,
    source_type: String,
    target_type: String,
}

#[derive(Debug, Clone)]
struct StoredEntity {
    entity: EntityRef,
    properties: IndexMap<String, Value>,
    sequence: u64,
}

#[derive(Debug, Default)]
struct Inner {
    types: IndexMap<String, TypeSchema>,
    relationship_types: Vec<RelationshipType>,
    entities: IndexMap<String, StoredEntity>,
    relationships: IndexMap<String, Relationship>,
    unlocked: HashSet<String>,
}

/// Entity store keeping everything in process memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
    sequence: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a store from a fixture document
    pub fn from_json(json: &str) -> ExpressionResult<Self> {
        let fixture: Fixture = serde_json::from_str(json)?;
        Self::from_fixture(fixture)
    }

    pub fn from_fixture(fixture: Fixture) -> ExpressionResult<Self> {
        let store = Self::new();

        for (type_name, declaration) in fixture.types {
            let properties = declaration
                .properties
                .into_iter()
                .map(|(key, property)| property.into_info(key))
                .collect();
            store.define_type(&type_name, properties);
            for (view, keys) in declaration.views {
                store.define_view(&type_name, &view, keys);
            }
        }

        for rel_type in fixture.relationship_types {
            store.define_relationship_type(&rel_type.name, &rel_type.source, &rel_type.target);
        }

        let mut pending = Vec::with_capacity(fixture.entities.len());
        for entity in fixture.entities {
            let stored = store.insert(entity.id, &entity.type_name, IndexMap::new());
            pending.push((stored, entity.properties));
        }

        // Properties may reference entities declared later in the document
        for (entity, properties) in pending {
            let mut inner = store.inner.write();
            for (key, json) in properties {
                let value = inner.value_from_fixture(&entity.type_name, &key, json);
                inner.declare(&entity.type_name, &key);
                if let Some(stored) = inner.entities.get_mut(&entity.id) {
                    stored.properties.insert(key, value);
                }
            }
        }

        for rel in fixture.relationships {
            let (Some(source), Some(target)) = (store.get(&rel.source), store.get(&rel.target))
            else {
                return Err(ExpressionError::framework(
                    404,
                    format!(
                        "Relationship {} references unknown entity {} or {}",
                        rel.rel_type, rel.source, rel.target
                    ),
                ));
            };
            store.link(&source, &target, &rel.rel_type);
        }

        debug!(
            entities = store.entity_count(),
            relationships = store.relationship_count(),
            "Loaded fixture"
        );
        Ok(store)
    }

    /// Declare a node type with its properties
    pub fn define_type(&self, type_name: &str, properties: Vec<PropertyInfo>) {
        let mut inner = self.inner.write();
        let schema = inner.types.entry(type_name.to_string()).or_default();
        for property in properties {
            schema.properties.insert(property.json_name.clone(), property);
        }
    }

    /// Declare the ordered property names of a view such as `ui` or `public`
    pub fn define_view(&self, type_name: &str, view: &str, keys: Vec<String>) {
        let mut inner = self.inner.write();
        let schema = inner.types.entry(type_name.to_string()).or_default();
        schema.views.insert(view.to_string(), keys);
    }

    /// Declare a relationship type allowed between two node types
    pub fn define_relationship_type(&self, name: &str, source_type: &str, target_type: &str) {
        self.inner.write().relationship_types.push(RelationshipType {
            name: name.to_string(),
            source_type: source_type.to_string(),
            target_type: target_type.to_string(),
        });
    }

    /// Insert an entity directly, bypassing type checks
    pub fn insert(
        &self,
        id: Option<String>,
        type_name: &str,
        properties: IndexMap<String, Value>,
    ) -> EntityRef {
        let id = id.unwrap_or_else(new_id);
        let entity = EntityRef::node(id.clone(), type_name);
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);

        let mut inner = self.inner.write();
        inner.types.entry(type_name.to_string()).or_default();
        for key in properties.keys() {
            inner.declare(type_name, key);
        }

        let mut stored = properties;
        stored.insert("createdDate".to_string(), Value::Date(Utc::now()));
        inner.entities.insert(
            id,
            StoredEntity {
                entity: entity.clone(),
                properties: stored,
                sequence,
            },
        );
        entity
    }

    /// Connect two entities without consulting the relationship types
    pub fn link(&self, source: &EntityRef, target: &EntityRef, rel_type: &str) -> EntityRef {
        let entity = EntityRef::relationship(new_id(), rel_type);
        self.inner.write().relationships.insert(
            entity.id.clone(),
            Relationship {
                entity: entity.clone(),
                rel_type: rel_type.to_string(),
                source: source.clone(),
                target: target.clone(),
            },
        );
        entity
    }

    pub fn entity_count(&self) -> usize {
        self.inner.read().entities.len()
    }

    pub fn relationship_count(&self) -> usize {
        self.inner.read().relationships.len()
    }
}

impl Inner {
    fn schema_property(&self, type_name: &str, key: &str) -> Option<PropertyInfo> {
        if let Some((name, declared_type, indexed)) =
            BUILTIN_PROPERTIES.iter().find(|(name, ..)| *name == key)
        {
            let mut info = PropertyInfo::new(*name, *declared_type);
            info.indexed = *indexed;
            info.read_only = matches!(*name, "id" | "type" | "createdDate");
            return Some(info);
        }
        self.types.get(type_name)?.properties.get(key).cloned()
    }

    fn declare(&mut self, type_name: &str, key: &str) {
        if BUILTIN_PROPERTIES.iter().any(|(name, ..)| *name == key) {
            return;
        }
        let schema = self.types.entry(type_name.to_string()).or_default();
        if !schema.properties.contains_key(key) {
            trace!(type_name, key, "Declaring dynamic property");
            schema
                .properties
                .insert(key.to_string(), PropertyInfo::new(key, "String"));
        }
    }

    fn value_from_fixture(&self, type_name: &str, key: &str, json: serde_json::Value) -> Value {
        let declared_date = self
            .schema_property(type_name, key)
            .is_some_and(|info| info.declared_type == "Date");
        self.resolve_refs(json, declared_date)
    }

    fn resolve_refs(&self, json: serde_json::Value, as_date: bool) -> Value {
        match json {
            serde_json::Value::Object(map) if map.len() == 1 && map.contains_key("$ref") => {
                match map.get("$ref").and_then(serde_json::Value::as_str) {
                    Some(id) => self
                        .entities
                        .get(id)
                        .map_or(Value::Null, |stored| Value::Entity(stored.entity.clone())),
                    None => Value::Null,
                }
            }
            serde_json::Value::Array(items) => Value::List(
                items
                    .into_iter()
                    .map(|item| self.resolve_refs(item, as_date))
                    .collect(),
            ),
            serde_json::Value::String(text) if as_date => {
                parse_iso_date(&text).map_or(Value::Text(text), Value::Date)
            }
            other => Value::from_json(other),
        }
    }

    fn read(&self, entity: &EntityRef, key: &str) -> Option<Value> {
        if let Some(rel) = self.relationships.get(&entity.id) {
            return match key {
                "id" => Some(Value::text(&rel.entity.id)),
                "type" | "relType" => Some(Value::text(&rel.rel_type)),
                "sourceId" => Some(Value::text(&rel.source.id)),
                "targetId" => Some(Value::text(&rel.target.id)),
                _ => None,
            };
        }

        let stored = self.entities.get(&entity.id);
        match key {
            "id" => return Some(Value::text(&entity.id)),
            "type" => return Some(Value::text(&entity.type_name)),
            _ => {}
        }
        self.schema_property(&entity.type_name, key)?;
        Some(
            stored
                .and_then(|stored| stored.properties.get(key).cloned())
                .unwrap_or(Value::Null),
        )
    }

    fn matches(&self, stored: &StoredEntity, query: &Query) -> bool {
        if let Some(type_name) = &query.type_name {
            if &stored.entity.type_name != type_name {
                return false;
            }
        }

        query.filters.iter().all(|(key, expected)| {
            let actual = self.read(&stored.entity, key).unwrap_or(Value::Null);
            if query.exact {
                exact_match(&actual, expected)
            } else {
                inexact_match(&actual, expected)
            }
        })
    }
}

fn exact_match(actual: &Value, expected: &Value) -> bool {
    match actual {
        Value::List(items) if !expected.is_list() => {
            items.iter().any(|item| exact_match(item, expected))
        }
        Value::Entity(entity) => match expected {
            Value::Entity(other) => entity.id == other.id,
            other => entity.id == other.to_string(),
        },
        _ => compare::eq(Some(actual), Some(expected)),
    }
}

fn inexact_match(actual: &Value, expected: &Value) -> bool {
    if expected.is_null() {
        return actual.is_null();
    }
    match actual {
        Value::Null => false,
        Value::List(items) => items.iter().any(|item| inexact_match(item, expected)),
        other => other
            .to_string()
            .to_lowercase()
            .contains(&expected.to_string().to_lowercase()),
    }
}

fn new_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

impl EntityStore for MemoryStore {
    fn type_exists(&self, type_name: &str) -> bool {
        self.inner.read().types.contains_key(type_name)
    }

    fn property_info(&self, type_name: &str, key: &str) -> Option<PropertyInfo> {
        let inner = self.inner.read();
        if !inner.types.contains_key(type_name) {
            return None;
        }
        inner.schema_property(type_name, key)
    }

    fn create(
        &self,
        type_name: &str,
        properties: IndexMap<String, Value>,
    ) -> ExpressionResult<EntityRef> {
        if !self.type_exists(type_name) {
            return Err(ExpressionError::framework(
                422,
                format!("Unknown type '{type_name}'"),
            ));
        }
        let entity = self.insert(None, type_name, properties);
        debug!(id = %entity.id, type_name, "Created entity");
        Ok(entity)
    }

    fn get(&self, id: &str) -> Option<EntityRef> {
        let inner = self.inner.read();
        inner
            .entities
            .get(id)
            .map(|stored| stored.entity.clone())
            .or_else(|| inner.relationships.get(id).map(|rel| rel.entity.clone()))
    }

    fn find(&self, query: &Query) -> ExpressionResult<Vec<EntityRef>> {
        let inner = self.inner.read();
        let mut found: Vec<&StoredEntity> = inner
            .entities
            .values()
            .filter(|stored| inner.matches(stored, query))
            .collect();
        found.sort_by_key(|stored| stored.sequence);
        Ok(found.into_iter().map(|stored| stored.entity.clone()).collect())
    }

    fn delete(&self, entity: &EntityRef) -> ExpressionResult<()> {
        let mut inner = self.inner.write();
        if inner.relationships.shift_remove(&entity.id).is_some() {
            return Ok(());
        }
        if inner.entities.shift_remove(&entity.id).is_none() {
            return Err(ExpressionError::framework(
                404,
                format!("Entity {} not found", entity.id),
            ));
        }
        inner
            .relationships
            .retain(|_, rel| rel.source.id != entity.id && rel.target.id != entity.id);
        inner.unlocked.remove(&entity.id);
        debug!(id = %entity.id, "Deleted entity");
        Ok(())
    }

    fn property(&self, entity: &EntityRef, key: &str) -> Option<Value> {
        self.inner.read().read(entity, key)
    }

    fn set_property(
        &self,
        security: &SecurityContext,
        entity: &EntityRef,
        key: &str,
        value: Value,
    ) -> ExpressionResult<()> {
        let mut inner = self.inner.write();
        if !inner.entities.contains_key(&entity.id) {
            return Err(ExpressionError::framework(
                404,
                format!("Entity {} not found", entity.id),
            ));
        }

        let read_only = inner
            .schema_property(&entity.type_name, key)
            .is_some_and(|info| info.read_only);
        if read_only && !security.is_privileged() && !inner.unlocked.remove(&entity.id) {
            return Err(ExpressionError::framework(
                422,
                format!("Property {}.{key} is read-only", entity.type_name),
            ));
        }

        inner.declare(&entity.type_name, key);
        if let Some(stored) = inner.entities.get_mut(&entity.id) {
            stored.properties.insert(key.to_string(), value);
        }
        Ok(())
    }

    fn property_keys(&self, entity: &EntityRef, view: &str) -> Vec<String> {
        let inner = self.inner.read();
        let Some(schema) = inner.types.get(&entity.type_name) else {
            return Vec::new();
        };
        match schema.views.get(view) {
            Some(keys) => keys.clone(),
            None => BUILTIN_PROPERTIES
                .iter()
                .map(|(name, ..)| (*name).to_string())
                .chain(schema.properties.keys().cloned())
                .collect(),
        }
    }

    fn relationships(&self, entity: &EntityRef, direction: Direction) -> Vec<Relationship> {
        self.inner
            .read()
            .relationships
            .values()
            .filter(|rel| match direction {
                Direction::Outgoing => rel.source.id == entity.id,
                Direction::Incoming => rel.target.id == entity.id,
            })
            .cloned()
            .collect()
    }

    fn create_relationship(
        &self,
        from: &EntityRef,
        to: &EntityRef,
        rel_type: &str,
    ) -> ExpressionResult<Option<EntityRef>> {
        let allowed = self.inner.read().relationship_types.iter().any(|candidate| {
            candidate.name == rel_type
                && candidate.source_type == from.type_name
                && candidate.target_type == to.type_name
        });
        if !allowed {
            return Ok(None);
        }
        Ok(Some(self.link(from, to, rel_type)))
    }

    fn unlock_read_only_once(&self, entity: &EntityRef) {
        self.inner.write().unlocked.insert(entity.id.clone());
    }
}

// ============================================================================
// Fixture format
// ============================================================================

/// JSON document describing schema and data for a [`MemoryStore`]
///
/// Property values of the form `{"$ref": "<id>"}` become entity references.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Fixture {
    pub types: IndexMap<String, FixtureType>,
    pub relationship_types: Vec<FixtureRelationshipType>,
    pub entities: Vec<FixtureEntity>,
    pub relationships: Vec<FixtureRelationship>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FixtureType {
    pub properties: IndexMap<String, FixtureProperty>,
    pub views: IndexMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FixtureProperty {
    #[serde(rename = "type")]
    pub declared_type: String,
    pub indexed: bool,
    pub read_only: bool,
}

impl Default for FixtureProperty {
    fn default() -> Self {
        Self {
            declared_type: "String".to_string(),
            indexed: false,
            read_only: false,
        }
    }
}

impl FixtureProperty {
    fn into_info(self, json_name: String) -> PropertyInfo {
        PropertyInfo {
            json_name,
            declared_type: self.declared_type,
            indexed: self.indexed,
            read_only: self.read_only,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FixtureRelationshipType {
    pub name: String,
    pub source: String,
    pub target: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FixtureEntity {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub properties: IndexMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FixtureRelationship {
    #[serde(rename = "type")]
    pub rel_type: String,
    pub source: String,
    pub target: String,
}
