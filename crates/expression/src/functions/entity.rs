//! Entity access, CRUD and search
//!
//! Reads degrade to an empty string or a message when the arguments do not
//! fit. Anything that changes the store raises a structured error instead, so
//! the surrounding transaction can be rolled back.

use indexmap::IndexMap;

use structr_log::{debug, trace};

use super::{Builtin, FunctionOutput, has_length, has_min_length};
use crate::context::ActionContext;
use crate::core::{EntityRef, Value};
use crate::error::{ExpressionError, ExpressionResult};
use crate::eval::Evaluator;
use crate::services::{EntityStore, Query};

type Output = ExpressionResult<FunctionOutput>;

const GET_ENTITY: &str =
    "Cannot evaluate first argument to entity, must be entity or single element list of entities.";
const FIND_USAGE: &str =
    "Usage: ${find(type, key, value)}. Example: ${find(\"User\", \"email\", \"tester@test.com\"}";
const CREATE_USAGE: &str =
    "Usage: ${create(type, key, value)}. Example: ${create(\"Feedback\", \"text\", this.text)}";
const CREATE_USAGE_SCRIPT: &str = "Usage: ${{Structr.create(type, {key: value})}}. Example: ${{Structr.create(\"Feedback\", {text: \"Structr is awesome.\"})}}";

pub(super) const BUILTINS: &[Builtin] = &[
    Builtin {
        name: "get",
        apply: get,
        usage: "Usage: ${get(entity, propertyKey)}. Example: ${get(this, \"children\")}",
        usage_script: None,
        description: "Returns the value with the given name of the given entity, or an empty string",
    },
    Builtin {
        name: "get_or_null",
        apply: get_or_null,
        usage: "Usage: ${get_or_null(entity, propertyKey)}. Example: ${get_or_null(this, \"children\")}",
        usage_script: Some(
            "Usage: ${{Structr.getOrNull(entity, propertyKey)}}. Example: ${{Structr.getOrNull(this, \"children\")}}",
        ),
        description: "Returns the value with the given name of the given entity, or null",
    },
    Builtin {
        name: "merge_properties",
        apply: merge_properties,
        usage: "Usage: ${merge_properties(source, target , mergeKeys...)}. Example: ${merge_properties(this, parent, \"eMail\")}",
        usage_script: None,
        description: "Copies the values for the given keys from the source entity to the target entity",
    },
    Builtin {
        name: "keys",
        apply: keys,
        usage: "Usage: ${keys(entity, viewName)}. Example: ${keys(this, \"ui\")}",
        usage_script: None,
        description: "Returns the property keys of the given entity",
    },
    Builtin {
        name: "values",
        apply: values,
        usage: "Usage: ${values(entity, viewName)}. Example: ${values(this, \"ui\")}",
        usage_script: None,
        description: "Returns the property values of the given entity",
    },
    Builtin {
        name: "set",
        apply: set,
        usage: "Usage: ${set(entity, propertyKey, value)}. Example: ${set(this, \"email\", lower(this.email))}",
        usage_script: None,
        description: "Sets a value on an entity",
    },
    Builtin {
        name: "find",
        apply: find,
        usage: FIND_USAGE,
        usage_script: None,
        description: "Returns a collection of entities of the given type from the database, takes optional key/value pairs",
    },
    Builtin {
        name: "search",
        apply: search,
        usage: "Usage: ${search(type, key, value)}. Example: ${search(\"User\", \"name\", \"abc\")}",
        usage_script: Some(
            "Usage: ${{Structr.search(type, key, value)}}. Example: ${{Structr.search(\"User\", \"name\", \"abc\")}}",
        ),
        description: "Returns a collection of entities of the given type whose properties contain the given values",
    },
    Builtin {
        name: "create",
        apply: create,
        usage: CREATE_USAGE,
        usage_script: Some(CREATE_USAGE_SCRIPT),
        description: "Creates a new entity with the given key/value pairs in the database",
    },
    Builtin {
        name: "delete",
        apply: delete,
        usage: "Usage: ${delete(entity)}. Example: ${delete(this)}",
        usage_script: None,
        description: "Deletes the given entity from the database",
    },
    Builtin {
        name: "instantiate",
        apply: instantiate,
        usage: "Usage: ${instantiate(node)}. Example: ${instantiate(result.node)}",
        usage_script: None,
        description: "Instantiates the given raw node into an entity",
    },
    Builtin {
        name: "unlock_readonly_properties_once",
        apply: unlock_readonly_properties_once,
        usage: "Usage: ${unlock_readonly_properties_once(node)}. Example ${unlock_readonly_properties_once, this}",
        usage_script: Some(
            "Usage: ${{Structr.unlock_readonly_properties_once(node)}}. Example ${{Structr.unlock_readonly_properties_once, Structr.get('this')}}",
        ),
        description: "Unlocks any read-only property for a single access",
    },
    Builtin {
        name: "property_info",
        apply: property_info,
        usage: "Usage: ${property_info(type, name)}. Example ${property_info('User', 'name')}",
        usage_script: Some("Usage: ${Structr.propertyInfo(type, name)}. Example ${Structr.propertyInfo('User', 'name')}"),
        description: "Returns the schema information for the given property",
    },
];

// ============================================================================
// Reads
// ============================================================================

/// What the first argument of `get` resolved to
enum Source<'a> {
    Entity(&'a EntityRef),
    Map(&'a IndexMap<String, Value>),
    /// Message returned in place of a value
    Invalid(String),
    None,
}

fn source(value: &Value) -> Source<'_> {
    match value {
        Value::Entity(entity) => Source::Entity(entity),
        Value::Map(map) => Source::Map(map),
        Value::List(items) if items.len() == 1 => match &items[0] {
            Value::Entity(entity) => Source::Entity(entity),
            Value::Null => Source::Invalid("get(): first element of collection is null.".to_string()),
            other => Source::Invalid(format!(
                "get(): first element of collection is of type {} which is not supported.",
                other.type_name()
            )),
        },
        _ => Source::None,
    }
}

fn get(args: &[Value], eval: &Evaluator, _: &mut ActionContext, _: Option<&EntityRef>) -> Output {
    if !has_length(args, 2) {
        return Ok(FunctionOutput::Usage);
    }
    let key = args[1].to_string();

    let value = match source(&args[0]) {
        Source::Map(map) => map.get(&key).cloned().unwrap_or_default(),
        Source::Entity(entity) => eval.property(entity, &key).unwrap_or_else(Value::empty),
        Source::Invalid(message) => Value::text(message),
        Source::None => Value::text(GET_ENTITY),
    };
    Ok(value.into())
}

fn get_or_null(args: &[Value], eval: &Evaluator, _: &mut ActionContext, _: Option<&EntityRef>) -> Output {
    if !has_length(args, 2) {
        return Ok(FunctionOutput::Usage);
    }
    let value = match source(&args[0]) {
        Source::Entity(entity) => eval
            .property(entity, &args[1].to_string())
            .unwrap_or_else(Value::empty),
        _ => Value::Null,
    };
    Ok(value.into())
}

fn keys(args: &[Value], eval: &Evaluator, _: &mut ActionContext, _: Option<&EntityRef>) -> Output {
    match args.first() {
        Some(Value::Entity(entity)) if has_min_length(args, 2) => {
            let Some(store) = eval.services().store() else {
                return Ok(FunctionOutput::empty());
            };
            let mut keys: Vec<Value> = Vec::new();
            for key in store.property_keys(entity, &args[1].to_string()) {
                let key = Value::text(key);
                if !keys.contains(&key) {
                    keys.push(key);
                }
            }
            Ok(Value::List(keys).into())
        }
        Some(Value::Map(map)) => Ok(Value::List(map.keys().map(Value::text).collect()).into()),
        _ => Ok(FunctionOutput::empty()),
    }
}

fn values(args: &[Value], eval: &Evaluator, _: &mut ActionContext, _: Option<&EntityRef>) -> Output {
    match args.first() {
        Some(Value::Entity(entity)) if has_min_length(args, 2) => {
            let Some(store) = eval.services().store() else {
                return Ok(FunctionOutput::empty());
            };
            let mut values: Vec<Value> = Vec::new();
            for key in store.property_keys(entity, &args[1].to_string()) {
                let value = store.property(entity, &key).unwrap_or_default();
                if !values.contains(&value) {
                    values.push(value);
                }
            }
            Ok(Value::List(values).into())
        }
        Some(Value::Map(map)) => Ok(Value::List(map.values().cloned().collect()).into()),
        _ => Ok(FunctionOutput::empty()),
    }
}

fn property_info(args: &[Value], eval: &Evaluator, _: &mut ActionContext, _: Option<&EntityRef>) -> Output {
    if !has_length(args, 2) {
        return Ok(FunctionOutput::Usage);
    }
    let type_name = args[0].to_string();
    let key = args[1].to_string();

    let Some(store) = eval.services().store().filter(|store| store.type_exists(&type_name)) else {
        return Ok(Value::text(format!("Unknown type {type_name}")).into());
    };
    match store.property_info(&type_name, &key) {
        Some(info) => Ok(info.to_value(&type_name).into()),
        None => Ok(Value::text(format!("Unknown property {type_name}.{key}")).into()),
    }
}

// ============================================================================
// Writes
// ============================================================================

/// Write `properties` to `entity` with the security context of `ctx`; the
/// `null` literal clears a property
pub(crate) fn write_properties(
    store: &dyn EntityStore,
    ctx: &ActionContext,
    entity: &EntityRef,
    properties: IndexMap<String, Value>,
) -> ExpressionResult<()> {
    for (key, value) in properties {
        trace!(id = %entity.id, key = %key, "Setting property");
        let value = if value.is_null_like() { Value::Null } else { value };
        store.set_property(ctx.security(), entity, &key, value)?;
    }
    Ok(())
}

fn is_plain_key(key: &str) -> bool {
    !key.is_empty() && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Properties given to `set`: one key/value pair, several pairs, maps, or
/// JSON object texts
fn set_arguments(args: &[Value]) -> IndexMap<String, Value> {
    let mut properties = IndexMap::new();

    let pairs = args.len() % 2 == 0
        && args
            .chunks(2)
            .all(|pair| matches!(&pair[0], Value::Text(key) if is_plain_key(key)));
    if pairs {
        for pair in args.chunks(2) {
            properties.insert(pair[0].to_string(), pair[1].clone());
        }
        return properties;
    }

    for arg in args {
        match arg {
            Value::Map(map) => properties.extend(map.clone()),
            other => match serde_json::from_str::<serde_json::Value>(&other.to_string()) {
                Ok(json @ serde_json::Value::Object(_)) => {
                    if let Value::Map(map) = Value::from_json(json) {
                        properties.extend(map);
                    }
                }
                _ => debug!(argument = %other, "Ignoring set() argument that is not a property map"),
            },
        }
    }
    properties
}

pub(crate) fn set(args: &[Value], eval: &Evaluator, ctx: &mut ActionContext, _: Option<&EntityRef>) -> Output {
    if !has_min_length(args, 2) {
        return Ok(FunctionOutput::empty());
    }
    let Value::Entity(entity) = &args[0] else {
        return Err(ExpressionError::framework(
            422,
            "Invalid use of builtin method set, usage: set(entity, params..)",
        ));
    };

    let store = eval.services().require_store()?;
    write_properties(store, ctx, entity, set_arguments(&args[1..]))?;
    Ok(FunctionOutput::empty())
}

fn merge_properties(args: &[Value], eval: &Evaluator, ctx: &mut ActionContext, _: Option<&EntityRef>) -> Output {
    let (Some(Value::Entity(source)), Some(Value::Entity(target))) = (args.first(), args.get(1)) else {
        return Ok(FunctionOutput::empty());
    };
    if !has_min_length(args, 2) {
        return Ok(FunctionOutput::empty());
    }

    let store = eval.services().require_store()?;
    let mut properties = IndexMap::new();
    for key in &args[2..] {
        let key = key.to_string();
        if let Some(value) = store.property(source, &key).filter(|value| !value.is_null()) {
            properties.insert(key, value);
        }
    }
    write_properties(store, ctx, target, properties)?;
    Ok(FunctionOutput::empty())
}

/// Key/value pairs after the type name, checking their count
fn key_value_pairs(args: &[Value], usage: &str) -> ExpressionResult<Vec<(String, Value)>> {
    if args.len() % 2 == 0 {
        return Err(ExpressionError::framework(
            400,
            format!(
                "Invalid number of parameters: {}. Should be uneven: {usage}",
                args.len()
            ),
        ));
    }
    Ok(args[1..]
        .chunks(2)
        .map(|pair| (pair[0].to_string(), pair[1].clone()))
        .collect())
}

/// Add search filters, refusing keys the type does not index
fn add_filters(
    store: &dyn EntityStore,
    type_name: Option<&str>,
    mut query: Query,
    pairs: Vec<(String, Value)>,
) -> ExpressionResult<Query> {
    for (key, value) in pairs {
        if let Some(type_name) = type_name {
            let indexed = store
                .property_info(type_name, &key)
                .is_some_and(|info| info.indexed);
            if !indexed {
                return Err(ExpressionError::framework(
                    400,
                    format!("Search key {key} is not indexed."),
                ));
            }
        }
        query = query.and(key, value);
    }
    Ok(query)
}

fn entity_list(entities: Vec<EntityRef>) -> FunctionOutput {
    Value::List(entities.into_iter().map(Value::Entity).collect()).into()
}

fn find(args: &[Value], eval: &Evaluator, _: &mut ActionContext, _: Option<&EntityRef>) -> Output {
    let type_name = match args.first() {
        Some(value) if !value.is_null() => value.to_string(),
        _ => return Ok(Value::text("Error in find(): no type specified.").into()),
    };

    let store = eval.services().require_store()?;
    if !store.type_exists(&type_name) {
        return Ok(Value::text(format!("Error in find(): type {type_name} not found.")).into());
    }

    let query = Query::exact(Some(type_name.clone()));
    let query = match args {
        [_, Value::Map(map)] => map
            .iter()
            .fold(query, |query, (key, value)| query.and(key.clone(), value.clone())),
        _ => add_filters(store, Some(&type_name), query, key_value_pairs(args, FIND_USAGE)?)?,
    };

    let found = store.find(&query)?;
    debug!(type_name = %type_name, count = found.len(), "find()");
    Ok(entity_list(found))
}

fn search(args: &[Value], eval: &Evaluator, _: &mut ActionContext, _: Option<&EntityRef>) -> Output {
    let store = eval.services().require_store()?;

    let type_name = args
        .first()
        .filter(|value| !value.is_null())
        .map(Value::to_string)
        .filter(|type_name| store.type_exists(type_name));

    let query = Query::inexact(type_name.clone());
    let query = match args {
        [_, Value::Map(map)] => map
            .iter()
            .fold(query, |query, (key, value)| query.and(key.clone(), value.clone())),
        _ => add_filters(store, type_name.as_deref(), query, key_value_pairs(args, FIND_USAGE)?)?,
    };

    Ok(entity_list(store.find(&query)?))
}

fn create(args: &[Value], eval: &Evaluator, ctx: &mut ActionContext, _: Option<&EntityRef>) -> Output {
    let store = eval.services().require_store()?;

    let type_name = args.first().map_or_else(|| "null".to_string(), Value::to_string);
    if args.first().is_none_or(Value::is_null) || !store.type_exists(&type_name) {
        return Err(ExpressionError::framework(
            422,
            format!("Unknown type '{type_name}' in create() method!"),
        ));
    }

    let properties: IndexMap<String, Value> = match args {
        [_, Value::Map(map)] => map.clone(),
        _ => {
            let usage = if ctx.is_script() { CREATE_USAGE_SCRIPT } else { CREATE_USAGE };
            key_value_pairs(args, usage)?.into_iter().collect()
        }
    };

    let entity = store.create(&type_name, properties)?;
    Ok(Value::Entity(entity).into())
}

fn delete(args: &[Value], eval: &Evaluator, _: &mut ActionContext, _: Option<&EntityRef>) -> Output {
    let store = eval.services().require_store()?;
    for entity in args.iter().filter_map(Value::as_entity) {
        store.delete(entity)?;
    }
    Ok(FunctionOutput::empty())
}

fn instantiate(args: &[Value], eval: &Evaluator, _: &mut ActionContext, _: Option<&EntityRef>) -> Output {
    if !has_min_length(args, 1) {
        return Ok(FunctionOutput::empty());
    }
    match &args[0] {
        Value::Entity(entity) => Ok(Value::Entity(entity.clone()).into()),
        other => {
            let store = eval.services().require_store()?;
            Ok(Value::from(store.get(&other.to_string())).into())
        }
    }
}

fn unlock_readonly_properties_once(
    args: &[Value],
    eval: &Evaluator,
    _: &mut ActionContext,
    _: Option<&EntityRef>,
) -> Output {
    if !has_min_length(args, 1) {
        return Ok(FunctionOutput::empty());
    }
    match &args[0] {
        Value::Entity(entity) if entity.is_node() => {
            eval.services().require_store()?.unlock_read_only_once(entity);
            Ok(FunctionOutput::empty())
        }
        _ => Ok(FunctionOutput::Usage),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::functions::test_support::{eval, fixture_engine};
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn user(id: &str) -> EntityRef {
        EntityRef::node(id, "User")
    }

    #[test]
    fn test_get_from_entity_and_map() {
        let (engine, _) = fixture_engine();
        let mut ctx = ActionContext::new();
        let alice = user("u1");

        assert_eq!(engine.evaluate("get(this, 'name')", &mut ctx, Some(&alice)).unwrap(), Value::text("Alice"));
        assert_eq!(engine.evaluate("get(this, 'nope')", &mut ctx, Some(&alice)).unwrap(), Value::empty());
        assert_eq!(
            engine.evaluate("get('x', 'name')", &mut ctx, None).unwrap(),
            Value::text(GET_ENTITY)
        );
        assert_eq!(
            engine.evaluate("get(find('User', 'email', 'bob@example.com'), 'name')", &mut ctx, None).unwrap(),
            Value::text("Bob")
        );
    }

    #[test]
    fn test_get_or_null() {
        let (engine, _) = fixture_engine();
        let mut ctx = ActionContext::new();
        let alice = user("u1");

        assert_eq!(engine.evaluate("get_or_null(this, 'email')", &mut ctx, Some(&alice)).unwrap(), Value::text("alice@example.com"));
        assert_eq!(engine.evaluate("get_or_null('x', 'email')", &mut ctx, None).unwrap(), Value::Null);
    }

    #[test]
    fn test_find_requires_uneven_arguments() {
        let (engine, _) = fixture_engine();
        let mut ctx = ActionContext::new();

        let err = engine.evaluate("find('User', 'email')", &mut ctx, None).unwrap_err();
        assert_eq!(err.status(), 400);
        assert!(err.to_string().starts_with("Invalid number of parameters: 2. Should be uneven"));

        let found = engine.evaluate("find('User', 'email', 'alice@example.com')", &mut ctx, None).unwrap();
        assert_eq!(found, Value::List(vec![Value::Entity(user("u1"))]));
    }

    #[test]
    fn test_find_rejects_unindexed_keys() {
        let (engine, _) = fixture_engine();
        let mut ctx = ActionContext::new();
        let err = engine.evaluate("find('User', 'name', 'Bob')", &mut ctx, None).unwrap_err();
        assert_eq!(err.to_string(), "Search key name is not indexed.");
    }

    #[rstest]
    #[case("find()", "Error in find(): no type specified.")]
    #[case("find('Nope')", "Error in find(): type Nope not found.")]
    fn test_find_messages(#[case] expression: &str, #[case] expected: &str) {
        let (engine, _) = fixture_engine();
        let mut ctx = ActionContext::new();
        assert_eq!(engine.evaluate(expression, &mut ctx, None).unwrap(), Value::text(expected));
    }

    #[test]
    fn test_find_all_in_creation_order() {
        let (engine, _) = fixture_engine();
        let mut ctx = ActionContext::new();
        let found = engine.evaluate("find('User')", &mut ctx, None).unwrap();
        assert_eq!(found, Value::List(vec![Value::Entity(user("u1")), Value::Entity(user("u2"))]));
    }

    #[test]
    fn test_search_is_case_insensitive_substring() {
        let (engine, _) = fixture_engine();
        let mut ctx = ActionContext::new();
        let found = engine.evaluate("search('User', 'email', 'BOB')", &mut ctx, None).unwrap();
        assert_eq!(found, Value::List(vec![Value::Entity(user("u2"))]));
    }

    #[test]
    fn test_create_and_delete() {
        let (engine, store) = fixture_engine();
        let mut ctx = ActionContext::new();

        let created = engine.evaluate("create('Group', 'name', 'Editors')", &mut ctx, None).unwrap();
        let Value::Entity(group) = created else {
            panic!("expected an entity, got {created:?}");
        };
        assert_eq!(store.property(&group, "name"), Some(Value::text("Editors")));

        engine.evaluate("delete(this)", &mut ctx, Some(&group)).unwrap();
        assert_eq!(store.get(&group.id), None);
    }

    #[test]
    fn test_create_errors() {
        let (engine, _) = fixture_engine();
        let mut ctx = ActionContext::new();

        let err = engine.evaluate("create('Nope')", &mut ctx, None).unwrap_err();
        assert_eq!(err.to_string(), "Unknown type 'Nope' in create() method!");
        assert_eq!(err.status(), 422);

        let err = engine.evaluate("create('Group', 'name')", &mut ctx, None).unwrap_err();
        assert_eq!(err.status(), 400);
        assert!(err.to_string().ends_with(CREATE_USAGE));
    }

    #[test]
    fn test_set_pairs_and_json() {
        let (engine, store) = fixture_engine();
        let mut ctx = ActionContext::new();
        let bob = user("u2");

        engine.evaluate("set(this, 'name', 'Robert')", &mut ctx, Some(&bob)).unwrap();
        assert_eq!(store.property(&bob, "name"), Some(Value::text("Robert")));

        engine
            .evaluate(r#"set(this, '{"email": "rob@example.com", "age": 40}')"#, &mut ctx, Some(&bob))
            .unwrap();
        assert_eq!(store.property(&bob, "email"), Some(Value::text("rob@example.com")));
        assert_eq!(store.property(&bob, "age"), Some(Value::Integer(40)));

        let err = engine.evaluate("set('x', 'name', 'y')", &mut ctx, None).unwrap_err();
        assert_eq!(err.status(), 422);
    }

    #[test]
    fn test_read_only_property_unlock() {
        let (engine, store) = fixture_engine();
        let mut ctx = ActionContext::new();
        let alice = user("u1");

        let err = engine.evaluate("set(this, 'secret', 'x')", &mut ctx, Some(&alice)).unwrap_err();
        assert_eq!(err.status(), 422);

        engine
            .evaluate("(unlock_readonly_properties_once(this), set(this, 'secret', 'x'))", &mut ctx, Some(&alice))
            .unwrap();
        assert_eq!(store.property(&alice, "secret"), Some(Value::text("x")));
    }

    #[test]
    fn test_merge_properties() {
        let (engine, store) = fixture_engine();
        let mut ctx = ActionContext::new();
        let alice = user("u1");

        engine
            .evaluate("merge_properties(this, find('User', 'email', 'bob@example.com')[0], 'age')", &mut ctx, Some(&alice))
            .unwrap();
        assert_eq!(store.property(&user("u2"), "age"), Some(Value::Integer(31)));
    }

    #[test]
    fn test_keys_and_values() {
        let (engine, _) = fixture_engine();
        let mut ctx = ActionContext::new();
        let alice = user("u1");

        assert_eq!(
            engine.evaluate("keys(this, 'ui')", &mut ctx, Some(&alice)).unwrap(),
            Value::List(vec![Value::text("name"), Value::text("email")])
        );
        assert_eq!(
            engine.evaluate("values(this, 'ui')", &mut ctx, Some(&alice)).unwrap(),
            Value::List(vec![Value::text("Alice"), Value::text("alice@example.com")])
        );
        assert_eq!(eval("keys('x')"), Value::empty());
    }

    #[test]
    fn test_property_info() {
        let (engine, _) = fixture_engine();
        let mut ctx = ActionContext::new();

        let info = engine.evaluate("property_info('User', 'email')", &mut ctx, None).unwrap();
        insta::assert_snapshot!(info.to_string(), @"{jsonName=email, className=String, declaringClass=User, readOnly=false, indexed=true}");

        assert_eq!(
            engine.evaluate("property_info('User', 'nope')", &mut ctx, None).unwrap(),
            Value::text("Unknown property User.nope")
        );
        assert_eq!(
            engine.evaluate("property_info('Nope', 'x')", &mut ctx, None).unwrap(),
            Value::text("Unknown type Nope")
        );
    }

    #[test]
    fn test_instantiate_by_id() {
        let (engine, _) = fixture_engine();
        let mut ctx = ActionContext::new();
        assert_eq!(
            engine.evaluate("instantiate('g1')", &mut ctx, None).unwrap(),
            Value::Entity(EntityRef::node("g1", "Group"))
        );
    }
}
