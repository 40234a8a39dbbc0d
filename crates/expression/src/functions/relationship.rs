//! Relationship traversal and creation
//!
//! Relationship lookups never fail: a missing store or a non-node argument
//! degrades to an empty result or an error message in place of the value.

use super::{Builtin, FunctionOutput, has_length, has_min_length};
use crate::context::ActionContext;
use crate::core::{EntityRef, Value};
use crate::error::ExpressionResult;
use crate::eval::Evaluator;
use crate::services::{Direction, Relationship};

type Output = ExpressionResult<FunctionOutput>;

const NOT_A_NODE: &str = "Error: entity is not a node.";
const NOT_NODES: &str = "Error: entities are not nodes.";

pub(super) const BUILTINS: &[Builtin] = &[
    Builtin {
        name: "incoming",
        apply: incoming,
        usage: "Usage: ${incoming(entity [, relType])}. Example: ${incoming(this, 'PARENT_OF')}",
        usage_script: Some(
            "Usage: ${{Structr.incoming(entity [, relType])}}. Example: ${{Structr.incoming(Structr.this, 'PARENT_OF')}}",
        ),
        description: "Returns the incoming relationships of the given entity",
    },
    Builtin {
        name: "outgoing",
        apply: outgoing,
        usage: "Usage: ${outgoing(entity [, relType])}. Example: ${outgoing(this, 'PARENT_OF')}",
        usage_script: Some(
            "Usage: ${{Structr.outgoing(entity [, relType])}}. Example: ${{outgoing(Structr.this, 'PARENT_OF')}}",
        ),
        description: "Returns the outgoing relationships of the given entity",
    },
    Builtin {
        name: "has_relationship",
        apply: has_relationship,
        usage: "Usage: ${has_relationship(entity1, entity2 [, relType])}. Example: ${has_relationship(me, user, 'FOLLOWS')} (ignores direction of the relationship)",
        usage_script: Some(
            "Usage: ${{Structr.has_relationship(entity1, entity2 [, relType])}}. Example: ${{Structr.has_relationship(Structr.get('me'), user, 'FOLLOWS')}} (ignores direction of the relationship)",
        ),
        description: "Returns true if the given entity has relationships of the given type",
    },
    Builtin {
        name: "has_outgoing_relationship",
        apply: has_outgoing_relationship,
        usage: "Usage: ${has_outgoing_relationship(from, to [, relType])}. Example: ${has_outgoing_relationship(me, user, 'FOLLOWS')}",
        usage_script: Some(
            "Usage: ${{Structr.has_outgoing_relationship(from, to [, relType])}}. Example: ${{Structr.has_outgoing_relationship(Structr.get('me'), user, 'FOLLOWS')}}",
        ),
        description: "Returns true if the given entity has outgoing relationships of the given type",
    },
    Builtin {
        name: "has_incoming_relationship",
        apply: has_incoming_relationship,
        usage: "Usage: ${has_incoming_relationship(from, to [, relType])}. Example: ${has_incoming_relationship(me, user, 'FOLLOWS')}",
        usage_script: Some(
            "Usage: ${{Structr.has_incoming_relationship(from, to [, relType])}}. Example: ${{Structr.has_incoming_relationship(Structr.get('me'), user, 'FOLLOWS')}}",
        ),
        description: "Returns true if the given entity has incoming relationships of the given type",
    },
    Builtin {
        name: "get_relationships",
        apply: get_relationships,
        usage: "Usage: ${get_relationships(entity1, entity2 [, relType])}. Example: ${get_relationships(me, user, 'FOLLOWS')}  (ignores direction of the relationship)",
        usage_script: Some(
            "Usage: ${{Structr.get_relationships(entity1, entity2 [, relType])}}. Example: ${{Structr.get_relationships(Structr.get('me'), user, 'FOLLOWS')}}  (ignores direction of the relationship)",
        ),
        description: "Returns the relationships of the given entity with an optional relationship type",
    },
    Builtin {
        name: "get_outgoing_relationships",
        apply: get_outgoing_relationships,
        usage: "Usage: ${get_outgoing_relationships(from, to [, relType])}. Example: ${get_outgoing_relationships(me, user, 'FOLLOWS')}",
        usage_script: Some(
            "Usage: ${{Structr.get_outgoing_relationships(from, to [, relType])}}. Example: ${{Structr.get_outgoing_relationships(Structr.get('me'), user, 'FOLLOWS')}}",
        ),
        description: "Returns the outgoing relationships of the given entity with an optional relationship type",
    },
    Builtin {
        name: "get_incoming_relationships",
        apply: get_incoming_relationships,
        usage: "Usage: ${get_incoming_relationships(from, to [, relType])}. Example: ${get_incoming_relationships(me, user, 'FOLLOWS')}",
        usage_script: Some(
            "Usage: ${{Structr.get_incoming_relationships(from, to [, relType])}}. Example: ${{Structr.get_incoming_relationships(Structr.get('me'), user, 'FOLLOWS')}}",
        ),
        description: "Returns the incoming relationships of the given entity with an optional relationship type",
    },
    Builtin {
        name: "create_relationship",
        apply: create_relationship,
        usage: "Usage: ${create_relationship(from, to, relType)}. Example: ${create_relationship(me, user, 'FOLLOWS')} (Relationshiptype has to exist)",
        usage_script: Some(
            "Usage: ${{Structr.create_relationship(from, to, relType)}}. Example: ${{Structr.create_relationship(Structr.get('me'), user, 'FOLLOWS')}} (Relationshiptype has to exist)",
        ),
        description: "Creates a relationship of the given type between two entities",
    },
];

/// Which relationships of the first node count as a match
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    /// Either direction between the two nodes
    Any,
    /// From the first node to the second
    Outgoing,
    /// From the second node to the first
    Incoming,
}

fn node(value: &Value) -> Option<&EntityRef> {
    value.as_entity().filter(|entity| entity.is_node())
}

fn as_relationships(relationships: Vec<Relationship>) -> Value {
    Value::List(
        relationships
            .into_iter()
            .map(|rel| Value::Entity(rel.entity))
            .collect(),
    )
}

// ============================================================================
// Traversal
// ============================================================================

fn attached(args: &[Value], eval: &Evaluator, direction: Direction) -> Output {
    if !has_min_length(args, 1) {
        return Ok(FunctionOutput::empty());
    }
    let Some(entity) = node(&args[0]) else {
        return Ok(Value::text(NOT_A_NODE).into());
    };
    let rel_type = match args.get(1) {
        None => None,
        Some(Value::Text(rel_type)) => Some(rel_type.as_str()),
        // an explicit but unusable type filter matches nothing
        Some(_) => return Ok(FunctionOutput::empty()),
    };
    let Some(store) = eval.services().store() else {
        return Ok(Value::List(Vec::new()).into());
    };

    let mut relationships = store.relationships(entity, direction);
    if let Some(rel_type) = rel_type {
        relationships.retain(|rel| rel.rel_type == rel_type);
    }
    Ok(as_relationships(relationships).into())
}

fn incoming(args: &[Value], eval: &Evaluator, _: &mut ActionContext, _: Option<&EntityRef>) -> Output {
    attached(args, eval, Direction::Incoming)
}

fn outgoing(args: &[Value], eval: &Evaluator, _: &mut ActionContext, _: Option<&EntityRef>) -> Output {
    attached(args, eval, Direction::Outgoing)
}

// ============================================================================
// Between two nodes
// ============================================================================

/// Relationships linking the first two arguments, filtered by the optional
/// third; `Err` carries the message returned when the arguments are not nodes
fn between(args: &[Value], eval: &Evaluator, scope: Scope) -> Result<Vec<Relationship>, &'static str> {
    if !has_min_length(args, 2) {
        return Ok(Vec::new());
    }
    let (Some(from), Some(to)) = (node(&args[0]), node(&args[1])) else {
        return Err(NOT_NODES);
    };
    let rel_type = match args.len() {
        2 => None,
        3 => match &args[2] {
            Value::Text(rel_type) => Some(rel_type.as_str()),
            _ => return Ok(Vec::new()),
        },
        _ => return Ok(Vec::new()),
    };
    let Some(store) = eval.services().store() else {
        return Ok(Vec::new());
    };

    let candidates = match scope {
        Scope::Outgoing => store.relationships(from, Direction::Outgoing),
        Scope::Incoming => store.relationships(from, Direction::Incoming),
        Scope::Any => {
            let mut all = store.relationships(from, Direction::Outgoing);
            all.extend(store.relationships(from, Direction::Incoming));
            all
        }
    };

    let mut matches: Vec<Relationship> = Vec::new();
    for rel in candidates {
        let linked = match scope {
            Scope::Outgoing => rel.connects(from, to),
            Scope::Incoming => rel.connects(to, from),
            Scope::Any => rel.connects(from, to) || rel.connects(to, from),
        };
        let typed = rel_type.is_none_or(|rel_type| rel.rel_type == rel_type);
        // self-relationships show up in both directions
        if linked && typed && !matches.iter().any(|seen| seen.entity.id == rel.entity.id) {
            matches.push(rel);
        }
    }
    Ok(matches)
}

fn has(args: &[Value], eval: &Evaluator, scope: Scope) -> Output {
    Ok(match between(args, eval, scope) {
        Ok(relationships) => Value::Bool(!relationships.is_empty()),
        Err(message) => Value::text(message),
    }
    .into())
}

fn list(args: &[Value], eval: &Evaluator, scope: Scope) -> Output {
    Ok(match between(args, eval, scope) {
        Ok(relationships) => as_relationships(relationships),
        Err(message) => Value::text(message),
    }
    .into())
}

fn has_relationship(args: &[Value], eval: &Evaluator, _: &mut ActionContext, _: Option<&EntityRef>) -> Output {
    has(args, eval, Scope::Any)
}

fn has_outgoing_relationship(
    args: &[Value],
    eval: &Evaluator,
    _: &mut ActionContext,
    _: Option<&EntityRef>,
) -> Output {
    has(args, eval, Scope::Outgoing)
}

fn has_incoming_relationship(
    args: &[Value],
    eval: &Evaluator,
    _: &mut ActionContext,
    _: Option<&EntityRef>,
) -> Output {
    has(args, eval, Scope::Incoming)
}

fn get_relationships(args: &[Value], eval: &Evaluator, _: &mut ActionContext, _: Option<&EntityRef>) -> Output {
    list(args, eval, Scope::Any)
}

fn get_outgoing_relationships(
    args: &[Value],
    eval: &Evaluator,
    _: &mut ActionContext,
    _: Option<&EntityRef>,
) -> Output {
    list(args, eval, Scope::Outgoing)
}

fn get_incoming_relationships(
    args: &[Value],
    eval: &Evaluator,
    _: &mut ActionContext,
    _: Option<&EntityRef>,
) -> Output {
    list(args, eval, Scope::Incoming)
}

// ============================================================================
// Creation
// ============================================================================

fn create_relationship(args: &[Value], eval: &Evaluator, _: &mut ActionContext, _: Option<&EntityRef>) -> Output {
    if !has_length(args, 3) {
        return Ok(FunctionOutput::empty());
    }
    let (Some(from), Some(to)) = (node(&args[0]), node(&args[1])) else {
        return Ok(Value::text(NOT_NODES).into());
    };
    let rel_type = args[2].to_string();
    let store = eval.services().require_store()?;

    match store.create_relationship(from, to, &rel_type)? {
        Some(_) => Ok(FunctionOutput::empty()),
        None => Ok(Value::text("Error: Unknown relationship type").into()),
    }
}

#[cfg(test)]
mod tests {
    use crate::context::ActionContext;
    use crate::core::{EntityRef, Value};
    use crate::functions::test_support::fixture_engine;
    use crate::services::{Direction, EntityStore};
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn user(id: &str) -> EntityRef {
        EntityRef::node(id, "User")
    }

    #[rstest]
    #[case("has_relationship(this, find('User', 'email', 'bob@example.com')[0])", true)]
    #[case("has_relationship(find('User', 'email', 'bob@example.com')[0], this)", true)]
    #[case("has_relationship(this, find('User', 'email', 'bob@example.com')[0], 'FOLLOWS')", true)]
    #[case("has_relationship(this, find('User', 'email', 'bob@example.com')[0], 'MEMBER')", false)]
    #[case("has_outgoing_relationship(this, find('User', 'email', 'bob@example.com')[0])", true)]
    #[case("has_incoming_relationship(this, find('User', 'email', 'bob@example.com')[0])", false)]
    #[case("has_incoming_relationship(find('User', 'email', 'bob@example.com')[0], this, 'FOLLOWS')", true)]
    fn test_has_relationship(#[case] expression: &str, #[case] expected: bool) {
        let (engine, _) = fixture_engine();
        let mut ctx = ActionContext::new();
        let value = engine.evaluate(expression, &mut ctx, Some(&user("u1"))).unwrap();
        assert_eq!(value, Value::Bool(expected));
    }

    #[test]
    fn test_non_nodes_are_reported() {
        let (engine, _) = fixture_engine();
        let mut ctx = ActionContext::new();
        let value = engine
            .evaluate("has_relationship(this, 'u2')", &mut ctx, Some(&user("u1")))
            .unwrap();
        assert_eq!(value, Value::text("Error: entities are not nodes."));

        let value = engine.evaluate("incoming('u1')", &mut ctx, None).unwrap();
        assert_eq!(value, Value::text("Error: entity is not a node."));
    }

    #[test]
    fn test_incoming_and_outgoing() {
        let (engine, store) = fixture_engine();
        let mut ctx = ActionContext::new();
        let alice = user("u1");

        let outgoing = engine.evaluate("outgoing(this)", &mut ctx, Some(&alice)).unwrap();
        assert_eq!(outgoing.as_list().map(<[Value]>::len), Some(1));
        let outgoing = engine
            .evaluate("outgoing(this, 'MEMBER')", &mut ctx, Some(&alice))
            .unwrap();
        assert_eq!(outgoing, Value::List(Vec::new()));

        let incoming = engine.evaluate("incoming(this)", &mut ctx, Some(&alice)).unwrap();
        assert_eq!(incoming, Value::List(Vec::new()));

        let rel = &store.relationships(&alice, Direction::Outgoing)[0];
        let source = engine
            .evaluate("get(outgoing(this)[0], 'targetId')", &mut ctx, Some(&alice))
            .unwrap();
        assert_eq!(source, Value::text(&rel.target.id));
    }

    #[test]
    fn test_get_relationships_respects_direction() {
        let (engine, _) = fixture_engine();
        let mut ctx = ActionContext::new();
        let alice = user("u1");
        let count = |engine: &crate::ExpressionEngine, ctx: &mut ActionContext, expression: &str| {
            engine
                .evaluate(expression, ctx, Some(&alice))
                .unwrap()
                .as_list()
                .map_or(0, <[Value]>::len)
        };

        let bob = "find('User', 'email', 'bob@example.com')[0]";
        assert_eq!(count(&engine, &mut ctx, &format!("get_relationships({bob}, this)")), 1);
        assert_eq!(count(&engine, &mut ctx, &format!("get_outgoing_relationships(this, {bob})")), 1);
        assert_eq!(count(&engine, &mut ctx, &format!("get_outgoing_relationships({bob}, this)")), 0);
        assert_eq!(count(&engine, &mut ctx, &format!("get_incoming_relationships({bob}, this, 'FOLLOWS')")), 1);
    }

    #[test]
    fn test_create_relationship() {
        let (engine, store) = fixture_engine();
        let mut ctx = ActionContext::new();
        let bob = user("u2");

        let value = engine
            .evaluate(
                "create_relationship(this, find('User', 'email', 'alice@example.com')[0], 'FOLLOWS')",
                &mut ctx,
                Some(&bob),
            )
            .unwrap();
        assert_eq!(value, Value::text(""));
        assert_eq!(store.relationship_count(), 2);

        let value = engine
            .evaluate(
                "create_relationship(this, find('User', 'email', 'alice@example.com')[0], 'MEMBER')",
                &mut ctx,
                Some(&bob),
            )
            .unwrap();
        assert_eq!(value, Value::text("Error: Unknown relationship type"));
        assert_eq!(store.relationship_count(), 2);
    }
}
