//! Collection functions

use super::{Builtin, FunctionOutput, has_length, has_min_length};
use crate::context::ActionContext;
use crate::core::{EntityRef, NULL_STRING, Value, compare, parse_double};
use crate::error::ExpressionResult;
use crate::eval::Evaluator;

type Output = ExpressionResult<FunctionOutput>;

pub(super) const BUILTINS: &[Builtin] = &[
    Builtin {
        name: "is_collection",
        apply: is_collection,
        usage: "Usage: ${is_collection(value)}. Example: ${is_collection(this)}",
        usage_script: None,
        description: "Returns true if the given argument is a collection",
    },
    Builtin {
        name: "is_entity",
        apply: is_entity,
        usage: "Usage: ${is_entity(value)}. Example: ${is_entity(this)}",
        usage_script: None,
        description: "Returns true if the given argument is a Structr entity",
    },
    Builtin {
        name: "extract",
        apply: extract,
        usage: "Usage: ${extract(list, propertyName)}. Example: ${extract(this.children, \"amount\")}",
        usage_script: None,
        description: "Returns a collection of all the elements with a given name from a collection",
    },
    Builtin {
        name: "merge",
        apply: merge,
        usage: "Usage: ${merge(list1, list2, list3, ...)}. Example: ${merge(this.children, this.siblings)}",
        usage_script: None,
        description: "Merges the given collections / objects into a single collection",
    },
    Builtin {
        name: "complement",
        apply: complement,
        usage: "Usage: ${complement(list1, list2, list3, ...)}. (The resulting list contains no duplicates) Example: ${complement(allUsers, me)} => List of all users except myself",
        usage_script: None,
        description: "Removes the elements of the other arguments from the first collection",
    },
    Builtin {
        name: "unwind",
        apply: unwind,
        usage: "Usage: ${unwind(list1, ...)}. Example: ${unwind(this.children)}",
        usage_script: None,
        description: "Flattens the given collections by one level",
    },
    Builtin {
        name: "sort",
        apply: sort,
        usage: "Usage: ${sort(list1, key [, true])}. Example: ${sort(this.children, \"name\")}",
        usage_script: None,
        description: "Sorts the given collection according to the given property key",
    },
    Builtin {
        name: "size",
        apply: size,
        usage: "Usage: ${size(collection)}. Example: ${size(this.children)}",
        usage_script: None,
        description: "Returns the size of the given collection",
    },
    Builtin {
        name: "first",
        apply: first,
        usage: "Usage: ${first(collection)}. Example: ${first(this.children)}",
        usage_script: None,
        description: "Returns the first element of the given collection",
    },
    Builtin {
        name: "last",
        apply: last,
        usage: "Usage: ${last(collection)}. Example: ${last(this.children)}",
        usage_script: None,
        description: "Returns the last element of the given collection",
    },
    Builtin {
        name: "nth",
        apply: nth,
        usage: "Usage: ${nth(collection)}. Example: ${nth(this.children, 2)}",
        usage_script: None,
        description: "Returns the element with the given index of the given collection",
    },
];

fn value(value: Value) -> Output {
    Ok(value.into())
}

fn is_collection(args: &[Value], _: &Evaluator, _: &mut ActionContext, _: Option<&EntityRef>) -> Output {
    value(Value::Bool(has_length(args, 1) && args[0].is_list()))
}

fn is_entity(args: &[Value], _: &Evaluator, _: &mut ActionContext, _: Option<&EntityRef>) -> Output {
    value(Value::Bool(has_length(args, 1) && args[0].as_entity().is_some()))
}

fn extract(args: &[Value], eval: &Evaluator, _: &mut ActionContext, _: Option<&EntityRef>) -> Output {
    if has_length(args, 1) {
        // without a key, flatten a list of lists
        if let Value::List(items) = &args[0] {
            let extraction = items
                .iter()
                .filter_map(Value::as_list)
                .flatten()
                .cloned()
                .collect();
            return value(Value::List(extraction));
        }
    } else if has_length(args, 2) {
        if let (Value::List(items), Value::Text(key)) = (&args[0], &args[1]) {
            let extraction = items
                .iter()
                .filter_map(Value::as_entity)
                .filter_map(|entity| eval.property(entity, key))
                .filter(|v| !v.is_null())
                .collect();
            return value(Value::List(extraction));
        }
    }
    value(Value::Null)
}

fn merge(args: &[Value], _: &Evaluator, _: &mut ActionContext, _: Option<&EntityRef>) -> Output {
    let mut list = Vec::new();
    for arg in args {
        match arg {
            Value::List(items) => list.extend(items.iter().filter(|v| !v.is_null()).cloned()),
            Value::Null => {}
            other => list.push(other.clone()),
        }
    }
    value(Value::List(list))
}

fn complement(args: &[Value], _: &Evaluator, _: &mut ActionContext, _: Option<&EntityRef>) -> Output {
    let Some(Value::List(source)) = args.first() else {
        return value(Value::text("Argument 1 for complement must be a Collection"));
    };

    let mut result: Vec<Value> = Vec::with_capacity(source.len());
    for item in source {
        if !result.contains(item) {
            result.push(item.clone());
        }
    }

    for remove in &args[1..] {
        match remove {
            Value::List(items) => result.retain(|v| !items.contains(v)),
            Value::Null => {}
            other => result.retain(|v| v != other),
        }
    }
    value(Value::List(result))
}

fn unwind(args: &[Value], _: &Evaluator, _: &mut ActionContext, _: Option<&EntityRef>) -> Output {
    let mut list = Vec::new();
    for arg in args {
        match arg {
            Value::List(items) => {
                for item in items {
                    match item {
                        Value::List(inner) => {
                            list.extend(inner.iter().filter(|v| !v.is_null()).cloned());
                        }
                        Value::Null => {}
                        other => list.push(other.clone()),
                    }
                }
            }
            Value::Null => {}
            other => list.push(other.clone()),
        }
    }
    value(Value::List(list))
}

fn sort(args: &[Value], eval: &Evaluator, _: &mut ActionContext, _: Option<&EntityRef>) -> Output {
    let unchanged = args.first().cloned().unwrap_or_default();
    if !has_min_length(args, 2) {
        return value(unchanged);
    }

    let (Value::List(items), Value::Text(key)) = (&args[0], &args[1]) else {
        return value(unchanged);
    };
    let Some(first) = items.first().and_then(Value::as_entity) else {
        return value(unchanged);
    };
    let known_key = eval
        .services()
        .store()
        .is_some_and(|store| store.property_info(&first.type_name, key).is_some());
    if !known_key {
        return value(unchanged);
    }

    let descending = args.len() == 3 && args[2].to_string() == "true";

    let mut keyed: Vec<(Option<Value>, Value)> = items
        .iter()
        .map(|item| {
            let sort_value = item.as_entity().and_then(|entity| eval.property(entity, key));
            (sort_value, item.clone())
        })
        .collect();
    keyed.sort_by(|(a, _), (b, _)| {
        let order = compare::sort_order(a.as_ref(), b.as_ref());
        if descending { order.reverse() } else { order }
    });

    value(Value::List(keyed.into_iter().map(|(_, item)| item).collect()))
}

fn is_null_string(value: &Value) -> bool {
    value.as_str() == Some(NULL_STRING)
}

fn size(args: &[Value], _: &Evaluator, _: &mut ActionContext, _: Option<&EntityRef>) -> Output {
    let count = match args.iter().find(|arg| !arg.is_null()) {
        Some(Value::List(items)) => items
            .iter()
            .filter(|item| !item.is_null() && !is_null_string(item))
            .count(),
        Some(other) if is_null_string(other) => 0,
        Some(_) => 1,
        None => 0,
    };
    value(Value::Integer(count as i64))
}

fn first(args: &[Value], _: &Evaluator, _: &mut ActionContext, _: Option<&EntityRef>) -> Output {
    let element = match args {
        [Value::List(items)] => items.first().cloned(),
        _ => None,
    };
    value(element.unwrap_or_default())
}

fn last(args: &[Value], _: &Evaluator, _: &mut ActionContext, _: Option<&EntityRef>) -> Output {
    let element = match args {
        [Value::List(items)] => items.last().cloned(),
        _ => None,
    };
    value(element.unwrap_or_default())
}

fn nth(args: &[Value], _: &Evaluator, _: &mut ActionContext, _: Option<&EntityRef>) -> Output {
    if !has_length(args, 2) {
        return value(Value::Null);
    }
    let Ok(position) = parse_double(&args[1].to_string()) else {
        return value(Value::Null);
    };
    let position = position as i64;

    let element = match &args[0] {
        Value::List(items) if (position as usize) < items.len() || position < 0 => {
            items.get(position.max(0) as usize).cloned()
        }
        _ => None,
    };
    value(element.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::engine::ExpressionEngine;
    use crate::functions::test_support::eval;
    use crate::services::{MemoryStore, Services};
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case("size(merge(1, 2, 3))", "3")]
    #[case("size(merge(1, null))", "1")]
    #[case("size(null)", "0")]
    #[case(r#"size("x")"#, "1")]
    #[case("size()", "0")]
    #[case("first(merge(1, 2))", "1.0")]
    #[case("last(merge(1, 2))", "2.0")]
    #[case("nth(merge(1, 2, 3), 1)", "2.0")]
    #[case("nth(merge(1, 2, 3), 5)", "null")]
    #[case("nth(merge(1, 2, 3), -1)", "1.0")]
    #[case("merge(merge(1, 2), 3)", "[1.0, 2.0, 3.0]")]
    #[case("unwind(merge(1, 2), 3)", "[1.0, 2.0, 3.0]")]
    #[case("complement(merge(1, 2, 2, 3), 2)", "[1.0, 3.0]")]
    #[case("complement(merge(1, 2, 3), merge(1, 3))", "[2.0]")]
    #[case("complement(1, 2)", "Argument 1 for complement must be a Collection")]
    #[case("is_collection(merge(1))", "true")]
    #[case("is_collection(1)", "false")]
    #[case("is_entity(1)", "false")]
    fn test_collections(#[case] expression: &str, #[case] expected: &str) {
        assert_eq!(eval(expression).to_string(), expected);
    }

    fn people() -> (ExpressionEngine, Vec<EntityRef>) {
        let store = MemoryStore::new();
        let people = ["Carol", "alice", "Bob"]
            .into_iter()
            .enumerate()
            .map(|(i, name)| {
                let mut props = indexmap::IndexMap::new();
                props.insert("name".to_string(), Value::text(name));
                props.insert("age".to_string(), Value::Integer(30 + i as i64));
                store.insert(None, "Person", props)
            })
            .collect();
        let services = Services::builder().store(Arc::new(store)).build();
        (ExpressionEngine::builder().services(services).build(), people)
    }

    fn names(value: &Value, engine: &ExpressionEngine) -> Vec<String> {
        value
            .as_list()
            .unwrap()
            .iter()
            .map(|v| {
                engine
                    .evaluator()
                    .property(v.as_entity().unwrap(), "name")
                    .unwrap()
                    .to_string()
            })
            .collect()
    }

    #[test]
    fn test_sort_by_property() {
        let (engine, people) = people();
        let mut ctx = ActionContext::builder()
            .store("people", Value::List(people.into_iter().map(Value::Entity).collect()))
            .build();

        let descending = engine.evaluate(r#"sort(people, "age", true)"#, &mut ctx, None).unwrap();
        assert_eq!(names(&descending, &engine), vec!["Bob", "alice", "Carol"]);

        let by_name = engine.evaluate(r#"sort(people, "name")"#, &mut ctx, None).unwrap();
        assert_eq!(names(&by_name, &engine), vec!["Bob", "Carol", "alice"]);
    }

    #[test]
    fn test_sort_leaves_unknown_keys_alone() {
        let (engine, people) = people();
        let list = Value::List(people.into_iter().map(Value::Entity).collect());
        let mut ctx = ActionContext::builder().store("people", list.clone()).build();

        let result = engine.evaluate(r#"sort(people, "missing")"#, &mut ctx, None).unwrap();
        assert_eq!(result, list);
        assert_eq!(
            engine.evaluate(r#"sort(merge(), "name")"#, &mut ctx, None).unwrap(),
            Value::List(Vec::new())
        );
    }

    #[test]
    fn test_extract_property() {
        let (engine, people) = people();
        let mut ctx = ActionContext::builder()
            .store("people", Value::List(people.into_iter().map(Value::Entity).collect()))
            .build();

        let ages = engine.evaluate(r#"extract(people, "age")"#, &mut ctx, None).unwrap();
        assert_eq!(ages.to_string(), "[30, 31, 32]");
        assert_eq!(
            engine
                .evaluate("extract(merge(merge(1), merge(2)))", &mut ctx, None)
                .unwrap()
                .to_string(),
            "[]"
        );
    }
}
