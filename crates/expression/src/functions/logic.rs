//! Logic and comparison functions

use structr_log::trace;

use super::{Builtin, FunctionOutput, has_min_length};
use crate::context::ActionContext;
use crate::core::{EntityRef, Value, compare};
use crate::error::ExpressionResult;
use crate::eval::Evaluator;

type Output = ExpressionResult<FunctionOutput>;

pub(super) const BUILTINS: &[Builtin] = &[
    Builtin {
        name: "if",
        apply: if_fn,
        usage: "Usage: ${if(condition, trueValue, falseValue)}. Example: ${if(empty(this.name), this.nickName, this.name)}",
        usage_script: None,
        description: "Conditional expression",
    },
    Builtin {
        name: "empty",
        apply: empty,
        usage: "Usage: ${empty(string)}. Example: ${if(empty(possibleEmptyString), \"empty\", \"non-empty\")}",
        usage_script: None,
        description: "Returns true if the given string or collection is null or empty",
    },
    Builtin {
        name: "equal",
        apply: equal,
        usage: "Usage: ${equal(value1, value2)}. Example: ${equal(this.children.size, 0)}",
        usage_script: None,
        description: "Returns true if the given arguments are equal",
    },
    Builtin {
        name: "eq",
        apply: equal,
        usage: "Usage: ${equal(value1, value2)}. Example: ${equal(this.children.size, 0)}",
        usage_script: None,
        description: "Returns true if the given arguments are equal",
    },
    Builtin {
        name: "lt",
        apply: lt,
        usage: "Usage: ${lt(value1, value2)}. Example: ${if(lt(this.children, 2), \"Less than two\", \"Equal to or more than two\")}",
        usage_script: None,
        description: "Returns true if the first argument is less than the second argument",
    },
    Builtin {
        name: "gt",
        apply: gt,
        usage: "Usage: ${gt(value1, value2)}. Example: ${if(gt(this.children, 2), \"More than two\", \"Equal to or less than two\")}",
        usage_script: None,
        description: "Returns true if the first argument is greater than the second argument",
    },
    Builtin {
        name: "lte",
        apply: lte,
        usage: "Usage: ${lte(value1, value2)}. Example: ${if(lte(this.children, 2), \"Equal to or less than two\", \"More than two\")}",
        usage_script: None,
        description: "Returns true if the first argument is less or equal to the second argument",
    },
    Builtin {
        name: "gte",
        apply: gte,
        usage: "Usage: ${gte(value1, value2)}. Example: ${if(gte(this.children, 2), \"Equal to or more than two\", \"Less than two\")}",
        usage_script: None,
        description: "Returns true if the first argument is greater or equal to the second argument",
    },
    Builtin {
        name: "not",
        apply: not,
        usage: "Usage: ${not(bool1, bool2)}. Example: ${not(\"true\", \"true\")}",
        usage_script: None,
        description: "Negates the given arguments",
    },
    Builtin {
        name: "and",
        apply: and,
        usage: "Usage: ${and(bool1, bool2)}. Example: ${and(\"true\", \"true\")}",
        usage_script: None,
        description: "Returns the conjunction of the given arguments",
    },
    Builtin {
        name: "or",
        apply: or,
        usage: "Usage: ${or(bool1, bool2)}. Example: ${or(\"true\", \"true\")}",
        usage_script: None,
        description: "Returns the disjunction of the given arguments",
    },
];

fn boolean(value: bool) -> Output {
    Ok(Value::Bool(value).into())
}

/// Eager form of the `if` special form, used when called through the registry
fn if_fn(args: &[Value], _: &Evaluator, _: &mut ActionContext, _: Option<&EntityRef>) -> Output {
    if args.len() < 3 || args[0].is_null() {
        return Ok(FunctionOutput::empty());
    }
    let branch = if args[0].is_true() { &args[1] } else { &args[2] };
    Ok(branch.clone().into())
}

fn empty(args: &[Value], _: &Evaluator, _: &mut ActionContext, _: Option<&EntityRef>) -> Output {
    let empty = match args.first() {
        None | Some(Value::Null) => true,
        Some(value) => value.to_string().is_empty(),
    };
    boolean(empty)
}

fn equal(args: &[Value], _: &Evaluator, _: &mut ActionContext, _: Option<&EntityRef>) -> Output {
    if args.len() != 2 {
        return Ok(FunctionOutput::Usage);
    }
    trace!(left = %args[0], right = %args[1], "Comparing");
    boolean(compare::eq(Some(&args[0]), Some(&args[1])))
}

fn lt(args: &[Value], _: &Evaluator, _: &mut ActionContext, _: Option<&EntityRef>) -> Output {
    boolean(compare::lt(args.first(), args.get(1)))
}

fn gt(args: &[Value], _: &Evaluator, _: &mut ActionContext, _: Option<&EntityRef>) -> Output {
    boolean(compare::gt(args.first(), args.get(1)))
}

fn lte(args: &[Value], _: &Evaluator, _: &mut ActionContext, _: Option<&EntityRef>) -> Output {
    boolean(compare::lte(args.first(), args.get(1)))
}

fn gte(args: &[Value], _: &Evaluator, _: &mut ActionContext, _: Option<&EntityRef>) -> Output {
    boolean(compare::gte(args.first(), args.get(1)))
}

fn not(args: &[Value], _: &Evaluator, _: &mut ActionContext, _: Option<&EntityRef>) -> Output {
    if has_min_length(args, 1) {
        return boolean(!args[0].is_true());
    }
    boolean(true)
}

fn and(args: &[Value], _: &Evaluator, _: &mut ActionContext, _: Option<&EntityRef>) -> Output {
    if args.len() < 2 {
        return Ok(FunctionOutput::Usage);
    }
    // null is false
    boolean(args.iter().all(Value::is_true))
}

fn or(args: &[Value], _: &Evaluator, _: &mut ActionContext, _: Option<&EntityRef>) -> Output {
    if args.len() < 2 {
        return Ok(FunctionOutput::Usage);
    }
    boolean(args.iter().any(Value::is_true))
}

#[cfg(test)]
mod tests {
    use crate::core::Value;
    use crate::functions::test_support::eval;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case("equal(1, 1)", true)]
    #[case("equal(1, 1.0)", true)]
    #[case(r#"equal("a", "b")"#, false)]
    #[case(r#"equal(5, "5")"#, true)]
    #[case(r#"eq(true, "true")"#, true)]
    #[case("gt(5, 3)", true)]
    #[case(r#"gt("b", "a")"#, true)]
    #[case("lt(3, 5)", true)]
    #[case("lte(5, 5)", true)]
    #[case("gte(4, 5)", false)]
    #[case(r#"not("true")"#, false)]
    #[case("not(false)", true)]
    #[case("not()", true)]
    #[case(r#"and(true, "true")"#, true)]
    #[case("and(true, false)", false)]
    #[case("or(false, true)", true)]
    #[case("or(false, false)", false)]
    #[case(r#"empty("")"#, true)]
    #[case("empty()", true)]
    #[case(r#"empty("x")"#, false)]
    fn test_logic(#[case] expression: &str, #[case] expected: bool) {
        assert_eq!(eval(expression), Value::Bool(expected));
    }

    #[test]
    fn test_equal_requires_two_arguments() {
        assert_eq!(
            eval("equal(1)").to_string(),
            "Usage: ${equal(value1, value2)}. Example: ${equal(this.children.size, 0)}"
        );
    }

    #[test]
    fn test_and_or_require_two_arguments() {
        assert!(eval("and(true)").to_string().starts_with("Usage: ${and("));
        assert!(eval("or(true)").to_string().starts_with("Usage: ${or("));
    }

    #[test]
    fn test_comparison_with_missing_operand() {
        assert_eq!(eval("gt(5)"), Value::Bool(true));
        assert_eq!(eval("lt(5)"), Value::Bool(false));
    }
}
