//! Property-based checks of the bracket grammar and the comparison builtins

use proptest::prelude::*;
use structr_expression::{ActionContext, ExpressionEngine, ExpressionResult, Value};

fn eval(expression: &str) -> ExpressionResult<Value> {
    ExpressionEngine::new().evaluate(expression, &mut ActionContext::new(), None)
}

fn truth(expression: &str) -> bool {
    eval(expression).unwrap().is_true()
}

fn function_name() -> impl Strategy<Value = &'static str> {
    prop::sample::select(vec!["upper", "lower", "titleize", "concat", "capitalize"])
}

/// Nested calls around a quoted literal, with every bracket closed
fn balanced() -> impl Strategy<Value = String> {
    let leaf = "[a-z]{0,6}".prop_map(|word| format!("'{word}'"));
    leaf.prop_recursive(4, 16, 3, |inner| {
        (function_name(), prop::collection::vec(inner, 1..3))
            .prop_map(|(name, args)| format!("{name}({})", args.join(", ")))
    })
}

proptest! {
    #[test]
    fn balanced_expressions_evaluate(expression in balanced()) {
        prop_assert!(eval(&expression).is_ok());
    }

    #[test]
    fn extra_opening_bracket_fails(expression in balanced(), name in function_name()) {
        let broken = format!("{name}({expression}");
        let err = eval(&broken).unwrap_err();
        prop_assert_eq!(err.status(), 422);
        // Every leaf is quoted, so the last token is the last literal plus the brackets after it
        let close = broken.rfind('\'').unwrap();
        let open = broken[..close].rfind('\'').unwrap();
        let expected = format!(
            "Invalid expression: mismatched closing bracket after {}{}",
            &broken[open + 1..close],
            &broken[close + 1..]
        );
        prop_assert_eq!(err.to_string(), expected);
    }

    #[test]
    fn extra_closing_bracket_fails(expression in balanced(), closing in prop::sample::select(vec![")", "]"])) {
        let broken = format!("{expression}{closing}");
        let err = eval(&broken).unwrap_err();
        prop_assert_eq!(err.status(), 422);
        prop_assert!(err.to_string().contains("mismatched"));
    }

    #[test]
    fn equal_is_symmetric_for_numbers(a in -1000i32..1000, b in -1000i32..1000) {
        prop_assert_eq!(truth(&format!("equal({a}, {b})")), truth(&format!("equal({b}, {a})")));
    }

    #[test]
    fn equal_is_symmetric_for_text(a in "[a-z]{0,5}", b in "[a-z]{0,5}") {
        prop_assert_eq!(truth(&format!("equal('{a}', '{b}')")), truth(&format!("equal('{b}', '{a}')")));
    }

    #[test]
    fn equal_is_symmetric_for_booleans(a: bool, b: bool) {
        prop_assert_eq!(truth(&format!("equal({a}, {b})")), truth(&format!("equal({b}, {a})")));
        prop_assert_eq!(truth(&format!("equal({a}, {b})")), a == b);
    }

    #[test]
    fn gt_mirrors_lt_for_numbers(a in -1000i32..1000, b in -1000i32..1000) {
        prop_assert_eq!(truth(&format!("gt({a}, {b})")), truth(&format!("lt({b}, {a})")));
    }

    #[test]
    fn gt_mirrors_lt_for_text(a in "[a-z]{1,5}", b in "[a-z]{1,5}") {
        prop_assert_eq!(truth(&format!("gt('{a}', '{b}')")), truth(&format!("lt('{b}', '{a}')")));
    }
}

#[test]
fn null_comparisons_are_asymmetric() {
    assert!(truth("gt(5, null)"));
    assert!(truth("lt(null, 5)"));
    assert!(!truth("gt(null, 5)"));
    assert!(!truth("lt(5, null)"));
}
