//! Cross-type comparison used by `lt`, `gt`, `lte`, `gte` and `equal`
//!
//! Operands are compared pairwise by runtime type in a fixed order:
//! number/number, text/text, date/date, date/text, text/date, bool/text,
//! text/bool, number/text, text/number, and finally the text form of both.
//! `None` stands for a missing argument.

use std::cmp::Ordering;

use super::value::{DATE_FORMAT, Value, parse_double};

/// Ordering of two present values; unparseable numbers sort as negative infinity
fn compare(left: &Value, right: &Value) -> Ordering {
    match (left, right) {
        (l, r) if l.is_number() && r.is_number() => {
            number_for_comparison(l).total_cmp(&number_for_comparison(r))
        }
        (Value::Text(l), Value::Text(r)) => l.cmp(r),
        (Value::Date(l), Value::Date(r)) => l.cmp(r),
        (Value::Date(l), Value::Text(r)) => l.format(DATE_FORMAT).to_string().cmp(r),
        (Value::Text(l), Value::Date(r)) => l.cmp(&r.format(DATE_FORMAT).to_string()),
        (Value::Bool(l), Value::Text(r)) => l.cmp(&parse_bool(r)),
        (Value::Text(l), Value::Bool(r)) => parse_bool(l).cmp(r),
        (l, Value::Text(r)) if l.is_number() => {
            number_for_comparison(l).total_cmp(&parse_double(r).unwrap_or(f64::NEG_INFINITY))
        }
        (Value::Text(l), r) if r.is_number() => parse_double(l)
            .unwrap_or(f64::NEG_INFINITY)
            .total_cmp(&number_for_comparison(r)),
        (l, r) => l.to_string().cmp(&r.to_string()),
    }
}

fn number_for_comparison(value: &Value) -> f64 {
    value.as_f64().unwrap_or(0.0)
}

fn parse_bool(text: &str) -> bool {
    text.eq_ignore_ascii_case("true")
}

/// `left > right`; any present value is greater than a missing one
pub fn gt(left: Option<&Value>, right: Option<&Value>) -> bool {
    match (present(left), present(right)) {
        (Some(_), None) => true,
        (None, _) => false,
        (Some(l), Some(r)) => compare(l, r) == Ordering::Greater,
    }
}

/// `left < right`; a missing value is less than any present one
pub fn lt(left: Option<&Value>, right: Option<&Value>) -> bool {
    match (present(left), present(right)) {
        (None, Some(_)) => true,
        (_, None) => false,
        (Some(l), Some(r)) => compare(l, r) == Ordering::Less,
    }
}

/// Equality; two missing values are equal
pub fn eq(left: Option<&Value>, right: Option<&Value>) -> bool {
    match (present(left), present(right)) {
        (None, None) => true,
        (None, Some(_)) | (Some(_), None) => false,
        (Some(l), Some(r)) => compare(l, r) == Ordering::Equal,
    }
}

/// Total order used by `sort`; missing values sort first
pub fn sort_order(left: Option<&Value>, right: Option<&Value>) -> Ordering {
    match (present(left), present(right)) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(l), Some(r)) => compare(l, r),
    }
}

pub fn gte(left: Option<&Value>, right: Option<&Value>) -> bool {
    eq(left, right) || gt(left, right)
}

pub fn lte(left: Option<&Value>, right: Option<&Value>) -> bool {
    eq(left, right) || lt(left, right)
}

fn present(value: Option<&Value>) -> Option<&Value> {
    value.filter(|v| !v.is_null())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use rstest::rstest;

    fn num(n: f64) -> Value {
        Value::Number(n)
    }

    fn text(s: &str) -> Value {
        Value::text(s)
    }

    #[test]
    fn test_null_asymmetry() {
        let five = num(5.0);
        assert!(gt(Some(&five), None));
        assert!(lt(None, Some(&five)));
        assert!(!gt(None, Some(&five)));
        assert!(!lt(Some(&five), None));
        assert!(!gt(None, None));
        assert!(!lt(None, None));
        assert!(eq(None, None));
    }

    #[rstest]
    #[case(num(2.0), num(10.0))]
    #[case(text("a"), text("b"))]
    #[case(Value::Integer(3), num(3.5))]
    #[case(num(2.0), text("10"))]
    #[case(text("abc"), num(1.0))]
    #[case(Value::Bool(false), text("TRUE"))]
    fn test_ordered_pairs(#[case] smaller: Value, #[case] larger: Value) {
        assert!(lt(Some(&smaller), Some(&larger)));
        assert!(gt(Some(&larger), Some(&smaller)));
        assert!(!eq(Some(&smaller), Some(&larger)));
        assert!(lte(Some(&smaller), Some(&larger)));
        assert!(gte(Some(&larger), Some(&smaller)));
    }

    #[test]
    fn test_number_text_equality() {
        assert!(eq(Some(&num(5.0)), Some(&text("5"))));
        assert!(eq(Some(&text("5.0")), Some(&Value::Integer(5))));
        assert!(!eq(Some(&num(5.0)), Some(&text("five"))));
    }

    #[test]
    fn test_date_text() {
        let date = Value::Date(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        let same = text("2024-01-01T00:00:00+0000");
        assert!(eq(Some(&date), Some(&same)));
        assert!(lt(Some(&date), Some(&text("2025"))));
    }

    #[test]
    fn test_fallback_uses_text_form() {
        let list = Value::List(vec![num(1.0)]);
        assert!(eq(Some(&list), Some(&Value::List(vec![num(1.0)]))));
        assert!(lt(Some(&Value::Bool(false)), Some(&Value::Bool(true))));
    }
}
