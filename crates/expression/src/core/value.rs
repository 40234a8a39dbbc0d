//! Dynamic values flowing through expression evaluation

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::xml::XmlDocument;

/// Sentinel produced by the `null` literal, distinguishable from a missing value
pub const NULL_STRING: &str = "___NULL___";

/// Canonical date pattern (`yyyy-MM-dd'T'HH:mm:ssZ`)
pub const DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%z";

/// Whether an entity is a node or a relationship in the graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    #[default]
    Node,
    Relationship,
}

/// Reference to a graph object; properties live in the entity store
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    pub id: String,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub kind: EntityKind,
}

impl EntityRef {
    /// Reference to a node
    pub fn node(id: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            type_name: type_name.into(),
            kind: EntityKind::Node,
        }
    }

    /// Reference to a relationship
    pub fn relationship(id: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            type_name: type_name.into(),
            kind: EntityKind::Relationship,
        }
    }

    pub fn is_node(&self) -> bool {
        self.kind == EntityKind::Node
    }

    /// Users and groups can be granted permissions
    pub fn is_principal(&self) -> bool {
        matches!(self.type_name.as_str(), "Principal" | "User" | "Group")
    }
}

/// Dynamically typed value
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Integer(i64),
    Number(f64),
    Text(String),
    Date(DateTime<Utc>),
    Entity(EntityRef),
    List(Vec<Value>),
    Map(IndexMap<String, Value>),
    Xml(Arc<XmlDocument>),
}

impl Value {
    /// Create a text value
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    /// The empty string, the usual "nothing to show" result of a builtin
    pub fn empty() -> Self {
        Self::Text(String::new())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Null or the `null` literal sentinel
    pub fn is_null_like(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Text(s) => s == NULL_STRING,
            _ => false,
        }
    }

    pub fn is_number(&self) -> bool {
        matches!(self, Self::Integer(_) | Self::Number(_))
    }

    pub fn is_list(&self) -> bool {
        matches!(self, Self::List(_))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_entity(&self) -> Option<&EntityRef> {
        match self {
            Self::Entity(entity) => Some(entity),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&IndexMap<String, Value>> {
        match self {
            Self::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Numeric value of `Integer` and `Number`
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Integer(i) => Some(*i as f64),
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Truthiness used by `if`, `and`, `or`, `not` and `filter`
    pub fn is_true(&self) -> bool {
        match self {
            Self::Bool(b) => *b,
            Self::Text(s) => s == "true",
            _ => false,
        }
    }

    /// Name of the runtime type, as reported in error messages
    pub fn type_name(&self) -> &str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "Boolean",
            Self::Integer(_) => "Integer",
            Self::Number(_) => "Double",
            Self::Text(_) => "String",
            Self::Date(_) => "Date",
            Self::Entity(entity) => &entity.type_name,
            Self::List(_) => "List",
            Self::Map(_) => "Map",
            Self::Xml(_) => "Document",
        }
    }

    /// Lenient numeric view: dates become epoch millis, text is parsed as an
    /// ISO date first and as a number second
    pub fn to_double_or_null(&self) -> Option<f64> {
        match self {
            Self::Null => None,
            Self::Date(date) => Some(date.timestamp_millis() as f64),
            Self::Integer(_) | Self::Number(_) => self.as_f64(),
            other => {
                let text = other.to_string();
                if let Some(date) = parse_iso_date(&text) {
                    return Some(date.timestamp_millis() as f64);
                }
                parse_double(&text).ok()
            }
        }
    }

    /// Text a template shows for this value; null renders as nothing
    pub fn render(&self) -> String {
        if self.is_null_like() {
            String::new()
        } else {
            self.to_string()
        }
    }

    /// Convert a JSON document into a value
    pub fn from_json(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Self::Integer(i),
                None => Self::Number(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Self::Text(s),
            serde_json::Value::Array(items) => {
                Self::List(items.into_iter().map(Self::from_json).collect())
            }
            serde_json::Value::Object(map) => Self::Map(
                map.into_iter()
                    .map(|(k, v)| (k, Self::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Convert into a JSON document
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as Json;
        match self {
            Self::Null => Json::Null,
            Self::Bool(b) => Json::Bool(*b),
            Self::Integer(i) => Json::from(*i),
            Self::Number(n) => serde_json::Number::from_f64(*n)
                .map(Json::Number)
                .unwrap_or(Json::Null),
            Self::Text(s) => Json::String(s.clone()),
            Self::Date(_) | Self::Xml(_) => Json::String(self.to_string()),
            Self::Entity(entity) => serde_json::json!({
                "id": entity.id,
                "type": entity.type_name,
            }),
            Self::List(items) => Json::Array(items.iter().map(Self::to_json).collect()),
            Self::Map(map) => Json::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Number(n) => f.write_str(&format_double(*n)),
            Self::Text(s) => f.write_str(s),
            Self::Date(date) => write!(f, "{}", date.format(DATE_FORMAT)),
            Self::Entity(entity) => f.write_str(&entity.id),
            Self::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Self::Map(map) => {
                f.write_str("{")?;
                for (i, (key, value)) in map.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{key}={value}")?;
                }
                f.write_str("}")
            }
            Self::Xml(doc) => write!(f, "[#document: {}]", doc.root_name().unwrap_or("null")),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<EntityRef> for Value {
    fn from(value: EntityRef) -> Self {
        Self::Entity(value)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(value: DateTime<Utc>) -> Self {
        Self::Date(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Self::List(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

// ============================================================================
// Number formatting and parsing
// ============================================================================

/// Format a double the way templates have always shown numbers: at least one
/// fractional digit, scientific notation outside `[1e-3, 1e7)`
pub fn format_double(value: f64) -> String {
    if value.is_nan() {
        return "NaN".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if value == 0.0 {
        return if value.is_sign_negative() { "-0.0" } else { "0.0" }.to_string();
    }

    let magnitude = value.abs();
    if (1e-3..1e7).contains(&magnitude) {
        let plain = format!("{value}");
        if plain.contains('.') {
            plain
        } else {
            format!("{plain}.0")
        }
    } else {
        let scientific = format!("{value:e}");
        match scientific.split_once('e') {
            Some((mantissa, exponent)) if mantissa.contains('.') => {
                format!("{mantissa}E{exponent}")
            }
            Some((mantissa, exponent)) => format!("{mantissa}.0E{exponent}"),
            None => scientific,
        }
    }
}

/// Parse a double with the accepted syntax and error messages of the
/// platform templates were written against
///
/// # Errors
///
/// Returns the parser message, e.g. `For input string: "abc"` or `empty String`.
pub fn parse_double(input: &str) -> Result<f64, String> {
    let trimmed = input.trim_matches(|c: char| c <= ' ');
    if trimmed.is_empty() {
        return Err("empty String".to_string());
    }

    let body = trimmed
        .strip_suffix(['d', 'D', 'f', 'F'])
        .unwrap_or(trimmed);
    let (sign, unsigned) = match body.strip_prefix('-') {
        Some(rest) => (-1.0, rest),
        None => (1.0, body.strip_prefix('+').unwrap_or(body)),
    };

    match unsigned {
        "NaN" => return Ok(f64::NAN),
        "Infinity" => return Ok(sign * f64::INFINITY),
        _ => {}
    }

    let well_formed = unsigned.starts_with(|c: char| c.is_ascii_digit() || c == '.')
        && unsigned
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-'));

    if well_formed {
        if let Ok(parsed) = unsigned.parse::<f64>() {
            return Ok(sign * parsed);
        }
    }

    Err(format!("For input string: \"{trimmed}\""))
}

/// Parse a 32-bit integer, reporting failures like [`parse_double`]
///
/// # Errors
///
/// Returns `For input string: "..."` when the text is not an integer.
pub fn parse_int(input: &str) -> Result<i64, String> {
    input
        .parse::<i32>()
        .map(i64::from)
        .map_err(|_| format!("For input string: \"{input}\""))
}

/// Parse a date in the canonical format, also accepting RFC 3339
pub fn parse_iso_date(input: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_str(input, DATE_FORMAT)
        .or_else(|_| DateTime::parse_from_rfc3339(input))
        .ok()
        .map(|date| date.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case(6.0, "6.0")]
    #[case(2.35, "2.35")]
    #[case(-0.5, "-0.5")]
    #[case(1e7, "1.0E7")]
    #[case(12_345_678.9, "1.23456789E7")]
    #[case(0.0001, "1.0E-4")]
    #[case(0.001, "0.001")]
    fn test_format_double(#[case] value: f64, #[case] expected: &str) {
        assert_eq!(format_double(value), expected);
    }

    #[rstest]
    #[case("1", Ok(1.0))]
    #[case(" 2.5 ", Ok(2.5))]
    #[case("3d", Ok(3.0))]
    #[case("-.5", Ok(-0.5))]
    #[case("1e3", Ok(1000.0))]
    #[case("", Err("empty String".to_string()))]
    #[case("abc", Err("For input string: \"abc\"".to_string()))]
    #[case("inf", Err("For input string: \"inf\"".to_string()))]
    fn test_parse_double(#[case] input: &str, #[case] expected: Result<f64, String>) {
        assert_eq!(parse_double(input), expected);
    }

    #[test]
    fn test_display_collections() {
        let mut map = IndexMap::new();
        map.insert("a".to_string(), Value::Integer(1));
        map.insert("b".to_string(), Value::text("x"));
        assert_eq!(Value::Map(map).to_string(), "{a=1, b=x}");

        let list = Value::List(vec![Value::Number(1.0), Value::Null, Value::text("y")]);
        assert_eq!(list.to_string(), "[1.0, null, y]");
    }

    #[test]
    fn test_display_date() {
        let date = Utc.with_ymd_and_hms(2024, 1, 31, 10, 0, 0).unwrap();
        assert_eq!(Value::Date(date).to_string(), "2024-01-31T10:00:00+0000");
        assert_eq!(parse_iso_date("2024-01-31T10:00:00+0000"), Some(date));
    }

    #[test]
    fn test_render_hides_null() {
        assert_eq!(Value::Null.render(), "");
        assert_eq!(Value::text(NULL_STRING).render(), "");
        assert_eq!(Value::Bool(true).render(), "true");
    }

    #[test]
    fn test_double_or_null() {
        assert_eq!(Value::text("12").to_double_or_null(), Some(12.0));
        assert_eq!(Value::text("twelve").to_double_or_null(), None);
        assert_eq!(
            Value::text("1970-01-01T00:00:01+0000").to_double_or_null(),
            Some(1000.0)
        );
    }

    #[test]
    fn test_json_conversion() {
        let json = serde_json::json!({"name": "a", "n": 2, "x": 1.5, "tags": ["t"]});
        let value = Value::from_json(json.clone());
        assert_eq!(value.to_json(), json);
        assert_eq!(value.to_string(), "{name=a, n=2, x=1.5, tags=[t]}");
    }
}
