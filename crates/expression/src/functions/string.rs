//! String functions

use md5::{Digest, Md5};

use structr_log::{debug, warn};
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

use super::{Builtin, FunctionOutput, has_length, has_min_length, int_arg};
use crate::context::ActionContext;
use crate::core::{EntityRef, Value, parse_double};
use crate::error::ExpressionResult;
use crate::eval::Evaluator;

type Output = ExpressionResult<FunctionOutput>;

const ALPHANUMERIC: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

pub(super) const BUILTINS: &[Builtin] = &[
    Builtin {
        name: "md5",
        apply: md5_hex,
        usage: "Usage: ${md5(string)}. Example: ${md5(this.email)}",
        usage_script: None,
        description: "Returns the MD5 hash of its parameter",
    },
    Builtin {
        name: "upper",
        apply: upper,
        usage: "Usage: ${upper(string)}. Example: ${upper(this.nickName)}",
        usage_script: None,
        description: "Returns the uppercase value of its parameter",
    },
    Builtin {
        name: "lower",
        apply: lower,
        usage: "Usage: ${lower(string)}. Example: ${lower(this.email)}",
        usage_script: None,
        description: "Returns the lowercase value of its parameter",
    },
    Builtin {
        name: "join",
        apply: join,
        usage: "Usage: ${join(collection, separator)}. Example: ${join(this.names, \",\")}",
        usage_script: None,
        description: "Joins all its parameters to a single string",
    },
    Builtin {
        name: "concat",
        apply: concat,
        usage: "Usage: ${concat(values...)}. Example: ${concat(this.firstName, this.lastName)}",
        usage_script: None,
        description: "Concatenates all its parameters to a single string",
    },
    Builtin {
        name: "split",
        apply: split,
        usage: "Usage: ${split(value)}. Example: ${split(this.commaSeparatedItems)}",
        usage_script: None,
        description: "Splits the given string",
    },
    Builtin {
        name: "abbr",
        apply: abbr,
        usage: "Usage: ${abbr(longString, maxLength)}. Example: ${abbr(this.title, 20)}",
        usage_script: None,
        description: "Abbreviates the given string",
    },
    Builtin {
        name: "capitalize",
        apply: capitalize,
        usage: "Usage: ${capitalize(string)}. Example: ${capitalize(this.nickName)}",
        usage_script: None,
        description: "Capitalizes the given string",
    },
    Builtin {
        name: "titleize",
        apply: titleize,
        usage: "Usage: ${titleize(string, separator}. (Default separator is \" \") Example: ${titleize(this.lowerCamelCaseString, \"_\")}",
        usage_script: None,
        description: "Titleizes the given string",
    },
    Builtin {
        name: "num",
        apply: num,
        usage: "Usage: ${num(string)}. Example: ${num(this.numericalStringValue)}",
        usage_script: None,
        description: "Converts the given string to a floating-point number",
    },
    Builtin {
        name: "int",
        apply: int,
        usage: "Usage: ${int(string)}. Example: ${int(this.numericalStringValue)}",
        usage_script: None,
        description: "Converts the given string to an integer",
    },
    Builtin {
        name: "random",
        apply: random,
        usage: "Usage: ${random(num)}. Example: ${set(this, \"password\", random(8))}",
        usage_script: None,
        description: "Returns a random alphanumeric string of the given length",
    },
    Builtin {
        name: "rint",
        apply: rint,
        usage: "Usage: ${rint(range)}. Example: ${rint(1000)}",
        usage_script: None,
        description: "Returns a random integer in the given range",
    },
    Builtin {
        name: "index_of",
        apply: index_of,
        usage: "Usage: ${index_of(string, word)}. Example: ${index_of(this.name, \"the\")}",
        usage_script: None,
        description: "Returns the position of string in a string, or -1",
    },
    Builtin {
        name: "contains",
        apply: contains,
        usage: "Usage: ${contains(string, word)}. Example: ${contains(this.name, \"the\")}",
        usage_script: None,
        description: "Returns true if the given string or collection contains an element",
    },
    Builtin {
        name: "substring",
        apply: substring,
        usage: "Usage: ${substring(string, start, length)}. Example: ${substring(this.name, 19, 3)}",
        usage_script: None,
        description: "Returns the substring of the given string",
    },
    Builtin {
        name: "length",
        apply: length,
        usage: "Usage: ${length(string)}. Example: ${length(this.name)}",
        usage_script: None,
        description: "Returns the length of the given string",
    },
    Builtin {
        name: "replace",
        apply: replace,
        usage: "Usage: ${replace(template, source)}. Example: ${replace(\"${this.id}\", this)}",
        usage_script: None,
        description: "Replaces the template expressions in a string with values of the given entity",
    },
    Builtin {
        name: "clean",
        apply: clean,
        usage: "Usage: ${clean(string)}. Example: ${clean(this.stringWithNonWordChars)}",
        usage_script: None,
        description: "Cleans the given string",
    },
    Builtin {
        name: "urlencode",
        apply: urlencode,
        usage: "Usage: ${urlencode(string)}. Example: ${urlencode(this.email)}",
        usage_script: None,
        description: "URL-encodes the given string",
    },
    Builtin {
        name: "escape_javascript",
        apply: escape_javascript,
        usage: "Usage: ${escape_javascript(string)}. Example: ${escape_javascript(this.name)}",
        usage_script: None,
        description: "Escapes the given string for use with Javascript",
    },
    Builtin {
        name: "escape_json",
        apply: escape_json,
        usage: "Usage: ${escape_json(string)}. Example: ${escape_json(this.name)}",
        usage_script: None,
        description: "Escapes the given string for use within JSON",
    },
];

fn text(value: impl Into<String>) -> Output {
    Ok(Value::text(value).into())
}

fn md5_hex(args: &[Value], _: &Evaluator, _: &mut ActionContext, _: Option<&EntityRef>) -> Output {
    if !has_min_length(args, 1) {
        return Ok(FunctionOutput::empty());
    }
    let digest = Md5::digest(args[0].to_string().as_bytes());
    text(hex::encode(digest))
}

fn upper(args: &[Value], _: &Evaluator, _: &mut ActionContext, _: Option<&EntityRef>) -> Output {
    if !has_min_length(args, 1) {
        return Ok(FunctionOutput::empty());
    }
    text(args[0].to_string().to_uppercase())
}

fn lower(args: &[Value], _: &Evaluator, _: &mut ActionContext, _: Option<&EntityRef>) -> Output {
    if !has_min_length(args, 1) {
        return Ok(FunctionOutput::empty());
    }
    text(args[0].to_string().to_lowercase())
}

/// Element text as a joined string shows it, nulls as nothing
fn element_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn join(args: &[Value], _: &Evaluator, _: &mut ActionContext, _: Option<&EntityRef>) -> Output {
    if has_length(args, 2) {
        if let Value::List(items) = &args[0] {
            let separator = args[1].to_string();
            let parts: Vec<String> = items.iter().map(element_text).collect();
            return text(parts.join(&separator));
        }
    }
    Ok(FunctionOutput::empty())
}

fn concat(args: &[Value], _: &Evaluator, _: &mut ActionContext, _: Option<&EntityRef>) -> Output {
    let mut result = String::new();
    for arg in args {
        match arg {
            Value::Null => {}
            Value::List(items) => items.iter().for_each(|item| result.push_str(&element_text(item))),
            other => result.push_str(&other.to_string()),
        }
    }
    text(result)
}

fn split(args: &[Value], eval: &Evaluator, _: &mut ActionContext, _: Option<&EntityRef>) -> Output {
    if !has_min_length(args, 1) {
        return Ok(FunctionOutput::empty());
    }

    let source = args[0].to_string();
    let pattern = match args.get(1) {
        Some(separator) => separator.to_string(),
        None => "[,;]+".to_string(),
    };
    let regex = eval.regex(&pattern)?;

    let mut parts: Vec<&str> = regex.split(&source).collect();
    // a leading match yields one empty element, trailing empty elements are dropped
    while parts.len() > 1 && parts.last().is_some_and(|p| p.is_empty()) {
        parts.pop();
    }

    Ok(Value::List(parts.into_iter().map(Value::text).collect()).into())
}

fn abbr(args: &[Value], _: &Evaluator, _: &mut ActionContext, _: Option<&EntityRef>) -> Output {
    if !has_min_length(args, 2) {
        return Ok(FunctionOutput::empty());
    }

    let max_length = match parse_double(&args[1].to_string()) {
        Ok(max) => max.max(0.0) as usize,
        Err(message) => return text(message),
    };

    let source = args[0].to_string();
    if source.chars().count() <= max_length {
        return Ok(args[0].clone().into());
    }

    let cut: String = source.chars().take(max_length).collect();
    let abbreviated = match cut.rfind(' ') {
        Some(index) => &cut[..index],
        None => cut.as_str(),
    };
    text(format!("{abbreviated}…"))
}

fn capitalize_word(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn capitalize(args: &[Value], _: &Evaluator, _: &mut ActionContext, _: Option<&EntityRef>) -> Output {
    if !has_min_length(args, 1) {
        return Ok(FunctionOutput::empty());
    }
    text(capitalize_word(&args[0].to_string()))
}

fn titleize(args: &[Value], _: &Evaluator, _: &mut ActionContext, _: Option<&EntityRef>) -> Output {
    let Some(source) = args.first().filter(|arg| !arg.is_null()) else {
        return Ok(Value::Null.into());
    };

    let source = source.to_string();
    if source.trim().is_empty() {
        return Ok(FunctionOutput::empty());
    }

    // every char of the separator splits, empty words are dropped
    let separators: Vec<char> = match args.get(1) {
        Some(separator) => separator.to_string().chars().collect(),
        None => vec![' '],
    };

    let words: Vec<String> = source
        .split(|c: char| separators.contains(&c))
        .filter(|word| !word.is_empty())
        .map(capitalize_word)
        .collect();

    text(words.join(" "))
}

fn num(args: &[Value], _: &Evaluator, _: &mut ActionContext, _: Option<&EntityRef>) -> Output {
    if !has_min_length(args, 1) {
        return Ok(FunctionOutput::empty());
    }
    Ok(Value::from(args[0].to_double_or_null()).into())
}

fn int(args: &[Value], _: &Evaluator, _: &mut ActionContext, _: Option<&EntityRef>) -> Output {
    if !has_min_length(args, 1) {
        return Ok(FunctionOutput::empty());
    }

    let number = match &args[0] {
        Value::Integer(i) => Some(i64::from(*i as i32)),
        other => other.to_double_or_null().map(|n| i64::from(n as i32)),
    };

    Ok(number.map_or_else(FunctionOutput::empty, |n| Value::Integer(n).into()))
}

/// Integral value of a numeric argument
fn count_arg(value: &Value) -> Option<i64> {
    match value {
        Value::Integer(i) => Some(*i),
        Value::Number(n) => Some(*n as i64),
        _ => None,
    }
}

fn random(args: &[Value], eval: &Evaluator, _: &mut ActionContext, _: Option<&EntityRef>) -> Output {
    let Some(len) = has_length(args, 1).then(|| count_arg(&args[0])).flatten() else {
        return Ok(FunctionOutput::empty());
    };
    let limit = eval.config().read_limit;
    if u64::try_from(len).is_ok_and(|len| len > limit) {
        warn!(length = len, limit, "Random string length exceeds the read limit");
        return Ok(FunctionOutput::empty());
    }

    let random: String = (0..len.max(0))
        .map(|_| char::from(ALPHANUMERIC[rand::random_range(0..ALPHANUMERIC.len())]))
        .collect();
    text(random)
}

fn rint(args: &[Value], _: &Evaluator, _: &mut ActionContext, _: Option<&EntityRef>) -> Output {
    match has_length(args, 1).then(|| count_arg(&args[0])).flatten() {
        Some(bound) if bound > 0 => Ok(Value::Integer(rand::random_range(0..bound)).into()),
        _ => Ok(FunctionOutput::empty()),
    }
}

fn index_of(args: &[Value], _: &Evaluator, _: &mut ActionContext, _: Option<&EntityRef>) -> Output {
    if !has_length(args, 2) {
        return Ok(FunctionOutput::empty());
    }

    let source = args[0].to_string();
    let part = args[1].to_string();
    let index = source
        .find(&part)
        .map_or(-1, |byte_index| source[..byte_index].chars().count() as i64);
    Ok(Value::Integer(index).into())
}

fn contains(args: &[Value], _: &Evaluator, _: &mut ActionContext, _: Option<&EntityRef>) -> Output {
    let found = has_length(args, 2)
        && match (&args[0], &args[1]) {
            (Value::Text(source), Value::Text(part)) => source.contains(part.as_str()),
            (Value::List(items), element) => items.contains(element),
            _ => false,
        };
    Ok(Value::Bool(found).into())
}

fn substring(args: &[Value], _: &Evaluator, _: &mut ActionContext, _: Option<&EntityRef>) -> Output {
    if !has_min_length(args, 2) {
        return Ok(FunctionOutput::empty());
    }

    let source: Vec<char> = args[0].to_string().chars().collect();
    let source_length = source.len() as i64;

    let Some(start) = int_arg(&args[1]) else {
        debug!(start = %args[1], "substring start is not an integer");
        return Ok(FunctionOutput::empty());
    };
    let length = match args.get(2) {
        Some(length) => match int_arg(length) {
            Some(length) => length,
            None => {
                debug!(length = %length, "substring length is not an integer");
                return Ok(FunctionOutput::empty());
            }
        },
        None => match source_length.checked_sub(start) {
            Some(length) => length,
            None => return Ok(FunctionOutput::empty()),
        },
    };
    let Some(end) = start.checked_add(length) else {
        debug!(start, length, "substring bounds overflow");
        return Ok(FunctionOutput::empty());
    };

    if start >= 0 && start < source_length && end >= 0 && end <= source_length && start <= end {
        let part: String = source[start as usize..end as usize].iter().collect();
        return text(part);
    }
    Ok(FunctionOutput::empty())
}

fn length(args: &[Value], _: &Evaluator, _: &mut ActionContext, _: Option<&EntityRef>) -> Output {
    if !has_length(args, 1) {
        return Ok(FunctionOutput::empty());
    }
    Ok(Value::Integer(args[0].to_string().chars().count() as i64).into())
}

fn replace(args: &[Value], eval: &Evaluator, ctx: &mut ActionContext, _: Option<&EntityRef>) -> Output {
    if !has_min_length(args, 2) {
        return Ok(FunctionOutput::Usage);
    }

    let node = match &args[1] {
        Value::Entity(entity) => Some(entity),
        Value::List(items) if items.len() == 1 => items[0].as_entity(),
        _ => None,
    };

    match node {
        Some(node) => {
            let template = args[0].to_string();
            text(eval.render(&template, ctx, Some(node))?)
        }
        None => Ok(FunctionOutput::empty()),
    }
}

fn clean(args: &[Value], eval: &Evaluator, _: &mut ActionContext, _: Option<&EntityRef>) -> Output {
    if !has_min_length(args, 1) {
        return Ok(Value::Null.into());
    }

    match &args[0] {
        Value::List(items) => {
            let cleaned = items
                .iter()
                .map(|item| {
                    let item = element_text(item);
                    if item.trim().is_empty() {
                        Ok(Value::empty())
                    } else {
                        clean_string(&item, eval).map(Value::Text)
                    }
                })
                .collect::<ExpressionResult<Vec<_>>>()?;
            Ok(Value::List(cleaned).into())
        }
        other => {
            let source = other.to_string();
            if source.trim().is_empty() {
                return Ok(FunctionOutput::empty());
            }
            text(clean_string(&source, eval)?)
        }
    }
}

/// Turn arbitrary text into a lowercase, dash separated slug
pub(crate) fn clean_string(input: &str, eval: &Evaluator) -> ExpressionResult<String> {
    let mut normalized = String::with_capacity(input.len());
    for c in input.nfd().filter(|c| !is_combining_mark(*c)) {
        match c {
            '<' | '>' | '.' | '?' | '(' | ')' | '{' | '}' | '[' | ']' | '!' | ',' => {}
            '\'' | '+' | '/' | '–' | '\\' | '|' | '`' | '-' | '_' => normalized.push(' '),
            other => normalized.push(other),
        }
    }

    let lowered = normalized.to_lowercase();
    let spaced = lowered.split_whitespace().collect::<Vec<_>>().join(" ");

    let punctuated: String = spaced
        .chars()
        .filter(char::is_ascii)
        .map(|c| if is_punctuation(c) { '-' } else { c })
        .collect();

    let collapsed = eval.regex(r"-(\s+-)+")?.replace_all(&punctuated, "-");
    Ok(collapsed.replace(' ', "-"))
}

/// ASCII chars in the Unicode punctuation categories
fn is_punctuation(c: char) -> bool {
    c.is_ascii_punctuation() && !matches!(c, '$' | '+' | '<' | '=' | '>' | '^' | '`' | '|' | '~')
}

fn urlencode(args: &[Value], _: &Evaluator, _: &mut ActionContext, _: Option<&EntityRef>) -> Output {
    if !has_min_length(args, 1) {
        return Ok(FunctionOutput::empty());
    }
    let source = args[0].to_string();
    text(url::form_urlencoded::byte_serialize(source.as_bytes()).collect::<String>())
}

fn escape_javascript(args: &[Value], _: &Evaluator, _: &mut ActionContext, _: Option<&EntityRef>) -> Output {
    if !has_min_length(args, 1) {
        return Ok(FunctionOutput::empty());
    }
    text(escape(&args[0].to_string(), true))
}

fn escape_json(args: &[Value], _: &Evaluator, _: &mut ActionContext, _: Option<&EntityRef>) -> Output {
    if !has_min_length(args, 1) {
        return Ok(FunctionOutput::empty());
    }
    text(escape(&args[0].to_string(), false))
}

/// Backslash escaping shared by the JavaScript and JSON variants; non-ASCII
/// chars become `\uXXXX` UTF-16 escapes
fn escape(input: &str, single_quote: bool) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '/' => out.push_str("\\/"),
            '\'' if single_quote => out.push_str("\\'"),
            '\u{8}' => out.push_str("\\b"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\u{c}' => out.push_str("\\f"),
            '\r' => out.push_str("\\r"),
            c if c < ' ' || !c.is_ascii() => {
                let mut units = [0u16; 2];
                for unit in c.encode_utf16(&mut units) {
                    out.push_str(&format!("\\u{unit:04X}"));
                }
            }
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::functions::test_support::eval;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case(r#"upper("abc")"#, "ABC")]
    #[case(r#"lower("ABC")"#, "abc")]
    #[case(r#"concat("a", "b", "c")"#, "abc")]
    #[case(r#"concat("a", null, 1)"#, "a___NULL___1")]
    #[case(r#"join(split("a,b;c"), "-")"#, "a-b-c")]
    #[case(r#"join("abc", ",")"#, "")]
    #[case(r#"capitalize("hello world")"#, "Hello world")]
    #[case(r#"titleize("hello_big_world", "_")"#, "Hello Big World")]
    #[case(r#"substring("hello world", 0, 5)"#, "hello")]
    #[case(r#"substring("hello world", 6)"#, "world")]
    #[case(r#"substring("hello", 2, 100)"#, "")]
    #[case("substring('abc', 9000000000000000000, 9000000000000000000)", "")]
    #[case("substring('abc', mult(-1, 9300000000000000000))", "")]
    #[case(r#"length("hello")"#, "5")]
    #[case(r#"index_of("hello", "ll")"#, "2")]
    #[case(r#"index_of("hello", "x")"#, "-1")]
    #[case(r#"contains("hello", "ell")"#, "true")]
    #[case(r#"contains(split("a,b"), "b")"#, "true")]
    #[case(r#"contains(1, 1)"#, "false")]
    #[case(r#"urlencode("a b&c=d/é")"#, "a+b%26c%3Dd%2F%C3%A9")]
    #[case(r#"abbr("Structr is a graph application platform", 20)"#, "Structr is a graph…")]
    #[case(r#"abbr("short", 20)"#, "short")]
    #[case(r#"abbr("short", "x")"#, "For input string: \"x\"")]
    #[case(r#"num("2.5")"#, "2.5")]
    #[case(r#"num("abc")"#, "")]
    #[case(r#"int("12.7")"#, "12")]
    #[case(r#"int("abc")"#, "")]
    #[case(r#"upper()"#, "")]
    fn test_string_functions(#[case] expression: &str, #[case] expected: &str) {
        assert_eq!(eval(expression).render(), expected);
    }

    #[test]
    fn test_md5_hex_digest() {
        assert_eq!(
            eval(r#"md5("hello")"#).to_string(),
            "5d41402abc4b2a76b9719d911017c592"
        );
    }

    #[test]
    fn test_split_keeps_inner_empty_elements() {
        assert_eq!(
            eval(r#"split("a  b ", " ")"#),
            Value::List(vec![Value::text("a"), Value::text(""), Value::text("b")])
        );
    }

    #[test]
    fn test_random_is_alphanumeric() {
        let value = eval("random(12)").to_string();
        assert_eq!(value.len(), 12);
        assert!(value.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_eq!(eval(r#"random("12")"#).to_string(), "");
    }

    #[test]
    fn test_random_rejects_lengths_above_the_read_limit() {
        assert_eq!(eval("random(1000000000000)").to_string(), "");
        assert_eq!(eval("random(-3)").to_string(), "");
    }

    #[test]
    fn test_rint_stays_below_bound() {
        for _ in 0..20 {
            let Value::Integer(n) = eval("rint(5)") else {
                panic!("rint must return an integer");
            };
            assert!((0..5).contains(&n));
        }
        assert_eq!(eval("rint(0)").to_string(), "");
    }

    #[rstest]
    #[case("Hello World!", "hello-world")]
    #[case("Crème Brûlée (2024)", "creme-brulee-2024")]
    #[case("a/b+c_d", "a-b-c-d")]
    #[case("Straße: \"A\"", "strae-a-")]
    #[case("Škoda Octavia", "skoda-octavia")]
    #[case("Dvořák", "dvorak")]
    #[case("Łódź", "odz")]
    fn test_clean(#[case] input: &str, #[case] expected: &str) {
        let expression = format!("clean('{}')", input.replace('\'', "\\'"));
        assert_eq!(eval(&expression).to_string(), expected);
    }

    #[test]
    fn test_clean_without_argument_is_null() {
        assert_eq!(eval("clean()"), Value::Null);
    }

    #[test]
    fn test_escapes() {
        assert_eq!(escape("it's \"x\"\n", true), "it\\'s \\\"x\\\"\\n");
        assert_eq!(escape("it's /é", false), "it's \\/\\u00E9");
    }
}
