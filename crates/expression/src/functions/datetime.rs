//! Date and number formatting functions
//!
//! Patterns use the notation templates have always been written in:
//! `yyyy-MM-dd'T'HH:mm:ssZ` for dates and `#,##0.00` for numbers. Dates are
//! formatted and parsed in UTC.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};

use structr_log::{debug, warn};

use super::{Builtin, FunctionOutput, has_length};
use crate::context::ActionContext;
use crate::core::{EntityRef, Value, parse_double, parse_iso_date};
use crate::error::ExpressionResult;
use crate::eval::Evaluator;

type Output = ExpressionResult<FunctionOutput>;

pub(super) const BUILTINS: &[Builtin] = &[
    Builtin {
        name: "date_format",
        apply: date_format,
        usage: "Usage: ${date_format(value, pattern)}. Example: ${date_format(this.creationDate, \"yyyy-MM-dd'T'HH:mm:ssZ\")}",
        usage_script: Some(
            "Usage: ${{Structr.date_format(value, pattern)}}. Example: ${{Structr.date_format(Structr.get('this').creationDate, \"yyyy-MM-dd'T'HH:mm:ssZ\")}}",
        ),
        description: "Formats the given value as a date string with the given format string",
    },
    Builtin {
        name: "parse_date",
        apply: parse_date,
        usage: "Usage: ${parse_date(value, pattern)}. Example: ${parse_format(\"2014-01-01\", \"yyyy-MM-dd\")}",
        usage_script: Some(
            "Usage: ${{Structr.parse_date(value, pattern)}}. Example: ${{Structr.parse_format(\"2014-01-01\", \"yyyy-MM-dd\")}}",
        ),
        description: "Parses the given date string using the given format string",
    },
    Builtin {
        name: "number_format",
        apply: number_format,
        usage: "Usage: ${number_format(value, ISO639LangCode, pattern)}. Example: ${number_format(12345.6789, 'en', '#,##0.00')}",
        usage_script: Some(
            "Usage: ${{Structr.number_format(value, ISO639LangCode, pattern)}}. Example: ${{Structr.number_format(12345.6789, 'en', '#,##0.00')}}",
        ),
        description: "Formats the given value using the given number format string",
    },
];

fn date_format(args: &[Value], _: &Evaluator, _: &mut ActionContext, _: Option<&EntityRef>) -> Output {
    if args.len() != 2 {
        return Ok(FunctionOutput::Usage);
    }
    if !has_length(args, 2) {
        return Ok(FunctionOutput::empty());
    }

    let date = match &args[0] {
        Value::Date(date) => Some(*date),
        Value::Integer(millis) => Utc.timestamp_millis_opt(*millis).single(),
        Value::Number(millis) => Utc.timestamp_millis_opt(*millis as i64).single(),
        other => parse_iso_date(&other.to_string()),
    };

    match date {
        Some(date) => {
            let pattern = to_chrono_pattern(&args[1].to_string());
            Ok(Value::text(date.format(&pattern).to_string()).into())
        }
        None => {
            warn!(value = %args[0], "Unable to interpret value as a date");
            Ok(FunctionOutput::empty())
        }
    }
}

fn parse_date(args: &[Value], _: &Evaluator, _: &mut ActionContext, _: Option<&EntityRef>) -> Output {
    if args.len() != 2 {
        return Ok(FunctionOutput::Usage);
    }
    if !has_length(args, 2) {
        return Ok(FunctionOutput::empty());
    }

    let text = args[0].to_string();
    if text.trim().is_empty() {
        return Ok(FunctionOutput::empty());
    }

    let pattern = args[1].to_string();
    match parse_with_pattern(&text, &to_chrono_pattern(&pattern)) {
        Some(date) => Ok(Value::Date(date).into()),
        None => {
            warn!(date = %text, pattern = %pattern, "Could not parse date with pattern");
            Ok(FunctionOutput::empty())
        }
    }
}

/// Parse with a zone when the pattern has one, otherwise as UTC wall time;
/// a pattern without time fields yields midnight
fn parse_with_pattern(text: &str, pattern: &str) -> Option<DateTime<Utc>> {
    if let Ok(date) = DateTime::parse_from_str(text, pattern) {
        return Some(date.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(text, pattern) {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(text, pattern)
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Translate a `yyyy-MM-dd` style pattern into `strftime` syntax
pub(crate) fn to_chrono_pattern(pattern: &str) -> String {
    let chars: Vec<char> = pattern.chars().collect();
    let mut out = String::with_capacity(pattern.len() * 2);
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if c == '\'' {
            // quoted literal, '' is a single quote
            if chars.get(i + 1) == Some(&'\'') {
                out.push('\'');
                i += 2;
                continue;
            }
            i += 1;
            while i < chars.len() {
                if chars[i] == '\'' {
                    if chars.get(i + 1) == Some(&'\'') {
                        out.push('\'');
                        i += 2;
                        continue;
                    }
                    break;
                }
                push_literal(&mut out, chars[i]);
                i += 1;
            }
            i += 1;
            continue;
        }

        if !c.is_ascii_alphabetic() {
            push_literal(&mut out, c);
            i += 1;
            continue;
        }

        let mut run = 1;
        while chars.get(i + run) == Some(&c) {
            run += 1;
        }
        i += run;

        let field = match (c, run) {
            ('y', 2) => "%y",
            ('y', _) => "%Y",
            ('M', 1) => "%-m",
            ('M', 2) => "%m",
            ('M', 3) => "%b",
            ('M', _) => "%B",
            ('d', 1) => "%-d",
            ('d', _) => "%d",
            ('H', 1) => "%-H",
            ('H', _) => "%H",
            ('h', 1) => "%-I",
            ('h', _) => "%I",
            ('m', 1) => "%-M",
            ('m', _) => "%M",
            ('s', 1) => "%-S",
            ('s', _) => "%S",
            ('S', _) => "%3f",
            ('E', 1..=3) => "%a",
            ('E', _) => "%A",
            ('a', _) => "%p",
            ('D', _) => "%j",
            ('Z', _) => "%z",
            ('X', _) => "%:z",
            ('z', _) => "%Z",
            _ => {
                debug!(letter = %c, "Unsupported date pattern letter");
                ""
            }
        };
        out.push_str(field);
    }

    out
}

fn push_literal(out: &mut String, c: char) {
    if c == '%' {
        out.push_str("%%");
    } else {
        out.push(c);
    }
}

fn number_format(args: &[Value], _: &Evaluator, _: &mut ActionContext, _: Option<&EntityRef>) -> Output {
    if args.len() != 3 {
        return Ok(FunctionOutput::Usage);
    }
    if !has_length(args, 3) || args[0].to_string().trim().is_empty() {
        return Ok(FunctionOutput::empty());
    }

    match parse_double(&args[0].to_string()) {
        Ok(value) => {
            let symbols = Symbols::for_language(&args[1].to_string());
            let formatted = DecimalPattern::parse(&args[2].to_string()).format(value, symbols);
            Ok(Value::text(formatted).into())
        }
        Err(message) => {
            debug!(value = %args[0], error = %message, "number_format value is not a number");
            Ok(FunctionOutput::empty())
        }
    }
}

/// Separators of a language
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Symbols {
    decimal: char,
    grouping: char,
}

impl Symbols {
    fn for_language(tag: &str) -> Self {
        let language = tag
            .split(['-', '_'])
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase();

        match language.as_str() {
            "de" | "es" | "it" | "nl" | "pt" | "da" | "id" | "tr" | "el" | "ro" | "hr" | "sl" => {
                Self { decimal: ',', grouping: '.' }
            }
            "fr" | "ru" | "pl" | "cs" | "sk" | "fi" | "sv" | "nb" | "no" | "uk" | "hu" => {
                Self { decimal: ',', grouping: '\u{a0}' }
            }
            "ch" => Self { decimal: '.', grouping: '\'' },
            _ => Self { decimal: '.', grouping: ',' },
        }
    }
}

/// Parsed `#,##0.00` style pattern
#[derive(Debug, Clone, PartialEq, Eq)]
struct DecimalPattern {
    prefix: String,
    suffix: String,
    group_size: Option<usize>,
    min_integer: usize,
    min_fraction: usize,
    max_fraction: usize,
}

impl DecimalPattern {
    fn parse(pattern: &str) -> Self {
        // only the positive subpattern is honoured
        let positive = pattern.split(';').next().unwrap_or_default();
        let is_body = |c: char| matches!(c, '#' | '0' | ',' | '.');

        let start = positive.find(is_body).unwrap_or(positive.len());
        let end = positive.rfind(is_body).map_or(start, |i| i + 1);
        let body = &positive[start..end];

        let (integer, fraction) = body.split_once('.').unwrap_or((body, ""));
        let group_size = integer
            .rfind(',')
            .map(|i| integer.len() - i - 1)
            .filter(|size| *size > 0);

        Self {
            prefix: positive[..start].replace('\'', ""),
            suffix: positive[end..].replace('\'', ""),
            group_size,
            min_integer: integer.chars().filter(|c| *c == '0').count(),
            min_fraction: fraction.chars().filter(|c| *c == '0').count(),
            max_fraction: fraction.chars().filter(|c| matches!(c, '0' | '#')).count(),
        }
    }

    fn format(&self, value: f64, symbols: Symbols) -> String {
        if value.is_nan() {
            return "NaN".to_string();
        }
        if value.is_infinite() {
            let sign = if value < 0.0 { "-" } else { "" };
            return format!("{sign}{}∞{}", self.prefix, self.suffix);
        }

        // half-even rounding on the exact binary value
        let rounded = format!("{:.*}", self.max_fraction, value.abs());
        let (integer, fraction) = rounded.split_once('.').unwrap_or((&rounded, ""));

        let mut fraction = fraction.to_string();
        while fraction.len() > self.min_fraction && fraction.ends_with('0') {
            fraction.pop();
        }

        let mut integer = integer.trim_start_matches('0').to_string();
        while integer.len() < self.min_integer {
            integer.insert(0, '0');
        }
        if integer.is_empty() && fraction.is_empty() {
            integer.push('0');
        }

        let grouped = match self.group_size {
            Some(size) => group(&integer, size, symbols.grouping),
            None => integer,
        };

        let is_zero = grouped.chars().chain(fraction.chars()).all(|c| !c.is_ascii_digit() || c == '0');
        let sign = if value < 0.0 && !is_zero { "-" } else { "" };

        let mut out = format!("{sign}{}{grouped}", self.prefix);
        if !fraction.is_empty() {
            out.push(symbols.decimal);
            out.push_str(&fraction);
        }
        out.push_str(&self.suffix);
        out
    }
}

fn group(digits: &str, size: usize, separator: char) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / size);
    for (i, digit) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % size == 0 {
            out.push(separator);
        }
        out.push(digit);
    }
    out
}
