use std::fmt::{self, Write as _};
use std::sync::Arc;

use anyhow::{anyhow, bail, Context};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;

use super::FilterFn;
use crate::expr::value::{as_number, escape_html, to_display, type_name};

/// A registered filter.
#[derive(Clone)]
pub struct FilterDef {
    handler: Arc<FilterFn>,
    /// Output bypasses HTML escaping when this filter ends a pipeline.
    pub safe: bool,
}

impl FilterDef {
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&Value, &[Value]) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        Self {
            handler: Arc::new(handler),
            safe: false,
        }
    }

    pub fn safe<F>(handler: F) -> Self
    where
        F: Fn(&Value, &[Value]) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        Self {
            handler: Arc::new(handler),
            safe: true,
        }
    }

    pub fn apply(&self, value: &Value, args: &[Value]) -> anyhow::Result<Value> {
        (self.handler)(value, args)
    }
}

impl fmt::Debug for FilterDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterDef").field("safe", &self.safe).finish()
    }
}

pub(super) fn builtin() -> Vec<(&'static str, FilterDef)> {
    vec![
        ("upper", FilterDef::new(|v, _| Ok(text(v).to_uppercase().into()))),
        ("lower", FilterDef::new(|v, _| Ok(text(v).to_lowercase().into()))),
        ("title", FilterDef::new(|v, _| Ok(title_case(&text(v)).into()))),
        ("trim", FilterDef::new(|v, _| Ok(text(v).trim().into()))),
        ("length", FilterDef::new(|v, _| Ok(length(v).into()))),
        ("default", FilterDef::new(default)),
        ("join", FilterDef::new(join)),
        ("date", FilterDef::new(date)),
        ("format", FilterDef::new(format)),
        ("number", FilterDef::new(number)),
        (
            "json",
            FilterDef::new(|v, _| Ok(serde_json::to_string(v)?.into())),
        ),
        ("url", FilterDef::new(|v, _| Ok(url_encode(&text(v)).into()))),
        ("raw", FilterDef::safe(|v, _| Ok(v.clone()))),
        ("escape", FilterDef::safe(|v, _| Ok(escape_html(&text(v)).into()))),
        ("attr", FilterDef::safe(|v, _| Ok(escape_html(&text(v)).into()))),
        (
            "nl2br",
            FilterDef::safe(|v, _| Ok(escape_html(&text(v)).replace('\n', "<br />\n").into())),
        ),
    ]
}

fn text(value: &Value) -> String {
    to_display(value)
}

/// Element count for collections, character count for strings.
pub(super) fn length(value: &Value) -> usize {
    match value {
        Value::Null => 0,
        Value::Array(items) => items.len(),
        Value::Object(map) => map.len(),
        Value::String(s) => s.chars().count(),
        other => to_display(other).chars().count(),
    }
}

fn title_case(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut at_word_start = true;
    for c in input.chars() {
        if at_word_start {
            out.extend(c.to_uppercase());
        } else {
            out.extend(c.to_lowercase());
        }
        at_word_start = c.is_whitespace() || c == '-';
    }
    out
}

fn default(value: &Value, args: &[Value]) -> anyhow::Result<Value> {
    let empty = match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    };
    if empty {
        Ok(args.first().cloned().unwrap_or(Value::Null))
    } else {
        Ok(value.clone())
    }
}

fn join(value: &Value, args: &[Value]) -> anyhow::Result<Value> {
    let sep = args.first().map(text).unwrap_or_else(|| ", ".to_string());
    let parts: Vec<String> = match value {
        Value::Array(items) => items.iter().map(text).collect(),
        Value::Object(map) => map.values().map(text).collect(),
        other => vec![text(other)],
    };
    Ok(parts.join(&sep).into())
}

fn date(value: &Value, args: &[Value]) -> anyhow::Result<Value> {
    let format = args
        .first()
        .map(text)
        .unwrap_or_else(|| "%Y-%m-%d".to_string());
    let moment = parse_moment(value)?;

    let mut out = String::new();
    write!(out, "{}", moment.format(&format))
        .map_err(|_| anyhow!("invalid date format '{}'", format))?;
    Ok(out.into())
}

/// Accepts unix timestamps, RFC 3339 strings, `YYYY-MM-DD HH:MM:SS` and
/// `YYYY-MM-DD`.
pub(super) fn parse_moment(value: &Value) -> anyhow::Result<DateTime<Utc>> {
    if let Value::Number(n) = value {
        let secs = n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .ok_or_else(|| anyhow!("invalid timestamp {}", n))?;
        return DateTime::from_timestamp(secs, 0).ok_or_else(|| anyhow!("timestamp {} out of range", secs));
    }

    let Value::String(s) = value else {
        bail!("cannot format a {} as a date", type_name(value));
    };
    let s = s.trim();

    if let Ok(secs) = s.parse::<i64>() {
        return DateTime::from_timestamp(secs, 0).ok_or_else(|| anyhow!("timestamp {} out of range", secs));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Ok(dt.and_utc());
    }
    let day = NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .with_context(|| format!("unrecognized date '{}'", s))?;
    day.and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc())
        .ok_or_else(|| anyhow!("unrecognized date '{}'", s))
}

/// `%s`, `%d` and `{}` are replaced in order by the value, then the
/// remaining arguments. `%%` is a literal percent sign.
fn format(value: &Value, args: &[Value]) -> anyhow::Result<Value> {
    let Some(pattern) = args.first() else {
        bail!("format requires a pattern argument");
    };
    let pattern = text(pattern);
    let mut fills = std::iter::once(value).chain(args[1..].iter());

    let mut out = String::with_capacity(pattern.len());
    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        match (c, chars.peek().copied()) {
            ('%', Some('%')) => {
                chars.next();
                out.push('%');
            }
            ('%', Some(spec @ ('s' | 'd'))) | ('{', Some(spec @ '}')) => {
                chars.next();
                let fill = fills.next().map(|v| {
                    if spec == 'd' {
                        as_number(v).map(|n| (n.trunc() as i64).to_string()).unwrap_or_else(|| "0".into())
                    } else {
                        text(v)
                    }
                });
                out.push_str(&fill.unwrap_or_default());
            }
            _ => out.push(c),
        }
    }
    Ok(out.into())
}

fn number(value: &Value, args: &[Value]) -> anyhow::Result<Value> {
    let decimals = match args.first() {
        Some(arg) => as_number(arg)
            .filter(|d| *d >= 0.0)
            .ok_or_else(|| anyhow!("number expects a non-negative decimal count"))?
            as usize,
        None => 2,
    };
    let n = as_number(value)
        .ok_or_else(|| anyhow!("cannot format a {} as a number", type_name(value)))?;
    Ok(format_number(n, decimals, ",", " ").into())
}

/// Format `n` with a fixed number of decimals and grouped thousands.
pub(super) fn format_number(n: f64, decimals: usize, decimal_sep: &str, thousands_sep: &str) -> String {
    let fixed = format!("{:.*}", decimals, n.abs());
    let (int_part, frac_part) = match fixed.split_once('.') {
        Some((i, f)) => (i.to_string(), Some(f.to_string())),
        None => (fixed, None),
    };

    let digits: Vec<char> = int_part.chars().collect();
    let mut grouped = String::new();
    for (i, d) in digits.iter().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push_str(thousands_sep);
        }
        grouped.push(*d);
    }

    let negative = n < 0.0 && fixed_is_nonzero(&grouped, frac_part.as_deref());
    let mut out = String::new();
    if negative {
        out.push('-');
    }
    out.push_str(&grouped);
    if let Some(frac) = frac_part {
        out.push_str(decimal_sep);
        out.push_str(&frac);
    }
    out
}

fn fixed_is_nonzero(int_part: &str, frac: Option<&str>) -> bool {
    int_part.chars().chain(frac.unwrap_or("").chars()).any(|c| c.is_ascii_digit() && c != '0')
}

/// Form-style percent encoding: unreserved characters pass, spaces become
/// `+`, everything else is `%XX` per UTF-8 byte.
pub(super) fn url_encode(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for byte in input.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' => out.push(byte as char),
            b' ' => out.push('+'),
            other => {
                let _ = write!(out, "%{:02X}", other);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn apply(name: &str, value: Value, args: &[Value]) -> anyhow::Result<Value> {
        let (_, def) = builtin()
            .into_iter()
            .find(|(n, _)| *n == name)
            .expect("builtin filter");
        def.apply(&value, args)
    }

    #[test]
    fn case_filters() {
        assert_eq!(apply("upper", json!("a|b"), &[]).unwrap(), json!("A|B"));
        assert_eq!(apply("lower", json!("ABC"), &[]).unwrap(), json!("abc"));
        assert_eq!(apply("title", json!("hello wide world"), &[]).unwrap(), json!("Hello Wide World"));
        assert_eq!(apply("trim", json!("  x "), &[]).unwrap(), json!("x"));
    }

    #[test]
    fn length_counts_chars_and_items() {
        assert_eq!(apply("length", json!("héllo"), &[]).unwrap(), json!(5));
        assert_eq!(apply("length", json!([1, 2, 3]), &[]).unwrap(), json!(3));
        assert_eq!(apply("length", json!(null), &[]).unwrap(), json!(0));
    }

    #[test]
    fn default_replaces_null_and_empty() {
        assert_eq!(apply("default", json!(null), &[json!("n/a")]).unwrap(), json!("n/a"));
        assert_eq!(apply("default", json!(""), &[json!("n/a")]).unwrap(), json!("n/a"));
        assert_eq!(apply("default", json!(0), &[json!("n/a")]).unwrap(), json!(0));
    }

    #[test]
    fn join_with_separator() {
        assert_eq!(apply("join", json!(["a", "b"]), &[json!("-")]).unwrap(), json!("a-b"));
        assert_eq!(apply("join", json!([1, 2]), &[]).unwrap(), json!("1, 2"));
    }

    #[test]
    fn date_accepts_timestamps_and_strings() {
        assert_eq!(apply("date", json!(0), &[]).unwrap(), json!("1970-01-01"));
        assert_eq!(
            apply("date", json!("2024-03-05"), &[json!("%d/%m/%Y")]).unwrap(),
            json!("05/03/2024")
        );
        assert_eq!(
            apply("date", json!("2024-03-05T10:30:00Z"), &[json!("%H:%M")]).unwrap(),
            json!("10:30")
        );
        assert!(apply("date", json!("yesterday"), &[]).is_err());
    }

    #[test]
    fn format_substitutes_placeholders() {
        assert_eq!(apply("format", json!(5), &[json!("%s items")]).unwrap(), json!("5 items"));
        assert_eq!(
            apply("format", json!("x"), &[json!("{} and {}"), json!("y")]).unwrap(),
            json!("x and y")
        );
        assert_eq!(apply("format", json!(9.7), &[json!("%d%%")]).unwrap(), json!("9%"));
        assert!(apply("format", json!(1), &[]).is_err());
    }

    #[test]
    fn number_groups_thousands() {
        assert_eq!(apply("number", json!(1234567.891), &[]).unwrap(), json!("1 234 567,89"));
        assert_eq!(apply("number", json!(999), &[json!(0)]).unwrap(), json!("999"));
        assert_eq!(apply("number", json!(-1500), &[json!(1)]).unwrap(), json!("-1 500,0"));
        assert!(apply("number", json!("abc"), &[]).is_err());
    }

    #[test]
    fn url_encoding() {
        assert_eq!(url_encode("a b&c/é"), "a+b%26c%2F%C3%A9");
    }

    #[test]
    fn safe_filters_escape_themselves() {
        assert_eq!(apply("escape", json!("<b>"), &[]).unwrap(), json!("&lt;b&gt;"));
        assert_eq!(apply("nl2br", json!("a\n<b>"), &[]).unwrap(), json!("a<br />\n&lt;b&gt;"));
        assert_eq!(apply("raw", json!("<b>"), &[]).unwrap(), json!("<b>"));
    }
}
