use std::fmt::Write as _;
use std::sync::Arc;

use anyhow::{anyhow, bail};
use chrono::Utc;
use serde_json::Value;

use super::filters::length;
use super::FunctionFn;
use crate::expr::value::{as_number, to_display, truthy};

/// Upper bound on the number of items `range` may produce.
const MAX_RANGE: usize = 100_000;

static NULL: Value = Value::Null;

pub(super) fn builtin() -> Vec<(&'static str, Arc<FunctionFn>)> {
    vec![
        ("count", function(|args| Ok(length(arg(args, 0)).into()))),
        ("asset", function(asset)),
        ("checked", function(|args| Ok(flag(args, "checked")))),
        ("selected", function(|args| Ok(flag(args, "selected")))),
        ("disabled", function(|args| Ok(flag(args, "disabled")))),
        ("now", function(now)),
        ("range", function(range)),
    ]
}

fn function<F>(f: F) -> Arc<FunctionFn>
where
    F: Fn(&[Value]) -> anyhow::Result<Value> + Send + Sync + 'static,
{
    Arc::new(f)
}

fn arg(args: &[Value], index: usize) -> &Value {
    args.get(index).unwrap_or(&NULL)
}

fn flag(args: &[Value], attribute: &str) -> Value {
    if truthy(arg(args, 0)) {
        attribute.into()
    } else {
        "".into()
    }
}

fn asset(args: &[Value]) -> anyhow::Result<Value> {
    let path = to_display(arg(args, 0));
    Ok(format!("/assets/{}", path.trim_start_matches('/')).into())
}

/// `now()` is the unix timestamp; `now(fmt)` formats the current UTC time.
fn now(args: &[Value]) -> anyhow::Result<Value> {
    let current = Utc::now();
    match args.first() {
        None => Ok(current.timestamp().into()),
        Some(fmt) => {
            let fmt = to_display(fmt);
            let mut out = String::new();
            write!(out, "{}", current.format(&fmt))
                .map_err(|_| anyhow!("invalid date format '{}'", fmt))?;
            Ok(out.into())
        }
    }
}

/// Inclusive integer range: `range(1, 3)` is `[1, 2, 3]`.
fn range(args: &[Value]) -> anyhow::Result<Value> {
    let number = |i: usize| {
        as_number(arg(args, i))
            .map(|n| n as i64)
            .ok_or_else(|| anyhow!("range expects numeric arguments"))
    };
    let start = number(0)?;
    let end = number(1)?;
    let step = match args.get(2) {
        Some(_) => number(2)?
            .checked_abs()
            .ok_or_else(|| anyhow!("range step is out of bounds"))?,
        None => 1,
    };
    if step == 0 {
        bail!("range step cannot be zero");
    }

    let span = (i128::from(end) - i128::from(start)).unsigned_abs() / step as u128 + 1;
    if span > MAX_RANGE as u128 {
        bail!("range of {} items exceeds the limit of {}", span, MAX_RANGE);
    }

    let mut items = Vec::with_capacity(span as usize);
    let mut current = start;
    for _ in 0..span {
        items.push(Value::from(current));
        current = if end >= start {
            current.saturating_add(step)
        } else {
            current.saturating_sub(step)
        };
    }
    Ok(Value::Array(items))
}
