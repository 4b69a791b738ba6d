//! Runtime value semantics: truthiness, display, comparison, arithmetic
//! and HTML escaping.

use std::cmp::Ordering;

use serde_json::{Number, Value};

use super::ast::BinaryOp;

/// Whether a value counts as true in a condition.
///
/// `null`, `false`, `0`, `0.0`, `""`, `"0"` and empty collections are false.
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty() && s != "0",
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

/// Text written for a value by an echo.
pub fn to_display(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Escape the five HTML-significant characters.
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            c => out.push(c),
        }
    }
    out
}

/// Numeric view of a value. Numeric strings count; booleans are 0/1.
pub fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::Null => Some(0.0),
        _ => None,
    }
}

/// Equality with numeric coercion, so `1 == "1"` and `1 == 1.0` hold.
pub fn loose_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(_), Value::String(_)) | (Value::String(_), Value::Number(_)) => {
            match (as_number(a), as_number(b)) {
                (Some(x), Some(y)) => x == y,
                _ => false,
            }
        }
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

/// Ordering for `<`, `<=`, `>` and `>=`. Strings compare lexically unless
/// both sides are numeric.
pub fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    if let (Value::String(x), Value::String(y)) = (a, b) {
        if let (Ok(x), Ok(y)) = (x.trim().parse::<f64>(), y.trim().parse::<f64>()) {
            return x.partial_cmp(&y);
        }
        return Some(x.cmp(y));
    }
    match (as_number(a), as_number(b)) {
        (Some(x), Some(y)) => x.partial_cmp(&y),
        _ => None,
    }
}

/// Apply an arithmetic or concatenation operator.
///
/// Logical and comparison operators are evaluated by the caller since they
/// short-circuit; passing one here is an error.
pub fn arithmetic(op: BinaryOp, a: &Value, b: &Value) -> Result<Value, String> {
    if op == BinaryOp::Concat {
        return Ok(Value::String(format!("{}{}", to_display(a), to_display(b))));
    }

    if op == BinaryOp::Add {
        if let (Value::Array(x), Value::Array(y)) = (a, b) {
            let mut items = x.clone();
            items.extend(y.iter().cloned());
            return Ok(Value::Array(items));
        }
    }

    let (Some(x), Some(y)) = (as_number(a), as_number(b)) else {
        return Err(format!(
            "unsupported operand types for {}: {} and {}",
            symbol(op),
            type_name(a),
            type_name(b)
        ));
    };

    // Stay in integers when both operands are integral.
    if let (Some(i), Some(j)) = (as_integer(a), as_integer(b)) {
        let result = match op {
            BinaryOp::Add => i.checked_add(j),
            BinaryOp::Sub => i.checked_sub(j),
            BinaryOp::Mul => i.checked_mul(j),
            BinaryOp::Rem if j == 0 => return Err("modulo by zero".to_string()),
            BinaryOp::Rem => i.checked_rem(j),
            BinaryOp::Div if i.checked_rem(j) == Some(0) => i.checked_div(j),
            _ => None,
        };
        if let Some(n) = result {
            return Ok(Value::from(n));
        }
    }

    let result = match op {
        BinaryOp::Add => x + y,
        BinaryOp::Sub => x - y,
        BinaryOp::Mul => x * y,
        BinaryOp::Div if y == 0.0 => return Err("division by zero".to_string()),
        BinaryOp::Div => x / y,
        BinaryOp::Rem if y == 0.0 => return Err("modulo by zero".to_string()),
        BinaryOp::Rem => x % y,
        other => return Err(format!("'{}' is not an arithmetic operator", symbol(other))),
    };
    Ok(float(result))
}

/// Wrap an `f64`, collapsing integral results to integers.
pub fn float(f: f64) -> Value {
    if f.fract() == 0.0 && f.abs() < 9.0e15 {
        Value::from(f as i64)
    } else {
        Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null)
    }
}

fn as_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        Value::Bool(b) => Some(*b as i64),
        Value::Null => Some(0),
        _ => None,
    }
}

/// Short type name used in error messages.
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn symbol(op: BinaryOp) -> &'static str {
    match op {
        BinaryOp::Add => "+",
        BinaryOp::Sub => "-",
        BinaryOp::Mul => "*",
        BinaryOp::Div => "/",
        BinaryOp::Rem => "%",
        BinaryOp::Concat => "~",
        BinaryOp::Eq => "==",
        BinaryOp::Ne => "!=",
        BinaryOp::Lt => "<",
        BinaryOp::Le => "<=",
        BinaryOp::Gt => ">",
        BinaryOp::Ge => ">=",
        BinaryOp::And => "&&",
        BinaryOp::Or => "||",
        BinaryOp::Coalesce => "??",
    }
}
