use std::cmp::Ordering;

use smol_str::SmolStr;

use super::EvalError;
use crate::Value;
use crate::number::Number;

pub fn add(lhs: &Value, rhs: &Value) -> Result<Value, EvalError> {
    match (lhs, rhs) {
        (Value::Number(a), Value::Number(b)) => Ok(Value::Number(*a + *b)),
        (Value::String(a), Value::String(b)) => Ok(Value::String(format!("{}{}", a, b))),
        (Value::Array(a), Value::Array(b)) => Ok(a.iter().chain(b.iter()).cloned().collect()),
        (a, b) => Err(EvalError::invalid_types("+", &[a, b])),
    }
}

pub fn sub(lhs: &Value, rhs: &Value) -> Result<Value, EvalError> {
    match (lhs, rhs) {
        (Value::Number(a), Value::Number(b)) => Ok(Value::Number(*a - *b)),
        (a, b) => Err(EvalError::invalid_types("-", &[a, b])),
    }
}

pub fn mul(lhs: &Value, rhs: &Value) -> Result<Value, EvalError> {
    match (lhs, rhs) {
        (Value::Number(a), Value::Number(b)) => Ok(Value::Number(*a * *b)),
        (Value::String(s), Value::Number(n)) | (Value::Number(n), Value::String(s)) => {
            let count = repeat_count(n);
            repeat_len(s.len(), count, 1)?;
            Ok(Value::String(s.repeat(count)))
        }
        (Value::Array(a), Value::Number(n)) | (Value::Number(n), Value::Array(a)) => {
            let len = repeat_len(a.len(), repeat_count(n), std::mem::size_of::<Value>())?;
            Ok(a.iter().cycle().take(len).cloned().collect())
        }
        (a, b) => Err(EvalError::invalid_types("*", &[a, b])),
    }
}

pub fn div(lhs: &Value, rhs: &Value) -> Result<Value, EvalError> {
    match (lhs, rhs) {
        (Value::Number(_), Value::Number(b)) if b.is_zero() => Err(EvalError::ZeroDivision),
        (Value::Number(a), Value::Number(b)) => Ok(Value::Number(*a / *b)),
        (a, b) => Err(EvalError::invalid_types("/", &[a, b])),
    }
}

pub fn floor_div(lhs: &Value, rhs: &Value) -> Result<Value, EvalError> {
    match (lhs, rhs) {
        (Value::Number(_), Value::Number(b)) if b.is_zero() => Err(EvalError::ZeroDivision),
        (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a.floor_div(*b))),
        (a, b) => Err(EvalError::invalid_types("//", &[a, b])),
    }
}

pub fn modulo(lhs: &Value, rhs: &Value) -> Result<Value, EvalError> {
    match (lhs, rhs) {
        (Value::Number(_), Value::Number(b)) if b.is_zero() => Err(EvalError::ZeroDivision),
        (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a.modulo(*b))),
        (a, b) => Err(EvalError::invalid_types("%", &[a, b])),
    }
}

pub fn pow(lhs: &Value, rhs: &Value) -> Result<Value, EvalError> {
    match (lhs, rhs) {
        (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a.pow(*b))),
        (a, b) => Err(EvalError::invalid_types("**", &[a, b])),
    }
}

pub fn neg(operand: &Value) -> Result<Value, EvalError> {
    match operand {
        Value::Number(n) => Ok(Value::Number(-*n)),
        a => Err(EvalError::invalid_types("-", &[a])),
    }
}

pub fn pos(operand: &Value) -> Result<Value, EvalError> {
    match operand {
        Value::Number(n) => Ok(Value::Number(*n)),
        a => Err(EvalError::invalid_types("+", &[a])),
    }
}

pub fn ordering(name: &str, lhs: &Value, rhs: &Value) -> Result<Ordering, EvalError> {
    lhs.partial_cmp(rhs)
        .ok_or_else(|| EvalError::invalid_types(name, &[lhs, rhs]))
}

/// Membership test backing the `in` operator.
pub fn contains(container: &Value, item: &Value) -> Result<bool, EvalError> {
    match (container, item) {
        (Value::String(haystack), Value::String(needle)) => Ok(haystack.contains(needle.as_str())),
        (Value::Array(items), item) => Ok(items.contains(item)),
        (Value::Dict(map), Value::String(key)) => Ok(map.contains_key(key.as_str())),
        (Value::Dict(_), _) => Ok(false),
        (a, b) => Err(EvalError::invalid_types("in", &[b, a])),
    }
}

pub fn index(value: &Value, index: &Value) -> Result<Value, EvalError> {
    match (value, index) {
        (Value::Array(items), Value::Number(n)) if n.is_int() => {
            resolve_index(*n, items.len()).map(|i| items[i].clone())
        }
        (Value::String(s), Value::Number(n)) if n.is_int() => {
            let chars = s.chars().collect::<Vec<_>>();
            resolve_index(*n, chars.len()).map(|i| Value::String(chars[i].to_string()))
        }
        (Value::Dict(map), Value::String(key)) => map
            .get(key.as_str())
            .cloned()
            .ok_or_else(|| EvalError::KeyNotFound(format!(r#""{}""#, key))),
        (a, b) => Err(EvalError::invalid_types("[]", &[a, b])),
    }
}

pub fn attribute(value: &Value, name: &SmolStr) -> Result<Value, EvalError> {
    match value {
        Value::Dict(map) => map.get(name).cloned().ok_or_else(|| EvalError::AttributeNotFound {
            ty: SmolStr::new(value.name()),
            name: name.clone(),
        }),
        a => Err(EvalError::AttributeNotFound {
            ty: SmolStr::new(a.name()),
            name: name.clone(),
        }),
    }
}

pub fn call(callee: &Value, args: &[Value]) -> Result<Value, EvalError> {
    match callee {
        Value::Function(f) => f.call(args),
        a => Err(EvalError::NotCallable(SmolStr::new(a.name()))),
    }
}

fn resolve_index(n: Number, len: usize) -> Result<usize, EvalError> {
    let i = n.to_int();
    let resolved = if i < 0 { len as i64 + i } else { i };

    if resolved < 0 || resolved >= len as i64 {
        Err(EvalError::IndexOutOfBounds(i))
    } else {
        Ok(resolved as usize)
    }
}

fn repeat_count(n: &Number) -> usize {
    if n.value() <= 0.0 { 0 } else { n.to_int() as usize }
}

/// Length of `len` items repeated `count` times, bounded by what can be allocated.
fn repeat_len(len: usize, count: usize, item_size: usize) -> Result<usize, EvalError> {
    len.checked_mul(count)
        .filter(|total| {
            total
                .checked_mul(item_size)
                .is_some_and(|bytes| bytes <= isize::MAX as usize)
        })
        .ok_or_else(|| EvalError::Runtime("repeat count too large".to_string()))
}
