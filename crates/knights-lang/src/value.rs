use std::{borrow::Cow, cmp::Ordering, collections::BTreeMap, fmt, sync::Arc};

use itertools::Itertools;
use smol_str::SmolStr;

use crate::eval::EvalError;
use crate::number::Number;

pub type Array = Arc<Vec<Value>>;
pub type Dict = Arc<BTreeMap<SmolStr, Value>>;

type NativeFn = dyn Fn(&[Value]) -> Result<Value, EvalError> + Send + Sync;

/// A callable value: a helper registered by a library or a lambda created
/// while evaluating an expression.
#[derive(Clone)]
pub struct Function {
    name: SmolStr,
    body: Arc<NativeFn>,
}

impl Function {
    pub fn new<F>(name: impl Into<SmolStr>, body: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, EvalError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            body: Arc::new(body),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline(always)]
    pub fn call(&self, args: &[Value]) -> Result<Value, EvalError> {
        (self.body)(args)
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "function/{}", self.name)
    }
}

impl PartialEq for Function {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.body, &other.body)
    }
}

#[derive(Clone, Default)]
pub enum Value {
    #[default]
    None,
    Bool(bool),
    Number(Number),
    String(String),
    Array(Array),
    Dict(Dict),
    Function(Function),
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::None, Value::None) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Dict(a), Value::Dict(b)) => a == b,
            (Value::Function(a), Value::Function(b)) => a == b,
            _ => false,
        }
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a.partial_cmp(b),
            (Value::Bool(a), Value::Bool(b)) => a.partial_cmp(b),
            (Value::String(a), Value::String(b)) => a.partial_cmp(b),
            (Value::Array(a), Value::Array(b)) => a.as_slice().partial_cmp(b.as_slice()),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<Number> for Value {
    fn from(n: Number) -> Self {
        Value::Number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n.into())
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n.into())
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Number(n.into())
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n.into())
    }
}

impl From<Vec<Value>> for Value {
    fn from(arr: Vec<Value>) -> Self {
        Value::Array(Arc::new(arr))
    }
}

impl From<BTreeMap<SmolStr, Value>> for Value {
    fn from(map: BTreeMap<SmolStr, Value>) -> Self {
        Value::Dict(Arc::new(map))
    }
}

impl From<Function> for Value {
    fn from(f: Function) -> Self {
        Value::Function(f)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or_default()
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::None,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().map(Number::from).unwrap_or_default()),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => items.into_iter().map(Value::from).collect::<Vec<_>>().into(),
            serde_json::Value::Object(map) => map
                .into_iter()
                .map(|(k, v)| (SmolStr::from(k), Value::from(v)))
                .collect::<BTreeMap<_, _>>()
                .into(),
        }
    }
}

impl FromIterator<Value> for Value {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        iter.into_iter().collect::<Vec<_>>().into()
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        let value: Cow<'_, str> = match self {
            Self::None => Cow::Borrowed(""),
            Self::String(s) => Cow::Borrowed(s),
            a => a.string(),
        };
        write!(f, "{}", value)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        write!(f, "{}", self.string())
    }
}

impl Value {
    pub const NONE: Value = Self::None;
    pub const TRUE: Value = Self::Bool(true);
    pub const FALSE: Value = Self::Bool(false);

    pub fn function<F>(name: impl Into<SmolStr>, body: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, EvalError> + Send + Sync + 'static,
    {
        Value::Function(Function::new(name, body))
    }

    pub fn dict<K: Into<SmolStr>>(entries: impl IntoIterator<Item = (K, Value)>) -> Self {
        entries
            .into_iter()
            .map(|(k, v)| (k.into(), v))
            .collect::<BTreeMap<_, _>>()
            .into()
    }

    #[inline(always)]
    pub fn name(&self) -> &'static str {
        match self {
            Value::None => "None",
            Value::Bool(_) => "bool",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Dict(_) => "dict",
            Value::Function(_) => "function",
        }
    }

    #[inline(always)]
    pub fn is_none(&self) -> bool {
        matches!(self, Value::None)
    }

    #[inline(always)]
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::None => false,
            Value::Bool(b) => *b,
            Value::Number(n) => !n.is_zero(),
            Value::String(s) => !s.is_empty(),
            Value::Array(a) => !a.is_empty(),
            Value::Dict(d) => !d.is_empty(),
            Value::Function(_) => true,
        }
    }

    /// Items produced when the value is iterated: array elements, dict keys
    /// or the characters of a string.
    pub fn iter_items(&self) -> Result<Vec<Value>, EvalError> {
        match self {
            Value::Array(items) => Ok(items.to_vec()),
            Value::Dict(map) => Ok(map.keys().map(|k| Value::String(k.to_string())).collect()),
            Value::String(s) => Ok(s.chars().map(|c| Value::String(c.to_string())).collect()),
            a => Err(EvalError::invalid_types("iter", &[a])),
        }
    }

    fn string(&self) -> Cow<'_, str> {
        match self {
            Self::None => Cow::Borrowed("None"),
            Self::Bool(b) => Cow::Owned(b.to_string()),
            Self::Number(n) => Cow::Owned(n.to_string()),
            Self::String(s) => Cow::Owned(format!(r#""{}""#, s)),
            Self::Array(a) => Cow::Owned(format!("[{}]", a.iter().map(|v| v.string()).join(", "))),
            Self::Dict(map) => Cow::Owned(format!(
                "{{{}}}",
                map.iter().map(|(k, v)| format!("\"{}\": {}", k, v.string())).join(", ")
            )),
            Self::Function(f) => Cow::Owned(format!("function/{}", f.name())),
        }
    }
}
