use std::{collections::BTreeMap, sync::Arc};

use rustc_hash::FxHashMap;
use smol_str::SmolStr;

use crate::value::{Dict, Value};

type Frame = FxHashMap<SmolStr, Value>;

/// The name to value mapping a template is rendered against.
///
/// A context is a stack of frames. Narrowing it with [`Context::scope`]
/// pushes a frame onto a cheap clone, so the caller's context is never
/// touched. Lookups search the innermost frame first.
#[derive(Debug, Clone, Default)]
pub struct Context {
    frames: Vec<Arc<Frame>>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a JSON object into a context.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str::<serde_json::Map<String, serde_json::Value>>(json).map(Self::from)
    }

    pub fn insert(&mut self, name: impl Into<SmolStr>, value: impl Into<Value>) {
        if self.frames.is_empty() {
            self.frames.push(Arc::new(Frame::default()));
        }

        if let Some(frame) = self.frames.last_mut() {
            Arc::make_mut(frame).insert(name.into(), value.into());
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.frames.iter().rev().find_map(|frame| frame.get(name))
    }

    /// Returns a new context with `bindings` layered over this one.
    pub fn scope<K, V>(&self, bindings: impl IntoIterator<Item = (K, V)>) -> Context
    where
        K: Into<SmolStr>,
        V: Into<Value>,
    {
        let frame = bindings
            .into_iter()
            .map(|(name, value)| (name.into(), value.into()))
            .collect::<Frame>();
        let mut frames = self.frames.clone();
        frames.push(Arc::new(frame));

        Context { frames }
    }
}

impl<K: Into<SmolStr>, V: Into<Value>> FromIterator<(K, V)> for Context {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Context::new().scope(iter)
    }
}

impl From<serde_json::Map<String, serde_json::Value>> for Context {
    fn from(map: serde_json::Map<String, serde_json::Value>) -> Self {
        map.into_iter().collect()
    }
}

/// The reserved `helpers` namespace of a template.
///
/// Expressions read it through the identifier `helpers`, which is never
/// looked up in the render context.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Helpers(Dict);

impl Helpers {
    pub fn new(helpers: BTreeMap<SmolStr, Value>) -> Self {
        Self(Arc::new(helpers))
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[inline(always)]
    pub fn as_value(&self) -> Value {
        Value::Dict(Arc::clone(&self.0))
    }
}
