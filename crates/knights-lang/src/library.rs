pub mod error;
pub mod resolver;

use std::{collections::BTreeMap, fmt, sync::Arc};

use itertools::Itertools;
use rustc_hash::FxHashMap;
use smol_str::SmolStr;

use crate::context::Helpers;
use crate::parser::{Parser, error::ParseError};
use crate::statement::Statement;
use crate::value::Value;

/// A handler for one block tag such as `{% if ... %}`.
///
/// The handler receives the parser and the raw argument text following the
/// tag name. It returns a statement to append to the current scope, or
/// `None` when it only drove the parser (opening a method, setting the
/// parent template).
pub trait Tag: Send + Sync {
    fn parse(&self, parser: &mut Parser<'_>, args: &str) -> Result<Option<Statement>, ParseError>;
}

struct TagFn<F>(F);

impl<F> Tag for TagFn<F>
where
    F: Fn(&mut Parser<'_>, &str) -> Result<Option<Statement>, ParseError> + Send + Sync,
{
    fn parse(&self, parser: &mut Parser<'_>, args: &str) -> Result<Option<Statement>, ParseError> {
        (self.0)(parser, args)
    }
}

/// A bundle of tag handlers and helpers.
///
/// Merging a library into another replaces entries key for key, so merging
/// the same library twice leaves the target unchanged.
#[derive(Clone, Default)]
pub struct Library {
    tags: FxHashMap<SmolStr, Arc<dyn Tag>>,
    helpers: BTreeMap<SmolStr, Value>,
}

impl Library {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_tag(&mut self, name: impl Into<SmolStr>, tag: impl Tag + 'static) -> &mut Self {
        self.tags.insert(name.into(), Arc::new(tag));
        self
    }

    pub fn register_tag_fn<F>(&mut self, name: impl Into<SmolStr>, f: F) -> &mut Self
    where
        F: Fn(&mut Parser<'_>, &str) -> Result<Option<Statement>, ParseError> + Send + Sync + 'static,
    {
        self.register_tag(name, TagFn(f))
    }

    pub fn register_helper(&mut self, name: impl Into<SmolStr>, value: impl Into<Value>) -> &mut Self {
        self.helpers.insert(name.into(), value.into());
        self
    }

    pub fn tag(&self, name: &str) -> Option<Arc<dyn Tag>> {
        self.tags.get(name).cloned()
    }

    pub fn has_tag(&self, name: &str) -> bool {
        self.tags.contains_key(name)
    }

    pub fn helper(&self, name: &str) -> Option<&Value> {
        self.helpers.get(name)
    }

    pub fn tag_names(&self) -> Vec<&str> {
        self.tags.keys().map(SmolStr::as_str).sorted().collect()
    }

    pub fn helper_names(&self) -> Vec<&str> {
        self.helpers.keys().map(SmolStr::as_str).collect()
    }

    pub fn merge(&mut self, other: &Library) {
        self.tags
            .extend(other.tags.iter().map(|(name, tag)| (name.clone(), Arc::clone(tag))));
        self.helpers
            .extend(other.helpers.iter().map(|(name, value)| (name.clone(), value.clone())));
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty() && self.helpers.is_empty()
    }

    pub(crate) fn to_helpers(&self) -> Helpers {
        Helpers::new(self.helpers.clone())
    }
}

impl fmt::Debug for Library {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Library")
            .field("tags", &self.tag_names())
            .field("helpers", &self.helper_names())
            .finish()
    }
}
