//! Engine configuration.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::error::{BoxError, MinifyError};
use crate::value::Value;

/// Transform for an attribute registered as an intent.
///
/// Called with the previous value (always `None` for server-side rendering)
/// and the new value. The result is stringified and escaped; `Null` prints
/// nothing. An error fails the render.
pub type IntentTransform = Arc<dyn Fn(Option<&Value>, &Value) -> Result<Value, BoxError> + Send + Sync>;

/// Transform for objects that carry a registered key.
///
/// Receives the value stored under the key and returns what to serialize
/// instead. The result may be asynchronous; it is awaited on the
/// asynchronous paths and ignored on the synchronous one.
pub type ContentTransform = Arc<dyn Fn(&Value) -> Value + Send + Sync>;

/// Minifier for text inside `script` or `style` elements.
///
/// A failing minifier never fails compilation: the original text is kept.
pub trait Minifier: Send + Sync {
    /// Minify `source`.
    fn minify(&self, source: &str) -> Result<String, MinifyError>;
}

impl<F> Minifier for F
where
    F: Fn(&str) -> Result<String, MinifyError> + Send + Sync,
{
    fn minify(&self, source: &str) -> Result<String, MinifyError> {
        self(source)
    }
}

/// Minifier that returns its input.
#[derive(Debug, Clone, Copy, Default)]
pub struct Passthrough;

impl Minifier for Passthrough {
    fn minify(&self, source: &str) -> Result<String, MinifyError> {
        Ok(source.to_string())
    }
}

/// Options for compiling and rendering.
#[derive(Clone)]
pub struct Options {
    /// Attributes whose values go through a registered transform.
    pub intent_attributes: HashMap<String, IntentTransform>,
    /// Object keys with a registered content transform, in registration order.
    pub content_transformers: IndexMap<String, ContentTransform>,
    /// Surround content slots with boundary markers (default: false).
    pub adoptable: bool,
    /// Minifier applied to `script` text (default: passthrough).
    pub script_minifier: Arc<dyn Minifier>,
    /// Minifier applied to `style` text (default: passthrough).
    pub css_minifier: Arc<dyn Minifier>,
    /// Collapse whitespace runs in literal text outside `pre`, `code`,
    /// `textarea` and CDATA (default: false).
    pub collapse_whitespace: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            intent_attributes: HashMap::new(),
            content_transformers: IndexMap::new(),
            adoptable: false,
            script_minifier: Arc::new(Passthrough),
            css_minifier: Arc::new(Passthrough),
            collapse_whitespace: false,
        }
    }
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut intents: Vec<_> = self.intent_attributes.keys().collect();
        intents.sort();
        f.debug_struct("Options")
            .field("intent_attributes", &intents)
            .field(
                "content_transformers",
                &self.content_transformers.keys().collect::<Vec<_>>(),
            )
            .field("adoptable", &self.adoptable)
            .field("script_minifier", &"...")
            .field("css_minifier", &"...")
            .field("collapse_whitespace", &self.collapse_whitespace)
            .finish()
    }
}

impl Options {
    /// Create new default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a transform for attribute `name`.
    ///
    /// Names are matched as the tokenizer reports them, i.e. lowercase.
    pub fn intent_attribute<F>(mut self, name: impl Into<String>, transform: F) -> Self
    where
        F: Fn(Option<&Value>, &Value) -> Result<Value, BoxError> + Send + Sync + 'static,
    {
        self.intent_attributes
            .insert(name.into().to_ascii_lowercase(), Arc::new(transform));
        self
    }

    /// Register a transform for objects carrying `key`.
    ///
    /// Re-registering a key replaces the transform but keeps its position.
    pub fn content_transformer<F>(mut self, key: impl Into<String>, transform: F) -> Self
    where
        F: Fn(&Value) -> Value + Send + Sync + 'static,
    {
        self.content_transformers
            .insert(key.into(), Arc::new(transform));
        self
    }

    /// Emit boundary markers around content slots.
    pub const fn adoptable(mut self, value: bool) -> Self {
        self.adoptable = value;
        self
    }

    /// Set the `script` minifier.
    pub fn script_minifier(mut self, minifier: impl Minifier + 'static) -> Self {
        self.script_minifier = Arc::new(minifier);
        self
    }

    /// Set the `style` minifier.
    pub fn css_minifier(mut self, minifier: impl Minifier + 'static) -> Self {
        self.css_minifier = Arc::new(minifier);
        self
    }

    /// Collapse whitespace in literal text.
    pub const fn collapse_whitespace(mut self, value: bool) -> Self {
        self.collapse_whitespace = value;
        self
    }

    /// Whether `name` is registered as an intent attribute.
    pub fn is_intent(&self, name: &str) -> bool {
        self.intent_attributes.contains_key(name)
    }
}
