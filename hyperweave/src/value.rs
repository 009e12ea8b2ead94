//! Dynamic slot values.
//!
//! A [`Value`] is what a caller supplies for one slot of a render call. It is a
//! closed set of shapes; every serializer dispatches on the variant instead of
//! sniffing properties.

use std::borrow::Cow;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures_util::future::{BoxFuture, FutureExt};
use indexmap::IndexMap;

use crate::error::BoxError;

/// An ordered string-keyed map, used for style objects and transformer input.
pub type Object = IndexMap<String, Value>;

/// A pending slot value.
pub type ValueFuture = BoxFuture<'static, Result<Value, BoxError>>;

/// Anything that can render itself to a value.
///
/// Components are rendered wherever they show up: as a slot value or as an
/// element of an array.
pub trait Component: Send + Sync {
    /// Produce the value to serialize in place of this component.
    fn render(&self) -> Value;
}

impl<F> Component for F
where
    F: Fn() -> Value + Send + Sync,
{
    fn render(&self) -> Value {
        self()
    }
}

/// A callable event handler, carried as its source text.
///
/// ```
/// use hyperweave::Handler;
///
/// assert_eq!(Handler::new("onClick(e) { go(e) }").normalized(), "function onClick(e) { go(e) }");
/// assert_eq!(Handler::new("function (e) {}").normalized(), "function (e) {}");
/// assert_eq!(Handler::new("e => go(e)").normalized(), "e => go(e)");
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct Handler {
    source: Arc<str>,
}

impl Handler {
    /// Wrap handler source text.
    pub fn new(source: impl Into<Arc<str>>) -> Self {
        Self {
            source: source.into(),
        }
    }

    /// The source text as given.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Source text with shorthand method syntax (`name(args) { .. }`) rewritten
    /// as a named function expression so it can be called in place.
    pub fn normalized(&self) -> Cow<'_, str> {
        if is_method_shorthand(&self.source) {
            Cow::Owned(format!("function {}", self.source))
        } else {
            Cow::Borrowed(&self.source)
        }
    }
}

/// `name(` with no whitespace before the paren, where `name` is not `function`.
fn is_method_shorthand(source: &str) -> bool {
    let Some(paren) = source.find('(') else {
        return false;
    };
    let head = &source[..paren];
    let starts_like_identifier = head
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_lowercase() || c == '$' || c == '_');
    starts_like_identifier
        && !head.chars().any(char::is_whitespace)
        && !head.starts_with("function")
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Handler").field(&self.source).finish()
    }
}

/// How a [`Placeholder`]'s resolved value is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderKind {
    /// Stringified and escaped.
    Text,
    /// Inserted as raw markup.
    Html,
    /// Serialized like any other value.
    Any,
}

type Producer = Box<dyn FnOnce() -> ValueFuture + Send>;

enum PlaceholderSource {
    Value(Box<Value>),
    Deferred(Producer),
}

/// A lazily resolved value.
///
/// Placeholders always take the asynchronous path: the producer (if any) is
/// invoked only when the render call resolves its slots.
pub struct Placeholder {
    kind: PlaceholderKind,
    source: PlaceholderSource,
}

impl Placeholder {
    /// Resolve `value` (possibly a future) and escape it as text.
    pub fn text(value: impl Into<Value>) -> Self {
        Self::with_value(PlaceholderKind::Text, value.into())
    }

    /// Resolve `value` (possibly a future) and insert it as raw markup.
    pub fn html(value: impl Into<Value>) -> Self {
        Self::with_value(PlaceholderKind::Html, value.into())
    }

    /// Resolve `value` (possibly a future) and serialize it normally.
    pub fn any(value: impl Into<Value>) -> Self {
        Self::with_value(PlaceholderKind::Any, value.into())
    }

    /// Call `producer` at resolution time to obtain the value.
    pub fn deferred<F, Fut, E>(kind: PlaceholderKind, producer: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<Value, E>> + Send + 'static,
        E: Into<BoxError>,
    {
        Self {
            kind,
            source: PlaceholderSource::Deferred(Box::new(move || {
                producer().map(|result| result.map_err(Into::into)).boxed()
            })),
        }
    }

    fn with_value(kind: PlaceholderKind, value: Value) -> Self {
        Self {
            kind,
            source: PlaceholderSource::Value(Box::new(value)),
        }
    }

    /// The interpretation applied after resolution.
    pub fn kind(&self) -> PlaceholderKind {
        self.kind
    }

    /// Split into the kind and the value still to resolve.
    pub(crate) fn into_parts(self) -> (PlaceholderKind, Value) {
        let value = match self.source {
            PlaceholderSource::Value(value) => *value,
            PlaceholderSource::Deferred(producer) => Value::Future(producer()),
        };
        (self.kind, value)
    }
}

impl fmt::Debug for Placeholder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let source = match &self.source {
            PlaceholderSource::Value(value) => format!("{value:?}"),
            PlaceholderSource::Deferred(_) => "<deferred>".to_string(),
        };
        f.debug_struct("Placeholder")
            .field("kind", &self.kind)
            .field("source", &source)
            .finish()
    }
}

/// A value supplied for one slot.
pub enum Value {
    /// Absent value; serializes as nothing.
    Null,
    /// Boolean.
    Bool(bool),
    /// Integer.
    Int(i64),
    /// Floating-point number.
    Float(f64),
    /// Text, escaped on output.
    Str(String),
    /// Trusted markup, inserted as-is in content position.
    Html(String),
    /// Child content; elements are serialized one by one.
    Array(Vec<Value>),
    /// String-keyed map: a style object, or input for a content transformer.
    Object(Object),
    /// Something that renders itself.
    Component(Arc<dyn Component>),
    /// An event handler.
    Handler(Handler),
    /// A value that is not available yet.
    Future(ValueFuture),
    /// A lazily resolved value.
    Placeholder(Placeholder),
}

impl Value {
    /// Wrap a future producing a value.
    pub fn future<Fut, E>(future: Fut) -> Self
    where
        Fut: Future<Output = Result<Value, E>> + Send + 'static,
        E: Into<BoxError>,
    {
        Value::Future(future.map(|result| result.map_err(Into::into)).boxed())
    }

    /// Trusted markup.
    pub fn html(markup: impl Into<String>) -> Self {
        Value::Html(markup.into())
    }

    /// A component.
    pub fn component(component: impl Component + 'static) -> Self {
        Value::Component(Arc::new(component))
    }

    /// An event handler given as source text.
    pub fn handler(source: impl Into<Arc<str>>) -> Self {
        Value::Handler(Handler::new(source))
    }

    /// Build an object from key/value pairs, keeping their order.
    pub fn object<K, V, I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        Value::Object(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Whether rendering this value requires awaiting something.
    ///
    /// Futures and placeholders do; arrays do when any element does.
    pub fn is_async(&self) -> bool {
        match self {
            Value::Future(_) | Value::Placeholder(_) => true,
            Value::Array(items) => items.iter().any(Value::is_async),
            _ => false,
        }
    }

    /// Whether the value is "falsy": null, `false`, zero, NaN or the empty string.
    pub fn is_falsy(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Bool(b) => !b,
            Value::Int(i) => *i == 0,
            Value::Float(f) => *f == 0.0 || f.is_nan(),
            Value::Str(s) => s.is_empty(),
            _ => false,
        }
    }

    /// Whether the value is a number.
    pub fn is_number(&self) -> bool {
        matches!(self, Value::Int(_) | Value::Float(_))
    }

    /// Plain string form of the value, without any escaping.
    ///
    /// Null is empty, integral floats have no fraction, arrays are joined with
    /// `,`, components are rendered first. Objects and pending values have no
    /// string form and give the empty string.
    pub fn to_text(&self) -> Cow<'_, str> {
        match self {
            Value::Null => Cow::Borrowed(""),
            Value::Bool(true) => Cow::Borrowed("true"),
            Value::Bool(false) => Cow::Borrowed("false"),
            Value::Int(i) => Cow::Owned(i.to_string()),
            Value::Float(f) => Cow::Owned(format_float(*f)),
            Value::Str(s) | Value::Html(s) => Cow::Borrowed(s),
            Value::Array(items) => Cow::Owned(
                items
                    .iter()
                    .map(|item| item.to_text())
                    .collect::<Vec<_>>()
                    .join(","),
            ),
            Value::Component(component) => Cow::Owned(component.render().to_text().into_owned()),
            Value::Handler(handler) => Cow::Borrowed(handler.source()),
            Value::Object(_) | Value::Future(_) | Value::Placeholder(_) => Cow::Borrowed(""),
        }
    }

    #[cfg_attr(not(feature = "tracing"), allow(dead_code))]
    pub(crate) fn shape(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::Html(_) => "html",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
            Value::Component(_) => "component",
            Value::Handler(_) => "handler",
            Value::Future(_) => "future",
            Value::Placeholder(_) => "placeholder",
        }
    }
}

/// Format a float the way a browser would print it.
pub(crate) fn format_float(f: f64) -> String {
    if f.is_nan() {
        "NaN".to_string()
    } else if f.is_infinite() {
        if f > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if f == 0.0 {
        "0".to_string()
    } else if f.abs() >= 1e21 || f.abs() < 1e-6 {
        // shortest digits in exponent form, with an explicit sign: 1e+21, 1.5e-7
        let formatted = format!("{f:e}");
        match formatted.split_once('e') {
            Some((mantissa, exponent)) if !exponent.starts_with('-') => {
                format!("{mantissa}e+{exponent}")
            }
            _ => formatted,
        }
    } else {
        f.to_string()
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("Null"),
            Value::Bool(b) => f.debug_tuple("Bool").field(b).finish(),
            Value::Int(i) => f.debug_tuple("Int").field(i).finish(),
            Value::Float(x) => f.debug_tuple("Float").field(x).finish(),
            Value::Str(s) => f.debug_tuple("Str").field(s).finish(),
            Value::Html(s) => f.debug_tuple("Html").field(s).finish(),
            Value::Array(items) => f.debug_tuple("Array").field(items).finish(),
            Value::Object(map) => f.debug_tuple("Object").field(map).finish(),
            Value::Component(_) => f.write_str("Component(..)"),
            Value::Handler(h) => h.fmt(f),
            Value::Future(_) => f.write_str("Future(..)"),
            Value::Placeholder(p) => p.fmt(f),
        }
    }
}

impl From<()> for Value {
    fn from((): ()) -> Self {
        Value::Null
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

macro_rules! from_int {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Value {
                fn from(i: $t) -> Self {
                    Value::Int(i64::from(i))
                }
            }
        )*
    };
}

from_int!(i8, i16, i32, i64, u8, u16, u32);

impl From<f32> for Value {
    fn from(f: f32) -> Self {
        Value::Float(f64::from(f))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<Cow<'_, str>> for Value {
    fn from(s: Cow<'_, str>) -> Self {
        Value::Str(s.into_owned())
    }
}

impl From<Handler> for Value {
    fn from(h: Handler) -> Self {
        Value::Handler(h)
    }
}

impl From<Placeholder> for Value {
    fn from(p: Placeholder) -> Self {
        Value::Placeholder(p)
    }
}

impl From<Object> for Value {
    fn from(map: Object) -> Self {
        Value::Object(map)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::Array(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}
