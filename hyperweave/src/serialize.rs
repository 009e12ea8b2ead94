//! Turning slot values into markup.

use std::borrow::Cow;
use std::sync::{Arc, LazyLock};
use std::sync::atomic::{AtomicU64, Ordering};

use regex::{Captures, Regex};

use crate::error::RenderError;
use crate::escape::escape;
use crate::options::Options;
use crate::template::SlotKind;
use crate::tracing_macros::{trace, warning};
use crate::value::{Object, Value};

/// CSS properties that take unitless numbers.
static NON_DIMENSIONAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)acit|ex(?:s|g|n|p|$)|rph|ows|mnc|ntw|ine[ch]|zoo|^ord")
        .unwrap_or_else(|e| panic!("BUG: invalid non-dimensional pattern: {e}"))
});

/// A run of capitals following anything else: `backgroundColor` -> `background-color`.
static CAMEL_HUMP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([^A-Z])([A-Z]+)")
        .unwrap_or_else(|e| panic!("BUG: invalid camel-case pattern: {e}"))
});

fn hyphenate(key: &str) -> Cow<'_, str> {
    CAMEL_HUMP.replace_all(key, |caps: &Captures<'_>| {
        format!("{}-{}", &caps[1], caps[2].to_ascii_lowercase())
    })
}

fn css_value<'v>(key: &str, value: &'v Value) -> Cow<'v, str> {
    if value.is_number() && !NON_DIMENSIONAL.is_match(key) {
        Cow::Owned(format!("{}px", value.to_text()))
    } else {
        value.to_text()
    }
}

/// Format `n` in base 36, lowercase.
fn base36(mut n: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let mut out = Vec::new();
    loop {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
        if n == 0 {
            break;
        }
    }
    out.reverse();
    String::from_utf8_lossy(&out).into_owned()
}

struct Inner {
    options: Options,
    markers: AtomicU64,
}

/// Serializes slot values according to their [`SlotKind`].
///
/// Cloning is cheap and shares the marker counter, so every clone hands out
/// distinct adoptable markers.
#[derive(Clone)]
pub struct Serializer {
    inner: Arc<Inner>,
}

impl Serializer {
    /// Create a serializer for `options`.
    pub fn new(options: Options) -> Self {
        Self {
            inner: Arc::new(Inner {
                options,
                markers: AtomicU64::new(0),
            }),
        }
    }

    /// The options this serializer was built with.
    pub fn options(&self) -> &Options {
        &self.inner.options
    }

    /// A fresh hyper-comment marker, or the empty string outside adoptable mode.
    ///
    /// ```
    /// use hyperweave::{Options, Serializer};
    ///
    /// let s = Serializer::new(Options::new().adoptable(true));
    /// assert_eq!(s.marker(), "<!--\u{1}:1-->");
    /// assert_eq!(s.marker(), "<!--\u{1}:2-->");
    /// assert_eq!(Serializer::new(Options::new()).marker(), "");
    /// ```
    pub fn marker(&self) -> String {
        if !self.inner.options.adoptable {
            return String::new();
        }
        let n = self.inner.markers.fetch_add(1, Ordering::Relaxed) + 1;
        format!("<!--\u{1}:{}-->", base36(n))
    }

    /// Serialize `value` for a slot of kind `kind`.
    pub fn serialize_slot(&self, kind: &SlotKind, value: &Value) -> Result<String, RenderError> {
        let mut out = String::new();
        self.write_slot(kind, value, &mut out)?;
        Ok(out)
    }

    /// Serialize `value` as content, with adoptable markers if enabled.
    pub fn serialize_content(&self, value: &Value) -> String {
        let mut out = String::new();
        self.write_content(value, &mut out);
        out
    }

    pub(crate) fn write_slot(
        &self,
        kind: &SlotKind,
        value: &Value,
        out: &mut String,
    ) -> Result<(), RenderError> {
        match kind {
            SlotKind::Event => self.write_event(value, out),
            SlotKind::BooleanAttribute(name) => {
                let on = match value {
                    Value::Bool(b) => *b,
                    Value::Str(s) => s == "true",
                    _ => false,
                };
                if on {
                    out.push(' ');
                    out.push_str(name);
                }
            }
            SlotKind::Style => self.write_style(value, out),
            SlotKind::AttributeIntent(name) => self.write_intent(name, value, out)?,
            SlotKind::GenericAttribute => out.push_str(&escape(&value.to_text())),
            SlotKind::Content => self.write_content(value, out),
        }
        Ok(())
    }

    fn write_event(&self, value: &Value, out: &mut String) {
        match value {
            Value::Handler(handler) => {
                out.push_str("return (");
                out.push_str(&escape(&handler.normalized()));
                out.push_str(").call(this, event)");
            }
            Value::Object(_)
            | Value::Array(_)
            | Value::Html(_)
            | Value::Component(_)
            | Value::Future(_)
            | Value::Placeholder(_) => {}
            v if v.is_falsy() => {}
            v => out.push_str(&escape(&v.to_text())),
        }
    }

    fn write_style(&self, value: &Value, out: &mut String) {
        match value {
            Value::Object(map) => {
                let mut css = String::new();
                for (key, value) in map {
                    css.push_str(&hyphenate(key));
                    css.push(':');
                    css.push_str(&css_value(key, value));
                    css.push(';');
                }
                out.push_str(&escape(&css));
            }
            other => out.push_str(&escape(&other.to_text())),
        }
    }

    fn write_intent(&self, name: &str, value: &Value, out: &mut String) -> Result<(), RenderError> {
        let Some(transform) = self.inner.options.intent_attributes.get(name) else {
            // compiled with a different intent table
            out.push_str(&escape(&value.to_text()));
            return Ok(());
        };
        let result = transform(None, value).map_err(|source| RenderError::Intent {
            attribute: name.to_string(),
            source,
        })?;
        if !matches!(result, Value::Null) {
            out.push_str(&escape(&result.to_text()));
        }
        Ok(())
    }

    pub(crate) fn write_content(&self, value: &Value, out: &mut String) {
        let marker = self.marker();
        out.push_str(&marker);
        self.write_content_value(value, out);
        out.push_str(&marker);
    }

    /// Content serialization without markers; arrays are flattened in place.
    pub(crate) fn write_content_value(&self, value: &Value, out: &mut String) {
        match value {
            Value::Null => {}
            Value::Bool(_) | Value::Int(_) | Value::Float(_) => out.push_str(&value.to_text()),
            Value::Str(s) => out.push_str(&escape(s)),
            Value::Html(markup) => out.push_str(markup),
            Value::Array(items) => {
                for item in items {
                    self.write_content_value(item, out);
                }
            }
            Value::Component(component) => self.write_content_value(&component.render(), out),
            Value::Object(map) => match self.transform(map) {
                Some(transformed) => self.write_content_value(&transformed, out),
                None => {
                    trace!(keys = ?map.keys().collect::<Vec<_>>(), "no content transformer matched");
                }
            },
            Value::Handler(_) => {}
            Value::Future(_) | Value::Placeholder(_) => {
                warning!(shape = value.shape(), "unresolved asynchronous value in synchronous render");
            }
        }
    }

    /// Apply the first registered content transformer whose key `map` carries.
    pub(crate) fn transform(&self, map: &Object) -> Option<Value> {
        self.inner
            .options
            .content_transformers
            .iter()
            .find_map(|(key, transform)| map.get(key).map(|v| transform(v)))
    }
}

impl std::fmt::Debug for Serializer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Serializer")
            .field("options", &self.inner.options)
            .field("markers", &self.inner.markers.load(Ordering::Relaxed))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BoxError;
    use crate::value::Handler;

    fn plain() -> Serializer {
        Serializer::new(Options::new())
    }

    fn slot(kind: SlotKind, value: impl Into<Value>) -> String {
        plain().serialize_slot(&kind, &value.into()).unwrap()
    }

    #[test]
    fn test_style_object() {
        let style = Value::object([("backgroundColor", Value::from("red")), ("zIndex", 2.into())]);
        assert_eq!(slot(SlotKind::Style, style), "background-color:red;z-index:2;");
    }

    #[test]
    fn test_style_units() {
        let style = Value::object([
            ("width", Value::from(10)),
            ("lineHeight", 1.5.into()),
            ("opacity", 0.into()),
            ("flexGrow", 1.into()),
            ("order", 3.into()),
            ("marginTop", "1em".into()),
        ]);
        assert_eq!(
            slot(SlotKind::Style, style),
            "width:10px;line-height:1.5;opacity:0;flex-grow:1;order:3;margin-top:1em;"
        );
    }

    #[test]
    fn test_style_string_is_escaped() {
        assert_eq!(
            slot(SlotKind::Style, "content: \"x\""),
            "content: &quot;x&quot;"
        );
    }

    #[test]
    fn test_hyphenate() {
        assert_eq!(hyphenate("backgroundColor"), "background-color");
        assert_eq!(hyphenate("WebkitTransform"), "Webkit-transform");
        assert_eq!(hyphenate("color"), "color");
    }

    #[test]
    fn test_boolean_attribute() {
        let checked = SlotKind::BooleanAttribute("checked".into());
        assert_eq!(slot(checked.clone(), true), " checked");
        assert_eq!(slot(checked.clone(), "true"), " checked");
        assert_eq!(slot(checked.clone(), false), "");
        assert_eq!(slot(checked.clone(), "false"), "");
        assert_eq!(slot(checked, 1), "");
    }

    #[test]
    fn test_event_handler() {
        assert_eq!(
            slot(SlotKind::Event, Handler::new("click(e) { a < b }")),
            "return (function click(e) { a &lt; b }).call(this, event)"
        );
        assert_eq!(slot(SlotKind::Event, "alert('hi')"), "alert(&#39;hi&#39;)");
        assert_eq!(slot(SlotKind::Event, Value::Null), "");
        assert_eq!(slot(SlotKind::Event, false), "");
        assert_eq!(slot(SlotKind::Event, Value::object([("a", 1)])), "");
    }

    #[test]
    fn test_generic_attribute_is_escaped_once() {
        assert_eq!(slot(SlotKind::GenericAttribute, "\"><script>"), "&quot;&gt;&lt;script&gt;");
        assert_eq!(slot(SlotKind::GenericAttribute, Value::Null), "");
        assert_eq!(slot(SlotKind::GenericAttribute, 3.25), "3.25");
    }

    #[test]
    fn test_attribute_intent() {
        let serializer = Serializer::new(
            Options::new()
                .intent_attribute("data-upper", |old, v| {
                    assert!(old.is_none());
                    Ok(Value::from(v.to_text().to_uppercase()))
                })
                .intent_attribute("data-none", |_, _| Ok(Value::Null))
                .intent_attribute("data-fail", |_, _| Err(BoxError::from("bad value"))),
        );
        let upper = SlotKind::AttributeIntent("data-upper".into());
        assert_eq!(serializer.serialize_slot(&upper, &"<a>".into()).unwrap(), "&lt;A&gt;");

        let none = SlotKind::AttributeIntent("data-none".into());
        assert_eq!(serializer.serialize_slot(&none, &"x".into()).unwrap(), "");

        let fail = SlotKind::AttributeIntent("data-fail".into());
        let err = serializer.serialize_slot(&fail, &"x".into()).unwrap_err();
        assert!(matches!(err, RenderError::Intent { ref attribute, .. } if attribute == "data-fail"));
    }

    #[test]
    fn test_nested_arrays_flatten() {
        let value = Value::Array(vec![1.into(), vec![2, 3].into(), "x".into()]);
        assert_eq!(plain().serialize_content(&value), "123x");
    }

    #[test]
    fn test_content_shapes() {
        let s = plain();
        assert_eq!(s.serialize_content(&Value::Null), "");
        assert_eq!(s.serialize_content(&"<b>".into()), "&lt;b&gt;");
        assert_eq!(s.serialize_content(&Value::html("<b>")), "<b>");
        assert_eq!(s.serialize_content(&true.into()), "true");
        assert_eq!(
            s.serialize_content(&Value::component(|| Value::from(vec!["a", "<"]))),
            "a&lt;"
        );
        assert_eq!(s.serialize_content(&Value::handler("e => e")), "");
    }

    #[test]
    fn test_unknown_object_uses_transformer() {
        let s = Serializer::new(
            Options::new()
                .content_transformer("upper", |v| Value::from(v.to_text().to_uppercase()))
                .content_transformer("raw", |v| Value::html(v.to_text().into_owned())),
        );
        assert_eq!(s.serialize_content(&Value::object([("upper", "a<b")])), "A&lt;B");
        assert_eq!(s.serialize_content(&Value::object([("raw", "<hr>")])), "<hr>");
        assert_eq!(s.serialize_content(&Value::object([("other", "x")])), "");
    }

    #[test]
    fn test_adoptable_markers_wrap_content_only() {
        let s = Serializer::new(Options::new().adoptable(true));
        assert_eq!(
            s.serialize_content(&"hi".into()),
            "<!--\u{1}:1-->hi<!--\u{1}:1-->"
        );
        assert_eq!(
            s.serialize_slot(&SlotKind::GenericAttribute, &"hi".into()).unwrap(),
            "hi"
        );
        assert_eq!(s.serialize_content(&Value::Null), "<!--\u{1}:2--><!--\u{1}:2-->");
    }

    #[test]
    fn test_base36() {
        assert_eq!(base36(0), "0");
        assert_eq!(base36(35), "z");
        assert_eq!(base36(36), "10");
        assert_eq!(base36(1295), "zz");
    }
}
