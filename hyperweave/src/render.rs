//! The update engine: applies values to a compiled template.

use std::future::IntoFuture;
use std::sync::Arc;

use bytes::Bytes;
use futures_util::future::{self, BoxFuture, FutureExt, TryFutureExt};

use crate::error::{BoxError, RenderError};
use crate::serialize::Serializer;
use crate::template::{CompiledTemplate, SlotKind};
use crate::tracing_macros::trace;
use crate::value::{PlaceholderKind, Value};

/// Output of a render call.
///
/// Synchronous values produce [`Rendered::Ready`] without ever suspending. As
/// soon as one value is asynchronous the whole output is [`Rendered::Pending`].
/// Either way the result can be `.await`ed.
pub enum Rendered {
    /// Output is available now.
    Ready(Bytes),
    /// Output is available once every asynchronous value has resolved.
    Pending(BoxFuture<'static, Result<Bytes, RenderError>>),
}

impl Rendered {
    /// Whether the output is available without waiting.
    pub fn is_ready(&self) -> bool {
        matches!(self, Rendered::Ready(_))
    }

    /// The output, if it is available without waiting.
    pub fn ready(self) -> Option<Bytes> {
        match self {
            Rendered::Ready(bytes) => Some(bytes),
            Rendered::Pending(_) => None,
        }
    }
}

impl IntoFuture for Rendered {
    type Output = Result<Bytes, RenderError>;
    type IntoFuture = BoxFuture<'static, Self::Output>;

    fn into_future(self) -> Self::IntoFuture {
        match self {
            Rendered::Ready(bytes) => future::ready(Ok(bytes)).boxed(),
            Rendered::Pending(pending) => pending,
        }
    }
}

impl std::fmt::Debug for Rendered {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Rendered::Ready(bytes) => f.debug_tuple("Ready").field(bytes).finish(),
            Rendered::Pending(_) => f.write_str("Pending(..)"),
        }
    }
}

pub(crate) fn check_slot_count(
    template: &CompiledTemplate,
    values: &[Value],
) -> Result<(), RenderError> {
    if values.len() != template.slot_count() {
        return Err(RenderError::SlotCountMismatch {
            expected: template.slot_count(),
            got: values.len(),
        });
    }
    Ok(())
}

/// Render `values` through `template`.
///
/// Fails right away if the number of values does not match the number of
/// slots, or if a synchronous attribute transform fails.
pub fn render(
    template: &Arc<CompiledTemplate>,
    serializer: &Serializer,
    values: Vec<Value>,
) -> Result<Rendered, RenderError> {
    check_slot_count(template, &values)?;

    if !values.iter().any(Value::is_async) {
        return write_all(template, serializer, &values).map(Rendered::Ready);
    }

    trace!(slots = values.len(), "rendering with asynchronous values");
    let template = Arc::clone(template);
    let serializer = serializer.clone();
    Ok(Rendered::Pending(
        async move {
            let resolved = future::try_join_all(
                template
                    .slots()
                    .iter()
                    .zip(values)
                    .enumerate()
                    .map(|(slot, (kind, value))| resolve_slot(&serializer, slot, kind, value)),
            )
            .await?;
            write_all(&template, &serializer, &resolved)
        }
        .boxed(),
    ))
}

fn write_all(
    template: &CompiledTemplate,
    serializer: &Serializer,
    values: &[Value],
) -> Result<Bytes, RenderError> {
    let chunks = template.chunks();
    let mut out = String::with_capacity(chunks.iter().map(String::len).sum());
    out.push_str(&chunks[0]);
    for ((kind, value), chunk) in template.slots().iter().zip(values).zip(&chunks[1..]) {
        serializer.write_slot(kind, value, &mut out)?;
        out.push_str(chunk);
    }
    Ok(Bytes::from(out))
}

pub(crate) fn resolve_slot(
    serializer: &Serializer,
    slot: usize,
    kind: &SlotKind,
    value: Value,
) -> impl Future<Output = Result<Value, RenderError>> + Send + 'static {
    let content = matches!(kind, SlotKind::Content);
    resolve(serializer, value, content).map_err(move |source| RenderError::Rejected { slot, source })
}

/// Await everything asynchronous inside `value`.
///
/// Futures are awaited (and their output resolved again), placeholders are
/// resolved and converted according to their kind, and arrays are resolved
/// element by element. For content slots components are rendered too, and
/// objects picked up by a content transformer are replaced by the transformed
/// value; attribute slots keep both as they are, like the synchronous path.
pub(crate) fn resolve(
    serializer: &Serializer,
    value: Value,
    content: bool,
) -> BoxFuture<'static, Result<Value, BoxError>> {
    let serializer = serializer.clone();
    async move {
        match value {
            Value::Future(pending) => {
                let value = pending.await?;
                resolve(&serializer, value, content).await
            }
            Value::Placeholder(placeholder) => {
                let (kind, inner) = placeholder.into_parts();
                let value = resolve(&serializer, inner, content).await?;
                Ok(match kind {
                    PlaceholderKind::Text => Value::Str(value.to_text().into_owned()),
                    PlaceholderKind::Html => Value::Html(raw_markup(&value)),
                    PlaceholderKind::Any => value,
                })
            }
            Value::Array(items) if items.iter().any(Value::is_async) => {
                let items = future::try_join_all(
                    items.into_iter().map(|item| resolve(&serializer, item, content)),
                )
                .await?;
                Ok(Value::Array(items))
            }
            Value::Component(component) if content => {
                resolve(&serializer, component.render(), content).await
            }
            Value::Object(map) if content => {
                let transformed = serializer.transform(&map);
                match transformed {
                    Some(transformed) => resolve(&serializer, transformed, content).await,
                    None => Ok(Value::Object(map)),
                }
            }
            other => Ok(other),
        }
    }
    .boxed()
}

/// Markup for an html placeholder: arrays are concatenated without separators.
fn raw_markup(value: &Value) -> String {
    match value {
        Value::Array(items) => items.iter().map(raw_markup).collect(),
        other => other.to_text().into_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::Options;
    use crate::template::SlotKind;
    use crate::value::{Handler, Placeholder};
    use std::time::Duration;

    fn template(chunks: &[&str], slots: Vec<SlotKind>) -> Arc<CompiledTemplate> {
        Arc::new(CompiledTemplate::new(chunks.iter().map(|c| c.to_string()).collect(), slots).unwrap())
    }

    fn text(bytes: Bytes) -> String {
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn later(ms: u64, value: impl Into<Value> + Send + 'static) -> Value {
        Value::future(async move {
            tokio::time::sleep(Duration::from_millis(ms)).await;
            Ok::<_, BoxError>(value.into())
        })
    }

    #[test]
    fn test_synchronous_values_render_immediately() {
        let t = template(&["<p class=\"", "\">", "</p>"], vec![SlotKind::GenericAttribute, SlotKind::Content]);
        let rendered = render(&t, &Serializer::new(Options::new()), vec!["a&b".into(), "<i>".into()]).unwrap();
        assert!(rendered.is_ready());
        assert_eq!(text(rendered.ready().unwrap()), "<p class=\"a&amp;b\">&lt;i&gt;</p>");
    }

    #[test]
    fn test_slot_count_mismatch() {
        let t = template(&["<p>", "</p>"], vec![SlotKind::Content]);
        let err = render(&t, &Serializer::new(Options::new()), vec![]).unwrap_err();
        assert!(matches!(err, RenderError::SlotCountMismatch { expected: 1, got: 0 }));
    }

    #[tokio::test]
    async fn test_mixed_values_resolve_then_serialize() {
        let t = template(
            &["<a href=\"", "\">", " and ", "</a>"],
            vec![SlotKind::GenericAttribute, SlotKind::Content, SlotKind::Content],
        );
        let rendered = render(
            &t,
            &Serializer::new(Options::new()),
            vec![later(10, "/x?a=1&b=2"), "sync".into(), later(1, "<late>")],
        )
        .unwrap();
        assert!(!rendered.is_ready());
        assert_eq!(
            text(rendered.await.unwrap()),
            "<a href=\"/x?a=1&amp;b=2\">sync and &lt;late&gt;</a>"
        );
    }

    #[tokio::test]
    async fn test_ready_output_can_be_awaited() {
        let t = template(&["<b>", "</b>"], vec![SlotKind::Content]);
        let out = render(&t, &Serializer::new(Options::new()), vec![1.into()]).unwrap().await.unwrap();
        assert_eq!(text(out), "<b>1</b>");
    }

    #[tokio::test]
    async fn test_arrays_with_futures_are_resolved_deeply() {
        let t = template(&["<ul>", "</ul>"], vec![SlotKind::Content]);
        let items = Value::Array(vec![
            Value::html("<li>a</li>"),
            Value::Array(vec![later(5, Value::html("<li>b</li>"))]),
        ]);
        let out = render(&t, &Serializer::new(Options::new()), vec![items]).unwrap().await.unwrap();
        assert_eq!(text(out), "<ul><li>a</li><li>b</li></ul>");
    }

    #[tokio::test]
    async fn test_placeholder_kinds() {
        let t = template(&["", "|", "|", ""], vec![SlotKind::Content; 3]);
        let out = render(
            &t,
            &Serializer::new(Options::new()),
            vec![
                Placeholder::text(later(3, "<b>")).into(),
                Placeholder::html(Value::Array(vec!["<i>".into(), "</i>".into()])).into(),
                Placeholder::any(later(1, 7)).into(),
            ],
        )
        .unwrap()
        .await
        .unwrap();
        assert_eq!(text(out), "&lt;b&gt;|<i></i>|7");
    }

    #[tokio::test]
    async fn test_deferred_placeholder() {
        let t = template(&["<p>", "</p>"], vec![SlotKind::Content]);
        let deferred = Placeholder::deferred(PlaceholderKind::Html, || async {
            Ok::<_, BoxError>(Value::from("<em>now</em>"))
        });
        let out = render(&t, &Serializer::new(Options::new()), vec![deferred.into()])
            .unwrap()
            .await
            .unwrap();
        assert_eq!(text(out), "<p><em>now</em></p>");
    }

    #[tokio::test]
    async fn test_rejection_fails_the_render() {
        let t = template(&["<p>", "", "</p>"], vec![SlotKind::Content, SlotKind::Content]);
        let failing = Value::future(async { Err::<Value, _>(BoxError::from("backend down")) });
        let err = render(&t, &Serializer::new(Options::new()), vec!["ok".into(), failing])
            .unwrap()
            .await
            .unwrap_err();
        match err {
            RenderError::Rejected { slot, source } => {
                assert_eq!(slot, 1);
                assert_eq!(source.to_string(), "backend down");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_async_content_transformer() {
        let options = Options::new().content_transformer("user", |id| {
            let id = id.to_text().into_owned();
            Value::future(async move { Ok::<_, BoxError>(Value::from(format!("user #{id}"))) })
        });
        let t = template(&["<p>", "", "</p>"], vec![SlotKind::Content; 2]);
        let out = render(
            &t,
            &Serializer::new(options),
            vec![Value::object([("user", 42)]), later(1, "!")],
        )
        .unwrap()
        .await
        .unwrap();
        assert_eq!(text(out), "<p>user #42!</p>");
    }

    #[tokio::test]
    async fn test_attribute_slots_render_the_same_on_both_paths() {
        let options = Options::new()
            .content_transformer("color", |_| Value::from("replaced"))
            .intent_attribute("data-n", |_, v| Ok(Value::from(format!("#{}", v.to_text()))));
        let serializer = Serializer::new(options);
        let t = template(
            &["<p style=\"", "\"", " onclick=\"", "\" data-n=\"", "\">", "</p>"],
            vec![
                SlotKind::Style,
                SlotKind::BooleanAttribute("hidden".into()),
                SlotKind::Event,
                SlotKind::AttributeIntent("data-n".into()),
                SlotKind::Content,
            ],
        );
        let values = || -> Vec<Value> {
            vec![
                Value::object([("color", Value::from("red")), ("fontSize", 12.into())]),
                true.into(),
                Handler::new("go() { run() }").into(),
                3.into(),
                Value::object([("color", "x")]),
            ]
        };

        let sync = text(render(&t, &serializer, values()).unwrap().ready().unwrap());
        assert_eq!(
            sync,
            "<p style=\"color:red;font-size:12px;\" hidden onclick=\"return (function go() { run() }).call(this, event)\" data-n=\"#3\">replaced</p>"
        );

        let mixed: Vec<Value> = values().into_iter().map(|v| later(1, v)).collect();
        let rendered = render(&t, &serializer, mixed).unwrap();
        assert!(!rendered.is_ready());
        assert_eq!(text(rendered.await.unwrap()), sync);
    }
}
