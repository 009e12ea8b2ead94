//! The streaming engine: ordered fragments from values that resolve in any order.

use std::pin::Pin;
use std::task::{Context, Poll, ready};

use bytes::Bytes;
use futures_util::future::{self, BoxFuture, FutureExt};
use futures_util::stream::{FuturesOrdered, Stream, StreamExt};

use crate::error::RenderError;
use crate::render::{check_slot_count, resolve_slot};
use crate::serialize::Serializer;
use crate::template::{CompiledTemplate, SlotKind};
use crate::tracing_macros::{debug, trace};
use crate::value::Value;

type Step = BoxFuture<'static, Result<Bytes, RenderError>>;

/// Output fragments of one render, in template order.
///
/// Every slot value starts resolving as soon as the stream is first polled,
/// but a fragment is only yielded once everything before it has been. After
/// the first error the stream ends and the remaining steps are dropped.
#[must_use = "streams do nothing unless polled"]
pub struct Fragments {
    steps: FuturesOrdered<Step>,
    failed: bool,
}

impl Fragments {
    /// Number of fragments still to come, if nothing fails.
    pub fn remaining(&self) -> usize {
        if self.failed { 0 } else { self.steps.len() }
    }
}

impl Stream for Fragments {
    type Item = Result<Bytes, RenderError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.failed {
            return Poll::Ready(None);
        }
        match ready!(self.steps.poll_next_unpin(cx)) {
            Some(Err(error)) => {
                debug!(%error, "stream aborted");
                self.failed = true;
                self.steps = FuturesOrdered::new();
                Poll::Ready(Some(Err(error)))
            }
            other => Poll::Ready(other),
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.remaining()))
    }
}

impl std::fmt::Debug for Fragments {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fragments")
            .field("remaining", &self.remaining())
            .field("failed", &self.failed)
            .finish()
    }
}

fn literal(text: impl Into<Bytes>) -> Step {
    future::ready(Ok(text.into())).boxed()
}

/// Leaves of a nested array, in order.
fn flatten(items: Vec<Value>, leaves: &mut Vec<Value>) {
    for item in items {
        match item {
            Value::Array(nested) => flatten(nested, leaves),
            leaf => leaves.push(leaf),
        }
    }
}

/// Queue the steps of one render: chunk 0, slot 0, chunk 1, ...
///
/// An array in a content slot becomes one step per leaf, bracketed by a single
/// pair of markers, so its elements are emitted as soon as they resolve.
pub fn fragments(
    template: &CompiledTemplate,
    serializer: &Serializer,
    values: Vec<Value>,
) -> Result<Fragments, RenderError> {
    check_slot_count(template, &values)?;

    let chunks = template.chunks();
    let mut steps = FuturesOrdered::new();
    steps.push_back(literal(chunks[0].clone()));

    for (slot, ((kind, value), chunk)) in template
        .slots()
        .iter()
        .zip(values)
        .zip(&chunks[1..])
        .enumerate()
    {
        match (kind, value) {
            (SlotKind::Content, Value::Array(items)) => {
                let marker = serializer.marker();
                let mut leaves = Vec::new();
                flatten(items, &mut leaves);
                trace!(slot, leaves = leaves.len(), "streaming array slot");

                steps.push_back(literal(marker.clone()));
                for leaf in leaves {
                    let serializer = serializer.clone();
                    let resolved = resolve_slot(&serializer, slot, kind, leaf);
                    steps.push_back(
                        async move {
                            let value = resolved.await?;
                            let mut out = String::new();
                            serializer.write_content_value(&value, &mut out);
                            Ok(Bytes::from(out))
                        }
                        .boxed(),
                    );
                }
                steps.push_back(literal(marker));
            }
            (kind, value) => {
                let resolved = resolve_slot(serializer, slot, kind, value);
                let kind = kind.clone();
                let serializer = serializer.clone();
                steps.push_back(
                    async move {
                        let value = resolved.await?;
                        let mut out = String::new();
                        serializer.write_slot(&kind, &value, &mut out)?;
                        Ok(Bytes::from(out))
                    }
                    .boxed(),
                );
            }
        }
        steps.push_back(literal(chunk.clone()));
    }

    Ok(Fragments {
        steps,
        failed: false,
    })
}

/// Drive a render to completion, calling `on_chunk` for every fragment in order.
///
/// Returns all fragments. On failure `on_chunk` has seen exactly the fragments
/// before the failing one.
pub async fn stream<F>(
    template: &CompiledTemplate,
    serializer: &Serializer,
    values: Vec<Value>,
    mut on_chunk: F,
) -> Result<Vec<Bytes>, RenderError>
where
    F: FnMut(&Bytes),
{
    let mut fragments = fragments(template, serializer, values)?;
    let mut out = Vec::with_capacity(fragments.remaining());
    while let Some(fragment) = fragments.next().await {
        let fragment = fragment?;
        on_chunk(&fragment);
        out.push(fragment);
    }
    Ok(out)
}
