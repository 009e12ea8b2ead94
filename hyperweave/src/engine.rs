//! The engine: options, tokenizer, template cache and serializer in one place.

use std::sync::Arc;

use bytes::Bytes;

use crate::cache::TemplateCache;
use crate::classify::classify;
use crate::error::{CompileError, RenderError};
use crate::options::Options;
use crate::render::{self, Rendered};
use crate::serialize::Serializer;
use crate::skeleton::Skeleton;
use crate::stream::{self, Fragments};
use crate::template::CompiledTemplate;
use crate::tokenizer::{Html5gumTokenizer, HtmlTokenizer};
use crate::tracing_macros::debug_span;
use crate::value::Value;

/// Compiles skeletons once and renders them many times.
///
/// ```
/// use hyperweave::{Engine, skeleton, values};
///
/// let engine = Engine::default();
/// let page = skeleton!["<p class=", ">Hello ", "!</p>"];
///
/// let html = engine.render(&page, values!["greeting", "<world>"]).unwrap();
/// assert_eq!(
///     html.ready().unwrap(),
///     "<p class=\"greeting\">Hello &lt;world&gt;!</p>"
/// );
/// ```
pub struct Engine<T: HtmlTokenizer = Html5gumTokenizer> {
    tokenizer: T,
    cache: TemplateCache,
    serializer: Serializer,
}

impl Engine {
    /// Create an engine using the html5gum tokenizer.
    pub fn new(options: Options) -> Self {
        Self::with_tokenizer(options, Html5gumTokenizer)
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(Options::default())
    }
}

impl<T: HtmlTokenizer> Engine<T> {
    /// Create an engine with a custom tokenizer.
    pub fn with_tokenizer(options: Options, tokenizer: T) -> Self {
        Self {
            tokenizer,
            cache: TemplateCache::new(),
            serializer: Serializer::new(options),
        }
    }

    /// The options in effect.
    pub fn options(&self) -> &Options {
        self.serializer.options()
    }

    /// The template cache.
    pub fn cache(&self) -> &TemplateCache {
        &self.cache
    }

    /// The serializer.
    pub fn serializer(&self) -> &Serializer {
        &self.serializer
    }

    /// Get the compiled template for `skeleton`, compiling it on first use.
    pub fn compile(&self, skeleton: &Skeleton) -> Result<Arc<CompiledTemplate>, CompileError> {
        self.cache.get_or_compile(skeleton, |skeleton| {
            classify(skeleton.segments(), self.options(), &self.tokenizer)
        })
    }

    /// Render `values` into `skeleton`.
    ///
    /// The result is ready immediately unless a value is asynchronous.
    pub fn render<I>(&self, skeleton: &Skeleton, values: I) -> Result<Rendered, RenderError>
    where
        I: IntoIterator<Item = Value>,
    {
        debug_span!("render", skeleton = %skeleton.id());
        let template = self.compile(skeleton)?;
        render::render(&template, &self.serializer, values.into_iter().collect())
    }

    /// Render and wait for the output, as a string.
    pub async fn render_to_string<I>(&self, skeleton: &Skeleton, values: I) -> Result<String, RenderError>
    where
        I: IntoIterator<Item = Value>,
    {
        let bytes = self.render(skeleton, values)?.await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Ordered output fragments of one render.
    pub fn fragments<I>(&self, skeleton: &Skeleton, values: I) -> Result<Fragments, RenderError>
    where
        I: IntoIterator<Item = Value>,
    {
        let template = self.compile(skeleton)?;
        stream::fragments(&template, &self.serializer, values.into_iter().collect())
    }

    /// Render progressively, calling `on_chunk` with each fragment in template order.
    pub async fn stream<I, F>(
        &self,
        skeleton: &Skeleton,
        values: I,
        on_chunk: F,
    ) -> Result<Vec<Bytes>, RenderError>
    where
        I: IntoIterator<Item = Value>,
        F: FnMut(&Bytes),
    {
        let template = self.compile(skeleton)?;
        stream::stream(&template, &self.serializer, values.into_iter().collect(), on_chunk).await
    }
}

impl<T: HtmlTokenizer + std::fmt::Debug> std::fmt::Debug for Engine<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("tokenizer", &self.tokenizer)
            .field("cache", &self.cache)
            .field("options", self.options())
            .finish()
    }
}

/// Build a `Vec<Value>` from expressions of different types.
///
/// ```
/// use hyperweave::{values, Value};
///
/// let v = values!["a", 1, true, Value::html("<br>")];
/// assert_eq!(v.len(), 4);
/// ```
#[macro_export]
macro_rules! values {
    () => {
        ::std::vec::Vec::<$crate::Value>::new()
    };
    ($($value:expr),+ $(,)?) => {
        ::std::vec![$($crate::Value::from($value)),+]
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_compiles_once_per_skeleton() {
        let engine = Engine::default();
        let s = Skeleton::new(["<b>", "</b>"]);
        let a = engine.render(&s, values!["x"]).unwrap().ready().unwrap();
        let b = engine.render(&s, values!["y"]).unwrap().ready().unwrap();
        assert_eq!(a, "<b>x</b>");
        assert_eq!(b, "<b>y</b>");
        assert_eq!(engine.cache().compile_count(), 1);
    }

    #[test]
    fn test_compile_errors_surface_from_render() {
        let engine = Engine::default();
        let s = Skeleton::new(["<div class=\"a ", "\"></div>"]);
        let err = engine.render(&s, values!["b"]).unwrap_err();
        assert!(matches!(err, RenderError::Compile(CompileError::PartialAttribute { .. })));
        assert!(engine.compile(&s).is_err());
        assert_eq!(engine.cache().compile_count(), 2);
    }
}
