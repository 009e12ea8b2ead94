#![deny(unsafe_code)]
#![deny(missing_docs, rustdoc::broken_intra_doc_links)]

//! HTML template compiler and renderer.
//!
//! A template is a [`Skeleton`]: literal markup segments with one dynamic slot
//! between each pair. The first time a skeleton is rendered it is tokenized
//! (WHATWG tokenization via html5gum) and every slot is classified by where it
//! sits in the markup. The result, a [`CompiledTemplate`] of literal chunks and
//! [`SlotKind`]s, is cached by skeleton identity and reused by every later
//! render.
//!
//! # Slot kinds
//!
//! - `on*` attributes are [`SlotKind::Event`]: handlers are printed as an
//!   inline `return (...).call(this, event)` body.
//! - Boolean attributes (`checked`, `disabled`, `allow*`, ...) are
//!   [`SlotKind::BooleanAttribute`]: printed as ` name` when the value is true,
//!   omitted otherwise.
//! - `style` is [`SlotKind::Style`]: objects are turned into CSS declarations.
//! - Attributes registered with [`Options::intent_attribute`] are
//!   [`SlotKind::AttributeIntent`].
//! - Any other attribute is a [`SlotKind::GenericAttribute`].
//! - Everything else is [`SlotKind::Content`].
//!
//! # Rendering
//!
//! ```
//! use hyperweave::{Engine, Value, skeleton, values};
//!
//! let engine = Engine::default();
//! let page = skeleton!["<input type=\"checkbox\" checked=", " style=", ">"];
//!
//! let style = Value::object([("marginTop", 4)]);
//! let html = engine.render(&page, values![true, style]).unwrap();
//! assert_eq!(
//!     html.ready().unwrap(),
//!     "<input type=\"checkbox\" checked style=\"margin-top:4px;\">"
//! );
//! ```
//!
//! Values that are not available yet ([`Value::Future`], [`Placeholder`]) make
//! the render asynchronous: the returned [`Rendered`] resolves once every slot
//! has. [`Engine::stream`] instead hands out fragments in document order as
//! soon as everything before them is ready.
//!
//! # Logging
//!
//! With the `tracing` feature enabled, compile and cache events are logged at
//! `debug`, slot decisions at `trace`, and recovered failures at `warn`.

mod cache;
mod classify;
mod engine;
mod error;
mod escape;
mod options;
mod render;
mod serialize;
mod skeleton;
mod stream;
mod template;
mod tokenizer;
mod tracing_macros;
mod value;

pub use cache::TemplateCache;
pub use classify::classify;
pub use engine::Engine;
pub use error::{BoxError, CompileError, MinifyError, RenderError};
pub use escape::escape;
pub use options::{ContentTransform, IntentTransform, Minifier, Options, Passthrough};
pub use render::{Rendered, render};
pub use serialize::Serializer;
pub use skeleton::{Skeleton, SkeletonId, WeakSkeleton};
pub use stream::{Fragments, fragments, stream};
pub use template::{CompiledTemplate, SlotKind};
pub use tokenizer::{Attribute, Html5gumTokenizer, HtmlTokenizer, TokenSink};
pub use value::{Component, Handler, Object, Placeholder, PlaceholderKind, Value, ValueFuture};
