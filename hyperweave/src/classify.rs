//! Slot classification: turns skeleton segments into a [`CompiledTemplate`].
//!
//! Segments are joined with indexed slot markers built from a per-process
//! random sentinel. Markers in content position are comments
//! (`<!--sentinel:3-->`), markers in attribute-value position are plain quoted
//! values (`name="sentinel:3"`), whatever quoting the skeleton used. The
//! joined markup goes through an [`HtmlTokenizer`] and every marker the
//! classifier meets becomes a chunk boundary plus a [`SlotKind`].
//!
//! Markers carry their slot index, so the classifier can check that each slot
//! shows up exactly once and in order. Tokenizers that reorder attributes
//! (html5gum keeps them sorted by name) are handled by emitting the slotted
//! attributes of a tag after its literal ones, in slot order.

use std::borrow::Cow;
use std::fmt::Write as _;
use std::hash::{BuildHasher, RandomState};
use std::sync::LazyLock;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::CompileError;
use crate::escape::{escape, escape_text};
use crate::options::{Minifier, Options};
use crate::template::{CompiledTemplate, SlotKind};
use crate::tokenizer::{Attribute, HtmlTokenizer, TokenSink};
use crate::tracing_macros::{debug, debug_span, trace, warning};

/// HTML void elements; their closing tags are never printed.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "keygen", "link", "menuitem",
    "meta", "param", "source", "track", "wbr",
];

/// Elements whose text is tokenized as raw text (no markup inside).
const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style", "textarea", "title"];

/// Elements whose text is copied verbatim, never collapsed or minified.
const PREFORMATTED_ELEMENTS: &[&str] = &["code", "input", "pre", "textarea"];

/// Attributes that are toggled by presence rather than value.
const BOOLEAN_ATTRIBUTES: &[&str] = &[
    "async",
    "autofocus",
    "autoplay",
    "capture",
    "checked",
    "controls",
    "default",
    "defer",
    "disabled",
    "formnovalidate",
    "hidden",
    "ismap",
    "itemscope",
    "loop",
    "multiple",
    "muted",
    "nomodule",
    "novalidate",
    "open",
    "playsinline",
    "readonly",
    "required",
    "reversed",
    "selected",
    "truespeed",
    "typemustmatch",
    "usecache",
];

fn is_void_element(name: &str) -> bool {
    VOID_ELEMENTS.iter().any(|&v| v.eq_ignore_ascii_case(name))
}

fn raw_text_element(name: &str) -> Option<&'static str> {
    RAW_TEXT_ELEMENTS
        .iter()
        .copied()
        .find(|v| v.eq_ignore_ascii_case(name))
}

/// `on*` / `allow*` names and the boolean attributes.
fn is_special_attribute(name: &str) -> bool {
    let prefixed = ["on", "allow"].iter().any(|prefix| {
        name.strip_prefix(prefix)
            .is_some_and(|rest| !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_lowercase()))
    });
    prefixed || BOOLEAN_ATTRIBUTES.contains(&name)
}

fn is_event_attribute(name: &str) -> bool {
    name.len() > 2 && name.starts_with("on") && !name.contains(char::is_whitespace)
}

/// The random token slot markers are built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Sentinel(String);

static SENTINEL: LazyLock<Sentinel> = LazyLock::new(Sentinel::generate);

impl Sentinel {
    /// The process-wide sentinel.
    pub(crate) fn get() -> &'static Sentinel {
        &SENTINEL
    }

    fn generate() -> Self {
        let state = RandomState::new();
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default();
        let a = state.hash_one((nanos, std::process::id()));
        let b = state.hash_one((a, nanos));
        Self(format!("hw{a:016x}{b:016x}"))
    }

    #[cfg(test)]
    fn fixed(token: &str) -> Self {
        Self(token.to_string())
    }

    fn write_attribute_marker(&self, out: &mut String, slot: usize) {
        let _ = write!(out, "{}:{slot}", self.0);
    }

    fn write_comment_marker(&self, out: &mut String, slot: usize) {
        let _ = write!(out, "<!--{}:{slot}-->", self.0);
    }

    /// The slot index if `text` is exactly one attribute marker.
    fn slot_of(&self, text: &str) -> Option<usize> {
        let digits = text.strip_prefix(self.0.as_str())?.strip_prefix(':')?;
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        digits.parse().ok()
    }

    /// The slot index of the first marker anywhere inside `text`.
    fn first_slot_in(&self, text: &str) -> Option<usize> {
        let at = text.find(self.0.as_str())?;
        let after = text[at + self.0.len()..].strip_prefix(':').unwrap_or_default();
        let digits = after.bytes().take_while(u8::is_ascii_digit).count();
        Some(after[..digits].parse().unwrap_or_default())
    }

    /// Split text at comment markers into literal pieces and slot indices.
    fn split_content<'t>(&self, text: &'t str) -> Vec<Piece<'t>> {
        let open = format!("<!--{}:", self.0);
        let mut pieces = Vec::new();
        let mut rest = text;
        while let Some(at) = rest.find(&open) {
            let after = &rest[at + open.len()..];
            let digits = after.bytes().take_while(u8::is_ascii_digit).count();
            let parsed = after[..digits].parse::<usize>();
            match parsed {
                Ok(slot) if after[digits..].starts_with("-->") => {
                    pieces.push(Piece::Literal(&rest[..at]));
                    pieces.push(Piece::Slot(slot));
                    rest = &after[digits + 3..];
                }
                _ => {
                    // Mangled marker: keep it literal, the slot count check reports it.
                    pieces.push(Piece::Literal(&rest[..at + open.len()]));
                    rest = after;
                }
            }
        }
        pieces.push(Piece::Literal(rest));
        pieces
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Piece<'t> {
    Literal(&'t str),
    Slot(usize),
}

/// Where the scanner is in the markup, as far as slot placement is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Context {
    Data,
    Comment,
    RawText(&'static str),
    TagName,
    Tag,
    BeforeValue,
    Quoted(u8),
    Unquoted,
}

/// A deliberately small markup scanner that only tracks enough state to know
/// whether a slot boundary falls in content or in an attribute value.
#[derive(Debug)]
struct Scanner {
    context: Context,
    tag: String,
    closing: bool,
}

impl Scanner {
    fn new() -> Self {
        Self {
            context: Context::Data,
            tag: String::new(),
            closing: false,
        }
    }

    fn start_tag(&mut self, closing: bool) {
        self.context = Context::TagName;
        self.tag.clear();
        self.closing = closing;
    }

    fn finish_tag(&mut self) {
        self.context = match raw_text_element(&self.tag) {
            Some(raw) if !self.closing => Context::RawText(raw),
            _ => Context::Data,
        };
    }

    fn feed(&mut self, text: &str) {
        let bytes = text.as_bytes();
        let mut i = 0;
        while i < bytes.len() {
            let b = bytes[i];
            let rest = &bytes[i..];
            match self.context {
                Context::Data => {
                    if rest.starts_with(b"<!--") {
                        self.context = Context::Comment;
                        i += 4;
                        continue;
                    }
                    if rest.starts_with(b"</") && rest.get(2).is_some_and(u8::is_ascii_alphabetic) {
                        self.start_tag(true);
                        i += 2;
                        continue;
                    }
                    if b == b'<' && rest.get(1).is_some_and(u8::is_ascii_alphabetic) {
                        self.start_tag(false);
                    }
                }
                Context::Comment => {
                    if rest.starts_with(b"-->") {
                        self.context = Context::Data;
                        i += 3;
                        continue;
                    }
                }
                Context::RawText(raw) => {
                    let closes = rest.starts_with(b"</")
                        && rest
                            .get(2..2 + raw.len())
                            .is_some_and(|name| name.eq_ignore_ascii_case(raw.as_bytes()));
                    if closes {
                        self.start_tag(true);
                        i += 2;
                        continue;
                    }
                }
                Context::TagName => {
                    if b.is_ascii_alphanumeric() || matches!(b, b'-' | b':' | b'_') {
                        self.tag.push(b.to_ascii_lowercase() as char);
                    } else {
                        // reprocess this byte as part of the tag body
                        self.context = Context::Tag;
                        continue;
                    }
                }
                Context::Tag => match b {
                    b'=' => self.context = Context::BeforeValue,
                    b'>' => self.finish_tag(),
                    _ => {}
                },
                Context::BeforeValue => match b {
                    b'"' | b'\'' => self.context = Context::Quoted(b),
                    b'>' => self.finish_tag(),
                    b if b.is_ascii_whitespace() => {}
                    _ => self.context = Context::Unquoted,
                },
                Context::Quoted(quote) => {
                    if b == quote {
                        self.context = Context::Tag;
                    }
                }
                Context::Unquoted => match b {
                    b'>' => self.finish_tag(),
                    b if b.is_ascii_whitespace() => self.context = Context::Tag,
                    _ => {}
                },
            }
            i += 1;
        }
    }
}

/// Join segments with slot markers chosen by the markup context of each boundary.
fn join_segments<S: AsRef<str>>(segments: &[S], sentinel: &Sentinel) -> String {
    let mut scanner = Scanner::new();
    let mut joined = String::new();
    let last = segments.len().saturating_sub(1);

    for (slot, segment) in segments.iter().enumerate() {
        let segment = segment.as_ref();
        scanner.feed(segment);
        joined.push_str(segment);
        if slot == last {
            break;
        }

        match scanner.context {
            Context::BeforeValue => {
                joined.push('"');
                sentinel.write_attribute_marker(&mut joined, slot);
                joined.push('"');
                scanner.context = Context::Tag;
            }
            Context::Quoted(_) | Context::Unquoted => {
                sentinel.write_attribute_marker(&mut joined, slot);
            }
            Context::TagName | Context::Tag => {
                sentinel.write_attribute_marker(&mut joined, slot);
                scanner.context = Context::Tag;
            }
            // `<${x}` and `</${x}`: the slot would become the tag name
            Context::Data if segment.ends_with('<') || segment.ends_with("</") => {
                scanner.start_tag(segment.ends_with("</"));
                sentinel.write_attribute_marker(&mut joined, slot);
                scanner.context = Context::Tag;
            }
            Context::Data | Context::Comment | Context::RawText(_) => {
                sentinel.write_comment_marker(&mut joined, slot);
            }
        }
    }

    joined
}

/// Token sink that builds chunks and slot kinds.
struct Classifier<'a> {
    sentinel: &'a Sentinel,
    options: &'a Options,
    current: String,
    chunks: Vec<String>,
    slots: Vec<SlotKind>,
    open_elements: Vec<String>,
    in_cdata: bool,
}

impl<'a> Classifier<'a> {
    fn new(sentinel: &'a Sentinel, options: &'a Options) -> Self {
        Self {
            sentinel,
            options,
            current: String::new(),
            chunks: Vec::new(),
            slots: Vec::new(),
            open_elements: Vec::new(),
            in_cdata: false,
        }
    }

    fn push_slot(&mut self, slot: usize, kind: SlotKind) -> Result<(), CompileError> {
        let expected = self.slots.len();
        if slot != expected {
            return Err(CompileError::SlotOutOfOrder {
                expected,
                found: slot,
            });
        }
        trace!(slot, %kind, "classified slot");
        self.chunks.push(std::mem::take(&mut self.current));
        self.slots.push(kind);
        Ok(())
    }

    fn push_slotted_attribute(&mut self, slot: usize, name: &str) -> Result<(), CompileError> {
        if is_special_attribute(name) {
            if is_event_attribute(name) {
                let _ = write!(self.current, " {name}=\"");
                self.push_slot(slot, SlotKind::Event)?;
                self.current.push('"');
            } else {
                // printed (or not) by the slot itself
                self.push_slot(slot, SlotKind::BooleanAttribute(name.to_string()))?;
            }
            return Ok(());
        }

        let kind = if name.eq_ignore_ascii_case("style") {
            SlotKind::Style
        } else if self.options.is_intent(name) {
            SlotKind::AttributeIntent(name.to_string())
        } else {
            SlotKind::GenericAttribute
        };
        let _ = write!(self.current, " {name}=\"");
        self.push_slot(slot, kind)?;
        self.current.push('"');
        Ok(())
    }

    fn innermost(&self) -> Option<&str> {
        self.open_elements.last().map(String::as_str)
    }

    fn in_preformatted(&self) -> bool {
        self.in_cdata
            || self
                .open_elements
                .iter()
                .any(|e| PREFORMATTED_ELEMENTS.contains(&e.as_str()))
    }

    fn in_raw_text(&self) -> bool {
        self.in_cdata || matches!(self.innermost(), Some("script" | "style"))
    }

    fn push_literal_text(&mut self, text: &str) {
        if self.in_raw_text() {
            self.current.push_str(text);
        } else if self.options.collapse_whitespace && !self.in_preformatted() {
            self.current.push_str(&escape_text(&collapse_whitespace(text)));
        } else {
            self.current.push_str(&escape_text(text));
        }
    }
}

fn collapse_whitespace(text: &str) -> Cow<'_, str> {
    let needs_collapse = text
        .as_bytes()
        .windows(2)
        .any(|w| w[0].is_ascii_whitespace() && w[1].is_ascii_whitespace())
        || text.bytes().any(|b| b.is_ascii_whitespace() && b != b' ');
    if !needs_collapse {
        return Cow::Borrowed(text);
    }

    let mut out = String::with_capacity(text.len());
    let mut in_space = false;
    for c in text.chars() {
        if c.is_ascii_whitespace() {
            if !in_space {
                out.push(' ');
            }
            in_space = true;
        } else {
            out.push(c);
            in_space = false;
        }
    }
    Cow::Owned(out)
}

fn minify(minifier: &dyn Minifier, source: &str, _language: &str) -> String {
    match minifier.minify(source) {
        Ok(minified) => minified,
        Err(_error) => {
            warning!(language = _language, error = %_error, "minifier failed, keeping original text");
            source.to_string()
        }
    }
}

impl TokenSink for Classifier<'_> {
    fn open_tag(&mut self, name: &str, attributes: &[Attribute]) -> Result<(), CompileError> {
        if let Some(slot) = self.sentinel.first_slot_in(name) {
            return Err(CompileError::SlotInTagName { slot });
        }

        let mut slotted = Vec::new();
        let _ = write!(self.current, "<{name}");
        for attribute in attributes {
            if let Some(slot) = self.sentinel.first_slot_in(&attribute.name) {
                return Err(CompileError::SlotInTagName { slot });
            }
            if let Some(slot) = self.sentinel.slot_of(&attribute.value) {
                slotted.push((slot, attribute.name.as_str()));
            } else if let Some(slot) = self.sentinel.first_slot_in(&attribute.value) {
                return Err(CompileError::PartialAttribute {
                    attribute: attribute.name.clone(),
                    slot,
                });
            } else if attribute.value.is_empty() && is_special_attribute(&attribute.name) {
                let _ = write!(self.current, " {}", attribute.name);
            } else {
                let _ = write!(
                    self.current,
                    " {}=\"{}\"",
                    attribute.name,
                    escape(&attribute.value)
                );
            }
        }

        slotted.sort_by_key(|&(slot, _)| slot);
        for (slot, name) in slotted {
            self.push_slotted_attribute(slot, name)?;
        }

        self.current.push('>');
        if !is_void_element(name) {
            self.open_elements.push(name.to_string());
        }
        Ok(())
    }

    fn close_tag(&mut self, name: &str) -> Result<(), CompileError> {
        if let Some(slot) = self.sentinel.first_slot_in(name) {
            return Err(CompileError::SlotInTagName { slot });
        }
        if is_void_element(name) {
            return Ok(());
        }
        let _ = write!(self.current, "</{name}>");
        if let Some(at) = self.open_elements.iter().rposition(|e| e == name) {
            self.open_elements.truncate(at);
        }
        Ok(())
    }

    fn text(&mut self, text: &str) -> Result<(), CompileError> {
        let pieces = self.sentinel.split_content(text);
        if pieces.len() > 1 {
            // Text carrying slots (raw-text elements) is never minified.
            for piece in pieces {
                match piece {
                    Piece::Literal(literal) => self.push_literal_text(literal),
                    Piece::Slot(slot) => self.push_slot(slot, SlotKind::Content)?,
                }
            }
            return Ok(());
        }

        if !self.in_cdata {
            match self.innermost() {
                Some("script") => {
                    let minified = minify(self.options.script_minifier.as_ref(), text, "script");
                    self.current.push_str(&minified);
                    return Ok(());
                }
                Some("style") => {
                    let minified = minify(self.options.css_minifier.as_ref(), text, "css");
                    self.current.push_str(&minified);
                    return Ok(());
                }
                _ => {}
            }
        }
        self.push_literal_text(text);
        Ok(())
    }

    fn comment(&mut self, data: &str) -> Result<(), CompileError> {
        if let Some(slot) = self.sentinel.slot_of(data) {
            return self.push_slot(slot, SlotKind::Content);
        }
        if let Some(slot) = self.sentinel.first_slot_in(data) {
            return Err(CompileError::SlotInComment { slot });
        }
        let _ = write!(self.current, "<!--{data}-->");
        Ok(())
    }

    fn cdata_start(&mut self) -> Result<(), CompileError> {
        self.current.push_str("<![CDATA[");
        self.in_cdata = true;
        Ok(())
    }

    fn cdata_end(&mut self) -> Result<(), CompileError> {
        self.current.push_str("]]>");
        self.in_cdata = false;
        Ok(())
    }

    fn processing_instruction(&mut self, _name: &str, data: &str) -> Result<(), CompileError> {
        let _ = write!(self.current, "<{data}>");
        Ok(())
    }

    fn doctype(&mut self, name: &str) -> Result<(), CompileError> {
        let _ = write!(self.current, "<!DOCTYPE {name}>");
        Ok(())
    }

    fn end(&mut self) -> Result<(), CompileError> {
        self.chunks.push(std::mem::take(&mut self.current));
        Ok(())
    }
}

/// Compile skeleton segments into literal chunks and classified slots.
///
/// ```
/// use hyperweave::{classify, Html5gumTokenizer, Options, SlotKind};
///
/// let template = classify(
///     &["<a href=", " onclick=", ">", "</a>"],
///     &Options::new(),
///     &Html5gumTokenizer,
/// )
/// .unwrap();
///
/// assert_eq!(
///     template.slots(),
///     &[SlotKind::GenericAttribute, SlotKind::Event, SlotKind::Content]
/// );
/// assert_eq!(template.chunks(), &["<a href=\"", "\" onclick=\"", "\">", "</a>"]);
/// ```
pub fn classify<S: AsRef<str>>(
    segments: &[S],
    options: &Options,
    tokenizer: &dyn HtmlTokenizer,
) -> Result<CompiledTemplate, CompileError> {
    classify_with(segments, options, tokenizer, Sentinel::get())
}

fn classify_with<S: AsRef<str>>(
    segments: &[S],
    options: &Options,
    tokenizer: &dyn HtmlTokenizer,
    sentinel: &Sentinel,
) -> Result<CompiledTemplate, CompileError> {
    let expected = segments.len().saturating_sub(1);
    debug_span!("classify", slots = expected);

    let joined = join_segments(segments, sentinel);
    let mut classifier = Classifier::new(sentinel, options);
    tokenizer.tokenize(&joined, &mut classifier)?;

    let Classifier { chunks, slots, .. } = classifier;
    if slots.len() != expected {
        return Err(CompileError::MissingSlots {
            expected,
            found: slots.len(),
        });
    }
    debug!(slots = slots.len(), chunks = chunks.len(), "compiled template");

    let found = slots.len();
    CompiledTemplate::new(chunks, slots).ok_or(CompileError::MissingSlots { expected, found })
}
