//! Compiled templates.

use std::fmt;

/// What a slot means, decided once at compile time.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SlotKind {
    /// `on*` attribute: the value is an event handler.
    Event,
    /// Boolean attribute printed as ` name` when the value is true, omitted otherwise.
    BooleanAttribute(String),
    /// `style` attribute: a string or a map of CSS properties.
    Style,
    /// Attribute with a registered transform.
    AttributeIntent(String),
    /// Any other attribute value.
    GenericAttribute,
    /// Child content.
    Content,
}

impl fmt::Display for SlotKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotKind::Event => f.write_str("event"),
            SlotKind::BooleanAttribute(name) => write!(f, "boolean attribute `{name}`"),
            SlotKind::Style => f.write_str("style"),
            SlotKind::AttributeIntent(name) => write!(f, "attribute intent `{name}`"),
            SlotKind::GenericAttribute => f.write_str("attribute"),
            SlotKind::Content => f.write_str("content"),
        }
    }
}

/// Literal chunks interleaved with classified slots.
///
/// Output is `chunks[0]`, slot 0, `chunks[1]`, ..., `chunks[n]`. There is
/// always exactly one more chunk than there are slots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledTemplate {
    chunks: Vec<String>,
    slots: Vec<SlotKind>,
}

impl CompiledTemplate {
    /// Build a template, checking the chunk/slot parity.
    ///
    /// Returns `None` unless `chunks.len() == slots.len() + 1`.
    pub fn new(chunks: Vec<String>, slots: Vec<SlotKind>) -> Option<Self> {
        (chunks.len() == slots.len() + 1).then_some(Self { chunks, slots })
    }

    /// Literal chunks.
    pub fn chunks(&self) -> &[String] {
        &self.chunks
    }

    /// Slot kinds, in source order.
    pub fn slots(&self) -> &[SlotKind] {
        &self.slots
    }

    /// Number of slots.
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }
}
