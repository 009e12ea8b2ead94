//! Error types for compiling and rendering templates.

/// Boxed error carried by rejected asynchronous values and failing transforms.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Error raised while turning a skeleton into a compiled template.
///
/// Compile errors are fatal: nothing is stored in the template cache.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CompileError {
    /// The tokenizer could not make sense of the joined skeleton.
    #[error("tokenizer error: {0}")]
    Tokenize(String),

    /// A slot was placed where an attribute or tag name is expected, e.g. `<div ${x}>`.
    #[error("slot {slot} is in a tag or attribute name position")]
    SlotInTagName {
        /// Slot index.
        slot: usize,
    },

    /// A slot shares an attribute value with literal text or other slots, e.g. `class="a ${x}"`.
    #[error("slot {slot} is only part of the value of attribute `{attribute}`")]
    PartialAttribute {
        /// Attribute name.
        attribute: String,
        /// First slot index found in the value.
        slot: usize,
    },

    /// A slot was placed inside an HTML comment.
    #[error("slot {slot} is inside a comment")]
    SlotInComment {
        /// Slot index.
        slot: usize,
    },

    /// Slots were reported in a different order than the skeleton declares them.
    #[error("expected slot {expected}, found slot {found}")]
    SlotOutOfOrder {
        /// Next slot index the classifier expected.
        expected: usize,
        /// Slot index actually encountered.
        found: usize,
    },

    /// Some slots never reached the classifier (swallowed by the markup around them).
    #[error("skeleton declares {expected} slots, only {found} were classified")]
    MissingSlots {
        /// Number of slots in the skeleton.
        expected: usize,
        /// Number of slots classified.
        found: usize,
    },
}

/// Error raised while rendering values through a compiled template.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// The skeleton could not be compiled.
    #[error(transparent)]
    Compile(#[from] CompileError),

    /// The number of values does not match the number of slots.
    #[error("template has {expected} slots, got {got} values")]
    SlotCountMismatch {
        /// Slots in the template.
        expected: usize,
        /// Values supplied.
        got: usize,
    },

    /// An asynchronous value (future or deferred placeholder) failed.
    #[error("asynchronous value for slot {slot} was rejected: {source}")]
    Rejected {
        /// Slot whose value failed.
        slot: usize,
        /// The failure reported by the value.
        #[source]
        source: BoxError,
    },

    /// A registered attribute-intent transform failed.
    #[error("attribute transform for `{attribute}` failed: {source}")]
    Intent {
        /// Attribute name.
        attribute: String,
        /// The failure reported by the transform.
        #[source]
        source: BoxError,
    },
}

/// Error reported by a script or CSS minifier.
///
/// The classifier never propagates it; the original text is kept instead.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("minifier failed: {0}")]
pub struct MinifyError(pub String);
