//! Tracing macros that compile to nothing when the tracing feature is disabled.

/// Emit a trace-level log message.
macro_rules! trace {
    ($($arg:tt)*) => {
        #[cfg(feature = "tracing")]
        tracing::trace!($($arg)*);
    };
}

/// Emit a debug-level log message.
macro_rules! debug {
    ($($arg:tt)*) => {
        #[cfg(feature = "tracing")]
        tracing::debug!($($arg)*);
    };
}

/// Emit a warn-level log message.
macro_rules! warning {
    ($($arg:tt)*) => {
        #[cfg(feature = "tracing")]
        tracing::warn!($($arg)*);
    };
}

/// Enter a debug-level span.
macro_rules! debug_span {
    ($($arg:tt)*) => {
        #[cfg(feature = "tracing")]
        let _span = tracing::debug_span!($($arg)*).entered();
    };
}

pub(crate) use debug;
pub(crate) use debug_span;
pub(crate) use trace;
pub(crate) use warning;
