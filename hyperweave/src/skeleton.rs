//! Skeletons: the literal backbone of a template, identified by identity.

use std::borrow::Cow;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque, process-unique identity of a [`Skeleton`].
///
/// Identities are never reused, so a cache keyed by them cannot confuse a
/// dropped skeleton with a new one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SkeletonId(u64);

impl fmt::Display for SkeletonId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

struct Inner {
    id: SkeletonId,
    segments: Box<[Cow<'static, str>]>,
}

/// The ordered literal segments of a template, with one slot between each pair.
///
/// A skeleton with `N + 1` segments has `N` slots. Cloning shares the identity;
/// two skeletons built from the same text are still different templates.
///
/// ```
/// use hyperweave::Skeleton;
///
/// let a = Skeleton::new(["<p>", "</p>"]);
/// let b = Skeleton::new(["<p>", "</p>"]);
/// assert_eq!(a.slot_count(), 1);
/// assert_eq!(a, a.clone());
/// assert_ne!(a, b);
/// ```
#[derive(Clone)]
pub struct Skeleton {
    inner: Arc<Inner>,
}

impl Skeleton {
    /// Create a skeleton with a fresh identity.
    ///
    /// An empty iterator is treated as a single empty segment.
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Cow<'static, str>>,
    {
        let mut segments: Vec<Cow<'static, str>> = segments.into_iter().map(Into::into).collect();
        if segments.is_empty() {
            segments.push(Cow::Borrowed(""));
        }
        Self {
            inner: Arc::new(Inner {
                id: SkeletonId(NEXT_ID.fetch_add(1, Ordering::Relaxed)),
                segments: segments.into_boxed_slice(),
            }),
        }
    }

    /// The identity used as cache key.
    pub fn id(&self) -> SkeletonId {
        self.inner.id
    }

    /// Literal segments, in order.
    pub fn segments(&self) -> &[Cow<'static, str>] {
        &self.inner.segments
    }

    /// Number of dynamic slots.
    pub fn slot_count(&self) -> usize {
        self.inner.segments.len() - 1
    }

    /// A non-owning handle to this skeleton.
    pub fn downgrade(&self) -> WeakSkeleton {
        WeakSkeleton {
            id: self.inner.id,
            inner: Arc::downgrade(&self.inner),
        }
    }
}

impl PartialEq for Skeleton {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for Skeleton {}

impl fmt::Debug for Skeleton {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Skeleton")
            .field("id", &self.inner.id)
            .field("segments", &self.inner.segments)
            .finish()
    }
}

/// Non-owning handle to a [`Skeleton`]; does not keep it alive.
#[derive(Clone)]
pub struct WeakSkeleton {
    id: SkeletonId,
    inner: Weak<Inner>,
}

impl WeakSkeleton {
    /// Identity of the skeleton this handle points to.
    pub fn id(&self) -> SkeletonId {
        self.id
    }

    /// Whether the skeleton is still alive somewhere.
    pub fn is_alive(&self) -> bool {
        self.inner.strong_count() > 0
    }

    /// Get the skeleton back if it is still alive.
    pub fn upgrade(&self) -> Option<Skeleton> {
        self.inner.upgrade().map(|inner| Skeleton { inner })
    }
}

impl fmt::Debug for WeakSkeleton {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakSkeleton")
            .field("id", &self.id)
            .field("alive", &self.is_alive())
            .finish()
    }
}

/// Build a [`Skeleton`] whose identity is tied to the call site.
///
/// Every evaluation of the same `skeleton!` invocation returns the same
/// identity, so rendering it repeatedly compiles once.
///
/// ```
/// fn card() -> hyperweave::Skeleton {
///     hyperweave::skeleton!["<div class=\"card\">", "</div>"]
/// }
///
/// assert_eq!(card(), card());
/// assert_eq!(card().slot_count(), 1);
/// ```
#[macro_export]
macro_rules! skeleton {
    ($($segment:expr),+ $(,)?) => {{
        static SKELETON: ::std::sync::OnceLock<$crate::Skeleton> = ::std::sync::OnceLock::new();
        SKELETON
            .get_or_init(|| $crate::Skeleton::new([$($segment),+]))
            .clone()
    }};
}
