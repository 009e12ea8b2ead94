//! Identity-keyed cache of compiled templates.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use once_cell::sync::OnceCell;
use parking_lot::RwLock;

use crate::error::CompileError;
use crate::skeleton::{Skeleton, SkeletonId, WeakSkeleton};
use crate::template::CompiledTemplate;
use crate::tracing_macros::{debug, trace};

struct Entry {
    skeleton: WeakSkeleton,
    template: OnceCell<Arc<CompiledTemplate>>,
}

/// Maps skeleton identities to their compiled templates.
///
/// Each identity is compiled at most once, even when several threads ask for
/// it at the same time: one compiles, the others wait for its result. A failed
/// compile stores nothing, so the next call tries again. The cache only holds
/// weak references to skeletons; [`purge`](Self::purge) drops entries whose
/// skeleton is gone.
#[derive(Default)]
pub struct TemplateCache {
    entries: RwLock<HashMap<SkeletonId, Arc<Entry>>>,
    compiles: AtomicUsize,
}

impl TemplateCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the template for `skeleton`, compiling it with `compile` on a miss.
    pub fn get_or_compile<F>(
        &self,
        skeleton: &Skeleton,
        compile: F,
    ) -> Result<Arc<CompiledTemplate>, CompileError>
    where
        F: FnOnce(&Skeleton) -> Result<CompiledTemplate, CompileError>,
    {
        let entry = self.entry(skeleton);

        if let Some(template) = entry.template.get() {
            trace!(id = %skeleton.id(), "template cache hit");
            return Ok(Arc::clone(template));
        }

        let template = entry.template.get_or_try_init(|| {
            debug!(id = %skeleton.id(), slots = skeleton.slot_count(), "compiling template");
            self.compiles.fetch_add(1, Ordering::Relaxed);
            compile(skeleton).map(Arc::new)
        })?;
        Ok(Arc::clone(template))
    }

    fn entry(&self, skeleton: &Skeleton) -> Arc<Entry> {
        let id = skeleton.id();
        if let Some(entry) = self.entries.read().get(&id) {
            return Arc::clone(entry);
        }

        let mut entries = self.entries.write();
        Arc::clone(entries.entry(id).or_insert_with(|| {
            Arc::new(Entry {
                skeleton: skeleton.downgrade(),
                template: OnceCell::new(),
            })
        }))
    }

    /// Number of compiles performed so far.
    pub fn compile_count(&self) -> usize {
        self.compiles.load(Ordering::Relaxed)
    }

    /// Number of compiled templates held by the cache.
    ///
    /// Identities whose compile failed or is still running are not counted.
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .values()
            .filter(|entry| entry.template.get().is_some())
            .count()
    }

    /// Whether the cache holds no compiled template.
    pub fn is_empty(&self) -> bool {
        !self
            .entries
            .read()
            .values()
            .any(|entry| entry.template.get().is_some())
    }

    /// Drop entries whose skeleton no longer exists. Returns how many were dropped.
    pub fn purge(&self) -> usize {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, entry| entry.skeleton.is_alive());
        let purged = before - entries.len();
        if purged > 0 {
            debug!(purged, "purged template cache");
        }
        purged
    }
}

impl std::fmt::Debug for TemplateCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemplateCache")
            .field("entries", &self.len())
            .field("compiles", &self.compile_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::SlotKind;
    use std::sync::Barrier;
    use std::thread;
    use std::time::Duration;

    fn fake_compile(skeleton: &Skeleton) -> Result<CompiledTemplate, CompileError> {
        let chunks = skeleton.segments().iter().map(|s| s.to_string()).collect();
        let slots = vec![SlotKind::Content; skeleton.slot_count()];
        Ok(CompiledTemplate::new(chunks, slots).unwrap())
    }

    #[test]
    fn test_hit_returns_same_template() {
        let cache = TemplateCache::new();
        let s = Skeleton::new(["<p>", "</p>"]);
        let a = cache.get_or_compile(&s, fake_compile).unwrap();
        let b = cache
            .get_or_compile(&s, |_| panic!("must not recompile"))
            .unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.compile_count(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_identity_not_text_is_the_key() {
        let cache = TemplateCache::new();
        let a = Skeleton::new(["<p>", "</p>"]);
        let b = Skeleton::new(["<p>", "</p>"]);
        cache.get_or_compile(&a, fake_compile).unwrap();
        cache.get_or_compile(&b, fake_compile).unwrap();
        assert_eq!(cache.compile_count(), 2);
    }

    #[test]
    fn test_failed_compile_stores_nothing() {
        let cache = TemplateCache::new();
        let s = Skeleton::new(["<p>", "</p>"]);
        let err = cache
            .get_or_compile(&s, |_| Err(CompileError::Tokenize("nope".into())))
            .unwrap_err();
        assert_eq!(err, CompileError::Tokenize("nope".into()));
        assert!(cache.is_empty());
        assert_eq!(cache.len(), 0);
        assert!(cache.get_or_compile(&s, fake_compile).is_ok());
        assert_eq!(cache.compile_count(), 2);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_concurrent_compiles_are_single_flight() {
        let cache = TemplateCache::new();
        let s = Skeleton::new(["<b>", "</b>"]);
        let barrier = Barrier::new(8);

        thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    barrier.wait();
                    cache
                        .get_or_compile(&s, |sk| {
                            thread::sleep(Duration::from_millis(20));
                            fake_compile(sk)
                        })
                        .unwrap();
                });
            }
        });

        assert_eq!(cache.compile_count(), 1);
    }

    #[test]
    fn test_purge_drops_dead_skeletons() {
        let cache = TemplateCache::new();
        let kept = Skeleton::new(["<i>", "</i>"]);
        let dropped = Skeleton::new(["<u>", "</u>"]);
        cache.get_or_compile(&kept, fake_compile).unwrap();
        cache.get_or_compile(&dropped, fake_compile).unwrap();

        assert_eq!(cache.purge(), 0);
        drop(dropped);
        assert_eq!(cache.purge(), 1);
        assert_eq!(cache.len(), 1);
        assert!(!cache.is_empty());
    }
}
