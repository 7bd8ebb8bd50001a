//! single-writer, single-reader publication of immutable snapshots
//!
//! the writer swaps a boxed value in with one atomic store. old values are
//! retired on the writer side and only freed once the reader's epoch shows it
//! has left (or never entered) the frame that could have observed them.

use alloc::{boxed::Box, sync::Arc, vec::Vec};
use core::{
    cell::UnsafeCell,
    sync::atomic::{AtomicPtr, AtomicUsize, Ordering},
};

struct Shared<T> {
    current: AtomicPtr<T>,
    /// odd while the reader is inside `read`
    epoch: AtomicUsize,
    /// writer-owned; never touched through a `Reader`
    retired: UnsafeCell<Vec<(*mut T, usize)>>,
}

// SAFETY: `current` only ever points at a leaked `Box<T>`, and `retired` is
// only accessed by the unique `Writer`.
unsafe impl<T: Send + Sync> Sync for Shared<T> {}
unsafe impl<T: Send + Sync> Send for Shared<T> {}

impl<T> Drop for Shared<T> {
    fn drop(&mut self) {
        // both halves are gone, nobody can be reading
        let current = *self.current.get_mut();
        if !current.is_null() {
            drop(unsafe { Box::from_raw(current) });
        }
        for (ptr, _) in self.retired.get_mut().drain(..) {
            drop(unsafe { Box::from_raw(ptr) });
        }
    }
}

/// publishing half; builds and swaps snapshots, frees retired ones
pub(crate) struct Writer<T> {
    shared: Arc<Shared<T>>,
}

/// observing half; at most one, used from the render context
pub(crate) struct Reader<T> {
    shared: Arc<Shared<T>>,
}

pub(crate) fn channel<T>(initial: T) -> (Writer<T>, Reader<T>) {
    let shared = Arc::new(Shared {
        current: AtomicPtr::new(Box::into_raw(Box::new(initial))),
        epoch: AtomicUsize::new(0),
        retired: UnsafeCell::new(Vec::new()),
    });
    (
        Writer {
            shared: shared.clone(),
        },
        Reader { shared },
    )
}

impl<T> Writer<T> {
    /// latest published snapshot
    pub fn current(&self) -> &T {
        // SAFETY: only the writer frees snapshots, and never the current one
        unsafe { &*self.shared.current.load(Ordering::Acquire) }
    }

    /// make `next` visible to the reader; the previous snapshot is retired
    pub fn publish(&mut self, next: T) {
        let next = Box::into_raw(Box::new(next));
        let old = self.shared.current.swap(next, Ordering::SeqCst);
        let epoch = self.shared.epoch.load(Ordering::SeqCst);
        // SAFETY: `&mut self` on the unique writer
        unsafe { &mut *self.shared.retired.get() }.push((old, epoch));
        self.reclaim();
    }

    /// free every retired snapshot the reader can no longer hold
    pub fn reclaim(&mut self) {
        let now = self.shared.epoch.load(Ordering::SeqCst);
        // SAFETY: `&mut self` on the unique writer
        let retired = unsafe { &mut *self.shared.retired.get() };
        retired.retain(|&(ptr, epoch)| {
            // even: reader was outside a frame when the pointer moved, so it
            // will load the new one. changed: that frame has since ended.
            if epoch % 2 == 0 || now != epoch {
                drop(unsafe { Box::from_raw(ptr) });
                false
            } else {
                true
            }
        });
    }

    /// snapshots waiting on the reader
    pub fn retired(&self) -> usize {
        // SAFETY: shared borrow of the unique writer; no `&mut` alive
        unsafe { &*self.shared.retired.get() }.len()
    }
}

impl<T> Reader<T> {
    /// run `f` on the latest snapshot; the snapshot outlives the call
    pub fn read<R>(&mut self, f: impl FnOnce(&T) -> R) -> R {
        self.shared.epoch.fetch_add(1, Ordering::SeqCst);
        let ptr = self.shared.current.load(Ordering::SeqCst);
        // SAFETY: the writer frees `ptr` only after observing our epoch move on
        let out = f(unsafe { &*ptr });
        self.shared.epoch.fetch_add(1, Ordering::Release);
        out
    }
}
