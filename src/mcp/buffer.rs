//! Append-only paginated buffer shared by process sessions and search jobs.
//!
//! A [`PaginatedBuffer`] only ever grows at the tail. Readers take a
//! consistent snapshot of the requested window: everything they get back is a
//! contiguous run of items that were present at the instant of the read, and
//! later appends can never invalidate an item already handed out.
//!
//! # Pagination
//!
//! - `offset >= 0`: items `[offset, offset + length)`, clamped to the current
//!   length. An offset past the end yields an empty page, not an error.
//! - `offset < 0`: the last `|offset|` items (a tail read); `length` is ignored.

use std::ops::Range;
use std::sync::{PoisonError, RwLock};

/// A window of items returned by [`PaginatedBuffer::read`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    /// The items in the window, in append order.
    pub items: Vec<T>,
    /// Absolute index of the first returned item.
    pub offset: usize,
    /// Total number of items in the buffer at read time.
    pub total: usize,
}

impl<T> Page<T> {
    /// Absolute index one past the last returned item.
    pub fn end(&self) -> usize {
        self.offset + self.items.len()
    }
}

/// Resolve an `(offset, length)` request against a buffer of `total` items.
pub fn resolve_window(total: usize, offset: i64, length: usize) -> Range<usize> {
    if offset < 0 {
        let wanted = usize::try_from(offset.unsigned_abs()).unwrap_or(usize::MAX);
        return total.saturating_sub(wanted)..total;
    }

    let start = usize::try_from(offset).unwrap_or(usize::MAX).min(total);
    let end = start.saturating_add(length).min(total);
    start..end
}

/// Append-only ordered sequence with offset/length and tail reads.
///
/// The producer appends under a short write lock; readers copy their window
/// out under a read lock, so neither side ever waits on I/O held by the other.
#[derive(Debug)]
pub struct PaginatedBuffer<T> {
    items: RwLock<Vec<T>>,
}

impl<T> Default for PaginatedBuffer<T> {
    fn default() -> Self {
        Self {
            items: RwLock::new(Vec::new()),
        }
    }
}

impl<T: Clone> PaginatedBuffer<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a buffer with pre-allocated capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            items: RwLock::new(Vec::with_capacity(capacity)),
        }
    }

    pub fn append(&self, item: T) {
        self.items
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(item);
    }

    /// Append several items as one contiguous run.
    pub fn extend<I: IntoIterator<Item = T>>(&self, items: I) {
        self.items
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(items);
    }

    pub fn len(&self) -> usize {
        self.items
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read a window using the pagination rules described in the module docs.
    pub fn read(&self, offset: i64, length: usize) -> Page<T> {
        let items = self.items.read().unwrap_or_else(PoisonError::into_inner);
        let total = items.len();
        let window = resolve_window(total, offset, length);
        Page {
            offset: window.start,
            items: items[window].to_vec(),
            total,
        }
    }

    /// Read everything from `offset` to the current end.
    pub fn read_from(&self, offset: usize) -> Page<T> {
        let items = self.items.read().unwrap_or_else(PoisonError::into_inner);
        let total = items.len();
        let start = offset.min(total);
        Page {
            offset: start,
            items: items[start..].to_vec(),
            total,
        }
    }
}
