//! Deferred deletion of GPU objects that may still be in use by in-flight frames.

#[derive(Debug)]
struct Item<T> {
    value: T,
    // Time to live
    ttl: u32,
}

/// Queue of objects waiting to be dropped. Each object is dropped after a fixed number of calls to
/// [`DeletionQueue::next_frame()`], so the GPU is guaranteed to be done with it.
#[derive(Debug)]
pub struct DeletionQueue<T> {
    max_ttl: u32,
    items: Vec<Item<T>>,
}

impl<T> DeletionQueue<T> {
    /// Create a new deletion queue. Objects pushed onto it live for `max_ttl` frames.
    /// A `max_ttl` of zero drops objects as soon as they are pushed.
    pub fn new(max_ttl: u32) -> DeletionQueue<T> {
        DeletionQueue {
            max_ttl,
            items: vec![],
        }
    }

    /// Pushes a value onto the deletion queue.
    /// Note that this moves out of the parameter so that you can't access an object after
    /// it is pushed.
    pub fn push(&mut self, value: T) {
        if self.max_ttl == 0 {
            drop(value);
            return;
        }
        self.items.push(Item {
            value,
            ttl: self.max_ttl,
        });
    }

    /// Advance the frame counter by one, decreasing time to live by one on each element.
    /// If time to live of an element reaches zero, it is deleted.
    pub fn next_frame(&mut self) {
        self.items.iter_mut().for_each(|item| item.ttl -= 1);
        self.items.retain(|item| item.ttl != 0);
    }

    /// Number of objects still waiting to be deleted.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether there are no objects waiting to be deleted.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Drop every pending object immediately.
    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Iterate over all pending objects.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter().map(|item| &item.value)
    }
}
