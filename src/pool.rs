//! Fixed-capacity object pool.
//!
//! Recycles frequently allocated accumulator objects (currently
//! [`crate::diagnostics::DiagnosticBag`]). The pool is incidental performance
//! plumbing: replacing it with plain allocation changes no observable
//! behavior.

use std::sync::Mutex;

/// A bounded free list of reusable `T` values.
///
/// `acquire` pops a recycled value or builds a fresh one with the factory;
/// `release` pushes a value back unless the pool is full, in which case the
/// value is simply dropped.
pub(crate) struct ObjectPool<T> {
    items: Mutex<Vec<T>>,
    factory: fn() -> T,
    capacity: usize,
}

impl<T> ObjectPool<T> {
    pub(crate) const fn new(factory: fn() -> T, capacity: usize) -> Self {
        Self {
            items: Mutex::new(Vec::new()),
            factory,
            capacity,
        }
    }

    pub(crate) fn acquire(&self) -> T {
        if let Ok(mut items) = self.items.lock() {
            if let Some(item) = items.pop() {
                return item;
            }
        }
        (self.factory)()
    }

    pub(crate) fn release(&self, item: T) {
        if let Ok(mut items) = self.items.lock() {
            if items.len() < self.capacity {
                items.push(item);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquire_prefers_recycled_values() {
        let pool: ObjectPool<Vec<u8>> = ObjectPool::new(Vec::new, 4);

        let mut value = pool.acquire();
        value.push(42);
        pool.release(value);

        // The recycled value comes back as released
        let recycled = pool.acquire();
        assert_eq!(recycled, vec![42]);

        // Nothing left, the factory takes over
        let fresh = pool.acquire();
        assert!(fresh.is_empty());
    }

    #[test]
    fn test_release_respects_capacity() {
        let pool: ObjectPool<Vec<u8>> = ObjectPool::new(Vec::new, 1);

        pool.release(vec![1]);
        pool.release(vec![2]);

        assert_eq!(pool.acquire(), vec![1]);
        assert!(pool.acquire().is_empty());
    }
}
