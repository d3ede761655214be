//! A cached pool of reusable objects.
//!
//! The UDP server leases one read buffer per datagram and the tracker core
//! recycles announce responses; both go through this free-list so steady
//! traffic runs without allocating. Released objects are reset to their zero
//! state *before* they re-enter the pool, so `acquire` never hands out stale
//! data.
use parking_lot::Mutex;

/// A thread-safe, non-blocking free-list. On miss, `acquire` builds a fresh
/// object instead of waiting.
pub struct Pool<T> {
    items: Mutex<Vec<T>>,
    build: Box<dyn Fn() -> T + Send + Sync>,
    reset: Box<dyn Fn(&mut T) + Send + Sync>,
}

impl<T> Pool<T> {
    pub fn new<B, R>(build: B, reset: R) -> Self
    where
        B: Fn() -> T + Send + Sync + 'static,
        R: Fn(&mut T) + Send + Sync + 'static,
    {
        Self {
            items: Mutex::new(Vec::new()),
            build: Box::new(build),
            reset: Box::new(reset),
        }
    }

    /// Takes an object from the pool, or builds a new one when the pool is
    /// empty.
    #[must_use]
    pub fn acquire(&self) -> T {
        let recycled = self.items.lock().pop();

        recycled.unwrap_or_else(|| (self.build)())
    }

    /// Resets the object to its zero state and returns it to the pool. The
    /// object must not be used after releasing it.
    pub fn release(&self, mut item: T) {
        (self.reset)(&mut item);
        self.items.lock().push(item);
    }

    /// Number of idle objects currently cached.
    #[must_use]
    pub fn idle(&self) -> usize {
        self.items.lock().len()
    }
}

/// A pool of byte buffers with a fixed capacity, for packet reads.
#[must_use]
pub fn byte_buffer_pool(capacity: usize) -> Pool<Vec<u8>> {
    Pool::new(move || Vec::with_capacity(capacity), Vec::clear)
}

#[cfg(test)]
mod tests {
    use super::{byte_buffer_pool, Pool};

    #[test]
    fn it_should_build_a_new_object_when_the_pool_is_empty() {
        let pool = byte_buffer_pool(2048);

        let buffer = pool.acquire();

        assert_eq!(buffer.len(), 0);
        assert!(buffer.capacity() >= 2048);
    }

    #[test]
    fn it_should_reuse_a_released_object_retaining_its_allocation() {
        let pool = byte_buffer_pool(2048);

        let mut buffer = pool.acquire();
        buffer.extend_from_slice(&[1, 2, 3]);
        let grown_capacity = buffer.capacity();
        pool.release(buffer);

        assert_eq!(pool.idle(), 1);

        let buffer = pool.acquire();

        assert_eq!(pool.idle(), 0);
        assert_eq!(buffer.len(), 0, "released buffers must come back empty");
        assert_eq!(buffer.capacity(), grown_capacity);
    }

    #[test]
    fn it_should_reset_objects_with_the_provided_reset_function() {
        let pool: Pool<u64> = Pool::new(|| 0, |n| *n = 0);

        pool.release(42);

        assert_eq!(pool.acquire(), 0);
    }

    #[test]
    fn it_should_tolerate_concurrent_acquire_and_release() {
        use std::sync::Arc;

        let pool = Arc::new(byte_buffer_pool(64));
        let mut handles = Vec::new();

        for _ in 0..8 {
            let pool = pool.clone();
            handles.push(std::thread::spawn(move || {
                for _ in 0..1000 {
                    let mut buffer = pool.acquire();
                    buffer.push(0xff);
                    pool.release(buffer);
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }
    }
}
