//! Bounded connection pool.
//!
//! Every connection is created up front and handed to one caller at a time.
//! [`Pool::acquire`] waits while all of them are checked out; the returned
//! [`Pooled`] guard puts its connection back when it is released or dropped,
//! so every exit path (including `?` and panics) returns it.
//!
//! The free list is guarded by a single mutex held only while pushing or
//! popping. A semaphore whose permit count mirrors the length of the free
//! list provides the "pool non-empty" wait.

use parking_lot::Mutex;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Semaphore;

/// Pool errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PoolError {
    #[error("connection pool is closed")]
    Closed,
}

/// A fixed-size pool of reusable connections.
pub struct Pool<C> {
    shared: Arc<Shared<C>>,
}

struct Shared<C> {
    free: Mutex<Vec<C>>,
    ready: Semaphore,
    size: usize,
}

impl<C> Pool<C> {
    /// Create a pool owning `connections`. The pool size is their count.
    pub fn new(connections: Vec<C>) -> Self {
        let size = connections.len();
        Self {
            shared: Arc::new(Shared {
                free: Mutex::new(connections),
                ready: Semaphore::new(size),
                size,
            }),
        }
    }

    /// Configured number of connections.
    pub fn size(&self) -> usize {
        self.shared.size
    }

    /// Connections currently on the free list.
    pub fn available(&self) -> usize {
        self.shared.free.lock().len()
    }

    /// Connections currently held by callers.
    pub fn checked_out(&self) -> usize {
        self.shared.size.saturating_sub(self.available())
    }

    /// Whether [`Pool::close`] has been called.
    pub fn is_closed(&self) -> bool {
        self.shared.ready.is_closed()
    }

    /// Take a connection, waiting until one is free.
    ///
    /// Waiters are woken one per release. Fails only once the pool is closed.
    pub async fn acquire(&self) -> Result<Pooled<C>, PoolError> {
        let permit = self
            .shared
            .ready
            .acquire()
            .await
            .map_err(|_| PoolError::Closed)?;
        // The permit is returned by `Pooled::drop`, together with the connection.
        permit.forget();

        // Permits never outnumber free connections, so this only misses if
        // the pool was closed and drained in between.
        let Some(conn) = self.shared.free.lock().pop() else {
            return Err(PoolError::Closed);
        };

        Ok(Pooled {
            conn: Some(conn),
            shared: Arc::clone(&self.shared),
        })
    }

    /// Return a connection to the pool. Equivalent to dropping the guard.
    pub fn release(&self, conn: Pooled<C>) {
        drop(conn);
    }

    /// Close the pool: pending and future `acquire` calls fail, and the idle
    /// connections are handed back to the caller for shutdown. Connections
    /// still checked out are dropped when their guard is released.
    pub fn close(&self) -> Vec<C> {
        self.shared.ready.close();
        std::mem::take(&mut *self.shared.free.lock())
    }
}

impl<C> Clone for Pool<C> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<C> fmt::Debug for Pool<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("size", &self.size())
            .field("available", &self.available())
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// A connection checked out of a [`Pool`].
pub struct Pooled<C> {
    conn: Option<C>,
    shared: Arc<Shared<C>>,
}

impl<C> Deref for Pooled<C> {
    type Target = C;

    fn deref(&self) -> &C {
        self.conn.as_ref().expect("pooled connection is present until drop")
    }
}

impl<C> DerefMut for Pooled<C> {
    fn deref_mut(&mut self) -> &mut C {
        self.conn.as_mut().expect("pooled connection is present until drop")
    }
}

impl<C> Drop for Pooled<C> {
    fn drop(&mut self) {
        let Some(conn) = self.conn.take() else {
            return;
        };
        if self.shared.ready.is_closed() {
            return;
        }
        // Push before adding the permit so a woken waiter always finds it.
        self.shared.free.lock().push(conn);
        self.shared.ready.add_permits(1);
    }
}
