//! A small connection pool over an in-memory, shared-cache SQLite database,
//! built on a lock-free `ArrayQueue` of checked-out connections.

use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Weak};

use crossbeam::queue::ArrayQueue;
use rusqlite::Connection;

use crate::prelude::*;

/// One shared-cache in-memory database, reachable by every connection the
/// pool hands out. The URI form is required for connections opened from
/// separate `Connection::open` calls to see each other's tables and rows.
fn memory_uri(name: &str) -> String {
    format!("file:{name}?mode=memory&cache=shared")
}

pub struct Pool {
    queue: ArrayQueue<Connection>,
    uri: String,
    // Keeps the shared-cache database alive for the pool's lifetime; SQLite
    // drops a shared-cache memory db once its last connection closes.
    _anchor: Connection,
}

impl Pool {
    pub fn open(name: &str, capacity: usize) -> Result<Arc<Self>, StoreError> {
        let uri = memory_uri(name);
        let anchor = Connection::open(&uri)?;

        let pool = Pool {
            queue: ArrayQueue::new(capacity.max(1)),
            uri,
            _anchor: anchor,
        };

        Ok(Arc::new(pool))
    }

    pub fn get(self: &Arc<Self>) -> Result<PoolConnection, StoreError> {
        let conn = match self.queue.pop() {
            Some(conn) => conn,
            None => Connection::open(&self.uri)?,
        };

        Ok(PoolConnection {
            parent: Arc::downgrade(self),
            connection: Some(conn),
        })
    }
}

/// A connection checked out from a [`Pool`]. Returns itself to the pool on
/// drop; if the pool has since been dropped, the connection is simply closed.
pub struct PoolConnection {
    parent: Weak<Pool>,
    connection: Option<Connection>,
}

impl Deref for PoolConnection {
    type Target = Connection;

    fn deref(&self) -> &Self::Target {
        self.connection.as_ref().expect("connection taken")
    }
}

impl DerefMut for PoolConnection {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.connection.as_mut().expect("connection taken")
    }
}

impl Drop for PoolConnection {
    fn drop(&mut self) {
        if let (Some(parent), Some(conn)) = (self.parent.upgrade(), self.connection.take()) {
            // A full queue just means we opened more connections than the
            // configured capacity; let this one close instead of blocking.
            let _ = parent.queue.push(conn);
        }
    }
}
