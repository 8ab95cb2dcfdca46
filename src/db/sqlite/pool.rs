//! Per-worker SQLite connection pool
//!
//! Each worker (thread) owns at most one idle connection. `acquire` hands the
//! worker its own connection after a `SELECT 1` liveness probe, or lazily opens
//! a new one when the worker has none or the probe fails. Connections go back
//! to the pool through `release` (or by dropping the guard) and are never
//! handed to a different worker. When the idle cap is reached, the connection
//! released longest ago is evicted, so slots held by workers that have since
//! exited are reclaimed.

use crate::error::{AppError, Result};
use dashmap::DashMap;
use parking_lot::Mutex;
use rusqlite::{Connection, OpenFlags};
use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};
use std::thread::ThreadId;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Identity a connection is bound to
pub type WorkerId = ThreadId;

/// Liveness check run before a connection is handed out
pub type Probe = fn(&Connection) -> rusqlite::Result<()>;

struct IdleConnection {
    conn: Mutex<Connection>,
    released_at: Instant,
}

/// Connection pool keyed by worker identity
pub struct ConnectionPool {
    path: PathBuf,
    timeout: Duration,
    max_idle: usize,
    probe: Probe,
    idle: DashMap<WorkerId, IdleConnection>,
}

impl ConnectionPool {
    /// Create a pool; no connection is opened until the first `acquire`
    pub fn new(path: &Path, timeout: Duration, max_idle: usize) -> Self {
        Self::with_probe(path, timeout, max_idle, select_one)
    }

    /// Create a pool with a custom liveness check
    pub(crate) fn with_probe(path: &Path, timeout: Duration, max_idle: usize, probe: Probe) -> Self {
        Self {
            path: path.to_path_buf(),
            timeout,
            max_idle: max_idle.max(1),
            probe,
            idle: DashMap::new(),
        }
    }

    /// Identity of the calling worker
    pub fn current_worker() -> WorkerId {
        std::thread::current().id()
    }

    /// Take the worker's connection, probing it first, or open a fresh one
    pub fn acquire(&self, worker: WorkerId) -> Result<PooledConnection<'_>> {
        if let Some((_, cached)) = self.idle.remove(&worker) {
            let conn = cached.conn.into_inner();
            match (self.probe)(&conn) {
                Ok(()) => return Ok(PooledConnection::new(self, worker, conn)),
                Err(e) => {
                    warn!("Discarding stale connection for worker {:?}: {}", worker, e);
                    drop(conn);
                }
            }
        }

        let conn = self.open()?;
        debug!("Opened store connection for worker {:?}", worker);
        Ok(PooledConnection::new(self, worker, conn))
    }

    /// Return a connection to the worker's slot, evicting the least recently
    /// released connection when the idle cap is reached
    pub fn release(&self, worker: WorkerId, conn: Connection) {
        if !self.idle.contains_key(&worker) {
            while self.idle.len() >= self.max_idle {
                let Some(oldest) = self.least_recently_released() else {
                    break;
                };
                if self.idle.remove(&oldest).is_some() {
                    debug!(
                        "Idle connection cap ({}) reached; evicted connection of worker {:?}",
                        self.max_idle, oldest
                    );
                }
            }
        }
        self.idle.insert(
            worker,
            IdleConnection {
                conn: Mutex::new(conn),
                released_at: Instant::now(),
            },
        );
    }

    /// Number of idle connections currently held
    pub fn idle_count(&self) -> usize {
        self.idle.len()
    }

    /// Drop every idle connection
    pub fn clear(&self) {
        self.idle.clear();
    }

    fn least_recently_released(&self) -> Option<WorkerId> {
        self.idle
            .iter()
            .min_by_key(|entry| entry.released_at)
            .map(|entry| *entry.key())
    }

    fn open(&self) -> Result<Connection> {
        // Never create the database here; a missing file is a connectivity failure.
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;

        let conn = Connection::open_with_flags(&self.path, flags).map_err(|e| {
            AppError::Connectivity(format!(
                "failed to open store at {}: {}",
                self.path.display(),
                e
            ))
        })?;

        conn.busy_timeout(self.timeout)
            .and_then(|_| (self.probe)(&conn))
            .map_err(|e| {
                AppError::Connectivity(format!(
                    "store at {} failed liveness probe: {}",
                    self.path.display(),
                    e
                ))
            })?;

        Ok(conn)
    }
}

/// Trivial query used to validate a connection before reuse
fn select_one(conn: &Connection) -> rusqlite::Result<()> {
    conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
        .map(|_| ())
}

/// A connection checked out by one worker; released back on drop
pub struct PooledConnection<'a> {
    pool: &'a ConnectionPool,
    worker: WorkerId,
    conn: Option<Connection>,
}

impl<'a> PooledConnection<'a> {
    fn new(pool: &'a ConnectionPool, worker: WorkerId, conn: Connection) -> Self {
        Self {
            pool,
            worker,
            conn: Some(conn),
        }
    }

    /// Explicitly hand the connection back to the pool
    pub fn release(mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.release(self.worker, conn);
        }
    }

    /// Close the connection instead of returning it
    pub fn discard(mut self) {
        self.conn.take();
    }
}

impl Deref for PooledConnection<'_> {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        // Only `release`/`discard` take the connection, and both consume the guard.
        self.conn.as_ref().unwrap_or_else(|| unreachable!("pooled connection already taken"))
    }
}

impl DerefMut for PooledConnection<'_> {
    fn deref_mut(&mut self) -> &mut Connection {
        self.conn.as_mut().unwrap_or_else(|| unreachable!("pooled connection already taken"))
    }
}

impl Drop for PooledConnection<'_> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.release(self.worker, conn);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn create_db(path: &Path) {
        let conn = Connection::open(path).unwrap();
        conn.execute_batch("CREATE TABLE t (x INTEGER);").unwrap();
    }

    #[test]
    fn test_acquire_reuses_worker_connection() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pool.db");
        create_db(&path);

        let pool = ConnectionPool::new(&path, Duration::from_secs(5), 4);
        let worker = ConnectionPool::current_worker();

        let conn = pool.acquire(worker).unwrap();
        conn.execute("INSERT INTO t (x) VALUES (1)", []).unwrap();
        conn.release();
        assert_eq!(pool.idle_count(), 1);

        let conn = pool.acquire(worker).unwrap();
        assert_eq!(pool.idle_count(), 0);
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM t", [], |r| r.get(0)).unwrap();
        assert_eq!(count, 1);
        drop(conn);
        assert_eq!(pool.idle_count(), 1);
    }

    #[test]
    fn test_missing_database_is_connectivity_error() {
        let dir = tempdir().unwrap();
        let pool = ConnectionPool::new(&dir.path().join("absent.db"), Duration::from_secs(1), 4);

        let result = pool.acquire(ConnectionPool::current_worker());
        assert!(matches!(result, Err(AppError::Connectivity(_))));
        assert!(!dir.path().join("absent.db").exists());
    }

    #[test]
    fn test_discarded_connection_is_reopened() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("discard.db");
        create_db(&path);

        let pool = ConnectionPool::new(&path, Duration::from_secs(1), 4);
        let worker = ConnectionPool::current_worker();

        pool.acquire(worker).unwrap().discard();
        assert_eq!(pool.idle_count(), 0);

        let conn = pool.acquire(worker).unwrap();
        conn.execute("INSERT INTO t (x) VALUES (2)", []).unwrap();
    }

    #[test]
    fn test_workers_never_share_connections() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("workers.db");
        create_db(&path);

        let pool = std::sync::Arc::new(ConnectionPool::new(&path, Duration::from_secs(5), 8));
        let handles: Vec<_> = (0..3)
            .map(|_| {
                let pool = pool.clone();
                std::thread::spawn(move || {
                    let worker = ConnectionPool::current_worker();
                    pool.acquire(worker).unwrap().release();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(pool.idle_count(), 3);
    }

    fn has_marker(conn: &Connection) -> bool {
        conn.query_row("SELECT COUNT(*) FROM temp.marker", [], |r| r.get::<_, i64>(0))
            .is_ok()
    }

    #[test]
    fn test_idle_cap_evicts_least_recently_released() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cap.db");
        create_db(&path);

        let pool = std::sync::Arc::new(ConnectionPool::new(&path, Duration::from_secs(5), 1));
        let worker = ConnectionPool::current_worker();
        let conn = pool.acquire(worker).unwrap();
        conn.execute_batch("CREATE TEMP TABLE marker (x INTEGER);").unwrap();
        conn.release();

        let other = pool.clone();
        std::thread::spawn(move || {
            other.acquire(ConnectionPool::current_worker()).unwrap().release();
        })
        .join()
        .unwrap();

        assert_eq!(pool.idle_count(), 1);
        assert!(!has_marker(&pool.acquire(worker).unwrap()));
    }

    #[test]
    fn test_live_worker_reuses_connection_after_worker_turnover() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("turnover.db");
        create_db(&path);

        let pool = std::sync::Arc::new(ConnectionPool::new(&path, Duration::from_secs(5), 4));
        for _ in 0..4 {
            let pool = pool.clone();
            std::thread::spawn(move || {
                pool.acquire(ConnectionPool::current_worker()).unwrap().release();
            })
            .join()
            .unwrap();
        }
        assert_eq!(pool.idle_count(), 4);

        let live = pool.clone();
        let reused = std::thread::spawn(move || {
            let worker = ConnectionPool::current_worker();
            let conn = live.acquire(worker).unwrap();
            conn.execute_batch("CREATE TEMP TABLE marker (x INTEGER);").unwrap();
            conn.release();

            let reused = has_marker(&live.acquire(worker).unwrap());
            reused
        })
        .join()
        .unwrap();

        assert!(reused);
        assert_eq!(pool.idle_count(), 4);
    }

    fn rejects_marked(conn: &Connection) -> rusqlite::Result<()> {
        if has_marker(conn) {
            return Err(rusqlite::Error::InvalidQuery);
        }
        select_one(conn)
    }

    #[test]
    fn test_failed_liveness_check_opens_fresh_connection() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("stale.db");
        create_db(&path);

        let pool = ConnectionPool::with_probe(&path, Duration::from_secs(5), 4, rejects_marked);
        let worker = ConnectionPool::current_worker();

        let conn = pool.acquire(worker).unwrap();
        conn.execute_batch("CREATE TEMP TABLE marker (x INTEGER);").unwrap();
        conn.release();
        assert_eq!(pool.idle_count(), 1);

        let conn = pool.acquire(worker).unwrap();
        assert_eq!(pool.idle_count(), 0);
        assert!(!has_marker(&conn));
        conn.execute("INSERT INTO t (x) VALUES (3)", []).unwrap();
        conn.release();
        assert_eq!(pool.idle_count(), 1);
    }
}
