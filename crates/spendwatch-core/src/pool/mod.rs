//! Bounded connection pool with validate-on-borrow and retry.
//!
//! Single point of access to the database: amortizes connection setup,
//! bounds concurrent backend load via a semaphore, and isolates callers
//! from transient connectivity failures.
//!
//! Capacity accounting: a borrow holds a forgotten semaphore permit that
//! is re-added on release, so `borrowed == max - available_permits` at
//! all times and `available + borrowed == size <= max`.

mod conn;

pub use conn::{from_rows, zip_rows, Connector, QueryOutput, Row, Session};

use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Semaphore};
use tokio::time::{timeout, Instant};

use crate::config::PoolSettings;
use crate::error::{Error, Result};

/// Read-only pool snapshot, consumed by the operational status endpoint.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct PoolStats {
    /// Total live connections (idle + borrowed).
    pub size: usize,
    /// Idle connections ready to be borrowed.
    pub available: usize,
    /// Callers currently waiting in `acquire`.
    pub pending: usize,
    /// Connections currently checked out.
    pub borrowed: usize,
    /// Configured minimum size target.
    pub min: usize,
    /// Configured maximum size.
    pub max: usize,
}

struct IdleEntry {
    session: Box<dyn Session>,
    last_used: Instant,
}

/// Bounded pool of live database sessions.
///
/// Constructed once per process and shared by every route handler; the
/// constructor does no I/O; connections are created on demand by
/// `acquire` and topped up toward `min` by the eviction sweep.
pub struct ConnectionPool {
    connector: Arc<dyn Connector>,
    settings: PoolSettings,
    idle: Mutex<Vec<IdleEntry>>,
    permits: Arc<Semaphore>,
    size: AtomicUsize,
    pending: AtomicUsize,
    closed: AtomicBool,
}

impl ConnectionPool {
    /// Creates a pool over `connector` with the given settings.
    #[must_use]
    pub fn new(connector: Arc<dyn Connector>, settings: PoolSettings) -> Self {
        tracing::info!(
            min = settings.min,
            max = settings.max,
            "connection pool initialized"
        );
        Self {
            permits: Arc::new(Semaphore::new(settings.max)),
            connector,
            settings,
            idle: Mutex::new(Vec::new()),
            size: AtomicUsize::new(0),
            pending: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
        }
    }

    /// Borrows a session, creating one if none is idle and the pool is
    /// below `max`. Waits cooperatively up to the acquire timeout;
    /// `PoolExhausted` when it elapses, `ConnectionFailed` when a needed
    /// connection cannot be created.
    pub async fn acquire(&self) -> Result<Box<dyn Session>> {
        if self.closed.load(Ordering::Acquire) {
            return Err(Error::PoolExhausted("pool is closed".to_string()));
        }

        self.pending.fetch_add(1, Ordering::Relaxed);
        let waited = timeout(
            self.settings.acquire_timeout(),
            Arc::clone(&self.permits).acquire_owned(),
        )
        .await;
        self.pending.fetch_sub(1, Ordering::Relaxed);

        let permit = match waited {
            Ok(Ok(permit)) => permit,
            Ok(Err(_)) => {
                return Err(Error::PoolExhausted("pool is shutting down".to_string()));
            }
            Err(_) => {
                return Err(Error::PoolExhausted(format!(
                    "no connection became available within {}ms",
                    self.settings.acquire_timeout_ms
                )));
            }
        };

        loop {
            let entry = self.idle.lock().await.pop();
            let Some(entry) = entry else {
                // Nothing idle: create a fresh connection. The held permit
                // guarantees size stays within max.
                match self.connector.connect().await {
                    Ok(session) => {
                        self.size.fetch_add(1, Ordering::Release);
                        tracing::debug!(size = self.size.load(Ordering::Relaxed), "connection created");
                        permit.forget();
                        return Ok(session);
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "failed to create connection");
                        // Dropping the permit releases the slot to other waiters.
                        return Err(e);
                    }
                }
            };

            let idle_for = entry.last_used.elapsed();
            if idle_for >= self.settings.idle_timeout() {
                self.dispose(entry.session).await;
                continue;
            }

            if idle_for >= self.settings.soft_idle_timeout() {
                let mut session = entry.session;
                if self.validate(session.as_mut()).await {
                    permit.forget();
                    return Ok(session);
                }
                tracing::warn!("idle connection failed validation, discarding");
                self.dispose(session).await;
                continue;
            }

            permit.forget();
            return Ok(entry.session);
        }
    }

    /// Returns a borrowed session to the idle set.
    ///
    /// Never surfaces errors to the caller of the original query: by the
    /// time release runs the query has already completed or failed on its
    /// own terms.
    pub async fn release(&self, session: Box<dyn Session>) {
        if self.closed.load(Ordering::Acquire) {
            self.dispose(session).await;
        } else {
            let mut idle = self.idle.lock().await;
            idle.push(IdleEntry {
                session,
                last_used: Instant::now(),
            });
            drop(idle);
        }
        self.permits.add_permits(1);
    }

    /// Destroys a borrowed session instead of pooling it (used after a
    /// query timeout, when the session state cannot be trusted).
    pub async fn discard(&self, session: Box<dyn Session>) {
        self.dispose(session).await;
        self.permits.add_permits(1);
    }

    /// Probes a session with a trivial query under the validation
    /// timeout. Returns false, never an error, on any failure, timeout
    /// or empty result, signaling the pool to discard the session.
    pub async fn validate(&self, session: &mut dyn Session) -> bool {
        match timeout(
            self.settings.validation_timeout(),
            session.execute("SELECT 1 AS probe"),
        )
        .await
        {
            Ok(Ok(output)) => !output.rows.is_empty(),
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "connection validation failed");
                false
            }
            Err(_) => {
                tracing::warn!(
                    timeout_ms = self.settings.validation_timeout_ms,
                    "connection validation timed out"
                );
                false
            }
        }
    }

    /// The composite operation: acquire → execute under the query
    /// timeout → guaranteed release on every path → shaped rows.
    ///
    /// On success and on driver-reported errors the session goes back to
    /// the idle set; on timeout it is destroyed, since an abandoned
    /// operation leaves its state unknowable.
    pub async fn query(&self, sql: &str) -> Result<Vec<Row>> {
        let started = Instant::now();
        let mut session = self.acquire().await?;
        tracing::debug!(elapsed_ms = started.elapsed().as_millis() as u64, "connection acquired");

        match timeout(self.settings.query_timeout(), session.execute(sql)).await {
            Ok(Ok(output)) => {
                self.release(session).await;
                let rows = zip_rows(output);
                tracing::debug!(
                    rows = rows.len(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "query completed"
                );
                Ok(rows)
            }
            Ok(Err(e)) => {
                self.release(session).await;
                tracing::error!(
                    error = %e,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "query failed"
                );
                Err(e)
            }
            Err(_) => {
                self.discard(session).await;
                tracing::error!(
                    timeout_ms = self.settings.query_timeout_ms,
                    "query timed out, connection discarded"
                );
                Err(Error::QueryTimeout(self.settings.query_timeout_ms))
            }
        }
    }

    /// Re-invokes [`query`](Self::query) up to `max_attempts` times,
    /// waiting `min(1000ms * 2^attempt, 10000ms)` between attempts and
    /// re-throwing the last error if every attempt fails.
    ///
    /// This is what external callers should use by default; a bare
    /// `query` is for callers that control retry themselves.
    pub async fn query_with_retry(&self, sql: &str, max_attempts: u32) -> Result<Vec<Row>> {
        let mut last_error = None;

        for attempt in 0..max_attempts {
            match self.query(sql).await {
                Ok(rows) => return Ok(rows),
                Err(e) => {
                    tracing::warn!(attempt = attempt + 1, max_attempts, error = %e, "query attempt failed");
                    last_error = Some(e);

                    if attempt + 1 < max_attempts {
                        let delay_ms = (1000u64 << attempt.min(4)).min(10_000);
                        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| Error::QueryFailed("no attempts were made".to_string())))
    }

    /// Runs a trivial query through the full pool path and reports
    /// success. For operational endpoints only, never the request path.
    pub async fn health_check(&self) -> bool {
        match self.query("SELECT 1 AS health_check").await {
            Ok(rows) => !rows.is_empty(),
            Err(e) => {
                tracing::error!(error = %e, "health check failed");
                false
            }
        }
    }

    /// Drains and clears the pool: stops handing out connections, waits
    /// (bounded by the query timeout) for outstanding borrows, then
    /// destroys all idle sessions. Idempotent and safe to call from
    /// shutdown signal handling.
    pub async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        tracing::info!("draining connection pool");

        let deadline = Instant::now() + self.settings.query_timeout();
        while self.stats().borrowed > 0 && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }

        let drained = {
            let mut idle = self.idle.lock().await;
            idle.drain(..).collect::<Vec<_>>()
        };
        for entry in drained {
            self.dispose(entry.session).await;
        }

        let still_borrowed = self.stats().borrowed;
        if still_borrowed > 0 {
            tracing::error!(still_borrowed, "pool drain incomplete");
            return Err(Error::DrainIncomplete(still_borrowed));
        }

        tracing::info!("connection pool closed");
        Ok(())
    }

    /// Whether `close` has begun.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Side-effect-free snapshot of the pool's bookkeeping.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        let size = self.size.load(Ordering::Acquire);
        let borrowed = self.settings.max.saturating_sub(self.permits.available_permits());
        PoolStats {
            size,
            available: size.saturating_sub(borrowed),
            pending: self.pending.load(Ordering::Relaxed),
            borrowed,
            min: self.settings.min,
            max: self.settings.max,
        }
    }

    /// Spawns the background eviction sweep: destroys idle sessions past
    /// the idle timeout and tops the pool back up toward `min`. The task
    /// exits once the pool is closed or dropped by every other holder.
    pub fn spawn_evictor(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        let interval = self.settings.eviction_interval();
        let pool = Arc::downgrade(&self);
        drop(self);
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(interval);
            tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tick.tick().await;
                let Some(pool) = pool.upgrade() else { break };
                if pool.is_closed() {
                    break;
                }
                pool.evict_idle().await;
                pool.ensure_min().await;
            }
        })
    }

    /// Destroys idle sessions that have outlived the idle timeout.
    async fn evict_idle(&self) {
        let expired = {
            let mut idle = self.idle.lock().await;
            let mut expired = Vec::new();
            let mut i = 0;
            while i < idle.len() {
                if idle[i].last_used.elapsed() >= self.settings.idle_timeout() {
                    expired.push(idle.swap_remove(i));
                } else {
                    i += 1;
                }
            }
            expired
        };

        if !expired.is_empty() {
            tracing::debug!(evicted = expired.len(), "evicting idle connections");
        }
        for entry in expired {
            self.dispose(entry.session).await;
        }
    }

    /// Creates connections until the pool reaches its minimum size.
    async fn ensure_min(&self) {
        while self.size.load(Ordering::Acquire) < self.settings.min && !self.is_closed() {
            match self.connector.connect().await {
                Ok(session) => {
                    self.size.fetch_add(1, Ordering::Release);
                    let mut idle = self.idle.lock().await;
                    idle.push(IdleEntry {
                        session,
                        last_used: Instant::now(),
                    });
                    tracing::debug!("replenished connection toward pool minimum");
                }
                Err(e) => {
                    tracing::warn!(error = %e, "failed to replenish pool minimum");
                    break;
                }
            }
        }
    }

    /// Closes a session and decrements the size bookkeeping. Close
    /// errors are logged, never propagated.
    async fn dispose(&self, mut session: Box<dyn Session>) {
        if let Err(e) = session.close().await {
            tracing::warn!(error = %e, "error closing connection");
        }
        self.size.fetch_sub(1, Ordering::Release);
        tracing::debug!(size = self.size.load(Ordering::Relaxed), "connection destroyed");
    }
}
