//! Bounded pool of live browser sessions.
//!
//! Capacity is enforced by a semaphore; the idle list mutex is only ever held
//! for a push or pop, never across the wait for availability. Sessions are
//! reset (cookies cleared, parked on a blank page) before going back to the
//! idle list, and discarded outright if the reset fails.

use crate::webdriver::browser::Browser;
use crate::webdriver::errors::WebDriverError;
use async_trait::async_trait;
use std::ops::Deref;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info, warn};

/// Opens fresh browser sessions on demand.
#[async_trait]
pub trait SessionFactory: Send + Sync + 'static {
    type Session: Browser + Send + Sync + 'static;

    async fn create(&self) -> Result<Self::Session, WebDriverError>;
}

/// A session on loan from the pool. Hand it back with [`SessionPool::release`];
/// dropping it without releasing frees the capacity slot but abandons the
/// underlying browser session.
pub struct PooledSession<F: SessionFactory> {
    session: F::Session,
    permit: OwnedSemaphorePermit,
}

impl<F: SessionFactory> Deref for PooledSession<F> {
    type Target = F::Session;

    fn deref(&self) -> &F::Session {
        &self.session
    }
}

pub struct SessionPool<F: SessionFactory> {
    factory: F,
    capacity: usize,
    permits: Arc<Semaphore>,
    idle: Mutex<Vec<F::Session>>,
    live: AtomicUsize,
    closed: AtomicBool,
}

impl<F: SessionFactory> SessionPool<F> {
    pub fn new(factory: F, capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            factory,
            capacity,
            permits: Arc::new(Semaphore::new(capacity)),
            idle: Mutex::new(Vec::with_capacity(capacity)),
            live: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of currently live sessions (idle + on loan).
    pub fn live_sessions(&self) -> usize {
        self.live.load(Ordering::Relaxed)
    }

    /// Borrow a session: idle-first, then a fresh one while under capacity,
    /// otherwise wait until a release frees a slot or `timeout` elapses.
    pub async fn acquire(&self, timeout: Duration) -> Result<PooledSession<F>, WebDriverError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(WebDriverError::PoolClosed);
        }

        let permit = tokio::time::timeout(timeout, self.permits.clone().acquire_owned())
            .await
            .map_err(|_| WebDriverError::AcquireTimeout(timeout))?
            .map_err(|_| WebDriverError::PoolClosed)?;

        if let Some(session) = self.idle.lock().await.pop() {
            debug!(live = self.live_sessions(), "reusing idle browser session");
            return Ok(PooledSession { session, permit });
        }

        match self.factory.create().await {
            Ok(session) => {
                let live = self.live.fetch_add(1, Ordering::Relaxed) + 1;
                info!(live, capacity = self.capacity, "browser session created");
                Ok(PooledSession { session, permit })
            }
            Err(e) => {
                drop(permit);
                Err(e)
            }
        }
    }

    /// Return a session to the pool. The session is reset to a neutral state
    /// first; a session that fails its reset is quit and discarded rather
    /// than risk serving a corrupted session to the next caller.
    pub async fn release(&self, lease: PooledSession<F>) {
        let PooledSession { session, permit } = lease;

        if self.closed.load(Ordering::Acquire) {
            self.discard(session).await;
            return;
        }

        match Self::reset(&session).await {
            Ok(()) => {
                // Push before the permit drops so a waiting acquirer always
                // sees this session instead of creating a new one.
                self.idle.lock().await.push(session);
                debug!(live = self.live_sessions(), "browser session returned to pool");
            }
            Err(e) => {
                warn!(error = %e, "session reset failed, discarding session");
                self.discard(session).await;
            }
        }
        drop(permit);
    }

    async fn reset(session: &F::Session) -> Result<(), WebDriverError> {
        session.delete_all_cookies().await?;
        session.goto("about:blank").await
    }

    async fn discard(&self, session: F::Session) {
        if let Err(e) = session.quit().await {
            warn!(error = %e, "failed to quit discarded session");
        }
        self.live.fetch_sub(1, Ordering::Relaxed);
    }

    /// Tear down the pool: refuse new acquisitions, wake all waiters with an
    /// error, and quit every idle session. Sessions currently on loan are
    /// quit when their holder releases them.
    pub async fn shutdown(&self) {
        self.closed.store(true, Ordering::Release);
        self.permits.close();

        let idle: Vec<F::Session> = self.idle.lock().await.drain(..).collect();
        let count = idle.len();
        for session in idle {
            self.discard(session).await;
        }
        info!(
            closed_idle = count,
            remaining = self.live_sessions(),
            "browser session pool shut down"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::webdriver::fake::FakeBrowser;
    use std::sync::atomic::AtomicUsize;

    struct FakeFactory {
        created: AtomicUsize,
        fail_reset: bool,
    }

    impl FakeFactory {
        fn new() -> Self {
            Self {
                created: AtomicUsize::new(0),
                fail_reset: false,
            }
        }

        fn failing_reset() -> Self {
            Self {
                created: AtomicUsize::new(0),
                fail_reset: true,
            }
        }
    }

    #[async_trait]
    impl SessionFactory for FakeFactory {
        type Session = FakeBrowser;

        async fn create(&self) -> Result<FakeBrowser, WebDriverError> {
            self.created.fetch_add(1, Ordering::Relaxed);
            let browser = FakeBrowser::new();
            if self.fail_reset {
                browser.fail_cookie_clear();
            }
            Ok(browser)
        }
    }

    #[tokio::test]
    async fn acquire_creates_up_to_capacity() {
        let pool = SessionPool::new(FakeFactory::new(), 2);
        let a = pool.acquire(Duration::from_millis(50)).await.unwrap();
        let b = pool.acquire(Duration::from_millis(50)).await.unwrap();
        assert_eq!(pool.live_sessions(), 2);

        pool.release(a).await;
        pool.release(b).await;
        assert_eq!(pool.live_sessions(), 2);
    }

    #[tokio::test]
    async fn acquire_reuses_idle_session() {
        let pool = SessionPool::new(FakeFactory::new(), 2);
        let lease = pool.acquire(Duration::from_millis(50)).await.unwrap();
        pool.release(lease).await;

        let _again = pool.acquire(Duration::from_millis(50)).await.unwrap();
        assert_eq!(pool.factory.created.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn acquire_times_out_when_exhausted() {
        let pool = SessionPool::new(FakeFactory::new(), 1);
        let _held = pool.acquire(Duration::from_millis(50)).await.unwrap();

        let result = pool.acquire(Duration::from_millis(20)).await;
        assert!(matches!(result, Err(WebDriverError::AcquireTimeout(_))));
    }

    #[tokio::test]
    async fn blocked_acquire_proceeds_after_release() {
        let pool = SessionPool::new(FakeFactory::new(), 1);
        let held = pool.acquire(Duration::from_millis(50)).await.unwrap();

        let waiter = {
            let pool = pool.clone();
            tokio::spawn(async move { pool.acquire(Duration::from_secs(2)).await })
        };
        // Give the waiter time to block on the semaphore.
        tokio::time::sleep(Duration::from_millis(20)).await;
        pool.release(held).await;

        let lease = waiter.await.unwrap().expect("waiter should get the released session");
        assert_eq!(pool.live_sessions(), 1);
        pool.release(lease).await;
    }

    #[tokio::test]
    async fn failed_reset_discards_session() {
        let pool = SessionPool::new(FakeFactory::failing_reset(), 1);
        let lease = pool.acquire(Duration::from_millis(50)).await.unwrap();
        pool.release(lease).await;

        // The corrupted session was discarded, so the next acquire builds a
        // fresh one instead of handing back the old handle.
        assert_eq!(pool.live_sessions(), 0);
        let _fresh = pool.acquire(Duration::from_millis(50)).await.unwrap();
        assert_eq!(pool.factory.created.load(Ordering::Relaxed), 2);
    }

    #[tokio::test]
    async fn shutdown_quits_idle_and_rejects_acquires() {
        let pool = SessionPool::new(FakeFactory::new(), 2);
        let lease = pool.acquire(Duration::from_millis(50)).await.unwrap();
        pool.release(lease).await;

        pool.shutdown().await;
        assert_eq!(pool.live_sessions(), 0);

        let result = pool.acquire(Duration::from_millis(20)).await;
        assert!(matches!(result, Err(WebDriverError::PoolClosed)));
    }
}
