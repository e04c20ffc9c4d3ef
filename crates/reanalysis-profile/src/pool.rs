//! Fixed-size pool of long-lived dataset handles.
//!
//! Opening an archive handle means fetching remote metadata, so a small
//! number of handles is opened once at startup and lookups are spread over
//! them in round-robin order. Handles are interchangeable and safe for
//! concurrent independent lookups; the selection counter is the only mutable
//! shared state and is advanced with a single atomic update.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::dataset::{DatasetHandle, PointSlice};
use crate::error::{ProfileError, Result};
use crate::query::{PointQuery, Tolerance};

/// Lookups allowed in flight per pool unless configured otherwise.
pub const DEFAULT_MAX_CONCURRENT_LOOKUPS: usize = 8;

/// Pool of `n` opened handles to one archive.
pub struct DatasetHandlePool {
    name: String,
    handles: Vec<Arc<dyn DatasetHandle>>,
    next: AtomicUsize,
    permits: Arc<Semaphore>,
    closed: AtomicBool,
}

impl std::fmt::Debug for DatasetHandlePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatasetHandlePool")
            .field("name", &self.name)
            .field("handles", &self.handles.len())
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl DatasetHandlePool {
    /// Open exactly `n` handles, one after another.
    ///
    /// Blocks until every open has returned. If any open fails, the handles
    /// already opened are closed and the whole initialization fails; there is
    /// no partial pool.
    pub fn initialize<H, F>(name: impl Into<String>, n: usize, mut open: F) -> Result<Self>
    where
        H: DatasetHandle,
        F: FnMut(usize) -> Result<H>,
    {
        let name = name.into();
        if n == 0 {
            return Err(ProfileError::StartupFailure {
                pool: name,
                opened: 0,
                requested: 0,
                reason: "pool size must be at least 1".to_string(),
            });
        }

        let mut handles: Vec<Arc<dyn DatasetHandle>> = Vec::with_capacity(n);
        for index in 0..n {
            match open(index) {
                Ok(handle) => {
                    info!(pool = %name, handle = index, "Opened dataset handle");
                    handles.push(Arc::new(handle));
                }
                Err(err) => {
                    warn!(pool = %name, handle = index, error = %err, "Failed to open dataset handle");
                    for (opened, handle) in handles.iter().enumerate() {
                        if let Err(close_err) = handle.close() {
                            warn!(pool = %name, handle = opened, error = %close_err, "Failed to close handle after startup failure");
                        }
                    }
                    return Err(ProfileError::StartupFailure {
                        pool: name,
                        opened: handles.len(),
                        requested: n,
                        reason: err.to_string(),
                    });
                }
            }
        }

        info!(pool = %name, size = n, "Dataset handle pool ready");

        Ok(Self {
            name,
            handles,
            next: AtomicUsize::new(0),
            permits: Arc::new(Semaphore::new(DEFAULT_MAX_CONCURRENT_LOOKUPS)),
            closed: AtomicBool::new(false),
        })
    }

    /// Bound the number of lookups executing at once.
    pub fn with_max_concurrent_lookups(mut self, max: usize) -> Self {
        self.permits = Arc::new(Semaphore::new(max.max(1)));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of handles.
    pub fn size(&self) -> usize {
        self.handles.len()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Lookup permits currently free.
    pub fn available_permits(&self) -> usize {
        self.permits.available_permits()
    }

    /// Read the current index and advance it, wrapping at the pool size, as
    /// one atomic step.
    fn next_index(&self) -> usize {
        let n = self.handles.len();
        self.next
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |i| Some((i + 1) % n))
            .unwrap_or_else(|i| i)
    }

    /// Select the next handle in round-robin order.
    fn select(&self) -> Result<(usize, Arc<dyn DatasetHandle>)> {
        if self.is_closed() {
            return Err(ProfileError::Closed(self.name.clone()));
        }
        let index = self.next_index();
        Ok((index, Arc::clone(&self.handles[index])))
    }

    /// Synchronous point lookup on the next handle.
    ///
    /// Longitude is normalized into [0, 360) before the lookup. A miss on any
    /// axis surfaces as [`ProfileError::NotFound`].
    pub fn get_at(&self, query: &PointQuery, tolerance: &Tolerance) -> Result<PointSlice> {
        let (index, handle) = self.select()?;
        let query = query.normalized();
        debug!(
            pool = %self.name,
            handle = index,
            time = %query.time,
            lat = query.latitude,
            lon = query.longitude,
            "Dispatching lookup"
        );
        handle.select_nearest(&query, tolerance)
    }

    /// Point lookup run on the blocking thread pool, bounded by `timeout`.
    ///
    /// The handle is chosen (and the counter advanced) before any waiting, so
    /// a timed-out lookup leaves the rotation consistent. The pool keeps no
    /// reference to the abandoned task; its permit is released when the
    /// blocking read finishes.
    pub async fn lookup(
        &self,
        query: PointQuery,
        tolerance: Tolerance,
        timeout: Duration,
    ) -> Result<PointSlice> {
        let (index, handle) = self.select()?;
        let query = query.normalized();
        let permits = Arc::clone(&self.permits);
        let pool = self.name.clone();

        debug!(
            pool = %self.name,
            handle = index,
            time = %query.time,
            lat = query.latitude,
            lon = query.longitude,
            "Dispatching lookup"
        );

        let work = async move {
            let permit = permits
                .acquire_owned()
                .await
                .map_err(|_| ProfileError::Closed(pool.clone()))?;

            tokio::task::spawn_blocking(move || {
                let _permit = permit;
                handle.select_nearest(&query, &tolerance)
            })
            .await
            .map_err(|e| ProfileError::read_failed(format!("lookup task on '{}' failed: {}", pool, e)))?
        };

        match tokio::time::timeout(timeout, work).await {
            Ok(result) => result,
            Err(_) => {
                warn!(pool = %self.name, handle = index, timeout_secs = timeout.as_secs_f64(), "Lookup timed out");
                Err(ProfileError::Timeout {
                    pool: self.name.clone(),
                    seconds: timeout.as_secs_f64(),
                })
            }
        }
    }

    /// Close every handle.
    ///
    /// Each handle is closed independently; failures are collected and
    /// reported together after all handles have been attempted.
    pub fn close_all(&self) -> Result<()> {
        self.closed.store(true, Ordering::Release);
        self.permits.close();

        let mut failures = Vec::new();
        for (index, handle) in self.handles.iter().enumerate() {
            match handle.close() {
                Ok(()) => debug!(pool = %self.name, handle = index, "Closed dataset handle"),
                Err(err) => {
                    warn!(pool = %self.name, handle = index, error = %err, "Failed to close dataset handle");
                    failures.push(format!("handle {}: {}", index, err));
                }
            }
        }

        if failures.is_empty() {
            info!(pool = %self.name, "Dataset handle pool closed");
            Ok(())
        } else {
            Err(ProfileError::ShutdownPartialFailure {
                pool: self.name.clone(),
                failures,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Field;
    use chrono::{TimeZone, Utc};
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    /// Handle that reports its id as the slice latitude.
    struct MockHandle {
        id: usize,
        closes: Arc<AtomicUsize>,
        fail_close: bool,
        delay: Option<Duration>,
        miss: bool,
    }

    impl MockHandle {
        fn new(id: usize, closes: Arc<AtomicUsize>) -> Self {
            Self {
                id,
                closes,
                fail_close: false,
                delay: None,
                miss: false,
            }
        }
    }

    impl DatasetHandle for MockHandle {
        fn name(&self) -> &str {
            "mock"
        }

        fn select_nearest(&self, query: &PointQuery, _tolerance: &Tolerance) -> Result<PointSlice> {
            if let Some(delay) = self.delay {
                std::thread::sleep(delay);
            }
            if self.miss {
                return Err(ProfileError::not_found("time", query.time, "none", "30m"));
            }
            let mut variables = BTreeMap::new();
            variables.insert("id".to_string(), Field::new(vec![self.id as f64], "1"));
            Ok(PointSlice {
                latitude: query.latitude,
                longitude: query.longitude,
                time: query.time,
                vertical: None,
                variables,
            })
        }

        fn close(&self) -> Result<()> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            if self.fail_close {
                Err(ProfileError::Closed(format!("mock {}", self.id)))
            } else {
                Ok(())
            }
        }
    }

    fn query() -> PointQuery {
        PointQuery::new(Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap(), 40.0, -105.0)
    }

    fn served_by(slice: &PointSlice) -> usize {
        slice.scalar("id").unwrap().value as usize
    }

    fn pool(n: usize) -> (DatasetHandlePool, Arc<AtomicUsize>) {
        let closes = Arc::new(AtomicUsize::new(0));
        let c = closes.clone();
        let pool = DatasetHandlePool::initialize("mock", n, |i| Ok(MockHandle::new(i, c.clone()))).unwrap();
        (pool, closes)
    }

    #[test]
    fn test_round_robin_is_cyclic_and_fair() {
        let (pool, _) = pool(3);
        let order: Vec<usize> = (0..12)
            .map(|_| served_by(&pool.get_at(&query(), &Tolerance::default()).unwrap()))
            .collect();
        assert_eq!(order, vec![0, 1, 2, 0, 1, 2, 0, 1, 2, 0, 1, 2]);
    }

    #[test]
    fn test_round_robin_under_concurrency() {
        let (pool, _) = pool(4);
        let pool = Arc::new(pool);
        let counts = Arc::new(Mutex::new(vec![0usize; 4]));

        let threads: Vec<_> = (0..8)
            .map(|_| {
                let pool = pool.clone();
                let counts = counts.clone();
                std::thread::spawn(move || {
                    for _ in 0..250 {
                        let slice = pool.get_at(&query(), &Tolerance::default()).unwrap();
                        counts.lock().unwrap()[served_by(&slice)] += 1;
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }

        assert_eq!(*counts.lock().unwrap(), vec![500, 500, 500, 500]);
    }

    #[test]
    fn test_longitude_is_normalized() {
        let (pool, _) = pool(1);
        let slice = pool.get_at(&query(), &Tolerance::default()).unwrap();
        assert_eq!(slice.longitude, 255.0);
    }

    #[test]
    fn test_initialize_failure_closes_opened_handles() {
        let closes = Arc::new(AtomicUsize::new(0));
        let c = closes.clone();
        let result = DatasetHandlePool::initialize("mock", 3, |i| {
            if i == 2 {
                Err(ProfileError::open_failed("network unreachable"))
            } else {
                Ok(MockHandle::new(i, c.clone()))
            }
        });

        match result {
            Err(ProfileError::StartupFailure { opened, requested, reason, .. }) => {
                assert_eq!(opened, 2);
                assert_eq!(requested, 3);
                assert!(reason.contains("network unreachable"));
            }
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("expected startup failure"),
        }
        assert_eq!(closes.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_initialize_zero_handles_fails() {
        let closes = Arc::new(AtomicUsize::new(0));
        let result = DatasetHandlePool::initialize("mock", 0, |i| Ok(MockHandle::new(i, closes.clone())));
        assert!(matches!(result, Err(ProfileError::StartupFailure { .. })));
    }

    #[test]
    fn test_close_all_collects_failures() {
        let closes = Arc::new(AtomicUsize::new(0));
        let c = closes.clone();
        let pool = DatasetHandlePool::initialize("mock", 3, |i| {
            let mut handle = MockHandle::new(i, c.clone());
            handle.fail_close = i == 1;
            Ok(handle)
        })
        .unwrap();

        match pool.close_all() {
            Err(ProfileError::ShutdownPartialFailure { failures, .. }) => {
                assert_eq!(failures.len(), 1);
                assert!(failures[0].starts_with("handle 1"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
        // Every handle was attempted despite the failure.
        assert_eq!(closes.load(Ordering::SeqCst), 3);
        assert!(pool.is_closed());
        assert!(matches!(
            pool.get_at(&query(), &Tolerance::default()),
            Err(ProfileError::Closed(_))
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_async_lookup_rotates() {
        let (pool, _) = pool(2);
        let mut served = Vec::new();
        for _ in 0..4 {
            let slice = pool
                .lookup(query(), Tolerance::default(), Duration::from_secs(5))
                .await
                .unwrap();
            served.push(served_by(&slice));
        }
        assert_eq!(served, vec![0, 1, 0, 1]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_timeout_keeps_rotation_consistent() {
        let closes = Arc::new(AtomicUsize::new(0));
        let c = closes.clone();
        let pool = DatasetHandlePool::initialize("slow", 2, |i| {
            let mut handle = MockHandle::new(i, c.clone());
            if i == 0 {
                handle.delay = Some(Duration::from_millis(500));
            }
            Ok(handle)
        })
        .unwrap();

        let err = pool
            .lookup(query(), Tolerance::default(), Duration::from_millis(20))
            .await
            .unwrap_err();
        assert!(matches!(err, ProfileError::Timeout { .. }));
        assert_eq!(err.status_code(), 504);

        // The timed-out call still consumed handle 0's turn.
        let slice = pool
            .lookup(query(), Tolerance::default(), Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(served_by(&slice), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_not_found_propagates() {
        let closes = Arc::new(AtomicUsize::new(0));
        let pool = DatasetHandlePool::initialize("miss", 1, |i| {
            let mut handle = MockHandle::new(i, closes.clone());
            handle.miss = true;
            Ok(handle)
        })
        .unwrap();

        let err = pool
            .lookup(query(), Tolerance::default(), Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.status_code(), 404);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_permits_released_after_lookup() {
        let (pool, _) = pool(2);
        let pool = pool.with_max_concurrent_lookups(3);
        assert_eq!(pool.available_permits(), 3);
        pool.lookup(query(), Tolerance::default(), Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(pool.available_permits(), 3);
    }
}
