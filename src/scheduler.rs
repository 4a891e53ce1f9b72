//! Adaptive write scheduler.
//!
//! Every outbound buffer passes through a [`WriteScheduler`] before reaching
//! the transport. The scheduler bounds the number of buffers in flight,
//! splits each buffer into chunks, and tunes the chunk size from the latency
//! it observes on each chunk write.
//!
//! # Architecture
//!
//! ```text
//! Sender 1 ─┐                ┌─ slot 1 ─┐
//! Sender 2 ─┼─► Semaphore ───┼─ slot 2 ─┼─► chunk, chunk, ... ─► Transport
//! Sender N ─┘   (FIFO queue) └─ slot 3 ─┘
//! ```
//!
//! # Flow adaptation
//!
//! After each chunk write with latency `t`:
//! - `t > 200ms`: shrink chunks by 25 bytes (not below 400) and throttle
//! - `t < 5ms`: grow chunks by 10 bytes (up to 500) and stop throttling
//! - `t > 100ms` with chunks remaining: pause 2ms before the next chunk
//!
//! While throttled, chunks are capped at 200 bytes. A failed chunk aborts
//! the rest of its buffer and shrinks chunks by 50 bytes (not below 300).

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{Semaphore, SemaphorePermit};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::{EventLinkError, Result};
use crate::transport::{Transport, WriteError};

/// Default maximum buffers in flight.
pub const DEFAULT_MAX_PENDING_WRITES: usize = 3;

/// Default (and maximum) adaptive chunk size.
pub const DEFAULT_CHUNK_BYTES: usize = 500;

/// Lower bound of the adaptive chunk size.
pub const MIN_CHUNK_BYTES: usize = 200;

/// Chunk cap while throttled.
pub const THROTTLED_CHUNK_BYTES: usize = 200;

const SLOW_STEP: usize = 25;
const SLOW_FLOOR: usize = 400;
const FAST_STEP: usize = 10;
const FAILURE_STEP: usize = 50;
const FAILURE_FLOOR: usize = 300;

/// Scheduler tuning. Durations are in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Buffers allowed in flight before callers queue.
    pub max_pending_writes: usize,
    /// Chunk size on a fresh connection.
    pub initial_chunk_bytes: usize,
    /// Smallest adaptive chunk size.
    pub min_chunk_bytes: usize,
    /// Largest adaptive chunk size.
    pub max_chunk_bytes: usize,
    /// Chunk cap applied while throttled.
    pub throttled_chunk_bytes: usize,
    /// Latency above which the link counts as saturated.
    pub slow_write_ms: u64,
    /// Latency below which the link counts as idle.
    pub fast_write_ms: u64,
    /// Latency above which a pause is inserted between chunks.
    pub yield_after_ms: u64,
    /// Length of that pause.
    pub throttle_pause_ms: u64,
    /// Request acknowledged writes from the transport.
    pub write_with_response: bool,
    /// Give up waiting for a write slot after this long. `None` waits forever.
    pub admission_timeout_ms: Option<u64>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_pending_writes: DEFAULT_MAX_PENDING_WRITES,
            initial_chunk_bytes: DEFAULT_CHUNK_BYTES,
            min_chunk_bytes: MIN_CHUNK_BYTES,
            max_chunk_bytes: DEFAULT_CHUNK_BYTES,
            throttled_chunk_bytes: THROTTLED_CHUNK_BYTES,
            slow_write_ms: 200,
            fast_write_ms: 5,
            yield_after_ms: 100,
            throttle_pause_ms: 2,
            write_with_response: false,
            admission_timeout_ms: None,
        }
    }
}

impl SchedulerConfig {
    /// Check that the values describe a usable scheduler.
    pub fn validate(&self) -> Result<()> {
        if self.max_pending_writes == 0 {
            return Err(EventLinkError::Config(
                "max_pending_writes must be at least 1".into(),
            ));
        }
        if self.max_pending_writes > Semaphore::MAX_PERMITS {
            return Err(EventLinkError::Config(format!(
                "max_pending_writes {} exceeds {}",
                self.max_pending_writes,
                Semaphore::MAX_PERMITS
            )));
        }
        if self.min_chunk_bytes == 0 || self.throttled_chunk_bytes == 0 {
            return Err(EventLinkError::Config("chunk sizes must be non-zero".into()));
        }
        if self.min_chunk_bytes > self.max_chunk_bytes {
            return Err(EventLinkError::Config(format!(
                "min_chunk_bytes {} exceeds max_chunk_bytes {}",
                self.min_chunk_bytes, self.max_chunk_bytes
            )));
        }
        if !(self.min_chunk_bytes..=self.max_chunk_bytes).contains(&self.initial_chunk_bytes) {
            return Err(EventLinkError::Config(format!(
                "initial_chunk_bytes {} outside [{}, {}]",
                self.initial_chunk_bytes, self.min_chunk_bytes, self.max_chunk_bytes
            )));
        }
        if !(self.fast_write_ms < self.yield_after_ms && self.yield_after_ms <= self.slow_write_ms) {
            return Err(EventLinkError::Config(format!(
                "latency thresholds must satisfy fast ({}) < yield ({}) <= slow ({})",
                self.fast_write_ms, self.yield_after_ms, self.slow_write_ms
            )));
        }
        Ok(())
    }

    fn slow_write(&self) -> Duration {
        Duration::from_millis(self.slow_write_ms)
    }

    fn fast_write(&self) -> Duration {
        Duration::from_millis(self.fast_write_ms)
    }

    fn yield_after(&self) -> Duration {
        Duration::from_millis(self.yield_after_ms)
    }

    fn throttle_pause(&self) -> Duration {
        Duration::from_millis(self.throttle_pause_ms)
    }

    fn admission_timeout(&self) -> Option<Duration> {
        self.admission_timeout_ms.map(Duration::from_millis)
    }
}

/// Snapshot of the scheduler's flow state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FlowStats {
    /// Current adaptive chunk size.
    pub adaptive_chunk_bytes: usize,
    /// Buffers currently being written.
    pub pending_writes: usize,
    /// Callers waiting for a write slot.
    pub queued_writes: usize,
    /// Whether the small-chunk throttle is engaged.
    pub throttled: bool,
}

/// Mutable tuning state, never held across an await.
#[derive(Debug)]
struct FlowState {
    adaptive_chunk_bytes: usize,
    throttled: bool,
}

/// Bounded, self-tuning writer for one transport connection.
///
/// Create a new scheduler on every (re)connect; flow state is never carried
/// over.
pub struct WriteScheduler {
    transport: Arc<dyn Transport>,
    config: SchedulerConfig,
    permits: Semaphore,
    slots: usize,
    queued: AtomicUsize,
    flow: Mutex<FlowState>,
}

impl WriteScheduler {
    /// Create a scheduler writing to `transport`.
    ///
    /// `max_pending_writes` is capped at [`Semaphore::MAX_PERMITS`]; call
    /// [`SchedulerConfig::validate`] first to reject such configs instead.
    pub fn new(transport: Arc<dyn Transport>, config: SchedulerConfig) -> Self {
        let slots = config.max_pending_writes.min(Semaphore::MAX_PERMITS);
        Self {
            transport,
            permits: Semaphore::new(slots),
            slots,
            queued: AtomicUsize::new(0),
            flow: Mutex::new(FlowState {
                adaptive_chunk_bytes: config.initial_chunk_bytes,
                throttled: false,
            }),
            config,
        }
    }

    /// Scheduler configuration.
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Transport this scheduler writes to.
    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// Write `buf` as a sequence of chunks.
    ///
    /// Suspends while `max_pending_writes` buffers are already in flight.
    /// Chunks of one buffer are written strictly in order; buffers admitted
    /// concurrently may complete in any order.
    pub async fn write(&self, buf: &[u8]) -> std::result::Result<(), WriteError> {
        let _permit = self.admit().await?;
        let with_response = self.config.write_with_response;

        let mut offset = 0;
        while offset < buf.len() {
            let end = (offset + self.chunk_size()).min(buf.len());
            let chunk = &buf[offset..end];

            let started = Instant::now();
            let result = self.transport.write_chunk(chunk, with_response).await;
            let latency = started.elapsed();

            if let Err(err) = result {
                let adaptive = self.record_failure();
                warn!(
                    error = %err,
                    offset,
                    len = buf.len(),
                    adaptive_chunk_bytes = adaptive,
                    "chunk write failed, buffer aborted"
                );
                return Err(err);
            }

            offset = end;
            self.record_latency(latency);
            debug!(
                bytes = chunk.len(),
                latency_ms = latency.as_millis() as u64,
                remaining = buf.len() - offset,
                "chunk written"
            );

            if offset < buf.len() && latency > self.config.yield_after() {
                tokio::time::sleep(self.config.throttle_pause()).await;
            }
        }

        Ok(())
    }

    /// Current flow state.
    pub fn stats(&self) -> FlowStats {
        let flow = self.flow.lock().unwrap_or_else(PoisonError::into_inner);
        FlowStats {
            adaptive_chunk_bytes: flow.adaptive_chunk_bytes,
            pending_writes: self.slots.saturating_sub(self.permits.available_permits()),
            queued_writes: self.queued.load(Ordering::Acquire),
            throttled: flow.throttled,
        }
    }

    /// Fail every queued and future write with [`WriteError::Disconnected`].
    ///
    /// Writes already in flight run to completion.
    pub fn close(&self) {
        self.permits.close();
    }

    /// Check if the scheduler was closed.
    pub fn is_closed(&self) -> bool {
        self.permits.is_closed()
    }

    async fn admit(&self) -> std::result::Result<SemaphorePermit<'_>, WriteError> {
        // Fast path: a slot is free and nobody is waiting
        if let Ok(permit) = self.permits.try_acquire() {
            return Ok(permit);
        }
        if self.permits.is_closed() {
            return Err(WriteError::Disconnected);
        }

        let _queued = QueuedGuard::new(&self.queued);
        let acquire = self.permits.acquire();
        let acquired = match self.config.admission_timeout() {
            Some(limit) => tokio::time::timeout(limit, acquire)
                .await
                .map_err(|_| WriteError::AdmissionTimeout)?,
            None => acquire.await,
        };
        acquired.map_err(|_| WriteError::Disconnected)
    }

    fn chunk_size(&self) -> usize {
        let flow = self.flow.lock().unwrap_or_else(PoisonError::into_inner);
        if flow.throttled {
            flow.adaptive_chunk_bytes.min(self.config.throttled_chunk_bytes)
        } else {
            flow.adaptive_chunk_bytes
        }
    }

    fn record_latency(&self, latency: Duration) {
        let mut flow = self.flow.lock().unwrap_or_else(PoisonError::into_inner);
        if latency > self.config.slow_write() {
            flow.adaptive_chunk_bytes =
                step_down(flow.adaptive_chunk_bytes, SLOW_STEP, self.floor(SLOW_FLOOR));
            if !flow.throttled {
                debug!(adaptive_chunk_bytes = flow.adaptive_chunk_bytes, "throttling engaged");
            }
            flow.throttled = true;
        } else if latency < self.config.fast_write() {
            flow.adaptive_chunk_bytes =
                (flow.adaptive_chunk_bytes + FAST_STEP).min(self.config.max_chunk_bytes);
            if flow.throttled {
                debug!(adaptive_chunk_bytes = flow.adaptive_chunk_bytes, "throttling released");
            }
            flow.throttled = false;
        }
    }

    fn record_failure(&self) -> usize {
        let mut flow = self.flow.lock().unwrap_or_else(PoisonError::into_inner);
        flow.adaptive_chunk_bytes =
            step_down(flow.adaptive_chunk_bytes, FAILURE_STEP, self.floor(FAILURE_FLOOR));
        flow.adaptive_chunk_bytes
    }

    fn floor(&self, floor: usize) -> usize {
        floor.clamp(self.config.min_chunk_bytes, self.config.max_chunk_bytes)
    }
}

impl std::fmt::Debug for WriteScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriteScheduler")
            .field("config", &self.config)
            .field("stats", &self.stats())
            .finish()
    }
}

/// Move `value` down by `step` without crossing `floor`. Values already at or
/// below the floor are left alone.
fn step_down(value: usize, step: usize, floor: usize) -> usize {
    if value <= floor {
        value
    } else {
        value.saturating_sub(step).max(floor)
    }
}

/// Counts a caller as queued for as long as it waits for admission,
/// including when the wait is cancelled or times out.
struct QueuedGuard<'a>(&'a AtomicUsize);

impl<'a> QueuedGuard<'a> {
    fn new(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::AcqRel);
        Self(counter)
    }
}

impl Drop for QueuedGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicU64};

    /// Transport with scripted latency that records every chunk.
    #[derive(Default)]
    struct MockTransport {
        latency_ms: AtomicU64,
        fail_next: AtomicBool,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        chunks: Mutex<Vec<Vec<u8>>>,
        response_flags: Mutex<Vec<bool>>,
    }

    impl MockTransport {
        fn with_latency(ms: u64) -> Arc<Self> {
            let mock = Self::default();
            mock.latency_ms.store(ms, Ordering::SeqCst);
            Arc::new(mock)
        }

        fn set_latency(&self, ms: u64) {
            self.latency_ms.store(ms, Ordering::SeqCst);
        }

        fn chunk_sizes(&self) -> Vec<usize> {
            self.chunks.lock().unwrap().iter().map(Vec::len).collect()
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn write_chunk(
            &self,
            chunk: &[u8],
            with_response: bool,
        ) -> std::result::Result<(), WriteError> {
            self.response_flags.lock().unwrap().push(with_response);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);

            let ms = self.latency_ms.load(Ordering::SeqCst);
            if ms > 0 {
                tokio::time::sleep(Duration::from_millis(ms)).await;
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if self.fail_next.swap(false, Ordering::SeqCst) {
                return Err(WriteError::Rejected("mock failure".into()));
            }
            self.chunks.lock().unwrap().push(chunk.to_vec());
            Ok(())
        }

        fn is_connected(&self) -> bool {
            true
        }
    }

    fn scheduler(mock: &Arc<MockTransport>) -> WriteScheduler {
        WriteScheduler::new(mock.clone(), SchedulerConfig::default())
    }

    #[test]
    fn test_config_default() {
        let config = SchedulerConfig::default();
        assert_eq!(config.max_pending_writes, 3);
        assert_eq!(config.initial_chunk_bytes, 500);
        assert_eq!(config.admission_timeout_ms, None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let zero = SchedulerConfig {
            max_pending_writes: 0,
            ..Default::default()
        };
        assert!(matches!(zero.validate(), Err(EventLinkError::Config(_))));

        let out_of_range = SchedulerConfig {
            initial_chunk_bytes: 100,
            ..Default::default()
        };
        assert!(out_of_range.validate().is_err());

        let unbounded = SchedulerConfig {
            max_pending_writes: usize::MAX,
            ..Default::default()
        };
        assert!(matches!(unbounded.validate(), Err(EventLinkError::Config(_))));

        let at_limit = SchedulerConfig {
            max_pending_writes: Semaphore::MAX_PERMITS,
            ..Default::default()
        };
        assert!(at_limit.validate().is_ok());

        let inverted = SchedulerConfig {
            fast_write_ms: 150,
            yield_after_ms: 100,
            ..Default::default()
        };
        assert!(matches!(inverted.validate(), Err(EventLinkError::Config(_))));

        let yield_past_slow = SchedulerConfig {
            yield_after_ms: 300,
            ..Default::default()
        };
        assert!(yield_past_slow.validate().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_write_with_response_forwarded() {
        let mock = MockTransport::with_latency(10);
        scheduler(&mock).write(&[0u8; 600]).await.unwrap();
        assert_eq!(*mock.response_flags.lock().unwrap(), vec![false, false]);

        let acked = MockTransport::with_latency(10);
        let config = SchedulerConfig {
            write_with_response: true,
            ..Default::default()
        };
        WriteScheduler::new(acked.clone(), config)
            .write(&[0u8; 600])
            .await
            .unwrap();
        assert_eq!(*acked.response_flags.lock().unwrap(), vec![true, true]);
    }

    #[test]
    fn test_oversized_pending_limit_does_not_panic() {
        let config = SchedulerConfig {
            max_pending_writes: usize::MAX,
            ..Default::default()
        };
        let sched = WriteScheduler::new(MockTransport::with_latency(0), config);
        assert_eq!(sched.stats().pending_writes, 0);
    }

    #[test]
    fn test_config_deserialize_partial() {
        let config: SchedulerConfig =
            serde_json::from_str(r#"{"max_pending_writes": 5, "admission_timeout_ms": 250}"#)
                .unwrap();
        assert_eq!(config.max_pending_writes, 5);
        assert_eq!(config.admission_timeout_ms, Some(250));
        assert_eq!(config.initial_chunk_bytes, DEFAULT_CHUNK_BYTES);
    }

    #[test]
    fn test_step_down() {
        assert_eq!(step_down(500, 25, 400), 475);
        assert_eq!(step_down(410, 25, 400), 400);
        assert_eq!(step_down(400, 25, 400), 400);
        // never raises a value already under the floor
        assert_eq!(step_down(300, 25, 400), 300);
    }

    #[tokio::test(start_paused = true)]
    async fn test_chunks_in_order() {
        let mock = MockTransport::with_latency(10);
        let sched = scheduler(&mock);
        let buf: Vec<u8> = (0..1200u32).map(|i| i as u8).collect();

        sched.write(&buf).await.unwrap();

        assert_eq!(mock.chunk_sizes(), vec![500, 500, 200]);
        let joined: Vec<u8> = mock.chunks.lock().unwrap().concat();
        assert_eq!(joined, buf);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_buffer_writes_nothing() {
        let mock = MockTransport::with_latency(10);
        let sched = scheduler(&mock);

        sched.write(&[]).await.unwrap();
        assert!(mock.chunk_sizes().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_writes_shrink_to_floor_and_throttle() {
        let mock = MockTransport::with_latency(250);
        let sched = scheduler(&mock);

        sched.write(&[0u8; 100]).await.unwrap();
        let stats = sched.stats();
        assert_eq!(stats.adaptive_chunk_bytes, 475);
        assert!(stats.throttled);

        for _ in 0..10 {
            sched.write(&[0u8; 100]).await.unwrap();
        }
        assert_eq!(sched.stats().adaptive_chunk_bytes, 400);
        assert!(sched.stats().throttled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_throttled_chunks_capped() {
        let mock = MockTransport::with_latency(250);
        let sched = scheduler(&mock);

        sched.write(&[0u8; 1000]).await.unwrap();

        // first chunk at full size, then capped once throttled
        assert_eq!(mock.chunk_sizes(), vec![500, 200, 200, 100]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fast_writes_recover() {
        let mock = MockTransport::with_latency(250);
        let sched = scheduler(&mock);
        for _ in 0..4 {
            sched.write(&[0u8; 10]).await.unwrap();
        }
        assert_eq!(sched.stats().adaptive_chunk_bytes, 400);

        mock.set_latency(0);
        for _ in 0..10 {
            sched.write(&[0u8; 10]).await.unwrap();
        }

        let stats = sched.stats();
        assert_eq!(stats.adaptive_chunk_bytes, 500);
        assert!(!stats.throttled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_moderate_latency_leaves_state() {
        let mock = MockTransport::with_latency(50);
        let sched = scheduler(&mock);

        sched.write(&[0u8; 1000]).await.unwrap();

        let stats = sched.stats();
        assert_eq!(stats.adaptive_chunk_bytes, 500);
        assert!(!stats.throttled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_between_slow_chunks() {
        let mock = MockTransport::with_latency(150);
        let sched = scheduler(&mock);

        let start = Instant::now();
        sched.write(&[0u8; 1000]).await.unwrap();

        // two chunks plus one 2ms pause, none after the last chunk
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(302));
        assert!(elapsed < Duration::from_millis(310));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_aborts_buffer_and_shrinks() {
        let mock = MockTransport::with_latency(10);
        let sched = scheduler(&mock);
        mock.fail_next.store(true, Ordering::SeqCst);

        let err = sched.write(&[0u8; 1200]).await.unwrap_err();

        assert!(matches!(err, WriteError::Rejected(_)));
        assert!(mock.chunk_sizes().is_empty());
        let stats = sched.stats();
        assert_eq!(stats.adaptive_chunk_bytes, 450);
        assert_eq!(stats.pending_writes, 0);

        // the scheduler keeps working
        sched.write(&[0u8; 10]).await.unwrap();
        assert_eq!(mock.chunk_sizes(), vec![10]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeated_failures_stop_at_floor() {
        let mock = MockTransport::with_latency(10);
        let sched = scheduler(&mock);

        for _ in 0..6 {
            mock.fail_next.store(true, Ordering::SeqCst);
            let _ = sched.write(&[0u8; 10]).await;
        }
        assert_eq!(sched.stats().adaptive_chunk_bytes, 300);
    }

    #[tokio::test(start_paused = true)]
    async fn test_admission_bound() {
        let mock = MockTransport::with_latency(100);
        let sched = Arc::new(scheduler(&mock));

        let mut tasks = Vec::new();
        for _ in 0..(DEFAULT_MAX_PENDING_WRITES + 5) {
            let sched = sched.clone();
            tasks.push(tokio::spawn(async move { sched.write(&[7u8; 50]).await }));
        }

        tokio::task::yield_now().await;
        let stats = sched.stats();
        assert_eq!(stats.pending_writes, 3);
        assert_eq!(stats.queued_writes, 5);

        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert_eq!(mock.max_in_flight.load(Ordering::SeqCst), 3);
        assert_eq!(mock.chunk_sizes().len(), 8);
        let stats = sched.stats();
        assert_eq!(stats.pending_writes, 0);
        assert_eq!(stats.queued_writes, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_admission_timeout() {
        let mock = MockTransport::with_latency(1_000);
        let config = SchedulerConfig {
            max_pending_writes: 1,
            admission_timeout_ms: Some(50),
            ..Default::default()
        };
        let sched = Arc::new(WriteScheduler::new(mock.clone(), config));

        let first = {
            let sched = sched.clone();
            tokio::spawn(async move { sched.write(b"slow").await })
        };
        tokio::task::yield_now().await;

        let err = sched.write(b"late").await.unwrap_err();
        assert_eq!(err, WriteError::AdmissionTimeout);
        assert_eq!(sched.stats().queued_writes, 0);

        first.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_fails_queued_writes() {
        let mock = MockTransport::with_latency(1_000);
        let config = SchedulerConfig {
            max_pending_writes: 1,
            ..Default::default()
        };
        let sched = Arc::new(WriteScheduler::new(mock.clone(), config));

        let first = {
            let sched = sched.clone();
            tokio::spawn(async move { sched.write(b"in flight").await })
        };
        tokio::task::yield_now().await;
        let queued = {
            let sched = sched.clone();
            tokio::spawn(async move { sched.write(b"queued").await })
        };
        tokio::task::yield_now().await;

        sched.close();

        assert_eq!(queued.await.unwrap(), Err(WriteError::Disconnected));
        assert!(first.await.unwrap().is_ok());
        assert!(sched.is_closed());
    }

    #[test]
    fn test_flow_stats_serialize() {
        let stats = FlowStats {
            adaptive_chunk_bytes: 450,
            pending_writes: 1,
            queued_writes: 2,
            throttled: true,
        };
        let json = serde_json::to_value(stats).unwrap();
        assert_eq!(json["adaptive_chunk_bytes"], 450);
        assert_eq!(json["throttled"], true);
    }
}
