use super::types::ActivityRecord;
use std::collections::VecDeque;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct LoggerConfig {
    /// Max records held in memory; oldest is evicted on overflow rather
    /// than blocking or rejecting the newest write (§5: "buffered,
    /// drop-oldest on overflow").
    pub capacity: usize,
    /// Max records drained per flush.
    pub batch_size: usize,
    /// Upper bound on how long a record waits before being flushed.
    pub flush_interval_ms: u64,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            capacity: 10_000,
            batch_size: 200,
            flush_interval_ms: 1_000,
        }
    }
}

struct Ring {
    records: Mutex<VecDeque<ActivityRecord>>,
    capacity: usize,
    notify: Notify,
}

/// Non-blocking activity/metrics sink. `log()` never awaits and never
/// errors: a full ring evicts its oldest entry to make room. A background
/// task drains batches on an interval and hands them to `tracing`, the
/// seam a real exporter (Postgres, OTLP, a message bus) would replace.
#[derive(Clone)]
pub struct ActivityLogger {
    ring: Arc<Ring>,
}

impl ActivityLogger {
    pub fn new(config: LoggerConfig) -> Self {
        let ring = Arc::new(Ring {
            records: Mutex::new(VecDeque::with_capacity(config.capacity)),
            capacity: config.capacity,
            notify: Notify::new(),
        });

        tokio::spawn(Self::drain_loop(ring.clone(), config));

        Self { ring }
    }

    /// Fire-and-forget. Evicts the oldest record if the ring is full.
    pub fn log(&self, record: ActivityRecord) {
        let mut records = self.ring.records.lock();
        if records.len() >= self.ring.capacity {
            records.pop_front();
        }
        records.push_back(record);
        drop(records);
        self.ring.notify.notify_one();
    }

    pub fn queue_len(&self) -> usize {
        self.ring.records.lock().len()
    }

    async fn drain_loop(ring: Arc<Ring>, config: LoggerConfig) {
        let flush_interval = Duration::from_millis(config.flush_interval_ms);
        loop {
            tokio::select! {
                _ = ring.notify.notified() => {}
                _ = tokio::time::sleep(flush_interval) => {}
            }

            let batch: Vec<ActivityRecord> = {
                let mut records = ring.records.lock();
                let n = records.len().min(config.batch_size);
                records.drain(..n).collect()
            };

            if batch.is_empty() {
                continue;
            }

            debug!(count = batch.len(), "flushing activity log batch");
            for record in &batch {
                match record.detail.as_deref() {
                    Some(detail) => {
                        tracing::info!(
                            request_id = %record.request_id,
                            user_id = %record.user_id,
                            kind = record.kind.as_str(),
                            latency_ms = record.latency_ms,
                            detail,
                            "activity"
                        );
                    }
                    None => {
                        tracing::info!(
                            request_id = %record.request_id,
                            user_id = %record.user_id,
                            kind = record.kind.as_str(),
                            latency_ms = record.latency_ms,
                            "activity"
                        );
                    }
                }
            }
        }
    }
}

impl Drop for ActivityLogger {
    fn drop(&mut self) {
        if self.queue_len() > 0 {
            warn!(remaining = self.queue_len(), "activity logger dropped with unflushed records");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::types::ActivityKind;

    #[tokio::test]
    async fn logs_without_blocking_and_drains() {
        let logger = ActivityLogger::new(LoggerConfig {
            capacity: 100,
            batch_size: 10,
            flush_interval_ms: 20,
        });
        logger.log(ActivityRecord::new("r1", "u1", ActivityKind::QueryReceived));
        assert_eq!(logger.queue_len(), 1);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(logger.queue_len(), 0);
    }

    #[tokio::test]
    async fn overflow_drops_oldest() {
        let logger = ActivityLogger::new(LoggerConfig {
            capacity: 2,
            batch_size: 10,
            flush_interval_ms: 60_000,
        });
        logger.log(ActivityRecord::new("r1", "u1", ActivityKind::QueryReceived));
        logger.log(ActivityRecord::new("r2", "u1", ActivityKind::QueryReceived));
        logger.log(ActivityRecord::new("r3", "u1", ActivityKind::QueryReceived));

        let records = logger.ring.records.lock();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].request_id, "r2");
        assert_eq!(records[1].request_id, "r3");
    }
}
