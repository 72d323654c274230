use crate::config::settings::AdmissionConfig;
use crate::utils::error::ApiError;
use governor::clock::{Clock, DefaultClock};
use governor::state::keyed::DefaultKeyedStateStore;
use governor::{Quota, RateLimiter};
use std::num::NonZeroU32;

pub enum Admission {
    Ok,
    Throttled { retry_after_secs: u64 },
}

/// C11. Per-`client_key` token bucket (capacity = RATE_LIMIT_PER_MINUTE,
/// refill = capacity / 60 per second) plus request-size/file-count
/// validation for ingest.
pub struct AdmissionController {
    limiter: RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>,
    clock: DefaultClock,
    max_request_bytes: u64,
    max_files_per_request: usize,
}

impl AdmissionController {
    pub fn new(cfg: &AdmissionConfig) -> Self {
        let capacity = NonZeroU32::new(cfg.rate_limit_per_minute.max(1)).unwrap();
        let quota = Quota::per_minute(capacity);

        Self {
            limiter: RateLimiter::keyed(quota),
            clock: DefaultClock::default(),
            max_request_bytes: cfg.max_request_bytes,
            max_files_per_request: cfg.max_files_per_request,
        }
    }

    pub fn admit(&self, client_key: &str) -> Admission {
        match self.limiter.check_key(&client_key.to_string()) {
            Ok(()) => Admission::Ok,
            Err(not_until) => {
                let wait = not_until.wait_time_from(self.clock.now());
                Admission::Throttled {
                    retry_after_secs: wait.as_secs().max(1),
                }
            }
        }
    }

    pub fn check_ingest_size(&self, total_bytes: u64, file_count: usize) -> Result<(), ApiError> {
        if total_bytes > self.max_request_bytes {
            return Err(ApiError::RequestTooLarge(format!(
                "request body of {total_bytes} bytes exceeds the {} byte limit",
                self.max_request_bytes
            )));
        }
        if file_count > self.max_files_per_request {
            return Err(ApiError::RequestTooLarge(format!(
                "{file_count} files exceeds the {} file limit",
                self.max_files_per_request
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(rate: u32) -> AdmissionConfig {
        AdmissionConfig {
            max_request_bytes: 1024,
            max_files_per_request: 2,
            rate_limit_per_minute: rate,
        }
    }

    #[test]
    fn admits_first_request_per_key() {
        let controller = AdmissionController::new(&cfg(60));
        assert!(matches!(controller.admit("user-1"), Admission::Ok));
    }

    #[test]
    fn throttles_after_capacity_exhausted() {
        let controller = AdmissionController::new(&cfg(1));
        assert!(matches!(controller.admit("user-2"), Admission::Ok));
        assert!(matches!(controller.admit("user-2"), Admission::Throttled { .. }));
    }

    #[test]
    fn rejects_oversized_request() {
        let controller = AdmissionController::new(&cfg(60));
        assert!(controller.check_ingest_size(2048, 1).is_err());
    }

    #[test]
    fn rejects_too_many_files() {
        let controller = AdmissionController::new(&cfg(60));
        assert!(controller.check_ingest_size(10, 3).is_err());
    }

    #[test]
    fn distinct_keys_have_independent_buckets() {
        let controller = AdmissionController::new(&cfg(1));
        assert!(matches!(controller.admit("a"), Admission::Ok));
        assert!(matches!(controller.admit("b"), Admission::Ok));
    }
}
