use cashgate_core::Timestamp;
use cashgate_ports::Clock;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

/// Fixed clock that only advances when explicitly moved
///
/// Time is held as nanoseconds since the Unix epoch so reads and advances
/// are lock-free.
pub struct ManualClock {
    nanos: AtomicI64,
}

impl ManualClock {
    /// Create a new manual clock
    ///
    /// # Arguments
    /// * `initial_time` - Optional starting time. If None, uses current wall time.
    pub fn new(initial_time: Option<Timestamp>) -> Arc<Self> {
        let start = initial_time.unwrap_or_else(Utc::now);
        Arc::new(Self {
            nanos: AtomicI64::new(to_nanos(start)),
        })
    }

    /// Advance the clock by a duration
    pub fn advance(&self, duration: Duration) {
        let step = duration.num_nanoseconds().unwrap_or(i64::MAX);
        self.nanos.fetch_add(step, Ordering::SeqCst);
    }
}

fn to_nanos(time: Timestamp) -> i64 {
    time.timestamp_nanos_opt().unwrap_or(i64::MAX)
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        DateTime::from_timestamp_nanos(self.nanos.load(Ordering::SeqCst))
    }

    fn name(&self) -> &str {
        "ManualClock"
    }
}
