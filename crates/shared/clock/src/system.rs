use cashgate_core::Timestamp;
use cashgate_ports::Clock;
use chrono::Utc;

/// Wall-clock time source
///
/// Cache expiry and task deadlines follow real UTC time. This is the clock a
/// gateway uses unless one is injected.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl SystemClock {
    pub fn new() -> Self {
        Self
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Utc::now()
    }

    fn name(&self) -> &str {
        "SystemClock"
    }
}
