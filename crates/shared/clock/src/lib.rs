//! Cashgate Clock Infrastructure
//!
//! Time sources for the gateway:
//!
//! - [`SystemClock`]: wall-clock time for production
//! - [`ManualClock`]: frozen time that only moves when told to, for tests
//!   that cross the cache TTL or a task deadline without waiting
//!
//! ## Usage
//!
//! ```ignore
//! use cashgate_clock::{Clock, ManualClock};
//! use chrono::Duration;
//!
//! let clock = ManualClock::new(None);
//! let before = clock.now();
//! clock.advance(Duration::hours(5));
//! assert_eq!(clock.now() - before, Duration::hours(5));
//! ```

mod manual;
mod system;

pub use manual::ManualClock;
pub use system::SystemClock;

// Re-export the Clock trait for convenience
pub use cashgate_ports::Clock;
