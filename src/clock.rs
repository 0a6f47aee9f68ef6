use chrono::{DateTime, Utc};

/// Time source for status derivation and cast-time window checks.
///
/// Project status is never persisted; it is always recomputed from the
/// current time, so everything that needs "now" takes it from here.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock pinned to a single instant. Lets tests (and replay tooling)
/// evaluate a project's lifecycle at a chosen point in time.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}
