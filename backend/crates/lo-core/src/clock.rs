use chrono::{Local, NaiveDateTime};

/// Source of wall-clock time for schedule computations.
///
/// Restart marks are expressed in local wall-clock hours, so the scheduler
/// works on `NaiveDateTime` values in the host's local zone.
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}
