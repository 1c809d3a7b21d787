use crate::{CoreError, Result as CoreResult};

use chrono::{Days, NaiveDateTime, TimeDelta};
use serde::Serialize;

/// Hour-of-day restart marks plus the minute offsets at which players are
/// warned. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RestartSchedule {
    hours: Vec<u32>,
    notify_minutes: Vec<u32>,
}

/// One staged warning before a restart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CountdownNotice {
    pub at: NaiveDateTime,
    pub minutes_remaining: u32,
}

/// The next restart window as seen from one instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RestartPlan {
    pub restart_at: NaiveDateTime,
    /// Chronological; a notice at `now` stands in for offsets already missed.
    pub notices: Vec<CountdownNotice>,
}

impl RestartSchedule {
    /// Hours are sorted ascending and offsets descending; duplicates collapse.
    pub fn new(
        hours: impl IntoIterator<Item = u32>,
        notify_minutes: impl IntoIterator<Item = u32>,
    ) -> CoreResult<Self> {
        let mut hours: Vec<u32> = hours.into_iter().collect();
        hours.sort_unstable();
        hours.dedup();

        if hours.is_empty() {
            return Err(CoreError::schedule("at least one restart hour is required"));
        }
        if let Some(hour) = hours.iter().find(|h| **h > 23) {
            return Err(CoreError::schedule(format!(
                "restart hours must be 0-23, got {hour}"
            )));
        }

        let mut notify_minutes: Vec<u32> = notify_minutes.into_iter().collect();
        notify_minutes.sort_unstable_by(|a, b| b.cmp(a));
        notify_minutes.dedup();

        if notify_minutes.contains(&0) {
            return Err(CoreError::schedule("notify offsets must be at least 1 minute"));
        }

        Ok(Self {
            hours,
            notify_minutes,
        })
    }

    pub fn hours(&self) -> &[u32] {
        &self.hours
    }

    pub fn notify_minutes(&self) -> &[u32] {
        &self.notify_minutes
    }

    /// Smallest hour mark strictly after `now`, wrapping into tomorrow.
    pub fn next_restart_time(&self, now: NaiveDateTime) -> NaiveDateTime {
        let today = now.date();

        [Some(today), today.checked_add_days(Days::new(1))]
            .into_iter()
            .flatten()
            .flat_map(|date| {
                self.hours
                    .iter()
                    .filter_map(move |hour| date.and_hms_opt(*hour, 0, 0))
            })
            .find(|candidate| *candidate > now)
            .unwrap_or(now + TimeDelta::days(1))
    }

    /// Plan the window after `now`, never re-planning one already fired.
    ///
    /// `last_fired` is the restart time most recently emitted; planning from
    /// the later of it and `now` keeps a clock that reads slightly behind the
    /// mark from producing the same window twice.
    pub fn plan(&self, now: NaiveDateTime, last_fired: Option<NaiveDateTime>) -> RestartPlan {
        let base = last_fired.map_or(now, |fired| fired.max(now));
        let restart_at = self.next_restart_time(base);

        let mut notices = Vec::with_capacity(self.notify_minutes.len());
        let mut missed = false;

        for minutes in &self.notify_minutes {
            let at = restart_at - TimeDelta::minutes(i64::from(*minutes));
            if at > now {
                notices.push(CountdownNotice {
                    at,
                    minutes_remaining: *minutes,
                });
            } else {
                missed = true;
            }
        }

        if missed {
            notices.insert(
                0,
                CountdownNotice {
                    at: now,
                    minutes_remaining: minutes_until(now, restart_at),
                },
            );
        }

        RestartPlan {
            restart_at,
            notices,
        }
    }
}

/// Free-function form of [`RestartSchedule::next_restart_time`].
pub fn next_restart_time(now: NaiveDateTime, schedule: &RestartSchedule) -> NaiveDateTime {
    schedule.next_restart_time(now)
}

/// Whole minutes left, rounded up so a warning never understates the wait.
fn minutes_until(now: NaiveDateTime, at: NaiveDateTime) -> u32 {
    let seconds = (at - now).num_seconds().max(0);
    u32::try_from((seconds + 59) / 60).unwrap_or(u32::MAX)
}
