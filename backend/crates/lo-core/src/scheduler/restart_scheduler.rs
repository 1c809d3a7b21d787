use crate::{Clock, FleetEvent, RestartSchedule, ShutdownGuard};

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDateTime;
use log::{debug, info};
use tokio::sync::{mpsc, watch};

/// Timer loop that walks one restart window at a time, emitting countdown
/// notices and then `RestartDue`.
pub struct RestartScheduler {
    schedule: RestartSchedule,
    clock: Arc<dyn Clock>,
    events: mpsc::UnboundedSender<FleetEvent>,
    next_tx: watch::Sender<Option<NaiveDateTime>>,
}

impl RestartScheduler {
    /// The returned receiver tracks the upcoming restart time.
    pub fn new(
        schedule: RestartSchedule,
        clock: Arc<dyn Clock>,
        events: mpsc::UnboundedSender<FleetEvent>,
    ) -> (Self, watch::Receiver<Option<NaiveDateTime>>) {
        let (next_tx, next_rx) = watch::channel(None);
        (
            Self {
                schedule,
                clock,
                events,
                next_tx,
            },
            next_rx,
        )
    }

    pub async fn run(self, mut shutdown: ShutdownGuard) {
        let mut last_fired: Option<NaiveDateTime> = None;

        loop {
            let plan = self.schedule.plan(self.clock.now(), last_fired);
            self.next_tx.send_replace(Some(plan.restart_at));
            info!("Next scheduled restart at {}", plan.restart_at);

            for (index, notice) in plan.notices.iter().enumerate() {
                tokio::select! {
                    _ = self.sleep_until(notice.at) => {}
                    _ = shutdown.wait() => return,
                }

                // Collapse warnings that were overtaken while asleep.
                let overtaken = plan
                    .notices
                    .get(index + 1)
                    .is_some_and(|next| next.at <= self.clock.now());
                if overtaken {
                    debug!("Skipping stale {}-minute notice", notice.minutes_remaining);
                    continue;
                }

                info!(
                    "Restart in {} minute(s) at {}",
                    notice.minutes_remaining, plan.restart_at
                );
                let _ = self.events.send(FleetEvent::Countdown {
                    minutes_remaining: notice.minutes_remaining,
                    restart_at: plan.restart_at,
                });
            }

            tokio::select! {
                _ = self.sleep_until(plan.restart_at) => {}
                _ = shutdown.wait() => return,
            }

            info!("Scheduled restart window {} reached", plan.restart_at);
            let _ = self.events.send(FleetEvent::RestartDue {
                restart_at: plan.restart_at,
            });
            last_fired = Some(plan.restart_at);
        }
    }

    async fn sleep_until(&self, at: NaiveDateTime) {
        let remaining = (at - self.clock.now())
            .to_std()
            .unwrap_or(Duration::ZERO);
        tokio::time::sleep(remaining).await;
    }
}
