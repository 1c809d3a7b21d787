mod restart_schedule;
mod restart_scheduler;

pub use restart_schedule::{CountdownNotice, RestartPlan, RestartSchedule, next_restart_time};
pub use restart_scheduler::RestartScheduler;
