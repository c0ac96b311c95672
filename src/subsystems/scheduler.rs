use std::sync::Arc;
use std::time::Duration;

use bon::Builder;
use chrono::{Local, NaiveDateTime, NaiveTime, TimeDelta};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_graceful_shutdown::errors::CancelledByShutdown;
use tokio_graceful_shutdown::{FutureExt, SubsystemHandle};
use tracing::{error, info, warn};

use crate::services::pipeline::Pipeline;
use crate::services::schedule::{Schedule, format_slot, host_slept};

/// Wall-clock source for slot matching.
pub type Clock = Arc<dyn Fn() -> NaiveDateTime + Send + Sync>;

pub fn local_clock() -> Clock {
    Arc::new(|| Local::now().naive_local())
}

/// Continuous mode: polls the slot table and runs the pipeline for every slot
/// whose time has come. Firings run one after another, never concurrently.
#[derive(Builder)]
pub struct SchedulerSubsystem {
    pub(crate) pipeline: Arc<Pipeline>,
    pub(crate) slots: Vec<NaiveTime>,
    #[builder(default = Duration::from_secs(60))]
    pub(crate) poll_interval: Duration,
    #[builder(default = local_clock())]
    pub(crate) clock: Clock,
    /// Wall-clock drift beyond the monotonic clock that counts as a suspended host.
    #[builder(default = TimeDelta::hours(1))]
    pub(crate) suspend_grace: TimeDelta,
}

impl SchedulerSubsystem {
    pub async fn run(self, subsys: SubsystemHandle) -> std::io::Result<()> {
        info!(slots = self.slots.len(), poll_secs = self.poll_interval.as_secs(), "Starting scheduler subsystem");

        let fut = async {
            let mut last_wall = (self.clock)();
            let mut last_mono = Instant::now();
            let mut schedule = Schedule::new(&self.slots, last_wall);
            if let Some(next) = schedule.next_run() {
                info!(next = %next, "scheduler: next post");
            }
            let mut ticker = tokio::time::interval(self.poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            while !subsys.is_shutdown_requested() {
                ticker.tick().await;
                let now = (self.clock)();
                if host_slept(now - last_wall, last_mono.elapsed(), self.suspend_grace) {
                    for slot in schedule.skip_missed(now) {
                        warn!(slot = %format_slot(&slot), "scheduler: slot missed while suspended, skipped");
                    }
                }
                last_wall = now;
                last_mono = Instant::now();

                for slot in schedule.take_due(now) {
                    info!(slot = %format_slot(&slot), "scheduler: slot fired");
                    match self.pipeline.run_tick().await {
                        Ok(outcome) => info!(outcome = %outcome, "scheduler: tick finished"),
                        // A failed post only costs this slot.
                        Err(e) => error!(error = %e, "scheduler: tick failed"),
                    }
                }
            }
        };

        match fut.cancel_on_shutdown(&subsys).await {
            Ok(()) => info!("Scheduler subsystem finished"),
            Err(CancelledByShutdown) => info!("Scheduler subsystem cancelled by shutdown"),
        }

        Ok(())
    }
}
