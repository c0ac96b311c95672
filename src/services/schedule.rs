use std::time::Duration;

use chrono::{NaiveDateTime, NaiveTime, TimeDelta};

/// Daily slot times: `posts_per_day` hours spread evenly from `base_hour`,
/// wrapped into `[0, 24)`, fractional hours truncated, minute always zero.
pub fn slot_times(posts_per_day: u32, base_hour: u32) -> Vec<NaiveTime> {
    if posts_per_day == 0 {
        return Vec::new();
    }
    let interval = 24.0 / posts_per_day as f64;
    (0..posts_per_day)
        .filter_map(|i| {
            let hour = ((base_hour as f64 + i as f64 * interval) % 24.0) as u32;
            NaiveTime::from_hms_opt(hour, 0, 0)
        })
        .collect()
}

pub fn format_slot(t: &NaiveTime) -> String {
    t.format("%H:%M").to_string()
}

#[derive(Debug, Clone)]
struct SlotJob {
    at: NaiveTime,
    next_run: NaiveDateTime,
}

/// Slot registry polled by the scheduler loop.
///
/// A slot that became due while the previous firing was still running fires on
/// the next poll, in time order. After firing it moves to its next future
/// occurrence, so it never fires twice for the same day.
#[derive(Debug, Clone)]
pub struct Schedule {
    jobs: Vec<SlotJob>,
}

impl Schedule {
    pub fn new(slots: &[NaiveTime], now: NaiveDateTime) -> Self {
        let jobs = slots
            .iter()
            .map(|&at| SlotJob { at, next_run: next_occurrence(at, now) })
            .collect();
        Self { jobs }
    }

    pub fn slots(&self) -> Vec<NaiveTime> {
        self.jobs.iter().map(|j| j.at).collect()
    }

    pub fn next_run(&self) -> Option<NaiveDateTime> {
        self.jobs.iter().map(|j| j.next_run).min()
    }

    /// Slots whose time has arrived, in chronological order; each is
    /// rescheduled past `now`.
    pub fn take_due(&mut self, now: NaiveDateTime) -> Vec<NaiveTime> {
        self.drain_due(now)
    }

    /// Like [`Schedule::take_due`], for slots that must not fire: they move to
    /// their next occurrence and are returned for reporting.
    pub fn skip_missed(&mut self, now: NaiveDateTime) -> Vec<NaiveTime> {
        self.drain_due(now)
    }

    fn drain_due(&mut self, now: NaiveDateTime) -> Vec<NaiveTime> {
        let mut due: Vec<(NaiveDateTime, NaiveTime)> = Vec::new();
        for job in self.jobs.iter_mut().filter(|j| j.next_run <= now) {
            due.push((job.next_run, job.at));
            job.next_run = next_occurrence(job.at, now);
        }
        due.sort();
        due.into_iter().map(|(_, at)| at).collect()
    }
}

/// True when the wall clock moved further than the monotonic clock by more
/// than `grace` between two polls. The monotonic clock stands still while the
/// host is suspended, a long firing advances both equally.
pub fn host_slept(wall_gap: TimeDelta, mono_gap: Duration, grace: TimeDelta) -> bool {
    match TimeDelta::from_std(mono_gap) {
        Ok(mono) => wall_gap - mono > grace,
        Err(_) => false,
    }
}

fn next_occurrence(at: NaiveTime, now: NaiveDateTime) -> NaiveDateTime {
    let today = now.date().and_time(at);
    if today > now { today } else { today + TimeDelta::days(1) }
}
