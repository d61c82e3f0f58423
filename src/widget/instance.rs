// src/widget/instance.rs
//! Runtime state of one widget on one screen.

use embassy_time::{Duration, Instant};

use crate::config::{ConfigMap, get_bool, merge_config};
use crate::render::canvas::Region;
use crate::widget::DataMap;

/// Consecutive pull failures tolerated before a widget is disabled. The
/// disable happens when the count *exceeds* the budget, i.e. on the sixth
/// consecutive failure.
pub const ERROR_BUDGET: u32 = 5;

/// Mutable per-instance state. Owned by the dashboard inside a shared cell;
/// the pull scheduler writes on pull completion, the render cycle reads a
/// snapshot per frame. Region geometry is assigned at layout build and not
/// touched afterwards.
#[derive(Debug)]
pub struct WidgetInstance {
    pub config: ConfigMap,
    pub enabled: bool,
    pub last_update: Option<Instant>,
    pub error_count: u32,
    pub data: DataMap,
    pub region: Region,
    pub next_run: Instant,
    pub last_run: Option<Instant>,
    pub in_flight: bool,
}

impl WidgetInstance {
    pub fn new(config: ConfigMap, region: Region, created: Instant) -> Self {
        let enabled = get_bool(&config, "enabled", true);
        Self {
            config,
            enabled,
            last_update: None,
            error_count: 0,
            data: DataMap::new(),
            region,
            // First pull is due immediately; the interval applies between
            // completions, not before the first one.
            next_run: created,
            last_run: None,
            in_flight: false,
        }
    }

    /// Due check for the scheduler tick. Scheduling only moves forward, so a
    /// widget stays due until its pull actually completes.
    pub fn pull_due(&self, now: Instant) -> bool {
        self.enabled && !self.in_flight && now >= self.next_run
    }

    /// Successful pull: replace the data wholesale, clear the error streak,
    /// reschedule one interval past completion.
    pub fn commit_success(&mut self, completed: Instant, interval: Duration, data: DataMap) {
        self.data = data;
        self.error_count = 0;
        self.last_update = Some(completed);
        self.finish_run(completed, interval);
    }

    /// Failed pull: count it, reschedule at the same cadence (no faster
    /// retry), and report whether this failure tripped the error budget.
    pub fn commit_failure(&mut self, completed: Instant, interval: Duration) -> bool {
        self.error_count += 1;
        self.finish_run(completed, interval);
        if self.error_count > ERROR_BUDGET && self.enabled {
            self.enabled = false;
            return true;
        }
        false
    }

    /// Pushed data bypasses the pull schedule and its error bookkeeping.
    pub fn commit_push(&mut self, now: Instant, data: DataMap) {
        self.data = data;
        self.last_update = Some(now);
    }

    /// Merge a configuration update and re-derive `enabled`. Re-enabling a
    /// widget that was disabled by its error budget starts a fresh budget.
    pub fn apply_config(&mut self, update: &ConfigMap) {
        self.config = merge_config(&self.config, update);
        let enabled = get_bool(&self.config, "enabled", true);
        if enabled && !self.enabled {
            self.error_count = 0;
        }
        self.enabled = enabled;
    }

    fn finish_run(&mut self, completed: Instant, interval: Duration) {
        self.last_run = Some(completed);
        self.next_run = completed + interval;
        self.in_flight = false;
    }
}
