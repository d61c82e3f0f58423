// src/scheduler/pull.rs
//! One scheduling step for one pull-capable widget.
//!
//! Every pull widget gets its own task ticking once per second (sub-second
//! intervals are not supported); each tick runs through here. The state walk
//! is `Idle → Due → Running → (Success|Failure) → Idle`: claim the slot under
//! its lock, fetch without holding it, then commit the whole outcome in one
//! locked section. A cancelled in-flight pull therefore leaves `data` and
//! `error_count` untouched.

use embassy_time::{Instant, with_timeout};

use crate::common::SharedCell;
use crate::common::error::FetchError;
use crate::config::ConfigMap;
use crate::widget::{PullContext, RefreshMode, Widget, WidgetInstance};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Not yet due; the normal case for most ticks.
    NotDue,
    /// Widget disabled (by config or by its exhausted error budget).
    Disabled,
    /// Supervisor reports offline. The widget stays due and is retried once
    /// connectivity returns, without touching the error streak.
    Offline,
    /// A pull for this widget is already in flight.
    InFlight,
    /// Push-mode widget; the scheduler never pulls it.
    NotPull,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PullOutcome {
    Pulled,
    Failed { disabled: bool },
    Skipped(SkipReason),
}

enum Claim {
    Run(ConfigMap),
    Skip(SkipReason),
}

/// Run one due-check/pull/commit round for a widget. `tick` is the scheduler
/// tick instant used for the due decision; `completion_clock` stamps the
/// commit (the task loop passes `Instant::now`, tests pass fixed instants).
pub async fn run_due_pull(
    widget: &dyn Widget,
    state: &SharedCell<WidgetInstance>,
    online: bool,
    ctx: &PullContext<'_>,
    tick: Instant,
    completion_clock: impl Fn() -> Instant,
) -> PullOutcome {
    let descriptor = widget.descriptor();
    if descriptor.refresh != RefreshMode::Pull {
        return PullOutcome::Skipped(SkipReason::NotPull);
    }

    let claim = state.lock(|cell| {
        let mut inst = cell.borrow_mut();
        if !inst.enabled {
            return Claim::Skip(SkipReason::Disabled);
        }
        if inst.in_flight {
            return Claim::Skip(SkipReason::InFlight);
        }
        if tick < inst.next_run {
            return Claim::Skip(SkipReason::NotDue);
        }
        if !online {
            return Claim::Skip(SkipReason::Offline);
        }
        inst.in_flight = true;
        Claim::Run(inst.config.clone())
    });

    let config = match claim {
        Claim::Skip(reason) => return PullOutcome::Skipped(reason),
        Claim::Run(config) => config,
    };

    let result = match with_timeout(ctx.timeout, widget.pull(ctx, &config)).await {
        Ok(result) => result,
        Err(_) => Err(FetchError::Timeout),
    };

    let completed = completion_clock();
    match result {
        Ok(data) => {
            state.lock(|cell| {
                cell.borrow_mut()
                    .commit_success(completed, descriptor.interval, data)
            });
            log::debug!("Pulled fresh data for widget '{}'", descriptor.name);
            PullOutcome::Pulled
        }
        Err(err) => {
            let (disabled, errors) = state.lock(|cell| {
                let mut inst = cell.borrow_mut();
                let disabled = inst.commit_failure(completed, descriptor.interval);
                (disabled, inst.error_count)
            });
            log::warn!(
                "Error pulling data for widget '{}' ({err}), consecutive failures: {errors}",
                descriptor.name
            );
            if disabled {
                log::error!("Disabled widget '{}' due to repeated errors", descriptor.name);
            }
            PullOutcome::Failed { disabled }
        }
    }
}
