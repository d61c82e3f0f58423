// src/tasks/pull_task.rs
use embassy_time::{Duration, Instant, Ticker};

use crate::dashboard::Dashboard;
use crate::net::client::DataSource;
use crate::scheduler::pull::run_due_pull;
use crate::widget::{PullContext, WallClock};

/// One independent timer per pull-capable widget. The 1 s tick is the due
/// check granularity; the widget's own interval decides when it actually
/// runs. One task per widget also makes the single-in-flight rule structural:
/// a second pull for the same widget cannot start while the first is awaited
/// here.
#[embassy_executor::task(pool_size = 16)]
pub async fn pull_task(
    dashboard: &'static Dashboard,
    index: usize,
    source: &'static dyn DataSource,
    clock: &'static dyn WallClock,
) {
    let Some(slot) = dashboard.slot(index) else {
        log::error!("Pull task spawned for missing slot {index}");
        return;
    };
    log::info!("Pull task started for widget '{}'", slot.name());

    let ctx = PullContext {
        source,
        clock,
        timeout: dashboard.pull_timeout(),
    };
    let mut ticker = Ticker::every(Duration::from_secs(1));

    while dashboard.is_running() {
        let online = dashboard.connectivity().is_connected();
        run_due_pull(
            slot.widget.as_ref(),
            &slot.state,
            online,
            &ctx,
            Instant::now(),
            Instant::now,
        )
        .await;
        ticker.next().await;
    }
    log::info!("Pull task stopped for widget '{}'", slot.name());
}
