// src/tasks/render_task.rs
use embassy_time::{Duration, Instant, Timer};

use crate::dashboard::Dashboard;
use crate::render::cycle::RenderCycle;

/// Fixed-rate frame loop. Timing is best effort: a slow widget makes one
/// frame late, the loop never skips ahead to catch up.
#[embassy_executor::task]
pub async fn render_task(dashboard: &'static Dashboard, mut cycle: RenderCycle) {
    log::info!("Render task started");

    while dashboard.is_running() {
        let start = Instant::now();
        cycle.render_frame(dashboard, start);

        let budget = Duration::from_millis(1000 / dashboard.target_fps() as u64);
        let sleep = budget
            .checked_sub(start.elapsed())
            .unwrap_or(Duration::from_ticks(0));
        Timer::after(sleep).await;
    }
    log::info!("Render task stopped");
}
