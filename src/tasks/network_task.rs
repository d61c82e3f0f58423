// src/tasks/network_task.rs
use embassy_time::{Duration, Instant, Ticker};

use crate::dashboard::Dashboard;
use crate::net::supervisor::ConnectivitySupervisor;

/// Drives the connectivity state machine: reconnect with backoff while
/// disconnected, probe reachability while connected, idle in fallback mode
/// until a station retry is requested.
#[embassy_executor::task]
pub async fn network_task(dashboard: &'static Dashboard, mut supervisor: ConnectivitySupervisor) {
    log::info!("Network task started");

    let mut ticker = Ticker::every(Duration::from_secs(1));
    while dashboard.is_running() {
        supervisor
            .step(dashboard.connectivity(), Instant::now())
            .await;
        ticker.next().await;
    }
    log::info!("Network task stopped");
}
