// src/status.rs
//! Read-only diagnostics snapshot for the external reporting/web layer.

use alloc::string::String;
use alloc::vec::Vec;

use embassy_time::Instant;
use serde::Serialize;

use crate::dashboard::Dashboard;
use crate::net::supervisor::ConnectivitySnapshot;
use crate::widget::RefreshMode;

#[derive(Clone, Debug, Serialize)]
pub struct WidgetStatus {
    pub name: &'static str,
    pub refresh: &'static str,
    pub enabled: bool,
    pub error_count: u32,
    /// Age of the last successful update in seconds, `None` before the first.
    pub seconds_since_update: Option<u64>,
}

#[derive(Clone, Debug, Serialize)]
pub struct ScreenStatus {
    pub current: String,
    pub index: usize,
    pub count: usize,
    pub rotation_remaining_secs: u64,
    pub target_fps: u32,
}

#[derive(Clone, Debug, Serialize)]
pub struct DashboardStatus {
    pub running: bool,
    pub widgets: Vec<WidgetStatus>,
    pub screen: ScreenStatus,
    pub connectivity: ConnectivitySnapshot,
}

pub fn collect(dashboard: &Dashboard, now: Instant) -> DashboardStatus {
    let widgets = dashboard
        .slots()
        .iter()
        .map(|slot| {
            slot.state.lock(|cell| {
                let inst = cell.borrow();
                WidgetStatus {
                    name: slot.name(),
                    refresh: match slot.refresh_mode() {
                        RefreshMode::Pull => "pull",
                        RefreshMode::Push => "push",
                    },
                    enabled: inst.enabled,
                    error_count: inst.error_count,
                    seconds_since_update: inst
                        .last_update
                        .filter(|&at| now >= at)
                        .map(|at| (now - at).as_secs()),
                }
            })
        })
        .collect();

    let screen = dashboard.with_screens(|screens| ScreenStatus {
        current: screens.current().name.clone(),
        index: screens.current_index(),
        count: screens.len(),
        rotation_remaining_secs: screens.rotation_remaining(now).as_secs(),
        target_fps: dashboard.target_fps(),
    });

    DashboardStatus {
        running: dashboard.is_running(),
        widgets,
        screen,
        connectivity: dashboard.connectivity().snapshot(),
    }
}
