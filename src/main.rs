// src/main.rs
//! Simulator entry point: runs the full dashboard on the host with a logging
//! frame sink, a scripted radio and canned data sources. Hardware targets
//! wire the same `Dashboard` against their own radio, framebuffer sink and
//! reqwless-backed data source instead.

use async_trait::async_trait;
use embassy_executor::{Executor, Spawner};
use embassy_time::{Duration, Instant, Ticker, Timer};
use serde_json::{Value, json};
use static_cell::StaticCell;

use matrix_dashboard::common::error::{ConnectivityError, FetchError, RenderError};
use matrix_dashboard::dashboard::Dashboard;
use matrix_dashboard::net::client::DataSource;
use matrix_dashboard::net::supervisor::{ConnectivitySupervisor, NetworkControl};
use matrix_dashboard::render::cycle::RenderCycle;
use matrix_dashboard::render::framebuffer::{FrameBuffer, FrameSink};
use matrix_dashboard::widget::WallClock;
use matrix_dashboard::widget::registry::WidgetRegistry;

static EXECUTOR: StaticCell<Executor> = StaticCell::new();
static DASHBOARD: StaticCell<Dashboard> = StaticCell::new();
static DATA_SOURCE: StaticCell<CannedDataSource> = StaticCell::new();
static WALL_CLOCK: StaticCell<HostWallClock> = StaticCell::new();

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("matrix-dashboard simulator starting");

    let executor = EXECUTOR.init(Executor::new());
    executor.run(|spawner| {
        spawner.spawn(main_task(spawner)).unwrap();
    });
}

#[embassy_executor::task]
async fn main_task(spawner: Spawner) {
    let config = simulator_config();
    let registry = WidgetRegistry::with_builtins();

    let dashboard = match Dashboard::build(&config, &registry).await {
        Ok(dashboard) => dashboard,
        Err(err) => {
            log::error!("Dashboard startup failed: {err}");
            return;
        }
    };
    let dashboard: &'static Dashboard = DASHBOARD.init(dashboard);

    let settings = dashboard.settings();
    let frame = FrameBuffer::new(settings.display_width, settings.display_height);
    let cycle = RenderCycle::new(frame, Box::new(ConsoleSink::default()));
    let supervisor = ConnectivitySupervisor::new(Box::new(SimRadio), settings);
    let source: &'static CannedDataSource = DATA_SOURCE.init(CannedDataSource);
    let clock: &'static HostWallClock = WALL_CLOCK.init(HostWallClock);

    if let Err(err) = dashboard.start(&spawner, cycle, supervisor, source, clock) {
        log::error!("Dashboard startup failed: {err}");
        return;
    }

    // Exercise the push path once the pull side has settled.
    Timer::after(Duration::from_secs(10)).await;
    dashboard.push("notice", "message", &json!({"text": "hello from sim"}));

    let mut ticker = Ticker::every(Duration::from_secs(30));
    loop {
        ticker.next().await;
        let status = dashboard.status(Instant::now());
        match serde_json::to_string(&status) {
            Ok(encoded) => log::info!("Status: {encoded}"),
            Err(err) => log::warn!("Status encode failed: {err}"),
        }
    }
}

fn simulator_config() -> Value {
    json!({
        "system": {
            "wifi_ssid": "simulated-network",
            "wifi_password": "simulated",
            "rotation_interval": 10,
        },
        "display": {"width": 64, "height": 64, "target_fps": 10},
        "network": {"timeout": 5, "retry_delay": 5},
        "plugins": {
            "clock": {"show_seconds": true},
            "weather": {"location": "auto"},
            "hackernews": {"story_count": 2},
            "notice": {},
        },
        "screens": {
            "front": {
                "widgets": [
                    {"name": "clock", "x": 0, "y": 0, "width": 64, "height": 32},
                    {"name": "weather", "x": 0, "y": 32, "width": 64, "height": 32},
                ],
            },
            "feeds": {
                "widgets": [
                    {"name": "hackernews", "x": 0, "y": 0, "width": 64, "height": 48},
                    {"name": "notice", "x": 0, "y": 48, "width": 64, "height": 16},
                ],
            },
        },
    })
}

/// Frame sink that reports activity instead of driving a matrix.
#[derive(Default)]
struct ConsoleSink {
    frames: u64,
}

impl FrameSink for ConsoleSink {
    fn push_frame(&mut self, pixels: &[u8], width: u32, height: u32) -> Result<(), RenderError> {
        self.frames += 1;
        if self.frames % 100 == 1 {
            let lit = pixels.iter().filter(|&&p| p != 0).count();
            log::info!("Frame {}: {lit} lit pixels on {width}x{height}", self.frames);
        }
        Ok(())
    }
}

/// Radio that associates instantly and always passes its health probe.
struct SimRadio;

#[async_trait(?Send)]
impl NetworkControl for SimRadio {
    async fn associate(
        &mut self,
        ssid: &str,
        _password: &str,
        _timeout: Duration,
    ) -> Result<(), ConnectivityError> {
        log::info!("Simulated association with '{ssid}'");
        Ok(())
    }

    async fn disassociate(&mut self) {}

    async fn probe(&mut self) -> bool {
        true
    }

    async fn start_access_point(&mut self) -> Result<(), ConnectivityError> {
        log::info!("Simulated fallback access point up");
        Ok(())
    }

    async fn stop_access_point(&mut self) {}

    fn signal_dbm(&self) -> Option<i8> {
        Some(-41)
    }
}

/// Canned JSON bodies for the built-in widgets' endpoints.
struct CannedDataSource;

#[async_trait(?Send)]
impl DataSource for CannedDataSource {
    async fn fetch_json(&self, url: &str, _timeout: Duration) -> Result<Value, FetchError> {
        if url.contains("wttr.in") {
            return Ok(json!({
                "current_condition": [{
                    "temp_C": "21",
                    "temp_F": "70",
                    "humidity": "64",
                    "windspeedKmph": "11",
                    "weatherDesc": [{"value": "Partly cloudy"}],
                }],
                "nearest_area": [{"areaName": [{"value": "Simville"}]}],
            }));
        }
        if url.ends_with("/topstories.json") {
            return Ok(json!([7101, 7102, 7103]));
        }
        if url.contains("/item/") {
            return Ok(json!({"title": "Show HN: a 64x64 dashboard", "score": 128}));
        }
        if url.contains("rss2json") {
            return Ok(json!({
                "feed": {"title": "Simulated News"},
                "items": [{"title": "All quiet in the simulator"}],
            }));
        }
        Err(FetchError::Unreachable)
    }
}

/// Host wall clock; hardware builds use the SNTP-synchronized time service.
struct HostWallClock;

impl WallClock for HostWallClock {
    fn epoch_seconds(&self) -> Option<i64> {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .ok()
            .map(|d| d.as_secs() as i64)
    }
}
