// src/dashboard.rs
//! Top-level wiring: builds the widget slots and screens from configuration,
//! owns the shared state, and spawns the render / pull / network tasks.
//!
//! Access discipline for everything shared: widget instance state and the
//! screen set live in blocking cells locked only for short synchronous
//! sections; the framebuffer is owned by the render task outright; the
//! connectivity state is written only by the supervisor.

use alloc::boxed::Box;
use alloc::vec::Vec;

use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use embassy_executor::Spawner;
use embassy_time::{Duration, Instant};
use serde_json::Value;

use crate::common::error::{DashboardError, Result};
use crate::common::{SharedCell, shared_cell};
use crate::config::{ConfigMap, SystemSettings, get_bool, get_str, get_u64, merge_config, section};
use crate::net::client::DataSource;
use crate::net::supervisor::{ConnectivityHandle, ConnectivitySupervisor};
use crate::render::canvas::Region;
use crate::render::cycle::RenderCycle;
use crate::screen::{ClearMode, Screen, ScreenSet};
use crate::status::DashboardStatus;
use crate::widget::registry::WidgetRegistry;
use crate::widget::{DataMap, RefreshMode, WallClock, Widget, WidgetInstance};
use crate::{MAX_SCREENS, MAX_WIDGETS};

/// One widget on one screen: the stateless widget object plus its runtime
/// state cell. Pulls write the cell on completion, renders read a snapshot.
pub struct WidgetSlot {
    pub widget: Box<dyn Widget>,
    pub state: SharedCell<WidgetInstance>,
}

/// Per-widget atomic view for one frame.
pub struct RenderSnapshot {
    pub data: DataMap,
    pub config: ConfigMap,
    pub region: Region,
}

impl WidgetSlot {
    pub fn name(&self) -> &'static str {
        self.widget.descriptor().name
    }

    pub fn refresh_mode(&self) -> RefreshMode {
        self.widget.descriptor().refresh
    }

    /// Snapshot for rendering, `None` while the widget is disabled.
    pub fn render_snapshot(&self) -> Option<RenderSnapshot> {
        self.state.lock(|cell| {
            let inst = cell.borrow();
            if !inst.enabled {
                return None;
            }
            Some(RenderSnapshot {
                data: inst.data.clone(),
                config: inst.config.clone(),
                region: inst.region,
            })
        })
    }
}

pub struct Dashboard {
    running: AtomicBool,
    slots: heapless::Vec<WidgetSlot, MAX_WIDGETS>,
    screens: SharedCell<ScreenSet>,
    connectivity: ConnectivityHandle,
    settings: SystemSettings,
    target_fps: AtomicU32,
}

impl core::fmt::Debug for Dashboard {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Dashboard")
            .field("slots", &self.slots.len())
            .field("target_fps", &self.target_fps)
            .finish()
    }
}

impl Dashboard {
    /// Build slots and screens from the configuration document. Widgets that
    /// fail to instantiate or init are logged and omitted; a dashboard with
    /// nothing left to show is a fatal startup error.
    pub async fn build(config: &Value, registry: &WidgetRegistry) -> Result<Self> {
        let settings = SystemSettings::from_config(config);
        let connectivity = ConnectivityHandle::new(&settings);
        let now = Instant::now();

        let mut slots: heapless::Vec<WidgetSlot, MAX_WIDGETS> = heapless::Vec::new();
        let mut screens: Vec<Screen> = Vec::new();

        let plugin_section = section(config, "plugins").cloned().unwrap_or_default();

        if let Some(screen_section) = section(config, "screens") {
            for (screen_name, screen_config) in screen_section {
                let Some(screen_config) = screen_config.as_object() else {
                    log::warn!("Screen '{screen_name}' is not a mapping, skipping");
                    continue;
                };
                if !get_bool(screen_config, "enabled", true) {
                    continue;
                }
                let clear_mode = if get_str(screen_config, "clear_mode", "screen") == "region" {
                    ClearMode::WidgetRegion
                } else {
                    ClearMode::WholeScreen
                };

                let mut members: Vec<usize> = Vec::new();
                let entries = screen_config
                    .get("widgets")
                    .and_then(Value::as_array)
                    .cloned()
                    .unwrap_or_default();
                for entry in &entries {
                    let Some(name) = entry.get("name").and_then(Value::as_str) else {
                        log::warn!("Widget entry without a name in screen '{screen_name}'");
                        continue;
                    };
                    // Global plugin config first, per-screen overrides on top.
                    let mut user_config = plugin_section
                        .get(name)
                        .and_then(Value::as_object)
                        .cloned()
                        .unwrap_or_default();
                    if let Some(overrides) = entry.get("config").and_then(Value::as_object) {
                        user_config = merge_config(&user_config, overrides);
                    }
                    let region = entry_region(entry.as_object().unwrap(), &settings);

                    if let Some(index) =
                        add_slot(&mut slots, registry, name, &user_config, region, now).await
                    {
                        members.push(index);
                        log::info!("Added widget '{name}' to screen '{screen_name}'");
                    }
                }

                if members.is_empty() {
                    log::warn!("Screen '{screen_name}' has no usable widgets, skipping");
                    continue;
                }
                if screens.len() >= MAX_SCREENS {
                    return Err(DashboardError::TooManyScreens);
                }
                screens.push(Screen::new(screen_name.as_str(), members, clear_mode));
                log::info!("Loaded screen: {screen_name}");
            }
        }

        if screens.is_empty() {
            // No usable screen configuration: synthesize one implicit screen
            // holding every globally-enabled widget.
            log::info!("No screens configured, creating default screen");
            let mut members: Vec<usize> = Vec::new();
            for (name, plugin_config) in &plugin_section {
                let user_config = plugin_config
                    .as_object()
                    .cloned()
                    .unwrap_or_default();
                if !get_bool(&user_config, "enabled", true) {
                    continue;
                }
                let region = entry_region(&user_config, &settings);
                if let Some(index) =
                    add_slot(&mut slots, registry, name, &user_config, region, now).await
                {
                    members.push(index);
                }
            }
            if !members.is_empty() {
                screens.push(Screen::new("default", members, ClearMode::WholeScreen));
            }
        }

        if slots.is_empty() {
            return Err(DashboardError::NoWidgets);
        }
        if screens.is_empty() {
            return Err(DashboardError::NoScreens);
        }

        let target_fps = settings.target_fps;
        Ok(Self {
            running: AtomicBool::new(true),
            slots,
            screens: shared_cell(ScreenSet::new(screens, settings.rotation_interval)),
            connectivity,
            settings,
            target_fps: AtomicU32::new(target_fps),
        })
    }

    /// Spawn the render cycle, the connectivity supervisor and one pull task
    /// per pull-capable widget.
    pub fn start(
        &'static self,
        spawner: &Spawner,
        cycle: RenderCycle,
        supervisor: ConnectivitySupervisor,
        source: &'static dyn DataSource,
        clock: &'static dyn WallClock,
    ) -> Result<()> {
        spawner
            .spawn(crate::tasks::render_task(self, cycle))
            .map_err(|_| DashboardError::TaskSpawn("render"))?;
        spawner
            .spawn(crate::tasks::network_task(self, supervisor))
            .map_err(|_| DashboardError::TaskSpawn("network"))?;

        for (index, slot) in self.slots.iter().enumerate() {
            if slot.refresh_mode() == RefreshMode::Pull {
                spawner
                    .spawn(crate::tasks::pull_task(self, index, source, clock))
                    .map_err(|_| DashboardError::TaskSpawn("pull"))?;
            }
        }

        log::info!(
            "Dashboard started: {} widget(s), {} screen(s)",
            self.slots.len(),
            self.with_screens(|s| s.len())
        );
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Ask every task loop to wind down at its next tick. In-flight pulls
    /// never leave half-committed state behind; outcomes commit whole or not
    /// at all.
    pub fn stop(&self) {
        self.running.store(false, Ordering::Relaxed);
        log::info!("Dashboard stopping");
    }

    pub fn connectivity(&self) -> &ConnectivityHandle {
        &self.connectivity
    }

    pub fn slots(&self) -> &[WidgetSlot] {
        &self.slots
    }

    pub fn slot(&self, index: usize) -> Option<&WidgetSlot> {
        self.slots.get(index)
    }

    pub fn pull_timeout(&self) -> Duration {
        self.settings.pull_timeout
    }

    pub fn settings(&self) -> &SystemSettings {
        &self.settings
    }

    pub fn target_fps(&self) -> u32 {
        self.target_fps.load(Ordering::Relaxed)
    }

    pub fn set_fps(&self, fps: u32) {
        let fps = fps.clamp(1, 60);
        self.target_fps.store(fps, Ordering::Relaxed);
        log::info!("Render target set to {fps} fps");
    }

    pub fn with_screens<R>(&self, f: impl FnOnce(&mut ScreenSet) -> R) -> R {
        self.screens.lock(|cell| f(&mut cell.borrow_mut()))
    }

    pub fn force_rotation(&self) {
        self.with_screens(|screens| screens.force_rotation());
    }

    pub fn set_rotation_interval(&self, interval: Duration) {
        self.with_screens(|screens| screens.set_rotation_interval(interval));
    }

    /// Route externally delivered data to push-mode widgets with the given
    /// name. Returns whether any widget accepted the payload. Pull widgets
    /// and their error bookkeeping are never touched.
    pub fn push(&self, widget_name: &str, topic: &str, payload: &Value) -> bool {
        let now = Instant::now();
        let mut accepted = false;
        for slot in &self.slots {
            if slot.name() != widget_name || slot.refresh_mode() != RefreshMode::Push {
                continue;
            }
            let config = slot.state.lock(|cell| cell.borrow().config.clone());
            if let Some(data) = slot.widget.on_push(topic, payload, &config) {
                slot.state
                    .lock(|cell| cell.borrow_mut().commit_push(now, data));
                accepted = true;
            }
        }
        if !accepted {
            log::debug!("Push '{topic}' for widget '{widget_name}' not accepted");
        }
        accepted
    }

    /// Merge a configuration update into every instance of the named widget.
    /// Re-deriving `enabled` here is the one way a budget-disabled widget
    /// comes back.
    pub fn update_widget_config(&self, widget_name: &str, update: &ConfigMap) -> bool {
        let mut matched = false;
        for slot in &self.slots {
            if slot.name() != widget_name {
                continue;
            }
            slot.state.lock(|cell| cell.borrow_mut().apply_config(update));
            matched = true;
        }
        if matched {
            log::info!("Updated configuration for widget '{widget_name}'");
        }
        matched
    }

    pub fn status(&self, now: Instant) -> DashboardStatus {
        crate::status::collect(self, now)
    }
}

fn entry_region(entry: &ConfigMap, settings: &SystemSettings) -> Region {
    let x = get_u64(entry, "x", 0) as u32;
    let y = get_u64(entry, "y", 0) as u32;
    let width = get_u64(entry, "width", settings.display_width as u64) as u32;
    let height = get_u64(entry, "height", settings.display_height as u64) as u32;
    Region::new(x, y, width, height)
        .unwrap_or_else(|| Region::full(settings.display_width, settings.display_height))
}

async fn add_slot(
    slots: &mut heapless::Vec<WidgetSlot, MAX_WIDGETS>,
    registry: &WidgetRegistry,
    name: &str,
    user_config: &ConfigMap,
    region: Region,
    now: Instant,
) -> Option<usize> {
    let (widget, instance) = match registry.instantiate(name, user_config, region, now) {
        Ok(built) => built,
        Err(err) => {
            log::warn!("Failed to instantiate widget '{name}': {err}");
            return None;
        }
    };
    if let Err(err) = widget.init(&instance.config).await {
        log::warn!("Widget '{name}' init failed, omitting: {err}");
        return None;
    }
    if slots.len() >= MAX_WIDGETS {
        log::warn!("Widget table full, omitting '{name}'");
        return None;
    }
    let index = slots.len();
    slots
        .push(WidgetSlot {
            widget,
            state: shared_cell(instance),
        })
        .ok();
    Some(index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use embassy_futures::block_on;
    use serde_json::json;

    fn registry() -> WidgetRegistry {
        WidgetRegistry::with_builtins()
    }

    #[test]
    fn test_build_named_screens() {
        let config = json!({
            "system": {"rotation_interval": 15},
            "screens": {
                "front": {
                    "widgets": [
                        {"name": "clock", "x": 0, "y": 0, "width": 64, "height": 32},
                        {"name": "weather", "x": 0, "y": 32, "width": 64, "height": 32},
                    ],
                },
                "feeds": {
                    "widgets": [{"name": "hackernews"}],
                },
                "off": {"enabled": false, "widgets": [{"name": "news"}]},
            },
        });
        let dash = block_on(Dashboard::build(&config, &registry())).unwrap();

        assert_eq!(dash.slots().len(), 3);
        dash.with_screens(|screens| {
            assert_eq!(screens.len(), 2);
            // Screen order follows the (sorted) configuration keys.
            assert_eq!(screens.current().name, "feeds");
            assert_eq!(screens.rotation_interval(), Duration::from_secs(15));
        });
        // Region geometry assigned at layout build.
        let clock_slot = dash
            .slots()
            .iter()
            .find(|slot| slot.name() == "clock")
            .unwrap();
        let region = clock_slot.state.lock(|cell| cell.borrow().region);
        assert_eq!(region, Region::new(0, 0, 64, 32).unwrap());
    }

    #[test]
    fn test_default_screen_synthesized_from_enabled_plugins() {
        let config = json!({
            "plugins": {
                "clock": {"enabled": true},
                "weather": {"enabled": true},
                "news": {"enabled": false},
            },
        });
        let dash = block_on(Dashboard::build(&config, &registry())).unwrap();

        assert_eq!(dash.slots().len(), 2);
        dash.with_screens(|screens| {
            assert_eq!(screens.len(), 1);
            assert_eq!(screens.current().name, "default");
            assert_eq!(screens.current().clear_mode, ClearMode::WholeScreen);
        });
    }

    #[test]
    fn test_unknown_widget_is_omitted_not_fatal() {
        let config = json!({
            "plugins": {
                "clock": {"enabled": true},
                "thermocouple": {"enabled": true},
            },
        });
        let dash = block_on(Dashboard::build(&config, &registry())).unwrap();
        assert_eq!(dash.slots().len(), 1);
        assert_eq!(dash.slots()[0].name(), "clock");
    }

    #[test]
    fn test_build_with_nothing_to_show_is_fatal() {
        let err = block_on(Dashboard::build(&json!({}), &registry())).unwrap_err();
        assert_eq!(err, DashboardError::NoWidgets);
    }

    #[test]
    fn test_push_routes_to_push_widgets_only() {
        let config = json!({
            "plugins": {
                "clock": {"enabled": true},
                "notice": {"enabled": true},
            },
        });
        let dash = block_on(Dashboard::build(&config, &registry())).unwrap();

        assert!(dash.push("notice", "message", &json!({"text": "hi"})));
        let notice = dash
            .slots()
            .iter()
            .find(|slot| slot.name() == "notice")
            .unwrap();
        notice.state.lock(|cell| {
            let inst = cell.borrow();
            assert_eq!(inst.data.get("text"), Some(&json!("hi")));
            assert_eq!(inst.error_count, 0);
        });

        // Pull widgets never accept pushes, even with a matching name.
        assert!(!dash.push("clock", "message", &json!({"text": "hi"})));
        // Unknown topic is not accepted.
        assert!(!dash.push("notice", "brightness", &json!(3)));
    }

    #[test]
    fn test_update_config_reaches_instances() {
        let config = json!({"plugins": {"clock": {}, "notice": {}}});
        let dash = block_on(Dashboard::build(&config, &registry())).unwrap();

        let update = json!({"enabled": false});
        assert!(dash.update_widget_config("clock", update.as_object().unwrap()));
        assert!(!dash.update_widget_config("cricket", update.as_object().unwrap()));

        let clock = dash
            .slots()
            .iter()
            .find(|slot| slot.name() == "clock")
            .unwrap();
        assert!(clock.state.lock(|cell| !cell.borrow().enabled));
    }

    #[test]
    fn test_fps_clamped() {
        let config = json!({"plugins": {"clock": {}}});
        let dash = block_on(Dashboard::build(&config, &registry())).unwrap();
        assert_eq!(dash.target_fps(), 10);
        dash.set_fps(500);
        assert_eq!(dash.target_fps(), 60);
        dash.set_fps(0);
        assert_eq!(dash.target_fps(), 1);
    }

    #[test]
    fn test_stop_clears_running() {
        let config = json!({"plugins": {"clock": {}}});
        let dash = block_on(Dashboard::build(&config, &registry())).unwrap();
        assert!(dash.is_running());
        dash.stop();
        assert!(!dash.is_running());
    }
}
