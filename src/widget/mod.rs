// src/widget/mod.rs
//! Widget capability contract and the built-in widget set.
//!
//! Widgets are stateless trait objects: everything mutable (merged config,
//! pulled data, error bookkeeping, region geometry) lives in the
//! `WidgetInstance` owned by the dashboard. A widget's two capabilities are
//! timed independently: `pull` runs on the widget's own interval under the
//! pull scheduler, `render` runs every frame under the render cycle.

pub mod clock;
pub mod hackernews;
pub mod instance;
pub mod news;
pub mod notice;
pub mod registry;
pub mod weather;

use alloc::string::String;

use async_trait::async_trait;
use embassy_time::Duration;
use serde_json::Value;

use crate::common::error::{ConfigError, FetchError, RenderError};
use crate::config::ConfigMap;
use crate::net::client::{DataSource, fetch_json_with_retry};
use crate::render::canvas::RegionCanvas;

pub use instance::{ERROR_BUDGET, WidgetInstance};

/// Last successfully pulled values, keyed by widget-defined field names.
/// Replaced wholesale on every successful pull; never patched in place.
pub type DataMap = serde_json::Map<String, Value>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefreshMode {
    /// The scheduler fetches on the widget's interval.
    Pull,
    /// Data arrives from outside the timing loop (webhook, MQTT bridge).
    Push,
}

/// Static identity of a widget class. One per implementation, immutable.
pub struct WidgetDescriptor {
    pub name: &'static str,
    pub version: &'static str,
    pub description: &'static str,
    pub refresh: RefreshMode,
    pub interval: Duration,
    pub default_config: fn() -> ConfigMap,
}

/// Wall-clock seam. Backed by SNTP on hardware, the host clock in the
/// simulator; `None` until the first successful synchronization.
pub trait WallClock {
    fn epoch_seconds(&self) -> Option<i64>;
}

/// Everything a pull needs from the outside world.
pub struct PullContext<'a> {
    pub source: &'a dyn DataSource,
    pub clock: &'a dyn WallClock,
    pub timeout: Duration,
}

impl PullContext<'_> {
    /// Fetch and decode one endpoint, retrying transient failures a bounded
    /// number of times before surfacing the error to the scheduler.
    pub async fn fetch_json(&self, url: &str) -> Result<Value, FetchError> {
        fetch_json_with_retry(self.source, url, self.timeout).await
    }

    pub fn epoch_seconds(&self) -> Option<i64> {
        self.clock.epoch_seconds()
    }
}

/// Read-only view handed to `render`.
pub struct WidgetView<'a> {
    pub data: &'a DataMap,
    pub config: &'a ConfigMap,
}

#[async_trait(?Send)]
pub trait Widget: Send + Sync {
    fn descriptor(&self) -> &WidgetDescriptor;

    /// One-time setup after instantiation. A failure omits the widget from
    /// the screen; it never aborts dashboard startup.
    async fn init(&self, _config: &ConfigMap) -> Result<(), ConfigError> {
        Ok(())
    }

    /// Fetch fresh data. Only invoked by the scheduler for `Pull` widgets;
    /// failures are the scheduler's bookkeeping, not the widget's.
    async fn pull(
        &self,
        _ctx: &PullContext<'_>,
        _config: &ConfigMap,
    ) -> Result<DataMap, FetchError> {
        Err(FetchError::Unsupported)
    }

    /// Ingest externally delivered data. `None` means the payload was not
    /// accepted; `Pull` widgets keep the default.
    fn on_push(&self, _topic: &str, _payload: &Value, _config: &ConfigMap) -> Option<DataMap> {
        None
    }

    /// Draw the current data into the widget's region. The canvas is already
    /// clipped and translated. Must tolerate empty/stale data by drawing
    /// nothing and returning `Ok(false)`. Must not suspend.
    fn render(&self, canvas: &mut RegionCanvas<'_>, view: &WidgetView<'_>)
    -> Result<bool, RenderError>;
}
