// src/widget/registry.rs
//! Widget discovery and instantiation.
//!
//! Discovery is a static registration table: every built-in widget registers
//! its descriptor and factory here, and configuration decides which of them
//! actually become instances. There is no runtime plugin loading.

use alloc::boxed::Box;
use alloc::vec::Vec;

use embassy_time::Instant;

use crate::common::error::ConfigError;
use crate::config::{ConfigMap, merge_config};
use crate::render::canvas::Region;
use crate::widget::{Widget, WidgetDescriptor, WidgetInstance};
use crate::widget::{clock, hackernews, news, notice, weather};

type WidgetFactory = fn() -> Box<dyn Widget>;

pub struct WidgetRegistry {
    entries: Vec<(&'static WidgetDescriptor, WidgetFactory)>,
}

impl WidgetRegistry {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// All built-in widget classes.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(&clock::DESCRIPTOR, clock::create);
        registry.register(&weather::DESCRIPTOR, weather::create);
        registry.register(&news::DESCRIPTOR, news::create);
        registry.register(&hackernews::DESCRIPTOR, hackernews::create);
        registry.register(&notice::DESCRIPTOR, notice::create);
        registry
    }

    pub fn register(&mut self, descriptor: &'static WidgetDescriptor, factory: WidgetFactory) {
        self.entries.push((descriptor, factory));
        log::debug!("Registered widget: {} v{}", descriptor.name, descriptor.version);
    }

    /// Available widget classes, in registration order.
    pub fn discover(&self) -> impl Iterator<Item = &'static WidgetDescriptor> + '_ {
        self.entries.iter().map(|(descriptor, _)| *descriptor)
    }

    pub fn descriptor(&self, name: &str) -> Option<&'static WidgetDescriptor> {
        self.entries
            .iter()
            .find(|(descriptor, _)| descriptor.name == name)
            .map(|(descriptor, _)| *descriptor)
    }

    /// Build a widget and its runtime state from the merged configuration:
    /// class defaults overlaid with the user subtree, user keys winning,
    /// nested mappings merged recursively. Unknown keys pass through for the
    /// widget to ignore.
    pub fn instantiate(
        &self,
        name: &str,
        user_config: &ConfigMap,
        region: Region,
        now: Instant,
    ) -> Result<(Box<dyn Widget>, WidgetInstance), ConfigError> {
        let (descriptor, factory) = self
            .entries
            .iter()
            .find(|(descriptor, _)| descriptor.name == name)
            .ok_or_else(|| ConfigError::UnknownWidget(name.into()))?;

        let defaults = (descriptor.default_config)();
        let merged = merge_config(&defaults, user_config);
        let instance = WidgetInstance::new(merged, region, now);
        Ok((factory(), instance))
    }
}

impl Default for WidgetRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}
