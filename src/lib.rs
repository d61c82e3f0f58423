// src/lib.rs
//! Scheduling and rendering coordination engine for an LED-matrix dashboard.
//!
//! The dashboard cycles a fixed matrix display through screens of data-driven
//! widgets. Each widget pulls from its external source on its own schedule and
//! draws into a region of the shared framebuffer; a connectivity supervisor
//! gates the pulls and falls back to a local access point when the station
//! link cannot be recovered.

#![cfg_attr(not(feature = "simulator"), no_std)]

extern crate alloc;

pub mod common;
pub mod config;
pub mod dashboard;
pub mod net;
pub mod render;
pub mod scheduler;
pub mod screen;
pub mod status;
pub mod tasks;
pub mod widget;

pub use common::error::{
    ConfigError, ConnectivityError, DashboardError, FetchError, RenderError,
};
pub use dashboard::Dashboard;
pub use widget::{Widget, WidgetDescriptor, registry::WidgetRegistry};

/// Upper bound on widget instances across all screens. Slot storage is
/// allocated up front and the pull task pool is sized to match.
pub const MAX_WIDGETS: usize = 16;

/// Upper bound on configured screens.
pub const MAX_SCREENS: usize = 8;
