// src/screen.rs
//! Screen layouts and rotation.
//!
//! A screen is an ordered set of widget slots with a clear policy; the
//! dashboard rotates through its screens on a timer. Exactly one screen is
//! current at any time and rotation only ever advances the index modulo the
//! screen count.

use alloc::string::String;
use alloc::vec::Vec;

use embassy_time::{Duration, Instant};

/// Per-screen clear policy, fixed at layout build.
///
/// Multi-widget layouts clear the whole frame each tick; single-widget
/// rotating layouts may keep the rest of the frame and clear only the
/// widget's own region. The two modes are never mixed within a screen.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClearMode {
    WholeScreen,
    WidgetRegion,
}

#[derive(Debug)]
pub struct Screen {
    pub name: String,
    /// Indices into the dashboard slot table, in registration order.
    pub slots: Vec<usize>,
    pub clear_mode: ClearMode,
}

impl Screen {
    pub fn new(name: impl Into<String>, slots: Vec<usize>, clear_mode: ClearMode) -> Self {
        Self {
            name: name.into(),
            slots,
            clear_mode,
        }
    }
}

#[derive(Debug)]
pub struct ScreenSet {
    screens: Vec<Screen>,
    current: usize,
    rotation_interval: Duration,
    rotate_at: Option<Instant>,
}

impl ScreenSet {
    pub fn new(screens: Vec<Screen>, rotation_interval: Duration) -> Self {
        Self {
            screens,
            current: 0,
            rotation_interval,
            rotate_at: None,
        }
    }

    pub fn len(&self) -> usize {
        self.screens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.screens.is_empty()
    }

    pub fn current(&self) -> &Screen {
        &self.screens[self.current]
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    /// Advance the rotation if its deadline has elapsed. The deadline is armed
    /// lazily on the first frame, so the first screen gets a full interval.
    pub fn rotate_if_due(&mut self, now: Instant) -> bool {
        if self.screens.len() <= 1 {
            return false;
        }
        match self.rotate_at {
            Some(at) if now >= at => {
                self.advance();
                self.rotate_at = Some(now + self.rotation_interval);
                log::info!("Rotated to screen: {}", self.current().name);
                true
            }
            Some(_) => false,
            None => {
                self.rotate_at = Some(now + self.rotation_interval);
                false
            }
        }
    }

    pub fn advance(&mut self) {
        if !self.screens.is_empty() {
            self.current = (self.current + 1) % self.screens.len();
        }
    }

    /// Advance immediately; the next frame re-arms the deadline.
    pub fn force_rotation(&mut self) {
        self.advance();
        self.rotate_at = None;
    }

    pub fn set_rotation_interval(&mut self, interval: Duration) {
        self.rotation_interval = interval.max(Duration::from_secs(1));
        self.rotate_at = None;
    }

    pub fn rotation_interval(&self) -> Duration {
        self.rotation_interval
    }

    /// Countdown to the next rotation, zero when unarmed or single-screen.
    pub fn rotation_remaining(&self, now: Instant) -> Duration {
        match self.rotate_at {
            Some(at) if self.screens.len() > 1 && at > now => at - now,
            _ => Duration::from_ticks(0),
        }
    }
}
