// src/net/supervisor.rs
//! Connectivity supervisor: owns the station link state machine, exponential
//! reconnect backoff and the fallback access-point mode. The rest of the
//! system only ever reads the published state; pulls consult the boolean
//! `is_connected` gate before running.

use alloc::boxed::Box;
use alloc::string::String;

use async_trait::async_trait;
use embassy_time::{Duration, Instant};
use serde::Serialize;

use crate::common::error::ConnectivityError;
use crate::common::{SharedCell, shared_cell};
use crate::config::SystemSettings;

/// Consecutive failed reconnection attempts before the fallback access point
/// is considered.
pub const FALLBACK_THRESHOLD: u32 = 3;

/// Radio/link control seam. Hardware glue (Wi-Fi driver, AP bring-up) lives
/// behind this trait; the simulator substitutes a scripted implementation.
#[async_trait(?Send)]
pub trait NetworkControl {
    /// Associate with the configured station network. Implementations apply
    /// the given timeout themselves.
    async fn associate(
        &mut self,
        ssid: &str,
        password: &str,
        timeout: Duration,
    ) -> Result<(), ConnectivityError>;

    async fn disassociate(&mut self);

    /// Reachability beyond link-layer association (e.g. a TCP touch of a
    /// known endpoint). A failed probe is treated exactly like link loss.
    async fn probe(&mut self) -> bool;

    async fn start_access_point(&mut self) -> Result<(), ConnectivityError>;

    async fn stop_access_point(&mut self);

    fn signal_dbm(&self) -> Option<i8>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkState {
    Disconnected,
    Connecting,
    Connected,
    FallbackAp,
}

#[derive(Debug)]
struct ConnectivityState {
    link: LinkState,
    connected: bool,
    consecutive_failures: u32,
    backoff: Duration,
    last_attempt: Option<Instant>,
    next_probe: Option<Instant>,
    fallback_active: bool,
    retry_requested: bool,
    signal_dbm: Option<i8>,
    ssid: String,
    password: String,
}

/// Read-only view for diagnostics and the status surface.
#[derive(Clone, Debug, Serialize)]
pub struct ConnectivitySnapshot {
    pub connected: bool,
    pub link: LinkState,
    pub consecutive_failures: u32,
    pub backoff_secs: u64,
    pub fallback_active: bool,
    pub signal_dbm: Option<i8>,
}

/// Process-wide connectivity state. Written only by the supervisor; read by
/// the pull gate and diagnostics.
pub struct ConnectivityHandle {
    state: SharedCell<ConnectivityState>,
}

impl ConnectivityHandle {
    pub fn new(settings: &SystemSettings) -> Self {
        Self {
            state: shared_cell(ConnectivityState {
                link: LinkState::Disconnected,
                connected: false,
                consecutive_failures: 0,
                backoff: settings.retry_delay,
                last_attempt: None,
                next_probe: None,
                fallback_active: false,
                retry_requested: false,
                signal_dbm: None,
                ssid: settings.wifi_ssid.clone(),
                password: settings.wifi_password.clone(),
            }),
        }
    }

    /// The gate consulted before every pull attempt.
    pub fn is_connected(&self) -> bool {
        self.with_state(|s| s.connected)
    }

    pub fn snapshot(&self) -> ConnectivitySnapshot {
        self.with_state(|s| ConnectivitySnapshot {
            connected: s.connected,
            link: s.link,
            consecutive_failures: s.consecutive_failures,
            backoff_secs: s.backoff.as_secs(),
            fallback_active: s.fallback_active,
            signal_dbm: s.signal_dbm,
        })
    }

    /// New station credentials from the external config UI; picked up on the
    /// next reconnection attempt.
    pub fn update_credentials(&self, ssid: &str, password: &str) {
        self.with_state(|s| {
            s.ssid = String::from(ssid);
            s.password = String::from(password);
        });
        log::info!("Updated Wi-Fi credentials for: {ssid}");
    }

    /// External command to leave fallback mode and retry the station link.
    pub fn request_station_retry(&self) {
        self.with_state(|s| s.retry_requested = true);
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut ConnectivityState) -> R) -> R {
        self.state.lock(|cell| f(&mut cell.borrow_mut()))
    }
}

/// Exponential backoff, doubling per failure, clamped to a ceiling.
#[derive(Clone, Copy, Debug)]
pub struct BackoffPolicy {
    pub base: Duration,
    pub ceiling: Duration,
}

impl BackoffPolicy {
    pub fn next(&self, current: Duration) -> Duration {
        let doubled = current.as_secs().saturating_mul(2);
        Duration::from_secs(doubled.min(self.ceiling.as_secs()))
    }
}

/// Time remaining before another reconnection attempt is allowed; `None`
/// means the gate is open.
pub fn reconnect_remaining(
    now: Instant,
    last_attempt: Option<Instant>,
    backoff: Duration,
) -> Option<Duration> {
    let last = last_attempt?;
    let ready_at = last + backoff;
    if now >= ready_at {
        None
    } else {
        Some(ready_at - now)
    }
}

/// Outcome of one rate-limited reconnection attempt.
#[derive(Debug, PartialEq, Eq)]
pub enum Reconnect {
    Connected,
    Failed { fallback_started: bool },
    /// Backoff has not elapsed yet; not an error and not an attempt.
    NotYet(Duration),
    /// Fallback mode is active; reconnection is suspended.
    Suspended,
    /// No SSID configured; nothing to attempt and no failure counted.
    NoCredentials,
}

enum AttemptPlan {
    Attempt { ssid: String, password: String },
    NotYet(Duration),
    Suspended,
}

pub struct ConnectivitySupervisor {
    control: Box<dyn NetworkControl>,
    policy: BackoffPolicy,
    association_timeout: Duration,
    probe_interval: Duration,
    fallback_enabled: bool,
}

impl ConnectivitySupervisor {
    pub fn new(control: Box<dyn NetworkControl>, settings: &SystemSettings) -> Self {
        Self {
            control,
            policy: BackoffPolicy {
                base: settings.retry_delay,
                ceiling: settings.backoff_ceiling,
            },
            association_timeout: settings.association_timeout,
            probe_interval: settings.probe_interval,
            fallback_enabled: settings.fallback_ap,
        }
    }

    /// One supervision step; driven from the network task on a 1 s tick and
    /// from tests with explicit instants.
    pub async fn step(&mut self, handle: &ConnectivityHandle, now: Instant) {
        let link = handle.with_state(|s| s.link);
        match link {
            LinkState::Connected => self.health_check(handle, now).await,
            LinkState::FallbackAp => {
                let retry = handle.with_state(|s| core::mem::take(&mut s.retry_requested));
                if retry {
                    self.leave_fallback(handle).await;
                }
            }
            LinkState::Disconnected | LinkState::Connecting => {
                let _ = self.reconnect(handle, now).await;
            }
        }
    }

    /// Rate-limited reconnection. Refuses (without attempting or counting)
    /// while the backoff window is still open or fallback is active.
    pub async fn reconnect(&mut self, handle: &ConnectivityHandle, now: Instant) -> Reconnect {
        let plan = handle.with_state(|s| {
            if s.fallback_active {
                return AttemptPlan::Suspended;
            }
            if let Some(remaining) = reconnect_remaining(now, s.last_attempt, s.backoff) {
                return AttemptPlan::NotYet(remaining);
            }
            AttemptPlan::Attempt {
                ssid: s.ssid.clone(),
                password: s.password.clone(),
            }
        });

        match plan {
            AttemptPlan::Suspended => Reconnect::Suspended,
            AttemptPlan::NotYet(remaining) => Reconnect::NotYet(remaining),
            AttemptPlan::Attempt { ssid, password } => {
                self.connect(handle, now, &ssid, &password).await
            }
        }
    }

    /// Single association attempt with full bookkeeping.
    async fn connect(
        &mut self,
        handle: &ConnectivityHandle,
        now: Instant,
        ssid: &str,
        password: &str,
    ) -> Reconnect {
        if ssid.is_empty() {
            log::warn!("No Wi-Fi SSID configured");
            // Rate-limit the retry chatter, but do not count a failure.
            handle.with_state(|s| s.last_attempt = Some(now));
            return Reconnect::NoCredentials;
        }

        handle.with_state(|s| {
            s.link = LinkState::Connecting;
            s.last_attempt = Some(now);
        });
        log::info!("Connecting to Wi-Fi network: {ssid}");

        match self
            .control
            .associate(ssid, password, self.association_timeout)
            .await
        {
            Ok(()) => {
                let signal = self.control.signal_dbm();
                let probe_at = now + self.probe_interval;
                handle.with_state(|s| {
                    s.connected = true;
                    s.link = LinkState::Connected;
                    s.consecutive_failures = 0;
                    s.backoff = self.policy.base;
                    s.signal_dbm = signal;
                    s.next_probe = Some(probe_at);
                });
                log::info!("Wi-Fi connected");
                Reconnect::Connected
            }
            Err(err) => {
                let (failures, start_fallback) = handle.with_state(|s| {
                    s.connected = false;
                    s.link = LinkState::Disconnected;
                    s.signal_dbm = None;
                    s.consecutive_failures += 1;
                    s.backoff = self.policy.next(s.backoff);
                    let start = s.consecutive_failures >= FALLBACK_THRESHOLD
                        && self.fallback_enabled
                        && !s.fallback_active;
                    (s.consecutive_failures, start)
                });
                log::warn!("Wi-Fi connection attempt {failures} failed: {err}");

                let fallback_started = if start_fallback {
                    self.enter_fallback(handle).await
                } else {
                    false
                };
                Reconnect::Failed { fallback_started }
            }
        }
    }

    /// Reachability probe while connected; a failed probe is link loss.
    async fn health_check(&mut self, handle: &ConnectivityHandle, now: Instant) {
        let due = handle.with_state(|s| s.next_probe.is_none_or(|at| now >= at));
        if !due {
            return;
        }

        if self.control.probe().await {
            let signal = self.control.signal_dbm();
            let probe_at = now + self.probe_interval;
            handle.with_state(|s| {
                s.signal_dbm = signal;
                s.next_probe = Some(probe_at);
            });
        } else {
            log::warn!("Connectivity probe failed, treating as link loss");
            self.control.disassociate().await;
            handle.with_state(|s| {
                s.connected = false;
                s.link = LinkState::Disconnected;
                s.signal_dbm = None;
                s.next_probe = None;
            });
        }
    }

    async fn enter_fallback(&mut self, handle: &ConnectivityHandle) -> bool {
        log::warn!("Repeated reconnection failures, starting fallback access point");
        match self.control.start_access_point().await {
            Ok(()) => {
                handle.with_state(|s| {
                    s.fallback_active = true;
                    s.link = LinkState::FallbackAp;
                    s.retry_requested = false;
                });
                true
            }
            Err(err) => {
                log::error!("Fallback access point start failed: {err}");
                false
            }
        }
    }

    async fn leave_fallback(&mut self, handle: &ConnectivityHandle) {
        log::info!("Leaving fallback mode, retrying station link");
        self.control.stop_access_point().await;
        handle.with_state(|s| {
            s.fallback_active = false;
            s.link = LinkState::Disconnected;
            s.consecutive_failures = 0;
            s.backoff = self.policy.base;
            s.last_attempt = None;
        });
    }
}
