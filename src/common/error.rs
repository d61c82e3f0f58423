// src/common/error.rs
use thiserror::Error;

/// Fetch failures surfaced by the data source client. Recoverable: the pull
/// scheduler retries on the next interval and disables the widget only after
/// its error budget is exhausted.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("request timed out")]
    Timeout,

    #[error("endpoint unreachable")]
    Unreachable,

    #[error("endpoint rejected the request")]
    Rejected,

    #[error("malformed response")]
    MalformedResponse,

    #[error("widget does not support pull")]
    Unsupported,
}

impl FetchError {
    /// Transient conditions are worth an immediate bounded retry; everything
    /// else is surfaced to the scheduler on the first occurrence.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout | Self::Unreachable)
    }
}

/// Widget-local drawing fault. Caught per widget by the render cycle and
/// treated as "rendered nothing"; never fatal to the frame.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    #[error("missing data field: {0}")]
    MissingField(&'static str),

    #[error("region too small")]
    RegionTooSmall,

    #[error("frame sink rejected the frame")]
    SinkRejected,
}

/// Widget instantiation/configuration failures. The affected widget is
/// omitted from the screen; the rest of the dashboard starts normally.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("unknown widget: {0}")]
    UnknownWidget(alloc::string::String),

    #[error("invalid configuration: {0}")]
    Invalid(&'static str),

    #[error("widget init failed")]
    Init,
}

/// Link-layer failures. Drive the connectivity state machine only; widgets
/// observe them solely through the boolean online gate.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectivityError {
    #[error("association failed")]
    AssociationFailed,

    #[error("association timed out")]
    Timeout,

    #[error("no credentials configured")]
    NoCredentials,

    #[error("access point start failed")]
    AccessPointFailed,
}

/// Fatal startup failures. Surfaced once from `Dashboard::build`/`start`;
/// restart policy is the outer supervisor's concern.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DashboardError {
    #[error("no widgets could be instantiated")]
    NoWidgets,

    #[error("no screens configured")]
    NoScreens,

    #[error("widget table full")]
    TooManyWidgets,

    #[error("screen table full")]
    TooManyScreens,

    #[error("failed to spawn task: {0}")]
    TaskSpawn(&'static str),
}

pub type Result<T, E = DashboardError> = core::result::Result<T, E>;
