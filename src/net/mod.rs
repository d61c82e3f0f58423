// src/net/mod.rs
//! Network-facing seams: the data source client used by pulls, the reqwless
//! production client, and the connectivity supervisor that owns the link
//! state machine.

pub mod client;
pub mod http;
pub mod supervisor;

pub use client::{DataSource, fetch_json_with_retry};
pub use supervisor::{
    ConnectivityHandle, ConnectivitySnapshot, ConnectivitySupervisor, LinkState, NetworkControl,
};
