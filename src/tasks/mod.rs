// src/tasks/mod.rs
//! Embassy task entry points. Each loop is a thin timing shell over the
//! mechanisms in `scheduler`, `render` and `net`; all of them wind down when
//! the dashboard's running flag clears.

pub mod network_task;
pub mod pull_task;
pub mod render_task;

pub use network_task::network_task;
pub use pull_task::pull_task;
pub use render_task::render_task;
