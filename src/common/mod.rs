// src/common/mod.rs
//! Shared types and error definitions.

pub mod error;

use core::cell::RefCell;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;

/// Shared mutable cell. Locked only for short synchronous sections and never
/// across a suspension point; see the concurrency notes in `dashboard`.
pub type SharedCell<T> = Mutex<CriticalSectionRawMutex, RefCell<T>>;

pub fn shared_cell<T>(value: T) -> SharedCell<T> {
    Mutex::new(RefCell::new(value))
}
