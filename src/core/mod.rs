//! The core module holds the device wrapper, error type and settings everything else builds on.

pub mod device;
pub mod error;
pub mod settings;
