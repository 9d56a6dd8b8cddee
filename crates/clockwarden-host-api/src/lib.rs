//! Capability interfaces for clockwarden
//!
//! This crate defines the boundary between the enforcement engine and the
//! outside world: the remote timekeeping service and the desktop lock.
//! It contains no platform or network code itself.

mod mock;
mod traits;

pub use mock::*;
pub use traits::*;
