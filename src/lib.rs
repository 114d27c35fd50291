//! Workspace facade crate.
//!
//! Re-exports [`core_service`] so host applications can depend on
//! `playback-workspace` alone instead of wiring each crate individually.

pub use core_service::*;
