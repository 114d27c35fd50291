//! # Core Runtime Module
//!
//! Foundational runtime infrastructure shared by the playback crates:
//! - Logging and tracing setup
//! - Configuration with fail-fast bridge validation
//! - Typed event bus
//!
//! ## Overview
//!
//! Nothing here knows about queues or engines. It establishes the logging
//! conventions, the configuration surface hosts fill in, and the broadcast
//! channel UI layers listen on.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use config::{CoreConfig, CoreConfigBuilder, FeatureFlags};
pub use error::{Error, Result};
pub use events::{CoreEvent, EventBus, EventStream};
