//! Player status telemetry
//!
//! A polling task reads the player status on a fixed cadence and a throttle
//! decides, per poll, between a full state update, a position-only update
//! and nothing.

pub mod config;
pub mod publisher;
pub mod throttle;

pub use config::StatusPublisherConfig;
pub use publisher::{STOP_TIMEOUT, StatusPublisher};
pub use throttle::{StatusThrottle, UpdateDecision};
