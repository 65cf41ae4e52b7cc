//! Topic handling module
//!
//! This module provides the device topic namespace (`{prefix}/{device_id}/{kind}`),
//! subscription pattern parsing and MQTT wildcard matching used to route
//! inbound messages to registered callbacks.

// Submodules
pub mod error;
pub mod namespace;
pub mod topic_matcher;
pub mod topic_pattern_item;

#[cfg(test)]
mod topic_matcher_tests;

// Re-export commonly used types for convenience
pub use error::{TopicError, TopicResult, limits, validation};
pub use namespace::{TopicKind, TopicNamespace};
pub use topic_matcher::{TopicPattern, matches};
pub use topic_pattern_item::{TopicPatternError, TopicPatternItem};
