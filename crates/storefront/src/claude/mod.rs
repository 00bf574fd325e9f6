//! Claude API integration for delivery distance estimation.
//!
//! The distance resolver asks Claude for the driving distance between the
//! farm and a customer address, forcing a single `report_distance` tool call
//! so the answer comes back as structured JSON rather than prose.

pub mod client;
pub mod distance;
pub mod error;
pub mod types;

pub use client::ClaudeClient;
pub use distance::ClaudeDistanceResolver;
pub use error::ClaudeError;
