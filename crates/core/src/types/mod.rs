//! Core types for Mbuli's Feast.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod id;
pub mod money;
pub mod status;

pub use id::*;
pub use money::{MoneyError, Tzs};
pub use status::*;
