//! Mbuli Core - Shared domain types.
//!
//! This crate provides the types shared by every Mbuli's Feast component:
//! - `storefront` - Customer shop, checkout, admin and delivery JSON API
//! - `cli` - Migrations and catalogue seeding
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no database access,
//! no HTTP clients. Database encoding is available behind the `postgres`
//! feature.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for IDs, money, and statuses

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
