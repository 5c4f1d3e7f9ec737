//! Common types and utilities for RangeDesk
//!
//! This crate provides shared types and helpers used across
//! all RangeDesk crates.
//!
//! # Modules
//!
//! - [`types`] - Shared domain types (Ticker, Side)
//! - [`numeric`] - Sanitising helpers for feed-supplied floats

pub mod numeric;
pub mod types;

pub use numeric::{finite, finite_opt};
pub use types::*;
