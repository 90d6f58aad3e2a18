//! Tollgate Types - Shared domain types
//!
//! This crate contains domain types used across Tollgate services:
//! - Subscriber and plan identity
//! - Operational alerts

pub mod alert;
pub mod ids;

pub use alert::*;
pub use ids::*;
