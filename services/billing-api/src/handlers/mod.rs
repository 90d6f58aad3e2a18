//! REST API handlers

pub mod checkout;
pub mod health;
pub mod profile;
pub mod webhook;

pub use checkout::*;
pub use health::*;
pub use profile::*;
pub use webhook::*;
