//! HTTP route handlers.

pub mod diagnostics;
pub mod forecast;
pub mod health;
