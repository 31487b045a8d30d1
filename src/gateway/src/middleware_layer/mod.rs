//! Middleware layers applied to every request (§7, §6 observability).

pub mod error_handling;
pub mod logging;
