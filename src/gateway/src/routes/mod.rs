//! Route trees, split into the public (unauthenticated) surface and the
//! `/v1` core API.

pub mod api;
pub mod public;
