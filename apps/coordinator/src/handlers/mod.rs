//! HTTP handlers for the public REST surface (§6), grouped by route prefix
//! rather than by underlying domain object.

pub mod environments;
pub mod events;
pub mod executions;
pub mod repository;
pub mod sessions;
