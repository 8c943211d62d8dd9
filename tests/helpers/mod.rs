//! Shared fixtures for the integration tests.

pub mod counting_bodies;
pub mod diagnostic_helpers;
pub mod session_fixtures;
