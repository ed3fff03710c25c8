//! Data models for the registry, its sources, and configuration.

pub mod config;
pub mod record;
pub mod status;
