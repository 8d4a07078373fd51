//! Shared types for the airwaves radio browser: station records, renderer
//! commands, host player messages, configuration and platform paths.

pub mod config;
pub mod platform;
pub mod protocol;
pub mod regions;
