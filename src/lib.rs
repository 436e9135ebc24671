//! Health monitor for the GridPulse EV-charging admin API fleet.

pub mod api;
pub mod config;
pub mod engine;
pub mod models;
pub mod probe;
