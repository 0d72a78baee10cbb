pub mod bootstrap;
pub mod config;
pub mod repositories;
pub mod services;
pub mod state;
pub mod telemetry;
