// ABOUTME: Library root for productionapp - the Deployment resource and everything around it.
// ABOUTME: The main binary is in main.rs.

pub mod config;
pub mod diagnostics;
pub mod engine;
pub mod error;
pub mod names;
pub mod output;
pub mod platform;
pub mod resource;
pub mod store;
pub mod types;
