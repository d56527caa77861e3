/// State management module
///
/// This module handles all application state, including:
/// - Persisted user configuration (config.rs)
/// - Shared data structures (data.rs)

pub mod config;
pub mod data;
