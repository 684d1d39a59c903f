/// Database configuration and connection management
pub mod database;

/// Application settings loading from config.toml and the environment
pub mod settings;
