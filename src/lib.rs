// Core modules
pub mod bot;
pub mod config;
pub mod error;
pub mod exchange;
pub mod execution;
pub mod indicators;
pub mod models;
pub mod notifier;
pub mod router;
pub mod settings;
pub mod strategy;
pub mod telegram;
pub mod trader;

// Re-export commonly used types
pub use config::Config;
pub use error::{BotError, Result};
pub use models::*;
