#![warn(missing_docs)]
//! filegate-bot
//!
//! A Telegram bot that hands out files from a static catalog to users who
//! have joined the required channels. Files are relayed either from a direct
//! download link or from a stored Telegram file reference and are removed
//! from the chat after a fixed delay.

/// Telegram adapter: commands, callbacks, views and the teloxide transport
pub mod bot;
/// Catalog of deliverable files
pub mod catalog;
/// Required channel parsing and lookup
pub mod channels;
/// Configuration management
pub mod config;
/// File delivery pipeline
pub mod delivery;
/// Direct-link downloads into temporary files
pub mod fetch;
/// Channel membership checks
pub mod gate;
/// Liveness HTTP endpoint
pub mod health;
/// Pending batch requests awaiting a membership re-check
pub mod pending;
/// Inbound command and callback dispatch
pub mod router;
/// Deferred deletion of sent messages
pub mod scheduler;
/// Transport-agnostic chat operations
pub mod transport;
pub mod utils;
