//! Core domain + application logic for the ziji chat bot.
//!
//! This crate is framework-agnostic. Telegram, DeepSeek and Spark live behind
//! ports (traits) implemented in adapter crates.

pub mod backend;
pub mod cleanup;
pub mod config;
pub mod delivery;
pub mod domain;
pub mod endpoint;
pub mod errors;
pub mod formatting;
pub mod imaging;
pub mod logging;
pub mod messaging;
pub mod segment;
pub mod signing;
pub mod store;

pub use errors::{Error, Result};
