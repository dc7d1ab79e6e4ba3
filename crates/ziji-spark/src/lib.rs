//! Spark adapters: text-to-image over HTTP and chat over websocket.
//!
//! Both APIs authenticate with the signed URL built by `ziji_core::signing`.

pub mod chat;
pub mod image_client;

pub use chat::SparkChatClient;
pub use image_client::SparkImageClient;
