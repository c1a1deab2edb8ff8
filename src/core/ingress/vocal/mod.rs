//! Vocal ingress (Hume EVI prosody and conversation).

mod adapter;
mod config;
pub mod messages;

pub use adapter::VocalAdapter;
pub use config::VocalConfig;
pub use messages::{AudioEncoding, EVIServerMessage, HUME_EVI_WEBSOCKET_URL};
