//! Facial expression ingress (Hume streaming face model).

mod adapter;
mod config;
pub mod messages;

pub use adapter::FacialAdapter;
pub use config::FacialConfig;
pub use messages::{FacialUpdate, FrameRequest, HUME_STREAM_WEBSOCKET_URL, interpret_response};
