//! HTTP and WebSocket request handlers
//!
//! - `api` - Health check endpoint
//! - `checkin` - Check-in submission
//! - `report` - Report generation and download
//! - `ws` - Browser relays for check-ins and calls

pub mod api;
pub mod checkin;
pub mod report;
pub mod ws;

pub use ws::{ws_call_handler, ws_checkin_handler};
