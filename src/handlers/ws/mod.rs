//! Browser WebSocket relays
//!
//! Both sockets speak the same shape of protocol:
//!
//! ## Client → Server
//!
//! - JSON text frames tagged by `type` ([`messages`])
//! - Binary frames: microphone audio, forwarded to the vocal adapter
//!
//! ## Server → Client
//!
//! - JSON session events: `phase`, `call_phase`, `countdown`, `emotion`,
//!   `cleared`, `adapter_status`, `demo_mode`, `transcript`,
//!   `assistant_audio`, `summary`, `submitted`, `submission_failed`, `error`

mod call;
mod checkin;
pub mod messages;
mod relay;

pub use call::ws_call_handler;
pub use checkin::ws_checkin_handler;
pub use relay::{RelayProtocol, run_relay};
