//! Vendor ingress adapters.
//!
//! ```text
//!            ┌──────────────┐   frames    ┌─────────────────────┐
//! browser ──▶│ CaptureInput │────────────▶│ FacialAdapter (Hume)│──┐
//!            │              │   audio     ├─────────────────────┤  │ IngressEvent
//!            │              │────────────▶│ VocalAdapter (EVI)  │──┼──────────▶ session loop
//!            └──────────────┘             ├─────────────────────┤  │
//!                                         │ DemoAdapter         │──┘
//!                                         └─────────────────────┘
//! ```
//!
//! Vendor adapters reconnect under a [`ReconnectPolicy`]. A rejected
//! credential surfaces as [`FailureKind::Authentication`] and the session
//! swaps that channel for a [`DemoAdapter`].

pub mod base;
pub mod capture;
pub mod demo;
pub mod facial;
pub(crate) mod supervisor;
pub mod vocal;

pub use base::{
    AdapterStatus, BoxedAdapter, CaptureInput, FailureKind, IngressAdapter, IngressError,
    IngressEvent, IngressResult, ReconnectPolicy, TranscriptRole,
};
pub use capture::{AudioChunker, FrameSlot};
pub use demo::{DEFAULT_DEMO_INTERVAL, DemoAdapter};
pub use facial::{FacialAdapter, FacialConfig};
pub use vocal::{VocalAdapter, VocalConfig};
