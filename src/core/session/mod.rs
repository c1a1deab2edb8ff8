//! Session orchestration for check-ins and video calls.
//!
//! A session is one task that owns its [`AggregationStore`], its adapters
//! and its timers:
//!
//! ```text
//!   SessionCommand ──┐
//!                    ├──▶ CheckinOrchestrator::run ──▶ SessionEvent
//!   IngressEvent  ───┤           │
//!   countdown tick ──┘           └──▶ CheckinSink (once, on finish)
//! ```
//!
//! [`AggregationStore`]: crate::core::aggregation::AggregationStore

use std::time::Duration;

use crate::core::emotion::{DEFAULT_LEVELS, StabilityConfig};

pub mod adapters;
pub mod call;
pub mod checkin;
pub mod error;
pub mod events;
pub mod overlay;
pub mod submission;

pub use adapters::{AdapterFactory, ConnectOutcome, VendorAdapterFactory};
pub use call::{CallOrchestrator, CallPhase, CallSession};
pub use checkin::{CheckinOrchestrator, CheckinPhase};
pub use error::{SessionError, SessionResult};
pub use events::{CallCommand, SessionCommand, SessionEvent};
pub use overlay::{EmotionOverlay, OverlayState};
pub use submission::{CheckinSink, CheckinSubmission};

/// Default check-in length.
pub const DEFAULT_CHECKIN_DURATION: Duration = Duration::from_secs(60);

/// Timing and display knobs for a session.
#[derive(Debug, Clone, Copy)]
pub struct SessionOptions {
    pub duration: Duration,
    pub tick: Duration,
    pub levels: u32,
    pub stability: StabilityConfig,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            duration: DEFAULT_CHECKIN_DURATION,
            tick: Duration::from_secs(1),
            levels: DEFAULT_LEVELS,
            stability: StabilityConfig::default(),
        }
    }
}
