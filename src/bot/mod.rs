//! Meeting bot
//!
//! This module provides the `MeetingBot` that manages one meeting attendance:
//! - Join flow (name entry, device mute, join button, waiting room)
//! - Audio capture through the page bridge
//! - Meeting monitoring (end markers, solitude, roster)
//! - Once-only teardown on every exit path

pub mod config;
pub mod join;
pub mod monitor;
pub mod selectors;
mod session;
pub mod status;

pub use config::{BotSettings, CaptureSettings, JoinRequest, JoinTimings, MonitorSettings};
pub use monitor::{MonitorOutcome, SolitudeTracker};
pub use selectors::SelectorProfile;
pub use session::{EndReason, MeetingBot};
pub use status::{BotStatus, Participant, StatusCallback, StatusEmitter, StatusEvent};
