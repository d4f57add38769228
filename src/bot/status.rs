use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::info;

/// Bot state transitions reported to collaborators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BotStatus {
    Navigating,
    Joining,
    Waiting,
    Joined,
    AudioCaptureStarted,
    CaptionsEnabled,
    Participants,
    AloneTimeout,
    MaxDurationReached,
    Ended,
    Error,
}

impl BotStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BotStatus::Navigating => "navigating",
            BotStatus::Joining => "joining",
            BotStatus::Waiting => "waiting",
            BotStatus::Joined => "joined",
            BotStatus::AudioCaptureStarted => "audio_capture_started",
            BotStatus::CaptionsEnabled => "captions_enabled",
            BotStatus::Participants => "participants",
            BotStatus::AloneTimeout => "alone_timeout",
            BotStatus::MaxDurationReached => "max_duration_reached",
            BotStatus::Ended => "ended",
            BotStatus::Error => "error",
        }
    }
}

impl std::fmt::Display for BotStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of the status log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusEvent {
    pub status: BotStatus,

    /// Optional structured payload (participants, error message, ...)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,

    pub timestamp: DateTime<Utc>,
}

/// A meeting participant as seen in the page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub display_name: String,
    #[serde(default)]
    pub is_host: bool,
}

pub type StatusCallback = Arc<dyn Fn(&StatusEvent) + Send + Sync>;

/// Fan-out point for status events
///
/// Emission never blocks and never fails; a missing callback just means the
/// event is only logged.
#[derive(Clone, Default)]
pub struct StatusEmitter {
    callback: Option<StatusCallback>,
}

impl StatusEmitter {
    pub fn new(callback: Option<StatusCallback>) -> Self {
        Self { callback }
    }

    pub fn emit(&self, status: BotStatus, data: Option<Value>) {
        match &data {
            Some(data) => info!("Bot status: {} {}", status, data),
            None => info!("Bot status: {}", status),
        }

        if let Some(callback) = &self.callback {
            let event = StatusEvent {
                status,
                data,
                timestamp: Utc::now(),
            };
            callback(&event);
        }
    }
}

impl std::fmt::Debug for StatusEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusEmitter")
            .field("has_callback", &self.callback.is_some())
            .finish()
    }
}
