use std::path::PathBuf;
use std::time::Duration;

use super::selectors::SelectorProfile;
use super::status::StatusCallback;

/// What to join and who to be
#[derive(Clone)]
pub struct JoinRequest {
    /// Meeting URL, treated as opaque
    pub meeting_url: String,

    /// Display name shown to other participants
    pub bot_name: String,

    /// Optional observer for status events
    pub on_status_change: Option<StatusCallback>,
}

impl JoinRequest {
    pub fn new(meeting_url: impl Into<String>, bot_name: impl Into<String>) -> Self {
        Self {
            meeting_url: meeting_url.into(),
            bot_name: bot_name.into(),
            on_status_change: None,
        }
    }

    pub fn with_status_callback(mut self, callback: StatusCallback) -> Self {
        self.on_status_change = Some(callback);
        self
    }
}

impl std::fmt::Debug for JoinRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JoinRequest")
            .field("meeting_url", &self.meeting_url)
            .field("bot_name", &self.bot_name)
            .finish()
    }
}

/// Delays and deadlines of the join flow
#[derive(Debug, Clone)]
pub struct JoinTimings {
    /// Pause after navigation for client-side rendering to settle
    pub settle_delay: Duration,

    /// Pause after typing the display name
    pub name_entry_delay: Duration,

    /// Pause after clicking the join button
    pub post_click_delay: Duration,

    /// How long the host may keep the bot in the waiting room
    pub waiting_room_timeout: Duration,

    /// How long to wait for an in-meeting indicator
    pub confirmation_timeout: Duration,

    /// Poll interval while waiting for elements to appear or vanish
    pub poll_interval: Duration,
}

impl Default for JoinTimings {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_secs(3),
            name_entry_delay: Duration::from_millis(500),
            post_click_delay: Duration::from_secs(5),
            waiting_room_timeout: Duration::from_secs(5 * 60),
            confirmation_timeout: Duration::from_secs(30),
            poll_interval: Duration::from_millis(500),
        }
    }
}

/// Audio capture settings
#[derive(Debug, Clone)]
pub struct CaptureSettings {
    /// Directory receiving `meeting-*.webm` files
    pub output_dir: PathBuf,

    /// Encoder timeslice; also the most audio lost on a crash
    pub chunk_interval: Duration,

    pub mime_type: String,

    /// How long stop() waits for the encoder's final flush
    pub stop_grace: Duration,

    /// Try to switch on live captions after capture starts
    pub enable_captions: bool,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            output_dir: std::env::temp_dir(),
            chunk_interval: Duration::from_secs(1),
            mime_type: "audio/webm;codecs=opus".to_string(),
            stop_grace: Duration::from_secs(2),
            enable_captions: true,
        }
    }
}

/// Meeting monitor cadence
#[derive(Debug, Clone)]
pub struct MonitorSettings {
    /// End-marker and solitude check interval
    pub end_poll_interval: Duration,

    /// Roster snapshot interval
    pub roster_poll_interval: Duration,

    /// Consecutive alone checks before leaving
    pub alone_threshold: u32,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            end_poll_interval: Duration::from_secs(10),
            roster_poll_interval: Duration::from_secs(60),
            alone_threshold: 3,
        }
    }
}

/// Everything a [`MeetingBot`](super::MeetingBot) needs besides the request
#[derive(Debug, Clone)]
pub struct BotSettings {
    pub selectors: SelectorProfile,
    pub join: JoinTimings,
    pub capture: CaptureSettings,
    pub monitor: MonitorSettings,

    /// Hard cap on session length, counted from the start of recording
    pub max_duration: Duration,

    /// Pause after clicking "leave" before tearing down
    pub leave_settle: Duration,
}

impl Default for BotSettings {
    fn default() -> Self {
        Self {
            selectors: SelectorProfile::default(),
            join: JoinTimings::default(),
            capture: CaptureSettings::default(),
            monitor: MonitorSettings::default(),
            max_duration: Duration::from_secs(4 * 60 * 60), // 4 hours
            leave_settle: Duration::from_secs(2),
        }
    }
}
