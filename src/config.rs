use anyhow::Result;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::bot::{BotSettings, CaptureSettings, JoinTimings, MonitorSettings, SelectorProfile};
use crate::browser::chromium::BrowserSettings;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub service: ServiceConfig,
    pub browser: BrowserSettings,
    pub join: JoinConfig,
    pub recording: RecordingConfig,
    pub monitor: MonitorConfig,
    pub nats: NatsConfig,
    /// Replaces the built-in selector profile when set
    pub selectors: Option<SelectorProfile>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
    /// Display name used when a request does not give one
    pub default_bot_name: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "loqa-meetbot".to_string(),
            http: HttpConfig::default(),
            default_bot_name: "Loqa Notetaker".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 3939,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct JoinConfig {
    pub settle_ms: u64,
    pub name_entry_ms: u64,
    pub post_click_ms: u64,
    pub waiting_room_timeout_secs: u64,
    pub confirmation_timeout_secs: u64,
    pub poll_interval_ms: u64,
}

impl Default for JoinConfig {
    fn default() -> Self {
        let timings = JoinTimings::default();
        Self {
            settle_ms: timings.settle_delay.as_millis() as u64,
            name_entry_ms: timings.name_entry_delay.as_millis() as u64,
            post_click_ms: timings.post_click_delay.as_millis() as u64,
            waiting_room_timeout_secs: timings.waiting_room_timeout.as_secs(),
            confirmation_timeout_secs: timings.confirmation_timeout.as_secs(),
            poll_interval_ms: timings.poll_interval.as_millis() as u64,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RecordingConfig {
    pub output_dir: PathBuf,
    pub chunk_interval_ms: u64,
    pub mime_type: String,
    pub stop_grace_ms: u64,
    pub enable_captions: bool,
    pub max_duration_secs: u64,
    pub leave_settle_ms: u64,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        let capture = CaptureSettings::default();
        let bot = BotSettings::default();
        Self {
            output_dir: capture.output_dir,
            chunk_interval_ms: capture.chunk_interval.as_millis() as u64,
            mime_type: capture.mime_type,
            stop_grace_ms: capture.stop_grace.as_millis() as u64,
            enable_captions: capture.enable_captions,
            max_duration_secs: bot.max_duration.as_secs(),
            leave_settle_ms: bot.leave_settle.as_millis() as u64,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub end_poll_secs: u64,
    pub roster_poll_secs: u64,
    pub alone_threshold: u32,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        let monitor = MonitorSettings::default();
        Self {
            end_poll_secs: monitor.end_poll_interval.as_secs(),
            roster_poll_secs: monitor.roster_poll_interval.as_secs(),
            alone_threshold: monitor.alone_threshold,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NatsConfig {
    /// Publish status events to NATS
    pub enabled: bool,
    pub url: String,
}

impl Default for NatsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: "nats://localhost:4222".to_string(),
        }
    }
}

impl Config {
    /// Load from an optional config file, overridden by env vars such as
    /// `MEETBOT_SERVICE__HTTP__PORT`
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(config::Environment::with_prefix("MEETBOT").separator("__"))
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    pub fn bot_settings(&self) -> BotSettings {
        BotSettings {
            selectors: self.selectors.clone().unwrap_or_default(),
            join: JoinTimings {
                settle_delay: Duration::from_millis(self.join.settle_ms),
                name_entry_delay: Duration::from_millis(self.join.name_entry_ms),
                post_click_delay: Duration::from_millis(self.join.post_click_ms),
                waiting_room_timeout: Duration::from_secs(self.join.waiting_room_timeout_secs),
                confirmation_timeout: Duration::from_secs(self.join.confirmation_timeout_secs),
                poll_interval: Duration::from_millis(self.join.poll_interval_ms.max(1)),
            },
            capture: CaptureSettings {
                output_dir: self.recording.output_dir.clone(),
                chunk_interval: Duration::from_millis(self.recording.chunk_interval_ms),
                mime_type: self.recording.mime_type.clone(),
                stop_grace: Duration::from_millis(self.recording.stop_grace_ms),
                enable_captions: self.recording.enable_captions,
            },
            monitor: MonitorSettings {
                end_poll_interval: Duration::from_secs(self.monitor.end_poll_secs.max(1)),
                roster_poll_interval: Duration::from_secs(self.monitor.roster_poll_secs.max(1)),
                alone_threshold: self.monitor.alone_threshold,
            },
            max_duration: Duration::from_secs(self.recording.max_duration_secs),
            leave_settle: Duration::from_millis(self.recording.leave_settle_ms),
        }
    }
}
