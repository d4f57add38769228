pub mod audio;
pub mod bot;
pub mod browser;
pub mod config;
pub mod error;
pub mod http;
pub mod jobs;
pub mod nats;

pub use audio::{AudioCapture, AudioSink, BridgeMessage};
pub use bot::{
    BotSettings, BotStatus, EndReason, JoinRequest, MeetingBot, Participant, SelectorProfile,
    StatusEvent,
};
pub use browser::{ChromiumSandbox, ChromiumSandboxFactory, Locator, PageDriver, Sandbox, SandboxFactory};
pub use config::Config;
pub use error::{BotError, JoinFailure};
pub use http::{create_router, AppState};
pub use jobs::{BotJob, BotManager, CreateJob, JobStatus, Platform};
pub use nats::{NatsClient, StatusEventMessage};
