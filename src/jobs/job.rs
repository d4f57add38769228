use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::bot::Participant;

/// Meeting provider
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    #[default]
    GoogleMeet,
    Zoom,
    Teams,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::GoogleMeet => "google_meet",
            Platform::Zoom => "zoom",
            Platform::Teams => "teams",
        }
    }
}

/// Lifecycle of a bot job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Joining,
    Recording,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Joining => "joining",
            JobStatus::Recording => "recording",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }
}

/// Request to send a bot into a meeting
#[derive(Debug, Clone, Deserialize)]
pub struct CreateJob {
    /// Optional job ID (if not provided, generate UUID)
    #[serde(default)]
    pub job_id: Option<String>,

    pub meeting_url: String,

    #[serde(default)]
    pub platform: Platform,

    /// Display name (service default when omitted)
    #[serde(default)]
    pub bot_name: Option<String>,
}

/// One bot attendance as seen by collaborators
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotJob {
    pub id: String,
    pub meeting_url: String,
    pub platform: Platform,
    pub bot_name: String,
    pub status: JobStatus,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    pub started_at: DateTime<Utc>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_file_path: Option<PathBuf>,

    /// Latest roster snapshot
    #[serde(default)]
    pub participants: Vec<Participant>,
}
