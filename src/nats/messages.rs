use serde::{Deserialize, Serialize};

/// Status event published to NATS for one bot job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusEventMessage {
    pub job_id: String,
    /// Bot status ("joined", "ended", ...) or job status ("recording", "failed", ...)
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    pub timestamp: String, // RFC3339 timestamp
}
