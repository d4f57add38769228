use anyhow::{Context, Result};
use async_nats::Client;
use tracing::{debug, info};

use super::messages::StatusEventMessage;

pub struct NatsClient {
    client: Client,
}

impl NatsClient {
    /// Connect to NATS server
    pub async fn connect(url: &str) -> Result<Self> {
        info!("Connecting to NATS at {}", url);

        let client = async_nats::connect(url)
            .await
            .context("Failed to connect to NATS")?;

        info!("Connected to NATS successfully");

        Ok(Self { client })
    }

    pub fn status_subject(job_id: &str) -> String {
        format!("meetbot.status.{}", job_id)
    }

    /// Publish a status event for a job
    pub async fn publish_status(
        &self,
        job_id: &str,
        status: &str,
        data: Option<serde_json::Value>,
    ) -> Result<()> {
        let subject = Self::status_subject(job_id);

        let message = StatusEventMessage {
            job_id: job_id.to_string(),
            status: status.to_string(),
            data,
            timestamp: chrono::Utc::now().to_rfc3339(),
        };

        let payload = serde_json::to_vec(&message)?;

        self.client
            .publish(subject.clone(), payload.into())
            .await
            .context("Failed to publish status event")?;

        debug!("Published {} to {}", status, subject);

        Ok(())
    }

    /// Flush pending messages
    pub async fn close(&self) -> Result<()> {
        info!("Closing NATS connection");
        self.client
            .flush()
            .await
            .context("Failed to flush NATS connection")?;
        Ok(())
    }
}
