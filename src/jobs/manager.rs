use chrono::Utc;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, RwLock};
use tracing::{error, info, warn};

use super::job::{BotJob, CreateJob, JobStatus, Platform};
use crate::bot::{BotSettings, BotStatus, JoinRequest, MeetingBot, Participant, StatusEvent};
use crate::browser::SandboxFactory;
use crate::nats::NatsClient;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JobError {
    #[error("Job {0} already exists")]
    Duplicate(String),

    #[error("Job {0} not found")]
    NotFound(String),
}

/// Runs bot jobs and keeps their state
#[derive(Clone)]
pub struct BotManager {
    jobs: Arc<RwLock<HashMap<String, BotJob>>>,
    bots: Arc<RwLock<HashMap<String, Arc<MeetingBot>>>>,
    sandboxes: Arc<dyn SandboxFactory>,
    settings: BotSettings,
    default_bot_name: String,
    publisher: Option<Arc<NatsClient>>,
}

impl BotManager {
    pub fn new(sandboxes: Arc<dyn SandboxFactory>, settings: BotSettings) -> Self {
        Self {
            jobs: Arc::new(RwLock::new(HashMap::new())),
            bots: Arc::new(RwLock::new(HashMap::new())),
            sandboxes,
            settings,
            default_bot_name: "Loqa Notetaker".to_string(),
            publisher: None,
        }
    }

    pub fn with_publisher(mut self, publisher: Arc<NatsClient>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    pub fn with_default_bot_name(mut self, name: impl Into<String>) -> Self {
        self.default_bot_name = name.into();
        self
    }

    /// Register a job and start its bot in the background
    pub async fn create_job(&self, request: CreateJob) -> Result<BotJob, JobError> {
        let id = request
            .job_id
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        let job = BotJob {
            id: id.clone(),
            meeting_url: request.meeting_url,
            platform: request.platform,
            bot_name: request
                .bot_name
                .unwrap_or_else(|| self.default_bot_name.clone()),
            status: JobStatus::Pending,
            error: None,
            started_at: Utc::now(),
            ended_at: None,
            audio_file_path: None,
            participants: Vec::new(),
        };

        {
            let mut jobs = self.jobs.write().await;
            if jobs.contains_key(&id) {
                return Err(JobError::Duplicate(id));
            }
            jobs.insert(id.clone(), job.clone());
        }

        info!("Created bot job {} for {}", id, job.meeting_url);

        let manager = self.clone();
        tokio::spawn(async move {
            manager.run_job(id).await;
        });

        Ok(job)
    }

    pub async fn get_job(&self, job_id: &str) -> Option<BotJob> {
        self.jobs.read().await.get(job_id).cloned()
    }

    pub async fn list_jobs(&self) -> Vec<BotJob> {
        let mut jobs: Vec<BotJob> = self.jobs.read().await.values().cloned().collect();
        jobs.sort_by_key(|job| job.started_at);
        jobs
    }

    /// Mark the job as stopped and make its bot leave
    ///
    /// A job stopped before its bot starts never joins.
    pub async fn stop_job(&self, job_id: &str) -> Result<BotJob, JobError> {
        let job = self
            .update(job_id, |job| {
                if job.status != JobStatus::Failed {
                    job.status = JobStatus::Failed;
                    job.error = Some("Stopped by user".to_string());
                    job.ended_at = Some(Utc::now());
                }
            })
            .await
            .ok_or_else(|| JobError::NotFound(job_id.to_string()))?;

        let bot = self.bots.write().await.remove(job_id);
        if let Some(bot) = bot {
            info!("Stopping bot job {}", job_id);
            bot.leave().await;
        }

        Ok(job)
    }

    async fn run_job(&self, job_id: String) {
        let Some(job) = self.get_job(&job_id).await else {
            return;
        };

        if !self.advance(&job_id, JobStatus::Joining).await {
            return;
        }

        if job.platform != Platform::GoogleMeet {
            self.fail(
                &job_id,
                format!("Platform {} not yet supported", job.platform.as_str()),
            )
            .await;
            return;
        }

        let (event_tx, mut event_rx) = mpsc::unbounded_channel::<StatusEvent>();
        let request = JoinRequest::new(job.meeting_url.clone(), job.bot_name.clone())
            .with_status_callback(Arc::new(move |event: &StatusEvent| {
                let _ = event_tx.send(event.clone());
            }));

        let forwarder = {
            let manager = self.clone();
            let job_id = job_id.clone();
            tokio::spawn(async move {
                while let Some(event) = event_rx.recv().await {
                    manager.on_bot_status(&job_id, event).await;
                }
            })
        };

        let bot = Arc::new(MeetingBot::new(
            request,
            self.settings.clone(),
            self.sandboxes.create(),
        ));
        self.bots
            .write()
            .await
            .insert(job_id.clone(), Arc::clone(&bot));

        // stop_job marks the job before removing the bot, so a stop that
        // raced the insert above is visible here
        if self.is_failed(&job_id).await {
            self.bots.write().await.remove(&job_id);
            return;
        }

        if let Err(e) = bot.join().await {
            self.bots.write().await.remove(&job_id);
            self.fail(&job_id, e.to_string()).await;
            return;
        }

        self.advance(&job_id, JobStatus::Recording).await;

        let result = bot.wait_for_end().await;
        self.bots.write().await.remove(&job_id);
        drop(bot);

        match result {
            Ok(path) => {
                info!("Bot job {} recorded {}", job_id, path.display());
                let status = self
                    .update(&job_id, |job| {
                        job.audio_file_path = Some(path.clone());
                        job.ended_at.get_or_insert_with(Utc::now);
                        if job.status != JobStatus::Failed {
                            job.status = JobStatus::Completed;
                        }
                    })
                    .await
                    .map_or(JobStatus::Completed, |job| job.status);
                self.report(
                    &job_id,
                    status.as_str(),
                    Some(json!({ "audioFilePath": path })),
                )
                .await;
            }
            Err(e) => self.fail(&job_id, e.to_string()).await,
        }

        // Remaining events drain once the bot's callback is dropped
        if let Err(e) = forwarder.await {
            warn!("Status forwarder for {} panicked: {}", job_id, e);
        }
    }

    async fn on_bot_status(&self, job_id: &str, event: StatusEvent) {
        if event.status == BotStatus::Participants {
            let participants = event
                .data
                .as_ref()
                .and_then(|data| data.get("participants"))
                .cloned()
                .and_then(|value| serde_json::from_value::<Vec<Participant>>(value).ok());
            if let Some(participants) = participants {
                self.update(job_id, |job| job.participants = participants)
                    .await;
            }
        }

        self.report(job_id, event.status.as_str(), event.data).await;
    }

    /// Move a live job to `status`; false once the job has failed or stopped
    async fn advance(&self, job_id: &str, status: JobStatus) -> bool {
        let mut advanced = false;
        self.update(job_id, |job| {
            if job.status != JobStatus::Failed {
                job.status = status;
                advanced = true;
            }
        })
        .await;

        if advanced {
            self.report(job_id, status.as_str(), None).await;
        }
        advanced
    }

    async fn is_failed(&self, job_id: &str) -> bool {
        self.get_job(job_id)
            .await
            .map_or(true, |job| job.status == JobStatus::Failed)
    }

    async fn fail(&self, job_id: &str, message: String) {
        error!("Bot job {} failed: {}", job_id, message);
        self.update(job_id, |job| {
            // The first failure reason wins, e.g. "Stopped by user"
            if job.status != JobStatus::Failed {
                job.status = JobStatus::Failed;
                job.error = Some(message.clone());
                job.ended_at = Some(Utc::now());
            }
        })
        .await;
        self.report(
            job_id,
            JobStatus::Failed.as_str(),
            Some(json!({ "error": message })),
        )
        .await;
    }

    async fn update(&self, job_id: &str, apply: impl FnOnce(&mut BotJob)) -> Option<BotJob> {
        let mut jobs = self.jobs.write().await;
        let job = jobs.get_mut(job_id)?;
        apply(job);
        Some(job.clone())
    }

    async fn report(&self, job_id: &str, status: &str, data: Option<Value>) {
        info!("Bot job {} status: {}", job_id, status);

        if let Some(publisher) = &self.publisher {
            if let Err(e) = publisher.publish_status(job_id, status, data).await {
                error!("Failed to publish status for {}: {:#}", job_id, e);
            }
        }
    }
}
