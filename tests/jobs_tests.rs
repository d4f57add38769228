// Integration tests for the bot job manager

mod common;

use anyhow::Result;
use common::{meeting_page, test_settings, FakeSandboxFactory};
use loqa_meetbot::jobs::{BotManager, CreateJob, JobError, JobStatus, Platform};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn create(job_id: &str, platform: Platform) -> CreateJob {
    CreateJob {
        job_id: Some(job_id.to_string()),
        meeting_url: "https://meet.google.com/abc-defg-hij".to_string(),
        platform,
        bot_name: None,
    }
}

async fn wait_for_status(manager: &BotManager, job_id: &str, status: JobStatus) {
    for _ in 0..600 {
        if manager.get_job(job_id).await.map(|job| job.status) == Some(status) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    panic!("job {} never reached {:?}", job_id, status);
}

#[tokio::test(start_paused = true)]
async fn test_job_records_until_stopped() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let settings = test_settings(temp_dir.path());
    let page = meeting_page(&settings);
    page.set_roster(json!([{ "displayName": "Ada", "isHost": false }]));

    let manager = BotManager::new(
        Arc::new(FakeSandboxFactory {
            page: Arc::clone(&page),
        }),
        settings,
    )
    .with_default_bot_name("Scribe");

    let job = manager.create_job(create("job-1", Platform::GoogleMeet)).await?;
    assert_eq!(job.status, JobStatus::Pending);
    assert_eq!(job.bot_name, "Scribe");

    wait_for_status(&manager, "job-1", JobStatus::Recording).await;
    page.send_chunk(b"speech");

    // Let one roster snapshot through
    tokio::time::sleep(Duration::from_secs(61)).await;
    let job = manager.get_job("job-1").await.unwrap();
    assert_eq!(job.participants.len(), 1);
    assert_eq!(job.participants[0].display_name, "Ada");

    let stopped = manager.stop_job("job-1").await?;
    assert_eq!(stopped.status, JobStatus::Failed);
    assert_eq!(stopped.error.as_deref(), Some("Stopped by user"));

    // The recording so far is still attached to the job
    for _ in 0..100 {
        if manager.get_job("job-1").await.unwrap().audio_file_path.is_some() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    let job = manager.get_job("job-1").await.unwrap();
    let path = job.audio_file_path.expect("audio file path");
    assert_eq!(std::fs::read(path)?, b"speech");
    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.ended_at.is_some());

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_job_completes_when_meeting_ends() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let settings = test_settings(temp_dir.path());
    let page = meeting_page(&settings);
    let end_marker = settings.selectors.end_markers[0].clone();

    let manager = BotManager::new(
        Arc::new(FakeSandboxFactory {
            page: Arc::clone(&page),
        }),
        settings,
    );

    manager.create_job(create("job-2", Platform::GoogleMeet)).await?;
    wait_for_status(&manager, "job-2", JobStatus::Recording).await;

    page.show(end_marker);
    wait_for_status(&manager, "job-2", JobStatus::Completed).await;

    let job = manager.get_job("job-2").await.unwrap();
    assert!(job.audio_file_path.is_some());
    assert!(job.error.is_none());

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_join_failure_marks_job_failed() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let settings = test_settings(temp_dir.path());
    let page = meeting_page(&settings);
    page.hide(&settings.selectors.in_meeting[0]);

    let manager = BotManager::new(Arc::new(FakeSandboxFactory { page }), settings);

    manager.create_job(create("job-3", Platform::GoogleMeet)).await?;
    wait_for_status(&manager, "job-3", JobStatus::Failed).await;

    let job = manager.get_job("job-3").await.unwrap();
    assert!(job.error.unwrap().contains("30s"));
    assert!(job.audio_file_path.is_none());

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_unsupported_platform_fails() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let settings = test_settings(temp_dir.path());
    let page = meeting_page(&settings);
    let manager = BotManager::new(
        Arc::new(FakeSandboxFactory {
            page: Arc::clone(&page),
        }),
        settings,
    );

    manager.create_job(create("job-4", Platform::Zoom)).await?;
    wait_for_status(&manager, "job-4", JobStatus::Failed).await;

    let job = manager.get_job("job-4").await.unwrap();
    assert_eq!(job.error.as_deref(), Some("Platform zoom not yet supported"));
    assert!(page.navigated().is_empty());

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_duplicate_and_unknown_jobs() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let settings = test_settings(temp_dir.path());
    let page = meeting_page(&settings);
    let manager = BotManager::new(Arc::new(FakeSandboxFactory { page }), settings);

    manager.create_job(create("job-5", Platform::Teams)).await?;
    assert_eq!(
        manager
            .create_job(create("job-5", Platform::Teams))
            .await
            .unwrap_err(),
        JobError::Duplicate("job-5".to_string())
    );
    assert_eq!(
        manager.stop_job("missing").await.unwrap_err(),
        JobError::NotFound("missing".to_string())
    );
    assert!(manager.get_job("missing").await.is_none());
    assert_eq!(manager.list_jobs().await.len(), 1);

    Ok(())
}
