use loqa_meetbot::nats::{NatsClient, StatusEventMessage};
use serde_json::json;

#[test]
fn test_status_event_serialization() {
    let msg = StatusEventMessage {
        job_id: "job-1".to_string(),
        status: "audio_capture_started".to_string(),
        data: Some(json!({ "audioFilePath": "/tmp/meeting-1.webm" })),
        timestamp: "2025-10-27T14:30:00Z".to_string(),
    };

    let json = serde_json::to_string(&msg).unwrap();
    assert!(json.contains("\"job_id\":\"job-1\""));
    assert!(json.contains("audio_capture_started"));
    assert!(json.contains("audioFilePath"));

    let deserialized: StatusEventMessage = serde_json::from_str(&json).unwrap();
    assert_eq!(deserialized.job_id, "job-1");
    assert_eq!(deserialized.status, "audio_capture_started");
    assert_eq!(
        deserialized.data.unwrap()["audioFilePath"],
        "/tmp/meeting-1.webm"
    );
}

#[test]
fn test_status_event_without_data() {
    let msg = StatusEventMessage {
        job_id: "job-2".to_string(),
        status: "joined".to_string(),
        data: None,
        timestamp: "2025-10-27T14:30:00Z".to_string(),
    };

    let json = serde_json::to_string(&msg).unwrap();
    assert!(!json.contains("data"));

    let deserialized: StatusEventMessage = serde_json::from_str(
        r#"{"job_id":"job-2","status":"joined","timestamp":"2025-10-27T14:30:00Z"}"#,
    )
    .unwrap();
    assert!(deserialized.data.is_none());
}

#[test]
fn test_status_subject_per_job() {
    assert_eq!(NatsClient::status_subject("job-1"), "meetbot.status.job-1");
}

// Integration test with real NATS (requires NATS server running)
#[tokio::test]
#[ignore] // Run with: cargo test -- --ignored
async fn test_nats_status_publish() {
    use futures::StreamExt;

    let nats_url = "nats://localhost:4222";

    let client = NatsClient::connect(nats_url).await.unwrap();
    let subscriber = async_nats::connect(nats_url).await.unwrap();
    let mut sub = subscriber
        .subscribe(NatsClient::status_subject("job-it"))
        .await
        .unwrap();

    client
        .publish_status("job-it", "joined", None)
        .await
        .unwrap();
    client.close().await.unwrap();

    let msg = sub.next().await.unwrap();
    let event: StatusEventMessage = serde_json::from_slice(&msg.payload).unwrap();
    assert_eq!(event.job_id, "job-it");
    assert_eq!(event.status, "joined");
}
