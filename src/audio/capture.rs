// Audio capture bridge between the meeting page and the host
//
// The in-page half (capture.js) mixes every <audio>/<video> element into one
// stream, encodes it with MediaRecorder and calls a host binding with each
// chunk. The host half pumps those calls, in order, into an AudioSink.

use anyhow::{Context, Result};
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::sink::AudioSink;
use crate::bot::config::CaptureSettings;
use crate::browser::script::js_string;
use crate::browser::{Locator, PageDriver};

const CAPTURE_SCRIPT: &str = include_str!("capture.js");

/// Message sent by the in-page encoder through the binding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BridgeMessage {
    /// One encoded chunk, base64
    Chunk { data: String },
    /// Encoder stopped; no more chunks follow
    Stopped,
}

/// Running capture for one session
pub struct AudioCapture {
    controller_key: String,
    sink: Arc<AudioSink>,
    pump: Option<JoinHandle<()>>,
    stop_grace: Duration,
}

impl AudioCapture {
    /// Open the output file, expose the binding and inject the pipeline
    pub async fn start(
        page: &dyn PageDriver,
        path: PathBuf,
        settings: &CaptureSettings,
    ) -> Result<Self> {
        let session_key = uuid::Uuid::new_v4().simple().to_string();
        let controller_key = format!("__loqa_{}", session_key);
        let binding = format!("__loqa_{}_bridge", session_key);

        let sink = Arc::new(AudioSink::create(&path)?);

        let payloads = match page.expose_binding(&binding).await {
            Ok(rx) => rx,
            Err(e) => {
                sink.on_stopped().ok();
                return Err(e).context("Failed to expose audio bridge");
            }
        };
        let pump = tokio::spawn(pump_chunks(payloads, Arc::clone(&sink)));

        let script = capture_script(&controller_key, &binding, settings);
        if let Err(e) = page.evaluate(&script).await {
            pump.abort();
            sink.on_stopped().ok();
            return Err(e).context("Failed to inject capture pipeline");
        }

        info!(
            "Audio capture started ({}ms chunks) -> {}",
            settings.chunk_interval.as_millis(),
            path.display()
        );

        Ok(Self {
            controller_key,
            sink,
            pump: Some(pump),
            stop_grace: settings.stop_grace,
        })
    }

    pub fn path(&self) -> &Path {
        self.sink.path()
    }

    pub fn sink(&self) -> &Arc<AudioSink> {
        &self.sink
    }

    /// Stop the encoder and close the file
    ///
    /// The file is closed even when the page is gone or never confirms the
    /// stop. Calling this again is a no-op.
    pub async fn stop(&mut self, page: Option<&dyn PageDriver>) {
        if let Some(page) = page {
            match page.evaluate(&stop_script(&self.controller_key)).await {
                Ok(value) => debug!("In-page stop returned {}", value),
                Err(e) => debug!("In-page stop failed, page likely closed: {:#}", e),
            }
        }

        if let Some(mut pump) = self.pump.take() {
            if tokio::time::timeout(self.stop_grace, &mut pump).await.is_err() {
                warn!(
                    "Encoder did not confirm stop within {:?}, closing file anyway",
                    self.stop_grace
                );
                pump.abort();
            }
        }

        if let Err(e) = self.sink.on_stopped() {
            error!("Failed to close audio file: {:#}", e);
        }
    }
}

/// Forward binding payloads into the sink until the encoder stops
async fn pump_chunks(mut payloads: mpsc::Receiver<String>, sink: Arc<AudioSink>) {
    while let Some(payload) = payloads.recv().await {
        let message = match serde_json::from_str::<BridgeMessage>(&payload) {
            Ok(message) => message,
            Err(e) => {
                warn!("Ignoring malformed bridge message: {}", e);
                continue;
            }
        };

        match message {
            BridgeMessage::Chunk { data } => {
                let bytes = match base64::engine::general_purpose::STANDARD.decode(data) {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        warn!("Ignoring undecodable audio chunk: {}", e);
                        continue;
                    }
                };
                if let Err(e) = sink.on_chunk(&bytes) {
                    error!("Failed to write audio chunk: {:#}", e);
                }
            }
            BridgeMessage::Stopped => {
                if let Err(e) = sink.on_stopped() {
                    error!("Failed to close audio file: {:#}", e);
                }
                break;
            }
        }
    }
    debug!("Audio bridge pump finished");
}

pub fn capture_script(controller_key: &str, binding: &str, settings: &CaptureSettings) -> String {
    CAPTURE_SCRIPT
        .replace("__CONTROLLER_KEY__", &js_string(controller_key))
        .replace("__BINDING__", &js_string(binding))
        .replace("__MIME_TYPE__", &js_string(&settings.mime_type))
        .replace(
            "__TIMESLICE_MS__",
            &settings.chunk_interval.as_millis().to_string(),
        )
}

pub fn stop_script(controller_key: &str) -> String {
    format!(
        "(() => {{ const capture = window[{}]; if (!capture) return false; return capture.stop(); }})()",
        js_string(controller_key)
    )
}

/// Best-effort switch to live captions; returns whether a button was clicked
pub async fn enable_captions(page: &dyn PageDriver, buttons: &[Locator]) -> bool {
    for locator in buttons {
        match page.click(locator).await {
            Ok(true) => return true,
            Ok(false) => {}
            Err(e) => {
                warn!("Could not enable captions: {:#}", e);
                return false;
            }
        }
    }
    false
}
