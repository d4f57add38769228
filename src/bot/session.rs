use serde_json::json;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex, MutexGuard, PoisonError};
use tokio::sync::{watch, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::config::{BotSettings, JoinRequest};
use super::join::JoinFlow;
use super::monitor::{self, MonitorOutcome};
use super::selectors::SelectorProfile;
use super::status::{BotStatus, StatusEmitter};
use crate::audio::capture::{enable_captions, AudioCapture};
use crate::browser::{PageDriver, Sandbox};
use crate::error::{BotError, JoinFailure};

/// What ended a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    LeaveRequested,
    MeetingEnded,
    AloneTimeout,
    MaxDuration,
    PageUnreachable,
}

impl EndReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            EndReason::LeaveRequested => "left",
            EndReason::MeetingEnded => "meeting_ended",
            EndReason::AloneTimeout => "alone_timeout",
            EndReason::MaxDuration => "max_duration_reached",
            EndReason::PageUnreachable => "page_unreachable",
        }
    }

    /// The UI leave click is pointless once the meeting is gone
    fn clicks_leave(&self) -> bool {
        !matches!(self, EndReason::MeetingEnded | EndReason::PageUnreachable)
    }
}

impl std::fmt::Display for EndReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
enum EndState {
    Pending,
    Finished(PathBuf),
    Failed(String),
}

/// One bot joining one meeting
///
/// `join()` gets the bot into the meeting and starts recording,
/// `wait_for_end()` resolves once with the recording path, and `leave()`
/// ends the session early. Whatever ends the session (leave, end markers,
/// solitude, max duration, unreachable page) the teardown runs exactly once.
pub struct MeetingBot {
    inner: Arc<BotInner>,
}

struct BotInner {
    request: JoinRequest,
    settings: BotSettings,
    selectors: Arc<SelectorProfile>,
    status: StatusEmitter,

    sandbox: Mutex<Box<dyn Sandbox>>,
    page: StdMutex<Option<Arc<dyn PageDriver>>>,
    capture: Mutex<Option<AudioCapture>>,
    audio_file_path: StdMutex<Option<PathBuf>>,

    started: AtomicBool,
    is_recording: AtomicBool,
    ending: AtomicBool,

    /// Stops monitor loops and the max-duration timer
    cancel: CancellationToken,
    end_state: watch::Sender<EndState>,
}

impl MeetingBot {
    pub fn new(request: JoinRequest, settings: BotSettings, sandbox: Box<dyn Sandbox>) -> Self {
        let status = StatusEmitter::new(request.on_status_change.clone());
        let selectors = Arc::new(settings.selectors.clone());
        let (end_state, _) = watch::channel(EndState::Pending);

        Self {
            inner: Arc::new(BotInner {
                request,
                settings,
                selectors,
                status,
                sandbox: Mutex::new(sandbox),
                page: StdMutex::new(None),
                capture: Mutex::new(None),
                audio_file_path: StdMutex::new(None),
                started: AtomicBool::new(false),
                is_recording: AtomicBool::new(false),
                ending: AtomicBool::new(false),
                cancel: CancellationToken::new(),
                end_state,
            }),
        }
    }

    /// Join the meeting and start recording
    ///
    /// On failure an `error` status is emitted, the sandbox is released and
    /// `wait_for_end()` fails instead of hanging. If another trigger ends the
    /// session mid-join, the flow stops early and fails with `NoRecording`
    /// without an `error` status.
    pub async fn join(&self) -> Result<(), BotError> {
        if self.inner.started.swap(true, Ordering::SeqCst) {
            return Err(BotError::AlreadyStarted);
        }
        if self.inner.ending.load(Ordering::SeqCst) {
            return Err(BotError::NoRecording("session already ended".to_string()));
        }

        match Arc::clone(&self.inner).establish().await {
            Ok(()) => Ok(()),
            Err(e) if self.inner.ending.load(Ordering::SeqCst) => {
                // Another trigger already ended the session and reported it
                info!("Join abandoned: {}", e);
                Err(e)
            }
            Err(e) => {
                error!("Join failed: {}", e);
                self.inner
                    .status
                    .emit(BotStatus::Error, Some(json!({ "error": e.to_string() })));
                self.inner.abort(&e).await;
                Err(e)
            }
        }
    }

    /// Resolves once the session is over, with the absolute recording path
    pub async fn wait_for_end(&self) -> Result<PathBuf, BotError> {
        let mut rx = self.inner.end_state.subscribe();
        let state = match rx
            .wait_for(|state| !matches!(state, EndState::Pending))
            .await
        {
            Ok(state) => state.clone(),
            Err(_) => return Err(BotError::NoRecording("session dropped".to_string())),
        };

        match state {
            EndState::Finished(path) => Ok(path),
            EndState::Failed(reason) => Err(BotError::NoRecording(reason)),
            EndState::Pending => Err(BotError::NoRecording("session still pending".to_string())),
        }
    }

    /// Leave voluntarily. Safe to call at any time, any number of times.
    pub async fn leave(&self) {
        self.inner.finish(EndReason::LeaveRequested).await;
    }

    pub fn is_recording(&self) -> bool {
        self.inner.is_recording.load(Ordering::SeqCst)
    }

    pub fn audio_file_path(&self) -> Option<PathBuf> {
        lock(&self.inner.audio_file_path).clone()
    }

    pub fn meeting_url(&self) -> &str {
        &self.inner.request.meeting_url
    }
}

impl BotInner {
    fn page(&self) -> Option<Arc<dyn PageDriver>> {
        lock(&self.page).clone()
    }

    async fn establish(self: Arc<Self>) -> Result<(), BotError> {
        info!("Joining {} as {}", self.request.meeting_url, self.request.bot_name);

        let page = {
            let mut sandbox = self.sandbox.lock().await;
            // Teardown closes under this lock, so a session that ended before
            // we got it must not launch a browser nobody will close
            if self.ending.load(Ordering::SeqCst) {
                return Err(BotError::NoRecording(
                    "session ended before joining".to_string(),
                ));
            }
            sandbox
                .open()
                .await
                .map_err(|e| JoinFailure::Sandbox(format!("{:#}", e)))?
        };
        *lock(&self.page) = Some(Arc::clone(&page));

        JoinFlow::new(
            page.as_ref(),
            self.selectors.as_ref(),
            &self.settings.join,
            &self.status,
            &self.cancel,
        )
        .run(&self.request.meeting_url, &self.request.bot_name)
        .await
        .map_err(|failure| match failure {
            JoinFailure::Cancelled => {
                BotError::NoRecording("session ended while joining".to_string())
            }
            failure => BotError::JoinFailed(failure),
        })?;

        self.status.emit(BotStatus::Joined, None);

        let path = self.next_audio_path();
        let capture = AudioCapture::start(page.as_ref(), path.clone(), &self.settings.capture)
            .await
            .map_err(|e| BotError::Capture(format!("{:#}", e)))?;

        {
            // Teardown takes this lock before it reports `ended`, so the start
            // event below always precedes it
            let mut slot = self.capture.lock().await;
            if self.ending.load(Ordering::SeqCst) {
                drop(slot);
                let mut capture = capture;
                capture.stop(Some(page.as_ref())).await;
                if let Err(e) = std::fs::remove_file(&path) {
                    debug!("Could not remove unused audio file: {}", e);
                }
                return Err(BotError::NoRecording(
                    "session ended while joining".to_string(),
                ));
            }
            *slot = Some(capture);
            *lock(&self.audio_file_path) = Some(path.clone());
            self.is_recording.store(true, Ordering::SeqCst);

            self.status.emit(
                BotStatus::AudioCaptureStarted,
                Some(json!({ "audioFilePath": path })),
            );
        }

        if self.ending.load(Ordering::SeqCst) {
            debug!("Session ending, not starting monitors");
            return Ok(());
        }

        if self.settings.capture.enable_captions
            && enable_captions(page.as_ref(), &self.selectors.captions_button).await
        {
            self.status.emit(BotStatus::CaptionsEnabled, None);
        }

        self.spawn_end_monitor(Arc::clone(&page));
        self.spawn_roster_poller(page);
        self.spawn_max_duration_timer();

        Ok(())
    }

    fn next_audio_path(&self) -> PathBuf {
        let dir = &self.settings.capture.output_dir;
        let dir = if dir.is_absolute() {
            dir.clone()
        } else {
            std::env::current_dir()
                .map(|cwd| cwd.join(dir))
                .unwrap_or_else(|_| dir.clone())
        };

        let id = uuid::Uuid::new_v4().simple().to_string();
        dir.join(format!(
            "meeting-{}-{}.webm",
            chrono::Utc::now().timestamp_millis(),
            &id[..8]
        ))
    }

    fn spawn_end_monitor(self: &Arc<Self>, page: Arc<dyn PageDriver>) {
        let inner = Arc::clone(self);
        tokio::spawn(async move {
            let outcome = monitor::watch_for_end(
                page,
                Arc::clone(&inner.selectors),
                inner.settings.monitor.clone(),
                inner.cancel.clone(),
            )
            .await;
            inner.on_monitor_outcome(outcome).await;
        });
    }

    fn spawn_roster_poller(self: &Arc<Self>, page: Arc<dyn PageDriver>) {
        tokio::spawn(monitor::poll_roster(
            page,
            Arc::clone(&self.selectors),
            self.settings.monitor.roster_poll_interval,
            self.status.clone(),
            self.cancel.clone(),
        ));
    }

    fn spawn_max_duration_timer(self: &Arc<Self>) {
        let inner = Arc::clone(self);
        let max_duration = self.settings.max_duration;

        tokio::spawn(async move {
            tokio::select! {
                _ = inner.cancel.cancelled() => {}
                _ = tokio::time::sleep(max_duration) => {
                    let announce = (
                        BotStatus::MaxDurationReached,
                        json!({
                            "message": format!(
                                "Meeting exceeded {}s maximum duration limit",
                                max_duration.as_secs()
                            ),
                            "durationMs": max_duration.as_millis() as u64,
                        }),
                    );
                    inner.finish_with(EndReason::MaxDuration, Some(announce)).await;
                }
            }
        });
    }

    async fn on_monitor_outcome(self: &Arc<Self>, outcome: MonitorOutcome) {
        match outcome {
            MonitorOutcome::MeetingEnded => self.finish(EndReason::MeetingEnded).await,
            MonitorOutcome::AloneTimeout { checks } => {
                let alone_secs =
                    self.settings.monitor.end_poll_interval.as_secs() * u64::from(checks);
                let announce = (
                    BotStatus::AloneTimeout,
                    json!({
                        "message": format!(
                            "Left meeting after being alone for {} seconds",
                            alone_secs
                        ),
                    }),
                );
                self.finish_with(EndReason::AloneTimeout, Some(announce)).await;
            }
            MonitorOutcome::Unreachable(reason) => {
                warn!("Finalizing unreachable session: {}", reason);
                self.finish(EndReason::PageUnreachable).await;
            }
            MonitorOutcome::Cancelled => {}
        }
    }

    async fn finish(self: &Arc<Self>, reason: EndReason) {
        self.finish_with(reason, None).await;
    }

    /// Single entry point for every end trigger; only the first one runs
    ///
    /// `announce` is emitted only by the trigger that wins, so a losing
    /// trigger never reports its own status.
    async fn finish_with(
        self: &Arc<Self>,
        reason: EndReason,
        announce: Option<(BotStatus, serde_json::Value)>,
    ) {
        if self.ending.swap(true, Ordering::SeqCst) {
            debug!("Session already ending, ignoring {}", reason);
            return;
        }

        // Stop scheduling monitor ticks and timers right away
        self.cancel.cancel();

        if let Some((status, data)) = announce {
            self.status.emit(status, Some(data));
        }

        info!("Ending session: {}", reason);

        if reason.clicks_leave() {
            self.click_leave().await;
        }

        self.teardown().await;

        let path = lock(&self.audio_file_path).clone();
        self.status.emit(
            BotStatus::Ended,
            Some(json!({ "reason": reason.as_str(), "audioFilePath": path })),
        );

        let state = match path {
            Some(path) => EndState::Finished(path),
            None => EndState::Failed(format!("session ended ({}) before recording started", reason)),
        };
        self.end_state.send_replace(state);
    }

    /// Teardown after a failed join
    async fn abort(&self, error: &BotError) {
        if self.ending.swap(true, Ordering::SeqCst) {
            return;
        }
        self.teardown().await;
        self.end_state.send_replace(EndState::Failed(error.to_string()));
    }

    async fn teardown(&self) {
        self.is_recording.store(false, Ordering::SeqCst);
        self.cancel.cancel();

        let page = lock(&self.page).take();
        let capture = self.capture.lock().await.take();
        if let Some(mut capture) = capture {
            capture.stop(page.as_deref()).await;
        }

        self.sandbox.lock().await.close().await;
        info!("Session resources released");
    }

    /// Best-effort UI leave; never blocks finalization
    async fn click_leave(&self) {
        let Some(page) = self.page() else {
            return;
        };

        for locator in &self.selectors.leave_button {
            match page.click(locator).await {
                Ok(true) => {
                    info!("Clicked leave button");
                    tokio::time::sleep(self.settings.leave_settle).await;
                    return;
                }
                Ok(false) => {}
                Err(e) => {
                    warn!("Could not click leave button: {:#}", e);
                    return;
                }
            }
        }
    }
}

fn lock<T>(mutex: &StdMutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
