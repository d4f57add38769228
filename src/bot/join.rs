//! Join flow: from a blank page to "inside the meeting"
//!
//! `navigating → (name entry) → device mute → button search → joining →
//! (waiting room) → joined`
//!
//! Optional steps are independent probes with their own failure boundary, so a
//! missing element never hides a later fatal failure. Fatal conditions surface
//! as [`JoinFailure`]; tearing the session down is the caller's job. Every
//! delay and wait stops early with [`JoinFailure::Cancelled`] once the
//! session's token trips.

use anyhow::Result;
use serde_json::json;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::config::JoinTimings;
use super::selectors::SelectorProfile;
use super::status::{BotStatus, StatusEmitter};
use crate::browser::{Locator, PageDriver};
use crate::error::JoinFailure;

pub struct JoinFlow<'a> {
    page: &'a dyn PageDriver,
    selectors: &'a SelectorProfile,
    timings: &'a JoinTimings,
    status: &'a StatusEmitter,
    cancel: &'a CancellationToken,
}

/// How a bounded wait ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Reached,
    TimedOut,
    Cancelled,
}

impl<'a> JoinFlow<'a> {
    pub fn new(
        page: &'a dyn PageDriver,
        selectors: &'a SelectorProfile,
        timings: &'a JoinTimings,
        status: &'a StatusEmitter,
        cancel: &'a CancellationToken,
    ) -> Self {
        Self {
            page,
            selectors,
            timings,
            status,
            cancel,
        }
    }

    /// Run the whole flow; `Ok` means an in-meeting indicator was seen
    pub async fn run(&self, meeting_url: &str, bot_name: &str) -> Result<(), JoinFailure> {
        if self.cancel.is_cancelled() {
            return Err(JoinFailure::Cancelled);
        }

        self.status.emit(BotStatus::Navigating, None);
        info!("Navigating to meeting");
        tokio::select! {
            _ = self.cancel.cancelled() => return Err(JoinFailure::Cancelled),
            navigated = self.page.navigate(meeting_url) => {
                navigated.map_err(|e| JoinFailure::Navigation(format!("{:#}", e)))?;
            }
        }
        self.pause(self.timings.settle_delay).await?;

        if self.enter_name(bot_name).await {
            self.pause(self.timings.name_entry_delay).await?;
        }
        self.mute_device("camera", &self.selectors.camera_toggle).await;
        self.mute_device("microphone", &self.selectors.microphone_toggle).await;

        if !self.click_join_button().await {
            warn!("No join button found, continuing in case the page joined directly");
        }
        self.pause(self.timings.post_click_delay).await?;

        if any_present(self.page, &self.selectors.waiting_room)
            .await
            .map_err(page_failure)?
        {
            self.status.emit(
                BotStatus::Waiting,
                Some(json!({ "message": "Waiting for host to admit" })),
            );
            info!("In waiting room, waiting for admission");

            let admitted = wait_until(
                self.page,
                &self.selectors.waiting_room,
                false,
                self.timings.waiting_room_timeout,
                self.timings.poll_interval,
                self.cancel,
            )
            .await
            .map_err(page_failure)?;

            match admitted {
                WaitOutcome::Reached => info!("Admitted from waiting room"),
                WaitOutcome::TimedOut => {
                    return Err(JoinFailure::WaitingRoomTimeout {
                        secs: self.timings.waiting_room_timeout.as_secs(),
                    })
                }
                WaitOutcome::Cancelled => return Err(JoinFailure::Cancelled),
            }
        }

        let confirmed = wait_until(
            self.page,
            &self.selectors.in_meeting,
            true,
            self.timings.confirmation_timeout,
            self.timings.poll_interval,
            self.cancel,
        )
        .await
        .map_err(page_failure)?;

        match confirmed {
            WaitOutcome::Reached => {
                info!("Joined meeting");
                Ok(())
            }
            WaitOutcome::TimedOut => Err(JoinFailure::ConfirmationTimeout {
                secs: self.timings.confirmation_timeout.as_secs(),
            }),
            WaitOutcome::Cancelled => Err(JoinFailure::Cancelled),
        }
    }

    async fn pause(&self, delay: Duration) -> Result<(), JoinFailure> {
        tokio::select! {
            _ = self.cancel.cancelled() => Err(JoinFailure::Cancelled),
            _ = tokio::time::sleep(delay) => Ok(()),
        }
    }

    /// Returns whether a name field was filled
    async fn enter_name(&self, bot_name: &str) -> bool {
        for locator in &self.selectors.name_input {
            match self.page.fill(locator, bot_name).await {
                Ok(true) => {
                    debug!("Entered display name into {}", locator);
                    return true;
                }
                Ok(false) => {}
                Err(e) => {
                    warn!("Could not enter display name: {:#}", e);
                    return false;
                }
            }
        }
        debug!("No name field on the page");
        false
    }

    /// Toggle a device off only if its mute attribute says it is on
    async fn mute_device(&self, device: &str, toggles: &[Locator]) {
        for locator in toggles {
            let state = match self
                .page
                .attribute(locator, &self.selectors.mute_state_attribute)
                .await
            {
                Ok(state) => state,
                Err(e) => {
                    warn!("Could not read {} state: {:#}", device, e);
                    return;
                }
            };

            if state.as_deref() == Some("false") {
                match self.page.click(locator).await {
                    Ok(true) => info!("Turned off {}", device),
                    Ok(false) => debug!("{} toggle vanished before click", device),
                    Err(e) => warn!("Could not turn off {}: {:#}", device, e),
                }
                return;
            }
        }
    }

    async fn click_join_button(&self) -> bool {
        for locator in &self.selectors.join_buttons {
            match self.page.click(locator).await {
                Ok(true) => {
                    info!("Clicked join button {}", locator);
                    self.status.emit(BotStatus::Joining, None);
                    return true;
                }
                Ok(false) => {}
                Err(e) => debug!("Join strategy {} failed: {:#}", locator, e),
            }
        }
        false
    }
}

fn page_failure(e: anyhow::Error) -> JoinFailure {
    JoinFailure::Page(format!("{:#}", e))
}

/// Whether any of the locators matches
pub async fn any_present(page: &dyn PageDriver, locators: &[Locator]) -> Result<bool> {
    for locator in locators {
        if page.is_present(locator).await? {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Poll until the locators' presence equals `present`, the deadline passes or
/// `cancel` trips
pub async fn wait_until(
    page: &dyn PageDriver,
    locators: &[Locator],
    present: bool,
    timeout: Duration,
    poll_interval: Duration,
    cancel: &CancellationToken,
) -> Result<WaitOutcome> {
    let deadline = Instant::now() + timeout;
    loop {
        if cancel.is_cancelled() {
            return Ok(WaitOutcome::Cancelled);
        }
        if any_present(page, locators).await? == present {
            return Ok(WaitOutcome::Reached);
        }
        if Instant::now() >= deadline {
            return Ok(WaitOutcome::TimedOut);
        }
        tokio::select! {
            _ = cancel.cancelled() => return Ok(WaitOutcome::Cancelled),
            _ = tokio::time::sleep_until((Instant::now() + poll_interval).min(deadline)) => {}
        }
    }
}
