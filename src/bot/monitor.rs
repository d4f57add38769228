//! Meeting monitor
//!
//! Two independent polling loops share one cancellation token:
//! - end/solitude poller: end markers and participant count, every 10s
//! - roster poller: participant snapshot as a status event, every 60s
//!
//! Cancelling stops future ticks only. A tick already in flight completes and
//! its result is dropped if the session ended meanwhile.

use anyhow::Result;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::config::MonitorSettings;
use super::join::any_present;
use super::selectors::SelectorProfile;
use super::status::{BotStatus, Participant, StatusEmitter};
use crate::browser::PageDriver;

/// Why the end poller stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorOutcome {
    /// An end-of-meeting marker is on screen
    MeetingEnded,
    /// Alone for `threshold` consecutive checks
    AloneTimeout { checks: u32 },
    /// A page read failed; the session is treated as gone
    Unreachable(String),
    /// The session ended through another trigger
    Cancelled,
}

/// Counts consecutive checks where the bot is alone
#[derive(Debug, Clone)]
pub struct SolitudeTracker {
    threshold: u32,
    consecutive: u32,
}

impl SolitudeTracker {
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold: threshold.max(1),
            consecutive: 0,
        }
    }

    /// Record one participant count; true once the threshold is reached
    pub fn observe(&mut self, participant_count: u32) -> bool {
        if participant_count <= 1 {
            self.consecutive += 1;
        } else {
            self.consecutive = 0;
        }
        self.consecutive >= self.threshold
    }

    pub fn consecutive(&self) -> u32 {
        self.consecutive
    }
}

/// First run of digits in the text, 0 when there is none
///
/// Counts too large for `u32` saturate so they never read as "alone".
pub fn parse_participant_count(text: &str) -> u32 {
    let digits: String = text
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();

    if digits.is_empty() {
        return 0;
    }
    digits.parse().unwrap_or(u32::MAX)
}

/// Best-effort participant count; 0 when no count element is shown
pub async fn read_participant_count(
    page: &dyn PageDriver,
    selectors: &SelectorProfile,
) -> Result<u32> {
    for locator in &selectors.participant_count {
        if let Some(text) = page.text_content(locator).await? {
            return Ok(parse_participant_count(&text));
        }
    }
    Ok(0)
}

fn ticker(period: Duration) -> Interval {
    // First tick one full period after start, like a repeating timer
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

/// Poll for end markers and solitude until one fires or `cancel` trips
pub async fn watch_for_end(
    page: Arc<dyn PageDriver>,
    selectors: Arc<SelectorProfile>,
    settings: MonitorSettings,
    cancel: CancellationToken,
) -> MonitorOutcome {
    let mut ticker = ticker(settings.end_poll_interval);
    let mut solitude = SolitudeTracker::new(settings.alone_threshold);

    info!(
        "Meeting monitor started (every {:?}, alone threshold {})",
        settings.end_poll_interval, settings.alone_threshold
    );

    loop {
        tokio::select! {
            _ = cancel.cancelled() => return MonitorOutcome::Cancelled,
            _ = ticker.tick() => {}
        }

        let result = check_once(page.as_ref(), &selectors, &mut solitude).await;

        if cancel.is_cancelled() {
            return MonitorOutcome::Cancelled;
        }

        match result {
            Ok(Some(outcome)) => return outcome,
            Ok(None) => {}
            Err(e) => {
                warn!("Meeting page unreachable: {:#}", e);
                return MonitorOutcome::Unreachable(format!("{:#}", e));
            }
        }
    }
}

async fn check_once(
    page: &dyn PageDriver,
    selectors: &SelectorProfile,
    solitude: &mut SolitudeTracker,
) -> Result<Option<MonitorOutcome>> {
    if any_present(page, &selectors.end_markers).await? {
        info!("Meeting end marker detected");
        return Ok(Some(MonitorOutcome::MeetingEnded));
    }

    let count = read_participant_count(page, selectors).await?;
    if solitude.observe(count) {
        info!(
            "Alone in meeting for {} consecutive checks",
            solitude.consecutive()
        );
        return Ok(Some(MonitorOutcome::AloneTimeout {
            checks: solitude.consecutive(),
        }));
    }

    if solitude.consecutive() > 0 {
        debug!(
            "Participant count {} (alone check {})",
            count,
            solitude.consecutive()
        );
    }

    Ok(None)
}

/// Snapshot the roster periodically; never ends the session on its own
pub async fn poll_roster(
    page: Arc<dyn PageDriver>,
    selectors: Arc<SelectorProfile>,
    period: Duration,
    status: StatusEmitter,
    cancel: CancellationToken,
) {
    let mut ticker = ticker(period);
    let script = selectors.roster_script();

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let participants = match page.evaluate(&script).await {
            Ok(value) => match serde_json::from_value::<Vec<Participant>>(value) {
                Ok(participants) => participants,
                Err(e) => {
                    debug!("Unexpected roster shape: {}", e);
                    continue;
                }
            },
            Err(e) => {
                debug!("Roster capture failed: {:#}", e);
                continue;
            }
        };

        if cancel.is_cancelled() {
            break;
        }

        if !participants.is_empty() {
            status.emit(
                BotStatus::Participants,
                Some(json!({ "participants": participants })),
            );
        }
    }

    debug!("Roster poller stopped");
}
