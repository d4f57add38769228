//! Versioned element-discovery strategies
//!
//! Provider markup changes without notice, so every selector the bot relies on
//! lives in a [`SelectorProfile`] that can be replaced from configuration
//! instead of being baked into the join flow.

use serde::{Deserialize, Serialize};

use crate::browser::Locator;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectorProfile {
    /// Profile name, e.g. "google-meet"
    pub name: String,

    /// Bumped whenever the strategy list changes
    pub version: u32,

    /// Pre-join display name field
    pub name_input: Vec<Locator>,

    /// Camera toggle, checked through `mute_state_attribute`
    pub camera_toggle: Vec<Locator>,

    /// Microphone toggle, checked through `mute_state_attribute`
    pub microphone_toggle: Vec<Locator>,

    /// Attribute holding "true"/"false" on the device toggles
    pub mute_state_attribute: String,

    /// Join buttons in priority order, first match wins
    pub join_buttons: Vec<Locator>,

    /// "Waiting for the host" indicators
    pub waiting_room: Vec<Locator>,

    /// Any of these means the bot is inside the meeting
    pub in_meeting: Vec<Locator>,

    /// Any of these means the meeting is over for the bot
    pub end_markers: Vec<Locator>,

    /// Element whose text carries the participant count
    pub participant_count: Vec<Locator>,

    pub leave_button: Vec<Locator>,

    pub captions_button: Vec<Locator>,

    /// CSS selector for participant name elements in the roster
    pub roster_names: String,

    /// CSS selector of an ancestor marking the host
    pub roster_host_marker: String,
}

impl SelectorProfile {
    pub fn google_meet() -> Self {
        Self {
            name: "google-meet".to_string(),
            version: 1,
            name_input: vec![Locator::css(
                r#"input[aria-label*="name" i], input[placeholder*="name" i]"#,
            )],
            camera_toggle: vec![Locator::css(
                r#"button[aria-label*="camera" i], button[data-is-muted="false"][aria-label*="video" i]"#,
            )],
            microphone_toggle: vec![Locator::css(
                r#"button[aria-label*="microphone" i], button[data-is-muted="false"][aria-label*="mic" i]"#,
            )],
            mute_state_attribute: "data-is-muted".to_string(),
            join_buttons: vec![
                Locator::has_text("button", "Join now"),
                Locator::has_text("button", "Ask to join"),
                Locator::has_text("button", "Join"),
                Locator::css(r#"[data-idom-class*="join"]"#),
                Locator::css(r#"button[jsname="Qx7uuf"]"#),
            ],
            waiting_room: vec![Locator::text("Waiting for the host")],
            in_meeting: vec![Locator::css("[data-participant-id], [data-self-name]")],
            end_markers: vec![
                Locator::text("You left the meeting"),
                Locator::text("Meeting ended"),
                Locator::text("Return to home screen"),
            ],
            participant_count: vec![Locator::css(
                r#"[data-participant-count], [aria-label*="participant" i]"#,
            )],
            leave_button: vec![Locator::css(r#"button[aria-label*="Leave" i]"#)],
            captions_button: vec![Locator::css(
                r#"button[aria-label*="caption" i], button[aria-label*="subtitle" i]"#,
            )],
            roster_names: "[data-participant-id] [data-self-name], [data-participant-id] [data-participant-name]"
                .to_string(),
            roster_host_marker: "[data-is-host]".to_string(),
        }
    }

    /// Script returning `[{displayName, isHost}]` for the current roster
    pub fn roster_script(&self) -> String {
        format!(
            "(() => {{ const results = []; \
             document.querySelectorAll({names}).forEach((el) => {{ \
             const name = (el.textContent || '').trim(); \
             if (name) {{ results.push({{ displayName: name, isHost: el.closest({host}) !== null }}); }} \
             }}); return results; }})()",
            names = crate::browser::script::js_string(&self.roster_names),
            host = crate::browser::script::js_string(&self.roster_host_marker),
        )
    }
}

impl Default for SelectorProfile {
    fn default() -> Self {
        Self::google_meet()
    }
}
