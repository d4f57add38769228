// Scripted browser fakes shared by the integration tests
#![allow(dead_code)]

use anyhow::{bail, Result};
use base64::Engine;
use loqa_meetbot::bot::{BotSettings, BotStatus, StatusCallback, StatusEvent};
use loqa_meetbot::browser::{Locator, PageDriver, Sandbox, SandboxFactory};
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

#[derive(Default)]
struct PageState {
    present: HashSet<Locator>,
    clickable: HashSet<Locator>,
    fillable: HashSet<Locator>,
    attributes: HashMap<(Locator, String), String>,
    texts: HashMap<Locator, String>,
    roster: Value,
    bridge: Option<mpsc::Sender<String>>,
    unreachable: bool,
    capture_delay: Option<Duration>,
    capture_injected: bool,
    navigated: Vec<String>,
    clicks: Vec<Locator>,
    filled: Vec<(Locator, String)>,
}

/// In-memory meeting page driven by the test
#[derive(Default)]
pub struct FakePage {
    state: Mutex<PageState>,
}

impl FakePage {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn state(&self) -> std::sync::MutexGuard<'_, PageState> {
        self.state.lock().unwrap()
    }

    pub fn show(&self, locator: Locator) {
        self.state().present.insert(locator);
    }

    pub fn hide(&self, locator: &Locator) {
        self.state().present.remove(locator);
    }

    pub fn make_clickable(&self, locator: Locator) {
        self.state().clickable.insert(locator);
    }

    pub fn make_fillable(&self, locator: Locator) {
        self.state().fillable.insert(locator);
    }

    pub fn set_attribute(&self, locator: Locator, name: &str, value: &str) {
        self.state()
            .attributes
            .insert((locator, name.to_string()), value.to_string());
    }

    pub fn set_text(&self, locator: Locator, text: &str) {
        self.state().texts.insert(locator, text.to_string());
    }

    pub fn set_roster(&self, roster: Value) {
        self.state().roster = roster;
    }

    /// Every later page call fails, as if the tab crashed
    pub fn set_unreachable(&self) {
        self.state().unreachable = true;
    }

    /// Make the capture script take `delay` to install
    pub fn delay_capture(&self, delay: Duration) {
        self.state().capture_delay = Some(delay);
    }

    /// Push one encoded chunk through the audio bridge
    pub fn send_chunk(&self, bytes: &[u8]) {
        let data = base64::engine::general_purpose::STANDARD.encode(bytes);
        let payload = json!({ "kind": "chunk", "data": data }).to_string();
        let state = self.state();
        let bridge = state.bridge.as_ref().expect("audio bridge not exposed");
        bridge.try_send(payload).expect("audio bridge full");
    }

    pub fn capture_injected(&self) -> bool {
        self.state().capture_injected
    }

    pub fn navigated(&self) -> Vec<String> {
        self.state().navigated.clone()
    }

    pub fn clicks(&self) -> Vec<Locator> {
        self.state().clicks.clone()
    }

    pub fn filled(&self) -> Vec<(Locator, String)> {
        self.state().filled.clone()
    }

    fn check_reachable(&self) -> Result<()> {
        if self.state().unreachable {
            bail!("Target closed");
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl PageDriver for FakePage {
    async fn navigate(&self, url: &str) -> Result<()> {
        self.check_reachable()?;
        self.state().navigated.push(url.to_string());
        Ok(())
    }

    async fn is_present(&self, locator: &Locator) -> Result<bool> {
        self.check_reachable()?;
        Ok(self.state().present.contains(locator))
    }

    async fn click(&self, locator: &Locator) -> Result<bool> {
        self.check_reachable()?;
        let mut state = self.state();
        if state.clickable.contains(locator) {
            state.clicks.push(locator.clone());
            return Ok(true);
        }
        Ok(false)
    }

    async fn fill(&self, locator: &Locator, value: &str) -> Result<bool> {
        self.check_reachable()?;
        let mut state = self.state();
        if state.fillable.contains(locator) {
            state.filled.push((locator.clone(), value.to_string()));
            return Ok(true);
        }
        Ok(false)
    }

    async fn attribute(&self, locator: &Locator, name: &str) -> Result<Option<String>> {
        self.check_reachable()?;
        Ok(self
            .state()
            .attributes
            .get(&(locator.clone(), name.to_string()))
            .cloned())
    }

    async fn text_content(&self, locator: &Locator) -> Result<Option<String>> {
        self.check_reachable()?;
        Ok(self.state().texts.get(locator).cloned())
    }

    async fn evaluate(&self, script: &str) -> Result<Value> {
        self.check_reachable()?;

        if script.contains("MediaRecorder") {
            let delay = self.state().capture_delay;
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            self.state().capture_injected = true;
            return Ok(Value::Null);
        }

        let state = self.state();

        if script.contains("capture.stop()") {
            // The real recorder flushes its last chunk, then reports stopped
            if let Some(bridge) = &state.bridge {
                let _ = bridge.try_send(json!({ "kind": "stopped" }).to_string());
            }
            return Ok(json!(true));
        }

        if script.contains("isHost") {
            return Ok(state.roster.clone());
        }

        Ok(Value::Null)
    }

    async fn expose_binding(&self, _name: &str) -> Result<mpsc::Receiver<String>> {
        self.check_reachable()?;
        let (tx, rx) = mpsc::channel(100);
        self.state().bridge = Some(tx);
        Ok(rx)
    }
}

/// Sandbox handing out one shared fake page
pub struct FakeSandbox {
    page: Arc<FakePage>,
    fail_open: bool,
    opens: Arc<AtomicUsize>,
    closes: Arc<AtomicUsize>,
}

impl FakeSandbox {
    pub fn new(page: Arc<FakePage>) -> Self {
        Self {
            page,
            fail_open: false,
            opens: Arc::new(AtomicUsize::new(0)),
            closes: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn failing(page: Arc<FakePage>) -> Self {
        Self {
            fail_open: true,
            ..Self::new(page)
        }
    }

    pub fn closes(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.closes)
    }

    pub fn opens(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.opens)
    }
}

#[async_trait::async_trait]
impl Sandbox for FakeSandbox {
    async fn open(&mut self) -> Result<Arc<dyn PageDriver>> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        if self.fail_open {
            bail!("Chrome executable not found");
        }
        Ok(self.page.clone() as Arc<dyn PageDriver>)
    }

    async fn close(&mut self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

/// Factory giving every bot the same fake page
pub struct FakeSandboxFactory {
    pub page: Arc<FakePage>,
}

impl SandboxFactory for FakeSandboxFactory {
    fn create(&self) -> Box<dyn Sandbox> {
        Box::new(FakeSandbox::new(Arc::clone(&self.page)))
    }
}

/// Status log collected through the bot callback
#[derive(Clone, Default)]
pub struct StatusLog {
    events: Arc<Mutex<Vec<StatusEvent>>>,
}

impl StatusLog {
    pub fn callback(&self) -> StatusCallback {
        let events = Arc::clone(&self.events);
        Arc::new(move |event: &StatusEvent| events.lock().unwrap().push(event.clone()))
    }

    pub fn statuses(&self) -> Vec<BotStatus> {
        self.events.lock().unwrap().iter().map(|e| e.status).collect()
    }

    pub fn count(&self, status: BotStatus) -> usize {
        self.statuses().iter().filter(|s| **s == status).count()
    }

    /// Data of the last event with this status
    pub fn data(&self, status: BotStatus) -> Option<Value> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|e| e.status == status)
            .and_then(|e| e.data.clone())
    }
}

/// Default settings writing into `output_dir`
pub fn test_settings(output_dir: &Path) -> BotSettings {
    let mut settings = BotSettings::default();
    settings.capture.output_dir = output_dir.to_path_buf();
    settings.capture.stop_grace = Duration::from_secs(2);
    settings
}

/// A page where the bot is admitted straight away and has company
pub fn meeting_page(settings: &BotSettings) -> Arc<FakePage> {
    let page = FakePage::new();
    let selectors = &settings.selectors;

    page.make_fillable(selectors.name_input[0].clone());
    page.make_clickable(selectors.join_buttons[0].clone());
    page.make_clickable(selectors.leave_button[0].clone());
    page.show(selectors.in_meeting[0].clone());
    page.set_text(selectors.participant_count[0].clone(), "5");

    page
}
