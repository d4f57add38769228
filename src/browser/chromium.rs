use anyhow::{Context, Result};
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::page::{
    EventLifecycleEvent, SetLifecycleEventsEnabledParams,
};
use chromiumoxide::cdp::browser_protocol::browser::{
    BrowserContextId, GrantPermissionsParams, PermissionType,
};
use chromiumoxide::cdp::browser_protocol::target::{
    CreateBrowserContextParams, CreateTargetParams, DisposeBrowserContextParams,
};
use chromiumoxide::cdp::js_protocol::runtime::{AddBindingParams, EvaluateParams, EventBindingCalled};
use chromiumoxide::Page;
use futures::stream::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::script;
use super::{Locator, PageDriver, Sandbox, SandboxFactory};

/// Launch flags that let an unattended participant use media without prompts.
///
/// Cross-origin protections are disabled so the page's media elements can be
/// routed into the capture graph. Only run this inside isolated infrastructure
/// and only point it at operator-supplied meeting URLs.
pub const MEDIA_LAUNCH_ARGS: &[&str] = &[
    "--use-fake-ui-for-media-stream",
    "--use-fake-device-for-media-stream",
    "--disable-web-security",
    "--disable-features=IsolateOrigins,site-per-process",
    "--autoplay-policy=no-user-gesture-required",
];

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Browser launch settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserSettings {
    /// Run without a visible window (disable only for debugging)
    pub headless: bool,

    /// Explicit Chrome/Chromium binary; auto-detected when unset
    pub executable: Option<PathBuf>,

    /// Client identity presented to the meeting provider
    pub user_agent: String,

    /// Pass `--no-sandbox` (needed in most containers)
    pub no_sandbox: bool,

    /// Timeout for a single DevTools request
    pub request_timeout_secs: u64,

    /// How long navigation waits for the network to go idle after `load`
    pub network_idle_timeout_secs: u64,

    /// Extra launch flags appended after the media flags
    pub extra_args: Vec<String>,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            headless: true,
            executable: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            no_sandbox: false,
            request_timeout_secs: 30,
            network_idle_timeout_secs: 30,
            extra_args: Vec::new(),
        }
    }
}

impl BrowserSettings {
    fn launch_config(&self) -> Result<BrowserConfig> {
        let mut args: Vec<String> = MEDIA_LAUNCH_ARGS.iter().map(|a| a.to_string()).collect();
        if self.no_sandbox {
            args.push("--no-sandbox".to_string());
        }
        args.extend(self.extra_args.iter().cloned());

        let mut builder = BrowserConfig::builder()
            .args(args)
            .request_timeout(Duration::from_secs(self.request_timeout_secs));

        if !self.headless {
            builder = builder.with_head();
        }
        if let Some(executable) = &self.executable {
            builder = builder.chrome_executable(executable);
        }

        builder.build().map_err(anyhow::Error::msg)
    }
}

/// Headless Chromium with one isolated context and one page
pub struct ChromiumSandbox {
    settings: BrowserSettings,
    browser: Option<Browser>,
    handler_task: Option<JoinHandle<()>>,
    context_id: Option<BrowserContextId>,
    page: Option<Arc<ChromiumPage>>,
}

impl ChromiumSandbox {
    pub fn new(settings: BrowserSettings) -> Self {
        Self {
            settings,
            browser: None,
            handler_task: None,
            context_id: None,
            page: None,
        }
    }

    async fn launch(&mut self) -> Result<Arc<ChromiumPage>> {
        info!("Launching headless browser");

        let config = self.settings.launch_config()?;
        let (browser, mut handler) = Browser::launch(config)
            .await
            .context("Failed to launch browser")?;

        // The handler drives the DevTools connection and must be polled
        // for as long as the browser lives
        self.handler_task = Some(tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("Browser handler stopped: {}", e);
                    break;
                }
            }
        }));
        let browser = self.browser.insert(browser);

        let context_id = browser
            .execute(CreateBrowserContextParams::default())
            .await
            .context("Failed to create browsing context")?
            .result
            .browser_context_id;
        self.context_id = Some(context_id.clone());

        let mut grant = GrantPermissionsParams::new(vec![
            PermissionType::AudioCapture,
            PermissionType::VideoCapture,
        ]);
        grant.browser_context_id = Some(context_id.clone());
        browser
            .execute(grant)
            .await
            .context("Failed to grant media permissions")?;

        let mut target = CreateTargetParams::new("about:blank");
        target.browser_context_id = Some(context_id);
        let page = browser
            .new_page(target)
            .await
            .context("Failed to open page")?;
        page.set_user_agent(self.settings.user_agent.as_str())
            .await
            .context("Failed to set user agent")?;
        page.execute(SetLifecycleEventsEnabledParams::new(true))
            .await
            .context("Failed to enable lifecycle events")?;

        info!("Browser sandbox ready");

        Ok(Arc::new(ChromiumPage {
            page,
            network_idle_timeout: Duration::from_secs(self.settings.network_idle_timeout_secs),
        }))
    }
}

#[async_trait::async_trait]
impl Sandbox for ChromiumSandbox {
    async fn open(&mut self) -> Result<Arc<dyn PageDriver>> {
        if let Some(page) = &self.page {
            return Ok(page.clone());
        }

        let page = match self.launch().await {
            Ok(page) => page,
            Err(e) => {
                // Do not leak a half-started browser
                self.close().await;
                return Err(e);
            }
        };
        self.page = Some(page.clone());
        Ok(page)
    }

    async fn close(&mut self) {
        if let Some(page) = self.page.take() {
            if let Err(e) = page.page.clone().close().await {
                debug!("Page close failed: {}", e);
            }
        }

        if let Some(browser) = self.browser.as_mut() {
            if let Some(context_id) = self.context_id.take() {
                if let Err(e) = browser
                    .execute(DisposeBrowserContextParams::new(context_id))
                    .await
                {
                    debug!("Browsing context dispose failed: {}", e);
                }
            }
        }

        if let Some(mut browser) = self.browser.take() {
            info!("Closing browser sandbox");
            if let Err(e) = browser.close().await {
                debug!("Browser close failed: {}", e);
            }
            if let Err(e) = browser.wait().await {
                debug!("Browser wait failed: {}", e);
            }
        }

        if let Some(task) = self.handler_task.take() {
            task.abort();
        }
    }
}

impl Drop for ChromiumSandbox {
    fn drop(&mut self) {
        if self.browser.is_some() {
            warn!("Browser sandbox dropped without close()");
        }
        if let Some(task) = self.handler_task.take() {
            task.abort();
        }
    }
}

/// Builds a [`ChromiumSandbox`] per bot from shared settings
#[derive(Debug, Clone, Default)]
pub struct ChromiumSandboxFactory {
    settings: BrowserSettings,
}

impl ChromiumSandboxFactory {
    pub fn new(settings: BrowserSettings) -> Self {
        Self { settings }
    }
}

impl SandboxFactory for ChromiumSandboxFactory {
    fn create(&self) -> Box<dyn Sandbox> {
        Box::new(ChromiumSandbox::new(self.settings.clone()))
    }
}

/// DevTools-backed page handle
pub struct ChromiumPage {
    page: Page,
    network_idle_timeout: Duration,
}

impl ChromiumPage {
    async fn eval_value(&self, expression: String) -> Result<serde_json::Value> {
        let params = EvaluateParams::builder()
            .expression(expression)
            .await_promise(true)
            .return_by_value(true)
            .build()
            .map_err(anyhow::Error::msg)?;

        let result = self
            .page
            .evaluate_expression(params)
            .await
            .context("Script evaluation failed")?;

        Ok(result.value().cloned().unwrap_or(serde_json::Value::Null))
    }

    async fn eval_bool(&self, expression: String) -> Result<bool> {
        Ok(self.eval_value(expression).await?.as_bool().unwrap_or(false))
    }

    async fn eval_string(&self, expression: String) -> Result<Option<String>> {
        Ok(self
            .eval_value(expression)
            .await?
            .as_str()
            .map(|s| s.to_string()))
    }
}

#[async_trait::async_trait]
impl PageDriver for ChromiumPage {
    async fn navigate(&self, url: &str) -> Result<()> {
        // Subscribe first so an early idle signal is not missed
        let lifecycle = self
            .page
            .event_listener::<EventLifecycleEvent>()
            .await
            .context("Failed to listen for lifecycle events")?;

        self.page
            .goto(url)
            .await
            .with_context(|| format!("Failed to navigate to {}", url))?;

        let main_frame = self
            .page
            .mainframe()
            .await
            .context("Failed to resolve main frame")?
            .map(|frame| frame.inner().clone());
        let signals = lifecycle.map(|event| (event.frame_id.inner().clone(), event.name.clone()));

        if !wait_for_network_idle(signals, main_frame.as_deref(), self.network_idle_timeout).await
        {
            warn!(
                "Network not idle within {:?} after loading {}, continuing",
                self.network_idle_timeout, url
            );
        }
        Ok(())
    }

    async fn is_present(&self, locator: &Locator) -> Result<bool> {
        self.eval_bool(script::presence_script(locator)).await
    }

    async fn click(&self, locator: &Locator) -> Result<bool> {
        self.eval_bool(script::click_script(locator)).await
    }

    async fn fill(&self, locator: &Locator, value: &str) -> Result<bool> {
        self.eval_bool(script::fill_script(locator, value)).await
    }

    async fn attribute(&self, locator: &Locator, name: &str) -> Result<Option<String>> {
        self.eval_string(script::attribute_script(locator, name)).await
    }

    async fn text_content(&self, locator: &Locator) -> Result<Option<String>> {
        self.eval_string(script::text_script(locator)).await
    }

    async fn evaluate(&self, script: &str) -> Result<serde_json::Value> {
        self.eval_value(script.to_string()).await
    }

    async fn expose_binding(&self, name: &str) -> Result<mpsc::Receiver<String>> {
        // Listen before adding the binding so no early call is missed
        let mut events = self
            .page
            .event_listener::<EventBindingCalled>()
            .await
            .context("Failed to listen for binding calls")?;

        self.page
            .execute(AddBindingParams::new(name))
            .await
            .with_context(|| format!("Failed to add binding {}", name))?;

        let (tx, rx) = mpsc::channel(100);
        let name = name.to_string();

        tokio::spawn(async move {
            while let Some(event) = events.next().await {
                if event.name != name {
                    continue;
                }
                if tx.send(event.payload.clone()).await.is_err() {
                    break;
                }
            }
            debug!("Binding {} event stream closed", name);
        });

        Ok(rx)
    }
}

/// Wait for a `networkIdle` lifecycle signal `(frame_id, name)` on the main
/// frame; false on timeout or when the stream ends first
async fn wait_for_network_idle<S>(signals: S, main_frame: Option<&str>, timeout: Duration) -> bool
where
    S: Stream<Item = (String, String)>,
{
    let mut signals = Box::pin(signals);
    let idle = async {
        while let Some((frame_id, name)) = signals.next().await {
            if name == "networkIdle" && main_frame.map_or(true, |main| main == frame_id) {
                return true;
            }
        }
        false
    };

    match tokio::time::timeout(timeout, idle).await {
        Ok(reached) => {
            debug!("Network idle reached: {}", reached);
            reached
        }
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    fn signal(frame: &str, name: &str) -> (String, String) {
        (frame.to_string(), name.to_string())
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_for_main_frame_network_idle() {
        let signals = stream::iter(vec![
            signal("main", "load"),
            signal("ad-frame", "networkIdle"),
            signal("main", "networkAlmostIdle"),
            signal("main", "networkIdle"),
        ]);
        assert!(wait_for_network_idle(signals, Some("main"), Duration::from_secs(30)).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_subframe_idle_alone_is_not_enough() {
        let signals = stream::iter(vec![signal("ad-frame", "networkIdle")]);
        assert!(!wait_for_network_idle(signals, Some("main"), Duration::from_secs(30)).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_busy_network_times_out() {
        let signals = stream::pending::<(String, String)>();
        let started = tokio::time::Instant::now();

        assert!(!wait_for_network_idle(signals, Some("main"), Duration::from_secs(30)).await);
        assert_eq!(started.elapsed(), Duration::from_secs(30));
    }

    #[test]
    fn test_launch_flags_grant_media() {
        let settings = BrowserSettings::default();
        assert!(MEDIA_LAUNCH_ARGS.contains(&"--use-fake-ui-for-media-stream"));
        assert!(MEDIA_LAUNCH_ARGS.contains(&"--autoplay-policy=no-user-gesture-required"));
        assert_eq!(settings.network_idle_timeout_secs, 30);
    }
}
