//! Browser sandbox abstraction
//!
//! The bot never talks to a browser directly. It drives a [`PageDriver`]
//! handed out by a [`Sandbox`], which owns the browser process, one isolated
//! browsing context and one page:
//! - `chromium`: headless Chromium over the DevTools protocol
//! - tests provide scripted fakes implementing the same traits

pub mod chromium;
pub mod script;

pub use chromium::{ChromiumSandbox, ChromiumSandboxFactory};

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;

/// How to find an element on the page
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Locator {
    /// CSS selector (comma lists allowed, first match wins)
    Css { selector: String },
    /// Element whose trimmed text is exactly `text`
    Text { text: String },
    /// `tag` element whose text contains `text` (case-insensitive)
    HasText { tag: String, text: String },
}

impl Locator {
    pub fn css(selector: impl Into<String>) -> Self {
        Self::Css {
            selector: selector.into(),
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn has_text(tag: impl Into<String>, text: impl Into<String>) -> Self {
        Self::HasText {
            tag: tag.into(),
            text: text.into(),
        }
    }
}

impl std::fmt::Display for Locator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Locator::Css { selector } => write!(f, "{}", selector),
            Locator::Text { text } => write!(f, "text=\"{}\"", text),
            Locator::HasText { tag, text } => write!(f, "{}:has-text(\"{}\")", tag, text),
        }
    }
}

/// A single page inside the sandbox
///
/// Every call suspends until the browser answers. Element operations return
/// `Ok(false)` / `Ok(None)` when the locator matches nothing; `Err` means the
/// page itself could not be reached.
#[async_trait::async_trait]
pub trait PageDriver: Send + Sync {
    /// Load a URL and wait until the network is idle (bounded)
    async fn navigate(&self, url: &str) -> Result<()>;

    /// Whether any element matches the locator
    async fn is_present(&self, locator: &Locator) -> Result<bool>;

    /// Click the first match; returns whether anything was clicked
    async fn click(&self, locator: &Locator) -> Result<bool>;

    /// Fill the first matching input; returns whether anything was filled
    async fn fill(&self, locator: &Locator, value: &str) -> Result<bool>;

    /// Read an attribute of the first match
    async fn attribute(&self, locator: &Locator, name: &str) -> Result<Option<String>>;

    /// Read the text content of the first match
    async fn text_content(&self, locator: &Locator) -> Result<Option<String>>;

    /// Evaluate a script in the page and return its JSON value
    async fn evaluate(&self, script: &str) -> Result<serde_json::Value>;

    /// Expose a host binding callable from the page as `window[name](payload)`
    ///
    /// Payloads arrive on the returned channel in call order.
    async fn expose_binding(&self, name: &str) -> Result<mpsc::Receiver<String>>;
}

/// Isolated browser process owning exactly one page
#[async_trait::async_trait]
pub trait Sandbox: Send {
    /// Launch the browser (if needed) and return the page
    async fn open(&mut self) -> Result<Arc<dyn PageDriver>>;

    /// Release page, context and process. Idempotent, never fails.
    async fn close(&mut self);
}

/// Creates one fresh sandbox per bot
pub trait SandboxFactory: Send + Sync {
    fn create(&self) -> Box<dyn Sandbox>;
}
