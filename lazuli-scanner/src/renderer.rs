//! The page renderer seam.
//!
//! A [`Renderer`] hands out independent [`RendererSession`]s. A session is a
//! stateful, browser-like context: steps run against it in order and later
//! steps see the document state left behind by earlier ones.

use crate::error::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

/// One fallible action against a renderer session.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// Load a URL, replacing the current document.
    Navigate(String),
    /// Wait until an element matching the selector is present.
    WaitVisible { selector: String, timeout: Duration },
    /// The "load more" trigger on incrementally loading pages.
    ScrollToBottom,
    /// Fixed pause, e.g. to let loaded content settle.
    Pause(Duration),
    /// Click an element. Clicking may load additional content.
    Click(String),
    /// Normalized text of the first match.
    Text(String),
    /// Normalized text of every match, as an array.
    TextAll(String),
    /// Attribute of the first match.
    Attr { selector: String, attr: String },
    /// Attribute of every match, as an array.
    AttrAll { selector: String, attr: String },
    /// Structured extraction returning a JSON value.
    Script(Script),
}

/// Declarative in-page extraction programs.
#[derive(Debug, Clone, PartialEq)]
pub enum Script {
    /// Reads a table into an array of `{header: cell}` objects. Headers come
    /// from the first row.
    Table { selector: String },
    /// For every element matching `scope`, builds an object from `fields`
    /// evaluated relative to that element.
    Records {
        scope: String,
        fields: Vec<ScriptField>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScriptField {
    pub name: String,
    pub selector: String,
    /// Read this attribute instead of the text content.
    pub attr: Option<String>,
}

impl ScriptField {
    pub fn text(name: &str, selector: &str) -> Self {
        Self {
            name: name.to_string(),
            selector: selector.to_string(),
            attr: None,
        }
    }

    pub fn attr(name: &str, selector: &str, attr: &str) -> Self {
        Self {
            name: name.to_string(),
            selector: selector.to_string(),
            attr: Some(attr.to_string()),
        }
    }
}

impl Step {
    /// Short label used in logs and error messages.
    pub fn describe(&self) -> String {
        match self {
            Step::Navigate(url) => format!("navigate {}", url),
            Step::WaitVisible { selector, .. } => format!("wait {}", selector),
            Step::ScrollToBottom => "scroll".to_string(),
            Step::Pause(d) => format!("pause {}ms", d.as_millis()),
            Step::Click(selector) => format!("click {}", selector),
            Step::Text(selector) | Step::TextAll(selector) => format!("text {}", selector),
            Step::Attr { selector, attr } | Step::AttrAll { selector, attr } => {
                format!("attr {}[{}]", selector, attr)
            }
            Step::Script(Script::Table { selector }) => format!("table {}", selector),
            Step::Script(Script::Records { scope, .. }) => format!("records {}", scope),
        }
    }
}

/// Fixed request identity, configured once when a session is opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionProfile {
    pub user_agent: String,
    pub headless: bool,
    pub request_timeout: Duration,
    pub accept_language: Option<String>,
}

impl Default for SessionProfile {
    fn default() -> Self {
        Self {
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36"
                .to_string(),
            headless: true,
            request_timeout: Duration::from_secs(30),
            accept_language: Some("ja-JP,ja;q=0.9,en;q=0.8".to_string()),
        }
    }
}

/// Session factory. Opening a session is expensive; callers keep one per
/// worker.
#[async_trait]
pub trait Renderer: Send + Sync + 'static {
    type Session: RendererSession;

    async fn open_session(&self) -> Result<Self::Session>;
}

#[async_trait]
pub trait RendererSession: Send + 'static {
    /// Runs one step, returning the extracted value (`Null` for actions).
    async fn run(&mut self, step: &Step) -> Result<Value>;

    /// Releases the session. The session must not be used afterwards.
    async fn close(&mut self) -> Result<()>;
}
