// In-memory renderer for exercising discovery, extraction and the pool
// without a network.
#![allow(dead_code)]

use async_trait::async_trait;
use lazuli_scanner::error::{Result, ScanError};
use lazuli_scanner::{DetailSelectors, Renderer, RendererSession, Script, Step};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

pub const SITE: &str = "https://shop.test";

#[derive(Debug, Clone, Default)]
pub struct FakePage {
    /// Selector -> value returned by reads. A selector present here is
    /// also considered visible and clickable.
    pub values: HashMap<String, Value>,
    /// Anchor batches: the first is present after navigation, each scroll
    /// reveals the next.
    pub anchor_batches: Vec<Vec<String>>,
    /// Waits on this page never finish.
    pub stall: bool,
    /// Delay applied to every wait.
    pub wait_delay: Duration,
}

#[derive(Default)]
pub struct Counters {
    pub opened: AtomicUsize,
    pub closed: AtomicUsize,
    pub navigations: AtomicUsize,
}

#[derive(Clone, Default)]
pub struct FakeRenderer {
    pub pages: Arc<HashMap<String, FakePage>>,
    pub counters: Arc<Counters>,
    pub refuse_sessions: bool,
}

impl FakeRenderer {
    pub fn new(pages: HashMap<String, FakePage>) -> Self {
        Self {
            pages: Arc::new(pages),
            ..Default::default()
        }
    }

    pub fn opened(&self) -> usize {
        self.counters.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.counters.closed.load(Ordering::SeqCst)
    }
}

pub struct FakeSession {
    pages: Arc<HashMap<String, FakePage>>,
    counters: Arc<Counters>,
    current: Option<FakePage>,
    scrolls: usize,
}

#[async_trait]
impl Renderer for FakeRenderer {
    type Session = FakeSession;

    async fn open_session(&self) -> Result<FakeSession> {
        if self.refuse_sessions {
            return Err(ScanError::Render("browser unavailable".to_string()));
        }
        self.counters.opened.fetch_add(1, Ordering::SeqCst);
        Ok(FakeSession {
            pages: self.pages.clone(),
            counters: self.counters.clone(),
            current: None,
            scrolls: 0,
        })
    }
}

impl FakeSession {
    fn page(&self) -> Result<&FakePage> {
        self.current
            .as_ref()
            .ok_or_else(|| ScanError::Render("no page loaded".to_string()))
    }

    fn value(&self, selector: &str) -> Result<Value> {
        self.page()?
            .values
            .get(selector)
            .cloned()
            .ok_or_else(|| ScanError::ElementNotFound(selector.to_string()))
    }
}

#[async_trait]
impl RendererSession for FakeSession {
    async fn run(&mut self, step: &Step) -> Result<Value> {
        match step {
            Step::Navigate(url) => {
                self.counters.navigations.fetch_add(1, Ordering::SeqCst);
                let page = self
                    .pages
                    .get(url)
                    .cloned()
                    .ok_or_else(|| ScanError::Render(format!("{} returned 404", url)))?;
                self.current = Some(page);
                self.scrolls = 0;
                Ok(Value::Null)
            }
            Step::WaitVisible { selector, .. } => {
                let page = self.page()?.clone();
                if page.stall {
                    std::future::pending::<()>().await;
                }
                tokio::time::sleep(page.wait_delay).await;
                self.value(selector).map(|_| Value::Null)
            }
            Step::ScrollToBottom => {
                self.page()?;
                self.scrolls += 1;
                Ok(Value::Null)
            }
            Step::Pause(duration) => {
                tokio::time::sleep(*duration).await;
                Ok(Value::Null)
            }
            Step::Click(selector) => self.value(selector).map(|_| Value::Null),
            Step::AttrAll { .. } => {
                let page = self.page()?;
                let visible = page
                    .anchor_batches
                    .iter()
                    .take(self.scrolls + 1)
                    .flatten()
                    .map(|href| Value::String(href.clone()))
                    .collect();
                Ok(Value::Array(visible))
            }
            Step::TextAll(selector) => Ok(self
                .page()?
                .values
                .get(selector)
                .cloned()
                .unwrap_or_else(|| json!([]))),
            Step::Text(selector) | Step::Attr { selector, .. } => self.value(selector),
            Step::Script(Script::Table { selector }) => self.value(selector),
            Step::Script(Script::Records { scope, .. }) => self.value(scope),
        }
    }

    async fn close(&mut self) -> Result<()> {
        self.current = None;
        self.counters.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub fn listing(batches: &[&[&str]]) -> FakePage {
    FakePage {
        anchor_batches: batches
            .iter()
            .map(|batch| batch.iter().map(|s| s.to_string()).collect())
            .collect(),
        ..Default::default()
    }
}

/// A detail page that satisfies every default selector.
pub fn detail_page(name: &str) -> FakePage {
    let s = DetailSelectors::default();
    let values = HashMap::from([
        (s.ready.clone(), Value::Null),
        (s.name.clone(), json!(name)),
        (s.price.clone(), json!("¥14,300")),
        (s.image.clone(), json!("/images/main.jpg")),
        (s.breadcrumbs.clone(), json!(["Home", "Men", "Shoes"])),
        (s.description.clone(), json!("Classic court style")),
        (s.description_items.clone(), json!(["Leather upper", "Rubber outsole"])),
        (s.sizes.clone(), json!(["26.0cm", "27.0cm"])),
        (s.size_note.clone(), json!("True to size")),
        (s.keywords.clone(), json!("shoes, originals")),
        (s.size_chart_toggle.clone(), Value::Null),
        (
            s.size_chart_table.clone(),
            json!([{"Size": "26.0", "Foot": "26cm"}]),
        ),
        (
            s.review.clone(),
            json!([{"rating": "5", "title": "Great", "date": "2024-01-01", "author": "k", "body": "Nice"}]),
        ),
        (
            s.coordinate.clone(),
            json!([{"name": "Socks", "price": "¥990", "url": "/p/socks/", "image_url": "/i.jpg"}]),
        ),
    ]);
    FakePage {
        values,
        ..Default::default()
    }
}

pub fn url(path: &str) -> String {
    format!("{}{}", SITE, path)
}
