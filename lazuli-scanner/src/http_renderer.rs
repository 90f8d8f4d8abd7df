use crate::error::{Result, ScanError};
use crate::renderer::{Renderer, RendererSession, Script, ScriptField, SessionProfile, Step};
use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{ACCEPT_LANGUAGE, HeaderMap, HeaderValue};
use scraper::{ElementRef, Html, Selector};
use serde_json::{Map, Value};
use std::collections::HashSet;
use tracing::debug;
use url::Url;

/// Renders pages as static documents fetched over HTTP.
///
/// Every session gets its own client and cookie jar. Content that a browser
/// would load on scroll or click is fetched from the link the trigger element
/// points at and appended to the session's document.
#[derive(Debug, Clone)]
pub struct HttpRenderer {
    profile: SessionProfile,
    load_more_selector: Option<String>,
}

impl HttpRenderer {
    pub fn new(profile: SessionProfile) -> Self {
        Self {
            profile,
            load_more_selector: None,
        }
    }

    /// Element whose link is followed by [`Step::ScrollToBottom`].
    pub fn with_load_more(mut self, selector: impl Into<String>) -> Self {
        self.load_more_selector = Some(selector.into());
        self
    }

    fn build_client(&self) -> Result<Client> {
        let mut headers = HeaderMap::new();
        if let Some(language) = &self.profile.accept_language
            && let Ok(value) = HeaderValue::from_str(language)
        {
            headers.insert(ACCEPT_LANGUAGE, value);
        }

        let client = Client::builder()
            .user_agent(self.profile.user_agent.clone())
            .default_headers(headers)
            .timeout(self.profile.request_timeout)
            .connect_timeout(self.profile.request_timeout / 2)
            .cookie_store(true)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()?;
        Ok(client)
    }
}

#[async_trait]
impl Renderer for HttpRenderer {
    type Session = HttpSession;

    async fn open_session(&self) -> Result<HttpSession> {
        if !self.profile.headless {
            debug!("HTTP renderer has no visible mode, running headless");
        }
        Ok(HttpSession {
            client: Some(self.build_client()?),
            load_more_selector: self.load_more_selector.clone(),
            base: None,
            pages: Vec::new(),
            loaded: HashSet::new(),
        })
    }
}

pub struct HttpSession {
    client: Option<Client>,
    load_more_selector: Option<String>,
    base: Option<Url>,
    /// Raw HTML of the navigated page followed by every appended load.
    pages: Vec<String>,
    loaded: HashSet<String>,
}

impl HttpSession {
    async fn fetch(&self, url: &Url) -> Result<String> {
        let client = self
            .client
            .as_ref()
            .ok_or_else(|| ScanError::Render("session is closed".to_string()))?;

        debug!("Fetching {}", url);
        let response = client.get(url.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ScanError::Render(format!("{} returned {}", url, status)));
        }
        Ok(response.text().await?)
    }

    async fn navigate(&mut self, target: &str) -> Result<Value> {
        let url = Url::parse(target).map_err(|e| ScanError::InvalidUrl(format!("{}: {}", target, e)))?;
        let body = self.fetch(&url).await?;
        self.pages = vec![body];
        self.loaded = HashSet::from([url.to_string()]);
        self.base = Some(url);
        Ok(Value::Null)
    }

    /// Fetches `link` and appends it to the document, once per URL.
    async fn append(&mut self, link: &str) -> Result<()> {
        let Some(url) = self.resolve(link) else {
            return Err(ScanError::Render(format!("cannot resolve link {}", link)));
        };
        if self.loaded.contains(url.as_str()) {
            return Ok(());
        }
        let body = self.fetch(&url).await?;
        self.loaded.insert(url.to_string());
        self.pages.push(body);
        Ok(())
    }

    fn resolve(&self, link: &str) -> Option<Url> {
        match &self.base {
            Some(base) => base.join(link).ok(),
            None => Url::parse(link).ok(),
        }
    }

    fn ensure_loaded(&self) -> Result<()> {
        if self.pages.is_empty() {
            return Err(ScanError::Render("no page loaded".to_string()));
        }
        Ok(())
    }

    /// Applies `f` to every element matching `selector` across all loaded
    /// documents, in document order.
    fn query<T>(&self, selector: &str, mut f: impl FnMut(ElementRef<'_>) -> T) -> Result<Vec<T>> {
        self.ensure_loaded()?;
        let selector = parse_selector(selector)?;
        let mut out = Vec::new();
        for page in &self.pages {
            let document = Html::parse_document(page);
            out.extend(document.select(&selector).map(&mut f));
        }
        Ok(out)
    }

    fn first<T>(&self, selector: &str, f: impl FnMut(ElementRef<'_>) -> T) -> Result<T> {
        self.query(selector, f)?
            .into_iter()
            .next()
            .ok_or_else(|| ScanError::ElementNotFound(selector.to_string()))
    }

    fn load_more_link(&self) -> Result<Option<String>> {
        let (Some(selector), Some(last)) = (&self.load_more_selector, self.pages.last()) else {
            return Ok(None);
        };
        let selector = parse_selector(selector)?;
        let document = Html::parse_document(last);
        Ok(document.select(&selector).find_map(link_target))
    }

    fn run_script(&self, script: &Script) -> Result<Value> {
        match script {
            Script::Table { selector } => self.first(selector, table_rows)?,
            Script::Records { scope, fields } => {
                let fields = fields
                    .iter()
                    .map(|field| Ok((field, parse_selector(&field.selector)?)))
                    .collect::<Result<Vec<_>>>()?;
                let records = self.query(scope, |element| record_object(element, &fields))?;
                Ok(Value::Array(records))
            }
        }
    }
}

#[async_trait]
impl RendererSession for HttpSession {
    async fn run(&mut self, step: &Step) -> Result<Value> {
        match step {
            Step::Navigate(url) => self.navigate(url).await,
            // A fetched document never changes, so the element is either
            // there already or will never appear.
            Step::WaitVisible { selector, .. } => {
                self.first(selector, |_| ())?;
                Ok(Value::Null)
            }
            Step::ScrollToBottom => {
                self.ensure_loaded()?;
                if let Some(link) = self.load_more_link()? {
                    self.append(&link).await?;
                }
                Ok(Value::Null)
            }
            Step::Pause(duration) => {
                tokio::time::sleep(*duration).await;
                Ok(Value::Null)
            }
            Step::Click(selector) => {
                let link = self.first(selector, link_target)?;
                if let Some(link) = link {
                    self.append(&link).await?;
                }
                Ok(Value::Null)
            }
            Step::Text(selector) => self.first(selector, element_text).map(Value::String),
            Step::TextAll(selector) => {
                let texts = self.query(selector, element_text)?;
                Ok(Value::Array(texts.into_iter().map(Value::String).collect()))
            }
            Step::Attr { selector, attr } => {
                let value = self.first(selector, |e| e.value().attr(attr).map(str::to_string))?;
                Ok(value.map(Value::String).unwrap_or(Value::Null))
            }
            Step::AttrAll { selector, attr } => {
                let values = self.query(selector, |e| e.value().attr(attr).map(str::to_string))?;
                Ok(Value::Array(values.into_iter().flatten().map(Value::String).collect()))
            }
            Step::Script(script) => self.run_script(script),
        }
    }

    async fn close(&mut self) -> Result<()> {
        self.client = None;
        self.pages.clear();
        self.loaded.clear();
        self.base = None;
        Ok(())
    }
}

fn parse_selector(selector: &str) -> Result<Selector> {
    Selector::parse(selector).map_err(|e| ScanError::InvalidSelector(format!("{}: {}", selector, e)))
}

/// Whitespace-collapsed text content.
fn element_text(element: ElementRef<'_>) -> String {
    element.text().flat_map(str::split_whitespace).collect::<Vec<_>>().join(" ")
}

/// Link a trigger element points at, if any.
fn link_target(element: ElementRef<'_>) -> Option<String> {
    ["data-href", "data-url", "href"]
        .iter()
        .filter_map(|name| element.value().attr(name))
        .map(str::trim)
        .find(|href| !href.is_empty() && !href.starts_with('#') && !href.starts_with("javascript:"))
        .map(str::to_string)
}

/// Header row becomes the keys, every later row one object.
fn table_rows(table: ElementRef<'_>) -> Result<Value> {
    let row_selector = parse_selector("tr")?;
    let cell_selector = parse_selector("th, td")?;

    let mut rows = table.select(&row_selector);
    let headers: Vec<String> = match rows.next() {
        Some(header_row) => header_row.select(&cell_selector).map(element_text).collect(),
        None => return Ok(Value::Array(Vec::new())),
    };

    let body = rows
        .map(|row| {
            let mut object = Map::new();
            for (i, cell) in row.select(&cell_selector).enumerate() {
                let key = headers
                    .get(i)
                    .filter(|h| !h.is_empty())
                    .cloned()
                    .unwrap_or_else(|| format!("col{}", i));
                object.insert(key, Value::String(element_text(cell)));
            }
            Value::Object(object)
        })
        .filter(|row| row.as_object().is_some_and(|o| !o.is_empty()))
        .collect();
    Ok(Value::Array(body))
}

fn record_object(element: ElementRef<'_>, fields: &[(&ScriptField, Selector)]) -> Value {
    let mut object = Map::new();
    for (field, selector) in fields {
        let value = element
            .select(selector)
            .next()
            .and_then(|found| match &field.attr {
                Some(attr) => found.value().attr(attr).map(str::to_string),
                None => Some(element_text(found)),
            })
            .map(Value::String)
            .unwrap_or(Value::Null);
        object.insert(field.name.clone(), value);
    }
    Value::Object(object)
}
