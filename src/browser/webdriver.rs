use super::{Browser, Page};
use crate::error::PageError;
use async_trait::async_trait;
use fantoccini::elements::Element;
use fantoccini::{Client, ClientBuilder, Locator};
use serde_json::{Map, Value, json};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use url::Url;

/// How long the resource count must stay flat before the page counts as idle
const NETWORK_QUIET_WINDOW: Duration = Duration::from_millis(500);
const NETWORK_POLL_INTERVAL: Duration = Duration::from_millis(100);

const NETWORK_STATE_SCRIPT: &str = "return [document.readyState, \
     (window.performance && performance.getEntriesByType) \
       ? performance.getEntriesByType('resource').length : 0];";

/// Common WebDriver endpoints tried when the configured one is unreachable
const FALLBACK_WEBDRIVER_URLS: [&str; 4] = [
    "http://localhost:9515", // ChromeDriver default
    "http://localhost:4444", // geckodriver / Selenium default
    "http://localhost:9222", // Chrome debug port default
    "http://127.0.0.1:4444", // Try with IP instead of localhost
];

/// Browser backed by a WebDriver server, one session per page
pub struct WebDriverBrowser {
    webdriver_url: String,
    headless: bool,
    idle: Mutex<Vec<Client>>,
}

impl WebDriverBrowser {
    pub fn new(webdriver_url: &str, headless: bool) -> Self {
        Self {
            webdriver_url: webdriver_url.to_string(),
            headless,
            idle: Mutex::new(Vec::new()),
        }
    }

    fn capabilities(&self) -> Map<String, Value> {
        let mut caps = Map::new();
        if self.headless {
            caps.insert(
                "goog:chromeOptions".to_string(),
                json!({ "args": ["--headless=new", "--disable-gpu", "--window-size=1920,1080"] }),
            );
            caps.insert(
                "moz:firefoxOptions".to_string(),
                json!({ "args": ["-headless"] }),
            );
        }
        caps
    }

    async fn try_connect(&self, url: &str) -> Result<Client, String> {
        let mut builder = ClientBuilder::native();
        builder.capabilities(self.capabilities());
        builder.connect(url).await.map_err(|e| e.to_string())
    }

    /// Connects to the WebDriver instance, falling back to well-known endpoints
    async fn connect(&self) -> Result<Client, PageError> {
        match self.try_connect(&self.webdriver_url).await {
            Ok(client) => {
                ::log::debug!("Connected to WebDriver at {}", self.webdriver_url);
                return Ok(client);
            }
            Err(e) => {
                ::log::error!(
                    "Failed to connect to WebDriver at {}: {}",
                    self.webdriver_url,
                    e
                );
            }
        }

        for url in FALLBACK_WEBDRIVER_URLS {
            if url == self.webdriver_url {
                continue;
            }
            ::log::info!("Trying fallback WebDriver URL: {}", url);
            if let Ok(client) = self.try_connect(url).await {
                ::log::debug!("Connected to fallback WebDriver at {}", url);
                return Ok(client);
            }
        }

        ::log::error!(
            "Make sure a WebDriver server is running or set the WEBDRIVER_URL environment variable"
        );
        Err(PageError::Session(format!(
            "could not connect to any WebDriver server (tried {})",
            self.webdriver_url
        )))
    }
}

#[async_trait]
impl Browser for WebDriverBrowser {
    type Page = WebDriverPage;

    async fn open_page(&self) -> Result<WebDriverPage, PageError> {
        let reused = self.idle.lock().await.pop();
        let client = match reused {
            Some(client) => client,
            None => self.connect().await?,
        };
        Ok(WebDriverPage { client })
    }

    async fn release_page(&self, page: WebDriverPage, healthy: bool) {
        if healthy {
            self.idle.lock().await.push(page.client);
            return;
        }
        if let Err(e) = page.client.close().await {
            ::log::warn!("Failed to close WebDriver session: {}", e);
        }
    }

    async fn close(&self) {
        let clients: Vec<Client> = self.idle.lock().await.drain(..).collect();
        ::log::debug!("Closing {} idle WebDriver sessions", clients.len());
        for client in clients {
            if let Err(e) = client.close().await {
                ::log::warn!("Failed to close WebDriver session: {}", e);
            }
        }
    }
}

/// A page driven through one WebDriver session
pub struct WebDriverPage {
    client: Client,
}

#[async_trait]
impl Page for WebDriverPage {
    type Element = Element;

    async fn navigate(&mut self, url: &Url) -> Result<Url, PageError> {
        self.client
            .goto(url.as_str())
            .await
            .map_err(|e| PageError::Navigation {
                url: url.to_string(),
                reason: e.to_string(),
            })?;
        Ok(self.client.current_url().await?)
    }

    async fn find_elements(&mut self, selector: &str) -> Result<Vec<Element>, PageError> {
        Ok(self.client.find_all(Locator::Css(selector)).await?)
    }

    async fn is_visible(&mut self, element: &Element) -> Result<bool, PageError> {
        Ok(element.is_displayed().await?)
    }

    async fn click(&mut self, element: &Element) -> Result<(), PageError> {
        Ok(element.click().await?)
    }

    async fn text_content(&mut self, element: &Element) -> Result<String, PageError> {
        Ok(element.text().await?)
    }

    async fn attribute(&mut self, element: &Element, name: &str) -> Result<Option<String>, PageError> {
        Ok(element.attr(name).await?)
    }

    async fn scroll_to_bottom(&mut self) -> Result<(), PageError> {
        self.client
            .execute("window.scrollTo(0, document.body.scrollHeight);", vec![])
            .await?;
        Ok(())
    }

    async fn document_height(&mut self) -> Result<u64, PageError> {
        let value = self
            .client
            .execute("return document.body.scrollHeight;", vec![])
            .await?;
        value
            .as_u64()
            .or_else(|| value.as_f64().map(|h| h as u64))
            .ok_or_else(|| PageError::Script(format!("scrollHeight was {}", value)))
    }

    async fn wait_network_idle(&mut self, timeout: Duration) -> Result<bool, PageError> {
        let deadline = Instant::now() + timeout;
        let mut last_count = None;
        let mut quiet_since = Instant::now();

        loop {
            let state = self.client.execute(NETWORK_STATE_SCRIPT, vec![]).await?;
            let ready = state.get(0).and_then(Value::as_str) == Some("complete");
            let count = state.get(1).and_then(Value::as_u64).unwrap_or(0);

            if last_count != Some(count) || !ready {
                last_count = Some(count);
                quiet_since = Instant::now();
            } else if quiet_since.elapsed() >= NETWORK_QUIET_WINDOW {
                return Ok(true);
            }

            if Instant::now() >= deadline {
                ::log::debug!("Network did not settle within {:?}", timeout);
                return Ok(false);
            }
            tokio::time::sleep(NETWORK_POLL_INTERVAL).await;
        }
    }
}
