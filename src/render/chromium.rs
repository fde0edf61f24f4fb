use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::error::CdpError;
use chromiumoxide::Page;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::{RenderSession, Renderer};
use crate::error::{PipelineError, Result};
use crate::settings::Settings;

const WINDOW_WIDTH: u32 = 1280;
const WINDOW_HEIGHT: u32 = 720;
const READY_POLL_INTERVAL: Duration = Duration::from_millis(250);
/// How long a browser that accepted `Browser.close` gets to exit before it is killed.
const BROWSER_EXIT_GRACE: Duration = Duration::from_secs(5);

/// Launches a fresh headless Chromium for every session.
pub struct ChromiumRenderer {
    user_agent: String,
    request_timeout: Duration,
}

impl ChromiumRenderer {
    pub fn new(settings: &Settings) -> Self {
        Self {
            user_agent: settings.user_agent.clone(),
            request_timeout: settings.request_timeout(),
        }
    }
}

#[async_trait]
impl Renderer for ChromiumRenderer {
    async fn open(&self) -> Result<Box<dyn RenderSession>> {
        Ok(Box::new(self.launch().await?))
    }
}

impl ChromiumRenderer {
    async fn launch(&self) -> Result<ChromiumSession> {
        let config = BrowserConfig::builder()
            .no_sandbox()
            .arg("--disable-setuid-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg(format!("--user-agent={}", self.user_agent))
            .window_size(WINDOW_WIDTH, WINDOW_HEIGHT)
            .request_timeout(self.request_timeout)
            .build()
            .map_err(|e| PipelineError::Session(format!("invalid browser config: {}", e)))?;

        debug!("Launching headless Chromium");
        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| PipelineError::Session(format!("failed to launch browser: {}", e)))?;

        // The CDP connection only makes progress while its handler is polled.
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("CDP handler stopped: {}", e);
                    break;
                }
            }
        });

        let opened = browser.new_page("about:blank").await;
        let mut session = ChromiumSession {
            browser: Some(browser),
            page: None,
            handler,
        };

        match opened {
            Ok(page) => {
                session.page = Some(page);
                Ok(session)
            }
            Err(e) => {
                if let Err(close_err) = Box::new(session).close().await {
                    warn!("Cleanup after failed tab creation: {}", close_err);
                }
                Err(PipelineError::Session(format!("failed to open tab: {}", e)))
            }
        }
    }
}

/// Browser plus one tab. Closed explicitly through `RenderSession::close`;
/// if dropped without closing, the handler task is aborted and chromiumoxide
/// kills the browser process.
pub struct ChromiumSession {
    browser: Option<Browser>,
    page: Option<Page>,
    handler: JoinHandle<()>,
}

impl ChromiumSession {
    fn page(&self) -> Result<&Page> {
        self.page
            .as_ref()
            .ok_or_else(|| PipelineError::Session("tab already closed".into()))
    }
}

#[async_trait]
impl RenderSession for ChromiumSession {
    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<()> {
        let page = self.page()?;
        let timed_out = || PipelineError::RenderTimeout {
            what: format!("navigation to {}", url),
            secs: timeout.as_secs(),
        };
        match tokio::time::timeout(timeout, page.goto(url)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(CdpError::Timeout)) | Err(_) => Err(timed_out()),
            Ok(Err(e)) => Err(PipelineError::Session(format!("navigation to {} failed: {}", url, e))),
        }
    }

    async fn wait_for(&mut self, selector: &str, timeout: Duration) -> Result<()> {
        let page = self.page()?;
        match tokio::time::timeout(timeout, poll_presence(page, selector)).await {
            Ok(checked) => checked,
            Err(_) => Err(PipelineError::RenderTimeout {
                what: format!("selector {:?}", selector),
                secs: timeout.as_secs(),
            }),
        }
    }

    async fn content(&mut self) -> Result<String> {
        self.page()?
            .content()
            .await
            .map_err(|e| PipelineError::Session(format!("failed to read page HTML: {}", e)))
    }

    async fn close(self: Box<Self>) -> Result<()> {
        let mut this = self;
        let mut failures = Vec::new();

        if let Some(page) = this.page.take() {
            if let Err(e) = page.close().await {
                failures.push(format!("tab: {}", e));
            }
        }
        if let Some(mut browser) = this.browser.take() {
            // A dead CDP connection cannot deliver Browser.close, so the
            // process would never exit on its own.
            let exited = match browser.close().await {
                Ok(_) => match tokio::time::timeout(BROWSER_EXIT_GRACE, browser.wait()).await {
                    Ok(Ok(_)) => true,
                    Ok(Err(e)) => {
                        failures.push(format!("browser process: {}", e));
                        false
                    }
                    Err(_) => {
                        failures.push(format!(
                            "browser still running after {}s",
                            BROWSER_EXIT_GRACE.as_secs()
                        ));
                        false
                    }
                },
                Err(e) => {
                    failures.push(format!("browser: {}", e));
                    false
                }
            };
            if !exited {
                warn!("Killing browser process");
                if let Some(Err(e)) = browser.kill().await {
                    failures.push(format!("kill: {}", e));
                }
            }
        }
        this.handler.abort();

        if failures.is_empty() {
            Ok(())
        } else {
            Err(PipelineError::Session(format!("cleanup failed: {}", failures.join("; "))))
        }
    }
}

impl Drop for ChromiumSession {
    fn drop(&mut self) {
        self.handler.abort();
    }
}

/// Poll until `selector` matches. Absence means "keep waiting"; a failed
/// evaluation means the tab or its connection is gone.
async fn poll_presence(page: &Page, selector: &str) -> Result<()> {
    let script = presence_check(selector);
    loop {
        let present = page
            .evaluate(script.as_str())
            .await
            .map_err(|e| check_failed(selector, e))?
            .into_value::<bool>()
            .map_err(|e| check_failed(selector, e))?;
        if present {
            return Ok(());
        }
        tokio::time::sleep(READY_POLL_INTERVAL).await;
    }
}

fn check_failed(selector: &str, e: impl std::fmt::Display) -> PipelineError {
    PipelineError::Session(format!("ready check for {:?} failed: {}", selector, e))
}

/// JS expression that is `true` once `selector` matches an element.
fn presence_check(selector: &str) -> String {
    let quoted = serde_json::Value::String(selector.to_string());
    format!("document.querySelector({}) !== null", quoted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{scrape, ScrapeTarget};

    #[test]
    fn presence_check_quotes_selector() {
        assert_eq!(presence_check("h3"), r#"document.querySelector("h3") !== null"#);
        assert_eq!(
            presence_check(r#"a[href="x"]"#),
            r#"document.querySelector("a[href=\"x\"]") !== null"#
        );
    }

    fn local_target(dir: &tempfile::TempDir) -> ScrapeTarget {
        let html = std::fs::read_to_string("tests/fixtures/storefront.html").unwrap();
        let path = dir.path().join("index.html");
        std::fs::write(&path, html).unwrap();
        ScrapeTarget {
            url: format!("file://{}", path.display()),
            ready_selector: "h3".into(),
            navigation_timeout: Duration::from_secs(30),
            ready_timeout: Duration::from_secs(15),
            settle: Duration::ZERO,
        }
    }

    #[tokio::test]
    #[ignore = "needs a local Chromium"]
    async fn scrapes_local_storefront() {
        let dir = tempfile::tempdir().unwrap();
        let target = local_target(&dir);
        let renderer = ChromiumRenderer::new(&Settings::default());

        let outcome = scrape(&renderer, &target).await.unwrap();
        assert_eq!(outcome.metadata.total_found, 3);
        assert_eq!(outcome.items.len(), 3);
    }

    #[tokio::test]
    #[ignore = "needs a local Chromium"]
    async fn missing_selector_times_out_and_releases_browser() {
        let dir = tempfile::tempdir().unwrap();
        let mut target = local_target(&dir);
        target.ready_selector = "#never-rendered".into();
        target.ready_timeout = Duration::from_secs(1);
        let renderer = ChromiumRenderer::new(&Settings::default());

        let err = scrape(&renderer, &target).await.unwrap_err();
        assert!(matches!(err, PipelineError::RenderTimeout { .. }));
    }

    #[tokio::test]
    #[ignore = "needs a local Chromium"]
    async fn close_returns_after_connection_loss() {
        let renderer = ChromiumRenderer::new(&Settings::default());
        let session = renderer.launch().await.unwrap();
        session.handler.abort();
        tokio::time::sleep(Duration::from_millis(100)).await;

        let closed = tokio::time::timeout(
            BROWSER_EXIT_GRACE + Duration::from_secs(10),
            Box::new(session).close(),
        )
        .await;
        assert!(closed.is_ok(), "close hung on a dead connection");
    }

    #[tokio::test]
    #[ignore = "needs a local Chromium"]
    async fn lost_connection_is_a_session_error() {
        let renderer = ChromiumRenderer::new(&Settings::default());
        let mut session = renderer.launch().await.unwrap();
        session.handler.abort();
        tokio::time::sleep(Duration::from_millis(100)).await;

        let started = std::time::Instant::now();
        let err = session.wait_for("h3", Duration::from_secs(15)).await.unwrap_err();
        assert!(matches!(err, PipelineError::Session(_)));
        assert!(started.elapsed() < Duration::from_secs(15));
        Box::new(session).close().await.ok();
    }
}
