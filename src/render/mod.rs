pub mod chromium;
pub mod extract;

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::model::{CanonicalRecord, RawItem};
use crate::normalize::normalize_batch;
use crate::settings::Settings;

/// Something that can start a rendering session (a browser plus one tab).
#[async_trait]
pub trait Renderer: Send + Sync {
    async fn open(&self) -> Result<Box<dyn RenderSession>>;
}

/// One exclusive browser tab. Not shared between scrapes.
#[async_trait]
pub trait RenderSession: Send {
    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<()>;
    /// Resolve once `selector` matches something in the document.
    async fn wait_for(&mut self, selector: &str, timeout: Duration) -> Result<()>;
    async fn content(&mut self) -> Result<String>;
    /// Release the tab and the browser behind it.
    async fn close(self: Box<Self>) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct ScrapeTarget {
    pub url: String,
    pub ready_selector: String,
    pub navigation_timeout: Duration,
    pub ready_timeout: Duration,
    /// Extra wait after the ready selector shows up, for late client-side rendering.
    pub settle: Duration,
}

impl ScrapeTarget {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            url: settings.render_url.clone(),
            ready_selector: settings.ready_selector.clone(),
            navigation_timeout: Duration::from_secs(settings.navigation_timeout_secs),
            ready_timeout: Duration::from_secs(settings.ready_timeout_secs),
            settle: Duration::from_millis(settings.settle_ms),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapeMetadata {
    pub total_found: usize,
    pub scraping_time_ms: u64,
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct ScrapeOutcome {
    pub items: Vec<RawItem>,
    pub metadata: ScrapeMetadata,
}

/// Scrape result after normalization, as handed to the caller.
#[derive(Debug, Clone, Serialize)]
pub struct RenderedFeed {
    pub products: Vec<CanonicalRecord>,
    pub metadata: ScrapeMetadata,
}

impl ScrapeOutcome {
    pub fn normalized(self) -> RenderedFeed {
        RenderedFeed {
            products: normalize_batch(&self.items),
            metadata: self.metadata,
        }
    }
}

/// Render `target` and pull product cards out of the resulting DOM.
///
/// The session is closed whether extraction succeeds or not. A failed close
/// is logged and never replaces the extraction result.
pub async fn scrape(renderer: &dyn Renderer, target: &ScrapeTarget) -> Result<ScrapeOutcome> {
    let started = Instant::now();

    info!("Opening rendering session for {}", target.url);
    let mut session = renderer.open().await?;
    let result = extract_from(&mut *session, target).await;

    match session.close().await {
        Ok(()) => debug!("Rendering session released"),
        Err(e) => warn!("Failed to release rendering session: {}", e),
    }

    let items = result?;
    let elapsed = started.elapsed();
    info!(
        "Scraped {} products from {} in {}ms",
        items.len(),
        target.url,
        elapsed.as_millis()
    );

    Ok(ScrapeOutcome {
        metadata: ScrapeMetadata {
            total_found: items.len(),
            scraping_time_ms: elapsed.as_millis() as u64,
            url: target.url.clone(),
        },
        items,
    })
}

async fn extract_from(session: &mut dyn RenderSession, target: &ScrapeTarget) -> Result<Vec<RawItem>> {
    session.navigate(&target.url, target.navigation_timeout).await?;
    debug!("Waiting for {:?}", target.ready_selector);
    session
        .wait_for(&target.ready_selector, target.ready_timeout)
        .await?;
    if !target.settle.is_zero() {
        tokio::time::sleep(target.settle).await;
    }
    let html = session.content().await?;
    Ok(extract::extract_cards(&html, &target.url))
}
