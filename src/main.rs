mod background;
mod categorize;
mod envelope;
mod error;
mod fetcher;
mod model;
mod normalize;
mod paginator;
mod render;
mod settings;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tracing::error;

use categorize::CategorizedReport;
use envelope::Envelope;
use error::PipelineError;
use fetcher::{HttpPageFetcher, PageSource};
use model::{CanonicalRecord, CollectedBatch, PageSnapshot};
use render::chromium::ChromiumRenderer;
use render::{RenderedFeed, ScrapeOutcome, ScrapeTarget};
use settings::Settings;

#[derive(Parser)]
#[command(name = "catalog_harvest", about = "Paginated product catalog collector")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch a single listing page
    Page {
        #[arg(short, long, default_value = "all")]
        category: String,
        #[arg(short, long, default_value_t = 1)]
        page: u32,
        #[arg(short = 's', long, default_value_t = 3)]
        page_size: u32,
    },
    /// Collect every page of a category and normalize the products
    Collect {
        #[arg(short, long, default_value = "all")]
        category: String,
        /// Products per page (default: CATALOG_PAGE_SIZE or 10)
        #[arg(short = 's', long)]
        page_size: Option<u32>,
        /// Fail instead of fetching more than this many pages
        #[arg(short = 'n', long)]
        max_pages: Option<u32>,
        /// Print a table instead of JSON
        #[arg(long)]
        table: bool,
        /// Also write the JSON result to this file in the background
        #[arg(long)]
        snapshot: Option<PathBuf>,
    },
    /// Collect every page and split products into price tiers, offers and top rated
    Categorize {
        #[arg(short, long, default_value = "all")]
        category: String,
        #[arg(short = 's', long)]
        page_size: Option<u32>,
        #[arg(short = 'n', long)]
        max_pages: Option<u32>,
        #[arg(long)]
        snapshot: Option<PathBuf>,
    },
    /// Scrape the storefront through headless Chromium
    Render {
        /// Page to render (default: CATALOG_RENDER_URL)
        #[arg(short, long)]
        url: Option<String>,
        #[arg(long)]
        table: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let mut settings = Settings::load().context("Failed to load CATALOG_* settings")?;
    let mut pending = Vec::new();

    let success = match cli.command {
        Commands::Page {
            category,
            page,
            page_size,
        } => {
            let result = fetch_single_page(&settings, &category, page, page_size).await;
            emit(&finish(result), false, |_| {})?
        }
        Commands::Collect {
            category,
            page_size,
            max_pages,
            table,
            snapshot,
        } => {
            apply_overrides(&mut settings, page_size, max_pages);
            let result = collect(&settings, &category).await;
            let envelope = finish(result);
            if let Some(path) = snapshot {
                pending.push(background::dispatch_snapshot(path, envelope.to_json()?));
            }
            emit(&envelope, table, |batch| {
                print_table(&batch.products);
                println!(
                    "\n{} products | category: {} | {} pages",
                    batch.total_products, batch.category, batch.pages_processed
                );
            })?
        }
        Commands::Categorize {
            category,
            page_size,
            max_pages,
            snapshot,
        } => {
            apply_overrides(&mut settings, page_size, max_pages);
            let result = collect(&settings, &category)
                .await
                .map(|batch| categorize::categorize(&batch.products, &batch.category));
            let envelope: Envelope<CategorizedReport> = finish(result);
            if let Some(path) = snapshot {
                pending.push(background::dispatch_snapshot(path, envelope.to_json()?));
            }
            emit(&envelope, false, |_| {})?
        }
        Commands::Render { url, table } => {
            if let Some(url) = url {
                settings.render_url = url;
            }
            let renderer = ChromiumRenderer::new(&settings);
            let target = ScrapeTarget::from_settings(&settings);
            let result = render::scrape(&renderer, &target)
                .await
                .map(ScrapeOutcome::normalized);
            emit(&finish(result), table, |feed: &RenderedFeed| {
                print_table(&feed.products);
                println!(
                    "\n{} products from {} in {}ms",
                    feed.metadata.total_found, feed.metadata.url, feed.metadata.scraping_time_ms
                );
            })?
        }
    };

    background::drain(pending, settings.snapshot_grace()).await;

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        eprintln!("\nDone in {}", format_duration(elapsed));
    }

    Ok(if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn apply_overrides(settings: &mut Settings, page_size: Option<u32>, max_pages: Option<u32>) {
    if let Some(size) = page_size {
        settings.page_size = size;
    }
    if max_pages.is_some() {
        settings.max_pages = max_pages;
    }
}

async fn fetch_single_page(
    settings: &Settings,
    category: &str,
    page: u32,
    page_size: u32,
) -> Result<PageSnapshot, PipelineError> {
    let fetcher = HttpPageFetcher::new(settings)?;
    let result = fetcher.fetch_page(page, category, page_size).await?;
    let products = normalize::normalize_batch(&result.products);
    Ok(PageSnapshot {
        page_number: page,
        category: category.to_string(),
        page_size,
        product_count: products.len(),
        products,
    })
}

async fn collect(settings: &Settings, category: &str) -> Result<CollectedBatch, PipelineError> {
    settings.validate()?;
    let fetcher = HttpPageFetcher::new(settings)?;

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] {msg} ({pos} fetched)")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    let collection =
        paginator::collect_all(&fetcher, category, settings.page_size, settings.max_pages, &pb).await;
    pb.finish_and_clear();
    let collection = collection?;

    let products = normalize::normalize_batch(&collection.items);
    Ok(CollectedBatch {
        scraped_at: Utc::now(),
        category: category.to_string(),
        total_products: products.len(),
        pages_processed: collection.pages_visited,
        products,
    })
}

/// Log the full error and wrap the outcome for the caller.
fn finish<T: Serialize>(result: Result<T, PipelineError>) -> Envelope<T> {
    if let Err(e) = &result {
        error!("Pipeline failed: {}", e);
    }
    Envelope::from_result(result)
}

/// Print the envelope (or a table for a successful result when asked) and
/// report whether it was a success.
fn emit<T: Serialize>(
    envelope: &Envelope<T>,
    table: bool,
    print: impl FnOnce(&T),
) -> anyhow::Result<bool> {
    match envelope {
        Envelope::Success { data, .. } if table => print(data),
        _ => println!("{}", envelope.to_json()?),
    }
    Ok(envelope.is_success())
}

fn print_table(products: &[CanonicalRecord]) {
    println!(
        "{:>3} | {:<10} | {:<28} | {:>12} | {:>6} | {:>7} | {:<5}",
        "#", "ID", "Name", "Price", "Rating", "Reviews", "Offer"
    );
    println!("{}", "-".repeat(90));

    for (i, p) in products.iter().enumerate() {
        println!(
            "{:>3} | {:<10} | {:<28} | {:>12} | {:>6.1} | {:>7} | {:<5}",
            i + 1,
            truncate(&p.id, 10),
            truncate(&p.name, 28),
            format_won(p.price),
            p.rating,
            p.review_count,
            if p.special_offer { "Y" } else { "" }
        );
    }
}

/// Won amount with thousands separators, e.g. `₩129,000`.
fn format_won(price: f64) -> String {
    let whole = price.round() as u64;
    let digits = whole.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    format!("₩{}", out)
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
