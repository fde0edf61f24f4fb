use indicatif::ProgressBar;
use tracing::info;

use crate::error::{PipelineError, Result};
use crate::fetcher::PageSource;
use crate::model::Collection;

/// Walk the listing from page 1 until a page comes back empty or reports no
/// next page, accumulating items in page order.
///
/// Without `max_pages` this trusts the source's `hasNextPage` completely; a
/// source that always reports more pages keeps the loop running forever.
/// With a ceiling, reaching it while the source still reports more pages
/// fails with `PaginationLimitExceeded`. Any page failure aborts the whole
/// collection and the items gathered so far are dropped.
pub async fn collect_all<S>(
    source: &S,
    category: &str,
    page_size: u32,
    max_pages: Option<u32>,
    progress: &ProgressBar,
) -> Result<Collection>
where
    S: PageSource + ?Sized,
{
    if page_size == 0 {
        return Err(PipelineError::Config("page size must be at least 1".into()));
    }
    if max_pages == Some(0) {
        return Err(PipelineError::Config("page ceiling must be at least 1".into()));
    }

    info!("Collecting all products for category {:?}", category);
    let mut items = Vec::new();
    let mut page: u32 = 1;

    loop {
        if let Some(max) = max_pages {
            if page > max {
                return Err(PipelineError::PaginationLimitExceeded { max_pages: max });
            }
        }

        progress.set_message(format!("page {}", page));
        let result = source.fetch_page(page, category, page_size).await?;
        progress.inc(1);

        let count = result.products.len();
        let has_next = result.has_next_page();
        items.extend(result.products);

        if count == 0 {
            info!("Page {}: no products, collection complete", page);
            break;
        }
        if !has_next {
            info!("Page {}: {} products, last page", page, count);
            break;
        }
        info!("Page {}: {} products", page, count);

        page = page
            .checked_add(1)
            .ok_or(PipelineError::PaginationLimitExceeded { max_pages: u32::MAX })?;
    }

    info!("Collected {} products from {} pages", items.len(), page);
    Ok(Collection {
        items,
        pages_visited: page,
    })
}
