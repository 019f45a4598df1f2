//! Paginated list fetcher
//!
//! Walks `?per_page=N&page=P` from page 1 until a short or empty page. The
//! catalog exposes no usable total, so a full page is the only signal that
//! more may follow.

use super::catalog_client::{CatalogClient, FetchOutcome};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

#[derive(Debug, Deserialize)]
struct ListPage {
    #[serde(default)]
    data: Vec<Value>,
}

/// Records gathered from one list endpoint
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PaginatedList {
    pub records: Vec<Value>,
    /// Requests that returned a page body
    pub pages: u32,
    /// True when a page request failed and the list may be incomplete
    pub stopped_on_error: bool,
}

pub struct Paginator {
    client: Arc<CatalogClient>,
    page_size: u32,
    page_delay: Duration,
}

impl Paginator {
    pub fn new(client: Arc<CatalogClient>, page_size: u32, page_delay: Duration) -> Self {
        Self {
            client,
            page_size: page_size.max(1),
            page_delay,
        }
    }

    fn page_url(&self, endpoint: &str, page: u32) -> String {
        let separator = if endpoint.contains('?') { '&' } else { '?' };
        format!(
            "{}{}per_page={}&page={}",
            self.client.url(endpoint),
            separator,
            self.page_size,
            page
        )
    }

    /// Fetch every record of `endpoint`
    ///
    /// A failed page ends the walk; whatever was gathered so far is returned.
    pub async fn fetch_all(&self, endpoint: &str, label: &str) -> PaginatedList {
        info!(list = label, "Fetching machine list");

        let mut list = PaginatedList::default();
        let mut page = 1u32;

        loop {
            let url = self.page_url(endpoint, page);
            let body = match self.client.fetch_json::<ListPage>(&url).await {
                Ok(FetchOutcome::Body(body)) => body,
                Ok(FetchOutcome::Inaccessible) => break,
                Err(e) => {
                    error!(list = label, page, error = %e, "Failed to fetch list page");
                    list.stopped_on_error = true;
                    break;
                }
            };

            list.pages += 1;
            let count = body.data.len();
            list.records.extend(body.data);
            debug!(
                list = label,
                page,
                count,
                total = list.records.len(),
                "Fetched list page"
            );

            if count < self.page_size as usize {
                break;
            }

            page += 1;
            tokio::time::sleep(self.page_delay).await;
        }

        info!(
            list = label,
            total = list.records.len(),
            pages = list.pages,
            "Retrieved machine list"
        );
        list
    }
}
