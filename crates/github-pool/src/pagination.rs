//! Pagination aggregation
//!
//! Page 1 is fetched first because only its `Link` header says how many pages
//! exist. Pages 2..=last are then requested concurrently, each as its own
//! logical request through the executor, so the fan-out is bounded by the
//! same admission control as everything else. Results are concatenated in
//! page order regardless of which page finished first.

use futures_util::future::join_all;
use github_api::constants::PER_PAGE;
use github_api::{ApiRequest, Call, link};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::Result;
use crate::executor::Executor;

/// Upper bound on the page count a `Link` header may announce. At 100 items
/// per page this covers a million items; anything larger is treated as
/// corrupt metadata.
pub const MAX_PAGES: u32 = 10_000;

/// Something that can produce the call for any page of a collection and
/// extract that page's items.
pub trait PageSource: Send + Sync {
    type Page: Call;

    /// Call for 1-based page `page`.
    fn page(&self, page: u32) -> Self::Page;

    /// Items contained in one page body.
    fn items(&self, body: Value) -> Vec<Value>;
}

/// A paginated GitHub endpoint.
#[derive(Debug, Clone)]
pub struct Collection {
    request: ApiRequest,
    /// Field holding the array (`items` for search), `None` for bare arrays.
    items_field: Option<&'static str>,
}

impl Collection {
    /// Collection over `request`, asking for the maximum page size.
    pub fn new(request: ApiRequest) -> Self {
        Self {
            request: request.query("per_page", PER_PAGE),
            items_field: None,
        }
    }

    /// Read items from `field` of each page body instead of the body itself.
    pub fn items_in(mut self, field: &'static str) -> Self {
        self.items_field = Some(field);
        self
    }

    pub fn request(&self) -> &ApiRequest {
        &self.request
    }
}

impl PageSource for Collection {
    type Page = ApiRequest;

    fn page(&self, page: u32) -> ApiRequest {
        self.request.page(page)
    }

    fn items(&self, body: Value) -> Vec<Value> {
        let body = match self.items_field {
            Some(field) => match body {
                Value::Object(mut map) => map.remove(field).unwrap_or(Value::Null),
                _ => Value::Null,
            },
            None => body,
        };
        match body {
            Value::Array(items) => items,
            Value::Null => Vec::new(),
            other => {
                warn!(
                    path = self.request.path(),
                    kind = json_kind(&other),
                    "collection page is not an array, ignoring"
                );
                Vec::new()
            }
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Number of pages announced by a first page's `Link` header.
///
/// No header means a single page. A header that cannot be parsed, or that
/// announces more than [`MAX_PAGES`], also yields 1: the caller gets page 1
/// rather than an error.
pub fn page_count(link: Option<&str>) -> u32 {
    match link {
        None => 1,
        Some(link) => match link::last_page(link) {
            Ok(last) if last > MAX_PAGES => {
                warn!(
                    last,
                    max_pages = MAX_PAGES,
                    "pagination metadata announces too many pages, returning first page only"
                );
                1
            }
            Ok(last) => last.max(1),
            Err(e) => {
                warn!(error = %e, "unparsable pagination metadata, returning first page only");
                1
            }
        },
    }
}

impl Executor {
    /// Fetch every page of `source` and concatenate the items in page order.
    pub async fn fetch_all<S: PageSource>(&self, source: &S) -> Result<Vec<Value>> {
        let first_call = source.page(1);
        let first = self.execute(&first_call).await?;
        let last = page_count(first.link.as_deref());
        let mut items = source.items(first.body);
        metrics::counter!("github_pool_pages_fetched_total").increment(1);

        if last <= 1 {
            return Ok(items);
        }

        debug!(
            call = %first_call.describe(),
            pages = last,
            "fetching remaining pages concurrently"
        );
        let pages: Vec<S::Page> = (2..=last).map(|n| source.page(n)).collect();
        let responses = join_all(pages.iter().map(|page| self.execute(page))).await;
        metrics::counter!("github_pool_pages_fetched_total").increment(u64::from(last - 1));

        for response in responses {
            items.extend(source.items(response?.body));
        }
        Ok(items)
    }
}
