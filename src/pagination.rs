use serde::{Deserialize, Serialize};

use crate::auth::Token;
use crate::error::Result;
use crate::models::{NormalizedSummary, PageCursor, PageRequest};
use crate::search::{SearchBackend, search_page};

pub const DEFAULT_MAX_PAGES: u32 = 2;
pub const DEFAULT_PAGE_SIZE: u32 = 50;
pub const DEFAULT_SORT: &str = "score";

/// How many result pages one turn may fetch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum PaginationPolicy {
    /// Page 0 only, with the API's default page size and ordering
    SinglePage,
    /// Follow `next_page` but never fetch more than `max_pages` pages in total
    BoundedMultiPage {
        #[serde(default = "default_max_pages")]
        max_pages: u32,
        #[serde(default = "default_page_size")]
        page_size: u32,
        #[serde(default = "default_sort")]
        sort: String,
    },
}

fn default_max_pages() -> u32 {
    DEFAULT_MAX_PAGES
}

fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

fn default_sort() -> String {
    DEFAULT_SORT.to_string()
}

impl PaginationPolicy {
    /// Two pages of 50, sorted by relevance score
    pub fn bounded_default() -> Self {
        Self::BoundedMultiPage {
            max_pages: DEFAULT_MAX_PAGES,
            page_size: DEFAULT_PAGE_SIZE,
            sort: DEFAULT_SORT.to_string(),
        }
    }

    pub fn max_pages(&self) -> u32 {
        match self {
            Self::SinglePage => 1,
            Self::BoundedMultiPage { max_pages, .. } => *max_pages,
        }
    }

    /// Has no effect on `SinglePage`
    pub fn with_max_pages(self, max_pages: u32) -> Self {
        match self {
            Self::SinglePage => Self::SinglePage,
            Self::BoundedMultiPage {
                page_size, sort, ..
            } => Self::BoundedMultiPage {
                max_pages,
                page_size,
                sort,
            },
        }
    }

    fn request(&self, query: &str, cursor: &PageCursor) -> PageRequest {
        match self {
            Self::SinglePage => PageRequest {
                query: query.to_string(),
                page_size: None,
                sort: None,
                page: None,
            },
            Self::BoundedMultiPage {
                page_size, sort, ..
            } => PageRequest {
                query: query.to_string(),
                page_size: Some(*page_size),
                sort: Some(sort.clone()),
                page: Some(cursor.page),
            },
        }
    }
}

/// Drives repeated search calls and accumulates normalized summaries
#[derive(Debug, Clone)]
pub struct PaginationDriver {
    policy: PaginationPolicy,
    include_record_number: bool,
}

impl PaginationDriver {
    pub fn new(policy: PaginationPolicy, include_record_number: bool) -> Self {
        Self {
            policy,
            include_record_number,
        }
    }

    pub fn policy(&self) -> &PaginationPolicy {
        &self.policy
    }

    /// Summaries in page-fetch order, then record order within each page
    pub async fn collect(
        &self,
        backend: &dyn SearchBackend,
        token: &Token,
        query: &str,
    ) -> Result<Vec<NormalizedSummary>> {
        let max_pages = self.policy.max_pages();
        let mut cursor = PageCursor {
            page: 0,
            page_size: match &self.policy {
                PaginationPolicy::SinglePage => None,
                PaginationPolicy::BoundedMultiPage { page_size, .. } => Some(*page_size),
            },
            has_next: false,
        };
        let mut summaries = Vec::new();
        let mut fetched = 0;

        loop {
            let request = self.policy.request(query, &cursor);
            let page = search_page(backend, token, &request, self.include_record_number).await?;
            fetched += 1;
            cursor.has_next = page.has_next;
            summaries.extend(page.summaries);

            if !cursor.has_next || fetched >= max_pages {
                break;
            }
            cursor.page += 1;
        }

        tracing::info!(
            "Collected {} summaries over {} page(s) for query {:?} (has_next={})",
            summaries.len(),
            fetched,
            query,
            cursor.has_next
        );
        Ok(summaries)
    }
}
