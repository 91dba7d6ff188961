//! Pagination service.
//!
//! Turns a page request into a bounded query against either the ranking
//! index or the recency-ordered post store.

use std::fmt;
use std::sync::Arc;

use agora_common::AppResult;
use agora_common::config::PaginationConfig;
use agora_db::repositories::PostRepository;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::services::ranking::RankingService;

/// Largest offset a listing query may use.
const MAX_OFFSET: u64 = i64::MAX as u64;

/// Listing order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ListOrder {
    /// By aggregate score.
    Hot,
    /// Newest first.
    #[default]
    New,
}

impl ListOrder {
    /// Parse a query value. Anything unrecognized falls back to `New`.
    #[must_use]
    pub fn parse(value: Option<&str>) -> Self {
        match value.map(str::to_ascii_lowercase).as_deref() {
            Some("hot" | "score") => Self::Hot,
            _ => Self::New,
        }
    }
}

impl fmt::Display for ListOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hot => f.write_str("hot"),
            Self::New => f.write_str("new"),
        }
    }
}

/// Raw page request as received from a caller.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageRequest {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub order: Option<String>,
}

/// Page request after clamping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageBounds {
    pub page: u64,
    pub page_size: u64,
    pub offset: u64,
    pub order: ListOrder,
}

/// One page of post IDs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    pub ids: Vec<i64>,
    pub total: u64,
    pub page: u64,
    pub page_size: u64,
    pub order: ListOrder,
}

/// Store of post IDs ordered newest first.
#[async_trait]
pub trait RecencySource: Send + Sync {
    /// Post IDs, newest first.
    async fn recent_ids(&self, offset: u64, limit: u64) -> AppResult<Vec<i64>>;

    /// Number of posts.
    async fn total(&self) -> AppResult<u64>;
}

#[async_trait]
impl RecencySource for PostRepository {
    async fn recent_ids(&self, offset: u64, limit: u64) -> AppResult<Vec<i64>> {
        self.find_recent_ids(offset, limit).await
    }

    async fn total(&self) -> AppResult<u64> {
        self.count().await
    }
}

/// Pagination service for listings.
#[derive(Clone)]
pub struct PaginationService {
    ranking: RankingService,
    recency: Arc<dyn RecencySource>,
    default_page_size: u64,
    max_page_size: u64,
}

impl PaginationService {
    /// Create a new pagination service.
    #[must_use]
    pub fn new(
        ranking: RankingService,
        recency: Arc<dyn RecencySource>,
        config: &PaginationConfig,
    ) -> Self {
        let max_page_size = config.max_page_size.max(1);
        Self {
            ranking,
            recency,
            default_page_size: config.default_page_size.clamp(1, max_page_size),
            max_page_size,
        }
    }

    /// Clamp a raw request into valid bounds.
    ///
    /// Page numbers below 1 become 1. Missing or non-positive sizes use the
    /// default; larger ones are capped at the maximum. The offset never
    /// exceeds `i64::MAX`, the largest value SQL backends accept.
    #[must_use]
    pub fn resolve(&self, request: &PageRequest) -> PageBounds {
        let page = request
            .page
            .and_then(|p| u64::try_from(p).ok())
            .unwrap_or(1)
            .max(1);

        let page_size = request
            .limit
            .and_then(|l| u64::try_from(l).ok())
            .filter(|l| *l > 0)
            .map_or(self.default_page_size, |l| l.min(self.max_page_size));

        PageBounds {
            page,
            page_size,
            offset: (page - 1).saturating_mul(page_size).min(MAX_OFFSET),
            order: ListOrder::parse(request.order.as_deref()),
        }
    }

    /// Fetch one page of post IDs.
    pub async fn list(&self, request: &PageRequest) -> AppResult<Page> {
        let bounds = self.resolve(request);

        let total = match bounds.order {
            ListOrder::Hot => self.ranking.cardinality().await?,
            ListOrder::New => self.recency.total().await?,
        };

        // Past the end there is nothing to fetch.
        let ids = if bounds.offset >= total {
            Vec::new()
        } else {
            match bounds.order {
                ListOrder::Hot => {
                    self.ranking
                        .top_by_score(bounds.offset, bounds.page_size)
                        .await?
                }
                ListOrder::New => {
                    self.recency
                        .recent_ids(bounds.offset, bounds.page_size)
                        .await?
                }
            }
        };

        Ok(Page {
            ids,
            total,
            page: bounds.page,
            page_size: bounds.page_size,
            order: bounds.order,
        })
    }
}
