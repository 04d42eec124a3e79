//! Listing query parameters, sort keys and pagination metadata

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Default number of rows per page
pub const DEFAULT_PAGE_SIZE: i64 = 20;
/// Upper bound accepted for `limit`
pub const MAX_PAGE_SIZE: i64 = 100;
/// Highest page whose offset still fits in an i64
pub const MAX_PAGE: i64 = i64::MAX / MAX_PAGE_SIZE;

/// Query string accepted by every listing endpoint
#[derive(Debug, Default, Clone, Deserialize, IntoParams, ToSchema)]
pub struct ListQuery {
    /// Case-insensitive substring to search for
    pub query: Option<String>,
    /// One of `newest`, `oldest`, `highestRated`, `available`
    pub sort: Option<String>,
    /// 1-based page number
    pub page: Option<i64>,
    /// Page size
    pub limit: Option<i64>,
}

impl ListQuery {
    /// Search term, trimmed; empty terms mean "no filter"
    pub fn search_term(&self) -> Option<&str> {
        self.query
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
    }

    /// `%term%` pattern for ILIKE
    pub fn like_pattern(&self) -> Option<String> {
        self.search_term().map(|q| format!("%{}%", escape_like(q)))
    }

    pub fn sort_or(&self, default: SortOption) -> SortOption {
        self.sort
            .as_deref()
            .and_then(SortOption::parse)
            .unwrap_or(default)
    }

    pub fn pagination(&self, default_limit: i64) -> Pagination {
        Pagination::new(self.page, self.limit, default_limit)
    }
}

/// Escape LIKE wildcards so user input matches literally
fn escape_like(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Fixed sort keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub enum SortOption {
    Newest,
    Oldest,
    HighestRated,
    Available,
}

impl SortOption {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "newest" => Some(SortOption::Newest),
            "oldest" => Some(SortOption::Oldest),
            "highestRated" => Some(SortOption::HighestRated),
            "available" => Some(SortOption::Available),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SortOption::Newest => "newest",
            SortOption::Oldest => "oldest",
            SortOption::HighestRated => "highestRated",
            SortOption::Available => "available",
        }
    }
}

/// Normalized page/limit pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
}

impl Pagination {
    pub fn new(page: Option<i64>, limit: Option<i64>, default_limit: i64) -> Self {
        Self {
            page: page.unwrap_or(1).clamp(1, MAX_PAGE),
            limit: limit.unwrap_or(default_limit).clamp(1, MAX_PAGE_SIZE),
        }
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }

    pub fn metadata(&self, total_count: i64) -> PageMetadata {
        PageMetadata::new(self.page, self.limit, total_count)
    }
}

/// Page information returned next to listing data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PageMetadata {
    pub total_pages: i64,
    pub has_next_page: bool,
    pub total_count: i64,
    pub current_page: i64,
}

impl PageMetadata {
    pub fn new(page: i64, limit: i64, total_count: i64) -> Self {
        let total_pages = if total_count <= 0 {
            0
        } else {
            (total_count + limit - 1) / limit
        };
        Self {
            total_pages,
            has_next_page: page.saturating_mul(limit) < total_count,
            total_count,
            current_page: page,
        }
    }
}

/// `{data, metadata}` listing payload
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Paginated<T>
where
    T: for<'a> ToSchema<'a>,
{
    pub data: Vec<T>,
    pub metadata: PageMetadata,
}

impl<T> Paginated<T>
where
    T: for<'a> ToSchema<'a>,
{
    pub fn new(data: Vec<T>, pagination: Pagination, total_count: i64) -> Self {
        Self {
            data,
            metadata: pagination.metadata(total_count),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_pagination() {
        let p = ListQuery::default().pagination(DEFAULT_PAGE_SIZE);
        assert_eq!(p, Pagination { page: 1, limit: 20 });
        assert_eq!(p.offset(), 0);
    }

    #[test]
    fn test_pagination_is_clamped() {
        let p = Pagination::new(Some(0), Some(1000), DEFAULT_PAGE_SIZE);
        assert_eq!(p.page, 1);
        assert_eq!(p.limit, MAX_PAGE_SIZE);

        let p = Pagination::new(Some(3), Some(-5), DEFAULT_PAGE_SIZE);
        assert_eq!(p.limit, 1);
        assert_eq!(p.offset(), 2);
    }

    #[test]
    fn test_huge_page_does_not_overflow() {
        let q = ListQuery {
            page: Some(i64::MAX),
            limit: Some(MAX_PAGE_SIZE),
            ..Default::default()
        };
        let p = q.pagination(DEFAULT_PAGE_SIZE);
        assert_eq!(p.page, MAX_PAGE);
        assert!(p.offset() >= 0);

        let m = p.metadata(41);
        assert!(!m.has_next_page);
        assert_eq!(m.total_pages, 1);

        assert!(!PageMetadata::new(i64::MAX, 20, 10).has_next_page);
    }

    #[test]
    fn test_has_next_page() {
        // 41 matches at 20 per page: pages 1 and 2 have a successor, 3 does not
        assert!(PageMetadata::new(1, 20, 41).has_next_page);
        assert!(PageMetadata::new(2, 20, 41).has_next_page);
        assert!(!PageMetadata::new(3, 20, 41).has_next_page);
        assert_eq!(PageMetadata::new(1, 20, 41).total_pages, 3);

        let exact = PageMetadata::new(2, 20, 40);
        assert!(!exact.has_next_page);
        assert_eq!(exact.total_pages, 2);
    }

    #[test]
    fn test_empty_result_metadata() {
        let m = PageMetadata::new(1, 20, 0);
        assert_eq!(m.total_pages, 0);
        assert!(!m.has_next_page);
    }

    #[test]
    fn test_sort_parsing_falls_back() {
        let q = ListQuery {
            sort: Some("highestRated".into()),
            ..Default::default()
        };
        assert_eq!(q.sort_or(SortOption::Available), SortOption::HighestRated);

        let q = ListQuery {
            sort: Some("random".into()),
            ..Default::default()
        };
        assert_eq!(q.sort_or(SortOption::Available), SortOption::Available);
        assert_eq!(ListQuery::default().sort_or(SortOption::Newest), SortOption::Newest);
    }

    #[test]
    fn test_like_pattern() {
        let q = ListQuery {
            query: Some("  dune ".into()),
            ..Default::default()
        };
        assert_eq!(q.like_pattern().as_deref(), Some("%dune%"));

        let q = ListQuery {
            query: Some("100%_".into()),
            ..Default::default()
        };
        assert_eq!(q.like_pattern().as_deref(), Some("%100\\%\\_%"));

        let q = ListQuery {
            query: Some("   ".into()),
            ..Default::default()
        };
        assert!(q.like_pattern().is_none());
    }
}
