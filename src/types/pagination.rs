//! Pagination types for list endpoints.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::config::{DEFAULT_PAGE_NUMBER, DEFAULT_PAGE_SIZE, MAX_PAGE_WINDOW};
use crate::errors::{AppError, AppResult};

/// Requested page; missing or zero values fall back to the defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageRequest {
    pub current: Option<u64>,
    pub page_size: Option<u64>,
}

impl PageRequest {
    pub fn new(current: u64, page_size: u64) -> Self {
        Self {
            current: Some(current),
            page_size: Some(page_size),
        }
    }

    /// 1-indexed page number
    pub fn current(&self) -> u64 {
        self.current
            .filter(|&c| c > 0)
            .unwrap_or(DEFAULT_PAGE_NUMBER)
    }

    pub fn page_size(&self) -> u64 {
        self.page_size
            .filter(|&s| s > 0)
            .unwrap_or(DEFAULT_PAGE_SIZE)
    }

    /// Number of records to skip
    pub fn offset(&self) -> u64 {
        (self.current() - 1).saturating_mul(self.page_size())
    }

    /// Reject pages whose limit or offset the database cannot represent.
    pub fn ensure_in_range(&self) -> AppResult<()> {
        let offset = (self.current() - 1).checked_mul(self.page_size());
        match offset {
            Some(offset) if offset <= MAX_PAGE_WINDOW && self.page_size() <= MAX_PAGE_WINDOW => {
                Ok(())
            }
            _ => Err(AppError::validation("current or pageSize is out of range")),
        }
    }
}

/// Paginated response wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paginated<T> {
    pub records: Vec<T>,
    pub meta: PaginationMeta,
}

/// Pagination metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaginationMeta {
    pub current: u64,
    pub page_size: u64,
    pub total_items: u64,
    pub total_pages: u64,
}

impl<T> Paginated<T> {
    /// Create new paginated response
    pub fn new(records: Vec<T>, page: PageRequest, total_items: u64) -> Self {
        let page_size = page.page_size();
        Self {
            records,
            meta: PaginationMeta {
                current: page.current(),
                page_size,
                total_items,
                total_pages: total_items.div_ceil(page_size),
            },
        }
    }

    pub fn total_pages(&self) -> u64 {
        self.meta.total_pages
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let page = PageRequest::default();
        assert_eq!(page.current(), 1);
        assert_eq!(page.page_size(), 10);
        assert_eq!(page.offset(), 0);
    }

    #[test]
    fn test_zero_falls_back_to_defaults() {
        let page = PageRequest::new(0, 0);
        assert_eq!(page.current(), 1);
        assert_eq!(page.page_size(), 10);
    }

    #[test]
    fn test_offset() {
        assert_eq!(PageRequest::new(3, 5).offset(), 10);
    }

    #[test]
    fn test_range_check() {
        assert!(PageRequest::new(3, 5).ensure_in_range().is_ok());
        assert!(PageRequest::new(1, i64::MAX as u64).ensure_in_range().is_ok());

        let too_large = PageRequest::new(1, u64::MAX).ensure_in_range();
        assert!(matches!(too_large, Err(AppError::Validation(_))));

        let offset_overflow = PageRequest::new(u64::MAX, 10).ensure_in_range();
        assert!(matches!(offset_overflow, Err(AppError::Validation(_))));

        let offset_too_large = PageRequest::new(1 << 62, 4).ensure_in_range();
        assert!(matches!(offset_too_large, Err(AppError::Validation(_))));
    }

    #[test]
    fn test_total_pages_rounds_up() {
        let page = PageRequest::new(1, 10);
        assert_eq!(Paginated::<u8>::new(vec![], page, 0).total_pages(), 0);
        assert_eq!(Paginated::<u8>::new(vec![], page, 1).total_pages(), 1);
        assert_eq!(Paginated::<u8>::new(vec![], page, 10).total_pages(), 1);
        assert_eq!(Paginated::<u8>::new(vec![], page, 11).total_pages(), 2);
    }

    #[test]
    fn test_deserialize_camel_case() {
        let page: PageRequest = serde_urlencoded::from_str("current=2&pageSize=25&name=A").unwrap();
        assert_eq!(page, PageRequest::new(2, 25));
    }

    #[test]
    fn test_meta_serializes_camel_case() {
        let paged = Paginated::new(vec![1u8], PageRequest::new(1, 10), 1);
        let json = serde_json::to_value(&paged).unwrap();
        assert_eq!(json["meta"]["totalPages"], 1);
        assert_eq!(json["meta"]["pageSize"], 10);
    }
}
