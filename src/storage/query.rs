//! Paging and sort primitives shared by the stores

use serde::{Deserialize, Serialize};
use crate::errors::{StoreError, StoreResult};

pub const DEFAULT_PAGE_SIZE: usize = 20;
pub const MAX_PAGE_SIZE: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub page: usize,
    pub page_size: usize,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl PageRequest {
    pub fn new(page: usize, page_size: usize) -> StoreResult<Self> {
        let request = Self { page, page_size };
        request.validate()?;
        Ok(request)
    }

    /// Pages start at 1 and must start at an offset a `usize` can hold.
    pub fn validate(&self) -> StoreResult<()> {
        if self.page_size < 1 || self.page_size > MAX_PAGE_SIZE {
            return Err(StoreError::InvalidPageSize {
                page_size: self.page_size,
                max: MAX_PAGE_SIZE,
            });
        }
        if self.page < 1 || self.checked_offset().is_none() {
            return Err(StoreError::InvalidPage { page: self.page });
        }
        Ok(())
    }

    fn checked_offset(&self) -> Option<usize> {
        self.page.checked_sub(1)?.checked_mul(self.page_size)
    }

    fn offset(&self) -> usize {
        self.checked_offset().unwrap_or(usize::MAX)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: usize,
    pub page: usize,
    pub page_size: usize,
    pub has_next: bool,
}

impl<T> Page<T> {
    /// Slices an already filtered and sorted result set.
    pub fn from_sorted(all: Vec<T>, request: PageRequest) -> StoreResult<Self> {
        request.validate()?;
        let total = all.len();
        let offset = request.offset();
        let items: Vec<T> = all.into_iter().skip(offset).take(request.page_size).collect();

        Ok(Self {
            has_next: offset.saturating_add(items.len()) < total,
            items,
            total,
            page: request.page,
            page_size: request.page_size,
        })
    }
}
