//! # Listing
//!
//! Pagination and the per-screen list container.
//!
//! ```text
//! ┌──────────────┐   PageRequest     ┌──────────────┐   Page<T>    ┌──────────────┐
//! │  list screen │ ────────────────► │  repository  │ ───────────► │ ListState<T> │
//! │ page, filter │  count + range    │ COUNT, LIMIT │ items, total │ replace_all  │
//! └──────────────┘                   └──────────────┘              └──────────────┘
//! ```
//!
//! Every filter or page change is a fresh fetch and a full replace. Create,
//! edit and delete responses are folded in with `append`, `merge_by_id` and
//! `remove_by_id`.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::types::{
    AuditLog, Category, OutstandingCheque, Party, Product, ProductStockView,
    PurchaseOrderSummary, SalesOrderSummary, User,
};
use crate::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};

// =============================================================================
// Page Request
// =============================================================================

/// 1-based page request, normalized on construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PageRequest {
    pub page: u32,
    pub page_size: u32,
}

impl PageRequest {
    /// Builds a request, clamping out-of-range values.
    ///
    /// ## Rules
    /// - `page` below 1 becomes 1
    /// - `page_size` defaults to 10, is at least 1 and at most 100
    ///
    /// ## Example
    /// ```rust
    /// use stockyard_core::listing::PageRequest;
    ///
    /// let req = PageRequest::new(Some(3), Some(500));
    /// assert_eq!(req.page_size, 100);
    /// assert_eq!(req.offset(), 200);
    /// ```
    pub fn new(page: Option<u32>, page_size: Option<u32>) -> Self {
        PageRequest {
            page: page.unwrap_or(1).max(1),
            page_size: page_size.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE),
        }
    }

    /// Rows to skip.
    pub fn offset(&self) -> i64 {
        (self.page as i64 - 1) * self.page_size as i64
    }

    /// Rows to fetch.
    pub fn limit(&self) -> i64 {
        self.page_size as i64
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        PageRequest::new(None, None)
    }
}

// =============================================================================
// Page
// =============================================================================

/// One page of results plus what the Previous/Next controls need.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: u32,
    pub page_size: u32,
    pub has_previous: bool,
    pub has_next: bool,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: i64, request: PageRequest) -> Self {
        let shown = request.page as i64 * request.page_size as i64;
        Page {
            items,
            total,
            page: request.page,
            page_size: request.page_size,
            has_previous: request.page > 1,
            has_next: shown < total,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            page_size: self.page_size,
            has_previous: self.has_previous,
            has_next: self.has_next,
        }
    }
}

// =============================================================================
// List State
// =============================================================================

/// Anything a [`ListState`] can key by id.
pub trait HasId {
    fn id(&self) -> &str;
}

macro_rules! impl_has_id {
    ($($ty:ty => $($field:ident).+;)*) => {
        $(impl HasId for $ty {
            fn id(&self) -> &str {
                &self.$($field).+
            }
        })*
    };
}

impl_has_id! {
    Category => id;
    Product => id;
    ProductStockView => stock.id;
    Party => id;
    PurchaseOrderSummary => order.id;
    SalesOrderSummary => order.id;
    User => id;
    AuditLog => id;
    OutstandingCheque => payment.id;
}

/// A list mirrored from query results, owned by one screen.
///
/// Not shared: each screen builds its own from the page it fetched.
#[derive(Debug, Clone)]
pub struct ListState<T> {
    items: Vec<T>,
    total: i64,
}

impl<T: HasId> ListState<T> {
    pub fn new() -> Self {
        ListState {
            items: Vec::new(),
            total: 0,
        }
    }

    pub fn from_page(page: Page<T>) -> Self {
        ListState {
            items: page.items,
            total: page.total,
        }
    }

    /// Replaces everything with a freshly fetched page.
    pub fn replace_all(&mut self, page: Page<T>) {
        self.items = page.items;
        self.total = page.total;
    }

    /// Adds a newly created row.
    pub fn append(&mut self, item: T) {
        self.items.push(item);
        self.total += 1;
    }

    /// Replaces the row with the same id. Returns false if it is not shown.
    pub fn merge_by_id(&mut self, item: T) -> bool {
        match self.items.iter_mut().find(|i| i.id() == item.id()) {
            Some(slot) => {
                *slot = item;
                true
            }
            None => false,
        }
    }

    /// Drops the row with the given id, returning it.
    pub fn remove_by_id(&mut self, id: &str) -> Option<T> {
        let pos = self.items.iter().position(|i| i.id() == id)?;
        self.total = (self.total - 1).max(0);
        Some(self.items.remove(pos))
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn total(&self) -> i64 {
        self.total
    }

    pub fn get(&self, id: &str) -> Option<&T> {
        self.items.iter().find(|i| i.id() == id)
    }
}

impl<T: HasId> Default for ListState<T> {
    fn default() -> Self {
        ListState::new()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
