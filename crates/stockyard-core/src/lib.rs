//! # stockyard-core: Pure Business Rules for Stockyard
//!
//! This crate holds the inventory, procurement and sales rules of Stockyard
//! as pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Stockyard Architecture                           │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    Dashboard (browser)                          │   │
//! │  │    list screens ──► modal forms ──► print / export             │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ JSON over HTTP                         │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    apps/server (axum)                           │   │
//! │  │    auth, submission guard, route handlers                       │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ stockyard-core (THIS CRATE) ★                   │   │
//! │  │                                                                 │   │
//! │  │  ┌────────────┐ ┌────────────┐ ┌────────────┐ ┌────────────┐   │   │
//! │  │  │ purchasing │ │   sales    │ │  payments  │ │    rmc     │   │   │
//! │  │  │ totals     │ │ line totals│ │ status     │ │ mix ratios │   │   │
//! │  │  │ delivery   │ │ completion │ │ PDC        │ │ batch pick │   │   │
//! │  │  └────────────┘ └────────────┘ └────────────┘ └────────────┘   │   │
//! │  │  ┌────────────┐ ┌────────────┐ ┌────────────┐ ┌────────────┐   │   │
//! │  │  │   types    │ │money / qty │ │  listing   │ │ dashboard  │   │   │
//! │  │  └────────────┘ └────────────┘ └────────────┘ └────────────┘   │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                  stockyard-db (Database Layer)                  │   │
//! │  │         SQLite queries, migrations, transactional flows         │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Product, ProductStock, PurchaseOrder, ...)
//! - [`money`] - Money in integer cents
//! - [`quantity`] - Fixed-point quantities (thousandths)
//! - [`error`] - Domain error types
//! - [`validation`] - Field validation
//! - [`input`] - Form bodies for the simple CRUD screens
//! - [`listing`] - Pagination and per-screen list state
//! - [`purchasing`] - Purchase order totals, gates and delivery plans
//! - [`sales`] - Sales order totals, reservation and completion plans
//! - [`payments`] - Payment status and post-dated cheques
//! - [`rmc`] - Ready-mix concrete material derivation
//! - [`dashboard`] - Reporting reductions
//!
//! ## Example Usage
//!
//! ```rust
//! use stockyard_core::rmc::{derive_materials, MaterialOverrides};
//! use stockyard_core::Quantity;
//!
//! // 20 cu.m of concrete
//! let mix = derive_materials(Quantity::from_units(20), &MaterialOverrides::default());
//! assert_eq!(mix.portland_cement_bags, Quantity::from_units(200));
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod dashboard;
pub mod error;
pub mod input;
pub mod listing;
pub mod money;
pub mod payments;
pub mod purchasing;
pub mod quantity;
pub mod rmc;
pub mod sales;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================
// These allow users to do `use stockyard_core::Money` instead of
// `use stockyard_core::money::Money`

pub use error::{CoreError, CoreResult, ValidationError};
pub use listing::{ListState, Page, PageRequest};
pub use money::Money;
pub use quantity::Quantity;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum lines on a single purchase or sales order.
///
/// ## Business Reason
/// Keeps order documents printable on a few pages and stops runaway forms.
pub const MAX_ORDER_ITEMS: usize = 100;

/// Largest quantity on a single line or batch.
///
/// ## Business Reason
/// Catches slipped digits (10000000 bags instead of 1000) and keeps every
/// line total, and the sum of `MAX_ORDER_ITEMS` of them, inside `i64` cents.
pub const MAX_ITEM_QUANTITY: Quantity = Quantity::from_units(1_000_000);

/// Largest unit price, cost or discount in cents (10,000,000.00).
pub const MAX_PRICE_CENTS: i64 = 1_000_000_000;

/// Largest single payment in cents.
pub const MAX_PAYMENT_CENTS: i64 = 100_000_000_000_000;

/// Rows per page when the client does not ask for a size.
pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// Largest page a client may request.
pub const MAX_PAGE_SIZE: u32 = 100;
