//! Canopy Core - shared domain types and pure catalog logic.
//!
//! This crate is used by every Canopy component:
//! - `storefront` - The HTTP JSON API (shop + admin back office)
//! - `cli` - Migrations, admin bootstrap and seeding
//!
//! # Architecture
//!
//! The core crate holds types and pure functions only: no database access,
//! no HTTP, no global state. Anything that needs I/O takes it as a
//! parameter (see [`referral::generate_unique`]).
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, emails and status enums
//! - [`pricing`] - Discount percentage, stock status and price ranges
//! - [`slug`] - URL slug generation
//! - [`referral`] - Referral code generation with collision retry

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod pricing;
pub mod referral;
pub mod slug;
pub mod types;

pub use pricing::{Inventory, PriceRange, StockStatus, discount_percentage, stock_status};
pub use referral::ReferralCodeError;
pub use slug::slugify;
pub use types::*;
