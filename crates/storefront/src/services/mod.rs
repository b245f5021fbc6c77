//! Business logic services for the storefront.
//!
//! # Services
//!
//! - `auth` - Password registration and login
//! - `checkout` - Cart pricing and order placement
//! - `orders` - Status changes and the payouts they trigger
//! - `loyalty` - Points balance and reward redemption
//! - `referrals` - Referral codes
//! - `settings` - Cached settings singletons

pub mod auth;
pub mod checkout;
pub mod loyalty;
pub mod orders;
pub mod referrals;
pub mod settings;
