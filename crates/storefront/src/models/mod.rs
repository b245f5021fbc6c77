//! Domain models for the storefront.
//!
//! Row types map database rows, input types carry validated request bodies
//! and view types are what the API serializes.

pub mod category;
pub mod content;
pub mod loyalty;
pub mod order;
pub mod product;
pub mod referral;
pub mod session;
pub mod settings;
pub mod user;

use canopy_core::slugify;
use serde::Deserialize;

pub use category::{Category, CategoryInput};
pub use content::{Page, PageInput, Post, PostInput, Seo};
pub use loyalty::{LoyaltyCoupon, LoyaltyReward, LoyaltyRewardInput};
pub use order::{Order, OrderItem, ShippingAddress, ShippingMethod, TrackingEvent};
pub use product::{Product, ProductInput, ProductView};
pub use referral::Referral;
pub use session::{CurrentUser, keys as session_keys};
pub use settings::{LoyaltyConfig, Navigation, PaymentSettings, SettingsDocument, ShippingSettings};
pub use user::User;

/// Default page size for listings.
pub const DEFAULT_LIMIT: u32 = 12;

/// Largest page size a client may request.
pub const MAX_LIMIT: u32 = 100;

/// Request body failed validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct ValidationError(pub String);

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// `?page=&limit=` query parameters.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct Paging {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl Paging {
    /// One-based page number.
    #[must_use]
    pub fn page(&self) -> u32 {
        self.page.unwrap_or(1).max(1)
    }

    /// Page size, clamped to `1..=MAX_LIMIT`.
    #[must_use]
    pub fn limit(&self) -> u32 {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
    }

    /// Rows to skip.
    #[must_use]
    pub fn offset(&self) -> i64 {
        i64::from(self.page() - 1) * i64::from(self.limit())
    }
}

/// Slug for a new or renamed document.
///
/// A supplied slug wins but is normalized the same way as a derived one.
///
/// # Errors
///
/// Returns `ValidationError` when nothing URL-safe is left.
pub fn resolve_slug(title: &str, supplied: Option<&str>) -> Result<String, ValidationError> {
    let source = supplied.filter(|s| !s.trim().is_empty()).unwrap_or(title);
    let slug = slugify(source);
    if slug.is_empty() {
        return Err(ValidationError::new(
            "slug must contain at least one letter or digit",
        ));
    }
    Ok(slug)
}

/// Reject blank required text fields.
///
/// # Errors
///
/// Returns `ValidationError` naming `field`.
pub fn require_text(field: &str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError(format!("{field} is required")));
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_paging_defaults_and_clamps() {
        let paging = Paging::default();
        assert_eq!((paging.page(), paging.limit(), paging.offset()), (1, 12, 0));

        let paging = Paging {
            page: Some(3),
            limit: Some(500),
        };
        assert_eq!(paging.limit(), MAX_LIMIT);
        assert_eq!(paging.offset(), 200);

        let paging = Paging {
            page: Some(0),
            limit: Some(0),
        };
        assert_eq!((paging.page(), paging.limit()), (1, 1));
    }

    #[test]
    fn test_resolve_slug() {
        assert_eq!(resolve_slug("Blue Dream 3.5g", None).unwrap_or_default(), "blue-dream-35g");
        assert_eq!(
            resolve_slug("ignored", Some("Custom Slug")).unwrap_or_default(),
            "custom-slug"
        );
        assert_eq!(resolve_slug("Title", Some("  ")).unwrap_or_default(), "title");
        assert!(resolve_slug("!!!", None).is_err());
    }

    #[test]
    fn test_require_text() {
        assert!(require_text("name", "Gummies").is_ok());
        assert_eq!(
            require_text("name", "   ").unwrap_err().to_string(),
            "name is required"
        );
    }
}
