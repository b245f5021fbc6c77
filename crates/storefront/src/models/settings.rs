//! Settings singletons.
//!
//! Each type is stored as one JSONB row in `settings`, keyed by
//! [`SettingsDocument::KEY`]. Every field has a default so a partially
//! written row still loads.

use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::{ValidationError, require_text};

/// A configuration document with exactly one instance.
pub trait SettingsDocument:
    Serialize + DeserializeOwned + Default + Clone + Send + Sync + 'static
{
    /// Row key in the `settings` table.
    const KEY: &'static str;

    /// Check an admin-submitted document before it replaces the stored one.
    ///
    /// # Errors
    ///
    /// Returns the first violated constraint.
    fn validate(&self) -> Result<(), ValidationError> {
        Ok(())
    }
}

fn non_negative(field: &str, value: Decimal) -> Result<(), ValidationError> {
    if value.is_sign_negative() {
        return Err(ValidationError(format!("{field} must not be negative")));
    }
    Ok(())
}

// =============================================================================
// Shipping
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShippingSettings {
    /// Standard shipping charge.
    pub flat_rate: Decimal,
    /// Standard shipping is free at or above this subtotal (after discount).
    pub free_shipping_threshold: Option<Decimal>,
    pub express_enabled: bool,
    pub express_rate: Decimal,
    pub pickup_enabled: bool,
    pub pickup_location: Option<String>,
    pub estimated_delivery: String,
}

impl Default for ShippingSettings {
    fn default() -> Self {
        Self {
            flat_rate: Decimal::new(999, 2),
            free_shipping_threshold: Some(Decimal::from(75)),
            express_enabled: true,
            express_rate: Decimal::new(1999, 2),
            pickup_enabled: true,
            pickup_location: None,
            estimated_delivery: "3-5 business days".to_owned(),
        }
    }
}

impl SettingsDocument for ShippingSettings {
    const KEY: &'static str = "shipping";

    fn validate(&self) -> Result<(), ValidationError> {
        non_negative("flat_rate", self.flat_rate)?;
        non_negative("express_rate", self.express_rate)?;
        if let Some(threshold) = self.free_shipping_threshold {
            non_negative("free_shipping_threshold", threshold)?;
        }
        Ok(())
    }
}

// =============================================================================
// Payment
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentOption {
    /// Value sent as `payment_method` at checkout.
    pub id: String,
    pub label: String,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub instructions: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaymentSettings {
    pub currency: String,
    pub methods: Vec<PaymentOption>,
}

impl PaymentSettings {
    /// Whether `id` is an enabled payment method.
    #[must_use]
    pub fn accepts(&self, id: &str) -> bool {
        self.methods.iter().any(|m| m.enabled && m.id == id)
    }
}

impl Default for PaymentSettings {
    fn default() -> Self {
        Self {
            currency: "CAD".to_owned(),
            methods: vec![
                PaymentOption {
                    id: "etransfer".to_owned(),
                    label: "Interac e-Transfer".to_owned(),
                    enabled: true,
                    instructions: Some(
                        "Send the order total after checkout; your order ships once payment clears."
                            .to_owned(),
                    ),
                },
                PaymentOption {
                    id: "cash_on_pickup".to_owned(),
                    label: "Cash on pickup".to_owned(),
                    enabled: true,
                    instructions: None,
                },
            ],
        }
    }
}

impl SettingsDocument for PaymentSettings {
    const KEY: &'static str = "payment";

    fn validate(&self) -> Result<(), ValidationError> {
        require_text("currency", &self.currency)?;
        for method in &self.methods {
            require_text("payment method id", &method.id)?;
            require_text("payment method label", &method.label)?;
        }
        if !self.methods.iter().any(|m| m.enabled) {
            return Err(ValidationError::new(
                "at least one payment method must be enabled",
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Navigation & branding
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavLink {
    pub label: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NavLink>,
}

impl NavLink {
    fn link(label: &str, url: &str) -> Self {
        Self {
            label: label.to_owned(),
            url: url.to_owned(),
            children: Vec::new(),
        }
    }

    fn validate(&self) -> Result<(), ValidationError> {
        require_text("link label", &self.label)?;
        require_text("link url", &self.url)?;
        self.children.iter().try_for_each(Self::validate)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Branding {
    pub store_name: String,
    pub tagline: Option<String>,
    pub logo_url: Option<String>,
    pub announcement: Option<String>,
}

impl Default for Branding {
    fn default() -> Self {
        Self {
            store_name: "Canopy".to_owned(),
            tagline: None,
            logo_url: None,
            announcement: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Navigation {
    pub header: Vec<NavLink>,
    pub footer: Vec<NavLink>,
    pub branding: Branding,
}

impl Default for Navigation {
    fn default() -> Self {
        Self {
            header: vec![
                NavLink::link("Shop", "/products"),
                NavLink::link("Blog", "/blog"),
                NavLink::link("Rewards", "/rewards"),
            ],
            footer: vec![
                NavLink::link("About", "/pages/about"),
                NavLink::link("Shipping", "/pages/shipping"),
                NavLink::link("Contact", "/pages/contact"),
            ],
            branding: Branding::default(),
        }
    }
}

impl SettingsDocument for Navigation {
    const KEY: &'static str = "navigation";

    fn validate(&self) -> Result<(), ValidationError> {
        require_text("store_name", &self.branding.store_name)?;
        self.header
            .iter()
            .chain(&self.footer)
            .try_for_each(NavLink::validate)
    }
}

// =============================================================================
// Loyalty
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoyaltyConfig {
    pub enabled: bool,
    /// Points earned per currency unit of the order total.
    pub points_per_dollar: Decimal,
    /// Credited to the referrer when the referred customer's first order
    /// is delivered.
    pub referral_reward_points: i64,
    /// Credited to the referred customer at the same time.
    pub referred_reward_points: i64,
}

impl Default for LoyaltyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            points_per_dollar: Decimal::ONE,
            referral_reward_points: 500,
            referred_reward_points: 250,
        }
    }
}

impl SettingsDocument for LoyaltyConfig {
    const KEY: &'static str = "loyalty";

    fn validate(&self) -> Result<(), ValidationError> {
        non_negative("points_per_dollar", self.points_per_dollar)?;
        if self.referral_reward_points < 0 || self.referred_reward_points < 0 {
            return Err(ValidationError::new("reward points must not be negative"));
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_documents_fill_defaults() {
        let shipping: ShippingSettings = serde_json::from_str(r#"{"flat_rate": 5}"#).unwrap();
        assert_eq!(shipping.flat_rate, Decimal::from(5));
        assert!(shipping.express_enabled);

        let nav: Navigation = serde_json::from_str("{}").unwrap();
        assert_eq!(nav, Navigation::default());
    }

    #[test]
    fn test_defaults_are_valid() {
        assert!(ShippingSettings::default().validate().is_ok());
        assert!(PaymentSettings::default().validate().is_ok());
        assert!(Navigation::default().validate().is_ok());
        assert!(LoyaltyConfig::default().validate().is_ok());
    }

    #[test]
    fn test_payment_requires_enabled_method() {
        let mut payment = PaymentSettings::default();
        assert!(payment.accepts("etransfer"));
        for method in &mut payment.methods {
            method.enabled = false;
        }
        assert!(!payment.accepts("etransfer"));
        assert!(payment.validate().is_err());
    }

    #[test]
    fn test_nested_nav_links_validated() {
        let mut nav = Navigation::default();
        nav.header[0].children.push(NavLink::link("", "/x"));
        assert_eq!(
            nav.validate().unwrap_err().to_string(),
            "link label is required"
        );
    }

    #[test]
    fn test_negative_rates_rejected() {
        let shipping = ShippingSettings {
            flat_rate: Decimal::from(-1),
            ..ShippingSettings::default()
        };
        assert!(shipping.validate().is_err());
    }
}
