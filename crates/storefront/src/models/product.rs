//! Catalog products.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use canopy_core::{
    CategoryId, Inventory, PriceRange, ProductId, StockStatus, discount_percentage, stock_status,
};

use super::{ValidationError, require_text};

/// A stored product image: older rows hold a bare URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProductImage {
    Url(String),
    Detailed(ImageDetails),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageDetails {
    pub url: String,
    #[serde(default)]
    pub alt: Option<String>,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub is_primary: bool,
}

/// Image as returned by the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NormalizedImage {
    pub url: String,
    pub alt: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub is_primary: bool,
}

/// Bring both stored image shapes to one form.
///
/// Missing alt text falls back to the product name. Exactly one image ends
/// up primary: the first one flagged, else the first image.
#[must_use]
pub fn normalize_images(images: &[ProductImage], product_name: &str) -> Vec<NormalizedImage> {
    let mut normalized: Vec<NormalizedImage> = images
        .iter()
        .filter_map(|image| {
            let (url, alt, width, height, is_primary) = match image {
                ProductImage::Url(url) => (url.clone(), None, None, None, false),
                ProductImage::Detailed(d) => {
                    (d.url.clone(), d.alt.clone(), d.width, d.height, d.is_primary)
                }
            };
            (!url.trim().is_empty()).then(|| NormalizedImage {
                url,
                alt: alt
                    .filter(|a| !a.trim().is_empty())
                    .unwrap_or_else(|| product_name.to_owned()),
                width,
                height,
                is_primary,
            })
        })
        .collect();

    let primary = normalized.iter().position(|i| i.is_primary).unwrap_or(0);
    for (idx, image) in normalized.iter_mut().enumerate() {
        image.is_primary = idx == primary;
    }
    normalized
}

/// A purchasable option such as a size or strain weight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variant {
    pub name: String,
    pub value: String,
    /// Overrides the product price when set.
    #[serde(default)]
    pub price: Option<Decimal>,
    #[serde(default)]
    pub original_price: Option<Decimal>,
    #[serde(default)]
    pub inventory: Inventory,
    #[serde(default)]
    pub sku: Option<String>,
}

impl Variant {
    /// Price this variant sells at.
    #[must_use]
    pub fn effective_price(&self, product_price: Decimal) -> Decimal {
        self.price.unwrap_or(product_price)
    }

    /// Whether `label` names this variant (`value`, or `name: value`).
    #[must_use]
    pub fn matches(&self, label: &str) -> bool {
        let label = label.trim();
        label.eq_ignore_ascii_case(&self.value)
            || label.eq_ignore_ascii_case(&format!("{}: {}", self.name, self.value))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Badge {
    pub text: String,
    #[serde(default)]
    pub color: Option<String>,
}

/// Corner badges drawn over the product image.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Badges {
    pub top_left: Option<Badge>,
    pub top_right: Option<Badge>,
    pub bottom_left: Option<Badge>,
    pub bottom_right: Option<Badge>,
}

/// A product as stored.
#[derive(Debug, Clone)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub price: Decimal,
    pub original_price: Option<Decimal>,
    pub images: Vec<ProductImage>,
    pub category_id: Option<CategoryId>,
    pub category_ids: Vec<CategoryId>,
    pub inventory: Inventory,
    pub variants: Vec<Variant>,
    pub badges: Badges,
    pub is_active: bool,
    pub is_featured: bool,
    pub average_rating: Decimal,
    pub review_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Find a variant by its label.
    #[must_use]
    pub fn variant(&self, label: &str) -> Option<&Variant> {
        self.variants.iter().find(|v| v.matches(label))
    }

    /// Primary image URL, if any.
    #[must_use]
    pub fn primary_image(&self) -> Option<String> {
        normalize_images(&self.images, &self.name)
            .into_iter()
            .find(|i| i.is_primary)
            .map(|i| i.url)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct VariantView {
    pub name: String,
    pub value: String,
    pub price: Decimal,
    pub original_price: Option<Decimal>,
    pub discount_percentage: u32,
    pub stock_status: StockStatus,
    pub inventory: Inventory,
    pub sku: Option<String>,
}

/// A product with its derived fields, as returned by the API.
#[derive(Debug, Clone, Serialize)]
pub struct ProductView {
    pub id: ProductId,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub price: Decimal,
    pub original_price: Option<Decimal>,
    pub discount_percentage: u32,
    pub stock_status: StockStatus,
    pub price_range: PriceRange,
    pub images: Vec<NormalizedImage>,
    pub category_id: Option<CategoryId>,
    pub category_ids: Vec<CategoryId>,
    pub inventory: Inventory,
    pub variants: Vec<VariantView>,
    pub badges: Badges,
    pub is_active: bool,
    pub is_featured: bool,
    pub average_rating: Decimal,
    pub review_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Product> for ProductView {
    fn from(p: Product) -> Self {
        let variants: Vec<VariantView> = p
            .variants
            .into_iter()
            .map(|v| {
                let price = v.effective_price(p.price);
                VariantView {
                    discount_percentage: discount_percentage(price, v.original_price),
                    stock_status: stock_status(&v.inventory),
                    name: v.name,
                    value: v.value,
                    price,
                    original_price: v.original_price,
                    inventory: v.inventory,
                    sku: v.sku,
                }
            })
            .collect();

        Self {
            discount_percentage: discount_percentage(p.price, p.original_price),
            stock_status: stock_status(&p.inventory),
            price_range: PriceRange::from_prices(p.price, variants.iter().map(|v| Some(v.price))),
            images: normalize_images(&p.images, &p.name),
            id: p.id,
            name: p.name,
            slug: p.slug,
            description: p.description,
            price: p.price,
            original_price: p.original_price,
            category_id: p.category_id,
            category_ids: p.category_ids,
            inventory: p.inventory,
            variants,
            badges: p.badges,
            is_active: p.is_active,
            is_featured: p.is_featured,
            average_rating: p.average_rating,
            review_count: p.review_count,
            created_at: p.created_at,
            updated_at: p.updated_at,
        }
    }
}

/// Admin create/update body.
#[derive(Debug, Clone, Deserialize)]
pub struct ProductInput {
    pub name: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub description: String,
    pub price: Decimal,
    #[serde(default)]
    pub original_price: Option<Decimal>,
    #[serde(default)]
    pub images: Vec<ProductImage>,
    #[serde(default)]
    pub category_id: Option<CategoryId>,
    #[serde(default)]
    pub category_ids: Vec<CategoryId>,
    #[serde(default)]
    pub inventory: Inventory,
    #[serde(default)]
    pub variants: Vec<Variant>,
    #[serde(default)]
    pub badges: Badges,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub is_featured: bool,
}

const fn default_true() -> bool {
    true
}

impl ProductInput {
    /// Check field-level constraints.
    ///
    /// # Errors
    ///
    /// Returns the first violated constraint.
    pub fn validate(&self) -> Result<(), ValidationError> {
        require_text("name", &self.name)?;
        if self.price.is_sign_negative() {
            return Err(ValidationError::new("price must not be negative"));
        }
        if self.original_price.is_some_and(|p| p.is_sign_negative()) {
            return Err(ValidationError::new("original_price must not be negative"));
        }
        for variant in &self.variants {
            require_text("variant name", &variant.name)?;
            require_text("variant value", &variant.value)?;
            if variant.price.is_some_and(|p| p.is_sign_negative()) {
                return Err(ValidationError(format!(
                    "price for variant {} must not be negative",
                    variant.value
                )));
            }
        }
        Ok(())
    }
}
