//! Commerce Engine collaborator interfaces.
//!
//! Everything this layer does not own - catalog, pricing, tax, shipping
//! rating, payment applicability, region data, address books, order
//! persistence - sits behind [`CommerceEngine`]. The API layer calls these
//! as narrow, synchronous operations and reacts to their outputs; it never
//! reaches around them.

pub mod memory;

use rust_decimal::Decimal;
use stonefruit_core::{AddressId, CustomerId, Email, ItemId, ProductId, QuoteId, RegionId};
use thiserror::Error;

use crate::model::{Quote, QuoteAddress};

pub use memory::MemoryEngine;

/// Failure of a Commerce Engine call.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The engine refused the request for a business reason. The message is
    /// client-safe and maps to a 400.
    #[error("{0}")]
    Rejected(String),

    /// The engine failed unexpectedly. Maps to a generic server error;
    /// details stay out of the response.
    #[error("commerce engine failure: {0}")]
    Failure(String),
}

/// Failure of order submission, separating payment-stage faults.
#[derive(Debug, Error)]
pub enum SubmitError {
    /// Payment gateway refused or errored during submission. Downgraded to
    /// a `payment`-keyed validation error by the order placer.
    #[error("payment failed: {0}")]
    Payment(String),

    /// Any other engine failure.
    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Catalog product image URL set.
#[derive(Debug, Clone, Default)]
pub struct ProductImages {
    pub normal: String,
    pub small: String,
    pub thumbnail: String,
}

/// Catalog view of a product, as far as this layer needs it.
#[derive(Debug, Clone)]
pub struct Product {
    pub id: ProductId,
    pub sku: String,
    pub name: String,
    pub description: Option<String>,
    pub short_description: Option<String>,
    pub product_type: String,
    pub enabled: bool,
    pub in_stock: bool,
    pub visible: bool,
    pub is_virtual: bool,
    pub price: Decimal,
    pub final_price: Decimal,
    pub stock_qty: Decimal,
    pub min_sale_qty: Decimal,
    pub max_sale_qty: Decimal,
    pub url: String,
    pub images: ProductImages,
    pub crosssell_ids: Vec<ProductId>,
}

impl Product {
    /// Whether the product can currently be sold.
    #[must_use]
    pub const fn is_saleable(&self) -> bool {
        self.enabled && self.in_stock
    }
}

/// Canonical region record.
#[derive(Debug, Clone)]
pub struct Region {
    pub id: RegionId,
    pub code: String,
    pub name: String,
    pub country_id: String,
}

/// Address book entry owned by a customer.
#[derive(Debug, Clone)]
pub struct StoredAddress {
    pub id: AddressId,
    pub customer_id: CustomerId,
    pub email: Option<String>,
    pub firstname: Option<String>,
    pub lastname: Option<String>,
    pub company: Option<String>,
    pub street: Option<String>,
    pub city: Option<String>,
    pub postcode: Option<String>,
    pub region: Option<String>,
    pub region_id: Option<RegionId>,
    pub country_id: Option<String>,
    pub telephone: Option<String>,
}

/// Default address-book slots of a customer.
#[derive(Debug, Clone, Copy, Default)]
pub struct CustomerDefaults {
    pub billing: Option<AddressId>,
    pub shipping: Option<AddressId>,
}

/// Which applicability checks to run against a payment method.
#[derive(Debug, Clone, Copy)]
pub struct MethodChecks {
    pub use_for_checkout: bool,
    pub use_for_country: bool,
    pub use_for_currency: bool,
    pub order_total_bounds: bool,
    pub zero_total: bool,
}

impl MethodChecks {
    /// Checks run when selecting a method at checkout.
    #[must_use]
    pub const fn checkout() -> Self {
        Self {
            use_for_checkout: true,
            use_for_country: true,
            use_for_currency: true,
            order_total_bounds: true,
            zero_total: false,
        }
    }

    /// Checks run when listing methods applicable to a quote.
    #[must_use]
    pub const fn listing() -> Self {
        Self {
            use_for_checkout: false,
            use_for_country: true,
            use_for_currency: true,
            order_total_bounds: true,
            zero_total: true,
        }
    }
}

/// A configured payment method and its applicability constraints.
#[derive(Debug, Clone)]
pub struct PaymentMethodInfo {
    pub code: String,
    pub title: String,
    pub enabled_for_checkout: bool,
    /// `None` means all countries.
    pub allowed_countries: Option<Vec<String>>,
    /// `None` means all currencies.
    pub allowed_currencies: Option<Vec<String>>,
    pub min_order_total: Option<Decimal>,
    pub max_order_total: Option<Decimal>,
    pub allow_zero_total: bool,
    /// Credit card type codes the method is configured for, empty for
    /// non-card methods.
    pub cc_types: Vec<String>,
}

impl PaymentMethodInfo {
    /// Run the requested applicability checks against a quote.
    #[must_use]
    pub fn applicable_to(&self, quote: &Quote, checks: MethodChecks) -> bool {
        if checks.use_for_checkout && !self.enabled_for_checkout {
            return false;
        }

        if checks.use_for_country {
            let country = quote
                .billing_address
                .country_id
                .as_deref()
                .unwrap_or_default();
            if let Some(allowed) = &self.allowed_countries {
                if !allowed.iter().any(|c| c == country) {
                    return false;
                }
            }
        }

        if checks.use_for_currency {
            if let Some(allowed) = &self.allowed_currencies {
                if !allowed.iter().any(|c| c == &quote.currency) {
                    return false;
                }
            }
        }

        if checks.order_total_bounds {
            let total = quote.grand_total();
            if self.min_order_total.is_some_and(|min| total < min) {
                return false;
            }
            if self.max_order_total.is_some_and(|max| total > max) {
                return false;
            }
        }

        if checks.zero_total && quote.grand_total() == Decimal::ZERO && !self.allow_zero_total {
            return false;
        }

        true
    }
}

/// Outcome of adding a product to a quote.
#[derive(Debug, Clone, Copy)]
pub struct AddProductOutcome {
    /// The top-level item the add landed on. For composite products this is
    /// the parent item, never a child.
    pub item_id: ItemId,
    /// False when the add merged into an existing line.
    pub created: bool,
}

/// Reference to a submitted order.
#[derive(Debug, Clone)]
pub struct OrderRef {
    pub increment_id: String,
}

/// Address rendering formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressFormat {
    Html,
    Text,
}

/// Locale-aware currency rendering, split out so projection code can format
/// amounts without seeing the rest of the engine surface.
pub trait CurrencyFormatter: Send + Sync {
    /// Render an amount for display in the given currency.
    fn format_currency(&self, currency: &str, amount: Decimal) -> String;
}

/// The Commerce Engine collaborator.
///
/// Calls are synchronous from this layer's point of view and may fail;
/// failures surface through the error taxonomy, never as silent retries.
pub trait CommerceEngine: CurrencyFormatter + Send + Sync {
    // Quote store
    fn create_quote(&self) -> Result<Quote, EngineError>;
    fn load_quote(&self, id: QuoteId) -> Result<Option<Quote>, EngineError>;
    fn save_quote(&self, quote: &mut Quote) -> Result<(), EngineError>;

    /// Recompute row totals, per-address caches, the totals breakdown and
    /// coupon application. Respects the quote's `totals_collected` marker.
    fn collect_totals(&self, quote: &mut Quote) -> Result<(), EngineError>;

    /// Re-quote shipping rates when the shipping address is marked for
    /// collection.
    fn collect_shipping_rates(&self, quote: &mut Quote) -> Result<(), EngineError>;

    // Catalog
    fn product_by_sku(&self, sku: &str) -> Result<Option<Product>, EngineError>;
    fn product_by_id(&self, id: ProductId) -> Result<Option<Product>, EngineError>;

    /// Cross-sell candidates for the quote: products linked from cart items,
    /// excluding products already in the cart, saleable and visible only.
    fn crosssell_products(&self, quote: &Quote) -> Result<Vec<Product>, EngineError>;

    /// Add a product, merging with an existing line where the engine's rules
    /// say so. Business refusals come back as [`EngineError::Rejected`].
    fn add_product(
        &self,
        quote: &mut Quote,
        product: &Product,
        qty: Decimal,
    ) -> Result<AddProductOutcome, EngineError>;

    // Payment
    fn payment_methods(&self, quote: &Quote) -> Result<Vec<PaymentMethodInfo>, EngineError>;
    fn payment_method(&self, code: &str) -> Result<Option<PaymentMethodInfo>, EngineError>;

    /// Globally configured credit card types as `(code, title)` pairs.
    fn global_cc_types(&self) -> Vec<(String, String)>;

    // Regions
    fn region_by_id(&self, id: RegionId) -> Result<Option<Region>, EngineError>;
    fn region_by_code_or_name(
        &self,
        term: &str,
        country_id: &str,
    ) -> Result<Option<Region>, EngineError>;

    // Customer address book
    fn customer_address(&self, id: AddressId) -> Result<Option<StoredAddress>, EngineError>;
    fn add_customer_address(
        &self,
        customer_id: CustomerId,
        address: StoredAddress,
    ) -> Result<AddressId, EngineError>;
    fn customer_defaults(&self, customer_id: CustomerId) -> Result<CustomerDefaults, EngineError>;
    fn set_customer_defaults(
        &self,
        customer_id: CustomerId,
        defaults: CustomerDefaults,
    ) -> Result<(), EngineError>;

    // Orders
    fn submit_order(&self, quote: &mut Quote) -> Result<OrderRef, SubmitError>;

    /// Best-effort order confirmation; the caller logs failures and moves on.
    fn send_order_confirmation(&self, order: &OrderRef, email: &Email) -> Result<(), EngineError>;

    /// Render an address for display.
    fn format_address(&self, address: &QuoteAddress, format: AddressFormat) -> String;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::QuoteTotal;
    use std::str::FromStr;

    #[allow(clippy::unwrap_used)]
    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn quote_with_total(total: &str, country: &str, currency: &str) -> Quote {
        let mut quote = Quote::new(currency);
        quote.billing_address.country_id = Some(country.to_string());
        quote.totals.push(QuoteTotal {
            code: "grand_total".to_string(),
            title: "Grand Total".to_string(),
            value: dec(total),
        });
        quote
    }

    fn method() -> PaymentMethodInfo {
        PaymentMethodInfo {
            code: "checkmo".to_string(),
            title: "Check / Money order".to_string(),
            enabled_for_checkout: true,
            allowed_countries: Some(vec!["US".to_string()]),
            allowed_currencies: Some(vec!["USD".to_string()]),
            min_order_total: Some(dec("5")),
            max_order_total: Some(dec("1000")),
            allow_zero_total: false,
            cc_types: Vec::new(),
        }
    }

    #[test]
    fn test_method_applicable() {
        let quote = quote_with_total("50", "US", "USD");
        assert!(method().applicable_to(&quote, MethodChecks::checkout()));
    }

    #[test]
    fn test_method_rejects_country() {
        let quote = quote_with_total("50", "DE", "USD");
        assert!(!method().applicable_to(&quote, MethodChecks::checkout()));
    }

    #[test]
    fn test_method_rejects_currency() {
        let quote = quote_with_total("50", "US", "EUR");
        assert!(!method().applicable_to(&quote, MethodChecks::checkout()));
    }

    #[test]
    fn test_method_rejects_total_bounds() {
        let quote = quote_with_total("2", "US", "USD");
        assert!(!method().applicable_to(&quote, MethodChecks::checkout()));

        let quote = quote_with_total("5000", "US", "USD");
        assert!(!method().applicable_to(&quote, MethodChecks::checkout()));
    }

    #[test]
    fn test_zero_total_check_only_in_listing() {
        let mut m = method();
        m.min_order_total = None;
        let quote = quote_with_total("0", "US", "USD");

        assert!(m.applicable_to(&quote, MethodChecks::checkout()));
        assert!(!m.applicable_to(&quote, MethodChecks::listing()));
    }
}
