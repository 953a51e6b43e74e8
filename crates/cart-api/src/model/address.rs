//! Quote addresses and quoted shipping rates.

use rust_decimal::Decimal;
use stonefruit_core::{AddressId, RegionId};

/// Which side of the quote an address belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressKind {
    Billing,
    Shipping,
}

/// Per-address item totals cached by the engine between collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachedAddressTotals {
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub shipping: Decimal,
    pub grand_total: Decimal,
}

/// A shipping rate quoted for the shipping address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShippingRate {
    /// Composite selection code, `{carrier}_{method}`.
    pub code: String,
    pub carrier: String,
    pub carrier_title: String,
    pub method: String,
    pub method_title: String,
    pub method_description: Option<String>,
    pub price: Decimal,
    pub carrier_sort_order: i32,
    pub method_sort_order: i32,
    pub deleted: bool,
}

/// Billing or shipping address of a quote.
///
/// The shipping side additionally carries the selected shipping method, the
/// `same_as_billing` mirror flag and the quoted rates.
#[derive(Debug, Clone)]
pub struct QuoteAddress {
    pub kind: AddressKind,
    pub customer_address_id: Option<AddressId>,
    pub email: Option<String>,
    pub prefix: Option<String>,
    pub firstname: Option<String>,
    pub lastname: Option<String>,
    pub suffix: Option<String>,
    pub company: Option<String>,
    pub street: Option<String>,
    pub city: Option<String>,
    pub postcode: Option<String>,
    pub region: Option<String>,
    pub region_id: Option<RegionId>,
    pub country_id: Option<String>,
    pub telephone: Option<String>,
    pub fax: Option<String>,
    /// Shipping only: mirror of the billing address.
    pub same_as_billing: bool,
    pub save_in_address_book: bool,
    /// Shipping only: selected method code.
    pub shipping_method: Option<String>,
    /// Marker propagated from the payment step; some methods restrict carriers.
    pub payment_method: Option<String>,
    pub validation_errors: Vec<String>,
    /// When set, the next totals collection re-quotes shipping rates.
    pub collect_shipping_rates: bool,
    pub rates: Vec<ShippingRate>,
    pub cached_totals: Option<CachedAddressTotals>,
}

impl QuoteAddress {
    /// Empty address for the given side.
    #[must_use]
    pub const fn new(kind: AddressKind) -> Self {
        Self {
            kind,
            customer_address_id: None,
            email: None,
            prefix: None,
            firstname: None,
            lastname: None,
            suffix: None,
            company: None,
            street: None,
            city: None,
            postcode: None,
            region: None,
            region_id: None,
            country_id: None,
            telephone: None,
            fax: None,
            same_as_billing: false,
            save_in_address_book: false,
            shipping_method: None,
            payment_method: None,
            validation_errors: Vec::new(),
            collect_shipping_rates: false,
            rates: Vec::new(),
            cached_totals: None,
        }
    }

    /// Copy the contact and geo fields from another address.
    ///
    /// Side-specific state (kind, shipping method, rates, flags, caches)
    /// is preserved.
    pub fn import_fields_from(&mut self, other: &Self) {
        self.customer_address_id = other.customer_address_id;
        self.email.clone_from(&other.email);
        self.prefix.clone_from(&other.prefix);
        self.firstname.clone_from(&other.firstname);
        self.lastname.clone_from(&other.lastname);
        self.suffix.clone_from(&other.suffix);
        self.company.clone_from(&other.company);
        self.street.clone_from(&other.street);
        self.city.clone_from(&other.city);
        self.postcode.clone_from(&other.postcode);
        self.region.clone_from(&other.region);
        self.region_id = other.region_id;
        self.country_id.clone_from(&other.country_id);
        self.telephone.clone_from(&other.telephone);
        self.fax.clone_from(&other.fax);
    }

    /// Reset to the empty state, preserving only the address side.
    pub fn reset(&mut self) {
        *self = Self::new(self.kind);
    }

    /// The quoted rate matching a selection code.
    #[must_use]
    pub fn rate_by_code(&self, code: &str) -> Option<&ShippingRate> {
        self.rates
            .iter()
            .find(|rate| !rate.deleted && rate.code == code)
    }
}
