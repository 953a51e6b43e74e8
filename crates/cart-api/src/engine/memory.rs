//! In-memory Commerce Engine.
//!
//! Backs the binary in development and the test suite. Semantics follow the
//! real engine closely enough for the projection layer to be exercised
//! end-to-end: totals collection honors the quote's cache marker, coupons
//! are validated by clearing unknown codes, shipping rates come from a
//! carrier table, and order submission can be made to fail per method.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use rust_decimal::Decimal;
use stonefruit_core::money::minor_units;
use stonefruit_core::{AddressId, CustomerId, Email, ItemId, ProductId, QuoteId, RegionId};

use crate::model::{LineItem, Quote, QuoteAddress, QuoteTotal, ShippingRate};

use super::{
    AddProductOutcome, AddressFormat, CommerceEngine, CurrencyFormatter, CustomerDefaults,
    EngineError, OrderRef, PaymentMethodInfo, Product, ProductImages, Region, StoredAddress,
    SubmitError,
};

/// One shippable method offered by a carrier.
#[derive(Debug, Clone)]
pub struct CarrierMethod {
    pub method: String,
    pub method_title: String,
    pub method_description: Option<String>,
    pub price: Decimal,
    pub sort_order: i32,
}

/// A configured carrier and its methods.
#[derive(Debug, Clone)]
pub struct Carrier {
    pub carrier: String,
    pub carrier_title: String,
    pub sort_order: i32,
    pub methods: Vec<CarrierMethod>,
}

#[derive(Default)]
struct Inner {
    quotes: HashMap<QuoteId, Quote>,
    products: Vec<Product>,
    regions: Vec<Region>,
    addresses: HashMap<AddressId, StoredAddress>,
    defaults: HashMap<CustomerId, CustomerDefaults>,
    /// Coupon code to percent discount.
    coupons: HashMap<String, Decimal>,
    carriers: Vec<Carrier>,
    payment_methods: Vec<PaymentMethodInfo>,
    global_cc_types: Vec<(String, String)>,
    failing_payment_methods: HashSet<String>,
    fail_confirmations: bool,
    confirmations: Vec<(String, String)>,
    next_item_id: i32,
    next_address_id: i32,
    next_order_seq: u64,
}

/// Seedable in-memory engine.
pub struct MemoryEngine {
    currency: String,
    tax_rate: Decimal,
    inner: Mutex<Inner>,
}

impl MemoryEngine {
    /// Empty engine for the given store currency.
    #[must_use]
    pub fn new(currency: impl Into<String>) -> Self {
        Self {
            currency: currency.into(),
            tax_rate: Decimal::ZERO,
            inner: Mutex::new(Inner {
                next_item_id: 1,
                next_address_id: 1000,
                next_order_seq: 1,
                ..Inner::default()
            }),
        }
    }

    /// Engine seeded with a small demo catalog, regions, carriers, payment
    /// methods and one coupon.
    #[must_use]
    pub fn with_demo_catalog(currency: impl Into<String>) -> Self {
        let engine = Self::new(currency);
        {
            let mut inner = engine.lock();

            inner.products = demo_products();
            inner.regions = demo_regions();
            inner.coupons.insert("SAVE10".to_string(), dec("10"));
            inner.carriers = demo_carriers();
            inner.payment_methods = demo_payment_methods();
            inner.global_cc_types = vec![
                ("AE".to_string(), "American Express".to_string()),
                ("MC".to_string(), "MasterCard".to_string()),
                ("VI".to_string(), "Visa".to_string()),
            ];
        }
        engine
    }

    /// Tax rate applied to the subtotal by totals collection.
    #[must_use]
    pub fn with_tax_rate(mut self, rate: Decimal) -> Self {
        self.tax_rate = rate;
        self
    }

    pub fn seed_product(&self, product: Product) {
        self.lock().products.push(product);
    }

    pub fn seed_region(&self, region: Region) {
        self.lock().regions.push(region);
    }

    pub fn seed_coupon(&self, code: impl Into<String>, percent: Decimal) {
        self.lock().coupons.insert(code.into(), percent);
    }

    pub fn seed_carrier(&self, carrier: Carrier) {
        self.lock().carriers.push(carrier);
    }

    /// Replace the carrier table.
    pub fn set_carriers(&self, carriers: Vec<Carrier>) {
        self.lock().carriers = carriers;
    }

    pub fn seed_payment_method(&self, method: PaymentMethodInfo) {
        self.lock().payment_methods.push(method);
    }

    pub fn seed_customer_address(&self, address: StoredAddress) {
        self.lock().addresses.insert(address.id, address);
    }

    /// Make order submission fail at the payment stage for a method code.
    pub fn fail_payment_method(&self, code: impl Into<String>) {
        self.lock().failing_payment_methods.insert(code.into());
    }

    /// Make confirmation notifications fail.
    pub fn fail_confirmations(&self) {
        self.lock().fail_confirmations = true;
    }

    /// Confirmation notifications recorded so far, as `(order, email)`.
    #[must_use]
    pub fn confirmations(&self) -> Vec<(String, String)> {
        self.lock().confirmations.clone()
    }

    /// Address-book entries stored for a customer.
    #[must_use]
    pub fn customer_addresses(&self, customer_id: CustomerId) -> Vec<StoredAddress> {
        let mut addresses: Vec<StoredAddress> = self
            .lock()
            .addresses
            .values()
            .filter(|a| a.customer_id == customer_id)
            .cloned()
            .collect();
        addresses.sort_by_key(|a| a.id);
        addresses
    }

    #[allow(clippy::unwrap_used)]
    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // Poisoning only happens after a panic in another request; at that
        // point the process is already going down.
        self.inner.lock().unwrap()
    }

    fn precision(&self, currency: &str) -> u32 {
        minor_units(currency)
    }

    fn build_rates(carriers: &[Carrier]) -> Vec<ShippingRate> {
        let mut rates = Vec::new();
        for carrier in carriers {
            for method in &carrier.methods {
                rates.push(ShippingRate {
                    code: format!("{}_{}", carrier.carrier, method.method),
                    carrier: carrier.carrier.clone(),
                    carrier_title: carrier.carrier_title.clone(),
                    method: method.method.clone(),
                    method_title: method.method_title.clone(),
                    method_description: method.method_description.clone(),
                    price: method.price,
                    carrier_sort_order: carrier.sort_order,
                    method_sort_order: method.sort_order,
                    deleted: false,
                });
            }
        }
        rates
    }
}

impl CurrencyFormatter for MemoryEngine {
    fn format_currency(&self, currency: &str, amount: Decimal) -> String {
        let precision = self.precision(currency) as usize;
        let amount = amount.round_dp(precision as u32);
        match currency {
            "USD" | "CAD" | "AUD" => format!("${amount:.precision$}"),
            "EUR" => format!("€{amount:.precision$}"),
            "GBP" => format!("£{amount:.precision$}"),
            "JPY" => format!("¥{amount:.precision$}"),
            _ => format!("{amount:.precision$} {currency}"),
        }
    }
}

impl CommerceEngine for MemoryEngine {
    fn create_quote(&self) -> Result<Quote, EngineError> {
        Ok(Quote::new(self.currency.clone()))
    }

    fn load_quote(&self, id: QuoteId) -> Result<Option<Quote>, EngineError> {
        Ok(self.lock().quotes.get(&id).cloned())
    }

    fn save_quote(&self, quote: &mut Quote) -> Result<(), EngineError> {
        quote.is_new = false;
        quote.updated_at = chrono::Utc::now();
        self.lock().quotes.insert(quote.id, quote.clone());
        Ok(())
    }

    fn collect_totals(&self, quote: &mut Quote) -> Result<(), EngineError> {
        if quote.totals_collected {
            return Ok(());
        }

        let precision = self.precision(&quote.currency);

        for item in quote.items.iter_mut().filter(|item| !item.deleted) {
            item.row_total = (item.price * item.qty).round_dp(precision);
            item.row_total_incl_tax =
                (item.row_total * (Decimal::ONE + self.tax_rate)).round_dp(precision);
        }

        let subtotal: Decimal = quote
            .items
            .iter()
            .filter(|item| !item.deleted)
            .map(|item| item.row_total)
            .sum();

        // A quote is virtual when it has items and none require shipping.
        quote.is_virtual = quote.items_count() > 0
            && quote
                .items
                .iter()
                .filter(|item| !item.deleted)
                .all(|item| item.product_type == "virtual");

        // Coupon application: unknown codes are cleared, which the cart
        // resource detects as a validation failure.
        let mut discount = Decimal::ZERO;
        if let Some(code) = quote.coupon_code.clone() {
            match self.lock().coupons.get(&code) {
                Some(percent) => {
                    discount = -(subtotal * *percent / dec("100")).round_dp(precision);
                }
                None => quote.coupon_code = None,
            }
        }

        if quote.shipping_address.collect_shipping_rates {
            self.collect_shipping_rates(quote)?;
        }

        let shipping = if quote.is_virtual {
            Decimal::ZERO
        } else {
            quote
                .shipping_address
                .shipping_method
                .as_deref()
                .and_then(|code| quote.shipping_address.rate_by_code(code))
                .map_or(Decimal::ZERO, |rate| rate.price)
        };

        let tax = (subtotal * self.tax_rate).round_dp(precision);
        let grand_total = subtotal + discount + shipping + tax;

        let mut totals = vec![QuoteTotal {
            code: "subtotal".to_string(),
            title: "Subtotal".to_string(),
            value: subtotal,
        }];
        if discount != Decimal::ZERO {
            totals.push(QuoteTotal {
                code: "discount".to_string(),
                title: "Discount".to_string(),
                value: discount,
            });
        }
        if !quote.is_virtual {
            totals.push(QuoteTotal {
                code: "shipping".to_string(),
                title: "Shipping & Handling".to_string(),
                value: shipping,
            });
        }
        if tax != Decimal::ZERO {
            totals.push(QuoteTotal {
                code: "tax".to_string(),
                title: "Tax".to_string(),
                value: tax,
            });
        }
        totals.push(QuoteTotal {
            code: "grand_total".to_string(),
            title: "Grand Total".to_string(),
            value: grand_total,
        });
        quote.totals = totals;

        let cached = crate::model::CachedAddressTotals {
            subtotal,
            tax,
            shipping,
            grand_total,
        };
        quote.billing_address.cached_totals = Some(cached);
        quote.shipping_address.cached_totals = Some(cached);

        quote.totals_collected = true;
        Ok(())
    }

    fn collect_shipping_rates(&self, quote: &mut Quote) -> Result<(), EngineError> {
        let rates = Self::build_rates(&self.lock().carriers);
        quote.shipping_address.rates = rates;
        quote.shipping_address.collect_shipping_rates = false;
        Ok(())
    }

    fn product_by_sku(&self, sku: &str) -> Result<Option<Product>, EngineError> {
        Ok(self
            .lock()
            .products
            .iter()
            .find(|p| p.sku == sku)
            .cloned())
    }

    fn product_by_id(&self, id: ProductId) -> Result<Option<Product>, EngineError> {
        Ok(self.lock().products.iter().find(|p| p.id == id).cloned())
    }

    fn crosssell_products(&self, quote: &Quote) -> Result<Vec<Product>, EngineError> {
        let cart_ids: HashSet<ProductId> = quote
            .items
            .iter()
            .filter(|item| !item.deleted)
            .map(|item| item.product_id)
            .collect();

        let inner = self.lock();
        let mut seen = HashSet::new();
        let mut linked = Vec::new();
        for product in inner.products.iter().filter(|p| cart_ids.contains(&p.id)) {
            for id in &product.crosssell_ids {
                if !cart_ids.contains(id) && seen.insert(*id) {
                    linked.push(*id);
                }
            }
        }

        Ok(linked
            .into_iter()
            .filter_map(|id| inner.products.iter().find(|p| p.id == id))
            .filter(|p| p.enabled && p.visible && p.in_stock)
            .cloned()
            .collect())
    }

    fn add_product(
        &self,
        quote: &mut Quote,
        product: &Product,
        qty: Decimal,
    ) -> Result<AddProductOutcome, EngineError> {
        let existing = quote
            .items
            .iter_mut()
            .find(|item| item.is_visible() && item.product_id == product.id);

        if let Some(item) = existing {
            let new_qty = item.qty + qty;
            if product.max_sale_qty > Decimal::ZERO && new_qty > product.max_sale_qty {
                return Err(EngineError::Rejected(format!(
                    "The maximum quantity allowed for purchase is {}.",
                    product.max_sale_qty
                )));
            }
            item.qty = new_qty;
            let item_id = item.id;
            quote.invalidate_totals();
            return Ok(AddProductOutcome {
                item_id,
                created: false,
            });
        }

        if product.max_sale_qty > Decimal::ZERO && qty > product.max_sale_qty {
            return Err(EngineError::Rejected(format!(
                "The maximum quantity allowed for purchase is {}.",
                product.max_sale_qty
            )));
        }

        let id = {
            let mut inner = self.lock();
            let id = ItemId::new(inner.next_item_id);
            inner.next_item_id += 1;
            id
        };

        quote.items.push(LineItem {
            id,
            product_id: product.id,
            sku: product.sku.clone(),
            name: product.name.clone(),
            product_type: product.product_type.clone(),
            qty,
            price: product.final_price,
            row_total: Decimal::ZERO,
            row_total_incl_tax: Decimal::ZERO,
            backorders: Decimal::ZERO,
            error_infos: Vec::new(),
            messages: Vec::new(),
            parent_item_id: None,
            redirect_url: None,
            deleted: false,
        });
        quote.invalidate_totals();

        Ok(AddProductOutcome {
            item_id: id,
            created: true,
        })
    }

    fn payment_methods(&self, _quote: &Quote) -> Result<Vec<PaymentMethodInfo>, EngineError> {
        Ok(self.lock().payment_methods.clone())
    }

    fn payment_method(&self, code: &str) -> Result<Option<PaymentMethodInfo>, EngineError> {
        Ok(self
            .lock()
            .payment_methods
            .iter()
            .find(|m| m.code == code)
            .cloned())
    }

    fn global_cc_types(&self) -> Vec<(String, String)> {
        self.lock().global_cc_types.clone()
    }

    fn region_by_id(&self, id: RegionId) -> Result<Option<Region>, EngineError> {
        Ok(self.lock().regions.iter().find(|r| r.id == id).cloned())
    }

    fn region_by_code_or_name(
        &self,
        term: &str,
        country_id: &str,
    ) -> Result<Option<Region>, EngineError> {
        let inner = self.lock();
        let by_code = inner
            .regions
            .iter()
            .find(|r| r.country_id == country_id && r.code.eq_ignore_ascii_case(term));
        let region = by_code.or_else(|| {
            inner
                .regions
                .iter()
                .find(|r| r.country_id == country_id && r.name.eq_ignore_ascii_case(term))
        });
        Ok(region.cloned())
    }

    fn customer_address(&self, id: AddressId) -> Result<Option<StoredAddress>, EngineError> {
        Ok(self.lock().addresses.get(&id).cloned())
    }

    fn add_customer_address(
        &self,
        customer_id: CustomerId,
        mut address: StoredAddress,
    ) -> Result<AddressId, EngineError> {
        let mut inner = self.lock();
        let id = AddressId::new(inner.next_address_id);
        inner.next_address_id += 1;
        address.id = id;
        address.customer_id = customer_id;
        inner.addresses.insert(id, address);
        Ok(id)
    }

    fn customer_defaults(&self, customer_id: CustomerId) -> Result<CustomerDefaults, EngineError> {
        Ok(self
            .lock()
            .defaults
            .get(&customer_id)
            .copied()
            .unwrap_or_default())
    }

    fn set_customer_defaults(
        &self,
        customer_id: CustomerId,
        defaults: CustomerDefaults,
    ) -> Result<(), EngineError> {
        self.lock().defaults.insert(customer_id, defaults);
        Ok(())
    }

    fn submit_order(&self, quote: &mut Quote) -> Result<OrderRef, SubmitError> {
        let method = quote
            .payment
            .method
            .clone()
            .ok_or_else(|| SubmitError::Payment("No payment method selected.".to_string()))?;

        let mut inner = self.lock();
        if inner.failing_payment_methods.contains(&method) {
            return Err(SubmitError::Payment(
                "The payment gateway declined the transaction.".to_string(),
            ));
        }

        let seq = inner.next_order_seq;
        inner.next_order_seq += 1;
        Ok(OrderRef {
            increment_id: format!("{:09}", 100_000_000 + seq),
        })
    }

    fn send_order_confirmation(&self, order: &OrderRef, email: &Email) -> Result<(), EngineError> {
        let mut inner = self.lock();
        if inner.fail_confirmations {
            return Err(EngineError::Failure(
                "notification transport unavailable".to_string(),
            ));
        }
        inner
            .confirmations
            .push((order.increment_id.clone(), email.to_string()));
        Ok(())
    }

    fn format_address(&self, address: &QuoteAddress, format: AddressFormat) -> String {
        let name = [address.firstname.as_deref(), address.lastname.as_deref()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" ");

        let locality = [
            address.city.as_deref(),
            address.region.as_deref(),
            address.postcode.as_deref(),
        ]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(", ");

        let mut lines = Vec::new();
        if !name.is_empty() {
            lines.push(name);
        }
        if let Some(company) = address.company.as_deref() {
            lines.push(company.to_string());
        }
        if let Some(street) = address.street.as_deref() {
            lines.push(street.to_string());
        }
        if !locality.is_empty() {
            lines.push(locality);
        }
        if let Some(country) = address.country_id.as_deref() {
            lines.push(country.to_string());
        }
        if let Some(telephone) = address.telephone.as_deref() {
            lines.push(format!("T: {telephone}"));
        }

        match format {
            AddressFormat::Text => lines.join("\n"),
            AddressFormat::Html => lines.join("<br/>"),
        }
    }
}

#[allow(clippy::unwrap_used)]
fn dec(s: &str) -> Decimal {
    use std::str::FromStr;
    Decimal::from_str(s).unwrap()
}

fn demo_image_set(handle: &str) -> ProductImages {
    ProductImages {
        normal: format!("https://cdn.stonefruit.dev/media/{handle}.jpg"),
        small: format!("https://cdn.stonefruit.dev/media/{handle}_small.jpg"),
        thumbnail: format!("https://cdn.stonefruit.dev/media/{handle}_thumb.jpg"),
    }
}

fn demo_product(id: i32, sku: &str, name: &str, handle: &str, price: &str) -> Product {
    Product {
        id: ProductId::new(id),
        sku: sku.to_string(),
        name: name.to_string(),
        description: Some(format!("{name} from the Stonefruit demo catalog.")),
        short_description: Some(name.to_string()),
        product_type: "simple".to_string(),
        enabled: true,
        in_stock: true,
        visible: true,
        is_virtual: false,
        price: dec(price),
        final_price: dec(price),
        stock_qty: dec("100"),
        min_sale_qty: Decimal::ONE,
        max_sale_qty: dec("100"),
        url: format!("https://shop.stonefruit.dev/{handle}"),
        images: demo_image_set(handle),
        crosssell_ids: Vec::new(),
    }
}

fn demo_products() -> Vec<Product> {
    let mut tee = demo_product(1, "ABC123", "Alpine Tee", "alpine-tee", "15.00");
    tee.final_price = dec("12.00");
    tee.crosssell_ids = vec![ProductId::new(2), ProductId::new(3)];

    let hoodie = demo_product(2, "DEF456", "Summit Hoodie", "summit-hoodie", "49.90");

    let mut socks = demo_product(3, "GHI789", "Trail Socks", "trail-socks", "9.50");
    socks.min_sale_qty = dec("2");

    let mut gift_card = demo_product(4, "GIFT25", "E-Gift Card", "e-gift-card", "25.00");
    gift_card.product_type = "virtual".to_string();
    gift_card.is_virtual = true;

    let mut sold_out = demo_product(5, "OOS001", "Ridge Cap", "ridge-cap", "19.00");
    sold_out.in_stock = false;
    sold_out.stock_qty = Decimal::ZERO;

    vec![tee, hoodie, socks, gift_card, sold_out]
}

fn demo_regions() -> Vec<Region> {
    vec![
        Region {
            id: RegionId::new(12),
            code: "CA".to_string(),
            name: "California".to_string(),
            country_id: "US".to_string(),
        },
        Region {
            id: RegionId::new(43),
            code: "NY".to_string(),
            name: "New York".to_string(),
            country_id: "US".to_string(),
        },
        Region {
            id: RegionId::new(62),
            code: "WA".to_string(),
            name: "Washington".to_string(),
            country_id: "US".to_string(),
        },
        Region {
            id: RegionId::new(80),
            code: "BAY".to_string(),
            name: "Bayern".to_string(),
            country_id: "DE".to_string(),
        },
    ]
}

fn demo_carriers() -> Vec<Carrier> {
    vec![
        Carrier {
            carrier: "flatrate".to_string(),
            carrier_title: "Flat Rate".to_string(),
            sort_order: 10,
            methods: vec![CarrierMethod {
                method: "flatrate".to_string(),
                method_title: "Fixed".to_string(),
                method_description: Some("Fixed rate per order".to_string()),
                price: dec("5.00"),
                sort_order: 0,
            }],
        },
        Carrier {
            carrier: "ups".to_string(),
            carrier_title: "United Parcel Service".to_string(),
            sort_order: 20,
            methods: vec![
                CarrierMethod {
                    method: "ground".to_string(),
                    method_title: "Ground".to_string(),
                    method_description: None,
                    price: dec("12.95"),
                    sort_order: 10,
                },
                CarrierMethod {
                    method: "express".to_string(),
                    method_title: "Express".to_string(),
                    method_description: None,
                    price: dec("29.95"),
                    sort_order: 20,
                },
            ],
        },
    ]
}

fn demo_payment_methods() -> Vec<PaymentMethodInfo> {
    vec![
        PaymentMethodInfo {
            code: "checkmo".to_string(),
            title: "Check / Money order".to_string(),
            enabled_for_checkout: true,
            allowed_countries: None,
            allowed_currencies: None,
            min_order_total: None,
            max_order_total: None,
            allow_zero_total: false,
            cc_types: Vec::new(),
        },
        PaymentMethodInfo {
            code: "free".to_string(),
            title: "No Payment Information Required".to_string(),
            enabled_for_checkout: true,
            allowed_countries: None,
            allowed_currencies: None,
            min_order_total: None,
            max_order_total: Some(Decimal::ZERO),
            allow_zero_total: true,
            cc_types: Vec::new(),
        },
        PaymentMethodInfo {
            code: "ccsave".to_string(),
            title: "Credit Card (saved)".to_string(),
            enabled_for_checkout: true,
            allowed_countries: Some(vec!["US".to_string(), "CA".to_string()]),
            allowed_currencies: Some(vec!["USD".to_string(), "CAD".to_string()]),
            min_order_total: None,
            max_order_total: None,
            allow_zero_total: false,
            cc_types: vec!["VI".to_string(), "MC".to_string()],
        },
    ]
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn quote_with_demo_item(engine: &MemoryEngine) -> Quote {
        let mut quote = engine.create_quote().unwrap();
        let product = engine.product_by_sku("ABC123").unwrap().unwrap();
        engine.add_product(&mut quote, &product, dec("2")).unwrap();
        quote
    }

    #[test]
    fn test_collect_totals_computes_breakdown() {
        let engine = MemoryEngine::with_demo_catalog("USD");
        let mut quote = quote_with_demo_item(&engine);

        engine.collect_totals(&mut quote).unwrap();

        assert_eq!(quote.grand_total(), dec("24.00"));
        assert!(quote.totals_collected);
        assert_eq!(
            quote.items.first().unwrap().row_total,
            dec("24.00")
        );
    }

    #[test]
    fn test_collect_totals_respects_cache_marker() {
        let engine = MemoryEngine::with_demo_catalog("USD");
        let mut quote = quote_with_demo_item(&engine);
        engine.collect_totals(&mut quote).unwrap();

        // A sneaky direct mutation without invalidation is not recomputed.
        quote.items.first_mut().unwrap().qty = dec("5");
        engine.collect_totals(&mut quote).unwrap();
        assert_eq!(quote.grand_total(), dec("24.00"));

        quote.invalidate_totals();
        engine.collect_totals(&mut quote).unwrap();
        assert_eq!(quote.grand_total(), dec("60.00"));
    }

    #[test]
    fn test_unknown_coupon_is_cleared() {
        let engine = MemoryEngine::with_demo_catalog("USD");
        let mut quote = quote_with_demo_item(&engine);
        quote.coupon_code = Some("BOGUS".to_string());

        engine.collect_totals(&mut quote).unwrap();

        assert!(quote.coupon_code.is_none());
    }

    #[test]
    fn test_known_coupon_discounts() {
        let engine = MemoryEngine::with_demo_catalog("USD");
        let mut quote = quote_with_demo_item(&engine);
        quote.coupon_code = Some("SAVE10".to_string());

        engine.collect_totals(&mut quote).unwrap();

        assert_eq!(quote.coupon_code.as_deref(), Some("SAVE10"));
        assert_eq!(quote.grand_total(), dec("21.60"));
    }

    #[test]
    fn test_add_product_merges_existing_line() {
        let engine = MemoryEngine::with_demo_catalog("USD");
        let mut quote = engine.create_quote().unwrap();
        let product = engine.product_by_sku("ABC123").unwrap().unwrap();

        let first = engine.add_product(&mut quote, &product, dec("1")).unwrap();
        let second = engine.add_product(&mut quote, &product, dec("2")).unwrap();

        assert!(first.created);
        assert!(!second.created);
        assert_eq!(first.item_id, second.item_id);
        assert_eq!(quote.items_qty(), dec("3"));
    }

    #[test]
    fn test_add_product_rejects_over_max_qty() {
        let engine = MemoryEngine::with_demo_catalog("USD");
        let mut quote = engine.create_quote().unwrap();
        let product = engine.product_by_sku("ABC123").unwrap().unwrap();

        let result = engine.add_product(&mut quote, &product, dec("500"));

        assert!(matches!(result, Err(EngineError::Rejected(_))));
        assert_eq!(quote.items_count(), 0);
    }

    #[test]
    fn test_crosssells_exclude_cart_products() {
        let engine = MemoryEngine::with_demo_catalog("USD");
        let mut quote = quote_with_demo_item(&engine);

        let linked = engine.crosssell_products(&quote).unwrap();
        let skus: Vec<&str> = linked.iter().map(|p| p.sku.as_str()).collect();
        assert_eq!(skus, vec!["DEF456", "GHI789"]);

        let hoodie = engine.product_by_sku("DEF456").unwrap().unwrap();
        engine.add_product(&mut quote, &hoodie, Decimal::ONE).unwrap();
        let linked = engine.crosssell_products(&quote).unwrap();
        let skus: Vec<&str> = linked.iter().map(|p| p.sku.as_str()).collect();
        assert_eq!(skus, vec!["GHI789"]);
    }

    #[test]
    fn test_region_resolution() {
        let engine = MemoryEngine::with_demo_catalog("USD");

        let by_code = engine.region_by_code_or_name("ca", "US").unwrap().unwrap();
        assert_eq!(by_code.name, "California");

        let by_name = engine
            .region_by_code_or_name("New York", "US")
            .unwrap()
            .unwrap();
        assert_eq!(by_name.code, "NY");

        assert!(engine.region_by_code_or_name("CA", "DE").unwrap().is_none());
    }

    #[test]
    fn test_submit_order_payment_failure() {
        let engine = MemoryEngine::with_demo_catalog("USD");
        engine.fail_payment_method("ccsave");

        let mut quote = quote_with_demo_item(&engine);
        quote.payment.method = Some("ccsave".to_string());

        assert!(matches!(
            engine.submit_order(&mut quote),
            Err(SubmitError::Payment(_))
        ));

        quote.payment.method = Some("checkmo".to_string());
        let order = engine.submit_order(&mut quote).unwrap();
        assert_eq!(order.increment_id, "100000001");
    }

    #[test]
    fn test_format_currency() {
        let engine = MemoryEngine::new("USD");
        assert_eq!(engine.format_currency("USD", dec("5")), "$5.00");
        assert_eq!(engine.format_currency("JPY", dec("1999.4")), "¥1999");
        assert_eq!(engine.format_currency("SEK", dec("12.5")), "12.50 SEK");
    }
}
