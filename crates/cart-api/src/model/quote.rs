//! The quote aggregate: cart head, line items, payment, totals, messages.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::{Map, Value};
use stonefruit_core::{CustomerId, ItemId, ProductId, QuoteId};

use super::address::{AddressKind, QuoteAddress};

/// Customer linkage of a quote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CustomerBinding {
    /// Anonymous session cart.
    Guest,
    /// Cart owned by an authenticated customer.
    Customer(CustomerId),
}

impl CustomerBinding {
    /// Customer id when bound to an authenticated customer.
    #[must_use]
    pub const fn customer_id(&self) -> Option<CustomerId> {
        match self {
            Self::Guest => None,
            Self::Customer(id) => Some(*id),
        }
    }
}

/// One entry of the ordered totals breakdown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuoteTotal {
    /// Stable total code (e.g. `subtotal`, `grand_total`).
    pub code: String,
    /// Human-readable title.
    pub title: String,
    /// Amount in quote currency.
    pub value: Decimal,
}

/// Severity bucket for outstanding quote messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MessageSeverity {
    Error,
    Warning,
    Notice,
    Success,
}

impl MessageSeverity {
    /// Wire name of the severity bucket.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Notice => "notice",
            Self::Success => "success",
        }
    }
}

/// Outstanding message attached to the quote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuoteMessage {
    pub severity: MessageSeverity,
    pub text: String,
}

/// A line item of the quote.
///
/// Only top-level items (no `parent_item_id`) are independently addressable.
/// Children of composite products hang off their parent and are projected
/// inline, never nested further.
#[derive(Debug, Clone)]
pub struct LineItem {
    pub id: ItemId,
    pub product_id: ProductId,
    pub sku: String,
    pub name: String,
    pub product_type: String,
    pub qty: Decimal,
    pub price: Decimal,
    pub row_total: Decimal,
    pub row_total_incl_tax: Decimal,
    pub backorders: Decimal,
    pub error_infos: Vec<String>,
    pub messages: Vec<String>,
    pub parent_item_id: Option<ItemId>,
    pub redirect_url: Option<String>,
    pub deleted: bool,
}

impl LineItem {
    /// Whether this item appears in the visible (top-level) item list.
    #[must_use]
    pub const fn is_visible(&self) -> bool {
        !self.deleted && self.parent_item_id.is_none()
    }
}

/// Selected payment method plus its method-specific data bag.
#[derive(Debug, Clone, Default)]
pub struct Payment {
    pub method: Option<String>,
    pub data: Map<String, Value>,
}

impl Payment {
    /// Reset to the unselected state.
    pub fn clear(&mut self) {
        self.method = None;
        self.data.clear();
    }
}

/// The mutable cart aggregate.
///
/// Created or loaded per session, mutated by every write operation, and
/// persisted only through the quote synchronizer's commit.
#[derive(Debug, Clone)]
pub struct Quote {
    pub id: QuoteId,
    /// ISO 4217 quote currency.
    pub currency: String,
    pub customer: CustomerBinding,
    pub customer_is_guest: bool,
    pub customer_email: Option<String>,
    pub coupon_code: Option<String>,
    /// Ordered totals breakdown, engine-computed.
    pub totals: Vec<QuoteTotal>,
    pub items: Vec<LineItem>,
    pub billing_address: QuoteAddress,
    pub shipping_address: QuoteAddress,
    pub payment: Payment,
    pub is_active: bool,
    pub is_virtual: bool,
    pub has_error: bool,
    pub messages: Vec<QuoteMessage>,
    /// Engine cache marker; cleared by writes so the next commit recomputes.
    pub totals_collected: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// True until the first persistence commit.
    pub is_new: bool,
}

impl Quote {
    /// Fresh, empty, active quote in the given currency.
    #[must_use]
    pub fn new(currency: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: QuoteId::generate(),
            currency: currency.into(),
            customer: CustomerBinding::Guest,
            customer_is_guest: false,
            customer_email: None,
            coupon_code: None,
            totals: Vec::new(),
            items: Vec::new(),
            billing_address: QuoteAddress::new(AddressKind::Billing),
            shipping_address: QuoteAddress::new(AddressKind::Shipping),
            payment: Payment::default(),
            is_active: true,
            is_virtual: false,
            has_error: false,
            messages: Vec::new(),
            totals_collected: false,
            created_at: now,
            updated_at: now,
            is_new: true,
        }
    }

    /// Top-level, non-deleted items.
    pub fn visible_items(&self) -> impl Iterator<Item = &LineItem> {
        self.items.iter().filter(|item| item.is_visible())
    }

    /// Number of visible line items.
    #[must_use]
    pub fn items_count(&self) -> usize {
        self.visible_items().count()
    }

    /// Sum of visible item quantities.
    #[must_use]
    pub fn items_qty(&self) -> Decimal {
        self.visible_items().map(|item| item.qty).sum()
    }

    /// Visible item by id. Deleted items and children are not addressable.
    #[must_use]
    pub fn visible_item(&self, id: ItemId) -> Option<&LineItem> {
        self.visible_items().find(|item| item.id == id)
    }

    /// Mutable access to a visible item by id.
    pub fn visible_item_mut(&mut self, id: ItemId) -> Option<&mut LineItem> {
        self.items
            .iter_mut()
            .find(|item| item.is_visible() && item.id == id)
    }

    /// Non-deleted children of a parent item.
    pub fn children_of(&self, parent: ItemId) -> impl Iterator<Item = &LineItem> {
        self.items
            .iter()
            .filter(move |item| !item.deleted && item.parent_item_id == Some(parent))
    }

    /// Whether any non-deleted item references the product.
    #[must_use]
    pub fn has_product(&self, product_id: ProductId) -> bool {
        self.items
            .iter()
            .any(|item| !item.deleted && item.product_id == product_id)
    }

    /// Mark an item and its children deleted.
    pub fn delete_item(&mut self, id: ItemId) {
        for item in &mut self.items {
            if item.id == id || item.parent_item_id == Some(id) {
                item.deleted = true;
            }
        }
        self.invalidate_totals();
    }

    /// Grand total from the engine-computed breakdown, zero before collection.
    #[must_use]
    pub fn grand_total(&self) -> Decimal {
        self.totals
            .iter()
            .find(|total| total.code == "grand_total")
            .map_or(Decimal::ZERO, |total| total.value)
    }

    /// Customer id when bound to an authenticated customer.
    #[must_use]
    pub const fn customer_id(&self) -> Option<CustomerId> {
        self.customer.customer_id()
    }

    /// Clear the engine's totals cache marker so the next commit recomputes.
    pub fn invalidate_totals(&mut self) {
        self.totals_collected = false;
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn item(id: i32, parent: Option<i32>, qty: &str) -> LineItem {
        LineItem {
            id: ItemId::new(id),
            product_id: ProductId::new(id),
            sku: format!("SKU{id}"),
            name: format!("Item {id}"),
            product_type: "simple".to_string(),
            qty: dec(qty),
            price: Decimal::ZERO,
            row_total: Decimal::ZERO,
            row_total_incl_tax: Decimal::ZERO,
            backorders: Decimal::ZERO,
            error_infos: Vec::new(),
            messages: Vec::new(),
            parent_item_id: parent.map(ItemId::new),
            redirect_url: None,
            deleted: false,
        }
    }

    #[test]
    fn test_children_are_not_visible() {
        let mut quote = Quote::new("USD");
        quote.items.push(item(1, None, "2"));
        quote.items.push(item(2, Some(1), "2"));

        assert_eq!(quote.items_count(), 1);
        assert!(quote.visible_item(ItemId::new(2)).is_none());
        assert_eq!(quote.children_of(ItemId::new(1)).count(), 1);
    }

    #[test]
    fn test_items_qty_sums_visible_only() {
        let mut quote = Quote::new("USD");
        quote.items.push(item(1, None, "2"));
        quote.items.push(item(2, Some(1), "4"));
        quote.items.push(item(3, None, "1.5"));

        assert_eq!(quote.items_qty(), dec("3.5"));
    }

    #[test]
    fn test_delete_item_cascades_to_children() {
        let mut quote = Quote::new("USD");
        quote.items.push(item(1, None, "1"));
        quote.items.push(item(2, Some(1), "1"));
        quote.totals_collected = true;

        quote.delete_item(ItemId::new(1));

        assert_eq!(quote.items_count(), 0);
        assert!(quote.items.iter().all(|i| i.deleted));
        assert!(!quote.totals_collected);
    }

    #[test]
    fn test_grand_total_defaults_to_zero() {
        let quote = Quote::new("USD");
        assert_eq!(quote.grand_total(), Decimal::ZERO);
    }
}
