//! Domain model for the quote aggregate.
//!
//! These are the in-process shapes this layer projects onto the wire and
//! hands to the Commerce Engine. They carry no persistence logic; the
//! engine owns storage.

pub mod address;
pub mod quote;

pub use address::{AddressKind, CachedAddressTotals, QuoteAddress, ShippingRate};
pub use quote::{
    CustomerBinding, LineItem, MessageSeverity, Payment, Quote, QuoteMessage, QuoteTotal,
};
