//! Structured quote validation.
//!
//! Runs every check and merges the results into one keyed error map, so a
//! client sees all problems in a single round trip. The only mutation is
//! the same-as-billing re-copy, which is required for the shipping address
//! to be validated as it will actually ship.

use stonefruit_core::Email;

use crate::engine::{CommerceEngine, MethodChecks};
use crate::error::ErrorMap;
use crate::model::{Quote, QuoteAddress};

/// Validate a quote for checkout.
///
/// Returns an empty map when the quote is placeable.
pub fn validate_quote(engine: &dyn CommerceEngine, quote: &mut Quote) -> ErrorMap {
    let mut errors = ErrorMap::new();

    if !quote.is_virtual {
        // Re-copy before validating so the mirror is validated, not a
        // stale copy.
        if quote.shipping_address.same_as_billing {
            let billing = quote.billing_address.clone();
            quote.shipping_address.import_fields_from(&billing);
            quote.shipping_address.same_as_billing = true;
        }

        let address_errors = validate_address(&quote.shipping_address);
        if !address_errors.is_empty() {
            errors.insert("shipping_address".to_string(), address_errors);
        }

        let has_valid_rate = quote
            .shipping_address
            .shipping_method
            .as_deref()
            .is_some_and(|method| quote.shipping_address.rate_by_code(method).is_some());
        if !has_valid_rate {
            errors.insert(
                "shipping_method".to_string(),
                vec!["Please specify a valid shipping method.".to_string()],
            );
        }
    }

    let address_errors = validate_address(&quote.billing_address);
    if !address_errors.is_empty() {
        errors.insert("billing_address".to_string(), address_errors);
    }

    if let Some(payment_errors) = validate_payment(engine, quote) {
        errors.insert("payment".to_string(), payment_errors);
    }

    errors
}

/// Field checks for one quote address.
pub fn validate_address(address: &QuoteAddress) -> Vec<String> {
    let mut errors = Vec::new();

    let required = [
        (address.firstname.as_deref(), "Please enter the first name."),
        (address.lastname.as_deref(), "Please enter the last name."),
        (address.street.as_deref(), "Please enter the street."),
        (address.city.as_deref(), "Please enter the city."),
        (address.postcode.as_deref(), "Please enter the zip/postal code."),
        (address.telephone.as_deref(), "Please enter the telephone number."),
        (address.country_id.as_deref(), "Please enter the country."),
    ];
    for (value, message) in required {
        if value.is_none_or(|v| v.trim().is_empty()) {
            errors.push(message.to_string());
        }
    }

    match address.email.as_deref() {
        None => errors.push("Please enter the email address.".to_string()),
        Some(email) => {
            if Email::parse(email).is_err() {
                errors.push("Please enter a valid email address.".to_string());
            }
        }
    }

    // A region that never resolved to a canonical triple is reported, not
    // silently shipped.
    if address.region.is_some() && address.region_id.is_none() {
        errors.push("Please enter a valid state/province.".to_string());
    }

    errors
}

/// Payment method resolution and applicability; `None` means valid.
fn validate_payment(engine: &dyn CommerceEngine, quote: &Quote) -> Option<Vec<String>> {
    let invalid = vec!["Please select a valid payment method.".to_string()];

    let Some(method_code) = quote.payment.method.as_deref() else {
        return Some(invalid);
    };

    // An engine failure while resolving the method is surfaced as data,
    // never as a transport fault.
    match engine.payment_method(method_code) {
        Ok(Some(method)) => {
            if method.applicable_to(quote, MethodChecks::checkout()) {
                None
            } else {
                Some(invalid)
            }
        }
        Ok(None) => Some(invalid),
        Err(err) => {
            tracing::warn!(method = method_code, error = %err, "payment method resolution failed");
            Some(invalid)
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::engine::MemoryEngine;
    use crate::model::ShippingRate;
    use rust_decimal::Decimal;

    fn filled_address(address: &mut QuoteAddress) {
        address.firstname = Some("Ada".to_string());
        address.lastname = Some("Lovelace".to_string());
        address.street = Some("1 Analytical Way".to_string());
        address.city = Some("San Francisco".to_string());
        address.postcode = Some("94107".to_string());
        address.telephone = Some("555-0100".to_string());
        address.country_id = Some("US".to_string());
        address.email = Some("ada@example.com".to_string());
    }

    fn placeable_quote() -> Quote {
        let mut quote = Quote::new("USD");
        filled_address(&mut quote.billing_address);
        filled_address(&mut quote.shipping_address);
        quote.shipping_address.shipping_method = Some("flatrate_flatrate".to_string());
        quote.shipping_address.rates.push(ShippingRate {
            code: "flatrate_flatrate".to_string(),
            carrier: "flatrate".to_string(),
            carrier_title: "Flat Rate".to_string(),
            method: "flatrate".to_string(),
            method_title: "Fixed".to_string(),
            method_description: None,
            price: Decimal::ZERO,
            carrier_sort_order: 0,
            method_sort_order: 0,
            deleted: false,
        });
        quote.payment.method = Some("checkmo".to_string());
        quote
    }

    #[test]
    fn test_placeable_quote_passes() {
        let engine = MemoryEngine::with_demo_catalog("USD");
        let mut quote = placeable_quote();

        assert!(validate_quote(&engine, &mut quote).is_empty());
    }

    #[test]
    fn test_missing_payment_method() {
        let engine = MemoryEngine::with_demo_catalog("USD");
        let mut quote = placeable_quote();
        quote.payment.method = None;

        let errors = validate_quote(&engine, &mut quote);
        assert!(errors.contains_key("payment"));
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn test_unknown_payment_method() {
        let engine = MemoryEngine::with_demo_catalog("USD");
        let mut quote = placeable_quote();
        quote.payment.method = Some("not_a_method".to_string());

        let errors = validate_quote(&engine, &mut quote);
        assert!(errors.contains_key("payment"));
    }

    #[test]
    fn test_missing_shipping_method() {
        let engine = MemoryEngine::with_demo_catalog("USD");
        let mut quote = placeable_quote();
        quote.shipping_address.shipping_method = None;

        let errors = validate_quote(&engine, &mut quote);
        assert!(errors.contains_key("shipping_method"));
    }

    #[test]
    fn test_method_without_matching_rate() {
        let engine = MemoryEngine::with_demo_catalog("USD");
        let mut quote = placeable_quote();
        quote.shipping_address.rates.clear();

        let errors = validate_quote(&engine, &mut quote);
        assert!(errors.contains_key("shipping_method"));
    }

    #[test]
    fn test_same_as_billing_is_recopied_before_validation() {
        let engine = MemoryEngine::with_demo_catalog("USD");
        let mut quote = placeable_quote();
        // Shipping starts stale and incomplete but mirrors billing.
        quote.shipping_address.reset();
        quote.shipping_address.same_as_billing = true;
        quote.shipping_address.shipping_method = Some("flatrate_flatrate".to_string());
        quote.shipping_address.rates = placeable_quote().shipping_address.rates;

        let errors = validate_quote(&engine, &mut quote);

        assert!(!errors.contains_key("shipping_address"));
        assert_eq!(
            quote.shipping_address.city.as_deref(),
            Some("San Francisco")
        );
    }

    #[test]
    fn test_virtual_quote_skips_shipping_checks() {
        let engine = MemoryEngine::with_demo_catalog("USD");
        let mut quote = placeable_quote();
        quote.is_virtual = true;
        quote.shipping_address.reset();

        assert!(validate_quote(&engine, &mut quote).is_empty());
    }

    #[test]
    fn test_address_errors_accumulate() {
        let mut address = QuoteAddress::new(crate::model::AddressKind::Billing);
        address.email = Some("not-an-email".to_string());

        let errors = validate_address(&address);
        assert!(errors.len() >= 7);
        assert!(errors.iter().any(|e| e.contains("valid email")));
    }

    #[test]
    fn test_unresolved_region_is_reported() {
        let mut address = QuoteAddress::new(crate::model::AddressKind::Billing);
        filled_address(&mut address);
        address.region = Some("Atlantis".to_string());

        let errors = validate_address(&address);
        assert_eq!(errors, vec!["Please enter a valid state/province.".to_string()]);
    }
}
