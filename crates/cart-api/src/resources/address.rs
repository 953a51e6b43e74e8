//! Shared plumbing for the billing and shipping address resources.

use std::sync::LazyLock;

use serde_json::{Map, Value};
use stonefruit_core::{AddressId, RegionId};

use crate::engine::{CommerceEngine, StoredAddress};
use crate::error::{AppError, Result};
use crate::model::{Quote, QuoteAddress};
use crate::projection::FieldRegistry;
use crate::projection::registry::{as_bool, opt_i32, opt_string, string_or_null};

/// Field registry shared by both address sides. `shipping_method` and
/// `same_as_billing` are registered here but only declared readable or
/// writable by the shipping resource.
pub static REGISTRY: LazyLock<FieldRegistry<QuoteAddress>> = LazyLock::new(|| {
    FieldRegistry::new()
        .accessor(
            "email",
            |a: &QuoteAddress| string_or_null(a.email.as_deref()),
            |a, v| a.email = opt_string(v),
        )
        .accessor(
            "prefix",
            |a| string_or_null(a.prefix.as_deref()),
            |a, v| a.prefix = opt_string(v),
        )
        .accessor(
            "firstname",
            |a| string_or_null(a.firstname.as_deref()),
            |a, v| a.firstname = opt_string(v),
        )
        .accessor(
            "lastname",
            |a| string_or_null(a.lastname.as_deref()),
            |a, v| a.lastname = opt_string(v),
        )
        .accessor(
            "suffix",
            |a| string_or_null(a.suffix.as_deref()),
            |a, v| a.suffix = opt_string(v),
        )
        .accessor(
            "company",
            |a| string_or_null(a.company.as_deref()),
            |a, v| a.company = opt_string(v),
        )
        .accessor(
            "street",
            |a| string_or_null(a.street.as_deref()),
            |a, v| a.street = opt_string(v),
        )
        .accessor(
            "city",
            |a| string_or_null(a.city.as_deref()),
            |a, v| a.city = opt_string(v),
        )
        .accessor(
            "postcode",
            |a| string_or_null(a.postcode.as_deref()),
            |a, v| a.postcode = opt_string(v),
        )
        .accessor(
            "region",
            |a| string_or_null(a.region.as_deref()),
            |a, v| a.region = opt_string(v),
        )
        .accessor(
            "region_id",
            |a| a.region_id.map_or(Value::Null, |id| Value::from(id.as_i32())),
            |a, v| a.region_id = opt_i32(v).map(RegionId::new),
        )
        .accessor(
            "country_id",
            |a| string_or_null(a.country_id.as_deref()),
            |a, v| a.country_id = opt_string(v),
        )
        .accessor(
            "telephone",
            |a| string_or_null(a.telephone.as_deref()),
            |a, v| a.telephone = opt_string(v),
        )
        .accessor(
            "fax",
            |a| string_or_null(a.fax.as_deref()),
            |a, v| a.fax = opt_string(v),
        )
        .accessor(
            "customer_address_id",
            |a| {
                a.customer_address_id
                    .map_or(Value::Null, |id| Value::from(id.as_i32()))
            },
            |a, v| a.customer_address_id = opt_i32(v).map(AddressId::new),
        )
        .accessor(
            "save_in_address_book",
            |a| Value::Bool(a.save_in_address_book),
            |a, v| a.save_in_address_book = as_bool(v),
        )
        .accessor(
            "same_as_billing",
            |a| Value::Bool(a.same_as_billing),
            |a, v| a.same_as_billing = as_bool(v),
        )
        .accessor(
            "shipping_method",
            |a| string_or_null(a.shipping_method.as_deref()),
            |a, v| a.shipping_method = opt_string(v),
        )
        .readable("validation_errors", |a| {
            Value::Array(
                a.validation_errors
                    .iter()
                    .map(|e| Value::String(e.clone()))
                    .collect(),
            )
        })
});

/// Resolve a raw `region` input to the canonical
/// `(region, region_id, country_id)` triple.
///
/// A `country_id` arriving without `region` re-resolves the current region
/// against the new country. Numeric regions resolve by id and are accepted
/// only when the country matches; strings resolve by code, then by name,
/// within the country. Unresolvable regions keep the raw value with a
/// cleared id, which address validation reports.
pub fn fix_address_data(
    engine: &dyn CommerceEngine,
    mut data: Map<String, Value>,
    old_country_id: Option<&str>,
    old_region_id: Option<RegionId>,
) -> Result<Map<String, Value>> {
    if data.contains_key("country_id") && !data.contains_key("region") {
        if let Some(region_id) = old_region_id {
            data.insert("region".to_string(), Value::from(region_id.as_i32()));
        }
    }

    let Some(region_value) = data.get("region").cloned() else {
        return Ok(data);
    };

    // Clear previous region_id
    data.insert("region_id".to_string(), Value::Null);

    let country_id = data
        .get("country_id")
        .and_then(Value::as_str)
        .map(ToString::to_string)
        .or_else(|| old_country_id.map(ToString::to_string));

    let numeric_region = match &region_value {
        Value::Number(_) => opt_i32(&region_value),
        Value::String(s) if !s.is_empty() && s.chars().all(|c| c.is_ascii_digit()) => {
            s.parse().ok()
        }
        _ => None,
    };

    if let Some(id) = numeric_region {
        if let Some(region) = engine.region_by_id(RegionId::new(id))? {
            let country_matches = country_id
                .as_deref()
                .is_none_or(|country| country == region.country_id);
            if country_matches {
                data.insert("region".to_string(), Value::String(region.name));
                data.insert("region_id".to_string(), Value::from(region.id.as_i32()));
                data.insert("country_id".to_string(), Value::String(region.country_id));
            }
        }
    } else if let (Some(country), Some(term)) = (country_id, region_value.as_str()) {
        if let Some(region) = engine.region_by_code_or_name(term, &country)? {
            data.insert("region".to_string(), Value::String(region.name));
            data.insert("region_id".to_string(), Value::from(region.id.as_i32()));
        }
    }

    Ok(data)
}

/// Import a stored address-book entry into a quote address.
///
/// The caller has already checked ownership. `save_in_address_book` is
/// force-cleared; the entry is already in the book.
pub fn import_stored_address(address: &mut QuoteAddress, stored: &StoredAddress) {
    address.customer_address_id = Some(stored.id);
    address.email.clone_from(&stored.email);
    address.firstname.clone_from(&stored.firstname);
    address.lastname.clone_from(&stored.lastname);
    address.company.clone_from(&stored.company);
    address.street.clone_from(&stored.street);
    address.city.clone_from(&stored.city);
    address.postcode.clone_from(&stored.postcode);
    address.region.clone_from(&stored.region);
    address.region_id = stored.region_id;
    address.country_id.clone_from(&stored.country_id);
    address.telephone.clone_from(&stored.telephone);
    address.save_in_address_book = false;
}

/// Export a quote address as an address-book entry for the given owner.
#[must_use]
pub fn export_stored_address(
    address: &QuoteAddress,
    customer_id: stonefruit_core::CustomerId,
) -> StoredAddress {
    StoredAddress {
        id: AddressId::new(0),
        customer_id,
        email: address.email.clone(),
        firstname: address.firstname.clone(),
        lastname: address.lastname.clone(),
        company: address.company.clone(),
        street: address.street.clone(),
        city: address.city.clone(),
        postcode: address.postcode.clone(),
        region: address.region.clone(),
        region_id: address.region_id,
        country_id: address.country_id.clone(),
        telephone: address.telephone.clone(),
    }
}

/// Load a stored address and check it belongs to the quote's customer.
pub fn load_owned_stored_address(
    engine: &dyn CommerceEngine,
    quote: &Quote,
    id: AddressId,
) -> Result<Option<StoredAddress>> {
    let Some(stored) = engine.customer_address(id)? else {
        return Ok(None);
    };

    if quote.customer_id() != Some(stored.customer_id) {
        return Err(AppError::BadRequest(
            "Customer Address is not valid.".to_string(),
        ));
    }

    Ok(Some(stored))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::engine::MemoryEngine;
    use crate::model::AddressKind;
    use serde_json::json;
    use stonefruit_core::CustomerId;

    fn obj(value: Value) -> Map<String, Value> {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn test_fix_address_data_by_code() {
        let engine = MemoryEngine::with_demo_catalog("USD");
        let data = obj(json!({"region": "CA", "country_id": "US"}));

        let fixed = fix_address_data(&engine, data, None, None).unwrap();

        assert_eq!(fixed.get("region"), Some(&json!("California")));
        assert_eq!(fixed.get("region_id"), Some(&json!(12)));
    }

    #[test]
    fn test_fix_address_data_by_name_with_old_country() {
        let engine = MemoryEngine::with_demo_catalog("USD");
        let data = obj(json!({"region": "New York"}));

        let fixed = fix_address_data(&engine, data, Some("US"), None).unwrap();

        assert_eq!(fixed.get("region_id"), Some(&json!(43)));
    }

    #[test]
    fn test_fix_address_data_numeric_region() {
        let engine = MemoryEngine::with_demo_catalog("USD");
        let data = obj(json!({"region": 12}));

        let fixed = fix_address_data(&engine, data, None, None).unwrap();

        assert_eq!(fixed.get("region"), Some(&json!("California")));
        assert_eq!(fixed.get("country_id"), Some(&json!("US")));
    }

    #[test]
    fn test_fix_address_data_numeric_region_country_mismatch() {
        let engine = MemoryEngine::with_demo_catalog("USD");
        let data = obj(json!({"region": 12, "country_id": "DE"}));

        let fixed = fix_address_data(&engine, data, None, None).unwrap();

        // Kept raw with a cleared id; validation reports it.
        assert_eq!(fixed.get("region"), Some(&json!(12)));
        assert_eq!(fixed.get("region_id"), Some(&Value::Null));
    }

    #[test]
    fn test_fix_address_data_country_change_revalidates_region() {
        let engine = MemoryEngine::with_demo_catalog("USD");
        let data = obj(json!({"country_id": "US"}));

        let fixed =
            fix_address_data(&engine, data, Some("DE"), Some(RegionId::new(12))).unwrap();

        // The old region id was re-resolved under the incoming country.
        assert_eq!(fixed.get("region"), Some(&json!("California")));
        assert_eq!(fixed.get("country_id"), Some(&json!("US")));
    }

    #[test]
    fn test_fix_address_data_unknown_region_left_raw() {
        let engine = MemoryEngine::with_demo_catalog("USD");
        let data = obj(json!({"region": "Atlantis", "country_id": "US"}));

        let fixed = fix_address_data(&engine, data, None, None).unwrap();

        assert_eq!(fixed.get("region"), Some(&json!("Atlantis")));
        assert_eq!(fixed.get("region_id"), Some(&Value::Null));
    }

    #[test]
    fn test_stored_address_roundtrip() {
        let mut address = QuoteAddress::new(AddressKind::Billing);
        address.firstname = Some("Ada".to_string());
        address.city = Some("London".to_string());
        address.save_in_address_book = true;

        let mut stored = export_stored_address(&address, CustomerId::new(9));
        stored.id = AddressId::new(77);

        let mut imported = QuoteAddress::new(AddressKind::Shipping);
        import_stored_address(&mut imported, &stored);

        assert_eq!(imported.firstname.as_deref(), Some("Ada"));
        assert_eq!(imported.city.as_deref(), Some("London"));
        assert_eq!(imported.customer_address_id, Some(AddressId::new(77)));
        assert!(!imported.save_in_address_book);
    }

    #[test]
    fn test_load_owned_stored_address_rejects_foreign_owner() {
        let engine = MemoryEngine::with_demo_catalog("USD");
        engine.seed_customer_address(StoredAddress {
            id: AddressId::new(501),
            customer_id: CustomerId::new(1),
            email: None,
            firstname: None,
            lastname: None,
            company: None,
            street: None,
            city: None,
            postcode: None,
            region: None,
            region_id: None,
            country_id: None,
            telephone: None,
        });

        let mut quote = Quote::new("USD");
        quote.customer = crate::model::CustomerBinding::Customer(CustomerId::new(2));

        let result = load_owned_stored_address(&engine, &quote, AddressId::new(501));
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }
}
