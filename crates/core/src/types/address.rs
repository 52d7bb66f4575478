//! Shipping address value type.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Errors that can occur when parsing a [`ShippingAddress`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    /// The payload is not a JSON object.
    #[error("shipping address must be an object")]
    NotAnObject,
    /// A required field is absent or blank.
    #[error("shipping address field `{0}` is required")]
    MissingField(&'static str),
    /// A field has a type that cannot be read as text.
    #[error("shipping address field `{0}` must be a string")]
    InvalidField(&'static str),
    /// A field exceeds the stored column width.
    #[error("shipping address field `{field}` must be at most {max} characters")]
    TooLong {
        /// Offending field.
        field: &'static str,
        /// Maximum allowed length.
        max: usize,
    },
}

/// A normalized shipping address.
///
/// Serialized with camelCase keys (`postalCode`), which is also the JSONB
/// layout stored on the order row.
///
/// ## Constraints
///
/// - Every field is trimmed and non-empty
/// - Every field is at most 255 characters
///
/// ## Examples
///
/// ```
/// use gamevault_core::ShippingAddress;
/// use serde_json::json;
///
/// let address = ShippingAddress::parse_value(&json!({
///     "address": "1 Main St",
///     "city": "Springfield",
///     "zip": 12345,
///     "country": "US",
///     "phone": "555-0100",
/// }))
/// .unwrap();
/// assert_eq!(address.postal_code(), "12345");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingAddress {
    address: String,
    city: String,
    postal_code: String,
    country: String,
    phone: String,
}

impl ShippingAddress {
    /// Maximum length of any single field.
    pub const MAX_FIELD_LENGTH: usize = 255;

    /// Build an address from already-separated fields.
    ///
    /// # Errors
    ///
    /// Returns an error if any field is blank or too long.
    pub fn new(
        address: &str,
        city: &str,
        postal_code: &str,
        country: &str,
        phone: &str,
    ) -> Result<Self, AddressError> {
        Ok(Self {
            address: clean("address", address)?,
            city: clean("city", city)?,
            postal_code: clean("postalCode", postal_code)?,
            country: clean("country", country)?,
            phone: clean("phone", phone)?,
        })
    }

    /// Parse a loosely typed JSON payload.
    ///
    /// Accepts `postalCode`, `postal_code`, or `zip` for the postal code and
    /// stringifies numeric postal codes and phone numbers.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload is not an object, or a field is
    /// missing, blank, too long, or not representable as text.
    pub fn parse_value(value: &Value) -> Result<Self, AddressError> {
        let object = value.as_object().ok_or(AddressError::NotAnObject)?;

        let field = |name: &'static str, keys: &[&str]| -> Result<String, AddressError> {
            let raw = keys
                .iter()
                .find_map(|key| object.get(*key).filter(|v| !v.is_null()))
                .ok_or(AddressError::MissingField(name))?;
            match raw {
                Value::String(s) => clean(name, s),
                Value::Number(n) => clean(name, &n.to_string()),
                _ => Err(AddressError::InvalidField(name)),
            }
        };

        Ok(Self {
            address: field("address", &["address", "line1"])?,
            city: field("city", &["city"])?,
            postal_code: field("postalCode", &["postalCode", "postal_code", "zip"])?,
            country: field("country", &["country"])?,
            phone: field("phone", &["phone"])?,
        })
    }

    /// Street address line.
    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }

    #[must_use]
    pub fn city(&self) -> &str {
        &self.city
    }

    #[must_use]
    pub fn postal_code(&self) -> &str {
        &self.postal_code
    }

    #[must_use]
    pub fn country(&self) -> &str {
        &self.country
    }

    #[must_use]
    pub fn phone(&self) -> &str {
        &self.phone
    }

    /// Single-line rendering for invoices and logs.
    #[must_use]
    pub fn one_line(&self) -> String {
        format!(
            "{}, {} {}, {}",
            self.address, self.postal_code, self.city, self.country
        )
    }
}

fn clean(field: &'static str, value: &str) -> Result<String, AddressError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AddressError::MissingField(field));
    }
    if trimmed.chars().count() > ShippingAddress::MAX_FIELD_LENGTH {
        return Err(AddressError::TooLong {
            field,
            max: ShippingAddress::MAX_FIELD_LENGTH,
        });
    }
    Ok(trimmed.to_owned())
}
