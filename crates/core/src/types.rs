use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Identifier assigned to every stored customer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CustomerId(Uuid);

impl CustomerId {
    /// Creates a fresh random identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

}

impl fmt::Display for CustomerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for CustomerId {
    type Err = uuid::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(value).map(Self)
    }
}

/// A customer as persisted by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: CustomerId,
    pub name: String,
    pub phone_number: String,
}

/// Candidate customer handed to the store.
///
/// Every field may be absent; the storage schema is what finally rejects a
/// record without a name or phone number.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewCustomer {
    pub id: Option<CustomerId>,
    pub name: Option<String>,
    pub phone_number: Option<String>,
}

impl NewCustomer {
    pub fn new(id: Option<CustomerId>, name: &str, phone_number: &str) -> Self {
        Self {
            id,
            name: Some(name.to_string()),
            phone_number: Some(phone_number.to_string()),
        }
    }

    /// Fills in a generated identifier when none was supplied.
    pub fn with_generated_id(self) -> Self {
        Self {
            id: Some(self.id.unwrap_or_else(CustomerId::generate)),
            ..self
        }
    }
}

/// Payload accepted by the registration endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerRegistrationRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<CustomerId>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
}

impl CustomerRegistrationRequest {
    /// Checks that the required fields are present and not blank.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut missing = Vec::new();
        if is_missing(self.name.as_deref()) {
            missing.push("name");
        }
        if is_missing(self.phone_number.as_deref()) {
            missing.push("phoneNumber");
        }

        if missing.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { missing })
        }
    }

    pub fn into_candidate(self) -> NewCustomer {
        NewCustomer {
            id: self.id,
            name: self.name,
            phone_number: self.phone_number,
        }
    }
}

impl From<NewCustomer> for CustomerRegistrationRequest {
    fn from(customer: NewCustomer) -> Self {
        Self {
            id: customer.id,
            name: customer.name,
            phone_number: customer.phone_number,
        }
    }
}

/// Characters the storage CHECK constraints strip before testing for emptiness.
const BLANK_CHARS: [char; 6] = [' ', '\t', '\n', '\u{0B}', '\u{0C}', '\r'];

/// Whether `value` is empty once ASCII whitespace is stripped.
///
/// Kept in step with the `customers_*_not_blank` constraints so the validator
/// and the schema agree on what blank means.
pub fn is_blank(value: &str) -> bool {
    value.trim_matches(&BLANK_CHARS[..]).is_empty()
}

fn is_missing(value: Option<&str>) -> bool {
    value.map_or(true, is_blank)
}

/// Raised when a registration payload lacks required fields.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("missing or blank required fields: {}", .missing.join(", "))]
pub struct ValidationError {
    pub missing: Vec<&'static str>,
}
