use std::fmt;

use async_trait::async_trait;
use thiserror::Error;

use crate::types::{Customer, CustomerId, NewCustomer};

/// Persistence capability the registration service depends on.
#[async_trait]
pub trait CustomerStore: Send + Sync {
    /// Returns the customer registered under `phone_number`, if any.
    async fn find_by_phone_number(&self, phone_number: &str)
        -> Result<Option<Customer>, StoreError>;

    /// Returns the customer stored under `id`, if any.
    async fn find_by_id(&self, id: &CustomerId) -> Result<Option<Customer>, StoreError>;

    /// Inserts a new customer, generating an id when the candidate has none.
    ///
    /// Fails with [`StoreError::ConstraintViolation`] when a required field is
    /// absent or blank, or when the phone number or id is already taken. A
    /// failed save leaves the store unchanged.
    async fn save(&self, customer: &NewCustomer) -> Result<Customer, StoreError>;
}

/// Storage-level constraints declared on the customers table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CustomerConstraint {
    NameRequired,
    PhoneNumberRequired,
    PhoneNumberUnique,
    IdUnique,
}

impl CustomerConstraint {
    /// Whether the violation is a duplicate of an existing record.
    pub fn is_uniqueness(self) -> bool {
        matches!(self, Self::PhoneNumberUnique | Self::IdUnique)
    }
}

impl fmt::Display for CustomerConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match self {
            Self::NameRequired => "customer.name must not be null or blank",
            Self::PhoneNumberRequired => "customer.phone_number must not be null or blank",
            Self::PhoneNumberUnique => "customer.phone_number must be unique",
            Self::IdUnique => "customer.id must be unique",
        };
        f.write_str(message)
    }
}

/// Errors surfaced by [`CustomerStore`] implementations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("constraint violation: {0}")]
    ConstraintViolation(CustomerConstraint),
    #[error("stored customer record is corrupt: {0}")]
    Corrupt(String),
    #[error("customer store failure: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl StoreError {
    pub fn constraint(&self) -> Option<CustomerConstraint> {
        match self {
            Self::ConstraintViolation(constraint) => Some(*constraint),
            _ => None,
        }
    }
}
