use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::store::{CustomerStore, StoreError};
use crate::types::{Customer, CustomerRegistrationRequest};

/// Entry point the HTTP layer uses to register customers.
#[async_trait]
pub trait CustomerRegistrar: Send + Sync {
    async fn register_new_customer(
        &self,
        request: CustomerRegistrationRequest,
    ) -> Result<RegistrationOutcome, RegistrationError>;
}

/// Result of a successful registration call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationOutcome {
    /// A new record was persisted.
    Registered(Customer),
    /// A customer with the same id and phone number already exists; nothing was written.
    ///
    /// Only id and phone number are compared. Other fields of the request, such
    /// as the name, are ignored and the stored record is returned as-is.
    AlreadyRegistered(Customer),
}

impl RegistrationOutcome {
    pub fn customer(&self) -> &Customer {
        match self {
            Self::Registered(customer) | Self::AlreadyRegistered(customer) => customer,
        }
    }

    pub fn is_new(&self) -> bool {
        matches!(self, Self::Registered(_))
    }
}

#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("phone number [{0}] is taken")]
    PhoneNumberTaken(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Enforces phone number uniqueness before persisting new customers.
#[derive(Clone)]
pub struct RegistrationService {
    store: Arc<dyn CustomerStore>,
}

impl RegistrationService {
    pub fn new(store: Arc<dyn CustomerStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl CustomerRegistrar for RegistrationService {
    async fn register_new_customer(
        &self,
        request: CustomerRegistrationRequest,
    ) -> Result<RegistrationOutcome, RegistrationError> {
        let candidate = request.into_candidate();

        // Without a phone number there is nothing to look up; the store's
        // NOT NULL constraint rejects the save below.
        if let Some(phone_number) = candidate.phone_number.as_deref() {
            if let Some(existing) = self.store.find_by_phone_number(phone_number).await? {
                if candidate.id == Some(existing.id) {
                    return Ok(RegistrationOutcome::AlreadyRegistered(existing));
                }
                return Err(RegistrationError::PhoneNumberTaken(phone_number.to_string()));
            }
        }

        let customer = self.store.save(&candidate.with_generated_id()).await?;
        Ok(RegistrationOutcome::Registered(customer))
    }
}
