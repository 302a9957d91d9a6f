//! Domain layer for customer registration.
//!
//! Holds the customer types shared by the storage and HTTP crates, the
//! [`store::CustomerStore`] capability the registration service depends on,
//! and the service itself.

pub mod registration;
pub mod store;
pub mod types;

pub use registration::{
    CustomerRegistrar, RegistrationError, RegistrationOutcome, RegistrationService,
};
pub use store::{CustomerConstraint, CustomerStore, StoreError};
pub use types::{
    Customer, CustomerId, CustomerRegistrationRequest, NewCustomer, ValidationError,
};
