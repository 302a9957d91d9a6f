use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use customer_registry_core::{RegistrationError, StoreError, ValidationError};

#[derive(Debug, Serialize)]
struct ProblemDetails {
    #[serde(rename = "type")]
    problem_type: &'static str,
    title: &'static str,
    detail: String,
}

/// RFC 7807 error body returned by the HTTP handlers.
#[derive(Debug)]
pub struct ProblemResponse {
    status: StatusCode,
    body: ProblemDetails,
}

impl ProblemResponse {
    pub fn new<S: Into<String>>(status: StatusCode, problem_type: &'static str, detail: S) -> Self {
        Self {
            status,
            body: ProblemDetails {
                problem_type,
                title: status.canonical_reason().unwrap_or("error"),
                detail: detail.into(),
            },
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn problem_type(&self) -> &'static str {
        self.body.problem_type
    }
}

impl From<ValidationError> for ProblemResponse {
    fn from(err: ValidationError) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, "invalid_request", err.to_string())
    }
}

impl From<RegistrationError> for ProblemResponse {
    fn from(err: RegistrationError) -> Self {
        match err {
            RegistrationError::PhoneNumberTaken(_) => {
                Self::new(StatusCode::CONFLICT, "phone_number_taken", err.to_string())
            }
            RegistrationError::Store(StoreError::ConstraintViolation(constraint)) => {
                let status = if constraint.is_uniqueness() {
                    StatusCode::CONFLICT
                } else {
                    StatusCode::UNPROCESSABLE_ENTITY
                };
                Self::new(status, "constraint_violation", constraint.to_string())
            }
            RegistrationError::Store(_) => Self::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "storage_error",
                "failed to persist customer",
            ),
        }
    }
}

impl IntoResponse for ProblemResponse {
    fn into_response(self) -> Response {
        let mut response = Json(self.body).into_response();
        *response.status_mut() = self.status;
        response.headers_mut().insert(
            axum::http::header::CONTENT_TYPE,
            axum::http::HeaderValue::from_static("application/problem+json"),
        );
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use customer_registry_core::CustomerConstraint;

    #[test]
    fn conflict_maps_to_409() {
        let problem = ProblemResponse::from(RegistrationError::PhoneNumberTaken("09000".into()));
        assert_eq!(problem.status(), StatusCode::CONFLICT);
        assert_eq!(problem.problem_type(), "phone_number_taken");
        assert_eq!(problem.body.detail, "phone number [09000] is taken");
    }

    #[test]
    fn constraint_violations_split_by_kind() {
        let unique = ProblemResponse::from(RegistrationError::Store(
            StoreError::ConstraintViolation(CustomerConstraint::PhoneNumberUnique),
        ));
        assert_eq!(unique.status(), StatusCode::CONFLICT);

        let required = ProblemResponse::from(RegistrationError::Store(
            StoreError::ConstraintViolation(CustomerConstraint::NameRequired),
        ));
        assert_eq!(required.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(required.problem_type(), "constraint_violation");
    }

    #[test]
    fn backend_failures_hide_details() {
        let problem = ProblemResponse::from(RegistrationError::Store(StoreError::Corrupt(
            "bad id".into(),
        )));
        assert_eq!(problem.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(problem.body.detail, "failed to persist customer");
    }
}
