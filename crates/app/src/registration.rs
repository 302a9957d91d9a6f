use std::time::Instant;

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use metrics::{counter, histogram};
use tracing::{error, info, warn};

use customer_registry_core::{
    CustomerRegistrationRequest, RegistrationError, RegistrationOutcome, StoreError,
};

use crate::problem::ProblemResponse;
use crate::router::AppState;

/// Handles `PUT /api/v1/customer-registration`.
pub async fn handle(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Response, ProblemResponse> {
    let start = Instant::now();

    let request: CustomerRegistrationRequest = serde_json::from_slice(&body).map_err(|err| {
        record_result("invalid_json", start);
        ProblemResponse::new(
            StatusCode::BAD_REQUEST,
            "invalid_json",
            format!("failed to parse payload: {err}"),
        )
    })?;

    if let Err(err) = request.validate() {
        warn!(stage = "registration", result = "invalid_request", missing = ?err.missing, "registration rejected");
        record_result("invalid_request", start);
        return Err(err.into());
    }

    match state.registrar().register_new_customer(request).await {
        Ok(RegistrationOutcome::Registered(customer)) => {
            info!(stage = "registration", customer_id = %customer.id, "customer registered");
            record_result("registered", start);
            Ok((StatusCode::CREATED, Json(customer)).into_response())
        }
        Ok(RegistrationOutcome::AlreadyRegistered(customer)) => {
            info!(stage = "registration", customer_id = %customer.id, "customer already registered");
            record_result("already_registered", start);
            Ok((StatusCode::OK, Json(customer)).into_response())
        }
        Err(err) => {
            let label = result_label(&err);
            if is_client_rejection(&err) {
                warn!(stage = "registration", result = label, "registration rejected");
            } else {
                error!(stage = "registration", error = %err, "customer store failed");
            }
            record_result(label, start);
            Err(err.into())
        }
    }
}

/// Rejections caused by the request itself; these log at `warn`, store faults at `error`.
fn is_client_rejection(err: &RegistrationError) -> bool {
    !matches!(
        err,
        RegistrationError::Store(StoreError::Backend(_) | StoreError::Corrupt(_))
    )
}

fn result_label(err: &RegistrationError) -> &'static str {
    match err {
        RegistrationError::PhoneNumberTaken(_) => "phone_number_taken",
        RegistrationError::Store(StoreError::ConstraintViolation(_)) => "constraint_violation",
        RegistrationError::Store(_) => "storage_error",
    }
}

fn record_result(result: &'static str, start: Instant) {
    counter!("customer_registrations_total", "result" => result).increment(1);
    histogram!("registration_latency_seconds", "result" => result)
        .record(start.elapsed().as_secs_f64());
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::{
        body::Body,
        http::{header, Method, Request},
    };
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tempfile::TempDir;
    use tower::ServiceExt;
    use uuid::Uuid;

    use customer_registry_core::{CustomerId, CustomerStore, NewCustomer, RegistrationService};
    use customer_registry_storage::Database;

    use crate::router::{app_router, REGISTRATION_PATH};
    use crate::telemetry;

    struct TestContext {
        state: AppState,
        database: Database,
        _dir: TempDir,
    }

    async fn setup_context() -> TestContext {
        let metrics = telemetry::init_metrics().expect("metrics init");
        let dir = tempfile::tempdir().expect("tempdir");
        let url = format!("sqlite://{}", dir.path().join("customers.db").display());
        let database = Database::connect(&url, 5).await.expect("connect");
        database.run_migrations().await.expect("migrations");

        let service = RegistrationService::new(Arc::new(database.customers()));
        TestContext {
            state: AppState::new(metrics, Arc::new(service)),
            database,
            _dir: dir,
        }
    }

    async fn send(ctx: &TestContext, body: impl Into<Body>) -> (StatusCode, String, Value) {
        let request = Request::builder()
            .method(Method::PUT)
            .uri(REGISTRATION_PATH)
            .header(header::CONTENT_TYPE, "application/json")
            .body(body.into())
            .unwrap();

        let response = app_router(ctx.state.clone())
            .oneshot(request)
            .await
            .expect("handler should respond");
        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("body should read")
            .to_bytes();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, content_type, value)
    }

    #[tokio::test]
    async fn registers_new_customer() {
        let ctx = setup_context().await;

        let (status, _, body) = send(
            &ctx,
            json!({ "name": "Maryam", "phoneNumber": "09000" }).to_string(),
        )
        .await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["name"], "Maryam");
        assert_eq!(body["phoneNumber"], "09000");
        let id = body["id"].as_str().expect("id is a string");
        assert!(Uuid::parse_str(id).is_ok());

        let stored = ctx
            .database
            .customers()
            .find_by_phone_number("09000")
            .await
            .expect("lookup")
            .expect("customer stored");
        assert_eq!(stored.id.to_string(), id);
    }

    #[tokio::test]
    async fn keeps_supplied_id() {
        let ctx = setup_context().await;
        let id = CustomerId::generate();

        let (status, _, body) = send(
            &ctx,
            json!({ "id": id, "name": "Reza", "phoneNumber": "09000" }).to_string(),
        )
        .await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["id"], id.to_string());
        assert!(ctx
            .database
            .customers()
            .find_by_id(&id)
            .await
            .expect("lookup")
            .is_some());
    }

    #[tokio::test]
    async fn conflicting_phone_number_returns_problem() {
        let ctx = setup_context().await;
        let repo = ctx.database.customers();
        let first = repo
            .save(&NewCustomer::new(Some(CustomerId::generate()), "Reza", "09000"))
            .await
            .expect("seed customer");

        let (status, content_type, body) = send(
            &ctx,
            json!({ "id": CustomerId::generate(), "name": "Ali", "phoneNumber": "09000" })
                .to_string(),
        )
        .await;

        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(content_type, "application/problem+json");
        assert_eq!(body["type"], "phone_number_taken");
        assert!(body["detail"]
            .as_str()
            .expect("detail")
            .contains("phone number [09000] is taken"));

        let stored = repo.find_by_phone_number("09000").await.expect("lookup");
        assert_eq!(stored, Some(first));
        assert_eq!(count_customers(&ctx.database).await, 1);
    }

    #[tokio::test]
    async fn re_registering_same_customer_is_ok() {
        let ctx = setup_context().await;
        let id = CustomerId::generate();
        let payload = json!({ "id": id, "name": "Maryam", "phoneNumber": "09000" }).to_string();

        let (first, _, _) = send(&ctx, payload.clone()).await;
        assert_eq!(first, StatusCode::CREATED);

        let (second, _, body) = send(&ctx, payload).await;
        assert_eq!(second, StatusCode::OK);
        assert_eq!(body["id"], id.to_string());
    }

    #[tokio::test]
    async fn missing_fields_are_rejected_before_registration() {
        let ctx = setup_context().await;

        let (status, content_type, body) =
            send(&ctx, json!({ "name": " " }).to_string()).await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(content_type, "application/problem+json");
        assert_eq!(body["type"], "invalid_request");
        assert!(body["detail"].as_str().expect("detail").contains("phoneNumber"));

        assert_eq!(count_customers(&ctx.database).await, 0);
    }

    #[tokio::test]
    async fn malformed_json_is_bad_request() {
        let ctx = setup_context().await;

        let (status, _, body) = send(&ctx, "{not json").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["type"], "invalid_json");

        let (status, _, _) = send(
            &ctx,
            json!({ "id": "abc", "name": "Ali", "phoneNumber": "09001" }).to_string(),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn conflicts_and_constraints_are_client_rejections() {
        use customer_registry_core::CustomerConstraint;

        assert!(is_client_rejection(&RegistrationError::PhoneNumberTaken(
            "09000".into()
        )));
        assert!(is_client_rejection(&RegistrationError::Store(
            StoreError::ConstraintViolation(CustomerConstraint::NameRequired)
        )));
        assert!(!is_client_rejection(&RegistrationError::Store(
            StoreError::Corrupt("bad id".into())
        )));
    }

    async fn count_customers(database: &Database) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM customers")
            .fetch_one(database.pool())
            .await
            .expect("count customers")
    }
}
