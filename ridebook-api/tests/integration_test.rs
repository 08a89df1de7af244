use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use ridebook_api::auth::issue_token;
use ridebook_api::middleware::CustomerClaims;
use ridebook_api::state::{AppState, AuthConfig, BookingSettings};
use ridebook_api::app;
use ridebook_core::events::NoopEventSink;
use ridebook_core::memory::{InMemoryBookingRepository, InMemoryDocumentStore, InMemoryLocalCache};
use ridebook_core::payment::DirectBookingApi;
use ridebook_core::pricing::{FareEstimator, TravelTimeEstimator};
use ridebook_core::routing::StraightLineRouteProvider;
use ridebook_flow::SessionCollaborators;
use ridebook_store::app_config::StationConfig;
use ridebook_store::ConfiguredStations;
use serde_json::{json, Value};
use tower::ServiceExt;

const SECRET: &str = "test-secret";

fn test_app() -> Router {
    let bookings = Arc::new(InMemoryBookingRepository::new());
    let stations = Arc::new(ConfiguredStations::new(vec![
        StationConfig {
            id: 1,
            name: "Central".to_string(),
            lat: 48.8443,
            lng: 2.3744,
        },
        StationConfig {
            id: 2,
            name: "Riverside".to_string(),
            lat: 48.8606,
            lng: 2.3376,
        },
    ]));
    let collaborators = SessionCollaborators {
        documents: Arc::new(InMemoryDocumentStore::new()),
        bookings: bookings.clone(),
        cache: Arc::new(InMemoryLocalCache::new()),
        booking_api: Arc::new(DirectBookingApi::new(bookings)),
        stations: stations.clone(),
        routes: Arc::new(StraightLineRouteProvider::new(TravelTimeEstimator::default())),
        events: Arc::new(NoopEventSink),
    };
    let state = AppState::new(
        collaborators,
        stations,
        None,
        AuthConfig {
            secret: SECRET.to_string(),
            expiration: 3600,
        },
        BookingSettings {
            cache_key_prefix: "booking".to_string(),
            rate_limit_per_minute: 1000,
            fares: FareEstimator::default(),
            session_idle_timeout: Duration::from_secs(600),
        },
    );
    app(state)
}

fn token_for(user_id: &str) -> String {
    let claims = CustomerClaims {
        sub: user_id.to_string(),
        email: Some(format!("{}@example.com", user_id)),
        role: "CUSTOMER".to_string(),
        exp: (chrono::Utc::now().timestamp() + 3600) as usize,
    };
    issue_token(&claims, SECRET).unwrap()
}

async fn send(app: &Router, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

#[tokio::test]
async fn test_guest_login_issues_usable_token() {
    let app = test_app();
    let (status, body) = send(&app, "POST", "/auth/guest", None, None).await;
    assert_eq!(status, StatusCode::OK);
    let token = body["token"].as_str().unwrap().to_string();
    assert!(body["user_id"].as_str().unwrap().starts_with("guest-"));

    let (status, body) = send(&app, "GET", "/v1/booking", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["booking"]["step"], 1);
}

#[tokio::test]
async fn test_booking_routes_require_token() {
    let app = test_app();
    let (status, _) = send(&app, "GET", "/v1/booking", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&app, "GET", "/v1/booking", Some("not-a-jwt"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_stations_are_public() {
    let app = test_app();
    let (status, body) = send(&app, "GET", "/v1/stations", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 2);
    assert_eq!(body[1]["name"], "Riverside");
}

#[tokio::test]
async fn test_skipping_steps_is_rejected() {
    let app = test_app();
    let token = token_for("rider-1");

    let (status, body) = send(&app, "POST", "/v1/booking/step", Some(&token), Some(json!({"step": 4}))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["success"], false);
    assert_eq!(body["booking"]["step"], 1);

    let (status, body) = send(&app, "POST", "/v1/booking/arrival", Some(&token), Some(json!({"stationId": 2}))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["booking"]["arrivalStationId"].is_null());
}

#[tokio::test]
async fn test_full_booking_over_http() {
    let app = test_app();
    let token = token_for("rider-2");
    let auth = Some(token.as_str());

    let (status, body) = send(&app, "POST", "/v1/booking/departure", auth, Some(json!({"stationId": 1}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["booking"]["step"], 2);

    let (status, _) = send(
        &app,
        "PUT",
        "/v1/booking/schedule",
        auth,
        Some(json!({
            "departureDate": "2030-05-01T09:00:00Z",
            "departureTime": "2030-05-01T09:30:00Z",
            "confirmed": true
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, "POST", "/v1/booking/step", auth, Some(json!({"step": 3}))).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, "POST", "/v1/booking/arrival", auth, Some(json!({"stationId": 2}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["booking"]["step"], 4);

    let (status, body) = send(&app, "POST", "/v1/booking/route", auth, None).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["booking"]["routeStatus"], "succeeded");

    let (status, body) = send(
        &app,
        "POST",
        "/v1/booking/car",
        auth,
        Some(json!({"id": "car-3", "name": "Compact", "price": 1.5})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["booking"]["estimatedCost"].is_i64());

    let (status, body) = send(&app, "POST", "/v1/booking/step", auth, Some(json!({"step": 5}))).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["booking"]["stepName"], "payment");

    let (status, body) = send(&app, "POST", "/v1/booking/finalize", auth, None).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    let booking_id = body["booking"]["bookingId"].as_str().unwrap().to_string();

    let (status, body) = send(&app, "POST", "/v1/booking/finalize", auth, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["booking"]["bookingId"], booking_id.as_str());

    let (status, _) = send(&app, "POST", "/v1/booking/step", auth, Some(json!({"step": 6}))).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, "POST", "/v1/booking/complete", auth, None).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["booking"]["step"], 1);
    assert!(body["booking"]["bookingId"].is_null());

    let (status, body) = send(&app, "GET", "/v1/booking/history", auth, None).await;
    assert_eq!(status, StatusCode::OK);
    let history = body.as_array().unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0]["booking_id"], booking_id.as_str());
}

#[tokio::test]
async fn test_reset_and_end_session() {
    let app = test_app();
    let token = token_for("rider-3");
    let auth = Some(token.as_str());

    send(&app, "POST", "/v1/booking/departure", auth, Some(json!({"stationId": 1}))).await;
    let (status, body) = send(&app, "POST", "/v1/booking/reset", auth, None).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["booking"]["step"], 1);
    assert!(body["booking"]["departureStationId"].is_null());

    let (status, _) = send(&app, "DELETE", "/v1/booking/session", auth, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&app, "DELETE", "/v1/booking/session", auth, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
