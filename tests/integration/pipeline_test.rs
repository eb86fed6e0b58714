//! End-to-end tests for the request pipeline
//!
//! Drives the full router (CORS, body decoders, metrics, routing, error boundary,
//! fallback) in-process with `oneshot`.

use axum::{
    body::Body,
    extract::Path,
    http::{header, Method, Request, Response, StatusCode},
    routing::{get, post},
    Extension, Json, Router,
};
use booking_gateway::{
    error::ApiError,
    middleware::{ParsedBody, REQUEST_ID_HEADER},
    AppState, Config, Gateway, HttpMetrics, RouteGroup,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};
use tower::ServiceExt;

const FRONTEND: &str = "http://localhost:8080";

struct TestApp {
    router: Router,
    metrics: HttpMetrics,
    booking_hits: Arc<AtomicUsize>,
}

impl TestApp {
    fn new(environment: Option<&str>) -> Self {
        let config = Config {
            environment: environment.map(str::to_string),
            color: "green".to_string(),
            version: "2.3.0".to_string(),
            body_limit_bytes: 1024,
            ..Config::default()
        };
        let metrics = HttpMetrics::new().expect("metrics registry");
        let booking_hits = Arc::new(AtomicUsize::new(0));

        let router = Gateway::new(AppState::new(config, metrics.clone()))
            .mount(RouteGroup::Users, users_routes())
            .mount(RouteGroup::Bookings, bookings_routes(booking_hits.clone()))
            .build()
            .expect("gateway builds");

        Self {
            router,
            metrics,
            booking_hits,
        }
    }

    async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }

    async fn get(&self, uri: &str) -> Response<Body> {
        self.send(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
    }

    fn observations(&self) -> u64 {
        self.metrics
            .render()
            .unwrap()
            .lines()
            .filter(|line| line.starts_with("http_request_duration_seconds_count"))
            .map(|line| line.rsplit(' ').next().unwrap().parse::<u64>().unwrap())
            .sum()
    }
}

fn users_routes() -> Router<AppState> {
    Router::new()
        .route("/{id}", get(get_user))
        .route("/broken", get(failing_handler))
        .route("/panic", get(panicking_handler))
}

fn bookings_routes(hits: Arc<AtomicUsize>) -> Router<AppState> {
    Router::new().route(
        "/",
        post(move |Extension(body): Extension<ParsedBody>| async move {
            hits.fetch_add(1, Ordering::SeqCst);
            (StatusCode::CREATED, Json(json!({ "received": body.value })))
        }),
    )
}

async fn get_user(Path(id): Path<String>) -> Json<Value> {
    Json(json!({ "id": id }))
}

async fn failing_handler() -> Result<Json<Value>, ApiError> {
    Err(ApiError::Internal("booking store unavailable".to_string()))
}

async fn panicking_handler() -> &'static str {
    panic!("class roster corrupted")
}

async fn json_body(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn text_body(response: Response<Body>) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn post_booking(content_type: &str, body: &'static str) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri("/api/bookings")
        .header(header::CONTENT_TYPE, content_type)
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn test_health_returns_fixed_shape() {
    let app = TestApp::new(None);

    let response = app.get("/health").await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["status"], "OK");
    assert_eq!(body["color"], "green");
    assert_eq!(body["version"], "2.3.0");
    let timestamp = body["timestamp"].as_str().unwrap();
    assert!(chrono::DateTime::parse_from_rfc3339(timestamp).is_ok());
}

#[tokio::test]
async fn test_metrics_endpoint_exposes_request_histogram() {
    let app = TestApp::new(None);
    app.get("/health").await;

    let response = app.get("/metrics").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "text/plain; version=0.0.4"
    );

    let text = text_body(response).await;
    assert!(text.contains("# TYPE http_request_duration_seconds histogram"));
    assert!(text.contains(
        r#"http_request_duration_seconds_count{method="GET",route="/health",status_code="200"} 1"#
    ));
}

#[tokio::test]
async fn test_metrics_counters_do_not_decrease() {
    let app = TestApp::new(None);
    app.get("/health").await;

    let first = text_body(app.get("/metrics").await).await;
    let second = text_body(app.get("/metrics").await).await;

    let health_series =
        r#"http_request_duration_seconds_count{method="GET",route="/health",status_code="200"} 1"#;
    assert!(first.contains(health_series));
    assert!(second.contains(health_series));
    // the first scrape is visible in the second
    assert!(!first.contains(r#"route="/metrics""#));
    assert!(second.contains(
        r#"http_request_duration_seconds_count{method="GET",route="/metrics",status_code="200"} 1"#
    ));
}

#[tokio::test]
async fn test_unknown_route_returns_not_found_envelope() {
    let app = TestApp::new(None);

    let response = app.get("/api/nonexistent").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(text_body(response).await, r#"{"error":"Route not found"}"#);
}

#[tokio::test]
async fn test_unmounted_group_falls_through_to_not_found() {
    let app = TestApp::new(None);

    let response = app.get("/api/classes/12").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(json_body(response).await, json!({ "error": "Route not found" }));
}

#[tokio::test]
async fn test_wrong_method_on_builtin_returns_not_found() {
    let app = TestApp::new(None);

    let response = app
        .send(
            Request::builder()
                .method(Method::DELETE)
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(json_body(response).await, json!({ "error": "Route not found" }));
}

#[tokio::test]
async fn test_mounted_group_dispatches() {
    let app = TestApp::new(None);

    let response = app.get("/api/users/42").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await, json!({ "id": "42" }));
}

#[tokio::test]
async fn test_trailing_slash_reaches_mounted_routes() {
    let app = TestApp::new(None);

    let response = app.get("/api/users/42/").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await, json!({ "id": "42" }));

    let response = app
        .send(
            Request::builder()
                .method(Method::POST)
                .uri("/api/bookings/")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"class_id": 3}"#))
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(app.booking_hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_handler_failure_hides_detail_outside_development() {
    let app = TestApp::new(Some("production"));

    let response = app.get("/api/users/broken").await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        json_body(response).await,
        json!({ "error": "Something went wrong!", "message": "Internal server error" })
    );
}

#[tokio::test]
async fn test_handler_failure_hides_detail_when_environment_unset() {
    let app = TestApp::new(None);

    let response = app.get("/api/users/broken").await;
    let body = json_body(response).await;
    assert_eq!(body["message"], "Internal server error");
}

#[tokio::test]
async fn test_handler_failure_shows_detail_in_development() {
    let app = TestApp::new(Some("development"));

    let response = app.get("/api/users/broken").await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        json_body(response).await,
        json!({ "error": "Something went wrong!", "message": "booking store unavailable" })
    );
}

#[tokio::test]
async fn test_panicking_handler_becomes_failure_envelope() {
    let app = TestApp::new(Some("development"));

    let response = app.get("/api/users/panic").await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        json_body(response).await,
        json!({ "error": "Something went wrong!", "message": "class roster corrupted" })
    );
}

#[tokio::test]
async fn test_json_body_reaches_handler() {
    let app = TestApp::new(None);

    let response = app
        .send(post_booking("application/json", r#"{"class_id": 9, "seats": 2}"#))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(
        json_body(response).await,
        json!({ "received": { "class_id": 9, "seats": 2 } })
    );
    assert_eq!(app.booking_hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_form_body_reaches_handler_as_object() {
    let app = TestApp::new(None);

    let response = app
        .send(post_booking(
            "application/x-www-form-urlencoded",
            "class_id=9&note=front+row",
        ))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(
        json_body(response).await,
        json!({ "received": { "class_id": "9", "note": "front row" } })
    );
}

#[tokio::test]
async fn test_malformed_json_rejected_before_handler() {
    let app = TestApp::new(None);

    let response = app
        .send(post_booking("application/json", r#"{"class_id": 9,"#))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error"], "Invalid request body");
    assert_eq!(app.booking_hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_oversize_body_rejected() {
    let app = TestApp::new(None);
    let big = format!(r#"{{"note": "{}"}}"#, "x".repeat(2048));

    let response = app
        .send(
            Request::builder()
                .method(Method::POST)
                .uri("/api/bookings")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(big))
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(app.booking_hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_cors_allows_configured_origin_with_credentials() {
    let app = TestApp::new(None);

    let response = app
        .send(
            Request::builder()
                .method(Method::OPTIONS)
                .uri("/api/bookings")
                .header(header::ORIGIN, FRONTEND)
                .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert!(response.status().is_success());
    assert_eq!(
        response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .unwrap(),
        FRONTEND
    );
    assert_eq!(
        response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_CREDENTIALS)
            .unwrap(),
        "true"
    );
    assert_eq!(app.booking_hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_cors_ignores_unconfigured_origin() {
    let app = TestApp::new(None);

    let response = app
        .send(
            Request::builder()
                .uri("/health")
                .header(header::ORIGIN, "http://studio-rival.example")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response
        .headers()
        .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
        .is_none());
    assert!(response
        .headers()
        .get(header::ACCESS_CONTROL_ALLOW_CREDENTIALS)
        .is_none());
}

#[tokio::test]
async fn test_nested_form_keys_reach_handler() {
    let app = TestApp::new(None);

    let response = app
        .send(post_booking(
            "application/x-www-form-urlencoded",
            "member[name]=Ana&member[plan]=monthly&days[]=mon&days[]=thu",
        ))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(
        json_body(response).await,
        json!({
            "received": {
                "member": { "name": "Ana", "plan": "monthly" },
                "days": ["mon", "thu"]
            }
        })
    );
}

#[tokio::test]
async fn test_every_request_records_exactly_one_observation() {
    let app = TestApp::new(None);
    assert_eq!(app.observations(), 0);

    app.get("/health").await;
    assert_eq!(app.observations(), 1);

    app.get("/api/nonexistent").await;
    assert_eq!(app.observations(), 2);

    app.get("/api/users/broken").await;
    assert_eq!(app.observations(), 3);

    app.get("/api/users/panic").await;
    assert_eq!(app.observations(), 4);

    app.send(post_booking("application/json", "{oops")).await;
    assert_eq!(app.observations(), 5);

    app.send(
        Request::builder()
            .method(Method::OPTIONS)
            .uri("/api/users/1")
            .header(header::ORIGIN, FRONTEND)
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(app.observations(), 6);
}

#[tokio::test]
async fn test_route_labels_follow_priority() {
    let app = TestApp::new(None);

    app.get("/api/users/42").await;
    app.get("/api/users/42/history").await;
    app.get("/api/nonexistent").await;
    app.get("/api/users/broken").await;

    let text = app.metrics.render().unwrap();
    // matched pattern
    assert!(text.contains(
        r#"http_request_duration_seconds_count{method="GET",route="/api/users/{id}",status_code="200"} 1"#
    ));
    // mount prefix of a mounted group with no matching route
    assert!(text.contains(
        r#"http_request_duration_seconds_count{method="GET",route="/api/users",status_code="404"} 1"#
    ));
    // raw path
    assert!(text.contains(
        r#"http_request_duration_seconds_count{method="GET",route="/api/nonexistent",status_code="404"} 1"#
    ));
    // status after the error boundary rewrote the response
    assert!(text.contains(
        r#"http_request_duration_seconds_count{method="GET",route="/api/users/broken",status_code="500"} 1"#
    ));
}

#[tokio::test]
async fn test_request_id_is_echoed_or_generated() {
    let app = TestApp::new(None);

    let response = app
        .send(
            Request::builder()
                .uri("/health")
                .header(REQUEST_ID_HEADER, "req-7781")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.headers().get(REQUEST_ID_HEADER).unwrap(), "req-7781");

    let response = app.get("/api/nonexistent").await;
    assert!(response.headers().contains_key(REQUEST_ID_HEADER));
}
