use std::sync::Arc;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
};
use chrono::{Duration, Utc};
use checkin_token_service::{
    build_router,
    clock::{Clock, ManualClock},
    middleware::auth::{ApiKeys, hash_api_key},
    models::token::TokenKind,
    state::AppStateBuilder,
    store::{MemoryTokenStore, TokenStore},
};
use serde_json::{Value, json};
use tower::ServiceExt;

struct TestApp {
    router: Router,
    store: Arc<MemoryTokenStore>,
    clock: Arc<ManualClock>,
}

impl TestApp {
    fn new() -> Self {
        Self::with_keys(ApiKeys::default())
    }

    fn with_keys(api_keys: ApiKeys) -> Self {
        let store = Arc::new(MemoryTokenStore::new());
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let state = AppStateBuilder::new(store.clone(), clock.clone())
            .attendance_ttl(Duration::seconds(30))
            .api_keys(api_keys)
            .build();

        Self {
            router: build_router(state),
            store,
            clock,
        }
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body should be readable");
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("body should be json")
        };
        (status, body)
    }

    async fn post(&self, path: &str, body: Value) -> (StatusCode, Value) {
        self.send(json_request(path, body.to_string())).await
    }

    async fn issue(&self, uid: &str, name: &str) -> String {
        let (status, body) = self
            .post(
                "/api/issue-token",
                json!({ "studentUid": uid, "studentName": name }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        body["token"].as_str().unwrap().to_string()
    }

    async fn validate(&self, token: &str, uid: &str) -> (StatusCode, Value) {
        self.post(
            "/api/validate-token",
            json!({ "token": token, "studentUid": uid }),
        )
        .await
    }
}

fn json_request(path: &str, body: String) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(path)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body))
        .unwrap()
}

fn get_request(path: &str) -> Request<Body> {
    Request::builder().uri(path).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn health_reports_store_backend() {
    let app = TestApp::new();
    let (status, body) = app.send(get_request("/health")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["store"], "memory");
}

#[tokio::test]
async fn issue_returns_token_and_expiry() {
    let app = TestApp::new();
    let (status, body) = app
        .post(
            "/api/issue-token",
            json!({ "studentUid": "u1", "studentName": "Alice" }),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    let token = body["token"].as_str().unwrap();
    assert_eq!(token.len(), 12);
    assert!(
        token
            .chars()
            .all(|c| "ABCDEFGHJKLMNPQRSTUVWXYZ23456789".contains(c))
    );

    let expires_at: chrono::DateTime<Utc> =
        serde_json::from_value(body["expiresAt"].clone()).unwrap();
    assert_eq!(expires_at, app.clock.now() + Duration::seconds(30));

    let stored = app
        .store
        .find(TokenKind::Attendance, token)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.student_name, "Alice");
    assert!(!stored.used);
}

#[tokio::test]
async fn issue_rejects_missing_fields() {
    let app = TestApp::new();

    let (status, body) = app
        .post(
            "/api/issue-token",
            json!({ "studentUid": "", "studentName": "Alice" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "invalid_argument");

    let (status, body) = app
        .send(json_request("/api/issue-token", "{not json".to_string()))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "invalid_argument");

    let (status, _) = app
        .post("/api/issue-token", json!({ "studentUid": "u1" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert!(app.store.is_empty());
}

#[tokio::test]
async fn validate_succeeds_exactly_once() {
    let app = TestApp::new();
    let token = app.issue("u1", "Alice").await;

    let (status, body) = app.validate(&token, "u1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["studentUid"], "u1");
    assert_eq!(body["studentName"], "Alice");

    let (status, body) = app.validate(&token, "u1").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "token_already_used");
}

#[tokio::test]
async fn validate_respects_expiry_window() {
    let app = TestApp::new();
    let early = app.issue("u1", "Alice").await;
    let late = app.issue("u1", "Alice").await;

    app.clock.advance(Duration::seconds(29));
    let (status, _) = app.validate(&early, "u1").await;
    assert_eq!(status, StatusCode::OK);

    app.clock.advance(Duration::seconds(2));
    let (status, body) = app.validate(&late, "u1").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "token_expired");

    // Used and expired still reports expired
    let (status, body) = app.validate(&early, "u1").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "token_expired");
}

#[tokio::test]
async fn mismatched_student_is_forbidden_and_token_survives() {
    let app = TestApp::new();
    let token = app.issue("S1", "Alice").await;

    let (status, body) = app.validate(&token, "S2").await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "student_mismatch");

    let stored = app
        .store
        .find(TokenKind::Attendance, &token)
        .await
        .unwrap()
        .unwrap();
    assert!(!stored.used);

    let (status, _) = app.validate(&token, "S1").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn unknown_and_malformed_tokens() {
    let app = TestApp::new();

    let (status, body) = app.validate("ZZZZZZZZZZZZ", "u1").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "token_not_found");

    let (status, body) = app.validate("O0O0O0O0O0O0", "u1").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "invalid_argument");

    let (status, _) = app.validate("", "u1").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn token_status_follows_lifecycle() {
    let app = TestApp::new();
    let token = app.issue("u1", "Alice").await;
    let path = format!("/api/tokens/{token}");

    let (status, body) = app.send(get_request(&path)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["state"], "issued");
    assert!(body["usedAt"].is_null());
    assert!(body.get("studentName").is_none());

    app.validate(&token, "u1").await;
    let (_, body) = app.send(get_request(&path)).await;
    assert_eq!(body["state"], "consumed");
    assert!(body["usedAt"].is_string());

    let other = app.issue("u1", "Alice").await;
    app.clock.advance(Duration::seconds(31));
    let (_, body) = app.send(get_request(&format!("/api/tokens/{other}"))).await;
    assert_eq!(body["state"], "expired");
}

#[tokio::test]
async fn registration_and_attendance_tokens_do_not_mix() {
    let app = TestApp::new();

    let (status, body) = app
        .post(
            "/api/registration/issue-token",
            json!({ "studentUid": "u1", "studentName": "Alice" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let registration = body["token"].as_str().unwrap().to_string();

    let (status, _) = app.validate(&registration, "u1").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let attendance = app.issue("u1", "Alice").await;
    let (status, _) = app
        .post(
            "/api/registration/validate-token",
            json!({ "token": attendance, "studentUid": "u1" }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Registration tokens outlive the attendance window
    app.clock.advance(Duration::seconds(120));
    let (status, body) = app
        .post(
            "/api/registration/validate-token",
            json!({ "token": registration, "studentUid": "u1" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["studentName"], "Alice");
}

#[tokio::test]
async fn api_key_guards_token_routes_only() {
    let app = TestApp::with_keys(ApiKeys::from_digests([hash_api_key("kiosk-key")]));

    let (status, _) = app.send(get_request("/health")).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .post(
            "/api/issue-token",
            json!({ "studentUid": "u1", "studentName": "Alice" }),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "invalid_api_key");

    let mut request = json_request(
        "/api/issue-token",
        json!({ "studentUid": "u1", "studentName": "Alice" }).to_string(),
    );
    request.headers_mut().insert(
        header::AUTHORIZATION,
        "Bearer wrong-key".parse().unwrap(),
    );
    let (status, _) = app.send(request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let mut request = json_request(
        "/api/issue-token",
        json!({ "studentUid": "u1", "studentName": "Alice" }).to_string(),
    );
    request.headers_mut().insert(
        header::AUTHORIZATION,
        "Bearer kiosk-key".parse().unwrap(),
    );
    let (status, body) = app.send(request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_validations_succeed_exactly_once() {
    for n in [1usize, 2, 8, 32] {
        let app = Arc::new(TestApp::new());
        let token = app.issue("u1", "Alice").await;

        let handles: Vec<_> = (0..n)
            .map(|_| {
                let app = Arc::clone(&app);
                let token = token.clone();
                tokio::spawn(async move { app.validate(&token, "u1").await.0 })
            })
            .collect();

        let mut ok = 0;
        let mut conflicts = 0;
        for handle in handles {
            match handle.await.unwrap() {
                StatusCode::OK => ok += 1,
                StatusCode::CONFLICT => conflicts += 1,
                other => panic!("unexpected status {other}"),
            }
        }

        assert_eq!(ok, 1, "n = {n}");
        assert_eq!(conflicts, n - 1, "n = {n}");
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn different_tokens_validate_in_parallel() {
    let app = Arc::new(TestApp::new());
    let mut tokens = Vec::new();
    for i in 0..16 {
        tokens.push((format!("u{i}"), app.issue(&format!("u{i}"), "Student").await));
    }

    let handles: Vec<_> = tokens
        .into_iter()
        .map(|(uid, token)| {
            let app = Arc::clone(&app);
            tokio::spawn(async move { app.validate(&token, &uid).await.0 })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.await.unwrap(), StatusCode::OK);
    }
}
