//! Common test utilities for integration tests.
//!
//! Every test gets its own router over a fresh in-memory store and a manual
//! clock, so no database is needed and tests never share state.

// Not every integration test uses every helper.
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use complaint_desk_api::{
    app::{create_app, AppState},
    config::Config,
};
use domain::memory::InMemoryStore;
use domain::models::user::{NewUser, UserRole};
use domain::services::ManualClock;
use fake::{faker::name::en::FirstName, Fake};
use serde_json::{json, Value};
use tower::ServiceExt;

static COUNTER: AtomicUsize = AtomicUsize::new(0);

pub const PASSWORD: &str = "secret123";

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub store: Arc<InMemoryStore>,
    pub clock: Arc<ManualClock>,
}

/// A signed-in user.
#[derive(Debug, Clone)]
pub struct TestUser {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub token: String,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_overrides(&[])
    }

    pub fn with_overrides(overrides: &[(&str, &str)]) -> Self {
        let config = Config::load_for_test(overrides).expect("test config");
        let store = Arc::new(InMemoryStore::new());
        let clock = Arc::new(ManualClock::new(chrono::Utc::now()));
        let state = AppState::new(config, store.stores(), clock.clone()).expect("app state");
        let router = create_app(state.clone());
        Self {
            router,
            state,
            store,
            clock,
        }
    }

    /// Sends a request and returns the status with the parsed JSON body
    /// (`Null` for empty or non-JSON bodies).
    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.send(request(Method::GET, uri, None, token)).await
    }

    pub async fn post(&self, uri: &str, body: Value, token: Option<&str>) -> (StatusCode, Value) {
        self.send(request(Method::POST, uri, Some(body), token)).await
    }

    pub async fn patch(&self, uri: &str, body: Value, token: Option<&str>) -> (StatusCode, Value) {
        self.send(request(Method::PATCH, uri, Some(body), token)).await
    }

    pub async fn put(&self, uri: &str, body: Value, token: Option<&str>) -> (StatusCode, Value) {
        self.send(request(Method::PUT, uri, Some(body), token)).await
    }

    /// Registers a fresh asm user through the API.
    pub async fn register_asm(&self) -> TestUser {
        let (username, email) = unique_identity();
        let (status, body) = self
            .post(
                "/api/asm/register",
                json!({
                    "username": username,
                    "email": email,
                    "password": PASSWORD,
                    "firstName": "Test",
                }),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "registration failed: {}", body);

        TestUser {
            id: body["user"]["id"].as_i64().expect("user id"),
            username,
            email,
            token: body["token"].as_str().expect("token").to_string(),
        }
    }

    /// Creates an admin directly in the store, then logs in through the API.
    pub async fn create_admin(&self) -> TestUser {
        let (username, email) = unique_identity();
        domain::store::UserStore::create(
            &*self.store,
            NewUser {
                username: username.clone(),
                email: email.clone(),
                password_hash: shared::password::hash_password(PASSWORD).unwrap(),
                role: UserRole::Admin,
                first_name: None,
                last_name: None,
                phone: None,
            },
        )
        .await
        .unwrap();

        let (status, body) = self
            .post(
                "/api/admin/login",
                json!({ "email": email, "password": PASSWORD }),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::OK, "admin login failed: {}", body);

        TestUser {
            id: body["user"]["id"].as_i64().expect("user id"),
            username,
            email,
            token: body["token"].as_str().expect("token").to_string(),
        }
    }

    /// Submits a valid complaint as an asm user and returns the response body.
    pub async fn submit_complaint(&self, user: &TestUser) -> Value {
        let (status, body) = self
            .post("/api/asm/complaints", complaint_payload(), Some(&user.token))
            .await;
        assert_eq!(status, StatusCode::CREATED, "submission failed: {}", body);
        body
    }
}

/// Unique, valid username and email.
pub fn unique_identity() -> (String, String) {
    let n = COUNTER.fetch_add(1, Ordering::SeqCst);
    let first: String = FirstName().fake();
    let base: String = first
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_lowercase();
    let base = if base.is_empty() { "user".to_string() } else { base };
    (
        format!("{}.{}", base, n),
        format!("{}.{}@example.com", base, n),
    )
}

pub fn complaint_payload() -> Value {
    json!({
        "complaintSource": "Depot",
        "depoPartyName": "Sharma Traders",
        "complaintType": "Damaged goods",
        "productName": "Pipe 40mm",
        "voc": "Pipes arrived cracked",
    })
}

pub fn request(
    method: Method,
    uri: &str,
    body: Option<Value>,
    token: Option<&str>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_string(&body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}
