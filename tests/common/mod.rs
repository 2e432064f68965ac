#![allow(dead_code)]

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use axum::{
    Router,
    body::Body,
    http::{HeaderMap, Request, StatusCode, header},
};
use jsonwebtoken::{EncodingKey, Header};
use serde_json::Value;
use tasktrack::{
    ServerConfig, create_app,
    db::{Database, UserRole},
    jwt::{Claims, TokenType},
    server_config::Environment,
};
use tower::ServiceExt;

pub const ACCESS_SECRET: &str = "integration-access-secret-0123456789abcdef";
pub const REFRESH_SECRET: &str = "integration-refresh-secret-0123456789abcdef";
pub const PASSWORD: &str = "Secur3Pass";

pub fn test_config(db: Database) -> ServerConfig {
    ServerConfig {
        db,
        access_secret: ACCESS_SECRET.as_bytes().to_vec(),
        refresh_secret: REFRESH_SECRET.as_bytes().to_vec(),
        access_token_ttl: Duration::from_secs(15 * 60),
        refresh_token_ttl: Duration::from_secs(7 * 24 * 60 * 60),
        environment: Environment::Development,
        auth_rate_per_minute: 10_000,
    }
}

pub async fn create_test_app() -> (Router, Database) {
    let db = Database::open(":memory:")
        .await
        .expect("Failed to open test database");
    let app = create_app(&test_config(db.clone()));
    (app, db)
}

/// Build a request with an optional Bearer token and JSON body.
pub fn request(method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub json: Value,
}

impl TestResponse {
    /// Value of the refresh_token cookie set by this response, if any.
    pub fn refresh_cookie(&self) -> Option<String> {
        self.set_cookie().and_then(|cookie| {
            cookie
                .split(';')
                .next()?
                .strip_prefix("refresh_token=")
                .map(str::to_string)
        })
    }

    pub fn set_cookie(&self) -> Option<&str> {
        self.headers
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
    }
}

pub async fn send(app: &Router, request: Request<Body>) -> TestResponse {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap()
    };
    TestResponse {
        status,
        headers,
        json,
    }
}

/// A registered user and the credentials issued at registration.
pub struct TestUser {
    pub id: String,
    pub email: String,
    pub access_token: String,
    pub refresh_token: String,
}

pub async fn register(app: &Router, email: &str) -> TestUser {
    let response = send(
        app,
        request(
            "POST",
            "/api/v1/auth/register",
            None,
            Some(serde_json::json!({ "email": email, "password": PASSWORD })),
        ),
    )
    .await;
    assert_eq!(response.status, StatusCode::CREATED, "{}", response.json);

    TestUser {
        id: response.json["data"]["user"]["id"].as_str().unwrap().to_string(),
        email: email.to_string(),
        access_token: response.json["data"]["accessToken"]
            .as_str()
            .unwrap()
            .to_string(),
        refresh_token: response.refresh_cookie().unwrap(),
    }
}

pub async fn login(app: &Router, email: &str) -> TestResponse {
    send(
        app,
        request(
            "POST",
            "/api/v1/auth/login",
            None,
            Some(serde_json::json!({ "email": email, "password": PASSWORD })),
        ),
    )
    .await
}

/// Register a user and promote them to admin. Returns a token carrying the
/// admin role.
pub async fn register_admin(app: &Router, db: &Database, email: &str) -> TestUser {
    let mut user = register(app, email).await;
    db.users().set_role(&user.id, UserRole::Admin).await.unwrap();
    let response = login(app, email).await;
    assert_eq!(response.status, StatusCode::OK);
    user.access_token = response.json["data"]["accessToken"]
        .as_str()
        .unwrap()
        .to_string();
    user
}

pub fn refresh_request(refresh_token: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/v1/auth/refresh")
        .header(header::COOKIE, format!("refresh_token={}", refresh_token))
        .body(Body::empty())
        .unwrap()
}

fn now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs()
}

/// Sign an access token for `user` that expired one second ago.
pub fn expired_access_token(user: &TestUser) -> String {
    sign_expired(user, TokenType::Access, ACCESS_SECRET)
}

/// Sign a refresh token for `user` that expired one second ago.
pub fn expired_refresh_token(user: &TestUser) -> String {
    sign_expired(user, TokenType::Refresh, REFRESH_SECRET)
}

fn sign_expired(user: &TestUser, token_type: TokenType, secret: &str) -> String {
    let now = now();
    let claims = Claims {
        sub: user.id.clone(),
        email: user.email.clone(),
        role: UserRole::User,
        token_type,
        jti: uuid::Uuid::new_v4().to_string(),
        iat: now - 60,
        exp: now - 1,
    };
    jsonwebtoken::encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap()
}
