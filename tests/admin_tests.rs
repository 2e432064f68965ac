mod common;

use axum::http::StatusCode;
use common::{create_test_app, login, refresh_request, register, register_admin, request, send};
use serde_json::json;

#[tokio::test]
async fn test_admin_routes_reject_regular_users() {
    let (app, _db) = create_test_app().await;
    let user = register(&app, "user@example.com").await;

    let response = send(&app, request("GET", "/api/v1/admin/users", Some(&user.access_token), None)).await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);
    assert_eq!(response.json["message"], "Insufficient permissions");

    let response = send(&app, request("GET", "/api/v1/admin/users", None, None)).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_admin_lists_users() {
    let (app, db) = create_test_app().await;
    let admin = register_admin(&app, &db, "admin@example.com").await;
    register(&app, "user@example.com").await;

    let response = send(&app, request("GET", "/api/v1/admin/users", Some(&admin.access_token), None)).await;
    assert_eq!(response.status, StatusCode::OK);
    let users = response.json["data"]["users"].as_array().unwrap();
    assert_eq!(users.len(), 2);
    assert!(users.iter().all(|u| u.get("passwordHash").is_none()));
    assert!(users.iter().any(|u| u["role"] == "admin"));
}

#[tokio::test]
async fn test_deactivation_blocks_login_and_renewal() {
    let (app, db) = create_test_app().await;
    let admin = register_admin(&app, &db, "admin@example.com").await;
    let user = register(&app, "target@example.com").await;
    let uri = format!("/api/v1/admin/users/{}/status", user.id);

    let response = send(
        &app,
        request("PATCH", &uri, Some(&admin.access_token), Some(json!({ "isActive": false }))),
    )
    .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json["data"]["user"]["isActive"], false);

    let response = send(&app, refresh_request(&user.refresh_token)).await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);

    let response = login(&app, "target@example.com").await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);

    // Access tokens already issued stay valid until they expire.
    let response = send(&app, request("GET", "/api/v1/auth/me", Some(&user.access_token), None)).await;
    assert_eq!(response.status, StatusCode::OK);

    let response = send(
        &app,
        request("PATCH", &uri, Some(&admin.access_token), Some(json!({ "isActive": true }))),
    )
    .await;
    assert_eq!(response.status, StatusCode::OK);

    let response = send(&app, refresh_request(&user.refresh_token)).await;
    assert_eq!(response.status, StatusCode::OK);
}

#[tokio::test]
async fn test_admin_status_edge_cases() {
    let (app, db) = create_test_app().await;
    let admin = register_admin(&app, &db, "admin@example.com").await;

    let own = format!("/api/v1/admin/users/{}/status", admin.id);
    let response = send(
        &app,
        request("PATCH", &own, Some(&admin.access_token), Some(json!({ "isActive": false }))),
    )
    .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    let unknown = format!("/api/v1/admin/users/{}/status", uuid::Uuid::new_v4());
    let response = send(
        &app,
        request("PATCH", &unknown, Some(&admin.access_token), Some(json!({ "isActive": false }))),
    )
    .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(response.json["message"], "User not found");
}
