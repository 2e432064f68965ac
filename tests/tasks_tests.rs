mod common;

use axum::{Router, http::StatusCode};
use common::{create_test_app, register, request, send};
use serde_json::{Value, json};

async fn create_task(app: &Router, token: &str, body: Value) -> Value {
    let response = send(app, request("POST", "/api/v1/tasks", Some(token), Some(body))).await;
    assert_eq!(response.status, StatusCode::CREATED, "{}", response.json);
    response.json["data"]["task"].clone()
}

#[tokio::test]
async fn test_task_crud() {
    let (app, _db) = create_test_app().await;
    let user = register(&app, "owner@example.com").await;
    let token = user.access_token.as_str();

    let task = create_task(
        &app,
        token,
        json!({ "title": "  Write report  ", "description": "Quarterly", "dueDate": "2030-06-01" }),
    )
    .await;
    assert_eq!(task["title"], "Write report");
    assert_eq!(task["status"], "todo");
    assert_eq!(task["priority"], "medium");
    assert_eq!(task["dueDate"], "2030-06-01");
    let id = task["id"].as_str().unwrap().to_string();
    let uri = format!("/api/v1/tasks/{}", id);

    let fetched = send(&app, request("GET", &uri, Some(token), None)).await;
    assert_eq!(fetched.status, StatusCode::OK);
    assert_eq!(fetched.json["data"]["task"]["id"], id.as_str());

    let updated = send(
        &app,
        request(
            "PATCH",
            &uri,
            Some(token),
            Some(json!({ "status": "in_progress", "description": null })),
        ),
    )
    .await;
    assert_eq!(updated.status, StatusCode::OK);
    assert_eq!(updated.json["data"]["task"]["status"], "in_progress");
    assert_eq!(updated.json["data"]["task"]["description"], Value::Null);
    assert_eq!(updated.json["data"]["task"]["title"], "Write report");

    let deleted = send(&app, request("DELETE", &uri, Some(token), None)).await;
    assert_eq!(deleted.status, StatusCode::NO_CONTENT);

    let missing = send(&app, request("GET", &uri, Some(token), None)).await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
    assert_eq!(missing.json["message"], "Task not found");

    let deleted_again = send(&app, request("DELETE", &uri, Some(token), None)).await;
    assert_eq!(deleted_again.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_tasks_require_authentication() {
    let (app, _db) = create_test_app().await;

    let response = send(&app, request("GET", "/api/v1/tasks", None, None)).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);

    let response = send(
        &app,
        request("POST", "/api/v1/tasks", None, Some(json!({ "title": "x" }))),
    )
    .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_tasks_are_isolated_per_owner() {
    let (app, _db) = create_test_app().await;
    let alice = register(&app, "alice@example.com").await;
    let bob = register(&app, "bob@example.com").await;

    let task = create_task(&app, &alice.access_token, json!({ "title": "Private" })).await;
    let uri = format!("/api/v1/tasks/{}", task["id"].as_str().unwrap());

    let response = send(&app, request("GET", &uri, Some(&bob.access_token), None)).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);

    let response = send(
        &app,
        request("PATCH", &uri, Some(&bob.access_token), Some(json!({ "title": "Mine" }))),
    )
    .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);

    let response = send(&app, request("DELETE", &uri, Some(&bob.access_token), None)).await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);

    let response = send(&app, request("GET", "/api/v1/tasks", Some(&bob.access_token), None)).await;
    assert_eq!(response.json["data"]["pagination"]["total"], 0);

    let response = send(&app, request("GET", &uri, Some(&alice.access_token), None)).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json["data"]["task"]["title"], "Private");
}

#[tokio::test]
async fn test_task_validation() {
    let (app, _db) = create_test_app().await;
    let user = register(&app, "val@example.com").await;
    let token = user.access_token.as_str();

    let response = send(
        &app,
        request(
            "POST",
            "/api/v1/tasks",
            Some(token),
            Some(json!({ "title": "", "dueDate": "next week" })),
        ),
    )
    .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    let fields: Vec<&str> = response.json["errors"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["field"].as_str().unwrap())
        .collect();
    assert!(fields.contains(&"title"));
    assert!(fields.contains(&"dueDate"));

    let response = send(
        &app,
        request(
            "POST",
            "/api/v1/tasks",
            Some(token),
            Some(json!({ "title": "x", "status": "blocked" })),
        ),
    )
    .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    let task = create_task(&app, token, json!({ "title": "Valid" })).await;
    let uri = format!("/api/v1/tasks/{}", task["id"].as_str().unwrap());

    let response = send(&app, request("PATCH", &uri, Some(token), Some(json!({})))).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.json["message"], "No fields to update");

    let response = send(
        &app,
        request("GET", "/api/v1/tasks/not-a-uuid", Some(token), None),
    )
    .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.json["message"], "Invalid UUID format");
}

#[tokio::test]
async fn test_list_filters_and_pagination() {
    let (app, _db) = create_test_app().await;
    let user = register(&app, "lister@example.com").await;
    let token = user.access_token.as_str();

    for i in 1..=5 {
        create_task(
            &app,
            token,
            json!({
                "title": format!("Task {}", i),
                "priority": if i % 2 == 0 { "high" } else { "low" },
                "status": if i == 5 { "done" } else { "todo" },
            }),
        )
        .await;
    }
    create_task(&app, token, json!({ "title": "Buy groceries", "description": "milk" })).await;

    let page = send(
        &app,
        request("GET", "/api/v1/tasks?page=2&limit=4", Some(token), None),
    )
    .await;
    assert_eq!(page.status, StatusCode::OK);
    assert_eq!(page.json["data"]["tasks"].as_array().unwrap().len(), 2);
    let pagination = &page.json["data"]["pagination"];
    assert_eq!(pagination["page"], 2);
    assert_eq!(pagination["limit"], 4);
    assert_eq!(pagination["total"], 6);
    assert_eq!(pagination["total_pages"], 2);

    let high = send(
        &app,
        request("GET", "/api/v1/tasks?priority=high", Some(token), None),
    )
    .await;
    assert_eq!(high.json["data"]["pagination"]["total"], 2);

    let done = send(&app, request("GET", "/api/v1/tasks?status=done", Some(token), None)).await;
    assert_eq!(done.json["data"]["tasks"][0]["title"], "Task 5");

    let search = send(&app, request("GET", "/api/v1/tasks?search=MILK", Some(token), None)).await;
    assert_eq!(search.json["data"]["pagination"]["total"], 1);
    assert_eq!(search.json["data"]["tasks"][0]["title"], "Buy groceries");

    let sorted = send(
        &app,
        request("GET", "/api/v1/tasks?sort_by=title&order=asc", Some(token), None),
    )
    .await;
    assert_eq!(sorted.json["data"]["tasks"][0]["title"], "Buy groceries");
    assert_eq!(sorted.json["data"]["tasks"][5]["title"], "Task 5");

    let bad = send(&app, request("GET", "/api/v1/tasks?limit=101", Some(token), None)).await;
    assert_eq!(bad.status, StatusCode::BAD_REQUEST);
    assert_eq!(bad.json["errors"][0]["field"], "limit");

    let bad = send(&app, request("GET", "/api/v1/tasks?page=0", Some(token), None)).await;
    assert_eq!(bad.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_task_stats() {
    let (app, _db) = create_test_app().await;
    let user = register(&app, "stats@example.com").await;
    let token = user.access_token.as_str();

    let empty = send(&app, request("GET", "/api/v1/tasks/stats", Some(token), None)).await;
    assert_eq!(empty.status, StatusCode::OK);
    assert_eq!(empty.json["data"]["total"], 0);
    assert_eq!(empty.json["data"]["overdue"], 0);

    create_task(&app, token, json!({ "title": "Late", "dueDate": "2000-01-01" })).await;
    create_task(
        &app,
        token,
        json!({ "title": "Late but done", "dueDate": "2000-01-01", "status": "done" }),
    )
    .await;
    create_task(
        &app,
        token,
        json!({ "title": "Future", "dueDate": "2999-01-01", "status": "in_progress", "priority": "high" }),
    )
    .await;

    let stats = send(&app, request("GET", "/api/v1/tasks/stats", Some(token), None)).await;
    let data = &stats.json["data"];
    assert_eq!(data["total"], 3);
    assert_eq!(data["todo"], 1);
    assert_eq!(data["inProgress"], 1);
    assert_eq!(data["done"], 1);
    assert_eq!(data["medium"], 2);
    assert_eq!(data["high"], 1);
    assert_eq!(data["low"], 0);
    assert_eq!(data["overdue"], 1);
}
