//! API integration tests

use chrono::{Duration, Utc};
use reqwest::{multipart, Client};
use serde_json::{json, Value};

const BASE_URL: &str = "http://localhost:8080/api/v1";

fn unique(prefix: &str) -> String {
    format!("{} {}", prefix, Utc::now().timestamp_nanos_opt().unwrap_or_default())
}

async fn post_json(client: &Client, path: &str, body: Value) -> (u16, Value) {
    let response = client
        .post(format!("{}{}", BASE_URL, path))
        .json(&body)
        .send()
        .await
        .expect("Failed to send request");
    let status = response.status().as_u16();
    let body = response.json().await.unwrap_or(Value::Null);
    (status, body)
}

/// Create a category, an item in it and a member; returns (item id, member id)
async fn seed(client: &Client) -> (i64, i64) {
    let (status, category) =
        post_json(client, "/categories", json!({ "name": unique("Camping") })).await;
    assert_eq!(status, 201);

    let (status, item) = post_json(
        client,
        "/items",
        json!({
            "name": unique("Tent"),
            "category_id": category["id"],
            "condition": "GOOD"
        }),
    )
    .await;
    assert_eq!(status, 201);
    assert!(item["scan_token"].as_str().unwrap_or_default().starts_with("QM"));

    let tag = Utc::now().timestamp_nanos_opt().unwrap_or_default();
    let (status, member) = post_json(
        client,
        "/members",
        json!({ "name": "Alice", "email": format!("alice.{}@example.org", tag) }),
    )
    .await;
    assert_eq!(status, 201);
    assert_eq!(member["role"], "MEMBER");

    (
        item["id"].as_i64().expect("No item ID"),
        member["id"].as_i64().expect("No member ID"),
    )
}

#[tokio::test]
#[ignore] // Run with: cargo test -- --ignored
async fn test_health_check() {
    let client = Client::new();

    let response = client
        .get(format!("{}/health", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());

    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
#[ignore]
async fn test_checkout_conflict_and_return() {
    let client = Client::new();
    let (item_id, member_id) = seed(&client).await;
    let checkout = json!({
        "item_id": item_id,
        "member_id": member_id,
        "expected_return": (Utc::now() + Duration::days(7)).to_rfc3339(),
        "condition_out": "GOOD",
        "actor": "desk"
    });

    let (status, loan) = post_json(&client, "/loans", checkout.clone()).await;
    assert_eq!(status, 201);
    assert_eq!(loan["is_overdue"], false);

    let (status, error) = post_json(&client, "/loans", checkout).await;
    assert_eq!(status, 409);
    assert_eq!(error["error"], "ItemOnLoan");
    assert_eq!(error["message"], "item already on loan");

    let loan_path = format!("/loans/{}/return", loan["id"]);
    let returned = json!({ "condition_in": "FAIR", "actor": "desk" });

    let (status, closed) = post_json(&client, &loan_path, returned.clone()).await;
    assert_eq!(status, 200);
    assert_eq!(closed["condition_in"], "FAIR");

    let (status, _) = post_json(&client, &loan_path, returned).await;
    assert_eq!(status, 404);
}

#[tokio::test]
#[ignore]
async fn test_past_expected_return_is_rejected() {
    let client = Client::new();
    let (item_id, member_id) = seed(&client).await;

    let (status, error) = post_json(
        &client,
        "/loans",
        json!({
            "item_id": item_id,
            "member_id": member_id,
            "expected_return": (Utc::now() - Duration::hours(1)).to_rfc3339(),
            "condition_out": "GOOD",
            "actor": "desk"
        }),
    )
    .await;

    assert_eq!(status, 400);
    assert_eq!(error["error"], "BadValue");
}

#[tokio::test]
#[ignore]
async fn test_member_csv_upload() {
    let client = Client::new();
    let tag = Utc::now().timestamp_nanos_opt().unwrap_or_default();
    let csv = format!(
        "name,email,role\nZoe,zoe.{tag}@example.org,LEADER\nYann,zoe.{tag}@example.org,\n",
        tag = tag
    );
    let form = multipart::Form::new().part(
        "file",
        multipart::Part::text(csv)
            .file_name("members.csv")
            .mime_str("text/csv")
            .expect("mime"),
    );

    let response = client
        .post(format!("{}/import/members/csv", BASE_URL))
        .multipart(form)
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());
    let report: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(report["success"], 1);
    assert_eq!(report["failed"], 1);
    assert_eq!(
        report["errors"][0],
        format!("Row 3: Email 'zoe.{}@example.org' already exists", tag)
    );
}

#[tokio::test]
#[ignore]
async fn test_empty_json_import_is_rejected() {
    let client = Client::new();
    let (status, error) = post_json(&client, "/import/items", json!([])).await;
    assert_eq!(status, 400);
    assert_eq!(error["error"], "BadValue");
}

#[tokio::test]
#[ignore]
async fn test_export_is_served_as_csv_attachment() {
    let client = Client::new();

    let response = client
        .get(format!("{}/reports/export?type=checkouts", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());
    let disposition = response
        .headers()
        .get("content-disposition")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(disposition.contains("checkout_history.csv"));

    let body = response.text().await.expect("Failed to read body");
    assert!(body.starts_with("\"Item Name\",\"Member Name\",\"Checked Out\""));
}
