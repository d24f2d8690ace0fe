mod common;

use axum::http::StatusCode;
use common::{
    account_payload, assert_err_envelope, assert_ok_envelope, build_test_context, create_account,
    request_no_body,
};
use serde_json::{json, Value};

async fn seed_three_months(app: &axum::Router) {
    // Jan: AWS connected, Feb: Azure waiting, Mar: GCP connected.
    let mut a = account_payload("Eng", "Infra", "jan-acct", "111111111111");
    a["request_date"] = json!("2024-01-05");
    a["connection_date"] = json!("2024-01-15");
    a["status"] = json!("Connected");
    create_account(app, a).await;

    let mut b = account_payload("Eng", "Data", "feb-acct", "222222222222");
    b["provider"] = json!("Azure");
    b["request_date"] = json!("2024-02-10");
    create_account(app, b).await;

    let mut c = account_payload("Sales", "CRM", "mar-acct", "333333333333");
    c["provider"] = json!("GCP");
    c["request_date"] = json!("2024-03-01");
    c["connection_date"] = json!("2024-01-20");
    c["status"] = json!("Connected");
    create_account(app, c).await;
}

#[tokio::test]
async fn dashboard_on_an_empty_store_returns_zeroes_not_errors() {
    let ctx = build_test_context().expect("test context should build");

    let (status, body, _) = request_no_body(&ctx.app, "GET", "/v1/dashboard/overview").await;
    assert_eq!(status, StatusCode::OK);
    assert_ok_envelope(&body);
    let data = &body["data"];
    assert_eq!(data["total_departments"].as_u64(), Some(0));
    assert_eq!(data["total_accounts"].as_u64(), Some(0));
    assert_eq!(data["provider_counts"].as_array().map(Vec::len), Some(0));
    assert_eq!(data["monthly_trend"].as_array().map(Vec::len), Some(0));
    assert_eq!(data["attention_accounts"].as_array().map(Vec::len), Some(0));
    assert_eq!(data["department_ranking"].as_array().map(Vec::len), Some(0));
    assert_eq!(data["filtered"].as_bool(), Some(false));
}

#[tokio::test]
async fn dashboard_filters_by_request_date_only_when_both_bounds_are_given() {
    let ctx = build_test_context().expect("test context should build");
    seed_three_months(&ctx.app).await;

    // Unfiltered: everything counts, master counts included.
    let (status, body, _) = request_no_body(&ctx.app, "GET", "/v1/dashboard/overview").await;
    assert_eq!(status, StatusCode::OK);
    let data = &body["data"];
    assert_eq!(data["total_departments"].as_u64(), Some(2));
    assert_eq!(data["total_groups"].as_u64(), Some(3));
    assert_eq!(data["total_accounts"].as_u64(), Some(3));
    assert_eq!(data["connected_accounts"].as_u64(), Some(2));
    assert_eq!(data["filtered"].as_bool(), Some(false));

    // February window: exactly the Feb account.
    let (status, body, _) = request_no_body(
        &ctx.app,
        "GET",
        "/v1/dashboard/overview?start=2024-02-01&end=2024-02-28",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let data = &body["data"];
    assert_eq!(data["total_accounts"].as_u64(), Some(1));
    assert_eq!(data["connected_accounts"].as_u64(), Some(0));
    assert_eq!(data["filtered"].as_bool(), Some(true));
    // Master counts never follow the filter.
    assert_eq!(data["total_departments"].as_u64(), Some(2));
    assert_eq!(data["total_groups"].as_u64(), Some(3));
    let providers = data["provider_counts"].as_array().unwrap();
    assert_eq!(providers.len(), 1);
    assert_eq!(providers[0]["provider"].as_str(), Some("Azure"));
    let attention = data["attention_accounts"].as_array().unwrap();
    assert_eq!(attention.len(), 1);
    assert_eq!(attention[0]["name"].as_str(), Some("feb-acct"));

    // One bound alone does not filter.
    let (status, body, _) =
        request_no_body(&ctx.app, "GET", "/v1/dashboard/overview?start=2024-02-01").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total_accounts"].as_u64(), Some(3));
    assert_eq!(body["data"]["filtered"].as_bool(), Some(false));
}

#[tokio::test]
async fn dashboard_rejects_malformed_dates() {
    let ctx = build_test_context().expect("test context should build");

    let (status, body, _) = request_no_body(
        &ctx.app,
        "GET",
        "/v1/dashboard/overview?start=02/01/2024&end=2024-02-28",
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_err_envelope(&body, 1006);
    assert!(body["data"]["start"].is_string());
}

#[tokio::test]
async fn dashboard_buckets_connection_trend_per_month_ascending() {
    let ctx = build_test_context().expect("test context should build");
    seed_three_months(&ctx.app).await;

    let (status, body, _) = request_no_body(&ctx.app, "GET", "/v1/dashboard/overview").await;
    assert_eq!(status, StatusCode::OK);
    // Two accounts connected in 2024-01 collapse into one bucket.
    let trend = body["data"]["monthly_trend"].as_array().unwrap();
    assert_eq!(trend.len(), 1);
    assert_eq!(trend[0]["month"].as_str(), Some("2024-01"));
    assert_eq!(trend[0]["count"].as_u64(), Some(2));
}

#[tokio::test]
async fn dashboard_ranking_counts_filtered_accounts_per_department() {
    let ctx = build_test_context().expect("test context should build");
    seed_three_months(&ctx.app).await;

    let (status, body, _) = request_no_body(&ctx.app, "GET", "/v1/dashboard/overview").await;
    assert_eq!(status, StatusCode::OK);
    let ranking = body["data"]["department_ranking"].as_array().unwrap();
    assert_eq!(ranking.len(), 2);
    assert_eq!(ranking[0]["name"].as_str(), Some("Eng"));
    assert_eq!(ranking[0]["account_count"].as_u64(), Some(2));
    assert_eq!(ranking[1]["name"].as_str(), Some("Sales"));

    // With a January filter, Sales owns no matching account and the inner
    // join drops it entirely (no zero-count entry).
    let (status, body, _) = request_no_body(
        &ctx.app,
        "GET",
        "/v1/dashboard/overview?start=2024-01-01&end=2024-01-31",
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let ranking = body["data"]["department_ranking"].as_array().unwrap();
    assert_eq!(ranking.len(), 1);
    assert_eq!(ranking[0]["name"].as_str(), Some("Eng"));
    assert_eq!(ranking[0]["account_count"].as_u64(), Some(1));
}

fn department_names(body: &Value) -> Vec<String> {
    body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["name"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn listing_without_query_returns_the_full_tree() {
    let ctx = build_test_context().expect("test context should build");
    seed_three_months(&ctx.app).await;

    let (status, body, _) = request_no_body(&ctx.app, "GET", "/v1/accounts").await;
    assert_eq!(status, StatusCode::OK);
    assert_ok_envelope(&body);
    assert_eq!(department_names(&body), vec!["Eng", "Sales"]);

    let eng = &body["data"][0];
    assert_eq!(eng["monitor_groups"].as_array().map(Vec::len), Some(2));
    let infra = &eng["monitor_groups"][0];
    assert_eq!(infra["name"].as_str(), Some("Infra"));
    assert_eq!(infra["cloud_accounts"][0]["name"].as_str(), Some("jan-acct"));
}

#[tokio::test]
async fn search_finds_the_same_tree_via_group_name_or_account_fields() {
    let ctx = build_test_context().expect("test context should build");

    create_account(
        &ctx.app,
        account_payload("Eng", "Infra", "prod-db", "123"),
    )
    .await;
    let mut other = account_payload("Sales", "CRM", "crm-main", "456");
    other["provider"] = json!("GCP");
    create_account(&ctx.app, other).await;

    // Group-name match and account-field match produce the same nesting.
    for q in ["infra", "prod-db"] {
        let (status, body, _) =
            request_no_body(&ctx.app, "GET", &format!("/v1/accounts?q={q}")).await;
        assert_eq!(status, StatusCode::OK);
        let tree = body["data"].as_array().unwrap();
        assert_eq!(tree.len(), 1, "query {q:?}");
        assert_eq!(tree[0]["name"].as_str(), Some("Eng"));
        let groups = tree[0]["monitor_groups"].as_array().unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0]["name"].as_str(), Some("Infra"));
        let accounts = groups[0]["cloud_accounts"].as_array().unwrap();
        assert_eq!(accounts.len(), 1);
        assert_eq!(accounts[0]["name"].as_str(), Some("prod-db"));
    }

    // No hits: an empty tree, not an error.
    let (status, body, _) =
        request_no_body(&ctx.app, "GET", "/v1/accounts?q=never-matches").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().map(Vec::len), Some(0));
}

#[tokio::test]
async fn search_filters_children_inside_matched_departments() {
    let ctx = build_test_context().expect("test context should build");

    create_account(&ctx.app, account_payload("Eng", "Infra", "prod-db", "111111111111")).await;
    create_account(&ctx.app, account_payload("Eng", "Infra", "prod-web", "222222222222")).await;
    create_account(&ctx.app, account_payload("Eng", "Data", "warehouse", "333333333333")).await;

    // A direct account match keeps only its own group, and inside that
    // group only the matching account.
    let (status, body, _) = request_no_body(&ctx.app, "GET", "/v1/accounts?q=prod-db").await;
    assert_eq!(status, StatusCode::OK);
    let tree = body["data"].as_array().unwrap();
    assert_eq!(tree.len(), 1);
    let groups = tree[0]["monitor_groups"].as_array().unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0]["name"].as_str(), Some("Infra"));
    let accounts = groups[0]["cloud_accounts"].as_array().unwrap();
    assert_eq!(accounts.len(), 1);
    assert_eq!(accounts[0]["name"].as_str(), Some("prod-db"));

    // A group-name match pulls in all of that group's accounts.
    let (status, body, _) = request_no_body(&ctx.app, "GET", "/v1/accounts?q=infra").await;
    assert_eq!(status, StatusCode::OK);
    let groups = body["data"][0]["monitor_groups"].as_array().unwrap();
    assert_eq!(groups.len(), 1);
    assert_eq!(
        groups[0]["cloud_accounts"].as_array().map(Vec::len),
        Some(2)
    );
}
