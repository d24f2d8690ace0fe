mod common;

use axum::http::StatusCode;
use common::{
    account_payload, assert_err_envelope, assert_ok_envelope, build_test_context, create_account,
    request_json, request_no_body,
};
use serde_json::json;

#[tokio::test]
async fn health_should_return_ok_envelope() {
    let ctx = build_test_context().expect("test context should build");
    let (status, body, trace) = request_no_body(&ctx.app, "GET", "/v1/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_ok_envelope(&body);
    assert!(body["data"]["version"].is_string());
    assert_eq!(body["data"]["storage_status"].as_str(), Some("ok"));
    assert!(trace.is_some());
}

#[tokio::test]
async fn create_account_resolves_department_and_group_by_name() {
    let ctx = build_test_context().expect("test context should build");

    let mut payload = account_payload("Eng", "Infra", "prod-db", "111111111111");
    payload["monitor_group_id"] = json!("MG-001");
    let first = create_account(&ctx.app, payload).await;

    // Second account into the same names: both parents are reused even when
    // a different external group id is supplied.
    let mut payload = account_payload("Eng", "Infra", "prod-web", "222222222222");
    payload["monitor_group_id"] = json!("MG-999");
    let second = create_account(&ctx.app, payload).await;

    assert_eq!(first["monitor_group_id"], second["monitor_group_id"]);

    let (status, body, _) = request_no_body(&ctx.app, "GET", "/v1/departments").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().map(Vec::len), Some(1));

    let group_id = first["monitor_group_id"].as_str().unwrap();
    let (status, body, _) =
        request_no_body(&ctx.app, "GET", &format!("/v1/groups/{group_id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["group_id"].as_str(), Some("MG-001"));
    // Implicitly created groups get the placeholder contacts.
    assert_eq!(body["data"]["responsible_contact"].as_str(), Some("未設定"));
    assert_eq!(body["data"]["cc_contact"].as_str(), Some(""));
}

#[tokio::test]
async fn create_account_reports_field_level_validation_errors() {
    let ctx = build_test_context().expect("test context should build");

    let (status, body, _) = request_json(
        &ctx.app,
        "POST",
        "/v1/accounts",
        Some(json!({
            "provider": "openstack",
            "request_date": "05/01/2024",
            "status": "pending"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_err_envelope(&body, 1006);

    let fields = body["data"].as_object().expect("data should be field map");
    for field in [
        "department_name",
        "monitor_group_name",
        "name",
        "account_id",
        "provider",
        "request_date",
        "status",
    ] {
        assert!(fields.contains_key(field), "missing error for {field}");
    }
}

#[tokio::test]
async fn duplicate_account_id_fails_validation_on_the_field() {
    let ctx = build_test_context().expect("test context should build");

    create_account(&ctx.app, account_payload("Eng", "Infra", "a", "999999999999")).await;

    let (status, body, _) = request_json(
        &ctx.app,
        "POST",
        "/v1/accounts",
        Some(account_payload("Eng", "Infra", "b", "999999999999")),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_err_envelope(&body, 1006);
    assert!(body["data"]["account_id"]
        .as_str()
        .unwrap_or_default()
        .contains("already exists"));
}

#[tokio::test]
async fn account_edit_updates_fields_but_never_the_owning_group() {
    let ctx = build_test_context().expect("test context should build");

    let created = create_account(&ctx.app, account_payload("Eng", "Infra", "prod-db", "111111111111")).await;
    let id = created["id"].as_str().unwrap();
    let original_group = created["monitor_group_id"].as_str().unwrap();

    // Edit payload tries to smuggle in a group move; the field is not part
    // of the edit form and must have no effect.
    let (status, body, _) = request_json(
        &ctx.app,
        "PUT",
        &format!("/v1/accounts/{id}"),
        Some(json!({
            "name": "prod-db-2",
            "provider": "GCP",
            "account_id": "111111111111",
            "connection_date": "2024-04-15",
            "status": "Connected",
            "monitor_group_id": "somewhere-else"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "body: {body}");
    assert_ok_envelope(&body);
    assert_eq!(body["data"]["name"].as_str(), Some("prod-db-2"));
    assert_eq!(body["data"]["provider"].as_str(), Some("GCP"));
    assert_eq!(body["data"]["status"].as_str(), Some("Connected"));
    assert_eq!(body["data"]["monitor_group_id"].as_str(), Some(original_group));
}

#[tokio::test]
async fn account_edit_rejects_account_id_of_another_account() {
    let ctx = build_test_context().expect("test context should build");

    create_account(&ctx.app, account_payload("Eng", "Infra", "a", "111111111111")).await;
    let second = create_account(&ctx.app, account_payload("Eng", "Infra", "b", "222222222222")).await;
    let id = second["id"].as_str().unwrap();

    let (status, body, _) = request_json(
        &ctx.app,
        "PUT",
        &format!("/v1/accounts/{id}"),
        Some(json!({
            "name": "b",
            "provider": "AWS",
            "account_id": "111111111111",
            "status": "Waiting"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_err_envelope(&body, 1006);
    assert!(body["data"]["account_id"].is_string());

    // Keeping its own account_id is fine.
    let (status, _, _) = request_json(
        &ctx.app,
        "PUT",
        &format!("/v1/accounts/{id}"),
        Some(json!({
            "name": "b-renamed",
            "provider": "AWS",
            "account_id": "222222222222",
            "status": "Waiting"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn account_delete_requires_confirm_then_commit() {
    let ctx = build_test_context().expect("test context should build");

    let created = create_account(&ctx.app, account_payload("Eng", "Infra", "prod-db", "111111111111")).await;
    let id = created["id"].as_str().unwrap();

    // Confirmation step: a plain GET that changes nothing.
    let (status, body, _) =
        request_no_body(&ctx.app, "GET", &format!("/v1/accounts/{id}/delete")).await;
    assert_eq!(status, StatusCode::OK);
    assert_ok_envelope(&body);
    assert_eq!(body["data"]["account"]["id"].as_str(), Some(id));

    let (status, _, _) = request_no_body(&ctx.app, "GET", &format!("/v1/accounts/{id}")).await;
    assert_eq!(status, StatusCode::OK, "confirmation must not delete");

    // Commit.
    let (status, _, _) = request_no_body(&ctx.app, "DELETE", &format!("/v1/accounts/{id}")).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body, _) = request_no_body(&ctx.app, "GET", &format!("/v1/accounts/{id}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_err_envelope(&body, 1004);
}

#[tokio::test]
async fn group_edit_cannot_change_the_department() {
    let ctx = build_test_context().expect("test context should build");

    let created = create_account(&ctx.app, account_payload("Eng", "Infra", "prod-db", "111111111111")).await;
    let group_id = created["monitor_group_id"].as_str().unwrap();

    let (_, before, _) = request_no_body(&ctx.app, "GET", &format!("/v1/groups/{group_id}")).await;
    let department_id = before["data"]["department_id"].as_str().unwrap().to_string();

    let (status, body, _) = request_json(
        &ctx.app,
        "PUT",
        &format!("/v1/groups/{group_id}"),
        Some(json!({
            "name": "Infra-Renamed",
            "group_id": "MG-42",
            "responsible_contact": "alice@example.com",
            "alert_email": "alerts@example.com",
            "report_email": "reports@example.com",
            "department_id": "another-department"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "body: {body}");
    assert_eq!(body["data"]["name"].as_str(), Some("Infra-Renamed"));
    assert_eq!(body["data"]["department_id"].as_str(), Some(department_id.as_str()));
}

#[tokio::test]
async fn group_delete_cascades_to_its_accounts() {
    let ctx = build_test_context().expect("test context should build");

    let a1 = create_account(&ctx.app, account_payload("Eng", "Infra", "a", "111111111111")).await;
    create_account(&ctx.app, account_payload("Eng", "Infra", "b", "222222222222")).await;
    let other = create_account(&ctx.app, account_payload("Eng", "Data", "c", "333333333333")).await;
    let group_id = a1["monitor_group_id"].as_str().unwrap();

    // Confirmation reports the blast radius.
    let (status, body, _) =
        request_no_body(&ctx.app, "GET", &format!("/v1/groups/{group_id}/delete")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["cloud_accounts"].as_u64(), Some(2));

    let (status, _, _) = request_no_body(&ctx.app, "DELETE", &format!("/v1/groups/{group_id}")).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let a1_id = a1["id"].as_str().unwrap();
    let (status, _, _) = request_no_body(&ctx.app, "GET", &format!("/v1/accounts/{a1_id}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // The sibling group's account survives.
    let other_id = other["id"].as_str().unwrap();
    let (status, _, _) = request_no_body(&ctx.app, "GET", &format!("/v1/accounts/{other_id}")).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn department_delete_cascades_through_groups_to_accounts() {
    let ctx = build_test_context().expect("test context should build");

    let a1 = create_account(&ctx.app, account_payload("Eng", "Infra", "a", "111111111111")).await;
    create_account(&ctx.app, account_payload("Eng", "Data", "b", "222222222222")).await;
    create_account(&ctx.app, account_payload("Sales", "CRM", "c", "333333333333")).await;

    let (_, depts, _) = request_no_body(&ctx.app, "GET", "/v1/departments").await;
    let eng = depts["data"]
        .as_array()
        .unwrap()
        .iter()
        .find(|d| d["name"] == "Eng")
        .expect("Eng should exist")
        .clone();
    let eng_id = eng["id"].as_str().unwrap();

    let (status, body, _) =
        request_no_body(&ctx.app, "GET", &format!("/v1/departments/{eng_id}/delete")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["monitor_groups"].as_u64(), Some(2));
    assert_eq!(body["data"]["cloud_accounts"].as_u64(), Some(2));

    let (status, _, _) =
        request_no_body(&ctx.app, "DELETE", &format!("/v1/departments/{eng_id}")).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let a1_id = a1["id"].as_str().unwrap();
    let (status, _, _) = request_no_body(&ctx.app, "GET", &format!("/v1/accounts/{a1_id}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, depts, _) = request_no_body(&ctx.app, "GET", "/v1/departments").await;
    assert_eq!(depts["data"].as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn missing_ids_return_not_found_envelopes() {
    let ctx = build_test_context().expect("test context should build");

    for uri in [
        "/v1/accounts/no-such-id",
        "/v1/accounts/no-such-id/delete",
        "/v1/groups/no-such-id",
        "/v1/groups/no-such-id/delete",
        "/v1/departments/no-such-id",
        "/v1/departments/no-such-id/delete",
    ] {
        let (status, body, _) = request_no_body(&ctx.app, "GET", uri).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "uri: {uri}");
        assert_err_envelope(&body, 1004);
    }

    for uri in [
        "/v1/accounts/no-such-id",
        "/v1/groups/no-such-id",
        "/v1/departments/no-such-id",
    ] {
        let (status, body, _) = request_no_body(&ctx.app, "DELETE", uri).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "uri: {uri}");
        assert_err_envelope(&body, 1004);
    }
}
