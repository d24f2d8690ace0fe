use crate::api::{error_response, success_response, validation_error_response};
use crate::forms::{AccountCreateForm, AccountEditForm, FieldErrors, MSG_DUPLICATE_ACCOUNT_ID};
use crate::logging::TraceId;
use crate::state::AppState;
use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use cspm_common::types::CloudAccount;
use cspm_storage::{DepartmentNode, GroupNode};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use utoipa_axum::{router::OpenApiRouter, routes};

/// クラウドアカウント
#[derive(Serialize, ToSchema)]
struct AccountResponse {
    id: String,
    /// 所属監視グループID（作成後変更不可）
    monitor_group_id: String,
    name: String,
    provider: String,
    account_id: String,
    /// 依頼日（YYYY-MM-DD）
    request_date: Option<String>,
    /// 接続日（YYYY-MM-DD）
    connection_date: Option<String>,
    status: String,
    created_at: String,
    updated_at: String,
}

fn account_to_response(account: CloudAccount) -> AccountResponse {
    AccountResponse {
        id: account.id,
        monitor_group_id: account.monitor_group_id,
        name: account.name,
        provider: account.provider.to_string(),
        account_id: account.account_id,
        request_date: account.request_date.map(|d| d.to_string()),
        connection_date: account.connection_date.map(|d| d.to_string()),
        status: account.status.to_string(),
        created_at: account.created_at.to_rfc3339(),
        updated_at: account.updated_at.to_rfc3339(),
    }
}

/// 監視グループとその表示対象アカウント
#[derive(Serialize, ToSchema)]
struct GroupTreeResponse {
    id: String,
    name: String,
    group_id: Option<String>,
    responsible_contact: String,
    cc_contact: String,
    alert_email: String,
    report_email: String,
    memo: String,
    cloud_accounts: Vec<AccountResponse>,
}

/// 部署とその表示対象グループ（ネスト済みリスト表示用）
#[derive(Serialize, ToSchema)]
struct DepartmentTreeResponse {
    id: String,
    name: String,
    memo: String,
    monitor_groups: Vec<GroupTreeResponse>,
}

fn group_node_to_response(node: GroupNode) -> GroupTreeResponse {
    GroupTreeResponse {
        id: node.group.id,
        name: node.group.name,
        group_id: node.group.group_id,
        responsible_contact: node.group.responsible_contact,
        cc_contact: node.group.cc_contact,
        alert_email: node.group.alert_email,
        report_email: node.group.report_email,
        memo: node.group.memo,
        cloud_accounts: node.accounts.into_iter().map(account_to_response).collect(),
    }
}

fn department_node_to_response(node: DepartmentNode) -> DepartmentTreeResponse {
    DepartmentTreeResponse {
        id: node.department.id,
        name: node.department.name,
        memo: node.department.memo,
        monitor_groups: node.groups.into_iter().map(group_node_to_response).collect(),
    }
}

/// アカウント一覧の検索パラメータ
#[derive(Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
struct ListAccountsParams {
    /// 検索ワード。アカウント名・アカウントID・種別・グループ名に
    /// 部分一致（大文字小文字は区別しない）。
    #[param(required = false)]
    q: Option<String>,
}

/// 部署 → 監視グループ → アカウントのネスト済み一覧を返す。
/// `q` 指定時は各階層を検索結果で絞り込む。
#[utoipa::path(
    get,
    path = "/v1/accounts",
    tag = "Accounts",
    params(ListAccountsParams),
    responses(
        (status = 200, description = "部署ツリー", body = Vec<DepartmentTreeResponse>)
    )
)]
async fn list_accounts(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Query(params): Query<ListAccountsParams>,
) -> impl IntoResponse {
    match state.store.search_tree(params.q.as_deref()) {
        Ok(tree) => {
            let resp: Vec<DepartmentTreeResponse> =
                tree.into_iter().map(department_node_to_response).collect();
            success_response(StatusCode::OK, &trace_id, resp)
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to list accounts");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &trace_id,
                "storage_error",
                "Database error",
            )
            .into_response()
        }
    }
}

/// アカウントを登録する。
/// 部署・監視グループは名前で解決し、存在しなければ作成する。
#[utoipa::path(
    post,
    path = "/v1/accounts",
    tag = "Accounts",
    request_body = AccountCreateForm,
    responses(
        (status = 201, description = "アカウントを作成した", body = AccountResponse),
        (status = 400, description = "入力値が不正（data にフィールド別メッセージ）", body = crate::api::ApiError),
        (status = 409, description = "アカウントIDが重複した", body = crate::api::ApiError)
    )
)]
async fn create_account(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Json(form): Json<AccountCreateForm>,
) -> impl IntoResponse {
    let req = match form.validate() {
        Ok(req) => req,
        Err(fields) => return validation_error_response(&trace_id, fields).into_response(),
    };

    // Uniqueness is part of form validation: report it on the field.
    match state.store.get_account_by_account_id(&req.account_id) {
        Ok(Some(_)) => {
            let mut fields = FieldErrors::new();
            fields.insert("account_id".to_string(), MSG_DUPLICATE_ACCOUNT_ID.to_string());
            return validation_error_response(&trace_id, fields).into_response();
        }
        Ok(None) => {}
        Err(e) => {
            tracing::error!(error = %e, "Failed to check account_id uniqueness");
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &trace_id,
                "storage_error",
                "Database error",
            )
            .into_response();
        }
    }

    match state.store.create_account(&req) {
        Ok(account) => {
            success_response(StatusCode::CREATED, &trace_id, account_to_response(account))
        }
        Err(e) => {
            let err_msg = e.to_string();
            // Lost the uniqueness race between the check and the insert.
            if err_msg.contains("UNIQUE constraint failed") {
                error_response(
                    StatusCode::CONFLICT,
                    &trace_id,
                    "conflict",
                    MSG_DUPLICATE_ACCOUNT_ID,
                )
                .into_response()
            } else {
                tracing::error!(error = %e, "Failed to create account");
                error_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    &trace_id,
                    "storage_error",
                    "Database error",
                )
                .into_response()
            }
        }
    }
}

/// アカウントを取得する（編集フォーム表示用）。
#[utoipa::path(
    get,
    path = "/v1/accounts/{id}",
    tag = "Accounts",
    params(
        ("id" = String, Path, description = "アカウントID（主キー）")
    ),
    responses(
        (status = 200, description = "アカウント詳細", body = AccountResponse),
        (status = 404, description = "アカウントが存在しない", body = crate::api::ApiError)
    )
)]
async fn get_account(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.store.get_account_by_id(&id) {
        Ok(Some(account)) => {
            success_response(StatusCode::OK, &trace_id, account_to_response(account))
        }
        Ok(None) => error_response(
            StatusCode::NOT_FOUND,
            &trace_id,
            "not_found",
            &format!("Account '{}' not found", id),
        )
        .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to get account");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &trace_id,
                "storage_error",
                "Database error",
            )
            .into_response()
        }
    }
}

/// アカウントを更新する。所属監視グループは変更できない。
#[utoipa::path(
    put,
    path = "/v1/accounts/{id}",
    tag = "Accounts",
    params(
        ("id" = String, Path, description = "アカウントID（主キー）")
    ),
    request_body = AccountEditForm,
    responses(
        (status = 200, description = "アカウントを更新した", body = AccountResponse),
        (status = 400, description = "入力値が不正", body = crate::api::ApiError),
        (status = 404, description = "アカウントが存在しない", body = crate::api::ApiError)
    )
)]
async fn update_account(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(form): Json<AccountEditForm>,
) -> impl IntoResponse {
    let update = match form.validate() {
        Ok(update) => update,
        Err(fields) => return validation_error_response(&trace_id, fields).into_response(),
    };

    // account_id may change, but not onto another account.
    match state.store.get_account_by_account_id(&update.account_id) {
        Ok(Some(existing)) if existing.id != id => {
            let mut fields = FieldErrors::new();
            fields.insert("account_id".to_string(), MSG_DUPLICATE_ACCOUNT_ID.to_string());
            return validation_error_response(&trace_id, fields).into_response();
        }
        Ok(_) => {}
        Err(e) => {
            tracing::error!(error = %e, "Failed to check account_id uniqueness");
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &trace_id,
                "storage_error",
                "Database error",
            )
            .into_response();
        }
    }

    match state.store.update_account(&id, &update) {
        Ok(Some(account)) => {
            success_response(StatusCode::OK, &trace_id, account_to_response(account))
        }
        Ok(None) => error_response(
            StatusCode::NOT_FOUND,
            &trace_id,
            "not_found",
            &format!("Account '{}' not found", id),
        )
        .into_response(),
        Err(e) => {
            let err_msg = e.to_string();
            if err_msg.contains("UNIQUE constraint failed") {
                error_response(
                    StatusCode::CONFLICT,
                    &trace_id,
                    "conflict",
                    MSG_DUPLICATE_ACCOUNT_ID,
                )
                .into_response()
            } else {
                tracing::error!(error = %e, "Failed to update account");
                error_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    &trace_id,
                    "storage_error",
                    "Database error",
                )
                .into_response()
            }
        }
    }
}

/// アカウント削除の確認ペイロード
#[derive(Serialize, ToSchema)]
struct AccountDeleteConfirmation {
    /// 削除対象
    account: AccountResponse,
    /// コミット先（DELETE で確定する）
    confirm_with: String,
}

/// アカウント削除の確認情報を返す。削除自体は DELETE で確定する。
#[utoipa::path(
    get,
    path = "/v1/accounts/{id}/delete",
    tag = "Accounts",
    params(
        ("id" = String, Path, description = "アカウントID（主キー）")
    ),
    responses(
        (status = 200, description = "削除確認情報", body = AccountDeleteConfirmation),
        (status = 404, description = "アカウントが存在しない", body = crate::api::ApiError)
    )
)]
async fn confirm_delete_account(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.store.get_account_by_id(&id) {
        Ok(Some(account)) => success_response(
            StatusCode::OK,
            &trace_id,
            AccountDeleteConfirmation {
                confirm_with: format!("DELETE /v1/accounts/{}", account.id),
                account: account_to_response(account),
            },
        ),
        Ok(None) => error_response(
            StatusCode::NOT_FOUND,
            &trace_id,
            "not_found",
            &format!("Account '{}' not found", id),
        )
        .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to load account for delete confirmation");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &trace_id,
                "storage_error",
                "Database error",
            )
            .into_response()
        }
    }
}

/// アカウントを削除する。
#[utoipa::path(
    delete,
    path = "/v1/accounts/{id}",
    tag = "Accounts",
    params(
        ("id" = String, Path, description = "アカウントID（主キー）")
    ),
    responses(
        (status = 204, description = "アカウントを削除した"),
        (status = 404, description = "アカウントが存在しない", body = crate::api::ApiError)
    )
)]
async fn delete_account(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.store.delete_account(&id) {
        Ok(true) => StatusCode::NO_CONTENT.into_response(),
        Ok(false) => error_response(
            StatusCode::NOT_FOUND,
            &trace_id,
            "not_found",
            &format!("Account '{}' not found", id),
        )
        .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to delete account");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &trace_id,
                "storage_error",
                "Database error",
            )
            .into_response()
        }
    }
}

pub fn account_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(list_accounts, create_account))
        .routes(routes!(get_account, update_account, delete_account))
        .routes(routes!(confirm_delete_account))
}
