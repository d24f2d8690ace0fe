use crate::api::{error_response, success_response, validation_error_response};
use crate::forms::GroupEditForm;
use crate::logging::TraceId;
use crate::state::AppState;
use axum::extract::{Extension, Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use cspm_common::types::MonitorGroup;
use serde::Serialize;
use utoipa::ToSchema;
use utoipa_axum::{router::OpenApiRouter, routes};

/// 監視グループ
#[derive(Serialize, ToSchema)]
struct GroupResponse {
    id: String,
    /// 所属部署ID（作成後変更不可）
    department_id: String,
    name: String,
    /// 監視グループID（外部識別子）
    group_id: Option<String>,
    responsible_contact: String,
    cc_contact: String,
    alert_email: String,
    report_email: String,
    memo: String,
    created_at: String,
    updated_at: String,
}

fn group_to_response(group: MonitorGroup) -> GroupResponse {
    GroupResponse {
        id: group.id,
        department_id: group.department_id,
        name: group.name,
        group_id: group.group_id,
        responsible_contact: group.responsible_contact,
        cc_contact: group.cc_contact,
        alert_email: group.alert_email,
        report_email: group.report_email,
        memo: group.memo,
        created_at: group.created_at.to_rfc3339(),
        updated_at: group.updated_at.to_rfc3339(),
    }
}

/// 監視グループを取得する（編集フォーム表示用）。
#[utoipa::path(
    get,
    path = "/v1/groups/{id}",
    tag = "Groups",
    params(
        ("id" = String, Path, description = "監視グループID（主キー）")
    ),
    responses(
        (status = 200, description = "監視グループ詳細", body = GroupResponse),
        (status = 404, description = "監視グループが存在しない", body = crate::api::ApiError)
    )
)]
async fn get_group(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.store.get_group_by_id(&id) {
        Ok(Some(group)) => success_response(StatusCode::OK, &trace_id, group_to_response(group)),
        Ok(None) => error_response(
            StatusCode::NOT_FOUND,
            &trace_id,
            "not_found",
            &format!("Monitor group '{}' not found", id),
        )
        .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to get monitor group");
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

/// 監視グループを更新する。所属部署は変更できない。
#[utoipa::path(
    put,
    path = "/v1/groups/{id}",
    tag = "Groups",
    params(
        ("id" = String, Path, description = "監視グループID（主キー）")
    ),
    request_body = GroupEditForm,
    responses(
        (status = 200, description = "監視グループを更新した", body = GroupResponse),
        (status = 400, description = "入力値が不正（data にフィールド別メッセージ）", body = crate::api::ApiError),
        (status = 404, description = "監視グループが存在しない", body = crate::api::ApiError)
    )
)]
async fn update_group(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(form): Json<GroupEditForm>,
) -> impl IntoResponse {
    let update = match form.validate() {
        Ok(update) => update,
        Err(fields) => return validation_error_response(&trace_id, fields).into_response(),
    };

    match state.store.update_group(&id, &update) {
        Ok(Some(group)) => success_response(StatusCode::OK, &trace_id, group_to_response(group)),
        Ok(None) => error_response(
            StatusCode::NOT_FOUND,
            &trace_id,
            "not_found",
            &format!("Monitor group '{}' not found", id),
        )
        .into_response(),
        Err(e) => {
            let err_msg = e.to_string();
            if err_msg.contains("UNIQUE constraint failed") {
                error_response(
                    StatusCode::CONFLICT,
                    &trace_id,
                    "conflict",
                    "A monitor group with this name already exists in the department",
                )
                .into_response()
            } else {
                tracing::error!(error = %e, "Failed to update monitor group");
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

/// 監視グループ削除の確認ペイロード
#[derive(Serialize, ToSchema)]
struct GroupDeleteConfirmation {
    /// 削除対象
    group: GroupResponse,
    /// 連鎖削除されるアカウント数
    cloud_accounts: u64,
    /// コミット先（DELETE で確定する）
    confirm_with: String,
}

/// 監視グループ削除の確認情報（連鎖削除されるアカウント数を含む）を返す。
#[utoipa::path(
    get,
    path = "/v1/groups/{id}/delete",
    tag = "Groups",
    params(
        ("id" = String, Path, description = "監視グループID（主キー）")
    ),
    responses(
        (status = 200, description = "削除確認情報", body = GroupDeleteConfirmation),
        (status = 404, description = "監視グループが存在しない", body = crate::api::ApiError)
    )
)]
async fn confirm_delete_group(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let group = match state.store.get_group_by_id(&id) {
        Ok(Some(group)) => group,
        Ok(None) => {
            return error_response(
                StatusCode::NOT_FOUND,
                &trace_id,
                "not_found",
                &format!("Monitor group '{}' not found", id),
            )
            .into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to load monitor group for delete confirmation");
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &trace_id,
                "storage_error",
                "Database error",
            )
            .into_response();
        }
    };

    match state.store.group_cascade_counts(&id) {
        Ok(counts) => success_response(
            StatusCode::OK,
            &trace_id,
            GroupDeleteConfirmation {
                confirm_with: format!("DELETE /v1/groups/{}", group.id),
                group: group_to_response(group),
                cloud_accounts: counts.unwrap_or(0),
            },
        ),
        Err(e) => {
            tracing::error!(error = %e, "Failed to count cascade targets");
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

/// 監視グループを削除する。所属アカウントも連鎖削除される。
#[utoipa::path(
    delete,
    path = "/v1/groups/{id}",
    tag = "Groups",
    params(
        ("id" = String, Path, description = "監視グループID（主キー）")
    ),
    responses(
        (status = 204, description = "監視グループを削除した"),
        (status = 404, description = "監視グループが存在しない", body = crate::api::ApiError)
    )
)]
async fn delete_group(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.store.delete_group(&id) {
        Ok(true) => StatusCode::NO_CONTENT.into_response(),
        Ok(false) => error_response(
            StatusCode::NOT_FOUND,
            &trace_id,
            "not_found",
            &format!("Monitor group '{}' not found", id),
        )
        .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to delete monitor group");
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

pub fn group_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(get_group, update_group, delete_group))
        .routes(routes!(confirm_delete_group))
}
