use crate::api::{error_response, success_response, validation_error_response};
use crate::forms::DepartmentEditForm;
use crate::logging::TraceId;
use crate::state::AppState;
use axum::extract::{Extension, Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use cspm_common::types::Department;
use serde::Serialize;
use utoipa::ToSchema;
use utoipa_axum::{router::OpenApiRouter, routes};

/// 部署
#[derive(Serialize, ToSchema)]
struct DepartmentResponse {
    id: String,
    name: String,
    memo: String,
    created_at: String,
    updated_at: String,
}

fn department_to_response(department: Department) -> DepartmentResponse {
    DepartmentResponse {
        id: department.id,
        name: department.name,
        memo: department.memo,
        created_at: department.created_at.to_rfc3339(),
        updated_at: department.updated_at.to_rfc3339(),
    }
}

/// 部署一覧を返す（マスタデータ、登録順）。
#[utoipa::path(
    get,
    path = "/v1/departments",
    tag = "Departments",
    responses(
        (status = 200, description = "部署一覧", body = Vec<DepartmentResponse>)
    )
)]
async fn list_departments(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    match state.store.list_departments() {
        Ok(departments) => {
            let resp: Vec<DepartmentResponse> = departments
                .into_iter()
                .map(department_to_response)
                .collect();
            success_response(StatusCode::OK, &trace_id, resp)
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to list departments");
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

/// 部署を取得する。
#[utoipa::path(
    get,
    path = "/v1/departments/{id}",
    tag = "Departments",
    params(
        ("id" = String, Path, description = "部署ID（主キー）")
    ),
    responses(
        (status = 200, description = "部署詳細", body = DepartmentResponse),
        (status = 404, description = "部署が存在しない", body = crate::api::ApiError)
    )
)]
async fn get_department(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.store.get_department_by_id(&id) {
        Ok(Some(department)) => {
            success_response(StatusCode::OK, &trace_id, department_to_response(department))
        }
        Ok(None) => error_response(
            StatusCode::NOT_FOUND,
            &trace_id,
            "not_found",
            &format!("Department '{}' not found", id),
        )
        .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to get department");
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

/// 部署を更新する。
#[utoipa::path(
    put,
    path = "/v1/departments/{id}",
    tag = "Departments",
    params(
        ("id" = String, Path, description = "部署ID（主キー）")
    ),
    request_body = DepartmentEditForm,
    responses(
        (status = 200, description = "部署を更新した", body = DepartmentResponse),
        (status = 400, description = "入力値が不正", body = crate::api::ApiError),
        (status = 404, description = "部署が存在しない", body = crate::api::ApiError)
    )
)]
async fn update_department(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(form): Json<DepartmentEditForm>,
) -> impl IntoResponse {
    let update = match form.validate() {
        Ok(update) => update,
        Err(fields) => return validation_error_response(&trace_id, fields).into_response(),
    };

    match state.store.update_department(&id, &update) {
        Ok(Some(department)) => {
            success_response(StatusCode::OK, &trace_id, department_to_response(department))
        }
        Ok(None) => error_response(
            StatusCode::NOT_FOUND,
            &trace_id,
            "not_found",
            &format!("Department '{}' not found", id),
        )
        .into_response(),
        Err(e) => {
            let err_msg = e.to_string();
            if err_msg.contains("UNIQUE constraint failed") {
                error_response(
                    StatusCode::CONFLICT,
                    &trace_id,
                    "conflict",
                    "A department with this name already exists",
                )
                .into_response()
            } else {
                tracing::error!(error = %e, "Failed to update department");
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

/// 部署削除の確認ペイロード
#[derive(Serialize, ToSchema)]
struct DepartmentDeleteConfirmation {
    /// 削除対象
    department: DepartmentResponse,
    /// 連鎖削除される監視グループ数
    monitor_groups: u64,
    /// 連鎖削除されるアカウント数
    cloud_accounts: u64,
    /// コミット先（DELETE で確定する）
    confirm_with: String,
}

/// 部署削除の確認情報（連鎖削除される子孫数を含む）を返す。
#[utoipa::path(
    get,
    path = "/v1/departments/{id}/delete",
    tag = "Departments",
    params(
        ("id" = String, Path, description = "部署ID（主キー）")
    ),
    responses(
        (status = 200, description = "削除確認情報", body = DepartmentDeleteConfirmation),
        (status = 404, description = "部署が存在しない", body = crate::api::ApiError)
    )
)]
async fn confirm_delete_department(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let department = match state.store.get_department_by_id(&id) {
        Ok(Some(department)) => department,
        Ok(None) => {
            return error_response(
                StatusCode::NOT_FOUND,
                &trace_id,
                "not_found",
                &format!("Department '{}' not found", id),
            )
            .into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to load department for delete confirmation");
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &trace_id,
                "storage_error",
                "Database error",
            )
            .into_response();
        }
    };

    match state.store.department_cascade_counts(&id) {
        Ok(counts) => {
            let counts = counts.unwrap_or(cspm_storage::CascadeCounts {
                monitor_groups: 0,
                cloud_accounts: 0,
            });
            success_response(
                StatusCode::OK,
                &trace_id,
                DepartmentDeleteConfirmation {
                    confirm_with: format!("DELETE /v1/departments/{}", department.id),
                    department: department_to_response(department),
                    monitor_groups: counts.monitor_groups,
                    cloud_accounts: counts.cloud_accounts,
                },
            )
        }
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

/// 部署を削除する。監視グループとアカウントも連鎖削除される。
#[utoipa::path(
    delete,
    path = "/v1/departments/{id}",
    tag = "Departments",
    params(
        ("id" = String, Path, description = "部署ID（主キー）")
    ),
    responses(
        (status = 204, description = "部署を削除した"),
        (status = 404, description = "部署が存在しない", body = crate::api::ApiError)
    )
)]
async fn delete_department(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.store.delete_department(&id) {
        Ok(true) => StatusCode::NO_CONTENT.into_response(),
        Ok(false) => error_response(
            StatusCode::NOT_FOUND,
            &trace_id,
            "not_found",
            &format!("Department '{}' not found", id),
        )
        .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to delete department");
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

pub fn department_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(list_departments))
        .routes(routes!(get_department, update_department, delete_department))
        .routes(routes!(confirm_delete_department))
}
