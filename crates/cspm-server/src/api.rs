pub mod accounts;
pub mod dashboard;
pub mod departments;
pub mod groups;

use crate::forms::FieldErrors;
use crate::logging::TraceId;
use crate::state::AppState;
use axum::extract::{Extension, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use utoipa::ToSchema;
use utoipa_axum::{router::OpenApiRouter, routes};

/// API エラーレスポンス
#[derive(Serialize, ToSchema)]
pub struct ApiError {
    /// エラーコード
    pub err_code: i32,
    /// エラーメッセージ
    pub err_msg: String,
    /// トレース ID
    pub trace_id: String,
}

/// API 統一レスポンス
#[derive(Serialize)]
pub struct ApiResponse<T>
where
    T: Serialize,
{
    /// エラーコード（成功時は 0）
    pub err_code: i32,
    /// エラーメッセージ（成功時は success）
    pub err_msg: String,
    /// トレース ID
    pub trace_id: String,
    /// ペイロード
    pub data: Option<T>,
}

pub fn success_response<T>(status: StatusCode, trace_id: &str, data: T) -> Response
where
    T: Serialize,
{
    (
        status,
        Json(ApiResponse {
            err_code: 0,
            err_msg: "success".to_string(),
            trace_id: trace_id.to_string(),
            data: Some(data),
        }),
    )
        .into_response()
}

fn to_custom_error_code(code: &str) -> i32 {
    match code {
        "bad_request" => 1001,
        "not_found" => 1004,
        "conflict" => 1005,
        "validation_error" => 1006,
        "internal_error" => 1500,
        "storage_error" => 1501,
        _ => 1999,
    }
}

pub fn error_response(status: StatusCode, trace_id: &str, code: &str, msg: &str) -> Response {
    (
        status,
        Json(ApiResponse::<Value> {
            err_code: to_custom_error_code(code),
            err_msg: msg.to_string(),
            trace_id: trace_id.to_string(),
            data: None,
        }),
    )
        .into_response()
}

/// 400 with the field → message map in `data`, so the submitter can
/// re-render the form with per-field errors and the entered values.
pub fn validation_error_response(trace_id: &str, fields: FieldErrors) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ApiResponse {
            err_code: to_custom_error_code("validation_error"),
            err_msg: "Validation failed".to_string(),
            trace_id: trace_id.to_string(),
            data: Some(fields),
        }),
    )
        .into_response()
}

/// ヘルスチェックレスポンス
#[derive(Serialize, ToSchema)]
struct HealthResponse {
    /// サービスバージョン
    version: String,
    /// 稼働時間（秒）
    uptime_secs: i64,
    /// 登録済み部署数
    department_count: u64,
    /// 登録済みアカウント数
    account_count: u64,
    /// ストレージ状態
    storage_status: String,
}

/// サービスの稼働状態を返す。
#[utoipa::path(
    get,
    path = "/v1/health",
    tag = "Health",
    responses(
        (status = 200, description = "稼働状態", body = HealthResponse)
    )
)]
async fn health(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let uptime = (Utc::now() - state.start_time).num_seconds();
    let (department_count, account_count, storage_status) =
        match (state.store.count_departments(), state.store.count_accounts()) {
            (Ok(d), Ok(a)) => (d, a, "ok".to_string()),
            (d, a) => {
                tracing::error!("Health check failed to count entities");
                (
                    d.unwrap_or(0),
                    a.unwrap_or(0),
                    "degraded".to_string(),
                )
            }
        };
    success_response(
        StatusCode::OK,
        &trace_id,
        HealthResponse {
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_secs: uptime,
            department_count,
            account_count,
            storage_status,
        },
    )
}

pub fn routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(health))
        .merge(dashboard::dashboard_routes())
        .merge(accounts::account_routes())
        .merge(groups::group_routes())
        .merge(departments::department_routes())
}
