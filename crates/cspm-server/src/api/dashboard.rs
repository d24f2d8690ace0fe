use crate::api::{error_response, success_response, validation_error_response};
use crate::forms::{FieldErrors, MSG_BAD_DATE};
use crate::logging::TraceId;
use crate::state::AppState;
use axum::extract::{Extension, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use chrono::NaiveDate;
use cspm_storage::InventoryStore;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use utoipa_axum::{router::OpenApiRouter, routes};

const ATTENTION_LIMIT: usize = 5;
const RANKING_LIMIT: usize = 5;

/// ダッシュボード集計期間
#[derive(Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
struct DashboardParams {
    /// 期間開始日（YYYY-MM-DD、end とセットで指定）
    #[param(required = false)]
    start: Option<String>,
    /// 期間終了日（YYYY-MM-DD、start とセットで指定）
    #[param(required = false)]
    end: Option<String>,
}

/// プロバイダ別アカウント数
#[derive(Serialize, ToSchema)]
struct ProviderCountResponse {
    provider: String,
    count: u64,
}

/// 月別接続数（month は YYYY-MM）
#[derive(Serialize, ToSchema)]
struct MonthlyCountResponse {
    month: String,
    count: u64,
}

/// 要対応アカウント（未接続・解除済み）
#[derive(Serialize, ToSchema)]
struct AttentionAccount {
    id: String,
    name: String,
    provider: String,
    account_id: String,
    status: String,
    request_date: Option<String>,
}

/// 部署ランキングの一項目
#[derive(Serialize, ToSchema)]
struct DepartmentRankResponse {
    id: String,
    name: String,
    account_count: u64,
}

/// ダッシュボード概要
#[derive(Serialize, ToSchema)]
struct DashboardOverview {
    /// 部署総数（マスタ件数、期間フィルタ対象外）
    total_departments: u64,
    /// 監視グループ総数（マスタ件数、期間フィルタ対象外）
    total_groups: u64,
    /// アカウント数（期間指定時は依頼日でフィルタ）
    total_accounts: u64,
    /// 接続済みアカウント数（同上）
    connected_accounts: u64,
    /// プロバイダ別内訳
    provider_counts: Vec<ProviderCountResponse>,
    /// 月別接続推移（接続日ベース、昇順）
    monthly_trend: Vec<MonthlyCountResponse>,
    /// 要対応アカウント（最大 5 件）
    attention_accounts: Vec<AttentionAccount>,
    /// アカウント数上位部署（最大 5 件、0 件の部署は含まない）
    department_ranking: Vec<DepartmentRankResponse>,
    /// エコーバック: 指定された開始日
    start: Option<String>,
    /// エコーバック: 指定された終了日
    end: Option<String>,
    /// 期間フィルタが適用されたかどうか
    filtered: bool,
}

/// ダッシュボード概要を取得する。
/// `start` と `end` が両方指定された場合のみ期間フィルタを適用する。
#[utoipa::path(
    get,
    path = "/v1/dashboard/overview",
    tag = "Dashboard",
    params(DashboardParams),
    responses(
        (status = 200, description = "ダッシュボード概要", body = DashboardOverview),
        (status = 400, description = "日付形式が不正", body = crate::api::ApiError)
    )
)]
async fn dashboard_overview(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Query(params): Query<DashboardParams>,
) -> impl IntoResponse {
    let mut errors = FieldErrors::new();
    let start = parse_param(&mut errors, "start", params.start.as_deref());
    let end = parse_param(&mut errors, "end", params.end.as_deref());
    if !errors.is_empty() {
        return validation_error_response(&trace_id, errors).into_response();
    }

    // Filtering requires both bounds; one alone is echoed back but unused.
    let range = match (start, end) {
        (Some(start), Some(end)) => Some((start, end)),
        _ => None,
    };

    match build_overview(&state.store, range, params.start, params.end) {
        Ok(overview) => success_response(StatusCode::OK, &trace_id, overview),
        Err(e) => {
            tracing::error!(error = %e, "Failed to build dashboard overview");
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

fn parse_param(errors: &mut FieldErrors, field: &str, value: Option<&str>) -> Option<NaiveDate> {
    let raw = value.map(str::trim).filter(|v| !v.is_empty())?;
    match NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        Ok(d) => Some(d),
        Err(_) => {
            errors.insert(field.to_string(), MSG_BAD_DATE.to_string());
            None
        }
    }
}

fn build_overview(
    store: &InventoryStore,
    range: Option<(NaiveDate, NaiveDate)>,
    start: Option<String>,
    end: Option<String>,
) -> anyhow::Result<DashboardOverview> {
    let total_departments = store.count_departments()?;
    let total_groups = store.count_groups()?;
    let total_accounts = store.count_accounts_in_range(range)?;
    let connected_accounts = store.count_connected_in_range(range)?;

    let provider_counts = store
        .provider_counts(range)?
        .into_iter()
        .map(|c| ProviderCountResponse {
            provider: c.provider.to_string(),
            count: c.count,
        })
        .collect();

    let monthly_trend = store
        .monthly_connection_trend(range)?
        .into_iter()
        .map(|b| MonthlyCountResponse {
            month: b.month,
            count: b.count,
        })
        .collect();

    let attention_accounts = store
        .attention_accounts(range, ATTENTION_LIMIT)?
        .into_iter()
        .map(|a| AttentionAccount {
            id: a.id,
            name: a.name,
            provider: a.provider.to_string(),
            account_id: a.account_id,
            status: a.status.to_string(),
            request_date: a.request_date.map(|d| d.to_string()),
        })
        .collect();

    let department_ranking = store
        .department_ranking(range, RANKING_LIMIT)?
        .into_iter()
        .map(|r| DepartmentRankResponse {
            id: r.id,
            name: r.name,
            account_count: r.account_count,
        })
        .collect();

    Ok(DashboardOverview {
        total_departments,
        total_groups,
        total_accounts,
        connected_accounts,
        provider_counts,
        monthly_trend,
        attention_accounts,
        department_ranking,
        filtered: range.is_some(),
        start,
        end,
    })
}

pub fn dashboard_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new().routes(routes!(dashboard_overview))
}
