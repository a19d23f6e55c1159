use axum::{
    Router,
    extract::{Json, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::Datelike;
use log::info;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tokio::net::TcpListener;

use crate::core::{
    AggregatorConfig, BasketMetrics, Cadence, ContributionSchedule, FundHolding, Goal,
    GoalResult, GoalSolveConfig, ProjectionResult, ProjectionYear, StepUp, WeightedAsset,
    apply_edit, basket_metrics, equal_split, is_valid, project, project_lumpsum, project_yearly,
    remaining_percent, solve_with,
};

mod cli;

pub use cli::{Cli, Command, run};

const DEFAULT_SIP_AMOUNT: f64 = 5_000.0;
const DEFAULT_LUMPSUM_AMOUNT: f64 = 100_000.0;
const DEFAULT_YEARS: f64 = 10.0;
const DEFAULT_RETURN_PCT: f64 = 12.0;
const DEFAULT_INFLATION_PCT: f64 = 6.0;
const DEFAULT_GOAL_HORIZON_YEARS: i32 = 10;

/// Engine tunables shared by every handler.
#[derive(Debug, Clone, Copy, Default)]
pub struct AppState {
    pub solver: GoalSolveConfig,
    pub aggregator: AggregatorConfig,
}

/// SIP calculator inputs. Rates arrive in percent, as the storefront sliders show them.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub(crate) struct SipPayload {
    pub amount: Option<f64>,
    pub frequency: Option<u32>,
    pub years: Option<f64>,
    pub return_pct: Option<f64>,
    pub step_up_amount: Option<f64>,
    pub step_up_pct: Option<f64>,
    pub include_yearly: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub(crate) struct LumpsumPayload {
    pub amount: Option<f64>,
    pub years: Option<f64>,
    pub return_pct: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub(crate) struct GoalPayload {
    pub target_year: Option<i32>,
    pub current_year: Option<i32>,
    pub current_cost: Option<f64>,
    pub inflation_pct: Option<f64>,
    pub return_pct: Option<f64>,
    pub step_up_pct: Option<f64>,
    pub lumpsum: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub(crate) struct BasketMetricsPayload {
    pub funds: Vec<FundHolding>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SplitPayload {
    pub funds: usize,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct EditPayload {
    pub weights: Vec<u32>,
    pub index: usize,
    pub value: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SipResponse {
    pub frequency: Cadence,
    #[serde(flatten)]
    pub projection: ProjectionResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub yearly: Option<Vec<ProjectionYear>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GoalResponse {
    pub current_year: i32,
    pub target_year: i32,
    #[serde(flatten)]
    pub result: GoalResult,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SplitResponse {
    pub weights: Vec<u32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct EditResponse {
    pub weights: Vec<u32>,
    pub valid: bool,
    pub remaining_percent: f64,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

pub async fn run_http_server(addr: SocketAddr, state: AppState) -> std::io::Result<()> {
    let app = router(state);

    let listener = TcpListener::bind(addr).await?;
    info!("basket calculator API listening on http://{addr}");

    axum::serve(listener, app).await
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(health_handler))
        .route("/api/sip", get(sip_get_handler).post(sip_post_handler))
        .route(
            "/api/lumpsum",
            get(lumpsum_get_handler).post(lumpsum_post_handler),
        )
        .route("/api/goal", get(goal_get_handler).post(goal_post_handler))
        .route("/api/basket/metrics", post(basket_metrics_handler))
        .route("/api/basket/split", get(split_handler))
        .route("/api/basket/edit", post(edit_handler))
        .fallback(not_found_handler)
        .with_state(state)
}

async fn health_handler() -> Response {
    with_cache_control("ok")
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn sip_get_handler(Query(payload): Query<SipPayload>) -> Response {
    respond(sip_response_from_payload(payload))
}

async fn sip_post_handler(Json(payload): Json<SipPayload>) -> Response {
    respond(sip_response_from_payload(payload))
}

async fn lumpsum_get_handler(Query(payload): Query<LumpsumPayload>) -> Response {
    respond(lumpsum_response_from_payload(payload))
}

async fn lumpsum_post_handler(Json(payload): Json<LumpsumPayload>) -> Response {
    respond(lumpsum_response_from_payload(payload))
}

async fn goal_get_handler(
    State(state): State<AppState>,
    Query(payload): Query<GoalPayload>,
) -> Response {
    respond(goal_response_from_payload(payload, &state.solver))
}

async fn goal_post_handler(
    State(state): State<AppState>,
    Json(payload): Json<GoalPayload>,
) -> Response {
    respond(goal_response_from_payload(payload, &state.solver))
}

async fn basket_metrics_handler(
    State(state): State<AppState>,
    Json(payload): Json<BasketMetricsPayload>,
) -> Response {
    respond(basket_metrics_from_payload(payload, &state.aggregator))
}

async fn split_handler(Query(payload): Query<SplitPayload>) -> Response {
    respond(split_response_from_payload(payload))
}

async fn edit_handler(Json(payload): Json<EditPayload>) -> Response {
    respond(edit_response_from_payload(payload))
}

fn respond<T: Serialize>(result: Result<T, String>) -> Response {
    match result {
        Ok(body) => json_response(StatusCode::OK, body),
        Err(msg) => error_response(StatusCode::BAD_REQUEST, &msg),
    }
}

fn with_cache_control<R: IntoResponse>(response: R) -> Response {
    let mut response = response.into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        header::HeaderValue::from_static("no-store"),
    );
    response
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    with_cache_control((status, Json(body)))
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}

fn ratio_from_pct(name: &str, pct: f64) -> Result<f64, String> {
    if !pct.is_finite() {
        return Err(format!("{name} must be a finite percentage"));
    }
    Ok(pct / 100.0)
}

pub(crate) fn sip_response_from_payload(payload: SipPayload) -> Result<SipResponse, String> {
    let frequency = match payload.frequency {
        Some(v) => Cadence::try_from(v).map_err(|e| e.to_string())?,
        None => Cadence::Monthly,
    };
    let step_up = match (payload.step_up_amount, payload.step_up_pct) {
        (Some(_), Some(_)) => {
            return Err("stepUpAmount and stepUpPct cannot both be set".to_string());
        }
        (Some(amount), None) => Some(StepUp::Amount(amount)),
        (None, Some(pct)) => Some(StepUp::Percent(ratio_from_pct("stepUpPct", pct)?)),
        (None, None) => None,
    };
    let schedule = ContributionSchedule {
        base_amount: payload.amount.unwrap_or(DEFAULT_SIP_AMOUNT),
        periods_per_year: frequency,
        years: payload.years.unwrap_or(DEFAULT_YEARS),
        step_up,
    };
    let annual_rate = ratio_from_pct(
        "returnPct",
        payload.return_pct.unwrap_or(DEFAULT_RETURN_PCT),
    )?;

    let projection = project(&schedule, annual_rate).map_err(|e| e.to_string())?;
    let yearly = if payload.include_yearly.unwrap_or(false) {
        Some(project_yearly(&schedule, annual_rate).map_err(|e| e.to_string())?)
    } else {
        None
    };

    Ok(SipResponse {
        frequency,
        projection,
        yearly,
    })
}

pub(crate) fn lumpsum_response_from_payload(
    payload: LumpsumPayload,
) -> Result<ProjectionResult, String> {
    let annual_rate = ratio_from_pct(
        "returnPct",
        payload.return_pct.unwrap_or(DEFAULT_RETURN_PCT),
    )?;
    project_lumpsum(
        payload.amount.unwrap_or(DEFAULT_LUMPSUM_AMOUNT),
        annual_rate,
        payload.years.unwrap_or(DEFAULT_YEARS),
    )
    .map_err(|e| e.to_string())
}

pub(crate) fn goal_response_from_payload(
    payload: GoalPayload,
    config: &GoalSolveConfig,
) -> Result<GoalResponse, String> {
    let current_year = payload
        .current_year
        .unwrap_or_else(|| chrono::Local::now().year());
    let target_year = match payload.target_year {
        Some(year) => year,
        None => current_year
            .checked_add(DEFAULT_GOAL_HORIZON_YEARS)
            .ok_or_else(|| "currentYear out of range".to_string())?,
    };
    let Some(current_cost) = payload.current_cost else {
        return Err("currentCost is required".to_string());
    };

    let goal = Goal {
        target_year,
        current_cost,
        inflation_rate: ratio_from_pct(
            "inflationPct",
            payload.inflation_pct.unwrap_or(DEFAULT_INFLATION_PCT),
        )?,
        expected_return: ratio_from_pct(
            "returnPct",
            payload.return_pct.unwrap_or(DEFAULT_RETURN_PCT),
        )?,
        contribution_step_up: ratio_from_pct("stepUpPct", payload.step_up_pct.unwrap_or(0.0))?,
        lumpsum_today: payload.lumpsum.unwrap_or(0.0),
    };

    let result = solve_with(&goal, current_year, config).map_err(|e| e.to_string())?;
    Ok(GoalResponse {
        current_year,
        target_year,
        result,
    })
}

pub(crate) fn basket_metrics_from_payload(
    payload: BasketMetricsPayload,
    config: &AggregatorConfig,
) -> Result<BasketMetrics, String> {
    basket_metrics(&payload.funds, config).map_err(|e| e.to_string())
}

pub(crate) fn split_response_from_payload(payload: SplitPayload) -> Result<SplitResponse, String> {
    let weights = equal_split(payload.funds).map_err(|e| e.to_string())?;
    Ok(SplitResponse { weights })
}

pub(crate) fn edit_response_from_payload(payload: EditPayload) -> Result<EditResponse, String> {
    let weights =
        apply_edit(&payload.weights, payload.index, payload.value).map_err(|e| e.to_string())?;
    let as_percents: Vec<f64> = weights.iter().map(|&w| w as f64).collect();
    let assets: Vec<WeightedAsset> = as_percents
        .iter()
        .map(|&weight| WeightedAsset::new(0.0, weight))
        .collect();

    Ok(EditResponse {
        valid: is_valid(&assets),
        remaining_percent: remaining_percent(&as_percents),
        weights,
    })
}
