//! HTTP API: one `AppState`, one `create_router`, handlers annotated
//! with `#[utoipa::path]` and `#[instrument]`, an `ApiDoc` aggregating
//! the OpenAPI spec, and a Redoc page served at `/docs`.
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};
use utoipa::{OpenApi, ToSchema};

use crate::db::{
    Alert, EnvironmentalMonthly, EnvironmentalRepository, FacilityTransfer,
    FacilityTransferRepository, MonthlyParameters, SystemConstant, TransferMethod,
};
use crate::domain::{
    BalanceResult, CalculationPeriod, FacilityStatus, NewStorageFacility, StorageFacility,
};
use crate::error::WaterBalanceError;
use crate::orchestrator::{BalanceOrchestrator, OrchestratorMode};
use crate::services::{ConstantsService, FacilityService, MonthlyParametersService};

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<BalanceOrchestrator>,
    pub facility_service: FacilityService,
    pub constants_service: ConstantsService,
    pub monthly_params_service: MonthlyParametersService,
    pub environmental_repo: EnvironmentalRepository,
    pub transfer_repo: FacilityTransferRepository,
}

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
}

#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct ModeQuery {
    pub mode: Option<OrchestratorMode>,
}

#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct StatusQuery {
    pub status: Option<FacilityStatus>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ResolveAlertRequest {
    pub resolved_by: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SetConstantRequest {
    pub value: f64,
    pub updated_by: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpsertMonthlyParametersRequest {
    pub total_inflows_m3: f64,
    pub total_outflows_m3: f64,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpsertEnvironmentalRequest {
    pub rainfall_mm: f64,
    pub evaporation_mm: f64,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RecordTransferRequest {
    pub source_facility_code: String,
    pub dest_facility_code: String,
    pub year: i32,
    pub month: i32,
    pub volume_m3: f64,
    pub transfer_method: TransferMethod,
    pub notes: Option<String>,
}

pub fn create_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health))
        .route("/facilities", get(list_facilities).post(create_facility))
        .route("/facilities/{code}", get(get_facility))
        .route(
            "/facilities/{code}/monthly-parameters/{year}/{month}",
            get(get_monthly_parameters).put(upsert_monthly_parameters),
        )
        .route(
            "/facilities/{code}/transfers",
            get(list_facility_transfers),
        )
        .route("/transfers", post(record_transfer))
        .route("/balance/{year}/{month}", get(get_balance))
        .route("/balance/{year}/{month}/recompute", post(recompute_balance))
        .route("/alerts", get(list_alerts))
        .route("/alerts/{id}/acknowledge", post(acknowledge_alert))
        .route("/alerts/{id}/resolve", post(resolve_alert))
        .route("/constants", get(list_constants))
        .route("/constants/{key}", put(set_constant))
        .route(
            "/environmental/{year}/{month}",
            get(get_environmental).put(upsert_environmental),
        )
        .with_state(state);

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/api-docs/openapi.json", get(openapi_spec))
        .route("/docs", get(redoc_ui))
}

#[derive(utoipa::OpenApi)]
#[openapi(
    paths(
        health,
        list_facilities,
        get_facility,
        create_facility,
        get_balance,
        recompute_balance,
        list_alerts,
        acknowledge_alert,
        resolve_alert,
        list_constants,
        set_constant,
        get_monthly_parameters,
        upsert_monthly_parameters,
        get_environmental,
        upsert_environmental,
        list_facility_transfers,
        record_transfer,
    ),
    components(
        schemas(
            HealthResponse,
            StorageFacility,
            NewStorageFacility,
            BalanceResult,
            Alert,
            SystemConstant,
            MonthlyParameters,
            EnvironmentalMonthly,
            FacilityTransfer,
            TransferMethod,
            ResolveAlertRequest,
            SetConstantRequest,
            UpsertMonthlyParametersRequest,
            UpsertEnvironmentalRequest,
            RecordTransferRequest,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "facilities", description = "Storage facility inventory"),
        (name = "balance", description = "Monthly water balance computation"),
        (name = "alerts", description = "Threshold alerts"),
        (name = "constants", description = "Tunable system constants"),
        (name = "monthly-parameters", description = "Manual monthly totals"),
        (name = "environmental", description = "Rainfall and evaporation inputs"),
        (name = "transfers", description = "Inter-facility water transfers")
    ),
    info(
        title = "Water Balance Engine API",
        version = "0.1.0",
        description = "API for monthly mine-site water balance computation, alerting and reporting",
        contact(
            name = "Water Balance Engine"
        )
    )
)]
struct ApiDoc;

pub fn generate_openapi_spec() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}

async fn openapi_spec() -> Json<utoipa::openapi::OpenApi> {
    Json(generate_openapi_spec())
}

async fn redoc_ui() -> Html<&'static str> {
    Html(
        r#"<!DOCTYPE html>
<html>
<head>
    <title>Water Balance Engine API Documentation</title>
    <meta charset="utf-8"/>
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <style>
      body {
        margin: 0;
        padding: 0;
      }
    </style>
</head>
<body>
    <redoc spec-url='/api-docs/openapi.json'></redoc>
    <script src="https://cdn.redoc.ly/redoc/latest/bundles/redoc.standalone.js"> </script>
</body>
</html>"#,
    )
}

#[utoipa::path(
    get,
    path = "/api/v1/health",
    tag = "health",
    responses((status = 200, description = "Service is healthy", body = HealthResponse))
)]
#[instrument(skip(_state))]
async fn health(State(_state): State<AppState>) -> impl IntoResponse {
    debug!("health check requested");
    let response = HealthResponse {
        status: "healthy".to_string(),
    };
    (StatusCode::OK, Json(response))
}

#[utoipa::path(
    get,
    path = "/api/v1/facilities",
    tag = "facilities",
    params(StatusQuery),
    responses((status = 200, description = "All storage facilities", body = [StorageFacility]))
)]
#[instrument(skip(state))]
async fn list_facilities(
    State(state): State<AppState>,
    Query(params): Query<StatusQuery>,
) -> Result<Json<Vec<StorageFacility>>, WaterBalanceError> {
    let facilities = match params.status {
        Some(status) => state.facility_service.list_by_status(status).await?,
        None => state.facility_service.get_all().await?,
    };
    Ok(Json(facilities))
}

#[utoipa::path(
    get,
    path = "/api/v1/facilities/{code}",
    tag = "facilities",
    params(("code" = String, Path, description = "Facility code")),
    responses(
        (status = 200, description = "Facility found", body = StorageFacility),
        (status = 404, description = "Facility not found")
    )
)]
#[instrument(skip(state), fields(%code))]
async fn get_facility(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<StorageFacility>, WaterBalanceError> {
    let facility = state.facility_service.get_by_code(&code).await?;
    Ok(Json(facility))
}

#[utoipa::path(
    post,
    path = "/api/v1/facilities",
    tag = "facilities",
    request_body = NewStorageFacility,
    responses(
        (status = 201, description = "Facility created", body = StorageFacility),
        (status = 409, description = "Facility code already in use"),
        (status = 422, description = "Invalid facility fields")
    )
)]
#[instrument(skip(state, body), fields(code = %body.code))]
async fn create_facility(
    State(state): State<AppState>,
    Json(body): Json<NewStorageFacility>,
) -> Result<(StatusCode, Json<StorageFacility>), WaterBalanceError> {
    let created = state.facility_service.create(body).await?;
    info!(code = %created.code, "facility created");
    Ok((StatusCode::CREATED, Json(created)))
}

#[utoipa::path(
    get,
    path = "/api/v1/balance/{year}/{month}",
    tag = "balance",
    params(
        ("year" = i32, Path, description = "Calendar year"),
        ("month" = u32, Path, description = "Calendar month, 1-12"),
        ModeQuery,
    ),
    responses(
        (status = 200, description = "Computed water balance for the period", body = BalanceResult),
        (status = 422, description = "Invalid year or month")
    )
)]
#[instrument(skip(state), fields(%year, %month))]
async fn get_balance(
    State(state): State<AppState>,
    Path((year, month)): Path<(i32, u32)>,
    Query(params): Query<ModeQuery>,
) -> Result<Json<BalanceResult>, WaterBalanceError> {
    let period = CalculationPeriod::new(year, month)?;
    let mode = params.mode.unwrap_or(OrchestratorMode::Regulator);
    let result = state.orchestrator.view(period, mode).await?;
    Ok(Json(result))
}

#[utoipa::path(
    post,
    path = "/api/v1/balance/{year}/{month}/recompute",
    tag = "balance",
    params(
        ("year" = i32, Path, description = "Calendar year"),
        ("month" = u32, Path, description = "Calendar month, 1-12"),
        ModeQuery,
    ),
    responses(
        (status = 200, description = "Recomputed water balance, alerts evaluated and history persisted", body = BalanceResult),
        (status = 422, description = "Invalid year or month")
    )
)]
#[instrument(skip(state), fields(%year, %month))]
async fn recompute_balance(
    State(state): State<AppState>,
    Path((year, month)): Path<(i32, u32)>,
    Query(params): Query<ModeQuery>,
) -> Result<Json<BalanceResult>, WaterBalanceError> {
    let period = CalculationPeriod::new(year, month)?;
    let mode = params.mode.unwrap_or(OrchestratorMode::Regulator);
    let (result, alerts) = state.orchestrator.run(period, mode).await?;
    if !alerts.is_empty() {
        info!(triggered = alerts.len(), "alerts raised by recompute");
    }
    Ok(Json(result))
}

#[utoipa::path(
    get,
    path = "/api/v1/alerts",
    tag = "alerts",
    responses((status = 200, description = "Currently active alerts", body = [Alert]))
)]
#[instrument(skip(state))]
async fn list_alerts(State(state): State<AppState>) -> Result<Json<Vec<Alert>>, WaterBalanceError> {
    let alerts = state.orchestrator.list_active_alerts().await?;
    Ok(Json(alerts))
}

#[utoipa::path(
    post,
    path = "/api/v1/alerts/{id}/acknowledge",
    tag = "alerts",
    params(("id" = i64, Path, description = "Alert id")),
    responses((status = 204, description = "Alert acknowledged"))
)]
#[instrument(skip(state))]
async fn acknowledge_alert(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, WaterBalanceError> {
    state.orchestrator.acknowledge_alert(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/api/v1/alerts/{id}/resolve",
    tag = "alerts",
    params(("id" = i64, Path, description = "Alert id")),
    request_body = ResolveAlertRequest,
    responses((status = 204, description = "Alert resolved"))
)]
#[instrument(skip(state, body))]
async fn resolve_alert(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<ResolveAlertRequest>,
) -> Result<StatusCode, WaterBalanceError> {
    state
        .orchestrator
        .resolve_alert(id, &body.resolved_by)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/api/v1/constants",
    tag = "constants",
    responses((status = 200, description = "All tunable constants", body = [SystemConstant]))
)]
#[instrument(skip(state))]
async fn list_constants(
    State(state): State<AppState>,
) -> Result<Json<Vec<SystemConstant>>, WaterBalanceError> {
    Ok(Json(state.constants_service.get_all().await?))
}

#[utoipa::path(
    put,
    path = "/api/v1/constants/{key}",
    tag = "constants",
    params(("key" = String, Path, description = "Constant key")),
    request_body = SetConstantRequest,
    responses(
        (status = 200, description = "Constant updated", body = SystemConstant),
        (status = 422, description = "Value outside min/max bounds")
    )
)]
#[instrument(skip(state, body), fields(%key))]
async fn set_constant(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Json(body): Json<SetConstantRequest>,
) -> Result<Json<SystemConstant>, WaterBalanceError> {
    let updated = state
        .constants_service
        .set(&key, body.value, body.updated_by.as_deref())
        .await?;
    Ok(Json(updated))
}

#[utoipa::path(
    get,
    path = "/api/v1/facilities/{code}/monthly-parameters/{year}/{month}",
    tag = "monthly-parameters",
    params(
        ("code" = String, Path, description = "Facility code"),
        ("year" = i32, Path, description = "Calendar year"),
        ("month" = i32, Path, description = "Calendar month, 1-12"),
    ),
    responses(
        (status = 200, description = "Manually recorded monthly totals", body = MonthlyParameters),
        (status = 404, description = "No monthly parameters recorded for this period")
    )
)]
#[instrument(skip(state), fields(%code, %year, %month))]
async fn get_monthly_parameters(
    State(state): State<AppState>,
    Path((code, year, month)): Path<(String, i32, i32)>,
) -> Result<Json<MonthlyParameters>, WaterBalanceError> {
    let facility = state.facility_service.get_by_code(&code).await?;
    let params = state
        .monthly_params_service
        .get_by_period(facility.id, year, month)
        .await?
        .ok_or_else(|| {
            WaterBalanceError::NotFound(format!("monthly parameters for {code} {year}-{month:02}"))
        })?;
    Ok(Json(params))
}

#[utoipa::path(
    put,
    path = "/api/v1/facilities/{code}/monthly-parameters/{year}/{month}",
    tag = "monthly-parameters",
    params(
        ("code" = String, Path, description = "Facility code"),
        ("year" = i32, Path, description = "Calendar year"),
        ("month" = i32, Path, description = "Calendar month, 1-12"),
    ),
    request_body = UpsertMonthlyParametersRequest,
    responses((status = 200, description = "Monthly totals recorded", body = MonthlyParameters))
)]
#[instrument(skip(state, body), fields(%code, %year, %month))]
async fn upsert_monthly_parameters(
    State(state): State<AppState>,
    Path((code, year, month)): Path<(String, i32, i32)>,
    Json(body): Json<UpsertMonthlyParametersRequest>,
) -> Result<Json<MonthlyParameters>, WaterBalanceError> {
    let facility = state.facility_service.get_by_code(&code).await?;
    let params = state
        .monthly_params_service
        .upsert(
            facility.id,
            year,
            month,
            body.total_inflows_m3,
            body.total_outflows_m3,
        )
        .await?;
    Ok(Json(params))
}

#[utoipa::path(
    get,
    path = "/api/v1/environmental/{year}/{month}",
    tag = "environmental",
    params(
        ("year" = i32, Path, description = "Calendar year"),
        ("month" = i32, Path, description = "Calendar month, 1-12"),
    ),
    responses(
        (status = 200, description = "Recorded rainfall and evaporation", body = EnvironmentalMonthly),
        (status = 404, description = "No environmental data recorded for this period")
    )
)]
#[instrument(skip(state), fields(%year, %month))]
async fn get_environmental(
    State(state): State<AppState>,
    Path((year, month)): Path<(i32, i32)>,
) -> Result<Json<EnvironmentalMonthly>, WaterBalanceError> {
    let row = state
        .environmental_repo
        .get(year, month)
        .await?
        .ok_or_else(|| WaterBalanceError::NotFound(format!("environmental data for {year}-{month:02}")))?;
    Ok(Json(row))
}

#[utoipa::path(
    put,
    path = "/api/v1/environmental/{year}/{month}",
    tag = "environmental",
    params(
        ("year" = i32, Path, description = "Calendar year"),
        ("month" = i32, Path, description = "Calendar month, 1-12"),
    ),
    request_body = UpsertEnvironmentalRequest,
    responses((status = 200, description = "Environmental data recorded", body = EnvironmentalMonthly))
)]
#[instrument(skip(state, body), fields(%year, %month))]
async fn upsert_environmental(
    State(state): State<AppState>,
    Path((year, month)): Path<(i32, i32)>,
    Json(body): Json<UpsertEnvironmentalRequest>,
) -> Result<Json<EnvironmentalMonthly>, WaterBalanceError> {
    let row = state
        .environmental_repo
        .upsert(year, month, body.rainfall_mm, body.evaporation_mm)
        .await?;
    Ok(Json(row))
}

#[utoipa::path(
    get,
    path = "/api/v1/facilities/{code}/transfers",
    tag = "transfers",
    params(("code" = String, Path, description = "Facility code")),
    responses((status = 200, description = "Transfers touching this facility as source or destination", body = [FacilityTransfer]))
)]
#[instrument(skip(state), fields(%code))]
async fn list_facility_transfers(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<Vec<FacilityTransfer>>, WaterBalanceError> {
    let transfers = state.transfer_repo.list_for_facility(&code).await?;
    Ok(Json(transfers))
}

#[utoipa::path(
    post,
    path = "/api/v1/transfers",
    tag = "transfers",
    request_body = RecordTransferRequest,
    responses(
        (status = 201, description = "Transfer recorded", body = FacilityTransfer),
        (status = 422, description = "Source and destination facility match, or volume is not positive")
    )
)]
#[instrument(skip(state, body), fields(source = %body.source_facility_code, dest = %body.dest_facility_code))]
async fn record_transfer(
    State(state): State<AppState>,
    Json(body): Json<RecordTransferRequest>,
) -> Result<(StatusCode, Json<FacilityTransfer>), WaterBalanceError> {
    if body.source_facility_code == body.dest_facility_code {
        return Err(WaterBalanceError::InvariantViolation(
            "source and destination facility must differ".to_string(),
        ));
    }
    if body.volume_m3 <= 0.0 {
        return Err(WaterBalanceError::InvariantViolation(
            "transfer volume must be positive".to_string(),
        ));
    }
    let transfer = state
        .transfer_repo
        .record(
            &body.source_facility_code,
            &body.dest_facility_code,
            body.year,
            body.month,
            body.volume_m3,
            body.transfer_method,
            body.notes.as_deref(),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(transfer)))
}
