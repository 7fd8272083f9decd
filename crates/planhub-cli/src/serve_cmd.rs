use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::body::Bytes;
use axum::extract::{FromRequestParts, Path, State};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, patch, put};
use axum::{Json, Router};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use planhub_core::auth::{self, AuthContext};
use planhub_core::plan::{self, CreationPolicy, PlanDirs};
use planhub_core::token::TokenConfig;
use planhub_core::{ErrorKind, PlanError};
use planhub_db::models::{Plan, PlanStatus};

use crate::config::ServerSettings;

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub tokens: Arc<TokenConfig>,
    pub policy: CreationPolicy,
    pub dirs: PlanDirs,
}

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

pub struct AppError(PlanError);

impl From<PlanError> for AppError {
    fn from(err: PlanError) -> Self {
        Self(err)
    }
}

fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
        ErrorKind::Forbidden | ErrorKind::TrialPlansExceeded => StatusCode::FORBIDDEN,
        ErrorKind::BadRequest => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Conflict | ErrorKind::NameSpaceExhausted => StatusCode::CONFLICT,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let kind = self.0.kind();
        let message = match &self.0 {
            PlanError::Internal(e) => format!("{e:#}"),
            other => other.to_string(),
        };
        if !kind.is_client_error() {
            tracing::error!(error = %message, "request failed");
        }

        let mut body = serde_json::json!({
            "error": message,
            "type": kind.as_str(),
        });
        if let PlanError::TrialPlansExceeded { max_plans } = self.0 {
            body["trial_plans_exceeded"] = serde_json::json!({ "max_plans": max_plans });
        }
        (status_for(kind), Json(body)).into_response()
    }
}

// ---------------------------------------------------------------------------
// Authentication
// ---------------------------------------------------------------------------

/// The caller, authenticated from the `Authorization` header.
pub struct Authenticated(pub AuthContext);

impl FromRequestParts<AppState> for Authenticated {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, AppError> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .map(|v| v.to_str())
            .transpose()
            .map_err(|_| PlanError::unauthorized("authorization header is not valid ASCII"))?;
        let ctx = auth::authenticate(&state.pool, &state.tokens, header).await?;
        Ok(Self(ctx))
    }
}

// ---------------------------------------------------------------------------
// Path IDs
// ---------------------------------------------------------------------------

/// A UUID taken from the single `{..._id}` path segment. Malformed IDs are
/// reported as a JSON `bad_request` rather than axum's plain-text rejection.
pub struct PathId(pub Uuid);

impl<S: Send + Sync> FromRequestParts<S> for PathId {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, AppError> {
        let Path(raw) = Path::<String>::from_request_parts(parts, state)
            .await
            .map_err(|e| PlanError::bad_request(e.body_text()))?;
        let id = Uuid::parse_str(&raw)
            .map_err(|_| PlanError::bad_request(format!("invalid id {raw:?}")))?;
        Ok(Self(id))
    }
}

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
pub struct CreatePlanRequest {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreatePlanResponse {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct SetStatusRequest {
    pub status: PlanStatus,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeletePlansResponse {
    pub deleted: Vec<Uuid>,
}

/// Parse a JSON body. An empty body is read as `T::default()`.
fn parse_body<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T, PlanError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| PlanError::bad_request(format!("invalid request body: {e}")))
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(
            "/projects/{project_id}/plans",
            get(list_plans).post(create_plan).delete(delete_owner_plans),
        )
        .route("/projects/{project_id}/plans/archive", get(list_archived_plans))
        .route("/projects/{project_id}/plans/running", get(list_running_plans))
        .route("/plans/{plan_id}", get(get_plan).delete(delete_plan))
        .route("/plans/{plan_id}/archive", patch(archive_plan))
        .route("/plans/{plan_id}/unarchive", patch(unarchive_plan))
        .route("/plans/{plan_id}/status", put(set_plan_status))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub async fn run_serve(
    pool: PgPool,
    tokens: TokenConfig,
    settings: &ServerSettings,
) -> Result<()> {
    tokio::fs::create_dir_all(&settings.plans_dir)
        .await
        .with_context(|| {
            format!(
                "failed to create plans directory {}",
                settings.plans_dir.display()
            )
        })?;

    let state = AppState {
        pool,
        tokens: Arc::new(tokens),
        policy: settings.policy,
        dirs: PlanDirs::new(&settings.plans_dir),
    };
    let app = build_router(state);

    let addr: SocketAddr = format!("{}:{}", settings.bind, settings.port)
        .parse()
        .with_context(|| format!("invalid bind address {}:{}", settings.bind, settings.port))?;
    tracing::info!(
        cloud_mode = settings.policy.cloud_mode,
        plans_dir = %settings.plans_dir.display(),
        "planhub serve listening on http://{addr}"
    );
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("planhub serve shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn create_plan(
    State(state): State<AppState>,
    Authenticated(auth): Authenticated,
    PathId(project_id): PathId,
    body: Bytes,
) -> Result<(StatusCode, Json<CreatePlanResponse>), AppError> {
    let project =
        plan::authorize_plan_creation(&state.pool, &auth, &state.policy, project_id).await?;
    let request: CreatePlanRequest = parse_body(&body)?;

    let created =
        plan::create_plan(&state.pool, &state.dirs, &auth, &project, &request.name).await?;

    Ok((
        StatusCode::CREATED,
        Json(CreatePlanResponse {
            id: created.id,
            name: created.name,
        }),
    ))
}

async fn list_plans(
    State(state): State<AppState>,
    Authenticated(auth): Authenticated,
    PathId(project_id): PathId,
) -> Result<Json<Vec<Plan>>, AppError> {
    Ok(Json(plan::list_plans(&state.pool, &auth, project_id).await?))
}

async fn list_archived_plans(
    State(state): State<AppState>,
    Authenticated(auth): Authenticated,
    PathId(project_id): PathId,
) -> Result<Json<Vec<Plan>>, AppError> {
    Ok(Json(
        plan::list_archived_plans(&state.pool, &auth, project_id).await?,
    ))
}

async fn list_running_plans(
    State(state): State<AppState>,
    Authenticated(auth): Authenticated,
    PathId(project_id): PathId,
) -> Result<Json<Vec<Plan>>, AppError> {
    Ok(Json(
        plan::list_running_plans(&state.pool, &auth, project_id).await?,
    ))
}

async fn delete_owner_plans(
    State(state): State<AppState>,
    Authenticated(auth): Authenticated,
    PathId(project_id): PathId,
) -> Result<Json<DeletePlansResponse>, AppError> {
    let deleted = plan::delete_owner_plans(&state.pool, &state.dirs, &auth, project_id).await?;
    Ok(Json(DeletePlansResponse { deleted }))
}

async fn get_plan(
    State(state): State<AppState>,
    Authenticated(auth): Authenticated,
    PathId(plan_id): PathId,
) -> Result<Json<Plan>, AppError> {
    Ok(Json(plan::get_plan(&state.pool, &auth, plan_id).await?))
}

async fn delete_plan(
    State(state): State<AppState>,
    Authenticated(auth): Authenticated,
    PathId(plan_id): PathId,
) -> Result<StatusCode, AppError> {
    plan::delete_plan(&state.pool, &state.dirs, &auth, plan_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn archive_plan(
    State(state): State<AppState>,
    Authenticated(auth): Authenticated,
    PathId(plan_id): PathId,
) -> Result<Json<Plan>, AppError> {
    Ok(Json(
        plan::set_archived(&state.pool, &auth, plan_id, true).await?,
    ))
}

async fn unarchive_plan(
    State(state): State<AppState>,
    Authenticated(auth): Authenticated,
    PathId(plan_id): PathId,
) -> Result<Json<Plan>, AppError> {
    Ok(Json(
        plan::set_archived(&state.pool, &auth, plan_id, false).await?,
    ))
}

async fn set_plan_status(
    State(state): State<AppState>,
    Authenticated(auth): Authenticated,
    PathId(plan_id): PathId,
    body: Bytes,
) -> Result<Json<Plan>, AppError> {
    plan::authorize_manage(&state.pool, &auth, plan_id).await?;
    let request: SetStatusRequest = serde_json::from_slice(&body)
        .map_err(|e| PlanError::bad_request(format!("invalid request body: {e}")))?;
    Ok(Json(
        plan::set_status(&state.pool, &auth, plan_id, request.status).await?,
    ))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
