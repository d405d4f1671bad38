//! FinOps engine server
//!
//! Wires configuration, the database pool, the cloud client factory and
//! the scheduler together, then serves the HTTP surface: health, the
//! workspace list, and per-workspace inventory, recommendations and the
//! latest job run.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use finops_cloud::{ClientFactory, LiveFactory, MockFactory};
use finops_core::model::{JobRun, Recommendation, Resource, Workspace, WorkspaceStatus};
use finops_core::Config;
use finops_db::{DbPool, JobRunRepo, RecommendationRepo, ResourceRepo, WorkspaceRepo};
use finops_engine::{JobRunner, Scheduler};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Seed for the deterministic mock account in mock mode
const MOCK_SEED: u64 = 42;

#[derive(Clone)]
struct AppState {
    pool: DbPool,
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    service: String,
}

#[derive(Deserialize)]
struct CreateWorkspaceRequest {
    name: String,
    role_arn: String,
    aws_account_id: String,
    user_id: String,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: finops_engine::VERSION.to_string(),
        service: "finops-server".to_string(),
    })
}

async fn list_workspaces(
    State(state): State<AppState>,
) -> Result<Json<Vec<Workspace>>, StatusCode> {
    WorkspaceRepo::new(state.pool.clone())
        .list_all()
        .await
        .map(Json)
        .map_err(internal_error)
}

async fn create_workspace(
    State(state): State<AppState>,
    Json(payload): Json<CreateWorkspaceRequest>,
) -> Result<(StatusCode, Json<Workspace>), StatusCode> {
    let now = Utc::now();
    let workspace = Workspace {
        id: uuid::Uuid::new_v4().to_string(),
        name: payload.name,
        role_arn: payload.role_arn,
        aws_account_id: payload.aws_account_id,
        status: WorkspaceStatus::Pending,
        user_id: payload.user_id,
        created_at: now,
        updated_at: now,
    };
    info!("Creating workspace {} ({})", workspace.name, workspace.id);

    WorkspaceRepo::new(state.pool.clone())
        .insert(&workspace)
        .await
        .map_err(internal_error)?;
    Ok((StatusCode::CREATED, Json(workspace)))
}

async fn latest_job_run(
    State(state): State<AppState>,
    Path(workspace_id): Path<String>,
) -> Result<Json<JobRun>, StatusCode> {
    let run = JobRunRepo::new(state.pool.clone())
        .latest(&workspace_id)
        .await
        .map_err(internal_error)?;
    run.map(Json).ok_or(StatusCode::NOT_FOUND)
}

async fn list_recommendations(
    State(state): State<AppState>,
    Path(workspace_id): Path<String>,
) -> Result<Json<Vec<Recommendation>>, StatusCode> {
    RecommendationRepo::new(state.pool.clone())
        .list_for_workspace(&workspace_id)
        .await
        .map(Json)
        .map_err(internal_error)
}

async fn list_resources(
    State(state): State<AppState>,
    Path(workspace_id): Path<String>,
) -> Result<Json<Vec<Resource>>, StatusCode> {
    ResourceRepo::new(state.pool.clone())
        .list_for_workspace(&workspace_id)
        .await
        .map(Json)
        .map_err(internal_error)
}

fn internal_error<E: std::fmt::Display>(err: E) -> StatusCode {
    error!("request failed: {err}");
    StatusCode::INTERNAL_SERVER_ERROR
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting finops-server v{}", finops_engine::VERSION);

    let pool = DbPool::connect(&config.database_url).await?;

    let factory: Arc<dyn ClientFactory> = if config.mock_mode {
        info!("Mock mode enabled, serving the synthetic account");
        Arc::new(MockFactory::new(MOCK_SEED))
    } else {
        Arc::new(LiveFactory::new(config.aws_region.clone()))
    };

    let runner = Arc::new(JobRunner::new(pool.clone(), factory));
    let scheduler = Arc::new(Scheduler::new(
        pool.clone(),
        runner,
        &config.scheduler_cron,
    )?);
    tokio::spawn(scheduler.run());
    info!("Scheduler started with cadence '{}'", config.scheduler_cron);

    let state = AppState { pool };
    let app = Router::new()
        .route("/health", get(health))
        .route("/api/workspaces", get(list_workspaces))
        .route("/api/workspaces", post(create_workspace))
        .route("/api/workspaces/:id/job-runs/latest", get(latest_job_run))
        .route(
            "/api/workspaces/:id/recommendations",
            get(list_recommendations),
        )
        .route("/api/workspaces/:id/resources", get(list_resources))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
