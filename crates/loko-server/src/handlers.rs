//! REST API handlers
//!
//! Thin by design: parse, call one use case, shape the JSON response.
//! Every handler reloads from disk; there is no cached graph to mutate.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use loko_core::usecase::{DetectDrift, ValidateArchitecture};
use loko_core::{NullReporter, ProjectRepository};
use loko_store::{D2SyntaxParser, FsProjectRepository};

use crate::runner;
use crate::ApiState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

pub async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn internal_error(err: anyhow::Error) -> (StatusCode, Json<ErrorResponse>) {
    tracing::error!(error = %err, "request failed");
    (StatusCode::INTERNAL_SERVER_ERROR, Json(ErrorResponse { error: err.to_string() }))
}

#[derive(Debug, Serialize)]
pub struct ProjectResponse {
    pub name: String,
    pub description: String,
    pub version: String,
    pub systems: usize,
    pub source_dir: String,
    pub output_dir: String,
}

pub async fn get_project(
    State(state): State<Arc<ApiState>>,
) -> Result<Json<ProjectResponse>, (StatusCode, Json<ErrorResponse>)> {
    let repo = FsProjectRepository::new();
    let project = repo.load_project(&state.root).await.map_err(internal_error)?;
    let systems = repo.list_systems(&state.root).await.map_err(internal_error)?;
    Ok(Json(ProjectResponse {
        name: project.name,
        description: project.description,
        version: project.version,
        systems: systems.len(),
        source_dir: project.config.paths.source.clone(),
        output_dir: project.config.paths.output.clone(),
    }))
}

#[derive(Debug, Serialize)]
pub struct SystemSummary {
    pub id: String,
    pub name: String,
    pub description: String,
    pub tags: Vec<String>,
    pub containers: usize,
    pub external: bool,
}

pub async fn list_systems(
    State(state): State<Arc<ApiState>>,
) -> Result<Json<Vec<SystemSummary>>, (StatusCode, Json<ErrorResponse>)> {
    let repo = FsProjectRepository::new();
    let systems = repo.list_systems(&state.root).await.map_err(internal_error)?;
    Ok(Json(
        systems
            .into_iter()
            .map(|s| SystemSummary {
                id: s.id,
                name: s.name,
                description: s.description,
                tags: s.tags,
                containers: s.containers.len(),
                external: s.external,
            })
            .collect(),
    ))
}

#[derive(Debug, Serialize)]
pub struct ContainerDetail {
    pub id: String,
    pub name: String,
    pub description: String,
    pub technology: String,
    pub components: Vec<ComponentDetail>,
}

#[derive(Debug, Serialize)]
pub struct ComponentDetail {
    pub id: String,
    pub name: String,
    pub description: String,
    pub technology: String,
    pub relationships: std::collections::BTreeMap<String, String>,
}

#[derive(Debug, Serialize)]
pub struct SystemDetail {
    pub id: String,
    pub name: String,
    pub description: String,
    pub tags: Vec<String>,
    pub external: bool,
    pub containers: Vec<ContainerDetail>,
}

pub async fn get_system(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<String>,
) -> Result<Json<SystemDetail>, (StatusCode, Json<ErrorResponse>)> {
    let repo = FsProjectRepository::new();
    let systems = repo.list_systems(&state.root).await.map_err(internal_error)?;
    let Some(system) = systems.into_iter().find(|s| s.id == id) else {
        return Err((
            StatusCode::NOT_FOUND,
            Json(ErrorResponse { error: format!("system not found: {id}") }),
        ));
    };
    Ok(Json(SystemDetail {
        id: system.id.clone(),
        name: system.name.clone(),
        description: system.description.clone(),
        tags: system.tags.clone(),
        external: system.external,
        containers: system
            .containers
            .values()
            .map(|c| ContainerDetail {
                id: c.id.clone(),
                name: c.name.clone(),
                description: c.description.clone(),
                technology: c.technology.clone(),
                components: c
                    .components
                    .values()
                    .map(|comp| ComponentDetail {
                        id: comp.id.clone(),
                        name: comp.name.clone(),
                        description: comp.description.clone(),
                        technology: comp.technology.clone(),
                        relationships: comp.relationships.clone(),
                    })
                    .collect(),
            })
            .collect(),
    }))
}

#[derive(Debug, Deserialize, Default)]
pub struct ValidateParams {
    #[serde(default)]
    pub strict: bool,
    #[serde(default)]
    pub check_drift: bool,
}

#[derive(Debug, Serialize)]
pub struct ValidateResponse {
    pub valid: bool,
    pub errors: usize,
    pub warnings: usize,
    pub report: loko_core::ArchitectureReport,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub drift: Vec<loko_core::DriftIssue>,
}

pub async fn validate(
    State(state): State<Arc<ApiState>>,
    Query(params): Query<ValidateParams>,
) -> Result<Json<ValidateResponse>, (StatusCode, Json<ErrorResponse>)> {
    let (_, systems, graph) =
        runner::load_model(&state.root, &NullReporter).await.map_err(internal_error)?;
    let report = ValidateArchitecture::new().execute(&systems, &graph, params.strict);
    let drift = if params.check_drift {
        DetectDrift::new(Arc::new(D2SyntaxParser::new()))
            .execute(&systems, &graph)
            .map_err(internal_error)?
    } else {
        Vec::new()
    };
    Ok(Json(ValidateResponse {
        valid: report.is_valid() && !drift.iter().any(|d| d.severity == loko_core::Severity::Error),
        errors: report.error_count(),
        warnings: report.warning_count(),
        report,
        drift,
    }))
}

#[derive(Debug, Serialize)]
pub struct BuildAccepted {
    pub id: String,
    pub status_url: String,
}

pub async fn start_build(State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    let id = runner::spawn_build(
        Arc::clone(&state.builds),
        state.root.clone(),
        CancellationToken::new(),
    );
    (
        StatusCode::ACCEPTED,
        Json(BuildAccepted { status_url: format!("/api/v1/build/{id}"), id }),
    )
}

pub async fn build_status(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<String>,
) -> Result<Json<runner::BuildStatus>, (StatusCode, Json<ErrorResponse>)> {
    match state.builds.get(&id) {
        Some(status) => Ok(Json(status.clone())),
        None => Err((
            StatusCode::NOT_FOUND,
            Json(ErrorResponse { error: format!("build not found: {id}") }),
        )),
    }
}
