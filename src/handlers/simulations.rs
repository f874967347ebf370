// src/handlers/simulations.rs

use std::collections::BTreeSet;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;
use validator::Validate;

use crate::{
    error::AppError,
    matching::{
        duplicates::group_pairs,
        find_duplicate_groups, find_existing_duplicate,
        frequency::usage_report,
    },
    models::simulation::{CheckSimulationRequest, CreateSimulationRequest, SimulationDetail, UsageParams},
    store::DynRepository,
};

/// Lists all simulations, ascending by ID.
pub async fn list_simulations(State(repo): State<DynRepository>) -> Result<impl IntoResponse, AppError> {
    let simulations = repo.list_simulations().await?;
    Ok(Json(simulations))
}

/// Returns one simulation with its questions in display order.
pub async fn get_simulation(
    State(repo): State<DynRepository>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let simulation = repo
        .get_simulation(id)
        .await?
        .ok_or(AppError::NotFound("Simulation not found".to_string()))?;

    let questions = repo.simulation_questions(id).await?;
    let total_points = questions.iter().map(|q| i64::from(q.points)).sum();

    Ok(Json(SimulationDetail {
        simulation,
        total_points,
        questions,
    }))
}

/// Fails with `BadRequest` if any of the IDs is not a stored question.
pub(crate) async fn ensure_questions_exist(repo: &DynRepository, ids: &[i64]) -> Result<(), AppError> {
    let existing: BTreeSet<i64> = repo.existing_question_ids(ids).await?.into_iter().collect();
    let missing: Vec<String> = ids
        .iter()
        .filter(|id| !existing.contains(*id))
        .map(|id| id.to_string())
        .collect();

    if !missing.is_empty() {
        return Err(AppError::BadRequest(format!(
            "Unknown question IDs: {}",
            missing.join(", ")
        )));
    }
    Ok(())
}

/// Composes a new simulation.
///
/// * Requires exactly 41 distinct, existing questions.
/// * Rejects the set with 409 when a stored simulation has the same questions.
/// * Stores links with `order_index` following the submitted order.
pub async fn create_simulation(
    State(repo): State<DynRepository>,
    Json(payload): Json<CreateSimulationRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    ensure_questions_exist(&repo, &payload.question_ids).await?;

    if let Some(existing) = find_existing_duplicate(repo.as_ref(), &payload.question_ids).await? {
        tracing::info!("Rejected simulation: same question set as {}", existing);
        return Err(AppError::DuplicateSimulation(existing));
    }

    let title = payload
        .title
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty());

    let id = repo.insert_simulation(title, &payload.question_ids).await?;
    tracing::info!("Created simulation {}", id);

    Ok((StatusCode::CREATED, Json(json!({ "id": id }))))
}

/// Dry-run of the duplicate check used before saving.
pub async fn check_simulation(
    State(repo): State<DynRepository>,
    Json(payload): Json<CheckSimulationRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let duplicate_of = find_existing_duplicate(repo.as_ref(), &payload.question_ids).await?;
    Ok(Json(json!({ "duplicate_of": duplicate_of })))
}

/// Groups stored simulations that share an identical 41-question set.
pub async fn duplicate_groups(State(repo): State<DynRepository>) -> Result<impl IntoResponse, AppError> {
    let simulations = repo.list_simulations().await?;
    let pairs = repo.all_simulation_pairs().await?;

    let ids: Vec<i64> = simulations.iter().map(|s| s.id).collect();
    let report = find_duplicate_groups(&group_pairs(&ids, pairs));

    if !report.skipped.is_empty() {
        tracing::debug!("Skipped incomplete simulations: {:?}", report.skipped);
    }

    Ok(Json(json!({
        "total": simulations.len(),
        "groups": report.groups,
        "skipped": report.skipped,
    })))
}

/// How many simulations each question appears in, most used first, plus
/// total/used question counts per area and subarea.
pub async fn question_usage_report(
    State(repo): State<DynRepository>,
    Query(params): Query<UsageParams>,
) -> Result<impl IntoResponse, AppError> {
    let pairs = repo.all_simulation_pairs().await?;
    let classes = repo.question_classes().await?;
    let areas = repo.list_areas().await?;
    let subareas = repo.list_subareas().await?;

    Ok(Json(usage_report(pairs, &classes, &areas, &subareas, &params)))
}
