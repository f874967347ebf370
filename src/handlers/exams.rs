// src/handlers/exams.rs

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
    handlers::simulations::ensure_questions_exist,
    matching::{
        coverage::{match_exam, match_exams, simulation_sets},
        frequency::wrong_question_report,
    },
    models::exam::{CreateExamRequest, WrongQuestionParams},
    store::DynRepository,
};

/// Records a theory exam attempt and the questions the candidate missed.
pub async fn create_exam(
    State(repo): State<DynRepository>,
    Json(mut payload): Json<CreateExamRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    repo.get_candidate(payload.candidate_id)
        .await?
        .ok_or(AppError::NotFound("Candidate not found".to_string()))?;

    // keep first occurrence of each wrong question
    let mut seen = std::collections::HashSet::new();
    payload.wrong_question_ids.retain(|id| seen.insert(*id));
    ensure_questions_exist(&repo, &payload.wrong_question_ids).await?;

    let id = repo.insert_exam(&payload).await?;
    tracing::info!(
        "Recorded exam {} for candidate {} ({} wrong)",
        id,
        payload.candidate_id,
        payload.wrong_question_ids.len()
    );

    Ok((StatusCode::CREATED, Json(json!({ "id": id }))))
}

/// Matches every exam's mistakes against the stored simulations.
///
/// Exams without mistakes are skipped; each reported exam names the first
/// simulation (lowest ID) containing all of its wrong questions.
pub async fn coverage_report(State(repo): State<DynRepository>) -> Result<impl IntoResponse, AppError> {
    let simulations = repo.list_simulations().await?;
    let pairs = repo.all_simulation_pairs().await?;
    let exams = repo.list_exams().await?;

    let matches = match_exams(&exams, &simulations, &simulation_sets(pairs));
    tracing::debug!("{} of {} exams covered by a simulation", matches.len(), exams.len());

    Ok(Json(json!({ "matches": matches })))
}

/// Coverage for a single exam; `simulation` is null when nothing covers it.
pub async fn exam_coverage(
    State(repo): State<DynRepository>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let exam = repo
        .get_exam(id)
        .await?
        .ok_or(AppError::NotFound("Exam not found".to_string()))?;

    if exam.wrong_question_ids.is_empty() {
        return Ok(Json(json!({ "exam_id": exam.id, "wrong_count": 0, "simulation": null })));
    }

    let simulations = repo.list_simulations().await?;
    let pairs = repo.all_simulation_pairs().await?;
    let matched = match_exam(&exam, &simulations, &simulation_sets(pairs));

    Ok(Json(json!({
        "exam_id": exam.id,
        "wrong_count": exam.wrong_question_ids.len(),
        "simulation": matched.map(|m| m.simulation),
    })))
}

/// Questions candidates got wrong, with how often, filtered by area,
/// subarea and frequency band.
pub async fn wrong_questions(
    State(repo): State<DynRepository>,
    Query(params): Query<WrongQuestionParams>,
) -> Result<impl IntoResponse, AppError> {
    let rows = repo.wrong_answer_rows().await?;
    Ok(Json(wrong_question_report(&rows, &params)))
}
