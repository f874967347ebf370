// src/handlers/import.rs

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};

use crate::{
    config::DEFAULT_QUESTION_POINTS,
    error::AppError,
    models::question::{ImportItemError, ImportQuestionItem, ImportQuestionsRequest, ImportReport, NewQuestion},
    store::DynRepository,
    utils::text::{normalize_answers, strip_markup, truncate_chars, validate_image_url},
};

/// Imports one question: upserts its area and subarea, then always inserts
/// the question and its answers.
async fn import_item(repo: &DynRepository, raw: &serde_json::Value) -> Result<i64, AppError> {
    let item: ImportQuestionItem = serde_json::from_value(raw.clone())?;

    let area_name = item.area.as_deref().unwrap_or_default().trim();
    let subarea_name = item.subarea.as_deref().unwrap_or_default().trim();
    let text = strip_markup(item.text.as_deref().unwrap_or_default().trim());
    let text = text.trim();

    if area_name.is_empty() || subarea_name.is_empty() || text.is_empty() {
        return Err(AppError::BadRequest("Missing area/subarea/text.".to_string()));
    }

    let points = import_points(item.points.as_ref())?;
    let answers = normalize_answers(item.answers.as_deref().unwrap_or_default()).map_err(AppError::BadRequest)?;

    let image_url = match item.image_url.as_deref().map(str::trim) {
        Some(raw) if !raw.is_empty() => Some(validate_image_url(raw).map_err(AppError::BadRequest)?),
        _ => None,
    };

    let area_id = repo.upsert_area(area_name).await?;
    let subarea_id = repo.upsert_subarea(area_id, subarea_name).await?;

    let multi_correct = answers.iter().filter(|a| a.is_correct).count() > 1;
    let question = NewQuestion {
        area_id,
        subarea_id,
        text: text.to_string(),
        image_url,
        points,
        multi_correct,
        answers,
    };

    repo.insert_question(&question).await
}

/// Points of an imported question.
///
/// Anything that is not a number (missing, null, a string) gets the default;
/// a number must be a whole value that fits the column.
fn import_points(raw: Option<&serde_json::Value>) -> Result<i32, AppError> {
    let Some(serde_json::Value::Number(number)) = raw else {
        return Ok(DEFAULT_QUESTION_POINTS);
    };

    number
        .as_i64()
        .and_then(|n| i32::try_from(n).ok())
        .ok_or_else(|| AppError::BadRequest(format!("Invalid points: {}", number)))
}

/// Bulk question import.
/// Admin only.
///
/// Items are processed independently; a failing item is reported in `errors`
/// and the rest still go in. Responds 400 only when nothing was imported.
pub async fn import_questions(
    State(repo): State<DynRepository>,
    Json(payload): Json<ImportQuestionsRequest>,
) -> Result<impl IntoResponse, AppError> {
    if payload.items.is_empty() {
        return Err(AppError::BadRequest("Empty payload".to_string()));
    }

    let mut ok = 0;
    let mut errors = Vec::new();

    for (index, item) in payload.items.iter().enumerate() {
        match import_item(&repo, item).await {
            Ok(_) => ok += 1,
            Err(e) => {
                let message = match e {
                    AppError::BadRequest(msg) => msg,
                    other => {
                        tracing::error!("Import of item {} failed: {}", index, other);
                        "Failed to store question".to_string()
                    }
                };
                errors.push(ImportItemError {
                    index,
                    message,
                    text: item
                        .get("text")
                        .and_then(serde_json::Value::as_str)
                        .map(|text| truncate_chars(text, 120)),
                });
            }
        }
    }

    tracing::info!("Question import: {} stored, {} failed", ok, errors.len());

    let status = if !errors.is_empty() && ok == 0 {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::OK
    };

    Ok((status, Json(ImportReport { ok, errors })))
}
