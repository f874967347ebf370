// src/models/simulation.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::config::SIMULATION_QUESTION_COUNT;

/// Represents the 'simulations' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq)]
pub struct Simulation {
    pub id: i64,

    /// Optional display title (e.g. "Series A-1").
    pub title: Option<String>,

    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// One `simulation_questions` link reduced to the pair the matching code needs.
#[derive(Debug, Clone, Copy, FromRow, Serialize, Deserialize, PartialEq, Eq)]
pub struct SimulationPair {
    pub simulation_id: i64,
    pub question_id: i64,
}

/// A question as it appears inside a simulation, in display order.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq)]
pub struct SimulationQuestion {
    pub question_id: i64,
    pub order_index: i32,
    pub text: String,
    pub points: i32,
}

#[derive(Debug, Serialize)]
pub struct SimulationDetail {
    #[serde(flatten)]
    pub simulation: Simulation,
    pub total_points: i64,
    pub questions: Vec<SimulationQuestion>,
}

/// DTO for composing a new simulation.
///
/// `question_ids` keeps the operator's order; it becomes `order_index`.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateSimulationRequest {
    #[validate(length(max = 200, message = "Title must be at most 200 characters."))]
    pub title: Option<String>,

    #[validate(custom(function = validate_question_ids))]
    pub question_ids: Vec<i64>,
}

/// DTO for the dry-run duplicate check.
#[derive(Debug, Deserialize, Validate)]
pub struct CheckSimulationRequest {
    #[validate(custom(function = validate_question_ids))]
    pub question_ids: Vec<i64>,
}

fn validate_question_ids(ids: &[i64]) -> Result<(), validator::ValidationError> {
    if ids.len() != SIMULATION_QUESTION_COUNT {
        let mut err = validator::ValidationError::new("wrong_question_count");
        err.message = Some(format!("Exactly {} questions are required.", SIMULATION_QUESTION_COUNT).into());
        return Err(err);
    }
    let mut sorted = ids.to_vec();
    sorted.sort_unstable();
    sorted.dedup();
    if sorted.len() != ids.len() {
        let mut err = validator::ValidationError::new("duplicate_question");
        err.message = Some("A question can appear only once in a simulation.".into());
        return Err(err);
    }
    Ok(())
}

/// How many distinct simulations use a question.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuestionUsage {
    pub question_id: i64,
    pub simulations_count: usize,
}

/// Filters for the question usage report.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UsageParams {
    pub area_id: Option<i64>,
    pub subarea_id: Option<i64>,
}
