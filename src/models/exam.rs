// src/models/exam.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::models::simulation::Simulation;

/// Represents the 'candidates' table (only the columns shown in reports).
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq)]
pub struct Candidate {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub id_number: String,
}

/// A theory exam attempt with the questions the candidate got wrong.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CandidateExam {
    pub id: i64,
    pub candidate_id: i64,
    pub exam_date: chrono::NaiveDate,
    pub candidate: Option<Candidate>,
    pub wrong_question_ids: Vec<i64>,
}

/// DTO for recording an exam attempt.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateExamRequest {
    #[validate(range(min = 1))]
    pub candidate_id: i64,
    pub exam_date: chrono::NaiveDate,
    #[validate(length(max = 41, message = "An exam has at most 41 questions."))]
    #[serde(default)]
    pub wrong_question_ids: Vec<i64>,
}

/// An exam whose mistakes are all contained in one stored simulation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CoverageMatch {
    pub exam_id: i64,
    pub exam_date: chrono::NaiveDate,
    pub wrong_count: usize,
    pub candidate: Candidate,
    pub simulation: Simulation,
}

/// One wrong-answer row joined with the question's classification.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq)]
pub struct WrongAnswerRow {
    pub question_id: i64,
    pub text: String,
    pub area_id: Option<i64>,
    pub subarea_id: Option<i64>,
}

/// Query parameters for the wrong-answer report.
#[derive(Debug, Default, Deserialize)]
pub struct WrongQuestionParams {
    /// 1 (or less) = any, 2 = exactly two, 3 or more = three or more.
    pub freq: Option<i64>,
    pub area_id: Option<i64>,
    pub subarea_id: Option<i64>,
}
