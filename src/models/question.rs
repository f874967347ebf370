// src/models/question.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A question ready to be written, after import normalisation.
#[derive(Debug, Clone, PartialEq)]
pub struct NewQuestion {
    pub area_id: i64,
    pub subarea_id: i64,
    pub text: String,
    pub image_url: Option<String>,
    pub points: i32,
    pub multi_correct: bool,
    pub answers: Vec<NewAnswer>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAnswer {
    pub text: String,
    pub is_correct: bool,
}

/// DTO for one question in a bulk import payload.
///
/// Loose on purpose: a missing or mistyped field fails only its own item.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ImportQuestionItem {
    pub area: Option<String>,
    pub subarea: Option<String>,
    /// Any JSON value; only an integer is taken, other values fall back to the default.
    pub points: Option<serde_json::Value>,
    pub text: Option<String>,
    /// Public URL of an image already placed in object storage.
    pub image_url: Option<String>,
    pub answers: Option<Vec<ImportAnswer>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ImportAnswer {
    pub text: Option<String>,
    #[serde(default)]
    pub is_correct: bool,
}

/// DTO for the bulk import endpoint. Items stay raw JSON until each one is
/// decoded on its own.
#[derive(Debug, Deserialize)]
pub struct ImportQuestionsRequest {
    #[serde(default)]
    pub items: Vec<serde_json::Value>,
}

/// Failure of a single import item; processing continues past it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImportItemError {
    pub index: usize,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ImportReport {
    pub ok: usize,
    pub errors: Vec<ImportItemError>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq)]
pub struct Area {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq)]
pub struct Subarea {
    pub id: i64,
    pub area_id: i64,
    pub name: String,
}

/// Where a question is filed.
#[derive(Debug, Clone, Copy, FromRow, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuestionClass {
    pub id: i64,
    pub area_id: Option<i64>,
    pub subarea_id: Option<i64>,
}
