// src/store/mod.rs

pub mod memory;
pub mod postgres;

use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    error::AppError,
    models::{
        exam::{Candidate, CandidateExam, CreateExamRequest, WrongAnswerRow},
        question::{Area, NewQuestion, QuestionClass, Subarea},
        simulation::{Simulation, SimulationPair, SimulationQuestion},
        user::User,
    },
};

pub use memory::MemoryRepository;
pub use postgres::PgRepository;

/// Data-access capability handed to handlers through `AppState`.
///
/// Reads return fully materialised, typed rows; any failure is terminal for
/// the request and is never retried here.
#[async_trait]
pub trait Repository: Send + Sync {
    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, AppError>;

    async fn create_user(&self, username: &str, password_hash: &str, role: &str) -> Result<i64, AppError>;

    /// All simulations, ascending by ID.
    async fn list_simulations(&self) -> Result<Vec<Simulation>, AppError>;

    async fn get_simulation(&self, id: i64) -> Result<Option<Simulation>, AppError>;

    /// Questions of one simulation in `order_index` order.
    async fn simulation_questions(&self, simulation_id: i64) -> Result<Vec<SimulationQuestion>, AppError>;

    async fn all_simulation_pairs(&self) -> Result<Vec<SimulationPair>, AppError>;

    /// Pairs whose question is one of `question_ids`.
    async fn pairs_for_questions(&self, question_ids: &[i64]) -> Result<Vec<SimulationPair>, AppError>;

    /// Every pair of the given simulations.
    async fn pairs_for_simulations(&self, simulation_ids: &[i64]) -> Result<Vec<SimulationPair>, AppError>;

    /// Inserts the simulation and its links; `order_index` follows the slice order.
    ///
    /// Re-checks for a stored simulation with the same distinct question set
    /// atomically with the insert and fails with `DuplicateSimulation` if one
    /// exists.
    async fn insert_simulation(&self, title: Option<&str>, question_ids: &[i64]) -> Result<i64, AppError>;

    /// The subset of `ids` that exist in `questions`.
    async fn existing_question_ids(&self, ids: &[i64]) -> Result<Vec<i64>, AppError>;

    /// All areas, ascending by ID.
    async fn list_areas(&self) -> Result<Vec<Area>, AppError>;

    async fn list_subareas(&self) -> Result<Vec<Subarea>, AppError>;

    /// Area and subarea of every stored question.
    async fn question_classes(&self) -> Result<Vec<QuestionClass>, AppError>;

    async fn get_candidate(&self, id: i64) -> Result<Option<Candidate>, AppError>;

    /// Every exam in creation order, with candidate and wrong question IDs.
    async fn list_exams(&self) -> Result<Vec<CandidateExam>, AppError>;

    async fn get_exam(&self, id: i64) -> Result<Option<CandidateExam>, AppError>;

    async fn insert_exam(&self, exam: &CreateExamRequest) -> Result<i64, AppError>;

    /// One row per recorded wrong answer, in recording order.
    async fn wrong_answer_rows(&self) -> Result<Vec<WrongAnswerRow>, AppError>;

    /// Returns the ID of the area with this name, creating it when missing.
    async fn upsert_area(&self, name: &str) -> Result<i64, AppError>;

    async fn upsert_subarea(&self, area_id: i64, name: &str) -> Result<i64, AppError>;

    async fn insert_question(&self, question: &NewQuestion) -> Result<i64, AppError>;
}

pub type DynRepository = Arc<dyn Repository>;
