// src/store/postgres.rs

use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};

use crate::{
    error::AppError,
    matching::fingerprint::build_fingerprint,
    models::{
        exam::{Candidate, CandidateExam, CreateExamRequest, WrongAnswerRow},
        question::{Area, NewQuestion, QuestionClass, Subarea},
        simulation::{Simulation, SimulationPair, SimulationQuestion},
        user::User,
    },
    store::Repository,
};

/// `Repository` backed by the Postgres pool.
#[derive(Clone)]
pub struct PgRepository {
    pool: PgPool,
}

impl PgRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Helper row for the exam listing (candidate columns come from a LEFT JOIN).
#[derive(FromRow)]
struct ExamRow {
    id: i64,
    candidate_id: i64,
    exam_date: chrono::NaiveDate,
    first_name: Option<String>,
    last_name: Option<String>,
    id_number: Option<String>,
}

#[derive(FromRow)]
struct WrongLink {
    exam_id: i64,
    question_id: i64,
}

impl ExamRow {
    fn into_exam(self, wrong_question_ids: Vec<i64>) -> CandidateExam {
        let candidate = match (self.first_name, self.last_name, self.id_number) {
            (Some(first_name), Some(last_name), Some(id_number)) => Some(Candidate {
                id: self.candidate_id,
                first_name,
                last_name,
                id_number,
            }),
            _ => None,
        };
        CandidateExam {
            id: self.id,
            candidate_id: self.candidate_id,
            exam_date: self.exam_date,
            candidate,
            wrong_question_ids,
        }
    }
}

const EXAM_SELECT: &str = r#"
    SELECT
        e.id, e.candidate_id, e.exam_date,
        c.first_name, c.last_name, c.id_number
    FROM candidate_exams e
    LEFT JOIN candidates c ON c.id = e.candidate_id
"#;

/// Logs the failing query before converting the error.
fn db_error(context: &'static str) -> impl Fn(sqlx::Error) -> AppError {
    move |e| {
        tracing::error!("{}: {:?}", context, e);
        AppError::from(e)
    }
}

/// `SELECT ... WHERE <column> IN (...)` over simulation_questions.
async fn pairs_where_in(pool: &PgPool, column: &str, ids: &[i64]) -> Result<Vec<SimulationPair>, AppError> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let mut query_builder = QueryBuilder::<Postgres>::new(
        "SELECT simulation_id, question_id FROM simulation_questions WHERE ",
    );
    query_builder.push(column);
    query_builder.push(" IN (");
    let mut separated = query_builder.separated(",");
    for id in ids {
        separated.push_bind(*id);
    }
    separated.push_unseparated(")");

    query_builder
        .build_query_as::<SimulationPair>()
        .fetch_all(pool)
        .await
        .map_err(db_error("Failed to fetch simulation pairs"))
}

#[async_trait]
impl Repository for PgRepository {
    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        sqlx::query_as::<_, User>("SELECT id, username, password, role FROM users WHERE username = $1")
            .bind(username)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("Failed to fetch user"))
    }

    async fn create_user(&self, username: &str, password_hash: &str, role: &str) -> Result<i64, AppError> {
        let (id,): (i64,) = sqlx::query_as(
            "INSERT INTO users (username, password, role) VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(username)
        .bind(password_hash)
        .bind(role)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if e.to_string().contains("unique constraint") || e.to_string().contains("23505") {
                AppError::Conflict(format!("Username '{}' already exists", username))
            } else {
                tracing::error!("Failed to create user: {:?}", e);
                AppError::from(e)
            }
        })?;
        Ok(id)
    }

    async fn list_simulations(&self) -> Result<Vec<Simulation>, AppError> {
        sqlx::query_as::<_, Simulation>("SELECT id, title, created_at FROM simulations ORDER BY id ASC")
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("Failed to list simulations"))
    }

    async fn get_simulation(&self, id: i64) -> Result<Option<Simulation>, AppError> {
        sqlx::query_as::<_, Simulation>("SELECT id, title, created_at FROM simulations WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("Failed to fetch simulation"))
    }

    async fn simulation_questions(&self, simulation_id: i64) -> Result<Vec<SimulationQuestion>, AppError> {
        sqlx::query_as::<_, SimulationQuestion>(
            r#"
            SELECT sq.question_id, sq.order_index, q.text, q.points
            FROM simulation_questions sq
            JOIN questions q ON q.id = sq.question_id
            WHERE sq.simulation_id = $1
            ORDER BY sq.order_index ASC
            "#,
        )
        .bind(simulation_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("Failed to fetch simulation questions"))
    }

    async fn all_simulation_pairs(&self) -> Result<Vec<SimulationPair>, AppError> {
        sqlx::query_as::<_, SimulationPair>(
            "SELECT simulation_id, question_id FROM simulation_questions ORDER BY simulation_id ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("Failed to fetch simulation pairs"))
    }

    async fn pairs_for_questions(&self, question_ids: &[i64]) -> Result<Vec<SimulationPair>, AppError> {
        pairs_where_in(&self.pool, "question_id", question_ids).await
    }

    async fn pairs_for_simulations(&self, simulation_ids: &[i64]) -> Result<Vec<SimulationPair>, AppError> {
        pairs_where_in(&self.pool, "simulation_id", simulation_ids).await
    }

    async fn insert_simulation(&self, title: Option<&str>, question_ids: &[i64]) -> Result<i64, AppError> {
        let fingerprint = build_fingerprint(question_ids.iter().copied());
        let mut tx = self.pool.begin().await.map_err(db_error("Failed to open transaction"))?;

        // Serialises inserts of the same set until commit.
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(fingerprint.key())
            .execute(&mut *tx)
            .await
            .map_err(db_error("Failed to lock question set"))?;

        let existing: Option<(i64,)> = sqlx::query_as(
            r#"
            SELECT simulation_id
            FROM simulation_questions
            GROUP BY simulation_id
            HAVING COUNT(DISTINCT question_id) = $2
               AND COUNT(DISTINCT question_id) FILTER (WHERE question_id = ANY($1)) = $2
            ORDER BY simulation_id ASC
            LIMIT 1
            "#,
        )
        .bind(fingerprint.ids())
        .bind(fingerprint.len() as i64)
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_error("Failed to re-check question set"))?;

        if let Some((existing,)) = existing {
            return Err(AppError::DuplicateSimulation(existing));
        }

        let (id,): (i64,) = sqlx::query_as("INSERT INTO simulations (title) VALUES ($1) RETURNING id")
            .bind(title)
            .fetch_one(&mut *tx)
            .await
            .map_err(db_error("Failed to insert simulation"))?;

        if !question_ids.is_empty() {
            let mut query_builder = QueryBuilder::<Postgres>::new(
                "INSERT INTO simulation_questions (simulation_id, question_id, order_index) ",
            );
            query_builder.push_values(question_ids.iter().enumerate(), |mut row, (index, question_id)| {
                row.push_bind(id).push_bind(*question_id).push_bind(index as i32);
            });
            query_builder
                .build()
                .execute(&mut *tx)
                .await
                .map_err(db_error("Failed to insert simulation questions"))?;
        }

        tx.commit().await.map_err(db_error("Failed to commit simulation"))?;
        Ok(id)
    }

    async fn existing_question_ids(&self, ids: &[i64]) -> Result<Vec<i64>, AppError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut query_builder = QueryBuilder::<Postgres>::new("SELECT id FROM questions WHERE id IN (");
        let mut separated = query_builder.separated(",");
        for id in ids {
            separated.push_bind(*id);
        }
        separated.push_unseparated(")");

        let rows: Vec<(i64,)> = query_builder
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("Failed to check question IDs"))?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    async fn list_areas(&self) -> Result<Vec<Area>, AppError> {
        sqlx::query_as::<_, Area>("SELECT id, name FROM areas ORDER BY id ASC")
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("Failed to fetch areas"))
    }

    async fn list_subareas(&self) -> Result<Vec<Subarea>, AppError> {
        sqlx::query_as::<_, Subarea>("SELECT id, area_id, name FROM subareas ORDER BY id ASC")
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("Failed to fetch subareas"))
    }

    async fn question_classes(&self) -> Result<Vec<QuestionClass>, AppError> {
        sqlx::query_as::<_, QuestionClass>("SELECT id, area_id, subarea_id FROM questions")
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("Failed to fetch question areas"))
    }

    async fn get_candidate(&self, id: i64) -> Result<Option<Candidate>, AppError> {
        sqlx::query_as::<_, Candidate>(
            "SELECT id, first_name, last_name, id_number FROM candidates WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("Failed to fetch candidate"))
    }

    async fn list_exams(&self) -> Result<Vec<CandidateExam>, AppError> {
        let rows = sqlx::query_as::<_, ExamRow>(&format!("{} ORDER BY e.created_at ASC, e.id ASC", EXAM_SELECT))
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("Failed to list exams"))?;

        let links = sqlx::query_as::<_, WrongLink>(
            "SELECT exam_id, question_id FROM candidate_exam_wrong_questions ORDER BY id ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("Failed to fetch wrong questions"))?;

        let mut wrong_by_exam: HashMap<i64, Vec<i64>> = HashMap::new();
        for link in links {
            wrong_by_exam.entry(link.exam_id).or_default().push(link.question_id);
        }

        Ok(rows
            .into_iter()
            .map(|row| {
                let wrong = wrong_by_exam.remove(&row.id).unwrap_or_default();
                row.into_exam(wrong)
            })
            .collect())
    }

    async fn get_exam(&self, id: i64) -> Result<Option<CandidateExam>, AppError> {
        let Some(row) = sqlx::query_as::<_, ExamRow>(&format!("{} WHERE e.id = $1", EXAM_SELECT))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("Failed to fetch exam"))?
        else {
            return Ok(None);
        };

        let wrong: Vec<(i64,)> = sqlx::query_as(
            "SELECT question_id FROM candidate_exam_wrong_questions WHERE exam_id = $1 ORDER BY id ASC",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("Failed to fetch wrong questions"))?;

        Ok(Some(row.into_exam(wrong.into_iter().map(|(q,)| q).collect())))
    }

    async fn insert_exam(&self, exam: &CreateExamRequest) -> Result<i64, AppError> {
        let mut tx = self.pool.begin().await.map_err(db_error("Failed to open transaction"))?;

        let (id,): (i64,) = sqlx::query_as(
            "INSERT INTO candidate_exams (candidate_id, exam_date) VALUES ($1, $2) RETURNING id",
        )
        .bind(exam.candidate_id)
        .bind(exam.exam_date)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_error("Failed to insert exam"))?;

        if !exam.wrong_question_ids.is_empty() {
            let mut query_builder = QueryBuilder::<Postgres>::new(
                "INSERT INTO candidate_exam_wrong_questions (exam_id, question_id) ",
            );
            query_builder.push_values(exam.wrong_question_ids.iter(), |mut row, question_id| {
                row.push_bind(id).push_bind(*question_id);
            });
            query_builder
                .build()
                .execute(&mut *tx)
                .await
                .map_err(db_error("Failed to insert wrong questions"))?;
        }

        tx.commit().await.map_err(db_error("Failed to commit exam"))?;
        Ok(id)
    }

    async fn wrong_answer_rows(&self) -> Result<Vec<WrongAnswerRow>, AppError> {
        sqlx::query_as::<_, WrongAnswerRow>(
            r#"
            SELECT w.question_id, q.text, q.area_id, q.subarea_id
            FROM candidate_exam_wrong_questions w
            JOIN questions q ON q.id = w.question_id
            ORDER BY w.id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("Failed to fetch wrong answers"))
    }

    async fn upsert_area(&self, name: &str) -> Result<i64, AppError> {
        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO areas (name) VALUES ($1)
            ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name
            RETURNING id
            "#,
        )
        .bind(name)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error("Failed to upsert area"))?;
        Ok(id)
    }

    async fn upsert_subarea(&self, area_id: i64, name: &str) -> Result<i64, AppError> {
        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO subareas (area_id, name) VALUES ($1, $2)
            ON CONFLICT (area_id, name) DO UPDATE SET name = EXCLUDED.name
            RETURNING id
            "#,
        )
        .bind(area_id)
        .bind(name)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error("Failed to upsert subarea"))?;
        Ok(id)
    }

    async fn insert_question(&self, question: &NewQuestion) -> Result<i64, AppError> {
        let mut tx = self.pool.begin().await.map_err(db_error("Failed to open transaction"))?;

        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO questions (area_id, subarea_id, text, image_url, points, multi_correct)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            "#,
        )
        .bind(question.area_id)
        .bind(question.subarea_id)
        .bind(&question.text)
        .bind(&question.image_url)
        .bind(question.points)
        .bind(question.multi_correct)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_error("Failed to insert question"))?;

        if !question.answers.is_empty() {
            let mut query_builder =
                QueryBuilder::<Postgres>::new("INSERT INTO answers (question_id, text, is_correct) ");
            query_builder.push_values(question.answers.iter(), |mut row, answer| {
                row.push_bind(id).push_bind(&answer.text).push_bind(answer.is_correct);
            });
            query_builder
                .build()
                .execute(&mut *tx)
                .await
                .map_err(db_error("Failed to insert answers"))?;
        }

        tx.commit().await.map_err(db_error("Failed to commit question"))?;
        Ok(id)
    }
}
