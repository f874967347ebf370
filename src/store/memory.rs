// src/store/memory.rs

use std::sync::{
    Mutex, MutexGuard,
    atomic::{AtomicBool, Ordering},
};

use async_trait::async_trait;

use crate::{
    error::AppError,
    matching::{
        fingerprint::build_fingerprint,
        narrowing::{confirm_exact, containment_candidates},
    },
    models::{
        exam::{Candidate, CandidateExam, CreateExamRequest, WrongAnswerRow},
        question::{Area, NewQuestion, QuestionClass, Subarea},
        simulation::{Simulation, SimulationPair, SimulationQuestion},
        user::User,
    },
    store::Repository,
};

#[derive(Debug, Clone)]
struct StoredQuestion {
    id: i64,
    area_id: Option<i64>,
    subarea_id: Option<i64>,
    text: String,
    points: i32,
    multi_correct: bool,
}

#[derive(Debug, Clone)]
struct StoredLink {
    simulation_id: i64,
    question_id: i64,
    order_index: i32,
}

#[derive(Debug, Clone)]
struct StoredExam {
    id: i64,
    candidate_id: i64,
    exam_date: chrono::NaiveDate,
    wrong_question_ids: Vec<i64>,
}

#[derive(Debug, Default)]
struct Tables {
    next_id: i64,
    users: Vec<User>,
    areas: Vec<(i64, String)>,
    subareas: Vec<(i64, i64, String)>,
    questions: Vec<StoredQuestion>,
    answers: Vec<(i64, String, bool)>,
    simulations: Vec<Simulation>,
    links: Vec<StoredLink>,
    candidates: Vec<Candidate>,
    exams: Vec<StoredExam>,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn pairs_where(&self, keep: impl Fn(&StoredLink) -> bool) -> Vec<SimulationPair> {
        self.links
            .iter()
            .filter(|link| keep(*link))
            .map(|link| SimulationPair {
                simulation_id: link.simulation_id,
                question_id: link.question_id,
            })
            .collect()
    }

    /// The lowest-ID simulation holding exactly the distinct IDs of `question_ids`.
    fn same_set_as(&self, question_ids: &[i64]) -> Option<i64> {
        let fingerprint = build_fingerprint(question_ids.iter().copied());
        let matched = self.pairs_where(|link| fingerprint.contains(link.question_id));
        let candidates = containment_candidates(&matched, fingerprint.len());
        let all_rows = self.pairs_where(|link| candidates.contains(&link.simulation_id));
        confirm_exact(&candidates, &all_rows, fingerprint.len())
    }

    fn push_simulation(&mut self, title: Option<&str>, question_ids: &[i64]) -> i64 {
        let id = self.next_id();
        self.simulations.push(Simulation {
            id,
            title: title.map(str::to_string),
            created_at: Some(chrono::Utc::now()),
        });
        for (index, question_id) in question_ids.iter().enumerate() {
            self.links.push(StoredLink {
                simulation_id: id,
                question_id: *question_id,
                order_index: index as i32,
            });
        }
        id
    }

    fn exam_view(&self, exam: &StoredExam) -> CandidateExam {
        CandidateExam {
            id: exam.id,
            candidate_id: exam.candidate_id,
            exam_date: exam.exam_date,
            candidate: self.candidates.iter().find(|c| c.id == exam.candidate_id).cloned(),
            wrong_question_ids: exam.wrong_question_ids.clone(),
        }
    }
}

/// In-process `Repository` used by tests and local runs without Postgres.
///
/// IDs come from one shared counter, so they are unique across tables and
/// increase in insertion order.
#[derive(Debug, Default)]
pub struct MemoryRepository {
    tables: Mutex<Tables>,
    unavailable: AtomicBool,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent call fail as if the database were unreachable.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn tables(&self) -> Result<MutexGuard<'_, Tables>, AppError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(AppError::InternalServerError("store unavailable".to_string()));
        }
        Ok(self.tables.lock().unwrap_or_else(|poisoned| poisoned.into_inner()))
    }

    fn tables_unchecked(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Registers plain questions with the given IDs (text "Question <id>", 1 point).
    pub fn seed_questions(&self, ids: impl IntoIterator<Item = i64>) {
        let mut tables = self.tables_unchecked();
        for id in ids {
            if tables.questions.iter().any(|q| q.id == id) {
                continue;
            }
            tables.questions.push(StoredQuestion {
                id,
                area_id: None,
                subarea_id: None,
                text: format!("Question {}", id),
                points: 1,
                multi_correct: false,
            });
            tables.next_id = tables.next_id.max(id);
        }
    }

    /// Places an existing question in an area/subarea.
    pub fn classify_question(&self, question_id: i64, area_id: i64, subarea_id: i64) {
        let mut tables = self.tables_unchecked();
        if let Some(question) = tables.questions.iter_mut().find(|q| q.id == question_id) {
            question.area_id = Some(area_id);
            question.subarea_id = Some(subarea_id);
        }
    }

    /// Stores a simulation exactly as given, repeats included, skipping any checks.
    pub fn seed_simulation(&self, title: Option<&str>, question_ids: &[i64]) -> i64 {
        self.tables_unchecked().push_simulation(title, question_ids)
    }

    pub fn seed_candidate(&self, first_name: &str, last_name: &str, id_number: &str) -> i64 {
        let mut tables = self.tables_unchecked();
        let id = tables.next_id();
        tables.candidates.push(Candidate {
            id,
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            id_number: id_number.to_string(),
        });
        id
    }

    /// Number of stored questions (imports included).
    pub fn question_count(&self) -> usize {
        self.tables_unchecked().questions.len()
    }

    /// ID and `multi_correct` flag of the first question stored with this text.
    pub fn question_by_text(&self, text: &str) -> Option<(i64, bool)> {
        self.tables_unchecked()
            .questions
            .iter()
            .find(|q| q.text == text)
            .map(|q| (q.id, q.multi_correct))
    }

    /// Answers stored for a question as `(text, is_correct)`.
    pub fn answers_of(&self, question_id: i64) -> Vec<(String, bool)> {
        self.tables_unchecked()
            .answers
            .iter()
            .filter(|(qid, _, _)| *qid == question_id)
            .map(|(_, text, correct)| (text.clone(), *correct))
            .collect()
    }

    pub fn area_names(&self) -> Vec<String> {
        self.tables_unchecked().areas.iter().map(|(_, name)| name.clone()).collect()
    }

    pub fn subarea_count(&self) -> usize {
        self.tables_unchecked().subareas.len()
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        let tables = self.tables()?;
        Ok(tables.users.iter().find(|u| u.username == username).cloned())
    }

    async fn create_user(&self, username: &str, password_hash: &str, role: &str) -> Result<i64, AppError> {
        let mut tables = self.tables()?;
        if tables.users.iter().any(|u| u.username == username) {
            return Err(AppError::Conflict(format!("Username '{}' already exists", username)));
        }
        let id = tables.next_id();
        tables.users.push(User {
            id,
            username: username.to_string(),
            password: password_hash.to_string(),
            role: role.to_string(),
        });
        Ok(id)
    }

    async fn list_simulations(&self) -> Result<Vec<Simulation>, AppError> {
        let tables = self.tables()?;
        let mut simulations = tables.simulations.clone();
        simulations.sort_by_key(|s| s.id);
        Ok(simulations)
    }

    async fn get_simulation(&self, id: i64) -> Result<Option<Simulation>, AppError> {
        let tables = self.tables()?;
        Ok(tables.simulations.iter().find(|s| s.id == id).cloned())
    }

    async fn simulation_questions(&self, simulation_id: i64) -> Result<Vec<SimulationQuestion>, AppError> {
        let tables = self.tables()?;
        let mut questions: Vec<SimulationQuestion> = tables
            .links
            .iter()
            .filter(|link| link.simulation_id == simulation_id)
            .filter_map(|link| {
                let question = tables.questions.iter().find(|q| q.id == link.question_id)?;
                Some(SimulationQuestion {
                    question_id: question.id,
                    order_index: link.order_index,
                    text: question.text.clone(),
                    points: question.points,
                })
            })
            .collect();
        questions.sort_by_key(|q| q.order_index);
        Ok(questions)
    }

    async fn all_simulation_pairs(&self) -> Result<Vec<SimulationPair>, AppError> {
        let tables = self.tables()?;
        Ok(tables.pairs_where(|_| true))
    }

    async fn pairs_for_questions(&self, question_ids: &[i64]) -> Result<Vec<SimulationPair>, AppError> {
        let tables = self.tables()?;
        Ok(tables.pairs_where(|link| question_ids.contains(&link.question_id)))
    }

    async fn pairs_for_simulations(&self, simulation_ids: &[i64]) -> Result<Vec<SimulationPair>, AppError> {
        let tables = self.tables()?;
        Ok(tables.pairs_where(|link| simulation_ids.contains(&link.simulation_id)))
    }

    async fn insert_simulation(&self, title: Option<&str>, question_ids: &[i64]) -> Result<i64, AppError> {
        let mut tables = self.tables()?;
        if let Some(existing) = tables.same_set_as(question_ids) {
            return Err(AppError::DuplicateSimulation(existing));
        }
        Ok(tables.push_simulation(title, question_ids))
    }

    async fn existing_question_ids(&self, ids: &[i64]) -> Result<Vec<i64>, AppError> {
        let tables = self.tables()?;
        Ok(ids
            .iter()
            .copied()
            .filter(|id| tables.questions.iter().any(|q| q.id == *id))
            .collect())
    }

    async fn list_areas(&self) -> Result<Vec<Area>, AppError> {
        let tables = self.tables()?;
        Ok(tables
            .areas
            .iter()
            .map(|(id, name)| Area { id: *id, name: name.clone() })
            .collect())
    }

    async fn list_subareas(&self) -> Result<Vec<Subarea>, AppError> {
        let tables = self.tables()?;
        Ok(tables
            .subareas
            .iter()
            .map(|(id, area_id, name)| Subarea {
                id: *id,
                area_id: *area_id,
                name: name.clone(),
            })
            .collect())
    }

    async fn question_classes(&self) -> Result<Vec<QuestionClass>, AppError> {
        let tables = self.tables()?;
        Ok(tables
            .questions
            .iter()
            .map(|q| QuestionClass {
                id: q.id,
                area_id: q.area_id,
                subarea_id: q.subarea_id,
            })
            .collect())
    }

    async fn get_candidate(&self, id: i64) -> Result<Option<Candidate>, AppError> {
        let tables = self.tables()?;
        Ok(tables.candidates.iter().find(|c| c.id == id).cloned())
    }

    async fn list_exams(&self) -> Result<Vec<CandidateExam>, AppError> {
        let tables = self.tables()?;
        Ok(tables.exams.iter().map(|exam| tables.exam_view(exam)).collect())
    }

    async fn get_exam(&self, id: i64) -> Result<Option<CandidateExam>, AppError> {
        let tables = self.tables()?;
        Ok(tables
            .exams
            .iter()
            .find(|exam| exam.id == id)
            .map(|exam| tables.exam_view(exam)))
    }

    async fn insert_exam(&self, exam: &CreateExamRequest) -> Result<i64, AppError> {
        let mut tables = self.tables()?;
        let id = tables.next_id();
        tables.exams.push(StoredExam {
            id,
            candidate_id: exam.candidate_id,
            exam_date: exam.exam_date,
            wrong_question_ids: exam.wrong_question_ids.clone(),
        });
        Ok(id)
    }

    async fn wrong_answer_rows(&self) -> Result<Vec<WrongAnswerRow>, AppError> {
        let tables = self.tables()?;
        Ok(tables
            .exams
            .iter()
            .flat_map(|exam| exam.wrong_question_ids.iter())
            .filter_map(|question_id| {
                let question = tables.questions.iter().find(|q| q.id == *question_id)?;
                Some(WrongAnswerRow {
                    question_id: question.id,
                    text: question.text.clone(),
                    area_id: question.area_id,
                    subarea_id: question.subarea_id,
                })
            })
            .collect())
    }

    async fn upsert_area(&self, name: &str) -> Result<i64, AppError> {
        let mut tables = self.tables()?;
        if let Some((id, _)) = tables.areas.iter().find(|(_, n)| n == name) {
            return Ok(*id);
        }
        let id = tables.next_id();
        tables.areas.push((id, name.to_string()));
        Ok(id)
    }

    async fn upsert_subarea(&self, area_id: i64, name: &str) -> Result<i64, AppError> {
        let mut tables = self.tables()?;
        if let Some((id, _, _)) = tables
            .subareas
            .iter()
            .find(|(_, area, n)| *area == area_id && n == name)
        {
            return Ok(*id);
        }
        let id = tables.next_id();
        tables.subareas.push((id, area_id, name.to_string()));
        Ok(id)
    }

    async fn insert_question(&self, question: &NewQuestion) -> Result<i64, AppError> {
        let mut tables = self.tables()?;
        let id = tables.next_id();
        tables.questions.push(StoredQuestion {
            id,
            area_id: Some(question.area_id),
            subarea_id: Some(question.subarea_id),
            text: question.text.clone(),
            points: question.points,
            multi_correct: question.multi_correct,
        });
        for answer in &question.answers {
            tables.answers.push((id, answer.text.clone(), answer.is_correct));
        }
        Ok(id)
    }
}
