// src/matching/frequency.rs

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::models::{
    exam::{WrongAnswerRow, WrongQuestionParams},
    question::{Area, QuestionClass, Subarea},
    simulation::{QuestionUsage, SimulationPair, UsageParams},
};

/// Number of distinct simulations each question appears in, most used first.
pub fn question_usage<I>(pairs: I) -> Vec<QuestionUsage>
where
    I: IntoIterator<Item = SimulationPair>,
{
    let mut sims_by_question: BTreeMap<i64, BTreeSet<i64>> = BTreeMap::new();
    for pair in pairs {
        sims_by_question
            .entry(pair.question_id)
            .or_default()
            .insert(pair.simulation_id);
    }

    let mut usage: Vec<QuestionUsage> = sims_by_question
        .into_iter()
        .map(|(question_id, sims)| QuestionUsage {
            question_id,
            simulations_count: sims.len(),
        })
        .collect();
    // stable: ties stay ascending by question ID
    usage.sort_by(|a, b| b.simulations_count.cmp(&a.simulations_count));
    usage
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct UsedQuestion {
    #[serde(flatten)]
    pub usage: QuestionUsage,
    pub area_id: Option<i64>,
    pub subarea_id: Option<i64>,
}

/// Questions filed under one area or subarea: how many exist, how many of
/// them appear in at least one simulation.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ClassUsage {
    pub id: i64,
    pub name: String,
    /// Parent area; set for subareas only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub area_id: Option<i64>,
    pub total: usize,
    pub used: usize,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct UsageReport {
    pub questions: Vec<UsedQuestion>,
    pub areas: Vec<ClassUsage>,
    pub subareas: Vec<ClassUsage>,
}

/// Question usage annotated with area and subarea, filtered by `params`.
///
/// Area and subarea counts always cover the whole catalogue; with an
/// `area_id` filter only that area's subareas are listed.
pub fn usage_report(
    pairs: Vec<SimulationPair>,
    classes: &[QuestionClass],
    areas: &[Area],
    subareas: &[Subarea],
    params: &UsageParams,
) -> UsageReport {
    let class_of: HashMap<i64, QuestionClass> = classes.iter().map(|c| (c.id, *c)).collect();

    let mut total_by_area: HashMap<i64, usize> = HashMap::new();
    let mut total_by_subarea: HashMap<i64, usize> = HashMap::new();
    for class in classes {
        if let Some(area_id) = class.area_id {
            *total_by_area.entry(area_id).or_default() += 1;
        }
        if let Some(subarea_id) = class.subarea_id {
            *total_by_subarea.entry(subarea_id).or_default() += 1;
        }
    }

    let questions: Vec<UsedQuestion> = question_usage(pairs)
        .into_iter()
        .map(|usage| {
            let class = class_of.get(&usage.question_id);
            UsedQuestion {
                area_id: class.and_then(|c| c.area_id),
                subarea_id: class.and_then(|c| c.subarea_id),
                usage,
            }
        })
        .collect();

    // one entry per question, so these count distinct used questions
    let mut used_by_area: HashMap<i64, usize> = HashMap::new();
    let mut used_by_subarea: HashMap<i64, usize> = HashMap::new();
    for question in &questions {
        if let Some(area_id) = question.area_id {
            *used_by_area.entry(area_id).or_default() += 1;
        }
        if let Some(subarea_id) = question.subarea_id {
            *used_by_subarea.entry(subarea_id).or_default() += 1;
        }
    }

    let areas = areas
        .iter()
        .map(|area| ClassUsage {
            id: area.id,
            name: area.name.clone(),
            area_id: None,
            total: total_by_area.get(&area.id).copied().unwrap_or(0),
            used: used_by_area.get(&area.id).copied().unwrap_or(0),
        })
        .collect();

    let subareas = subareas
        .iter()
        .filter(|sub| params.area_id.is_none() || params.area_id == Some(sub.area_id))
        .map(|sub| ClassUsage {
            id: sub.id,
            name: sub.name.clone(),
            area_id: Some(sub.area_id),
            total: total_by_subarea.get(&sub.id).copied().unwrap_or(0),
            used: used_by_subarea.get(&sub.id).copied().unwrap_or(0),
        })
        .collect();

    let questions = questions
        .into_iter()
        .filter(|q| params.area_id.is_none() || q.area_id == params.area_id)
        .filter(|q| params.subarea_id.is_none() || q.subarea_id == params.subarea_id)
        .collect();

    UsageReport {
        questions,
        areas,
        subareas,
    }
}

/// How often a question must have been missed to be listed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrequencyBand {
    Any,
    ExactlyTwo,
    ThreeOrMore,
}

impl FrequencyBand {
    pub fn from_input(freq: Option<i64>) -> Self {
        match freq {
            None => FrequencyBand::Any,
            Some(n) if n <= 1 => FrequencyBand::Any,
            Some(2) => FrequencyBand::ExactlyTwo,
            Some(_) => FrequencyBand::ThreeOrMore,
        }
    }

    pub fn accepts(self, count: usize) -> bool {
        match self {
            FrequencyBand::Any => count >= 1,
            FrequencyBand::ExactlyTwo => count == 2,
            FrequencyBand::ThreeOrMore => count >= 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WrongQuestionStat {
    pub question_id: i64,
    pub text: String,
    pub area_id: Option<i64>,
    pub subarea_id: Option<i64>,
    pub wrong_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WrongQuestionReport {
    pub band: FrequencyBand,
    pub questions: Vec<WrongQuestionStat>,
    /// Wrong-answer rows per area, repeats included.
    pub area_counts: BTreeMap<i64, usize>,
    /// Wrong-answer rows per subarea, repeats included.
    pub subarea_counts: BTreeMap<i64, usize>,
}

/// Summarises wrong-answer rows into per-question counts, then filters by
/// area, subarea and frequency band.
pub fn wrong_question_report(rows: &[WrongAnswerRow], params: &WrongQuestionParams) -> WrongQuestionReport {
    let band = FrequencyBand::from_input(params.freq);

    let mut area_counts: BTreeMap<i64, usize> = BTreeMap::new();
    let mut subarea_counts: BTreeMap<i64, usize> = BTreeMap::new();
    let mut counts: HashMap<i64, usize> = HashMap::new();
    let mut distinct: Vec<&WrongAnswerRow> = Vec::new();

    for row in rows {
        if let Some(subarea_id) = row.subarea_id {
            *subarea_counts.entry(subarea_id).or_default() += 1;
            if let Some(area_id) = row.area_id {
                *area_counts.entry(area_id).or_default() += 1;
            }
        }

        let count = counts.entry(row.question_id).or_default();
        if *count == 0 {
            distinct.push(row);
        }
        *count += 1;
    }

    let mut questions: Vec<WrongQuestionStat> = distinct
        .into_iter()
        .filter(|row| params.area_id.is_none() || row.area_id == params.area_id)
        .filter(|row| params.subarea_id.is_none() || row.subarea_id == params.subarea_id)
        .map(|row| WrongQuestionStat {
            question_id: row.question_id,
            text: row.text.clone(),
            area_id: row.area_id,
            subarea_id: row.subarea_id,
            wrong_count: counts.get(&row.question_id).copied().unwrap_or(0),
        })
        .filter(|stat| band.accepts(stat.wrong_count))
        .collect();
    questions.sort_by(|a, b| b.wrong_count.cmp(&a.wrong_count));

    WrongQuestionReport {
        band,
        questions,
        area_counts,
        subarea_counts,
    }
}
