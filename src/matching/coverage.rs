// src/matching/coverage.rs

use std::collections::{BTreeMap, BTreeSet};

use crate::{
    matching::fingerprint::{Fingerprint, build_fingerprint},
    models::{
        exam::{CandidateExam, CoverageMatch},
        simulation::{Simulation, SimulationPair},
    },
};

/// Fingerprints keyed by simulation ID; iteration is ascending by ID.
pub type SimulationSets = BTreeMap<i64, Fingerprint>;

pub fn simulation_sets<I>(pairs: I) -> SimulationSets
where
    I: IntoIterator<Item = SimulationPair>,
{
    let mut raw: BTreeMap<i64, Vec<i64>> = BTreeMap::new();
    for pair in pairs {
        raw.entry(pair.simulation_id).or_default().push(pair.question_id);
    }
    raw.into_iter()
        .map(|(id, ids)| (id, build_fingerprint(ids)))
        .collect()
}

/// First simulation (lowest ID) whose questions include every missed question.
///
/// An empty `missed` set never matches.
pub fn find_covering_simulation(missed: &BTreeSet<i64>, simulations: &SimulationSets) -> Option<i64> {
    if missed.is_empty() {
        return None;
    }
    simulations
        .iter()
        .find(|(_, fingerprint)| fingerprint.covers(missed))
        .map(|(id, _)| *id)
}

/// Coverage result for one exam, or `None` when it has no mistakes, no
/// candidate record, or nothing covers it.
pub fn match_exam(
    exam: &CandidateExam,
    simulations: &[Simulation],
    sets: &SimulationSets,
) -> Option<CoverageMatch> {
    let missed: BTreeSet<i64> = exam.wrong_question_ids.iter().copied().collect();
    let simulation_id = find_covering_simulation(&missed, sets)?;
    let simulation = simulations.iter().find(|s| s.id == simulation_id)?.clone();
    let candidate = exam.candidate.clone()?;

    Some(CoverageMatch {
        exam_id: exam.id,
        exam_date: exam.exam_date,
        wrong_count: exam.wrong_question_ids.len(),
        candidate,
        simulation,
    })
}

/// Runs `match_exam` over every exam, keeping the exams' order.
pub fn match_exams(
    exams: &[CandidateExam],
    simulations: &[Simulation],
    sets: &SimulationSets,
) -> Vec<CoverageMatch> {
    exams
        .iter()
        .filter_map(|exam| match_exam(exam, simulations, sets))
        .collect()
}
