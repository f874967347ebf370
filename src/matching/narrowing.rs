// src/matching/narrowing.rs

use std::collections::{BTreeMap, BTreeSet};

use crate::{
    config::SIMULATION_QUESTION_COUNT,
    error::AppError,
    matching::fingerprint::{Fingerprint, build_fingerprint},
    models::simulation::SimulationPair,
    store::Repository,
};

/// Checks the shape of a new simulation's question list.
///
/// Exactly 41 IDs, none repeated. Runs before any store lookup.
pub fn validate_new_set(new_ids: &[i64]) -> Result<Fingerprint, AppError> {
    let fingerprint = build_fingerprint(new_ids.iter().copied());
    if new_ids.len() != SIMULATION_QUESTION_COUNT || fingerprint.len() != SIMULATION_QUESTION_COUNT {
        return Err(AppError::BadRequest(format!(
            "A simulation needs exactly {} distinct questions, got {} ({} distinct)",
            SIMULATION_QUESTION_COUNT,
            new_ids.len(),
            fingerprint.len()
        )));
    }
    Ok(fingerprint)
}

/// Distinct question IDs per simulation.
fn distinct_per_simulation(pairs: &[SimulationPair]) -> BTreeMap<i64, BTreeSet<i64>> {
    let mut map: BTreeMap<i64, BTreeSet<i64>> = BTreeMap::new();
    for pair in pairs {
        map.entry(pair.simulation_id).or_default().insert(pair.question_id);
    }
    map
}

/// Step 1: simulations whose rows, restricted to the new set, hit every one of
/// its `expected` IDs. Ascending by simulation ID.
pub fn containment_candidates(matched: &[SimulationPair], expected: usize) -> Vec<i64> {
    distinct_per_simulation(matched)
        .into_iter()
        .filter(|(_, ids)| ids.len() == expected)
        .map(|(simulation_id, _)| simulation_id)
        .collect()
}

/// Step 2: the first candidate whose full question set has exactly `expected`
/// distinct IDs, i.e. nothing beyond the new set.
pub fn confirm_exact(candidates: &[i64], all_rows: &[SimulationPair], expected: usize) -> Option<i64> {
    let totals = distinct_per_simulation(all_rows);
    candidates
        .iter()
        .copied()
        .find(|id| totals.get(id).map(BTreeSet::len) == Some(expected))
}

/// Looks for a stored simulation with exactly the same 41 questions as `new_ids`.
///
/// Two reads: rows restricted to the new question IDs narrow the field to
/// simulations containing the whole set, then only those candidates are
/// re-read in full to rule out extra questions.
pub async fn find_existing_duplicate(
    repo: &dyn Repository,
    new_ids: &[i64],
) -> Result<Option<i64>, AppError> {
    let fingerprint = validate_new_set(new_ids)?;

    let matched = repo.pairs_for_questions(fingerprint.ids()).await?;
    let candidates = containment_candidates(&matched, SIMULATION_QUESTION_COUNT);
    if candidates.is_empty() {
        return Ok(None);
    }

    tracing::debug!("{} simulation(s) contain the whole set, confirming", candidates.len());

    let all_rows = repo.pairs_for_simulations(&candidates).await?;
    Ok(confirm_exact(&candidates, &all_rows, SIMULATION_QUESTION_COUNT))
}
