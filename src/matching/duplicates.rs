// src/matching/duplicates.rs

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::config::SIMULATION_QUESTION_COUNT;
use crate::matching::fingerprint::{Fingerprint, build_fingerprint};
use crate::models::simulation::SimulationPair;

/// Result of scanning every stored simulation for identical question sets.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DuplicateReport {
    /// Each group holds two or more simulation IDs, ascending.
    /// Groups are ordered by their smallest member.
    pub groups: Vec<Vec<i64>>,
    /// Simulations left out because they do not have exactly 41 distinct questions.
    pub skipped: Vec<i64>,
}

/// Collects pairs into `simulation_id -> question IDs`.
///
/// `simulation_ids` seeds the map so simulations without any link still show up.
pub fn group_pairs<I>(simulation_ids: &[i64], pairs: I) -> BTreeMap<i64, Vec<i64>>
where
    I: IntoIterator<Item = SimulationPair>,
{
    let mut map: BTreeMap<i64, Vec<i64>> = simulation_ids.iter().map(|id| (*id, Vec::new())).collect();
    for pair in pairs {
        map.entry(pair.simulation_id).or_default().push(pair.question_id);
    }
    map
}

/// Partitions simulations into groups sharing the same 41-question fingerprint.
pub fn find_duplicate_groups(simulations: &BTreeMap<i64, Vec<i64>>) -> DuplicateReport {
    let mut by_fingerprint: HashMap<Fingerprint, Vec<i64>> = HashMap::new();
    let mut skipped = Vec::new();

    for (simulation_id, question_ids) in simulations {
        let fingerprint = build_fingerprint(question_ids.iter().copied());
        if fingerprint.len() != SIMULATION_QUESTION_COUNT {
            skipped.push(*simulation_id);
            continue;
        }
        by_fingerprint.entry(fingerprint).or_default().push(*simulation_id);
    }

    let mut groups: Vec<Vec<i64>> = by_fingerprint
        .into_values()
        .filter(|members| members.len() > 1)
        .map(|mut members| {
            members.sort_unstable();
            members
        })
        .collect();
    groups.sort_unstable_by_key(|members| members[0]);
    skipped.sort_unstable();

    DuplicateReport { groups, skipped }
}
