// src/matching/fingerprint.rs

use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;

/// Canonical identity of a simulation: its question IDs, sorted ascending
/// with duplicates removed. Order and multiplicity of the input are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Fingerprint(Vec<i64>);

impl Fingerprint {
    pub fn ids(&self) -> &[i64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, question_id: i64) -> bool {
        self.0.binary_search(&question_id).is_ok()
    }

    /// True when every ID of `subset` is part of this fingerprint.
    pub fn covers(&self, subset: &BTreeSet<i64>) -> bool {
        subset.iter().all(|id| self.contains(*id))
    }

    /// Comma-joined form, e.g. `"3,7,12"`.
    pub fn key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for id in &self.0 {
            if !first {
                f.write_str(",")?;
            }
            write!(f, "{}", id)?;
            first = false;
        }
        Ok(())
    }
}

impl FromIterator<i64> for Fingerprint {
    fn from_iter<I: IntoIterator<Item = i64>>(iter: I) -> Self {
        let mut ids: Vec<i64> = iter.into_iter().collect();
        ids.sort_unstable();
        ids.dedup();
        Fingerprint(ids)
    }
}

/// Builds the fingerprint of a raw list of question IDs.
pub fn build_fingerprint<I>(ids: I) -> Fingerprint
where
    I: IntoIterator<Item = i64>,
{
    ids.into_iter().collect()
}
