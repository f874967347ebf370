// src/matching/mod.rs
//
// Set arithmetic over simulation question IDs. Everything here works on data
// already fetched; the only store access is in `narrowing`.

pub mod coverage;
pub mod duplicates;
pub mod fingerprint;
pub mod frequency;
pub mod narrowing;

pub use coverage::find_covering_simulation;
pub use duplicates::{DuplicateReport, find_duplicate_groups};
pub use fingerprint::{Fingerprint, build_fingerprint};
pub use narrowing::find_existing_duplicate;
