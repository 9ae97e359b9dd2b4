//! Tiered record linkage between population records and province identities.

use crate::lookup::IdentityIndex;
use crate::types::{MatchAssignment, MatchTier, PopulationRecord};
use std::collections::BTreeMap;
use tracing::info;

/// Acceptance gate for the best-ratio fallback inside the containment-seeded
/// fuzzy search.
pub const FUZZY_CONTAIN_MIN: f64 = 0.8;
/// Acceptance gate for the last-resort best-overall fuzzy match.
pub const FUZZY_BEST_MIN: f64 = 0.55;

#[derive(Debug, Default)]
pub struct MatchOutcome {
    /// Province id -> winning assignment, in id order.
    pub assignments: BTreeMap<usize, MatchAssignment>,
    /// Records that found no province at all: (region label, country label),
    /// raw text for operator diagnostics.
    pub unmatched: Vec<(String, String)>,
}

/// Character-sequence similarity ratio in [0, 1].
fn similarity(a: &str, b: &str) -> f64 {
    strsim::normalized_levenshtein(a, b)
}

/// Containment-seeded fuzzy search: every province whose normalized name
/// contains the region key or vice versa; if none, the single best ratio at
/// or above [`FUZZY_CONTAIN_MIN`].
pub fn fuzzy_region_match(norm_region: &str, fuzzy: &[(usize, String)]) -> Vec<usize> {
    if norm_region.is_empty() {
        return Vec::new();
    }

    let hits: Vec<usize> = fuzzy
        .iter()
        .filter(|(_, name)| name.contains(norm_region) || norm_region.contains(name.as_str()))
        .map(|(pid, _)| *pid)
        .collect();
    if !hits.is_empty() {
        return hits;
    }

    let mut best = None;
    let mut best_ratio = 0.0;
    for (pid, name) in fuzzy {
        let ratio = similarity(norm_region, name);
        if ratio > best_ratio && ratio >= FUZZY_CONTAIN_MIN {
            best = Some(*pid);
            best_ratio = ratio;
        }
    }
    best.into_iter().collect()
}

/// Link every population record to at most one province.
///
/// Strategies run in strict descending priority, stopping at the first
/// non-empty candidate set. Below the ISO tier, a declared country vetoes
/// candidates from other countries outright; an emptied set means the record
/// is unmatched, not demoted. Conflicting claims on one province are settled
/// by tier rank, then by later observation date.
pub fn match_records(records: &[PopulationRecord], index: &IdentityIndex) -> MatchOutcome {
    let mut outcome = MatchOutcome::default();

    for record in records {
        let (hits, tier) = find_candidates(record, index);

        // Country veto: a declared country filters name-based candidates.
        // An emptied set means unmatched, never a demotion to a lower tier.
        let hits = if tier != MatchTier::Iso && !record.norm_country.is_empty() {
            hits.into_iter()
                .filter(|pid| index.country_of.get(pid).map(String::as_str) == Some(record.norm_country.as_str()))
                .collect()
        } else {
            hits
        };

        let pid = match hits.first() {
            Some(&pid) => pid,
            None => {
                outcome
                    .unmatched
                    .push((record.region_label.clone(), record.country_label.clone()));
                continue;
            }
        };

        claim(&mut outcome.assignments, pid, record, tier);
    }

    info!(
        "Matched {} provinces, {} records unmatched",
        outcome.assignments.len(),
        outcome.unmatched.len()
    );
    outcome
}

fn find_candidates(record: &PopulationRecord, index: &IdentityIndex) -> (Vec<usize>, MatchTier) {
    if !record.norm_iso.is_empty() {
        if let Some(&pid) = index.by_iso.get(&record.norm_iso) {
            return (vec![pid], MatchTier::Iso);
        }
    }

    if !record.norm_region.is_empty() {
        let pair = (record.norm_region.clone(), record.norm_country.clone());
        if let Some(hits) = index.by_region_country.get(&pair) {
            if !hits.is_empty() {
                return (hits.clone(), MatchTier::ExactCountry);
            }
        }

        if let Some(hits) = index.by_region.get(&record.norm_region) {
            if !hits.is_empty() {
                return (hits.clone(), MatchTier::RegionOnly);
            }
        }

        let hits = fuzzy_region_match(&record.norm_region, &index.fuzzy);
        if !hits.is_empty() {
            return (hits, MatchTier::FuzzyContain);
        }

        let mut best = None;
        let mut best_ratio = 0.0;
        for (pid, name) in &index.fuzzy {
            let ratio = similarity(&record.norm_region, name);
            if ratio > best_ratio {
                best_ratio = ratio;
                best = Some(*pid);
            }
        }
        if best_ratio >= FUZZY_BEST_MIN {
            if let Some(pid) = best {
                return (vec![pid], MatchTier::FuzzyBest);
            }
        }
    }

    (Vec::new(), MatchTier::ExactCountry)
}

fn claim(
    assignments: &mut BTreeMap<usize, MatchAssignment>,
    pid: usize,
    record: &PopulationRecord,
    tier: MatchTier,
) {
    match assignments.get(&pid) {
        None => {
            assignments.insert(
                pid,
                MatchAssignment {
                    record: record.clone(),
                    tier,
                },
            );
        }
        Some(existing) => {
            let replace = tier.rank() > existing.tier.rank()
                || (tier.rank() == existing.tier.rank()
                    && later_observation(record.date, existing.record.date));
            if replace {
                assignments.insert(
                    pid,
                    MatchAssignment {
                        record: record.clone(),
                        tier,
                    },
                );
            }
            // A record that loses the tie-break found a real identity; it is
            // discarded, not reported as unmatched.
        }
    }
}

/// True only when both observations are dated and the new one is strictly
/// later. An undated record never displaces anything at equal tier.
fn later_observation(
    new: Option<chrono::NaiveDate>,
    old: Option<chrono::NaiveDate>,
) -> bool {
    matches!((new, old), (Some(n), Some(o)) if n > o)
}
