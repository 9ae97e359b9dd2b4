//! Deterministic gap-filling: every province leaves this stage with a
//! strictly positive population value and a provenance tag.

use crate::matching::MatchOutcome;
use crate::types::{Province, ProvincePopulation, Provenance};
use std::collections::HashMap;
use tracing::warn;

/// Perturbation modulus for country-median fills.
pub const COUNTRY_FILL_MOD: u64 = 997;
/// Perturbation modulus for global-median and last-resort fills.
pub const GLOBAL_FILL_MOD: u64 = 991;

/// Fill population for every province, in province id order.
///
/// Fallback chain: the matched value when present and positive; else the
/// country median of matched values plus `id % 997`; else the global median
/// plus `id % 991`; else `1 + id % 991`. The perturbation keeps filled values
/// distinct across provinces sharing a fallback while staying reproducible
/// from province identifiers alone.
pub fn impute(provinces: &[Province], outcome: &MatchOutcome) -> Vec<ProvincePopulation> {
    let mut matched_values: HashMap<usize, f64> = HashMap::new();
    for (&pid, assignment) in &outcome.assignments {
        if let Some(pop) = assignment.record.population {
            if pop > 0.0 {
                matched_values.insert(pid, pop);
            }
        }
    }

    if matched_values.is_empty() {
        warn!("No population values matched anywhere; every province will be filled synthetically");
    }

    let mut country_values: HashMap<&str, Vec<f64>> = HashMap::new();
    for province in provinces {
        if let Some(&value) = matched_values.get(&province.id) {
            country_values
                .entry(province.country_code.as_str())
                .or_default()
                .push(value);
        }
    }
    let country_median: HashMap<&str, f64> = country_values
        .into_iter()
        .map(|(country, values)| (country, median(values)))
        .collect();
    let global_median = {
        let all: Vec<f64> = matched_values.values().copied().collect();
        if all.is_empty() {
            None
        } else {
            Some(median(all))
        }
    };

    provinces
        .iter()
        .map(|province| {
            let pid = province.id as u64;

            if let Some(&value) = matched_values.get(&province.id) {
                let assignment = &outcome.assignments[&province.id];
                return ProvincePopulation {
                    province_id: province.id,
                    population: value.trunc() as u64,
                    provenance: Provenance::Matched(assignment.tier),
                    date: assignment.record.date,
                };
            }

            if let Some(&med) = country_median.get(province.country_code.as_str()) {
                return ProvincePopulation {
                    province_id: province.id,
                    population: positive_base(med) + pid % COUNTRY_FILL_MOD,
                    provenance: Provenance::FilledCountry,
                    date: None,
                };
            }

            let base = global_median.map(positive_base).unwrap_or(1);
            ProvincePopulation {
                province_id: province.id,
                population: base + pid % GLOBAL_FILL_MOD,
                provenance: Provenance::FilledGlobal,
                date: None,
            }
        })
        .collect()
}

/// Truncate a median to an integer base, never below 1 so the output stays
/// strictly positive even when the perturbation term is zero.
fn positive_base(value: f64) -> u64 {
    let truncated = value.trunc() as u64;
    truncated.max(1)
}

fn median(mut values: Vec<f64>) -> f64 {
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}
