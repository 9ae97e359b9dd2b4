//! Loads the raw population table and deduplicates it to one latest record
//! per identity key.

use crate::types::PopulationRecord;
use anyhow::{anyhow, Context, Result};
use chrono::NaiveDate;
use csv::ReaderBuilder;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::info;

/// Prefer `query.csv` in the population directory, otherwise the
/// lexicographically last `query*.csv`.
pub fn resolve_query_path(dir: &Path) -> Result<PathBuf> {
    let preferred = dir.join("query.csv");
    if preferred.exists() {
        return Ok(preferred);
    }

    let mut candidates: Vec<PathBuf> = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read population directory: {:?}", dir))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.starts_with("query") && n.ends_with(".csv"))
                .unwrap_or(false)
        })
        .collect();
    candidates.sort();

    candidates
        .pop()
        .ok_or_else(|| anyhow!("No query CSV found (expected query*.csv in {:?})", dir))
}

pub fn load_population(dir: &Path) -> Result<Vec<PopulationRecord>> {
    let path = resolve_query_path(dir)?;
    info!("Loading population table from {:?}", path);
    let file =
        File::open(&path).with_context(|| format!("Failed to open population CSV: {:?}", path))?;
    load_population_from_reader(file)
}

/// Parse and deduplicate the population table.
///
/// The `regionLabel` column is required; `iso`, `countryLabel`, `population`
/// and `populationDate` are optional and default to empty. Rows carrying an
/// ISO code are keyed by that code alone (ISO is authoritative identity);
/// the rest are keyed by the (region, country) pair, since the same region
/// name recurs across countries.
pub fn load_population_from_reader<R: Read>(reader: R) -> Result<Vec<PopulationRecord>> {
    let mut rdr = ReaderBuilder::new().from_reader(reader);
    let headers = rdr.headers()?.clone();

    let region_idx = headers
        .iter()
        .position(|h| h == "regionLabel")
        .ok_or_else(|| anyhow!("Missing required column 'regionLabel' in population CSV"))?;
    let iso_idx = headers.iter().position(|h| h == "iso");
    let country_idx = headers.iter().position(|h| h == "countryLabel");
    let population_idx = headers.iter().position(|h| h == "population");
    let date_idx = headers.iter().position(|h| h == "populationDate");

    let mut rows = Vec::new();
    for (source_index, result) in rdr.records().enumerate() {
        let record = result?;
        let field = |idx: Option<usize>| idx.and_then(|i| record.get(i)).unwrap_or("");

        rows.push(PopulationRecord::new(
            source_index,
            field(Some(region_idx)),
            field(country_idx),
            field(iso_idx),
            parse_population(field(population_idx)),
            parse_date(field(date_idx)),
        ));
    }

    let total = rows.len();
    let latest = dedupe_latest(rows);
    info!(
        "Population table: {} raw rows, {} after deduplication",
        total,
        latest.len()
    );
    Ok(latest)
}

fn parse_population(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok()
}

/// Accepts plain ISO dates and Wikidata-style timestamps
/// ("2021-01-01T00:00:00Z") by parsing the date component before any time
/// part. Zero padding is not required.
fn parse_date(raw: &str) -> Option<NaiveDate> {
    let date_part = raw.trim().split(['T', ' ']).next()?;
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
}

/// Collapse duplicate submissions to the single latest record per identity
/// key. A dated record beats an undated one; among equal dates the later
/// source row wins.
pub fn dedupe_latest(rows: Vec<PopulationRecord>) -> Vec<PopulationRecord> {
    use std::collections::btree_map::Entry;

    let mut by_iso: BTreeMap<String, PopulationRecord> = BTreeMap::new();
    let mut by_pair: BTreeMap<(String, String), PopulationRecord> = BTreeMap::new();

    for row in rows {
        if !row.norm_iso.is_empty() {
            match by_iso.entry(row.norm_iso.clone()) {
                Entry::Vacant(slot) => {
                    slot.insert(row);
                }
                Entry::Occupied(mut slot) => {
                    if newer(&row, slot.get()) {
                        slot.insert(row);
                    }
                }
            }
        } else {
            let key = (row.norm_region.clone(), row.norm_country.clone());
            match by_pair.entry(key) {
                Entry::Vacant(slot) => {
                    slot.insert(row);
                }
                Entry::Occupied(mut slot) => {
                    if newer(&row, slot.get()) {
                        slot.insert(row);
                    }
                }
            }
        }
    }

    // Deterministic output order: ISO-keyed records first, then pair-keyed,
    // each in sorted key order.
    by_iso
        .into_values()
        .chain(by_pair.into_values())
        .collect()
}

fn newer(candidate: &PopulationRecord, incumbent: &PopulationRecord) -> bool {
    match (candidate.date, incumbent.date) {
        (Some(new), Some(old)) => {
            new > old || (new == old && candidate.source_index > incumbent.source_index)
        }
        (Some(_), None) => true,
        (None, Some(_)) => false,
        (None, None) => candidate.source_index > incumbent.source_index,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn date(s: &str) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
    }

    #[test]
    fn iso_duplicates_collapse_to_latest_date() {
        let rows = vec![
            PopulationRecord::new(0, "Paris", "France", "FR-75", Some(2_000_000.0), date("2015-01-01")),
            PopulationRecord::new(1, "Paris", "France", "FR-75", Some(2_100_000.0), date("2020-01-01")),
        ];
        let out = dedupe_latest(rows);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].population, Some(2_100_000.0));
    }

    #[test]
    fn iso_duplicates_ignore_submission_order() {
        let rows = vec![
            PopulationRecord::new(0, "Paris", "France", "FR-75", Some(2_100_000.0), date("2020-01-01")),
            PopulationRecord::new(1, "Paris", "France", "FR-75", Some(2_000_000.0), date("2015-01-01")),
        ];
        let out = dedupe_latest(rows);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].population, Some(2_100_000.0));
    }

    #[test]
    fn dated_record_beats_undated() {
        let rows = vec![
            PopulationRecord::new(0, "Paris", "France", "FR-75", Some(9.0), None),
            PopulationRecord::new(1, "Paris", "France", "FR-75", Some(5.0), date("2010-01-01")),
        ];
        let out = dedupe_latest(rows);
        assert_eq!(out[0].population, Some(5.0));
    }

    #[test]
    fn rows_without_iso_key_on_region_and_country() {
        let rows = vec![
            PopulationRecord::new(0, "Southern", "Zambia", "", Some(1.0), date("2010-01-01")),
            PopulationRecord::new(1, "Southern", "Rwanda", "", Some(2.0), date("2010-01-01")),
            PopulationRecord::new(2, "Southern", "Zambia", "", Some(3.0), date("2012-01-01")),
        ];
        let out = dedupe_latest(rows);
        assert_eq!(out.len(), 2);
        let zambia = out.iter().find(|r| r.norm_country == "zambia").unwrap();
        assert_eq!(zambia.population, Some(3.0));
    }

    #[test]
    fn missing_population_stays_null() {
        let csv = "regionLabel,iso,countryLabel,population,populationDate\n\
                   Nowhere,XX-1,Xland,,2020-01-01\n";
        let out = load_population_from_reader(Cursor::new(csv)).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].population, None);
    }

    #[test]
    fn missing_region_column_is_fatal() {
        let csv = "name,population\nSomewhere,1000\n";
        let err = load_population_from_reader(Cursor::new(csv)).unwrap_err();
        assert!(err.to_string().contains("regionLabel"));
    }

    #[test]
    fn optional_columns_may_be_absent() {
        let csv = "regionLabel,population\nSomewhere,1234\n";
        let out = load_population_from_reader(Cursor::new(csv)).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].population, Some(1234.0));
        assert_eq!(out[0].norm_country, "");
        assert_eq!(out[0].norm_iso, "");
    }

    #[test]
    fn short_dates_without_zero_padding_parse() {
        let csv = "regionLabel,iso,population,populationDate\n\
                   Paris,FR-75,100,2021-6-1\n";
        let out = load_population_from_reader(Cursor::new(csv)).unwrap();
        assert_eq!(out[0].date, date("2021-06-01"));
    }

    #[test]
    fn wikidata_timestamps_parse_as_dates() {
        let csv = "regionLabel,iso,population,populationDate\n\
                   Paris,FR-75,100,2021-06-01T00:00:00Z\n";
        let out = load_population_from_reader(Cursor::new(csv)).unwrap();
        assert_eq!(out[0].date, date("2021-06-01"));
    }
}
