//! CSV output boundary. Presentation only; all reconciliation decisions are
//! made upstream.

use crate::matching::MatchOutcome;
use crate::types::{Province, ProvincePopulation};
use anyhow::{Context, Result};
use csv::WriterBuilder;
use std::fs;
use std::path::Path;
use tracing::info;

/// Write the per-province population table, one row per province,
/// `;`-delimited for the downstream consumers.
pub fn write_population_csv(
    path: &Path,
    provinces: &[Province],
    finals: &[ProvincePopulation],
) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create output directory: {:?}", parent))?;
    }

    let mut writer = WriterBuilder::new()
        .delimiter(b';')
        .from_path(path)
        .with_context(|| format!("Failed to create output CSV: {:?}", path))?;

    writer.write_record([
        "province_id",
        "province_name",
        "country",
        "population",
        "population_date",
        "population_source",
    ])?;

    for (province, entry) in provinces.iter().zip(finals) {
        writer.write_record([
            entry.province_id.to_string(),
            province.name.clone(),
            province.country_name.clone(),
            entry.population.to_string(),
            entry.date.map(|d| d.to_string()).unwrap_or_default(),
            entry.provenance.label().to_string(),
        ])?;
    }

    writer.flush()?;
    info!("Wrote {} province entries to {:?}", finals.len(), path);
    Ok(())
}

/// Write the match debug table: for every province, which source row won and
/// through which tier. Raw labels and the source row index are carried so an
/// operator can trace a value back to the input.
pub fn write_debug_csv(
    path: &Path,
    provinces: &[Province],
    outcome: &MatchOutcome,
) -> Result<()> {
    let mut writer = WriterBuilder::new()
        .delimiter(b';')
        .from_path(path)
        .with_context(|| format!("Failed to create debug CSV: {:?}", path))?;

    writer.write_record([
        "province_id",
        "province_name",
        "province_country",
        "match_method",
        "matched_population",
        "matched_population_date",
        "source_region",
        "source_country",
        "source_population",
        "source_population_date",
        "source_index",
    ])?;

    for province in provinces {
        match outcome.assignments.get(&province.id) {
            Some(assignment) => {
                let record = &assignment.record;
                writer.write_record([
                    province.id.to_string(),
                    province.name.clone(),
                    province.country_name.clone(),
                    assignment.tier.label().to_string(),
                    // Truncated integer, the value the output table carries.
                    record
                        .population
                        .map(|p| (p.trunc() as i64).to_string())
                        .unwrap_or_default(),
                    record.date.map(|d| d.to_string()).unwrap_or_default(),
                    record.region_label.clone(),
                    record.country_label.clone(),
                    record
                        .population
                        .map(|p| p.to_string())
                        .unwrap_or_default(),
                    record.date.map(|d| d.to_string()).unwrap_or_default(),
                    record.source_index.to_string(),
                ])?;
            }
            None => {
                writer.write_record([
                    province.id.to_string(),
                    province.name.clone(),
                    province.country_name.clone(),
                    "unmatched".to_string(),
                    String::new(),
                    String::new(),
                    String::new(),
                    String::new(),
                    String::new(),
                    String::new(),
                    String::new(),
                ])?;
            }
        }
    }

    writer.flush()?;
    info!("Wrote match debug table to {:?}", path);
    Ok(())
}
