use chrono::NaiveDate;
use geo::MultiPolygon;

/// One administrative region polygon. Belongs to exactly one country.
///
/// `id` is assigned once, after consolidation compacts the surviving records
/// to a dense 0..N-1 range, and is stable for the rest of the pipeline.
#[derive(Debug, Clone)]
pub struct Province {
    pub id: usize,
    /// Three-letter country code, e.g. "DNK".
    pub country_code: String,
    /// Human-readable country name, e.g. "Denmark". May be empty.
    pub country_name: String,
    /// Primary name of the province.
    pub name: String,
    /// Alternate name variant, if the source carries one.
    pub name_alt: Option<String>,
    /// ISO 3166-2 subdivision code, if the source carries one.
    pub iso_code: Option<String>,
    /// Planar area in the working projection (m²).
    pub area: f64,
    pub geometry: MultiPolygon<f64>,
}

/// One deduplicated row from the population table. Read-only after loading.
#[derive(Debug, Clone)]
pub struct PopulationRecord {
    /// Index of the row in the raw source, for tie-breaking and traceability.
    pub source_index: usize,
    pub region_label: String,
    pub country_label: String,
    pub iso: String,
    /// None means "not reported", which is distinct from a reported zero.
    pub population: Option<f64>,
    pub date: Option<NaiveDate>,
    pub norm_iso: String,
    pub norm_region: String,
    pub norm_country: String,
}

impl PopulationRecord {
    pub fn new(
        source_index: usize,
        region_label: &str,
        country_label: &str,
        iso: &str,
        population: Option<f64>,
        date: Option<NaiveDate>,
    ) -> Self {
        PopulationRecord {
            source_index,
            region_label: region_label.to_string(),
            country_label: country_label.to_string(),
            iso: iso.to_string(),
            population,
            date,
            norm_iso: crate::normalize::normalize_iso(iso),
            norm_region: crate::normalize::normalize(region_label),
            norm_country: crate::normalize::normalize(country_label),
        }
    }
}

/// Strategy level at which a population record was linked to a province.
/// A higher rank always beats a lower one when two records claim the same
/// province.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchTier {
    Iso,
    ExactCountry,
    RegionOnly,
    FuzzyContain,
    FuzzyBest,
}

impl MatchTier {
    pub fn rank(self) -> u8 {
        match self {
            MatchTier::Iso => 4,
            MatchTier::ExactCountry => 3,
            MatchTier::RegionOnly => 2,
            MatchTier::FuzzyContain => 1,
            MatchTier::FuzzyBest => 0,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            MatchTier::Iso => "iso",
            MatchTier::ExactCountry => "exact_country",
            MatchTier::RegionOnly => "region_only",
            MatchTier::FuzzyContain => "fuzzy_contain",
            MatchTier::FuzzyBest => "fuzzy_best",
        }
    }
}

/// A population record linked to one province. At most one per province.
#[derive(Debug, Clone)]
pub struct MatchAssignment {
    pub record: PopulationRecord,
    pub tier: MatchTier,
}

/// How a final population value was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provenance {
    Matched(MatchTier),
    FilledCountry,
    FilledGlobal,
}

impl Provenance {
    pub fn label(self) -> &'static str {
        match self {
            Provenance::Matched(tier) => tier.label(),
            Provenance::FilledCountry => "filled_country",
            Provenance::FilledGlobal => "filled_global",
        }
    }
}

/// Final per-province output: always present, always strictly positive.
#[derive(Debug, Clone)]
pub struct ProvincePopulation {
    pub province_id: usize,
    pub population: u64,
    pub provenance: Provenance,
    pub date: Option<NaiveDate>,
}
