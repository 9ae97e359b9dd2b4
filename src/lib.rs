//! Reconciles two independently-sourced datasets describing the same
//! administrative regions: a polygon dataset of sub-national provinces and a
//! tabular population dataset keyed by free-text names and optional ISO 3166-2
//! codes. Produces exactly one positive, provenance-tagged population value
//! per province.
//!
//! Pipeline: [`data`] loads raw province polygons, [`consolidate`] merges
//! undersized ones into larger neighbours, [`lookup`] indexes the survivors,
//! [`population`] loads and deduplicates the population table, [`matching`]
//! links records to provinces through a tiered strategy, and [`impute`] fills
//! whatever is left so that no province ends up without a value.

pub mod config;
pub mod consolidate;
pub mod data;
pub mod export;
pub mod impute;
pub mod lookup;
pub mod matching;
pub mod normalize;
pub mod population;
pub mod types;
