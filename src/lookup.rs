//! Lookup structures over the consolidated provinces, one per matching tier.

use crate::normalize::{normalize, normalize_iso};
use crate::types::Province;
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct IdentityIndex {
    /// Normalized ISO 3166-2 code -> province id. Exact matches only.
    pub by_iso: HashMap<String, usize>,
    /// (normalized region, normalized country) -> province ids.
    pub by_region_country: HashMap<(String, String), Vec<usize>>,
    /// Normalized region alone -> province ids. Several provinces may
    /// legitimately share a region-only key across countries.
    pub by_region: HashMap<String, Vec<usize>>,
    /// Flat (province id, normalized primary name) list backing fuzzy search,
    /// in province id order.
    pub fuzzy: Vec<(usize, String)>,
    /// Province id -> normalized country, for the country veto.
    pub country_of: HashMap<usize, String>,
}

pub fn build_lookup(provinces: &[Province]) -> IdentityIndex {
    let mut index = IdentityIndex::default();

    for province in provinces {
        let mut norm_country = normalize(&province.country_name);
        if norm_country.is_empty() {
            norm_country = normalize(&province.country_code);
        }
        index.country_of.insert(province.id, norm_country.clone());

        if let Some(iso) = &province.iso_code {
            let norm_iso = normalize_iso(iso);
            if !norm_iso.is_empty() {
                index.by_iso.insert(norm_iso, province.id);
            }
        }

        let variants = [Some(province.name.as_str()), province.name_alt.as_deref()];
        for variant in variants.into_iter().flatten() {
            let norm_region = normalize(variant);
            if norm_region.is_empty() {
                continue;
            }
            index
                .by_region_country
                .entry((norm_region.clone(), norm_country.clone()))
                .or_default()
                .push(province.id);
            index
                .by_region
                .entry(norm_region)
                .or_default()
                .push(province.id);
        }

        let main_name = normalize(&province.name);
        if !main_name.is_empty() {
            index.fuzzy.push((province.id, main_name));
        }
    }

    index
}
