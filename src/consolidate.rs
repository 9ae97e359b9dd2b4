//! Greedy per-country agglomeration of undersized province polygons.

use crate::types::Province;
use geo::{Area, BooleanOps, EuclideanDistance, MultiPolygon};
use std::collections::BTreeMap;
use tracing::info;

/// Area floor in m² of the working projection. Provinces below this are
/// merged into neighbours until none remain (or the country is down to one).
pub const MIN_AREA_ABS: f64 = 1_000_000_000.0;

/// Merge every province with area below `min_area` into its nearest neighbour
/// within the same country group, smallest first, until no member of the
/// group is below the floor or only one member remains.
///
/// Never merges across country boundaries and never removes the last province
/// of a country. Surviving records keep their relative order; identifiers are
/// compacted to a dense 0..N-1 range once, at the end, in sorted country
/// group order.
pub fn consolidate(provinces: Vec<Province>, min_area: f64) -> Vec<Province> {
    let before = provinces.len();

    // Arena of records keyed by stable index; groups hold indices only, so
    // merging never shifts anything while we iterate.
    let mut arena: Vec<Province> = provinces;
    for p in &mut arena {
        p.area = p.geometry.unsigned_area();
    }

    let mut groups: BTreeMap<String, Vec<usize>> = BTreeMap::new();
    for (idx, p) in arena.iter().enumerate() {
        groups.entry(p.country_code.clone()).or_default().push(idx);
    }

    for members in groups.values_mut() {
        merge_group(&mut arena, members, min_area);
    }

    let mut out = Vec::new();
    for members in groups.values() {
        for &idx in members {
            let mut p = arena[idx].clone();
            p.id = out.len();
            out.push(p);
        }
    }

    info!(
        "Consolidated {} provinces into {} (floor {} m²)",
        before,
        out.len(),
        min_area
    );
    out
}

fn merge_group(arena: &mut [Province], members: &mut Vec<usize>, min_area: f64) {
    loop {
        if members.len() <= 1 {
            return;
        }

        // Lowest-area member under the floor; ties break on arena index so
        // reruns take the same path.
        let small = members
            .iter()
            .copied()
            .filter(|&i| arena[i].area < min_area)
            .min_by(|&a, &b| {
                arena[a]
                    .area
                    .total_cmp(&arena[b].area)
                    .then_with(|| a.cmp(&b))
            });
        let small = match small {
            Some(idx) => idx,
            None => return,
        };

        let nearest = members
            .iter()
            .copied()
            .filter(|&i| i != small)
            .min_by(|&a, &b| {
                let da = geometry_distance(&arena[a].geometry, &arena[small].geometry);
                let db = geometry_distance(&arena[b].geometry, &arena[small].geometry);
                da.total_cmp(&db).then_with(|| a.cmp(&b))
            });
        let nearest = match nearest {
            Some(idx) => idx,
            None => return,
        };

        let union = repair(arena[nearest].geometry.union(&arena[small].geometry));
        if !union.0.is_empty() {
            arena[nearest].geometry = union;
        }
        // An empty repaired union means the target absorbed nothing; the
        // small province is dropped either way so the loop terminates.
        arena[nearest].area = arena[nearest].geometry.unsigned_area();
        members.retain(|&i| i != small);
    }
}

/// Minimum planar distance between any two polygon parts.
fn geometry_distance(a: &MultiPolygon<f64>, b: &MultiPolygon<f64>) -> f64 {
    let mut best = f64::INFINITY;
    for pa in &a.0 {
        for pb in &b.0 {
            let d = pa.euclidean_distance(pb);
            if d < best {
                best = d;
            }
        }
    }
    best
}

/// Boolean union can leave degenerate slivers behind; drop any part that no
/// longer encloses area or cannot close a ring.
fn repair(geometry: MultiPolygon<f64>) -> MultiPolygon<f64> {
    MultiPolygon::new(
        geometry
            .0
            .into_iter()
            .filter(|p| p.exterior().0.len() >= 4 && p.unsigned_area() > 0.0)
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{LineString, Polygon};

    fn square(x: f64, y: f64, side: f64) -> MultiPolygon<f64> {
        let ring = LineString::from(vec![
            (x, y),
            (x + side, y),
            (x + side, y + side),
            (x, y + side),
            (x, y),
        ]);
        MultiPolygon::new(vec![Polygon::new(ring, vec![])])
    }

    fn province(country: &str, name: &str, geometry: MultiPolygon<f64>) -> Province {
        Province {
            id: 0,
            country_code: country.to_string(),
            country_name: country.to_string(),
            name: name.to_string(),
            name_alt: None,
            iso_code: None,
            area: 0.0,
            geometry,
        }
    }

    #[test]
    fn merges_undersized_into_nearest_until_floor_holds() {
        // Areas 25, 4 and 144 with a floor of 100: the 4 merges into the
        // adjacent 25, the combined 29 is still under the floor and merges
        // into the 144, leaving a single compliant province.
        let provinces = vec![
            province("AAA", "west", square(0.0, 0.0, 5.0)),
            province("AAA", "middle", square(6.0, 0.0, 2.0)),
            province("AAA", "east", square(20.0, 0.0, 12.0)),
        ];
        let out = consolidate(provinces, 100.0);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].name, "east");
        assert!(out[0].area >= 100.0);
        assert!((out[0].area - (144.0 + 25.0 + 4.0)).abs() < 1e-6);
    }

    #[test]
    fn floor_holds_for_all_survivors() {
        let provinces = vec![
            province("AAA", "a", square(0.0, 0.0, 3.0)),
            province("AAA", "b", square(10.0, 0.0, 11.0)),
            province("AAA", "c", square(30.0, 0.0, 12.0)),
            province("BBB", "d", square(100.0, 0.0, 2.0)),
            province("BBB", "e", square(110.0, 0.0, 15.0)),
        ];
        let out = consolidate(provinces, 100.0);
        for p in &out {
            assert!(p.area >= 100.0, "{} below floor: {}", p.name, p.area);
        }
    }

    #[test]
    fn never_removes_the_last_province_of_a_country() {
        let provinces = vec![province("AAA", "only", square(0.0, 0.0, 1.0))];
        let out = consolidate(provinces, 100.0);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].name, "only");
        assert!(out[0].area < 100.0);
    }

    #[test]
    fn never_merges_across_country_boundaries() {
        // The tiny AAA province sits right next to a huge BBB one; it must
        // still merge with the distant AAA neighbour.
        let provinces = vec![
            province("AAA", "tiny", square(0.0, 0.0, 2.0)),
            province("BBB", "big-foreign", square(3.0, 0.0, 50.0)),
            province("AAA", "far-domestic", square(200.0, 0.0, 20.0)),
        ];
        let out = consolidate(provinces, 100.0);
        let aaa: Vec<_> = out.iter().filter(|p| p.country_code == "AAA").collect();
        assert_eq!(aaa.len(), 1);
        assert!((aaa[0].area - (400.0 + 4.0)).abs() < 1e-6);
        let bbb: Vec<_> = out.iter().filter(|p| p.country_code == "BBB").collect();
        assert_eq!(bbb.len(), 1);
        assert!((bbb[0].area - 2500.0).abs() < 1e-6);
    }

    #[test]
    fn total_area_is_preserved_within_tolerance() {
        let provinces = vec![
            province("AAA", "a", square(0.0, 0.0, 5.0)),
            province("AAA", "b", square(6.0, 0.0, 2.0)),
            province("AAA", "c", square(20.0, 0.0, 12.0)),
        ];
        let before: f64 = provinces.iter().map(|p| p.geometry.unsigned_area()).sum();
        let out = consolidate(provinces, 100.0);
        let after: f64 = out.iter().map(|p| p.area).sum();
        assert!(after <= before + 1e-6);
    }

    #[test]
    fn ids_are_compacted_to_a_dense_range() {
        let provinces = vec![
            province("BBB", "b1", square(0.0, 0.0, 15.0)),
            province("AAA", "a1", square(50.0, 0.0, 2.0)),
            province("AAA", "a2", square(60.0, 0.0, 20.0)),
        ];
        let out = consolidate(provinces, 100.0);
        let ids: Vec<usize> = out.iter().map(|p| p.id).collect();
        assert_eq!(ids, (0..out.len()).collect::<Vec<_>>());
        // Sorted country group order: AAA survivor first, then BBB.
        assert_eq!(out[0].country_code, "AAA");
        assert_eq!(out[1].country_code, "BBB");
    }

    fn degenerate(x: f64) -> MultiPolygon<f64> {
        // Collinear ring: closes but encloses no area.
        let ring = LineString::from(vec![(x, 0.0), (x + 1.0, 1.0), (x + 2.0, 2.0), (x, 0.0)]);
        MultiPolygon::new(vec![Polygon::new(ring, vec![])])
    }

    #[test]
    fn empty_union_still_drops_the_small_province() {
        // Both geometries are zero-area; the repaired union is empty, so the
        // target absorbs nothing but the small province must still be
        // dropped for the loop to terminate.
        let provinces = vec![
            province("AAA", "ghost-a", degenerate(0.0)),
            province("AAA", "ghost-b", degenerate(10.0)),
        ];
        let out = consolidate(provinces, 100.0);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].name, "ghost-b");
    }

    #[test]
    fn degenerate_sliver_is_absorbed_without_area_gain() {
        let provinces = vec![
            province("AAA", "sliver", degenerate(0.0)),
            province("AAA", "solid", square(20.0, 0.0, 12.0)),
        ];
        let out = consolidate(provinces, 100.0);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].name, "solid");
        assert!((out[0].area - 144.0).abs() < 1e-6);
    }

    #[test]
    fn compliant_groups_are_untouched() {
        let provinces = vec![
            province("AAA", "a", square(0.0, 0.0, 11.0)),
            province("AAA", "b", square(20.0, 0.0, 12.0)),
        ];
        let out = consolidate(provinces, 100.0);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].name, "a");
        assert_eq!(out[1].name, "b");
    }
}
