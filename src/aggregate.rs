use crate::config::FieldConfig;
use crate::normalize::present_text;
use crate::types::{LeafFeature, NumericKey, Region, RegionSet};
use geo::{unary_union, MultiPolygon};
use rayon::prelude::*;
use std::collections::HashMap;
use tracing::{debug, info};

/// Name used when no member carries a usable name field.
pub const FALLBACK_NAME: &str = "County";

/// Leaves sharing one group key, in the order they were seen.
#[derive(Debug)]
pub struct Group<'a> {
    pub key: String,
    pub members: Vec<&'a LeafFeature>,
}

/// Bucket leaves by group key, keeping first-encounter order of keys.
///
/// Leaves without a key are left out.
pub fn group_by_key(leaves: &[LeafFeature]) -> Vec<Group<'_>> {
    let mut positions: HashMap<&str, usize> = HashMap::new();
    let mut groups: Vec<Group<'_>> = Vec::new();
    let mut skipped = 0;

    for leaf in leaves {
        let Some(key) = leaf.group_key.as_deref() else {
            skipped += 1;
            continue;
        };
        match positions.get(key) {
            Some(&i) => groups[i].members.push(leaf),
            None => {
                positions.insert(key, groups.len());
                groups.push(Group {
                    key: key.to_string(),
                    members: vec![leaf],
                });
            }
        }
    }

    if skipped > 0 {
        debug!("Skipped {} leaves without a group key", skipped);
    }
    groups
}

/// Merge every group into one region.
pub fn aggregate(leaves: &[LeafFeature], fields: &FieldConfig) -> RegionSet {
    let groups = group_by_key(leaves);
    info!("Merging {} leaves into {} regions...", leaves.len(), groups.len());

    // Indexed parallel collect keeps group order.
    let regions: Vec<Region> = groups
        .par_iter()
        .map(|group| build_region(group, fields))
        .collect();

    RegionSet::new(regions)
}

fn build_region(group: &Group<'_>, fields: &FieldConfig) -> Region {
    Region {
        key: group.key.clone(),
        join_key: NumericKey::parse(&group.key),
        name: region_name(group, fields),
        members: group.members.len(),
        geometry: merge_geometry(&group.members),
    }
}

/// Union of the member polygons. Shared borders dissolve even where their vertices differ.
pub fn merge_geometry(members: &[&LeafFeature]) -> MultiPolygon<f64> {
    unary_union(members.iter().map(|leaf| &leaf.geometry))
}

/// Name taken from the first member only: county name, then the alternate
/// county field, then the leaf's own name.
fn region_name(group: &Group<'_>, fields: &FieldConfig) -> String {
    let Some(first) = group.members.first() else {
        return FALLBACK_NAME.to_string();
    };
    [&fields.county_name, &fields.county_alt, &fields.town_name]
        .into_iter()
        .find_map(|field| first.properties.get(field.as_str()).and_then(present_text))
        .unwrap_or_else(|| FALLBACK_NAME.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use geo::{polygon, Area};
    use serde_json::{json, Map, Value};

    fn square(x: f64, y: f64, w: f64, h: f64) -> MultiPolygon<f64> {
        MultiPolygon::new(vec![polygon![
            (x: x, y: y),
            (x: x + w, y: y),
            (x: x + w, y: y + h),
            (x: x, y: y + h),
            (x: x, y: y),
        ]])
    }

    fn leaf(id: &str, props: Value, geometry: MultiPolygon<f64>) -> LeafFeature {
        let props: Map<String, Value> = props.as_object().cloned().unwrap_or_default();
        LeafFeature::from_properties(id.into(), props, geometry, &FieldConfig::default())
    }

    fn towns() -> Vec<LeafFeature> {
        vec![
            leaf("1", json!({"TOWN": "AGAWAM", "FIPS_STCO": 25013, "COUNTY": "HAMPDEN"}), square(0.0, 0.0, 1.0, 1.0)),
            leaf("2", json!({"TOWN": "LENOX", "FIPS_STCO": "25003"}), square(5.0, 5.0, 1.0, 1.0)),
            leaf("3", json!({"TOWN": "CHICOPEE", "FIPS_STCO": 25013, "COUNTY": "OTHER"}), square(1.0, 0.0, 1.0, 1.0)),
            leaf("4", json!({"TOWN": "LOST", "FIPS_STCO": null}), square(9.0, 9.0, 1.0, 1.0)),
            leaf("5", json!({"TOWN": "NOWHERE"}), square(20.0, 20.0, 1.0, 1.0)),
        ]
    }

    #[test]
    fn groups_in_first_encounter_order() {
        let leaves = towns();
        let groups = group_by_key(&leaves);
        let keys: Vec<&str> = groups.iter().map(|g| g.key.as_str()).collect();
        assert_eq!(keys, vec!["25013", "25003"]);
        assert_eq!(groups[0].members.len(), 2);
    }

    #[test]
    fn keyless_leaves_form_no_region() {
        let leaves = towns();
        let regions = aggregate(&leaves, &FieldConfig::default());
        assert_eq!(regions.len(), 2);
        let total: usize = regions.iter().map(|r| r.members).sum();
        assert_eq!(total, 3);
        let area: f64 = regions.iter().map(|r| r.geometry.unsigned_area()).sum();
        assert_relative_eq!(area, 3.0, epsilon = 1e-9);
    }

    #[test]
    fn adjacent_leaves_dissolve() {
        let leaves = towns();
        let regions = aggregate(&leaves, &FieldConfig::default());
        let hampden = regions.get(NumericKey::from_f64(25013.0).unwrap()).unwrap();
        assert_eq!(hampden.geometry.0.len(), 1);
        assert_relative_eq!(hampden.geometry.unsigned_area(), 2.0, epsilon = 1e-9);
    }

    #[test]
    fn dissolves_borders_with_unmatched_vertices() {
        // one tall leaf against two short ones: the shared edge has a vertex on one side only
        let leaves = vec![
            leaf("a", json!({"FIPS_STCO": "1"}), square(0.0, 0.0, 1.0, 2.0)),
            leaf("b", json!({"FIPS_STCO": "1"}), square(1.0, 0.0, 1.0, 1.0)),
            leaf("c", json!({"FIPS_STCO": "1"}), square(1.0, 1.0, 1.0, 1.0)),
        ];
        let regions = aggregate(&leaves, &FieldConfig::default());
        let region = regions.iter().next().unwrap();
        assert_eq!(region.geometry.0.len(), 1);
        assert!(region.geometry.0[0].interiors().is_empty());
        assert_relative_eq!(region.geometry.unsigned_area(), 4.0, epsilon = 1e-9);
    }

    #[test]
    fn name_comes_from_first_member() {
        let leaves = towns();
        let regions = aggregate(&leaves, &FieldConfig::default()).into_vec();
        assert_eq!(regions[0].name, "HAMPDEN");
        assert_eq!(regions[1].name, "LENOX");
    }

    #[test]
    fn name_prefers_county_name_field() {
        let leaves = vec![leaf(
            "1",
            json!({"FIPS_STCO": "1", "COUNTYNAME": "Hampden County", "COUNTY": "HAMPDEN", "TOWN": "AGAWAM"}),
            square(0.0, 0.0, 1.0, 1.0),
        )];
        let regions = aggregate(&leaves, &FieldConfig::default()).into_vec();
        assert_eq!(regions[0].name, "Hampden County");
    }

    #[test]
    fn name_falls_back_to_literal() {
        let leaves = vec![leaf("1", json!({"FIPS_STCO": "1", "COUNTY": ""}), square(0.0, 0.0, 1.0, 1.0))];
        let regions = aggregate(&leaves, &FieldConfig::default()).into_vec();
        // LeafFeature::name is "Unknown" but the region reads raw properties
        assert_eq!(regions[0].name, FALLBACK_NAME);
    }

    #[test]
    fn colliding_numeric_keys_stay_separate_regions() {
        let leaves = vec![
            leaf("1", json!({"FIPS_STCO": "25013", "TOWN": "A"}), square(0.0, 0.0, 1.0, 1.0)),
            leaf("2", json!({"FIPS_STCO": "025013", "TOWN": "B"}), square(3.0, 0.0, 1.0, 1.0)),
        ];
        let regions = aggregate(&leaves, &FieldConfig::default());
        assert_eq!(regions.len(), 2);
        let keyed = regions.get(NumericKey::from_f64(25013.0).unwrap()).unwrap();
        assert_eq!(keyed.key, "025013");
    }

    #[test]
    fn non_numeric_key_has_no_join_key() {
        let leaves = vec![leaf("1", json!({"FIPS_STCO": "HAMPDEN"}), square(0.0, 0.0, 1.0, 1.0))];
        let regions = aggregate(&leaves, &FieldConfig::default()).into_vec();
        assert!(regions[0].join_key.is_none());
    }

    #[test]
    fn aggregation_is_repeatable() {
        let leaves = towns();
        let a = aggregate(&leaves, &FieldConfig::default()).into_vec();
        let b = aggregate(&leaves, &FieldConfig::default()).into_vec();
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(&b) {
            assert_eq!(x.key, y.key);
            assert_eq!(x.name, y.name);
            assert_eq!(x.join_key, y.join_key);
            assert_relative_eq!(x.geometry.unsigned_area(), y.geometry.unsigned_area());
        }
    }
}
