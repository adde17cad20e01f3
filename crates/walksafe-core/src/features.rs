//! Geo-features correlated against route corridors.

use geo::{MultiLineString, Point};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Source-assigned identifier, unique within one category.
pub type FeatureId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureCategory {
    StreetLights,
    Sidewalks,
    TrafficVolumes,
}

impl FeatureCategory {
    pub const ALL: [FeatureCategory; 3] = [
        FeatureCategory::StreetLights,
        FeatureCategory::Sidewalks,
        FeatureCategory::TrafficVolumes,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StreetLights => "street_lights",
            Self::Sidewalks => "sidewalks",
            Self::TrafficVolumes => "traffic_volumes",
        }
    }
}

impl fmt::Display for FeatureCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StreetLight {
    pub id: FeatureId,
    /// `x = lon`, `y = lat`.
    pub location: Point<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sidewalk {
    pub id: FeatureId,
    pub length_km: f64,
    pub line: MultiLineString<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrafficVolume {
    pub id: FeatureId,
    pub length_km: f64,
    /// Average daily traffic, in vehicles.
    pub volume: f64,
    pub line: MultiLineString<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Feature {
    StreetLight(StreetLight),
    Sidewalk(Sidewalk),
    TrafficVolume(TrafficVolume),
}

impl Feature {
    pub fn id(&self) -> FeatureId {
        match self {
            Feature::StreetLight(light) => light.id,
            Feature::Sidewalk(sidewalk) => sidewalk.id,
            Feature::TrafficVolume(road) => road.id,
        }
    }

    pub fn category(&self) -> FeatureCategory {
        match self {
            Feature::StreetLight(_) => FeatureCategory::StreetLights,
            Feature::Sidewalk(_) => FeatureCategory::Sidewalks,
            Feature::TrafficVolume(_) => FeatureCategory::TrafficVolumes,
        }
    }
}

pub trait Identified {
    fn feature_id(&self) -> FeatureId;
}

impl Identified for StreetLight {
    fn feature_id(&self) -> FeatureId {
        self.id
    }
}

impl Identified for Sidewalk {
    fn feature_id(&self) -> FeatureId {
        self.id
    }
}

impl Identified for TrafficVolume {
    fn feature_id(&self) -> FeatureId {
        self.id
    }
}

/// Keep the first instance of every ID, preserving input order.
pub fn dedup_by_id<T: Identified>(items: impl IntoIterator<Item = T>) -> Vec<T> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.feature_id()))
        .collect()
}

/// Features of all three categories gathered for one request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureCollection {
    pub lights: Vec<StreetLight>,
    pub sidewalks: Vec<Sidewalk>,
    pub traffic: Vec<TrafficVolume>,
}

impl FeatureCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, feature: Feature) {
        match feature {
            Feature::StreetLight(light) => self.lights.push(light),
            Feature::Sidewalk(sidewalk) => self.sidewalks.push(sidewalk),
            Feature::TrafficVolume(road) => self.traffic.push(road),
        }
    }

    /// Concatenate `parts` in order, then drop repeated IDs per category.
    pub fn merge(parts: impl IntoIterator<Item = FeatureCollection>) -> Self {
        let mut merged = FeatureCollection::new();
        for part in parts {
            merged.lights.extend(part.lights);
            merged.sidewalks.extend(part.sidewalks);
            merged.traffic.extend(part.traffic);
        }
        merged.dedup()
    }

    pub fn dedup(self) -> Self {
        Self {
            lights: dedup_by_id(self.lights),
            sidewalks: dedup_by_id(self.sidewalks),
            traffic: dedup_by_id(self.traffic),
        }
    }

    pub fn count(&self, category: FeatureCategory) -> usize {
        match category {
            FeatureCategory::StreetLights => self.lights.len(),
            FeatureCategory::Sidewalks => self.sidewalks.len(),
            FeatureCategory::TrafficVolumes => self.traffic.len(),
        }
    }

    pub fn len(&self) -> usize {
        self.lights.len() + self.sidewalks.len() + self.traffic.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Extend<Feature> for FeatureCollection {
    fn extend<I: IntoIterator<Item = Feature>>(&mut self, iter: I) {
        for feature in iter {
            self.push(feature);
        }
    }
}

impl FromIterator<Feature> for FeatureCollection {
    fn from_iter<I: IntoIterator<Item = Feature>>(iter: I) -> Self {
        let mut collection = FeatureCollection::new();
        collection.extend(iter);
        collection
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::line_string;

    fn light(id: FeatureId, lon: f64) -> Feature {
        Feature::StreetLight(StreetLight {
            id,
            location: Point::new(lon, 43.0),
        })
    }

    fn sidewalk(id: FeatureId) -> Feature {
        Feature::Sidewalk(Sidewalk {
            id,
            length_km: 0.1,
            line: MultiLineString::new(vec![line_string![(x: -81.2, y: 43.0), (x: -81.1, y: 43.0)]]),
        })
    }

    #[test]
    fn duplicate_ids_collapse_to_one_feature() {
        let first_box: FeatureCollection = vec![light(42, -81.20), light(7, -81.21)]
            .into_iter()
            .collect();
        let second_box: FeatureCollection = vec![light(42, -81.20), light(9, -81.22)]
            .into_iter()
            .collect();

        let merged = FeatureCollection::merge([first_box, second_box]);
        let ids: Vec<FeatureId> = merged.lights.iter().map(|light| light.id).collect();
        assert_eq!(ids, vec![42, 7, 9]);
        assert_eq!(ids.iter().filter(|id| **id == 42).count(), 1);
    }

    #[test]
    fn dedup_keeps_first_seen_instance() {
        let kept = dedup_by_id(vec![
            StreetLight { id: 1, location: Point::new(1.0, 1.0) },
            StreetLight { id: 1, location: Point::new(2.0, 2.0) },
        ]);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].location, Point::new(1.0, 1.0));
    }

    #[test]
    fn ids_are_unique_per_category_not_globally() {
        let merged = FeatureCollection::merge([vec![light(5, -81.2), sidewalk(5)]
            .into_iter()
            .collect()]);
        assert_eq!(merged.count(FeatureCategory::StreetLights), 1);
        assert_eq!(merged.count(FeatureCategory::Sidewalks), 1);
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn feature_reports_id_and_category() {
        let feature = sidewalk(11);
        assert_eq!(feature.id(), 11);
        assert_eq!(feature.category(), FeatureCategory::Sidewalks);
        assert_eq!(FeatureCategory::TrafficVolumes.to_string(), "traffic_volumes");
    }
}
