//! Vector features and the layer they are written to.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::geometry::RunGeometry;
use crate::grid::TileIndex;

pub type FeatureId = u64;

/// One polygonized region (or fragment of one).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feature {
    /// Assigned by the layer when the feature is added.
    pub id: FeatureId,
    /// Value of the layer's label field.
    pub label: u32,
    pub geometry: RunGeometry,
    /// Tiles the geometry was polygonized from.
    pub tiles: BTreeSet<TileIndex>,
}

impl Feature {
    pub fn new(label: u32, geometry: RunGeometry, tile: TileIndex) -> Self {
        Self {
            id: 0,
            label,
            geometry,
            tiles: BTreeSet::from([tile]),
        }
    }
}

/// Destination of polygonized features.
pub trait VectorLayer: Send {
    fn name(&self) -> &str;

    /// Attribute holding each feature's label.
    fn field_name(&self) -> &str;

    fn features(&self) -> &[Feature];

    /// Store `feature` under a fresh id and return the id.
    fn add_feature(&mut self, feature: Feature) -> FeatureId;

    /// Remove and return all features, keeping the id counter.
    fn take_features(&mut self) -> Vec<Feature>;

    /// Replace the layer's content. Ids are kept as given.
    fn replace_features(&mut self, features: Vec<Feature>);
}

/// Layer held in memory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryLayer {
    name: String,
    field_name: String,
    features: Vec<Feature>,
    next_id: FeatureId,
}

impl MemoryLayer {
    pub fn new(name: impl Into<String>, field_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            field_name: field_name.into(),
            features: Vec::new(),
            next_id: 1,
        }
    }

    /// Number the features added from now on starting at `first_id` (at least 1).
    pub fn with_first_id(mut self, first_id: FeatureId) -> Self {
        self.next_id = first_id.max(1);
        self
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn feature(&self, id: FeatureId) -> Option<&Feature> {
        self.features.iter().find(|f| f.id == id)
    }

    /// Features whose label field equals `label`.
    pub fn features_with_label(&self, label: u32) -> impl Iterator<Item = &Feature> + '_ {
        self.features.iter().filter(move |f| f.label == label)
    }
}

impl VectorLayer for MemoryLayer {
    fn name(&self) -> &str {
        &self.name
    }

    fn field_name(&self) -> &str {
        &self.field_name
    }

    fn features(&self) -> &[Feature] {
        &self.features
    }

    fn add_feature(&mut self, mut feature: Feature) -> FeatureId {
        feature.id = self.next_id;
        self.next_id += 1;
        self.features.push(feature);
        self.next_id - 1
    }

    fn take_features(&mut self) -> Vec<Feature> {
        std::mem::take(&mut self.features)
    }

    fn replace_features(&mut self, features: Vec<Feature>) {
        self.features = features;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector::geometry::Run;

    fn square(label: u32) -> Feature {
        Feature::new(
            label,
            RunGeometry::from_runs(vec![Run::new(0, 0, 1)]),
            TileIndex::new(0, 0),
        )
    }

    #[test]
    fn test_first_id_offsets_numbering() {
        let mut layer = MemoryLayer::new("layer", "DN").with_first_id(500);
        assert_eq!(layer.add_feature(square(1)), 500);
        assert_eq!(layer.add_feature(square(2)), 501);
        assert_eq!(layer.feature(501).map(|f| f.label), Some(2));
    }

    #[test]
    fn test_ids_are_sequential() {
        let mut layer = MemoryLayer::new("layer", "DN");
        assert_eq!(layer.add_feature(square(3)), 1);
        assert_eq!(layer.add_feature(square(3)), 2);
        assert_eq!(layer.features_with_label(3).count(), 2);
        assert_eq!(layer.feature(2).map(|f| f.label), Some(3));
    }

    #[test]
    fn test_take_keeps_counter() {
        let mut layer = MemoryLayer::new("regions", "label");
        layer.add_feature(square(1));
        let taken = layer.take_features();
        assert_eq!(taken.len(), 1);
        assert!(layer.is_empty());
        assert_eq!(layer.add_feature(square(2)), 2);
        assert_eq!(layer.name(), "regions");
        assert_eq!(layer.field_name(), "label");
    }

    #[test]
    fn test_serializes_to_yaml() {
        let mut layer = MemoryLayer::new("layer", "DN");
        layer.add_feature(square(7));
        let yaml = serde_yml::to_string(&layer).unwrap();
        assert!(yaml.contains("field_name: DN"));
        let back: MemoryLayer = serde_yml::from_str(&yaml).unwrap();
        assert_eq!(back, layer);
    }
}
