use crate::types::{LatLong, Tag};

const LAYER_MAX: u8 = 10;

/// Which records a query returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Selector {
    /// All POIs and ways.
    #[default]
    All,
    /// POIs only; ways are not decoded.
    Pois,
    /// POIs plus the ways that carry a label.
    Labels,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PointOfInterest {
    pub layer: u8,
    pub tags: Vec<Tag>,
    pub position: LatLong,
}

impl PointOfInterest {
    pub fn new(layer: u8, tags: Vec<Tag>, position: LatLong) -> Self {
        Self {
            layer: layer.min(LAYER_MAX),
            tags,
            position,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Way {
    pub layer: u8,
    pub tags: Vec<Tag>,
    /// Outer ring first, then inner rings.
    pub way_nodes: Vec<Vec<LatLong>>,
    pub label_position: Option<LatLong>,
}

impl Way {
    pub fn new(
        layer: u8,
        tags: Vec<Tag>,
        way_nodes: Vec<Vec<LatLong>>,
        label_position: Option<LatLong>,
    ) -> Self {
        Self {
            layer: layer.min(LAYER_MAX),
            tags,
            way_nodes,
            label_position,
        }
    }

    pub fn is_multi_polygon(&self) -> bool {
        self.way_nodes.len() > 1
    }
}

/// Records decoded from one block.
#[derive(Debug, Default, Clone)]
pub struct PoiWayBundle {
    pub pois: Vec<PointOfInterest>,
    pub ways: Vec<Way>,
}

impl PoiWayBundle {
    pub fn new(pois: Vec<PointOfInterest>, ways: Vec<Way>) -> Self {
        Self { pois, ways }
    }
}

/// Records of one query, collected over all blocks it touched.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct MapReadResult {
    pub pois: Vec<PointOfInterest>,
    pub ways: Vec<Way>,
    /// Set when every block read was flagged as water.
    pub is_water: bool,
}

impl MapReadResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.pois.is_empty() && self.ways.is_empty()
    }

    /// Appends a block's records. With `deduplicate`, records equal to one
    /// already present are dropped.
    pub fn add(&mut self, bundle: PoiWayBundle, deduplicate: bool) {
        if deduplicate {
            for poi in bundle.pois {
                if !self.pois.contains(&poi) {
                    self.pois.push(poi);
                }
            }
            for way in bundle.ways {
                if !self.ways.contains(&way) {
                    self.ways.push(way);
                }
            }
        } else {
            self.pois.extend(bundle.pois);
            self.ways.extend(bundle.ways);
        }
    }

    /// Merges another query result; the water flag is left to the caller.
    pub fn add_result(&mut self, other: MapReadResult, deduplicate: bool) {
        self.add(PoiWayBundle::new(other.pois, other.ways), deduplicate);
    }
}
