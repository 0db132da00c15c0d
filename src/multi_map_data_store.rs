use std::sync::Arc;

use tracing::debug;

use crate::errors::MapFileError;
use crate::map_data::{MapReadResult, Selector};
use crate::map_data_store::MapDataStore;
use crate::tile::Tile;
use crate::types::{BoundingBox, LatLong};

/// How results from several stores are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataPolicy {
    /// Only the first store that supports the tile is queried.
    ReturnFirst,
    /// Results of all supporting stores are concatenated.
    ReturnAll,
    /// Like `ReturnAll`, dropping records equal to one already collected.
    Deduplicate,
}

/// Several map data stores queried as one.
pub struct MultiMapDataStore {
    bounding_box: Option<BoundingBox>,
    data_policy: DataPolicy,
    map_databases: Vec<Arc<dyn MapDataStore>>,
    start_position: Option<LatLong>,
    start_zoom_level: Option<u8>,
}

impl MultiMapDataStore {
    pub fn new(data_policy: DataPolicy) -> Self {
        Self {
            bounding_box: None,
            data_policy,
            map_databases: Vec::new(),
            start_position: None,
            start_zoom_level: None,
        }
    }

    /// Adds a store. Its start zoom level and start position replace the
    /// current ones when the matching flag is set.
    pub fn add_map_data_store(
        &mut self,
        map_data_store: Arc<dyn MapDataStore>,
        use_start_zoom_level: bool,
        use_start_position: bool,
    ) -> Result<(), MapFileError> {
        if self
            .map_databases
            .iter()
            .any(|existing| same_store(existing, &map_data_store))
        {
            return Err(MapFileError::DuplicateDataStore);
        }

        if use_start_zoom_level {
            self.start_zoom_level = map_data_store.start_zoom_level();
        }
        if use_start_position {
            self.start_position = map_data_store.start_position();
        }
        if let Some(store_bounding_box) = map_data_store.bounding_box() {
            self.bounding_box = Some(match &self.bounding_box {
                Some(bounding_box) => bounding_box.extend_bounding_box(&store_bounding_box),
                None => store_bounding_box,
            });
        }

        self.map_databases.push(map_data_store);
        Ok(())
    }

    pub fn data_policy(&self) -> DataPolicy {
        self.data_policy
    }

    pub fn len(&self) -> usize {
        self.map_databases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map_databases.is_empty()
    }

    pub fn set_start_position(&mut self, start_position: LatLong) {
        self.start_position = Some(start_position);
    }

    pub fn set_start_zoom_level(&mut self, start_zoom_level: u8) {
        self.start_zoom_level = Some(start_zoom_level);
    }

    fn supporting_stores<'a>(
        &'a self,
        upper_left: &'a Tile,
        lower_right: &'a Tile,
    ) -> impl Iterator<Item = &'a Arc<dyn MapDataStore>> + 'a {
        self.map_databases.iter().filter(move |store| {
            store.supports_tile(upper_left) || store.supports_tile(lower_right)
        })
    }

    fn read_all(
        &self,
        upper_left: &Tile,
        lower_right: &Tile,
        selector: Selector,
        deduplicate: bool,
    ) -> Result<MapReadResult, MapFileError> {
        let mut map_read_result = MapReadResult::new();
        let mut is_water = true;
        let mut contributed = false;

        for store in self.supporting_stores(upper_left, lower_right) {
            let result = store.read_map_data_range(upper_left, lower_right, selector)?;
            is_water &= result.is_water;
            contributed = true;
            map_read_result.add_result(result, deduplicate);
        }

        map_read_result.is_water = contributed && is_water;
        debug!(
            "combined {} POIs and {} ways",
            map_read_result.pois.len(),
            map_read_result.ways.len()
        );
        Ok(map_read_result)
    }
}

/// Identity by allocation; the vtable part of the pointer is ignored.
fn same_store(a: &Arc<dyn MapDataStore>, b: &Arc<dyn MapDataStore>) -> bool {
    Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
}

impl MapDataStore for MultiMapDataStore {
    fn bounding_box(&self) -> Option<BoundingBox> {
        self.bounding_box.clone()
    }

    fn start_position(&self) -> Option<LatLong> {
        self.start_position
            .clone()
            .or_else(|| self.bounding_box.as_ref().map(BoundingBox::get_center_point))
    }

    fn start_zoom_level(&self) -> Option<u8> {
        self.start_zoom_level
    }

    fn supports_tile(&self, tile: &Tile) -> bool {
        self.map_databases
            .iter()
            .any(|store| store.supports_tile(tile))
    }

    fn get_data_timestamp(&self, tile: &Tile) -> i64 {
        let mut supporting = self
            .map_databases
            .iter()
            .filter(|store| store.supports_tile(tile));
        match self.data_policy {
            DataPolicy::ReturnFirst => supporting
                .next()
                .map(|store| store.get_data_timestamp(tile))
                .unwrap_or(0),
            DataPolicy::ReturnAll | DataPolicy::Deduplicate => supporting
                .map(|store| store.get_data_timestamp(tile))
                .max()
                .unwrap_or(0),
        }
    }

    fn read_map_data_range(
        &self,
        upper_left: &Tile,
        lower_right: &Tile,
        selector: Selector,
    ) -> Result<MapReadResult, MapFileError> {
        match self.data_policy {
            DataPolicy::ReturnFirst => {
                match self.supporting_stores(upper_left, lower_right).next() {
                    Some(store) => store.read_map_data_range(upper_left, lower_right, selector),
                    None => Ok(MapReadResult::new()),
                }
            }
            DataPolicy::ReturnAll => self.read_all(upper_left, lower_right, selector, false),
            DataPolicy::Deduplicate => self.read_all(upper_left, lower_right, selector, true),
        }
    }

    fn close(&self) {
        for store in &self.map_databases {
            store.close();
        }
    }
}
