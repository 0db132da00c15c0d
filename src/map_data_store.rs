use crate::errors::MapFileError;
use crate::map_data::{MapReadResult, Selector};
use crate::tile::Tile;
use crate::types::{BoundingBox, LatLong};

/// A source of map data that can be queried tile by tile.
pub trait MapDataStore: Send + Sync {
    /// Area covered by the store, if known.
    fn bounding_box(&self) -> Option<BoundingBox>;

    fn start_position(&self) -> Option<LatLong>;

    fn start_zoom_level(&self) -> Option<u8>;

    fn supports_tile(&self, tile: &Tile) -> bool;

    /// Milliseconds since the epoch at which the data for `tile` was created.
    fn get_data_timestamp(&self, tile: &Tile) -> i64;

    /// Reads all data for the rectangle spanned by two tiles of the same zoom level.
    fn read_map_data_range(
        &self,
        upper_left: &Tile,
        lower_right: &Tile,
        selector: Selector,
    ) -> Result<MapReadResult, MapFileError>;

    fn read_map_data(&self, tile: &Tile, selector: Selector) -> Result<MapReadResult, MapFileError> {
        self.read_map_data_range(tile, tile, selector)
    }

    fn read_poi_data(&self, tile: &Tile) -> Result<MapReadResult, MapFileError> {
        self.read_map_data(tile, Selector::Pois)
    }

    fn read_labels(&self, tile: &Tile) -> Result<MapReadResult, MapFileError> {
        self.read_map_data(tile, Selector::Labels)
    }

    /// Releases the underlying resources; later reads fail.
    fn close(&self);
}
