use crate::mercator::{MercatorProjection, MAX_ZOOM_LEVEL, TILE_SIZE};
use crate::types::BoundingBox;

/// One square map region at one zoom level.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Tile {
    pub tile_x: i64,
    pub tile_y: i64,
    pub zoom_level: u8,
    pub tile_size: i32,
}

impl Tile {
    pub fn new(tile_x: i64, tile_y: i64, zoom_level: u8, tile_size: i32) -> Self {
        Self {
            tile_x,
            tile_y,
            zoom_level,
            tile_size,
        }
    }

    /// True if the zoom level is supported and both tile numbers lie on it.
    pub fn is_valid(&self) -> bool {
        let tile_count = MercatorProjection::tile_count(self.zoom_level);
        self.zoom_level <= MAX_ZOOM_LEVEL
            && (0..tile_count).contains(&self.tile_x)
            && (0..tile_count).contains(&self.tile_y)
    }

    /// Tile containing the given coordinates, with the default tile size.
    pub fn from_lat_long(latitude: f64, longitude: f64, zoom_level: u8) -> Self {
        Self::new(
            MercatorProjection::longitude_to_tile_x(longitude, zoom_level),
            MercatorProjection::latitude_to_tile_y(latitude, zoom_level),
            zoom_level,
            TILE_SIZE,
        )
    }

    pub fn get_bounding_box(&self) -> BoundingBox {
        let min_lon = MercatorProjection::tile_x_to_longitude(self.tile_x, self.zoom_level);
        let max_lon = MercatorProjection::tile_x_to_longitude(self.tile_x + 1, self.zoom_level);
        let min_lat = MercatorProjection::tile_y_to_latitude(self.tile_y + 1, self.zoom_level);
        let max_lat = MercatorProjection::tile_y_to_latitude(self.tile_y, self.zoom_level);

        BoundingBox {
            min_latitude: min_lat,
            min_longitude: min_lon,
            max_latitude: max_lat,
            max_longitude: max_lon,
        }
    }

    /// Box covering every tile between `upper_left` and `lower_right`.
    pub fn get_bounding_box_range(upper_left: &Tile, lower_right: &Tile) -> BoundingBox {
        upper_left
            .get_bounding_box()
            .extend_bounding_box(&lower_right.get_bounding_box())
    }

    /// Pixel coordinates of the top-left corner of this tile.
    pub fn get_origin(&self) -> (i64, i64) {
        (
            self.tile_x * self.tile_size as i64,
            self.tile_y * self.tile_size as i64,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounding_box_contains_its_point() {
        let tile = Tile::from_lat_long(52.5, 13.4, 14);
        let bbox = tile.get_bounding_box();
        assert!(bbox.contains(52.5, 13.4));
        assert!(bbox.min_latitude < bbox.max_latitude);
        assert!(bbox.min_longitude < bbox.max_longitude);
    }

    #[test]
    fn test_bounding_box_range() {
        let upper_left = Tile::new(10, 20, 6, TILE_SIZE);
        let lower_right = Tile::new(12, 23, 6, TILE_SIZE);
        let range = Tile::get_bounding_box_range(&upper_left, &lower_right);

        assert_eq!(range.max_latitude, upper_left.get_bounding_box().max_latitude);
        assert_eq!(range.min_longitude, upper_left.get_bounding_box().min_longitude);
        assert_eq!(range.min_latitude, lower_right.get_bounding_box().min_latitude);
        assert_eq!(range.max_longitude, lower_right.get_bounding_box().max_longitude);
    }

    #[test]
    fn test_is_valid() {
        assert!(Tile::new(0, 0, 0, TILE_SIZE).is_valid());
        assert!(Tile::new(15, 15, 4, TILE_SIZE).is_valid());
        assert!(!Tile::new(16, 0, 4, TILE_SIZE).is_valid());
        assert!(!Tile::new(0, -1, 4, TILE_SIZE).is_valid());
        assert!(!Tile::new(0, 0, MAX_ZOOM_LEVEL + 1, TILE_SIZE).is_valid());

        let tile = Tile::new(0, 0, 64, TILE_SIZE);
        assert!(!tile.is_valid());
        // clamped, not a shift overflow
        assert!(tile.get_bounding_box().max_latitude > 85.0);
    }

    #[test]
    fn test_origin() {
        assert_eq!(Tile::new(3, 5, 4, TILE_SIZE).get_origin(), (768, 1280));
    }
}
