use crate::tile::Tile;

/// Selects the sub-tiles of a base tile that a finer tile falls into.
///
/// Each base tile is split into a 4x4 grid; bit 15 is the upper left
/// sub-tile and bit 0 the lower right, in row-major order.
pub struct QueryCalculations;

impl QueryCalculations {
    /// Mask for `tile`, which lies `zoom_level_difference` levels (1 or 2)
    /// below the base zoom level. Larger differences use the level-2
    /// ancestor of the tile.
    pub fn calculate_tile_bitmask(tile: &Tile, zoom_level_difference: u8) -> u16 {
        if zoom_level_difference == 1 {
            return Self::get_first_level_tile_bitmask(tile);
        }

        // the second level sub-tile and its parent
        let subtile_x = tile.tile_x >> (zoom_level_difference - 2);
        let subtile_y = tile.tile_y >> (zoom_level_difference - 2);
        let parent_tile_x = subtile_x >> 1;
        let parent_tile_y = subtile_y >> 1;

        match (parent_tile_x % 2 == 0, parent_tile_y % 2 == 0) {
            (true, true) => Self::get_second_level_tile_bitmask_upper_left(subtile_x, subtile_y),
            (false, true) => Self::get_second_level_tile_bitmask_upper_right(subtile_x, subtile_y),
            (true, false) => Self::get_second_level_tile_bitmask_lower_left(subtile_x, subtile_y),
            (false, false) => {
                Self::get_second_level_tile_bitmask_lower_right(subtile_x, subtile_y)
            }
        }
    }

    /// OR of the masks of every tile in the range. Conservative: the
    /// result may select sub-tiles outside the range.
    pub fn calculate_tile_bitmask_range(
        upper_left: &Tile,
        lower_right: &Tile,
        zoom_level_difference: u8,
    ) -> u16 {
        let mut bitmask = 0;
        for x in upper_left.tile_x..=lower_right.tile_x {
            for y in upper_left.tile_y..=lower_right.tile_y {
                let current = Tile::new(x, y, upper_left.zoom_level, upper_left.tile_size);
                bitmask |= Self::calculate_tile_bitmask(&current, zoom_level_difference);
                if bitmask == u16::MAX {
                    return bitmask;
                }
            }
        }
        bitmask
    }

    fn get_first_level_tile_bitmask(tile: &Tile) -> u16 {
        match (tile.tile_x % 2 == 0, tile.tile_y % 2 == 0) {
            // upper left quadrant
            (true, true) => 0xcc00,
            // upper right quadrant
            (false, true) => 0x3300,
            // lower left quadrant
            (true, false) => 0xcc,
            // lower right quadrant
            (false, false) => 0x33,
        }
    }

    /// Picks one of four constants by the sub-tile's quadrant in its parent:
    /// upper left, upper right, lower left, lower right.
    fn select(subtile_x: i64, subtile_y: i64, masks: [u16; 4]) -> u16 {
        match (subtile_x % 2 == 0, subtile_y % 2 == 0) {
            (true, true) => masks[0],
            (false, true) => masks[1],
            (true, false) => masks[2],
            (false, false) => masks[3],
        }
    }

    fn get_second_level_tile_bitmask_upper_left(subtile_x: i64, subtile_y: i64) -> u16 {
        Self::select(subtile_x, subtile_y, [0x8000, 0x4000, 0x800, 0x400])
    }

    fn get_second_level_tile_bitmask_upper_right(subtile_x: i64, subtile_y: i64) -> u16 {
        Self::select(subtile_x, subtile_y, [0x2000, 0x1000, 0x200, 0x100])
    }

    fn get_second_level_tile_bitmask_lower_left(subtile_x: i64, subtile_y: i64) -> u16 {
        Self::select(subtile_x, subtile_y, [0x80, 0x40, 0x8, 0x4])
    }

    fn get_second_level_tile_bitmask_lower_right(subtile_x: i64, subtile_y: i64) -> u16 {
        Self::select(subtile_x, subtile_y, [0x20, 0x10, 0x2, 0x1])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mercator::TILE_SIZE;
    use std::collections::HashSet;

    #[test]
    fn test_first_level_quadrants() {
        let mask = |x, y| QueryCalculations::calculate_tile_bitmask(&Tile::new(x, y, 11, TILE_SIZE), 1);
        assert_eq!(mask(0, 0), 0xcc00);
        assert_eq!(mask(1, 0), 0x3300);
        assert_eq!(mask(0, 1), 0xcc);
        assert_eq!(mask(1, 1), 0x33);
        assert_eq!(mask(5, 7), 0x33);
    }

    #[test]
    fn test_second_level_is_bijection() {
        let mut seen = HashSet::new();
        for x in 0..4 {
            for y in 0..4 {
                let mask =
                    QueryCalculations::calculate_tile_bitmask(&Tile::new(x, y, 12, TILE_SIZE), 2);
                assert_eq!(mask.count_ones(), 1);
                // row-major position within the 4x4 grid
                assert_eq!(mask, 0x8000 >> (y * 4 + x));
                seen.insert(mask);
            }
        }
        assert_eq!(seen.len(), 16);
    }

    #[test]
    fn test_second_level_is_inside_first_level() {
        for x in 0..4 {
            for y in 0..4 {
                let fine = QueryCalculations::calculate_tile_bitmask(&Tile::new(x, y, 12, TILE_SIZE), 2);
                let coarse = QueryCalculations::calculate_tile_bitmask(
                    &Tile::new(x / 2, y / 2, 11, TILE_SIZE),
                    1,
                );
                assert_eq!(fine & coarse, fine);
            }
        }
    }

    #[test]
    fn test_range_is_union() {
        let upper_left = Tile::new(0, 0, 12, TILE_SIZE);
        let lower_right = Tile::new(1, 0, 12, TILE_SIZE);
        assert_eq!(
            QueryCalculations::calculate_tile_bitmask_range(&upper_left, &lower_right, 2),
            0xc000
        );

        let lower_right = Tile::new(3, 3, 12, TILE_SIZE);
        assert_eq!(
            QueryCalculations::calculate_tile_bitmask_range(&upper_left, &lower_right, 2),
            0xffff
        );
    }
}
