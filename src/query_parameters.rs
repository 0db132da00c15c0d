use crate::header::SubFileParameter;
use crate::query_calculations::QueryCalculations;
use crate::tile::Tile;

/// Per-query tile and block ranges within one sub-file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct QueryParameters {
    pub from_base_tile_x: i64,
    pub from_base_tile_y: i64,
    pub from_block_x: i64,
    pub from_block_y: i64,
    pub query_tile_bitmask: u16,
    pub query_zoom_level: u8,
    pub to_base_tile_x: i64,
    pub to_base_tile_y: i64,
    pub to_block_x: i64,
    pub to_block_y: i64,
    pub use_tile_bitmask: bool,
}

impl QueryParameters {
    pub fn new(query_zoom_level: u8) -> Self {
        Self {
            query_zoom_level,
            ..Self::default()
        }
    }

    /// Maps the requested tile range onto base tiles of the sub-file.
    pub fn calculate_base_tiles(
        &mut self,
        upper_left: &Tile,
        lower_right: &Tile,
        sub_file_parameter: &SubFileParameter,
    ) {
        let base_zoom_level = sub_file_parameter.base_zoom_level;

        if upper_left.zoom_level < base_zoom_level {
            // every base tile below the requested tiles is needed
            let zoom_level_difference = base_zoom_level - upper_left.zoom_level;
            self.from_base_tile_x = upper_left.tile_x << zoom_level_difference;
            self.from_base_tile_y = upper_left.tile_y << zoom_level_difference;
            self.to_base_tile_x =
                (lower_right.tile_x << zoom_level_difference) + (1 << zoom_level_difference) - 1;
            self.to_base_tile_y =
                (lower_right.tile_y << zoom_level_difference) + (1 << zoom_level_difference) - 1;
            self.use_tile_bitmask = false;
        } else if upper_left.zoom_level > base_zoom_level {
            // finer than a base tile, may still span base tile boundaries
            let zoom_level_difference = upper_left.zoom_level - base_zoom_level;
            self.from_base_tile_x = upper_left.tile_x >> zoom_level_difference;
            self.from_base_tile_y = upper_left.tile_y >> zoom_level_difference;
            self.to_base_tile_x = lower_right.tile_x >> zoom_level_difference;
            self.to_base_tile_y = lower_right.tile_y >> zoom_level_difference;
            self.use_tile_bitmask = true;
            self.query_tile_bitmask = QueryCalculations::calculate_tile_bitmask_range(
                upper_left,
                lower_right,
                zoom_level_difference,
            );
        } else {
            self.from_base_tile_x = upper_left.tile_x;
            self.from_base_tile_y = upper_left.tile_y;
            self.to_base_tile_x = lower_right.tile_x;
            self.to_base_tile_y = lower_right.tile_y;
            self.use_tile_bitmask = false;
        }
    }

    /// Clamps the base tile range to the sub-file's block grid.
    pub fn calculate_blocks(&mut self, sub_file_parameter: &SubFileParameter) {
        self.from_block_x = (self.from_base_tile_x - sub_file_parameter.boundary_tile_left).max(0);
        self.from_block_y = (self.from_base_tile_y - sub_file_parameter.boundary_tile_top).max(0);
        self.to_block_x = (self.to_base_tile_x - sub_file_parameter.boundary_tile_left)
            .min(sub_file_parameter.blocks_width - 1);
        self.to_block_y = (self.to_base_tile_y - sub_file_parameter.boundary_tile_top)
            .min(sub_file_parameter.blocks_height - 1);
    }

    /// True when the clamped range selects no block at all, i.e. the
    /// requested tiles lie outside the sub-file.
    pub fn is_empty(&self) -> bool {
        self.from_block_x > self.to_block_x || self.from_block_y > self.to_block_y
    }
}
