use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::UNIX_EPOCH;

use tracing::{debug, info, warn};

use crate::block_decoder::{BlockDecoder, BlockQuery};
use crate::config::MapFileConfig;
use crate::errors::MapFileError;
use crate::header::{MapFileHeader, MapFileInfo, SubFileParameter};
use crate::index_cache::IndexCache;
use crate::map_data::{MapReadResult, Selector};
use crate::map_data_store::MapDataStore;
use crate::mercator::MercatorProjection;
use crate::query_parameters::QueryParameters;
use crate::reader::{FileChannel, ReadBuffer};
use crate::tile::Tile;
use crate::types::{BoundingBox, LatLong};

pub const DEFAULT_START_ZOOM_LEVEL: u8 = 12;

const BITMASK_INDEX_OFFSET: u64 = 0x7f_ffff_ffff;
const BITMASK_INDEX_WATER: u64 = 0x80_0000_0000;

/// Reader for one binary map file.
///
/// All query methods take `&self`; a `MapFile` can be shared between
/// threads and queried concurrently.
pub struct MapFile<R = File> {
    file_channel: Arc<FileChannel<R>>,
    header: MapFileHeader,
    database_index_cache: IndexCache<R>,
    config: MapFileConfig,
    file_size: i64,
    timestamp: i64,
    zoom_level_min: AtomicU8,
    zoom_level_max: AtomicU8,
}

impl MapFile<File> {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, MapFileError> {
        Self::open_with_config(path, MapFileConfig::default())
    }

    pub fn open_with_config<P: AsRef<Path>>(
        path: P,
        config: MapFileConfig,
    ) -> Result<Self, MapFileError> {
        let path = path.as_ref();
        let open_error = |source: MapFileError| MapFileError::Open {
            path: path.to_path_buf(),
            source: Box::new(source),
        };

        let file = File::open(path).map_err(|e| open_error(e.into()))?;
        let metadata = file.metadata().map_err(|e| open_error(e.into()))?;
        let timestamp = metadata
            .modified()
            .ok()
            .and_then(|modified| modified.duration_since(UNIX_EPOCH).ok())
            .map(|duration| duration.as_millis() as i64)
            .unwrap_or(0);

        let map_file = Self::from_channel(file, metadata.len() as i64, timestamp, config)
            .map_err(open_error)?;
        info!("opened map file {:?}", path);
        Ok(map_file)
    }
}

impl<R: Read + Seek> MapFile<R> {
    /// Opens a map from any seekable source; its size is taken from the end
    /// position.
    pub fn from_reader(
        mut reader: R,
        timestamp: i64,
        config: MapFileConfig,
    ) -> Result<Self, MapFileError> {
        let file_size = reader.seek(SeekFrom::End(0))? as i64;
        Self::from_channel(reader, file_size, timestamp, config)
    }

    fn from_channel(
        reader: R,
        file_size: i64,
        timestamp: i64,
        config: MapFileConfig,
    ) -> Result<Self, MapFileError> {
        let file_channel = Arc::new(FileChannel::new(reader));
        let header = MapFileHeader::read_header(&file_channel, file_size)?;
        let database_index_cache =
            IndexCache::new(Arc::clone(&file_channel), config.index_cache_size);

        Ok(Self {
            file_channel,
            header,
            database_index_cache,
            config,
            file_size,
            timestamp,
            zoom_level_min: AtomicU8::new(0),
            zoom_level_max: AtomicU8::new(u8::MAX),
        })
    }

    pub fn get_map_file_info(&self) -> &MapFileInfo {
        self.header.get_map_file_info()
    }

    pub fn header(&self) -> &MapFileHeader {
        &self.header
    }

    pub fn get_config(&self) -> &MapFileConfig {
        &self.config
    }

    pub fn get_data_timestamp(&self, _tile: &Tile) -> i64 {
        self.timestamp
    }

    /// Languages named in the header's language preference, if any.
    pub fn get_map_languages(&self) -> Option<Vec<String>> {
        self.get_map_file_info()
            .languages_preference
            .as_deref()
            .filter(|languages| !languages.trim().is_empty())
            .map(|languages| languages.split(',').map(str::to_string).collect())
    }

    /// Limits the zoom levels for which [`MapFile::supports_tile`] answers true.
    pub fn restrict_to_zoom_range(&self, min_zoom: u8, max_zoom: u8) {
        self.zoom_level_min.store(min_zoom, Ordering::Relaxed);
        self.zoom_level_max.store(max_zoom, Ordering::Relaxed);
    }

    pub fn bounding_box(&self) -> &BoundingBox {
        &self.get_map_file_info().bounding_box
    }

    pub fn start_position(&self) -> LatLong {
        let info = self.get_map_file_info();
        info.start_position
            .clone()
            .unwrap_or_else(|| info.bounding_box.get_center_point())
    }

    pub fn start_zoom_level(&self) -> u8 {
        self.get_map_file_info()
            .start_zoom_level
            .unwrap_or(DEFAULT_START_ZOOM_LEVEL)
    }

    pub fn supports_tile(&self, tile: &Tile) -> bool {
        let zoom_level_min = self.zoom_level_min.load(Ordering::Relaxed);
        let zoom_level_max = self.zoom_level_max.load(Ordering::Relaxed);
        tile.is_valid()
            && (zoom_level_min..=zoom_level_max).contains(&tile.zoom_level)
            && tile.get_bounding_box().intersects(self.bounding_box())
    }

    pub fn is_closed(&self) -> bool {
        self.file_channel.is_closed()
    }

    pub fn close(&self) {
        self.file_channel.close();
        self.database_index_cache.destroy();
        info!("closed map file");
    }

    pub fn read_map_data(
        &self,
        tile: &Tile,
        selector: Selector,
    ) -> Result<MapReadResult, MapFileError> {
        self.read_map_data_range(tile, tile, selector)
    }

    pub fn read_poi_data(&self, tile: &Tile) -> Result<MapReadResult, MapFileError> {
        self.read_map_data_range(tile, tile, Selector::Pois)
    }

    pub fn read_labels(&self, tile: &Tile) -> Result<MapReadResult, MapFileError> {
        self.read_map_data_range(tile, tile, Selector::Labels)
    }

    /// Reads the data of every tile between `upper_left` and `lower_right`.
    pub fn read_map_data_range(
        &self,
        upper_left: &Tile,
        lower_right: &Tile,
        selector: Selector,
    ) -> Result<MapReadResult, MapFileError> {
        if upper_left.zoom_level != lower_right.zoom_level {
            return Err(MapFileError::InvalidQuery(format!(
                "tiles on different zoom levels: {} {}",
                upper_left.zoom_level, lower_right.zoom_level
            )));
        }
        for tile in [upper_left, lower_right] {
            if !tile.is_valid() {
                return Err(MapFileError::InvalidQuery(format!("invalid tile: {:?}", tile)));
            }
        }
        if upper_left.tile_x > lower_right.tile_x || upper_left.tile_y > lower_right.tile_y {
            return Err(MapFileError::InvalidQuery(
                "upper left tile must be above and left of lower right tile".to_string(),
            ));
        }
        if self.is_closed() {
            return Err(MapFileError::Closed);
        }

        let query_zoom_level = self.header.get_query_zoom_level(upper_left.zoom_level);
        let sub_file_parameter = self
            .header
            .get_sub_file_parameter(query_zoom_level)
            .ok_or_else(|| {
                MapFileError::format(format!("no sub-file for zoom level: {}", query_zoom_level))
            })?;

        let mut query_parameters = QueryParameters::new(query_zoom_level);
        query_parameters.calculate_base_tiles(upper_left, lower_right, sub_file_parameter);
        query_parameters.calculate_blocks(sub_file_parameter);

        if query_parameters.is_empty() {
            debug!("tiles outside of map file: {:?} {:?}", upper_left, lower_right);
            return Ok(MapReadResult::new());
        }

        let bounding_box = Tile::get_bounding_box_range(upper_left, lower_right);
        self.process_blocks(&query_parameters, sub_file_parameter, &bounding_box, selector)
    }

    fn process_blocks(
        &self,
        query_parameters: &QueryParameters,
        sub_file_parameter: &SubFileParameter,
        bounding_box: &BoundingBox,
        selector: Selector,
    ) -> Result<MapReadResult, MapFileError> {
        let map_file_info = self.get_map_file_info();
        let decoder = BlockDecoder::new(
            map_file_info.debug_file,
            &map_file_info.poi_tags,
            &map_file_info.way_tags,
            &self.config,
        );
        let mut read_buffer = ReadBuffer::new(self.config.maximum_buffer_size);

        let mut query_is_water = true;
        let mut query_read_water_info = false;
        let mut result = MapReadResult::new();

        debug!(
            "reading blocks {}..={} (x) {}..={} (y)",
            query_parameters.from_block_x,
            query_parameters.to_block_x,
            query_parameters.from_block_y,
            query_parameters.to_block_y
        );

        // top to bottom, left to right
        for row in query_parameters.from_block_y..=query_parameters.to_block_y {
            for column in query_parameters.from_block_x..=query_parameters.to_block_x {
                let block_number = row * sub_file_parameter.blocks_width + column;

                let current_block_index_entry = self
                    .database_index_cache
                    .get_index_entry(sub_file_parameter, block_number)?;

                query_is_water &= current_block_index_entry & BITMASK_INDEX_WATER != 0;
                query_read_water_info = true;

                let current_block_pointer =
                    (current_block_index_entry & BITMASK_INDEX_OFFSET) as i64;
                if current_block_pointer < 1
                    || current_block_pointer > sub_file_parameter.sub_file_size
                {
                    return Err(MapFileError::format(format!(
                        "invalid current block pointer: {}",
                        current_block_pointer
                    )));
                }

                let next_block_pointer = if block_number + 1 == sub_file_parameter.number_of_blocks
                {
                    sub_file_parameter.sub_file_size
                } else {
                    let next_block_pointer = (self
                        .database_index_cache
                        .get_index_entry(sub_file_parameter, block_number + 1)?
                        & BITMASK_INDEX_OFFSET) as i64;
                    if next_block_pointer > sub_file_parameter.sub_file_size {
                        return Err(MapFileError::format(format!(
                            "invalid next block pointer: {}",
                            next_block_pointer
                        )));
                    }
                    next_block_pointer
                };

                let current_block_size = next_block_pointer - current_block_pointer;
                if current_block_size < 0 {
                    return Err(MapFileError::format(format!(
                        "invalid current block size: {}",
                        current_block_size
                    )));
                } else if current_block_size == 0 {
                    // the current block is empty, continue with the next block
                    continue;
                } else if current_block_size as u64 > self.config.maximum_buffer_size as u64 {
                    warn!("current block size too large: {}", current_block_size);
                    continue;
                }

                let block_position = sub_file_parameter.start_address + current_block_pointer;
                if block_position + current_block_size > self.file_size {
                    return Err(MapFileError::format(format!(
                        "current block exceeds file size: {}",
                        block_position + current_block_size
                    )));
                }

                read_buffer.read_from_channel(
                    &self.file_channel,
                    block_position as u64,
                    current_block_size as usize,
                )?;

                let tile_latitude = MercatorProjection::tile_y_to_latitude(
                    sub_file_parameter.boundary_tile_top + row,
                    sub_file_parameter.base_zoom_level,
                );
                let tile_longitude = MercatorProjection::tile_x_to_longitude(
                    sub_file_parameter.boundary_tile_left + column,
                    sub_file_parameter.base_zoom_level,
                );

                let block_query = BlockQuery {
                    query_parameters,
                    sub_file_parameter,
                    bounding_box,
                    tile_latitude,
                    tile_longitude,
                    selector,
                };
                let bundle = decoder.decode_block(&block_query, &mut read_buffer)?;
                debug!(
                    "block {}: {} POIs, {} ways",
                    block_number,
                    bundle.pois.len(),
                    bundle.ways.len()
                );
                result.add(bundle, false);
            }
        }

        result.is_water = query_is_water && query_read_water_info;
        Ok(result)
    }
}

impl<R: Read + Seek + Send> MapDataStore for MapFile<R> {
    fn bounding_box(&self) -> Option<BoundingBox> {
        Some(MapFile::<R>::bounding_box(self).clone())
    }

    fn start_position(&self) -> Option<LatLong> {
        Some(MapFile::<R>::start_position(self))
    }

    fn start_zoom_level(&self) -> Option<u8> {
        Some(MapFile::<R>::start_zoom_level(self))
    }

    fn supports_tile(&self, tile: &Tile) -> bool {
        MapFile::<R>::supports_tile(self, tile)
    }

    fn get_data_timestamp(&self, tile: &Tile) -> i64 {
        MapFile::<R>::get_data_timestamp(self, tile)
    }

    fn read_map_data_range(
        &self,
        upper_left: &Tile,
        lower_right: &Tile,
        selector: Selector,
    ) -> Result<MapReadResult, MapFileError> {
        MapFile::<R>::read_map_data_range(self, upper_left, lower_right, selector)
    }

    fn close(&self) {
        MapFile::<R>::close(self)
    }
}
