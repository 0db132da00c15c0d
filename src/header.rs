use std::io::{Read, Seek};

use tracing::debug;

use crate::{
    errors::MapFileError,
    optional_field::OptionalFields,
    reader::{FileChannel, ReadBuffer},
    required_field::RequiredFields,
    types::{BoundingBox, LatLong, Tag},
    MercatorProjection,
};

/// Geometry and location of one sub-file: the data for a band of zoom levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubFileParameter {
    pub base_zoom_level: u8,
    pub blocks_height: i64,
    pub blocks_width: i64,
    pub boundary_tile_bottom: i64,
    pub boundary_tile_left: i64,
    pub boundary_tile_right: i64,
    pub boundary_tile_top: i64,
    pub index_end_address: i64,
    pub index_start_address: i64,
    pub number_of_blocks: i64,
    pub start_address: i64,
    pub sub_file_size: i64,
    pub zoom_level_max: u8,
    pub zoom_level_min: u8,
}

impl SubFileParameter {
    pub const BYTES_PER_INDEX_ENTRY: u8 = 5;
}

#[derive(Default)]
pub struct SubFileParameterBuilder {
    pub base_zoom_level: u8,
    pub bounding_box: Option<BoundingBox>,
    pub index_start_address: i64,
    pub start_address: i64,
    pub sub_file_size: i64,
    pub zoom_level_max: u8,
    pub zoom_level_min: u8,
}

impl SubFileParameterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn build(self) -> Result<SubFileParameter, MapFileError> {
        let bounding_box = self
            .bounding_box
            .ok_or_else(|| MapFileError::header("bounding box is required"))?;

        let boundary_tile_bottom =
            MercatorProjection::latitude_to_tile_y(bounding_box.min_latitude, self.base_zoom_level);
        let boundary_tile_left = MercatorProjection::longitude_to_tile_x(
            bounding_box.min_longitude,
            self.base_zoom_level,
        );
        let boundary_tile_top =
            MercatorProjection::latitude_to_tile_y(bounding_box.max_latitude, self.base_zoom_level);
        let boundary_tile_right = MercatorProjection::longitude_to_tile_x(
            bounding_box.max_longitude,
            self.base_zoom_level,
        );

        let blocks_width = boundary_tile_right - boundary_tile_left + 1;
        let blocks_height = boundary_tile_bottom - boundary_tile_top + 1;
        let number_of_blocks = blocks_width * blocks_height;

        let index_end_address = self.index_start_address
            + number_of_blocks * SubFileParameter::BYTES_PER_INDEX_ENTRY as i64;

        debug!(
            "sub-file base zoom {}: {}x{} blocks, index {}..{}",
            self.base_zoom_level,
            blocks_width,
            blocks_height,
            self.index_start_address,
            index_end_address
        );

        Ok(SubFileParameter {
            base_zoom_level: self.base_zoom_level,
            blocks_height,
            blocks_width,
            boundary_tile_bottom,
            boundary_tile_left,
            boundary_tile_right,
            boundary_tile_top,
            index_end_address,
            index_start_address: self.index_start_address,
            number_of_blocks,
            start_address: self.start_address,
            sub_file_size: self.sub_file_size,
            zoom_level_max: self.zoom_level_max,
            zoom_level_min: self.zoom_level_min,
        })
    }
}

/// Metadata from the file header.
#[derive(Debug, Clone)]
pub struct MapFileInfo {
    pub bounding_box: BoundingBox,
    pub comment: Option<String>,
    pub created_by: Option<String>,
    pub debug_file: bool,
    pub file_size: i64,
    pub file_version: i32,
    pub languages_preference: Option<String>,
    pub map_date: i64,
    pub number_of_sub_files: u8,
    pub poi_tags: Vec<Tag>,
    pub projection_name: String,
    pub start_position: Option<LatLong>,
    pub start_zoom_level: Option<u8>,
    pub tile_pixel_size: i32,
    pub way_tags: Vec<Tag>,
    pub zoom_level_min: u8,
    pub zoom_level_max: u8,
}

#[derive(Default)]
pub struct MapFileInfoBuilder {
    pub bounding_box: Option<BoundingBox>,
    pub file_size: i64,
    pub file_version: i32,
    pub map_date: i64,
    pub number_of_sub_files: u8,
    pub optional_fields: OptionalFields,
    pub poi_tags: Vec<Tag>,
    pub projection_name: String,
    pub tile_pixel_size: i32,
    pub way_tags: Vec<Tag>,
    pub zoom_level_min: u8,
    pub zoom_level_max: u8,
}

impl MapFileInfoBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn build(self) -> Result<MapFileInfo, MapFileError> {
        let bounding_box = self
            .bounding_box
            .ok_or_else(|| MapFileError::header("bounding box is required"))?;

        Ok(MapFileInfo {
            bounding_box,
            comment: self.optional_fields.comment,
            created_by: self.optional_fields.created_by,
            debug_file: self.optional_fields.is_debug_file,
            file_size: self.file_size,
            file_version: self.file_version,
            languages_preference: self.optional_fields.languages_preference,
            map_date: self.map_date,
            number_of_sub_files: self.number_of_sub_files,
            poi_tags: self.poi_tags,
            projection_name: self.projection_name,
            start_position: self.optional_fields.start_position,
            start_zoom_level: self.optional_fields.start_zoom_level,
            tile_pixel_size: self.tile_pixel_size,
            way_tags: self.way_tags,
            zoom_level_min: self.zoom_level_min,
            zoom_level_max: self.zoom_level_max,
        })
    }
}

/// Parsed file header: metadata plus a lookup table from zoom level to the
/// sub-file that serves it.
#[derive(Debug)]
pub struct MapFileHeader {
    map_file_info: MapFileInfo,
    sub_file_parameters: Vec<Option<SubFileParameter>>,
    zoom_level_maximum: u8,
    zoom_level_minimum: u8,
}

impl MapFileHeader {
    pub const BASE_ZOOM_LEVEL_MAX: u8 = 20;
    pub const HEADER_SIZE_MIN: i32 = 70;
    pub const HEADER_SIZE_MAX: i32 = 1_000_000;
    pub const SIGNATURE_LENGTH_INDEX: u8 = 16;
    pub const ZOOM_LEVEL_MAX: u8 = 22;

    pub fn get_map_file_info(&self) -> &MapFileInfo {
        &self.map_file_info
    }

    /// Clamps `zoom_level` into the range covered by the sub-files.
    pub fn get_query_zoom_level(&self, zoom_level: u8) -> u8 {
        zoom_level.clamp(self.zoom_level_minimum, self.zoom_level_maximum)
    }

    pub fn get_sub_file_parameter(&self, query_zoom_level: u8) -> Option<&SubFileParameter> {
        self.sub_file_parameters
            .get(query_zoom_level as usize)
            .and_then(Option::as_ref)
    }

    /// All distinct sub-files, ordered by minimum zoom level.
    pub fn sub_file_parameters(&self) -> Vec<SubFileParameter> {
        let mut result: Vec<SubFileParameter> = Vec::new();
        for parameter in self.sub_file_parameters.iter().flatten() {
            if !result.contains(parameter) {
                result.push(*parameter);
            }
        }
        result
    }

    pub fn read_header<R: Read + Seek>(
        channel: &FileChannel<R>,
        file_size: i64,
    ) -> Result<MapFileHeader, MapFileError> {
        let mut read_buffer = ReadBuffer::new(Self::HEADER_SIZE_MAX as usize);

        RequiredFields::read_magic_byte(channel, &mut read_buffer)?;
        RequiredFields::read_remaining_header(channel, &mut read_buffer)?;

        let mut map_file_info_builder = MapFileInfoBuilder::new();

        RequiredFields::read_file_version(&mut read_buffer, &mut map_file_info_builder)?;
        RequiredFields::read_file_size(&mut read_buffer, file_size, &mut map_file_info_builder)?;
        RequiredFields::read_map_date(&mut read_buffer, &mut map_file_info_builder)?;
        RequiredFields::read_bounding_box(&mut read_buffer, &mut map_file_info_builder)?;
        RequiredFields::read_tile_pixel_size(&mut read_buffer, &mut map_file_info_builder)?;
        RequiredFields::read_projection_name(&mut read_buffer, &mut map_file_info_builder)?;

        let mut optional_fields = OptionalFields::new(read_buffer.read_byte()?);
        optional_fields.read_optional_fields(&mut read_buffer)?;
        map_file_info_builder.optional_fields = optional_fields;

        RequiredFields::read_poi_tags(&mut read_buffer, &mut map_file_info_builder)?;
        RequiredFields::read_way_tags(&mut read_buffer, &mut map_file_info_builder)?;

        let sub_file_parameters = Self::read_sub_file_parameters(
            &mut read_buffer,
            file_size,
            &mut map_file_info_builder,
        )?;
        let map_file_info = map_file_info_builder.build()?;

        debug!(
            "header: version {}, zoom {}..={}, {} sub-files",
            map_file_info.file_version,
            map_file_info.zoom_level_min,
            map_file_info.zoom_level_max,
            map_file_info.number_of_sub_files
        );

        Ok(MapFileHeader {
            zoom_level_minimum: map_file_info.zoom_level_min,
            zoom_level_maximum: map_file_info.zoom_level_max,
            map_file_info,
            sub_file_parameters,
        })
    }

    fn read_sub_file_parameters(
        read_buffer: &mut ReadBuffer,
        file_size: i64,
        map_file_info_builder: &mut MapFileInfoBuilder,
    ) -> Result<Vec<Option<SubFileParameter>>, MapFileError> {
        let number_of_sub_files = read_buffer.read_byte()?;
        if number_of_sub_files < 1 {
            return Err(MapFileError::header(format!(
                "invalid number of sub-files: {}",
                number_of_sub_files
            )));
        }
        map_file_info_builder.number_of_sub_files = number_of_sub_files;

        let mut temp_sub_file_parameters = Vec::with_capacity(number_of_sub_files as usize);
        let mut zoom_level_minimum = u8::MAX;
        let mut zoom_level_maximum = 0u8;

        for _ in 0..number_of_sub_files {
            let mut builder = SubFileParameterBuilder::new();

            let base_zoom_level = read_buffer.read_byte()?;
            if base_zoom_level > Self::BASE_ZOOM_LEVEL_MAX {
                return Err(MapFileError::header(format!(
                    "invalid base zoom level: {}",
                    base_zoom_level
                )));
            }
            builder.base_zoom_level = base_zoom_level;

            let zoom_level_min = read_buffer.read_byte()?;
            if zoom_level_min > Self::ZOOM_LEVEL_MAX {
                return Err(MapFileError::header(format!(
                    "invalid minimum zoom level: {}",
                    zoom_level_min
                )));
            }
            builder.zoom_level_min = zoom_level_min;

            let zoom_level_max = read_buffer.read_byte()?;
            if zoom_level_max > Self::ZOOM_LEVEL_MAX {
                return Err(MapFileError::header(format!(
                    "invalid maximum zoom level: {}",
                    zoom_level_max
                )));
            }
            builder.zoom_level_max = zoom_level_max;

            if zoom_level_min > zoom_level_max {
                return Err(MapFileError::header(format!(
                    "invalid zoom level range: {} {}",
                    zoom_level_min, zoom_level_max
                )));
            }

            let start_address = read_buffer.read_long()?;
            if start_address < Self::HEADER_SIZE_MIN as i64 || start_address >= file_size {
                return Err(MapFileError::header(format!(
                    "invalid start address: {}",
                    start_address
                )));
            }
            builder.start_address = start_address;

            // debug files carry an index signature in front of the index
            builder.index_start_address = if map_file_info_builder.optional_fields.is_debug_file {
                start_address + Self::SIGNATURE_LENGTH_INDEX as i64
            } else {
                start_address
            };

            let sub_file_size = read_buffer.read_long()?;
            if sub_file_size < 1 {
                return Err(MapFileError::header(format!(
                    "invalid sub-file size: {}",
                    sub_file_size
                )));
            }
            builder.sub_file_size = sub_file_size;

            builder.bounding_box = map_file_info_builder.bounding_box.clone();

            let sub_file_parameter = builder.build()?;
            temp_sub_file_parameters.push(sub_file_parameter);

            zoom_level_minimum = zoom_level_minimum.min(zoom_level_min);
            zoom_level_maximum = zoom_level_maximum.max(zoom_level_max);
        }
        map_file_info_builder.zoom_level_min = zoom_level_minimum;
        map_file_info_builder.zoom_level_max = zoom_level_maximum;

        // lookup table indexed by zoom level; gaps stay empty
        let mut sub_file_parameters = vec![None; zoom_level_maximum as usize + 1];
        for sub_file_parameter in &temp_sub_file_parameters {
            for zoom_level in sub_file_parameter.zoom_level_min..=sub_file_parameter.zoom_level_max
            {
                sub_file_parameters[zoom_level as usize] = Some(*sub_file_parameter);
            }
        }

        Ok(sub_file_parameters)
    }
}
