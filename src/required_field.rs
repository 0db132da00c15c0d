use std::io::{Read, Seek};

use crate::errors::MapFileError;
use crate::header::{MapFileHeader, MapFileInfoBuilder};
use crate::mercator::{LATITUDE_MAX, LATITUDE_MIN};
use crate::reader::{FileChannel, ReadBuffer};
use crate::types::{BoundingBox, LatLongUtils, Tag};

const BINARY_OSM_MAGIC_BYTE: &str = "mapsforge binary OSM";
const MERCATOR: &str = "Mercator";
const MAP_DATE_MIN: i64 = 1_200_000_000_000;
const SUPPORTED_FILE_VERSION_MIN: i32 = 3;
const SUPPORTED_FILE_VERSION_MAX: i32 = 5;

/// Readers for the header fields every map file must carry, in file order.
pub struct RequiredFields;

impl RequiredFields {
    /// Reads the magic bytes plus the remaining-header-size field.
    pub fn read_magic_byte<R: Read + Seek>(
        channel: &FileChannel<R>,
        read_buffer: &mut ReadBuffer,
    ) -> Result<(), MapFileError> {
        let magic_byte_length = BINARY_OSM_MAGIC_BYTE.len();

        // fixed length, no length prefix
        if !read_buffer.read_from_channel(channel, 0, magic_byte_length + 4)? {
            return Err(MapFileError::header("reading magic byte has failed"));
        }

        let magic_byte = read_buffer.read_utf8_encoded_string_with_length(magic_byte_length)?;
        if magic_byte != BINARY_OSM_MAGIC_BYTE {
            return Err(MapFileError::header(format!(
                "invalid magic byte: {}",
                magic_byte
            )));
        }

        Ok(())
    }

    pub fn read_remaining_header<R: Read + Seek>(
        channel: &FileChannel<R>,
        read_buffer: &mut ReadBuffer,
    ) -> Result<(), MapFileError> {
        let remaining_header_size = read_buffer.read_int()?;
        if !(MapFileHeader::HEADER_SIZE_MIN..=MapFileHeader::HEADER_SIZE_MAX)
            .contains(&remaining_header_size)
        {
            return Err(MapFileError::header(format!(
                "invalid remaining header size: {}",
                remaining_header_size
            )));
        }

        let position = read_buffer.get_buffer_size() as u64;
        if !read_buffer.read_from_channel(channel, position, remaining_header_size as usize)? {
            return Err(MapFileError::header(format!(
                "reading header data has failed: {}",
                remaining_header_size
            )));
        }

        Ok(())
    }

    pub fn read_file_version(
        read_buffer: &mut ReadBuffer,
        map_file_info_builder: &mut MapFileInfoBuilder,
    ) -> Result<(), MapFileError> {
        let file_version = read_buffer.read_int()?;
        if !(SUPPORTED_FILE_VERSION_MIN..=SUPPORTED_FILE_VERSION_MAX).contains(&file_version) {
            return Err(MapFileError::header(format!(
                "unsupported file version: {}",
                file_version
            )));
        }
        map_file_info_builder.file_version = file_version;
        Ok(())
    }

    pub fn read_file_size(
        read_buffer: &mut ReadBuffer,
        file_size: i64,
        map_file_info_builder: &mut MapFileInfoBuilder,
    ) -> Result<(), MapFileError> {
        let header_file_size = read_buffer.read_long()?;
        if header_file_size != file_size {
            return Err(MapFileError::header(format!(
                "invalid file size: {} (actual {})",
                header_file_size, file_size
            )));
        }
        map_file_info_builder.file_size = file_size;
        Ok(())
    }

    pub fn read_map_date(
        read_buffer: &mut ReadBuffer,
        map_file_info_builder: &mut MapFileInfoBuilder,
    ) -> Result<(), MapFileError> {
        let map_date = read_buffer.read_long()?;
        if map_date < MAP_DATE_MIN {
            return Err(MapFileError::header(format!(
                "invalid map date: {}",
                map_date
            )));
        }
        map_file_info_builder.map_date = map_date;
        Ok(())
    }

    pub fn read_bounding_box(
        read_buffer: &mut ReadBuffer,
        map_file_info_builder: &mut MapFileInfoBuilder,
    ) -> Result<(), MapFileError> {
        let min_latitude = LatLongUtils::microdegrees_to_degrees(read_buffer.read_int()?);
        let min_longitude = LatLongUtils::microdegrees_to_degrees(read_buffer.read_int()?);
        let max_latitude = LatLongUtils::microdegrees_to_degrees(read_buffer.read_int()?);
        let max_longitude = LatLongUtils::microdegrees_to_degrees(read_buffer.read_int()?);

        for latitude in [min_latitude, max_latitude] {
            if !(LATITUDE_MIN..=LATITUDE_MAX).contains(&latitude) {
                return Err(MapFileError::header(format!(
                    "invalid latitude: {}",
                    latitude
                )));
            }
        }
        for longitude in [min_longitude, max_longitude] {
            if !(LatLongUtils::LONGITUDE_MIN..=LatLongUtils::LONGITUDE_MAX).contains(&longitude) {
                return Err(MapFileError::header(format!(
                    "invalid longitude: {}",
                    longitude
                )));
            }
        }

        let bounding_box =
            BoundingBox::new(min_latitude, min_longitude, max_latitude, max_longitude)
                .map_err(|e| MapFileError::header(format!("invalid bounding box: {}", e)))?;
        map_file_info_builder.bounding_box = Some(bounding_box);
        Ok(())
    }

    pub fn read_tile_pixel_size(
        read_buffer: &mut ReadBuffer,
        map_file_info_builder: &mut MapFileInfoBuilder,
    ) -> Result<(), MapFileError> {
        let tile_pixel_size = read_buffer.read_short()? as i32;
        if tile_pixel_size < 1 {
            return Err(MapFileError::header(format!(
                "invalid tile pixel size: {}",
                tile_pixel_size
            )));
        }
        map_file_info_builder.tile_pixel_size = tile_pixel_size;
        Ok(())
    }

    pub fn read_projection_name(
        read_buffer: &mut ReadBuffer,
        map_file_info_builder: &mut MapFileInfoBuilder,
    ) -> Result<(), MapFileError> {
        let projection_name = read_buffer.read_utf8_encoded_string()?;
        if projection_name != MERCATOR {
            return Err(MapFileError::header(format!(
                "unsupported projection: {}",
                projection_name
            )));
        }
        map_file_info_builder.projection_name = projection_name;
        Ok(())
    }

    pub fn read_poi_tags(
        read_buffer: &mut ReadBuffer,
        map_file_info_builder: &mut MapFileInfoBuilder,
    ) -> Result<(), MapFileError> {
        map_file_info_builder.poi_tags = Self::read_tag_table(read_buffer, "POI")?;
        Ok(())
    }

    pub fn read_way_tags(
        read_buffer: &mut ReadBuffer,
        map_file_info_builder: &mut MapFileInfoBuilder,
    ) -> Result<(), MapFileError> {
        map_file_info_builder.way_tags = Self::read_tag_table(read_buffer, "way")?;
        Ok(())
    }

    fn read_tag_table(read_buffer: &mut ReadBuffer, kind: &str) -> Result<Vec<Tag>, MapFileError> {
        let number_of_tags = read_buffer.read_short()?;
        if number_of_tags < 0 {
            return Err(MapFileError::header(format!(
                "invalid number of {} tags: {}",
                kind, number_of_tags
            )));
        }

        let mut tags = Vec::with_capacity(number_of_tags as usize);
        for current_tag_id in 0..number_of_tags {
            let tag = read_buffer.read_utf8_encoded_string().map_err(|_| {
                MapFileError::header(format!("{} tag must not be null: {}", kind, current_tag_id))
            })?;
            tags.push(Tag::from_string(tag));
        }
        Ok(tags)
    }
}
