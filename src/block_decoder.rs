use tracing::warn;

use crate::config::MapFileConfig;
use crate::header::SubFileParameter;
use crate::map_data::{PoiWayBundle, PointOfInterest, Selector, Way};
use crate::query_parameters::QueryParameters;
use crate::reader::ReadBuffer;
use crate::types::{BoundingBox, LatLong, LatLongUtils, Tag};
use crate::MapFileError;

// POI constants
const POI_FEATURE_ELEVATION: u8 = 0x20;
const POI_FEATURE_HOUSE_NUMBER: u8 = 0x40;
const POI_FEATURE_NAME: u8 = 0x80;
const POI_LAYER_BITMASK: u8 = 0xf0;
const POI_LAYER_SHIFT: u8 = 4;
const POI_NUMBER_OF_TAGS_BITMASK: u8 = 0x0f;

// Signature lengths
const SIGNATURE_LENGTH_BLOCK: usize = 32;
const SIGNATURE_LENGTH_POI: usize = 32;
const SIGNATURE_LENGTH_WAY: usize = 32;

const SIGNATURE_BLOCK: &str = "###TileStart";
const SIGNATURE_POI: &str = "***POIStart";
const SIGNATURE_WAY: &str = "---WayStart";

// Tag keys
const TAG_KEY_ELE: &str = "ele";
const TAG_KEY_HOUSE_NUMBER: &str = "addr:housenumber";
const TAG_KEY_NAME: &str = "name";
const TAG_KEY_REF: &str = "ref";

// Way constants
const WAY_FEATURE_DATA_BLOCKS_BYTE: u8 = 0x08;
const WAY_FEATURE_DOUBLE_DELTA_ENCODING: u8 = 0x04;
const WAY_FEATURE_HOUSE_NUMBER: u8 = 0x40;
const WAY_FEATURE_LABEL_POSITION: u8 = 0x10;
const WAY_FEATURE_NAME: u8 = 0x80;
const WAY_FEATURE_REF: u8 = 0x20;
const WAY_LAYER_BITMASK: u8 = 0xf0;
const WAY_LAYER_SHIFT: u8 = 4;
const WAY_NUMBER_OF_TAGS_BITMASK: u8 = 0x0f;
const WAY_TILE_BITMASK_SIZE: usize = 2;

const MAXIMUM_WAY_NODES_SEQUENCE_LENGTH: u32 = i16::MAX as u32;
const MAXIMUM_WAY_COORDINATE_BLOCKS: u32 = i16::MAX as u32;

/// Longitudes this close beyond ±180 are pulled back onto the bound.
const ANTIMERIDIAN_TOLERANCE: f64 = 0.001;

const LANGUAGE_SEPARATOR: char = '\r';
const LANGUAGE_NAME_SEPARATOR: char = '\u{8}';

/// Optional fields appended to the tag list, in wire order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OptionalField {
    Name,
    HouseNumber,
    Elevation,
    Ref,
}

const POI_OPTIONAL_FIELDS: [(u8, OptionalField); 3] = [
    (POI_FEATURE_NAME, OptionalField::Name),
    (POI_FEATURE_HOUSE_NUMBER, OptionalField::HouseNumber),
    (POI_FEATURE_ELEVATION, OptionalField::Elevation),
];

const WAY_OPTIONAL_FIELDS: [(u8, OptionalField); 3] = [
    (WAY_FEATURE_NAME, OptionalField::Name),
    (WAY_FEATURE_HOUSE_NUMBER, OptionalField::HouseNumber),
    (WAY_FEATURE_REF, OptionalField::Ref),
];

/// Where a block sits and what the query wants from it.
pub struct BlockQuery<'a> {
    pub query_parameters: &'a QueryParameters,
    pub sub_file_parameter: &'a SubFileParameter,
    pub bounding_box: &'a BoundingBox,
    /// Top left corner of the block's base tile.
    pub tile_latitude: f64,
    pub tile_longitude: f64,
    pub selector: Selector,
}

impl BlockQuery<'_> {
    /// Queries finer than the base zoom level only want records near the
    /// requested area.
    fn filter_required(&self) -> bool {
        self.query_parameters.query_zoom_level > self.sub_file_parameter.base_zoom_level
    }
}

/// Decodes the POIs and ways of one block.
pub struct BlockDecoder<'a> {
    debug_file: bool,
    poi_tags: &'a [Tag],
    way_tags: &'a [Tag],
    config: &'a MapFileConfig,
}

impl<'a> BlockDecoder<'a> {
    pub fn new(
        debug_file: bool,
        poi_tags: &'a [Tag],
        way_tags: &'a [Tag],
        config: &'a MapFileConfig,
    ) -> Self {
        Self {
            debug_file,
            poi_tags,
            way_tags,
            config,
        }
    }

    /// Decodes a whole block. Any fault aborts the block; nothing partial is
    /// returned.
    pub fn decode_block(
        &self,
        query: &BlockQuery<'_>,
        read_buffer: &mut ReadBuffer,
    ) -> Result<PoiWayBundle, MapFileError> {
        self.process_block_signature(read_buffer)?;

        let zoom_table = Self::read_zoom_table(query.sub_file_parameter, read_buffer)?;
        let zoom_table_row = query
            .query_parameters
            .query_zoom_level
            .checked_sub(query.sub_file_parameter.zoom_level_min)
            .and_then(|row| zoom_table.get(row as usize))
            .ok_or_else(|| {
                MapFileError::format(format!(
                    "zoom level {} not served by sub-file",
                    query.query_parameters.query_zoom_level
                ))
            })?;
        let (pois_on_query_zoom_level, ways_on_query_zoom_level) = *zoom_table_row;

        let first_way_offset = read_buffer.read_unsigned_int()? as usize;
        let first_way_offset = first_way_offset
            .checked_add(read_buffer.get_buffer_position())
            .filter(|offset| *offset <= read_buffer.get_buffer_size())
            .ok_or_else(|| {
                MapFileError::format(format!("invalid first way offset: {}", first_way_offset))
            })?;

        let pois = self.process_pois(query, pois_on_query_zoom_level, read_buffer)?;

        let ways = if query.selector == Selector::Pois {
            Vec::new()
        } else {
            if read_buffer.get_buffer_position() > first_way_offset {
                return Err(MapFileError::format(format!(
                    "invalid buffer position: {}",
                    read_buffer.get_buffer_position()
                )));
            }
            read_buffer.set_buffer_position(first_way_offset)?;
            self.process_ways(query, ways_on_query_zoom_level, read_buffer)?
        };

        Ok(PoiWayBundle::new(pois, ways))
    }

    fn process_block_signature(&self, read_buffer: &mut ReadBuffer) -> Result<(), MapFileError> {
        if self.debug_file {
            Self::check_signature(read_buffer, SIGNATURE_LENGTH_BLOCK, SIGNATURE_BLOCK, "block")?;
        }
        Ok(())
    }

    fn check_signature(
        read_buffer: &mut ReadBuffer,
        length: usize,
        prefix: &str,
        what: &str,
    ) -> Result<(), MapFileError> {
        let signature = read_buffer.read_utf8_encoded_string_with_length(length)?;
        if !signature.starts_with(prefix) {
            warn!("invalid {} signature: {}", what, signature);
            return Err(MapFileError::format(format!(
                "invalid {} signature: {}",
                what, signature
            )));
        }
        Ok(())
    }

    /// Reads the per-zoom-level counts and returns cumulative
    /// `(pois, ways)` per row, one row per zoom level of the sub-file.
    fn read_zoom_table(
        sub_file_parameter: &SubFileParameter,
        read_buffer: &mut ReadBuffer,
    ) -> Result<Vec<(u32, u32)>, MapFileError> {
        let rows =
            (sub_file_parameter.zoom_level_max - sub_file_parameter.zoom_level_min) as usize + 1;
        // every record takes at least one byte
        let ceiling = read_buffer.get_buffer_size() as u32;
        let mut zoom_table = Vec::with_capacity(rows);

        let mut cumulated_number_of_pois: u32 = 0;
        let mut cumulated_number_of_ways: u32 = 0;

        for _ in 0..rows {
            cumulated_number_of_pois = cumulated_number_of_pois
                .checked_add(read_buffer.read_unsigned_int()?)
                .filter(|count| *count <= ceiling)
                .ok_or_else(|| MapFileError::format("invalid cumulated number of POIs"))?;
            cumulated_number_of_ways = cumulated_number_of_ways
                .checked_add(read_buffer.read_unsigned_int()?)
                .filter(|count| *count <= ceiling)
                .ok_or_else(|| MapFileError::format("invalid cumulated number of ways"))?;

            zoom_table.push((cumulated_number_of_pois, cumulated_number_of_ways));
        }

        Ok(zoom_table)
    }

    fn process_pois(
        &self,
        query: &BlockQuery<'_>,
        number_of_pois: u32,
        read_buffer: &mut ReadBuffer,
    ) -> Result<Vec<PointOfInterest>, MapFileError> {
        let mut pois = Vec::new();
        let filter_required = query.filter_required();

        for _ in 0..number_of_pois {
            if self.debug_file {
                Self::check_signature(read_buffer, SIGNATURE_LENGTH_POI, SIGNATURE_POI, "POI")?;
            }

            let latitude = query.tile_latitude
                + LatLongUtils::microdegrees_to_degrees(read_buffer.read_signed_int()?);
            let longitude = query.tile_longitude
                + LatLongUtils::microdegrees_to_degrees(read_buffer.read_signed_int()?);

            let special_byte = read_buffer.read_byte()?;
            let layer = (special_byte & POI_LAYER_BITMASK) >> POI_LAYER_SHIFT;
            let number_of_tags = special_byte & POI_NUMBER_OF_TAGS_BITMASK;

            let mut tags = read_buffer.read_tags(self.poi_tags, number_of_tags)?;

            let feature_byte = read_buffer.read_byte()?;
            self.read_optional_fields(feature_byte, &POI_OPTIONAL_FIELDS, &mut tags, read_buffer)?;

            // decoded either way to keep the cursor in step
            if !filter_required || query.bounding_box.contains(latitude, longitude) {
                pois.push(PointOfInterest::new(
                    layer,
                    tags,
                    LatLong::new(latitude, longitude),
                ));
            }
        }

        Ok(pois)
    }

    fn read_optional_fields(
        &self,
        feature_byte: u8,
        fields: &[(u8, OptionalField)],
        tags: &mut Vec<Tag>,
        read_buffer: &mut ReadBuffer,
    ) -> Result<(), MapFileError> {
        for &(flag, field) in fields {
            if feature_byte & flag == 0 {
                continue;
            }
            let tag = match field {
                OptionalField::Name => Tag::new(
                    TAG_KEY_NAME,
                    extract_localized(
                        &read_buffer.read_utf8_encoded_string()?,
                        self.config.preferred_language.as_deref(),
                    ),
                ),
                OptionalField::HouseNumber => {
                    Tag::new(TAG_KEY_HOUSE_NUMBER, read_buffer.read_utf8_encoded_string()?)
                }
                OptionalField::Elevation => {
                    Tag::new(TAG_KEY_ELE, read_buffer.read_signed_int()?.to_string())
                }
                OptionalField::Ref => Tag::new(TAG_KEY_REF, read_buffer.read_utf8_encoded_string()?),
            };
            tags.push(tag);
        }
        Ok(())
    }

    fn process_ways(
        &self,
        query: &BlockQuery<'_>,
        number_of_ways: u32,
        read_buffer: &mut ReadBuffer,
    ) -> Result<Vec<Way>, MapFileError> {
        let mut ways = Vec::new();
        let query_parameters = query.query_parameters;
        let filter_ways = query.filter_required() && self.config.way_filter_enabled;
        let way_filter_bbox = query
            .bounding_box
            .extend_meters(self.config.way_filter_distance);

        for _ in 0..number_of_ways {
            if self.debug_file {
                Self::check_signature(read_buffer, SIGNATURE_LENGTH_WAY, SIGNATURE_WAY, "way")?;
            }

            let way_data_size = read_buffer.read_unsigned_int()? as usize;
            if way_data_size < WAY_TILE_BITMASK_SIZE {
                return Err(MapFileError::format(format!(
                    "invalid way data size: {}",
                    way_data_size
                )));
            }

            if query_parameters.use_tile_bitmask {
                let tile_bitmask = read_buffer.read_short()? as u16;
                if query_parameters.query_tile_bitmask & tile_bitmask == 0 {
                    // not in the requested tile, skip the rest of the way
                    read_buffer.skip_bytes(way_data_size - WAY_TILE_BITMASK_SIZE)?;
                    continue;
                }
            } else {
                read_buffer.skip_bytes(WAY_TILE_BITMASK_SIZE)?;
            }

            let special_byte = read_buffer.read_byte()?;
            let layer = (special_byte & WAY_LAYER_BITMASK) >> WAY_LAYER_SHIFT;
            let number_of_tags = special_byte & WAY_NUMBER_OF_TAGS_BITMASK;

            let mut tags = read_buffer.read_tags(self.way_tags, number_of_tags)?;

            let feature_byte = read_buffer.read_byte()?;
            self.read_optional_fields(feature_byte, &WAY_OPTIONAL_FIELDS, &mut tags, read_buffer)?;

            let feature_label_position = feature_byte & WAY_FEATURE_LABEL_POSITION != 0;
            let feature_double_delta_encoding =
                feature_byte & WAY_FEATURE_DOUBLE_DELTA_ENCODING != 0;
            let has_label = feature_label_position
                || feature_byte & (WAY_FEATURE_NAME | WAY_FEATURE_HOUSE_NUMBER | WAY_FEATURE_REF)
                    != 0;

            let label_position = if feature_label_position {
                Some(Self::read_optional_label_position(query, read_buffer)?)
            } else {
                None
            };

            let way_data_blocks = if feature_byte & WAY_FEATURE_DATA_BLOCKS_BYTE != 0 {
                read_buffer.read_unsigned_int()?
            } else {
                1
            };
            if way_data_blocks < 1 || way_data_blocks > MAXIMUM_WAY_COORDINATE_BLOCKS {
                return Err(MapFileError::format(format!(
                    "invalid number of way data blocks: {}",
                    way_data_blocks
                )));
            }

            for _ in 0..way_data_blocks {
                let way_nodes = Self::process_way_data_block(
                    query.tile_latitude,
                    query.tile_longitude,
                    feature_double_delta_encoding,
                    read_buffer,
                )?;

                if filter_ways && !way_filter_bbox.intersects_area(&way_nodes) {
                    continue;
                }
                if query.selector == Selector::Labels && !has_label {
                    continue;
                }

                ways.push(Way::new(
                    layer,
                    tags.clone(),
                    way_nodes,
                    label_position.clone(),
                ));
            }
        }

        Ok(ways)
    }

    /// Label offsets are relative to the tile origin, latitude first.
    fn read_optional_label_position(
        query: &BlockQuery<'_>,
        read_buffer: &mut ReadBuffer,
    ) -> Result<LatLong, MapFileError> {
        let latitude = query.tile_latitude
            + LatLongUtils::microdegrees_to_degrees(read_buffer.read_signed_int()?);
        let longitude = query.tile_longitude
            + LatLongUtils::microdegrees_to_degrees(read_buffer.read_signed_int()?);
        Ok(LatLong::new(latitude, longitude))
    }

    fn process_way_data_block(
        tile_latitude: f64,
        tile_longitude: f64,
        double_delta_encoding: bool,
        read_buffer: &mut ReadBuffer,
    ) -> Result<Vec<Vec<LatLong>>, MapFileError> {
        let number_of_way_coordinate_blocks = read_buffer.read_unsigned_int()?;
        if number_of_way_coordinate_blocks < 1
            || number_of_way_coordinate_blocks > MAXIMUM_WAY_COORDINATE_BLOCKS
        {
            return Err(MapFileError::format(format!(
                "invalid number of way coordinate blocks: {}",
                number_of_way_coordinate_blocks
            )));
        }

        let mut way_coordinates = Vec::with_capacity(number_of_way_coordinate_blocks as usize);

        for _ in 0..number_of_way_coordinate_blocks {
            let number_of_way_nodes = read_buffer.read_unsigned_int()?;
            if number_of_way_nodes < 2 || number_of_way_nodes > MAXIMUM_WAY_NODES_SEQUENCE_LENGTH {
                return Err(MapFileError::format(format!(
                    "invalid number of way nodes: {}",
                    number_of_way_nodes
                )));
            }
            // two varints per node, at least one byte each
            if number_of_way_nodes as usize * 2 > read_buffer.remaining() {
                return Err(MapFileError::format(format!(
                    "way nodes exceed block: {}",
                    number_of_way_nodes
                )));
            }

            let way_segment = if double_delta_encoding {
                decode_way_nodes_double_delta(
                    number_of_way_nodes as usize,
                    tile_latitude,
                    tile_longitude,
                    read_buffer,
                )?
            } else {
                decode_way_nodes_single_delta(
                    number_of_way_nodes as usize,
                    tile_latitude,
                    tile_longitude,
                    read_buffer,
                )?
            };

            way_coordinates.push(way_segment);
        }

        Ok(way_coordinates)
    }
}

/// Each node is the previous node plus a signed offset.
fn decode_way_nodes_single_delta(
    number_of_way_nodes: usize,
    tile_latitude: f64,
    tile_longitude: f64,
    read_buffer: &mut ReadBuffer,
) -> Result<Vec<LatLong>, MapFileError> {
    let mut way_segment = Vec::with_capacity(number_of_way_nodes);

    let mut way_node_latitude =
        tile_latitude + LatLongUtils::microdegrees_to_degrees(read_buffer.read_signed_int()?);
    let mut way_node_longitude = snap_longitude(
        tile_longitude + LatLongUtils::microdegrees_to_degrees(read_buffer.read_signed_int()?),
    );
    way_segment.push(LatLong::new(way_node_latitude, way_node_longitude));

    for _ in 1..number_of_way_nodes {
        way_node_latitude += LatLongUtils::microdegrees_to_degrees(read_buffer.read_signed_int()?);
        way_node_longitude += LatLongUtils::microdegrees_to_degrees(read_buffer.read_signed_int()?);
        way_node_longitude = snap_longitude(way_node_longitude);

        way_segment.push(LatLong::new(way_node_latitude, way_node_longitude));
    }

    Ok(way_segment)
}

/// Each offset is added to the previous offset before it is applied.
fn decode_way_nodes_double_delta(
    number_of_way_nodes: usize,
    tile_latitude: f64,
    tile_longitude: f64,
    read_buffer: &mut ReadBuffer,
) -> Result<Vec<LatLong>, MapFileError> {
    let mut way_segment = Vec::with_capacity(number_of_way_nodes);

    let mut way_node_latitude =
        tile_latitude + LatLongUtils::microdegrees_to_degrees(read_buffer.read_signed_int()?);
    let mut way_node_longitude = snap_longitude(
        tile_longitude + LatLongUtils::microdegrees_to_degrees(read_buffer.read_signed_int()?),
    );
    way_segment.push(LatLong::new(way_node_latitude, way_node_longitude));

    let mut previous_single_delta_latitude = 0.0;
    let mut previous_single_delta_longitude = 0.0;

    for _ in 1..number_of_way_nodes {
        let double_delta_latitude =
            LatLongUtils::microdegrees_to_degrees(read_buffer.read_signed_int()?);
        let double_delta_longitude =
            LatLongUtils::microdegrees_to_degrees(read_buffer.read_signed_int()?);

        let single_delta_latitude = double_delta_latitude + previous_single_delta_latitude;
        let single_delta_longitude = double_delta_longitude + previous_single_delta_longitude;

        way_node_latitude += single_delta_latitude;
        way_node_longitude += single_delta_longitude;
        way_node_longitude = snap_longitude(way_node_longitude);

        way_segment.push(LatLong::new(way_node_latitude, way_node_longitude));

        previous_single_delta_latitude = single_delta_latitude;
        previous_single_delta_longitude = single_delta_longitude;
    }

    Ok(way_segment)
}

fn snap_longitude(longitude: f64) -> f64 {
    if longitude < LatLongUtils::LONGITUDE_MIN
        && LatLongUtils::LONGITUDE_MIN - longitude < ANTIMERIDIAN_TOLERANCE
    {
        LatLongUtils::LONGITUDE_MIN
    } else if longitude > LatLongUtils::LONGITUDE_MAX
        && longitude - LatLongUtils::LONGITUDE_MAX < ANTIMERIDIAN_TOLERANCE
    {
        LatLongUtils::LONGITUDE_MAX
    } else {
        longitude
    }
}

/// Picks one language from a multilingual name.
///
/// The layout is `default\rlang\bname\rlang\bname...`. Returns the entry
/// whose language matches `language` (ignoring case), else one whose
/// language is the base of a regional `language` such as `de` for `de-AT`,
/// else the default.
pub fn extract_localized(text: &str, language: Option<&str>) -> String {
    let mut lang_names = text.split(LANGUAGE_SEPARATOR);
    let default_name = lang_names.next().unwrap_or_default();

    let language = match language.map(str::trim) {
        Some(language) if !language.is_empty() => language,
        _ => return default_name.to_string(),
    };
    let language_lower = language.to_lowercase();
    let regional = language.contains('-') || language.contains('_');

    let mut fallback = None;
    for lang_name in lang_names {
        let Some((lang, name)) = lang_name.split_once(LANGUAGE_NAME_SEPARATOR) else {
            continue;
        };
        if lang.eq_ignore_ascii_case(language) {
            return name.to_string();
        }
        if fallback.is_none()
            && regional
            && !lang.contains('-')
            && !lang.contains('_')
            && language_lower.starts_with(&lang.to_lowercase())
        {
            fallback = Some(name);
        }
    }

    fallback.unwrap_or(default_name).to_string()
}
