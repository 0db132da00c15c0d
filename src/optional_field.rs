use crate::{
    header::MapFileHeader,
    reader::ReadBuffer,
    types::{LatLong, LatLongUtils},
    MapFileError,
};

const FLAG_DEBUG_FILE: u8 = 0x80;
const FLAG_START_POSITION: u8 = 0x40;
const FLAG_START_ZOOM_LEVEL: u8 = 0x20;
const FLAG_LANGUAGES_PREFERENCE: u8 = 0x10;
const FLAG_COMMENT: u8 = 0x08;
const FLAG_CREATED_BY: u8 = 0x04;

/// Header fields announced by the flags byte.
#[derive(Debug, Default)]
pub struct OptionalFields {
    pub comment: Option<String>,
    pub created_by: Option<String>,
    pub is_debug_file: bool,
    pub has_start_position: bool,
    pub has_start_zoom_level: bool,
    pub has_languages_preference: bool,
    pub has_comment: bool,
    pub has_created_by: bool,
    pub languages_preference: Option<String>,
    pub start_position: Option<LatLong>,
    pub start_zoom_level: Option<u8>,
}

impl OptionalFields {
    pub fn new(flags: u8) -> Self {
        Self {
            is_debug_file: (flags & FLAG_DEBUG_FILE) != 0,
            has_start_position: (flags & FLAG_START_POSITION) != 0,
            has_start_zoom_level: (flags & FLAG_START_ZOOM_LEVEL) != 0,
            has_languages_preference: (flags & FLAG_LANGUAGES_PREFERENCE) != 0,
            has_comment: (flags & FLAG_COMMENT) != 0,
            has_created_by: (flags & FLAG_CREATED_BY) != 0,
            ..Self::default()
        }
    }

    /// Reads the fields whose flag is set; absent fields occupy no bytes.
    pub fn read_optional_fields(&mut self, read_buffer: &mut ReadBuffer) -> Result<(), MapFileError> {
        if self.has_start_position {
            let latitude = LatLongUtils::microdegrees_to_degrees(read_buffer.read_int()?);
            let longitude = LatLongUtils::microdegrees_to_degrees(read_buffer.read_int()?);
            self.start_position = Some(LatLong::new(latitude, longitude));
        }

        if self.has_start_zoom_level {
            let zoom_level = read_buffer.read_byte()?;
            if zoom_level > MapFileHeader::ZOOM_LEVEL_MAX {
                return Err(MapFileError::header(format!(
                    "invalid map start zoom level: {}",
                    zoom_level
                )));
            }
            self.start_zoom_level = Some(zoom_level);
        }

        if self.has_languages_preference {
            self.languages_preference = Some(read_buffer.read_utf8_encoded_string()?);
        }

        if self.has_comment {
            self.comment = Some(read_buffer.read_utf8_encoded_string()?);
        }

        if self.has_created_by {
            self.created_by = Some(read_buffer.read_utf8_encoded_string()?);
        }

        Ok(())
    }
}
