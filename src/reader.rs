use std::io::{Read, Seek, SeekFrom};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::warn;

use crate::deserializer::Deserializer;
use crate::{types::Tag, MapFileError};

const TAG_VALUE_PLACEHOLDER_PREFIX: char = '%';
const TAG_KEY_COLOUR_SUFFIX: &str = ":colour";

/// Shared handle to the underlying map file.
///
/// The file position is shared state, so every read is a single seek plus
/// read performed while holding the lock. After [`FileChannel::close`] every
/// read fails with [`MapFileError::Closed`].
pub struct FileChannel<R> {
    input: Mutex<Option<R>>,
}

impl<R: Read + Seek> FileChannel<R> {
    pub fn new(input: R) -> Self {
        Self {
            input: Mutex::new(Some(input)),
        }
    }

    pub fn read_at(&self, position: u64, buffer: &mut [u8]) -> Result<(), MapFileError> {
        let mut guard = self.lock();
        let input = guard.as_mut().ok_or(MapFileError::Closed)?;
        input.seek(SeekFrom::Start(position))?;
        input.read_exact(buffer)?;
        Ok(())
    }

    pub fn close(&self) {
        // dropping the reader closes the file
        self.lock().take();
    }

    pub fn is_closed(&self) -> bool {
        self.lock().is_none()
    }

    fn lock(&self) -> MutexGuard<'_, Option<R>> {
        self.input.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Byte storage plus a read cursor.
///
/// One buffer belongs to one query at a time. It grows on demand up to
/// `maximum_buffer_size` and never shrinks its allocation.
#[derive(Debug)]
pub struct ReadBuffer {
    buffer_data: Vec<u8>,
    buffer_position: usize,
    maximum_buffer_size: usize,
    tag_ids: Vec<usize>,
}

impl ReadBuffer {
    pub fn new(maximum_buffer_size: usize) -> Self {
        Self {
            buffer_data: Vec::new(),
            buffer_position: 0,
            maximum_buffer_size,
            tag_ids: Vec::new(),
        }
    }

    /// Wraps bytes that are already in memory.
    pub fn from_bytes(data: Vec<u8>) -> Self {
        Self {
            maximum_buffer_size: data.len(),
            buffer_data: data,
            buffer_position: 0,
            tag_ids: Vec::new(),
        }
    }

    /// Replaces the buffer content with `length` bytes read from `position`.
    ///
    /// Returns `Ok(false)` without touching the file if `length` exceeds the
    /// maximum buffer size.
    pub fn read_from_channel<R: Read + Seek>(
        &mut self,
        channel: &FileChannel<R>,
        position: u64,
        length: usize,
    ) -> Result<bool, MapFileError> {
        if length > self.maximum_buffer_size {
            warn!("invalid read length: {}", length);
            return Ok(false);
        }

        self.buffer_data.resize(length, 0);
        self.buffer_position = 0;
        channel.read_at(position, &mut self.buffer_data)?;
        Ok(true)
    }

    pub fn read_byte(&mut self) -> Result<u8, MapFileError> {
        self.next_byte("byte")
    }

    pub fn read_short(&mut self) -> Result<i16, MapFileError> {
        let offset = self.advance(2, "short")?;
        Ok(Deserializer::get_short(&self.buffer_data, offset))
    }

    pub fn read_int(&mut self) -> Result<i32, MapFileError> {
        let offset = self.advance(4, "int")?;
        Ok(Deserializer::get_int(&self.buffer_data, offset))
    }

    pub fn read_long(&mut self) -> Result<i64, MapFileError> {
        let offset = self.advance(8, "long")?;
        Ok(Deserializer::get_long(&self.buffer_data, offset))
    }

    pub fn read_float(&mut self) -> Result<f32, MapFileError> {
        let offset = self.advance(4, "float")?;
        Ok(Deserializer::get_float(&self.buffer_data, offset))
    }

    /// Reads a variable-byte encoded unsigned integer (VBE-U).
    ///
    /// Every byte carries seven data bits, least significant group first; the
    /// high bit marks a following byte. The length is not capped: groups beyond
    /// 32 bits wrap, but the cursor never leaves the buffer.
    pub fn read_unsigned_int(&mut self) -> Result<u32, MapFileError> {
        let mut variable_byte_decode: u32 = 0;
        let mut variable_byte_shift: u32 = 0;

        loop {
            let byte = self.next_byte("unsigned int")?;
            if byte & 0x80 == 0 {
                return Ok(variable_byte_decode | (byte as u32).wrapping_shl(variable_byte_shift));
            }
            variable_byte_decode |= ((byte & 0x7f) as u32).wrapping_shl(variable_byte_shift);
            variable_byte_shift += 7;
        }
    }

    /// Reads a variable-byte encoded signed integer (VBE-S).
    ///
    /// Same grouping as VBE-U, but the last byte holds only six data bits;
    /// its 0x40 bit is the sign of the whole value.
    pub fn read_signed_int(&mut self) -> Result<i32, MapFileError> {
        let mut variable_byte_decode: i32 = 0;
        let mut variable_byte_shift: u32 = 0;

        loop {
            let byte = self.next_byte("signed int")?;
            if byte & 0x80 == 0 {
                let magnitude =
                    variable_byte_decode | ((byte & 0x3f) as i32).wrapping_shl(variable_byte_shift);
                return Ok(if byte & 0x40 != 0 {
                    magnitude.wrapping_neg()
                } else {
                    magnitude
                });
            }
            variable_byte_decode |= ((byte & 0x7f) as i32).wrapping_shl(variable_byte_shift);
            variable_byte_shift += 7;
        }
    }

    /// Reads `number_of_tags` tag ids and resolves them against `tags_array`.
    ///
    /// Tag values of the form `%x` are placeholders whose real value follows
    /// the id list, one payload per placeholder, in tag order. Unknown
    /// placeholder types carry no payload and keep their literal value.
    pub fn read_tags(
        &mut self,
        tags_array: &[Tag],
        number_of_tags: u8,
    ) -> Result<Vec<Tag>, MapFileError> {
        self.tag_ids.clear();
        let max_tag = tags_array.len();

        for _ in 0..number_of_tags {
            let tag_id = self.read_unsigned_int()? as usize;
            if tag_id >= max_tag {
                return Err(MapFileError::format(format!("invalid tag ID: {}", tag_id)));
            }
            self.tag_ids.push(tag_id);
        }

        let mut result = Vec::with_capacity(self.tag_ids.len());
        for index in 0..self.tag_ids.len() {
            let tag = &tags_array[self.tag_ids[index]];
            match Self::placeholder_type(&tag.value) {
                Some(value_type) => match self.read_tag_value(&tag.key, value_type)? {
                    Some(value) => result.push(Tag::new(tag.key.clone(), value)),
                    None => {
                        warn!("unknown tag value placeholder: {}", tag.value);
                        result.push(tag.clone());
                    }
                },
                None => result.push(tag.clone()),
            }
        }

        Ok(result)
    }

    pub fn read_utf8_encoded_string(&mut self) -> Result<String, MapFileError> {
        let length = self.read_unsigned_int()? as usize;
        self.read_utf8_encoded_string_with_length(length)
    }

    /// Reads `string_length` bytes as UTF-8. A zero length is an empty string.
    pub fn read_utf8_encoded_string_with_length(
        &mut self,
        string_length: usize,
    ) -> Result<String, MapFileError> {
        if string_length > self.remaining() {
            return Err(MapFileError::format(format!(
                "invalid string length: {}",
                string_length
            )));
        }

        let start = self.buffer_position;
        self.buffer_position += string_length;
        String::from_utf8(self.buffer_data[start..self.buffer_position].to_vec())
            .map_err(|e| MapFileError::format(format!("invalid UTF-8 string: {}", e)))
    }

    pub fn get_buffer_position(&self) -> usize {
        self.buffer_position
    }

    pub fn get_buffer_size(&self) -> usize {
        self.buffer_data.len()
    }

    pub fn remaining(&self) -> usize {
        self.buffer_data.len() - self.buffer_position
    }

    pub fn set_buffer_position(&mut self, position: usize) -> Result<(), MapFileError> {
        if position > self.buffer_data.len() {
            return Err(MapFileError::format(format!(
                "invalid buffer position: {}",
                position
            )));
        }
        self.buffer_position = position;
        Ok(())
    }

    pub fn skip_bytes(&mut self, bytes: usize) -> Result<(), MapFileError> {
        self.advance(bytes, "skipped bytes").map(|_| ())
    }

    /// Moves the cursor `length` bytes forward and returns the old position.
    fn advance(&mut self, length: usize, what: &str) -> Result<usize, MapFileError> {
        if length > self.remaining() {
            return Err(self.overflow(what));
        }
        let offset = self.buffer_position;
        self.buffer_position += length;
        Ok(offset)
    }

    fn next_byte(&mut self, what: &str) -> Result<u8, MapFileError> {
        let byte = *self
            .buffer_data
            .get(self.buffer_position)
            .ok_or_else(|| self.overflow(what))?;
        self.buffer_position += 1;
        Ok(byte)
    }

    fn overflow(&self, what: &str) -> MapFileError {
        MapFileError::format(format!(
            "buffer overflow when reading {} at position {} of {}",
            what,
            self.buffer_position,
            self.buffer_data.len()
        ))
    }

    fn placeholder_type(value: &str) -> Option<char> {
        let mut chars = value.chars();
        match (chars.next(), chars.next(), chars.next()) {
            (Some(TAG_VALUE_PLACEHOLDER_PREFIX), Some(value_type), None) => Some(value_type),
            _ => None,
        }
    }

    fn read_tag_value(
        &mut self,
        key: &str,
        value_type: char,
    ) -> Result<Option<String>, MapFileError> {
        let value = match value_type {
            'b' => (self.read_byte()? as i8).to_string(),
            'h' => self.read_short()?.to_string(),
            'i' if key.contains(TAG_KEY_COLOUR_SUFFIX) => format!("#{:x}", self.read_int()?),
            'i' => self.read_int()?.to_string(),
            'f' => format_float(self.read_float()?),
            's' => self.read_utf8_encoded_string()?,
            _ => return Ok(None),
        };
        Ok(Some(value))
    }
}

/// Shortest decimal form, always with a fractional part (`1.0`, `2.5`).
fn format_float(value: f32) -> String {
    if value.is_nan() {
        return "NaN".to_string();
    }
    if value == f32::INFINITY {
        return "Infinity".to_string();
    }
    if value == f32::NEG_INFINITY {
        return "-Infinity".to_string();
    }
    let text = value.to_string();
    if text.contains('.') {
        text
    } else {
        format!("{}.0", text)
    }
}
