use byteorder::{BigEndian, ByteOrder};

/// Fixed-width big-endian conversions on raw byte slices.
///
/// Callers are responsible for making sure the slice holds enough bytes after
/// `offset`; every function panics otherwise.
pub struct Deserializer;

impl Deserializer {
    /// Converts five bytes of a byte array to an unsigned long.
    /// The byte order is big-endian.
    pub fn get_five_bytes_long(buffer: &[u8], offset: usize) -> u64 {
        BigEndian::read_uint(&buffer[offset..offset + 5], 5)
    }

    /// Converts four bytes of a byte array to a signed int.
    /// The byte order is big-endian.
    pub fn get_int(buffer: &[u8], offset: usize) -> i32 {
        BigEndian::read_i32(&buffer[offset..offset + 4])
    }

    /// Converts eight bytes of a byte array to a signed long.
    /// The byte order is big-endian.
    pub fn get_long(buffer: &[u8], offset: usize) -> i64 {
        BigEndian::read_i64(&buffer[offset..offset + 8])
    }

    /// Converts two bytes of a byte array to a signed short.
    /// The byte order is big-endian.
    pub fn get_short(buffer: &[u8], offset: usize) -> i16 {
        BigEndian::read_i16(&buffer[offset..offset + 2])
    }

    pub fn get_float(buffer: &[u8], offset: usize) -> f32 {
        BigEndian::read_f32(&buffer[offset..offset + 4])
    }
}
