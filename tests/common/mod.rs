//! Writes small map files for the integration tests.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, HashSet};
use std::io::Write;

use map_reader::{MercatorProjection, Tile};
use tempfile::NamedTempFile;

pub const MAP_DATE: i64 = 1_700_000_000_000;
const MAGIC: &str = "mapsforge binary OSM";
const WATER_BIT: u64 = 0x80_0000_0000;

pub fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Big-endian and variable-byte encoder.
#[derive(Default)]
pub struct Encoder {
    bytes: Vec<u8>,
}

impl Encoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn byte(&mut self, value: u8) -> &mut Self {
        self.bytes.push(value);
        self
    }

    pub fn short(&mut self, value: i16) -> &mut Self {
        self.bytes.extend_from_slice(&value.to_be_bytes());
        self
    }

    pub fn int(&mut self, value: i32) -> &mut Self {
        self.bytes.extend_from_slice(&value.to_be_bytes());
        self
    }

    pub fn long(&mut self, value: i64) -> &mut Self {
        self.bytes.extend_from_slice(&value.to_be_bytes());
        self
    }

    pub fn float(&mut self, value: f32) -> &mut Self {
        self.bytes.extend_from_slice(&value.to_be_bytes());
        self
    }

    pub fn unsigned(&mut self, mut value: u32) -> &mut Self {
        while value > 0x7f {
            self.bytes.push((value & 0x7f) as u8 | 0x80);
            value >>= 7;
        }
        self.bytes.push(value as u8);
        self
    }

    pub fn signed(&mut self, value: i32) -> &mut Self {
        let mut magnitude = value.unsigned_abs();
        while magnitude > 0x3f {
            self.bytes.push((magnitude & 0x7f) as u8 | 0x80);
            magnitude >>= 7;
        }
        self.bytes
            .push(magnitude as u8 | if value < 0 { 0x40 } else { 0 });
        self
    }

    pub fn string(&mut self, value: &str) -> &mut Self {
        self.unsigned(value.len() as u32);
        self.bytes.extend_from_slice(value.as_bytes());
        self
    }

    /// Fixed-width debug signature padded with spaces.
    pub fn signature(&mut self, value: &str, length: usize) -> &mut Self {
        self.bytes
            .extend_from_slice(format!("{:<width$}", value, width = length).as_bytes());
        self
    }

    pub fn raw(&mut self, bytes: &[u8]) -> &mut Self {
        self.bytes.extend_from_slice(bytes);
        self
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

fn microdegrees(degrees: f64) -> i32 {
    (degrees * 1_000_000.0).round() as i32
}

#[derive(Clone, Default)]
pub struct PoiRecord {
    pub latitude: f64,
    pub longitude: f64,
    pub layer: u8,
    pub tag_ids: Vec<u32>,
    /// Placeholder payloads, written after the tag ids.
    pub tag_payload: Vec<u8>,
    pub name: Option<String>,
    pub house_number: Option<String>,
    pub elevation: Option<i32>,
}

impl PoiRecord {
    pub fn new(latitude: f64, longitude: f64, tag_ids: &[u32]) -> Self {
        Self {
            latitude,
            longitude,
            tag_ids: tag_ids.to_vec(),
            ..Self::default()
        }
    }
}

#[derive(Clone)]
pub struct WayRecord {
    pub tile_bitmask: u16,
    pub layer: u8,
    pub tag_ids: Vec<u32>,
    pub tag_payload: Vec<u8>,
    pub name: Option<String>,
    pub house_number: Option<String>,
    pub reference: Option<String>,
    pub label_position: Option<(f64, f64)>,
    /// Way data blocks, each a list of rings of (latitude, longitude).
    pub data_blocks: Vec<Vec<Vec<(f64, f64)>>>,
    pub double_delta: bool,
}

impl WayRecord {
    pub fn new(nodes: &[(f64, f64)], tag_ids: &[u32]) -> Self {
        Self {
            tile_bitmask: 0xffff,
            layer: 0,
            tag_ids: tag_ids.to_vec(),
            tag_payload: Vec::new(),
            name: None,
            house_number: None,
            reference: None,
            label_position: None,
            data_blocks: vec![vec![nodes.to_vec()]],
            double_delta: false,
        }
    }

    fn first_node(&self) -> (f64, f64) {
        self.data_blocks[0][0][0]
    }
}

#[derive(Clone, Default)]
pub struct BlockRecord {
    pub pois: Vec<PoiRecord>,
    pub ways: Vec<WayRecord>,
    /// Written verbatim instead of the records.
    pub raw: Option<Vec<u8>>,
}

pub struct SubFileRecord {
    pub base_zoom_level: u8,
    pub zoom_level_min: u8,
    pub zoom_level_max: u8,
    blocks: BTreeMap<(i64, i64), BlockRecord>,
    water: HashSet<(i64, i64)>,
    index_overrides: HashMap<i64, u64>,
}

impl SubFileRecord {
    fn new(base_zoom_level: u8, zoom_level_min: u8, zoom_level_max: u8) -> Self {
        Self {
            base_zoom_level,
            zoom_level_min,
            zoom_level_max,
            blocks: BTreeMap::new(),
            water: HashSet::new(),
            index_overrides: HashMap::new(),
        }
    }
}

/// Builds a complete map file in memory.
pub struct MapFileBuilder {
    pub min_latitude: f64,
    pub min_longitude: f64,
    pub max_latitude: f64,
    pub max_longitude: f64,
    pub file_version: i32,
    pub poi_tags: Vec<String>,
    pub way_tags: Vec<String>,
    pub debug_file: bool,
    pub start_position: Option<(f64, f64)>,
    pub start_zoom_level: Option<u8>,
    pub languages_preference: Option<String>,
    pub comment: Option<String>,
    pub created_by: Option<String>,
    pub sub_files: Vec<SubFileRecord>,
}

impl MapFileBuilder {
    /// A file over the given box with one sub-file.
    pub fn new(
        bounding_box: (f64, f64, f64, f64),
        base_zoom_level: u8,
        zoom_level_min: u8,
        zoom_level_max: u8,
    ) -> Self {
        Self {
            min_latitude: bounding_box.0,
            min_longitude: bounding_box.1,
            max_latitude: bounding_box.2,
            max_longitude: bounding_box.3,
            file_version: 5,
            poi_tags: Vec::new(),
            way_tags: Vec::new(),
            debug_file: false,
            start_position: None,
            start_zoom_level: None,
            languages_preference: None,
            comment: None,
            created_by: None,
            sub_files: vec![SubFileRecord::new(
                base_zoom_level,
                zoom_level_min,
                zoom_level_max,
            )],
        }
    }

    pub fn add_sub_file(&mut self, base_zoom_level: u8, zoom_level_min: u8, zoom_level_max: u8) {
        self.sub_files.push(SubFileRecord::new(
            base_zoom_level,
            zoom_level_min,
            zoom_level_max,
        ));
    }

    fn base_tile(&self, sub_file: usize, latitude: f64, longitude: f64) -> (i64, i64) {
        let zoom_level = self.sub_files[sub_file].base_zoom_level;
        (
            MercatorProjection::longitude_to_tile_x(longitude, zoom_level),
            MercatorProjection::latitude_to_tile_y(latitude, zoom_level),
        )
    }

    /// Adds a POI to the block of the base tile containing it.
    pub fn add_poi(&mut self, sub_file: usize, poi: PoiRecord) {
        let tile = self.base_tile(sub_file, poi.latitude, poi.longitude);
        self.sub_files[sub_file]
            .blocks
            .entry(tile)
            .or_default()
            .pois
            .push(poi);
    }

    /// Adds a way to the block of the base tile containing its first node.
    pub fn add_way(&mut self, sub_file: usize, way: WayRecord) {
        let (latitude, longitude) = way.first_node();
        let tile = self.base_tile(sub_file, latitude, longitude);
        self.sub_files[sub_file]
            .blocks
            .entry(tile)
            .or_default()
            .ways
            .push(way);
    }

    /// Replaces the block of the base tile containing the point with `bytes`.
    pub fn set_raw_block(&mut self, sub_file: usize, latitude: f64, longitude: f64, bytes: Vec<u8>) {
        let tile = self.base_tile(sub_file, latitude, longitude);
        self.sub_files[sub_file]
            .blocks
            .entry(tile)
            .or_default()
            .raw = Some(bytes);
    }

    pub fn set_water(&mut self, sub_file: usize, latitude: f64, longitude: f64) {
        let tile = self.base_tile(sub_file, latitude, longitude);
        self.sub_files[sub_file].water.insert(tile);
    }

    /// Replaces the raw index entry of a block.
    pub fn override_index_entry(&mut self, sub_file: usize, block_number: i64, entry: u64) {
        self.sub_files[sub_file]
            .index_overrides
            .insert(block_number, entry);
    }

    fn grid(&self, zoom_level: u8) -> (i64, i64, i64, i64) {
        let left = MercatorProjection::longitude_to_tile_x(self.min_longitude, zoom_level);
        let right = MercatorProjection::longitude_to_tile_x(self.max_longitude, zoom_level);
        let top = MercatorProjection::latitude_to_tile_y(self.max_latitude, zoom_level);
        let bottom = MercatorProjection::latitude_to_tile_y(self.min_latitude, zoom_level);
        (left, top, right - left + 1, bottom - top + 1)
    }

    /// Number of blocks of a sub-file, in row-major order.
    pub fn number_of_blocks(&self, sub_file: usize) -> i64 {
        let (_, _, width, height) = self.grid(self.sub_files[sub_file].base_zoom_level);
        width * height
    }

    pub fn block_number(&self, sub_file: usize, latitude: f64, longitude: f64) -> i64 {
        let (left, top, width, _) = self.grid(self.sub_files[sub_file].base_zoom_level);
        let (x, y) = self.base_tile(sub_file, latitude, longitude);
        (y - top) * width + (x - left)
    }

    fn encode_block(&self, sub_file: &SubFileRecord, tile: (i64, i64), block: &BlockRecord) -> Vec<u8> {
        let tile_latitude = MercatorProjection::tile_y_to_latitude(tile.1, sub_file.base_zoom_level);
        let tile_longitude =
            MercatorProjection::tile_x_to_longitude(tile.0, sub_file.base_zoom_level);
        let tile_latitude = microdegrees(tile_latitude);
        let tile_longitude = microdegrees(tile_longitude);

        if let Some(raw) = &block.raw {
            return raw.clone();
        }

        let mut encoder = Encoder::new();
        if self.debug_file {
            encoder.signature(&format!("###TileStart{},{}###", tile.0, tile.1), 32);
        }

        // all records are visible from the minimum zoom level on
        let rows = sub_file.zoom_level_max - sub_file.zoom_level_min + 1;
        for row in 0..rows {
            if row == 0 {
                encoder
                    .unsigned(block.pois.len() as u32)
                    .unsigned(block.ways.len() as u32);
            } else {
                encoder.unsigned(0).unsigned(0);
            }
        }

        let mut pois = Encoder::new();
        for (index, poi) in block.pois.iter().enumerate() {
            if self.debug_file {
                pois.signature(&format!("***POIStart{}***", index), 32);
            }
            pois.signed(microdegrees(poi.latitude) - tile_latitude)
                .signed(microdegrees(poi.longitude) - tile_longitude)
                .byte((poi.layer << 4) | poi.tag_ids.len() as u8);
            for tag_id in &poi.tag_ids {
                pois.unsigned(*tag_id);
            }
            pois.raw(&poi.tag_payload);

            let mut feature_byte = 0u8;
            if poi.name.is_some() {
                feature_byte |= 0x80;
            }
            if poi.house_number.is_some() {
                feature_byte |= 0x40;
            }
            if poi.elevation.is_some() {
                feature_byte |= 0x20;
            }
            pois.byte(feature_byte);
            if let Some(name) = &poi.name {
                pois.string(name);
            }
            if let Some(house_number) = &poi.house_number {
                pois.string(house_number);
            }
            if let Some(elevation) = poi.elevation {
                pois.signed(elevation);
            }
        }

        let mut ways = Encoder::new();
        for (index, way) in block.ways.iter().enumerate() {
            if self.debug_file {
                ways.signature(&format!("---WayStart{}---", index), 32);
            }
            let body = encode_way(way, tile_latitude, tile_longitude);
            ways.unsigned(body.len() as u32).raw(&body);
        }

        encoder.unsigned(pois.len() as u32);
        encoder.raw(&pois.into_bytes());
        encoder.raw(&ways.into_bytes());
        encoder.into_bytes()
    }

    fn encode_sub_file(&self, sub_file: &SubFileRecord) -> Vec<u8> {
        let (left, top, width, height) = self.grid(sub_file.base_zoom_level);
        let number_of_blocks = width * height;

        let signature_length = if self.debug_file { 16 } else { 0 };
        let index_length = number_of_blocks as usize * 5;

        let mut blocks = Vec::new();
        let mut entries = Vec::with_capacity(number_of_blocks as usize);
        for block_number in 0..number_of_blocks {
            let tile = (left + block_number % width, top + block_number / width);
            let pointer = (signature_length + index_length + blocks.len()) as u64;
            let mut entry = pointer;
            if sub_file.water.contains(&tile) {
                entry |= WATER_BIT;
            }
            if let Some(block) = sub_file.blocks.get(&tile) {
                blocks.extend(self.encode_block(sub_file, tile, block));
            }
            entries.push(
                sub_file
                    .index_overrides
                    .get(&block_number)
                    .copied()
                    .unwrap_or(entry),
            );
        }

        let mut encoder = Encoder::new();
        if self.debug_file {
            encoder.signature("+++IndexStart+++", 16);
        }
        for entry in entries {
            encoder.raw(&entry.to_be_bytes()[3..]);
        }
        encoder.raw(&blocks);
        encoder.into_bytes()
    }

    fn encode_header(&self, file_size: i64, sub_file_layout: &[(i64, i64)]) -> Vec<u8> {
        let mut header = Encoder::new();
        header
            .int(self.file_version)
            .long(file_size)
            .long(MAP_DATE)
            .int(microdegrees(self.min_latitude))
            .int(microdegrees(self.min_longitude))
            .int(microdegrees(self.max_latitude))
            .int(microdegrees(self.max_longitude))
            .short(256)
            .string("Mercator");

        let mut flags = 0u8;
        if self.debug_file {
            flags |= 0x80;
        }
        if self.start_position.is_some() {
            flags |= 0x40;
        }
        if self.start_zoom_level.is_some() {
            flags |= 0x20;
        }
        if self.languages_preference.is_some() {
            flags |= 0x10;
        }
        if self.comment.is_some() {
            flags |= 0x08;
        }
        if self.created_by.is_some() {
            flags |= 0x04;
        }
        header.byte(flags);
        if let Some((latitude, longitude)) = self.start_position {
            header.int(microdegrees(latitude)).int(microdegrees(longitude));
        }
        if let Some(zoom_level) = self.start_zoom_level {
            header.byte(zoom_level);
        }
        if let Some(languages) = &self.languages_preference {
            header.string(languages);
        }
        if let Some(comment) = &self.comment {
            header.string(comment);
        }
        if let Some(created_by) = &self.created_by {
            header.string(created_by);
        }

        header.short(self.poi_tags.len() as i16);
        for tag in &self.poi_tags {
            header.string(tag);
        }
        header.short(self.way_tags.len() as i16);
        for tag in &self.way_tags {
            header.string(tag);
        }

        header.byte(self.sub_files.len() as u8);
        for (sub_file, (start_address, size)) in self.sub_files.iter().zip(sub_file_layout) {
            header
                .byte(sub_file.base_zoom_level)
                .byte(sub_file.zoom_level_min)
                .byte(sub_file.zoom_level_max)
                .long(*start_address)
                .long(*size);
        }

        let header = header.into_bytes();
        let mut encoder = Encoder::new();
        encoder.raw(MAGIC.as_bytes()).int(header.len() as i32).raw(&header);
        encoder.into_bytes()
    }

    pub fn build(&self) -> Vec<u8> {
        let sub_files: Vec<Vec<u8>> = self
            .sub_files
            .iter()
            .map(|sub_file| self.encode_sub_file(sub_file))
            .collect();

        // field widths are fixed, so a dry run gives the header length
        let placeholder_layout = vec![(0i64, 0i64); sub_files.len()];
        let header_length = self.encode_header(0, &placeholder_layout).len() as i64;

        let mut layout = Vec::with_capacity(sub_files.len());
        let mut position = header_length;
        for sub_file in &sub_files {
            layout.push((position, sub_file.len() as i64));
            position += sub_file.len() as i64;
        }
        let file_size = position;

        let mut bytes = self.encode_header(file_size, &layout);
        for sub_file in sub_files {
            bytes.extend(sub_file);
        }
        bytes
    }

    pub fn write(&self) -> NamedTempFile {
        write_bytes(&self.build())
    }
}

fn encode_way(way: &WayRecord, tile_latitude: i32, tile_longitude: i32) -> Vec<u8> {
    let mut body = Encoder::new();
    body.raw(&way.tile_bitmask.to_be_bytes())
        .byte((way.layer << 4) | way.tag_ids.len() as u8);
    for tag_id in &way.tag_ids {
        body.unsigned(*tag_id);
    }
    body.raw(&way.tag_payload);

    let mut feature_byte = 0u8;
    if way.name.is_some() {
        feature_byte |= 0x80;
    }
    if way.house_number.is_some() {
        feature_byte |= 0x40;
    }
    if way.reference.is_some() {
        feature_byte |= 0x20;
    }
    if way.label_position.is_some() {
        feature_byte |= 0x10;
    }
    if way.data_blocks.len() != 1 {
        feature_byte |= 0x08;
    }
    if way.double_delta {
        feature_byte |= 0x04;
    }
    body.byte(feature_byte);

    if let Some(name) = &way.name {
        body.string(name);
    }
    if let Some(house_number) = &way.house_number {
        body.string(house_number);
    }
    if let Some(reference) = &way.reference {
        body.string(reference);
    }
    if let Some((latitude, longitude)) = way.label_position {
        body.signed(microdegrees(latitude) - tile_latitude)
            .signed(microdegrees(longitude) - tile_longitude);
    }
    if way.data_blocks.len() != 1 {
        body.unsigned(way.data_blocks.len() as u32);
    }

    for data_block in &way.data_blocks {
        body.unsigned(data_block.len() as u32);
        for ring in data_block {
            body.unsigned(ring.len() as u32);
            let offsets: Vec<(i32, i32)> = ring
                .iter()
                .map(|(latitude, longitude)| {
                    (
                        microdegrees(*latitude) - tile_latitude,
                        microdegrees(*longitude) - tile_longitude,
                    )
                })
                .collect();
            encode_nodes(&mut body, &offsets, way.double_delta);
        }
    }

    body.into_bytes()
}

fn encode_nodes(encoder: &mut Encoder, offsets: &[(i32, i32)], double_delta: bool) {
    encoder.signed(offsets[0].0).signed(offsets[0].1);
    let mut previous_delta = (0, 0);
    for pair in offsets.windows(2) {
        let delta = (pair[1].0 - pair[0].0, pair[1].1 - pair[0].1);
        if double_delta {
            encoder
                .signed(delta.0 - previous_delta.0)
                .signed(delta.1 - previous_delta.1);
        } else {
            encoder.signed(delta.0).signed(delta.1);
        }
        previous_delta = delta;
    }
}

pub fn write_bytes(bytes: &[u8]) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("create temp file");
    file.write_all(bytes).expect("write map file");
    file.flush().expect("flush map file");
    file
}

/// Tile at `zoom_level` containing the point.
pub fn tile_at(latitude: f64, longitude: f64, zoom_level: u8) -> Tile {
    Tile::from_lat_long(latitude, longitude, zoom_level)
}

pub fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-5
}
