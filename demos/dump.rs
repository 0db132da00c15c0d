use std::{env, time::Instant};

use map_reader::{MapFile, MapFileConfig, Selector, Tile};

const MAX_PRINTED: usize = 5;

fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 5 {
        println!("Usage: {} <map file> <lat> <lon> <zoom> [language]", args[0]);
        return;
    }
    let (Ok(lat), Ok(lon), Ok(zoom)) = (
        args[2].parse::<f64>(),
        args[3].parse::<f64>(),
        args[4].parse::<u8>(),
    ) else {
        println!("❌ Invalid coordinates or zoom level");
        return;
    };

    let mut config = MapFileConfig::default();
    if let Some(language) = args.get(5) {
        config = config.with_preferred_language(language.as_str());
    }

    println!("Opening map file: {}", args[1]);
    let start = Instant::now();
    let map_file = match MapFile::open_with_config(&args[1], config) {
        Ok(file) => {
            println!("✅ Map file opened successfully in {:?}", start.elapsed());
            file
        }
        Err(e) => {
            println!("❌ Error opening map file: {}", e);
            return;
        }
    };

    let info = map_file.get_map_file_info();
    println!("\n📋 MAP FILE METADATA:");
    println!("---------------------");
    println!("🌍 Bounds: {:?}", info.bounding_box);
    println!(
        "🔍 Zoom levels: {} to {}",
        info.zoom_level_min, info.zoom_level_max
    );
    println!("🗣️ Available languages: {:?}", map_file.get_map_languages());
    println!("📅 Map date: {}", info.map_date);
    println!("📍 Start position: {:?}", map_file.start_position());

    let tile = Tile::from_lat_long(lat, lon, zoom);
    println!(
        "\n🧩 Tile: x={}, y={}, zoom={}",
        tile.tile_x, tile.tile_y, tile.zoom_level
    );
    if !map_file.supports_tile(&tile) {
        println!("❌ Tile is outside of the map file");
        return;
    }

    let start = Instant::now();
    let result = match map_file.read_map_data(&tile, Selector::All) {
        Ok(result) => result,
        Err(e) => {
            println!("❌ Error reading map data: {}", e);
            return;
        }
    };
    println!("✅ Read map data in {:?}", start.elapsed());
    println!("🌊 Water: {}", result.is_water);

    println!("\n🔍 POIs: {}", result.pois.len());
    for (i, poi) in result.pois.iter().enumerate().take(MAX_PRINTED) {
        println!(
            "  📍 POI {}: layer={}, position=({}, {})",
            i, poi.layer, poi.position.latitude, poi.position.longitude
        );
        for tag in &poi.tags {
            println!("      🏷️ {} = {}", tag.key, tag.value);
        }
    }

    println!("\n🛣️ Ways: {}", result.ways.len());
    for (i, way) in result.ways.iter().enumerate().take(MAX_PRINTED) {
        let nodes: usize = way.way_nodes.iter().map(Vec::len).sum();
        println!(
            "  〰️ Way {}: layer={}, rings={}, nodes={}",
            i,
            way.layer,
            way.way_nodes.len(),
            nodes
        );
        for tag in &way.tags {
            println!("      🏷️ {} = {}", tag.key, tag.value);
        }
    }
}
