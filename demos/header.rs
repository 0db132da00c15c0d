use std::env;

use map_reader::MapFile;

fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let args: Vec<String> = env::args().collect();
    let Some(path) = args.get(1) else {
        println!("Usage: {} <map file>", args[0]);
        return;
    };

    let map_file = match MapFile::open(path) {
        Ok(file) => file,
        Err(e) => {
            println!("Error opening map file: {}", e);
            return;
        }
    };

    let info = map_file.get_map_file_info();
    println!("Map File Info:");
    println!("  Version: {}", info.file_version);
    println!("  Bounds: {:?}", info.bounding_box);
    println!("  File size: {}", info.file_size);
    println!("  Map date: {}", info.map_date);
    println!("  Number of sub-files: {}", info.number_of_sub_files);
    println!("  Zoom levels: {} to {}", info.zoom_level_min, info.zoom_level_max);
    println!("  Projection: {}", info.projection_name);
    println!("  Tile size: {}", info.tile_pixel_size);

    // Optional fields
    if let Some(pos) = &info.start_position {
        println!("  Start position: {:?}", pos);
    }
    if let Some(zoom) = info.start_zoom_level {
        println!("  Start zoom: {}", zoom);
    }
    if let Some(languages) = map_file.get_map_languages() {
        println!("  Languages: {}", languages.join(", "));
    }
    if let Some(comment) = &info.comment {
        println!("  Comment: {}", comment);
    }
    if let Some(created_by) = &info.created_by {
        println!("  Created by: {}", created_by);
    }

    println!("  Debug file: {}", info.debug_file);
    println!("  POI tags: {}", info.poi_tags.len());
    println!("  Way tags: {}", info.way_tags.len());

    println!("Sub-files:");
    for param in map_file.header().sub_file_parameters() {
        println!(
            "  Zoom {} to {} (base {}): {}x{} blocks at {}, {} bytes",
            param.zoom_level_min,
            param.zoom_level_max,
            param.base_zoom_level,
            param.blocks_width,
            param.blocks_height,
            param.start_address,
            param.sub_file_size
        );
    }
}
