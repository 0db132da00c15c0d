mod block_decoder;
mod config;
mod deserializer;
mod errors;
mod header;
mod index_cache;
mod map_data;
mod map_data_store;
pub mod map_file;
mod mercator;
mod multi_map_data_store;
mod optional_field;
mod query_calculations;
mod query_parameters;
mod reader;
mod required_field;
mod tile;
mod types;

pub use block_decoder::extract_localized;
pub use config::MapFileConfig;
pub use deserializer::Deserializer;
pub use errors::MapFileError;
pub use header::{MapFileHeader, MapFileInfo, SubFileParameter};
pub use map_data::{MapReadResult, PoiWayBundle, PointOfInterest, Selector, Way};
pub use map_data_store::MapDataStore;
pub use map_file::MapFile;
pub use mercator::MercatorProjection;
pub use multi_map_data_store::{DataPolicy, MultiMapDataStore};
pub use query_calculations::QueryCalculations;
pub use query_parameters::QueryParameters;
pub use tile::Tile;
pub use types::{BoundingBox, LatLong, LatLongUtils, Tag};
