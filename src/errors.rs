use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while opening or querying a map file.
#[derive(Debug, Error)]
pub enum MapFileError {
    /// The file could not be opened or its header is unusable.
    #[error("cannot open map file {path:?}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: Box<MapFileError>,
    },

    /// A header field failed validation.
    #[error("invalid file header: {0}")]
    Header(String),

    /// Block data is corrupt or inconsistent.
    #[error("invalid map data: {0}")]
    Format(String),

    /// An index lookup asked for a block the sub-file does not have.
    #[error("invalid block number: {block_number} (sub-file has {number_of_blocks} blocks)")]
    InvalidBlockNumber {
        block_number: i64,
        number_of_blocks: i64,
    },

    /// The caller passed arguments that do not describe a valid query.
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error("duplicate map data store")]
    DuplicateDataStore,

    /// The reader was closed before or during the call.
    #[error("map file has been closed")]
    Closed,

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl MapFileError {
    pub fn format(message: impl Into<String>) -> Self {
        MapFileError::Format(message.into())
    }

    pub fn header(message: impl Into<String>) -> Self {
        MapFileError::Header(message.into())
    }

    /// True for faults caused by corrupt file content rather than I/O or API misuse.
    pub fn is_format_error(&self) -> bool {
        matches!(
            self,
            MapFileError::Format(_) | MapFileError::InvalidBlockNumber { .. }
        )
    }
}
