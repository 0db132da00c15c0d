pub const DEFAULT_INDEX_CACHE_SIZE: usize = 64;
pub const DEFAULT_MAXIMUM_BUFFER_SIZE: usize = 2_500_000;
pub const DEFAULT_WAY_FILTER_DISTANCE: u32 = 20;

/// Reader settings, fixed when a map file is opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapFileConfig {
    /// Drop ways that do not come near the queried area when the query is
    /// finer than the sub-file's base zoom level.
    pub way_filter_enabled: bool,
    /// Margin in meters added around the queried area before way filtering.
    pub way_filter_distance: u32,
    /// Number of 640-byte index blocks kept in memory.
    pub index_cache_size: usize,
    /// Blocks larger than this many bytes are skipped.
    pub maximum_buffer_size: usize,
    /// Language code used to pick localized names, e.g. `en`.
    pub preferred_language: Option<String>,
}

impl Default for MapFileConfig {
    fn default() -> Self {
        Self {
            way_filter_enabled: true,
            way_filter_distance: DEFAULT_WAY_FILTER_DISTANCE,
            index_cache_size: DEFAULT_INDEX_CACHE_SIZE,
            maximum_buffer_size: DEFAULT_MAXIMUM_BUFFER_SIZE,
            preferred_language: None,
        }
    }
}

impl MapFileConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_way_filter(mut self, enabled: bool, distance: u32) -> Self {
        self.way_filter_enabled = enabled;
        self.way_filter_distance = distance;
        self
    }

    pub fn with_index_cache_size(mut self, index_cache_size: usize) -> Self {
        self.index_cache_size = index_cache_size.max(1);
        self
    }

    pub fn with_maximum_buffer_size(mut self, maximum_buffer_size: usize) -> Self {
        self.maximum_buffer_size = maximum_buffer_size;
        self
    }

    pub fn with_preferred_language(mut self, language: impl Into<String>) -> Self {
        let language = language.into();
        self.preferred_language = if language.trim().is_empty() {
            None
        } else {
            Some(language)
        };
        self
    }
}
