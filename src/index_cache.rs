use std::io::{Read, Seek};
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use lru::LruCache;
use tracing::debug;

use crate::deserializer::Deserializer;
use crate::header::SubFileParameter;
use crate::reader::FileChannel;
use crate::MapFileError;

const INDEX_ENTRIES_PER_BLOCK: i64 = 128;
const SIZE_OF_INDEX_BLOCK: i64 =
    INDEX_ENTRIES_PER_BLOCK * SubFileParameter::BYTES_PER_INDEX_ENTRY as i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct IndexCacheEntryKey {
    sub_file_parameter: SubFileParameter,
    index_block_number: i64,
}

/// LRU cache of 640-byte index blocks, shared by all queries on one file.
///
/// Lookup and refill happen under one lock; cached blocks are immutable
/// and handed out as `Arc`s.
pub struct IndexCache<R> {
    map: Mutex<LruCache<IndexCacheEntryKey, Arc<Vec<u8>>>>,
    file_channel: Arc<FileChannel<R>>,
}

impl<R: Read + Seek> IndexCache<R> {
    pub fn new(file_channel: Arc<FileChannel<R>>, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            map: Mutex::new(LruCache::new(capacity)),
            file_channel,
        }
    }

    pub fn destroy(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the raw 40-bit index entry of `block_number`.
    pub fn get_index_entry(
        &self,
        sub_file_parameter: &SubFileParameter,
        block_number: i64,
    ) -> Result<u64, MapFileError> {
        if block_number < 0 || block_number >= sub_file_parameter.number_of_blocks {
            return Err(MapFileError::InvalidBlockNumber {
                block_number,
                number_of_blocks: sub_file_parameter.number_of_blocks,
            });
        }

        let index_block_number = block_number / INDEX_ENTRIES_PER_BLOCK;
        let index_block = self.get_index_block(sub_file_parameter, index_block_number)?;

        let index_entry_in_block = block_number % INDEX_ENTRIES_PER_BLOCK;
        let address_in_index_block =
            (index_entry_in_block * SubFileParameter::BYTES_PER_INDEX_ENTRY as i64) as usize;

        if address_in_index_block + SubFileParameter::BYTES_PER_INDEX_ENTRY as usize
            > index_block.len()
        {
            return Err(MapFileError::format(format!(
                "index entry {} outside of index block {}",
                block_number, index_block_number
            )));
        }

        Ok(Deserializer::get_five_bytes_long(
            &index_block,
            address_in_index_block,
        ))
    }

    fn get_index_block(
        &self,
        sub_file_parameter: &SubFileParameter,
        index_block_number: i64,
    ) -> Result<Arc<Vec<u8>>, MapFileError> {
        let key = IndexCacheEntryKey {
            sub_file_parameter: *sub_file_parameter,
            index_block_number,
        };

        let mut map = self.lock();
        if let Some(block) = map.get(&key) {
            return Ok(Arc::clone(block));
        }

        let index_block_position =
            sub_file_parameter.index_start_address + index_block_number * SIZE_OF_INDEX_BLOCK;
        let remaining_index_size = sub_file_parameter.index_end_address - index_block_position;
        let index_block_size = SIZE_OF_INDEX_BLOCK.min(remaining_index_size);
        if index_block_size <= 0 {
            return Err(MapFileError::format(format!(
                "invalid index block size: {}",
                index_block_size
            )));
        }

        debug!(
            "reading index block {} at {} ({} bytes)",
            index_block_number, index_block_position, index_block_size
        );

        let mut index_block = vec![0u8; index_block_size as usize];
        self.file_channel
            .read_at(index_block_position as u64, &mut index_block)?;

        let index_block = Arc::new(index_block);
        map.put(key, Arc::clone(&index_block));
        Ok(index_block)
    }

    fn lock(&self) -> MutexGuard<'_, LruCache<IndexCacheEntryKey, Arc<Vec<u8>>>> {
        self.map.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
