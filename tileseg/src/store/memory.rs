use common::Buffer2;
use hashbrown::HashMap;
use parking_lot::Mutex;

use super::{TileKey, TileStore};
use crate::error::Error;

/// In-memory artifact table keyed by `(row, col, stage)` with explicit eviction.
#[derive(Debug, Default)]
pub struct MemoryTileStore {
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    tiles: HashMap<TileKey, Buffer2<u32>>,
    /// Largest number of artifacts held at once.
    peak_len: usize,
}

impl MemoryTileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Largest number of artifacts that coexisted since creation.
    pub fn peak_len(&self) -> usize {
        self.inner.lock().peak_len
    }
}

impl TileStore for MemoryTileStore {
    fn write(&self, key: TileKey, labels: &Buffer2<u32>) -> Result<(), Error> {
        let mut inner = self.inner.lock();
        inner.tiles.insert(key, labels.clone());
        inner.peak_len = inner.peak_len.max(inner.tiles.len());
        Ok(())
    }

    fn read(&self, key: TileKey) -> Result<Buffer2<u32>, Error> {
        self.inner
            .lock()
            .tiles
            .get(&key)
            .cloned()
            .ok_or(Error::MissingArtifact { key })
    }

    fn remove(&self, key: TileKey) -> Result<(), Error> {
        self.inner
            .lock()
            .tiles
            .remove(&key)
            .map(|_| ())
            .ok_or(Error::MissingArtifact { key })
    }

    fn contains(&self, key: TileKey) -> bool {
        self.inner.lock().tiles.contains_key(&key)
    }

    fn keys(&self) -> Vec<TileKey> {
        let mut keys: Vec<TileKey> = self.inner.lock().tiles.keys().copied().collect();
        keys.sort();
        keys
    }
}
