//! Tile cache (§4.12): a bounded LRU of decompressed, resident [`Tile`]s
//! with dirty write-back on eviction. Single-threaded cooperative by
//! default (§5) — the cache itself holds no lock; it is reached only
//! through [`crate::file::GvrsFile`], which owns it exclusively.
//!
//! The cache does not hold the [`TileStore`] or [`CodecMaster`] it needs
//! to decode a miss or write back a dirty eviction — those are borrowed
//! for the duration of each call, matching the "no cyclic ownership"
//! design note in §9: tiles carry no reference back to the cache, and
//! the cache carries no reference to the store.

use std::num::NonZeroUsize;

use lru::LruCache;

use crate::codecs::CodecMaster;
use crate::error::{Error, Result};
use crate::spec::GvrsFileSpec;
use crate::store::TileStore;
use crate::tile::Tile;
use crate::types::{ElementType, INT_NULL, SHORT_NULL};

/// Presets named in §4.12; `Custom` is this repository's escape hatch
/// for callers who need a specific bound (e.g. `readBlock` touching a
/// span wider than any built-in preset).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileCacheSize {
    Small,
    Medium,
    Large,
    Custom(usize),
}

impl TileCacheSize {
    pub fn capacity(&self, spec: &GvrsFileSpec) -> usize {
        match self {
            TileCacheSize::Small => 4,
            TileCacheSize::Medium => 16,
            TileCacheSize::Large => {
                (spec.layout.n_tile_rows().max(spec.layout.n_tile_cols()) as usize) + 4
            }
            TileCacheSize::Custom(n) => (*n).max(1),
        }
    }
}

/// Serializes one tile's elements into the byte blob [`TileStore::write_tile`]
/// stores, framing each element's codec packing with a 4-byte length so
/// a multi-element tile shares one on-disk block (§3 "Holds one or more
/// elements"; this per-element framing is this repository's design,
/// grounded in the same length-prefixed-group idiom the Float codec
/// uses in §4.8).
pub(crate) fn encode_tile_payload(codecs: &CodecMaster, spec: &GvrsFileSpec, tile: &Tile) -> Vec<u8> {
    let tr = spec.layout.tile_rows as usize;
    let tc = spec.layout.tile_cols as usize;
    let mut out = Vec::new();
    for (i, element) in spec.elements.iter().enumerate() {
        let encoded = match element.element_type {
            ElementType::Float => codecs.encode_float_tile(tr, tc, tile.float_values(i)),
            ElementType::Short => {
                let widened: Vec<i32> = tile
                    .short_values(i)
                    .iter()
                    .map(|&v| if v == SHORT_NULL { INT_NULL } else { v as i32 })
                    .collect();
                codecs.encode_integer_tile(tr, tc, &widened)
            }
            ElementType::Integer | ElementType::IntegerCodedFloat => {
                codecs.encode_integer_tile(tr, tc, tile.integer_values(i))
            }
        };
        out.extend_from_slice(&(encoded.len() as u32).to_le_bytes());
        out.extend_from_slice(&encoded);
    }
    out
}

pub(crate) fn decode_tile_payload(codecs: &CodecMaster, spec: &GvrsFileSpec, tile_index: usize, bytes: &[u8]) -> Result<Tile> {
    let tr = spec.layout.tile_rows;
    let tc = spec.layout.tile_cols;
    let mut tile = Tile::new_nulls(tile_index, tr, tc, &spec.elements);
    let mut pos = 0usize;
    for (i, element) in spec.elements.iter().enumerate() {
        if pos + 4 > bytes.len() {
            return Err(Error::FormatError(format!("truncated tile {} payload", tile_index)));
        }
        let len = u32::from_le_bytes(bytes[pos..pos + 4].try_into().unwrap()) as usize;
        pos += 4;
        if pos + len > bytes.len() {
            return Err(Error::FormatError(format!("tile {} element group overruns payload", tile_index)));
        }
        let chunk = &bytes[pos..pos + len];
        pos += len;
        match element.element_type {
            ElementType::Float => {
                let values = codecs.decode_float_tile(tr as usize, tc as usize, chunk)?;
                tile.set_float_values(i, values);
            }
            ElementType::Short => {
                let widened = codecs.decode_integer_tile(tr as usize, tc as usize, chunk)?;
                let narrowed = widened
                    .into_iter()
                    .map(|v| if v == INT_NULL { SHORT_NULL } else { v as i16 })
                    .collect();
                tile.set_short_values(i, narrowed);
            }
            ElementType::Integer | ElementType::IntegerCodedFloat => {
                let values = codecs.decode_integer_tile(tr as usize, tc as usize, chunk)?;
                tile.set_integer_values(i, values);
            }
        }
    }
    Ok(tile)
}

/// Bounded LRU of resident [`Tile`]s. `getTile`/`allocateNewTile` of
/// §4.12 are [`TileCache::get_or_load`] and [`TileCache::allocate_new_tile`].
pub struct TileCache {
    lru: LruCache<usize, Tile>,
}

impl TileCache {
    pub fn new(capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity.max(1)).expect("capacity is at least 1");
        Self { lru: LruCache::new(cap) }
    }

    pub fn capacity(&self) -> usize {
        self.lru.cap().get()
    }

    pub fn resident_count(&self) -> usize {
        self.lru.len()
    }

    pub fn is_resident(&self, tile_index: usize) -> bool {
        self.lru.contains(&tile_index)
    }

    /// Returns the resident tile, decoding from the store on a miss
    /// (§4.12 `getTile`). A newly decoded tile may evict the current
    /// LRU tile, writing it back first if dirty. Takes `store` rather
    /// than a separately borrowed spec, since `GvrsFileSpec` lives
    /// inside [`TileStore`] and a caller cannot borrow both at once.
    pub fn get_or_load(&mut self, tile_index: usize, store: &mut TileStore, codecs: &CodecMaster) -> Result<&mut Tile> {
        if !self.lru.contains(&tile_index) {
            let tile = match store.read_tile(tile_index)? {
                Some(bytes) => decode_tile_payload(codecs, &store.spec, tile_index, &bytes)?,
                None => Tile::new_nulls(tile_index, store.spec.layout.tile_rows, store.spec.layout.tile_cols, &store.spec.elements),
            };
            self.insert_with_eviction(tile_index, tile, store, codecs)?;
        }
        Ok(self.lru.get_mut(&tile_index).expect("just inserted"))
    }

    /// Makes an already-decoded tile resident without going through the
    /// store, used by [`crate::pool::DecodePool`] to hand off tiles it
    /// decoded off the single-threaded path (§4.12/§5 expansion). A
    /// no-op if `tile_index` is already resident.
    pub fn insert_decoded(&mut self, tile_index: usize, tile: Tile, store: &mut TileStore, codecs: &CodecMaster) -> Result<()> {
        if self.lru.contains(&tile_index) {
            return Ok(());
        }
        self.insert_with_eviction(tile_index, tile, store, codecs)
    }

    /// Allocates a fresh, all-null tile and makes it resident, marking
    /// it dirty so the first `flush`/eviction persists it even if every
    /// cell is still null (§4.12 `allocateNewTile`).
    pub fn allocate_new_tile(&mut self, tile_index: usize, store: &mut TileStore, codecs: &CodecMaster) -> Result<&mut Tile> {
        let mut tile = Tile::new_nulls(tile_index, store.spec.layout.tile_rows, store.spec.layout.tile_cols, &store.spec.elements);
        tile.mark_dirty();
        self.insert_with_eviction(tile_index, tile, store, codecs)?;
        Ok(self.lru.get_mut(&tile_index).expect("just inserted"))
    }

    fn insert_with_eviction(&mut self, tile_index: usize, tile: Tile, store: &mut TileStore, codecs: &CodecMaster) -> Result<()> {
        if self.lru.len() >= self.lru.cap().get() {
            if let Some((evicted_index, mut evicted_tile)) = self.lru.pop_lru() {
                if evicted_tile.is_dirty() {
                    log::debug!("evicting dirty tile {} from cache, writing back", evicted_index);
                    let payload = encode_tile_payload(codecs, &store.spec, &evicted_tile);
                    store.write_tile(evicted_index, &payload)?;
                    evicted_tile.mark_clean();
                }
            }
        }
        self.lru.put(tile_index, tile);
        Ok(())
    }

    /// Writes back every dirty resident tile without evicting any of
    /// them (§4.13 `flush`, §4.15 "flush: write dirty tiles; do not
    /// change state").
    pub fn flush(&mut self, store: &mut TileStore, codecs: &CodecMaster) -> Result<()> {
        for (tile_index, tile) in self.lru.iter_mut() {
            if tile.is_dirty() {
                let payload = encode_tile_payload(codecs, &store.spec, tile);
                store.write_tile(*tile_index, &payload)?;
                tile.mark_clean();
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::GvrsFileSpecBuilder;
    use crate::types::{ElementSpec, ElementValue};
    use std::fs::File;
    use tempfile::NamedTempFile;

    fn sample_spec() -> GvrsFileSpec {
        GvrsFileSpecBuilder::new(20, 20, 5, 5)
            .add_element(ElementSpec::new("z", ElementType::Integer))
            .build()
            .unwrap()
    }

    fn open_store(tmp: &NamedTempFile) -> TileStore {
        let file = File::options().read(true).write(true).open(tmp.path()).unwrap();
        TileStore::create(file, sample_spec()).unwrap()
    }

    #[test]
    fn test_cache_size_presets() {
        let spec = GvrsFileSpecBuilder::new(100, 100, 10, 10)
            .add_element(ElementSpec::new("z", ElementType::Integer))
            .build()
            .unwrap();
        assert_eq!(TileCacheSize::Small.capacity(&spec), 4);
        assert_eq!(TileCacheSize::Medium.capacity(&spec), 16);
        assert_eq!(TileCacheSize::Large.capacity(&spec), 14);
        assert_eq!(TileCacheSize::Custom(7).capacity(&spec), 7);
    }

    #[test]
    fn test_get_or_load_miss_returns_null_tile() {
        let tmp = NamedTempFile::new().unwrap();
        let mut store = open_store(&tmp);
        let codecs = CodecMaster::standard();
        let mut cache = TileCache::new(2);

        let tile = cache.get_or_load(0, &mut store, &codecs).unwrap();
        assert!(tile.get_value(0, 0, 0).is_null());
    }

    #[test]
    fn test_eviction_writes_back_dirty_tile() {
        let tmp = NamedTempFile::new().unwrap();
        let mut store = open_store(&tmp);
        let codecs = CodecMaster::standard();
        let mut cache = TileCache::new(1);

        {
            let tile = cache.allocate_new_tile(0, &mut store, &codecs).unwrap();
            tile.set_value(0, 1, 1, ElementValue::Integer(42));
        }
        // Loading tile 1 evicts tile 0, which must be written back.
        cache.get_or_load(1, &mut store, &codecs).unwrap();
        assert!(!cache.is_resident(0));

        let reloaded = cache.get_or_load(0, &mut store, &codecs).unwrap();
        assert_eq!(reloaded.get_value(0, 1, 1), ElementValue::Integer(42));
    }

    #[test]
    fn test_flush_does_not_evict() {
        let tmp = NamedTempFile::new().unwrap();
        let mut store = open_store(&tmp);
        let codecs = CodecMaster::standard();
        let mut cache = TileCache::new(4);

        {
            let tile = cache.allocate_new_tile(0, &mut store, &codecs).unwrap();
            tile.set_value(0, 0, 0, ElementValue::Integer(7));
        }
        cache.flush(&mut store, &codecs).unwrap();
        assert_eq!(cache.resident_count(), 1);
        assert!(cache.is_resident(0));
    }
}
