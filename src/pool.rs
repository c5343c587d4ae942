//! Decode worker pool (§4.12/§5 expansion): decodes a batch of tile
//! payloads concurrently ahead of a multi-tile `readBlock`. Off by
//! default, matching §5's "single-threaded cooperative" baseline.
//!
//! Grounded in the teacher's `formats::tiff::reader::parallel` module,
//! which reaches for bare `rayon::prelude::par_iter` rather than a
//! dedicated `rayon::ThreadPool` — this module does the same instead of
//! standing up its own pool.

use rayon::prelude::*;

use crate::cache::decode_tile_payload;
use crate::codecs::CodecMaster;
use crate::error::Result;
use crate::spec::GvrsFileSpec;
use crate::tile::Tile;

/// Decodes tile payloads either sequentially or, when enabled, across
/// rayon's global thread pool. Holds no state of its own; `enabled` is
/// the only knob, set once by [`crate::file::GvrsFile::open`] from the
/// cache configuration.
pub struct DecodePool {
    enabled: bool,
}

impl DecodePool {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Decodes every `(tile_index, compressed_bytes)` pair, in parallel
    /// when enabled. The cache is untouched here — insertion still goes
    /// through the single-threaded cache lock described in §4.12.
    pub fn decode_batch(
        &self,
        codecs: &CodecMaster,
        spec: &GvrsFileSpec,
        items: Vec<(usize, Vec<u8>)>,
    ) -> Result<Vec<(usize, Tile)>> {
        if self.enabled && items.len() > 1 {
            items
                .into_par_iter()
                .map(|(tile_index, bytes)| decode_tile_payload(codecs, spec, tile_index, &bytes).map(|t| (tile_index, t)))
                .collect()
        } else {
            items
                .into_iter()
                .map(|(tile_index, bytes)| decode_tile_payload(codecs, spec, tile_index, &bytes).map(|t| (tile_index, t)))
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::GvrsFileSpecBuilder;
    use crate::store::TileStore;
    use crate::types::{ElementSpec, ElementType};
    use std::fs::File;
    use tempfile::NamedTempFile;

    #[test]
    fn test_decode_batch_sequential_and_parallel_agree() {
        let tmp = NamedTempFile::new().unwrap();
        let spec = GvrsFileSpecBuilder::new(10, 10, 5, 5)
            .add_element(ElementSpec::new("z", ElementType::Integer))
            .build()
            .unwrap();
        let file = File::options().read(true).write(true).open(tmp.path()).unwrap();
        let mut store = TileStore::create(file, spec).unwrap();
        let codecs = CodecMaster::standard();

        let mut tile = Tile::new_nulls(0, 5, 5, &store.spec.elements);
        tile.set_value(0, 2, 2, crate::types::ElementValue::Integer(99));
        let payload = crate::cache::encode_tile_payload(&codecs, &store.spec, &tile);
        store.write_tile(0, &payload).unwrap();
        let bytes = store.read_tile(0).unwrap().unwrap();

        let spec2 = GvrsFileSpecBuilder::new(10, 10, 5, 5)
            .add_element(ElementSpec::new("z", ElementType::Integer))
            .build()
            .unwrap();

        let sequential = DecodePool::new(false);
        let parallel = DecodePool::new(true);

        let seq_result = sequential.decode_batch(&codecs, &spec2, vec![(0, bytes.clone())]).unwrap();
        let par_result = parallel.decode_batch(&codecs, &spec2, vec![(0, bytes.clone()), (0, bytes)]).unwrap();

        assert_eq!(seq_result[0].1.get_value(0, 2, 2), crate::types::ElementValue::Integer(99));
        assert_eq!(par_result.len(), 2);
        for (_, tile) in &par_result {
            assert_eq!(tile.get_value(0, 2, 2), crate::types::ElementValue::Integer(99));
        }
    }
}
