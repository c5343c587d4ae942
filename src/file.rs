//! Raster file façade (§4.13, §4.15): the public entry point. Owns the
//! spec (via the tile store), codec registry, tile store, and cache,
//! and exposes cell/block read/write plus VLR access.

use std::fs::File;
use std::path::{Path, PathBuf};

use crate::cache::{TileCache, TileCacheSize};
use crate::codecs::CodecMaster;
use crate::error::{Error, Result};
use crate::pool::DecodePool;
use crate::spec::GvrsFileSpec;
use crate::store::TileStore;
use crate::types::{ElementSpec, ElementType, ElementValue};
use crate::vlr::{self, VariableLengthRecord};

/// `readValue`/`writeValue` never see the raw `i32` backing an
/// `IntegerCodedFloat` element; this applies the `scale`/`offset`
/// transform named in §3/§6 in both directions.
fn present_value(element: &ElementSpec, raw: ElementValue) -> ElementValue {
    match (element.element_type, raw) {
        (ElementType::IntegerCodedFloat, ElementValue::Integer(i)) => ElementValue::Float(element.int_to_float(i)),
        _ => raw,
    }
}

fn internal_value(element: &ElementSpec, presented: ElementValue) -> Result<ElementValue> {
    match (element.element_type, presented) {
        (ElementType::IntegerCodedFloat, ElementValue::Float(f)) => Ok(ElementValue::Integer(element.float_to_int(f))),
        (ElementType::Integer, ElementValue::Integer(_))
        | (ElementType::Short, ElementValue::Short(_))
        | (ElementType::Float, ElementValue::Float(_)) => Ok(presented),
        _ => Err(Error::InvalidArgument(format!(
            "value does not match element \"{}\" ({})",
            element.name,
            element.element_type.name()
        ))),
    }
}

/// Opens/creates a `.gvrs` data file and the paired `.gvrx` sidecar
/// index. Single owner, single-threaded cooperative use (§5): nothing
/// here is `Sync`.
pub struct GvrsFile {
    store: TileStore,
    cache: TileCache,
    codecs: CodecMaster,
    decode_pool: DecodePool,
    index_path: PathBuf,
}

impl GvrsFile {
    /// Creates a brand-new file, overwriting any existing one at `path`
    /// (§4.13 `create`): writes the header/spec/tile directory, installs
    /// the standard codec registry, and records it in a
    /// `GvrsCompressionCodecs` VLR. Any stale sidecar index is removed.
    pub fn create(path: &Path, spec: GvrsFileSpec, cache_size: TileCacheSize) -> Result<Self> {
        log::debug!("creating gvrs file at {:?}", path);
        let file = File::options().read(true).write(true).create(true).truncate(true).open(path)?;
        let mut store = TileStore::create(file, spec)?;

        let codecs = CodecMaster::standard();
        let registry_vlr = vlr::encode_codec_registry(&codecs.codec_names());
        store.store_vlr(&registry_vlr)?;

        let index_path = path.with_extension("gvrx");
        let _ = std::fs::remove_file(&index_path);

        let cache = TileCache::new(cache_size.capacity(&store.spec));
        Ok(Self {
            store,
            cache,
            codecs,
            decode_pool: DecodePool::new(false),
            index_path,
        })
    }

    /// Opens an existing file (§4.13 `open`). Rejects a file whose
    /// "opened-for-writing" timestamp is non-zero (`Error::ConcurrentWriter`,
    /// §8 scenario E). Prefers the sidecar index when valid, otherwise
    /// falls back to [`TileStore::scan_for_tiles`] (§8 scenario F), then
    /// reconstructs the codec registry from the `GvrsCompressionCodecs`
    /// VLR if present.
    pub fn open(path: &Path, writable: bool, cache_size: TileCacheSize) -> Result<Self> {
        log::debug!("opening gvrs file at {:?} (writable={})", path, writable);
        let file = File::options().read(true).write(writable).open(path)?;
        let mut store = TileStore::open(file, writable)?;

        let index_path = path.with_extension("gvrx");
        if !store.try_load_index_file(&index_path)? {
            log::warn!("sidecar index at {:?} missing or stale, rebuilding tile directory by full scan", index_path);
            store.scan_for_tiles()?;
        }

        let registry_names = {
            let records = store.variable_length_records()?;
            records
                .iter()
                .find(|v| v.user_id == vlr::CODEC_REGISTRY_USER_ID && v.record_id == vlr::CODEC_REGISTRY_RECORD_ID)
                .map(vlr::decode_codec_registry)
                .transpose()?
        };
        let codecs = match registry_names {
            Some(names) => CodecMaster::from_names(&names)?,
            None => {
                log::warn!("no codec registry VLR found in {:?}, assuming the standard registry", path);
                CodecMaster::standard()
            }
        };

        let cache = TileCache::new(cache_size.capacity(&store.spec));
        Ok(Self {
            store,
            cache,
            codecs,
            decode_pool: DecodePool::new(false),
            index_path,
        })
    }

    /// Enables the rayon-backed decode pool for `read_block` calls that
    /// span more than one tile (§4.12/§5 expansion). Off by default.
    pub fn set_parallel_decode(&mut self, enabled: bool) {
        self.decode_pool = DecodePool::new(enabled);
    }

    pub fn spec(&self) -> &GvrsFileSpec {
        &self.store.spec
    }

    fn validate_cell(&self, row: u32, col: u32) -> Result<()> {
        if !self.store.spec.layout.in_bounds(row, col) {
            return Err(Error::InvalidArgument(format!(
                "cell ({}, {}) is out of bounds for a {}x{} grid",
                row, col, self.store.spec.layout.n_rows, self.store.spec.layout.n_cols
            )));
        }
        Ok(())
    }

    fn element(&self, element_index: usize) -> Result<ElementSpec> {
        self.store
            .spec
            .elements
            .get(element_index)
            .cloned()
            .ok_or_else(|| Error::InvalidArgument(format!("unknown element index {}", element_index)))
    }

    /// Reads one cell (§4.13 `readValue`). Unwritten cells read as the
    /// element type's null sentinel (§8 property 7).
    pub fn read_value(&mut self, row: u32, col: u32, element_index: usize) -> Result<ElementValue> {
        self.validate_cell(row, col)?;
        let element = self.element(element_index)?;
        let (tile_index, row_in_tile, col_in_tile) = self.store.spec.layout.cell_to_tile(row, col);
        let tile = self.cache.get_or_load(tile_index, &mut self.store, &self.codecs)?;
        let raw = tile.get_value(element_index, row_in_tile, col_in_tile);
        Ok(present_value(&element, raw))
    }

    /// Writes one cell (§4.13 `writeValue`), marking its tile dirty.
    pub fn write_value(&mut self, row: u32, col: u32, element_index: usize, value: ElementValue) -> Result<()> {
        if !self.store.is_writable() {
            return Err(Error::InvalidArgument("file is not open for writing".to_string()));
        }
        self.validate_cell(row, col)?;
        let element = self.element(element_index)?;
        let raw = internal_value(&element, value)?;
        let (tile_index, row_in_tile, col_in_tile) = self.store.spec.layout.cell_to_tile(row, col);
        let tile = self.cache.get_or_load(tile_index, &mut self.store, &self.codecs)?;
        tile.set_value(element_index, row_in_tile, col_in_tile, raw);
        Ok(())
    }

    /// Stitches a rectangular block across tile boundaries (§4.14),
    /// returning `n_rows * n_cols` presented values in row-major order.
    pub fn read_block(&mut self, row0: u32, col0: u32, n_rows: u32, n_cols: u32, element_index: usize) -> Result<Vec<ElementValue>> {
        if n_rows == 0 || n_cols == 0 {
            return Err(Error::InvalidArgument("block shape must be non-zero".to_string()));
        }
        let row1 = row0
            .checked_add(n_rows)
            .ok_or_else(|| Error::InvalidArgument("block extends past u32::MAX".to_string()))?;
        let col1 = col0
            .checked_add(n_cols)
            .ok_or_else(|| Error::InvalidArgument("block extends past u32::MAX".to_string()))?;
        if row1 > self.store.spec.layout.n_rows || col1 > self.store.spec.layout.n_cols {
            return Err(Error::InvalidArgument(format!(
                "block ({},{})+({},{}) exceeds grid bounds {}x{}",
                row0, col0, n_rows, n_cols, self.store.spec.layout.n_rows, self.store.spec.layout.n_cols
            )));
        }
        let element = self.element(element_index)?;

        let layout = self.store.spec.layout;
        let out_cols = n_cols as usize;
        let mut out = vec![ElementValue::null_for(present_type(element.element_type)); (n_rows as usize) * out_cols];

        let tile_row0 = row0 / layout.tile_rows;
        let tile_col0 = col0 / layout.tile_cols;
        let tile_row1 = (row1 - 1) / layout.tile_rows;
        let tile_col1 = (col1 - 1) / layout.tile_cols;

        // A block spanning more than one tile is where a multi-threaded
        // decode (§4.12/§5) pays off: read every missing tile's raw bytes
        // up front, decode the whole batch (in parallel when enabled),
        // then hand each decoded tile to the cache before the per-cell
        // copy loop below runs entirely against resident tiles.
        if self.decode_pool.is_enabled() {
            let mut pending = Vec::new();
            for tile_row in tile_row0..=tile_row1 {
                for tile_col in tile_col0..=tile_col1 {
                    let tile_index = layout.tile_index(tile_row, tile_col);
                    if !self.cache.is_resident(tile_index) {
                        if let Some(bytes) = self.store.read_tile(tile_index)? {
                            pending.push((tile_index, bytes));
                        }
                    }
                }
            }
            if pending.len() > 1 {
                let decoded = self.decode_pool.decode_batch(&self.codecs, &self.store.spec, pending)?;
                for (tile_index, tile) in decoded {
                    self.cache.insert_decoded(tile_index, tile, &mut self.store, &self.codecs)?;
                }
            }
        }

        for tile_row in tile_row0..=tile_row1 {
            for tile_col in tile_col0..=tile_col1 {
                let tile_index = layout.tile_index(tile_row, tile_col);
                let tile_row_start = tile_row * layout.tile_rows;
                let tile_col_start = tile_col * layout.tile_cols;
                let tile_row_end = tile_row_start + layout.tile_rows;
                let tile_col_end = tile_col_start + layout.tile_cols;

                let iv_row0 = row0.max(tile_row_start);
                let iv_row1 = row1.min(tile_row_end);
                let iv_col0 = col0.max(tile_col_start);
                let iv_col1 = col1.min(tile_col_end);
                if iv_row0 >= iv_row1 || iv_col0 >= iv_col1 {
                    continue;
                }

                let tile = self.cache.get_or_load(tile_index, &mut self.store, &self.codecs)?;
                for row in iv_row0..iv_row1 {
                    for col in iv_col0..iv_col1 {
                        let raw = tile.get_value(element_index, row - tile_row_start, col - tile_col_start);
                        let presented = present_value(&element, raw);
                        let out_row = (row - row0) as usize;
                        let out_col = (col - col0) as usize;
                        out[out_row * out_cols + out_col] = presented;
                    }
                }
            }
        }
        Ok(out)
    }

    /// Appends a variable-length record (§4.13 `storeVariableLengthRecord`).
    pub fn store_variable_length_record(&mut self, record: &VariableLengthRecord) -> Result<()> {
        if !self.store.is_writable() {
            return Err(Error::InvalidArgument("file is not open for writing".to_string()));
        }
        self.store.store_vlr(record)
    }

    /// Returns all stored VLRs, including the internal codec registry
    /// record (§4.13 `getVariableLengthRecords`).
    pub fn variable_length_records(&mut self) -> Result<&[VariableLengthRecord]> {
        self.store.variable_length_records()
    }

    /// Forces dirty tiles to disk without changing file state (§4.13
    /// `flush`, §4.15 "flush: write dirty tiles; do not change state").
    pub fn flush(&mut self) -> Result<()> {
        self.cache.flush(&mut self.store, &self.codecs)?;
        self.store.flush()
    }

    /// Flushes, stamps modification time, clears "opened-for-writing",
    /// writes a fresh sidecar index when the file is writable, and
    /// drops the handle (§4.13 `close`, §4.15 `Open* -> Closed`).
    pub fn close(mut self) -> Result<()> {
        self.flush()?;
        if self.store.is_writable() {
            self.store.write_index_file(&self.index_path)?;
            self.store.clear_opened_for_writing()?;
        }
        Ok(())
    }
}

fn present_type(element_type: ElementType) -> ElementType {
    match element_type {
        ElementType::IntegerCodedFloat => ElementType::Float,
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::GvrsFileSpecBuilder;
    use crate::types::{ElementType, INT_NULL};
    use tempfile::tempdir;

    fn data_path(dir: &tempfile::TempDir, name: &str) -> PathBuf {
        dir.path().join(name)
    }

    /// Seed scenario A (§8): integer grid, no compression beyond the
    /// registry's own best-of selection, round trip through close/open.
    #[test]
    fn test_scenario_a_integer_round_trip() {
        let dir = tempdir().unwrap();
        let path = data_path(&dir, "a.gvrs");
        let spec = GvrsFileSpecBuilder::new(10, 10, 5, 5)
            .add_element(ElementSpec::new("z", ElementType::Integer))
            .build()
            .unwrap();

        let mut file = GvrsFile::create(&path, spec, TileCacheSize::Small).unwrap();
        for i in 0..10u32 {
            for j in 0..10u32 {
                let v = (i * 10 + j) as i32 - 1;
                file.write_value(i, j, 0, ElementValue::Integer(v)).unwrap();
            }
        }
        file.close().unwrap();

        let mut reopened = GvrsFile::open(&path, false, TileCacheSize::Small).unwrap();
        let block = reopened.read_block(0, 0, 10, 10, 0).unwrap();
        assert_eq!(block[0], ElementValue::Integer(-1));
        for i in 0..10u32 {
            for j in 0..10u32 {
                let expected = (i * 10 + j) as i32 - 1;
                assert_eq!(block[(i * 10 + j) as usize], ElementValue::Integer(expected));
            }
        }
    }

    /// Seed scenario B (§8): float grid with compression, spot-check one cell.
    #[test]
    fn test_scenario_b_float_round_trip() {
        let dir = tempdir().unwrap();
        let path = data_path(&dir, "b.gvrs");
        let spec = GvrsFileSpecBuilder::new(10, 10, 5, 5)
            .add_element(ElementSpec::new("z", ElementType::Float))
            .build()
            .unwrap();

        let mut file = GvrsFile::create(&path, spec, TileCacheSize::Small).unwrap();
        for i in 0..10u32 {
            for j in 0..10u32 {
                let z = (std::f64::consts::PI * j as f64 / 10.0).sin() * (std::f64::consts::PI * i as f64 / 10.0).sin();
                file.write_value(i, j, 0, ElementValue::Float(z as f32)).unwrap();
            }
        }
        file.close().unwrap();

        let mut reopened = GvrsFile::open(&path, false, TileCacheSize::Small).unwrap();
        let value = reopened.read_value(5, 5, 0).unwrap();
        match value {
            ElementValue::Float(f) => assert!((f - 1.0).abs() < 1e-4, "expected ~1.0, got {}", f),
            other => panic!("expected float, got {:?}", other),
        }
    }

    /// Seed scenario D (§8): a checkerboard of nulls round-trips exactly.
    #[test]
    fn test_scenario_d_nulls_round_trip() {
        let dir = tempdir().unwrap();
        let path = data_path(&dir, "d.gvrs");
        let spec = GvrsFileSpecBuilder::new(10, 10, 10, 10)
            .add_element(ElementSpec::new("z", ElementType::Integer))
            .build()
            .unwrap();

        let mut file = GvrsFile::create(&path, spec, TileCacheSize::Small).unwrap();
        for i in 0..10u32 {
            for j in 0..10u32 {
                if (i + j) % 2 == 0 {
                    file.write_value(i, j, 0, ElementValue::Integer(INT_NULL)).unwrap();
                } else {
                    file.write_value(i, j, 0, ElementValue::Integer((i * 10 + j) as i32)).unwrap();
                }
            }
        }
        file.close().unwrap();

        let mut reopened = GvrsFile::open(&path, false, TileCacheSize::Small).unwrap();
        for i in 0..10u32 {
            for j in 0..10u32 {
                let value = reopened.read_value(i, j, 0).unwrap();
                if (i + j) % 2 == 0 {
                    assert!(value.is_null());
                } else {
                    assert_eq!(value, ElementValue::Integer((i * 10 + j) as i32));
                }
            }
        }
    }

    /// Seed scenario E (§8): opening a file that is already open for
    /// writing fails with `ConcurrentWriter`.
    #[test]
    fn test_scenario_e_concurrent_writer_rejected() {
        let dir = tempdir().unwrap();
        let path = data_path(&dir, "e.gvrs");
        let spec = GvrsFileSpecBuilder::new(4, 4, 2, 2)
            .add_element(ElementSpec::new("z", ElementType::Integer))
            .build()
            .unwrap();
        let _file = GvrsFile::create(&path, spec, TileCacheSize::Small).unwrap();
        // `_file` stays open (writable), leaving "opened-for-writing" stamped.

        let err = GvrsFile::open(&path, false, TileCacheSize::Small).unwrap_err();
        assert!(matches!(err, Error::ConcurrentWriter));
    }

    /// Seed scenario F (§8): a tampered sidecar index is rejected and the
    /// directory is rebuilt by a full scan, not silently trusted.
    #[test]
    fn test_scenario_f_stale_index_triggers_rescan() {
        let _ = env_logger::try_init();
        let dir = tempdir().unwrap();
        let path = data_path(&dir, "f.gvrs");
        let spec = GvrsFileSpecBuilder::new(6, 6, 3, 3)
            .add_element(ElementSpec::new("z", ElementType::Integer))
            .build()
            .unwrap();

        let mut file = GvrsFile::create(&path, spec, TileCacheSize::Small).unwrap();
        file.write_value(0, 0, 0, ElementValue::Integer(123)).unwrap();
        file.write_value(5, 5, 0, ElementValue::Integer(456)).unwrap();
        file.close().unwrap();

        let index_path = path.with_extension("gvrx");
        let mut bytes = std::fs::read(&index_path).unwrap();
        // Flip a byte inside the recorded UUID/directory region so the
        // identity check in try_load_index_file fails and a rescan triggers.
        let tamper_at = bytes.len() / 2;
        bytes[tamper_at] ^= 0xFF;
        std::fs::write(&index_path, &bytes).unwrap();

        let mut reopened = GvrsFile::open(&path, false, TileCacheSize::Small).unwrap();
        assert_eq!(reopened.read_value(0, 0, 0).unwrap(), ElementValue::Integer(123));
        assert_eq!(reopened.read_value(5, 5, 0).unwrap(), ElementValue::Integer(456));
    }

    #[test]
    fn test_read_block_consistency_with_individual_reads() {
        let dir = tempdir().unwrap();
        let path = data_path(&dir, "consistency.gvrs");
        let spec = GvrsFileSpecBuilder::new(13, 11, 4, 4)
            .add_element(ElementSpec::new("z", ElementType::Integer))
            .build()
            .unwrap();
        let mut file = GvrsFile::create(&path, spec, TileCacheSize::Medium).unwrap();
        for i in 0..13u32 {
            for j in 0..11u32 {
                file.write_value(i, j, 0, ElementValue::Integer((i * 11 + j) as i32)).unwrap();
            }
        }

        let block = file.read_block(2, 1, 7, 6, 0).unwrap();
        for r in 0..7u32 {
            for c in 0..6u32 {
                let individual = file.read_value(2 + r, 1 + c, 0).unwrap();
                assert_eq!(block[(r * 6 + c) as usize], individual);
            }
        }
    }

    #[test]
    fn test_integer_coded_float_presentation() {
        let dir = tempdir().unwrap();
        let path = data_path(&dir, "icf.gvrs");
        let spec = GvrsFileSpecBuilder::new(4, 4, 2, 2)
            .add_element(ElementSpec::new("z", ElementType::IntegerCodedFloat).with_scale_offset(100.0, 0.0))
            .build()
            .unwrap();
        let mut file = GvrsFile::create(&path, spec, TileCacheSize::Small).unwrap();
        file.write_value(1, 1, 0, ElementValue::Float(3.5)).unwrap();
        match file.read_value(1, 1, 0).unwrap() {
            ElementValue::Float(f) => assert!((f - 3.5).abs() < 0.01),
            other => panic!("expected float presentation, got {:?}", other),
        }
        match file.read_value(0, 0, 0).unwrap() {
            ElementValue::Float(f) => assert!(f.is_nan()),
            other => panic!("expected NaN for unwritten cell, got {:?}", other),
        }
    }

    #[test]
    fn test_read_block_with_parallel_decode_enabled_matches_sequential() {
        let dir = tempdir().unwrap();
        let path = data_path(&dir, "parallel.gvrs");
        let spec = GvrsFileSpecBuilder::new(20, 20, 5, 5)
            .add_element(ElementSpec::new("z", ElementType::Integer))
            .build()
            .unwrap();
        let mut file = GvrsFile::create(&path, spec, TileCacheSize::Medium).unwrap();
        for i in 0..20u32 {
            for j in 0..20u32 {
                file.write_value(i, j, 0, ElementValue::Integer((i * 20 + j) as i32)).unwrap();
            }
        }
        file.close().unwrap();

        let mut sequential = GvrsFile::open(&path, false, TileCacheSize::Medium).unwrap();
        let expected = sequential.read_block(0, 0, 20, 20, 0).unwrap();

        let mut parallel = GvrsFile::open(&path, false, TileCacheSize::Medium).unwrap();
        parallel.set_parallel_decode(true);
        let actual = parallel.read_block(0, 0, 20, 20, 0).unwrap();

        assert_eq!(actual, expected);
    }

    #[test]
    fn test_write_rejected_on_read_only_file() {
        let dir = tempdir().unwrap();
        let path = data_path(&dir, "readonly.gvrs");
        let spec = GvrsFileSpecBuilder::new(4, 4, 2, 2)
            .add_element(ElementSpec::new("z", ElementType::Integer))
            .build()
            .unwrap();
        GvrsFile::create(&path, spec, TileCacheSize::Small).unwrap().close().unwrap();

        let mut reopened = GvrsFile::open(&path, false, TileCacheSize::Small).unwrap();
        let err = reopened.write_value(0, 0, 0, ElementValue::Integer(1)).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }
}
