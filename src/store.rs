//! Tile store (§4.11): the persistent layout of one `.gvrs` data file —
//! fixed header, serialized spec, tile directory, and a packed sequence
//! of tile payloads and variable-length records, plus the `.gvrs`x
//! sidecar index (§6).
//!
//! ## Layout this module writes
//!
//! ```text
//! 0      magic "gvrs raster" (12 bytes, NUL-padded)
//! 12     major version (1 byte)
//! 13     minor version (1 byte)
//! 14     reserved (2 bytes)
//! 16     time last modified, epoch ms LE (8 bytes)
//! 24     time opened for writing, epoch ms LE, 0 = not writing (8 bytes)
//! 32     tile_store_section_offset: u64 (8 bytes) -- start of the tile directory
//! 40     spec_len: u32, then spec_len bytes of serialized GvrsFileSpec
//!        padded with zero bytes up to the next 8-byte boundary
//! ------ (== tile_store_section_offset) ------
//!        tile directory: n_tiles * u32, each (offset / 8), 0 = absent
//!        payload region: a packed sequence of tagged blocks to EOF
//! ```
//!
//! Every block in the payload region starts with a 1-byte tag and a
//! 4-byte `len_of_rest` (the byte count that follows, excluding this
//! 5-byte sub-header):
//!
//! - tag 0 (free): `len_of_rest` bytes of unused filler, written when a
//!   reclaimed block is larger than what replaced it.
//! - tag 1 (tile): `tile_index: u32` then the codec's encoded payload
//!   (optionally with a trailing CRC32C, see `checksums_enabled`).
//! - tag 2 (VLR): the 64-byte VLR header (§3, [`crate::vlr`]) then its
//!   payload.
//!
//! This tag/length scheme is what lets [`TileStore::scan_for_tiles`]
//! walk the file and rebuild both the tile directory and the VLR list
//! without any other index (§4.11 `scanFileForTiles`, §8 scenario F).
//! The byte layout itself is this repository's design: §4.11 names the
//! sections ("header", "spec", "tile directory", "free-space map",
//! "tile payloads and VLR records") without specifying their exact
//! encoding; see `DESIGN.md`.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use uuid::Uuid;

use crate::error::{Error, Result};
use crate::io::primitives::{read_i64, read_u32, read_u64, read_u8, read_vec, write_i64, write_u32, write_u64, write_u8};
use crate::spec::GvrsFileSpec;
use crate::vlr::{self, VariableLengthRecord};

pub const MAGIC_DATA: [u8; 12] = *b"gvrs raster\0";
pub const MAGIC_INDEX: [u8; 12] = *b"gvrs index\0\0";
const HEADER_LEN: u64 = 40;

const TAG_FREE: u8 = 0;
const TAG_TILE: u8 = 1;
const TAG_VLR: u8 = 2;
const BLOCK_SUBHEADER_LEN: u64 = 5; // tag(1) + len_of_rest(4)

fn now_epoch_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

fn align8(offset: u64) -> u64 {
    (offset + 7) & !7
}

#[derive(Debug, Clone, Copy)]
struct FreeBlock {
    offset: u64,
    total_span: u64,
}

/// Owns the file's random-access handle and all the bookkeeping
/// described above. A tile's content is never held here — only its
/// compressed on-disk bytes pass through; decoding is the façade's job
/// via the codec registry.
pub struct TileStore {
    file: File,
    writable: bool,
    pub spec: GvrsFileSpec,
    time_last_modified_ms: i64,
    time_opened_for_writing_ms: i64,
    tile_store_section_offset: u64,
    directory: Vec<u32>,
    free_blocks: Vec<FreeBlock>,
    alloc_end: u64,
    vlr_cache: Option<Vec<VariableLengthRecord>>,
}

impl TileStore {
    fn payload_region_start(&self) -> u64 {
        self.tile_store_section_offset + (self.directory.len() as u64) * 4
    }

    pub fn uuid(&self) -> Uuid {
        self.spec.uuid
    }

    pub fn time_last_modified_ms(&self) -> i64 {
        self.time_last_modified_ms
    }

    pub fn is_open_for_writing(&self) -> bool {
        self.time_opened_for_writing_ms != 0
    }

    pub fn is_writable(&self) -> bool {
        self.writable
    }

    /// Creates a brand-new data file (§4.13 `create`): writes the
    /// header, the serialized spec, and an all-zero tile directory.
    /// `file` must already be truncated/empty.
    pub fn create(mut file: File, spec: GvrsFileSpec) -> Result<Self> {
        let n_tiles = spec.layout.n_tiles();

        let mut spec_bytes = Vec::new();
        spec.write_to(&mut spec_bytes)?;

        let spec_record_start = HEADER_LEN;
        let spec_record_len = 4 + spec_bytes.len() as u64;
        let tile_store_section_offset = align8(spec_record_start + spec_record_len);

        file.set_len(0)?;
        file.seek(SeekFrom::Start(0))?;
        file.write_all(&MAGIC_DATA)?;
        write_u8(&mut file, spec.version_major)?;
        write_u8(&mut file, spec.version_minor)?;
        write_u32(&mut file, 0)?; // reserved
        let time_last_modified_ms = now_epoch_ms();
        let time_opened_for_writing_ms = time_last_modified_ms;
        write_i64(&mut file, time_last_modified_ms)?;
        write_i64(&mut file, time_opened_for_writing_ms)?;
        write_u64(&mut file, tile_store_section_offset)?;

        write_u32(&mut file, spec_bytes.len() as u32)?;
        file.write_all(&spec_bytes)?;
        let pad = tile_store_section_offset - (spec_record_start + spec_record_len);
        file.write_all(&vec![0u8; pad as usize])?;

        let directory = vec![0u32; n_tiles];
        for entry in &directory {
            write_u32(&mut file, *entry)?;
        }
        file.flush()?;

        let alloc_end = file.stream_position()?;

        Ok(Self {
            file,
            writable: true,
            spec,
            time_last_modified_ms,
            time_opened_for_writing_ms,
            tile_store_section_offset,
            directory,
            free_blocks: Vec::new(),
            alloc_end,
            vlr_cache: None,
        })
    }

    /// Opens an existing data file (§4.13 `open`). `writable` stamps the
    /// "opened for writing" timestamp and enables tile writes; a
    /// non-zero timestamp already on disk is always rejected (§5), even
    /// for a read-only open, since it is the sole cross-process
    /// exclusion mechanism.
    pub fn open(mut file: File, writable: bool) -> Result<Self> {
        file.seek(SeekFrom::Start(0))?;
        let mut magic = [0u8; 12];
        file.read_exact(&mut magic)?;
        if magic != MAGIC_DATA {
            return Err(Error::FormatError("not a gvrs data file (bad magic)".to_string()));
        }
        let major = read_u8(&mut file)?;
        let minor = read_u8(&mut file)?;
        let _reserved = read_u32(&mut file)?;
        if major != crate::spec::FORMAT_MAJOR_VERSION {
            return Err(Error::FormatError(format!(
                "unsupported gvrs major version {} (expected {})",
                major,
                crate::spec::FORMAT_MAJOR_VERSION
            )));
        }
        let time_last_modified_ms = read_i64(&mut file)?;
        let time_opened_for_writing_ms = read_i64(&mut file)?;
        if time_opened_for_writing_ms != 0 {
            return Err(Error::ConcurrentWriter);
        }
        let tile_store_section_offset = read_u64(&mut file)?;

        let spec_len = read_u32(&mut file)? as usize;
        let spec_bytes = read_vec(&mut file, spec_len)?;
        let mut spec = GvrsFileSpec::read_from(&spec_bytes)?;
        spec.version_major = major;
        spec.version_minor = minor;

        let n_tiles = spec.layout.n_tiles();
        file.seek(SeekFrom::Start(tile_store_section_offset))?;
        let mut directory = Vec::with_capacity(n_tiles);
        for _ in 0..n_tiles {
            directory.push(read_u32(&mut file)?);
        }

        let alloc_end = file.seek(SeekFrom::End(0))?;

        let mut store = Self {
            file,
            writable,
            spec,
            time_last_modified_ms,
            time_opened_for_writing_ms: 0,
            tile_store_section_offset,
            directory,
            free_blocks: Vec::new(),
            alloc_end,
            vlr_cache: None,
        };

        if writable {
            let now = now_epoch_ms();
            store.time_opened_for_writing_ms = now;
            store.file.seek(SeekFrom::Start(24))?;
            write_i64(&mut store.file, now)?;
            store.file.flush()?;
        }

        Ok(store)
    }

    fn read_block_subheader(&mut self, offset: u64) -> Result<(u8, u32)> {
        self.file.seek(SeekFrom::Start(offset))?;
        let tag = read_u8(&mut self.file)?;
        let len_of_rest = read_u32(&mut self.file)?;
        Ok((tag, len_of_rest))
    }

    fn write_tombstone(&mut self, offset: u64, total_span: u64) -> Result<()> {
        debug_assert!(total_span >= BLOCK_SUBHEADER_LEN);
        self.file.seek(SeekFrom::Start(offset))?;
        write_u8(&mut self.file, TAG_FREE)?;
        write_u32(&mut self.file, (total_span - BLOCK_SUBHEADER_LEN) as u32)?;
        Ok(())
    }

    /// Finds space for a block requiring `total_span` bytes, reusing a
    /// free block when one fits exactly or leaves room for a tombstone
    /// (§4.11 "if a previous payload exists and bytes.len > oldCapacity,
    /// release the old block ... and allocate a new block").
    fn allocate(&mut self, total_span: u64, align_to_8: bool) -> Result<u64> {
        if let Some(pos) = self.free_blocks.iter().position(|b| {
            (!align_to_8 || b.offset % 8 == 0)
                && (b.total_span == total_span || b.total_span >= total_span + BLOCK_SUBHEADER_LEN)
        }) {
            let block = self.free_blocks.remove(pos);
            let remainder = block.total_span - total_span;
            if remainder > 0 {
                self.write_tombstone(block.offset + total_span, remainder)?;
                self.free_blocks.push(FreeBlock {
                    offset: block.offset + total_span,
                    total_span: remainder,
                });
            }
            return Ok(block.offset);
        }

        let mut offset = self.alloc_end;
        if align_to_8 {
            let mut aligned = align8(offset);
            if aligned > offset {
                let mut gap = aligned - offset;
                if gap < BLOCK_SUBHEADER_LEN {
                    aligned += 8;
                    gap = aligned - offset;
                }
                self.write_tombstone(offset, gap)?;
                offset = aligned;
            }
        }
        self.alloc_end = offset + total_span;
        Ok(offset)
    }

    fn release(&mut self, offset: u64, total_span: u64) {
        self.free_blocks.push(FreeBlock { offset, total_span });
    }

    /// Reads tile `tile_index`'s raw payload bytes (the codec packing,
    /// including a trailing CRC32C when checksums are enabled); `None`
    /// if the tile has never been written (§4.11 `readTile`).
    pub fn read_tile(&mut self, tile_index: usize) -> Result<Option<Vec<u8>>> {
        let raw = self.directory[tile_index];
        if raw == 0 {
            return Ok(None);
        }
        let offset = (raw as u64) * 8;
        let (tag, len_of_rest) = self.read_block_subheader(offset)?;
        if tag != TAG_TILE {
            return Err(Error::FormatError(format!("directory entry for tile {} is not a tile block", tile_index)));
        }
        let stored_index = read_u32(&mut self.file)?;
        if stored_index as usize != tile_index {
            return Err(Error::FormatError(format!(
                "tile block index mismatch: directory says {}, block says {}",
                tile_index, stored_index
            )));
        }
        let payload_len = len_of_rest as usize - 4;
        let mut payload = read_vec(&mut self.file, payload_len)?;

        if self.spec.checksums_enabled {
            if payload.len() < 4 {
                return Err(Error::FormatError("tile payload too short for checksum trailer".to_string()));
            }
            let split = payload.len() - 4;
            let expected = u32::from_le_bytes(payload[split..].try_into().unwrap());
            let actual = crc32c::crc32c(&payload[..split]);
            if actual != expected {
                return Err(Error::ChecksumMismatch { tile_index });
            }
            payload.truncate(split);
        }
        Ok(Some(payload))
    }

    /// Writes tile `tile_index`'s encoded payload, relocating it if the
    /// previous block is too small (§4.11 `writeTile`: payload write
    /// happens before the directory entry is updated, so a crash mid-write
    /// never leaves a directory entry pointing at a half-written block).
    pub fn write_tile(&mut self, tile_index: usize, payload: &[u8]) -> Result<()> {
        if !self.writable {
            return Err(Error::InvalidArgument("tile store is not open for writing".to_string()));
        }
        let mut body = payload.to_vec();
        if self.spec.checksums_enabled {
            let crc = crc32c::crc32c(payload);
            body.extend_from_slice(&crc.to_le_bytes());
        }
        let needed_span = BLOCK_SUBHEADER_LEN + 4 + body.len() as u64;

        let old_raw = self.directory[tile_index];
        let offset = if old_raw != 0 {
            let old_offset = (old_raw as u64) * 8;
            let (old_tag, old_len_of_rest) = self.read_block_subheader(old_offset)?;
            if old_tag != TAG_TILE {
                return Err(Error::FormatError(format!("directory entry for tile {} is corrupt", tile_index)));
            }
            let old_span = BLOCK_SUBHEADER_LEN + old_len_of_rest as u64;
            if needed_span <= old_span && (old_span - needed_span == 0 || old_span - needed_span >= BLOCK_SUBHEADER_LEN) {
                let remainder = old_span - needed_span;
                if remainder > 0 {
                    self.write_tombstone(old_offset + needed_span, remainder)?;
                }
                old_offset
            } else {
                self.write_tombstone(old_offset, old_span)?;
                self.release(old_offset, old_span);
                self.allocate(needed_span, true)?
            }
        } else {
            self.allocate(needed_span, true)?
        };

        self.file.seek(SeekFrom::Start(offset))?;
        write_u8(&mut self.file, TAG_TILE)?;
        write_u32(&mut self.file, 4 + body.len() as u32)?;
        write_u32(&mut self.file, tile_index as u32)?;
        self.file.write_all(&body)?;

        // Payload is durable before the directory entry moves (§4.11, §5).
        debug_assert_eq!(offset % 8, 0);
        self.directory[tile_index] = (offset / 8) as u32;
        self.file.seek(SeekFrom::Start(self.tile_store_section_offset + (tile_index as u64) * 4))?;
        write_u32(&mut self.file, self.directory[tile_index])?;
        Ok(())
    }

    /// Appends a variable-length record (§4.13 `storeVariableLengthRecord`).
    pub fn store_vlr(&mut self, record: &VariableLengthRecord) -> Result<()> {
        if !self.writable {
            return Err(Error::InvalidArgument("tile store is not open for writing".to_string()));
        }
        let mut body = Vec::new();
        record.write_to(&mut body)?;
        let needed_span = BLOCK_SUBHEADER_LEN + body.len() as u64;
        let offset = self.allocate(needed_span, false)?;
        self.file.seek(SeekFrom::Start(offset))?;
        write_u8(&mut self.file, TAG_VLR)?;
        write_u32(&mut self.file, body.len() as u32)?;
        self.file.write_all(&body)?;
        if let Some(cache) = &mut self.vlr_cache {
            cache.push(record.clone());
        }
        Ok(())
    }

    /// Returns all stored VLRs, scanning the payload region on first
    /// access and caching the result (§3 "VLRs ... loaded lazily").
    pub fn variable_length_records(&mut self) -> Result<&[VariableLengthRecord]> {
        if self.vlr_cache.is_none() {
            let (_, vlrs) = self.scan_payload_region(false)?;
            self.vlr_cache = Some(vlrs);
        }
        Ok(self.vlr_cache.as_deref().unwrap())
    }

    /// Rebuilds the tile directory by walking every block in the payload
    /// region (§4.11 `scanFileForTiles`). Used when the sidecar index is
    /// absent or stale (§8 scenario F).
    pub fn scan_for_tiles(&mut self) -> Result<()> {
        let (directory, vlrs) = self.scan_payload_region(true)?;
        self.directory = directory;
        self.vlr_cache = Some(vlrs);
        if self.writable {
            self.file.seek(SeekFrom::Start(self.tile_store_section_offset))?;
            for entry in &self.directory {
                write_u32(&mut self.file, *entry)?;
            }
        }
        Ok(())
    }

    fn scan_payload_region(&mut self, rebuild_directory: bool) -> Result<(Vec<u32>, Vec<VariableLengthRecord>)> {
        let n_tiles = self.directory.len();
        let mut directory = if rebuild_directory { vec![0u32; n_tiles] } else { Vec::new() };
        let mut vlrs = Vec::new();

        let file_len = self.file.seek(SeekFrom::End(0))?;
        let mut pos = self.payload_region_start();
        while pos + BLOCK_SUBHEADER_LEN <= file_len {
            self.file.seek(SeekFrom::Start(pos))?;
            let tag = read_u8(&mut self.file)?;
            let len_of_rest = read_u32(&mut self.file)? as u64;
            if pos + BLOCK_SUBHEADER_LEN + len_of_rest > file_len {
                return Err(Error::FormatError("tile store payload region is truncated".to_string()));
            }
            match tag {
                TAG_FREE => {}
                TAG_TILE => {
                    if rebuild_directory {
                        let tile_index = read_u32(&mut self.file)? as usize;
                        if tile_index < n_tiles {
                            directory[tile_index] = (pos / 8) as u32;
                        }
                    }
                }
                TAG_VLR => {
                    let body = read_vec(&mut self.file, len_of_rest as usize)?;
                    vlrs.push(VariableLengthRecord::read_from(&body)?);
                }
                other => return Err(Error::FormatError(format!("unrecognized block tag {} at offset {}", other, pos))),
            }
            pos += BLOCK_SUBHEADER_LEN + len_of_rest;
        }
        Ok((directory, vlrs))
    }

    /// Flushes dirty OS buffers and stamps the modification time (§4.13
    /// `flush`). Does not clear "opened for writing" — that happens only
    /// on `close`.
    pub fn flush(&mut self) -> Result<()> {
        if !self.writable {
            return Ok(());
        }
        self.time_last_modified_ms = now_epoch_ms();
        self.file.seek(SeekFrom::Start(16))?;
        write_i64(&mut self.file, self.time_last_modified_ms)?;
        self.file.flush()?;
        Ok(())
    }

    /// Clears the "opened for writing" timestamp (§4.13 `close`,
    /// §4.15 the `OpenWrite -> Closed` transition).
    pub fn clear_opened_for_writing(&mut self) -> Result<()> {
        if !self.writable {
            return Ok(());
        }
        self.time_opened_for_writing_ms = 0;
        self.file.seek(SeekFrom::Start(24))?;
        write_i64(&mut self.file, 0)?;
        self.file.flush()?;
        Ok(())
    }

    /// Writes the `.gvrx` sidecar index (§4.11, §6).
    pub fn write_index_file(&self, path: &Path) -> Result<()> {
        let mut f = File::create(path)?;
        f.write_all(&MAGIC_INDEX)?;
        write_u8(&mut f, self.spec.version_major)?;
        write_u8(&mut f, self.spec.version_minor)?;
        write_u32(&mut f, 0)?; // reserved
        write_i64(&mut f, self.time_last_modified_ms)?;
        f.write_all(self.spec.uuid.as_bytes())?;
        write_u32(&mut f, self.directory.len() as u32)?;
        for entry in &self.directory {
            write_u32(&mut f, *entry)?;
        }
        f.flush()?;
        Ok(())
    }

    /// Loads the `.gvrx` sidecar index if present and valid, replacing
    /// the in-memory directory on success (§4.11 `readTilePositionsFromIndexFile`,
    /// §3 "Index file is valid only when ..."). Returns `false` without
    /// error when the index is missing, stale, or malformed — the
    /// caller falls back to [`TileStore::scan_for_tiles`].
    pub fn try_load_index_file(&mut self, path: &Path) -> Result<bool> {
        let mut f = match File::open(path) {
            Ok(f) => f,
            Err(_) => return Ok(false),
        };
        let mut magic = [0u8; 12];
        if f.read_exact(&mut magic).is_err() || magic != MAGIC_INDEX {
            return Ok(false);
        }
        let _major = read_u8(&mut f)?;
        let _minor = read_u8(&mut f)?;
        let _reserved = read_u32(&mut f)?;
        let time_last_modified_ms = read_i64(&mut f)?;
        let uuid_bytes = read_vec(&mut f, 16)?;
        let uuid = match Uuid::from_slice(&uuid_bytes) {
            Ok(u) => u,
            Err(_) => return Ok(false),
        };
        if time_last_modified_ms != self.time_last_modified_ms || uuid != self.spec.uuid {
            return Ok(false);
        }
        let n_tiles = read_u32(&mut f)? as usize;
        if n_tiles != self.directory.len() {
            return Ok(false);
        }
        let mut directory = Vec::with_capacity(n_tiles);
        for _ in 0..n_tiles {
            directory.push(read_u32(&mut f)?);
        }
        self.directory = directory;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::GvrsFileSpecBuilder;
    use crate::types::{ElementSpec, ElementType};
    use tempfile::NamedTempFile;

    fn sample_spec() -> GvrsFileSpec {
        GvrsFileSpecBuilder::new(20, 20, 5, 5)
            .add_element(ElementSpec::new("z", ElementType::Integer))
            .build()
            .unwrap()
    }

    #[test]
    fn test_create_and_reopen() {
        let tmp = NamedTempFile::new().unwrap();
        let spec = sample_spec();
        let uuid = spec.uuid;
        {
            let file = File::options().read(true).write(true).open(tmp.path()).unwrap();
            let mut store = TileStore::create(file, spec).unwrap();
            assert_eq!(store.uuid(), uuid);
            store.clear_opened_for_writing().unwrap();
        }
        let file = File::options().read(true).write(true).open(tmp.path()).unwrap();
        let store = TileStore::open(file, false).unwrap();
        assert_eq!(store.uuid(), uuid);
        assert_eq!(store.spec.layout.n_tiles(), 16);
    }

    #[test]
    fn test_tile_write_read_round_trip() {
        let tmp = NamedTempFile::new().unwrap();
        let file = File::options().read(true).write(true).open(tmp.path()).unwrap();
        let mut store = TileStore::create(file, sample_spec()).unwrap();

        assert!(store.read_tile(0).unwrap().is_none());
        store.write_tile(0, &[1, 2, 3, 4, 5]).unwrap();
        assert_eq!(store.read_tile(0).unwrap(), Some(vec![1, 2, 3, 4, 5]));

        store.write_tile(0, &[9, 9]).unwrap();
        assert_eq!(store.read_tile(0).unwrap(), Some(vec![9, 9]));

        store.write_tile(0, &[1; 100]).unwrap();
        assert_eq!(store.read_tile(0).unwrap(), Some(vec![1; 100]));
    }

    #[test]
    fn test_checksum_mismatch_detected() {
        let tmp = NamedTempFile::new().unwrap();
        let mut spec = sample_spec();
        spec.checksums_enabled = true;
        let file = File::options().read(true).write(true).open(tmp.path()).unwrap();
        let mut store = TileStore::create(file, spec).unwrap();
        store.write_tile(2, &[7, 7, 7]).unwrap();

        let offset = (store.directory[2] as u64) * 8 + BLOCK_SUBHEADER_LEN + 4;
        store.file.seek(SeekFrom::Start(offset)).unwrap();
        store.file.write_all(&[0xFF]).unwrap();

        let err = store.read_tile(2).unwrap_err();
        assert!(matches!(err, Error::ChecksumMismatch { tile_index: 2 }));
    }

    #[test]
    fn test_vlr_round_trip() {
        let tmp = NamedTempFile::new().unwrap();
        let file = File::options().read(true).write(true).open(tmp.path()).unwrap();
        let mut store = TileStore::create(file, sample_spec()).unwrap();

        let record = VariableLengthRecord::new("App", 7, b"payload".to_vec()).unwrap();
        store.store_vlr(&record).unwrap();

        let records = store.variable_length_records().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0], record);
    }

    #[test]
    fn test_scan_for_tiles_rebuilds_directory() {
        let tmp = NamedTempFile::new().unwrap();
        let file = File::options().read(true).write(true).open(tmp.path()).unwrap();
        let mut store = TileStore::create(file, sample_spec()).unwrap();
        store.write_tile(0, &[1, 2, 3]).unwrap();
        store.write_tile(5, &[4, 5, 6, 7]).unwrap();
        store.write_tile(0, &[9, 9, 9, 9, 9, 9]).unwrap();

        let expected_directory = store.directory.clone();
        store.directory = vec![0u32; store.directory.len()];
        store.scan_for_tiles().unwrap();
        assert_eq!(store.directory, expected_directory);
        assert_eq!(store.read_tile(0).unwrap(), Some(vec![9, 9, 9, 9, 9, 9]));
        assert_eq!(store.read_tile(5).unwrap(), Some(vec![4, 5, 6, 7]));
    }

    #[test]
    fn test_relocated_tile_reusing_lower_freed_block_is_not_shadowed_by_stale_copy() {
        // Reproduces the scenario where a relocating `write_tile` reuses a
        // lower-offset block freed by an earlier relocation. Unless the
        // block being vacated is tombstoned on disk before it is handed to
        // `release`, its stale `TAG_TILE` + old tile_index survives at a
        // *higher* offset than the relocated tile's new (lower, reused)
        // block, and `scan_payload_region`'s last-offset-wins rule picks
        // the stale copy back up.
        let tmp = NamedTempFile::new().unwrap();
        let file = File::options().read(true).write(true).open(tmp.path()).unwrap();
        let mut store = TileStore::create(file, sample_spec()).unwrap();

        store.write_tile(0, &[1u8; 20]).unwrap();
        store.write_tile(1, &[2u8; 4]).unwrap();

        // Grows tile 0 past its current block, relocating it and freeing
        // its original (low-offset) block.
        let tile0_v2 = vec![3u8; 40];
        store.write_tile(0, &tile0_v2).unwrap();

        // Grows tile 1 past its current (middle-offset) block. First-fit
        // reuses the low-offset block tile 0 just freed, so tile 1 ends up
        // at a *lower* offset than its own stale previous copy.
        let tile1_v2 = vec![4u8; 20];
        store.write_tile(1, &tile1_v2).unwrap();

        let expected_directory = store.directory.clone();
        store.directory = vec![0u32; store.directory.len()];
        store.scan_for_tiles().unwrap();

        assert_eq!(store.directory, expected_directory);
        assert_eq!(store.read_tile(0).unwrap(), Some(tile0_v2));
        assert_eq!(store.read_tile(1).unwrap(), Some(tile1_v2));
    }

    #[test]
    fn test_index_file_round_trip_and_rejects_stale() {
        let tmp = NamedTempFile::new().unwrap();
        let index_path = tmp.path().with_extension("gvrx");
        let file = File::options().read(true).write(true).open(tmp.path()).unwrap();
        let mut store = TileStore::create(file, sample_spec()).unwrap();
        store.write_tile(3, &[1, 2]).unwrap();
        store.write_index_file(&index_path).unwrap();
        store.clear_opened_for_writing().unwrap();

        let mut reopened = {
            let file = File::options().read(true).write(true).open(tmp.path()).unwrap();
            TileStore::open(file, false).unwrap()
        };
        assert!(reopened.try_load_index_file(&index_path).unwrap());
        assert_eq!(reopened.directory[3], store.directory[3]);

        reopened.time_last_modified_ms += 1;
        assert!(!reopened.try_load_index_file(&index_path).unwrap());

        let _ = std::fs::remove_file(&index_path);
    }
}
