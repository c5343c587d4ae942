//! File specification (§3 "File specification (spec)"): the immutable
//! descriptor of grid shape, tile shape, element types, registered codec
//! names, optional coordinate mapping, and identity (UUID, version) that
//! is fixed the moment a `.gvrs` file is created.
//!
//! Serialization here is this repository's own design — the distilled
//! spec names the fields a "serialized spec" record must carry but not
//! its exact byte layout (see `DESIGN.md`). The wire format below is a
//! flat, versioned record: grid/tile shape, an element table, and the
//! identity fields, written with the same little-endian primitives the
//! rest of the file format uses (§6).

use uuid::Uuid;

use crate::error::{Error, Result};
use crate::io::primitives::{
    read_f64, read_fixed_ascii, read_u32, read_u8, read_vec, write_f64, write_fixed_ascii,
    write_u32, write_u8,
};
use crate::types::{ElementSpec, ElementType, GridLayout};

/// Major version of the on-disk format this crate writes and reads.
/// §3: "version (major=1, minor)"; a reader rejects a data file whose
/// major version it does not recognize (§4.15 "Fatal if ...").
pub const FORMAT_MAJOR_VERSION: u8 = 1;
/// Minor version bumped for backward-compatible additions (currently none).
pub const FORMAT_MINOR_VERSION: u8 = 0;

const ELEMENT_NAME_WIDTH: usize = 32;

fn element_type_code(t: ElementType) -> u8 {
    match t {
        ElementType::Integer => 0,
        ElementType::Short => 1,
        ElementType::Float => 2,
        ElementType::IntegerCodedFloat => 3,
    }
}

fn element_type_from_code(code: u8) -> Result<ElementType> {
    match code {
        0 => Ok(ElementType::Integer),
        1 => Ok(ElementType::Short),
        2 => Ok(ElementType::Float),
        3 => Ok(ElementType::IntegerCodedFloat),
        other => Err(Error::FormatError(format!("unknown element type code {}", other))),
    }
}

/// Narrow contract for user-coordinate <-> grid-cell mapping (§6). No
/// geographic or Cartesian implementation ships in this crate (§1
/// explicitly excludes that); `IdentityMapper` exists only so the spec's
/// storage slot has a concrete value to exercise in tests.
pub trait CoordinateMapper: Send + Sync {
    fn map_user_to_grid(&self, x: f64, y: f64) -> (f64, f64);
    fn map_grid_to_user(&self, row: f64, col: f64) -> (f64, f64);
}

/// `(x, y) == (col, row)`, unchanged. Placeholder only.
pub struct IdentityMapper;

impl CoordinateMapper for IdentityMapper {
    fn map_user_to_grid(&self, x: f64, y: f64) -> (f64, f64) {
        (y, x)
    }

    fn map_grid_to_user(&self, row: f64, col: f64) -> (f64, f64) {
        (col, row)
    }
}

/// Immutable descriptor of one `.gvrs` file's shape and identity (§3).
/// Constructed once via [`GvrsFileSpecBuilder`] at file creation and
/// re-derived from the serialized record on every subsequent open.
pub struct GvrsFileSpec {
    pub layout: GridLayout,
    pub elements: Vec<ElementSpec>,
    pub checksums_enabled: bool,
    pub uuid: Uuid,
    pub version_major: u8,
    pub version_minor: u8,
    pub coordinate_mapper: Option<Box<dyn CoordinateMapper>>,
}

impl GvrsFileSpec {
    pub fn element_index(&self, name: &str) -> Option<usize> {
        self.elements.iter().position(|e| e.name == name)
    }

    /// Byte size of one fully-populated tile's payload across all
    /// elements, uncompressed. Used to size initial write buffers.
    pub fn tile_cell_count(&self) -> usize {
        (self.layout.tile_rows as usize) * (self.layout.tile_cols as usize)
    }

    /// Serializes the grid/tile shape, element table, checksum flag,
    /// UUID, and version into the flat record this module reads back
    /// with [`GvrsFileSpec::read_from`].
    pub fn write_to(&self, out: &mut Vec<u8>) -> Result<()> {
        write_u32(out, self.layout.n_rows)?;
        write_u32(out, self.layout.n_cols)?;
        write_u32(out, self.layout.tile_rows)?;
        write_u32(out, self.layout.tile_cols)?;
        if self.elements.len() > u8::MAX as usize {
            return Err(Error::InvalidArgument("too many elements for spec record".to_string()));
        }
        write_u8(out, self.elements.len() as u8)?;
        for element in &self.elements {
            write_fixed_ascii(out, &element.name, ELEMENT_NAME_WIDTH)?;
            write_u8(out, element_type_code(element.element_type))?;
            write_f64(out, element.scale)?;
            write_f64(out, element.offset)?;
        }
        write_u8(out, u8::from(self.checksums_enabled))?;
        out.extend_from_slice(self.uuid.as_bytes());
        write_u8(out, self.version_major)?;
        write_u8(out, self.version_minor)?;
        Ok(())
    }

    /// Inverse of [`write_to`](Self::write_to). `coordinate_mapper` is
    /// never persisted (§6: it is an external, programmatic contract),
    /// so a file reopened through this path always carries `None`.
    pub fn read_from(data: &[u8]) -> Result<Self> {
        let mut cursor = std::io::Cursor::new(data);
        let n_rows = read_u32(&mut cursor)?;
        let n_cols = read_u32(&mut cursor)?;
        let tile_rows = read_u32(&mut cursor)?;
        let tile_cols = read_u32(&mut cursor)?;
        let n_elements = read_u8(&mut cursor)?;
        let mut elements = Vec::with_capacity(n_elements as usize);
        for _ in 0..n_elements {
            let name = read_fixed_ascii(&mut cursor, ELEMENT_NAME_WIDTH)?;
            let element_type = element_type_from_code(read_u8(&mut cursor)?)?;
            let scale = read_f64(&mut cursor)?;
            let offset = read_f64(&mut cursor)?;
            elements.push(ElementSpec::new(name, element_type).with_scale_offset(scale, offset));
        }
        let checksums_enabled = read_u8(&mut cursor)? != 0;
        let uuid_bytes = read_vec(&mut cursor, 16)?;
        let uuid = Uuid::from_slice(&uuid_bytes)
            .map_err(|e| Error::FormatError(format!("malformed spec UUID: {}", e)))?;
        let version_major = read_u8(&mut cursor)?;
        let version_minor = read_u8(&mut cursor)?;
        Ok(Self {
            layout: GridLayout::new(n_rows, n_cols, tile_rows, tile_cols),
            elements,
            checksums_enabled,
            uuid,
            version_major,
            version_minor,
            coordinate_mapper: None,
        })
    }
}

/// Builds a new [`GvrsFileSpec`] for `GvrsFile::create` (§4.13).
pub struct GvrsFileSpecBuilder {
    layout: GridLayout,
    elements: Vec<ElementSpec>,
    checksums_enabled: bool,
    coordinate_mapper: Option<Box<dyn CoordinateMapper>>,
}

impl GvrsFileSpecBuilder {
    pub fn new(n_rows: u32, n_cols: u32, tile_rows: u32, tile_cols: u32) -> Self {
        Self {
            layout: GridLayout::new(n_rows, n_cols, tile_rows, tile_cols),
            elements: Vec::new(),
            checksums_enabled: false,
            coordinate_mapper: None,
        }
    }

    pub fn add_element(mut self, element: ElementSpec) -> Self {
        self.elements.push(element);
        self
    }

    pub fn with_checksums(mut self, enabled: bool) -> Self {
        self.checksums_enabled = enabled;
        self
    }

    pub fn with_coordinate_mapper(mut self, mapper: Box<dyn CoordinateMapper>) -> Self {
        self.coordinate_mapper = Some(mapper);
        self
    }

    pub fn build(self) -> Result<GvrsFileSpec> {
        if self.layout.tile_rows == 0 || self.layout.tile_cols == 0 {
            return Err(Error::InvalidArgument("tile shape must be non-zero".to_string()));
        }
        if self.layout.n_rows == 0 || self.layout.n_cols == 0 {
            return Err(Error::InvalidArgument("grid shape must be non-zero".to_string()));
        }
        if self.elements.is_empty() {
            return Err(Error::InvalidArgument("spec must declare at least one element".to_string()));
        }
        Ok(GvrsFileSpec {
            layout: self.layout,
            elements: self.elements,
            checksums_enabled: self.checksums_enabled,
            uuid: Uuid::new_v4(),
            version_major: FORMAT_MAJOR_VERSION,
            version_minor: FORMAT_MINOR_VERSION,
            coordinate_mapper: self.coordinate_mapper,
        })
    }
}
