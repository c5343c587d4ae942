//! Core data types for gvrs: element types, null sentinels, and the
//! row/column addressing used throughout the tile store.

/// Sentinel written for an unpopulated or explicitly nulled `INTEGER` cell.
pub const INT_NULL: i32 = i32::MIN;

/// Sentinel written for an unpopulated or explicitly nulled `SHORT` cell.
pub const SHORT_NULL: i16 = i16::MIN;

/// The element type backing one array within a tile.
///
/// `IntegerCodedFloat` is stored as `i32` on disk but presented to callers
/// as `f32` via the element's `scale`/`offset` (see [`ElementSpec`]);
/// `INT_NULL` round-trips to `NaN` and vice versa.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementType {
    /// 32-bit signed integer, null sentinel `INT_NULL` (`i32::MIN`).
    Integer,
    /// 16-bit signed integer, null sentinel `SHORT_NULL` (`i16::MIN`).
    Short,
    /// IEEE-754 single precision float, null sentinel `NaN`.
    Float,
    /// `i32` storage presented as `f32` through a scale/offset transform.
    IntegerCodedFloat,
}

impl ElementType {
    /// Size in bytes of one stored element.
    pub fn storage_size(&self) -> usize {
        match self {
            ElementType::Short => 2,
            ElementType::Integer | ElementType::Float | ElementType::IntegerCodedFloat => 4,
        }
    }

    /// Whether this element type's on-disk representation is a 32-bit
    /// integer lattice (as opposed to raw IEEE-754 float bits). Predictor
    /// models and the integer codecs operate on this representation;
    /// `IntegerCodedFloat` counts as integer-backed.
    pub fn is_integer_backed(&self) -> bool {
        !matches!(self, ElementType::Float)
    }

    pub fn name(&self) -> &'static str {
        match self {
            ElementType::Integer => "INTEGER",
            ElementType::Short => "SHORT",
            ElementType::Float => "FLOAT",
            ElementType::IntegerCodedFloat => "INTEGER_CODED_FLOAT",
        }
    }
}

/// Descriptor for one element within a tile, as carried in the immutable
/// file spec (§3 "element descriptors (name, type, scale, offset)").
#[derive(Debug, Clone)]
pub struct ElementSpec {
    pub name: String,
    pub element_type: ElementType,
    /// Used only by `IntegerCodedFloat`: `value = intValue / scale + offset`.
    pub scale: f64,
    pub offset: f64,
}

impl ElementSpec {
    pub fn new(name: impl Into<String>, element_type: ElementType) -> Self {
        Self {
            name: name.into(),
            element_type,
            scale: 1.0,
            offset: 0.0,
        }
    }

    pub fn with_scale_offset(mut self, scale: f64, offset: f64) -> Self {
        self.scale = scale;
        self.offset = offset;
        self
    }

    /// Converts a raw stored `i32` to its presented `f32` value for an
    /// `IntegerCodedFloat` element, mapping `INT_NULL` to `NaN`.
    pub fn int_to_float(&self, raw: i32) -> f32 {
        if raw == INT_NULL {
            return f32::NAN;
        }
        ((raw as f64) / self.scale + self.offset) as f32
    }

    /// Converts a presented `f32` value back to its raw stored `i32` for
    /// an `IntegerCodedFloat` element, mapping `NaN` to `INT_NULL`.
    pub fn float_to_int(&self, value: f32) -> i32 {
        if value.is_nan() {
            return INT_NULL;
        }
        (((value as f64) - self.offset) * self.scale).round() as i32
    }
}

/// A single cell value as it crosses the tile/façade boundary.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ElementValue {
    Integer(i32),
    Short(i16),
    Float(f32),
}

impl ElementValue {
    /// The null sentinel value for `element_type`.
    pub fn null_for(element_type: ElementType) -> Self {
        match element_type {
            ElementType::Integer | ElementType::IntegerCodedFloat => ElementValue::Integer(INT_NULL),
            ElementType::Short => ElementValue::Short(SHORT_NULL),
            ElementType::Float => ElementValue::Float(f32::NAN),
        }
    }

    pub fn is_null(&self) -> bool {
        match self {
            ElementValue::Integer(v) => *v == INT_NULL,
            ElementValue::Short(v) => *v == SHORT_NULL,
            ElementValue::Float(v) => v.is_nan(),
        }
    }
}

/// The shape of a grid partitioned into a tile grid, and the coordinate
/// math mapping `(row, col)` into `(tile index, row-in-tile, col-in-tile)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridLayout {
    pub n_rows: u32,
    pub n_cols: u32,
    pub tile_rows: u32,
    pub tile_cols: u32,
}

impl GridLayout {
    pub fn new(n_rows: u32, n_cols: u32, tile_rows: u32, tile_cols: u32) -> Self {
        Self {
            n_rows,
            n_cols,
            tile_rows,
            tile_cols,
        }
    }

    /// Number of tile-rows in the tile grid: `ceil(R / tr)`.
    pub fn n_tile_rows(&self) -> u32 {
        self.n_rows.div_ceil(self.tile_rows)
    }

    /// Number of tile-columns in the tile grid: `ceil(C / tc)`.
    pub fn n_tile_cols(&self) -> u32 {
        self.n_cols.div_ceil(self.tile_cols)
    }

    /// Total number of tiles: `TR * TC`.
    pub fn n_tiles(&self) -> usize {
        (self.n_tile_rows() as usize) * (self.n_tile_cols() as usize)
    }

    /// `tileIndex = tileRow*TC + tileCol`.
    pub fn tile_index(&self, tile_row: u32, tile_col: u32) -> usize {
        (tile_row as usize) * (self.n_tile_cols() as usize) + (tile_col as usize)
    }

    /// Inverse of [`tile_index`](Self::tile_index).
    pub fn tile_row_col(&self, tile_index: usize) -> (u32, u32) {
        let tc = self.n_tile_cols() as usize;
        ((tile_index / tc) as u32, (tile_index % tc) as u32)
    }

    /// Maps a grid cell to `(tile_index, row_in_tile, col_in_tile)`.
    pub fn cell_to_tile(&self, row: u32, col: u32) -> (usize, u32, u32) {
        let tile_row = row / self.tile_rows;
        let tile_col = col / self.tile_cols;
        let row_in_tile = row % self.tile_rows;
        let col_in_tile = col % self.tile_cols;
        (self.tile_index(tile_row, tile_col), row_in_tile, col_in_tile)
    }

    pub fn in_bounds(&self, row: u32, col: u32) -> bool {
        row < self.n_rows && col < self.n_cols
    }
}
