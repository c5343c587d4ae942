//! gvrs - a tiled storage engine for very large raster grids.
//!
//! A `.gvrs` file holds one or more rectangular grids of numeric
//! elements, partitioned into fixed-size tiles that are compressed
//! independently and decompressed on demand through a small, bounded
//! LRU cache. Metadata travels alongside the grid as variable-length
//! records, and a `.gvrx` sidecar index lets a reader skip a full file
//! scan on open.
//!
//! # Examples
//!
//! ```no_run
//! use gvrs::{GvrsFile, GvrsFileSpecBuilder, TileCacheSize};
//! use gvrs::types::{ElementSpec, ElementType, ElementValue};
//! use std::path::Path;
//!
//! let spec = GvrsFileSpecBuilder::new(1000, 1000, 100, 100)
//!     .add_element(ElementSpec::new("elevation", ElementType::Float))
//!     .build()?;
//!
//! let mut file = GvrsFile::create(Path::new("terrain.gvrs"), spec, TileCacheSize::Medium)?;
//! file.write_value(500, 500, 0, ElementValue::Float(123.4))?;
//! file.close()?;
//! # Ok::<(), gvrs::Error>(())
//! ```

pub mod bitstream;
pub mod cache;
pub mod codecs;
pub mod entropy;
pub mod error;
pub mod file;
pub mod io;
pub mod m32;
pub mod pool;
pub mod predictors;
pub mod spec;
pub mod store;
pub mod tile;
pub mod types;
pub mod vlr;

pub use cache::{TileCache, TileCacheSize};
pub use codecs::{Codec, CodecMaster};
pub use error::{Error, Result};
pub use file::GvrsFile;
pub use pool::DecodePool;
pub use spec::{CoordinateMapper, GvrsFileSpec, GvrsFileSpecBuilder, IdentityMapper};
pub use store::TileStore;
pub use types::{ElementSpec, ElementType, ElementValue, GridLayout};
pub use vlr::VariableLengthRecord;
