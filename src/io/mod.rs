//! I/O utilities for gvrs
//!
//! Provides core binary-primitive helpers used by the tile store, spec
//! serializer, and VLR reader/writer.

pub mod primitives;
pub mod traits;

pub use traits::SeekableReader;
