//! Entropy back-ends used by the compression codecs (§4.3): canonical
//! Huffman coding with a serialized prefix tree, and Deflate via `flate2`.
//! Neither back-end knows about rasters or predictors; they operate on
//! plain byte streams handed to them by [`crate::codecs`].

pub mod deflate;
pub mod huffman;
