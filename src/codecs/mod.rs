//! Codec registry (§4.9): an ordered, file-scoped list of installed
//! codecs. A tile encode tries every codec applicable to the element's
//! backing representation (integer lattice or raw float) and keeps
//! whichever produced the smallest packing; the first byte of every
//! packing is the codec's position in the registry, which `decode`
//! dispatches on.

pub mod float_codec;
pub mod gvrs_deflate;
pub mod gvrs_huffman;
pub mod lsop;

use crate::error::{Error, Result};

/// Reserved packing-index sentinel for the uncompressed fallback (§7,
/// §9 "treat 255 as the hard maximum to leave a reserved sentinel").
pub const RAW_CODEC_INDEX: u8 = 255;

/// A predictor-plus-entropy-backend pair, or the float bit-plane codec.
/// Mirrors the narrow four-operation interface described in §9: encode,
/// decode, and the two applicability predicates.
pub trait Codec: Send + Sync {
    fn name(&self) -> &'static str;

    fn implements_integer_encoding(&self) -> bool {
        false
    }

    fn implements_floating_point_encoding(&self) -> bool {
        false
    }

    /// Returns `None` if this codec is inapplicable or fails to compress
    /// (§7 `CompressionError` — "a back-end returns a non-positive
    /// length"); `codec_index` is written into the packing's first byte.
    fn encode_integer(&self, _codec_index: u8, _n_rows: usize, _n_cols: usize, _values: &[i32]) -> Option<Vec<u8>> {
        None
    }

    fn decode_integer(&self, _n_rows: usize, _n_cols: usize, _packing: &[u8]) -> Result<Vec<i32>> {
        Err(Error::FormatError(format!("{} does not implement integer decoding", self.name())))
    }

    fn encode_float(&self, _codec_index: u8, _n_rows: usize, _n_cols: usize, _values: &[f32]) -> Option<Vec<u8>> {
        None
    }

    fn decode_float(&self, _n_rows: usize, _n_cols: usize, _packing: &[u8]) -> Result<Vec<f32>> {
        Err(Error::FormatError(format!("{} does not implement floating-point decoding", self.name())))
    }
}

/// The file-scoped ordered codec list (§4.9). Serialized into the
/// `GvrsCompressionCodecs` VLR by [`crate::vlr`] so a reader can
/// reconstruct the same registry before it attempts to decode any tile.
pub struct CodecMaster {
    codecs: Vec<Box<dyn Codec>>,
}

impl CodecMaster {
    pub fn new(codecs: Vec<Box<dyn Codec>>) -> Result<Self> {
        if codecs.len() >= RAW_CODEC_INDEX as usize {
            return Err(Error::InvalidArgument(format!(
                "codec registry may hold at most {} entries",
                RAW_CODEC_INDEX
            )));
        }
        Ok(Self { codecs })
    }

    /// The registry installed by [`crate::file::GvrsFile::create`]: both
    /// integer back-ends, both Optimal-predictor variants, and the float
    /// codec, in a fixed order so packing indices are stable across a
    /// file's lifetime.
    pub fn standard() -> Self {
        let codecs: Vec<Box<dyn Codec>> = vec![
            Box::new(gvrs_deflate::GvrsDeflate),
            Box::new(gvrs_huffman::GvrsHuffman),
            Box::new(lsop::Lsop::new(crate::predictors::optimal::OptimalVariant::Eight)),
            Box::new(lsop::Lsop::new(crate::predictors::optimal::OptimalVariant::Twelve)),
            Box::new(float_codec::FloatCodec),
        ];
        Self::new(codecs).expect("standard registry is within the 255-codec limit")
    }

    pub fn codec_names(&self) -> Vec<&'static str> {
        self.codecs.iter().map(|c| c.name()).collect()
    }

    /// Rebuilds a registry from the codec names recorded in the
    /// `GvrsCompressionCodecs` VLR, preserving their original order so
    /// packing indices written by an earlier session still resolve.
    pub fn from_names(names: &[String]) -> Result<Self> {
        let mut codecs: Vec<Box<dyn Codec>> = Vec::with_capacity(names.len());
        for name in names {
            codecs.push(match name.as_str() {
                "GvrsDeflate" => Box::new(gvrs_deflate::GvrsDeflate) as Box<dyn Codec>,
                "GvrsHuffman" => Box::new(gvrs_huffman::GvrsHuffman) as Box<dyn Codec>,
                "GvrsLsop8" => Box::new(lsop::Lsop::new(crate::predictors::optimal::OptimalVariant::Eight)),
                "GvrsLsop12" => Box::new(lsop::Lsop::new(crate::predictors::optimal::OptimalVariant::Twelve)),
                "GvrsFloat" => Box::new(float_codec::FloatCodec),
                other => return Err(Error::FormatError(format!("unknown codec id {:?}", other))),
            });
        }
        Self::new(codecs)
    }

    pub fn encode_integer_tile(&self, n_rows: usize, n_cols: usize, values: &[i32]) -> Vec<u8> {
        let mut best: Option<Vec<u8>> = None;
        for (idx, codec) in self.codecs.iter().enumerate() {
            if !codec.implements_integer_encoding() {
                continue;
            }
            if let Some(packing) = codec.encode_integer(idx as u8, n_rows, n_cols, values) {
                if best.as_ref().map_or(true, |b| packing.len() < b.len()) {
                    best = Some(packing);
                }
            }
        }
        best.unwrap_or_else(|| raw_encode(values))
    }

    pub fn decode_integer_tile(&self, n_rows: usize, n_cols: usize, packing: &[u8]) -> Result<Vec<i32>> {
        let idx = *packing
            .first()
            .ok_or_else(|| Error::FormatError("empty tile packing".to_string()))?;
        if idx == RAW_CODEC_INDEX {
            return raw_decode(n_rows * n_cols, &packing[1..]);
        }
        let codec = self
            .codecs
            .get(idx as usize)
            .ok_or_else(|| Error::FormatError(format!("unknown codec index {}", idx)))?;
        codec.decode_integer(n_rows, n_cols, packing)
    }

    pub fn encode_float_tile(&self, n_rows: usize, n_cols: usize, values: &[f32]) -> Vec<u8> {
        let mut best: Option<Vec<u8>> = None;
        for (idx, codec) in self.codecs.iter().enumerate() {
            if !codec.implements_floating_point_encoding() {
                continue;
            }
            if let Some(packing) = codec.encode_float(idx as u8, n_rows, n_cols, values) {
                if best.as_ref().map_or(true, |b| packing.len() < b.len()) {
                    best = Some(packing);
                }
            }
        }
        best.unwrap_or_else(|| raw_encode_float(values))
    }

    pub fn decode_float_tile(&self, n_rows: usize, n_cols: usize, packing: &[u8]) -> Result<Vec<f32>> {
        let idx = *packing
            .first()
            .ok_or_else(|| Error::FormatError("empty tile packing".to_string()))?;
        if idx == RAW_CODEC_INDEX {
            return raw_decode_float(n_rows * n_cols, &packing[1..]);
        }
        let codec = self
            .codecs
            .get(idx as usize)
            .ok_or_else(|| Error::FormatError(format!("unknown codec index {}", idx)))?;
        codec.decode_float(n_rows, n_cols, packing)
    }
}

fn raw_encode(values: &[i32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(1 + values.len() * 4);
    out.push(RAW_CODEC_INDEX);
    for &v in values {
        out.extend_from_slice(&v.to_le_bytes());
    }
    out
}

fn raw_decode(n_values: usize, body: &[u8]) -> Result<Vec<i32>> {
    if body.len() != n_values * 4 {
        return Err(Error::FormatError("truncated raw integer packing".to_string()));
    }
    Ok(body.chunks_exact(4).map(|c| i32::from_le_bytes(c.try_into().unwrap())).collect())
}

fn raw_encode_float(values: &[f32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(1 + values.len() * 4);
    out.push(RAW_CODEC_INDEX);
    for &v in values {
        out.extend_from_slice(&v.to_bits().to_le_bytes());
    }
    out
}

fn raw_decode_float(n_values: usize, body: &[u8]) -> Result<Vec<f32>> {
    if body.len() != n_values * 4 {
        return Err(Error::FormatError("truncated raw float packing".to_string()));
    }
    Ok(body
        .chunks_exact(4)
        .map(|c| f32::from_bits(u32::from_le_bytes(c.try_into().unwrap())))
        .collect())
}
