//! Gridfour-Deflate integer codec (§4.5): runs every applicable simple
//! predictor, M32-encodes the residual stream, Deflates it, and keeps the
//! smallest result across predictors.

use super::Codec;
use crate::entropy::deflate;
use crate::error::Error;
use crate::m32::M32Writer;
use crate::predictors::differencing::{Differencing, DifferencingWithNulls};
use crate::predictors::linear::Linear;
use crate::predictors::triangle::Triangle;
use crate::predictors::{tile_has_nulls, PredictorCode, SimplePredictor};

/// 10-byte header (§4.4): codec index, predictor code, seed, nM32Bytes.
const HEADER_LEN: usize = 10;

pub struct GvrsDeflate;

fn applicable_predictors(has_nulls: bool) -> Vec<Box<dyn SimplePredictor>> {
    let mut predictors: Vec<Box<dyn SimplePredictor>> = Vec::new();
    if has_nulls {
        predictors.push(Box::new(DifferencingWithNulls));
    } else {
        predictors.push(Box::new(Differencing));
        predictors.push(Box::new(Triangle));
        predictors.push(Box::new(Linear));
    }
    predictors
}

fn pack(codec_index: u8, predictor_code: PredictorCode, seed: i32, residuals: &[i32]) -> Option<Vec<u8>> {
    let mut m32 = Vec::with_capacity(residuals.len() * 2);
    {
        let mut w = M32Writer::new(&mut m32);
        for &r in residuals {
            w.encode(r);
        }
    }
    let compressed = deflate::compress(&m32).ok()?;

    let mut out = Vec::with_capacity(HEADER_LEN + compressed.len());
    out.push(codec_index);
    out.push(predictor_code as u8);
    out.extend_from_slice(&seed.to_le_bytes());
    out.extend_from_slice(&(m32.len() as i32).to_le_bytes());
    out.extend_from_slice(&compressed);
    Some(out)
}

impl Codec for GvrsDeflate {
    fn name(&self) -> &'static str {
        "GvrsDeflate"
    }

    fn implements_integer_encoding(&self) -> bool {
        true
    }

    fn encode_integer(&self, codec_index: u8, n_rows: usize, n_cols: usize, values: &[i32]) -> Option<Vec<u8>> {
        let has_nulls = tile_has_nulls(values);
        let mut best: Option<Vec<u8>> = None;
        for predictor in applicable_predictors(has_nulls) {
            if predictor.is_null_data_supported() != has_nulls {
                continue;
            }
            let (seed, residuals) = predictor.encode(n_rows, n_cols, values);
            if let Some(packing) = pack(codec_index, predictor.code(), seed, &residuals) {
                if best.as_ref().map_or(true, |b| packing.len() < b.len()) {
                    best = Some(packing);
                }
            }
        }
        best
    }

    fn decode_integer(&self, n_rows: usize, n_cols: usize, packing: &[u8]) -> crate::error::Result<Vec<i32>> {
        if packing.len() < HEADER_LEN {
            return Err(Error::FormatError("truncated GvrsDeflate header".to_string()));
        }
        let predictor_code = PredictorCode::from_u8(packing[1])
            .ok_or_else(|| Error::FormatError(format!("unknown predictor code {}", packing[1])))?;
        let seed = i32::from_le_bytes(packing[2..6].try_into().unwrap());
        let n_m32_bytes = i32::from_le_bytes(packing[6..10].try_into().unwrap()) as usize;

        let m32 = deflate::decompress(&packing[HEADER_LEN..])?;
        if m32.len() != n_m32_bytes {
            return Err(Error::FormatError("GvrsDeflate M32 length mismatch".to_string()));
        }

        let mut reader = crate::m32::M32Reader::new(&m32);
        let n_residuals = n_rows * n_cols - 1 + usize::from(matches!(predictor_code, PredictorCode::DifferencingWithNulls));
        let mut residuals = Vec::with_capacity(n_residuals);
        while reader.has_remaining() {
            residuals.push(reader.decode()?);
        }

        let predictor: Box<dyn SimplePredictor> = match predictor_code {
            PredictorCode::Differencing => Box::new(Differencing),
            PredictorCode::DifferencingWithNulls => Box::new(DifferencingWithNulls),
            PredictorCode::Triangle => Box::new(Triangle),
            PredictorCode::Linear => Box::new(Linear),
            other => return Err(Error::FormatError(format!("{:?} is not a simple predictor", other))),
        };
        Ok(predictor.decode(seed, n_rows, n_cols, &residuals))
    }
}
