//! Predictor models (§4.2): deterministic transforms from a tile of
//! integers into a seed plus a residual stream whose distribution is
//! concentrated near zero.
//!
//! The four "simple" predictors (`Differencing`, `DifferencingWithNulls`,
//! `Triangle`, `Linear`) share one shape: `encode` returns a seed value plus
//! a `Vec<i32>` of residuals in row-major scan order; `decode` is the exact
//! inverse. The caller (an integer codec in [`crate::codecs`]) is
//! responsible for M32-encoding the residual stream. The Optimal (LSOP)
//! predictor lives in [`optimal`] because its header and residual-stream
//! split (initializer codes / interior codes) do not fit this shape.

pub mod differencing;
pub mod linear;
pub mod optimal;
pub mod triangle;

/// The predictor-model code stored in a codec's packing header (§4.4).
/// `None` marks an uncompressed raw fallback payload (§7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PredictorCode {
    None = 0,
    Differencing = 1,
    DifferencingWithNulls = 2,
    Triangle = 3,
    Linear = 4,
    Optimal8 = 5,
    Optimal12 = 6,
}

impl PredictorCode {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(PredictorCode::None),
            1 => Some(PredictorCode::Differencing),
            2 => Some(PredictorCode::DifferencingWithNulls),
            3 => Some(PredictorCode::Triangle),
            4 => Some(PredictorCode::Linear),
            5 => Some(PredictorCode::Optimal8),
            6 => Some(PredictorCode::Optimal12),
            _ => None,
        }
    }
}

/// Common shape shared by the four simple predictors.
pub trait SimplePredictor {
    fn code(&self) -> PredictorCode;

    /// Whether this predictor may be applied to a tile containing
    /// `INT_NULL` cells. `implementsIntegerEncoding` analog restricted to
    /// null-awareness (§4.5 "Applicable").
    fn is_null_data_supported(&self) -> bool;

    /// Transforms `values` (row-major, `n_rows * n_cols`) into a seed cell
    /// and a residual stream of the same length.
    fn encode(&self, n_rows: usize, n_cols: usize, values: &[i32]) -> (i32, Vec<i32>);

    /// Exact inverse of [`encode`](Self::encode).
    fn decode(&self, seed: i32, n_rows: usize, n_cols: usize, residuals: &[i32]) -> Vec<i32>;
}

/// Returns the tile-contains-a-null predicate used to select between
/// null-aware and null-oblivious predictors (§4.5).
pub fn tile_has_nulls(values: &[i32]) -> bool {
    values.iter().any(|&v| v == crate::types::INT_NULL)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_predictor_code_round_trip() {
        for code in [
            PredictorCode::None,
            PredictorCode::Differencing,
            PredictorCode::DifferencingWithNulls,
            PredictorCode::Triangle,
            PredictorCode::Linear,
            PredictorCode::Optimal8,
            PredictorCode::Optimal12,
        ] {
            assert_eq!(PredictorCode::from_u8(code as u8), Some(code));
        }
    }

    #[test]
    fn test_unknown_predictor_code() {
        assert!(PredictorCode::from_u8(200).is_none());
    }
}
