//! `Differencing` and `DifferencingWithNulls` predictors (§4.2).

use crate::types::INT_NULL;

use super::{PredictorCode, SimplePredictor};

fn predictor_source(i: usize, j: usize, n_cols: usize) -> usize {
    debug_assert!(i != 0 || j != 0);
    if i == 0 {
        i * n_cols + (j - 1)
    } else if j == 0 {
        (i - 1) * n_cols
    } else {
        i * n_cols + (j - 1)
    }
}

/// Predicts each cell from its left neighbor; the first cell of every row
/// after the first is predicted from the cell directly above it.
pub struct Differencing;

impl SimplePredictor for Differencing {
    fn code(&self) -> PredictorCode {
        PredictorCode::Differencing
    }

    fn is_null_data_supported(&self) -> bool {
        false
    }

    fn encode(&self, n_rows: usize, n_cols: usize, values: &[i32]) -> (i32, Vec<i32>) {
        debug_assert_eq!(values.len(), n_rows * n_cols);
        let seed = values[0];
        let mut residuals = Vec::with_capacity(values.len() - 1);
        for i in 0..n_rows {
            for j in 0..n_cols {
                if i == 0 && j == 0 {
                    continue;
                }
                let src = predictor_source(i, j, n_cols);
                residuals.push(values[i * n_cols + j].wrapping_sub(values[src]));
            }
        }
        (seed, residuals)
    }

    fn decode(&self, seed: i32, n_rows: usize, n_cols: usize, residuals: &[i32]) -> Vec<i32> {
        let mut out = vec![0i32; n_rows * n_cols];
        out[0] = seed;
        let mut k = 0;
        for i in 0..n_rows {
            for j in 0..n_cols {
                if i == 0 && j == 0 {
                    continue;
                }
                let src = predictor_source(i, j, n_cols);
                out[i * n_cols + j] = out[src].wrapping_add(residuals[k]);
                k += 1;
            }
        }
        out
    }
}

/// Same topology as [`Differencing`], but treats `INT_NULL` as a cut: the
/// cell following a null (wherever its normal predictor source would have
/// been null) is predicted from a tile-wide "optimal seed" instead, which
/// this implementation threads through as `residuals[0]` so that `decode`
/// does not need the original data to recompute it.
pub struct DifferencingWithNulls;

impl DifferencingWithNulls {
    fn optimal_seed(n_rows: usize, n_cols: usize, values: &[i32]) -> i32 {
        let mut sum: i64 = 0;
        let mut count: i64 = 0;
        for i in 0..n_rows {
            for j in 0..n_cols {
                if i == 0 && j == 0 {
                    continue;
                }
                let idx = i * n_cols + j;
                if values[idx] == INT_NULL {
                    continue;
                }
                let src = predictor_source(i, j, n_cols);
                if values[src] == INT_NULL {
                    sum += values[idx] as i64;
                    count += 1;
                }
            }
        }
        if count == 0 {
            0
        } else {
            ((sum as f64) / (count as f64)).round() as i32
        }
    }
}

impl SimplePredictor for DifferencingWithNulls {
    fn code(&self) -> PredictorCode {
        PredictorCode::DifferencingWithNulls
    }

    fn is_null_data_supported(&self) -> bool {
        true
    }

    fn encode(&self, n_rows: usize, n_cols: usize, values: &[i32]) -> (i32, Vec<i32>) {
        debug_assert_eq!(values.len(), n_rows * n_cols);
        let seed = values[0];
        let optimal_seed = Self::optimal_seed(n_rows, n_cols, values);

        let mut residuals = Vec::with_capacity(values.len());
        residuals.push(optimal_seed);

        for i in 0..n_rows {
            for j in 0..n_cols {
                if i == 0 && j == 0 {
                    continue;
                }
                let idx = i * n_cols + j;
                if values[idx] == INT_NULL {
                    residuals.push(INT_NULL);
                    continue;
                }
                let src = predictor_source(i, j, n_cols);
                let residual = if values[src] == INT_NULL {
                    values[idx].wrapping_sub(optimal_seed)
                } else {
                    values[idx].wrapping_sub(values[src])
                };
                residuals.push(residual);
            }
        }
        (seed, residuals)
    }

    fn decode(&self, seed: i32, n_rows: usize, n_cols: usize, residuals: &[i32]) -> Vec<i32> {
        let optimal_seed = residuals[0];
        let mut out = vec![0i32; n_rows * n_cols];
        out[0] = seed;
        let mut k = 1;
        for i in 0..n_rows {
            for j in 0..n_cols {
                if i == 0 && j == 0 {
                    continue;
                }
                let r = residuals[k];
                k += 1;
                let idx = i * n_cols + j;
                if r == INT_NULL {
                    out[idx] = INT_NULL;
                    continue;
                }
                let src = predictor_source(i, j, n_cols);
                out[idx] = if out[src] == INT_NULL {
                    optimal_seed.wrapping_add(r)
                } else {
                    out[src].wrapping_add(r)
                };
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tile_no_nulls() -> (usize, usize, Vec<i32>) {
        let n_rows = 5;
        let n_cols = 6;
        let values: Vec<i32> = (0..(n_rows * n_cols) as i32).map(|v| v * 3 - 7).collect();
        (n_rows, n_cols, values)
    }

    #[test]
    fn test_differencing_round_trip() {
        let (n_rows, n_cols, values) = tile_no_nulls();
        let predictor = Differencing;
        let (seed, residuals) = predictor.encode(n_rows, n_cols, &values);
        let decoded = predictor.decode(seed, n_rows, n_cols, &residuals);
        assert_eq!(decoded, values);
    }

    #[test]
    fn test_differencing_with_nulls_round_trip() {
        let n_rows = 4;
        let n_cols = 4;
        let mut values: Vec<i32> = (0..16).collect();
        values[5] = INT_NULL;
        values[6] = INT_NULL;
        values[10] = INT_NULL;

        let predictor = DifferencingWithNulls;
        let (seed, residuals) = predictor.encode(n_rows, n_cols, &values);
        let decoded = predictor.decode(seed, n_rows, n_cols, &residuals);
        assert_eq!(decoded, values);
    }

    #[test]
    fn test_differencing_with_nulls_every_other_cell() {
        let n_rows = 10;
        let n_cols = 10;
        let mut values: Vec<i32> = (0..100).map(|v| v * 17 - 400).collect();
        for (idx, v) in values.iter_mut().enumerate() {
            if idx % 2 == 1 {
                *v = INT_NULL;
            }
        }

        let predictor = DifferencingWithNulls;
        let (seed, residuals) = predictor.encode(n_rows, n_cols, &values);
        let decoded = predictor.decode(seed, n_rows, n_cols, &residuals);
        assert_eq!(decoded, values);
    }

    #[test]
    fn test_differencing_wrap_around() {
        let n_rows = 2;
        let n_cols = 2;
        let values = vec![i32::MAX, i32::MIN, 0, -1];
        let predictor = Differencing;
        let (seed, residuals) = predictor.encode(n_rows, n_cols, &values);
        let decoded = predictor.decode(seed, n_rows, n_cols, &residuals);
        assert_eq!(decoded, values);
    }
}
