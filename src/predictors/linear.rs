//! `Linear` predictor (§4.2): same row-0/column-0 handling as `Triangle`,
//! but a different interior kernel — the rounded average of the north and
//! west neighbors rather than the gradient-corrected triangle estimate.

use super::{PredictorCode, SimplePredictor};

fn linear_predict(above: i32, left: i32) -> i32 {
    (((above as i64) + (left as i64) + 1) >> 1) as i32
}

pub struct Linear;

impl SimplePredictor for Linear {
    fn code(&self) -> PredictorCode {
        PredictorCode::Linear
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
                let idx = i * n_cols + j;
                let predicted = if i == 0 {
                    values[idx - 1]
                } else if j == 0 {
                    values[idx - n_cols]
                } else {
                    linear_predict(values[idx - n_cols], values[idx - 1])
                };
                residuals.push(values[idx].wrapping_sub(predicted));
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
                let idx = i * n_cols + j;
                let predicted = if i == 0 {
                    out[idx - 1]
                } else if j == 0 {
                    out[idx - n_cols]
                } else {
                    linear_predict(out[idx - n_cols], out[idx - 1])
                };
                out[idx] = predicted.wrapping_add(residuals[k]);
                k += 1;
            }
        }
        out
    }
}
