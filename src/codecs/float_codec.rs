//! Float bit-plane codec (§4.8): decomposes each `FLOAT` element's raw
//! IEEE-754 bits into sign / exponent / three mantissa byte planes,
//! delta-codes the mantissa planes row-wise, and Deflates each of the
//! five resulting byte streams independently. Operates on raw bits, so a
//! cell's `NaN` null sentinel round-trips exactly like any other value —
//! there is no separate null case to handle.

use super::Codec;
use crate::bitstream::{BitInputStream, BitOutputStream};
use crate::entropy::deflate;
use crate::error::Error;

pub struct FloatCodec;

fn sign_plane(values: &[f32]) -> Vec<u8> {
    let mut out = BitOutputStream::new();
    for v in values {
        out.write_bit(if v.is_sign_negative() { 1 } else { 0 });
    }
    out.into_bytes()
}

fn unpack_signs(bytes: &[u8], n: usize) -> Vec<u8> {
    let mut inp = BitInputStream::new(bytes);
    (0..n).map(|_| inp.read_bit().unwrap_or(0) as u8).collect()
}

/// Row-wise delta over a byte plane: `plane[i,0]` is predicted from
/// `plane[i-1,0]` (and the very first cell is stored raw); every other
/// cell is predicted from its left neighbor. Arithmetic wraps mod 256.
fn delta_encode_plane(plane: &[u8], n_rows: usize, n_cols: usize) -> Vec<u8> {
    let mut out = vec![0u8; plane.len()];
    for i in 0..n_rows {
        for j in 0..n_cols {
            let idx = i * n_cols + j;
            let predicted = if i == 0 && j == 0 {
                0
            } else if j == 0 {
                plane[idx - n_cols]
            } else {
                plane[idx - 1]
            };
            out[idx] = plane[idx].wrapping_sub(predicted);
        }
    }
    out
}

fn delta_decode_plane(deltas: &[u8], n_rows: usize, n_cols: usize) -> Vec<u8> {
    let mut out = vec![0u8; deltas.len()];
    for i in 0..n_rows {
        for j in 0..n_cols {
            let idx = i * n_cols + j;
            let predicted = if i == 0 && j == 0 {
                0
            } else if j == 0 {
                out[idx - n_cols]
            } else {
                out[idx - 1]
            };
            out[idx] = deltas[idx].wrapping_add(predicted);
        }
    }
    out
}

fn write_group(out: &mut Vec<u8>, bytes: &[u8]) {
    out.extend_from_slice(&(bytes.len() as i32).to_le_bytes());
    out.extend_from_slice(bytes);
}

fn read_group<'a>(data: &'a [u8], pos: &mut usize) -> crate::error::Result<&'a [u8]> {
    if *pos + 4 > data.len() {
        return Err(Error::FormatError("truncated float codec group length".to_string()));
    }
    let len = i32::from_le_bytes(data[*pos..*pos + 4].try_into().unwrap());
    if len < 0 {
        return Err(Error::FormatError("negative float codec group length".to_string()));
    }
    let len = len as usize;
    *pos += 4;
    if *pos + len > data.len() {
        return Err(Error::FormatError("float codec group overruns buffer".to_string()));
    }
    let slice = &data[*pos..*pos + len];
    *pos += len;
    Ok(slice)
}

impl Codec for FloatCodec {
    fn name(&self) -> &'static str {
        "GvrsFloat"
    }

    fn implements_floating_point_encoding(&self) -> bool {
        true
    }

    fn encode_float(&self, codec_index: u8, n_rows: usize, n_cols: usize, values: &[f32]) -> Option<Vec<u8>> {
        let n = values.len();
        let mut exponent = vec![0u8; n];
        let mut mh = vec![0u8; n];
        let mut mm = vec![0u8; n];
        let mut ml = vec![0u8; n];
        for (i, v) in values.iter().enumerate() {
            let bits = v.to_bits();
            exponent[i] = ((bits >> 23) & 0xFF) as u8;
            mh[i] = ((bits >> 16) & 0x7F) as u8;
            mm[i] = ((bits >> 8) & 0xFF) as u8;
            ml[i] = (bits & 0xFF) as u8;
        }

        let sign_bytes = sign_plane(values);
        let mh_delta = delta_encode_plane(&mh, n_rows, n_cols);
        let mm_delta = delta_encode_plane(&mm, n_rows, n_cols);
        let ml_delta = delta_encode_plane(&ml, n_rows, n_cols);

        let sign_z = deflate::compress(&sign_bytes).ok()?;
        let exponent_z = deflate::compress(&exponent).ok()?;
        let mh_z = deflate::compress(&mh_delta).ok()?;
        let mm_z = deflate::compress(&mm_delta).ok()?;
        let ml_z = deflate::compress(&ml_delta).ok()?;

        let mut out = Vec::with_capacity(2 + sign_z.len() + exponent_z.len() + mh_z.len() + mm_z.len() + ml_z.len() + 20);
        out.push(codec_index);
        out.push(0);
        write_group(&mut out, &sign_z);
        write_group(&mut out, &exponent_z);
        write_group(&mut out, &mh_z);
        write_group(&mut out, &mm_z);
        write_group(&mut out, &ml_z);
        Some(out)
    }

    fn decode_float(&self, n_rows: usize, n_cols: usize, packing: &[u8]) -> crate::error::Result<Vec<f32>> {
        if packing.len() < 2 {
            return Err(Error::FormatError("truncated float codec header".to_string()));
        }
        let n = n_rows * n_cols;
        let mut pos = 2usize;
        let sign_z = read_group(packing, &mut pos)?;
        let exponent_z = read_group(packing, &mut pos)?;
        let mh_z = read_group(packing, &mut pos)?;
        let mm_z = read_group(packing, &mut pos)?;
        let ml_z = read_group(packing, &mut pos)?;

        let sign_bytes = deflate::decompress(sign_z)?;
        let exponent = deflate::decompress(exponent_z)?;
        let mh_delta = deflate::decompress(mh_z)?;
        let mm_delta = deflate::decompress(mm_z)?;
        let ml_delta = deflate::decompress(ml_z)?;

        if exponent.len() != n || mh_delta.len() != n || mm_delta.len() != n || ml_delta.len() != n {
            return Err(Error::FormatError("float codec plane length mismatch".to_string()));
        }

        let signs = unpack_signs(&sign_bytes, n);
        let mh = delta_decode_plane(&mh_delta, n_rows, n_cols);
        let mm = delta_decode_plane(&mm_delta, n_rows, n_cols);
        let ml = delta_decode_plane(&ml_delta, n_rows, n_cols);

        let mut out = Vec::with_capacity(n);
        for i in 0..n {
            let raw = ((signs[i] as u32) << 31)
                | ((exponent[i] as u32) << 23)
                | ((mh[i] as u32) << 16)
                | ((mm[i] as u32) << 8)
                | (ml[i] as u32);
            out.push(f32::from_bits(raw));
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_float_codec_round_trip() {
        let n_rows = 8;
        let n_cols = 8;
        let mut values = Vec::with_capacity(64);
        for i in 0..n_rows {
            for j in 0..n_cols {
                values.push((std::f64::consts::PI * j as f64 / 10.0).sin() as f32 * (i as f32 - 4.0));
            }
        }
        let codec = FloatCodec;
        let packing = codec.encode_float(4, n_rows, n_cols, &values).unwrap();
        let decoded = codec.decode_float(n_rows, n_cols, &packing).unwrap();
        for (a, b) in values.iter().zip(decoded.iter()) {
            assert_eq!(a.to_bits(), b.to_bits());
        }
    }

    #[test]
    fn test_float_codec_preserves_nan_bit_pattern() {
        let n_rows = 2;
        let n_cols = 2;
        let values = vec![f32::NAN, 1.0, -1.0, 0.0];
        let codec = FloatCodec;
        let packing = codec.encode_float(4, n_rows, n_cols, &values).unwrap();
        let decoded = codec.decode_float(n_rows, n_cols, &packing).unwrap();
        assert!(decoded[0].is_nan());
        assert_eq!(decoded[1].to_bits(), 1.0f32.to_bits());
        assert_eq!(decoded[2].to_bits(), (-1.0f32).to_bits());
        assert_eq!(decoded[3].to_bits(), 0.0f32.to_bits());
    }

    #[test]
    fn test_float_codec_rejects_truncated_group() {
        let codec = FloatCodec;
        let values = vec![1.0f32, 2.0, 3.0, 4.0];
        let mut packing = codec.encode_float(4, 2, 2, &values).unwrap();
        packing.truncate(packing.len() - 2);
        assert!(codec.decode_float(2, 2, &packing).is_err());
    }
}
