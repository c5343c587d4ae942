//! Little-endian primitive reads/writes.
//!
//! Every multi-byte field in a `.gvrs`/`.gvrx` file is little-endian (§6),
//! so unlike a format that must detect byte order at runtime, this module
//! is a thin, fixed-endianness helper layer over any [`SeekableReader`] /
//! [`std::io::Write`].

use std::io::{self, Read, Write};

use crate::io::SeekableReader;

pub fn read_u16<R: SeekableReader + ?Sized>(r: &mut R) -> io::Result<u16> {
    let mut buf = [0u8; 2];
    r.read_exact(&mut buf)?;
    Ok(u16::from_le_bytes(buf))
}

pub fn read_u32<R: SeekableReader + ?Sized>(r: &mut R) -> io::Result<u32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

pub fn read_u64<R: SeekableReader + ?Sized>(r: &mut R) -> io::Result<u64> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

pub fn read_i32<R: SeekableReader + ?Sized>(r: &mut R) -> io::Result<i32> {
    Ok(read_u32(r)? as i32)
}

pub fn read_i64<R: SeekableReader + ?Sized>(r: &mut R) -> io::Result<i64> {
    Ok(read_u64(r)? as i64)
}

pub fn write_i64<W: Write + ?Sized>(w: &mut W, v: i64) -> io::Result<()> {
    write_u64(w, v as u64)
}

pub fn read_i16<R: SeekableReader + ?Sized>(r: &mut R) -> io::Result<i16> {
    Ok(read_u16(r)? as i16)
}

pub fn read_f32<R: SeekableReader + ?Sized>(r: &mut R) -> io::Result<f32> {
    Ok(f32::from_bits(read_u32(r)?))
}

pub fn read_f64<R: SeekableReader + ?Sized>(r: &mut R) -> io::Result<f64> {
    Ok(f64::from_bits(read_u64(r)?))
}

pub fn read_u8<R: Read + ?Sized>(r: &mut R) -> io::Result<u8> {
    let mut buf = [0u8; 1];
    r.read_exact(&mut buf)?;
    Ok(buf[0])
}

pub fn write_u16<W: Write + ?Sized>(w: &mut W, v: u16) -> io::Result<()> {
    w.write_all(&v.to_le_bytes())
}

pub fn write_u32<W: Write + ?Sized>(w: &mut W, v: u32) -> io::Result<()> {
    w.write_all(&v.to_le_bytes())
}

pub fn write_u64<W: Write + ?Sized>(w: &mut W, v: u64) -> io::Result<()> {
    w.write_all(&v.to_le_bytes())
}

pub fn write_i32<W: Write + ?Sized>(w: &mut W, v: i32) -> io::Result<()> {
    write_u32(w, v as u32)
}

pub fn write_i16<W: Write + ?Sized>(w: &mut W, v: i16) -> io::Result<()> {
    write_u16(w, v as u16)
}

pub fn write_f32<W: Write + ?Sized>(w: &mut W, v: f32) -> io::Result<()> {
    write_u32(w, v.to_bits())
}

pub fn write_f64<W: Write + ?Sized>(w: &mut W, v: f64) -> io::Result<()> {
    write_u64(w, v.to_bits())
}

pub fn write_u8<W: Write + ?Sized>(w: &mut W, v: u8) -> io::Result<()> {
    w.write_all(&[v])
}

/// Reads exactly `n` bytes into a freshly allocated `Vec<u8>`.
pub fn read_vec<R: Read + ?Sized>(r: &mut R, n: usize) -> io::Result<Vec<u8>> {
    let mut buf = vec![0u8; n];
    r.read_exact(&mut buf)?;
    Ok(buf)
}

/// Reads a fixed-width ASCII field, trimming trailing NUL padding.
pub fn read_fixed_ascii<R: Read + ?Sized>(r: &mut R, width: usize) -> io::Result<String> {
    let buf = read_vec(r, width)?;
    let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    Ok(String::from_utf8_lossy(&buf[..end]).into_owned())
}

/// Writes `s` into a fixed-width field, zero-padded or truncated to `width`.
pub fn write_fixed_ascii<W: Write + ?Sized>(w: &mut W, s: &str, width: usize) -> io::Result<()> {
    let mut buf = vec![0u8; width];
    let bytes = s.as_bytes();
    let n = bytes.len().min(width);
    buf[..n].copy_from_slice(&bytes[..n]);
    w.write_all(&buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_u32_round_trip() {
        let mut buf = Vec::new();
        write_u32(&mut buf, 0x1234_5678).unwrap();
        let mut cursor = Cursor::new(buf);
        assert_eq!(read_u32(&mut cursor).unwrap(), 0x1234_5678);
    }

    #[test]
    fn test_i32_negative_round_trip() {
        let mut buf = Vec::new();
        write_i32(&mut buf, -1).unwrap();
        let mut cursor = Cursor::new(buf);
        assert_eq!(read_i32(&mut cursor).unwrap(), -1);
    }

    #[test]
    fn test_f32_round_trip() {
        let mut buf = Vec::new();
        write_f32(&mut buf, std::f32::consts::PI).unwrap();
        let mut cursor = Cursor::new(buf);
        assert_eq!(read_f32(&mut cursor).unwrap(), std::f32::consts::PI);
    }

    #[test]
    fn test_fixed_ascii_round_trip() {
        let mut buf = Vec::new();
        write_fixed_ascii(&mut buf, "gvrs raster", 12).unwrap();
        assert_eq!(buf.len(), 12);
        let mut cursor = Cursor::new(buf);
        assert_eq!(read_fixed_ascii(&mut cursor, 12).unwrap(), "gvrs raster");
    }

    #[test]
    fn test_fixed_ascii_truncates() {
        let mut buf = Vec::new();
        write_fixed_ascii(&mut buf, "this string is far too long", 4).unwrap();
        assert_eq!(buf, b"this");
    }
}
