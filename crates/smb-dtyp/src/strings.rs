//! ASCII and UTF-16LE (Unicode) string codec with explicit NUL termination.

use crate::codec::{read_u16_le, read_u8};
use crate::error::{Result, WireError};

/// Reads a NUL-terminated single-byte (ASCII/OEM) string starting at `at`.
///
/// Returns the decoded string and the offset just past the terminating NUL.
pub fn read_ascii_z(buf: &[u8], at: usize) -> Result<(String, usize)> {
    let mut end = at;
    loop {
        let b = read_u8(buf, end)?;
        if b == 0 {
            break;
        }
        end += 1;
    }
    let s = buf[at..end].iter().map(|&b| b as char).collect();
    Ok((s, end + 1))
}

/// Writes `s` as a NUL-terminated single-byte string at `at`, returning the
/// offset just past the terminating NUL.
pub fn write_ascii_z(buf: &mut [u8], at: usize, s: &str) -> Result<usize> {
    let bytes = s.as_bytes();
    let end = at + bytes.len();
    if end + 1 > buf.len() {
        return Err(WireError::BufferOverflow(format!(
            "ascii string of {} bytes does not fit at offset {at}",
            bytes.len()
        )));
    }
    buf[at..end].copy_from_slice(bytes);
    buf[end] = 0;
    Ok(end + 1)
}

/// Reads a NUL-terminated UTF-16LE string starting at `at`.
///
/// Returns the decoded string and the offset just past the terminating
/// 2-byte NUL.
pub fn read_unicode_z(buf: &[u8], at: usize) -> Result<(String, usize)> {
    let mut units = Vec::new();
    let mut pos = at;
    loop {
        let u = read_u16_le(buf, pos)?;
        pos += 2;
        if u == 0 {
            break;
        }
        units.push(u);
    }
    let s = String::from_utf16(&units)
        .map_err(|e| WireError::MalformedFrame(format!("invalid utf-16: {e}")))?;
    Ok((s, pos))
}

/// Reads exactly `len_bytes` of UTF-16LE data (no terminator expected),
/// as used for fixed-length filename fields whose length is given
/// separately (e.g. NTCreateAndX's `name_len`).
pub fn read_unicode_fixed(buf: &[u8], at: usize, len_bytes: usize) -> Result<String> {
    if len_bytes % 2 != 0 {
        return Err(WireError::MalformedFrame(
            "unicode field length is not a multiple of 2".into(),
        ));
    }
    let mut units = Vec::with_capacity(len_bytes / 2);
    for i in 0..(len_bytes / 2) {
        units.push(read_u16_le(buf, at + i * 2)?);
    }
    String::from_utf16(&units).map_err(|e| WireError::MalformedFrame(format!("invalid utf-16: {e}")))
}

/// Writes `s` as a NUL-terminated UTF-16LE string at `at`, returning the
/// offset just past the terminating 2-byte NUL.
pub fn write_unicode_z(buf: &mut [u8], at: usize, s: &str) -> Result<usize> {
    let mut pos = at;
    for u in s.encode_utf16() {
        if pos + 2 > buf.len() {
            return Err(WireError::BufferOverflow(
                "unicode string does not fit".into(),
            ));
        }
        buf[pos..pos + 2].copy_from_slice(&u.to_le_bytes());
        pos += 2;
    }
    if pos + 2 > buf.len() {
        return Err(WireError::BufferOverflow(
            "unicode string terminator does not fit".into(),
        ));
    }
    buf[pos..pos + 2].copy_from_slice(&0u16.to_le_bytes());
    Ok(pos + 2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii_round_trip() {
        let mut buf = [0u8; 16];
        let end = write_ascii_z(&mut buf, 0, "srvsvc").unwrap();
        let (s, next) = read_ascii_z(&buf, 0).unwrap();
        assert_eq!(s, "srvsvc");
        assert_eq!(next, end);
    }

    #[test]
    fn unicode_round_trip() {
        let mut buf = [0u8; 32];
        let end = write_unicode_z(&mut buf, 0, "srvsvc").unwrap();
        let (s, next) = read_unicode_z(&buf, 0).unwrap();
        assert_eq!(s, "srvsvc");
        assert_eq!(next, end);
    }

    #[test]
    fn unicode_fixed_len() {
        let mut buf = [0u8; 32];
        write_unicode_z(&mut buf, 0, "ab").unwrap();
        let s = read_unicode_fixed(&buf, 0, 4).unwrap();
        assert_eq!(s, "ab");
    }
}
