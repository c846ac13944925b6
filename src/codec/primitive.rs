//! Fixed-width, little-endian field codecs used by [`super::Message`].
//!
//! `write_*` functions append to a growable buffer and pad as needed so the
//! next field lands on its natural 8-byte boundary. `read_*` functions take
//! an immutable slice and the current cursor, returning the decoded value
//! and the advanced cursor.

use crate::error::{Error, Result};

pub const WORD: usize = 8;

pub fn pad_len(len: usize) -> usize {
    (WORD - (len % WORD)) % WORD
}

pub fn write_uint8(out: &mut Vec<u8>, value: u8) {
    out.push(value);
}

pub fn write_uint32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_le_bytes());
}

pub fn write_uint64(out: &mut Vec<u8>, value: u64) {
    out.extend_from_slice(&value.to_le_bytes());
}

pub fn write_int64(out: &mut Vec<u8>, value: i64) {
    out.extend_from_slice(&value.to_le_bytes());
}

pub fn write_double(out: &mut Vec<u8>, value: f64) {
    out.extend_from_slice(&value.to_le_bytes());
}

/// Write a `\0`-terminated UTF-8 string, zero-padded to the next 8-byte
/// boundary.
pub fn write_text(out: &mut Vec<u8>, value: &str) {
    out.extend_from_slice(value.as_bytes());
    out.push(0);
    out.resize(out.len() + pad_len(out.len()), 0);
}

/// Pad `out` up to the next 8-byte boundary with zero bytes. Used after a
/// run of sub-word fields (e.g. type tags, nibble-packed row headers).
pub fn pad_to_word(out: &mut Vec<u8>) {
    let extra = pad_len(out.len());
    out.resize(out.len() + extra, 0);
}

pub fn read_uint8(data: &[u8], offset: usize) -> Result<(u8, usize)> {
    let byte = *data
        .get(offset)
        .ok_or_else(|| Error::Protocol("truncated uint8".into()))?;
    Ok((byte, offset + 1))
}

pub fn read_uint32(data: &[u8], offset: usize) -> Result<(u32, usize)> {
    let bytes = data
        .get(offset..offset + 4)
        .ok_or_else(|| Error::Protocol("truncated uint32".into()))?;
    Ok((u32::from_le_bytes(bytes.try_into().expect("len checked above")), offset + 4))
}

pub fn read_uint64(data: &[u8], offset: usize) -> Result<(u64, usize)> {
    let bytes = data
        .get(offset..offset + 8)
        .ok_or_else(|| Error::Protocol("truncated uint64".into()))?;
    Ok((u64::from_le_bytes(bytes.try_into().expect("len checked above")), offset + 8))
}

pub fn read_int64(data: &[u8], offset: usize) -> Result<(i64, usize)> {
    let bytes = data
        .get(offset..offset + 8)
        .ok_or_else(|| Error::Protocol("truncated int64".into()))?;
    Ok((i64::from_le_bytes(bytes.try_into().expect("len checked above")), offset + 8))
}

pub fn read_double(data: &[u8], offset: usize) -> Result<(f64, usize)> {
    let bytes = data
        .get(offset..offset + 8)
        .ok_or_else(|| Error::Protocol("truncated double".into()))?;
    Ok((f64::from_le_bytes(bytes.try_into().expect("len checked above")), offset + 8))
}

/// Read `len` raw bytes starting at `offset`, then advance past zero
/// padding to the next 8-byte boundary.
pub fn read_raw(data: &[u8], offset: usize, len: usize) -> Result<(Vec<u8>, usize)> {
    let bytes = data
        .get(offset..offset + len)
        .ok_or_else(|| Error::Protocol("truncated raw field".into()))?
        .to_vec();
    let advanced = offset + len + pad_len(len);
    Ok((bytes, advanced))
}

/// Read a `\0`-terminated UTF-8 string starting at `offset`, then advance
/// past its zero padding to the next 8-byte boundary.
pub fn read_text(data: &[u8], offset: usize) -> Result<(String, usize)> {
    let nul = data[offset..]
        .iter()
        .position(|&b| b == 0)
        .ok_or_else(|| Error::Protocol("unterminated text field".into()))?;
    let text = std::str::from_utf8(&data[offset..offset + nul])
        .map_err(|e| Error::Protocol(format!("text field is not valid utf-8: {e}")))?
        .to_owned();
    let consumed = nul + 1;
    let advanced = offset + consumed + pad_len(consumed);
    Ok((text, advanced))
}
