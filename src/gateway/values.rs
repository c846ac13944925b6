//! SQLite dynamic-type tagging and value codecs shared between parameter
//! encoding (request bodies) and row encoding (`ROWS` response bodies).
//!
//! Tag assignments follow SQLite's own column-type numbering so that the
//! numbers on the wire match what `sqlite3_column_type` would report:
//! INTEGER=1, FLOAT=2, TEXT=3, BLOB=4, NULL=5.

use crate::codec::{MessageReader, MessageWriter};
use crate::error::{Error, Result};
use rusqlite::types::Value;

pub const TAG_INTEGER: u8 = 1;
pub const TAG_FLOAT: u8 = 2;
pub const TAG_TEXT: u8 = 3;
pub const TAG_BLOB: u8 = 4;
pub const TAG_NULL: u8 = 5;

pub fn tag_of(value: &Value) -> u8 {
    match value {
        Value::Integer(_) => TAG_INTEGER,
        Value::Real(_) => TAG_FLOAT,
        Value::Text(_) => TAG_TEXT,
        Value::Blob(_) => TAG_BLOB,
        Value::Null => TAG_NULL,
    }
}

/// Write `value`'s payload (not its tag) at the writer's current,
/// word-aligned position.
pub fn write_value(w: &mut MessageWriter, value: &Value) {
    match value {
        Value::Integer(i) => {
            w.put_int64(*i);
        }
        Value::Real(f) => {
            w.put_double(*f);
        }
        Value::Text(s) => {
            w.put_text(s);
        }
        Value::Blob(bytes) => {
            w.put_uint64(bytes.len() as u64);
            w.put_raw(bytes);
        }
        Value::Null => {
            w.put_uint64(0);
        }
    }
}

/// Read one value whose type is `tag`, already positioned at a
/// word-aligned offset.
pub fn read_value(r: &mut MessageReader, tag: u8) -> Result<Value> {
    Ok(match tag {
        TAG_INTEGER => Value::Integer(r.get_int64()?.into_inner()),
        TAG_FLOAT => Value::Real(r.get_double()?.into_inner()),
        TAG_TEXT => Value::Text(r.get_text()?.into_inner()),
        TAG_BLOB => {
            let len = r.get_uint64()?.into_inner() as usize;
            Value::Blob(r.get_raw(len)?.into_inner())
        }
        TAG_NULL => {
            r.get_uint64()?;
            Value::Null
        }
        other => return Err(Error::Protocol(format!("unknown column type tag {other}"))),
    })
}

/// Parameter encoding: a count byte, then one tag byte per parameter
/// (padded to a word), then the values themselves.
pub fn write_params(w: &mut MessageWriter, params: &[Value]) {
    #[expect(clippy::cast_possible_truncation, reason = "wire protocol caps parameter count at u8::MAX")]
    w.put_uint8(params.len() as u8);
    for p in params {
        w.put_uint8(tag_of(p));
    }
    w.align();
    for p in params {
        write_value(w, p);
    }
}

/// Read a parameter list, or an empty one if the body has nothing left: a
/// params-free `EXEC`/`QUERY` may end right after `stmt_id` with no count
/// byte at all, rather than an explicit zero.
pub fn read_params(r: &mut MessageReader) -> Result<Vec<Value>> {
    if r.remaining() == 0 {
        return Ok(Vec::new());
    }
    let n = r.get_uint8()?.into_inner() as usize;
    let mut tags = Vec::with_capacity(n);
    for _ in 0..n {
        tags.push(r.get_uint8()?.into_inner());
    }
    r.align()?;
    tags.into_iter().map(|tag| read_value(r, tag)).collect()
}

/// Row header encoding: 4-bit type tags packed two per byte (column 0 in
/// the low nibble of byte 0, column 1 in the high nibble, column 2 in the
/// low nibble of byte 1, ...), zero-padded to a word.
pub fn write_row_header(w: &mut MessageWriter, row: &[Value]) {
    let mut packed = Vec::with_capacity(row.len().div_ceil(2));
    for pair in row.chunks(2) {
        let low = tag_of(&pair[0]);
        let high = pair.get(1).map_or(0, tag_of);
        packed.push(low | (high << 4));
    }
    for byte in packed {
        w.put_uint8(byte);
    }
    w.align();
}

pub fn read_row_header(r: &mut MessageReader, column_count: usize) -> Result<Vec<u8>> {
    let packed_len = column_count.div_ceil(2);
    let mut tags = Vec::with_capacity(column_count);
    for _ in 0..packed_len {
        let byte = r.get_uint8()?.into_inner();
        tags.push(byte & 0x0f);
        if tags.len() < column_count {
            tags.push((byte >> 4) & 0x0f);
        }
    }
    r.align()?;
    Ok(tags)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Message;

    #[test]
    fn params_round_trip() {
        let mut msg = Message::new(0);
        write_params(
            &mut msg.writer(),
            &[Value::Integer(-12), Value::Text("hi".into()), Value::Null],
        );
        let mut r = msg.reader();
        let decoded = read_params(&mut r).unwrap();
        assert_eq!(decoded, vec![Value::Integer(-12), Value::Text("hi".into()), Value::Null]);
    }

    #[test]
    fn zero_param_count_still_leaves_the_cursor_word_aligned() {
        let mut msg = Message::new(0);
        {
            let w = &mut msg.writer();
            write_params(w, &[]);
            w.put_int64(99);
        }
        let mut r = msg.reader();
        assert_eq!(read_params(&mut r).unwrap(), Vec::new());
        assert_eq!(r.get_int64().unwrap().into_inner(), 99);
    }

    #[test]
    fn read_params_accepts_a_body_with_no_params_block_at_all() {
        let mut msg = Message::new(0);
        msg.writer().put_uint32(0).put_uint32(0);
        let mut r = msg.reader();
        r.get_uint32().unwrap();
        r.get_uint32().unwrap();
        assert_eq!(read_params(&mut r).unwrap(), Vec::new());
    }

    #[test]
    fn row_header_packs_two_tags_per_byte() {
        let row = vec![Value::Integer(1), Value::Text("x".into()), Value::Null];
        let mut msg = Message::new(0);
        write_row_header(&mut msg.writer(), &row);
        // 3 columns -> 2 packed bytes -> padded to 8.
        assert_eq!(msg.body.len(), 8);
        let mut r = msg.reader();
        let tags = read_row_header(&mut r, 3).unwrap();
        assert_eq!(tags, vec![TAG_INTEGER, TAG_TEXT, TAG_NULL]);
    }
}
