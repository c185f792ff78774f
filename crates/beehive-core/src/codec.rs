//! Binary row codec (§4.1).
//!
//! Encodes and decodes a sequence of `(attribute_id, type, value)` records.
//! The same record shape backs both the server's binary-at-rest form and the
//! text form a client places on the wire; the two forms differ only in how
//! a schema-declared `UuidV1`/`UuidV4` attribute's `Text`-tagged payload is
//! rendered (36-byte canonical string on the wire vs 16 raw bytes at rest).
//! That reshape is schema-aware and lives in [`crate::validator`]; this
//! module only knows about the five wire type tags.

use crate::errors::CodecError;
use std::collections::HashSet;

/// Maximum length, in bytes, of a `Text` or `Blob` payload (§4.1, §6.1).
pub const MAX_FIELD_LEN: usize = 32_767;

const TAG_INTEGER: u8 = 0;
const TAG_REAL: u8 = 1;
const TAG_TEXT: u8 = 2;
const TAG_BLOB: u8 = 3;
const TAG_NULL: u8 = 4;

/// One typed attribute value, independent of the attribute id that names it.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    /// Signed 64-bit integer.
    Integer(i64),
    /// IEEE-754 double.
    Real(f64),
    /// UTF-8 text, at most [`MAX_FIELD_LEN`] bytes. Also used to carry a
    /// `UuidV1`/`UuidV4` attribute's bytes (16 raw or 36 ASCII, depending on
    /// form — see module docs).
    Text(String),
    /// Opaque bytes, at most [`MAX_FIELD_LEN`] bytes.
    Blob(Vec<u8>),
    /// Explicit absence of a value.
    Null,
}

impl AttributeValue {
    /// The wire tag for this value's type.
    pub fn tag(&self) -> u8 {
        match self {
            Self::Integer(_) => TAG_INTEGER,
            Self::Real(_) => TAG_REAL,
            Self::Text(_) => TAG_TEXT,
            Self::Blob(_) => TAG_BLOB,
            Self::Null => TAG_NULL,
        }
    }

    /// `true` for [`AttributeValue::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

/// One decoded `(attribute_id, value)` record, in the order it was decoded.
pub type AttributeRecord = (u16, AttributeValue);

/// Append-only encoder for a single tuple of attribute records.
///
/// Mirrors the append/iterate split `spec.md` requires of the codec: this
/// type is the "append" half, [`decode`] is the "iterate" half.
#[derive(Debug, Default)]
pub struct TupleEncoder {
    buf: Vec<u8>,
    seen: HashSet<u16>,
}

impl TupleEncoder {
    /// Start an empty tuple.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one attribute record. Returns [`CodecError::DuplicateAttribute`]
    /// if `id` was already appended to this tuple.
    pub fn push(&mut self, id: u16, value: &AttributeValue) -> Result<(), CodecError> {
        if !self.seen.insert(id) {
            return Err(CodecError::DuplicateAttribute { id });
        }
        self.buf.extend_from_slice(&id.to_be_bytes());
        self.buf.push(value.tag());
        match value {
            AttributeValue::Integer(v) => self.buf.extend_from_slice(&v.to_be_bytes()),
            AttributeValue::Real(v) => self.buf.extend_from_slice(&v.to_bits().to_be_bytes()),
            AttributeValue::Text(s) => write_len_prefixed(&mut self.buf, s.as_bytes())?,
            AttributeValue::Blob(b) => write_len_prefixed(&mut self.buf, b)?,
            AttributeValue::Null => {}
        }
        Ok(())
    }

    /// Consume the builder, returning the encoded buffer.
    pub fn finish(self) -> Vec<u8> {
        self.buf
    }
}

fn write_len_prefixed(buf: &mut Vec<u8>, bytes: &[u8]) -> Result<(), CodecError> {
    if bytes.len() > MAX_FIELD_LEN {
        return Err(CodecError::corrupt(format!(
            "field of {} bytes exceeds max {MAX_FIELD_LEN}",
            bytes.len()
        )));
    }
    buf.extend_from_slice(&(bytes.len() as u16).to_be_bytes());
    buf.extend_from_slice(bytes);
    Ok(())
}

/// Encode a complete tuple in one call. Convenience wrapper around
/// [`TupleEncoder`] for call sites that already have every record.
pub fn encode(records: &[AttributeRecord]) -> Result<Vec<u8>, CodecError> {
    let mut enc = TupleEncoder::new();
    for (id, value) in records {
        enc.push(*id, value)?;
    }
    Ok(enc.finish())
}

/// Decode a buffer into its attribute records, in encoded order.
///
/// Fails with [`CodecError::CorruptEncoding`] if a length field overflows the
/// remaining buffer, [`CodecError::DuplicateAttribute`] if an id repeats, or
/// [`CodecError::UnknownTypeTag`] if a tag byte doesn't map to a known type.
pub fn decode(buf: &[u8]) -> Result<Vec<AttributeRecord>, CodecError> {
    let mut out = Vec::new();
    let mut seen = HashSet::new();
    let mut pos = 0usize;

    while pos < buf.len() {
        let id = read_u16(buf, &mut pos)?;
        if !seen.insert(id) {
            return Err(CodecError::DuplicateAttribute { id });
        }
        let tag = read_u8(buf, &mut pos)?;
        let value = match tag {
            TAG_INTEGER => AttributeValue::Integer(read_i64(buf, &mut pos)?),
            TAG_REAL => AttributeValue::Real(f64::from_bits(read_u64(buf, &mut pos)?)),
            TAG_TEXT => {
                let bytes = read_len_prefixed(buf, &mut pos)?;
                let text = String::from_utf8(bytes)
                    .map_err(|e| CodecError::corrupt(format!("text attribute {id} not utf8: {e}")))?;
                AttributeValue::Text(text)
            }
            TAG_BLOB => AttributeValue::Blob(read_len_prefixed(buf, &mut pos)?),
            TAG_NULL => AttributeValue::Null,
            other => return Err(CodecError::UnknownTypeTag { tag: other }),
        };
        out.push((id, value));
    }
    Ok(out)
}

fn read_u8(buf: &[u8], pos: &mut usize) -> Result<u8, CodecError> {
    let b = *buf
        .get(*pos)
        .ok_or_else(|| CodecError::corrupt("truncated buffer reading u8"))?;
    *pos += 1;
    Ok(b)
}

fn read_u16(buf: &[u8], pos: &mut usize) -> Result<u16, CodecError> {
    let slice = buf
        .get(*pos..*pos + 2)
        .ok_or_else(|| CodecError::corrupt("truncated buffer reading u16"))?;
    *pos += 2;
    Ok(u16::from_be_bytes(slice.try_into().unwrap()))
}

fn read_u64(buf: &[u8], pos: &mut usize) -> Result<u64, CodecError> {
    let slice = buf
        .get(*pos..*pos + 8)
        .ok_or_else(|| CodecError::corrupt("truncated buffer reading u64"))?;
    *pos += 8;
    Ok(u64::from_be_bytes(slice.try_into().unwrap()))
}

fn read_i64(buf: &[u8], pos: &mut usize) -> Result<i64, CodecError> {
    read_u64(buf, pos).map(|v| v as i64)
}

fn read_len_prefixed(buf: &[u8], pos: &mut usize) -> Result<Vec<u8>, CodecError> {
    let len = read_u16(buf, pos)? as usize;
    if len > MAX_FIELD_LEN {
        return Err(CodecError::corrupt(format!(
            "field length {len} exceeds max {MAX_FIELD_LEN}"
        )));
    }
    let bytes = buf
        .get(*pos..*pos + len)
        .ok_or_else(|| CodecError::corrupt("length field overflows buffer"))?;
    *pos += len;
    Ok(bytes.to_vec())
}

/// Merge two decoded tuples per the Update re-encoding rule (§4.1):
/// attributes present only in `stored` keep their stored value, attributes
/// present only in `incoming` are added, and attributes present in both take
/// the incoming value.
pub fn merge(stored: &[AttributeRecord], incoming: &[AttributeRecord]) -> Vec<AttributeRecord> {
    let mut merged: Vec<AttributeRecord> = stored.to_vec();
    for (id, value) in incoming {
        if let Some(slot) = merged.iter_mut().find(|(sid, _)| sid == id) {
            slot.1 = value.clone();
        } else {
            merged.push((*id, value.clone()));
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sample_tuple() -> Vec<AttributeRecord> {
        vec![
            (1, AttributeValue::Integer(42)),
            (2, AttributeValue::Text("hello".into())),
            (3, AttributeValue::Null),
        ]
    }

    #[test]
    fn roundtrip_basic_tuple() {
        let records = sample_tuple();
        let encoded = encode(&records).unwrap();
        let decoded = decode(&encoded).unwrap();
        assert_eq!(decoded, records);
    }

    #[test]
    fn duplicate_id_rejected_on_encode() {
        let mut enc = TupleEncoder::new();
        enc.push(1, &AttributeValue::Integer(1)).unwrap();
        let err = enc.push(1, &AttributeValue::Integer(2)).unwrap_err();
        assert!(matches!(err, CodecError::DuplicateAttribute { id: 1 }));
    }

    #[test]
    fn duplicate_id_rejected_on_decode() {
        // Hand-build a buffer with id=1 appearing twice.
        let mut buf = Vec::new();
        buf.extend_from_slice(&1u16.to_be_bytes());
        buf.push(TAG_NULL);
        buf.extend_from_slice(&1u16.to_be_bytes());
        buf.push(TAG_NULL);
        let err = decode(&buf).unwrap_err();
        assert!(matches!(err, CodecError::DuplicateAttribute { id: 1 }));
    }

    #[test]
    fn unknown_tag_rejected() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&1u16.to_be_bytes());
        buf.push(250);
        let err = decode(&buf).unwrap_err();
        assert!(matches!(err, CodecError::UnknownTypeTag { tag: 250 }));
    }

    #[test]
    fn truncated_length_field_is_corrupt_encoding() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&1u16.to_be_bytes());
        buf.push(TAG_TEXT);
        buf.extend_from_slice(&100u16.to_be_bytes()); // claims 100 bytes, none follow
        let err = decode(&buf).unwrap_err();
        assert!(matches!(err, CodecError::CorruptEncoding { .. }));
    }

    #[test]
    fn merge_prefers_incoming_keeps_stored_only_and_adds_new() {
        let stored = vec![
            (1, AttributeValue::Text("old".into())),
            (2, AttributeValue::Integer(7)),
        ];
        let incoming = vec![
            (1, AttributeValue::Text("new".into())),
            (3, AttributeValue::Integer(99)),
        ];
        let merged = merge(&stored, &incoming);
        assert_eq!(
            merged.iter().find(|(id, _)| *id == 1).unwrap().1,
            AttributeValue::Text("new".into())
        );
        assert_eq!(
            merged.iter().find(|(id, _)| *id == 2).unwrap().1,
            AttributeValue::Integer(7)
        );
        assert_eq!(
            merged.iter().find(|(id, _)| *id == 3).unwrap().1,
            AttributeValue::Integer(99)
        );
    }

    proptest! {
        // P3: codec round-trip for any sequence of unique-id records.
        #[test]
        fn roundtrip_is_a_set_equality(
            ids in prop::collection::hash_set(0u16..2000, 1..12),
            mut seed in prop::collection::vec(0i64..1_000_000, 1..12),
        ) {
            seed.truncate(ids.len());
            let records: Vec<AttributeRecord> = ids
                .into_iter()
                .zip(seed)
                .map(|(id, v)| (id, AttributeValue::Integer(v)))
                .collect();
            let encoded = encode(&records).unwrap();
            let decoded = decode(&encoded).unwrap();
            let mut expected = records.clone();
            let mut actual = decoded;
            expected.sort_by_key(|(id, _)| *id);
            actual.sort_by_key(|(id, _)| *id);
            prop_assert_eq!(expected, actual);
        }
    }
}
