//! Protobuf wire encoding for the fixed `tf.Example` schema.
//!
//! Only these message shapes exist, with TensorFlow's field numbers:
//!
//! ```text
//! Example   { Features features = 1; }
//! Features  { map<string, Feature> feature = 1; }
//! Feature   { oneof kind { BytesList bytes_list = 1;
//!                          FloatList float_list = 2;
//!                          Int64List int64_list = 3; } }
//! BytesList { repeated bytes value = 1; }
//! FloatList { repeated float value = 1 [packed = true]; }
//! Int64List { repeated int64 value = 1 [packed = true]; }
//! ```
//!
//! The schema is small enough to encode by hand, so there is no generated
//! code: key and varint primitives come from `prost::encoding` and the
//! message layout lives here.
//!
//! # Deterministic Output
//!
//! Map entries are written in [`Features`] iteration order, scalar lists are
//! always packed, and message sizes are computed before writing so the output
//! buffer is allocated exactly once.

use log::debug;
use prost::bytes::Buf;
use prost::encoding::{
    decode_key, decode_varint, encode_key, encode_varint, encoded_len_varint, key_len, WireType,
};
use thiserror::Error;

use crate::feature::{Feature, Features};

const EXAMPLE_FEATURES: u32 = 1;
const FEATURES_ENTRY: u32 = 1;
const ENTRY_KEY: u32 = 1;
const ENTRY_VALUE: u32 = 2;
const FEATURE_BYTES_LIST: u32 = 1;
const FEATURE_FLOAT_LIST: u32 = 2;
const FEATURE_INT64_LIST: u32 = 3;
const LIST_VALUE: u32 = 1;

/// Errors raised while decoding an `Example` payload.
#[derive(Debug, Error)]
pub enum WireError {
    #[error("malformed key or varint: {0}")]
    Prost(#[from] prost::DecodeError),

    #[error("truncated field: need {needed} byte(s), {available} available")]
    Truncated { needed: u64, available: usize },

    #[error("field {field} has unexpected wire type {wire_type:?}")]
    InvalidWireType { field: u32, wire_type: WireType },

    #[error("packed float list has length {len}, not a multiple of 4")]
    PackedLength { len: usize },

    #[error("feature key is not valid UTF-8")]
    InvalidKey,
}

// ============================================================================
// Encoding
// ============================================================================

/// Serializes `features` as one `Example` message.
///
/// The `features` field is always present, so an empty map encodes as
/// `[0x0A, 0x00]`.
pub fn encode_example(features: &Features) -> Vec<u8> {
    let body_len = features_len(features);
    let total_len = delimited_len(EXAMPLE_FEATURES, body_len);
    let mut buf = Vec::with_capacity(total_len);

    encode_header(EXAMPLE_FEATURES, body_len, &mut buf);
    for (key, feature) in features.iter() {
        encode_header(FEATURES_ENTRY, entry_len(key, feature), &mut buf);

        encode_header(ENTRY_KEY, key.len(), &mut buf);
        buf.extend_from_slice(key.as_bytes());

        encode_header(ENTRY_VALUE, feature_len(feature), &mut buf);
        encode_feature(feature, &mut buf);
    }

    debug_assert_eq!(buf.len(), total_len);
    buf
}

fn encode_feature(feature: &Feature, buf: &mut Vec<u8>) {
    match feature {
        Feature::BytesList(values) => {
            encode_header(FEATURE_BYTES_LIST, bytes_list_len(values), buf);
            for value in values {
                encode_header(LIST_VALUE, value.len(), buf);
                buf.extend_from_slice(value);
            }
        }
        Feature::FloatList(values) => {
            encode_header(FEATURE_FLOAT_LIST, float_list_len(values), buf);
            if !values.is_empty() {
                encode_header(LIST_VALUE, values.len() * 4, buf);
                for value in values {
                    buf.extend_from_slice(&value.to_le_bytes());
                }
            }
        }
        Feature::Int64List(values) => {
            encode_header(FEATURE_INT64_LIST, int64_list_len(values), buf);
            if !values.is_empty() {
                encode_header(LIST_VALUE, packed_varints_len(values), buf);
                for value in values {
                    encode_varint(*value as u64, buf);
                }
            }
        }
    }
}

/// Writes a length-delimited field's key and length prefix.
fn encode_header(tag: u32, len: usize, buf: &mut Vec<u8>) {
    encode_key(tag, WireType::LengthDelimited, buf);
    encode_varint(len as u64, buf);
}

fn delimited_len(tag: u32, len: usize) -> usize {
    key_len(tag) + encoded_len_varint(len as u64) + len
}

fn features_len(features: &Features) -> usize {
    features
        .iter()
        .map(|(key, feature)| delimited_len(FEATURES_ENTRY, entry_len(key, feature)))
        .sum()
}

fn entry_len(key: &str, feature: &Feature) -> usize {
    delimited_len(ENTRY_KEY, key.len()) + delimited_len(ENTRY_VALUE, feature_len(feature))
}

fn feature_len(feature: &Feature) -> usize {
    match feature {
        Feature::BytesList(values) => delimited_len(FEATURE_BYTES_LIST, bytes_list_len(values)),
        Feature::FloatList(values) => delimited_len(FEATURE_FLOAT_LIST, float_list_len(values)),
        Feature::Int64List(values) => delimited_len(FEATURE_INT64_LIST, int64_list_len(values)),
    }
}

fn bytes_list_len(values: &[Vec<u8>]) -> usize {
    values
        .iter()
        .map(|value| delimited_len(LIST_VALUE, value.len()))
        .sum()
}

fn float_list_len(values: &[f32]) -> usize {
    if values.is_empty() {
        0
    } else {
        delimited_len(LIST_VALUE, values.len() * 4)
    }
}

fn int64_list_len(values: &[i64]) -> usize {
    if values.is_empty() {
        0
    } else {
        delimited_len(LIST_VALUE, packed_varints_len(values))
    }
}

fn packed_varints_len(values: &[i64]) -> usize {
    values
        .iter()
        .map(|value| encoded_len_varint(*value as u64))
        .sum()
}

// ============================================================================
// Decoding
// ============================================================================

/// Parses an `Example` payload back into its feature map.
///
/// Accepts packed and unpacked scalar lists, skips unknown fields and merges
/// repeated occurrences the way protobuf does (a later map entry with the same
/// key replaces the earlier one). An entry whose `Feature` has no value list
/// set is valid protobuf but carries nothing, so its key is left out.
///
/// # Errors
/// Returns a [`WireError`] for truncated input, malformed varints or keys,
/// groups or non-UTF-8 keys.
pub fn decode_example(mut buf: &[u8]) -> Result<Features, WireError> {
    let mut features = Features::new();

    while buf.has_remaining() {
        let (tag, wire_type) = decode_key(&mut buf)?;
        match tag {
            EXAMPLE_FEATURES => {
                expect_delimited(tag, wire_type)?;
                let body = take_delimited(&mut buf)?;
                merge_features(body, &mut features)?;
            }
            _ => skip_field(tag, wire_type, &mut buf)?,
        }
    }

    Ok(features)
}

fn merge_features(mut buf: &[u8], features: &mut Features) -> Result<(), WireError> {
    while buf.has_remaining() {
        let (tag, wire_type) = decode_key(&mut buf)?;
        match tag {
            FEATURES_ENTRY => {
                expect_delimited(tag, wire_type)?;
                let entry = take_delimited(&mut buf)?;
                match decode_entry(entry)? {
                    (key, Some(feature)) => {
                        features.insert(key, feature);
                    }
                    // An empty `Feature` still replaces an earlier entry for the key.
                    (key, None) => {
                        debug!("feature '{}' has no value list; skipping it", key);
                        features.remove(&key);
                    }
                }
            }
            _ => skip_field(tag, wire_type, &mut buf)?,
        }
    }
    Ok(())
}

/// Returns the entry's key and its feature, or `None` when the `Feature`
/// message has no `oneof kind` set.
fn decode_entry(mut buf: &[u8]) -> Result<(String, Option<Feature>), WireError> {
    let mut key = String::new();
    let mut value: Option<Feature> = None;

    while buf.has_remaining() {
        let (tag, wire_type) = decode_key(&mut buf)?;
        match tag {
            ENTRY_KEY => {
                expect_delimited(tag, wire_type)?;
                let raw = take_delimited(&mut buf)?;
                key = String::from_utf8(raw.to_vec()).map_err(|_| WireError::InvalidKey)?;
            }
            ENTRY_VALUE => {
                expect_delimited(tag, wire_type)?;
                let raw = take_delimited(&mut buf)?;
                merge_feature(raw, &mut value)?;
            }
            _ => skip_field(tag, wire_type, &mut buf)?,
        }
    }

    Ok((key, value))
}

fn merge_feature(mut buf: &[u8], feature: &mut Option<Feature>) -> Result<(), WireError> {
    while buf.has_remaining() {
        let (tag, wire_type) = decode_key(&mut buf)?;
        match tag {
            FEATURE_BYTES_LIST => {
                expect_delimited(tag, wire_type)?;
                let list = decode_bytes_list(take_delimited(&mut buf)?)?;
                match feature {
                    Some(Feature::BytesList(values)) => values.extend(list),
                    _ => *feature = Some(Feature::BytesList(list)),
                }
            }
            FEATURE_FLOAT_LIST => {
                expect_delimited(tag, wire_type)?;
                let list = decode_float_list(take_delimited(&mut buf)?)?;
                match feature {
                    Some(Feature::FloatList(values)) => values.extend(list),
                    _ => *feature = Some(Feature::FloatList(list)),
                }
            }
            FEATURE_INT64_LIST => {
                expect_delimited(tag, wire_type)?;
                let list = decode_int64_list(take_delimited(&mut buf)?)?;
                match feature {
                    Some(Feature::Int64List(values)) => values.extend(list),
                    _ => *feature = Some(Feature::Int64List(list)),
                }
            }
            _ => skip_field(tag, wire_type, &mut buf)?,
        }
    }

    Ok(())
}

fn decode_bytes_list(mut buf: &[u8]) -> Result<Vec<Vec<u8>>, WireError> {
    let mut values = Vec::new();
    while buf.has_remaining() {
        let (tag, wire_type) = decode_key(&mut buf)?;
        match tag {
            LIST_VALUE => {
                expect_delimited(tag, wire_type)?;
                values.push(take_delimited(&mut buf)?.to_vec());
            }
            _ => skip_field(tag, wire_type, &mut buf)?,
        }
    }
    Ok(values)
}

fn decode_float_list(mut buf: &[u8]) -> Result<Vec<f32>, WireError> {
    let mut values = Vec::new();
    while buf.has_remaining() {
        let (tag, wire_type) = decode_key(&mut buf)?;
        match (tag, wire_type) {
            (LIST_VALUE, WireType::LengthDelimited) => {
                let packed = take_delimited(&mut buf)?;
                if packed.len() % 4 != 0 {
                    return Err(WireError::PackedLength { len: packed.len() });
                }
                values.extend(
                    packed
                        .chunks_exact(4)
                        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]])),
                );
            }
            (LIST_VALUE, WireType::ThirtyTwoBit) => {
                let raw = take(&mut buf, 4)?;
                values.push(f32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]));
            }
            (LIST_VALUE, _) => {
                return Err(WireError::InvalidWireType {
                    field: tag,
                    wire_type,
                })
            }
            _ => skip_field(tag, wire_type, &mut buf)?,
        }
    }
    Ok(values)
}

fn decode_int64_list(mut buf: &[u8]) -> Result<Vec<i64>, WireError> {
    let mut values = Vec::new();
    while buf.has_remaining() {
        let (tag, wire_type) = decode_key(&mut buf)?;
        match (tag, wire_type) {
            (LIST_VALUE, WireType::LengthDelimited) => {
                let mut packed = take_delimited(&mut buf)?;
                while packed.has_remaining() {
                    values.push(decode_varint(&mut packed)? as i64);
                }
            }
            (LIST_VALUE, WireType::Varint) => values.push(decode_varint(&mut buf)? as i64),
            (LIST_VALUE, _) => {
                return Err(WireError::InvalidWireType {
                    field: tag,
                    wire_type,
                })
            }
            _ => skip_field(tag, wire_type, &mut buf)?,
        }
    }
    Ok(values)
}

fn expect_delimited(tag: u32, wire_type: WireType) -> Result<(), WireError> {
    if wire_type == WireType::LengthDelimited {
        Ok(())
    } else {
        Err(WireError::InvalidWireType {
            field: tag,
            wire_type,
        })
    }
}

/// Reads a length prefix and splits that many bytes off the front of `buf`.
fn take_delimited<'a>(buf: &mut &'a [u8]) -> Result<&'a [u8], WireError> {
    let len = decode_varint(buf)?;
    let available = buf.len();
    let len = usize::try_from(len).map_err(|_| WireError::Truncated {
        needed: len,
        available,
    })?;
    take(buf, len)
}

fn take<'a>(buf: &mut &'a [u8], len: usize) -> Result<&'a [u8], WireError> {
    if buf.len() < len {
        return Err(WireError::Truncated {
            needed: len as u64,
            available: buf.len(),
        });
    }
    let (head, rest) = buf.split_at(len);
    *buf = rest;
    Ok(head)
}

fn skip_field(tag: u32, wire_type: WireType, buf: &mut &[u8]) -> Result<(), WireError> {
    match wire_type {
        WireType::Varint => {
            decode_varint(buf)?;
        }
        WireType::SixtyFourBit => {
            take(buf, 8)?;
        }
        WireType::LengthDelimited => {
            take_delimited(buf)?;
        }
        WireType::ThirtyTwoBit => {
            take(buf, 4)?;
        }
        WireType::StartGroup | WireType::EndGroup => {
            return Err(WireError::InvalidWireType {
                field: tag,
                wire_type,
            })
        }
    }
    Ok(())
}
