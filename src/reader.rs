//! TFRecords reader.
//!
//! The whole container is scanned when the reader is constructed. Each frame
//! is checked in order: the masked CRC of the 8 length bytes first (so a
//! damaged length is never trusted), then that the payload and footer fit in
//! the buffer, then the masked CRC of the payload.
//!
//! # Corruption Handling
//!
//! By default the first bad frame fails the read with
//! [`TfrecError::CorruptContainer`]. With [`ReadOptions::lenient`] the reader
//! keeps every record before the bad frame and reports the problem through
//! [`TfRecordsReader::status`], which suits partially written files.

use std::fmt;

use log::{debug, warn};
use serde::Serialize;

use crate::checksum::{masked_crc32c, read_int32, read_int64, text_decode};
use crate::error::{FeatureNotFound, TfrecError};
use crate::feature::{Feature, FeatureType, FeatureValues, Features};
use crate::wire;

const LENGTH_SIZE: usize = 8;
const CRC_SIZE: usize = 4;
const HEADER_SIZE: usize = LENGTH_SIZE + CRC_SIZE;

/// Options for reading a TFRecords container.
#[derive(Clone, Debug, Default)]
pub struct ReadOptions {
    /// If true, stop at the first bad frame and keep the records before it
    /// instead of failing.
    pub lenient: bool,
}

/// Which part of a frame failed to check out.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum CorruptionKind {
    /// The masked CRC of the length field did not match.
    LengthChecksum { expected: u32, actual: u32 },
    /// The masked CRC of the payload did not match.
    DataChecksum { expected: u32, actual: u32 },
    /// The buffer ended inside the frame.
    Truncated { needed: u64, available: usize },
}

/// Where and how a container stopped being readable.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Corruption {
    /// Byte offset of the start of the bad frame.
    pub offset: usize,
    pub kind: CorruptionKind,
    /// Records successfully parsed before the bad frame.
    pub records_parsed: usize,
}

impl fmt::Display for Corruption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            CorruptionKind::LengthChecksum { expected, actual } => write!(
                f,
                "length checksum mismatch in frame at offset {} (stored {:#010x}, computed {:#010x})",
                self.offset, expected, actual
            )?,
            CorruptionKind::DataChecksum { expected, actual } => write!(
                f,
                "data checksum mismatch in frame at offset {} (stored {:#010x}, computed {:#010x})",
                self.offset, expected, actual
            )?,
            CorruptionKind::Truncated { needed, available } => write!(
                f,
                "truncated frame at offset {}: need {} byte(s), {} available",
                self.offset, needed, available
            )?,
        }
        write!(f, "; {} record(s) parsed before it", self.records_parsed)
    }
}

impl std::error::Error for Corruption {}

/// Outcome of scanning a container.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParseStatus<'a> {
    /// Every byte belonged to a valid frame.
    Complete,
    /// Scanning stopped early (lenient mode only).
    Partial(&'a Corruption),
}

/// Parsed, checksum-validated records of one TFRecords container.
#[derive(Clone, Debug)]
pub struct TfRecordsReader {
    records: Vec<Vec<u8>>,
    corruption: Option<Corruption>,
}

impl TfRecordsReader {
    /// Parses `tfrecords`, failing on the first corrupt or truncated frame.
    ///
    /// # Errors
    /// Returns [`TfrecError::CorruptContainer`] describing the bad frame.
    pub fn new(tfrecords: &[u8]) -> Result<Self, TfrecError> {
        Self::with_options(tfrecords, &ReadOptions::default())
    }

    /// Parses `tfrecords` with explicit options.
    ///
    /// # Errors
    /// Returns [`TfrecError::CorruptContainer`] unless `opts.lenient` is set,
    /// in which case this never fails.
    pub fn with_options(tfrecords: &[u8], opts: &ReadOptions) -> Result<Self, TfrecError> {
        let mut records = Vec::new();
        let mut position = 0;

        while position < tfrecords.len() {
            match read_frame(tfrecords, position) {
                Ok((payload, next)) => {
                    debug!(
                        "record {} at offset {}: {} byte(s)",
                        records.len(),
                        position,
                        payload.len()
                    );
                    records.push(payload.to_vec());
                    position = next;
                }
                Err(kind) => {
                    let corruption = Corruption {
                        offset: position,
                        kind,
                        records_parsed: records.len(),
                    };
                    if !opts.lenient {
                        return Err(corruption.into());
                    }
                    warn!("stopping TFRecords scan: {}", corruption);
                    return Ok(Self {
                        records,
                        corruption: Some(corruption),
                    });
                }
            }
        }

        Ok(Self {
            records,
            corruption: None,
        })
    }

    pub fn status(&self) -> ParseStatus<'_> {
        match &self.corruption {
            Some(corruption) => ParseStatus::Partial(corruption),
            None => ParseStatus::Complete,
        }
    }

    pub fn corruption(&self) -> Option<&Corruption> {
        self.corruption.as_ref()
    }

    /// Number of successfully parsed records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Raw payload of record `index`.
    pub fn record(&self, index: usize) -> Option<&[u8]> {
        self.records.get(index).map(Vec::as_slice)
    }

    pub fn records(&self) -> impl Iterator<Item = &[u8]> {
        self.records.iter().map(Vec::as_slice)
    }

    /// Decodes record `index` into its feature map.
    ///
    /// # Errors
    /// Returns [`FeatureNotFound::RecordOutOfRange`] for a bad index and
    /// [`TfrecError::Decode`] if the payload is not a valid `Example`.
    pub fn example(&self, index: usize) -> Result<Features, TfrecError> {
        let payload = self
            .record(index)
            .ok_or(FeatureNotFound::RecordOutOfRange {
                index,
                len: self.len(),
            })?;
        wire::decode_example(payload).map_err(|source| TfrecError::Decode { index, source })
    }

    /// Looks up one feature of record `index` and projects it to `ty`.
    ///
    /// `String` decodes each stored byte string as UTF-8, `Binary` returns
    /// the bytes as stored.
    ///
    /// # Errors
    /// - [`TfrecError::FeatureNotFound`] if the record or key does not exist
    /// - [`TfrecError::FeatureTypeMismatch`] if the stored list is of another kind
    /// - [`TfrecError::InvalidUtf8`] if `ty` is `String` and a value is not UTF-8
    /// - [`TfrecError::Decode`] if the payload is not a valid `Example`
    pub fn get_feature(
        &self,
        index: usize,
        key: &str,
        ty: FeatureType,
    ) -> Result<FeatureValues, TfrecError> {
        let mut features = self.example(index)?;
        let feature = features
            .remove(key)
            .ok_or_else(|| FeatureNotFound::KeyMissing {
                index,
                key: key.to_owned(),
            })?;

        match (ty, feature) {
            (FeatureType::String, Feature::BytesList(values)) => Ok(FeatureValues::Strings(
                values
                    .iter()
                    .map(|bytes| text_decode(bytes))
                    .collect::<Result<_, _>>()?,
            )),
            (FeatureType::Binary, Feature::BytesList(values)) => Ok(FeatureValues::Binaries(values)),
            (FeatureType::Int64, Feature::Int64List(values)) => Ok(FeatureValues::Int64s(values)),
            (FeatureType::Float, Feature::FloatList(values)) => Ok(FeatureValues::Floats(values)),
            (requested, stored) => Err(TfrecError::FeatureTypeMismatch {
                key: key.to_owned(),
                requested,
                found: stored.kind(),
            }),
        }
    }

    /// Dumps every record as `{"features": {<key>: {<kind>: [values]}}}`.
    ///
    /// Byte strings that are valid UTF-8 are rendered as JSON strings, other
    /// byte strings as arrays of numbers.
    ///
    /// # Errors
    /// Returns [`TfrecError::Decode`] if any record is not a valid `Example`.
    pub fn to_json(&self) -> Result<serde_json::Value, TfrecError> {
        Ok(serde_json::to_value(self.dump()?)?)
    }

    /// Same as [`to_json`](Self::to_json), pretty-printed with keys in
    /// their stored order.
    pub fn to_json_string(&self) -> Result<String, TfrecError> {
        Ok(serde_json::to_string_pretty(&self.dump()?)?)
    }

    fn dump(&self) -> Result<Vec<RecordDump>, TfrecError> {
        (0..self.len())
            .map(|index| {
                Ok(RecordDump {
                    features: self.example(index)?,
                })
            })
            .collect()
    }
}

#[derive(Serialize)]
struct RecordDump {
    features: Features,
}

/// Validates the frame starting at `position` and returns its payload and the
/// offset of the next frame.
fn read_frame(buf: &[u8], position: usize) -> Result<(&[u8], usize), CorruptionKind> {
    let available = buf.len() - position;
    if available < HEADER_SIZE {
        return Err(CorruptionKind::Truncated {
            needed: HEADER_SIZE as u64,
            available,
        });
    }

    let length_bytes = &buf[position..position + LENGTH_SIZE];
    let stored_length_crc = read_u32(buf, position + LENGTH_SIZE)?;
    let length_crc = masked_crc32c(length_bytes);
    if length_crc != stored_length_crc {
        return Err(CorruptionKind::LengthChecksum {
            expected: stored_length_crc,
            actual: length_crc,
        });
    }

    let length = read_u64(buf, position)?;
    let needed = (HEADER_SIZE as u64)
        .saturating_add(length)
        .saturating_add(CRC_SIZE as u64);
    if needed > available as u64 {
        return Err(CorruptionKind::Truncated { needed, available });
    }

    // Fits in the buffer, so it fits in usize.
    let data_start = position + HEADER_SIZE;
    let data_end = data_start + length as usize;
    let data = &buf[data_start..data_end];

    let stored_data_crc = read_u32(buf, data_end)?;
    let data_crc = masked_crc32c(data);
    if data_crc != stored_data_crc {
        return Err(CorruptionKind::DataChecksum {
            expected: stored_data_crc,
            actual: data_crc,
        });
    }

    Ok((data, data_end + CRC_SIZE))
}

fn read_u32(buf: &[u8], offset: usize) -> Result<u32, CorruptionKind> {
    read_int32(buf, offset).map_err(|_| CorruptionKind::Truncated {
        needed: CRC_SIZE as u64,
        available: buf.len().saturating_sub(offset),
    })
}

fn read_u64(buf: &[u8], offset: usize) -> Result<u64, CorruptionKind> {
    read_int64(buf, offset).map_err(|_| CorruptionKind::Truncated {
        needed: LENGTH_SIZE as u64,
        available: buf.len().saturating_sub(offset),
    })
}
