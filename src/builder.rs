//! TFRecords builder.
//!
//! [`TfRecordsBuilder`] accumulates typed features for a single `Example`;
//! [`build_tfrecords`] wraps any number of serialized examples in TFRecord
//! framing. A typical export loop looks like:
//!
//! ```
//! use tfrec::{build_tfrecords, FeatureType, TfRecordsBuilder};
//!
//! let mut builder = TfRecordsBuilder::new();
//! builder.add_feature("image/height", FeatureType::Int64, 480)?;
//! builder.add_feature("image/filename", FeatureType::String, "frame_001.jpg")?;
//! builder.add_array_feature("image/object/bbox/xmin", FeatureType::Float, [0.1, 0.4])?;
//!
//! let container = build_tfrecords(&[builder.build()]);
//! assert_eq!(container.len(), builder.build().len() + 16);
//! # Ok::<(), tfrec::TfrecError>(())
//! ```

use crate::checksum::{int32_buffer, int64_buffer, masked_crc32c, text_encode};
use crate::error::TfrecError;
use crate::feature::{Feature, FeatureType, FeatureValue, Features};
use crate::wire;

/// Bytes of framing around each record: length, length CRC and data CRC.
pub const FRAME_OVERHEAD: usize = 8 + 4 + 4;

/// Accumulates features for one `Example` record.
#[derive(Clone, Debug, Default)]
pub struct TfRecordsBuilder {
    features: Features,
}

impl TfRecordsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Frames `records` into one TFRecords buffer; see [`build_tfrecords`].
    pub fn build_tfrecords<R: AsRef<[u8]>>(records: &[R]) -> Vec<u8> {
        build_tfrecords(records)
    }

    /// Adds a single-value feature. Same as `add_array_feature(key, ty, [value])`.
    ///
    /// # Errors
    /// Returns [`TfrecError::UnsupportedFeatureType`] if `value` cannot be
    /// stored as `ty`.
    pub fn add_feature(
        &mut self,
        key: &str,
        ty: FeatureType,
        value: impl Into<FeatureValue>,
    ) -> Result<(), TfrecError> {
        self.add_array_feature(key, ty, [value])
    }

    /// Adds a feature holding a list of values, replacing any feature
    /// already stored under `key`.
    ///
    /// - `String`: text, UTF-8 encoded into a bytes list
    /// - `Binary`: raw bytes (text is accepted as its UTF-8 bytes)
    /// - `Int64`: integers
    /// - `Float`: floats, or integers converted to `f32`
    ///
    /// # Errors
    /// Returns [`TfrecError::UnsupportedFeatureType`] on the first value that
    /// does not fit `ty`. The builder is left unchanged in that case.
    pub fn add_array_feature<I>(
        &mut self,
        key: &str,
        ty: FeatureType,
        values: I,
    ) -> Result<(), TfrecError>
    where
        I: IntoIterator,
        I::Item: Into<FeatureValue>,
    {
        let values = values.into_iter().map(Into::<FeatureValue>::into);
        let mismatch = |value: &FeatureValue| TfrecError::UnsupportedFeatureType {
            key: key.to_owned(),
            expected: ty,
            found: value.kind(),
        };

        let feature = match ty {
            FeatureType::String => Feature::BytesList(
                values
                    .map(|value| match value {
                        FeatureValue::Text(text) => Ok(text_encode(&text)),
                        other => Err(mismatch(&other)),
                    })
                    .collect::<Result<_, _>>()?,
            ),
            FeatureType::Binary => Feature::BytesList(
                values
                    .map(|value| match value {
                        FeatureValue::Bytes(bytes) => Ok(bytes),
                        FeatureValue::Text(text) => Ok(text_encode(&text)),
                        other => Err(mismatch(&other)),
                    })
                    .collect::<Result<_, _>>()?,
            ),
            FeatureType::Int64 => Feature::Int64List(
                values
                    .map(|value| match value {
                        FeatureValue::Int(int) => Ok(int),
                        other => Err(mismatch(&other)),
                    })
                    .collect::<Result<_, _>>()?,
            ),
            FeatureType::Float => Feature::FloatList(
                values
                    .map(|value| match value {
                        FeatureValue::Float(float) => Ok(float),
                        FeatureValue::Int(int) => Ok(int as f32),
                        other => Err(mismatch(&other)),
                    })
                    .collect::<Result<_, _>>()?,
            ),
        };

        self.features.insert(key, feature);
        Ok(())
    }

    pub fn add_int_feature(&mut self, key: &str, value: i64) {
        self.add_int_array_feature(key, vec![value]);
    }

    pub fn add_float_feature(&mut self, key: &str, value: f32) {
        self.add_float_array_feature(key, vec![value]);
    }

    pub fn add_string_feature(&mut self, key: &str, value: &str) {
        self.add_binary_array_feature(key, vec![text_encode(value)]);
    }

    pub fn add_binary_feature(&mut self, key: &str, value: &[u8]) {
        self.add_binary_array_feature(key, vec![value.to_vec()]);
    }

    pub fn add_int_array_feature(&mut self, key: &str, values: Vec<i64>) {
        self.features.insert(key, Feature::Int64List(values));
    }

    pub fn add_float_array_feature(&mut self, key: &str, values: Vec<f32>) {
        self.features.insert(key, Feature::FloatList(values));
    }

    pub fn add_string_array_feature<S: AsRef<str>>(&mut self, key: &str, values: &[S]) {
        let bytes = values
            .iter()
            .map(|value| text_encode(value.as_ref()))
            .collect();
        self.add_binary_array_feature(key, bytes);
    }

    pub fn add_binary_array_feature(&mut self, key: &str, values: Vec<Vec<u8>>) {
        self.features.insert(key, Feature::BytesList(values));
    }

    /// Features accumulated so far, in insertion order.
    pub fn features(&self) -> &Features {
        &self.features
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Serializes everything added so far as one `Example` message.
    ///
    /// Calling this does not reset the builder, and repeated calls on the
    /// same state return identical bytes.
    pub fn build(&self) -> Vec<u8> {
        wire::encode_example(&self.features)
    }
}

/// Wraps each record in TFRecord framing and concatenates them in order.
///
/// The output holds exactly `sum(len) + 16 * records.len()` bytes.
pub fn build_tfrecords<R: AsRef<[u8]>>(records: &[R]) -> Vec<u8> {
    let total: usize = records
        .iter()
        .map(|record| record.as_ref().len() + FRAME_OVERHEAD)
        .sum();

    let mut out = Vec::with_capacity(total);
    for record in records {
        write_record(&mut out, record.as_ref());
    }
    out
}

/// Appends one framed record to `out`.
pub fn write_record(out: &mut Vec<u8>, data: &[u8]) {
    let length = int64_buffer(data.len() as u64);

    out.extend_from_slice(&length);
    out.extend_from_slice(&int32_buffer(masked_crc32c(&length)));
    out.extend_from_slice(data);
    out.extend_from_slice(&int32_buffer(masked_crc32c(data)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checksum::{mask_crc, read_int32, read_int64};

    fn height_bytes(prefix: &[u8], suffix: &[u8]) -> Vec<u8> {
        let mut out = prefix.to_vec();
        out.extend_from_slice(b"image/height");
        out.extend_from_slice(suffix);
        out
    }

    #[test]
    fn test_add_int_feature() {
        let mut builder = TfRecordsBuilder::new();
        builder
            .add_feature("image/height", FeatureType::Int64, 123)
            .expect("add");

        assert_eq!(
            builder.build(),
            height_bytes(&[10, 23, 10, 21, 10, 12], &[18, 5, 26, 3, 10, 1, 123])
        );
    }

    #[test]
    fn test_add_float_feature() {
        let mut builder = TfRecordsBuilder::new();
        builder
            .add_feature("image/height", FeatureType::Float, 123.0)
            .expect("add");

        assert_eq!(
            builder.build(),
            height_bytes(&[10, 26, 10, 24, 10, 12], &[18, 8, 18, 6, 10, 4, 0, 0, 246, 66])
        );
    }

    #[test]
    fn test_add_string_feature() {
        let mut builder = TfRecordsBuilder::new();
        builder
            .add_feature("image/height", FeatureType::String, "123")
            .expect("add");

        assert_eq!(
            builder.build(),
            height_bytes(&[10, 25, 10, 23, 10, 12], &[18, 7, 10, 5, 10, 3, 49, 50, 51])
        );
    }

    #[test]
    fn test_typed_helpers_match_generic_api() {
        let mut generic = TfRecordsBuilder::new();
        generic.add_feature("h", FeatureType::Int64, 480).unwrap();
        generic.add_feature("x", FeatureType::Float, 0.25f32).unwrap();
        generic.add_feature("n", FeatureType::String, "a.jpg").unwrap();
        generic
            .add_feature("e", FeatureType::Binary, vec![0u8, 1, 2])
            .unwrap();
        generic
            .add_array_feature("t", FeatureType::String, ["cat", "dog"])
            .unwrap();

        let mut typed = TfRecordsBuilder::new();
        typed.add_int_feature("h", 480);
        typed.add_float_feature("x", 0.25);
        typed.add_string_feature("n", "a.jpg");
        typed.add_binary_feature("e", &[0, 1, 2]);
        typed.add_string_array_feature("t", &["cat", "dog"]);

        assert_eq!(generic.build(), typed.build());
    }

    #[test]
    fn test_last_write_wins() {
        let mut builder = TfRecordsBuilder::new();
        builder
            .add_array_feature("image/height", FeatureType::Int64, [1, 2])
            .unwrap();
        builder
            .add_array_feature("image/height", FeatureType::Float, [1.0, 2.0])
            .unwrap();
        builder
            .add_array_feature("image/height", FeatureType::String, ["1", "2"])
            .unwrap();

        assert_eq!(builder.len(), 1);
        let buffer = builder.build();
        assert_eq!(buffer.len(), 28);

        let tfrecords = build_tfrecords(&[&buffer]);
        assert_eq!(tfrecords.len(), 28 + FRAME_OVERHEAD);
    }

    #[test]
    fn test_mismatched_value_is_rejected_and_builder_unchanged() {
        let mut builder = TfRecordsBuilder::new();
        builder.add_int_feature("label", 3);
        let before = builder.build();

        let err = builder
            .add_array_feature(
                "label",
                FeatureType::Int64,
                [FeatureValue::Int(1), FeatureValue::Text("x".into())],
            )
            .unwrap_err();

        assert!(matches!(
            err,
            TfrecError::UnsupportedFeatureType {
                expected: FeatureType::Int64,
                ..
            }
        ));
        assert_eq!(builder.build(), before);
    }

    #[test]
    fn test_float_feature_accepts_integers() {
        let mut builder = TfRecordsBuilder::new();
        builder.add_feature("f", FeatureType::Float, 2).unwrap();
        assert_eq!(builder.features().get("f"), Some(&Feature::FloatList(vec![2.0])));
    }

    #[test]
    fn test_string_feature_rejects_bytes() {
        let mut builder = TfRecordsBuilder::new();
        let result = builder.add_feature("s", FeatureType::String, vec![1u8]);
        assert!(result.is_err());
        assert!(builder.is_empty());
    }

    #[test]
    fn test_string_features_are_utf8_encoded() {
        let mut builder = TfRecordsBuilder::new();
        builder
            .add_feature("label", FeatureType::String, "é✓")
            .unwrap();
        builder.add_string_array_feature("names", &["猫", "a"]);

        assert_eq!(
            builder.features().get("label"),
            Some(&Feature::BytesList(vec![vec![0xC3, 0xA9, 0xE2, 0x9C, 0x93]]))
        );
        assert_eq!(
            builder.features().get("names"),
            Some(&Feature::BytesList(vec![
                vec![0xE7, 0x8C, 0xAB],
                vec![b'a']
            ]))
        );
    }

    #[test]
    fn test_unsigned_dimensions_convert_through_i64() {
        let width: usize = 640;
        let mut builder = TfRecordsBuilder::new();
        builder
            .add_feature("image/width", FeatureType::Int64, i64::try_from(width).unwrap())
            .unwrap();
        assert_eq!(
            builder.features().get("image/width"),
            Some(&Feature::Int64List(vec![640]))
        );

        assert!(i64::try_from(u64::MAX).is_err());
    }

    #[test]
    fn test_build_is_cumulative_and_deterministic() {
        let mut builder = TfRecordsBuilder::new();
        builder.add_int_feature("a", 1);
        let first = builder.build();
        assert_eq!(first, builder.build());

        builder.add_int_feature("b", 2);
        let second = builder.build();
        assert!(second.len() > first.len());
        assert!(builder.features().contains_key("a"));
    }

    #[test]
    fn test_frame_layout() {
        let data = b"payload";
        let framed = build_tfrecords(&[data]);

        assert_eq!(framed.len(), data.len() + FRAME_OVERHEAD);
        assert_eq!(read_int64(&framed, 0).unwrap(), data.len() as u64);
        assert_eq!(
            read_int32(&framed, 8).unwrap(),
            mask_crc(crate::checksum::crc32c(&framed[..8]))
        );
        assert_eq!(&framed[12..12 + data.len()], data);
        assert_eq!(
            read_int32(&framed, 12 + data.len()).unwrap(),
            masked_crc32c(data)
        );
    }

    #[test]
    fn test_two_records_size_law() {
        let framed = TfRecordsBuilder::build_tfrecords(&[vec![1u8; 10], vec![2u8; 3]]);
        assert_eq!(framed.len(), 10 + 3 + 2 * FRAME_OVERHEAD);
    }

    #[test]
    fn test_build_tfrecords_empty_input() {
        let records: [&[u8]; 0] = [];
        assert!(build_tfrecords(&records).is_empty());
    }
}
