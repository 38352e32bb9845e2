//! Feature types for the `tf.Example` schema.
//!
//! A [`Feature`] is always a list, even when it carries a single scalar. A
//! [`Features`] map keeps its keys in first-insertion order so that encoded
//! examples are byte-for-byte reproducible.

use std::fmt;

use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

/// The declared type of a feature, chosen by the caller when adding it.
///
/// `String` and `Binary` share the `bytes_list` wire representation; they
/// differ only in how the input is turned into bytes and how a lookup
/// projects the stored bytes back.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FeatureType {
    String,
    Binary,
    Int64,
    Float,
}

impl FeatureType {
    /// The wire representation this type is stored as.
    pub fn kind(self) -> FeatureKind {
        match self {
            FeatureType::String | FeatureType::Binary => FeatureKind::BytesList,
            FeatureType::Int64 => FeatureKind::Int64List,
            FeatureType::Float => FeatureKind::FloatList,
        }
    }
}

impl fmt::Display for FeatureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FeatureType::String => "String",
            FeatureType::Binary => "Binary",
            FeatureType::Int64 => "Int64",
            FeatureType::Float => "Float",
        };
        f.write_str(name)
    }
}

/// Which `oneof kind` branch a stored feature uses.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FeatureKind {
    BytesList,
    FloatList,
    Int64List,
}

impl fmt::Display for FeatureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FeatureKind::BytesList => "bytes_list",
            FeatureKind::FloatList => "float_list",
            FeatureKind::Int64List => "int64_list",
        };
        f.write_str(name)
    }
}

/// A single caller-supplied value, before it is checked against a [`FeatureType`].
///
/// Integers convert from every type that fits in `i64` without loss. `u64`
/// and `usize` are left out because values above `i64::MAX` have no `int64`
/// representation; convert them with `i64::try_from` so an overflow surfaces
/// at the call site:
///
/// ```
/// use tfrec::{FeatureType, TfRecordsBuilder};
///
/// let width: usize = 640;
/// let mut builder = TfRecordsBuilder::new();
/// builder.add_feature("image/width", FeatureType::Int64, i64::try_from(width)?)?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Clone, Debug, PartialEq)]
pub enum FeatureValue {
    Text(String),
    Bytes(Vec<u8>),
    Int(i64),
    Float(f32),
}

impl FeatureValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            FeatureValue::Text(_) => ValueKind::Text,
            FeatureValue::Bytes(_) => ValueKind::Bytes,
            FeatureValue::Int(_) => ValueKind::Int,
            FeatureValue::Float(_) => ValueKind::Float,
        }
    }
}

/// Runtime kind of a [`FeatureValue`], reported when a value does not fit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValueKind {
    Text,
    Bytes,
    Int,
    Float,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::Text => "text",
            ValueKind::Bytes => "bytes",
            ValueKind::Int => "integer",
            ValueKind::Float => "float",
        };
        f.write_str(name)
    }
}

impl From<&str> for FeatureValue {
    fn from(value: &str) -> Self {
        FeatureValue::Text(value.to_owned())
    }
}

impl From<String> for FeatureValue {
    fn from(value: String) -> Self {
        FeatureValue::Text(value)
    }
}

impl From<&String> for FeatureValue {
    fn from(value: &String) -> Self {
        FeatureValue::Text(value.clone())
    }
}

impl From<Vec<u8>> for FeatureValue {
    fn from(value: Vec<u8>) -> Self {
        FeatureValue::Bytes(value)
    }
}

impl From<&[u8]> for FeatureValue {
    fn from(value: &[u8]) -> Self {
        FeatureValue::Bytes(value.to_vec())
    }
}

impl<const N: usize> From<&[u8; N]> for FeatureValue {
    fn from(value: &[u8; N]) -> Self {
        FeatureValue::Bytes(value.to_vec())
    }
}

macro_rules! int_feature_value {
    ($($t:ty),*) => {
        $(
            impl From<$t> for FeatureValue {
                fn from(value: $t) -> Self {
                    FeatureValue::Int(i64::from(value))
                }
            }
        )*
    };
}

int_feature_value!(i8, i16, i32, i64, u8, u16, u32);

impl From<f32> for FeatureValue {
    fn from(value: f32) -> Self {
        FeatureValue::Float(value)
    }
}

impl From<f64> for FeatureValue {
    fn from(value: f64) -> Self {
        FeatureValue::Float(value as f32)
    }
}

/// A stored feature: one typed value list.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    #[serde(serialize_with = "serialize_byte_values")]
    BytesList(Vec<Vec<u8>>),
    FloatList(Vec<f32>),
    Int64List(Vec<i64>),
}

impl Feature {
    pub fn kind(&self) -> FeatureKind {
        match self {
            Feature::BytesList(_) => FeatureKind::BytesList,
            Feature::FloatList(_) => FeatureKind::FloatList,
            Feature::Int64List(_) => FeatureKind::Int64List,
        }
    }

    /// Number of values in the list.
    pub fn len(&self) -> usize {
        match self {
            Feature::BytesList(values) => values.len(),
            Feature::FloatList(values) => values.len(),
            Feature::Int64List(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Bytes that are valid UTF-8 render as strings, anything else as a number array.
fn serialize_byte_values<S: Serializer>(
    values: &[Vec<u8>],
    serializer: S,
) -> Result<S::Ok, S::Error> {
    let mut seq = serializer.serialize_seq(Some(values.len()))?;
    for value in values {
        match std::str::from_utf8(value) {
            Ok(text) => seq.serialize_element(text)?,
            Err(_) => seq.serialize_element(value)?,
        }
    }
    seq.end()
}

/// A feature name -> [`Feature`] map that iterates in first-insertion order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Features {
    entries: Vec<(String, Feature)>,
}

impl Features {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a feature, returning the previous value.
    ///
    /// A replaced key keeps its original position.
    pub fn insert(&mut self, key: impl Into<String>, feature: Feature) -> Option<Feature> {
        let key = key.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => Some(std::mem::replace(slot, feature)),
            None => {
                self.entries.push((key, feature));
                None
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&Feature> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, feature)| feature)
    }

    /// Removes and returns the feature stored under `key`.
    pub fn remove(&mut self, key: &str) -> Option<Feature> {
        let position = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(position).1)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Feature)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }
}

impl<K: Into<String>> FromIterator<(K, Feature)> for Features {
    fn from_iter<I: IntoIterator<Item = (K, Feature)>>(iter: I) -> Self {
        let mut features = Features::new();
        for (key, feature) in iter {
            features.insert(key, feature);
        }
        features
    }
}

impl Serialize for Features {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, feature) in &self.entries {
            map.serialize_entry(key, feature)?;
        }
        map.end()
    }
}

/// A feature's values projected to the representation implied by a [`FeatureType`].
#[derive(Clone, Debug, PartialEq)]
pub enum FeatureValues {
    Strings(Vec<String>),
    Binaries(Vec<Vec<u8>>),
    Int64s(Vec<i64>),
    Floats(Vec<f32>),
}

impl FeatureValues {
    pub fn len(&self) -> usize {
        match self {
            FeatureValues::Strings(values) => values.len(),
            FeatureValues::Binaries(values) => values.len(),
            FeatureValues::Int64s(values) => values.len(),
            FeatureValues::Floats(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
