#![allow(dead_code)]

use std::collections::BTreeSet;

use proptest::prelude::*;
use proptest::strategy::BoxedStrategy;
use proptest::test_runner::{Config as ProptestConfig, FileFailurePersistence};
use tfrec::{Feature, FeatureType, FeatureValues, TfRecordsBuilder};

pub fn proptest_config() -> ProptestConfig {
    let cases = std::env::var("PROPTEST_CASES")
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(64);

    let mut config = ProptestConfig::with_failure_persistence(FileFailurePersistence::WithSource(
        "proptest-regressions",
    ));
    config.cases = cases;
    config.max_shrink_iters = 1024;
    config
}

/// One feature as a caller would add it: declared type plus typed values.
#[derive(Clone, Debug, PartialEq)]
pub enum FeatureSpec {
    Strings(Vec<String>),
    Binaries(Vec<Vec<u8>>),
    Int64s(Vec<i64>),
    Floats(Vec<f32>),
}

impl FeatureSpec {
    pub fn feature_type(&self) -> FeatureType {
        match self {
            FeatureSpec::Strings(_) => FeatureType::String,
            FeatureSpec::Binaries(_) => FeatureType::Binary,
            FeatureSpec::Int64s(_) => FeatureType::Int64,
            FeatureSpec::Floats(_) => FeatureType::Float,
        }
    }

    /// What a lookup with [`Self::feature_type`] must return.
    pub fn expected(&self) -> FeatureValues {
        match self.clone() {
            FeatureSpec::Strings(values) => FeatureValues::Strings(values),
            FeatureSpec::Binaries(values) => FeatureValues::Binaries(values),
            FeatureSpec::Int64s(values) => FeatureValues::Int64s(values),
            FeatureSpec::Floats(values) => FeatureValues::Floats(values),
        }
    }

    /// The stored feature these values encode to.
    pub fn stored(&self) -> Feature {
        match self.clone() {
            FeatureSpec::Strings(values) => {
                Feature::BytesList(values.into_iter().map(String::into_bytes).collect())
            }
            FeatureSpec::Binaries(values) => Feature::BytesList(values),
            FeatureSpec::Int64s(values) => Feature::Int64List(values),
            FeatureSpec::Floats(values) => Feature::FloatList(values),
        }
    }
}

pub fn feature_key_strategy() -> impl Strategy<Value = String> {
    "[a-z]{1,8}(/[a-z_]{1,10}){0,3}"
}

pub fn arb_feature_spec(max_values: usize) -> BoxedStrategy<FeatureSpec> {
    prop_oneof![
        proptest::collection::vec(any::<String>(), 0..=max_values).prop_map(FeatureSpec::Strings),
        proptest::collection::vec(proptest::collection::vec(any::<u8>(), 0..64), 0..=max_values)
            .prop_map(FeatureSpec::Binaries),
        proptest::collection::vec(any::<i64>(), 0..=max_values).prop_map(FeatureSpec::Int64s),
        proptest::collection::vec(-1.0e6f32..1.0e6f32, 0..=max_values)
            .prop_map(FeatureSpec::Floats),
    ]
    .boxed()
}

/// A set of features with unique keys, in the order they should be added.
pub fn arb_feature_set(
    max_features: usize,
    max_values: usize,
) -> BoxedStrategy<Vec<(String, FeatureSpec)>> {
    proptest::collection::vec(
        (feature_key_strategy(), arb_feature_spec(max_values)),
        0..=max_features,
    )
    .prop_map(|entries| {
        let mut seen = BTreeSet::new();
        entries
            .into_iter()
            .filter(|(key, _)| seen.insert(key.clone()))
            .collect()
    })
    .boxed()
}

pub fn builder_for(features: &[(String, FeatureSpec)]) -> TfRecordsBuilder {
    let mut builder = TfRecordsBuilder::new();
    for (key, spec) in features {
        let result = match spec.clone() {
            FeatureSpec::Strings(values) => {
                builder.add_array_feature(key, FeatureType::String, values)
            }
            FeatureSpec::Binaries(values) => {
                builder.add_array_feature(key, FeatureType::Binary, values)
            }
            FeatureSpec::Int64s(values) => builder.add_array_feature(key, FeatureType::Int64, values),
            FeatureSpec::Floats(values) => builder.add_array_feature(key, FeatureType::Float, values),
        };
        result.expect("typed values always fit their declared type");
    }
    builder
}
