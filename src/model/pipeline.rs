//! Column preprocessing followed by an estimator, deserialized from the
//! model artifact.

use serde::Deserialize;
use std::collections::HashSet;

use super::Predictor;
use super::error::{InferenceError, LoadError};
use super::estimator::{Estimator, Prediction};
use super::record::{FeatureRecord, FeatureRow, FeatureValue};

#[derive(Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum HandleUnknown {
    #[default]
    Error,
    /// Unknown categories encode as an all-zero block.
    Ignore,
}

/// How one input column becomes one or more encoded columns.
#[derive(Deserialize, Debug, Clone)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FeatureSpec {
    Numeric {
        name: String,
        #[serde(default)]
        mean: Option<f64>,
        #[serde(default)]
        scale: Option<f64>,
    },
    Categorical {
        name: String,
        categories: Vec<String>,
        #[serde(default)]
        handle_unknown: HandleUnknown,
    },
}

impl FeatureSpec {
    pub fn name(&self) -> &str {
        match self {
            FeatureSpec::Numeric { name, .. } | FeatureSpec::Categorical { name, .. } => name,
        }
    }

    fn width(&self) -> usize {
        match self {
            FeatureSpec::Numeric { .. } => 1,
            FeatureSpec::Categorical { categories, .. } => categories.len(),
        }
    }

    fn validate(&self) -> Result<(), LoadError> {
        let name = self.name();
        match self {
            FeatureSpec::Numeric { mean, scale, .. } => {
                if mean.is_some_and(|m| !m.is_finite()) {
                    return Err(LoadError::Invalid(format!(
                        "feature '{name}' has a non-finite mean"
                    )));
                }
                if scale.is_some_and(|s| !s.is_finite() || s == 0.0) {
                    return Err(LoadError::Invalid(format!(
                        "feature '{name}' must have a finite, non-zero scale"
                    )));
                }
            }
            FeatureSpec::Categorical { categories, .. } => {
                if categories.is_empty() {
                    return Err(LoadError::Invalid(format!(
                        "feature '{name}' has no categories"
                    )));
                }
                let mut seen = HashSet::new();
                if let Some(dup) = categories.iter().find(|c| !seen.insert(c.as_str())) {
                    return Err(LoadError::Invalid(format!(
                        "feature '{name}' lists category '{dup}' twice"
                    )));
                }
            }
        }
        Ok(())
    }

    fn encode_into(&self, value: &FeatureValue, out: &mut Vec<f64>) -> Result<(), InferenceError> {
        match self {
            FeatureSpec::Numeric { name, mean, scale } => {
                let x = match value {
                    FeatureValue::Number(n) => *n,
                    // Form inputs often arrive as strings; accept them when they parse.
                    FeatureValue::Text(s) => s.trim().parse::<f64>().map_err(|_| {
                        InferenceError::TypeMismatch {
                            feature: name.clone(),
                            expected: "a number",
                        }
                    })?,
                };
                if !x.is_finite() {
                    return Err(InferenceError::InvalidValue {
                        feature: name.clone(),
                        reason: "value must be finite".to_string(),
                    });
                }
                out.push((x - mean.unwrap_or(0.0)) / scale.unwrap_or(1.0));
            }
            FeatureSpec::Categorical {
                name,
                categories,
                handle_unknown,
            } => {
                let FeatureValue::Text(s) = value else {
                    return Err(InferenceError::TypeMismatch {
                        feature: name.clone(),
                        expected: "a string",
                    });
                };
                let hit = categories.iter().position(|c| c == s);
                if hit.is_none() && *handle_unknown == HandleUnknown::Error {
                    return Err(InferenceError::UnknownCategory {
                        feature: name.clone(),
                        value: s.clone(),
                    });
                }
                out.extend((0..categories.len()).map(|i| if Some(i) == hit { 1.0 } else { 0.0 }));
            }
        }
        Ok(())
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct Pipeline {
    features: Vec<FeatureSpec>,
    estimator: Estimator,
    #[serde(skip)]
    columns: Vec<String>,
}

impl Pipeline {
    /// Builds and validates a pipeline; the same checks run when loading an
    /// artifact from disk.
    pub fn new(features: Vec<FeatureSpec>, estimator: Estimator) -> Result<Self, LoadError> {
        Self {
            features,
            estimator,
            columns: Vec::new(),
        }
        .validated()
    }

    pub(crate) fn validated(mut self) -> Result<Self, LoadError> {
        if self.features.is_empty() {
            return Err(LoadError::Invalid("pipeline declares no features".to_string()));
        }
        let mut seen = HashSet::new();
        for spec in &self.features {
            if spec.name().is_empty() {
                return Err(LoadError::Invalid("feature name must not be empty".to_string()));
            }
            if !seen.insert(spec.name()) {
                return Err(LoadError::Invalid(format!(
                    "feature '{}' is declared twice",
                    spec.name()
                )));
            }
            spec.validate()?;
        }
        self.estimator.validate(self.encoded_width())?;
        self.columns = self.features.iter().map(|f| f.name().to_string()).collect();
        Ok(self)
    }

    fn encoded_width(&self) -> usize {
        self.features.iter().map(FeatureSpec::width).sum()
    }

    /// Encodes an aligned row into the dense vector the estimator consumes.
    pub fn encode(&self, row: &FeatureRow<'_>) -> Result<Vec<f64>, InferenceError> {
        if row.len() != self.features.len() {
            return Err(InferenceError::Internal(format!(
                "row has {} values for {} features",
                row.len(),
                self.features.len()
            )));
        }
        let mut out = Vec::with_capacity(self.encoded_width());
        for (spec, value) in self.features.iter().zip(row.iter()) {
            spec.encode_into(value, &mut out)?;
        }
        Ok(out)
    }
}

impl Predictor for Pipeline {
    fn feature_names(&self) -> &[String] {
        &self.columns
    }

    fn predict(&self, record: &FeatureRecord) -> Result<Prediction, InferenceError> {
        let row = record.align(&self.columns)?;
        let x = self.encode(&row)?;
        self.estimator.predict(&x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numeric(name: &str) -> FeatureSpec {
        FeatureSpec::Numeric {
            name: name.to_string(),
            mean: None,
            scale: None,
        }
    }

    fn region(handle_unknown: HandleUnknown) -> FeatureSpec {
        FeatureSpec::Categorical {
            name: "region".to_string(),
            categories: vec!["north".to_string(), "south".to_string()],
            handle_unknown,
        }
    }

    fn pipeline(handle_unknown: HandleUnknown) -> Pipeline {
        Pipeline::new(
            vec![numeric("age"), region(handle_unknown)],
            Estimator::LinearRegression {
                coefficients: vec![10.0, 100.0, 200.0],
                intercept: 1.0,
            },
        )
        .unwrap()
    }

    fn record(pairs: &[(&str, FeatureValue)]) -> FeatureRecord {
        pairs.iter().cloned().collect()
    }

    #[test]
    fn test_predicts_through_one_hot_encoding() {
        let p = pipeline(HandleUnknown::Error);
        let r = record(&[
            ("region", FeatureValue::Text("south".to_string())),
            ("age", FeatureValue::Number(3.0)),
        ]);
        assert_eq!(p.predict(&r).unwrap(), Prediction::Float(231.0));
        assert_eq!(p.feature_names(), ["age".to_string(), "region".to_string()]);
    }

    #[test]
    fn test_numeric_strings_are_coerced() {
        let p = pipeline(HandleUnknown::Error);
        let r = record(&[
            ("age", FeatureValue::Text(" 3 ".to_string())),
            ("region", FeatureValue::Text("north".to_string())),
        ]);
        assert_eq!(p.predict(&r).unwrap(), Prediction::Float(131.0));
    }

    #[test]
    fn test_type_mismatches_are_input_errors() {
        let p = pipeline(HandleUnknown::Error);
        let bad_numeric = record(&[
            ("age", FeatureValue::Text("thirty".to_string())),
            ("region", FeatureValue::Text("north".to_string())),
        ]);
        assert_eq!(
            p.predict(&bad_numeric),
            Err(InferenceError::TypeMismatch {
                feature: "age".to_string(),
                expected: "a number",
            })
        );

        let bad_category = record(&[
            ("age", FeatureValue::Number(3.0)),
            ("region", FeatureValue::Number(1.0)),
        ]);
        assert!(p.predict(&bad_category).unwrap_err().is_input_error());
    }

    #[test]
    fn test_unknown_category_follows_handle_unknown() {
        let r = record(&[
            ("age", FeatureValue::Number(3.0)),
            ("region", FeatureValue::Text("east".to_string())),
        ]);
        assert_eq!(
            pipeline(HandleUnknown::Error).predict(&r),
            Err(InferenceError::UnknownCategory {
                feature: "region".to_string(),
                value: "east".to_string(),
            })
        );
        assert_eq!(
            pipeline(HandleUnknown::Ignore).predict(&r).unwrap(),
            Prediction::Float(31.0)
        );
    }

    #[test]
    fn test_standardisation_is_applied() {
        let p = Pipeline::new(
            vec![FeatureSpec::Numeric {
                name: "bmi".to_string(),
                mean: Some(30.0),
                scale: Some(5.0),
            }],
            Estimator::LinearRegression {
                coefficients: vec![2.0],
                intercept: 0.0,
            },
        )
        .unwrap();
        let r = record(&[("bmi", FeatureValue::Number(40.0))]);
        assert_eq!(p.predict(&r).unwrap(), Prediction::Float(4.0));
    }

    #[test]
    fn test_invalid_pipelines_are_rejected() {
        let dup = Pipeline::new(
            vec![numeric("age"), numeric("age")],
            Estimator::LinearRegression {
                coefficients: vec![1.0, 1.0],
                intercept: 0.0,
            },
        );
        assert!(matches!(dup, Err(LoadError::Invalid(_))));

        let zero_scale = Pipeline::new(
            vec![FeatureSpec::Numeric {
                name: "bmi".to_string(),
                mean: None,
                scale: Some(0.0),
            }],
            Estimator::LinearRegression {
                coefficients: vec![1.0],
                intercept: 0.0,
            },
        );
        assert!(zero_scale.is_err());

        let wrong_width = Pipeline::new(
            vec![numeric("age"), region(HandleUnknown::Error)],
            Estimator::LinearRegression {
                coefficients: vec![1.0, 1.0],
                intercept: 0.0,
            },
        );
        assert!(wrong_width.is_err());
    }
}
