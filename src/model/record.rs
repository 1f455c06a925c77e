//! Per-request model input: the untrusted JSON body becomes a [`FeatureRecord`],
//! which is then aligned against the model's columns into a [`FeatureRow`].

use serde::Deserialize;
use serde_json::error::Category;
use std::collections::BTreeMap;
use thiserror::Error;

use super::error::InferenceError;

/// A single scalar input value.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum FeatureValue {
    Number(f64),
    Text(String),
}

/// The body was not usable as a feature record at all.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MalformedRequest {
    #[error("request body is not valid JSON")]
    Syntax,
    #[error("request body must be a JSON object mapping feature names to numbers or strings")]
    Shape,
}

/// One inference input: feature name to scalar value, ordered by name.
#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(transparent)]
pub struct FeatureRecord(BTreeMap<String, FeatureValue>);

impl FeatureRecord {
    /// Parses a request body. Anything other than a flat object of numbers and
    /// strings is rejected.
    pub fn from_json_slice(body: &[u8]) -> Result<Self, MalformedRequest> {
        serde_json::from_slice(body).map_err(|e| match e.classify() {
            Category::Data => MalformedRequest::Shape,
            Category::Io | Category::Syntax | Category::Eof => MalformedRequest::Syntax,
        })
    }

    pub fn get(&self, name: &str) -> Option<&FeatureValue> {
        self.0.get(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Lays the record out as one row in `columns` order.
    ///
    /// Every column must be present and no other key may appear; key order in
    /// the request does not matter.
    pub fn align<'a, S: AsRef<str>>(
        &'a self,
        columns: &[S],
    ) -> Result<FeatureRow<'a>, InferenceError> {
        let mut values = Vec::with_capacity(columns.len());
        for column in columns {
            let column = column.as_ref();
            let value = self
                .0
                .get(column)
                .ok_or_else(|| InferenceError::MissingFeature(column.to_string()))?;
            values.push(value);
        }

        if let Some(extra) = self
            .names()
            .find(|name| !columns.iter().any(|c| c.as_ref() == *name))
        {
            return Err(InferenceError::UnexpectedFeature(extra.to_string()));
        }

        Ok(FeatureRow { values })
    }
}

impl<K: Into<String>> FromIterator<(K, FeatureValue)> for FeatureRecord {
    fn from_iter<T: IntoIterator<Item = (K, FeatureValue)>>(iter: T) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

/// A record laid out in the model's column order.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow<'a> {
    values: Vec<&'a FeatureValue>,
}

impl<'a> FeatureRow<'a> {
    pub(crate) fn len(&self) -> usize {
        self.values.len()
    }

    #[cfg(test)]
    fn value(&self, column: usize) -> Option<&'a FeatureValue> {
        self.values.get(column).copied()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &'a FeatureValue> + '_ {
        self.values.iter().copied()
    }
}
