//! Labelled feature matrices.
//!
//! Serialized as `{"features": [[..], ..], "labels": [..]}` in JSON or YAML.

use std::collections::BTreeSet;
use std::path::Path;

use ndarray::{Array2, ArrayView2, Axis};
use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::config::{read_document, write_document};
use crate::error::{DruError, DruResult};

/// A feature matrix (one sample per row) with one class index per row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawDataset", into = "RawDataset")]
pub struct Dataset {
    features: Array2<f64>,
    labels: Vec<usize>,
}

#[derive(Serialize, Deserialize)]
struct RawDataset {
    features: Vec<Vec<f64>>,
    labels: Vec<usize>,
}

impl TryFrom<RawDataset> for Dataset {
    type Error = DruError;

    fn try_from(raw: RawDataset) -> Result<Self, Self::Error> {
        Dataset::from_rows(raw.features, raw.labels)
    }
}

impl From<Dataset> for RawDataset {
    fn from(data: Dataset) -> Self {
        RawDataset {
            features: data.features.rows().into_iter().map(|r| r.to_vec()).collect(),
            labels: data.labels,
        }
    }
}

impl Dataset {
    /// Pair a feature matrix with its labels.
    pub fn new(features: Array2<f64>, labels: Vec<usize>) -> DruResult<Self> {
        if features.nrows() != labels.len() {
            return Err(DruError::ShapeMismatch(format!(
                "{} feature rows but {} labels",
                features.nrows(),
                labels.len()
            )));
        }
        Ok(Self { features, labels })
    }

    /// Build from row vectors, which must all have the same length.
    pub fn from_rows(rows: Vec<Vec<f64>>, labels: Vec<usize>) -> DruResult<Self> {
        let width = rows.first().map_or(0, Vec::len);
        if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != width) {
            return Err(DruError::ShapeMismatch(format!(
                "row {i} has {} features, row 0 has {width}",
                row.len()
            )));
        }
        let n = rows.len();
        let flat: Vec<f64> = rows.into_iter().flatten().collect();
        let features = Array2::from_shape_vec((n, width), flat)
            .map_err(|e| DruError::ShapeMismatch(e.to_string()))?;
        Self::new(features, labels)
    }

    /// Load from a JSON or YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> DruResult<Self> {
        read_document(path.as_ref())
    }

    /// Write to a JSON or YAML file.
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> DruResult<()> {
        write_document(path.as_ref(), self)
    }

    /// Feature matrix.
    pub fn features(&self) -> ArrayView2<'_, f64> {
        self.features.view()
    }

    /// Class index per sample.
    pub fn labels(&self) -> &[usize] {
        &self.labels
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// True when there are no samples.
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Features per sample.
    pub fn num_features(&self) -> usize {
        self.features.ncols()
    }

    /// Distinct labels, ascending.
    pub fn classes(&self) -> Vec<usize> {
        self.labels.iter().copied().collect::<BTreeSet<_>>().into_iter().collect()
    }

    /// `max label + 1`, or 0 when empty.
    pub fn num_classes(&self) -> usize {
        self.labels.iter().max().map_or(0, |m| m + 1)
    }

    /// The samples at `indices`, in that order.
    pub fn select(&self, indices: &[usize]) -> DruResult<Self> {
        if let Some(&bad) = indices.iter().find(|&&i| i >= self.len()) {
            return Err(DruError::InvalidInput(format!(
                "sample index {bad} out of range for {} samples",
                self.len()
            )));
        }
        Ok(Self {
            features: self.features.select(Axis(0), indices),
            labels: indices.iter().map(|&i| self.labels[i]).collect(),
        })
    }

    /// Shuffle and split into `(train, validation)`; `validation_fraction`
    /// of the samples (rounded) go to the second set.
    pub fn train_validation_split<R: Rng + ?Sized>(
        &self,
        validation_fraction: f64,
        rng: &mut R,
    ) -> DruResult<(Self, Self)> {
        if !(0.0..1.0).contains(&validation_fraction) {
            return Err(DruError::InvalidInput(format!(
                "validation fraction must lie in [0, 1), got {validation_fraction}"
            )));
        }
        let mut order: Vec<usize> = (0..self.len()).collect();
        order.shuffle(rng);
        let n_val = (self.len() as f64 * validation_fraction).round() as usize;
        let (val, train) = order.split_at(n_val);
        Ok((self.select(train)?, self.select(val)?))
    }
}
