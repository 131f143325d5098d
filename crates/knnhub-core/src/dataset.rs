//! Dataset contracts consumed by the engines.
//!
//! Loading and representing data is the caller's business. The engines only
//! need instance count, a category per instance and access to the raw
//! feature vector, which is what [`Dataset`] exposes. [`DenseDataset`] is a
//! minimal in-memory implementation; [`Cluster`] is an index subset of a
//! dataset used by the approximate builder.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Read-only access to labelled feature vectors.
pub trait Dataset: Sync {
    /// Number of instances.
    fn len(&self) -> usize;

    /// Returns true if the dataset has no instances.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Category of instance `index`, in `[0, num_categories)`.
    fn label(&self, index: usize) -> usize;

    /// Number of distinct categories.
    fn num_categories(&self) -> usize;

    /// Feature vector of instance `index`.
    fn instance(&self, index: usize) -> &[f32];
}

/// Per-instance categories, detached from the feature vectors.
///
/// Neighbor-set engines keep only this much of a dataset: statistics need
/// labels, distances come from a matrix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Labels {
    labels: Vec<usize>,
    num_categories: usize,
}

impl Labels {
    /// Creates a label source.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParameter`] if any label is `>= num_categories`.
    pub fn new(labels: Vec<usize>, num_categories: usize) -> Result<Self> {
        if let Some(bad) = labels.iter().find(|&&l| l >= num_categories) {
            return Err(Error::InvalidParameter(format!(
                "label {bad} outside [0, {num_categories})"
            )));
        }
        Ok(Self {
            labels,
            num_categories,
        })
    }

    /// Creates a label source inferring the category count from the maximum label.
    #[must_use]
    pub fn from_labels(labels: Vec<usize>) -> Self {
        let num_categories = labels.iter().max().map_or(0, |&m| m + 1);
        Self {
            labels,
            num_categories,
        }
    }

    /// Copies the labels out of a dataset.
    #[must_use]
    pub fn from_dataset<D: Dataset + ?Sized>(dataset: &D) -> Self {
        Self {
            labels: (0..dataset.len()).map(|i| dataset.label(i)).collect(),
            num_categories: dataset.num_categories(),
        }
    }

    /// Restricts to the given instance indices, in order.
    #[must_use]
    pub fn select(&self, indices: &[usize]) -> Self {
        Self {
            labels: indices.iter().map(|&i| self.labels[i]).collect(),
            num_categories: self.num_categories,
        }
    }

    /// Label of instance `index`.
    #[must_use]
    #[inline]
    pub fn get(&self, index: usize) -> usize {
        self.labels[index]
    }

    /// Number of instances.
    #[must_use]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Returns true if there are no instances.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Number of distinct categories.
    #[must_use]
    pub fn num_categories(&self) -> usize {
        self.num_categories
    }

    /// All labels.
    #[must_use]
    pub fn as_slice(&self) -> &[usize] {
        &self.labels
    }

    /// Instance count per category.
    #[must_use]
    pub fn class_counts(&self) -> Vec<usize> {
        let mut counts = vec![0usize; self.num_categories];
        for &l in &self.labels {
            counts[l] += 1;
        }
        counts
    }

    /// Relative frequency per category.
    #[must_use]
    pub fn class_priors(&self) -> Vec<f32> {
        let n = self.labels.len().max(1) as f32;
        self.class_counts()
            .into_iter()
            .map(|c| c as f32 / n)
            .collect()
    }
}

/// Dense in-memory dataset: one `Vec<f32>` per instance plus a label.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DenseDataset {
    vectors: Vec<Vec<f32>>,
    labels: Labels,
    dimension: usize,
}

impl DenseDataset {
    /// Creates a dataset from vectors and labels.
    ///
    /// # Errors
    ///
    /// - [`Error::SizeMismatch`] if vector and label counts differ.
    /// - [`Error::InvalidParameter`] if vectors have different dimensions.
    pub fn new(vectors: Vec<Vec<f32>>, labels: Labels) -> Result<Self> {
        if vectors.len() != labels.len() {
            return Err(Error::SizeMismatch {
                expected: vectors.len(),
                actual: labels.len(),
            });
        }
        let dimension = vectors.first().map_or(0, Vec::len);
        if let Some((i, v)) = vectors
            .iter()
            .enumerate()
            .find(|(_, v)| v.len() != dimension)
        {
            return Err(Error::InvalidParameter(format!(
                "instance {i} has dimension {}, expected {dimension}",
                v.len()
            )));
        }
        Ok(Self {
            vectors,
            labels,
            dimension,
        })
    }

    /// Creates an unlabelled dataset (every instance in category 0).
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParameter`] if vectors have different dimensions.
    pub fn unlabeled(vectors: Vec<Vec<f32>>) -> Result<Self> {
        let labels = Labels {
            labels: vec![0; vectors.len()],
            num_categories: 1,
        };
        Self::new(vectors, labels)
    }

    /// Feature dimension.
    #[must_use]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Label source of this dataset.
    #[must_use]
    pub fn labels(&self) -> &Labels {
        &self.labels
    }

    /// Copies the given instances into a new dataset, in order.
    #[must_use]
    pub fn select(&self, indices: &[usize]) -> Self {
        Self {
            vectors: indices.iter().map(|&i| self.vectors[i].clone()).collect(),
            labels: self.labels.select(indices),
            dimension: self.dimension,
        }
    }
}

impl Dataset for DenseDataset {
    fn len(&self) -> usize {
        self.vectors.len()
    }

    fn label(&self, index: usize) -> usize {
        self.labels.get(index)
    }

    fn num_categories(&self) -> usize {
        self.labels.num_categories()
    }

    fn instance(&self, index: usize) -> &[f32] {
        &self.vectors[index]
    }
}

/// An index subset of a dataset.
#[derive(Debug, Clone)]
pub struct Cluster<'a, D: Dataset + ?Sized> {
    dataset: &'a D,
    indices: Vec<usize>,
}

impl<'a, D: Dataset + ?Sized> Cluster<'a, D> {
    /// Creates an empty cluster over `dataset`.
    #[must_use]
    pub fn new(dataset: &'a D) -> Self {
        Self {
            dataset,
            indices: Vec::new(),
        }
    }

    /// Creates a cluster containing every instance of `dataset`.
    #[must_use]
    pub fn full(dataset: &'a D) -> Self {
        Self {
            dataset,
            indices: (0..dataset.len()).collect(),
        }
    }

    /// Creates a cluster from explicit indices.
    #[must_use]
    pub fn from_indices(dataset: &'a D, indices: Vec<usize>) -> Self {
        Self { dataset, indices }
    }

    /// Adds an instance.
    pub fn add(&mut self, index: usize) {
        self.indices.push(index);
    }

    /// Number of member instances.
    #[must_use]
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    /// Returns true if the cluster has no members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Member indices, in insertion order.
    #[must_use]
    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    /// The dataset this cluster indexes into.
    #[must_use]
    pub fn dataset(&self) -> &'a D {
        self.dataset
    }

    /// Mean vector of the members. Empty clusters have an empty centroid.
    #[must_use]
    pub fn centroid(&self) -> Vec<f32> {
        let Some(&first) = self.indices.first() else {
            return Vec::new();
        };
        let mut centroid = vec![0.0f32; self.dataset.instance(first).len()];
        for &i in &self.indices {
            for (c, x) in centroid.iter_mut().zip(self.dataset.instance(i)) {
                *c += x;
            }
        }
        let n = self.indices.len() as f32;
        for c in &mut centroid {
            *c /= n;
        }
        centroid
    }
}
