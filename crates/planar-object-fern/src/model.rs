//! Trained fern model and its serialized form.
//!
//! Only leaf counts are persisted. Log posteriors are a pure function of the
//! counts and the prior, so they are rebuilt whenever a model is created or
//! deserialized. A record whose shape does not add up is refused with a
//! [`ModelError`] instead of being loaded.

use nalgebra::Point2;
use serde::{Deserialize, Serialize};

use crate::Fern;

/// Per-fern leaf statistics for a fixed set of reference points.
///
/// Class `i` is the reference point `class_points()[i]`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "FernModelRecord", into = "FernModelRecord")]
pub struct FernModel {
    ferns: Vec<Fern>,
    depth: usize,
    class_points: Vec<Point2<f32>>,
    samples_per_class: u32,
    prior: f32,
    // [fern][leaf][class]
    counts: Vec<u32>,
    log_probs: Vec<f32>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct FernModelRecord {
    ferns: Vec<Fern>,
    depth: usize,
    class_points: Vec<Point2<f32>>,
    samples_per_class: u32,
    prior: f32,
    counts: Vec<u32>,
}

/// A persisted fern model that cannot be used for recognition.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[error("invalid fern model: {0}")]
pub struct ModelError(pub String);

/// Largest supported fern depth; matches [`crate::FernParams::validate`].
const MAX_DEPTH: usize = 16;

impl FernModelRecord {
    fn check(&self) -> Result<(), ModelError> {
        let fail = |msg: String| -> Result<(), ModelError> { Err(ModelError(msg)) };
        if self.depth == 0 || self.depth > MAX_DEPTH {
            return fail(format!("depth must be in 1..={MAX_DEPTH}, got {}", self.depth));
        }
        if self.ferns.is_empty() {
            return fail("model has no ferns".into());
        }
        if self.class_points.is_empty() {
            return fail("model has no reference points".into());
        }
        if let Some((i, fern)) = self
            .ferns
            .iter()
            .enumerate()
            .find(|(_, f)| f.tests.len() != self.depth)
        {
            return fail(format!(
                "fern {i} has {} tests, expected {}",
                fern.tests.len(),
                self.depth
            ));
        }
        let offsets_finite = self
            .ferns
            .iter()
            .flat_map(|f| &f.tests)
            .all(|t| t.a.iter().chain(&t.b).all(|v| v.is_finite()));
        if !offsets_finite {
            return fail("non-finite test offset".into());
        }
        if !(self.prior.is_finite() && self.prior > 0.0) {
            return fail(format!("prior must be positive, got {}", self.prior));
        }
        let Some(expected) = self
            .ferns
            .len()
            .checked_mul(1usize << self.depth)
            .and_then(|n| n.checked_mul(self.class_points.len()))
        else {
            return fail("leaf table size overflows".into());
        };
        if self.counts.len() != expected {
            return fail(format!(
                "{} leaf counts, expected {expected}",
                self.counts.len()
            ));
        }
        Ok(())
    }
}

impl TryFrom<FernModelRecord> for FernModel {
    type Error = ModelError;

    fn try_from(r: FernModelRecord) -> Result<Self, ModelError> {
        r.check()?;
        Ok(FernModel::from_counts(
            r.ferns,
            r.depth,
            r.class_points,
            r.samples_per_class,
            r.prior,
            r.counts,
        ))
    }
}

impl From<FernModel> for FernModelRecord {
    fn from(m: FernModel) -> Self {
        Self {
            ferns: m.ferns,
            depth: m.depth,
            class_points: m.class_points,
            samples_per_class: m.samples_per_class,
            prior: m.prior,
            counts: m.counts,
        }
    }
}

impl FernModel {
    /// `counts` must hold `ferns * 2^depth * classes` entries.
    pub(crate) fn from_counts(
        ferns: Vec<Fern>,
        depth: usize,
        class_points: Vec<Point2<f32>>,
        samples_per_class: u32,
        prior: f32,
        counts: Vec<u32>,
    ) -> Self {
        let mut model = Self {
            ferns,
            depth,
            class_points,
            samples_per_class,
            prior,
            counts,
            log_probs: Vec::new(),
        };
        model.rebuild_posteriors();
        model
    }

    fn rebuild_posteriors(&mut self) {
        let leaves = self.leaf_count() as f32;
        let denom = (self.samples_per_class as f32 + self.prior * leaves).ln();
        self.log_probs = self
            .counts
            .iter()
            .map(|&c| (c as f32 + self.prior).ln() - denom)
            .collect();
    }

    #[inline]
    pub fn ferns(&self) -> &[Fern] {
        &self.ferns
    }

    #[inline]
    pub fn depth(&self) -> usize {
        self.depth
    }

    #[inline]
    pub fn leaf_count(&self) -> usize {
        1usize << self.depth
    }

    #[inline]
    pub fn class_count(&self) -> usize {
        self.class_points.len()
    }

    /// Reference position of every class, indexed by class id.
    #[inline]
    pub fn class_points(&self) -> &[Point2<f32>] {
        &self.class_points
    }

    #[inline]
    pub fn samples_per_class(&self) -> u32 {
        self.samples_per_class
    }

    /// Log posteriors of every class at `leaf` of fern `fern`.
    #[inline]
    pub(crate) fn leaf_log_probs(&self, fern: usize, leaf: usize) -> &[f32] {
        let n = self.class_count();
        let start = (fern * self.leaf_count() + leaf) * n;
        &self.log_probs[start..start + n]
    }

    #[inline]
    pub(crate) fn leaf_counts_mut(&mut self, fern: usize, leaf: usize) -> &mut [u32] {
        let n = self.class_count();
        let start = (fern * self.leaf_count() + leaf) * n;
        &mut self.counts[start..start + n]
    }

    /// Finalize training: record the sample count and refresh posteriors.
    pub(crate) fn finish_training(&mut self, samples_per_class: u32) {
        self.samples_per_class = samples_per_class;
        self.rebuild_posteriors();
    }

    /// Uniform log probability of a single leaf.
    #[inline]
    pub fn uniform_log_prob(&self) -> f32 {
        -(self.leaf_count() as f32).ln()
    }
}
