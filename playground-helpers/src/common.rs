use ndarray::{Array1, ArrayView1};
use crate::Float;
use std::fmt::Debug;

/// Represents a single data point with features and a label.
///
/// L: The type of the label (e.g., usize for a digit class).
/// F: The float type for the features (e.g., f32, f64).
#[derive(Debug, Clone)]
#[cfg_attr(
    feature = "serde",
    derive(serde_crate::Serialize, serde_crate::Deserialize),
    serde(crate = "serde_crate")
)]
pub struct DataPoint<L, F>
where
    L: Clone + Eq + std::hash::Hash + Debug,
    F: Float,
{
    pub features: Array1<F>,
    pub label: L,
}

impl<L, F> DataPoint<L, F>
where
    L: Clone + Eq + std::hash::Hash + Debug,
    F: Float,
{
    pub fn new(features: Array1<F>, label: L) -> Self {
        DataPoint { features, label }
    }
}

/// Index of the largest value, `None` for an empty view.
///
/// NaN entries never win; ties resolve to the first index.
pub fn argmax<F: Float>(values: ArrayView1<F>) -> Option<usize> {
    let mut best: Option<(usize, F)> = None;
    for (i, &v) in values.iter().enumerate() {
        if v.is_nan() {
            continue;
        }
        match best {
            Some((_, b)) if v <= b => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
}
