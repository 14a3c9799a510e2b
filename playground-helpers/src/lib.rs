use ndarray::NdFloat;

use num_traits::FromPrimitive;
use rand::distr::uniform::SampleUniform;

mod common;

pub use common::{argmax, DataPoint};

/// Scalar type the classifier is generic over.
///
/// `NdFloat` brings the arithmetic and assignment operators, `FromPrimitive`
/// the conversion of hyper-parameters and counts, `SampleUniform` the weight
/// initialisation.
pub trait Float: NdFloat + FromPrimitive + SampleUniform {}

impl Float for f32 {}

impl Float for f64 {}
