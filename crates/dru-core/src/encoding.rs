//! Feature encoding for data re-uploading.
//!
//! A raw feature vector `x` is zero-padded to a multiple of the chunk width
//! and reshaped into `subchunks` rows. Each row is combined affinely with the
//! trainable tensors `theta` (bias) and `w` (weight) to produce rotation
//! angles:
//!
//!   phi[idx] = chunk[v] ⊙ w[idx] + theta[idx]
//!
//! Both tensors have shape `(subchunks · layers · qubits, chunk_width)`.
//!
//! # Example
//!
//! ```rust
//! use dru_core::encoding::{encode_angles_distributed, reshape_to_chunks, Parameters};
//! use ndarray::{array, Array2};
//!
//! let x = array![0.5, 1.0, 1.5, 2.0];
//! let (chunks, n) = reshape_to_chunks(x.view(), 3).unwrap();
//! assert_eq!(n, 2);
//! assert_eq!(chunks.row(1).to_vec(), vec![2.0, 0.0, 0.0]);
//!
//! let params = Parameters::new(Array2::zeros((4, 3)), Array2::ones((4, 3))).unwrap();
//! let phi = encode_angles_distributed(chunks.view(), params.theta().view(), params.w().view()).unwrap();
//! assert_eq!(phi.dim(), (4, 3));
//! ```

use std::f64::consts::PI;

use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use rand::Rng;
use rand::distributions::{Distribution, Uniform};
use serde::{Deserialize, Serialize};

use crate::error::{DruError, DruResult};

/// Default chunk width: one RZ-RY-RZ triple per angle row.
pub const DEFAULT_CHUNK_WIDTH: usize = 3;

/// Pad `x` with trailing zeros to the next multiple of `chunk_width` and
/// reshape it into `(subchunks, chunk_width)`.
///
/// Returns the chunk array together with the number of chunks.
pub fn reshape_to_chunks(x: ArrayView1<'_, f64>, chunk_width: usize) -> DruResult<(Array2<f64>, usize)> {
    if chunk_width == 0 {
        return Err(DruError::InvalidInput(
            "chunk width must be at least 1".into(),
        ));
    }
    let n_chunks = x.len().div_ceil(chunk_width);
    let chunks = Array2::from_shape_fn((n_chunks, chunk_width), |(i, j)| {
        x.get(i * chunk_width + j).copied().unwrap_or(0.0)
    });
    Ok((chunks, n_chunks))
}

/// The trainable bias/weight pair of a re-uploading model.
///
/// `theta.shape == w.shape` always holds; the optimizer only ever replaces
/// the pair wholesale through [`reshape_params`].
#[derive(Debug, Clone, PartialEq)]
pub struct Parameters {
    theta: Array2<f64>,
    w: Array2<f64>,
}

impl Parameters {
    /// Pair a bias and a weight tensor, checking their shapes agree.
    pub fn new(theta: Array2<f64>, w: Array2<f64>) -> DruResult<Self> {
        if theta.dim() != w.dim() {
            return Err(DruError::ShapeMismatch(format!(
                "theta has shape {:?} but w has shape {:?}",
                theta.dim(),
                w.dim()
            )));
        }
        Ok(Self { theta, w })
    }

    /// Bias tensor.
    pub fn theta(&self) -> &Array2<f64> {
        &self.theta
    }

    /// Weight tensor.
    pub fn w(&self) -> &Array2<f64> {
        &self.w
    }

    /// Number of angle rows (`subchunks · layers · qubits`).
    pub fn rotation_slots(&self) -> usize {
        self.theta.nrows()
    }

    /// Width of each angle row.
    pub fn chunk_width(&self) -> usize {
        self.theta.ncols()
    }

    /// Shapes recorded for [`reshape_params`].
    pub fn shapes(&self) -> ParamShapes {
        ParamShapes {
            theta: self.theta.dim(),
            w: self.w.dim(),
        }
    }

    /// Total number of trainable scalars.
    pub fn len(&self) -> usize {
        self.theta.len() + self.w.len()
    }

    /// True when the tensors hold no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Draw `theta` and `w` i.i.d. uniform over `[0, π)` with shape
/// `(subchunks · layers · qubits, chunk_width)`.
pub fn init_parameters<R: Rng + ?Sized>(
    subchunks: usize,
    layers: usize,
    chunk_width: usize,
    qubits: usize,
    rng: &mut R,
) -> DruResult<Parameters> {
    if subchunks == 0 || layers == 0 || chunk_width == 0 || qubits == 0 {
        return Err(DruError::InvalidInput(format!(
            "parameter dimensions must be positive (subchunks={subchunks}, layers={layers}, \
             chunk_width={chunk_width}, qubits={qubits})"
        )));
    }
    let rows = subchunks * layers * qubits;
    let dist = Uniform::new(0.0, PI);
    let theta = Array2::from_shape_fn((rows, chunk_width), |_| dist.sample(rng));
    let w = Array2::from_shape_fn((rows, chunk_width), |_| dist.sample(rng));
    Parameters::new(theta, w)
}

/// Distributed encoding: chunk `v` feeds the `distribution = slots / subchunks`
/// consecutive rows starting at `v · distribution`.
pub fn encode_angles_distributed(
    chunks: ArrayView2<'_, f64>,
    theta: ArrayView2<'_, f64>,
    w: ArrayView2<'_, f64>,
) -> DruResult<Array2<f64>> {
    check_pair(theta, w)?;
    let (subchunks, width) = chunks.dim();
    let (slots, param_width) = w.dim();
    if width != param_width {
        return Err(DruError::ShapeMismatch(format!(
            "chunk width {width} does not match parameter width {param_width}"
        )));
    }
    if subchunks == 0 {
        return Err(DruError::InvalidInput(
            "cannot encode an empty feature vector".into(),
        ));
    }
    if slots % subchunks != 0 {
        return Err(DruError::ShapeMismatch(format!(
            "{slots} rotation slots cannot be split evenly across {subchunks} chunks"
        )));
    }

    let distribution = slots / subchunks;
    let mut phi = Array2::zeros((slots, width));
    for v in 0..subchunks {
        let chunk = chunks.row(v);
        for offset in 0..distribution {
            let idx = v * distribution + offset;
            let row = &chunk * &w.row(idx) + &theta.row(idx);
            phi.row_mut(idx).assign(&row);
        }
    }
    Ok(phi)
}

/// Linear encoding: the i-th chunk combines only with the i-th parameter row.
pub fn encode_angles_linear(
    chunks: ArrayView2<'_, f64>,
    theta: ArrayView2<'_, f64>,
    w: ArrayView2<'_, f64>,
) -> DruResult<Array2<f64>> {
    check_pair(theta, w)?;
    if chunks.dim() != w.dim() {
        return Err(DruError::ShapeMismatch(format!(
            "linear encoding needs chunks {:?} to match parameters {:?}",
            chunks.dim(),
            w.dim()
        )));
    }
    Ok(&chunks * &w + &theta)
}

fn check_pair(theta: ArrayView2<'_, f64>, w: ArrayView2<'_, f64>) -> DruResult<()> {
    if theta.dim() != w.dim() {
        return Err(DruError::ShapeMismatch(format!(
            "theta has shape {:?} but w has shape {:?}",
            theta.dim(),
            w.dim()
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Flattened parameter vector
// ---------------------------------------------------------------------------

/// Shapes needed to rebuild `[theta, w]` from a flat vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParamShapes {
    /// `(rows, cols)` of theta.
    pub theta: (usize, usize),
    /// `(rows, cols)` of w.
    pub w: (usize, usize),
}

impl ParamShapes {
    /// Number of scalars in the flat vector.
    pub fn len(&self) -> usize {
        self.theta.0 * self.theta.1 + self.w.0 * self.w.1
    }

    /// True when both shapes are empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Concatenate theta and w in row-major order.
pub fn flatten_params(params: &Parameters) -> (Array1<f64>, ParamShapes) {
    let flat = params
        .theta
        .iter()
        .chain(params.w.iter())
        .copied()
        .collect::<Array1<f64>>();
    (flat, params.shapes())
}

/// Inverse of [`flatten_params`]; values are copied bit-for-bit.
pub fn reshape_params(flat: ArrayView1<'_, f64>, shapes: &ParamShapes) -> DruResult<Parameters> {
    if flat.len() != shapes.len() {
        return Err(DruError::ShapeMismatch(format!(
            "flat parameter vector has {} values, shapes {:?} need {}",
            flat.len(),
            shapes,
            shapes.len()
        )));
    }
    let split = shapes.theta.0 * shapes.theta.1;
    let theta_values: Vec<f64> = flat.iter().take(split).copied().collect();
    let w_values: Vec<f64> = flat.iter().skip(split).copied().collect();
    let theta = Array2::from_shape_vec(shapes.theta, theta_values)
        .map_err(|e| DruError::ShapeMismatch(e.to_string()))?;
    let w = Array2::from_shape_vec(shapes.w, w_values)
        .map_err(|e| DruError::ShapeMismatch(e.to_string()))?;
    Parameters::new(theta, w)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_reshape_pads_with_zeros() {
        let x = array![1.0, 2.0, 3.0, 4.0, 5.0];
        let (chunks, n) = reshape_to_chunks(x.view(), 3).unwrap();
        assert_eq!(n, 2);
        assert_eq!(chunks, array![[1.0, 2.0, 3.0], [4.0, 5.0, 0.0]]);
    }

    #[test]
    fn test_reshape_exact_multiple_has_no_padding() {
        let x = array![1.0, 2.0, 3.0];
        let (chunks, n) = reshape_to_chunks(x.view(), 3).unwrap();
        assert_eq!(n, 1);
        assert_eq!(chunks, array![[1.0, 2.0, 3.0]]);
    }

    #[test]
    fn test_reshape_zero_width_rejected() {
        let x = array![1.0];
        assert!(matches!(
            reshape_to_chunks(x.view(), 0),
            Err(DruError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_init_parameters_shape_and_range() {
        let mut rng = StdRng::seed_from_u64(3);
        let params = init_parameters(2, 3, 3, 2, &mut rng).unwrap();
        assert_eq!(params.theta().dim(), (12, 3));
        assert_eq!(params.w().dim(), (12, 3));
        assert!(
            params
                .theta()
                .iter()
                .chain(params.w().iter())
                .all(|v| (0.0..PI).contains(v))
        );
    }

    #[test]
    fn test_init_parameters_is_seeded() {
        let a = init_parameters(1, 2, 3, 2, &mut StdRng::seed_from_u64(11)).unwrap();
        let b = init_parameters(1, 2, 3, 2, &mut StdRng::seed_from_u64(11)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_distributed_encoding_rows() {
        let chunks = array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]];
        let theta = Array2::from_elem((4, 3), 0.5);
        let w = Array2::from_elem((4, 3), 2.0);
        let phi = encode_angles_distributed(chunks.view(), theta.view(), w.view()).unwrap();
        // distribution = 2: rows 0,1 from chunk 0; rows 2,3 from chunk 1
        assert_eq!(phi.row(0).to_vec(), vec![2.5, 4.5, 6.5]);
        assert_eq!(phi.row(1).to_vec(), vec![2.5, 4.5, 6.5]);
        assert_eq!(phi.row(3).to_vec(), vec![8.5, 10.5, 12.5]);
    }

    #[test]
    fn test_distributed_encoding_uneven_split() {
        let chunks = Array2::zeros((2, 3));
        let theta = Array2::zeros((3, 3));
        let w = Array2::zeros((3, 3));
        assert!(matches!(
            encode_angles_distributed(chunks.view(), theta.view(), w.view()),
            Err(DruError::ShapeMismatch(_))
        ));
    }

    #[test]
    fn test_linear_encoding_pairs_rows() {
        let chunks = array![[1.0, 1.0, 1.0], [2.0, 2.0, 2.0]];
        let theta = array![[0.0, 0.0, 0.0], [1.0, 1.0, 1.0]];
        let w = array![[3.0, 3.0, 3.0], [3.0, 3.0, 3.0]];
        let phi = encode_angles_linear(chunks.view(), theta.view(), w.view()).unwrap();
        assert_eq!(phi, array![[3.0, 3.0, 3.0], [7.0, 7.0, 7.0]]);
    }

    #[test]
    fn test_linear_encoding_requires_equal_rows() {
        let chunks = Array2::zeros((1, 3));
        let theta = Array2::zeros((2, 3));
        let w = Array2::zeros((2, 3));
        assert!(encode_angles_linear(chunks.view(), theta.view(), w.view()).is_err());
    }

    #[test]
    fn test_mismatched_pair_rejected() {
        assert!(matches!(
            Parameters::new(Array2::zeros((2, 3)), Array2::zeros((3, 3))),
            Err(DruError::ShapeMismatch(_))
        ));
    }

    #[test]
    fn test_reshape_params_wrong_length() {
        let params = Parameters::new(Array2::zeros((2, 3)), Array2::ones((2, 3))).unwrap();
        let (flat, shapes) = flatten_params(&params);
        let short = flat.slice(ndarray::s![..flat.len() - 1]).to_owned();
        assert!(matches!(
            reshape_params(short.view(), &shapes),
            Err(DruError::ShapeMismatch(_))
        ));
    }
}
