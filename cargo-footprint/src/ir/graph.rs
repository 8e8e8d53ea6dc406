//! Core graph types: an arena of tensors and a sequential list of layers
//! referring to them by index.

use super::ops::{Layer, Op};
use crate::error::{Error, Result};

pub type TensorId = usize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tensor {
    pub index: TensorId,
    pub name: String,
    pub shape: Vec<usize>,
    pub dtype: DType,
    /// Weights, biases and shape literals baked into the model.
    /// Activations (including graph input and outputs) are not constant.
    pub is_constant: bool,
}

/// Element types of a fully quantized model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DType {
    I8,
    I32,
}

impl DType {
    pub const fn byte_width(self) -> usize {
        match self {
            DType::I8 => 1,
            DType::I32 => 4,
        }
    }
}

impl Tensor {
    pub fn new(
        index: TensorId,
        name: impl Into<String>,
        shape: Vec<usize>,
        dtype: DType,
        is_constant: bool,
    ) -> Self {
        Self {
            index,
            name: name.into(),
            shape,
            dtype,
            is_constant,
        }
    }

    /// Number of elements; a scalar (empty shape) holds one.
    /// Saturates at `usize::MAX`.
    pub fn element_count(&self) -> usize {
        self.shape
            .iter()
            .fold(1usize, |acc, &dim| acc.saturating_mul(dim))
    }

    /// Saturates at `usize::MAX`; see [`Tensor::checked_byte_size`].
    pub fn byte_size(&self) -> usize {
        self.element_count().saturating_mul(self.dtype.byte_width())
    }

    /// Byte size, or `None` if it does not fit in `usize`.
    pub fn checked_byte_size(&self) -> Option<usize> {
        self.shape
            .iter()
            .try_fold(1usize, |acc, &dim| acc.checked_mul(dim))?
            .checked_mul(self.dtype.byte_width())
    }
}

/// A validated single-subgraph model. Built once, never mutated by the
/// estimators.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    pub tensors: Vec<Tensor>,
    pub layers: Vec<Layer>,
    pub inputs: Vec<TensorId>,
    pub outputs: Vec<TensorId>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a tensor referenced by `layer`.
    pub fn tensor(&self, layer: usize, id: TensorId) -> Result<&Tensor> {
        self.tensors.get(id).ok_or(Error::DanglingTensor {
            layer,
            tensor: id,
            tensor_count: self.tensors.len(),
        })
    }

    pub fn add_tensor(
        &mut self,
        name: impl Into<String>,
        shape: Vec<usize>,
        dtype: DType,
        is_constant: bool,
    ) -> TensorId {
        let index = self.tensors.len();
        self.tensors
            .push(Tensor::new(index, name, shape, dtype, is_constant));
        index
    }

    pub fn add_layer(&mut self, op: Op, inputs: Vec<TensorId>, outputs: Vec<TensorId>) -> usize {
        let index = self.layers.len();
        self.layers.push(Layer {
            index,
            op,
            inputs,
            outputs,
        });
        index
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_width_per_dtype() {
        assert_eq!(DType::I8.byte_width(), 1);
        assert_eq!(DType::I32.byte_width(), 4);
    }

    #[test]
    fn byte_size_is_elements_times_width() {
        let weights = Tensor::new(1, "w1", vec![1, 2, 2, 8], DType::I8, true);
        assert_eq!(weights.element_count(), 32);
        assert_eq!(weights.byte_size(), 32);

        let bias = Tensor::new(2, "b1", vec![8], DType::I32, true);
        assert_eq!(bias.byte_size(), 32);
    }

    #[test]
    fn scalar_has_one_element() {
        let scalar = Tensor::new(0, "s", vec![], DType::I32, true);
        assert_eq!(scalar.element_count(), 1);
        assert_eq!(scalar.byte_size(), 4);
    }

    #[test]
    fn oversized_tensor_has_no_checked_size() {
        let huge = Tensor::new(0, "w", vec![usize::MAX / 2, 3], DType::I8, true);
        assert_eq!(huge.checked_byte_size(), None);
        assert_eq!(huge.byte_size(), usize::MAX);

        let wide = Tensor::new(1, "b", vec![usize::MAX / 2], DType::I32, true);
        assert_eq!(wide.checked_byte_size(), None);

        let fits = Tensor::new(2, "x", vec![1, 32, 32, 8], DType::I8, false);
        assert_eq!(fits.checked_byte_size(), Some(8192));
    }

    #[test]
    fn zero_dim_has_no_bytes() {
        let empty = Tensor::new(0, "p", vec![0, 0], DType::I8, false);
        assert_eq!(empty.byte_size(), 0);
    }

    #[test]
    fn builder_assigns_sequential_indices() {
        let mut graph = Graph::new();
        let x = graph.add_tensor("x", vec![1, 8], DType::I8, false);
        let w = graph.add_tensor("w", vec![4, 8], DType::I8, true);
        let y = graph.add_tensor("y", vec![1, 4], DType::I8, false);
        let fc = graph.add_layer(Op::FullyConnected, vec![x, w], vec![y]);
        let sm = graph.add_layer(Op::Softmax, vec![y], vec![x]);

        assert_eq!((x, w, y), (0, 1, 2));
        assert_eq!((fc, sm), (0, 1));
        assert_eq!(graph.layers[1].index, 1);
        assert_eq!(graph.tensor(fc, w).unwrap().name, "w");
    }

    #[test]
    fn dangling_tensor_lookup_fails() {
        let mut graph = Graph::new();
        graph.add_tensor("x", vec![1, 4], DType::I8, false);
        assert!(graph.tensor(0, 0).is_ok());
        let err = graph.tensor(3, 7).unwrap_err();
        assert!(matches!(
            err,
            Error::DanglingTensor {
                layer: 3,
                tensor: 7,
                tensor_count: 1
            }
        ));
    }
}
