pub mod graph;
pub mod ops;

pub use graph::{DType, Graph, Tensor, TensorId};
pub use ops::{Layer, Op};
