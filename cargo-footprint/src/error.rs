use std::path::PathBuf;

use crate::ir::TensorId;

/// Failure of a shape-level MAC function.
///
/// Produced by functions that know nothing about the layer they are
/// evaluated for; the layer-level estimator wraps it into
/// [`Error::ShapeMismatch`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ShapeError {
    #[error("shape mismatch, {check}: expected {expected}, got {actual}")]
    Mismatch {
        check: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("dimension product overflows")]
    Overflow,
}

impl ShapeError {
    pub(crate) fn check(
        check: &'static str,
        expected: usize,
        actual: usize,
    ) -> std::result::Result<(), Self> {
        if expected == actual {
            Ok(())
        } else {
            Err(Self::Mismatch {
                check,
                expected,
                actual,
            })
        }
    }

    /// Name of the failed check; `None` for an overflow.
    pub fn failed_check(&self) -> Option<&'static str> {
        match self {
            Self::Mismatch { check, .. } => Some(*check),
            Self::Overflow => None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Multiple subgraphs, multiple inputs, or a non-sequential topology
    #[error("unsupported model structure: {0}")]
    UnsupportedModelStructure(String),

    /// Tensor element type outside {int8, int32}
    #[error("unsupported data type {dtype} for tensor {tensor} ('{name}'), needs a fully quantized model")]
    UnsupportedDataType {
        tensor: TensorId,
        name: String,
        dtype: String,
    },

    #[error("layer {layer}: unsupported operator {kind}")]
    UnsupportedOperator { layer: usize, kind: String },

    #[error("layer {layer} ({op}): {source} (tensor shapes {shapes:?})")]
    ShapeMismatch {
        layer: usize,
        op: &'static str,
        shapes: Vec<Vec<usize>>,
        #[source]
        source: ShapeError,
    },

    #[error("layer {layer} ({op}): missing {operand} operand")]
    MissingOperand {
        layer: usize,
        op: &'static str,
        operand: &'static str,
    },

    #[error("layer {layer} references tensor {tensor}, but the graph has {tensor_count} tensors")]
    DanglingTensor {
        layer: usize,
        tensor: TensorId,
        tensor_count: usize,
    },

    /// A size or MAC total that does not fit the host integer width
    #[error("arithmetic overflow: {0}")]
    Overflow(String),

    /// The container could not be decoded
    #[error("malformed model: {0}")]
    Malformed(String),

    #[error("could not render report: {0}")]
    Render(#[from] serde_json::Error),

    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
