//! Operator set understood by the estimators.
//! Every supported kind carries its decoded option payload.

use std::fmt;

use crate::ir::graph::TensorId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    /// Kernel layout `[Co, Kh, Kw, Ci]`
    Conv2D,
    /// Kernel layout `[1, Kh, Kw, Co]`, `Co = Ci * depth_multiplier`
    DepthwiseConv2D { depth_multiplier: usize },
    /// Weights stored as `[O, K]`
    FullyConnected,
    AveragePool2D,
    MaxPool2D,
    /// Second input is the constant target-shape tensor
    Reshape,
    Softmax,
    Mul,
    Add,
    /// Anything outside the supported set. Always rejected.
    Unsupported { opcode: String },
}

impl Op {
    pub fn name(&self) -> &'static str {
        match self {
            Op::Conv2D => "Conv2D",
            Op::DepthwiseConv2D { .. } => "DepthwiseConv2D",
            Op::FullyConnected => "FullyConnected",
            Op::AveragePool2D => "AveragePool2D",
            Op::MaxPool2D => "MaxPool2D",
            Op::Reshape => "Reshape",
            Op::Softmax => "Softmax",
            Op::Mul => "Mul",
            Op::Add => "Add",
            Op::Unsupported { .. } => "Unsupported",
        }
    }

    pub fn is_supported(&self) -> bool {
        !matches!(self, Op::Unsupported { .. })
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Op::Unsupported { opcode } => write!(f, "{opcode}"),
            Op::DepthwiseConv2D { depth_multiplier } => {
                write!(f, "DepthwiseConv2D(x{depth_multiplier})")
            }
            other => f.write_str(other.name()),
        }
    }
}

/// One operator invocation. `index` is its position in execution order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layer {
    pub index: usize,
    pub op: Op,
    pub inputs: Vec<TensorId>,
    pub outputs: Vec<TensorId>,
}

impl Layer {
    pub fn new(index: usize, op: Op, inputs: Vec<TensorId>, outputs: Vec<TensorId>) -> Self {
        Self {
            index,
            op,
            inputs,
            outputs,
        }
    }

    /// Every tensor this layer touches, inputs first.
    pub fn tensors(&self) -> impl Iterator<Item = TensorId> + '_ {
        self.inputs.iter().chain(self.outputs.iter()).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_is_the_only_rejected_kind() {
        assert!(Op::Conv2D.is_supported());
        assert!(Op::DepthwiseConv2D { depth_multiplier: 1 }.is_supported());
        assert!(Op::Softmax.is_supported());
        assert!(!Op::Unsupported {
            opcode: "LSTM".into()
        }
        .is_supported());
    }

    #[test]
    fn display_uses_opcode_for_unsupported() {
        let op = Op::Unsupported {
            opcode: "CONCATENATION".into(),
        };
        assert_eq!(op.to_string(), "CONCATENATION");
        assert_eq!(Op::FullyConnected.to_string(), "FullyConnected");
        assert_eq!(
            Op::DepthwiseConv2D { depth_multiplier: 8 }.to_string(),
            "DepthwiseConv2D(x8)"
        );
    }

    #[test]
    fn layer_tensors_lists_inputs_then_outputs() {
        let layer = Layer::new(0, Op::Reshape, vec![6, 7], vec![8]);
        assert_eq!(layer.tensors().collect::<Vec<_>>(), vec![6, 7, 8]);
    }
}
