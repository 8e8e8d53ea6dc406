//! The primitive records a model container exposes to the estimator.
//!
//! A container reader (TFLite flatbuffers, or an in-memory description)
//! implements [`ModelSource`]; [`super::lowering`] turns it into an
//! [`crate::ir::Graph`].

use std::fmt;

/// Tensor element type as declared by the container, before the
/// quantized-only restriction is applied. Codes follow the TFLite
/// `TensorType` enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementType {
    F32,
    F16,
    I32,
    U8,
    I64,
    Str,
    Bool,
    I16,
    I8,
    F64,
    Other(i8),
}

impl ElementType {
    pub fn from_code(code: i8) -> Self {
        match code {
            0 => ElementType::F32,
            1 => ElementType::F16,
            2 => ElementType::I32,
            3 => ElementType::U8,
            4 => ElementType::I64,
            5 => ElementType::Str,
            6 => ElementType::Bool,
            7 => ElementType::I16,
            9 => ElementType::I8,
            10 => ElementType::F64,
            other => ElementType::Other(other),
        }
    }

    pub fn code(self) -> i8 {
        match self {
            ElementType::F32 => 0,
            ElementType::F16 => 1,
            ElementType::I32 => 2,
            ElementType::U8 => 3,
            ElementType::I64 => 4,
            ElementType::Str => 5,
            ElementType::Bool => 6,
            ElementType::I16 => 7,
            ElementType::I8 => 9,
            ElementType::F64 => 10,
            ElementType::Other(code) => code,
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElementType::F32 => f.write_str("FLOAT32"),
            ElementType::F16 => f.write_str("FLOAT16"),
            ElementType::I32 => f.write_str("INT32"),
            ElementType::U8 => f.write_str("UINT8"),
            ElementType::I64 => f.write_str("INT64"),
            ElementType::Str => f.write_str("STRING"),
            ElementType::Bool => f.write_str("BOOL"),
            ElementType::I16 => f.write_str("INT16"),
            ElementType::I8 => f.write_str("INT8"),
            ElementType::F64 => f.write_str("FLOAT64"),
            ElementType::Other(code) => write!(f, "TensorType({code})"),
        }
    }
}

/// A TFLite builtin operator code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Opcode(pub i32);

impl Opcode {
    pub const ADD: Opcode = Opcode(0);
    pub const AVERAGE_POOL_2D: Opcode = Opcode(1);
    pub const CONCATENATION: Opcode = Opcode(2);
    pub const CONV_2D: Opcode = Opcode(3);
    pub const DEPTHWISE_CONV_2D: Opcode = Opcode(4);
    pub const DEQUANTIZE: Opcode = Opcode(6);
    pub const FULLY_CONNECTED: Opcode = Opcode(9);
    pub const LOGISTIC: Opcode = Opcode(14);
    pub const LSTM: Opcode = Opcode(16);
    pub const MAX_POOL_2D: Opcode = Opcode(17);
    pub const MUL: Opcode = Opcode(18);
    pub const RELU: Opcode = Opcode(19);
    pub const RELU6: Opcode = Opcode(21);
    pub const RESHAPE: Opcode = Opcode(22);
    pub const SOFTMAX: Opcode = Opcode(25);
    pub const TANH: Opcode = Opcode(28);
    pub const PAD: Opcode = Opcode(34);
    pub const TRANSPOSE: Opcode = Opcode(39);
    pub const MEAN: Opcode = Opcode(40);
    pub const SUB: Opcode = Opcode(41);
    pub const QUANTIZE: Opcode = Opcode(114);

    pub fn name(self) -> Option<&'static str> {
        let name = match self {
            Opcode::ADD => "ADD",
            Opcode::AVERAGE_POOL_2D => "AVERAGE_POOL_2D",
            Opcode::CONCATENATION => "CONCATENATION",
            Opcode::CONV_2D => "CONV_2D",
            Opcode::DEPTHWISE_CONV_2D => "DEPTHWISE_CONV_2D",
            Opcode::DEQUANTIZE => "DEQUANTIZE",
            Opcode::FULLY_CONNECTED => "FULLY_CONNECTED",
            Opcode::LOGISTIC => "LOGISTIC",
            Opcode::LSTM => "LSTM",
            Opcode::MAX_POOL_2D => "MAX_POOL_2D",
            Opcode::MUL => "MUL",
            Opcode::RELU => "RELU",
            Opcode::RELU6 => "RELU6",
            Opcode::RESHAPE => "RESHAPE",
            Opcode::SOFTMAX => "SOFTMAX",
            Opcode::TANH => "TANH",
            Opcode::PAD => "PAD",
            Opcode::TRANSPOSE => "TRANSPOSE",
            Opcode::MEAN => "MEAN",
            Opcode::SUB => "SUB",
            Opcode::QUANTIZE => "QUANTIZE",
            _ => return None,
        };
        Some(name)
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(f, "BUILTIN_{}", self.0),
        }
    }
}

/// Option block of an operator, decoded for the opcodes whose options the
/// cost model reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OperatorOptions {
    #[default]
    None,
    DepthwiseConv2D { depth_multiplier: i32 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTensor {
    pub shape: Vec<i32>,
    pub dtype: ElementType,
    pub name: String,
    /// Length of the backing constant buffer; zero for activations.
    pub buffer_len: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLayer {
    pub opcode: Opcode,
    /// `-1` marks an omitted optional operand.
    pub inputs: Vec<i32>,
    pub outputs: Vec<i32>,
    pub options: OperatorOptions,
}

/// Read access to a decoded model container.
///
/// Tensor and layer accessors refer to the first subgraph; callers check
/// [`ModelSource::subgraph_count`] before relying on them.
pub trait ModelSource {
    fn subgraph_count(&self) -> usize;

    fn tensor_count(&self) -> usize;

    fn tensor(&self, index: usize) -> crate::Result<RawTensor>;

    fn layer_count(&self) -> usize;

    fn layer(&self, index: usize) -> crate::Result<RawLayer>;

    fn graph_input_indices(&self) -> Vec<i32>;

    fn graph_output_indices(&self) -> Vec<i32>;
}
