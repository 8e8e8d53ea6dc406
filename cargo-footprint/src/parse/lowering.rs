//! Lowering pass: container records to the estimator graph.
//!
//! Converts every tensor to a quantized [`DType`], resolves operand indices
//! and maps opcodes (with their decoded options) onto [`Op`].

use super::source::{ElementType, ModelSource, OperatorOptions, Opcode, RawLayer, RawTensor};
use crate::error::{Error, Result};
use crate::ir::{DType, Graph, Layer, Op, Tensor, TensorId};

/// Lower the first subgraph of `source` into a [`Graph`].
pub fn lower(source: &dyn ModelSource) -> Result<Graph> {
    let tensor_count = source.tensor_count();
    let mut tensors = Vec::with_capacity(tensor_count);
    for index in 0..tensor_count {
        let raw = source.tensor(index)?;
        tensors.push(lower_tensor(index, raw)?);
    }

    let layer_count = source.layer_count();
    let mut layers = Vec::with_capacity(layer_count);
    for index in 0..layer_count {
        let raw = source.layer(index)?;
        let layer = lower_layer(index, raw, tensor_count)?;
        log::debug!(
            "layer {}: {} inputs={:?} outputs={:?}",
            index,
            layer.op,
            layer.inputs,
            layer.outputs
        );
        layers.push(layer);
    }

    let inputs = graph_indices(&source.graph_input_indices(), tensor_count, "input")?;
    let outputs = graph_indices(&source.graph_output_indices(), tensor_count, "output")?;

    Ok(Graph {
        tensors,
        layers,
        inputs,
        outputs,
    })
}

/// Map a container element type onto the quantized dtypes.
pub fn convert_dtype(dtype: ElementType) -> Option<DType> {
    match dtype {
        ElementType::I8 => Some(DType::I8),
        ElementType::I32 => Some(DType::I32),
        _ => None,
    }
}

fn lower_tensor(index: TensorId, raw: RawTensor) -> Result<Tensor> {
    let dtype = convert_dtype(raw.dtype).ok_or_else(|| Error::UnsupportedDataType {
        tensor: index,
        name: raw.name.clone(),
        dtype: raw.dtype.to_string(),
    })?;

    let shape = raw
        .shape
        .iter()
        .map(|&dim| usize::try_from(dim))
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|_| {
            Error::Malformed(format!(
                "tensor {} ('{}') has a dynamic or negative shape {:?}",
                index, raw.name, raw.shape
            ))
        })?;

    Ok(Tensor {
        index,
        name: raw.name,
        shape,
        dtype,
        is_constant: raw.buffer_len > 0,
    })
}

fn lower_layer(index: usize, raw: RawLayer, tensor_count: usize) -> Result<Layer> {
    let op = lower_op(index, raw.opcode, raw.options)?;
    let inputs = operand_indices(index, &raw.inputs, tensor_count)?;
    let outputs = operand_indices(index, &raw.outputs, tensor_count)?;
    Ok(Layer {
        index,
        op,
        inputs,
        outputs,
    })
}

fn lower_op(index: usize, opcode: Opcode, options: OperatorOptions) -> Result<Op> {
    let op = match opcode {
        Opcode::CONV_2D => Op::Conv2D,
        Opcode::DEPTHWISE_CONV_2D => {
            let OperatorOptions::DepthwiseConv2D { depth_multiplier } = options else {
                return Err(Error::Malformed(format!(
                    "layer {index}: DEPTHWISE_CONV_2D without DepthwiseConv2DOptions"
                )));
            };
            let depth_multiplier = usize::try_from(depth_multiplier).map_err(|_| {
                Error::Malformed(format!(
                    "layer {index}: negative depth multiplier {depth_multiplier}"
                ))
            })?;
            Op::DepthwiseConv2D { depth_multiplier }
        }
        Opcode::FULLY_CONNECTED => Op::FullyConnected,
        Opcode::AVERAGE_POOL_2D => Op::AveragePool2D,
        Opcode::MAX_POOL_2D => Op::MaxPool2D,
        Opcode::RESHAPE => Op::Reshape,
        Opcode::SOFTMAX => Op::Softmax,
        Opcode::MUL => Op::Mul,
        Opcode::ADD => Op::Add,
        other => Op::Unsupported {
            opcode: other.to_string(),
        },
    };
    Ok(op)
}

/// Resolve operand indices, dropping `-1` (omitted optional operand).
fn operand_indices(layer: usize, raw: &[i32], tensor_count: usize) -> Result<Vec<TensorId>> {
    let mut ids = Vec::with_capacity(raw.len());
    for &idx in raw {
        if idx == -1 {
            continue;
        }
        let id = usize::try_from(idx)
            .map_err(|_| Error::Malformed(format!("layer {layer}: invalid tensor index {idx}")))?;
        if id >= tensor_count {
            return Err(Error::DanglingTensor {
                layer,
                tensor: id,
                tensor_count,
            });
        }
        ids.push(id);
    }
    Ok(ids)
}

fn graph_indices(raw: &[i32], tensor_count: usize, role: &str) -> Result<Vec<TensorId>> {
    raw.iter()
        .map(|&idx| match usize::try_from(idx) {
            Ok(id) if id < tensor_count => Ok(id),
            _ => Err(Error::Malformed(format!(
                "graph {role} index {idx} out of range ({tensor_count} tensors)"
            ))),
        })
        .collect()
}
