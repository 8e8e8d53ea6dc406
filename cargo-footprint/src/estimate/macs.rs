//! MAC cost model.
//!
//! Convolutions are NHWC with batch 1. Only Conv2D, DepthwiseConv2D and
//! FullyConnected are counted; pooling, reshape, softmax and the elementwise
//! ops are treated as free.

use crate::error::{Error, Result, ShapeError};
use crate::ir::{Graph, Layer, Op, Tensor};

type ShapeResult<T> = std::result::Result<T, ShapeError>;

fn product(dims: &[usize]) -> ShapeResult<u64> {
    dims.iter()
        .try_fold(1u64, |acc, &d| acc.checked_mul(d as u64))
        .ok_or(ShapeError::Overflow)
}

fn element_count(dims: &[usize]) -> ShapeResult<usize> {
    dims.iter()
        .try_fold(1usize, |acc, &d| acc.checked_mul(d))
        .ok_or(ShapeError::Overflow)
}

fn expect_rank(check: &'static str, shape: &[usize], rank: usize) -> ShapeResult<()> {
    ShapeError::check(check, rank, shape.len())
}

/// MACs of a Conv2D.
///
/// - `input`: `[1, Hi, Wi, Ci]`
/// - `kernel`: `[Co, Kh, Kw, Ci]` (OHWI)
/// - `output`: `[1, Ho, Wo, Co]`
///
/// Every output element accumulates over a full `Kh x Kw x Ci` window.
pub fn conv2d_macs(input: &[usize], kernel: &[usize], output: &[usize]) -> ShapeResult<u64> {
    expect_rank("input rank", input, 4)?;
    expect_rank("kernel rank", kernel, 4)?;
    expect_rank("output rank", output, 4)?;
    ShapeError::check("input batch", 1, input[0])?;
    ShapeError::check("output batch", 1, output[0])?;

    let (kernel_oc, kernel_h, kernel_w, kernel_ic) = (kernel[0], kernel[1], kernel[2], kernel[3]);
    let (output_h, output_w, output_c) = (output[1], output[2], output[3]);
    ShapeError::check("kernel output channels", output_c, kernel_oc)?;
    ShapeError::check("kernel input channels", input[3], kernel_ic)?;

    product(&[
        output_h, output_w, output_c, kernel_h, kernel_w, kernel_ic,
    ])
}

/// MACs of a DepthwiseConv2D.
///
/// - `input`: `[1, Hi, Wi, Ci]`
/// - `kernel`: `[1, Kh, Kw, Co]`
/// - `output`: `[1, Ho, Wo, Co]` with `Co = Ci * channel_multiplier`
///
/// Each output channel reads a single input channel, so there is no
/// accumulation across channels and the multiplier is already part of `Co`.
pub fn depthwise_conv2d_macs(
    input: &[usize],
    kernel: &[usize],
    output: &[usize],
    channel_multiplier: usize,
) -> ShapeResult<u64> {
    expect_rank("input rank", input, 4)?;
    expect_rank("kernel rank", kernel, 4)?;
    expect_rank("output rank", output, 4)?;
    ShapeError::check("input batch", 1, input[0])?;
    ShapeError::check("output batch", 1, output[0])?;
    ShapeError::check("kernel depth", 1, kernel[0])?;

    let (kernel_h, kernel_w, kernel_oc) = (kernel[1], kernel[2], kernel[3]);
    let (output_h, output_w, output_c) = (output[1], output[2], output[3]);
    ShapeError::check("kernel output channels", output_c, kernel_oc)?;
    ShapeError::check(
        "output channels (input channels x multiplier)",
        input[3]
            .checked_mul(channel_multiplier)
            .ok_or(ShapeError::Overflow)?,
        output_c,
    )?;

    product(&[output_h, output_w, output_c, kernel_h, kernel_w])
}

/// MACs of a FullyConnected layer.
///
/// - `input`: `[N, K]`, or any shape holding exactly `N * K` elements
/// - `filter`: `[K, O]` (the stored `[O, K]` weights, transposed)
/// - `output`: `[N, O]`; leading dimensions of a higher-rank output fold
///   into `N`
pub fn fully_connected_macs(
    input: &[usize],
    filter: &[usize],
    output: &[usize],
) -> ShapeResult<u64> {
    expect_rank("filter rank", filter, 2)?;
    if output.len() < 2 {
        return Err(ShapeError::Mismatch {
            check: "output rank",
            expected: 2,
            actual: output.len(),
        });
    }

    let (depth, units) = (filter[0], filter[1]);
    let (leading, last) = output.split_at(output.len() - 1);
    let batch = element_count(leading)?;
    ShapeError::check("output units", units, last[0])?;

    if input.len() == 2 {
        ShapeError::check("input batch", batch, input[0])?;
        ShapeError::check("input depth", depth, input[1])?;
    } else {
        ShapeError::check(
            "input elements (batch x depth)",
            batch.checked_mul(depth).ok_or(ShapeError::Overflow)?,
            element_count(input)?,
        )?;
    }

    product(&[batch, depth, units])
}

/// MACs of a single layer, dispatched on its operator.
pub fn estimate_macs(layer: &Layer, graph: &Graph) -> Result<u64> {
    let macs = match &layer.op {
        Op::Conv2D => {
            let [input, kernel, output] = operands(layer, graph)?;
            conv2d_macs(&input.shape, &kernel.shape, &output.shape)
                .map_err(|e| mismatch(layer, &[input, kernel, output], e))?
        }
        Op::DepthwiseConv2D { depth_multiplier } => {
            let [input, kernel, output] = operands(layer, graph)?;
            depthwise_conv2d_macs(&input.shape, &kernel.shape, &output.shape, *depth_multiplier)
                .map_err(|e| mismatch(layer, &[input, kernel, output], e))?
        }
        Op::FullyConnected => {
            let [input, weights, output] = operands(layer, graph)?;
            // stored [O, K], the cost model wants [K, O]
            let filter: Vec<usize> = weights.shape.iter().rev().copied().collect();
            fully_connected_macs(&input.shape, &filter, &output.shape)
                .map_err(|e| mismatch(layer, &[input, weights, output], e))?
        }
        Op::AveragePool2D | Op::MaxPool2D | Op::Reshape | Op::Softmax | Op::Mul | Op::Add => 0,
        Op::Unsupported { opcode } => {
            return Err(Error::UnsupportedOperator {
                layer: layer.index,
                kind: opcode.clone(),
            });
        }
    };
    log::debug!("layer {} ({}): {} MACs", layer.index, layer.op, macs);
    Ok(macs)
}

/// Per-layer MACs in execution order. Stops at the first failing layer.
pub fn layer_macs(graph: &Graph) -> Result<Vec<u64>> {
    graph
        .layers
        .iter()
        .map(|layer| estimate_macs(layer, graph))
        .collect()
}

/// Total MACs of one inference.
pub fn estimate_model_macs(graph: &Graph) -> Result<u64> {
    total_macs(&layer_macs(graph)?)
}

/// Sum of per-layer MACs, failing instead of wrapping.
pub fn total_macs(per_layer: &[u64]) -> Result<u64> {
    per_layer
        .iter()
        .try_fold(0u64, |total, &macs| total.checked_add(macs))
        .ok_or_else(|| Error::Overflow(format!("total MACs of {} layers", per_layer.len())))
}

/// `[data, weights, output]` of a weighted layer.
fn operands<'g>(layer: &Layer, graph: &'g Graph) -> Result<[&'g Tensor; 3]> {
    let missing = |operand| Error::MissingOperand {
        layer: layer.index,
        op: layer.op.name(),
        operand,
    };
    let input = *layer.inputs.first().ok_or_else(|| missing("input"))?;
    let weights = *layer.inputs.get(1).ok_or_else(|| missing("weights"))?;
    let output = *layer.outputs.first().ok_or_else(|| missing("output"))?;
    Ok([
        graph.tensor(layer.index, input)?,
        graph.tensor(layer.index, weights)?,
        graph.tensor(layer.index, output)?,
    ])
}

fn mismatch(layer: &Layer, tensors: &[&Tensor], source: ShapeError) -> Error {
    let shapes: Vec<Vec<usize>> = tensors.iter().map(|t| t.shape.clone()).collect();
    match source {
        ShapeError::Overflow => Error::Overflow(format!(
            "layer {} ({}): MAC count of tensor shapes {:?}",
            layer.index,
            layer.op.name(),
            shapes
        )),
        source => Error::ShapeMismatch {
            layer: layer.index,
            op: layer.op.name(),
            shapes,
            source,
        },
    }
}
