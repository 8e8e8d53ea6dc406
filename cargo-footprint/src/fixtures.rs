//! Shared test graph: DepthwiseConv2D -> Conv2D -> Reshape -> FullyConnected
//! over int8 activations with int32 biases.

use crate::ir::{DType, Graph, Layer, Op, Tensor, TensorId};

pub const CHANNEL_MULT: usize = 8;

pub const INPUT: TensorId = 0;
pub const WEIGHTS_1: TensorId = 1;
pub const BIAS_1: TensorId = 2;
pub const INTERMEDIATE_1: TensorId = 3;
pub const WEIGHTS_2: TensorId = 4;
pub const BIAS_2: TensorId = 5;
pub const INTERMEDIATE_2: TensorId = 6;
pub const SHAPE: TensorId = 7;
pub const INTERMEDIATE_2_FLAT: TensorId = 8;
pub const WEIGHTS_3: TensorId = 9;
pub const BIAS_3: TensorId = 10;
pub const OUTPUT: TensorId = 11;

pub fn tensors() -> Vec<Tensor> {
    vec![
        Tensor::new(INPUT, "x0", vec![1, 32, 32, 1], DType::I8, false),
        Tensor::new(WEIGHTS_1, "w1", vec![1, 2, 2, 8], DType::I8, true),
        Tensor::new(BIAS_1, "b1", vec![8], DType::I32, true),
        Tensor::new(INTERMEDIATE_1, "x1", vec![1, 32, 32, 8], DType::I8, false),
        Tensor::new(WEIGHTS_2, "w2", vec![16, 3, 3, 8], DType::I8, true),
        Tensor::new(BIAS_2, "b2", vec![16], DType::I32, true),
        Tensor::new(INTERMEDIATE_2, "x2", vec![1, 16, 16, 16], DType::I8, false),
        Tensor::new(SHAPE, "s", vec![2], DType::I32, true),
        Tensor::new(INTERMEDIATE_2_FLAT, "x2_", vec![1, 4096], DType::I8, false),
        // stored [O, K] as TFLite does
        Tensor::new(WEIGHTS_3, "w3", vec![10, 4096], DType::I8, true),
        Tensor::new(BIAS_3, "b3", vec![10], DType::I32, true),
        Tensor::new(OUTPUT, "x3", vec![1, 10], DType::I8, false),
    ]
}

pub fn tensor(id: TensorId) -> Tensor {
    tensors().swap_remove(id)
}

pub fn depthwise_conv2d() -> Layer {
    Layer::new(
        0,
        Op::DepthwiseConv2D {
            depth_multiplier: CHANNEL_MULT,
        },
        vec![INPUT, WEIGHTS_1, BIAS_1],
        vec![INTERMEDIATE_1],
    )
}

pub fn conv2d() -> Layer {
    Layer::new(
        1,
        Op::Conv2D,
        vec![INTERMEDIATE_1, WEIGHTS_2, BIAS_2],
        vec![INTERMEDIATE_2],
    )
}

pub fn reshape() -> Layer {
    Layer::new(
        2,
        Op::Reshape,
        vec![INTERMEDIATE_2, SHAPE],
        vec![INTERMEDIATE_2_FLAT],
    )
}

pub fn fully_connected() -> Layer {
    Layer::new(
        3,
        Op::FullyConnected,
        vec![INTERMEDIATE_2_FLAT, WEIGHTS_3, BIAS_3],
        vec![OUTPUT],
    )
}

pub fn layers() -> Vec<Layer> {
    vec![depthwise_conv2d(), conv2d(), reshape(), fully_connected()]
}

pub fn graph() -> Graph {
    Graph {
        tensors: tensors(),
        layers: layers(),
        inputs: vec![INPUT],
        outputs: vec![OUTPUT],
    }
}
