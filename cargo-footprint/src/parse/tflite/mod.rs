//! TFLite flatbuffer reader.
//!
//! Borrows the model bytes and exposes the first subgraph through
//! [`ModelSource`]. Nothing is copied except the small per-record vectors.

pub mod schema;

use schema::{root_as_model, Buffer, Model, Operator, SubGraph};

use super::source::{ElementType, ModelSource, OperatorOptions, Opcode, RawLayer, RawTensor};
use crate::error::{Error, Result};

type Buffers<'a> = flatbuffers::Vector<'a, flatbuffers::ForwardsUOffset<Buffer<'a>>>;

pub struct TfliteModel<'a> {
    model: Model<'a>,
}

impl<'a> TfliteModel<'a> {
    /// Verify `data` as a TFLite model.
    pub fn from_bytes(data: &'a [u8]) -> Result<Self> {
        let identified = data.len() >= 8
            && flatbuffers::buffer_has_identifier(data, schema::FILE_IDENTIFIER, false);
        if !identified {
            log::warn!(
                "model is missing the '{}' file identifier, decoding anyway",
                schema::FILE_IDENTIFIER
            );
        }
        let model = root_as_model(data)
            .map_err(|e| Error::Malformed(format!("failed to parse TFLite model: {e}")))?;
        log::info!(
            "TFLite schema v{}, {} subgraph(s)",
            model.version(),
            model.subgraphs().map_or(0, |s| s.len())
        );
        Ok(Self { model })
    }

    fn subgraph(&self) -> Result<SubGraph<'a>> {
        match self.model.subgraphs() {
            Some(subgraphs) if subgraphs.len() > 0 => Ok(subgraphs.get(0)),
            _ => Err(Error::Malformed("no subgraphs in model".into())),
        }
    }

    fn buffers(&self) -> Result<Buffers<'a>> {
        self.model
            .buffers()
            .ok_or_else(|| Error::Malformed("no buffers in model".into()))
    }

    /// Byte length of the data backing buffer `index`.
    fn buffer_len(&self, index: u32) -> Result<usize> {
        let buffers = self.buffers()?;
        let index = index as usize;
        if index >= buffers.len() {
            return Err(Error::Malformed(format!(
                "buffer index {index} out of range ({} buffers)",
                buffers.len()
            )));
        }
        let buffer = buffers.get(index);
        // offset > 1 means the data lives outside the flatbuffer
        if buffer.offset() > 1 {
            return usize::try_from(buffer.size())
                .map_err(|_| Error::Malformed(format!("buffer {index} too large")));
        }
        Ok(buffer.data().map_or(0, |data| data.len()))
    }

    fn opcode(&self, op: &Operator<'a>) -> Result<Opcode> {
        let codes = self
            .model
            .operator_codes()
            .ok_or_else(|| Error::Malformed("no operator codes in model".into()))?;
        let index = op.opcode_index() as usize;
        if index >= codes.len() {
            return Err(Error::Malformed(format!(
                "opcode index {index} out of range ({} operator codes)",
                codes.len()
            )));
        }
        Ok(Opcode(codes.get(index).effective_builtin_code()))
    }
}

fn decode_options(opcode: Opcode, op: &Operator<'_>) -> OperatorOptions {
    match opcode {
        Opcode::DEPTHWISE_CONV_2D => op
            .builtin_options_as_depthwise_conv_2d_options()
            .map_or(OperatorOptions::None, |options| {
                OperatorOptions::DepthwiseConv2D {
                    depth_multiplier: options.depth_multiplier(),
                }
            }),
        _ => OperatorOptions::None,
    }
}

fn to_vec(v: Option<flatbuffers::Vector<'_, i32>>) -> Vec<i32> {
    v.map(|v| v.iter().collect()).unwrap_or_default()
}

impl ModelSource for TfliteModel<'_> {
    fn subgraph_count(&self) -> usize {
        self.model.subgraphs().map_or(0, |s| s.len())
    }

    fn tensor_count(&self) -> usize {
        self.subgraph()
            .ok()
            .and_then(|g| g.tensors())
            .map_or(0, |t| t.len())
    }

    fn tensor(&self, index: usize) -> Result<RawTensor> {
        let tensors = self
            .subgraph()?
            .tensors()
            .ok_or_else(|| Error::Malformed("no tensors in subgraph".into()))?;
        if index >= tensors.len() {
            return Err(Error::Malformed(format!("no tensor at index {index}")));
        }
        let tensor = tensors.get(index);
        Ok(RawTensor {
            shape: to_vec(tensor.shape()),
            dtype: ElementType::from_code(tensor.type_()),
            name: tensor.name().unwrap_or_default().to_string(),
            buffer_len: self.buffer_len(tensor.buffer())?,
        })
    }

    fn layer_count(&self) -> usize {
        self.subgraph()
            .ok()
            .and_then(|g| g.operators())
            .map_or(0, |ops| ops.len())
    }

    fn layer(&self, index: usize) -> Result<RawLayer> {
        let operators = self
            .subgraph()?
            .operators()
            .ok_or_else(|| Error::Malformed("no operators in subgraph".into()))?;
        if index >= operators.len() {
            return Err(Error::Malformed(format!("no operator at index {index}")));
        }
        let op = operators.get(index);
        let opcode = self.opcode(&op)?;
        Ok(RawLayer {
            opcode,
            inputs: to_vec(op.inputs()),
            outputs: to_vec(op.outputs()),
            options: decode_options(opcode, &op),
        })
    }

    fn graph_input_indices(&self) -> Vec<i32> {
        self.subgraph()
            .map(|g| to_vec(g.inputs()))
            .unwrap_or_default()
    }

    fn graph_output_indices(&self) -> Vec<i32> {
        self.subgraph()
            .map(|g| to_vec(g.outputs()))
            .unwrap_or_default()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use flatbuffers::{FlatBufferBuilder, TableFinishedWIPOffset, WIPOffset};

    type Table = WIPOffset<TableFinishedWIPOffset>;

    struct TensorDef {
        name: &'static str,
        shape: &'static [i32],
        dtype: ElementType,
        buffer: u32,
    }

    struct OpDef {
        opcode_index: u32,
        inputs: &'static [i32],
        outputs: &'static [i32],
        depth_multiplier: Option<i32>,
    }

    fn tensor(fbb: &mut FlatBufferBuilder, def: &TensorDef) -> Table {
        let shape = fbb.create_vector(def.shape);
        let name = fbb.create_string(def.name);
        let start = fbb.start_table();
        fbb.push_slot_always(schema::Tensor::VT_SHAPE, shape);
        fbb.push_slot::<i8>(schema::Tensor::VT_TYPE, def.dtype.code(), 0);
        fbb.push_slot::<u32>(schema::Tensor::VT_BUFFER, def.buffer, 0);
        fbb.push_slot_always(schema::Tensor::VT_NAME, name);
        fbb.end_table(start)
    }

    fn buffer(fbb: &mut FlatBufferBuilder, len: usize) -> Table {
        let data = (len > 0).then(|| fbb.create_vector(&vec![0u8; len][..]));
        let start = fbb.start_table();
        if let Some(data) = data {
            fbb.push_slot_always(schema::Buffer::VT_DATA, data);
        }
        fbb.end_table(start)
    }

    /// `legacy` codes only fill the deprecated byte field.
    fn operator_code(fbb: &mut FlatBufferBuilder, code: Opcode, legacy: bool) -> Table {
        let start = fbb.start_table();
        if legacy {
            fbb.push_slot::<i8>(
                schema::OperatorCode::VT_DEPRECATED_BUILTIN_CODE,
                code.0 as i8,
                0,
            );
        } else {
            fbb.push_slot::<i32>(schema::OperatorCode::VT_BUILTIN_CODE, code.0, 0);
        }
        fbb.end_table(start)
    }

    fn operator(fbb: &mut FlatBufferBuilder, def: &OpDef) -> Table {
        let inputs = fbb.create_vector(def.inputs);
        let outputs = fbb.create_vector(def.outputs);
        let options = def.depth_multiplier.map(|multiplier| {
            let start = fbb.start_table();
            fbb.push_slot::<i32>(schema::DepthwiseConv2DOptions::VT_STRIDE_W, 1, 0);
            fbb.push_slot::<i32>(schema::DepthwiseConv2DOptions::VT_STRIDE_H, 1, 0);
            fbb.push_slot::<i32>(
                schema::DepthwiseConv2DOptions::VT_DEPTH_MULTIPLIER,
                multiplier,
                0,
            );
            fbb.end_table(start)
        });
        let start = fbb.start_table();
        fbb.push_slot::<u32>(schema::Operator::VT_OPCODE_INDEX, def.opcode_index, 0);
        fbb.push_slot_always(schema::Operator::VT_INPUTS, inputs);
        fbb.push_slot_always(schema::Operator::VT_OUTPUTS, outputs);
        if let Some(options) = options {
            fbb.push_slot::<u8>(
                schema::Operator::VT_BUILTIN_OPTIONS_TYPE,
                schema::BUILTIN_OPTIONS_DEPTHWISE_CONV_2D,
                0,
            );
            fbb.push_slot_always(schema::Operator::VT_BUILTIN_OPTIONS, options);
        }
        fbb.end_table(start)
    }

    /// DepthwiseConv2D(x2) -> Reshape -> FullyConnected, int8 activations.
    ///
    /// MACs: 4*4*2*3*3 + 32*3 = 384. ROM: 18 + 8 + 96 + 12 = 134.
    /// RAM: best 64 (reshape: 32 + 32), worst 16 + 32 + 32 + 3 = 83.
    pub(crate) fn small_model_bytes(subgraphs: usize) -> Vec<u8> {
        let tensors = [
            TensorDef { name: "input", shape: &[1, 4, 4, 1], dtype: ElementType::I8, buffer: 0 },
            TensorDef { name: "dw/weights", shape: &[1, 3, 3, 2], dtype: ElementType::I8, buffer: 1 },
            TensorDef { name: "dw/out", shape: &[1, 4, 4, 2], dtype: ElementType::I8, buffer: 0 },
            TensorDef { name: "reshape/shape", shape: &[2], dtype: ElementType::I32, buffer: 2 },
            TensorDef { name: "flatten", shape: &[1, 32], dtype: ElementType::I8, buffer: 0 },
            TensorDef { name: "fc/weights", shape: &[3, 32], dtype: ElementType::I8, buffer: 3 },
            TensorDef { name: "fc/bias", shape: &[3], dtype: ElementType::I32, buffer: 4 },
            TensorDef { name: "output", shape: &[1, 3], dtype: ElementType::I8, buffer: 0 },
        ];
        let ops = [
            OpDef { opcode_index: 0, inputs: &[0, 1, -1], outputs: &[2], depth_multiplier: Some(2) },
            OpDef { opcode_index: 1, inputs: &[2, 3], outputs: &[4], depth_multiplier: None },
            OpDef { opcode_index: 2, inputs: &[4, 5, 6], outputs: &[7], depth_multiplier: None },
        ];

        let mut fbb = FlatBufferBuilder::new();

        let buffer_lens = [0usize, 18, 8, 96, 12];
        let buffers: Vec<Table> = buffer_lens.iter().map(|&len| buffer(&mut fbb, len)).collect();
        let codes = vec![
            operator_code(&mut fbb, Opcode::DEPTHWISE_CONV_2D, true),
            operator_code(&mut fbb, Opcode::RESHAPE, false),
            operator_code(&mut fbb, Opcode::FULLY_CONNECTED, false),
        ];

        let mut graphs = Vec::with_capacity(subgraphs);
        for _ in 0..subgraphs {
            let tensor_offsets: Vec<Table> = tensors.iter().map(|t| tensor(&mut fbb, t)).collect();
            let op_offsets: Vec<Table> = ops.iter().map(|o| operator(&mut fbb, o)).collect();
            let tensors_vec = fbb.create_vector(&tensor_offsets[..]);
            let ops_vec = fbb.create_vector(&op_offsets[..]);
            let inputs = fbb.create_vector(&[0i32]);
            let outputs = fbb.create_vector(&[7i32]);
            let name = fbb.create_string("main");
            let start = fbb.start_table();
            fbb.push_slot_always(schema::SubGraph::VT_TENSORS, tensors_vec);
            fbb.push_slot_always(schema::SubGraph::VT_INPUTS, inputs);
            fbb.push_slot_always(schema::SubGraph::VT_OUTPUTS, outputs);
            fbb.push_slot_always(schema::SubGraph::VT_OPERATORS, ops_vec);
            fbb.push_slot_always(schema::SubGraph::VT_NAME, name);
            graphs.push(fbb.end_table(start));
        }

        let codes_vec = fbb.create_vector(&codes[..]);
        let graphs_vec = fbb.create_vector(&graphs[..]);
        let buffers_vec = fbb.create_vector(&buffers[..]);
        let start = fbb.start_table();
        fbb.push_slot::<u32>(schema::Model::VT_VERSION, 3, 0);
        fbb.push_slot_always(schema::Model::VT_OPERATOR_CODES, codes_vec);
        fbb.push_slot_always(schema::Model::VT_SUBGRAPHS, graphs_vec);
        fbb.push_slot_always(schema::Model::VT_BUFFERS, buffers_vec);
        let root = fbb.end_table(start);
        fbb.finish(root, Some(schema::FILE_IDENTIFIER));
        fbb.finished_data().to_vec()
    }

    #[test]
    fn reads_tensors_and_buffers() {
        let bytes = small_model_bytes(1);
        let model = TfliteModel::from_bytes(&bytes).unwrap();

        assert_eq!(model.subgraph_count(), 1);
        assert_eq!(model.tensor_count(), 8);

        let input = model.tensor(0).unwrap();
        assert_eq!(input.name, "input");
        assert_eq!(input.shape, vec![1, 4, 4, 1]);
        assert_eq!(input.dtype, ElementType::I8);
        assert_eq!(input.buffer_len, 0);

        let bias = model.tensor(6).unwrap();
        assert_eq!(bias.dtype, ElementType::I32);
        assert_eq!(bias.buffer_len, 12);

        assert!(model.tensor(8).is_err());
    }

    #[test]
    fn reads_operators_and_options() {
        let bytes = small_model_bytes(1);
        let model = TfliteModel::from_bytes(&bytes).unwrap();

        assert_eq!(model.layer_count(), 3);
        let dw = model.layer(0).unwrap();
        // legacy opcode recovered from the deprecated field
        assert_eq!(dw.opcode, Opcode::DEPTHWISE_CONV_2D);
        assert_eq!(dw.inputs, vec![0, 1, -1]);
        assert_eq!(
            dw.options,
            OperatorOptions::DepthwiseConv2D {
                depth_multiplier: 2
            }
        );

        let fc = model.layer(2).unwrap();
        assert_eq!(fc.opcode, Opcode::FULLY_CONNECTED);
        assert_eq!(fc.options, OperatorOptions::None);

        assert_eq!(model.graph_input_indices(), vec![0]);
        assert_eq!(model.graph_output_indices(), vec![7]);
    }

    #[test]
    fn garbage_is_malformed() {
        let bytes = [0xffu8; 16];
        assert!(matches!(
            TfliteModel::from_bytes(&bytes),
            Err(Error::Malformed(_))
        ));
    }
}
