//! Up-front rejection of models the estimators cannot describe faithfully.

use std::collections::{HashMap, HashSet};

use crate::error::{Error, Result};
use crate::ir::{Graph, TensorId};
use crate::parse::lowering::convert_dtype;
use crate::parse::ModelSource;

fn structure(msg: String) -> Error {
    Error::UnsupportedModelStructure(msg)
}

/// One subgraph, one graph input, at least one graph output, and quantized
/// element types on all of them.
pub fn check_structure(source: &dyn ModelSource) -> Result<()> {
    let subgraphs = source.subgraph_count();
    if subgraphs != 1 {
        return Err(structure(format!(
            "expected exactly one subgraph, found {subgraphs}"
        )));
    }

    let inputs = source.graph_input_indices();
    if inputs.len() != 1 {
        return Err(structure(format!(
            "expected exactly one graph input, found {}",
            inputs.len()
        )));
    }
    let outputs = source.graph_output_indices();
    if outputs.is_empty() {
        return Err(structure("graph declares no outputs".to_string()));
    }

    for &idx in inputs.iter().chain(outputs.iter()) {
        let tensor = usize::try_from(idx)
            .map_err(|_| Error::Malformed(format!("invalid graph tensor index {idx}")))?;
        let raw = source.tensor(tensor)?;
        if convert_dtype(raw.dtype).is_none() {
            return Err(Error::UnsupportedDataType {
                tensor,
                name: raw.name,
                dtype: raw.dtype.to_string(),
            });
        }
    }
    Ok(())
}

/// Graph-level counterpart of [`check_structure`] for graphs built in memory.
pub fn check_io(graph: &Graph) -> Result<()> {
    if graph.inputs.len() != 1 {
        return Err(structure(format!(
            "expected exactly one graph input, found {}",
            graph.inputs.len()
        )));
    }
    if graph.outputs.is_empty() {
        return Err(structure("graph declares no outputs".to_string()));
    }
    Ok(())
}

/// Fail on the first layer whose operator is outside the supported set.
pub fn check_operators(graph: &Graph) -> Result<()> {
    match graph.layers.iter().find(|layer| !layer.op.is_supported()) {
        Some(layer) => Err(Error::UnsupportedOperator {
            layer: layer.index,
            kind: layer.op.to_string(),
        }),
        None => Ok(()),
    }
}

/// Every tensor size, and the size of all tensors together, fits in
/// `usize`. ROM and RAM are sums over subsets of the tensors, so neither
/// can overflow afterwards.
pub fn check_sizes(graph: &Graph) -> Result<()> {
    let mut total = 0usize;
    for tensor in &graph.tensors {
        let bytes = tensor.checked_byte_size().ok_or_else(|| {
            Error::Overflow(format!(
                "tensor {} ('{}') with shape {:?} does not fit in memory",
                tensor.index, tensor.name, tensor.shape
            ))
        })?;
        total = total.checked_add(bytes).ok_or_else(|| {
            Error::Overflow(format!(
                "combined size of {} tensors does not fit in memory",
                graph.tensors.len()
            ))
        })?;
    }
    Ok(())
}

/// Verify that the layer list is a single sequential chain.
///
/// Every activation has at most one producer, is produced before it is
/// consumed (the graph input excepted) and feeds at most one layer.
/// Constant tensors are ignored.
pub fn check_topology(graph: &Graph) -> Result<()> {
    let input = graph.inputs.first().copied();
    let mut producers: HashMap<TensorId, usize> = HashMap::new();
    let mut consumers: HashMap<TensorId, usize> = HashMap::new();

    for layer in &graph.layers {
        let mut seen = HashSet::new();
        for &id in layer.inputs.iter().filter(|id| seen.insert(**id)) {
            let tensor = graph.tensor(layer.index, id)?;
            if tensor.is_constant {
                continue;
            }
            if Some(id) != input && !producers.contains_key(&id) {
                return Err(structure(format!(
                    "layer {}: tensor {} ('{}') is consumed before any layer produces it",
                    layer.index, id, tensor.name
                )));
            }
            if let Some(first) = consumers.insert(id, layer.index) {
                return Err(structure(format!(
                    "tensor {} ('{}') feeds both layer {} and layer {}; branching graphs are not supported",
                    id, tensor.name, first, layer.index
                )));
            }
        }

        for &id in &layer.outputs {
            let tensor = graph.tensor(layer.index, id)?;
            if tensor.is_constant {
                continue;
            }
            if Some(id) == input {
                return Err(structure(format!(
                    "layer {}: overwrites the graph input tensor {} ('{}')",
                    layer.index, id, tensor.name
                )));
            }
            if let Some(first) = producers.insert(id, layer.index) {
                return Err(structure(format!(
                    "tensor {} ('{}') is produced by both layer {} and layer {}",
                    id, tensor.name, first, layer.index
                )));
            }
        }
    }
    Ok(())
}
