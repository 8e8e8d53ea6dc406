//! A [`ModelSource`] held entirely in memory, for callers that decode the
//! container themselves.

use super::source::{ModelSource, RawLayer, RawTensor};
use crate::error::{Error, Result};

#[derive(Debug, Clone)]
pub struct InMemoryModel {
    pub subgraphs: usize,
    pub tensors: Vec<RawTensor>,
    pub layers: Vec<RawLayer>,
    pub inputs: Vec<i32>,
    pub outputs: Vec<i32>,
}

impl InMemoryModel {
    /// An empty single-subgraph model.
    pub fn new() -> Self {
        Self {
            subgraphs: 1,
            tensors: Vec::new(),
            layers: Vec::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }
}

impl Default for InMemoryModel {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelSource for InMemoryModel {
    fn subgraph_count(&self) -> usize {
        self.subgraphs
    }

    fn tensor_count(&self) -> usize {
        self.tensors.len()
    }

    fn tensor(&self, index: usize) -> Result<RawTensor> {
        self.tensors
            .get(index)
            .cloned()
            .ok_or_else(|| Error::Malformed(format!("no tensor at index {index}")))
    }

    fn layer_count(&self) -> usize {
        self.layers.len()
    }

    fn layer(&self, index: usize) -> Result<RawLayer> {
        self.layers
            .get(index)
            .cloned()
            .ok_or_else(|| Error::Malformed(format!("no operator at index {index}")))
    }

    fn graph_input_indices(&self) -> Vec<i32> {
        self.inputs.clone()
    }

    fn graph_output_indices(&self) -> Vec<i32> {
        self.outputs.clone()
    }
}
