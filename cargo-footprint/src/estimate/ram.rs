//! Activation memory planning.
//!
//! Worst case gives every activation its own buffer for the whole run.
//! Best case assumes an ideal planner: a buffer is free for reuse as soon as
//! its last consumer has executed, and all inputs and outputs of a layer are
//! resident together (no in-place execution).
//!
//! Liveness is measured in layer positions. An activation is born at its
//! producer (position 0 for one consumed before any layer produces it, i.e.
//! the graph input) and dies at its last consumer (the last layer for one
//! never consumed, i.e. a graph output). Peak occupancy is a sweep over
//! those intervals, which for a sequential chain reduces to the largest
//! `inputs ∪ outputs` of any single layer.

use std::collections::{BTreeMap, HashSet};

use crate::ir::{Layer, Tensor, TensorId};

/// Inclusive range of layer positions during which an activation is resident.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Liveness {
    pub tensor: TensorId,
    pub birth: usize,
    pub death: usize,
    pub bytes: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RamPlan {
    pub best_case: usize,
    pub worst_case: usize,
    /// Resident activation bytes while each layer executes, by position.
    pub live_bytes: Vec<usize>,
    /// Index of the first layer reaching `best_case`.
    pub peak_layer: Option<usize>,
    pub intervals: Vec<Liveness>,
}

struct Span {
    birth: usize,
    death: usize,
    consumed: bool,
}

/// Plan activation memory for `layers` executed in slice order.
///
/// Byte counts saturate at `usize::MAX`;
/// [`crate::estimate::validate::check_sizes`] rejects graphs where that
/// could happen.
pub fn plan_ram(tensors: &[Tensor], layers: &[Layer]) -> RamPlan {
    if layers.is_empty() {
        return RamPlan::default();
    }

    let activations: BTreeMap<TensorId, &Tensor> = tensors
        .iter()
        .filter(|t| !t.is_constant)
        .map(|t| (t.index, t))
        .collect();

    let mut spans: BTreeMap<TensorId, Span> = BTreeMap::new();
    for (pos, layer) in layers.iter().enumerate() {
        for id in layer.inputs.iter().filter(|id| activations.contains_key(*id)) {
            let span = spans.entry(*id).or_insert(Span {
                birth: 0,
                death: pos,
                consumed: false,
            });
            span.death = span.death.max(pos);
            span.consumed = true;
        }
        for id in layer.outputs.iter().filter(|id| activations.contains_key(*id)) {
            let span = spans.entry(*id).or_insert(Span {
                birth: pos,
                death: pos,
                consumed: false,
            });
            span.death = span.death.max(pos);
        }
    }

    let last = layers.len() - 1;
    let intervals: Vec<Liveness> = spans
        .into_iter()
        .map(|(tensor, span)| Liveness {
            tensor,
            birth: span.birth,
            death: if span.consumed { span.death } else { last },
            bytes: activations[&tensor].byte_size(),
        })
        .collect();

    let mut born = vec![0usize; layers.len()];
    let mut freed = vec![0usize; layers.len()];
    for interval in &intervals {
        born[interval.birth] = born[interval.birth].saturating_add(interval.bytes);
        freed[interval.death] = freed[interval.death].saturating_add(interval.bytes);
    }

    let mut live = 0usize;
    let mut live_bytes = Vec::with_capacity(layers.len());
    for pos in 0..layers.len() {
        live = live.saturating_add(born[pos]);
        live_bytes.push(live);
        live = live.saturating_sub(freed[pos]);
    }

    let mut best_case = 0;
    let mut peak_layer = None;
    for (pos, &bytes) in live_bytes.iter().enumerate() {
        if peak_layer.is_none() || bytes > best_case {
            best_case = bytes;
            peak_layer = Some(layers[pos].index);
        }
    }

    let worst_case = tensors
        .iter()
        .filter(|t| !t.is_constant)
        .map(Tensor::byte_size)
        .fold(0, usize::saturating_add);

    log::debug!(
        "RAM plan: {} activations, peak {} bytes at layer {:?}, {} bytes without reuse",
        intervals.len(),
        best_case,
        peak_layer,
        worst_case
    );

    RamPlan {
        best_case,
        worst_case,
        live_bytes,
        peak_layer,
        intervals,
    }
}

/// `(best_case_bytes, worst_case_bytes)` of activation memory.
pub fn estimate_ram(tensors: &[Tensor], layers: &[Layer]) -> (usize, usize) {
    let plan = plan_ram(tensors, layers);
    (plan.best_case, plan.worst_case)
}

/// Bytes of the distinct activations a single layer touches.
pub fn layer_footprint(tensors: &[Tensor], layer: &Layer) -> usize {
    let mut seen = HashSet::new();
    layer
        .tensors()
        .filter(|id| seen.insert(*id))
        .filter_map(|id| tensors.iter().find(|t| t.index == id))
        .filter(|t| !t.is_constant)
        .map(Tensor::byte_size)
        .fold(0, usize::saturating_add)
}
